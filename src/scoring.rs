//! Centroid-based candidate scoring ("vote_embedding" pipeline).
//!
//! The default strategy, centroid-of-voting, picks each group's consensus
//! candidate by feature voting, averages the consensus candidates'
//! embeddings into a centroid, and re-scores every candidate row by its
//! distance to that centroid.

use crate::embeddings::{
    EmbeddingResolver, EmbeddingSource, LookupPolicy, VectorMap, centroid, cosine_similarity,
    euclidean_distance,
};
use crate::error::{LinkerError, Result};
use crate::features::smallest_qnode_number_groups;
use crate::table::CandidateTable;
use crate::voting::FeatureVoter;
use std::path::PathBuf;
use std::str::FromStr;

/// Method tag of candidates eligible for voting.
pub const EXACT_MATCH: &str = "exact-match";

/// Column-vector strategy for the scoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    CentroidOfVoting,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CentroidOfVoting => "centroid-of-voting",
        }
    }
}

impl FromStr for Strategy {
    type Err = LinkerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "centroid-of-voting" => Ok(Strategy::CentroidOfVoting),
            other => Err(LinkerError::Config(format!(
                "unknown column_vector_strategy '{}'",
                other
            ))),
        }
    }
}

/// Distance function used to score candidates against the centroid.
///
/// Both are reported so that higher is better: cosine as `1 - cosine
/// distance`, euclidean as the reciprocal of the distance (with zero
/// distance mapping to positive infinity).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceFunction {
    Cosine,
    Euclidean,
}

impl FromStr for DistanceFunction {
    type Err = LinkerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(DistanceFunction::Cosine),
            "euclidean" => Ok(DistanceFunction::Euclidean),
            other => Err(LinkerError::Config(format!(
                "unknown distance function '{}'",
                other
            ))),
        }
    }
}

/// Configuration surface for a scoring pass.
#[derive(Debug, Clone)]
pub struct ScoringOptions {
    /// Local embedding file; mutually exclusive with `embedding_url`.
    pub embedding_file: Option<PathBuf>,
    /// Base URL of a remote lookup service.
    pub embedding_url: Option<String>,
    pub column_vector_strategy: Strategy,
    pub distance_function: DistanceFunction,
    /// Name of the score column; auto-generated from the strategy if absent.
    pub output_column_name: Option<String>,
    /// Column holding the entity identifiers to resolve (usually kg_id).
    pub input_column_name: String,
    pub lookup_policy: LookupPolicy,
}

impl ScoringOptions {
    /// Validate that the options describe a runnable pass.
    pub fn validate(&self) -> Result<()> {
        match (&self.embedding_file, &self.embedding_url) {
            (None, None) => Err(LinkerError::Config(
                "one of embedding_file or embedding_url is required".to_string(),
            )),
            (Some(_), Some(_)) => Err(LinkerError::Config(
                "embedding_file and embedding_url are mutually exclusive".to_string(),
            )),
            _ => {
                if self.input_column_name.is_empty() {
                    Err(LinkerError::Config(
                        "input_column_name is required".to_string(),
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn source(&self) -> Result<EmbeddingSource> {
        self.validate()?;
        if let Some(path) = &self.embedding_file {
            Ok(EmbeddingSource::File(path.clone()))
        } else {
            Ok(EmbeddingSource::Remote {
                base_url: self.embedding_url.clone().unwrap_or_default(),
            })
        }
    }
}

/// Mutable state threaded through the pipeline stages.
///
/// Holding it in one place (rather than scorer fields mutated in place)
/// keeps each stage independently testable.
pub struct ScoringContext {
    pub table: CandidateTable,
    pub vectors: VectorMap,
    pub centroid: Option<Vec<f64>>,
}

impl ScoringContext {
    pub fn new(table: CandidateTable) -> Self {
        Self {
            table,
            vectors: VectorMap::new(),
            centroid: None,
        }
    }
}

/// Runs the vote_embedding scoring pass.
pub struct EmbeddingScorer {
    options: ScoringOptions,
    voter: FeatureVoter,
}

impl EmbeddingScorer {
    /// Create a scorer, validating the options up front.
    pub fn new(options: ScoringOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            voter: FeatureVoter::default(),
        })
    }

    /// Run the full pass: dedup, resolve, vote, centroid, score.
    ///
    /// Returns the input table with vote columns and the new score column
    /// appended.
    pub async fn run(&self, mut table: CandidateTable) -> Result<CandidateTable> {
        table.drop_duplicates();

        let mut context = ScoringContext::new(table);
        self.fetch_vectors(&mut context).await?;
        self.apply_strategy(&mut context)?;
        self.add_score_column(&mut context)?;
        Ok(context.table)
    }

    /// Resolve embeddings for every distinct value of the input column.
    ///
    /// Consensus winners are always a subset of these ids, so one
    /// resolution pass serves both the centroid and the per-row scores.
    async fn fetch_vectors(&self, context: &mut ScoringContext) -> Result<()> {
        let ids = context
            .table
            .distinct_values(&self.options.input_column_name)?;
        let resolver =
            EmbeddingResolver::with_policy(self.options.source()?, self.options.lookup_policy.clone());
        context.vectors = resolver.resolve(&ids).await?;
        Ok(())
    }

    /// Dispatch on the configured strategy.
    fn apply_strategy(&self, context: &mut ScoringContext) -> Result<()> {
        match self.options.column_vector_strategy {
            Strategy::CentroidOfVoting => self.centroid_of_voting(context),
        }
    }

    /// The centroid-of-voting strategy.
    ///
    /// Restricts voting to exact-match candidates, ensures the
    /// smallest-qnode-number feature, votes per group, and averages the
    /// consensus winners' vectors. Fails when no group reaches consensus,
    /// or when none of the winners has a resolvable vector.
    fn centroid_of_voting(&self, context: &mut ScoringContext) -> Result<()> {
        let exact_rows = context
            .table
            .rows_where("method", |m| m == EXACT_MATCH)?;
        let groups = context.table.group_rows(&exact_rows)?;

        smallest_qnode_number_groups(&mut context.table, &groups)?;

        let winners = self.voter.vote_groups(&mut context.table, &groups)?;
        if winners.is_empty() {
            return Err(LinkerError::Strategy(
                Strategy::CentroidOfVoting.as_str().to_string(),
            ));
        }

        let missing = winners
            .iter()
            .filter(|id| !context.vectors.contains_key(*id))
            .count();
        if missing > 0 {
            eprintln!(
                "centroid-of-voting: Missing {} of {}",
                missing,
                winners.len()
            );
        }

        let vectors: Vec<&[f64]> = winners
            .iter()
            .filter_map(|id| context.vectors.get(id).map(|v| v.as_slice()))
            .collect();
        context.centroid = centroid(&vectors);
        if context.centroid.is_none() {
            return Err(LinkerError::Resolution(format!(
                "no embeddings found for any of the {} consensus candidates",
                winners.len()
            )));
        }
        Ok(())
    }

    /// Pick the score column name, disambiguating collisions with a
    /// numeric suffix.
    fn score_column_name(&self, table: &CandidateTable) -> String {
        if let Some(name) = &self.options.output_column_name {
            return name.clone();
        }
        let strategy = self.options.column_vector_strategy.as_str();
        let mut name = format!("score_{}", strategy);
        let mut i = 1;
        while table.has_column(&name) {
            i += 1;
            name = format!("score_{}_{}", strategy, i);
        }
        name
    }

    /// Score every row against the centroid and append the column.
    ///
    /// Rows whose identifier is empty or has no resolved vector get an
    /// explicit empty score.
    fn add_score_column(&self, context: &mut ScoringContext) -> Result<()> {
        let centroid = context
            .centroid
            .as_deref()
            .ok_or_else(|| LinkerError::Strategy("no centroid computed".to_string()))?;

        let name = self.score_column_name(&context.table);
        let ids = context
            .table
            .column_values(&self.options.input_column_name)?;

        let scores: Vec<String> = ids
            .iter()
            .map(|id| {
                if id.is_empty() {
                    return String::new();
                }
                match context.vectors.get(id) {
                    Some(vector) => self.compute_distance(centroid, vector).to_string(),
                    None => String::new(),
                }
            })
            .collect();

        context.table.set_column(&name, scores)
    }

    /// Higher-is-better score between two vectors.
    fn compute_distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self.options.distance_function {
            DistanceFunction::Cosine => cosine_similarity(a, b),
            DistanceFunction::Euclidean => {
                let distance = euclidean_distance(a, b);
                if distance == 0.0 {
                    f64::INFINITY
                } else {
                    1.0 / distance
                }
            }
        }
    }
}
