//! Table Linker - candidate voting, embedding scoring and evaluation.
//!
//! This library is a Rust port of the scoring and evaluation core of the
//! `tl` table-linking pipeline: matching cell values in tabular data to
//! knowledge-graph entities, ranking the candidate matches, and measuring
//! ranking quality against ground truth.
//!
//! # Overview
//!
//! The scoring pass ("vote_embedding") works in stages:
//! 1. Per (column, row) group, cheap features vote; a candidate that wins
//!    every feature is the group's consensus winner
//! 2. Consensus winners' embedding vectors are averaged into a centroid
//! 3. Every candidate is re-scored by its distance to the centroid
//!
//! Independently, the evaluation engine labels candidates against ground
//! truth and computes precision / recall@k / F1 with deterministic
//! tie-breaking.
//!
//! # Quick Start
//!
//! ```no_run
//! use table_linker::{
//!     embeddings::LookupPolicy,
//!     scoring::{DistanceFunction, EmbeddingScorer, ScoringOptions, Strategy},
//!     table::CandidateTable,
//! };
//! use std::path::{Path, PathBuf};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let table = CandidateTable::from_csv_path(Path::new("candidates.csv"))?;
//!
//!     let scorer = EmbeddingScorer::new(ScoringOptions {
//!         embedding_file: Some(PathBuf::from("embeddings.tsv")),
//!         embedding_url: None,
//!         column_vector_strategy: Strategy::CentroidOfVoting,
//!         distance_function: DistanceFunction::Cosine,
//!         output_column_name: None,
//!         input_column_name: "kg_id".to_string(),
//!         lookup_policy: LookupPolicy::default(),
//!     })?;
//!
//!     let scored = scorer.run(table).await?;
//!     scored.print_output()?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **CandidateTable**: string-typed tabular data with CSV I/O
//! - **FeatureVoter**: per-group multi-feature consensus voting
//! - **EmbeddingResolver**: vectors from a local file or a remote service
//! - **EmbeddingScorer**: the centroid-of-voting scoring pipeline
//! - **evaluation**: ground-truth labeling and precision/recall@k/F1

pub mod embeddings;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod scoring;
pub mod table;
pub mod voting;

// Re-export commonly used types
pub use embeddings::{EmbeddingResolver, EmbeddingSource, LookupPolicy, VectorMap};
pub use error::{LinkerError, Result};
pub use evaluation::{MetricsRecord, ground_truth_labeler, metrics};
pub use scoring::{DistanceFunction, EmbeddingScorer, ScoringOptions, Strategy};
pub use table::CandidateTable;
pub use voting::FeatureVoter;
