//! Table Linker CLI
//!
//! Candidate scoring and evaluation commands for table linking. Each
//! command reads a candidate CSV (file or stdin) and writes CSV to stdout,
//! so commands compose into pipelines.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use table_linker::{
    embeddings::LookupPolicy,
    evaluation::{ground_truth_labeler, metrics, write_metrics},
    features::smallest_qnode_number,
    scoring::{EmbeddingScorer, ScoringOptions},
    table::CandidateTable,
};

/// Table Linker - candidate scoring and evaluation for table linking
#[derive(Parser)]
#[command(name = "tl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score candidates by distance to the consensus-vote centroid
    ScoreUsingEmbedding {
        /// Input candidate file (reads stdin if omitted)
        input_file: Option<PathBuf>,

        /// Path to a tab-separated embedding file
        #[arg(long, conflicts_with = "embedding_url")]
        embedding_file: Option<PathBuf>,

        /// Base URL of a remote embedding lookup service
        #[arg(long)]
        embedding_url: Option<String>,

        /// Column vector strategy
        #[arg(long, default_value = "centroid-of-voting")]
        column_vector_strategy: String,

        /// Distance function: cosine or euclidean
        #[arg(long, default_value = "cosine")]
        distance_function: String,

        /// Name of the output score column (auto-generated if omitted)
        #[arg(short, long)]
        output_column_name: Option<String>,

        /// Column holding the entity identifiers to embed
        #[arg(short = 'c', long)]
        input_column_name: String,

        /// Abort remote lookups after this many lookups with no success
        #[arg(long, default_value_t = 100)]
        max_lookup_failures: usize,
    },

    /// Add ground-truth columns and evaluation labels to candidates
    GroundTruthLabeler {
        /// Input candidate file (reads stdin if omitted)
        input_file: Option<PathBuf>,

        /// Ground truth file with columns column,row,kg_id,kg_label
        #[arg(long)]
        gt_file: PathBuf,
    },

    /// Compute precision, recall@k and F1 for a scored, labeled file
    Metrics {
        /// Input candidate file (reads stdin if omitted)
        input_file: Option<PathBuf>,

        /// Column with ranking scores
        #[arg(short, long)]
        column: String,

        /// k values for recall@k, comma-separated
        #[arg(short, default_value = "1")]
        k: String,

        /// Tag identifying this pipeline run in the output
        #[arg(long, default_value = "")]
        tag: String,
    },

    /// Compute the smallest-qnode-number feature
    SmallestQnodeNumber {
        /// Input candidate file (reads stdin if omitted)
        input_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::ScoreUsingEmbedding {
            input_file,
            embedding_file,
            embedding_url,
            column_vector_strategy,
            distance_function,
            output_column_name,
            input_column_name,
            max_lookup_failures,
        } => cmd_score_using_embedding(
            input_file,
            embedding_file,
            embedding_url,
            column_vector_strategy,
            distance_function,
            output_column_name,
            input_column_name,
            max_lookup_failures,
        )
        .await
        .context("Command: score-using-embedding"),

        Commands::GroundTruthLabeler {
            input_file,
            gt_file,
        } => cmd_ground_truth_labeler(input_file, gt_file)
            .context("Command: ground-truth-labeler"),

        Commands::Metrics {
            input_file,
            column,
            k,
            tag,
        } => cmd_metrics(input_file, column, k, tag).context("Command: metrics"),

        Commands::SmallestQnodeNumber { input_file } => {
            cmd_smallest_qnode_number(input_file).context("Command: smallest-qnode-number")
        }
    }
}

/// Read a candidate table from a path, or stdin when no path is given.
fn load_table(input_file: Option<PathBuf>) -> Result<CandidateTable> {
    let table = match input_file {
        Some(path) => CandidateTable::from_csv_path(&path)?,
        None => CandidateTable::from_csv_reader(io::stdin().lock())?,
    };
    Ok(table)
}

/// Parse a comma-separated k list, e.g. "1,5,10".
fn parse_k_list(k: &str) -> Result<Vec<usize>> {
    k.split(',')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid k value '{}'", part))
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
async fn cmd_score_using_embedding(
    input_file: Option<PathBuf>,
    embedding_file: Option<PathBuf>,
    embedding_url: Option<String>,
    column_vector_strategy: String,
    distance_function: String,
    output_column_name: Option<String>,
    input_column_name: String,
    max_lookup_failures: usize,
) -> Result<()> {
    let options = ScoringOptions {
        embedding_file,
        embedding_url,
        column_vector_strategy: column_vector_strategy.parse()?,
        distance_function: distance_function.parse()?,
        output_column_name,
        input_column_name,
        lookup_policy: LookupPolicy {
            max_failures: max_lookup_failures,
        },
    };

    let table = load_table(input_file)?;
    let scorer = EmbeddingScorer::new(options)?;
    let scored = scorer.run(table).await?;
    scored.print_output()?;
    Ok(())
}

fn cmd_ground_truth_labeler(input_file: Option<PathBuf>, gt_file: PathBuf) -> Result<()> {
    let table = load_table(input_file)?;
    let labeled = ground_truth_labeler(&gt_file, None, Some(table))?;
    labeled.print_output()?;
    Ok(())
}

fn cmd_metrics(
    input_file: Option<PathBuf>,
    column: String,
    k: String,
    tag: String,
) -> Result<()> {
    let ks = parse_k_list(&k)?;
    let table = load_table(input_file)?;
    let records = metrics(&column, &ks, &tag, None, Some(table))?;
    write_metrics(&records, io::stdout().lock())?;
    Ok(())
}

fn cmd_smallest_qnode_number(input_file: Option<PathBuf>) -> Result<()> {
    let mut table = load_table(input_file)?;
    smallest_qnode_number(&mut table)?;
    table.print_output()?;
    Ok(())
}
