//! Ground-truth labeling and ranking metrics.
//!
//! `ground_truth_labeler` joins a scored candidate table against a ground
//! truth table on (column, row) and labels every candidate 0 (no ground
//! truth), 1 (correct) or -1 (incorrect). `metrics` turns a labeled,
//! scored table into precision / recall@k / F1 records.

use crate::error::{LinkerError, Result};
use crate::table::{COLUMN, CandidateTable, KG_ID, ROW};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::Path;

/// Ground-truth id column added by the labeler.
pub const GT_KG_ID: &str = "GT_kg_id";
/// Ground-truth label column added by the labeler.
pub const GT_KG_LABEL: &str = "GT_kg_label";
/// Correctness label column added by the labeler: "0", "1" or "-1".
pub const EVALUATION_LABEL: &str = "evaluation_label";

/// One metrics row, for one k value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub k: usize,
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub tag: String,
}

/// Candidate input for the evaluation entry points: a file path, an
/// in-memory table, or both absent (an error).
fn resolve_input(
    file_path: Option<&Path>,
    table: Option<CandidateTable>,
) -> Result<CandidateTable> {
    match (file_path, table) {
        (Some(path), _) => CandidateTable::from_csv_path(path),
        (None, Some(table)) => Ok(table),
        (None, None) => Err(LinkerError::MissingInput(
            "file_path or table".to_string(),
        )),
    }
}

/// Join candidates with ground truth and add correctness labels.
///
/// The ground-truth table must carry `column,row,kg_id,kg_label`; its id
/// and label columns are renamed `GT_kg_id` / `GT_kg_label` on the way in.
/// Groups with no ground truth get empty GT cells and label 0.
pub fn ground_truth_labeler(
    gt_file_path: &Path,
    file_path: Option<&Path>,
    table: Option<CandidateTable>,
) -> Result<CandidateTable> {
    let mut table = resolve_input(file_path, table)?;
    let gt = CandidateTable::from_csv_path(gt_file_path)?;

    let gt_col = gt.require_column(COLUMN)?;
    let gt_row = gt.require_column(ROW)?;
    let gt_id = gt.require_column(KG_ID)?;
    let gt_label = gt.require_column("kg_label")?;

    // First ground-truth entry per cell wins.
    let mut lookup: HashMap<(String, String), (String, String)> = HashMap::new();
    for i in 0..gt.len() {
        lookup
            .entry((gt.cell(i, gt_col).to_string(), gt.cell(i, gt_row).to_string()))
            .or_insert_with(|| {
                (
                    gt.cell(i, gt_id).to_string(),
                    gt.cell(i, gt_label).to_string(),
                )
            });
    }

    let col = table.require_column(COLUMN)?;
    let row_col = table.require_column(ROW)?;
    let kg = table.require_column(KG_ID)?;

    let mut gt_ids = Vec::with_capacity(table.len());
    let mut gt_labels = Vec::with_capacity(table.len());
    let mut labels = Vec::with_capacity(table.len());
    for i in 0..table.len() {
        let key = (
            table.cell(i, col).to_string(),
            table.cell(i, row_col).to_string(),
        );
        let (gt_id, gt_label) = lookup
            .get(&key)
            .cloned()
            .unwrap_or((String::new(), String::new()));

        let label = if gt_id.is_empty() {
            "0"
        } else if table.cell(i, kg) == gt_id {
            "1"
        } else {
            "-1"
        };
        labels.push(label.to_string());
        gt_ids.push(gt_id);
        gt_labels.push(gt_label);
    }

    table.set_column(GT_KG_ID, gt_ids)?;
    table.set_column(GT_KG_LABEL, gt_labels)?;
    table.set_column(EVALUATION_LABEL, labels)?;
    Ok(table)
}

/// Compute precision, recall@k and F1 over a scored, labeled table.
///
/// `column` names the score column; non-numeric or missing scores read as
/// 0.0. Only groups with ground truth count toward the denominators.
/// Records come back in strictly increasing k order.
pub fn metrics(
    column: &str,
    k: &[usize],
    tag: &str,
    file_path: Option<&Path>,
    table: Option<CandidateTable>,
) -> Result<Vec<MetricsRecord>> {
    let mut table = resolve_input(file_path, table)?;
    table.drop_duplicate_candidates()?;

    let score_idx = table.require_column(column)?;
    let label_idx = table.require_column(EVALUATION_LABEL)?;
    let kg_idx = table.require_column(KG_ID)?;

    let mut ks: Vec<usize> = k.to_vec();
    ks.sort_unstable();
    ks.dedup();

    // Relevant groups: those whose candidates carry a non-zero label.
    let relevant = table.rows_where(EVALUATION_LABEL, |label| label != "0")?;
    let groups = table.group_rows(&relevant)?;
    let n = groups.len();

    let mut precision_hits = 0usize;
    let mut recall_hits: HashMap<usize, usize> = ks.iter().map(|&k| (k, 0)).collect();

    for (_, indices) in &groups {
        let mut ranked: Vec<(f64, String, bool)> = indices
            .iter()
            .map(|&i| {
                let score = table.cell(i, score_idx).parse::<f64>().unwrap_or(0.0);
                let correct = table.cell(i, label_idx) == "1";
                (score, table.cell(i, kg_idx).to_string(), correct)
            })
            .collect();

        // Descending score, ascending kg_id: a deterministic total order.
        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });

        let max_score = ranked
            .iter()
            .map(|(score, _, _)| *score)
            .fold(f64::NEG_INFINITY, f64::max);

        if ranked
            .iter()
            .any(|(score, _, correct)| *correct && *score == max_score)
        {
            precision_hits += 1;
        }

        for (rank, (_, _, correct)) in ranked.iter().enumerate() {
            if !correct {
                continue;
            }
            for &each_k in &ks {
                if rank + 1 <= each_k {
                    *recall_hits.get_mut(&each_k).unwrap() += 1;
                }
            }
        }
    }

    let precision = if n > 0 {
        precision_hits as f64 / n as f64
    } else {
        0.0
    };

    let records = ks
        .iter()
        .map(|&each_k| {
            let recall = if n > 0 {
                recall_hits[&each_k] as f64 / n as f64
            } else {
                0.0
            };
            let f1 = if precision == 0.0 && recall == 0.0 {
                0.0
            } else {
                (2.0 * precision * recall) / (precision + recall)
            };
            MetricsRecord {
                k: each_k,
                f1,
                precision,
                recall,
                tag: tag.to_string(),
            }
        })
        .collect();

    Ok(records)
}

/// Write metrics records as CSV.
pub fn write_metrics<W: io::Write>(records: &[MetricsRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer
        .flush()
        .map_err(|e| LinkerError::Csv(e.to_string()))?;
    Ok(())
}
