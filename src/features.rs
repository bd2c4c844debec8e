//! Cheap candidate features consumed by the voting engine.

use crate::error::Result;
use crate::table::{CandidateTable, KG_ID};

/// Name of the column written by [`smallest_qnode_number`].
pub const SMALLEST_QNODE_NUMBER: &str = "smallest_qnode_number";

/// Numeric part of a Q-node identifier ("Q42" -> 42).
///
/// Identifiers without a parseable numeric tail yield `None`.
fn qnode_number(kg_id: &str) -> Option<u64> {
    let digits: String = kg_id.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Compute the smallest-qnode-number feature over the whole table.
///
/// Within each (column, row) group, every candidate whose Q-node number is
/// the smallest in the group gets 1, all others 0. Candidates whose kg_id
/// has no numeric part get 0; a 0 group maximum reads as "no information"
/// downstream.
pub fn smallest_qnode_number(table: &mut CandidateTable) -> Result<()> {
    let groups = table.group_by_cell()?;
    smallest_qnode_number_groups(table, &groups)
}

/// Compute the smallest-qnode-number feature over explicit groups.
///
/// Rows outside `groups` get a neutral 0, so scoring passes that restrict
/// to one retrieval method can still annotate the full table.
pub fn smallest_qnode_number_groups(
    table: &mut CandidateTable,
    groups: &[((String, String), Vec<usize>)],
) -> Result<()> {
    let kg_idx = table.require_column(KG_ID)?;
    let mut values = vec!["0".to_string(); table.len()];

    for (_, indices) in groups {
        let numbers: Vec<Option<u64>> = indices
            .iter()
            .map(|&i| qnode_number(table.cell(i, kg_idx)))
            .collect();
        let smallest = numbers.iter().flatten().min().copied();

        if let Some(smallest) = smallest {
            for (&i, number) in indices.iter().zip(&numbers) {
                if *number == Some(smallest) {
                    values[i] = "1".to_string();
                }
            }
        }
    }

    table.set_column(SMALLEST_QNODE_NUMBER, values)
}
