//! Multi-feature consensus voting over candidate groups.
//!
//! Each (column, row) group votes independently: per feature, the group
//! maximum is the winning value and every row holding it gets one vote.
//! A candidate that wins every feature simultaneously is the group's
//! consensus winner.

use crate::error::Result;
use crate::features::SMALLEST_QNODE_NUMBER;
use crate::table::{CandidateTable, KG_ID};

/// Votes computed for one candidate group.
#[derive(Debug, Clone)]
pub struct GroupVotes {
    /// Per feature, one 0/1 vote per row of the group (group order).
    pub feature_votes: Vec<Vec<u32>>,
    /// Total votes per row of the group (group order).
    pub totals: Vec<u32>,
    /// kg_id of the consensus winner, if one row won every feature.
    pub consensus: Option<String>,
}

/// Voting engine over an ordered list of feature columns.
///
/// The list is ordered so that vote columns are emitted deterministically;
/// the vote itself is independent of feature order.
#[derive(Debug, Clone)]
pub struct FeatureVoter {
    features: Vec<String>,
}

impl Default for FeatureVoter {
    fn default() -> Self {
        Self::new(vec![SMALLEST_QNODE_NUMBER.to_string()])
    }
}

impl FeatureVoter {
    /// Create a voter over the given feature columns.
    pub fn new(features: Vec<String>) -> Self {
        Self { features }
    }

    /// The voting feature columns, in emission order.
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Name of the vote column derived from a feature column.
    pub fn vote_column(feature: &str) -> String {
        format!("vote_{}", feature)
    }

    /// Compute votes for one group of row indices.
    ///
    /// Feature values are coerced to floats, with missing or non-numeric
    /// cells reading as 0.0. A feature whose group maximum is 0 carries no
    /// information and casts no votes. When several rows are unanimous
    /// winners, the one with the lexicographically smallest kg_id is
    /// selected; relying on input order would make the result an artifact
    /// of data layout.
    pub fn vote(&self, table: &CandidateTable, indices: &[usize]) -> Result<GroupVotes> {
        let kg_idx = table.require_column(KG_ID)?;

        let mut feature_votes: Vec<Vec<u32>> = Vec::with_capacity(self.features.len());
        let mut totals = vec![0u32; indices.len()];

        for feature in &self.features {
            let col = table.require_column(feature)?;
            let values: Vec<f64> = indices
                .iter()
                .map(|&i| table.cell(i, col).parse::<f64>().unwrap_or(0.0))
                .collect();
            let max = values.iter().cloned().fold(0.0f64, f64::max);

            let votes: Vec<u32> = if max == 0.0 {
                vec![0; indices.len()]
            } else {
                values.iter().map(|&v| (v == max) as u32).collect()
            };

            for (total, vote) in totals.iter_mut().zip(&votes) {
                *total += vote;
            }
            feature_votes.push(votes);
        }

        let needed = self.features.len() as u32;
        let consensus = if needed == 0 {
            None
        } else {
            indices
                .iter()
                .zip(&totals)
                .filter(|&(_, &total)| total == needed)
                .map(|(&i, _)| table.cell(i, kg_idx).to_string())
                .min()
        };

        Ok(GroupVotes {
            feature_votes,
            totals,
            consensus,
        })
    }

    /// Run the vote over a set of groups and annotate the table.
    ///
    /// Writes one `vote_<feature>` column per feature plus a `votes` total
    /// column; rows outside `groups` keep a neutral 0. Returns the
    /// consensus winner kg_id of each group that reached one.
    pub fn vote_groups(
        &self,
        table: &mut CandidateTable,
        groups: &[((String, String), Vec<usize>)],
    ) -> Result<Vec<String>> {
        let mut vote_columns: Vec<Vec<String>> =
            vec![vec!["0".to_string(); table.len()]; self.features.len()];
        let mut total_column = vec!["0".to_string(); table.len()];
        let mut winners = Vec::new();

        for (_, indices) in groups {
            let group_votes = self.vote(table, indices)?;

            for (feature_idx, votes) in group_votes.feature_votes.iter().enumerate() {
                for (&row, &vote) in indices.iter().zip(votes) {
                    vote_columns[feature_idx][row] = vote.to_string();
                }
            }
            for (&row, &total) in indices.iter().zip(&group_votes.totals) {
                total_column[row] = total.to_string();
            }

            if let Some(winner) = group_votes.consensus {
                winners.push(winner);
            }
        }

        for (feature, column) in self.features.iter().zip(vote_columns) {
            table.set_column(&Self::vote_column(feature), column)?;
        }
        table.set_column("votes", total_column)?;

        Ok(winners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_from(csv: &str) -> CandidateTable {
        CandidateTable::from_csv_reader(csv.as_bytes()).unwrap()
    }

    fn all_indices(table: &CandidateTable) -> Vec<usize> {
        (0..table.len()).collect()
    }

    #[test]
    fn test_single_winner_reaches_consensus() {
        let table = table_from(
            "column,row,kg_id,smallest_qnode_number\n\
             0,0,Q1,1\n\
             0,0,Q2,0\n",
        );
        let voter = FeatureVoter::default();
        let votes = voter.vote(&table, &all_indices(&table)).unwrap();

        assert_eq!(votes.totals, vec![1, 0]);
        assert_eq!(votes.consensus.as_deref(), Some("Q1"));
    }

    #[test]
    fn test_zero_maximum_casts_no_votes() {
        let table = table_from(
            "column,row,kg_id,smallest_qnode_number\n\
             0,0,Q1,0\n\
             0,0,Q2,0\n",
        );
        let voter = FeatureVoter::default();
        let votes = voter.vote(&table, &all_indices(&table)).unwrap();

        assert_eq!(votes.totals, vec![0, 0]);
        assert_eq!(votes.consensus, None);
    }

    #[test]
    fn test_disagreeing_features_yield_no_consensus() {
        let table = table_from(
            "column,row,kg_id,feature_a,feature_b\n\
             0,0,Q1,1,0\n\
             0,0,Q2,0,1\n",
        );
        let voter = FeatureVoter::new(vec!["feature_a".to_string(), "feature_b".to_string()]);
        let votes = voter.vote(&table, &all_indices(&table)).unwrap();

        assert_eq!(votes.totals, vec![1, 1]);
        assert_eq!(votes.consensus, None);
    }

    #[test]
    fn test_unanimous_across_two_features() {
        let table = table_from(
            "column,row,kg_id,feature_a,feature_b\n\
             0,0,Q1,1,0.5\n\
             0,0,Q2,0,0.2\n",
        );
        let voter = FeatureVoter::new(vec!["feature_a".to_string(), "feature_b".to_string()]);
        let votes = voter.vote(&table, &all_indices(&table)).unwrap();

        assert_eq!(votes.totals, vec![2, 0]);
        assert_eq!(votes.consensus.as_deref(), Some("Q1"));
    }

    #[test]
    fn test_tie_breaks_by_smallest_kg_id() {
        let table = table_from(
            "column,row,kg_id,smallest_qnode_number\n\
             0,0,Q9,1\n\
             0,0,Q1,1\n",
        );
        let voter = FeatureVoter::default();
        let votes = voter.vote(&table, &all_indices(&table)).unwrap();
        assert_eq!(votes.consensus.as_deref(), Some("Q1"));
    }

    #[test]
    fn test_non_numeric_feature_reads_as_zero() {
        let table = table_from(
            "column,row,kg_id,smallest_qnode_number\n\
             0,0,Q1,not-a-number\n\
             0,0,Q2,1\n",
        );
        let voter = FeatureVoter::default();
        let votes = voter.vote(&table, &all_indices(&table)).unwrap();
        assert_eq!(votes.consensus.as_deref(), Some("Q2"));
    }

    #[test]
    fn test_vote_groups_annotates_and_collects_winners() {
        let mut table = table_from(
            "column,row,kg_id,smallest_qnode_number\n\
             0,0,Q1,1\n\
             0,0,Q2,0\n\
             0,1,Q3,0\n\
             0,1,Q4,0\n",
        );
        let groups = table.group_by_cell().unwrap();
        let voter = FeatureVoter::default();
        let winners = voter.vote_groups(&mut table, &groups).unwrap();

        assert_eq!(winners, vec!["Q1".to_string()]);
        assert_eq!(table.get(0, "vote_smallest_qnode_number"), Some("1"));
        assert_eq!(table.get(1, "vote_smallest_qnode_number"), Some("0"));
        assert_eq!(table.get(0, "votes"), Some("1"));
        // The second group's maximum is 0: no votes anywhere.
        assert_eq!(table.get(2, "votes"), Some("0"));
        assert_eq!(table.get(3, "votes"), Some("0"));
    }

    #[test]
    fn test_groups_vote_independently() {
        let mut table = table_from(
            "column,row,kg_id,smallest_qnode_number\n\
             0,0,Q1,1\n\
             0,1,Q2,1\n",
        );
        let groups = table.group_by_cell().unwrap();
        let voter = FeatureVoter::default();
        let winners = voter.vote_groups(&mut table, &groups).unwrap();
        assert_eq!(winners, vec!["Q1".to_string(), "Q2".to_string()]);
    }
}
