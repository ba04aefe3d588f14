use std::path::Path;

use super::container::ContainerReader;
use super::error::BranchError;
use super::table::Table;

/// Number of decimals kept on extracted values
pub const DECIMAL_PLACES: i32 = 3;
/// Default number of values per chunk when histogramming
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// Round half-to-even at `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Two aligned branches of a table, widened to f64
#[derive(Debug, Clone, PartialEq)]
pub struct BranchPair {
    pub x_name: String,
    pub y_name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl BranchPair {
    /// Pull `x_branch` and `y_branch` out of an in-memory table
    pub fn from_table(
        table: &Table,
        table_name: &str,
        x_branch: &str,
        y_branch: &str,
    ) -> Result<Self, BranchError> {
        let x = fetch(table, table_name, x_branch)?;
        let y = fetch(table, table_name, y_branch)?;
        if x.len() != y.len() {
            return Err(BranchError::MismatchedLengths {
                x: x_branch.to_string(),
                y: y_branch.to_string(),
                x_len: x.len(),
                y_len: y.len(),
            });
        }
        Ok(Self {
            x_name: x_branch.to_string(),
            y_name: y_branch.to_string(),
            x,
            y,
        })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Aligned (x, y) slices of at most `chunk_size` values. A chunk size of 0 means one chunk.
    pub fn chunks(&self, chunk_size: usize) -> impl Iterator<Item = (&[f64], &[f64])> {
        let size = if chunk_size == 0 {
            self.len().max(1)
        } else {
            chunk_size
        };
        self.x.chunks(size).zip(self.y.chunks(size))
    }
}

fn fetch(table: &Table, table_name: &str, branch: &str) -> Result<Vec<f64>, BranchError> {
    let column = table
        .column(branch)
        .ok_or_else(|| BranchError::NoSuchBranch {
            table: table_name.to_string(),
            branch: branch.to_string(),
        })?;
    Ok(column
        .to_f64_vec()
        .into_iter()
        .map(|v| round_to(v, DECIMAL_PLACES))
        .collect())
}

/// Read two branches of a table from a container file
pub fn extract_branches(
    path: &Path,
    table_name: &str,
    x_branch: &str,
    y_branch: &str,
) -> Result<BranchPair, BranchError> {
    let reader = ContainerReader::open(path)?;
    let entry_name = reader.find_table(table_name)?;
    let table = reader.read_table(&entry_name)?;
    let pair = BranchPair::from_table(&table, table_name, x_branch, y_branch)?;
    log::info!(
        "Extracted {} values of {} and {} from {}",
        pair.len(),
        x_branch,
        y_branch,
        path.display()
    );
    Ok(pair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerWriter;
    use crate::table::Column;

    #[test]
    fn rounding_is_half_to_even() {
        assert_eq!(round_to(1.0005, 3), 1.0);
        assert_eq!(round_to(0.0125, 3), 0.012);
        assert_eq!(round_to(-2.34567, 3), -2.346);
        assert_eq!(round_to(7.0, 3), 7.0);
    }

    #[test]
    fn extracts_and_rounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged0.h5");
        let mut hits = Table::new();
        hits.insert("x_ax", Column::F64(vec![1.23456, -0.5]));
        hits.insert("y_ax", Column::F32(vec![2.0, 4.25]));
        hits.insert("event", Column::I32(vec![0, 1]));
        let writer = ContainerWriter::create(&path).unwrap();
        writer.write_table("hits;1", &hits).unwrap();
        writer.close().unwrap();

        let pair = extract_branches(&path, "hits", "x_ax", "y_ax").unwrap();
        assert_eq!(pair.x, vec![1.235, -0.5]);
        assert_eq!(pair.y, vec![2.0, 4.25]);

        let err = extract_branches(&path, "hits", "x_ax", "z_ax").unwrap_err();
        assert!(matches!(err, BranchError::NoSuchBranch { .. }));
        let err = extract_branches(&path, "photons", "x_ax", "y_ax").unwrap_err();
        assert!(matches!(err, BranchError::ContainerError(_)));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut table = Table::new();
        table.insert("a", Column::F64(vec![1.0, 2.0]));
        table.insert("b", Column::F64(vec![1.0]));
        let err = BranchPair::from_table(&table, "t", "a", "b").unwrap_err();
        assert!(matches!(
            err,
            BranchError::MismatchedLengths {
                x_len: 2,
                y_len: 1,
                ..
            }
        ));
    }

    #[test]
    fn chunks_stay_aligned() {
        let pair = BranchPair {
            x_name: "x".into(),
            y_name: "y".into(),
            x: vec![1.0, 2.0, 3.0, 4.0, 5.0],
            y: vec![10.0, 20.0, 30.0, 40.0, 50.0],
        };
        let chunks: Vec<(&[f64], &[f64])> = pair.chunks(2).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], (&[5.0][..], &[50.0][..]));
        assert_eq!(pair.chunks(0).count(), 1);
    }
}
