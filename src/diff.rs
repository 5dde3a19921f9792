//! Differencing of scenario tables aligned on a shared identifier.
use crate::table::{Column, Table};
use anyhow::{Result, ensure};
use log::debug;
use std::collections::{HashMap, HashSet};

/// Suffix marking a column of absolute differences
pub const DIFF_SUFFIX: &str = "_diff";
/// Suffix marking a column of percentage differences
pub const PCT_DIFF_SUFFIX: &str = "_pct_diff";

/// Computes per-site differences between two supply curve tables.
pub struct Difference {
    index_col: String,
}

impl Difference {
    /// Create a differencer aligning rows on the given identifier column.
    pub fn new(index_col: &str) -> Difference {
        Difference {
            index_col: index_col.to_string(),
        }
    }

    /// Calculate differences between matching rows of two tables.
    ///
    /// Rows are aligned on the index column, which must hold unique values in
    /// each table. The result keeps the rows of `table_a` that also appear in
    /// `table_b`, in `table_a`'s order. For every numeric column the tables
    /// share it gains an absolute difference column (`table_b` minus
    /// `table_a`) and a percentage difference column, in that group order.
    /// Division by zero follows IEEE semantics and is not special-cased.
    pub fn calc(&self, table_a: &Table, table_b: &Table) -> Result<Table> {
        debug!("Calculating difference...");

        let keys_a = unique_keys(table_a, &self.index_col)?;
        let keys_b = unique_keys(table_b, &self.index_col)?;
        let lookup_b: HashMap<&str, usize> = keys_b
            .iter()
            .enumerate()
            .filter_map(|(row, key)| Some((key.as_deref()?, row)))
            .collect();

        // Matched row pairs, in table A's row order
        let mut rows_a = Vec::new();
        let mut rows_b = Vec::new();
        for (row_a, key) in keys_a.iter().enumerate() {
            let Some(key) = key else { continue };
            if let Some(&row_b) = lookup_b.get(key.as_str()) {
                rows_a.push(row_a);
                rows_b.push(row_b);
            }
        }

        let mut abs_columns = Vec::new();
        let mut pct_columns = Vec::new();
        for name in table_a.column_names() {
            let (Some(values_a), Some(values_b)) = (table_a.float(name), table_b.float(name))
            else {
                continue;
            };

            let mut abs = Vec::with_capacity(rows_a.len());
            let mut pct = Vec::with_capacity(rows_a.len());
            for (&row_a, &row_b) in rows_a.iter().zip(&rows_b) {
                let difference = values_b[row_b] - values_a[row_a];
                abs.push(difference);
                pct.push(difference / values_a[row_a] * 100.0);
            }

            abs_columns.push((format!("{name}{DIFF_SUFFIX}"), abs));
            pct_columns.push((format!("{name}{PCT_DIFF_SUFFIX}"), pct));
        }

        let mut result = table_a.subset(&rows_a);
        for (name, values) in abs_columns.into_iter().chain(pct_columns) {
            result.insert(&name, Column::Float(values))?;
        }

        debug!("Difference calculated.");
        Ok(result)
    }
}

/// The join keys of a table's index column, which must not repeat.
///
/// Rows without a key (missing values) are returned as `None` and take no part
/// in alignment.
fn unique_keys(table: &Table, index_col: &str) -> Result<Vec<Option<String>>> {
    let keys = table.keys(index_col)?;

    let mut seen = HashSet::new();
    for key in keys.iter().flatten() {
        ensure!(
            seen.insert(key.as_str()),
            "Column \"{index_col}\" has duplicate value {key}; cannot align tables"
        );
    }

    Ok(keys)
}
