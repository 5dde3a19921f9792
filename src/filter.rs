//! Row filters driven by predicate strings and UI point selections.
use crate::error::ScoutError;
use crate::request::PointSelection;
use crate::table::{GID_COL, Table};
use anyhow::Result;
use log::debug;
use std::cmp::Ordering;
use std::collections::HashSet;

/// A comparison operator in a filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Ge,
    Gt,
    Le,
    Lt,
    Eq,
}

impl CmpOp {
    /// Parse an operator token, if recognised
    fn parse(token: &str) -> Option<CmpOp> {
        match token {
            ">=" => Some(CmpOp::Ge),
            ">" => Some(CmpOp::Gt),
            "<=" => Some(CmpOp::Le),
            "<" => Some(CmpOp::Lt),
            "==" => Some(CmpOp::Eq),
            _ => None,
        }
    }

    /// Whether `value` satisfies the comparison against `threshold`.
    ///
    /// NaN satisfies no comparison. Equality is exact; the threshold comes from the same kind
    /// of user entry as the data.
    fn eval(self, value: f64, threshold: f64) -> bool {
        let Some(ordering) = value.partial_cmp(&threshold) else {
            return false;
        };
        match self {
            CmpOp::Ge => ordering != Ordering::Less,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Eq => ordering == Ordering::Equal,
        }
    }
}

/// A parsed `<column> <operator> <value>` predicate.
#[derive(Debug, Clone, PartialEq)]
struct Predicate {
    column: String,
    op: CmpOp,
    threshold: f64,
}

/// Parse a predicate string.
///
/// The string must split into exactly three whitespace separated tokens, with a recognised
/// operator and a numeric value.
fn parse_predicate(filter: &str) -> Result<Predicate, ScoutError> {
    let malformed = || ScoutError::MalformedPredicate(filter.to_string());

    let tokens: Vec<&str> = filter.split_whitespace().collect();
    let [column, op, value] = tokens[..] else {
        return Err(malformed());
    };

    Ok(Predicate {
        column: column.to_string(),
        op: CmpOp::parse(op).ok_or_else(malformed)?,
        threshold: value.parse().map_err(|_| malformed())?,
    })
}

/// Filter a table with a set of predicate strings.
///
/// Each non-empty string must have the form `<column> <operator> <value>` with an operator from
/// `>=`, `>`, `<=`, `<`, `==`; anything else fails with [`ScoutError::MalformedPredicate`].
/// Predicates on columns the table does not have, or that are not numeric, are skipped. The
/// remaining predicates are combined with AND.
///
/// # Arguments
///
/// * `table`: The table to filter
/// * `filters`: The predicate strings
///
/// # Returns
///
/// A new table containing the rows satisfying every applicable predicate.
pub fn apply_column_filters(table: &Table, filters: &[String]) -> Result<Table> {
    let mut keep = vec![true; table.n_rows()];
    let mut any_applied = false;

    for filter in filters {
        if filter.trim().is_empty() {
            continue;
        }
        let predicate = parse_predicate(filter)?;

        let Some(values) = table.float(&predicate.column) else {
            debug!("Skipping filter on unknown or non-numeric column: {filter}");
            continue;
        };

        any_applied = true;
        for (flag, &value) in keep.iter_mut().zip(values) {
            *flag = *flag && predicate.op.eval(value, predicate.threshold);
        }
    }

    if !any_applied {
        return Ok(table.clone());
    }

    let rows: Vec<usize> = keep
        .iter()
        .enumerate()
        .filter(|&(_, &flag)| flag)
        .map(|(row, _)| row)
        .collect();

    Ok(table.subset(&rows))
}

/// Restrict a table to the sites picked out by a UI point selection.
///
/// The first custom data element of each selected point identifies the backing site. An absent
/// or empty selection leaves the table unchanged.
///
/// # Arguments
///
/// * `table`: The table to filter
/// * `selection`: The selection event, if any
pub fn apply_point_selection(table: &Table, selection: Option<&PointSelection>) -> Result<Table> {
    let Some(selection) = selection else {
        return Ok(table.clone());
    };
    let gids: HashSet<String> = selection.gids().into_iter().collect();
    if gids.is_empty() {
        return Ok(table.clone());
    }

    let keys = table.keys(GID_COL)?;
    let rows: Vec<usize> = keys
        .iter()
        .enumerate()
        .filter(|(_, key)| key.as_ref().is_some_and(|key| gids.contains(key)))
        .map(|(row, _)| row)
        .collect();

    Ok(table.subset(&rows))
}
