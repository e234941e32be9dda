use polars::prelude::*;

use crate::error::{MergeError, Result};
use crate::types::{JoinMode, ParticipantTable};

const ROW_ORDER: &str = "__phenomerge_row";

impl From<JoinMode> for JoinType {
    fn from(mode: JoinMode) -> Self {
        match mode {
            JoinMode::Inner => JoinType::Inner,
            JoinMode::Left => JoinType::Left,
        }
    }
}

/// Joins two tables on `key`. The result keeps the left table's row order;
/// rows multiplied by duplicate keys stay next to each other. Right-table
/// columns that collide with left-table names get the `_right` suffix.
///
/// Left-join cells without a match are null; run the fill policy afterwards.
pub fn join_tables(
    left: &ParticipantTable,
    right: &ParticipantTable,
    key: &str,
    mode: JoinMode,
) -> Result<ParticipantTable> {
    if !left.has_column(key) {
        return Err(MergeError::MissingKeyColumn(left.name.clone()));
    }
    if !right.has_column(key) {
        return Err(MergeError::MissingKeyColumn(right.name.clone()));
    }

    let indexed = left.df.with_row_index(ROW_ORDER.into(), None)?;
    let joined = indexed.join(
        &right.df,
        [key],
        [key],
        JoinType::from(mode).into(),
        None,
    )?;
    let ordered = joined
        .sort([ROW_ORDER], SortMultipleOptions::default().with_maintain_order(true))?
        .drop(ROW_ORDER)?;

    Ok(ParticipantTable::new(
        format!("{}+{}", left.name, right.name),
        ordered,
    ))
}

/// Folds `tables` left to right with the same key and mode.
pub fn join_all(tables: &[ParticipantTable], key: &str, mode: JoinMode) -> Result<ParticipantTable> {
    let (first, rest) = tables
        .split_first()
        .ok_or_else(|| MergeError::InvalidArgument("no tables to join".to_string()))?;
    let mut merged = first.clone();
    for table in rest {
        merged = join_tables(&merged, table, key, mode)?;
    }
    Ok(merged)
}
