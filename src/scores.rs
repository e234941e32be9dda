//! Expansion of serialized principal-component score vectors.
//!
//! PCA exports store every sample's scores in one cell such as
//! `[0.0123,-0.0456,...]`. The association tool wants one column per
//! component, so the cell is split into `PC1..PCk`.

use polars::prelude::*;

use crate::error::{MergeError, Result};
use crate::types::ParticipantTable;

pub fn pc_column_name(index: usize) -> String {
    format!("PC{}", index + 1)
}

/// Splits one `[v1,v2,...]` cell into its trimmed elements. Brackets are
/// stripped from both ends only; an empty body yields no elements.
pub fn split_score_vector(cell: &str) -> Vec<String> {
    let body = cell.trim().trim_matches(|c| c == '[' || c == ']');
    if body.trim().is_empty() {
        return Vec::new();
    }
    body.split(',').map(|v| v.trim().to_string()).collect()
}

/// Replaces `vector_column` with `PC1..PCk`. The result keeps the key column
/// followed by the PC columns and drops everything else. `k` comes from the
/// first row; every later row must match it.
///
/// A table without `vector_column` is returned unchanged.
pub fn expand_scores(
    table: &ParticipantTable,
    key: &str,
    vector_column: &str,
) -> Result<ParticipantTable> {
    if !table.has_column(vector_column) {
        return Ok(table.clone());
    }
    if !table.has_column(key) {
        return Err(MergeError::MissingKeyColumn(table.name.clone()));
    }

    let series = table
        .df
        .column(vector_column)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let cells = series.str()?;

    let mut components: Vec<Vec<String>> = Vec::new();
    let mut expected = None;
    for (row, cell) in cells.into_iter().enumerate() {
        let values = cell.map(split_score_vector).unwrap_or_default();
        let k = *expected.get_or_insert(values.len());
        if values.len() != k {
            return Err(MergeError::InconsistentVectorLength {
                table: table.name.clone(),
                row,
                expected: k,
                found: values.len(),
            });
        }
        if components.is_empty() {
            components = vec![Vec::with_capacity(cells.len()); k];
        }
        for (component, value) in components.iter_mut().zip(values) {
            component.push(value);
        }
    }

    let columns: Vec<Column> = components
        .into_iter()
        .enumerate()
        .map(|(i, values)| Series::new(pc_column_name(i).into(), values).into())
        .collect();
    let df = table.df.select([key])?.hstack(&columns)?;
    Ok(ParticipantTable::new(table.name.clone(), df))
}
