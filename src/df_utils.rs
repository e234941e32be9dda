use std::borrow::Cow;
use std::collections::HashMap;

use polars::prelude::*;

use crate::error::{MergeError, Result};
use crate::types::ParticipantTable;

fn string_column(df: &DataFrame, name: &str) -> Result<Series> {
    let column = df
        .column(name)
        .map_err(|_| MergeError::MissingColumn(name.to_string()))?;
    let series = column.as_materialized_series();
    if series.dtype() == &DataType::String {
        Ok(series.clone())
    } else {
        Ok(series.cast(&DataType::String)?)
    }
}

fn trim_series(series: &Series) -> Result<Series> {
    let utf8 = series.str()?;
    let trimmed = utf8
        .apply(|v| v.map(|s| Cow::Owned(s.trim().to_string())))
        .into_series();
    Ok(trimmed)
}

/// Trims leading and trailing whitespace from every key value so that
/// incidental padding cannot break exact-match joins.
pub fn normalize_key(table: &mut ParticipantTable, key: &str) -> Result<()> {
    if !table.has_column(key) {
        return Err(MergeError::MissingKeyColumn(table.name.clone()));
    }
    let series = string_column(&table.df, key)?;
    let mut trimmed = trim_series(&series)?;
    trimmed.rename(key.into());
    table.df.with_column(trimmed)?;
    Ok(())
}

/// Per-column defaults for cells a join left empty.
#[derive(Debug, Clone, Default)]
pub struct FillPolicy {
    pub default: String,
    pub per_column: HashMap<String, String>,
}

impl FillPolicy {
    pub fn value_for(&self, column: &str) -> &str {
        self.per_column
            .get(column)
            .map(String::as_str)
            .unwrap_or(&self.default)
    }
}

/// Replaces nulls in every non-key column with the policy's default for
/// that column. Applying it twice gives the same table as applying it once.
pub fn fill_missing(df: DataFrame, key: &str, policy: &FillPolicy) -> Result<DataFrame> {
    let mut df = df;
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for name in names {
        if name == key {
            continue;
        }
        let already_string = df.column(&name)?.dtype() == &DataType::String;
        let series = string_column(&df, &name)?;
        if already_string && series.null_count() == 0 {
            continue;
        }
        let fill = policy.value_for(&name);
        let mut filled = series
            .str()?
            .apply(|v| Some(v.map(Cow::Borrowed).unwrap_or_else(|| Cow::Owned(fill.to_string()))))
            .into_series();
        filled.rename(name.as_str().into());
        df.with_column(filled)?;
    }
    Ok(df)
}

/// Number of rows whose key value occurs more than once.
pub fn duplicate_key_rows(df: &DataFrame, key: &str) -> Result<usize> {
    let series = string_column(df, key)?;
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in series.str()?.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }
    Ok(counts.values().filter(|&&n| n > 1).sum())
}

/// Distinct non-null key values, in first-appearance order.
pub fn key_values(df: &DataFrame, key: &str) -> Result<Vec<String>> {
    let series = string_column(df, key)?;
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for value in series.str()?.into_iter().flatten() {
        if seen.insert(value) {
            out.push(value.to_string());
        }
    }
    Ok(out)
}

/// Builds a frame from equal-length series, in order.
pub fn frame_from_series(series: Vec<Series>) -> Result<DataFrame> {
    let mut iter = series.into_iter();
    let Some(first) = iter.next() else {
        return Ok(DataFrame::empty());
    };
    let rest: Vec<Column> = iter.map(Column::from).collect();
    Ok(first.into_frame().hstack(&rest)?)
}

/// Cells of `name` as owned strings, nulls kept as `None`.
pub fn column_strings(table: &ParticipantTable, name: &str) -> Result<Vec<Option<String>>> {
    if !table.has_column(name) {
        return Err(MergeError::MissingColumn(format!("{name} (in {})", table.name)));
    }
    let series = string_column(&table.df, name)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}
