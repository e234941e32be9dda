use std::collections::BTreeMap;

use polars::prelude::*;

use crate::error::{MergeError, Result};
use crate::types::ParticipantTable;

pub const DEFAULT_SEX_COLUMN: &str = "sex";

/// Keep rows whose `column` value (trimmed) is one of `allowed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratificationFilter {
    pub column: String,
    pub allowed: Vec<String>,
}

/// Maps stratum labels such as `Male` to the cell values that encode them.
/// Labels are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct StrataMap {
    labels: BTreeMap<String, (String, Vec<String>)>,
}

impl Default for StrataMap {
    fn default() -> Self {
        let mut map = Self {
            labels: BTreeMap::new(),
        };
        map.insert("Male", ["0", "0.0", "Male"]);
        map.insert("Female", ["1", "1.0", "Female"]);
        map
    }
}

impl StrataMap {
    /// Adds or replaces the values for `label`.
    pub fn insert<I, S>(&mut self, label: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.labels
            .insert(label.to_ascii_lowercase(), (label.to_string(), values));
    }

    pub fn labels(&self) -> Vec<&str> {
        self.labels.values().map(|(label, _)| label.as_str()).collect()
    }

    pub fn resolve(&self, label: &str, column: &str) -> Result<StratificationFilter> {
        let (_, values) = self
            .labels
            .get(&label.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                MergeError::UnsupportedStratificationValue(format!(
                    "{label} (known: {})",
                    self.labels().join(", ")
                ))
            })?;
        Ok(StratificationFilter {
            column: column.to_string(),
            allowed: values.clone(),
        })
    }
}

/// Parses `LABEL=V1,V2` as given on the command line.
pub fn parse_stratum(arg: &str) -> Result<(String, Vec<String>)> {
    let (label, values) = arg.split_once('=').ok_or_else(|| {
        MergeError::InvalidArgument(format!("stratum {arg:?} is not of the form LABEL=V1,V2"))
    })?;
    let label = label.trim();
    let values: Vec<String> = values
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if label.is_empty() || values.is_empty() {
        return Err(MergeError::InvalidArgument(format!(
            "stratum {arg:?} needs a label and at least one value"
        )));
    }
    Ok((label.to_string(), values))
}

/// Applies `filter` to `table`; `None` passes the table through untouched.
pub fn stratify(
    table: &ParticipantTable,
    filter: Option<&StratificationFilter>,
) -> Result<ParticipantTable> {
    let Some(filter) = filter else {
        return Ok(table.clone());
    };
    let column = table.df.column(&filter.column).map_err(|_| {
        MergeError::MissingColumn(format!("{} (in {})", filter.column, table.name))
    })?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    let mask: BooleanChunked = series
        .str()?
        .into_iter()
        .map(|v| v.is_some_and(|v| filter.allowed.iter().any(|a| a == v.trim())))
        .collect();
    let df = table.df.filter(&mask)?;
    Ok(ParticipantTable::new(table.name.clone(), df))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_resolve_case_insensitively() {
        let map = StrataMap::default();
        let filter = map.resolve("male", "sex").expect("male");
        assert_eq!(filter.allowed, vec!["0", "0.0", "Male"]);
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = StrataMap::default().resolve("Both", "sex").unwrap_err();
        assert!(matches!(err, MergeError::UnsupportedStratificationValue(_)));
    }

    #[test]
    fn stratum_spec_parses() {
        let (label, values) = parse_stratum("XX = 2, 2.0").expect("parse");
        assert_eq!(label, "XX");
        assert_eq!(values, vec!["2", "2.0"]);
        assert!(parse_stratum("XX").is_err());
        assert!(parse_stratum("XX=").is_err());
    }
}
