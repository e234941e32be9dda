use crate::error::{MergeError, Result};
use crate::types::ParticipantTable;

/// Renames the first column to `key` when it carries another name, which is
/// how score exports label their sample column (`s`, `sample`, ...).
///
/// Returns the previous name when a rename happened.
pub fn normalize_key_column(table: &mut ParticipantTable, key: &str) -> Result<Option<String>> {
    let names = table.column_names();
    let Some(first) = names.first() else {
        return Err(MergeError::MissingKeyColumn(table.name.clone()));
    };
    if first == key {
        return Ok(None);
    }
    if names.iter().skip(1).any(|name| name == key) {
        return Err(MergeError::InvalidArgument(format!(
            "cannot rename first column {first} of {} to {key}: a later column is already named {key}",
            table.name
        )));
    }
    let previous = first.clone();
    table.df.rename(&previous, key.into())?;
    Ok(Some(previous))
}

/// Parses a comma-separated list of column names, dropping blanks.
pub fn parse_column_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Keeps `order` first, in that order, followed by any remaining columns.
/// Names in `order` that the table lacks are an error.
pub fn reorder_columns(table: &ParticipantTable, order: &[String]) -> Result<ParticipantTable> {
    for name in order {
        if !table.has_column(name) {
            return Err(MergeError::MissingColumn(format!("{name} (in {})", table.name)));
        }
    }
    let mut keep: Vec<String> = order.to_vec();
    for name in table.column_names() {
        if !keep.contains(&name) {
            keep.push(name);
        }
    }
    let df = table.df.select(keep)?;
    Ok(ParticipantTable::new(table.name.clone(), df))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_list_ignores_blanks() {
        assert_eq!(
            parse_column_list(" person_id, T2Diab ,,age"),
            vec!["person_id", "T2Diab", "age"]
        );
    }
}
