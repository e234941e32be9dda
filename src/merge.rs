use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::df_utils::{FillPolicy, duplicate_key_rows, fill_missing, normalize_key};
use crate::error::MergeError;
use crate::io::{persist_all, read_participant_table, stage_key_list, stage_table};
use crate::join::join_tables;
use crate::logging::RunLog;
use crate::qc::{check_file_exists, check_min_count, check_not_empty, check_output_distinct};
use crate::schema::{normalize_key_column, reorder_columns};
use crate::scores::expand_scores;
use crate::stratify::{DEFAULT_SEX_COLUMN, StrataMap, StratificationFilter, stratify};
use crate::types::{
    DEFAULT_KEY, DEFAULT_SCORES_COLUMN, Delimiter, JoinMode, ParticipantTable, TableFormat,
};

#[derive(Debug, Clone)]
pub struct MergeInput {
    pub path: PathBuf,
    pub format: TableFormat,
}

#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// The first input is the left-most table; its row order is kept.
    pub inputs: Vec<MergeInput>,
    pub output: PathBuf,
    pub key: String,
    pub how: JoinMode,
    pub fill: FillPolicy,
    pub expand_scores: bool,
    pub scores_column: String,
    pub stratify: Option<String>,
    pub sex_column: String,
    pub strata: StrataMap,
    pub stratify_after_join: bool,
    pub columns: Option<Vec<String>>,
    pub output_delimiter: u8,
    pub sample_ids: Option<PathBuf>,
    pub fail_on_empty: bool,
    pub log_name: Option<String>,
}

impl MergeConfig {
    pub fn new(inputs: Vec<PathBuf>, output: PathBuf) -> Self {
        Self {
            inputs: inputs
                .into_iter()
                .map(|path| MergeInput {
                    path,
                    format: TableFormat::with_header(),
                })
                .collect(),
            output,
            key: DEFAULT_KEY.to_string(),
            how: JoinMode::Inner,
            fill: FillPolicy::default(),
            expand_scores: true,
            scores_column: DEFAULT_SCORES_COLUMN.to_string(),
            stratify: None,
            sex_column: DEFAULT_SEX_COLUMN.to_string(),
            strata: StrataMap::default(),
            stratify_after_join: false,
            columns: None,
            output_delimiter: b',',
            sample_ids: None,
            fail_on_empty: false,
            log_name: None,
        }
    }

    fn stratification_filter(&self) -> Result<Option<StratificationFilter>> {
        match &self.stratify {
            Some(label) => Ok(Some(self.strata.resolve(label, &self.sex_column)?)),
            None => Ok(None),
        }
    }
}

/// Per-input layouts from repeated command-line values. One delimiter
/// applies to every input, otherwise there must be one per input. Name lists
/// match inputs by position and may stop early; an empty list keeps the
/// file's own names.
pub fn input_formats(
    count: usize,
    delimiters: &[Delimiter],
    has_header: bool,
    names: &[Vec<String>],
) -> Result<Vec<TableFormat>> {
    if delimiters.len() > 1 && delimiters.len() != count {
        return Err(MergeError::InvalidArgument(format!(
            "{} delimiters given for {count} inputs; give one, or one per input",
            delimiters.len()
        ))
        .into());
    }
    if names.len() > count {
        return Err(MergeError::InvalidArgument(format!(
            "{} name lists given for {count} inputs",
            names.len()
        ))
        .into());
    }
    let formats = (0..count)
        .map(|i| TableFormat {
            delimiter: match delimiters {
                [] => Delimiter::Auto,
                [one] => *one,
                many => many[i],
            },
            has_header,
            names: names.get(i).filter(|n| !n.is_empty()).cloned(),
        })
        .collect();
    Ok(formats)
}

#[derive(Debug, Clone)]
pub struct MergeSummary {
    pub output: PathBuf,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Reads every input, merges them and writes the result. Nothing is written
/// unless every step succeeds.
pub fn merge(config: &MergeConfig) -> Result<MergeSummary> {
    check_min_count(config.inputs.len(), 2, "inputs")?;
    check_not_empty(&config.key, "key")?;
    let input_paths: Vec<&Path> = config.inputs.iter().map(|i| i.path.as_path()).collect();
    for path in &input_paths {
        check_file_exists(path, "inputs")?;
    }
    check_output_distinct(&config.output, &input_paths)?;
    // Resolved before any file is read so a bad label fails fast.
    config.stratification_filter()?;

    let mut log = match &config.log_name {
        Some(name) => RunLog::open(name, "merge")?,
        None => RunLog::disabled(),
    };
    log.line(&format!(
        "Merging {} tables on {} ({} join)",
        config.inputs.len(),
        config.key,
        config.how.as_str()
    ))?;

    let mut tables = Vec::with_capacity(config.inputs.len());
    for input in &config.inputs {
        let table = read_participant_table(&input.path, &input.format)
            .with_context(|| format!("load {}", input.path.display()))?;
        log.line(&format!(
            "Loaded {}: {} rows, {} columns",
            input.path.display(),
            table.height(),
            table.df.width()
        ))?;
        tables.push(table);
    }

    let merged = merge_tables(tables, config, &mut log)?;

    let mut staged = Vec::with_capacity(2);
    if let Some(path) = &config.sample_ids {
        staged.push((stage_key_list(&merged.df, &config.key, path)?, path.as_path()));
    }
    staged.push((
        stage_table(&merged.df, &config.output, config.output_delimiter, true)?,
        config.output.as_path(),
    ));
    persist_all(staged)?;
    if let Some(path) = &config.sample_ids {
        log.line(&format!("Sample IDs written to: {}", path.display()))?;
    }
    log.line(&format!(
        "Final merged data written to: {}",
        config.output.display()
    ))?;

    Ok(MergeSummary {
        output: config.output.clone(),
        rows: merged.height(),
        columns: merged.column_names(),
    })
}

/// The in-memory part of [`merge`]: normalize, expand, stratify, join, fill.
pub fn merge_tables(
    tables: Vec<ParticipantTable>,
    config: &MergeConfig,
    log: &mut RunLog,
) -> Result<ParticipantTable> {
    let key = config.key.as_str();
    let filter = config.stratification_filter()?;

    let mut prepared = Vec::with_capacity(tables.len());
    for mut table in tables {
        if !table.has_column(key)
            && let Some(previous) = normalize_key_column(&mut table, key)?
        {
            log.line(&format!(
                "Renaming first column of {} ({previous}) to {key}",
                table.name
            ))?;
        }

        if !table.has_column(&config.scores_column) {
            debug!("{} has no {} column; nothing to expand", table.name, config.scores_column);
        } else if config.expand_scores {
            table = expand_scores(&table, key, &config.scores_column)?;
            log.line(&format!(
                "Expanded {} of {} into {} PC column(s)",
                config.scores_column,
                table.name,
                table.df.width().saturating_sub(1)
            ))?;
        }

        normalize_key(&mut table, key)?;

        let duplicates = duplicate_key_rows(&table.df, key)?;
        if duplicates > 0 {
            log.warn(&format!(
                "{duplicates} row(s) of {} share a {key} with another row; joins will multiply them",
                table.name
            ))?;
        }
        prepared.push(table);
    }

    if !config.stratify_after_join
        && let Some(filter) = &filter
        && let Some(first) = prepared.first_mut()
    {
        *first = apply_filter(first, filter, log)?;
    }

    let mut iter = prepared.into_iter();
    let mut merged = iter
        .next()
        .ok_or_else(|| MergeError::InvalidArgument("no tables to merge".to_string()))?;
    for table in iter {
        let before = merged.height();
        merged = join_tables(&merged, &table, key, config.how)?;
        log.line(&format!(
            "Joined {}: {} -> {} rows",
            table.name,
            before,
            merged.height()
        ))?;
    }

    if config.stratify_after_join
        && let Some(filter) = &filter
    {
        merged = apply_filter(&merged, filter, log)?;
    }

    if merged.height() == 0 {
        let err = MergeError::EmptyJoinResult(format!(
            "no {key} values survived the {} join",
            config.how.as_str()
        ));
        if config.fail_on_empty {
            return Err(err.into());
        }
        log.warn(&err.to_string())?;
    }

    merged.df = fill_missing(merged.df, key, &config.fill)?;

    if let Some(order) = &config.columns {
        merged = reorder_columns(&merged, order)?;
    }
    Ok(merged)
}

fn apply_filter(
    table: &ParticipantTable,
    filter: &StratificationFilter,
    log: &mut RunLog,
) -> Result<ParticipantTable> {
    let before = table.height();
    let filtered = stratify(table, Some(filter))?;
    log.line(&format!(
        "Stratified {} on {} in {:?}: {} -> {} rows",
        table.name,
        filter.column,
        filter.allowed,
        before,
        filtered.height()
    ))?;
    Ok(filtered)
}
