//! Standard covariate table for the null model: age, age squared, their
//! interactions with sex, and sex itself.

use std::path::PathBuf;

use anyhow::Result;
use polars::prelude::*;

use crate::df_utils::{column_strings, frame_from_series, normalize_key};
use crate::error::MergeError;
use crate::io::{read_participant_table, write_table};
use crate::logging::RunLog;
use crate::qc::{check_file_exists, check_positive_f64};
use crate::types::{DEFAULT_KEY, ParticipantTable, TableFormat};

pub const COVARIATE_COLUMNS: [&str; 5] = ["age", "age2", "age_sex", "age2_sex", "sex"];

#[derive(Debug, Clone)]
pub struct CovariateConfig {
    pub input: PathBuf,
    pub format: TableFormat,
    pub output: PathBuf,
    pub key: String,
    pub age_column: String,
    pub sex_column: String,
    pub max_age: f64,
    /// Sex label and its numeric code. Rows with other labels are dropped.
    pub sex_codes: Vec<(String, i64)>,
    pub output_delimiter: u8,
    pub log_name: Option<String>,
}

impl CovariateConfig {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self {
            input,
            format: TableFormat::with_header(),
            output,
            key: DEFAULT_KEY.to_string(),
            age_column: "age_at_cdr".to_string(),
            sex_column: "sex_at_birth".to_string(),
            max_age: 100.0,
            sex_codes: vec![("Female".to_string(), 1), ("Male".to_string(), 0)],
            output_delimiter: b',',
            log_name: None,
        }
    }

    fn sex_code(&self, label: &str) -> Option<i64> {
        self.sex_codes
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, code)| *code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CovariateCounts {
    pub missing: usize,
    pub over_age: usize,
    pub other_sex: usize,
    pub kept: usize,
}

pub fn build_covariates(config: &CovariateConfig) -> Result<CovariateCounts> {
    check_file_exists(&config.input, "input")?;
    check_positive_f64(config.max_age, "max_age")?;
    let mut log = match &config.log_name {
        Some(name) => RunLog::open(name, "covariates")?,
        None => RunLog::disabled(),
    };

    let table = read_participant_table(&config.input, &config.format)?;
    let (out, counts) = derive_covariates(table, config)?;

    log.line(&format!(
        "{} row(s) removed for a missing or invalid {} or {}",
        counts.missing, config.age_column, config.sex_column
    ))?;
    log.line(&format!(
        "{} row(s) removed with {} above {}",
        counts.over_age, config.age_column, config.max_age
    ))?;
    log.line(&format!(
        "{} row(s) removed with an uncoded {}",
        counts.other_sex, config.sex_column
    ))?;

    write_table(&out.df, &config.output, config.output_delimiter, true)?;
    log.line(&format!(
        "Covariates for {} participants written to: {}",
        counts.kept,
        config.output.display()
    ))?;
    Ok(counts)
}

/// Filters the demographics rows and derives the covariate columns.
pub fn derive_covariates(
    mut table: ParticipantTable,
    config: &CovariateConfig,
) -> Result<(ParticipantTable, CovariateCounts)> {
    normalize_key(&mut table, &config.key)?;
    let keys = column_strings(&table, &config.key)?;
    let ages = column_strings(&table, &config.age_column)?;
    let sexes = column_strings(&table, &config.sex_column)?;

    let mut counts = CovariateCounts::default();
    let mut ids = Vec::new();
    let mut cols: [Vec<i64>; 5] = Default::default();

    for ((id, age), sex) in keys.into_iter().zip(ages).zip(sexes) {
        let age = age.as_deref().and_then(|a| a.trim().parse::<f64>().ok());
        let age = age.filter(|a| a.is_finite() && *a >= 0.0);
        let (Some(id), Some(age), Some(sex)) = (id, age, sex) else {
            counts.missing += 1;
            continue;
        };
        if age > config.max_age {
            counts.over_age += 1;
            continue;
        }
        let Some(code) = config.sex_code(sex.trim()) else {
            counts.other_sex += 1;
            continue;
        };
        let age = age.trunc() as i64;
        let terms = age
            .checked_mul(age)
            .and_then(|age2| Some([age, age2, age.checked_mul(code)?, age2.checked_mul(code)?, code]));
        let Some(terms) = terms else {
            return Err(MergeError::InvalidArgument(format!(
                "{} {age} of {id} overflows the age terms; lower max_age",
                config.age_column
            ))
            .into());
        };
        ids.push(id);
        for (col, value) in cols.iter_mut().zip(terms) {
            col.push(value);
        }
    }
    counts.kept = ids.len();

    let mut columns = vec![Series::new(config.key.as_str().into(), ids)];
    for (name, values) in COVARIATE_COLUMNS.iter().zip(cols) {
        columns.push(Series::new((*name).into(), values));
    }
    let df = frame_from_series(columns)?;
    Ok((ParticipantTable::new(table.name, df), counts))
}
