use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use polars::prelude::*;
use statrs::statistics::{Data, Median};

use crate::df_utils::{column_strings, frame_from_series, normalize_key};
use crate::error::MergeError;
use crate::io::{read_participant_table, write_table};
use crate::logging::RunLog;
use crate::qc::check_file_exists;
use crate::types::{DEFAULT_KEY, ParticipantTable, TableFormat};

/// Rescales values recorded in `unit` as `value * scale + offset` before the
/// median, e.g. mg/dL to percent.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitConversion {
    pub unit: String,
    pub scale: f64,
    pub offset: f64,
}

/// Parses `UNIT=SCALE,OFFSET`. The unit may itself contain spaces.
pub fn parse_unit_conversion(arg: &str) -> Result<UnitConversion> {
    let invalid = || {
        MergeError::InvalidArgument(format!("unit conversion {arg:?} is not UNIT=SCALE,OFFSET"))
    };
    let (unit, factors) = arg.rsplit_once('=').ok_or_else(invalid)?;
    let (scale, offset) = factors.split_once(',').ok_or_else(invalid)?;
    let scale: f64 = scale.trim().parse().map_err(|_| invalid())?;
    let offset: f64 = offset.trim().parse().map_err(|_| invalid())?;
    if unit.trim().is_empty() || !scale.is_finite() || !offset.is_finite() {
        return Err(invalid().into());
    }
    Ok(UnitConversion {
        unit: unit.trim().to_string(),
        scale,
        offset,
    })
}

#[derive(Debug, Clone)]
pub struct SummaryConfig {
    pub input: PathBuf,
    pub format: TableFormat,
    pub output: PathBuf,
    pub key: String,
    pub value_column: String,
    pub unit_column: String,
    pub exclude_units: Vec<String>,
    pub convert_units: Vec<UnitConversion>,
    /// Inclusive upper bound; larger values are treated as outliers.
    pub max_value: Option<f64>,
    pub output_delimiter: u8,
    pub log_name: Option<String>,
}

impl SummaryConfig {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self {
            input,
            format: TableFormat::with_header(),
            output,
            key: DEFAULT_KEY.to_string(),
            value_column: "value_as_number".to_string(),
            unit_column: "unit_concept_name".to_string(),
            exclude_units: Vec::new(),
            convert_units: Vec::new(),
            max_value: None,
            output_delimiter: b',',
            log_name: None,
        }
    }
}

pub fn summarize(config: &SummaryConfig) -> Result<usize> {
    check_file_exists(&config.input, "input")?;
    let mut log = match &config.log_name {
        Some(name) => RunLog::open(name, "summarize")?,
        None => RunLog::disabled(),
    };

    let table = read_participant_table(&config.input, &config.format)?;
    let rows = table.height();
    let summary = median_per_participant(table, config)?;
    log.line(&format!(
        "Summarized {rows} measurement row(s) into {} participant(s)",
        summary.height()
    ))?;

    write_table(&summary.df, &config.output, config.output_delimiter, true)?;
    log.line(&format!(
        "Median per {} written to: {}",
        config.key,
        config.output.display()
    ))?;
    Ok(summary.height())
}

/// One row per participant, in first-appearance order, holding the median of
/// the participant's usable values. Unit exclusion and conversion happen
/// before the `max_value` cut. Participants left with no usable value
/// are dropped.
pub fn median_per_participant(
    mut table: ParticipantTable,
    config: &SummaryConfig,
) -> Result<ParticipantTable> {
    normalize_key(&mut table, &config.key)?;
    let keys = column_strings(&table, &config.key)?;
    let values = column_strings(&table, &config.value_column)?;
    let units = if config.exclude_units.is_empty() && config.convert_units.is_empty() {
        vec![None; table.height()]
    } else {
        column_strings(&table, &config.unit_column)?
    };

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<f64>> = HashMap::new();
    for ((key, value), unit) in keys.into_iter().zip(values).zip(units) {
        let Some(key) = key else { continue };
        if let Some(unit) = &unit
            && config.exclude_units.iter().any(|u| u == unit)
        {
            continue;
        }
        let Some(value) = value
            .as_deref()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
        else {
            continue;
        };
        let value = match unit
            .as_deref()
            .and_then(|u| config.convert_units.iter().find(|c| c.unit == u))
        {
            Some(conversion) => value * conversion.scale + conversion.offset,
            None => value,
        };
        if config.max_value.is_some_and(|max| value > max) {
            continue;
        }
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(value);
    }

    let mut medians = Vec::with_capacity(order.len());
    for key in &order {
        let values = groups.remove(key).unwrap_or_default();
        medians.push(Data::new(values).median());
    }

    let df = frame_from_series(vec![
        Series::new(config.key.as_str().into(), order),
        Series::new(config.value_column.as_str().into(), medians),
    ])?;
    Ok(ParticipantTable::new(table.name, df))
}
