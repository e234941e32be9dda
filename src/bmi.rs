//! Body-size phenotypes from physical measurements: BMI, waist-to-hip ratio
//! and the ratio adjusted for BMI (`WHRadjBMI`), the residual of an ordinary
//! least-squares fit of the ratio on BMI.

use std::path::PathBuf;

use anyhow::Result;
use polars::prelude::*;
use statrs::statistics::Statistics;

use crate::df_utils::{column_strings, frame_from_series, normalize_key};
use crate::error::MergeError;
use crate::io::{read_participant_table, write_table};
use crate::logging::RunLog;
use crate::qc::{check_file_exists, check_min_count};
use crate::types::{DEFAULT_KEY, ParticipantTable, TableFormat};

pub const BMI_COLUMNS: [&str; 3] = ["BMI", "waist_hip_ratio", "WHRadjBMI"];

#[derive(Debug, Clone)]
pub struct BmiConfig {
    pub input: PathBuf,
    pub format: TableFormat,
    pub output: PathBuf,
    pub key: String,
    /// Kilograms.
    pub weight_column: String,
    /// Centimetres.
    pub height_column: String,
    pub waist_column: String,
    pub hip_column: String,
    pub output_delimiter: u8,
    pub log_name: Option<String>,
}

impl BmiConfig {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self {
            input,
            format: TableFormat::with_header(),
            output,
            key: DEFAULT_KEY.to_string(),
            weight_column: "weight".to_string(),
            height_column: "height".to_string(),
            waist_column: "waist-circumference-mean".to_string(),
            hip_column: "hip-circumference-mean".to_string(),
            output_delimiter: b',',
            log_name: None,
        }
    }
}

/// Least-squares line `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
}

impl LinearFit {
    pub fn residual(&self, x: f64, y: f64) -> f64 {
        y - (self.intercept + self.slope * x)
    }
}

pub fn fit_line(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    check_min_count(x.len(), 2, "regression points")?;
    let variance = x.iter().variance();
    if variance.is_nan() || variance <= 0.0 {
        return Err(MergeError::InvalidArgument(
            "BMI is constant, cannot adjust the waist-to-hip ratio for it".to_string(),
        )
        .into());
    }
    let slope = x.iter().covariance(y.iter()) / variance;
    let intercept = y.iter().mean() - slope * x.iter().mean();
    Ok(LinearFit { intercept, slope })
}

pub fn build_bmi(config: &BmiConfig) -> Result<usize> {
    check_file_exists(&config.input, "input")?;
    let mut log = match &config.log_name {
        Some(name) => RunLog::open(name, "bmi")?,
        None => RunLog::disabled(),
    };

    let table = read_participant_table(&config.input, &config.format)?;
    let rows = table.height();
    let out = derive_bmi(table, config)?;
    log.line(&format!(
        "{} of {rows} row(s) had usable weight, height, waist and hip values",
        out.height()
    ))?;

    write_table(&out.df, &config.output, config.output_delimiter, true)?;
    log.line(&format!(
        "BMI and WHRadjBMI written to: {}",
        config.output.display()
    ))?;
    Ok(out.height())
}

fn parse_number(cell: Option<String>) -> Option<f64> {
    cell.and_then(|v| v.trim().parse::<f64>().ok())
}

/// Derives BMI (weight / height in metres squared) and the waist-to-hip
/// ratio, drops rows where either is missing or not finite, then adds the
/// ratio's residual after regressing it on BMI.
pub fn derive_bmi(mut table: ParticipantTable, config: &BmiConfig) -> Result<ParticipantTable> {
    normalize_key(&mut table, &config.key)?;
    let keys = column_strings(&table, &config.key)?;
    let weights = column_strings(&table, &config.weight_column)?;
    let heights = column_strings(&table, &config.height_column)?;
    let waists = column_strings(&table, &config.waist_column)?;
    let hips = column_strings(&table, &config.hip_column)?;

    let mut ids = Vec::new();
    let mut bmi = Vec::new();
    let mut whr = Vec::new();
    let rows = keys.into_iter().zip(weights).zip(heights).zip(waists).zip(hips);
    for ((((id, weight), height), waist), hip) in rows {
        let Some(id) = id else { continue };
        let (Some(weight), Some(height), Some(waist), Some(hip)) = (
            parse_number(weight),
            parse_number(height),
            parse_number(waist),
            parse_number(hip),
        ) else {
            continue;
        };
        let height_m = height / 100.0;
        let body_mass = weight / (height_m * height_m);
        let ratio = waist / hip;
        if !body_mass.is_finite() || !ratio.is_finite() {
            continue;
        }
        ids.push(id);
        bmi.push(body_mass);
        whr.push(ratio);
    }

    let fit = fit_line(&bmi, &whr)?;
    let adjusted: Vec<f64> = bmi
        .iter()
        .zip(&whr)
        .map(|(&x, &y)| fit.residual(x, y))
        .collect();

    let df = frame_from_series(vec![
        Series::new(config.key.as_str().into(), ids),
        Series::new(BMI_COLUMNS[0].into(), bmi),
        Series::new(BMI_COLUMNS[1].into(), whr),
        Series::new(BMI_COLUMNS[2].into(), adjusted),
    ])?;
    Ok(ParticipantTable::new(table.name, df))
}
