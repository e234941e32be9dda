use std::fs;

use phenomerge::bmi::{BMI_COLUMNS, BmiConfig, build_bmi, derive_bmi, fit_line};
use phenomerge::df_utils::key_values;
use phenomerge::types::ParticipantTable;
use polars::df;
use polars::prelude::*;
use tempfile::TempDir;

fn floats(table: &ParticipantTable, column: &str) -> Vec<f64> {
    table
        .df
        .column(column)
        .expect("column")
        .as_materialized_series()
        .f64()
        .expect("f64")
        .into_no_null_iter()
        .collect()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn measurements() -> DataFrame {
    df!(
        "person_id" => ["1", "2", "3", "4", "5"],
        "weight" => [Some("80"), Some("60"), Some("100"), None, Some("70")],
        "height" => [Some("200"), Some("100"), Some("200"), Some("170"), Some("0")],
        "waist-circumference-mean" => ["90", "80", "100", "85", "88"],
        "hip-circumference-mean" => ["100", "100", "100", "100", "100"]
    )
    .expect("frame")
}

#[test]
fn bmi_and_ratio_are_derived_per_participant() {
    let config = BmiConfig::new("in.csv".into(), "out.csv".into());
    let out = derive_bmi(ParticipantTable::new("physical", measurements()), &config)
        .expect("derive");

    let mut expected = vec!["person_id".to_string()];
    expected.extend(BMI_COLUMNS.iter().map(|c| c.to_string()));
    assert_eq!(out.column_names(), expected);
    // Row 4 lacks a weight and row 5 has a zero height.
    assert_eq!(key_values(&out.df, "person_id").unwrap(), vec!["1", "2", "3"]);

    let bmi = floats(&out, "BMI");
    assert!(close(bmi[0], 20.0));
    assert!(close(bmi[1], 60.0));
    assert!(close(bmi[2], 25.0));
    let whr = floats(&out, "waist_hip_ratio");
    assert!(close(whr[0], 0.9) && close(whr[1], 0.8) && close(whr[2], 1.0));
}

#[test]
fn adjusted_ratio_is_the_regression_residual() {
    let config = BmiConfig::new("in.csv".into(), "out.csv".into());
    let out = derive_bmi(ParticipantTable::new("physical", measurements()), &config)
        .expect("derive");
    let bmi = floats(&out, "BMI");
    let whr = floats(&out, "waist_hip_ratio");
    let adjusted = floats(&out, "WHRadjBMI");

    // Least-squares residuals sum to zero and are uncorrelated with BMI.
    assert!(adjusted.iter().sum::<f64>().abs() < 1e-9);
    let mean_bmi = bmi.iter().sum::<f64>() / bmi.len() as f64;
    let cross: f64 = bmi.iter().zip(&adjusted).map(|(x, r)| (x - mean_bmi) * r).sum();
    assert!(cross.abs() < 1e-9);

    let fit = fit_line(&bmi, &whr).expect("fit");
    for ((x, y), r) in bmi.iter().zip(&whr).zip(&adjusted) {
        assert!(close(fit.residual(*x, *y), *r));
    }
}

#[test]
fn exact_line_is_recovered() {
    let fit = fit_line(&[1.0, 2.0, 3.0], &[3.0, 5.0, 7.0]).expect("fit");
    assert!(close(fit.slope, 2.0));
    assert!(close(fit.intercept, 1.0));
}

#[test]
fn constant_bmi_cannot_be_regressed() {
    assert!(fit_line(&[25.0, 25.0], &[0.8, 0.9]).is_err());
    assert!(fit_line(&[25.0], &[0.8]).is_err());
}

#[test]
fn bmi_file_is_written() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("physical_measurement.csv");
    fs::write(
        &input,
        "person_id,weight,height,waist-circumference-mean,hip-circumference-mean\n\
         1,80,200,90,100\n2,60,100,80,100\n3,,170,85,100\n",
    )
    .unwrap();
    let output = dir.path().join("bmi.csv");

    let participants = build_bmi(&BmiConfig::new(input, output.clone())).expect("build");
    assert_eq!(participants, 2);
    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("person_id,BMI,waist_hip_ratio,WHRadjBMI\n1,20.0,0.9,"));
    assert_eq!(text.lines().count(), 3);
}
