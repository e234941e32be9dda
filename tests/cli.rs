use std::fs;

use assert_cmd::Command;
use tempfile::TempDir;

#[test]
fn cli_help_smoke() {
    let mut cmd = Command::cargo_bin("phenomerge").unwrap();
    cmd.arg("--help");
    cmd.assert().success();
}

#[test]
fn merge_command_writes_output() {
    let tmp = TempDir::new().unwrap();
    let covariates = tmp.path().join("covariates.csv");
    let pcs = tmp.path().join("pcs.tsv");
    let output = tmp.path().join("merged.csv");
    fs::write(&covariates, "person_id,age,sex\n1,30,0\n2,40,1\n").unwrap();
    fs::write(&pcs, "s\tscores\n1\t[0.1,0.2]\n2\t[0.3,0.4]\n").unwrap();

    let mut cmd = Command::cargo_bin("phenomerge").unwrap();
    cmd.arg("merge")
        .arg(&covariates)
        .arg(&pcs)
        .arg("--output")
        .arg(&output)
        .arg("--stratify")
        .arg("Male");
    let assert = cmd.assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("Final merged data (1 rows, 5 columns) written to:"));

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "person_id,age,sex,PC1,PC2\n1,30,0,0.1,0.2\n"
    );
}

#[test]
fn merge_command_rejects_unknown_stratum() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.csv");
    let b = tmp.path().join("b.csv");
    fs::write(&a, "person_id,sex\n1,0\n").unwrap();
    fs::write(&b, "person_id,x\n1,1\n").unwrap();

    let mut cmd = Command::cargo_bin("phenomerge").unwrap();
    cmd.arg("merge")
        .arg(&a)
        .arg(&b)
        .arg("-o")
        .arg(tmp.path().join("out.csv"))
        .arg("--stratify")
        .arg("Both");
    cmd.assert().failure();
    assert!(!tmp.path().join("out.csv").exists());
}

#[test]
fn merge_command_needs_two_inputs() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.csv");
    fs::write(&a, "person_id,sex\n1,0\n").unwrap();

    let mut cmd = Command::cargo_bin("phenomerge").unwrap();
    cmd.arg("merge").arg(&a).arg("-o").arg(tmp.path().join("out.csv"));
    cmd.assert().failure();
}

#[test]
fn covariates_command_runs() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("demographics.csv");
    let output = tmp.path().join("covariates.csv");
    fs::write(&input, "person_id,age_at_cdr,sex_at_birth\n1,40.7,Female\n").unwrap();

    let mut cmd = Command::cargo_bin("phenomerge").unwrap();
    cmd.arg("covariates").arg("-i").arg(&input).arg("-o").arg(&output);
    cmd.assert().success();
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "person_id,age,age2,age_sex,age2_sex,sex\n1,40,1600,40,1600,1\n"
    );
}

#[test]
fn headerless_inputs_take_names_per_file() {
    let tmp = TempDir::new().unwrap();
    let covariates = tmp.path().join("sorted_covariates.csv");
    let diabetes = tmp.path().join("sorted_diabetes.tsv");
    let output = tmp.path().join("diabetes_and_covariates.csv");
    fs::write(&covariates, " 1,30,900,0,0,0\n2,40,1600,40,1600,1\n").unwrap();
    fs::write(&diabetes, "2\t1\n1 \t0\n").unwrap();

    let mut cmd = Command::cargo_bin("phenomerge").unwrap();
    cmd.arg("merge")
        .arg(&covariates)
        .arg(&diabetes)
        .arg("-o")
        .arg(&output)
        .args(["--how", "left", "--no-header"])
        .args(["--delimiter", "comma", "--delimiter", "tab"])
        .args(["--names", "person_id,age,age2,age_sex,age2_sex,sex"])
        .args(["--names", "person_id,T2Diab"])
        .args(["--columns", "person_id,T2Diab,age,age2,age_sex,age2_sex,sex"]);
    cmd.assert().success();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "person_id,T2Diab,age,age2,age_sex,age2_sex,sex\n1,0,30,900,0,0,0\n2,1,40,1600,40,1600,1\n"
    );
}

#[test]
fn mismatched_delimiter_count_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.csv");
    let b = tmp.path().join("b.csv");
    let c = tmp.path().join("c.csv");
    for path in [&a, &b, &c] {
        fs::write(path, "person_id,x\n1,1\n").unwrap();
    }

    let mut cmd = Command::cargo_bin("phenomerge").unwrap();
    cmd.arg("merge")
        .args([&a, &b, &c])
        .arg("-o")
        .arg(tmp.path().join("out.csv"))
        .args(["--delimiter", "comma", "--delimiter", "comma"]);
    cmd.assert().failure();
    assert!(!tmp.path().join("out.csv").exists());
}

#[test]
fn last_positional_is_the_output_without_flag() {
    let tmp = TempDir::new().unwrap();
    let covariates = tmp.path().join("covariates.csv");
    let phenotype = tmp.path().join("phenotype.csv");
    let output = tmp.path().join("merged.csv");
    fs::write(&covariates, "person_id,age\n1,30\n2,40\n").unwrap();
    fs::write(&phenotype, "person_id,T2Diab\n2,1\n").unwrap();

    let mut cmd = Command::cargo_bin("phenomerge").unwrap();
    cmd.arg("merge").arg(&covariates).arg(&phenotype).arg(&output);
    cmd.assert().success();
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "person_id,age,T2Diab\n2,40,1\n"
    );
}

#[test]
fn two_positionals_without_output_flag_fail() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.csv");
    let b = tmp.path().join("b.csv");
    fs::write(&a, "person_id,x\n1,1\n").unwrap();
    fs::write(&b, "person_id,y\n1,2\n").unwrap();

    let mut cmd = Command::cargo_bin("phenomerge").unwrap();
    cmd.arg("merge").arg(&a).arg(&b);
    cmd.assert().failure();
    assert_eq!(fs::read_to_string(&b).unwrap(), "person_id,y\n1,2\n");
}
