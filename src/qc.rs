use std::path::Path;

use crate::error::{MergeError, Result};

pub fn check_file_exists(path: &Path, name: &str) -> Result<()> {
    if !path.is_file() {
        return Err(MergeError::FileNotReadable {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file passed to {name} does not exist"),
            ),
        });
    }
    Ok(())
}

pub fn check_min_count(count: usize, min: usize, name: &str) -> Result<()> {
    if count < min {
        return Err(MergeError::InvalidArgument(format!(
            "{name} needs at least {min} value(s), got {count}"
        )));
    }
    Ok(())
}

pub fn check_not_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MergeError::InvalidArgument(format!(
            "{name} must not be empty"
        )));
    }
    Ok(())
}

pub fn check_positive_f64(value: f64, name: &str) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(MergeError::InvalidArgument(format!(
            "Value of {name} should be a positive finite number"
        )));
    }
    Ok(())
}

/// The output must not overwrite one of the inputs it is built from.
pub fn check_output_distinct(output: &Path, inputs: &[&Path]) -> Result<()> {
    let out = output.canonicalize().ok();
    for input in inputs {
        let same = match (&out, input.canonicalize().ok()) {
            (Some(a), Some(b)) => *a == b,
            _ => output == *input,
        };
        if same {
            return Err(MergeError::InvalidArgument(format!(
                "output {} is also an input",
                output.display()
            )));
        }
    }
    Ok(())
}
