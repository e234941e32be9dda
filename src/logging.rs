use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// `<name>_<task>.log`, with path separators removed and long names cut to
/// 100 characters.
fn log_file_name(log_name: &str, task: &str) -> String {
    let mut name = log_name.replace('/', "");
    if name.chars().count() > 200 {
        name = name.chars().take(100).collect();
    }
    if name.is_empty() {
        name = task.to_string();
    }
    format!("{name}_{task}.log")
}

/// Progress sink for one pipeline run. Lines always go to `tracing`; when a
/// log file was requested they are mirrored there as well.
#[derive(Debug, Default)]
pub struct RunLog {
    file: Option<File>,
}

impl RunLog {
    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn open(log_name: &str, task: &str) -> Result<Self> {
        let path = log_file_name(log_name, task);
        let file = File::create(Path::new(&path)).with_context(|| format!("create {path}"))?;
        Ok(Self { file: Some(file) })
    }

    pub fn line(&mut self, message: &str) -> Result<()> {
        info!("{message}");
        if let Some(file) = self.file.as_mut() {
            writeln!(file, "{message}")?;
        }
        Ok(())
    }

    pub fn warn(&mut self, message: &str) -> Result<()> {
        warn!("{message}");
        if let Some(file) = self.file.as_mut() {
            writeln!(file, "WARNING: {message}")?;
        }
        Ok(())
    }
}
