//! Merge-and-normalize utilities for participant-indexed tables feeding an
//! association-testing pipeline.

pub mod error;
pub mod logging;
pub mod types;

pub mod df_utils;
pub mod io;
pub mod qc;
pub mod schema;

pub mod bmi;
pub mod covariates;
pub mod join;
pub mod merge;
pub mod scores;
pub mod stratify;
pub mod summarize;
