use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use polars::prelude::*;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::df_utils::frame_from_series;
use crate::error::MergeError;
use crate::types::{Delimiter, ParticipantTable, TableFormat};

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| {
        MergeError::FileNotReadable {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Reads a delimited file with every column kept as a raw string. Empty
/// fields become nulls so the fill policy can see them.
pub fn read_table(path: &Path, format: &TableFormat) -> Result<DataFrame> {
    let ext = extension(path);
    if ext == "gz" || ext == "bz2" {
        let tmp = decompress_to_temp(path, &ext)?;
        return read_table_plain(tmp.path(), format);
    }
    read_table_plain(path, format)
}

/// Reads a table and labels it with the file name for diagnostics.
pub fn read_participant_table(path: &Path, format: &TableFormat) -> Result<ParticipantTable> {
    let df = read_table(path, format)?;
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("<table>")
        .to_string();
    Ok(ParticipantTable::new(name, df))
}

fn read_table_plain(path: &Path, format: &TableFormat) -> Result<DataFrame> {
    let delimiter = match format.delimiter {
        Delimiter::Auto => {
            let detected = detect_delimiter(path)?;
            debug!("{}: detected delimiter {:?}", path.display(), detected as char);
            detected
        }
        other => other.byte().unwrap_or(b','),
    };

    let df = if delimiter == b' ' {
        let file = open_file(path)?;
        read_table_whitespace(BufReader::new(file), format.has_header)?
    } else {
        // Opened up front so an unreadable path surfaces as FileNotReadable.
        drop(open_file(path)?);
        CsvReadOptions::default()
            .with_has_header(format.has_header)
            .with_infer_schema_length(Some(0))
            .with_parse_options(
                CsvParseOptions::default()
                    .with_separator(delimiter)
                    .with_missing_is_null(true),
            )
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()
            .with_context(|| format!("read {}", path.display()))?
    };

    apply_names(df, format.names.as_deref(), path)
}

fn apply_names(mut df: DataFrame, names: Option<&[String]>, path: &Path) -> Result<DataFrame> {
    let Some(names) = names else {
        return Ok(df);
    };
    if names.len() != df.width() {
        return Err(MergeError::InvalidArgument(format!(
            "{} column name(s) supplied for {} but the file has {} column(s)",
            names.len(),
            path.display(),
            df.width()
        ))
        .into());
    }
    df.set_column_names(names.iter().map(String::as_str))?;
    Ok(df)
}

fn read_table_whitespace<R: Read>(reader: R, has_header: bool) -> Result<DataFrame> {
    let mut reader = BufReader::new(reader);
    let mut first_line = String::new();
    reader.read_line(&mut first_line)?;
    if first_line.trim().is_empty() {
        return Err(anyhow::anyhow!("empty file"));
    }
    let first = split_quoted_whitespace(&first_line);
    let (headers, mut columns): (Vec<String>, Vec<Vec<Option<String>>>) = if has_header {
        (first.clone(), vec![Vec::new(); first.len()])
    } else {
        let headers = (1..=first.len()).map(|i| format!("column_{i}")).collect();
        let columns = first.into_iter().map(|v| vec![Some(v)]).collect();
        (headers, columns)
    };

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parts = split_quoted_whitespace(&line);
        for (i, col) in columns.iter_mut().enumerate() {
            col.push(parts.get(i).cloned());
        }
    }

    let series = headers
        .iter()
        .zip(columns)
        .map(|(name, values)| Series::new(name.as_str().into(), values))
        .collect();
    Ok(frame_from_series(series)?)
}

fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = open_file(path)?;
    let mut reader = BufReader::new(file);
    let mut first = String::new();
    reader.read_line(&mut first)?;
    if first.contains('\t') {
        return Ok(b'\t');
    }
    if first.contains(',') {
        return Ok(b',');
    }
    Ok(b' ')
}

fn decompress_to_temp(path: &Path, ext: &str) -> Result<NamedTempFile> {
    let file = open_file(path)?;
    let mut decoder: Box<dyn Read> = match ext {
        "gz" => Box::new(GzDecoder::new(file)),
        "bz2" => Box::new(BzDecoder::new(file)),
        _ => Box::new(file),
    };
    let mut tmp = NamedTempFile::new()?;
    std::io::copy(&mut decoder, &mut tmp).with_context(|| format!("decompress {}", path.display()))?;
    Ok(tmp)
}

fn split_quoted_whitespace(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            in_quote = !in_quote;
            continue;
        }
        if c == '\\'
            && let Some('"') = chars.peek().copied()
        {
            chars.next();
            current.push('"');
            continue;
        }
        if c.is_whitespace() && !in_quote {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Writes `df` into a temporary file next to `path` without touching `path`
/// itself. A `.gz` destination is gzip-compressed. Call [`NamedTempFile::persist`]
/// (or [`persist_all`]) to move it into place.
pub fn stage_table(df: &DataFrame, path: &Path, delimiter: u8, header: bool) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("create temporary file in {}", dir.display()))?;
    let mut df = df.clone();

    if extension(path) == "gz" {
        let encoder = GzEncoder::new(tmp.as_file_mut(), Compression::default());
        let mut writer = BufWriter::new(encoder);
        CsvWriter::new(&mut writer)
            .include_header(header)
            .with_separator(delimiter)
            .finish(&mut df)?;
        let encoder = writer.into_inner().map_err(|e| e.into_error())?;
        encoder.finish()?;
    } else {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        CsvWriter::new(&mut writer)
            .include_header(header)
            .with_separator(delimiter)
            .finish(&mut df)?;
        writer.flush()?;
    }
    Ok(tmp)
}

/// Stages only the key column, one identifier per line and no header, the
/// layout the association tool expects for its sample list.
pub fn stage_key_list(df: &DataFrame, key: &str, path: &Path) -> Result<NamedTempFile> {
    let keys = df.select([key])?;
    stage_table(&keys, path, b'\t', false)
}

/// Moves staged files into place in order. Everything is staged before the
/// first rename, so a failed write leaves none of the destinations behind.
pub fn persist_all(staged: Vec<(NamedTempFile, &Path)>) -> Result<()> {
    for (tmp, path) in staged {
        tmp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("write {}", path.display()))?;
    }
    Ok(())
}

/// Writes `df` to `path` atomically: the destination either holds the
/// complete table or is left untouched.
pub fn write_table(df: &DataFrame, path: &Path, delimiter: u8, header: bool) -> Result<()> {
    let tmp = stage_table(df, path, delimiter, header)?;
    persist_all(vec![(tmp, path)])
}
