use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};

use phenomerge::bmi::{BmiConfig, build_bmi};
use phenomerge::covariates::{CovariateConfig, build_covariates};
use phenomerge::df_utils::FillPolicy;
use phenomerge::logging::init_tracing;
use phenomerge::merge::{MergeConfig, input_formats, merge};
use phenomerge::schema::parse_column_list;
use phenomerge::stratify::{StrataMap, parse_stratum};
use phenomerge::summarize::{SummaryConfig, parse_unit_conversion, summarize};
use phenomerge::types::{Delimiter, JoinMode, TableFormat};

#[derive(Parser)]
#[command(name = "phenomerge")]
#[command(
    about = "Merge participant-indexed covariate, phenotype and PC tables",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum How {
    Inner,
    Left,
}

#[derive(Clone, Copy, ValueEnum)]
enum Sep {
    Auto,
    Comma,
    Tab,
    Space,
}

#[derive(clap::Args)]
struct InputFormatArgs {
    /// Input delimiter; `auto` looks at the header line.
    #[arg(long, value_enum, default_value = "auto")]
    delimiter: Sep,
    /// Inputs have no header row.
    #[arg(long)]
    no_header: bool,
    /// Comma-separated column names for headerless inputs.
    #[arg(long)]
    names: Option<String>,
}

/// Layout flags for `merge`, where every input can differ.
#[derive(clap::Args)]
struct MergeFormatArgs {
    /// Input delimiter. Give it once for every input or once per input, in
    /// input order.
    #[arg(long, value_enum)]
    delimiter: Vec<Sep>,
    /// Inputs have no header row.
    #[arg(long)]
    no_header: bool,
    /// Comma-separated column names, one list per input in input order. An
    /// empty list keeps that input's own names.
    #[arg(long)]
    names: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Join covariate/phenotype tables with PC scores into one table.
    Merge {
        /// Input tables, the first being the left-most table. Without
        /// `--output` the last path is the output.
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Keep only one stratum of the first table, e.g. Male or Female.
        #[arg(long)]
        stratify: Option<String>,
        #[arg(long, default_value = "person_id")]
        key: String,
        #[arg(long, value_enum, default_value = "inner")]
        how: How,
        #[arg(long, default_value = "")]
        fill: String,
        /// Per-column fill value, COLUMN=VALUE.
        #[arg(long = "fill-column")]
        fill_column: Vec<String>,
        #[arg(long)]
        no_expand_scores: bool,
        #[arg(long, default_value = "scores")]
        scores_column: String,
        #[arg(long, default_value = "sex")]
        sex_column: String,
        /// Extra stratum definition, LABEL=V1,V2.
        #[arg(long)]
        stratum: Vec<String>,
        #[arg(long)]
        stratify_after_join: bool,
        #[command(flatten)]
        format: MergeFormatArgs,
        /// Output column order; unlisted columns follow.
        #[arg(long)]
        columns: Option<String>,
        #[arg(long, value_enum, default_value = "comma")]
        output_delimiter: Sep,
        /// Also write the merged participant IDs, one per line.
        #[arg(long)]
        sample_ids: Option<PathBuf>,
        #[arg(long)]
        fail_on_empty: bool,
        #[arg(long)]
        log_name: Option<String>,
    },
    /// Derive age/sex covariates from a demographics table.
    Covariates {
        #[arg(long, short, required = true)]
        input: PathBuf,
        #[arg(long, short, required = true)]
        output: PathBuf,
        #[arg(long, default_value = "person_id")]
        key: String,
        #[arg(long, default_value = "age_at_cdr")]
        age_column: String,
        #[arg(long, default_value = "sex_at_birth")]
        sex_column: String,
        #[arg(long, default_value_t = 100.0)]
        max_age: f64,
        #[command(flatten)]
        format: InputFormatArgs,
        #[arg(long, value_enum, default_value = "comma")]
        output_delimiter: Sep,
        #[arg(long)]
        log_name: Option<String>,
    },
    /// BMI, waist-to-hip ratio and WHRadjBMI from physical measurements.
    Bmi {
        #[arg(long, short, required = true)]
        input: PathBuf,
        #[arg(long, short, required = true)]
        output: PathBuf,
        #[arg(long, default_value = "person_id")]
        key: String,
        /// Weight in kilograms.
        #[arg(long, default_value = "weight")]
        weight_column: String,
        /// Height in centimetres.
        #[arg(long, default_value = "height")]
        height_column: String,
        #[arg(long, default_value = "waist-circumference-mean")]
        waist_column: String,
        #[arg(long, default_value = "hip-circumference-mean")]
        hip_column: String,
        #[command(flatten)]
        format: InputFormatArgs,
        #[arg(long, value_enum, default_value = "comma")]
        output_delimiter: Sep,
        #[arg(long)]
        log_name: Option<String>,
    },
    /// Median of a measurement per participant.
    Summarize {
        #[arg(long, short, required = true)]
        input: PathBuf,
        #[arg(long, short, required = true)]
        output: PathBuf,
        #[arg(long, default_value = "person_id")]
        key: String,
        #[arg(long, default_value = "value_as_number")]
        value_column: String,
        #[arg(long, default_value = "unit_concept_name")]
        unit_column: String,
        #[arg(long)]
        exclude_unit: Vec<String>,
        /// Rescale values in a unit before the median, UNIT=SCALE,OFFSET
        /// giving `value * SCALE + OFFSET`.
        #[arg(long)]
        convert_unit: Vec<String>,
        #[arg(long)]
        max_value: Option<f64>,
        #[command(flatten)]
        format: InputFormatArgs,
        #[arg(long, value_enum, default_value = "comma")]
        output_delimiter: Sep,
        #[arg(long)]
        log_name: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Merge {
            paths,
            output,
            stratify,
            key,
            how,
            fill,
            fill_column,
            no_expand_scores,
            scores_column,
            sex_column,
            stratum,
            stratify_after_join,
            format,
            columns,
            output_delimiter,
            sample_ids,
            fail_on_empty,
            log_name,
        } => {
            let (inputs, output) = split_output(paths, output)?;
            let names: Vec<Vec<String>> = format.names.iter().map(|n| parse_column_list(n)).collect();
            let delimiters: Vec<Delimiter> = format.delimiter.iter().copied().map(delimiter).collect();
            let formats = input_formats(inputs.len(), &delimiters, !format.no_header, &names)?;
            let mut config = MergeConfig::new(inputs, output);
            for (input, format) in config.inputs.iter_mut().zip(formats) {
                input.format = format;
            }
            config.key = key;
            config.how = match how {
                How::Inner => JoinMode::Inner,
                How::Left => JoinMode::Left,
            };
            config.fill = FillPolicy {
                default: fill,
                per_column: parse_fill_columns(&fill_column)?,
            };
            config.expand_scores = !no_expand_scores;
            config.scores_column = scores_column;
            config.stratify = stratify;
            config.sex_column = sex_column;
            config.strata = strata_map(&stratum)?;
            config.stratify_after_join = stratify_after_join;
            config.columns = columns.as_deref().map(parse_column_list);
            config.output_delimiter = output_byte(output_delimiter)?;
            config.sample_ids = sample_ids;
            config.fail_on_empty = fail_on_empty;
            config.log_name = log_name;

            let summary = merge(&config)?;
            println!(
                "Final merged data ({} rows, {} columns) written to: {}",
                summary.rows,
                summary.columns.len(),
                summary.output.display()
            );
        }
        Command::Covariates {
            input,
            output,
            key,
            age_column,
            sex_column,
            max_age,
            format,
            output_delimiter,
            log_name,
        } => {
            let mut config = CovariateConfig::new(input, output);
            config.format = table_format(&format);
            config.key = key;
            config.age_column = age_column;
            config.sex_column = sex_column;
            config.max_age = max_age;
            config.output_delimiter = output_byte(output_delimiter)?;
            config.log_name = log_name;

            let counts = build_covariates(&config)?;
            println!(
                "Covariates for {} participants written to: {}",
                counts.kept,
                config.output.display()
            );
        }
        Command::Bmi {
            input,
            output,
            key,
            weight_column,
            height_column,
            waist_column,
            hip_column,
            format,
            output_delimiter,
            log_name,
        } => {
            let mut config = BmiConfig::new(input, output);
            config.format = table_format(&format);
            config.key = key;
            config.weight_column = weight_column;
            config.height_column = height_column;
            config.waist_column = waist_column;
            config.hip_column = hip_column;
            config.output_delimiter = output_byte(output_delimiter)?;
            config.log_name = log_name;

            let participants = build_bmi(&config)?;
            println!(
                "BMI for {participants} participants written to: {}",
                config.output.display()
            );
        }
        Command::Summarize {
            input,
            output,
            key,
            value_column,
            unit_column,
            exclude_unit,
            convert_unit,
            max_value,
            format,
            output_delimiter,
            log_name,
        } => {
            let mut config = SummaryConfig::new(input, output);
            config.format = table_format(&format);
            config.key = key;
            config.value_column = value_column;
            config.unit_column = unit_column;
            config.exclude_units = exclude_unit;
            config.convert_units = convert_unit
                .iter()
                .map(|arg| parse_unit_conversion(arg))
                .collect::<anyhow::Result<_>>()?;
            config.max_value = max_value;
            config.output_delimiter = output_byte(output_delimiter)?;
            config.log_name = log_name;

            let participants = summarize(&config)?;
            println!(
                "Median for {participants} participants written to: {}",
                config.output.display()
            );
        }
    }

    Ok(())
}

fn delimiter(sep: Sep) -> Delimiter {
    match sep {
        Sep::Auto => Delimiter::Auto,
        Sep::Comma => Delimiter::Comma,
        Sep::Tab => Delimiter::Tab,
        Sep::Space => Delimiter::Space,
    }
}

fn split_output(
    mut paths: Vec<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<(Vec<PathBuf>, PathBuf)> {
    if let Some(output) = output {
        return Ok((paths, output));
    }
    if paths.len() < 3 {
        bail!("merge needs at least two inputs followed by the output path (or --output)");
    }
    let output = paths.pop().context("output path")?;
    Ok((paths, output))
}

fn output_byte(sep: Sep) -> anyhow::Result<u8> {
    match delimiter(sep).byte() {
        Some(byte) => Ok(byte),
        None => bail!("output delimiter cannot be auto"),
    }
}

fn table_format(args: &InputFormatArgs) -> TableFormat {
    TableFormat {
        delimiter: delimiter(args.delimiter),
        has_header: !args.no_header,
        names: args.names.as_deref().map(parse_column_list),
    }
}

fn parse_fill_columns(args: &[String]) -> anyhow::Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    for arg in args {
        let (column, value) = arg
            .split_once('=')
            .with_context(|| format!("--fill-column {arg:?} is not COLUMN=VALUE"))?;
        out.insert(column.trim().to_string(), value.to_string());
    }
    Ok(out)
}

fn strata_map(args: &[String]) -> anyhow::Result<StrataMap> {
    let mut map = StrataMap::default();
    for arg in args {
        let (label, values) = parse_stratum(arg)?;
        map.insert(&label, values);
    }
    Ok(map)
}
