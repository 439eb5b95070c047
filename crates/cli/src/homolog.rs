//! `gridrecon run|resolve|validate|normalize`: config-driven homologation.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;

use gridrecon_homolog::export::{evaluated_to_csv, rows_to_csv, to_json};
use gridrecon_homolog::load::read_input;
use gridrecon_homolog::model::{HomologInput, HomologSummary};
use gridrecon_homolog::{EvaluationMonth, HomologConfig, HomologError, Normalizer};

use crate::exit_codes::{
    EXIT_ERROR, EXIT_HOMOLOG_INVALID_CONFIG, EXIT_HOMOLOG_INVALID_MONTH, EXIT_HOMOLOG_REVIEW,
    EXIT_HOMOLOG_RUNTIME, EXIT_HOMOLOG_UNMATCHED,
};
use crate::CliError;

#[derive(Subcommand)]
pub enum HomologCommands {
    /// Homologate the reference registry against both registries for one month
    #[command(after_help = "\
Examples:
  gridrecon run homolog.toml --month 2025-06
  gridrecon run homolog.toml --month 2025-06 --json
  gridrecon run homolog.toml --month 2025-06 --output result.json --csv rows.csv

Exit codes:
  0  every reference row matched with medium or high confidence
  3  some matches need review (low tier)
  4  some reference rows are unmatched in a registry")]
    Run {
        /// Path to the homologation TOML config
        config: PathBuf,

        /// Evaluation month (YYYY-MM)
        #[arg(long)]
        month: String,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write one CSV line per reference row to file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Resolve operational parameters for one month (maintenance overrides applied)
    #[command(after_help = "\
Examples:
  gridrecon resolve homolog.toml --month 2025-06
  gridrecon resolve homolog.toml --month 2025-06 --json")]
    Resolve {
        /// Path to the homologation TOML config
        config: PathBuf,

        /// Evaluation month (YYYY-MM)
        #[arg(long)]
        month: String,

        /// Output JSON to stdout instead of CSV
        #[arg(long)]
        json: bool,
    },

    /// Validate a homologation config without running
    #[command(after_help = "\
Examples:
  gridrecon validate homolog.toml")]
    Validate {
        /// Path to the homologation TOML config
        config: PathBuf,
    },

    /// Print the normalized matching key of each label
    #[command(after_help = "\
Examples:
  gridrecon normalize 'D.ALMAGRO____220' 'Diego de Almagro 220'
  gridrecon normalize 'STA.ROSA' --config homolog.toml --json")]
    Normalize {
        /// Raw station or line labels
        #[arg(required = true)]
        labels: Vec<String>,

        /// Use the abbreviation table of this config instead of the builtin one
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },
}

pub fn cmd_homolog(cmd: HomologCommands) -> Result<(), CliError> {
    match cmd {
        HomologCommands::Run { config, month, json, output, csv } => {
            cmd_run(config, &month, json, output, csv)
        }
        HomologCommands::Resolve { config, month, json } => cmd_resolve(config, &month, json),
        HomologCommands::Validate { config } => cmd_validate(config),
        HomologCommands::Normalize { labels, config, json } => cmd_normalize(labels, config, json),
    }
}

fn homolog_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError::new(code, msg)
}

/// Map an engine error onto the exit code registry.
fn engine_err(e: HomologError) -> CliError {
    let code = match &e {
        HomologError::ConfigParse(_) | HomologError::ConfigValidation(_) => {
            EXIT_HOMOLOG_INVALID_CONFIG
        }
        HomologError::InvalidMonth(_) => EXIT_HOMOLOG_INVALID_MONTH,
        HomologError::MissingColumn { .. }
        | HomologError::ValueParse { .. }
        | HomologError::MissingSource(_)
        | HomologError::Io(_) => EXIT_HOMOLOG_RUNTIME,
        HomologError::WorkerPool(_) => EXIT_ERROR,
    };
    let hint = match &e {
        HomologError::MissingColumn { source, .. } => {
            Some(format!("map the header under [sources.{source}.columns]"))
        }
        HomologError::MissingSource(source) => {
            Some(format!("add a [sources.{source}] table with a file entry"))
        }
        HomologError::InvalidMonth(_) => Some("use a month such as 2025-06".to_string()),
        _ => None,
    };
    let err = homolog_err(code, e.to_string());
    match hint {
        Some(hint) => err.with_hint(hint),
        None => err,
    }
}

fn load_config(config_path: &Path) -> Result<HomologConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        homolog_err(
            EXIT_HOMOLOG_RUNTIME,
            format!("cannot read config {}: {e}", config_path.display()),
        )
    })?;
    HomologConfig::from_toml(&config_str).map_err(engine_err)
}

/// Load the config and every source it names, resolving file paths
/// relative to the config file's directory.
fn load_all(config_path: &Path) -> Result<(HomologConfig, HomologInput), CliError> {
    let config = load_config(config_path)?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let input = read_input(&config, base_dir).map_err(engine_err)?;
    Ok((config, input))
}

fn write_file(path: &Path, contents: &str) -> Result<(), CliError> {
    std::fs::write(path, contents).map_err(|e| {
        homolog_err(EXIT_HOMOLOG_RUNTIME, format!("cannot write {}: {e}", path.display()))
    })?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn print_summary(label: &str, s: &HomologSummary) {
    eprintln!(
        "{label}: {} rows, {} matched ({} high, {} medium, {} low), {} unmatched, {} swapped, {} review, {} ties",
        s.total, s.matched, s.high, s.medium, s.low, s.unmatched, s.swapped, s.requires_review, s.exact_ties,
    );
}

fn cmd_run(
    config_path: PathBuf,
    month: &str,
    json_output: bool,
    output_file: Option<PathBuf>,
    csv_file: Option<PathBuf>,
) -> Result<(), CliError> {
    // Reject a bad month before touching any file
    EvaluationMonth::parse(month).map_err(engine_err)?;

    let (config, input) = load_all(&config_path)?;
    let result = gridrecon_homolog::run(&config, month, &input).map_err(engine_err)?;

    let json_str = to_json(&result).map_err(engine_err)?;
    if let Some(ref path) = output_file {
        write_file(path, &json_str)?;
    }
    if let Some(ref path) = csv_file {
        write_file(path, &rows_to_csv(&result.rows).map_err(engine_err)?)?;
    }
    if json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    eprintln!(
        "homologation '{}' for {}: {} reference rows, {} transformers",
        result.meta.config_name,
        result.meta.month,
        result.rows.len(),
        result.operational_summary.transformers,
    );
    print_summary("operational", &result.operational_summary);
    print_summary("specifications", &result.specifications_summary);
    let r = &result.resolve_summary;
    eprintln!(
        "resolve: {} lines evaluated, {} overridden, {} dropped",
        r.evaluated, r.overridden, r.dropped
    );
    let unparsed = result.rows.iter().filter(|row| row.parse_issue.is_some()).count();
    if unparsed > 0 {
        eprintln!("{unparsed} reference rows could not be parsed");
    }

    let op = &result.operational_summary;
    let spec = &result.specifications_summary;
    if op.unmatched > 0 || spec.unmatched > 0 {
        return Err(homolog_err(
            EXIT_HOMOLOG_UNMATCHED,
            format!(
                "{} operational and {} specifications rows unmatched",
                op.unmatched, spec.unmatched
            ),
        ));
    }
    if op.requires_review > 0 || spec.requires_review > 0 {
        return Err(homolog_err(
            EXIT_HOMOLOG_REVIEW,
            format!(
                "{} operational and {} specifications matches need review",
                op.requires_review, spec.requires_review
            ),
        ));
    }
    Ok(())
}

fn cmd_resolve(config_path: PathBuf, month: &str, json_output: bool) -> Result<(), CliError> {
    EvaluationMonth::parse(month).map_err(engine_err)?;

    let (_, input) = load_all(&config_path)?;
    let (lines, summary) = gridrecon_homolog::resolve(month, &input).map_err(engine_err)?;

    if json_output {
        let json_str = serde_json::to_string_pretty(&lines).map_err(|e| {
            homolog_err(EXIT_HOMOLOG_RUNTIME, format!("JSON serialization error: {e}"))
        })?;
        println!("{json_str}");
    } else {
        print!("{}", evaluated_to_csv(&lines).map_err(engine_err)?);
    }

    eprintln!(
        "resolve {month}: {} lines evaluated, {} overridden, {} dropped",
        summary.evaluated, summary.overridden, summary.dropped
    );
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    let s = &config.sources;
    let configured: Vec<&str> = [
        ("reference", s.reference.is_some()),
        ("operational", s.operational.is_some()),
        ("maintenance", s.maintenance.is_some()),
        ("spec_lines", s.spec_lines.is_some()),
        ("sections", s.sections.is_some()),
        ("transformers", s.transformers.is_some()),
    ]
    .into_iter()
    .filter_map(|(name, present)| present.then_some(name))
    .collect();

    if s.reference.is_none() {
        return Err(engine_err(HomologError::MissingSource("reference".into())));
    }

    let t = &config.thresholds;
    eprintln!("config '{}' is valid", config.name);
    eprintln!("  sources: {}", configured.join(", "));
    eprintln!("  thresholds: accept {} / medium {} / high {}", t.accept, t.medium, t.high);
    Ok(())
}

#[derive(Serialize)]
struct NormalizedLabel<'a> {
    label: &'a str,
    key: String,
}

fn cmd_normalize(
    labels: Vec<String>,
    config_path: Option<PathBuf>,
    json_output: bool,
) -> Result<(), CliError> {
    let config = match config_path {
        Some(path) => load_config(&path)?,
        None => HomologConfig::default(),
    };
    let normalizer = Normalizer::new(config.abbreviation_table().map_err(engine_err)?);

    let keys: Vec<NormalizedLabel> = labels
        .iter()
        .map(|label| NormalizedLabel { label, key: normalizer.normalize(label) })
        .collect();

    if json_output {
        let json_str = serde_json::to_string_pretty(&keys).map_err(|e| {
            homolog_err(EXIT_HOMOLOG_RUNTIME, format!("JSON serialization error: {e}"))
        })?;
        println!("{json_str}");
    } else {
        for k in &keys {
            println!("{}\t{}", k.label, k.key);
        }
    }
    Ok(())
}
