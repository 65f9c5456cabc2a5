// histfilter CLI: filter a JSON array of records with an expression

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{builder::ValueHint, Parser};
use histfilter::{EngineConfig, FilterEngine, ParserError, Value};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter JSON records with a filter expression
#[derive(Parser, Debug)]
#[command(name = "histfilter", version, about)]
struct Cli {
    /// Filter expression, e.g. `x == 2 && name =* 'a*'`
    expression: String,

    /// JSON file holding an array of records (stdin when omitted)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Engine configuration as a JSON file
    #[arg(short, long, env = "HISTFILTER_CONFIG", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Maximum expression nesting depth
    #[arg(long, env = "HISTFILTER_MAX_DEPTH")]
    max_depth: Option<usize>,

    /// Pretty-print the output
    #[arg(short, long)]
    pretty: bool,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(kept) => {
            info!(kept, "done");
            ExitCode::SUCCESS
        }
        Err(e) => match e.downcast_ref::<ParserError>() {
            Some(syntax) => {
                eprintln!("histfilter: syntax error: {}", syntax);
                ExitCode::from(2)
            }
            None => {
                error!("{:#}", e);
                eprintln!("histfilter: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

/// Returns the number of records written.
fn run(cli: &Cli) -> Result<usize> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_json_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if let Some(max_depth) = cli.max_depth {
        config = config.with_max_depth(max_depth);
    }
    config.validate()?;
    debug!(?config, "engine configuration");

    let engine = FilterEngine::with_config(config);
    // Reject bad expressions before reading any input
    let compiled = engine.compile(&cli.expression)?;

    let records = read_records(cli.input.as_ref())?;
    let kept = compiled.filter(&records);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.pretty {
        serde_json::to_writer_pretty(&mut out, &kept)?;
    } else {
        serde_json::to_writer(&mut out, &kept)?;
    }
    writeln!(out)?;
    Ok(kept.len())
}

fn read_records(input: Option<&PathBuf>) -> Result<Vec<Value>> {
    let text = match input {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        }
    };

    let Value::List(records) = Value::from_json_str(&text).context("parsing input JSON")? else {
        bail!("input must be a JSON array of records");
    };
    debug!(records = records.len(), "loaded records");
    Ok(Arc::try_unwrap(records).unwrap_or_else(|shared| shared.as_ref().clone()))
}
