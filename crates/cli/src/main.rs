// gridrelay CLI - apply relay commands to a spreadsheet, locally or by polling

mod exit_codes;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

use gridrelay_client::{RelayContext, TickOutcome};
use gridrelay_config::{RelayConfig, SessionStore};
use gridrelay_core::{format_column, CellAddress, RangeAddress};
use gridrelay_engine::{Interpreter, Workbook};
use gridrelay_protocol::{CommandResult, CommandsResponse, SheetDocument};

use exit_codes::{
    EXIT_SUCCESS, EXIT_ERROR, EXIT_USAGE, EXIT_APPLY_FAILED,
    EXIT_IO, EXIT_PARSE,
    EXIT_RELAY_CLIENT, EXIT_RELAY_UNAVAILABLE,
    EXIT_SESSION_STORE,
};

#[derive(Parser)]
#[command(name = "gridrelay")]
#[command(about = "Apply spreadsheet edit commands from a relay backend")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Debug logging (overrides RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the backend for this session's commands and apply them
    #[command(after_help = "\
Examples:
  gridrelay run
  gridrelay run --base-url http://127.0.0.1:8000 --interval-ms 500
  gridrelay run --once --template --out model.json")]
    Run {
        /// Backend base URL (repeat for fallbacks, tried in order)
        #[arg(long = "base-url")]
        base_urls: Vec<String>,

        /// Poll interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many seconds (default: run until killed)
        #[arg(long, conflicts_with = "once")]
        duration_secs: Option<u64>,

        /// Seed the grid from the backend template before polling
        #[arg(long)]
        template: bool,

        /// Post each batch's results back to the backend
        #[arg(long)]
        report: bool,

        /// Poll exactly once, then exit
        #[arg(long)]
        once: bool,

        /// Write the final workbook (template JSON) here; needs --once or
        /// --duration-secs
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Apply a JSON file of commands to a local workbook
    #[command(after_help = "\
Examples:
  gridrelay apply batch.json
  gridrelay apply batch.json --workbook model.json --mapping mapping.json --out model.json")]
    Apply {
        /// JSON array of commands, or {\"commands\": [...]}
        commands: PathBuf,

        /// Starting workbook (template JSON); default is one empty sheet
        #[arg(long)]
        workbook: Option<PathBuf>,

        /// Key mapping rows, or {\"mapping\": [...]}
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Write the resulting workbook (template JSON) here
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print the persisted session id
    Session {
        /// Discard the saved id and generate a new one
        #[arg(long)]
        reset: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert an A1 reference or range to zero-based indices, or a column
    /// index to letters
    #[command(after_help = "\
Examples:
  gridrelay a1 C12      # row 11, col 2
  gridrelay a1 B2:A1    # rows 0..=1, cols 0..=1
  gridrelay a1 27       # AB")]
    A1 {
        reference: String,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GRIDRELAY_COMMIT"), ")",
        "\nbuild:   ", env!("GRIDRELAY_TARGET"),
        "\nwire:    /spreadsheet/commands, /mapping, /get-template, /results",
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { base_urls, interval_ms, duration_secs, template, report, once, out } => {
            cmd_run(base_urls, interval_ms, duration_secs, template, report, once, out)
        }
        Commands::Apply { commands, workbook, mapping, out } => cmd_apply(commands, workbook, mapping, out),
        Commands::Session { reset, json } => cmd_session(reset, json),
        Commands::A1 { reference } => cmd_a1(&reference),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: bool) {
    let env = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(env);
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp_millis().init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(EXIT_PARSE, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// run
// ============================================================================

fn cmd_run(
    base_urls: Vec<String>,
    interval_ms: Option<u64>,
    duration_secs: Option<u64>,
    template: bool,
    report: bool,
    once: bool,
    out: Option<PathBuf>,
) -> Result<(), CliError> {
    let mut config = RelayConfig::load();
    if !base_urls.is_empty() {
        config.base_urls = base_urls;
    }
    if let Some(ms) = interval_ms {
        config.poll_interval_ms = ms;
    }
    config.load_template |= template;
    config.report_results |= report;
    let config = config.normalized();

    if out.is_some() && !once && duration_secs.is_none() {
        return Err(CliError::args("--out needs --once or --duration-secs")
            .with_hint("without either, run polls until killed and never writes the workbook"));
    }

    if config.base_urls.is_empty() {
        return Err(CliError::args("no backend URL configured")
            .with_hint("pass --base-url or set GRIDRELAY_BASE_URL"));
    }

    let mut ctx = RelayContext::new(config, SessionStore::default(), Workbook::new())
        .map_err(|e| CliError::new(EXIT_RELAY_CLIENT, e.to_string()))?;

    ctx.initialize();
    eprintln!("session: {}", ctx.session_id());

    let mut result = Ok(());
    if once {
        match ctx.poll_once() {
            TickOutcome::Unavailable => {
                result = Err(CliError::new(EXIT_RELAY_UNAVAILABLE, "no backend answered")
                    .with_hint(format!("tried: {}", ctx.client().base_urls().join(", "))));
            }
            TickOutcome::Applied { count, failed } if failed > 0 => {
                result = Err(CliError::new(
                    EXIT_APPLY_FAILED,
                    format!("{} of {} command(s) failed", failed, count),
                ));
            }
            _ => {}
        }
    } else {
        ctx.start();
        match duration_secs {
            Some(secs) => thread::sleep(Duration::from_secs(secs)),
            None => loop {
                thread::park();
            },
        }
        ctx.stop();
    }

    let stats = ctx.stats();
    eprintln!(
        "{} tick(s), {} command(s) applied, {} failed, {} unavailable",
        stats.ticks, stats.commands, stats.failed, stats.unavailable
    );

    if let Some(out) = out {
        let interpreter = ctx.interpreter();
        let guard = interpreter.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        write_workbook(guard.host(), &out)?;
    }

    result
}

// ============================================================================
// apply
// ============================================================================

fn cmd_apply(
    commands_path: PathBuf,
    workbook_path: Option<PathBuf>,
    mapping_path: Option<PathBuf>,
    out: Option<PathBuf>,
) -> Result<(), CliError> {
    let commands = parse_commands(&read_file(&commands_path)?)
        .map_err(|e| CliError::parse(format!("{}: {}", commands_path.display(), e)))?;

    let workbook = match &workbook_path {
        Some(path) => {
            let doc: SheetDocument = serde_json::from_str(&read_file(path)?)
                .map_err(|e| CliError::parse(format!("{}: {}", path.display(), e)))?;
            Workbook::from_template(&doc.into_sheets())
        }
        None => Workbook::new(),
    };

    let mut interpreter = Interpreter::new(workbook);
    if let Some(path) = &mapping_path {
        let raw: Value = serde_json::from_str(&read_file(path)?)
            .map_err(|e| CliError::parse(format!("{}: {}", path.display(), e)))?;
        if !interpreter.load_key_map(&mapping_rows(raw)) {
            return Err(CliError::parse(format!("{}: expected an array of mapping rows", path.display())));
        }
    }

    let results = interpreter.apply_commands(&commands);
    let json = serde_json::to_string_pretty(&results)
        .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
    println!("{}", json);

    if let Some(out) = out {
        write_workbook(interpreter.host(), &out)?;
    }

    let failed = count_failed(&results);
    if failed > 0 {
        return Err(CliError::new(
            EXIT_APPLY_FAILED,
            format!("{} of {} command(s) failed", failed, results.len()),
        ));
    }
    Ok(())
}

/// A bare array, or an object with a `commands` array.
fn parse_commands(text: &str) -> Result<Vec<Value>, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(_) => serde_json::from_value::<CommandsResponse>(value)
            .map(|r| r.commands)
            .map_err(|e| e.to_string()),
        _ => Err("expected a JSON array of commands".to_string()),
    }
}

/// Unwrap a `{"mapping": [...]}` response body; anything else passes through.
fn mapping_rows(raw: Value) -> Value {
    match raw {
        Value::Object(mut obj) if obj.contains_key("mapping") => obj.remove("mapping").unwrap_or(Value::Null),
        other => other,
    }
}

fn count_failed(results: &[CommandResult]) -> usize {
    results.iter().filter(|r| !r.ok).count()
}

// ============================================================================
// session
// ============================================================================

fn cmd_session(reset: bool, json: bool) -> Result<(), CliError> {
    let store = SessionStore::default();
    let session_id = if reset {
        store.reset().map_err(|e| {
            CliError::new(EXIT_SESSION_STORE, format!("cannot write {}: {}", store.path().display(), e))
        })?
    } else {
        store.get_or_create()
    };

    if json {
        let out = serde_json::json!({
            "session_id": session_id,
            "path": store.path().display().to_string(),
        });
        println!("{}", out);
    } else {
        println!("{}", session_id);
    }
    Ok(())
}

// ============================================================================
// a1
// ============================================================================

fn cmd_a1(reference: &str) -> Result<(), CliError> {
    println!("{}", describe_reference(reference)?);
    Ok(())
}

fn describe_reference(reference: &str) -> Result<String, CliError> {
    let text = reference.trim();
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        let index: usize = text
            .parse()
            .map_err(|_| CliError::args(format!("column index out of range: {}", text)))?;
        return Ok(format_column(index));
    }
    if text.contains(':') {
        let range: RangeAddress = text.parse().map_err(|e| CliError::args(format!("{}", e)))?;
        return Ok(format!(
            "{}  rows {}..={}  cols {}..={}",
            range, range.start_row, range.end_row, range.start_col, range.end_col
        ));
    }
    let cell: CellAddress = text
        .parse()
        .map_err(|e| CliError::args(format!("{}", e)).with_hint("expected e.g. C12, A1:B2 or 27"))?;
    Ok(format!("{}  row {}  col {}", cell, cell.row, cell.col))
}

// ============================================================================
// helpers
// ============================================================================

fn read_file(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|e| CliError::io(format!("cannot read {}: {}", path.display(), e)))
}

fn write_workbook(workbook: &Workbook, path: &Path) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(&workbook.to_template())
        .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
    fs::write(path, json).map_err(|e| CliError::io(format!("cannot write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_commands_array_and_wrapped() {
        let bare = parse_commands(r#"[{"type": "set_value", "a1": "A1", "value": 1}]"#).unwrap();
        assert_eq!(bare.len(), 1);

        let wrapped = parse_commands(r#"{"commands": [{"type": "merge", "range": "A1:B1"}]}"#).unwrap();
        assert_eq!(wrapped[0]["type"], "merge");

        // Same leniency as the poll loop: a non-array `commands` is empty.
        assert!(parse_commands(r#"{"commands": 5}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_commands_rejects_scalars() {
        assert!(parse_commands("42").is_err());
        assert!(parse_commands("not json").is_err());
    }

    #[test]
    fn test_mapping_rows_unwraps_response() {
        let rows = mapping_rows(json!({"success": true, "mapping": [{"key": "k", "cell": "A1"}]}));
        assert!(rows.is_array());

        let bare = mapping_rows(json!([{"key": "k", "cell": "A1"}]));
        assert_eq!(bare[0]["cell"], "A1");
    }

    #[test]
    fn test_describe_reference() {
        assert_eq!(describe_reference("C12").unwrap(), "C12  row 11  col 2");
        assert_eq!(describe_reference(" c12 ").unwrap(), "C12  row 11  col 2");
        assert_eq!(describe_reference("B2:A1").unwrap(), "A1:B2  rows 0..=1  cols 0..=1");
        assert_eq!(describe_reference("0").unwrap(), "A");
        assert_eq!(describe_reference("27").unwrap(), "AB");
    }

    #[test]
    fn test_describe_reference_errors() {
        let err = describe_reference("12C").unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
        assert!(err.message.contains("12C"));
        assert!(describe_reference("A1:").is_err());
    }

    #[test]
    fn test_count_failed() {
        let results = vec![CommandResult::ok(), CommandResult::failure("x"), CommandResult::with_changes(2)];
        assert_eq!(count_failed(&results), 1);
    }
}
