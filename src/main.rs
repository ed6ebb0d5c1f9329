//! Purpose: `csvcache` CLI entry point and argument definitions.
//! Exports: Binary entry point (`main`) plus CLI parsing and emission helpers.
//! Role: Parse flags into `ReaderOptions`, bootstrap logging, and emit JSON on stdout.
//! Invariants: Successful output is JSON on stdout; errors are JSON on stderr.
//! Invariants: Process exit codes map from `api::to_exit_code`.
use std::ffi::OsString;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;

use csvcache::api::{
    CachedCsvReader, CharSource, CsvReader, Error, ErrorKind, MissingFieldAction,
    ParseErrorAction, ReadSource, ReaderHooks, ReaderOptions, Record, TrimmingOptions,
    to_exit_code,
};
use csvcache::notice::{Notice, notice_json, parse_error_notice};

type DynSource = Box<dyn CharSource>;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_env("CSVCACHE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(std::env::args_os().collect::<Vec<OsString>>()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::InvalidConfig)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `csvcache --help`."));
            }
        },
    };

    command_dispatch::dispatch_command(cli.command)
}

#[derive(Parser)]
#[command(
    name = "csvcache",
    version,
    about = "Stream, cache, sort, and search CSV files",
    long_about = None,
    after_help = r#"EXAMPLES
  $ csvcache headers people.csv
  $ csvcache cat people.csv --objects
  $ csvcache get people.csv 10
  $ csvcache sort people.csv --column age --desc
  $ cat people.csv | csvcache find - --column name --value ann

NOTES
  - Output is JSON; one line per record for streaming commands
  - Set CSVCACHE_LOG=debug for parser diagnostics on stderr"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Print resolved header names and the field count")]
    Headers {
        #[command(flatten)]
        read: ReadArgs,
    },
    #[command(
        about = "Stream every record as JSON",
        after_help = r#"EXAMPLES
  $ csvcache cat data.csv
  $ csvcache cat data.csv --objects --typed --options schema.json
  $ csvcache cat data.csv --on-error report 2> skipped.jsonl"#
    )]
    Cat {
        #[command(flatten)]
        read: ReadArgs,
        #[arg(long, help = "Emit objects keyed by header name instead of arrays")]
        objects: bool,
        #[arg(long, help = "Convert fields using declared column kinds")]
        typed: bool,
    },
    #[command(about = "Fetch one record by zero-based index through the cache")]
    Get {
        #[command(flatten)]
        read: ReadArgs,
        #[arg(help = "Zero-based record index")]
        index: usize,
    },
    #[command(about = "Print records ordered by one column (stable, nulls first)")]
    Sort {
        #[command(flatten)]
        read: ReadArgs,
        #[arg(long, help = "Column name or zero-based index")]
        column: String,
        #[arg(long, help = "Sort descending")]
        desc: bool,
    },
    #[command(about = "Find the first record whose column equals a value")]
    Find {
        #[command(flatten)]
        read: ReadArgs,
        #[arg(long, help = "Column name or zero-based index")]
        column: String,
        #[arg(long, help = "Exact (case-sensitive) value to match")]
        value: String,
    },
    #[command(about = "Export column metadata (name, ordinal, kind)")]
    Schema {
        #[command(flatten)]
        read: ReadArgs,
    },
    #[command(about = "Generate shell completion scripts")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version info")]
    Version,
}

#[derive(Args, Debug, Clone)]
struct ReadArgs {
    #[arg(help = "CSV file path (use - for stdin)", value_hint = ValueHint::FilePath)]
    input: String,
    #[arg(
        long,
        help = "Load reader options from a JSON file; flags override it",
        value_hint = ValueHint::FilePath
    )]
    options: Option<PathBuf>,
    #[arg(long, value_parser = parse_char, help = "Field delimiter (\\t for tab)")]
    delimiter: Option<char>,
    #[arg(long, value_parser = parse_char, help = "Quote character")]
    quote: Option<char>,
    #[arg(long, value_parser = parse_char, help = "Escape character inside quoted fields")]
    escape: Option<char>,
    #[arg(long, value_parser = parse_char, help = "Comment line prefix")]
    comment: Option<char>,
    #[arg(long, conflicts_with = "comment", help = "Disable comment lines")]
    no_comment: bool,
    #[arg(long, help = "Treat the first record as data")]
    no_headers: bool,
    #[arg(long, value_enum, help = "Whitespace trimming scope")]
    trim: Option<TrimCli>,
    #[arg(long, value_enum, help = "Action for records with too few fields")]
    missing: Option<MissingCli>,
    #[arg(long = "on-error", value_enum, help = "Action for malformed records")]
    on_error: Option<OnErrorCli>,
    #[arg(long, help = "Buffer window size in characters")]
    buffer_size: Option<usize>,
    #[arg(long, help = "Field text that reads as null")]
    null_value: Option<String>,
    #[arg(long, help = "Reject line breaks inside quoted fields")]
    no_multiline: bool,
    #[arg(long, help = "Keep empty lines as records")]
    keep_empty_lines: bool,
    #[arg(long, help = "Maximum length of a quoted field")]
    max_quoted_length: Option<usize>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum TrimCli {
    None,
    Unquoted,
    Quoted,
    All,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MissingCli {
    Error,
    Empty,
    Null,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OnErrorCli {
    Fail,
    Skip,
    Report,
}

fn parse_char(value: &str) -> Result<char, String> {
    match value {
        "\\t" | "tab" => return Ok('\t'),
        "\\r" => return Ok('\r'),
        _ => {}
    }
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("expected a single character, got `{value}`")),
    }
}

fn reader_options(args: &ReadArgs) -> Result<ReaderOptions, Error> {
    let mut options = match &args.options {
        Some(path) => load_options(path)?,
        None => ReaderOptions::default(),
    };
    if let Some(delimiter) = args.delimiter {
        options.delimiter = delimiter;
    }
    if let Some(quote) = args.quote {
        options.quote = quote;
        if args.escape.is_none() && args.options.is_none() {
            options.escape = quote;
        }
    }
    if let Some(escape) = args.escape {
        options.escape = escape;
    }
    if args.no_comment {
        options.comment = None;
    } else if let Some(comment) = args.comment {
        options.comment = Some(comment);
    }
    if args.no_headers {
        options.has_headers = false;
    }
    if let Some(trim) = args.trim {
        options.trimming = match trim {
            TrimCli::None => TrimmingOptions::None,
            TrimCli::Unquoted => TrimmingOptions::UnquotedOnly,
            TrimCli::Quoted => TrimmingOptions::QuotedOnly,
            TrimCli::All => TrimmingOptions::All,
        };
    }
    if let Some(missing) = args.missing {
        options.missing_field_action = match missing {
            MissingCli::Error => MissingFieldAction::ParseError,
            MissingCli::Empty => MissingFieldAction::ReplaceByEmpty,
            MissingCli::Null => MissingFieldAction::ReplaceByNull,
        };
    }
    if let Some(on_error) = args.on_error {
        options.default_parse_error_action = match on_error {
            OnErrorCli::Fail => ParseErrorAction::ThrowException,
            OnErrorCli::Skip => ParseErrorAction::AdvanceToNextLine,
            OnErrorCli::Report => ParseErrorAction::RaiseEvent,
        };
    }
    if let Some(size) = args.buffer_size {
        options.buffer_size = size;
    }
    if let Some(null_value) = &args.null_value {
        options.null_value = Some(null_value.clone());
    }
    if args.no_multiline {
        options.supports_multiline = false;
    }
    if args.keep_empty_lines {
        options.skip_empty_lines = false;
    }
    if let Some(max) = args.max_quoted_length {
        options.max_quoted_field_length = Some(max);
    }
    Ok(options)
}

fn load_options(path: &Path) -> Result<ReaderOptions, Error> {
    let text = fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read options file {}", path.display()))
            .with_source(err)
    })?;
    serde_json::from_str(&text).map_err(|err| {
        Error::new(ErrorKind::InvalidConfig)
            .with_message(format!("invalid options file {}", path.display()))
            .with_hint("Options files are JSON objects using snake_case field names.")
            .with_source(err)
    })
}

fn open_source(input: &str) -> Result<DynSource, Error> {
    if input == "-" {
        return Ok(Box::new(ReadSource::new(io::stdin())));
    }
    Ok(Box::new(ReadSource::open(input)?))
}

/// Builds a reader for `args`; `--on-error report` routes skipped lines to stderr notices.
fn open_reader(args: &ReadArgs, cmd: &str) -> Result<CsvReader<DynSource>, Error> {
    let options = reader_options(args)?;
    let mut hooks = ReaderHooks::new();
    if options.default_parse_error_action == ParseErrorAction::RaiseEvent {
        let cmd = cmd.to_string();
        let input = args.input.clone();
        hooks = hooks.on_parse_error(move |error, _suggested| {
            emit_notice(&parse_error_notice(&cmd, &input, error));
            ParseErrorAction::AdvanceToNextLine
        });
    }
    let source = open_source(&args.input)?;
    CsvReader::with_hooks(source, options, hooks)
}

fn open_cached(args: &ReadArgs, cmd: &str) -> Result<CachedCsvReader<DynSource>, Error> {
    let mut cache = CachedCsvReader::new(open_reader(args, cmd)?);
    cache.initialize()?;
    Ok(cache)
}

/// Header name first, then a zero-based index.
fn resolve_column(cache: &CachedCsvReader<DynSource>, column: &str) -> Result<usize, Error> {
    match cache.field_index(column) {
        Ok(index) => Ok(index),
        Err(err) => column.parse::<usize>().map_err(|_| {
            err.with_hint("Pass a header name or a zero-based column index.")
        }),
    }
}

fn record_json(record: &Record) -> Value {
    Value::Array(
        record
            .iter()
            .map(|field| field.map_or(Value::Null, |text| json!(text)))
            .collect(),
    )
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn write_json_line(out: &mut impl Write, value: &Value) -> Result<(), Error> {
    serde_json::to_writer(&mut *out, value)
        .map_err(io::Error::from)
        .and_then(|()| out.write_all(b"\n"))
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write output")
                .with_source(err)
        })
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("csvcache {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "csvcache",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn emit_notice(notice: &Notice) {
    if io::stderr().is_terminal() {
        eprintln!("notice: {} (input: {})", notice.message, notice.input);
        return;
    }
    let value = notice_json(notice);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("error: {}", error_message(err));
        if let Some(hint) = err.hint() {
            eprintln!("hint: {hint}");
        }
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    match err.message() {
        Some(message) => message.to_string(),
        None => err.kind().label().replace('_', " "),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(err.kind().label()));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(record) = err.record() {
        inner.insert("record".to_string(), json!(record));
    }
    if let Some(field) = err.field() {
        inner.insert("field".to_string(), json!(field));
    }
    if let Some(position) = err.position() {
        inner.insert("position".to_string(), json!(position));
    }
    if let Some(raw) = err.raw() {
        inner.insert("raw".to_string(), json!(raw));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
