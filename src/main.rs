//! scenec - parse, check and dump scene description files.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use thiserror::Error;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use scenec::config::{config_file_path, Config, SceneSource};
use scenec::errors::{ErrorKind, ParseError, Position, SourceFile};
use scenec::lexer;

#[derive(Parser)]
#[command(name = "scenec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a scene and print its syntax tree
    Parse {
        /// Scene file; resolved from the environment and config when omitted
        file: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "debug")]
        emit: Emit,
    },

    /// Parse scene files and report errors only
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the token stream of a scene
    Tokens {
        file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Rust debug dump of the tree
    Debug,
    /// JSON syntax tree
    Json,
    /// Normalized scene source
    Source,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("cannot read '{name}': {source}")]
    Read { name: String, source: std::io::Error },

    #[error("cannot serialize syntax tree: {0}")]
    Json(#[from] serde_json::Error),

    /// Diagnostics have already been printed.
    #[error("{0} scene(s) failed")]
    Failed(usize),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The config decides colors for the logger too, so it is read first
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    let color = config.color.enabled(cli.no_color);

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_ansi(color)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: could not install logger: {}", e);
    }

    let config_path = config_file_path().map(|path| path.display().to_string());
    match config_error {
        Some(e) => warn!(path = ?config_path, "ignoring config file: {}", e),
        None => debug!(path = ?config_path, ?config, "configuration"),
    }

    let result = match cli.command {
        Commands::Parse { file, emit } => run_parse(config.resolve_scene(file.as_deref()), emit, color),
        Commands::Check { files } => run_check(&files, color),
        Commands::Tokens { file } => run_tokens(config.resolve_scene(file.as_deref()), color),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Failed(count)) => {
            debug!(count, "scenes failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn read_scene(source: &SceneSource) -> Result<String, CliError> {
    debug!(scene = %source.name(), "reading scene");
    source.read().map_err(|e| CliError::Read { name: source.name(), source: e })
}

fn report(source: &SceneSource, text: &str, err: &ParseError, color: bool) {
    let file = SourceFile::new(&source.name(), text);
    eprint!("{}", file.diagnostic(err).with_color(color));
}

fn run_parse(source: SceneSource, emit: Emit, color: bool) -> Result<(), CliError> {
    let text = read_scene(&source)?;
    let program = scenec::parse(&text).map_err(|err| {
        report(&source, &text, &err, color);
        CliError::Failed(1)
    })?;

    match emit {
        Emit::Debug => println!("{:#?}", program),
        Emit::Json => println!("{}", serde_json::to_string_pretty(&program)?),
        Emit::Source => print!("{}", program),
    }
    Ok(())
}

fn run_check(files: &[PathBuf], color: bool) -> Result<(), CliError> {
    let mut failed = 0;

    for path in files {
        let source = SceneSource::File(path.clone());
        let text = match read_scene(&source) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("error: {}", e);
                failed += 1;
                continue;
            }
        };

        match scenec::parse(&text) {
            Ok(program) => info!("{}: ok, {} statements", source.name(), program.len()),
            Err(err) => {
                report(&source, &text, &err, color);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        Err(CliError::Failed(failed))
    } else {
        Ok(())
    }
}

fn run_tokens(source: SceneSource, color: bool) -> Result<(), CliError> {
    let text = read_scene(&source)?;
    let tokens = lexer::tokenize(&text).map_err(|err| {
        let offset = err.offset();
        let parse_error = ParseError::new(
            ErrorKind::Lexical(err),
            Position::from_offset(&text, offset),
            lexer::describe_at(&text, offset),
        );
        report(&source, &text, &parse_error, color);
        CliError::Failed(1)
    })?;

    for info in tokens {
        let position = Position::from_offset(&text, info.span.start);
        println!("{:>4}:{:<4} {:?}", position.line, position.column, info.token);
    }
    Ok(())
}
