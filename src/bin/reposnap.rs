//! Reposnap CLI - bounded source tree snapshots for LLM review.

use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use reposnap::chat::OllamaClient;
use reposnap::config::Config;
use reposnap::errors::{exit_code, SnapError};
use reposnap::logging::{self, LogOptions};
use reposnap::review::{run_roots, ChatReviewer, RepoOutcome};
use reposnap::tokens::{count_tokens_with_encoding, Encoding};
use reposnap::walker::Collector;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "reposnap")]
#[command(about = "Bounded, filtered source tree snapshots for LLM review")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Increase log verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct LimitArgs {
    /// Directories at this depth or deeper are not descended into
    #[arg(long)]
    max_depth: Option<usize>,

    /// Skip files with more lines than this
    #[arg(long)]
    max_lines: Option<usize>,

    /// Skip files larger than this many bytes
    #[arg(long)]
    max_bytes: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect one repository and print its snapshot
    Snapshot {
        /// Repository root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Print the snapshot as a JSON object of path to content
        #[arg(long)]
        json: bool,

        /// Token encoding for the summary
        #[arg(long, default_value = "cl100k")]
        encoding: EncodingArg,

        #[command(flatten)]
        limits: LimitArgs,
    },

    /// Send a snapshot of every repository under each root to the chat model
    Review {
        /// Directories whose sub-directories are repositories
        #[arg(default_value = "../")]
        roots: Vec<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Chat model name
        #[arg(long)]
        model: Option<String>,

        /// Chat server base URL
        #[arg(long)]
        host: Option<String>,

        #[command(flatten)]
        limits: LimitArgs,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, ValueEnum)]
enum EncodingArg {
    Cl100k,
    O200k,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Cl100k => Encoding::Cl100kBase,
            EncodingArg::O200k => Encoding::O200kBase,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let json_output = json_flag(&cli.command);

    let log_options = LogOptions {
        file: cli.log_file.clone(),
        verbosity: cli.verbose,
    };

    let result = logging::init(&log_options)
        .map_err(SnapError::from)
        .and_then(|()| run(cli));

    if let Err(e) = result {
        if json_output {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
            }

            let payload = ErrorOutput {
                error: e.to_string(),
            };

            let json = serde_json::to_string(&payload)
                .unwrap_or_else(|_| "{\"error\":\"serialization failed\"}".to_string());
            eprintln!("{json}");
        } else {
            eprintln!("error: {e}");
        }
        std::process::exit(exit_code(&e));
    }
}

fn json_flag(cmd: &Commands) -> bool {
    match cmd {
        Commands::Snapshot { json, .. } => *json,
        Commands::Review { json, .. } => *json,
        Commands::Completions { .. } => false,
    }
}

fn run(cli: Cli) -> Result<(), SnapError> {
    if let Commands::Completions { shell } = cli.command {
        generate(shell, &mut Cli::command(), "reposnap", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Snapshot {
            path,
            json,
            encoding,
            limits,
        } => {
            apply_limits(&mut config, &limits);
            run_snapshot(&config, path, json, encoding.into())
        }
        Commands::Review {
            roots,
            json,
            model,
            host,
            limits,
        } => {
            apply_limits(&mut config, &limits);
            if let Some(model) = model {
                config.chat.model = model;
            }
            if let Some(host) = host {
                config.chat.host = host;
            }
            run_review(&config, roots, json)
        }
        Commands::Completions { .. } => Ok(()),
    }
}

fn apply_limits(config: &mut Config, args: &LimitArgs) {
    if let Some(depth) = args.max_depth {
        config.limits.max_depth = depth;
    }
    if let Some(lines) = args.max_lines {
        config.limits.max_lines = lines;
    }
    if let Some(bytes) = args.max_bytes {
        config.limits.max_bytes = bytes;
    }
}

// --- Snapshot command ---

fn run_snapshot(config: &Config, path: PathBuf, json: bool, encoding: Encoding) -> Result<(), SnapError> {
    if !path.exists() {
        return Err(SnapError::PathNotFound(path));
    }

    let collection = Collector::from_config(config).collect(&path)?;
    let snapshot = &collection.snapshot;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if json {
        writeln!(out, "{}", snapshot.to_json()?)?;
    } else {
        for (file, content) in snapshot.iter() {
            writeln!(
                out,
                "{} ({} lines, {} bytes)",
                file,
                content.lines().count(),
                content.len()
            )?;
        }
        let tokens: usize = snapshot
            .iter()
            .map(|(_, content)| count_tokens_with_encoding(content, encoding))
            .sum();
        writeln!(
            out,
            "{} files, {} skipped, {} bytes, ~{} tokens ({})",
            snapshot.len(),
            collection.skipped.len(),
            snapshot.total_bytes(),
            tokens,
            encoding
        )?;
    }

    out.flush()?;
    Ok(())
}

// --- Review command ---

#[derive(Serialize)]
struct ReviewOutput {
    repository: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&RepoOutcome> for ReviewOutput {
    fn from(outcome: &RepoOutcome) -> Self {
        let (response, error) = match &outcome.result {
            Ok(text) => (Some(text.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            repository: outcome.repository.clone(),
            response,
            error,
        }
    }
}

fn run_review(config: &Config, roots: Vec<PathBuf>, json: bool) -> Result<(), SnapError> {
    let client = OllamaClient::new(&config.chat)?;
    tracing::info!(model = client.model(), host = %config.chat.host, "starting review");

    let collector = Collector::from_config(config);
    let mut reviewer = ChatReviewer::new(client, config.instruction.clone());

    let outcomes = run_roots(&roots, &collector, &mut reviewer, |outcome| {
        if json {
            return;
        }
        match &outcome.result {
            Ok(text) => println!("Response for {}:\n {}", outcome.repository, text),
            Err(e) => eprintln!("error: {}: {}", outcome.repository, e),
        }
    });

    if json {
        let output: Vec<ReviewOutput> = outcomes.iter().map(ReviewOutput::from).collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    Ok(())
}
