//! xmlfmt - format XML files in place through the lemminx language server.
//!
//! One server session is shared across the whole batch; files are
//! processed sequentially. Exit codes follow the pre-commit-hook
//! convention: 0 when nothing changed, 1 when at least one file was
//! rewritten, 2 on any error.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use xmlfmt_lsp::{LspSession, Settings, format_file};

#[derive(Parser, Debug)]
#[command(version, about = "Format XML files with the lemminx language server")]
struct Args {
    /// JSON settings file; forwarded to the server as initializationOptions
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// XML files to format in place
    #[arg(required = true, value_name = "FILES")]
    files: Vec<PathBuf>,
}

fn init_tracing() {
    // RUST_LOG controls verbosity; default to warnings only. Logs go to
    // stderr so they never mix with anything scripting the exit code.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args).await {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(1),
        Err(e) => {
            eprintln!("xmlfmt: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<bool> {
    let settings = Settings::load(args.settings.as_deref())?;
    let format_options = settings.format_options();

    let session = LspSession::spawn(settings.initialization_options())
        .await
        .context("starting formatting server session")?;

    // A formatting failure aborts the batch: a broken session cannot
    // safely continue. Files already rewritten stay rewritten.
    let mut changed = false;
    let mut failure = None;
    for file in &args.files {
        match format_file(&session, file, &format_options).await {
            Ok(true) => {
                tracing::info!("reformatted {}", file.display());
                changed = true;
            }
            Ok(false) => {
                tracing::debug!("unchanged {}", file.display());
            }
            Err(e) => {
                failure = Some(e.context(format!("formatting {}", file.display())));
                break;
            }
        }
    }

    session.close().await;

    match failure {
        Some(e) => Err(e),
        None => Ok(changed),
    }
}
