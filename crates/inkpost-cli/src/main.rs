//! inkpost - command-line client for an inkpost blog server.
//!
//! Signs in against the blog API, keeps the bearer token in the configured
//! credential store between runs, and exposes the blog's views as commands.

mod commands;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use inkpost_core::navigation::{History, HOME_PATH};
use inkpost_core::{ApiClient, AuthService, Config, Gateway, RouteGuard, Router};

use commands::Command;

const USAGE: &str = "\
Usage: inkpost [--log-file <path>] <command> [args]

Commands:
  login [username]                 Sign in (password from INKPOST_PASSWORD or prompt)
  logout                           Sign out and forget the stored token
  whoami                           Show the current session
  profile                          Fetch your profile (requires sign in)
  posts                            List posts
  post <id>                        Show a single post
  new-post <title> <snippet> <content-file> [image]
                                   Publish a post (requires sign in)
  signup                           Create an account
  validate <challenge>             Confirm an account from its validation link
  open <path>                      Visit a path, signing in first if it is protected";

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). With `--log-file` the same
/// events are also appended to that file; the returned guard flushes it.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

/// Everything a command needs, wired once per run
pub struct App {
    pub config: Config,
    pub auth: Arc<AuthService>,
    pub gateway: Gateway,
    pub router: Router,
    pub history: Arc<History>,
}

impl App {
    fn build(config: Config, start: &str) -> Result<Self> {
        let api = ApiClient::from_config(&config)?;
        let store = config.credential_store()?;
        let history = Arc::new(History::new(start));
        let auth = Arc::new(AuthService::new(api, store, history.clone()));
        Ok(Self {
            gateway: Gateway::new(auth.clone()),
            router: Router::new(auth.clone(), RouteGuard::default()),
            auth,
            history,
            config,
        })
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let mut log_file: Option<PathBuf> = None;
    if let Some(pos) = args.iter().position(|a| a == "--log-file") {
        args.remove(pos);
        if pos >= args.len() {
            anyhow::bail!("--log-file requires a path");
        }
        log_file = Some(PathBuf::from(args.remove(pos)));
    }

    let _guard = init_tracing(log_file.as_deref())?;

    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{}\n\n{}", message, USAGE);
            return Ok(ExitCode::from(2));
        }
    };

    let config = Config::load()?;
    info!(api = %config.api_base_url, "inkpost starting");

    let mut app = App::build(config, HOME_PATH)?;
    match commands::run(&mut app, command).await {
        Ok(code) => Ok(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
