mod cookies;
mod page;
mod registry;
mod server;

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use oogiri_contracts::cookies::CookiePolicy;
use oogiri_contracts::history::{FileHistoryStore, HistoryStore, MemoryHistoryStore};
use oogiri_engine::gemini::DEFAULT_MODEL;
use oogiri_engine::{
    generate, Credentials, GeminiClient, GenerateError, GenerationRequest, SecretResolver,
    SecretStore,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::registry::SessionRegistry;
use crate::server::AppState;

#[derive(Debug, Parser)]
#[command(name = "oogiri", version, about = "Gemini image studio with per-browser history")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the studio page.
    Serve(ServeArgs),
    /// Generate one image and write it to disk.
    Generate(GenerateArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HistoryMode {
    File,
    Memory,
}

#[derive(Debug, Parser)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8501")]
    bind: SocketAddr,
    #[arg(long, default_value = "secrets.toml")]
    secrets: PathBuf,
    #[arg(long, value_enum, default_value_t = HistoryMode::File)]
    history: HistoryMode,
    /// Defaults to `oogiri_history` under the system temp dir.
    #[arg(long)]
    history_dir: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
    /// Used only when the secrets file does not configure a login.
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    password: Option<String>,
    #[arg(long, default_value_t = 2)]
    cookie_read_attempts: u32,
    #[arg(long, default_value_t = 300)]
    cookie_read_delay_ms: u64,
    #[arg(long, default_value_t = 600)]
    cookie_write_delay_ms: u64,
    /// Sessions idle this long are dropped from memory; history stays on disk.
    #[arg(long, default_value_t = 120)]
    session_idle_minutes: u64,
    #[arg(long, default_value_t = 1024)]
    max_sessions: usize,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    no_text: bool,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value = "secrets.toml")]
    secrets: PathBuf,
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("oogiri error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Serve(args) => {
            run_serve(args)?;
            Ok(0)
        }
        Command::Generate(args) => run_generate(args),
    }
}

fn run_serve(args: ServeArgs) -> Result<()> {
    let secrets = SecretResolver::new(SecretStore::load(&args.secrets));
    let fallback = match (&args.username, &args.password) {
        (Some(username), Some(password)) => Credentials::new(username, password),
        _ => None,
    };
    let credentials = secrets.resolve_credentials(fallback);
    match &credentials {
        Some(credentials) => info!(username = credentials.username(), "login required"),
        None => warn!("no credentials configured; studio is open to anyone who can reach it"),
    }
    if secrets.resolve_api_key(None).is_none() {
        warn!("no Gemini API key configured; one must be entered in the settings panel");
    }

    let store: Arc<dyn HistoryStore> = match args.history {
        HistoryMode::File => {
            let store = args
                .history_dir
                .clone()
                .map(FileHistoryStore::new)
                .unwrap_or_else(FileHistoryStore::in_temp_dir);
            info!(root = %store.root().display(), "history stored on disk");
            Arc::new(store)
        }
        HistoryMode::Memory => Arc::new(MemoryHistoryStore::new()),
    };
    let cookie_policy = CookiePolicy {
        read_attempts: args.cookie_read_attempts.max(1),
        read_delay: Duration::from_millis(args.cookie_read_delay_ms),
        write_settle: Duration::from_millis(args.cookie_write_delay_ms),
    };

    // The blocking HTTP client runs its own runtime and must be built outside ours.
    let backend = Arc::new(GeminiClient::new()?);
    let sessions = SessionRegistry::new(
        Duration::from_secs(args.session_idle_minutes.saturating_mul(60)),
        args.max_sessions,
    );
    let state = Arc::new(
        AppState::new(store, backend, secrets, credentials, cookie_policy, args.model)
            .with_sessions(sessions),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let served = runtime.block_on(server::serve(args.bind, Arc::clone(&state)));
    // The last handle to the blocking client has to go away outside the runtime.
    drop(runtime);
    drop(state);
    served
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let secrets = SecretResolver::new(SecretStore::load(&args.secrets));
    let api_key = secrets.resolve_api_key(args.api_key.as_deref());
    let client = GeminiClient::new()?;
    let request = GenerationRequest {
        prompt: args.prompt,
        no_text: args.no_text,
    };

    match generate(&client, &args.model, &request, api_key.as_deref()) {
        Ok(record) => {
            write_image(&args.out, &record.image)?;
            for text in &record.texts {
                println!("{text}");
            }
            println!("{}", args.out.display());
            Ok(0)
        }
        Err(err) => {
            report_failure(&err);
            Ok(if err.is_warning() { 2 } else { 1 })
        }
    }
}

fn write_image(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn report_failure(err: &GenerateError) {
    eprintln!("{err}");
    if let GenerateError::QuotaExhausted { detail } = err {
        if !detail.is_empty() {
            eprintln!("{detail}");
        }
    }
    if let Some(link) = err.reference_link() {
        eprintln!("See {link}");
    }
    for text in err.texts() {
        eprintln!("{text}");
    }
}
