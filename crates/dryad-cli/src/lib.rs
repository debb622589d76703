//! # dryad-cli
//!
//! Command-line wiring for dryad: argument types, tracing setup, and the
//! one-shot `generate` path. The binary in `main.rs` only dispatches.
//!
//! No model loader ships with dryad, so both subcommands drive the
//! deterministic [`MockBackend`], which replays `--reply`.

use std::net::{SocketAddr, ToSocketAddrs};

use dryad_runtime::{
    Completion, GenerationFailure, GenerationLimits, GenerationSession, MockBackend,
    TracingTelemetry,
};
use dryad_sampling::{SamplingError, SamplingParams, SamplingPipeline};
use dryad_server::ServerConfig;

/// Errors surfaced to the terminal.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid sampling parameters: {0}")]
    Sampling(#[from] SamplingError),
    #[error(transparent)]
    Generation(#[from] GenerationFailure),
    #[error("cannot resolve {host}:{port}")]
    Address { host: String, port: u16 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Install the fmt subscriber. Logs go to stderr so `generate` output stays clean.
pub fn init_tracing(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(level))
        .with_writer(std::io::stderr)
        .init();
}

/// Flags shared by both subcommands for the demo backend.
#[derive(Debug, Clone, clap::Args)]
pub struct BackendArgs {
    /// Context length in tokens.
    #[arg(short = 'c', long, default_value_t = 2048)]
    pub context_length: usize,

    /// Text the demo backend replays.
    #[arg(long, default_value = dryad_runtime::mock::DEFAULT_REPLY)]
    pub reply: String,
}

impl BackendArgs {
    pub fn backend(&self) -> MockBackend {
        MockBackend::new(self.context_length).with_reply(&self.reply)
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short, long, default_value_t = 8000)]
    pub port: u16,

    /// Model name reported by the API.
    #[arg(long, default_value = "dryad-mock")]
    pub model_name: String,

    /// Default maximum tokens per completion.
    #[arg(long, default_value_t = 256)]
    pub max_tokens: usize,

    /// Default sampling temperature.
    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    /// Do not mount the OpenAI-compatible `/v1` routes.
    #[arg(long)]
    pub no_openai: bool,

    #[command(flatten)]
    pub backend: BackendArgs,
}

impl ServeArgs {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            model_name: self.model_name.clone(),
            max_tokens: self.max_tokens,
            default_temperature: self.temperature,
            host: self.host.clone(),
            port: self.port,
            serve_openai: !self.no_openai,
            ..ServerConfig::default()
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, CliError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| CliError::Address {
                host: self.host.clone(),
                port: self.port,
            })
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct GenerateArgs {
    /// Input prompt text.
    #[arg(short = 'P', long)]
    pub prompt: String,

    /// Maximum number of tokens to generate.
    #[arg(short, long, default_value_t = 64)]
    pub max_tokens: usize,

    /// Random seed for reproducible sampling.
    #[arg(short, long, default_value_t = 42)]
    pub seed: u64,

    /// Sampling temperature (0 = greedy).
    #[arg(short, long, default_value_t = 1.0)]
    pub temperature: f32,

    #[arg(long)]
    pub top_k: Option<usize>,

    #[arg(long)]
    pub top_p: Option<f32>,

    #[command(flatten)]
    pub backend: BackendArgs,
}

impl GenerateArgs {
    pub fn sampling_params(&self) -> SamplingParams {
        SamplingParams {
            temperature: Some(self.temperature),
            top_k: self.top_k,
            top_p: self.top_p,
            seed: Some(self.seed),
            ..SamplingParams::default()
        }
    }
}

/// Run one prompt through a fresh session against the demo backend.
pub fn generate(args: &GenerateArgs) -> Result<Completion, CliError> {
    let pipeline = SamplingPipeline::from_params(&args.sampling_params())?;
    let mut backend = args.backend.backend();
    let mut session = GenerationSession::new(pipeline, GenerationLimits::new(args.max_tokens))
        .with_telemetry(std::sync::Arc::new(TracingTelemetry));
    Ok(session.start(&mut backend, &args.prompt)?)
}

/// Serve the HTTP API until the process is stopped.
pub async fn serve(args: &ServeArgs) -> Result<(), CliError> {
    let addr = args.socket_addr()?;
    let state = dryad_server::AppState::new(args.backend.backend(), args.server_config());
    tracing::info!(%addr, model = %args.model_name, "starting dryad");
    dryad_server::run_server(state, addr)
        .await
        .map_err(|e| CliError::Server(e.to_string()))
}
