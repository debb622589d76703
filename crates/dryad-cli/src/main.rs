use clap::Parser;
use dryad_cli::{generate, init_tracing, serve, GenerateArgs, LogLevel, ServeArgs};

/// Dryad: a small single-user LLM completion server
#[derive(Parser)]
#[command(name = "dryad", version)]
struct Cli {
    /// Log verbosity.
    #[arg(long, value_enum, global = true, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Serve the OpenAI-compatible HTTP API.
    Serve(ServeArgs),
    /// Generate text for one prompt and print it.
    Generate(GenerateArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let result = match cli.command {
        Command::Serve(args) => serve(&args).await,
        Command::Generate(args) => generate(&args).map(|completion| {
            println!("{}", completion.text());
        }),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
