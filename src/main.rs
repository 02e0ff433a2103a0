use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};

use orchestrator_resilience::error::Classifier;
use orchestrator_resilience::escalation::{
    determine_escalation_level, suggested_actions, ConsoleNotifier, EscalationRenderer,
};
use orchestrator_resilience::handler::ErrorHandler;
use orchestrator_resilience::logging::{init_logging, LogLevel, LoggingConfig};
use orchestrator_resilience::metrics::format_metrics;
use orchestrator_resilience::retry::LoggingObserver;
use orchestrator_resilience::settings::{ConfigError, ResilienceConfig};

#[derive(Parser, Debug)]
#[command(name = "resilience")]
#[command(version)]
#[command(about = "Inspect and exercise the workflow resilience layer")]
struct Cli {
    /// Configuration file (TOML). RESILIENCE__* environment variables
    /// override it either way.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Suppress all log output except errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    verbose: u8,

    /// Disable colors (also respects NO_COLOR environment variable)
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify an error message the way the retry engine would
    Classify {
        /// The raw error message
        message: String,
    },
    /// Print the un-jittered retry delay schedule
    Schedule,
    /// Run a synthetic operation through the full error handler
    Simulate {
        /// How many times the operation fails before succeeding
        #[arg(long, default_value_t = 2)]
        fail_times: u32,

        /// Error message the operation fails with
        #[arg(long, default_value = "network timeout")]
        message: String,

        /// Override retry.initial_delay_ms
        #[arg(long)]
        initial_delay_ms: Option<u64>,

        /// Override retry.max_retries
        #[arg(long)]
        max_retries: Option<u32>,

        /// Print error metrics after the run
        #[arg(long)]
        metrics: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}

mod exit_codes {
    use std::process::ExitCode;

    /// The simulated operation failed after handling
    pub fn failed() -> ExitCode {
        ExitCode::from(1)
    }

    /// The configuration could not be loaded
    pub fn bad_config() -> ExitCode {
        ExitCode::from(2)
    }
}

fn load_config(cli: &Cli) -> Result<ResilienceConfig, ConfigError> {
    match &cli.config {
        Some(path) => ResilienceConfig::load(path),
        None => ResilienceConfig::from_env(),
    }
}

fn use_color(cli: &Cli) -> bool {
    !cli.no_color && std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal()
}

fn classify(message: &str) {
    let error = Classifier::shared().classify_message(message);
    println!("code: {}", error.code());
    println!("category: {}", error.category());
    println!("classification: {}", error.classification());
    println!("escalation: {}", determine_escalation_level(&error));
    println!("suggested actions:");
    for (index, action) in suggested_actions(&error).iter().enumerate() {
        println!("  {}. {}", index + 1, action);
    }
}

fn schedule(config: &ResilienceConfig) {
    let retry = &config.retry;
    println!(
        "max_retries={} initial_delay_ms={} max_delay_ms={} multiplier={} jitter={}",
        retry.max_retries,
        retry.initial_delay_ms,
        retry.max_delay_ms,
        retry.backoff_multiplier,
        if retry.jitter_enabled {
            format!("±{}%", retry.jitter_percent * 100.0)
        } else {
            "off".to_string()
        }
    );
    for (index, delay) in retry.delay_schedule().iter().enumerate() {
        println!("retry {}: {}ms", index + 1, delay.as_millis());
    }
}

async fn simulate(
    cli: &Cli,
    mut config: ResilienceConfig,
    fail_times: u32,
    message: String,
    initial_delay_ms: Option<u64>,
    max_retries: Option<u32>,
    show_metrics: bool,
) -> ExitCode {
    if let Some(initial) = initial_delay_ms {
        config.retry.initial_delay_ms = initial;
        config.retry.max_delay_ms = config.retry.max_delay_ms.max(initial);
    }
    if let Some(retries) = max_retries {
        config.retry.max_retries = retries;
    }

    let renderer = EscalationRenderer::new().with_color(use_color(cli));
    let handler = ErrorHandler::builder()
        .config(config)
        .retry_observer(Arc::new(LoggingObserver::with_label("simulate")))
        .notifier(Arc::new(ConsoleNotifier::new(renderer)))
        .build();

    let calls = AtomicU32::new(0);
    let result = handler
        .handle_operation(
            || {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                let message = message.clone();
                async move {
                    if call <= fail_times {
                        Err(message)
                    } else {
                        Ok(call)
                    }
                }
            },
            Some("simulate"),
        )
        .await;

    let exit = match result {
        Ok(attempts) => {
            println!(
                "succeeded after {} attempt{}",
                attempts,
                if attempts == 1 { "" } else { "s" }
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            println!(
                "failed after {} attempt{}: {} ({})",
                calls.load(Ordering::SeqCst),
                if calls.load(Ordering::SeqCst) == 1 { "" } else { "s" },
                error,
                error.code()
            );
            exit_codes::failed()
        }
    };

    if show_metrics {
        print!("{}", format_metrics(&handler.metrics().snapshot()));
    }
    exit
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(
        LoggingConfig::new()
            .with_level(LogLevel::from_flags(cli.verbose, cli.quiet))
            .with_ansi(use_color(&cli)),
    );

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return exit_codes::bad_config();
        }
    };

    match &cli.command {
        Commands::Classify { message } => {
            classify(message);
            ExitCode::SUCCESS
        }
        Commands::Schedule => {
            schedule(&config);
            ExitCode::SUCCESS
        }
        Commands::Simulate {
            fail_times,
            message,
            initial_delay_ms,
            max_retries,
            metrics,
        } => {
            simulate(
                &cli,
                config,
                *fail_times,
                message.clone(),
                *initial_delay_ms,
                *max_retries,
                *metrics,
            )
            .await
        }
        Commands::Config => match config.to_toml_string() {
            Ok(rendered) => {
                print!("{}", rendered);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {}", e);
                exit_codes::bad_config()
            }
        },
    }
}
