//! Basket CLI - Drive a persisted cart from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the active cart
//! basket show
//!
//! # Add two units of a product
//! basket add P1 -q 2
//!
//! # Decrement a line
//! basket qty local-0b9f... -1
//!
//! # Sign in and merge the anonymous cart
//! basket login
//! ```
//!
//! # Commands
//!
//! - `show` - Print the active cart
//! - `add`, `remove`, `qty`, `variant` - Mutate the active cart
//! - `sync` - Refresh the signed-in cart from the backend
//! - `login`, `logout` - Flip the session flag

#![cfg_attr(not(test), forbid(unsafe_code))]

use basket_cart::CartConfig;
use basket_cart::config::LogFormat;
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{App, CliError};

#[derive(Parser)]
#[command(name = "basket")]
#[command(author, version, about = "Basket cart CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the active cart
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a product to the cart
    Add {
        /// Product ID
        product_id: String,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Variant (size, color, ...)
        #[arg(short, long)]
        variant: Option<String>,
    },
    /// Remove a line
    Remove {
        /// Line ID
        line_id: String,
    },
    /// Change a line's quantity by a signed delta
    Qty {
        /// Line ID
        line_id: String,

        /// Change to apply (e.g. 2 or -1)
        #[arg(allow_negative_numbers = true)]
        delta: i64,
    },
    /// Change a line's variant (signed in only)
    Variant {
        /// Line ID
        line_id: String,

        /// New variant
        variant: String,
    },
    /// Refresh the signed-in cart from the backend
    Sync,
    /// Sign in and merge the anonymous cart
    Login,
    /// Sign out and discard the signed-in cart
    Logout,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Warnings become Sentry events; info and debug become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "basket_cart=info,basket_cli=info".into());

    let fmt_layer = match format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt().with_writer(std::io::stderr).init();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing(config.log_format);

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartConfig) -> Result<(), CliError> {
    let app = App::open(config).await?;

    match cli.command {
        Commands::Show { json } => commands::cart::show(&app, json),
        Commands::Add {
            product_id,
            quantity,
            variant,
        } => commands::cart::add(&app, &product_id, quantity, variant).await?,
        Commands::Remove { line_id } => commands::cart::remove(&app, &line_id).await?,
        Commands::Qty { line_id, delta } => {
            commands::cart::quantity(&app, &line_id, delta).await?;
        }
        Commands::Variant { line_id, variant } => {
            commands::cart::variant(&app, &line_id, variant).await?;
        }
        Commands::Sync => commands::cart::sync(&app).await,
        Commands::Login => commands::session::login(&app).await?,
        Commands::Logout => commands::session::logout(&app).await?,
    }
    Ok(())
}
