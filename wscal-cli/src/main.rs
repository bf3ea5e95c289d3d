mod commands;
mod context;
mod render;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "wscal")]
#[command(about = "View, edit and sync the events of a workspace calendar")]
struct Cli {
    /// Verbose logging (overridden by WSCAL_LOG)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List events, grouped by day
    Events {
        /// Only show this day (e.g. "tomorrow", "2025-03-20")
        #[arg(short, long)]
        date: Option<String>,

        /// Show events starting from this date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "date")]
        from: Option<String>,

        /// Show events starting until this date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "date")]
        to: Option<String>,

        /// Print events as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the next event later today
    Next,
    /// Create an event
    New {
        title: String,

        /// Start date/time (e.g. "tomorrow 3pm", "2025-03-20T15:00")
        #[arg(short, long)]
        start: String,

        /// End date/time
        #[arg(short, long, conflicts_with = "duration")]
        end: Option<String>,

        /// Length (e.g. "30m", "2h", "3days")
        #[arg(short, long)]
        duration: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// One of the supported color names (e.g. "red")
        #[arg(short, long)]
        color: Option<String>,

        #[arg(long)]
        locked: bool,
    },
    /// Edit an existing event
    Update {
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        start: Option<String>,

        #[arg(short, long)]
        end: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(short, long)]
        color: Option<String>,

        #[arg(long, conflicts_with = "unlock")]
        lock: bool,

        #[arg(long)]
        unlock: bool,
    },
    /// Delete an event here and on the provider
    Delete { id: String },
    /// Reconcile provider events into the workspace calendar
    Sync {
        /// Bypass provider caches and report how the event count moved
        #[arg(long)]
        full: bool,

        /// Show what would change without writing
        #[arg(long, conflicts_with = "full")]
        dry_run: bool,
    },
    /// Write provider events without deleting or adopting anything
    QuickSync,
    /// Push a local event to the provider
    Push { id: String },
    /// Connect the calendar provider in the browser
    Auth,
    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Commands::Events {
            date,
            from,
            to,
            json,
        } => commands::events::run(date.as_deref(), from.as_deref(), to.as_deref(), json).await,
        Commands::Next => commands::next::run().await,
        Commands::New {
            title,
            start,
            end,
            duration,
            location,
            description,
            color,
            locked,
        } => {
            commands::new::run(commands::new::NewArgs {
                title,
                start,
                end,
                duration,
                location,
                description,
                color,
                locked,
            })
            .await
        }
        Commands::Update {
            id,
            title,
            start,
            end,
            location,
            description,
            color,
            lock,
            unlock,
        } => {
            let locked = match (lock, unlock) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            commands::update::run(
                &id,
                commands::update::UpdateArgs {
                    title,
                    start,
                    end,
                    location,
                    description,
                    color,
                    locked,
                },
            )
            .await
        }
        Commands::Delete { id } => commands::delete::run(&id).await,
        Commands::Sync { full, dry_run } => {
            if dry_run {
                commands::sync::plan().await
            } else if full {
                commands::sync::full().await
            } else {
                commands::sync::run().await
            }
        }
        Commands::QuickSync => commands::sync::quick().await,
        Commands::Push { id } => commands::push::run(&id).await,
        Commands::Auth => commands::auth::run().await,
        Commands::Config => commands::config::run(),
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "wscal_core=debug,wscal_cli=debug,warn"
    } else {
        "wscal_core=warn,wscal_cli=info,warn"
    };
    let env_filter =
        EnvFilter::try_from_env("WSCAL_LOG").unwrap_or_else(|_| EnvFilter::new(default_filter));

    let terminal_layer = fmt::layer()
        .with_target(debug)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(terminal_layer)
        .init();
}
