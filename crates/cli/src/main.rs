//! `widgetdash`: command-line front end for the personal data dashboard.

mod commands;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::TryRecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use widgetdash_client::{ClientConfig, Dashboard, GatewayClient, SessionEvent, SessionStore};
use widgetdash_core::routing::{self, RouteDecision, DASHBOARD_PATH, LOGIN_PATH};
use widgetdash_core::types::DbId;

use commands::{CliError, Context};

#[derive(Parser)]
#[command(name = "widgetdash")]
#[command(version)]
#[command(about = "Personal data dashboard client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        /// Defaults to the password
        #[arg(long)]
        password_confirmation: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List widgets available to add, grouped by data source
    Catalog,
    /// Load the dashboard and print every visible widget
    Show,
    /// Add a catalog widget to the dashboard
    Add {
        widget_id: DbId,
        #[arg(long)]
        position: Option<i32>,
    },
    /// Remove a widget from the dashboard
    Remove { id: DbId },
    /// Fetch fresh data for one widget, or all visible widgets
    Refresh { id: Option<DbId> },
    /// Move the given widgets to the front, in order
    Move {
        #[arg(required = true)]
        ids: Vec<DbId>,
    },
    /// Change widget settings, e.g. `set 4 country=Japan`
    Set {
        id: DbId,
        #[arg(required = true, value_name = "KEY=VALUE")]
        assignments: Vec<String>,
    },
    /// Hide a widget without removing it
    Hide { id: DbId },
    /// Show a hidden widget again
    Unhide { id: DbId },
}

impl Commands {
    /// The page this command stands in for, checked by the route guard.
    fn route(&self) -> Option<&'static str> {
        match self {
            Commands::Login { .. } => Some("/login"),
            Commands::Register { .. } => Some("/register"),
            Commands::Logout => None,
            Commands::Whoami => Some("/profile"),
            _ => Some(DASHBOARD_PATH),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "widgetdash=info,widgetdash_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // --- Configuration ---
    let config = ClientConfig::from_env();
    tracing::debug!(
        api_url = %config.api_url,
        session_file = %config.session_file.display(),
        "Loaded client configuration"
    );

    let session = SessionStore::open_file(&config.session_file);
    let gateway = match GatewayClient::new(&config, session.clone()) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut events = gateway.subscribe();

    if let Some(path) = cli.command.route() {
        if let Err(e) = check_route(path, &session) {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    }

    let dashboard = Arc::new(Dashboard::new(gateway.clone()).with_stale_after(config.stale_after()));
    let ctx = Context { gateway, dashboard };

    let is_logout = matches!(cli.command, Commands::Logout);
    let result = run(cli.command, &ctx).await;

    let forced_logout = drain_forced_logout(&mut events).filter(|_| !is_logout);
    if let Some(redirect_to) = forced_logout {
        eprintln!(
            "Session expired. Run `widgetdash {}` to sign in again.",
            redirect_to.trim_start_matches('/')
        );
        return ExitCode::FAILURE;
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, ctx: &Context) -> Result<(), CliError> {
    match command {
        Commands::Login { email, password } => commands::login(ctx, &email, &password).await,
        Commands::Register {
            name,
            email,
            password,
            password_confirmation,
        } => {
            let confirmation = password_confirmation.unwrap_or_else(|| password.clone());
            commands::register(ctx, &name, &email, &password, &confirmation).await
        }
        Commands::Logout => commands::logout(ctx).await,
        Commands::Whoami => commands::whoami(ctx).await,
        Commands::Catalog => commands::catalog(ctx).await,
        Commands::Show => commands::show(ctx).await,
        Commands::Add {
            widget_id,
            position,
        } => commands::add(ctx, widget_id, position).await,
        Commands::Remove { id } => commands::remove(ctx, id).await,
        Commands::Refresh { id } => commands::refresh(ctx, id).await,
        Commands::Move { ids } => commands::move_widgets(ctx, &ids).await,
        Commands::Set { id, assignments } => commands::set(ctx, id, &assignments).await,
        Commands::Hide { id } => commands::set_visible(ctx, id, false).await,
        Commands::Unhide { id } => commands::set_visible(ctx, id, true).await,
    }
}

fn check_route(path: &str, session: &SessionStore) -> Result<(), CliError> {
    match routing::guard(path, session.has_credential()) {
        RouteDecision::Allow => Ok(()),
        RouteDecision::Redirect(LOGIN_PATH) => Err(CliError::Usage(
            "Not logged in. Run `widgetdash login` first.".to_string(),
        )),
        RouteDecision::Redirect(_) => {
            let who = session.user().map(|u| u.email).unwrap_or_default();
            Err(CliError::Usage(format!(
                "Already logged in as {who}. Run `widgetdash logout` first."
            )))
        }
    }
}

/// The redirect target of a forced logout published during the command.
fn drain_forced_logout(
    events: &mut tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Option<&'static str> {
    let mut redirect = None;
    loop {
        match events.try_recv() {
            Ok(SessionEvent::ForcedLogout { redirect_to }) => redirect = Some(redirect_to),
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    redirect
}
