use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use roomdesk::auth::{IdentitySource, SupabaseAuth};
use roomdesk::clock::SystemClock;
use roomdesk::config::{Config, ENV_ACCESS_TOKEN};
use roomdesk::console::{self, DeskCommand, DeskError};
use roomdesk::engine::Engine;
use roomdesk::notify::NotifyHub;
use roomdesk::remote::rest::{PostgrestAudit, PostgrestTable, RestClient};

/// Hotel front-desk reservations: availability, bookings and cancellations.
#[derive(Parser, Debug)]
#[command(name = "roomdesk", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Desk(DeskCommand),

    /// Show the signed-in staff member
    Whoami,

    /// Sign in and print an access token to export
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "ROOMDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Revoke the current access token
    Logout,

    /// Interactive front-desk console
    Console,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = roomdesk::observability::init(config.metrics_port) {
        error!("failed to install metrics exporter: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let client = RestClient::new(&config)?;
    let auth = SupabaseAuth::new(client.clone());

    // Identity commands run before the session gate.
    match &command {
        Command::Login { email, password } => {
            let signed_in = auth.sign_in(email, password).await?;
            println!("signed in as {}", signed_in.session.display_name);
            println!("export {ENV_ACCESS_TOKEN}={}", signed_in.access_token);
            return Ok(());
        }
        Command::Logout => {
            auth.sign_out().await?;
            println!("signed out; unset {ENV_ACCESS_TOKEN}");
            return Ok(());
        }
        _ => {}
    }

    let Some(session) = auth.current_session().await? else {
        return Err(format!("not signed in: run `roomdesk login --email <email>` and export {ENV_ACCESS_TOKEN}").into());
    };
    info!("session for {}", session.display_name);

    let table = Arc::new(PostgrestTable::new(client.clone(), &config.table));
    let audit = Arc::new(PostgrestAudit::new(client, &config.audit_table));
    let engine = Engine::new(table, audit, Arc::new(SystemClock), Arc::new(NotifyHub::new()));
    if !matches!(command, Command::Whoami) {
        engine.reload().await?;
    }

    match command {
        Command::Desk(cmd) => match console::execute(&engine, cmd).await {
            Ok(text) => {
                print!("{text}");
                if !text.ends_with('\n') {
                    println!();
                }
                Ok(())
            }
            Err(DeskError::Usage(msg)) => Err(msg.into()),
            Err(e) => Err(e.into()),
        },
        Command::Whoami => {
            match &session.email {
                Some(email) => println!("{} <{email}>", session.display_name),
                None => println!("{}", session.display_name),
            }
            Ok(())
        }
        Command::Console => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            console::run_console(&engine, &session, stdin, tokio::io::stdout()).await?;
            Ok(())
        }
        Command::Login { .. } | Command::Logout => Ok(()),
    }
}
