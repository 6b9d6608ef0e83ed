use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use credgate_lib::{
    auth::AuthService,
    config::{Settings, DEFAULT_CONFIG_FILE},
    error::AuthResult,
    notifier::ResetNotifier,
    storage::FlatFileStore,
    AppState,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Credential lifecycle over a flat-file account store
#[derive(Parser, Debug)]
#[command(name = "credgate", version, about)]
struct Cli {
    /// Settings file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override the data directory from the settings
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Attempt a login
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Change a password using the current one
    ChangePassword {
        #[arg(long)]
        account_id: Uuid,
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
    /// Issue a reset token for an email address
    RequestReset {
        #[arg(long)]
        email: String,
    },
    /// Check whether a reset token is live
    VerifyReset {
        #[arg(long)]
        token: String,
    },
    /// Set a new password with a reset token
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long)]
        new: String,
    },
    /// Print an account
    Show {
        #[arg(long)]
        account_id: Uuid,
    },
    /// Check a password against the policy without storing anything
    CheckPassword {
        #[arg(long)]
        password: String,
    },
}

/// Demo delivery channel: prints the token instead of emailing it
struct StdoutNotifier;

#[async_trait]
impl ResetNotifier for StdoutNotifier {
    async fn deliver(&self, email: &str, raw_token: &str) -> anyhow::Result<()> {
        println!("[demo mail to {email}] reset token: {raw_token}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)?;
    if let Some(dir) = cli.data_dir.clone() {
        settings.data_dir = dir;
    }

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let storage = FlatFileStore::new(&settings.data_dir)?;
    info!(data_dir = %settings.data_dir.display(), "using flat-file account store");
    let state = AppState::new(storage, settings, Arc::new(StdoutNotifier))?;

    match run(&state, cli.command).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("error [{}]: {}", err.error_code(), err.sanitized_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(state: &AppState<FlatFileStore>, command: Command) -> AuthResult<()> {
    match command {
        Command::Register { username, email, password } => {
            let account = state.auth.register(&username, &email, &password).await?;
            print_json(&account);
        }
        Command::Login { username, password } => {
            let account = state.auth.login(&username, &password).await?;
            print_json(&account);
        }
        Command::ChangePassword { account_id, current, new } => {
            state.auth.change_password(account_id, &current, &new).await?;
            println!("password changed");
        }
        Command::RequestReset { email } => {
            state.auth.request_password_reset(&email).await?;
            println!("if an account exists for {email}, a reset token has been sent");
        }
        Command::VerifyReset { token } => {
            let live = state.auth.verify_reset_token(&token).await?;
            println!("{}", if live { "token is valid" } else { "token is invalid or expired" });
        }
        Command::ResetPassword { token, new } => {
            state.auth.reset_password(&token, &new).await?;
            println!("password reset");
        }
        Command::Show { account_id } => match state.auth.account(account_id).await? {
            Some(account) => print_json(&account),
            None => println!("no such account"),
        },
        Command::CheckPassword { password } => {
            let check = state.auth.check_password(&password);
            if check.is_valid() {
                println!("password meets the policy");
            } else {
                for violation in &check.violations {
                    println!("- {violation}");
                }
            }
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("could not render output: {e}"),
    }
}
