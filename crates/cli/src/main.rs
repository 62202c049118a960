use std::process::ExitCode;

use clap::Parser;
use ldap_utils_core::error::LdapUtilsError;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "ldap-utils",
    about = "Perform operations on a StoredSafe server based on input from an LDAP server",
    after_help = "Log level can be set with the LOG_LEVEL environment variable \
                  (ERROR, WARNING, INFO or DEBUG) or with RUST_LOG.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Deactivate StoredSafe users that match the given LDAP users
    Deactivate {
        /// Path to the JSON configuration file
        #[arg(short, long)]
        config: String,
        /// List matched users without deactivating them
        #[arg(short, long)]
        test: bool,
    },
    /// Log in to StoredSafe and save the token
    Login {
        /// Configuration file with StoredSafe settings
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Check whether the saved StoredSafe token is valid
    Check {
        /// Configuration file with StoredSafe settings
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Invalidate the saved StoredSafe token
    Logout {
        /// Configuration file with StoredSafe settings
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Bind to the configured LDAP server and unbind
    TestConnection {
        /// Path to the JSON configuration file
        #[arg(short, long)]
        config: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Deactivate { config, test } => {
            commands::deactivate::run(&config, test).await?;
        }
        Commands::Login { config } => {
            commands::session::login(config.as_deref()).await?;
        }
        Commands::Check { config } => {
            commands::session::check(config.as_deref()).await?;
        }
        Commands::Logout { config } => {
            commands::session::logout(config.as_deref()).await?;
        }
        Commands::TestConnection { config } => {
            commands::test_connection::run(&config).await?;
        }
    }
    Ok(())
}

/// Filter from `LOG_LEVEL`, then `RUST_LOG`, defaulting to `info`.
fn env_filter() -> EnvFilter {
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        if let Ok(filter) = EnvFilter::try_new(level_directive(&level)) {
            return filter;
        }
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Translate log level names such as `WARNING` or `CRITICAL` into tracing directives.
/// Anything else is passed through as a directive.
fn level_directive(level: &str) -> String {
    let directive = match level.trim().to_ascii_uppercase().as_str() {
        "CRITICAL" | "FATAL" | "ERROR" => "error",
        "WARNING" | "WARN" => "warn",
        "INFO" => "info",
        "DEBUG" => "debug",
        "NOTSET" | "TRACE" => "trace",
        _ => return level.trim().to_string(),
    };
    directive.to_string()
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<LdapUtilsError>()
        .and_then(|e| u8::try_from(e.exit_code()).ok())
        .unwrap_or(1)
}
