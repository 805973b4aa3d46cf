//! dashkit CLI
//!
//! Command-line front for the client session layer:
//! - Log in, register, log out and inspect the current session
//! - Read and change the theme preference
//! - Make authenticated requests against the configured API
//! - Watch storage for changes made by other processes

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dashkit::config::{generate_default_config, AuthMode, Config, LoggingConfig};
use dashkit::http::HttpError;
use dashkit::session::Principal;
use dashkit::storage::{Origin, StorageEvent};
use dashkit::theme::Theme;
use dashkit::validation::{validate_password, PasswordPolicy, PasswordStrength};
use dashkit::Dashkit;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dashkit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client-side session, storage and API toolkit")]
#[command(long_about = "dashkit keeps a persisted login session, syncs it across processes\nsharing a data directory, and makes authenticated API requests.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: platform config dir or ./dashkit.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// API base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Data directory for persisted state
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Exchange credentials with the API instead of the built-in mock
    #[arg(long, global = true)]
    pub remote_auth: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in with email and password
    Login {
        #[arg(short, long)]
        email: String,
        /// Password (or set DASHKIT_PASSWORD)
        #[arg(short, long, env = "DASHKIT_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and log in
    Register {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        /// Password (or set DASHKIT_PASSWORD)
        #[arg(short, long, env = "DASHKIT_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// End the current session
    Logout,

    /// Show the current session
    Whoami {
        /// Check the token with the server first (ends the session if rejected)
        #[arg(long)]
        verify: bool,
    },

    /// Show or change the theme (light, dark, toggle, system)
    Theme {
        value: Option<String>,
    },

    /// Authenticated GET request, body printed as JSON
    Get {
        /// Path relative to the base URL
        path: String,
    },

    /// Print storage changes until interrupted
    Watch {
        /// Keys to watch (default: all)
        keys: Vec<String>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("dashkit={}", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    if let Some(url) = &cli.base_url {
        config.api.base_url = url.clone();
    }
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.to_string_lossy().to_string();
    }
    if cli.remote_auth {
        config.auth.mode = AuthMode::Http;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        let config = generate_default_config();
        match output {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, &config)?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", config),
        }
        return Ok(());
    }

    let config = load_config(&cli)?;
    init_tracing(&config.logging);

    let client = Dashkit::from_config(config).context("Failed to initialize client")?;
    let json = cli.format == "json";

    match cli.command {
        Commands::Login { email, password } => {
            let principal = client
                .session()
                .login(&email, &password)
                .await
                .context("Login failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&principal)?);
            } else {
                println!(
                    "Logged in as {} <{}> ({})",
                    principal.name, principal.email, principal.role
                );
            }
        }

        Commands::Register {
            name,
            email,
            password,
        } => {
            let report = validate_password(&password, &PasswordPolicy::default());
            if !report.is_valid() {
                for error in &report.errors {
                    eprintln!("  - {}", error);
                }
                bail!("Password does not meet the policy");
            }
            if report.strength < PasswordStrength::Strong {
                eprintln!("Password strength: {:?}", report.strength);
            }

            let principal = client
                .session()
                .register(&name, &email, &password)
                .await
                .context("Registration failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&principal)?);
            } else {
                println!(
                    "Registered and logged in as {} <{}>",
                    principal.name, principal.email
                );
            }
        }

        Commands::Logout => {
            let was_authenticated = client.session().is_authenticated();
            client.session().logout();
            if was_authenticated {
                println!("Logged out");
            } else {
                println!("Not logged in");
            }
        }

        Commands::Whoami { verify } => {
            let principal = if verify {
                if client.config().auth.mode == AuthMode::Mock {
                    bail!(
                        "--verify needs --remote-auth; mock tokens only live as long \
                         as the process that issued them"
                    );
                }
                let was_authenticated = client.session().is_authenticated();
                let verified = client
                    .session()
                    .verify()
                    .await
                    .context("Token verification failed")?;
                if was_authenticated && verified.is_none() && !json {
                    eprintln!("Session is not valid on the server");
                }
                verified
            } else {
                client.session().current_principal()
            };
            print_principal(principal.as_ref(), json)?;
        }

        Commands::Theme { value } => {
            let theme = client.theme();
            match value.as_deref() {
                None => {}
                Some("toggle") => {
                    theme.toggle();
                }
                Some("system") => theme.reset(),
                Some(other) => {
                    let chosen: Theme = other.parse().map_err(anyhow::Error::msg)?;
                    theme.set(chosen);
                }
            }

            let source = if theme.stored().is_some() { "chosen" } else { "system" };
            println!("{} ({})", theme.current(), source);
        }

        Commands::Get { path } => {
            match client.api().get::<serde_json::Value>(&path).await {
                Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
                Err(HttpError::SessionEnded) => {
                    bail!("Session expired; log in again")
                }
                Err(e) => return Err(e).with_context(|| format!("GET {} failed", path)),
            }
        }

        Commands::Watch { keys } => {
            let mut events = client.storage().events();
            let _watcher = client.spawn_watcher();
            eprintln!("Watching {} (Ctrl+C to stop)", describe_keys(&keys));

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    received = events.recv() => match received {
                        Ok(event) if keys.is_empty() || keys.contains(&event.key) => {
                            print_event(&event, json)?;
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Watcher fell behind, events dropped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        }

        // Written before the client is built
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn print_principal(principal: Option<&Principal>, json: bool) -> anyhow::Result<()> {
    match principal {
        Some(principal) if json => println!("{}", serde_json::to_string_pretty(principal)?),
        Some(principal) => {
            println!("{} <{}>", principal.name, principal.email);
            println!("  id:   {}", principal.id);
            println!("  role: {}", principal.role);
            if let Some(avatar) = &principal.avatar {
                println!("  avatar: {}", avatar);
            }
        }
        None if json => println!("null"),
        None => println!("Not logged in"),
    }
    Ok(())
}

fn describe_keys(keys: &[String]) -> String {
    if keys.is_empty() {
        "all keys".to_string()
    } else {
        keys.join(", ")
    }
}

fn print_event(event: &StorageEvent, json: bool) -> anyhow::Result<()> {
    let origin = match event.origin {
        Origin::Local => "local",
        Origin::External => "external",
    };
    let at = chrono::Local::now().format("%H:%M:%S");

    if json {
        let value = event
            .new_value
            .as_deref()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok());
        let line = serde_json::json!({
            "at": at.to_string(),
            "key": event.key,
            "origin": origin,
            "value": value,
        });
        println!("{}", serde_json::to_string(&line)?);
    } else {
        match &event.new_value {
            Some(value) => println!("{} [{}] {} = {}", at, origin, event.key, value),
            None => println!("{} [{}] {} removed", at, origin, event.key),
        }
    }
    Ok(())
}
