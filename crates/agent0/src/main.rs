//! agent0 - terminal chat client for the Agent0 demo agent.
//!
//! Authenticates against the configured identity provider, persists chat
//! transcripts through the selected storage backend, and forwards turns
//! to the remote agent endpoint.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use log::LevelFilter;

use agent0::agent::AgentClient;
use agent0::auth::{IdentityClient, TokenProvider};
use agent0::chat::ChatController;
use agent0::config::{AppConfig, AppPaths, ConfigError};
use agent0::render::Renderer;
use agent0::repl;
use agent0::store::{create_store, ChatStore, MessageRole};

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "Error: {err:?}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[tokio::main]
async fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.common);

    // Completions need no configuration at all.
    if let Command::Completions { shell } = &cli.command {
        return handle_completions(*shell);
    }

    let paths = AppPaths::discover(cli.common.config.clone())?;
    let config = AppConfig::load(&paths)?;

    // An incomplete configuration routes to the error display instead of
    // the chat UI.
    if let Err(e) = config.validate() {
        print_config_error(&e);
        std::process::exit(2);
    }

    let identity: Arc<IdentityClient> =
        Arc::new(IdentityClient::new(config.auth.clone(), paths.token_cache()));
    let renderer = Renderer::new(use_color(&cli.common));

    match cli.command {
        Command::Chat { chat_id } => {
            handle_chat(&config, &paths, identity, &renderer, chat_id).await
        }
        Command::New => handle_new(&config, &paths, identity.as_ref()).await,
        Command::List { json } => handle_list(&config, &paths, identity.as_ref(), json).await,
        Command::Rename { chat_id, title } => handle_rename(&config, &paths, &chat_id, &title).await,
        Command::Delete { chat_id, yes } => handle_delete(&config, &paths, &chat_id, yes).await,
        Command::Share { chat_id, out } => handle_share(&config, &paths, &chat_id, out).await,
        Command::Login => handle_login(identity.as_ref()).await,
        Command::Logout => handle_logout(identity.as_ref()),
        Command::Whoami => handle_whoami(identity.as_ref()),
        Command::Accounts { command } => handle_accounts(identity.as_ref(), command).await,
        Command::Completions { .. } => Ok(()),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "agent0",
    author,
    version,
    about = "Agent0 - chat with the demo agent from your terminal.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Disable ANSI colors in output
    #[arg(long = "no-color", global = true)]
    no_color: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Open a chat screen (a new chat, or an existing one by id)
    Chat {
        /// Chat id to reopen
        chat_id: Option<String>,
    },
    /// Create a new empty chat
    New,
    /// List your chats, most recently updated first
    List {
        /// Output machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename a chat
    Rename {
        chat_id: String,
        title: String,
    },
    /// Delete a chat and its messages
    Delete {
        chat_id: String,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
    /// Export a chat transcript as markdown
    Share {
        chat_id: String,
        /// Write to a file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Sign in to the identity provider
    Login,
    /// Discard the local session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Manage linked social accounts
    Accounts {
        #[command(subcommand)]
        command: AccountsCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum AccountsCommand {
    /// List identities linked to your account
    List,
    /// Print the URL that links a social connection (e.g. "github",
    /// "google-oauth2") when opened in a browser
    Link { connection: String },
    /// Unlink a social connection
    Unlink { connection: String },
}

fn init_logging(common: &CommonOpts) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    if common.quiet {
        log::set_max_level(LevelFilter::Off);
        return;
    }

    let level = effective_log_level(common);
    let level_str = match level {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("agent0={level_str}")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(!common.no_color && io::stderr().is_terminal())
                .with_target(false),
        )
        .try_init()
        .ok();

    // Also init env_logger for compatibility with log crate users.
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    builder.filter_level(level);
    builder.try_init().ok();
}

fn effective_log_level(common: &CommonOpts) -> LevelFilter {
    if common.trace {
        LevelFilter::Trace
    } else if common.debug {
        LevelFilter::Debug
    } else {
        // The chat screen stays quiet unless asked otherwise.
        match common.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn use_color(common: &CommonOpts) -> bool {
    !common.no_color && std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal()
}

fn print_config_error(err: &ConfigError) {
    eprintln!("Agent0 Configuration Error");
    eprintln!();
    eprintln!("The identity provider is not properly configured. Please check");
    eprintln!("your configuration file or environment variables.");
    eprintln!();
    let ConfigError::Missing { keys } = err;
    for key in keys {
        eprintln!("  missing: {key}");
    }
    eprintln!();
    eprintln!("Configuration guide: https://auth0.com/ai/docs#user-authentication");
}

async fn open_store(config: &AppConfig, paths: &AppPaths) -> Result<Arc<dyn ChatStore>> {
    let store = create_store(&config.store_backend(paths))
        .await
        .context("opening chat store")?;
    Ok(Arc::from(store))
}

async fn handle_chat(
    config: &AppConfig,
    paths: &AppPaths,
    identity: Arc<IdentityClient>,
    renderer: &Renderer,
    chat_id: Option<String>,
) -> Result<()> {
    let store = open_store(config, paths).await?;
    let agent = Arc::new(AgentClient::new(&config.api.host));

    let mut controller = ChatController::new(store, agent, identity);
    if let Some(chat_id) = chat_id {
        controller.load(&chat_id).await?;
    }

    repl::run(&mut controller, renderer).await
}

async fn handle_new(
    config: &AppConfig,
    paths: &AppPaths,
    identity: &IdentityClient,
) -> Result<()> {
    let user = match identity.user() {
        Some(user) => user,
        None => identity.request_login().await?,
    };

    let store = open_store(config, paths).await?;
    let chat = store.create_chat(&user.sub, None).await?;

    println!("Created chat {} (\"{}\")", chat.id, chat.title);
    println!("Open it with: agent0 chat {}", chat.id);
    Ok(())
}

async fn handle_list(
    config: &AppConfig,
    paths: &AppPaths,
    identity: &IdentityClient,
    json: bool,
) -> Result<()> {
    let Some(user) = identity.user() else {
        println!("Please log in to view chat history");
        return Ok(());
    };

    let store = open_store(config, paths).await?;
    let chats = store.user_chats(&user.sub).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chats)?);
        return Ok(());
    }

    if chats.is_empty() {
        println!("No chats yet. Start a new conversation!");
        return Ok(());
    }

    for chat in &chats {
        println!(
            "{}  {:<40}  {}",
            chat.id,
            truncate_title(&chat.title),
            format_relative(chat.updated_at)
        );
    }
    Ok(())
}

async fn handle_rename(
    config: &AppConfig,
    paths: &AppPaths,
    chat_id: &str,
    title: &str,
) -> Result<()> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        bail!("title must not be empty");
    }

    let store = open_store(config, paths).await?;
    store.update_chat_title(chat_id, trimmed).await?;
    println!("Chat renamed successfully");
    Ok(())
}

async fn handle_delete(
    config: &AppConfig,
    paths: &AppPaths,
    chat_id: &str,
    assume_yes: bool,
) -> Result<()> {
    let store = open_store(config, paths).await?;

    let Some(chat) = store.chat_by_id(chat_id).await? else {
        bail!("chat not found: {chat_id}");
    };

    if !assume_yes {
        print!("Delete chat \"{}\"? This cannot be undone. [y/N] ", chat.title);
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Cancelled");
            return Ok(());
        }
    }

    store.delete_chat(chat_id).await?;
    println!("Chat deleted successfully");
    Ok(())
}

async fn handle_share(
    config: &AppConfig,
    paths: &AppPaths,
    chat_id: &str,
    out: Option<PathBuf>,
) -> Result<()> {
    let store = open_store(config, paths).await?;

    let Some(chat) = store.chat_by_id(chat_id).await? else {
        bail!("chat not found: {chat_id}");
    };
    let messages = store.chat_messages(chat_id).await?;

    let mut doc = format!("# {}\n\n", chat.title);
    doc.push_str(&format!(
        "*Shared from Agent0 on {}*\n\n",
        Utc::now().format("%Y-%m-%d")
    ));
    for message in &messages {
        let speaker = match message.role {
            MessageRole::User => "You",
            MessageRole::Assistant => "Agent0",
        };
        doc.push_str(&format!("**{}:** {}\n\n", speaker, message.content));
    }

    match out {
        Some(path) => {
            std::fs::write(&path, &doc)
                .with_context(|| format!("writing transcript: {}", path.display()))?;
            println!("Transcript written to {}", path.display());
        }
        None => print!("{doc}"),
    }
    Ok(())
}

async fn handle_login(identity: &IdentityClient) -> Result<()> {
    identity.request_login().await?;
    Ok(())
}

fn handle_logout(identity: &IdentityClient) -> Result<()> {
    let logout_url = identity.logout()?;
    println!("Signed out.");
    println!("To also end your browser session, open {logout_url}");
    Ok(())
}

fn handle_whoami(identity: &IdentityClient) -> Result<()> {
    match identity.user() {
        Some(user) => {
            println!("{}", user.sub);
            if let Some(name) = &user.name {
                println!("name:  {name}");
            }
            if let Some(email) = &user.email {
                println!("email: {email}");
            }
        }
        None => println!("Not signed in. Run: agent0 login"),
    }
    Ok(())
}

async fn handle_accounts(identity: &IdentityClient, command: AccountsCommand) -> Result<()> {
    match command {
        AccountsCommand::List => {
            let identities = identity.identities().await?;
            if identities.is_empty() {
                println!("No linked identities");
                return Ok(());
            }
            for id in identities {
                let connection = id.connection.as_deref().unwrap_or(&id.provider);
                let kind = if id.is_social { "social" } else { "primary" };
                println!("{:<16} {}", connection, kind);
            }
        }
        AccountsCommand::Link { connection } => {
            let url = identity.link_url(&connection).await?;
            println!("Open this URL in a browser to link {connection}:");
            println!("{url}");
        }
        AccountsCommand::Unlink { connection } => {
            identity.unlink_identity(&connection).await?;
            println!("Successfully unlinked your account.");
        }
    }
    Ok(())
}

fn handle_completions(shell: Shell) -> Result<()> {
    clap_complete::generate(shell, &mut Cli::command(), "agent0", &mut io::stdout());
    Ok(())
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > 40 {
        let short: String = title.chars().take(37).collect();
        format!("{short}...")
    } else {
        title.to_string()
    }
}

/// Compact relative timestamp for the chat list: time of day within the
/// last 24 hours, month and day otherwise.
fn format_relative(ts: DateTime<Utc>) -> String {
    let age = Utc::now() - ts;
    if age < chrono::Duration::hours(24) {
        ts.format("%H:%M").to_string()
    } else {
        ts.format("%b %d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_format_relative() {
        let recent = Utc::now() - Duration::minutes(5);
        assert!(format_relative(recent).contains(':'));

        let old = Utc::now() - Duration::days(3);
        assert!(!format_relative(old).contains(':'));
    }

    #[test]
    fn test_truncate_title() {
        assert_eq!(truncate_title("short"), "short");
        let long = "x".repeat(50);
        let truncated = truncate_title(&long);
        assert_eq!(truncated.chars().count(), 40);
        assert!(truncated.ends_with("..."));
    }
}
