//! concierge - FAQ-grounded customer-service chat

mod commands;
mod config;
mod ui;
mod utils;

use anyhow::Context as _;
use clap::Parser;
use concierge_agent::{
    CustomerDirectory, DirectoryError, DisconnectedDirectory, KnowledgeBase, PromptComposer,
    ProviderTransport, ResponseGenerator, RetryConfig, Session, SessionConfig, SessionEvent,
    SessionFactory, SqliteDirectory, SubmitOutcome, generator::DEFAULT_TIMEOUT,
};
use concierge_ai::{
    CompletionOptions, Model, Provider, models, providers::openai::OpenAICompatProvider,
};
use concierge_tui::Theme;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// concierge - customer-service assistant grounded in your FAQ
#[derive(Parser, Debug)]
#[command(name = "concierge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (default: the provider's first registered model)
    #[arg(short, long)]
    model: Option<String>,

    /// Provider (groq, openai, openrouter, ollama, custom)
    #[arg(short, long)]
    provider: Option<String>,

    /// Endpoint override for the provider
    #[arg(long)]
    base_url: Option<String>,

    /// FAQ knowledge base (JSON array of question/answer objects)
    #[arg(short, long)]
    knowledge_base: Option<PathBuf>,

    /// Customer directory connection string
    #[arg(long)]
    database_url: Option<String>,

    /// Ask a single question and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Disable TUI mode (use simple stdin/stdout)
    #[arg(long)]
    no_tui: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

/// Everything a front-end needs to serve conversations
pub struct App {
    pub factory: SessionFactory,
    pub directory: Arc<dyn CustomerDirectory>,
    pub model: Model,
    pub theme: Theme,
    /// Shown at startup when customer records cannot be reached
    pub directory_notice: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load()?;

    let use_tui = args.command.is_none() && !args.no_tui && cfg.tui.unwrap_or(true);
    init_tracing(args.verbose, args.log_file.as_deref(), !use_tui)?;

    // Merge config with CLI args (CLI takes precedence)
    let provider = args
        .provider
        .as_deref()
        .or(cfg.provider.as_deref())
        .map(Provider::parse)
        .unwrap_or(models::DEFAULT_PROVIDER);

    let model_id = pick_model_id(provider, args.model.clone().or_else(|| cfg.model.clone()))?;

    let base_url = args.base_url.clone().or_else(|| cfg.base_url.clone());
    if provider == Provider::Custom && base_url.is_none() {
        anyhow::bail!("provider 'custom' needs a base_url (flag --base-url or config)");
    }
    let model = models::resolve_model(provider, &model_id, base_url.as_deref());

    let kb_path = args
        .knowledge_base
        .clone()
        .or_else(|| cfg.knowledge_base.clone())
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_KNOWLEDGE_BASE));
    let knowledge = KnowledgeBase::load(&kb_path).context("failed to load knowledge base")?;

    let api_key = match cfg.api_key(provider) {
        Some(key) => {
            if key.source == config::KeySource::ConfigFile {
                warn!(
                    provider = provider.id(),
                    "using API key from the config file; prefer an environment variable"
                );
            }
            Some(key.value)
        }
        None if provider.requires_api_key() => {
            let api_key_var = provider.api_key_env_var().unwrap_or("GROQ_API_KEY");
            eprintln!("Error: No API key found for {}", provider.name());
            eprintln!();
            eprintln!("Set your API key with: export {}=your-key", api_key_var);
            eprintln!("Or add it to config file: concierge --init-config");
            std::process::exit(1);
        }
        None => None,
    };

    let database_url = args
        .database_url
        .clone()
        .or_else(|| cfg.database_url.clone())
        .unwrap_or_else(|| config::DEFAULT_DATABASE_URL.to_string());
    let (directory, directory_notice) = connect_directory(&database_url).await;

    let options = CompletionOptions {
        max_tokens: cfg.max_tokens,
        temperature: cfg.temperature,
        ..Default::default()
    };
    let transport = ProviderTransport::new(
        Arc::new(OpenAICompatProvider::new(api_key)),
        model.clone(),
        options,
    )
    .with_retry_config(RetryConfig::with_max_retries(cfg.max_retries.unwrap_or(0)));

    let timeout = cfg
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT);
    let generator = ResponseGenerator::new(Arc::new(transport)).with_timeout(timeout);

    let factory = SessionFactory::new(
        PromptComposer::full_corpus(Arc::new(knowledge)),
        generator,
        SessionConfig {
            failure_policy: cfg.on_generation_error.unwrap_or_default(),
        },
    );

    info!(
        provider = provider.id(),
        model = %model.id,
        knowledge_base = %kb_path.display(),
        "concierge ready"
    );

    let app = App {
        factory,
        directory,
        model,
        theme: cfg
            .theme
            .as_deref()
            .and_then(Theme::by_name)
            .unwrap_or_default(),
        directory_notice,
    };

    // Non-interactive mode
    if let Some(command) = args.command {
        if let Some(notice) = &app.directory_notice {
            eprintln!("Warning: {}", notice);
        }
        return run_command(&app, &command).await;
    }

    if use_tui {
        return ui::run_tui(&app).await;
    }

    run_interactive(&app).await
}

fn init_tracing(verbose: bool, log_file: Option<&Path>, to_stderr: bool) -> anyhow::Result<()> {
    let filter = if verbose {
        EnvFilter::new("warn,concierge=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else if to_stderr {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
    // The TUI owns the terminal; without a log file nothing is written.
    Ok(())
}

/// Explicit model, else the provider's default. `custom` has no default.
fn pick_model_id(provider: Provider, configured: Option<String>) -> anyhow::Result<String> {
    if let Some(id) = configured.filter(|id| !id.trim().is_empty()) {
        return Ok(id);
    }
    models::default_model_id(provider)
        .map(str::to_string)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "provider '{}' has no default model; set one with --model or in the config",
                provider.id()
            )
        })
}

/// Open the customer store. On failure the returned directory reports every
/// call as unavailable, and the notice says so.
async fn connect_directory(url: &str) -> (Arc<dyn CustomerDirectory>, Option<String>) {
    match SqliteDirectory::connect(url).await {
        Ok(directory) => (Arc::new(directory), None),
        Err(e) => {
            warn!(url, "{}", e);
            let notice = format!("{}. /customer and /register will not work.", e);
            let reason = match e {
                DirectoryError::Unavailable(reason) | DirectoryError::InvalidRecord(reason) => {
                    reason
                }
            };
            (Arc::new(DisconnectedDirectory::new(reason)), Some(notice))
        }
    }
}

/// Drop the line terminator left by `read_line`, keeping everything else
fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

/// Print a session event for the line-oriented front-ends
fn print_event(event: SessionEvent) -> io::Result<()> {
    let mut stdout = io::stdout();
    match event {
        SessionEvent::ReplyDelta { delta } => {
            write!(stdout, "{}", delta)?;
            stdout.flush()?;
        }
        SessionEvent::ReplyEnd { .. } => {
            writeln!(stdout)?;
        }
        SessionEvent::Error { message } => {
            eprintln!("\nError: {}", message);
        }
        SessionEvent::TurnAppended { turn, .. } if turn.is_error() => {
            writeln!(stdout, "{}", turn.content())?;
        }
        _ => {}
    }
    Ok(())
}

/// Submit `text` and stream the reply to stdout as it arrives
async fn submit_and_print(
    session: &Session,
    events: &mut broadcast::Receiver<SessionEvent>,
    text: &str,
) -> anyhow::Result<concierge_agent::Result<SubmitOutcome>> {
    let mut submit = std::pin::pin!(session.submit_text(text));

    let result = loop {
        tokio::select! {
            biased;

            result = &mut submit => break result,

            event = events.recv() => {
                if let Ok(event) = event {
                    print_event(event)?;
                }
            }
        }
    };

    while let Ok(event) = events.try_recv() {
        print_event(event)?;
    }
    Ok(result)
}

async fn run_command(app: &App, command: &str) -> anyhow::Result<()> {
    let session = app.factory.create();
    let mut events = session.subscribe();

    match submit_and_print(&session, &mut events, command).await? {
        Ok(SubmitOutcome::Replied(_)) => Ok(()),
        Ok(SubmitOutcome::Ignored) => anyhow::bail!("nothing to ask: the question is empty"),
        Err(e) => Err(e.into()),
    }
}

async fn run_interactive(app: &App) -> anyhow::Result<()> {
    use commands::{CommandContext, CommandResult, execute_command};

    let mut session = app.factory.create();
    let mut events = session.subscribe();

    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        let model_short = app.model.id.split('/').next_back().unwrap_or(&app.model.id);
        eprintln!("concierge ({})", model_short);
        eprintln!("Welcome to Customer Service! How can I assist you today?");
        eprintln!("Type /help for commands.");
        eprintln!();
    }
    if let Some(notice) = &app.directory_notice {
        eprintln!("Warning: {}", notice);
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = strip_line_ending(&input);
        if input.trim().is_empty() {
            continue;
        }

        let ctx = CommandContext {
            directory: app.directory.as_ref(),
            session: &session,
            model: &app.model,
        };
        if let Some(result) = execute_command(input, &ctx).await {
            match result {
                CommandResult::Message(msg) => println!("{}", msg),
                CommandResult::NewSession => {
                    session = app.factory.create();
                    events = session.subscribe();
                    println!("Started a new conversation.");
                }
                CommandResult::Exit => break,
                CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            continue;
        }

        match submit_and_print(&session, &mut events, input).await? {
            Ok(_) => {}
            // Already reported through the event stream
            Err(e) if e.is_generation_failure() => {}
            Err(e) => eprintln!("Error: {}", e),
        }
        println!();
    }

    Ok(())
}
