mod interactive;
mod noninteractive;
mod output;

use anyhow::Result;
use chatify_chat::{ChatContext, ChatView, LoadOutcome};
use chatify_core::config::AppConfig;
use chatify_core::conversation::Conversation;
use chatify_core::error::{ChatError, StorageError};
use chatify_core::message::User;
use chatify_core::store::ConversationStore;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chatify", version, about = "Streaming chat client for the terminal")]
struct Cli {
    /// Non-interactive mode: send one prompt and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Working directory
    #[arg(short = 'c', long = "cwd")]
    working_dir: Option<PathBuf>,

    /// Output format for non-interactive mode
    #[arg(short = 'f', long, default_value = "text")]
    output_format: OutputFormat,

    /// Suppress progress indicators
    #[arg(short, long)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Continue an existing conversation by ID
    #[arg(long)]
    conversation: Option<String>,

    /// User to act as (overrides config)
    #[arg(short, long)]
    user: Option<String>,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub struct App {
    pub ctx: ChatContext,
    pub user: User,
    pub config: AppConfig,
}

impl App {
    pub fn store(&self) -> &dyn ConversationStore {
        self.ctx.store.as_ref()
    }

    /// Opens a view on `conversation` and loads its history.
    pub async fn open_view(&self, conversation: &Conversation) -> Result<ChatView> {
        let view = ChatView::new(self.ctx.clone(), conversation.id.clone());
        if let LoadOutcome::Loaded(n) = view.load().await? {
            tracing::debug!(conversation = %conversation.id, messages = n, "history loaded");
        }
        Ok(view)
    }

    pub async fn find_conversation(&self, id: &str) -> Result<Conversation, ChatError> {
        match self.store().get_conversation(id).await {
            Ok(conversation) if conversation.user_id == self.user.id => Ok(conversation),
            Ok(_) | Err(StorageError::NotFound(_)) => {
                Err(ChatError::ConversationNotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        chatify_core::config::load_config(cli.working_dir.clone()).map_err(ChatError::from)?;
    if let Some(user) = cli.user {
        config.user_id = Some(user);
    }

    let filter = if cli.debug || config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if !config.has_user() {
        anyhow::bail!("No user configured. Pass --user or set CHATIFY_USER_ID.");
    }
    let user = User::new(config.user_id.clone().unwrap_or_default().trim());

    let db = chatify_storage::Database::open(&config)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    db.run_migrations()
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let proxy = chatify_providers::create_proxy(&config).map_err(|e| anyhow::anyhow!("{e}"))?;
    tracing::debug!(proxy = proxy.name(), user = %user.id, "starting");

    let store: Arc<dyn ConversationStore> = Arc::new(db.clone());
    let ctx = ChatContext::new(proxy, store)
        .with_user(Some(user.clone()))
        .with_throttle(config.render.throttle());
    let app = App { ctx, user, config };

    let result = if let Some(prompt) = cli.prompt {
        noninteractive::run(&app, prompt, cli.conversation, cli.output_format, cli.quiet).await
    } else {
        interactive::run(&app, cli.conversation).await
    };

    db.close().await;
    result
}
