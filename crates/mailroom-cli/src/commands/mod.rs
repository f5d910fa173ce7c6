pub mod emails;
pub mod merchants;
pub mod records;
pub mod session;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use tokio::sync::Notify;

use mailroom_core::{ApiClient, Config, SessionGuard};

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store a session
    Login {
        /// Account email (defaults to the last one used)
        #[arg(long)]
        email: Option<String>,
    },
    /// Clear the stored session
    Logout,
    /// Show who is logged in and when the session expires
    Whoami,
    /// Manage merchant contact lists
    Merchants {
        #[command(subcommand)]
        command: MerchantCommand,
    },
    /// Browse, send and block emails
    Emails {
        #[command(subcommand)]
        command: EmailCommand,
    },
    /// List processed settlement transactions
    Transactions {
        /// Only show rows matching this text
        #[arg(long)]
        search: Option<String>,
    },
    /// Uploaded and generated settlement records
    Records {
        #[command(subcommand)]
        command: RecordCommand,
    },
    /// Keep the session open and sign out as soon as it expires
    Watch,
}

#[derive(Subcommand)]
pub enum MerchantCommand {
    /// List merchants and their recipients
    List,
    /// Add a merchant
    Add {
        #[arg(long)]
        name: String,
        #[arg(long = "recipient", required = true)]
        recipients: Vec<String>,
    },
    /// Replace a merchant's name and recipients
    Edit {
        id: i64,
        #[arg(long)]
        name: String,
        #[arg(long = "recipient", required = true)]
        recipients: Vec<String>,
    },
    /// Delete a merchant
    Remove {
        id: i64,
        #[arg(long, default_value = "")]
        reason: String,
    },
}

#[derive(Subcommand)]
pub enum EmailCommand {
    /// Show one page of the email history
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 5)]
        size: u32,
    },
    /// Compose and send an email to a merchant's recipients
    Send {
        /// Merchant id
        #[arg(long)]
        merchant: i64,
        #[arg(long)]
        subject: String,
        /// Salutation name (defaults to the merchant name)
        #[arg(long)]
        to: Option<String>,
        /// Override the merchant's recipient list
        #[arg(long = "recipient")]
        recipients: Vec<String>,
        #[arg(long, default_value = "")]
        body: String,
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
    /// Block a queued email
    Block { id: i64 },
    /// Unblock a queued email
    Unblock { id: i64 },
}

#[derive(Subcommand)]
pub enum RecordCommand {
    /// List uploaded settlement files
    Uploaded,
    /// List generated settlement reports
    Generated,
    /// Queue an email carrying files from a generated report
    Queue {
        /// `generatedAt` of the report
        #[arg(long)]
        generated_at: String,
        /// Index of an attachment within the report
        #[arg(long = "attachment", required = true)]
        attachments: Vec<usize>,
        /// Merchant id whose recipients receive the email
        #[arg(long)]
        merchant: i64,
        #[arg(long, default_value = "Daily Settlements")]
        subject: String,
    },
}

/// Shared state for every command.
pub struct Context {
    pub config: Config,
    pub client: ApiClient,
    /// Signalled whenever the session becomes invalid
    pub invalidated: Arc<Notify>,
}

impl Context {
    pub fn new(config: Config) -> Result<Self> {
        let invalidated = Arc::new(Notify::new());
        let notify = invalidated.clone();
        let guard = SessionGuard::new(config.session_store(), move || {
            eprintln!("Session is no longer valid. Run `mailroom login` to sign in again.");
            notify.notify_one();
        });
        let client = ApiClient::new(&config, guard)?;

        Ok(Self {
            config,
            client,
            invalidated,
        })
    }
}

pub async fn run(ctx: &Context, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email } => session::login(ctx, email).await,
        Commands::Logout => {
            session::logout(ctx);
            Ok(())
        }
        Commands::Whoami => {
            session::whoami(ctx).await;
            Ok(())
        }
        Commands::Merchants { command } => merchants::run(ctx, command).await,
        Commands::Emails { command } => emails::run(ctx, command).await,
        Commands::Transactions { search } => records::transactions(ctx, search.as_deref()).await,
        Commands::Records { command } => records::run(ctx, command).await,
        Commands::Watch => watch::run(ctx).await,
    }
}
