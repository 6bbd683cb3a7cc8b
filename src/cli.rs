use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file to read
    #[arg(short, long, global = true, default_value = "aalim.toml")]
    pub config: String,

    /// Optional command to run. Starts the chat UI when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a one-off question and print the answer
    Ask {
        /// The question to send
        #[arg(required = true)]
        question: Vec<String>,

        /// Number of sources to retrieve
        #[arg(short, long)]
        k: Option<u32>,

        /// Start a new chat for this question
        #[arg(short, long)]
        new: bool,
    },

    /// Manage saved chats
    Chats {
        #[command(subcommand)]
        action: ChatsAction,
    },

    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },

    /// Create an account
    Signup {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        /// Display name for the new account
        #[arg(long)]
        name: Option<String>,
    },

    /// Sign in with a token from an external provider (e.g. google.com)
    LoginWith {
        #[arg(long)]
        provider: String,

        #[arg(long)]
        access_token: String,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Send a password reset email
    ResetPassword {
        #[arg(long)]
        email: String,
    },

    /// Show who is signed in
    Whoami,

    /// Show or switch the colour theme
    Theme {
        #[command(subcommand)]
        action: ThemeAction,
    },
}

#[derive(Subcommand)]
pub enum ChatsAction {
    /// List chats, newest first
    List,
    /// Start a new chat and make it active
    New,
    /// Make a chat active
    Select { id: String },
    /// Print a chat's messages (the active chat by default)
    Show { id: Option<String> },
}

#[derive(Subcommand)]
pub enum ThemeAction {
    Toggle,
    Show,
}
