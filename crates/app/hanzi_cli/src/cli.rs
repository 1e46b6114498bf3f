use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "hanzi", version, about = "Hanzi Cards: Chinese vocabulary notebook")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the version.
    Version,

    /// Sign in with email and password.
    Login {
        #[arg(long, env = "HANZI_EMAIL")]
        email: String,
        #[arg(long, env = "HANZI_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account.
    Register(RegisterArgs),

    /// Sign out and forget the cached session.
    Logout,

    /// Send a password-reset email.
    ResetPassword {
        #[arg(long)]
        email: String,
    },

    /// Show the signed-in user.
    Whoami,

    /// Manage vocabulary.
    #[command(subcommand)]
    Words(WordsCommand),

    /// Manage uploaded images.
    #[command(subcommand)]
    Images(ImagesCommand),

    /// Read the notification feed.
    #[command(subcommand)]
    Notifications(NotificationsCommand),

    /// Ask the assistant something.
    Chat {
        message: String,
        /// How many of your newest words to send as context.
        #[arg(long, default_value_t = 10)]
        context: usize,
    },
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "HANZI_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long)]
    pub confirm_password: String,
}

#[derive(Subcommand, Debug)]
pub enum WordsCommand {
    /// List words, newest first.
    List {
        /// Only words whose hanzi contains this text.
        #[arg(long, short)]
        query: Option<String>,
    },

    /// Add a word.
    Add {
        hanzi: String,
        /// Thai meaning.
        meaning: String,
        #[arg(long)]
        pinyin: Option<String>,
        #[arg(long)]
        hsk: Option<u8>,
    },

    /// Edit a word. Omitted fields keep their value.
    Edit {
        id: String,
        #[arg(long)]
        hanzi: Option<String>,
        #[arg(long)]
        meaning: Option<String>,
        /// An empty value clears the pinyin.
        #[arg(long)]
        pinyin: Option<String>,
        #[arg(long, conflicts_with = "clear_hsk")]
        hsk: Option<u8>,
        #[arg(long)]
        clear_hsk: bool,
    },

    /// Delete a word.
    Rm { id: String },

    /// Upload an image file and attach it to a word.
    Image { id: String, path: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum ImagesCommand {
    /// List uploaded images, newest first.
    List,
    /// Upload an image file.
    Upload { path: PathBuf },
    /// Delete an image record.
    Rm { id: String },
}

#[derive(Subcommand, Debug)]
pub enum NotificationsCommand {
    /// Show the feed, newest first.
    List,
    /// Mark a notification as read.
    Read { id: String },
    /// Delete a notification.
    Rm { id: String },
}
