pub use self::error::{Error, Result};
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use hanzi_core::AppConfig;

mod cli;
mod commands;
mod logging;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Cli::parse();

    match args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), hanzi_core::version());
            Ok(())
        }
        Commands::Login { email, password } => commands::login(config()?, &email, &password).await,
        Commands::Register(register) => commands::register(config()?, register).await,
        Commands::Logout => commands::logout(config()?).await,
        Commands::ResetPassword { email } => commands::reset_password(config()?, &email).await,
        Commands::Whoami => commands::whoami(config()?).await,
        Commands::Words(command) => commands::words(config()?, command).await,
        Commands::Images(command) => commands::images(config()?, command).await,
        Commands::Notifications(command) => commands::notifications(config()?, command).await,
        Commands::Chat { message, context } => {
            commands::chat(config()?, &message, context).await
        }
    }
}

fn config() -> Result<AppConfig> {
    Ok(AppConfig::from_env()?)
}
