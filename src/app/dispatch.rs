use std::sync::Arc;

use anyhow::Result;

use crate::auth::CredentialStore;
use crate::cli::{Cli, Commands};
use crate::config::Config;

use super::{account, run, status};

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    let store = Arc::new(CredentialStore::load_or_init(&config.credentials_path())?);

    match cli.command {
        Commands::Run {
            original,
            inspiration,
            save,
        } => run::run(&config, store, original, inspiration, save).await,
        Commands::Status => status::status(&config, store).await,
        Commands::Login { email } => account::login(&config, store, email).await,
        Commands::Register { email } => account::register(&config, store, email).await,
        Commands::Logout => account::logout(&config, store).await,
    }
}
