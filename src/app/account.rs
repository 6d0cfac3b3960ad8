use std::sync::Arc;

use anyhow::{Context, Result};
use dialoguer::{Input, Password};

use crate::auth::{AuthClient, CredentialStore};
use crate::config::Config;
use crate::ui::style;

pub async fn login(
    config: &Config,
    store: Arc<CredentialStore>,
    email: Option<String>,
) -> Result<()> {
    let client = AuthClient::new(config.service_url());
    let (email, password) = prompt_credentials(email)?;

    let session = client.login(&email, &password).await?;
    store.set_token(&session.access_token)?;

    println!(
        "{} {}",
        style::success("Logged in as"),
        style::value(&session.user.email)
    );
    Ok(())
}

pub async fn register(
    config: &Config,
    store: Arc<CredentialStore>,
    email: Option<String>,
) -> Result<()> {
    let client = AuthClient::new(config.service_url());
    let (email, password) = prompt_credentials(email)?;

    let session = client.register(&email, &password).await?;
    store.set_token(&session.access_token)?;

    println!(
        "{} {}",
        style::success("Account created for"),
        style::value(&session.user.email)
    );
    println!("{}", style::dim("Redesigns are now unlimited."));
    Ok(())
}

pub async fn logout(config: &Config, store: Arc<CredentialStore>) -> Result<()> {
    if let Some(token) = store.token() {
        // Server-side teardown is best-effort; the local token goes either way.
        AuthClient::new(config.service_url()).logout(&token).await;
    }
    store.clear_token()?;

    println!("{}", style::success("Logged out"));
    Ok(())
}

fn prompt_credentials(email: Option<String>) -> Result<(String, String)> {
    let email = match email {
        Some(email) => email,
        None => Input::new()
            .with_prompt("Email")
            .interact_text()
            .context("reading email")?,
    };
    let password = Password::new()
        .with_prompt("Password")
        .interact()
        .context("reading password")?;
    Ok((email, password))
}
