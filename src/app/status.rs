use std::sync::Arc;

use anyhow::Result;

use crate::auth::CredentialStore;
use crate::config::Config;
use crate::ui::style;
use crate::usage::{UsageGate, UsageState};

pub async fn status(config: &Config, store: Arc<CredentialStore>) -> Result<()> {
    let gate = UsageGate::new(config.service_url(), store);

    match gate.check_status().await {
        Ok(state) => render_status(config, state),
        Err(e) => {
            println!(
                "{}",
                style::warning(format!("Could not reach the service: {e}"))
            );
            render_status(config, gate.current());
        }
    }
    Ok(())
}

fn render_status(config: &Config, state: UsageState) {
    println!("{}", style::header("Redesign status"));
    println!("  Service: {}", style::url(config.service_url()));
    if state.authenticated {
        println!("  {}", style::success("Signed in — unlimited redesigns"));
    } else {
        println!(
            "  Anonymous — {} free redesigns remaining",
            style::value(state.remaining)
        );
    }
}
