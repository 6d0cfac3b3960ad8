use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::warn;

use crate::auth::CredentialStore;
use crate::config::Config;
use crate::error::{AuthRequiredReason, PipelineError};
use crate::media::{InputSlots, LocalImage};
use crate::pipeline::{PipelineController, PipelineState, RunOutcome, StartDenied};
use crate::services::{ResultExporter, SUGGESTION_COUNT};
use crate::ui::style;

/// Drive one full pipeline attempt from the command line.
///
/// The command is a pure projection of controller state: it subscribes to
/// transitions for progress output and reads the history afterwards; all
/// attempt-scoped state lives in the controller.
pub async fn run(
    config: &Config,
    store: Arc<CredentialStore>,
    original: PathBuf,
    inspiration: PathBuf,
    save: Option<PathBuf>,
) -> Result<()> {
    let slots = InputSlots::new();
    slots.set_original(load_input(&original, "original")?);
    slots.set_inspiration(load_input(&inspiration, "inspiration")?);

    let controller = PipelineController::from_config(config, Arc::clone(&store));

    // Initial status check. A transport fault is fail-soft: keep the assumed
    // state and let the server be the judge when the run starts.
    if let Err(e) = controller.usage().check_status().await {
        warn!(error = %e, "usage check failed, continuing with assumed state");
    }
    let usage = controller.usage().current();
    if !usage.authenticated {
        println!(
            "{}",
            style::dim(format!(
                "Anonymous mode — {} free redesigns remaining",
                usage.remaining
            ))
        );
    }

    let mut states = WatchStream::from_changes(controller.subscribe());
    let progress = tokio::spawn(async move {
        while let Some(state) = states.next().await {
            match &state {
                PipelineState::AwaitingSuggestions => {
                    println!("{}", style::dim("Analyzing both photos for suggestions..."));
                }
                PipelineState::Running { step } => {
                    println!(
                        "{} {}",
                        style::accent(format!("[{}/{}]", step + 1, SUGGESTION_COUNT)),
                        style::dim("applying suggestion...")
                    );
                }
                PipelineState::Succeeded | PipelineState::Failed(_) => break,
                PipelineState::Idle => {}
            }
        }
    });

    let outcome = controller.start(&slots).await;
    progress.abort();

    match outcome {
        RunOutcome::Succeeded(report) => {
            println!("{}", style::success("Redesign complete"));
            for step in controller.history().iter() {
                println!(
                    "  {} {} — {}",
                    style::accent(format!("{}.", step.index + 1)),
                    style::header(&step.suggestion.title),
                    style::dim(&step.suggestion.description)
                );
            }
            println!(
                "Final image: {}",
                style::url(report.final_image.describe())
            );

            if let Some(dest) = save {
                export_result(config, &controller, store, &dest).await?;
            }
            Ok(())
        }
        RunOutcome::AuthRequired {
            reason,
            credential_cleared,
        } => {
            if credential_cleared {
                println!("{}", style::warning("Your session expired and was cleared."));
            }
            let message = match reason {
                AuthRequiredReason::AnonymousLimit => {
                    "All free redesigns are used up. Run `redesign login` or `redesign register` to continue."
                }
                AuthRequiredReason::CredentialRejected => {
                    "Authentication required. Run `redesign login` to sign in again."
                }
            };
            println!("{}", style::warning(message));
            Ok(())
        }
        RunOutcome::Failed(error) => {
            println!("{}", style::error(format!("Error: {}", user_message(&error))));
            bail!("redesign attempt failed")
        }
        RunOutcome::Rejected(StartDenied::MissingInput { slot }) => {
            let error = PipelineError::Validation { slot };
            println!("{}", style::error(format!("Error: {error}")));
            bail!("both images are required before a redesign can start")
        }
        RunOutcome::Rejected(StartDenied::Busy) => bail!("an attempt is already running"),
        RunOutcome::Abandoned => Ok(()),
    }
}

async fn export_result(
    config: &Config,
    controller: &PipelineController,
    store: Arc<CredentialStore>,
    dest: &Path,
) -> Result<()> {
    let exporter = ResultExporter::new(config.service_url(), store);
    let saved = exporter.save(&controller.history()).await?;
    exporter.download(&saved.download_url, dest).await?;

    println!(
        "{} {}",
        style::success("Saved result to"),
        style::value(dest.display())
    );
    if let Some(text) = saved.clipboard_content {
        println!("{}", style::header("Suggestions:"));
        println!("{text}");
    }
    Ok(())
}

fn load_input(path: &Path, label: &str) -> Result<LocalImage> {
    let image =
        LocalImage::from_path(path).with_context(|| format!("loading {label} image"))?;
    if image.is_heic() {
        println!(
            "{}",
            style::dim(format!(
                "{label}: HEIC image detected — the server converts it during processing"
            ))
        );
    }
    Ok(image)
}

/// Map taxonomy kinds to the wording the user sees.
fn user_message(error: &PipelineError) -> String {
    match error {
        PipelineError::TimedOut(_) => {
            "The server took too long to respond. Please try again later.".into()
        }
        PipelineError::MalformedResponse(_) => {
            "Unable to parse the server response. Please try again.".into()
        }
        other => other.to_string(),
    }
}
