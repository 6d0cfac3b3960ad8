#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod services;
pub mod ui;
pub mod usage;

pub use config::Config;
pub use error::{PipelineError, RedesignError, Result};
pub use pipeline::{PipelineController, PipelineState, RunOutcome};
