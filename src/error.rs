use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for the redesign client.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum RedesignError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Auth / Account ──────────────────────────────────────────────────
    #[error("auth: {0}")]
    Auth(#[from] AuthError),

    // ── Pipeline ────────────────────────────────────────────────────────
    #[error("pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    // ── Export ──────────────────────────────────────────────────────────
    #[error("export: {0}")]
    Export(#[from] ExportError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Auth / account errors ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(String),

    #[error("credential store: {0}")]
    Store(String),

    #[error("request failed: {0}")]
    Transport(String),
}

// ─── Pipeline errors ────────────────────────────────────────────────────────

/// Why the pipeline surfaced an authentication-required outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequiredReason {
    /// The anonymous free-run quota is exhausted.
    AnonymousLimit,
    /// The stored credential was rejected as invalid or expired.
    CredentialRejected,
}

/// The failure taxonomy of a pipeline attempt.
///
/// Every error a running attempt can produce is mapped to exactly one of
/// these kinds at the controller boundary; nothing escapes as an unhandled
/// rejection. `Validation` is raised locally before any network traffic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("missing image input: {slot}")]
    Validation { slot: &'static str },

    #[error("authentication required")]
    AuthRequired {
        reason: AuthRequiredReason,
        /// Whether a stored credential was cleared while mapping this error.
        credential_cleared: bool,
    },

    #[error("suggestion request timed out after {0} seconds")]
    TimedOut(u64),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("source image unavailable: {0}")]
    SourceUnavailable(String),

    #[error("service error (status {status}): {message}")]
    Service { status: u16, message: String },

    #[error("unexpected error: {0}")]
    Unknown(String),
}

// ─── Export errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export: no completed steps")]
    NoResults,

    #[error("save rejected: {0}")]
    Rejected(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, RedesignError>;
