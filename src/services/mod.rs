pub mod export;
pub mod generation;
pub mod http;
pub mod suggestions;

pub use export::{ResultExporter, SavedResult};
pub use generation::StepProcessor;
pub use http::{
    ANONYMOUS_COOKIE_NAME, anonymous_cookie, build_service_client, sanitize_api_error,
};
pub use suggestions::{SUGGESTION_COUNT, Suggestion, SuggestionFetcher};
