//! Service implementations for the Widn API.
//!
//! Provides service abstractions for completions (the relay core),
//! credential validation, and the model catalog.

mod completions;
mod credentials;
mod models;

pub use completions::{CollectSink, CompletionsService, EventSink};
pub use credentials::{CredentialsService, CREDENTIALS_VALID_MESSAGE};
pub use models::ModelsService;
