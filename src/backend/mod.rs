//! Extraction backends
//!
//! - `CliBackend`: runs a text-generation CLI as a subprocess (production)
//! - `MockBackend`: scripted responses (testing)

mod cli;
mod mock;
pub mod prompt;
mod traits;

pub use cli::CliBackend;
pub use mock::{mock_response, MockBackend};
pub use prompt::PromptBuilder;
pub use traits::{BackendError, ExtractionBackend, ExtractionRequest, FailureKind};
