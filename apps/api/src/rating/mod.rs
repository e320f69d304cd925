// Resume rating: the concrete pipeline definition, its prompt templates, the per-request
// coordinator, and the upload endpoint.

pub mod coordinator;
pub mod definition;
pub mod handlers;
pub mod prompts;

pub use coordinator::RunCoordinator;
pub use definition::{build_resume_pipeline, StageSettings};
