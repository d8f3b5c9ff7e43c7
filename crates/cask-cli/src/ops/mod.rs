pub mod context;
pub mod error;
pub mod pipeline;

pub use context::Context;
pub use error::{PipelineError, StageError};
pub use pipeline::{InstallOutcome, Pipeline, PipelineOptions, Stage};
