pub mod backoff;
pub mod document;
pub mod extractor;
pub mod inference;
pub mod orchestrator;
pub mod precheck;
pub mod schema;
pub mod staging;
pub mod types;

pub use document::{DocumentError, DocumentPart};
pub use extractor::{ExtractionEngine, ExtractionError};
pub use orchestrator::{LabReportPipeline, PipelineError, PipelineErrorKind, PipelineStage};
pub use precheck::PreCheckGate;
pub use staging::StagedUpload;
pub use types::{ExtractionResult, LabField, LabResultRow};
