pub mod export;
pub mod grouping;

pub use export::{render_pdf, ExportError};
pub use grouping::*;
