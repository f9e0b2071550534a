//! Document processing pipeline: text extraction and lab-value parsing.

pub mod extraction;
pub mod labs;

pub use extraction::{extract_text, ExtractionError};
pub use labs::{overall_status, parse_lab_values};
