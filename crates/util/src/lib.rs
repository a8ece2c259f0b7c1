pub mod text_processing;

pub use text_processing::{redact_sensitive, redact_sensitive_with, truncate_preview};
