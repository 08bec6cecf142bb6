pub mod builder;
pub mod models;

pub use builder::{build_manuscript, content_signature, manuscript_key};
pub use models::Manuscript;
