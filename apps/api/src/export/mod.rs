pub mod handlers;
pub mod lifecycle;
#[cfg(test)]
pub mod memory;
pub mod notify;
pub mod repo;
pub mod source;

pub use lifecycle::{ExportPolicy, ExportService};
