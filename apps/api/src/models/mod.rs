pub mod entry;
pub mod export;
