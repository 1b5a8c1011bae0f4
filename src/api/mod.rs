pub mod format;
pub mod docs;
