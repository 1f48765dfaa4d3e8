pub mod constants;
pub mod decoder;
pub mod error;
pub mod format;
pub mod header;
pub mod reader;
pub mod sentinel;
pub mod timeline;
