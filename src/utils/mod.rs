pub mod channel_names;
pub mod conf_helper;
pub mod format_helper;
