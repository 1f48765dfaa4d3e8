// Display labels for hardware channels. Channel ids are zero-based, labels
// are one-based.

use std::collections::BTreeMap;

const MAX_NAME_LEN: usize = 50;

fn custom<'a>(channel: u32, names: &'a BTreeMap<String, String>) -> Option<&'a str> {
    names
        .get(&channel.to_string())
        .map(String::as_str)
        .filter(|name| !name.is_empty())
}

/// `"Donor (Ch3)"` when a custom name exists, otherwise `"Channel 3"`.
pub fn channel_name(channel: u32, names: &BTreeMap<String, String>) -> String {
    match custom(channel, names) {
        Some(name) => format!("{} (Ch{})", name, channel + 1),
        None => format!("Channel {}", channel + 1),
    }
}

/// Like [`channel_name`] but falls back to `"Ch 3"`.
pub fn channel_short_name(channel: u32, names: &BTreeMap<String, String>) -> String {
    match custom(channel, names) {
        Some(name) => format!("{} (Ch{})", name, channel + 1),
        None => format!("Ch {}", channel + 1),
    }
}

pub fn validate_channel_name(name: &str) -> bool {
    !name.is_empty() && name.chars().count() <= MAX_NAME_LEN
}

/// Makes a label safe to embed in a file name.
pub fn sanitize_channel_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' => '_',
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => c,
            _ => '_',
        })
        .collect()
}
