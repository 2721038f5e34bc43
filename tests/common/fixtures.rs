//! Message fixtures and configuration for integration tests

use std::path::Path;

use channel_dl::Config;
use channel_dl::types::{FileAttachment, MediaRef, Message};
use chrono::{TimeZone, Utc};

/// A message carrying `name`; its media reference is `m<id>`
pub fn document(id: i64, name: &str, size: u64, text: &str) -> Message {
    Message {
        id,
        date: Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap() + chrono::Duration::hours(id),
        text: text.to_string(),
        file: Some(FileAttachment {
            name: Some(name.to_string()),
            size,
            mime_type: Some("application/octet-stream".to_string()),
            media: MediaRef(format!("m{id}")),
        }),
    }
}

/// A message without attachment
pub fn chatter(id: i64, text: &str) -> Message {
    Message {
        id,
        date: Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap() + chrono::Duration::hours(id),
        text: text.to_string(),
        file: None,
    }
}

/// Default configuration writing under `root`, without pacing delays
pub fn config_for(root: &Path) -> Config {
    let json = serde_json::json!({
        "download": {
            "download_dir": root,
            "inter_batch_delay": 0,
            "sequential_pacing": 0
        }
    });
    Config::from_json_str(&json.to_string()).unwrap()
}

