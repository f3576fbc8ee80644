use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Webhook spam run configuration, loadable from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpamConfig {
    pub webhook_url: String,
    pub message: String,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    pub count: u64,
    #[serde(default)]
    pub unlimited: bool,
    pub delay_ms: u64,
}

impl Default for SpamConfig {
    fn default() -> Self {
        Self {
            webhook_url: "https://httpbin.org/post".to_string(),
            message: "Hello from WebhookSpammer!".to_string(),
            file_path: None,
            count: 10,
            unlimited: false,
            delay_ms: 1000,
        }
    }
}

impl SpamConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Exactly one of {bounded count, unlimited} is active at a time.
    pub fn target(&self) -> SendTarget {
        if self.unlimited {
            SendTarget::Unbounded
        } else {
            SendTarget::Bounded(self.count)
        }
    }
}

/// How many attempts a run makes: a fixed count, or keep going until stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTarget {
    Bounded(u64),
    Unbounded,
}

impl fmt::Display for SendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendTarget::Bounded(count) => write!(f, "{count} messages"),
            SendTarget::Unbounded => write!(f, "unlimited"),
        }
    }
}

/// A selected file held in memory for the duration of a run
#[derive(Debug, Clone)]
pub struct FileAttachment {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// What a single attempt delivers to the endpoint
#[derive(Debug, Clone)]
pub enum Payload {
    Text(String),
    File { name: String, bytes: Vec<u8> },
}

/// Controller-facing settings resolved from a `SpamConfig`
#[derive(Debug, Clone)]
pub struct SpamSettings {
    pub url: String,
    pub message: String,
    pub attachment: Option<FileAttachment>,
    pub target: SendTarget,
    pub delay_ms: u64,
}

impl Default for SpamSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            message: String::new(),
            attachment: None,
            target: SendTarget::Bounded(10),
            delay_ms: 1000,
        }
    }
}

impl SpamSettings {
    pub fn from_config(config: &SpamConfig, attachment: Option<FileAttachment>) -> Self {
        Self {
            url: config.webhook_url.clone(),
            message: config.message.clone(),
            attachment,
            target: config.target(),
            delay_ms: config.delay_ms,
        }
    }

    /// File mode is sticky while an attachment is selected; text otherwise.
    pub fn payload_for_attempt(&self) -> Payload {
        match &self.attachment {
            Some(file) => Payload::File {
                name: file.name.clone(),
                bytes: file.bytes.clone(),
            },
            None => Payload::Text(self.message.clone()),
        }
    }
}
