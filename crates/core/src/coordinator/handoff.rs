//! Hand-off of a chosen candidate to whatever starts downloads.

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandoffError {
    #[error("Not a magnet or http(s) link: {0}")]
    InvalidLink(String),

    #[error("Download queue is full")]
    ChannelFull,

    #[error("Download queue is closed")]
    ChannelClosed,

    #[error("No download handoff configured")]
    NotConfigured,
}

/// Receives links to download. Fire and forget: no progress comes back.
pub trait DownloadHandoff: Send + Sync {
    fn hand_off(&self, link: &str) -> Result<(), HandoffError>;
}

/// Accept `magnet:` URIs and http(s) URLs only.
pub fn validate_link(link: &str) -> Result<(), HandoffError> {
    let link = link.trim();
    let lower = link.to_ascii_lowercase();
    let valid = (lower.starts_with("magnet:?") && lower.len() > "magnet:?".len())
        || ((lower.starts_with("http://") || lower.starts_with("https://"))
            && reqwest::Url::parse(link).is_ok());
    if valid {
        Ok(())
    } else {
        Err(HandoffError::InvalidLink(link.to_string()))
    }
}

/// Pushes links onto a bounded tokio channel without waiting.
#[derive(Debug, Clone)]
pub struct ChannelHandoff {
    sender: mpsc::Sender<String>,
}

impl ChannelHandoff {
    pub fn new(sender: mpsc::Sender<String>) -> Self {
        Self { sender }
    }

    /// A handoff plus the receiving end of its queue.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self::new(sender), receiver)
    }
}

impl DownloadHandoff for ChannelHandoff {
    fn hand_off(&self, link: &str) -> Result<(), HandoffError> {
        self.sender.try_send(link.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => HandoffError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => HandoffError::ChannelClosed,
        })?;
        debug!(link = %link, "Queued download");
        Ok(())
    }
}
