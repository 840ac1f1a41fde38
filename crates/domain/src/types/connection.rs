//! Transport connection status

use serde::{Deserialize, Serialize};

/// Status of a pooled transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Handshake in progress
    Connecting,
    /// Usable for commands
    Ready,
    /// Closed locally or by the peer
    Closed,
}

crate::impl_domain_status_conversions!(ConnectionStatus {
    Connecting => "connecting",
    Ready => "ready",
    Closed => "closed",
});

impl ConnectionStatus {
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }
}
