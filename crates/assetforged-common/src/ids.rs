//! Typed ID wrappers.
//!
//! Attachments are addressed by UUID; the newtype keeps them from being
//! mixed up with arbitrary strings at API boundaries.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for an attachment (original upload or generated variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentId(Uuid);

impl AttachmentId {
    /// Generate a new random attachment ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttachmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for AttachmentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AttachmentId> for Uuid {
    fn from(id: AttachmentId) -> Self {
        id.0
    }
}

impl FromStr for AttachmentId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| crate::Error::invalid_input(format!("not an attachment id: {s}")))
    }
}

impl std::fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_id_unique() {
        assert_ne!(AttachmentId::new(), AttachmentId::new());
    }

    #[test]
    fn test_attachment_id_parse_roundtrip() {
        let id = AttachmentId::new();
        let parsed: AttachmentId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_attachment_id_parse_invalid() {
        let err = "not-a-uuid".parse::<AttachmentId>().unwrap_err();
        assert!(matches!(err, crate::Error::InvalidInput(_)));
    }

    #[test]
    fn test_attachment_id_serde_transparent() {
        let uuid = Uuid::new_v4();
        let id = AttachmentId::from(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }
}
