use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an aggregate instance.
///
/// The identifier is an opaque string chosen by the caller when the
/// aggregate is created. It never changes afterwards and partitions the
/// event log: every event of an aggregate carries this value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(String);

impl AggregateId {
    /// Creates an aggregate ID from a caller-supplied string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new random aggregate ID (UUID v4, hyphenated).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AggregateId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AggregateId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<Uuid> for AggregateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

impl AsRef<str> for AggregateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_creates_unique_ids() {
        let id1 = AggregateId::generate();
        let id2 = AggregateId::generate();
        assert_ne!(id1, id2);
        assert!(Uuid::parse_str(id1.as_str()).is_ok());
    }

    #[test]
    fn new_preserves_caller_value() {
        let id = AggregateId::new("SKU-001");
        assert_eq!(id.as_str(), "SKU-001");
        assert_eq!(id.to_string(), "SKU-001");
    }

    #[test]
    fn blank_detection() {
        assert!(AggregateId::new("").is_blank());
        assert!(AggregateId::new("   ").is_blank());
        assert!(!AggregateId::new("p-1").is_blank());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = AggregateId::new("p-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"p-42\"");
        let deserialized: AggregateId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}
