//! Content hashing for sync operations.
//!
//! This module provides SHA256-based content hashing for change detection.
//! By hashing the serialized JSON of a note body, two copies of a note can be
//! compared without walking the document tree.

use sha2::{Digest, Sha256};

/// Compute a SHA256 hash of a note's content.
///
/// The value is rendered as compact JSON, then hashed. `serde_json::Value`
/// keeps object keys sorted, so equal documents always hash the same.
///
/// # Example
///
/// ```ignore
/// let hash = content_hash(&note.content);
/// // hash is something like "a1b2c3d4..."
/// ```
#[must_use]
pub fn content_hash(content: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check if content has changed since a hash was recorded.
///
/// Returns `true` if:
/// - There is no stored hash (never synced)
/// - The current hash differs from the stored hash
///
/// Returns `false` if the hashes match (no change).
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_hash_deterministic() {
        let content = json!({ "blocks": [{ "type": "paragraph", "text": "hello" }] });

        let hash1 = content_hash(&content);
        let hash2 = content_hash(&content);

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA256 produces 64 hex chars
    }

    #[test]
    fn test_content_hash_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();

        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        let hash1 = content_hash(&json!({ "text": "draft" }));
        let hash2 = content_hash(&json!({ "text": "final" }));

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_has_changed_no_stored_hash() {
        assert!(has_changed("abc123", None));
    }

    #[test]
    fn test_has_changed_different_hash() {
        assert!(has_changed("abc123", Some("xyz789")));
    }

    #[test]
    fn test_has_changed_same_hash() {
        assert!(!has_changed("abc123", Some("abc123")));
    }
}
