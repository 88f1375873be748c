use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = parlor_common::id::prefixed_ulid("run");
/// assert!(id.starts_with("run_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new().to_string())
}

/// Marker trait for types that represent a prefixed ID.
pub trait PrefixedId {
    const PREFIX: &'static str;

    fn generate() -> String {
        prefixed_ulid(Self::PREFIX)
    }
}

/// Well-known ID prefixes.
pub mod prefix {
    /// Per-process gateway run identifier.
    pub const RUN: &str = "run";
    /// Single-use WebSocket connection ticket.
    pub const TICKET: &str = "wst";
    /// Broadcast event identity (idempotency key).
    pub const EVENT: &str = "evt";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_ulid_format() {
        let id = prefixed_ulid("run");
        assert!(id.starts_with("run_"));
        // ULID is 26 chars, plus prefix + underscore
        assert_eq!(id.len(), 4 + 26);
    }

    #[test]
    fn test_uniqueness() {
        let a = prefixed_ulid("run");
        let b = prefixed_ulid("run");
        assert_ne!(a, b);
    }
}
