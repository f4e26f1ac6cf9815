//! Prefixed identifier generation.
//!
//! Identifiers follow the host's pattern: `prefix_ulid`, for example
//! `msg_01hqxyz...` for messages. The engine itself never mints real host
//! ids; ULID-backed generation exists for test fixtures, while injected
//! synthetic messages use deterministic ids so that repeated transforms
//! produce byte-identical prefixes for prompt caching.

use ulid::Ulid;

/// Known identifier prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    Session,
    Message,
    Part,
}

impl IdPrefix {
    /// Get the string prefix for this identifier type.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::Session => "ses",
            IdPrefix::Message => "msg",
            IdPrefix::Part => "prt",
        }
    }
}

/// Identifier generation utilities.
pub struct Identifier;

impl Identifier {
    /// Generate a new ascending identifier (newer = larger).
    pub fn ascending(prefix: IdPrefix) -> String {
        let ulid = Ulid::new();
        format!("{}_{}", prefix.as_str(), ulid.to_string().to_lowercase())
    }

    /// Generate a deterministic synthetic identifier.
    ///
    /// The discriminator names the logical slot the id fills (for example
    /// `"context"` for the per-turn injection message), so the same slot
    /// yields the same id on every transform.
    pub fn synthetic(prefix: IdPrefix, discriminator: &str) -> String {
        format!("{}_dcp_{}", prefix.as_str(), discriminator)
    }

    /// Check whether an id was minted by [`Identifier::synthetic`].
    pub fn is_synthetic(id: &str) -> bool {
        id.splitn(2, '_')
            .nth(1)
            .is_some_and(|rest| rest.starts_with("dcp_"))
    }

    /// Generate a session ID.
    pub fn session() -> String {
        Self::ascending(IdPrefix::Session)
    }

    /// Generate a message ID.
    pub fn message() -> String {
        Self::ascending(IdPrefix::Message)
    }

    /// Generate a part ID.
    pub fn part() -> String {
        Self::ascending(IdPrefix::Part)
    }
}
