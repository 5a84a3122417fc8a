use crate::error::{CacheError, Result};
use sha2::{Digest, Sha256};
use std::fmt;

/// Content address of one (source text, wear, model) inference.
///
/// Each field is fed to sha256 with its byte length in front, so no two
/// distinct field tuples can collide by shifting a separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn compute(
        source_text: &str,
        wear_id: &str,
        model_name: &str,
        max_output_tokens: Option<u32>,
    ) -> Self {
        let tokens = max_output_tokens.map_or_else(|| "none".to_string(), |t| t.to_string());
        let mut hasher = Sha256::new();
        for field in [source_text, wear_id, model_name, tokens.as_str()] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        Self(hex(&hasher.finalize()))
    }

    /// Accept a previously rendered fingerprint (64 lowercase hex chars)
    pub fn parse(raw: &str) -> Result<Self> {
        let valid = raw.len() == 64
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(CacheError::InvalidFingerprint(raw.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-level shard directory names taken from the digest prefix
    #[must_use]
    pub fn shard_dirs(&self) -> (&str, &str) {
        (&self.0[0..2], &self.0[2..4])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::{assert_eq, assert_ne};

    #[test]
    fn deterministic() {
        let a = Fingerprint::compute("def f(): pass", "security", "gpt", Some(512));
        let b = Fingerprint::compute("def f(): pass", "security", "gpt", Some(512));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn every_field_participates() {
        let base = Fingerprint::compute("src", "security", "gpt", None);
        assert_ne!(base, Fingerprint::compute("src ", "security", "gpt", None));
        assert_ne!(base, Fingerprint::compute("src", "readability", "gpt", None));
        assert_ne!(base, Fingerprint::compute("src", "security", "gpt-4", None));
        assert_ne!(base, Fingerprint::compute("src", "security", "gpt", Some(100)));
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let a = Fingerprint::compute("ab", "c", "m", None);
        let b = Fingerprint::compute("a", "bc", "m", None);
        assert_ne!(a, b);
    }

    #[test]
    fn parse_round_trips_and_rejects_garbage() {
        let fp = Fingerprint::compute("x", "w", "m", None);
        assert_eq!(Fingerprint::parse(fp.as_str()).unwrap(), fp);
        assert!(Fingerprint::parse("ABC").is_err());
        assert!(Fingerprint::parse(&"G".repeat(64)).is_err());
    }
}
