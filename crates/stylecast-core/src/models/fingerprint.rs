use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Identifies a selected file by name, size and modification time so the
/// same photo is never submitted twice while a submission is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// `modified_ms` is the file's modification time in milliseconds since the epoch.
    pub fn from_file(name: &str, size: u64, modified_ms: i64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}:{}", name, size, modified_ms).as_bytes());
        let digest = hasher.finalize();
        Fingerprint(hex::encode(&digest[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable() {
        let a = Fingerprint::from_file("photo.jpg", 1024, 1_700_000_000_000);
        let b = Fingerprint::from_file("photo.jpg", 1024, 1_700_000_000_000);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_fingerprint_changes_with_any_component() {
        let base = Fingerprint::from_file("photo.jpg", 1024, 1);
        assert_ne!(base, Fingerprint::from_file("photo2.jpg", 1024, 1));
        assert_ne!(base, Fingerprint::from_file("photo.jpg", 1025, 1));
        assert_ne!(base, Fingerprint::from_file("photo.jpg", 1024, 2));
    }
}
