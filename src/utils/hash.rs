//! Digest helpers shared by the cache manager, sort memo and render cache.

/// Incremental digest over a sequence of string parts.
///
/// Parts are length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
#[derive(Default)]
pub struct Digest {
    hasher: blake3::Hasher,
}

impl Digest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part(mut self, part: impl AsRef<[u8]>) -> Self {
        let bytes = part.as_ref();
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
        self
    }

    pub fn parts<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        for part in parts {
            self = self.part(part);
        }
        self
    }

    /// Full 64-char lowercase hex digest.
    pub fn hex(&self) -> String {
        hex::encode(self.hasher.finalize().as_bytes())
    }

    /// First 8 bytes of the digest as an integer.
    pub fn short(&self) -> u64 {
        let bytes = self.hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&bytes.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }
}

/// Hex digest of a single string.
#[inline]
pub fn hash_str(s: &str) -> String {
    Digest::new().part(s).hex()
}

/// Hex digest of raw bytes (file contents).
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_str_stable() {
        assert_eq!(hash_str("pages/blog"), hash_str("pages/blog"));
        assert_ne!(hash_str("pages/blog"), hash_str("pages/blog/"));
        assert_eq!(hash_str("x").len(), 64);
    }

    #[test]
    fn test_parts_are_length_prefixed() {
        let a = Digest::new().parts(["ab", "c"]).hex();
        let b = Digest::new().parts(["a", "bc"]).hex();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_matches_prefix() {
        let d = Digest::new().part("seed");
        assert_eq!(d.short(), Digest::new().part("seed").short());
        assert_ne!(d.short(), Digest::new().part("other").short());
    }

    #[test]
    fn test_hash_bytes() {
        assert_eq!(hash_bytes(b"abc"), hex::encode(blake3::hash(b"abc").as_bytes()));
    }
}
