use std::fmt;

/// Number of hex chars kept from the digest. Plenty for identity, short
/// enough to read in a directory listing.
const HEX_LEN: usize = 32;

/// Content identity of a graph node or step instance.
///
/// Stable across runs and process restarts; used for on-disk naming, so the
/// rendering must never change once released.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order-sensitive hash over a tuple of stringifiable values.
///
/// Each element is length-delimited before hashing so that element
/// boundaries matter: ("a", "bc") and ("ab", "c") must not collide.
#[derive(Default)]
pub struct TupleHasher {
    inner: blake3::Hasher,
}

impl TupleHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, part: impl fmt::Display) -> &mut Self {
        let s = part.to_string();
        self.inner.update(&(s.len() as u64).to_le_bytes());
        self.inner.update(s.as_bytes());
        self
    }

    pub fn finish(&self) -> ContentHash {
        let hex = self.inner.finalize().to_hex();
        ContentHash(hex.as_str()[..HEX_LEN].to_owned())
    }
}

/// Hash a single value.
pub fn hash_one(part: impl fmt::Display) -> ContentHash {
    let mut h = TupleHasher::new();
    h.push(part);
    h.finish()
}

/// Hash an ordered pair.
pub fn hash_pair(a: impl fmt::Display, b: impl fmt::Display) -> ContentHash {
    let mut h = TupleHasher::new();
    h.push(a).push(b);
    h.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_across_hasher_instances() {
        let mut a = TupleHasher::new();
        a.push("x").push(12).push(0.5);
        let mut b = TupleHasher::new();
        b.push("x").push(12).push(0.5);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn test_order_sensitive() {
        let mut a = TupleHasher::new();
        a.push("x").push("y");
        let mut b = TupleHasher::new();
        b.push("y").push("x");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_element_boundaries_matter() {
        assert_ne!(hash_pair("a", "bc"), hash_pair("ab", "c"));
    }

    #[test]
    fn test_rendering_is_fixed_length_hex() {
        let h = hash_one("anything");
        assert_eq!(h.as_str().len(), HEX_LEN);
        assert!(h.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
