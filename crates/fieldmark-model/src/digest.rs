//! Document digests (versioned).
//!
//! Reconciliation results are cached per document version, so the engine
//! needs a stable way to tell two revisions of the same document apart.
//!
//! For v1 we use a **simple, deterministic, non-cryptographic** digest:
//!
//! - algorithm: **FNV-1a 64-bit**
//! - input: the raw bytes of the document as read
//! - output: `"fnv1a64:<16 lowercase hex digits>"`
//!
//! This digest is **not** a security primitive. It only identifies
//! document versions for cache invalidation.

/// Prefix used in serialized digests.
pub const DIGEST_V1_PREFIX: &str = "fnv1a64:";

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x00000100000001b3;

/// Compute a v1 digest (FNV-1a 64-bit) over arbitrary bytes.
pub fn fnv1a64_digest_bytes(bytes: &[u8]) -> String {
    let mut hash = FNV_OFFSET_BASIS;
    for b in bytes {
        hash ^= (*b) as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    format!("{DIGEST_V1_PREFIX}{hash:016x}")
}

/// Digest over a sequence of string parts.
///
/// Parts are length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn fnv1a64_digest_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hash = FNV_OFFSET_BASIS;
    let mut feed = |bytes: &[u8]| {
        for b in bytes {
            hash ^= (*b) as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    };

    for part in parts {
        feed(&(part.len() as u64).to_le_bytes());
        feed(part.as_bytes());
    }

    format!("{DIGEST_V1_PREFIX}{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_offset_basis() {
        assert_eq!(fnv1a64_digest_bytes(b""), "fnv1a64:cbf29ce484222325");
    }

    #[test]
    fn known_vector() {
        // FNV-1a 64 of "a"
        assert_eq!(fnv1a64_digest_bytes(b"a"), "fnv1a64:af63dc4c8601ec8c");
    }

    #[test]
    fn parts_are_length_prefixed() {
        let a = fnv1a64_digest_parts(["ab", "c"]);
        let b = fnv1a64_digest_parts(["a", "bc"]);
        assert_ne!(a, b);
        assert_eq!(a, fnv1a64_digest_parts(["ab", "c"]));
    }
}
