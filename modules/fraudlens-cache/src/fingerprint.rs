use sha2::{Digest, Sha256};

const FINGERPRINT_LEN: usize = 32;

/// Fingerprint for text content. Normalized (trimmed, lower-cased) so
/// whitespace and casing differences still hit the same cache entry.
pub fn fingerprint_text(text: &str) -> String {
    let normalized = text.trim().to_lowercase();
    digest(normalized.as_bytes())
}

/// Fingerprint for binary content (uploaded images, audio). Raw bytes, no
/// normalization.
pub fn fingerprint_bytes(data: &[u8]) -> String {
    digest(data)
}

fn digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let full = hex::encode(hasher.finalize());
    full[..FINGERPRINT_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_fingerprint_normalizes_case_and_whitespace() {
        let a = fingerprint_text("  Your SSN will be SUSPENDED  ");
        let b = fingerprint_text("your ssn will be suspended");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn distinct_content_gets_distinct_fingerprints() {
        assert_ne!(fingerprint_text("hello"), fingerprint_text("goodbye"));
        assert_ne!(fingerprint_bytes(b"\x00\x01"), fingerprint_bytes(b"\x00\x02"));
    }

    #[test]
    fn byte_fingerprint_is_not_normalized() {
        assert_ne!(fingerprint_bytes(b"HELLO"), fingerprint_bytes(b"hello"));
    }
}
