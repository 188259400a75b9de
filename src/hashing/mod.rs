//! BLAKE3-based identifiers.
//!
//! Article and interest ids are content-derived so that re-fetching the same article or
//! reloading the same interest list yields the same keys across runs and restarts.

use blake3::Hasher;

/// Hex characters kept from the article hash.
const ARTICLE_ID_HEX_LEN: usize = 16;

/// Hex characters kept from the interest hash.
const INTEREST_ID_HEX_LEN: usize = 12;

#[inline]
pub fn hash_text(text: &str) -> [u8; 32] {
    *blake3::hash(text.as_bytes()).as_bytes()
}

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// Used for jitter seeds and other non-key purposes; collisions are harmless there.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

fn short_hex(hash: &blake3::Hash, len: usize) -> String {
    let hex = hash.to_hex();
    hex.as_str()[..len].to_string()
}

/// Id for an article with a canonical URL.
pub fn article_id_from_url(canonical_url: &str) -> String {
    format!(
        "a-{}",
        short_hex(&blake3::hash(canonical_url.as_bytes()), ARTICLE_ID_HEX_LEN)
    )
}

/// Id for an article without a URL, derived from its content.
pub fn article_id_from_content(title: &str, body: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(title.trim().as_bytes());
    hasher.update(b"\n");
    hasher.update(body.trim().as_bytes());
    format!("a-{}", short_hex(&hasher.finalize(), ARTICLE_ID_HEX_LEN))
}

/// Id for an interest: `prefix` plus a hash of the case-folded text.
pub fn interest_id(prefix: &str, normalized_text: &str) -> String {
    let folded = normalized_text.to_lowercase();
    format!(
        "{}-{}",
        prefix,
        short_hex(&blake3::hash(folded.as_bytes()), INTEREST_ID_HEX_LEN)
    )
}

/// Maps `seed` to a value in `[0, 1)`.
#[inline]
pub fn unit_interval(seed: u64) -> f64 {
    let mixed = hash_to_u64(&seed.to_le_bytes());
    (mixed >> 11) as f64 / (1u64 << 53) as f64
}
