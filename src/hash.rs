//! Bucket hash: an 8-bit shift-add digest used directly as the bucket index.

/// Number of buckets. Equal to the full range of the 8-bit hash, so the
/// digest indexes the bucket array without any modulo step.
pub const NUM_BUCKETS: usize = 256;

/// The part of `key` before its first NUL byte (all of it if there is none).
#[inline]
pub fn until_nul(key: &[u8]) -> &[u8] {
    match key.iter().position(|&b| b == 0) {
        Some(end) => &key[..end],
        None => key,
    }
}

/// Hash `key` into a bucket index.
///
/// Each byte up to the first NUL is folded in as `h = (h << 5) + b`, with
/// both the shift and the addition truncated to 8 bits.
#[inline]
pub fn bucket_hash(key: &[u8]) -> u8 {
    until_nul(key)
        .iter()
        .fold(0u8, |h, &b| (h << 5).wrapping_add(b))
}
