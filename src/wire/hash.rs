//! 64-bit identifiers and the payload checksum.

const PRIME_1: u64 = 11_400_714_785_074_694_791;
const PRIME_2: u64 = 14_029_467_366_897_019_727;

/// Generate a random 64-bit identifier.
///
/// Drawn from the thread-local CSPRNG, so collisions within a process are
/// astronomically rare. No ordering or structure is implied.
pub fn random_id() -> u64 {
    rand::random()
}

/// Compute the 64-bit checksum carried in the frame header.
///
/// XOR-multiply-rotate over the payload bytes. Must stay bit-exact with
/// every other MXP implementation; the vectors in the tests below are the
/// interop fixtures.
pub fn checksum(payload: &[u8]) -> u64 {
    let mut h: u64 = 0;
    for &b in payload {
        h ^= u64::from(b).wrapping_mul(PRIME_1);
        h = h.rotate_left(31).wrapping_mul(PRIME_2);
    }
    h
}
