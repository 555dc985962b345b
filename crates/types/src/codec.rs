//! Defines the canonical, deterministic binary codec for all
//! consensus-critical data.
//!
//! Thin wrappers around `parity-scale-codec` (SCALE). Centralizing the codec
//! in the base `types` crate guarantees that every component hashes and
//! signs the exact same byte representation of an entity.

use parity_scale_codec::{Decode, DecodeAll, Encode};

/// Encodes a value into its canonical byte representation.
///
/// Use this for anything that is hashed, signed, or persisted as part of
/// consensus state.
pub fn to_bytes_canonical<T: Encode>(v: &T) -> Vec<u8> {
    v.encode()
}

/// Decodes a value from its canonical byte representation.
///
/// Fails fast on trailing bytes or malformed input; malformed data must
/// never propagate into consensus logic.
pub fn from_bytes_canonical<T: Decode>(b: &[u8]) -> Result<T, String> {
    T::decode_all(&mut &*b).map_err(|e| format!("canonical decode failed: {e}"))
}
