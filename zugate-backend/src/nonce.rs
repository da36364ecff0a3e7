//! Challenge nonce issuance.
//!
//! A nonce is 30 bytes from the OS CSPRNG (240 bits of entropy) rendered
//! as a base-10 string, so clients can embed it as a numeric watermark in
//! a proof. Collisions across sessions are treated as cryptographically
//! negligible and not checked for.

use num_bigint::BigUint;
use rand::{rngs::OsRng, RngCore};

const NONCE_BYTES: usize = 30;

/// Issue a fresh single-use challenge value.
pub fn issue() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    BigUint::from_bytes_be(&bytes).to_str_radix(10)
}
