// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The Ristretto255 prime-order group, shared by the OPRF and the key
//! exchange. Every element that crosses a trust boundary is re-validated
//! here: non-canonical encodings and the identity are both rejected, since
//! the protocol requires elements of G*.

use crate::errors::{utils::check_slice_size, InternalError};

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::IsIdentity;
use digest::Digest;
use rand::{CryptoRng, RngCore};
use sha2::Sha512;

/// The byte length of a serialized group element
pub const ELEM_LEN: usize = 32;
/// The byte length of a serialized scalar
pub const SCALAR_LEN: usize = 32;

// Domain separator for hashing a password onto the curve
const STR_HASH_TO_GROUP: &[u8] = b"ristretto255-SHA512-HashToGroup";

/// Decodes an element from its fixed-length byte representation, enforcing
/// membership in G* (canonical encoding, not the identity)
pub(crate) fn from_element_slice(element_bits: &[u8]) -> Result<RistrettoPoint, InternalError> {
    let checked_bytes = check_slice_size(element_bits, ELEM_LEN, "element_bits")?;
    let mut bits = [0u8; ELEM_LEN];
    bits.copy_from_slice(checked_bytes);
    let point = CompressedRistretto(bits)
        .decompress()
        .ok_or(InternalError::PointError)?;
    if point.is_identity() {
        return Err(InternalError::PointError);
    }
    Ok(point)
}

/// Serializes the group element
pub(crate) fn element_to_bytes(element: &RistrettoPoint) -> [u8; ELEM_LEN] {
    element.compress().to_bytes()
}

/// Decodes a scalar from its canonical byte representation
pub(crate) fn from_scalar_slice(scalar_bits: &[u8]) -> Result<Scalar, InternalError> {
    let checked_bytes = check_slice_size(scalar_bits, SCALAR_LEN, "scalar_bits")?;
    let mut bits = [0u8; SCALAR_LEN];
    bits.copy_from_slice(checked_bytes);
    Option::from(Scalar::from_canonical_bytes(bits)).ok_or(InternalError::InvalidByteSequence)
}

/// Picks a uniformly random nonzero scalar
pub(crate) fn random_nonzero_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    loop {
        let scalar = Scalar::random(rng);
        if scalar != Scalar::ZERO {
            break scalar;
        }
    }
}

/// Hashes an arbitrary byte string to a uniformly distributed group element
pub(crate) fn hash_to_group(input: &[u8]) -> RistrettoPoint {
    let mut hasher = Sha512::new();
    hasher.update(STR_HASH_TO_GROUP);
    hasher.update(input);
    let mut bits = [0u8; 64];
    bits.copy_from_slice(&hasher.finalize());
    RistrettoPoint::from_uniform_bytes(&bits)
}
