// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! An implementation of the multiplicative-blinding DH-OPRF over
//! Ristretto255, together with the password hardening applied to its output.
//!
//! The randomized password is produced in two stages: a fast keyed
//! BLAKE2b hash binding the password, the application key and the
//! unblinded group element, followed by a single memory-hard Argon2id
//! evaluation. The Argon2id salt is fixed to all zeroes: the per-user
//! randomness is already concentrated in the OPRF output through the
//! server's secret key. Do not "fix" the salt without revising the
//! protocol as a whole.

use crate::errors::{InternalError, ProtocolError};
use crate::group;
use crate::OutputKey;

use argon2::{Algorithm, Argon2, Params, Version};
use blake2::digest::consts::U32;
use blake2::digest::Mac;
use blake2::{Blake2b, Blake2bMac, Digest};
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::IsIdentity;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

type Blake2b256 = Blake2b<U32>;
type Blake2bMac256 = Blake2bMac<U32>;

// Argon2id interactive parameters: 64 MiB, two passes, one lane
const KSF_M_COST: u32 = 65536;
const KSF_T_COST: u32 = 2;
const KSF_P_COST: u32 = 1;
const KSF_SALT: [u8; 32] = [0u8; 32];

const STR_RWD: &[u8] = b"rwd";

/// Computes the first step of the OPRF: the client hashes its password to
/// the curve and blinds it with a fresh nonzero scalar. The scalar is
/// secret and stays on the client; alpha is sent to the server.
pub(crate) fn blind<R: RngCore + CryptoRng>(
    password: &[u8],
    blinding_factor_rng: &mut R,
) -> (Scalar, RistrettoPoint) {
    let blinding_factor = group::random_nonzero_scalar(blinding_factor_rng);
    let alpha = group::hash_to_group(password) * blinding_factor;
    (blinding_factor, alpha)
}

/// Computes the second step of the OPRF: the server applies its per-user
/// key to the blinded element
pub(crate) fn evaluate(
    oprf_key: &Scalar,
    alpha: &RistrettoPoint,
) -> Result<RistrettoPoint, InternalError> {
    let beta = alpha * oprf_key;
    if beta.is_identity() {
        return Err(InternalError::PointError);
    }
    Ok(beta)
}

/// Computes the third step of the OPRF: the client removes its blinding
/// factor from the server's answer and hashes the result down to `rw0`
pub(crate) fn unblind(
    password: &[u8],
    blinding_factor: &Scalar,
    beta: &RistrettoPoint,
    key: Option<&[u8]>,
) -> Result<Zeroizing<[u8; 32]>, ProtocolError> {
    // beta^(1/r) = H(pw)^k
    let unblinded = beta * blinding_factor.invert();
    finalize(password, &unblinded, key)
}

/// Hashes the password and the unblinded OPRF element down to the 32-byte
/// `rw0`, keyed by the optional application-supplied key
pub(crate) fn finalize(
    password: &[u8],
    unblinded: &RistrettoPoint,
    key: Option<&[u8]>,
) -> Result<Zeroizing<[u8; 32]>, ProtocolError> {
    let element_bytes = group::element_to_bytes(unblinded);
    let rw0: [u8; 32] = match key {
        Some(key) if !key.is_empty() => {
            let mut hasher = Blake2bMac256::new_from_slice(key)
                .map_err(|_| ProtocolError::BadArgumentError)?;
            Mac::update(&mut hasher, password);
            Mac::update(&mut hasher, &element_bytes);
            hasher.finalize().into_bytes().into()
        }
        _ => {
            let mut hasher = Blake2b256::new();
            Digest::update(&mut hasher, password);
            Digest::update(&mut hasher, &element_bytes);
            hasher.finalize().into()
        }
    };
    Ok(Zeroizing::new(rw0))
}

/// Stretches `rw0` into the randomized password `rw` with Argon2id
pub(crate) fn stretch(rw0: &[u8; 32]) -> Result<Zeroizing<[u8; 32]>, InternalError> {
    let params = Params::new(KSF_M_COST, KSF_T_COST, KSF_P_COST, Some(32))
        .map_err(|_| InternalError::KsfError)?;
    let ksf = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut rw = Zeroizing::new([0u8; 32]);
    ksf.hash_password_into(rw0, &KSF_SALT, &mut *rw)
        .map_err(|_| InternalError::KsfError)?;
    Ok(rw)
}

/// Derives the application-facing `rwd` from the randomized password
pub(crate) fn derive_rwd(rw: &[u8; 32]) -> Result<OutputKey, InternalError> {
    let mut hasher =
        Blake2bMac256::new_from_slice(STR_RWD).map_err(|_| InternalError::HmacError)?;
    Mac::update(&mut hasher, rw);
    Ok(Zeroizing::new(hasher.finalize().into_bytes().into()))
}
