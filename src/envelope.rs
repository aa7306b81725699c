// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The envelope construction: an authenticated encryption of the client's
//! long-term key material under the randomized password.
//!
//! A sealed envelope is laid out as
//! `nonce[32] ‖ C[sec_len] ‖ cleartext ‖ tag[32]`, where `C` is the secret
//! section XOR-encrypted under an HKDF-derived pad and the tag is an
//! HMAC-SHA256 over everything before it. The same HKDF expansion that
//! yields the pad also yields the authentication key and the export key, so
//! a single call `HKDF-Expand(prk = rw, info = nonce ‖ "EnvU")` fixes all
//! three. The export key is handed to the caller and never appears inside
//! the envelope itself.

use crate::errors::{utils::check_slice_size_atleast, InternalError, ProtocolError};
use crate::group::{ELEM_LEN, SCALAR_LEN};
use crate::OutputKey;

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// The byte length of the envelope nonce
pub(crate) const NONCE_LEN: usize = 32;
/// The byte length of the envelope authentication tag
pub(crate) const TAG_LEN: usize = 32;
/// The fixed part of the secret section: `p_u ‖ P_u ‖ P_s`
pub(crate) const SEC_ENV_BASE_LEN: usize = SCALAR_LEN + 2 * ELEM_LEN;
/// The length of a sealed envelope holding no extra and no cleartext data
pub(crate) const ENVELOPE_BASE_LEN: usize = NONCE_LEN + SEC_ENV_BASE_LEN + TAG_LEN;

/// The maximum number of extra bytes a record may carry. HKDF-SHA256 can
/// expand at most 255 * 32 bytes, out of which the pad for the secret
/// section, the authentication key and the export key must all be carved.
pub const MAX_EXTRA_LEN: usize = 255 * 32 - SEC_ENV_BASE_LEN - 2 * TAG_LEN;

const STR_ENVELOPE: &[u8] = b"EnvU";

/// A sealed envelope together with the length of the extra section of its
/// secret payload, exactly as the pair travels on the wire and sits in the
/// user record. The cleartext length is not tracked separately: the blob is
/// always carried whole, so it falls out of the blob length.
#[derive(Clone, Debug, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub(crate) struct SealedEnvelope {
    extra_len: u64,
    blob: Vec<u8>,
}

impl SealedEnvelope {
    pub(crate) fn new(extra_len: usize, blob: Vec<u8>) -> Result<Self, ProtocolError> {
        if extra_len > MAX_EXTRA_LEN {
            return Err(ProtocolError::OverflowError);
        }
        check_slice_size_atleast(&blob, ENVELOPE_BASE_LEN + extra_len, "envelope_blob")?;
        Ok(Self {
            extra_len: extra_len as u64,
            blob,
        })
    }

    pub(crate) fn extra_len(&self) -> usize {
        self.extra_len as usize
    }

    /// Length of the secret section sealed inside this envelope
    pub(crate) fn secret_len(&self) -> usize {
        SEC_ENV_BASE_LEN + self.extra_len()
    }

    pub(crate) fn blob(&self) -> &[u8] {
        &self.blob
    }

    /// Serialized length: the 8-byte length field plus the blob
    pub(crate) fn len(&self) -> usize {
        8 + self.blob.len()
    }

    /// Serialization into bytes: `extra_len[u64-LE] ‖ blob`
    pub(crate) fn serialize(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(self.len());
        output.extend_from_slice(&self.extra_len.to_le_bytes());
        output.extend_from_slice(&self.blob);
        output
    }

    /// Deserialization from bytes; consumes the whole input slice
    pub(crate) fn deserialize(input: &[u8]) -> Result<Self, ProtocolError> {
        let checked_bytes = check_slice_size_atleast(input, 8, "envelope_extra_len")?;
        let mut extra_len_bytes = [0u8; 8];
        extra_len_bytes.copy_from_slice(&checked_bytes[..8]);
        let extra_len = u64::from_le_bytes(extra_len_bytes);
        if extra_len > MAX_EXTRA_LEN as u64 {
            return Err(ProtocolError::OverflowError);
        }
        Self::new(extra_len as usize, checked_bytes[8..].to_vec())
    }
}

/// Seals `sec_env ‖ clr_env` under the randomized password. Returns the
/// blob and the export key. Either section may be empty.
pub(crate) fn seal<R: RngCore + CryptoRng>(
    rng: &mut R,
    rw: &[u8; 32],
    sec_env: &[u8],
    clr_env: &[u8],
) -> Result<(Vec<u8>, OutputKey), InternalError> {
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let keys = derive_envelope_keys(rw, &nonce, sec_env.len())?;
    let (pad, hmac_key, export_key) = partition_keys(&keys, sec_env.len());

    let mut blob = Vec::with_capacity(NONCE_LEN + sec_env.len() + clr_env.len() + TAG_LEN);
    blob.extend_from_slice(&nonce);
    blob.extend(sec_env.iter().zip(pad.iter()).map(|(x, p)| x ^ p));
    blob.extend_from_slice(clr_env);

    let mut hmac = Hmac::<Sha256>::new_from_slice(hmac_key).map_err(|_| InternalError::HmacError)?;
    hmac.update(&blob);
    blob.extend_from_slice(&hmac.finalize().into_bytes());

    let mut export = Zeroizing::new([0u8; 32]);
    export.copy_from_slice(export_key);
    Ok((blob, export))
}

/// Opens a sealed blob, verifying its tag in constant time before any of
/// the recovered material is released. Returns the secret section, the
/// cleartext section and the export key.
pub(crate) fn open(
    rw: &[u8; 32],
    blob: &[u8],
    sec_env_len: usize,
) -> Result<(Zeroizing<Vec<u8>>, Vec<u8>, OutputKey), ProtocolError> {
    let checked_blob =
        check_slice_size_atleast(blob, NONCE_LEN + sec_env_len + TAG_LEN, "envelope_blob")?;
    let clr_env_len = checked_blob.len() - NONCE_LEN - sec_env_len - TAG_LEN;

    let nonce = &checked_blob[..NONCE_LEN];
    let keys = derive_envelope_keys(rw, nonce, sec_env_len)?;
    let (pad, hmac_key, export_key) = partition_keys(&keys, sec_env_len);

    let (body, tag) = checked_blob.split_at(checked_blob.len() - TAG_LEN);
    let mut hmac = Hmac::<Sha256>::new_from_slice(hmac_key)
        .map_err(|_| ProtocolError::CryptoError(InternalError::HmacError))?;
    hmac.update(body);
    if hmac.verify_slice(tag).is_err() {
        return Err(ProtocolError::EnvelopeAuthError);
    }

    let ciphertext = &checked_blob[NONCE_LEN..NONCE_LEN + sec_env_len];
    let sec_env = Zeroizing::new(
        ciphertext
            .iter()
            .zip(pad.iter())
            .map(|(x, p)| x ^ p)
            .collect::<Vec<u8>>(),
    );
    let clr_env = checked_blob[NONCE_LEN + sec_env_len..NONCE_LEN + sec_env_len + clr_env_len].to_vec();

    let mut export = Zeroizing::new([0u8; 32]);
    export.copy_from_slice(export_key);
    Ok((sec_env, clr_env, export))
}

// KEYS = HKDF-Expand(prk = rw, info = nonce ‖ "EnvU", L = sec_len + 2 * 32),
// partitioned as pad ‖ hmac_key ‖ export_key
fn derive_envelope_keys(
    rw: &[u8; 32],
    nonce: &[u8],
    sec_env_len: usize,
) -> Result<Zeroizing<Vec<u8>>, InternalError> {
    let h = Hkdf::<Sha256>::from_prk(rw).map_err(|_| InternalError::HkdfError)?;
    let mut keys = Zeroizing::new(vec![0u8; sec_env_len + TAG_LEN + TAG_LEN]);
    h.expand_multi_info(&[nonce, STR_ENVELOPE], &mut keys)
        .map_err(|_| InternalError::HkdfError)?;
    Ok(keys)
}

fn partition_keys(keys: &[u8], sec_env_len: usize) -> (&[u8], &[u8], &[u8]) {
    let (pad, rest) = keys.split_at(sec_env_len);
    let (hmac_key, export_key) = rest.split_at(TAG_LEN);
    (pad, hmac_key, export_key)
}
