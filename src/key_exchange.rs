// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The Triple Diffie-Hellman key schedule.
//!
//! Both peers combine one long-term and one ephemeral keypair into three
//! shared points, concatenated as the HKDF input keying material. The two
//! sides pair scalars and points in mirrored order so the three products
//! agree:
//!
//! server: `p_s·X_u ‖ x_s·P_u ‖ x_s·X_u`
//! user:   `x_u·P_s ‖ p_u·X_s ‖ x_u·X_s`
//!
//! Swapping any pairing breaks interoperability. The HKDF info string is a
//! hash binding both nonces and both identities, so the derived keys are
//! unique per handshake and per claimed peer identity.

use crate::errors::InternalError;
use crate::group::ELEM_LEN;
use crate::keypair::{KeyPair, PrivateKey, PublicKey};

use digest::Digest;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// The session keys derived from one handshake: the session key itself,
/// the two authentication-tag keys, and two reserved encryption keys.
///
/// `ke2`/`ke3` are derived so that the key schedule stays fixed, but no
/// current message carries encrypted application info; they are unused.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct Keys {
    pub(crate) sk: [u8; 32],
    pub(crate) km2: [u8; 32],
    pub(crate) km3: [u8; 32],
    #[allow(dead_code)]
    ke2: [u8; 32],
    #[allow(dead_code)]
    ke3: [u8; 32],
}

const KEYS_LEN: usize = 5 * 32;

/// Hashes both nonces and both identities into the HKDF info string
pub(crate) fn calc_info(
    client_nonce: &[u8; 32],
    server_nonce: &[u8; 32],
    id_u: &[u8],
    id_s: &[u8],
) -> [u8; 32] {
    let mut state = Sha256::new();
    state.update(client_nonce);
    state.update(server_nonce);
    state.update(id_u);
    state.update(id_s);
    state.finalize().into()
}

// SK, Km2, Km3, Ke2, Ke3 = HKDF(salt = none, IKM, info, L)
fn derive_keys(ikm: &[u8], info: &[u8; 32]) -> Result<Keys, InternalError> {
    let h = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = Zeroizing::new([0u8; KEYS_LEN]);
    h.expand(info, &mut *okm)
        .map_err(|_| InternalError::HkdfError)?;

    let mut keys = Keys {
        sk: [0u8; 32],
        km2: [0u8; 32],
        km3: [0u8; 32],
        ke2: [0u8; 32],
        ke3: [0u8; 32],
    };
    keys.sk.copy_from_slice(&okm[..32]);
    keys.km2.copy_from_slice(&okm[32..64]);
    keys.km3.copy_from_slice(&okm[64..96]);
    keys.ke2.copy_from_slice(&okm[96..128]);
    keys.ke3.copy_from_slice(&okm[128..]);
    Ok(keys)
}

/// The server end of the triple-DH
pub(crate) fn server_3dh(
    server_s_sk: &PrivateKey,
    server_e_sk: &PrivateKey,
    client_s_pk: &PublicKey,
    client_e_pk: &PublicKey,
    info: &[u8; 32],
) -> Result<Keys, InternalError> {
    let mut ikm = Zeroizing::new([0u8; 3 * ELEM_LEN]);
    ikm[..32].copy_from_slice(&KeyPair::diffie_hellman(client_e_pk, server_s_sk));
    ikm[32..64].copy_from_slice(&KeyPair::diffie_hellman(client_s_pk, server_e_sk));
    ikm[64..].copy_from_slice(&KeyPair::diffie_hellman(client_e_pk, server_e_sk));
    derive_keys(&*ikm, info)
}

/// The user end of the triple-DH
pub(crate) fn user_3dh(
    client_s_sk: &PrivateKey,
    client_e_sk: &PrivateKey,
    server_s_pk: &PublicKey,
    server_e_pk: &PublicKey,
    info: &[u8; 32],
) -> Result<Keys, InternalError> {
    let mut ikm = Zeroizing::new([0u8; 3 * ELEM_LEN]);
    ikm[..32].copy_from_slice(&KeyPair::diffie_hellman(server_s_pk, client_e_sk));
    ikm[32..64].copy_from_slice(&KeyPair::diffie_hellman(server_e_pk, client_s_sk));
    ikm[64..].copy_from_slice(&KeyPair::diffie_hellman(server_e_pk, client_e_sk));
    derive_keys(&*ikm, info)
}

/// Computes an authentication tag over a transcript digest
pub(crate) fn auth_tag(key: &[u8; 32], digest: &[u8; 32]) -> Result<[u8; 32], InternalError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|_| InternalError::HmacError)?;
    mac.update(digest);
    Ok(mac.finalize().into_bytes().into())
}

/// Verifies an authentication tag in constant time
pub(crate) fn verify_tag(
    key: &[u8; 32],
    digest: &[u8; 32],
    tag: &[u8],
) -> Result<bool, InternalError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|_| InternalError::HmacError)?;
    mac.update(digest);
    Ok(mac.verify_slice(tag).is_ok())
}
