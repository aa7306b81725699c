// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Contains the messages exchanged between the peers.
//!
//! All messages are fixed-layout, tightly packed byte strings; the only
//! variable-length region is the envelope blob, which is always the final
//! field and always prefixed by its 8-byte little-endian `extra_len`. The
//! deserializers never re-interpret raw memory: every field is read out of
//! a length-checked slice, and every group element is validated on entry.

use crate::envelope::{SealedEnvelope, ENVELOPE_BASE_LEN};
use crate::errors::utils::{check_slice_size, check_slice_size_atleast};
use crate::errors::ProtocolError;
use crate::group;
use crate::keypair::PublicKey;

use curve25519_dalek::ristretto::RistrettoPoint;

/// The byte length of a handshake nonce
pub(crate) const NONCE_LEN: usize = 32;
/// The byte length of an authentication tag
pub(crate) const MAC_LEN: usize = 32;

/// The byte length of a serialized [`CredentialRequest`]
pub const CREDENTIAL_REQUEST_LEN: usize = 2 * group::ELEM_LEN + NONCE_LEN;
/// The byte length of a serialized [`CredentialFinalization`]
pub const CREDENTIAL_FINALIZATION_LEN: usize = MAC_LEN;
/// The byte length of a serialized [`RegistrationRequest`]
pub const REGISTRATION_REQUEST_LEN: usize = group::ELEM_LEN;
/// The byte length of a serialized [`RegistrationResponse`]
pub const REGISTRATION_RESPONSE_LEN: usize = 2 * group::ELEM_LEN;

/// The message sent by the user to the server to initiate registration:
/// the blinded password element
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub(crate) alpha: RistrettoPoint,
}

impl RegistrationRequest {
    /// Serialization into bytes
    pub fn serialize(&self) -> Vec<u8> {
        group::element_to_bytes(&self.alpha).to_vec()
    }

    /// Deserialization from bytes
    pub fn deserialize(input: &[u8]) -> Result<Self, ProtocolError> {
        let checked_bytes = check_slice_size(input, REGISTRATION_REQUEST_LEN, "registration_request")?;
        Ok(Self {
            alpha: group::from_element_slice(checked_bytes)?,
        })
    }
}

/// The answer sent by the server upon reception of a registration attempt:
/// the evaluated element and the server's long-term public key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationResponse {
    pub(crate) beta: RistrettoPoint,
    pub(crate) server_s_pk: PublicKey,
}

impl RegistrationResponse {
    /// Serialization into bytes
    pub fn serialize(&self) -> Vec<u8> {
        [
            group::element_to_bytes(&self.beta),
            self.server_s_pk.to_bytes(),
        ]
        .concat()
    }

    /// Deserialization from bytes
    pub fn deserialize(input: &[u8]) -> Result<Self, ProtocolError> {
        let checked_bytes =
            check_slice_size(input, REGISTRATION_RESPONSE_LEN, "registration_response")?;
        Ok(Self {
            beta: group::from_element_slice(&checked_bytes[..group::ELEM_LEN])?,
            server_s_pk: PublicKey::from_slice(&checked_bytes[group::ELEM_LEN..])?,
        })
    }
}

/// The final registration message from the user: the tail of the user
/// record, holding the user's long-term public key and the sealed envelope
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationUpload {
    pub(crate) client_s_pk: PublicKey,
    pub(crate) envelope: SealedEnvelope,
}

impl RegistrationUpload {
    /// Serialization into bytes
    pub fn serialize(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(group::ELEM_LEN + self.envelope.len());
        output.extend_from_slice(&self.client_s_pk.to_bytes());
        output.extend_from_slice(&self.envelope.serialize());
        output
    }

    /// Deserialization from bytes
    pub fn deserialize(input: &[u8]) -> Result<Self, ProtocolError> {
        let checked_bytes = check_slice_size_atleast(
            input,
            group::ELEM_LEN + 8 + ENVELOPE_BASE_LEN,
            "registration_upload",
        )?;
        Ok(Self {
            client_s_pk: PublicKey::from_slice(&checked_bytes[..group::ELEM_LEN])?,
            envelope: SealedEnvelope::deserialize(&checked_bytes[group::ELEM_LEN..])?,
        })
    }
}

/// The first login flight, from the user: the blinded password element, the
/// user's ephemeral public key and the user nonce
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialRequest {
    pub(crate) alpha: RistrettoPoint,
    pub(crate) client_e_pk: PublicKey,
    pub(crate) client_nonce: [u8; NONCE_LEN],
}

impl CredentialRequest {
    /// Serialization into bytes
    pub fn serialize(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(CREDENTIAL_REQUEST_LEN);
        output.extend_from_slice(&group::element_to_bytes(&self.alpha));
        output.extend_from_slice(&self.client_e_pk.to_bytes());
        output.extend_from_slice(&self.client_nonce);
        output
    }

    /// Deserialization from bytes
    pub fn deserialize(input: &[u8]) -> Result<Self, ProtocolError> {
        let checked_bytes = check_slice_size(input, CREDENTIAL_REQUEST_LEN, "credential_request")?;
        let mut client_nonce = [0u8; NONCE_LEN];
        client_nonce.copy_from_slice(&checked_bytes[2 * group::ELEM_LEN..]);
        Ok(Self {
            alpha: group::from_element_slice(&checked_bytes[..group::ELEM_LEN])?,
            client_e_pk: PublicKey::from_slice(
                &checked_bytes[group::ELEM_LEN..2 * group::ELEM_LEN],
            )?,
            client_nonce,
        })
    }
}

/// The second login flight, from the server: the evaluated element, the
/// server's ephemeral public key, the server nonce, the server
/// authentication tag, and the stored envelope
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialResponse {
    pub(crate) beta: RistrettoPoint,
    pub(crate) server_e_pk: PublicKey,
    pub(crate) server_nonce: [u8; NONCE_LEN],
    pub(crate) auth: [u8; MAC_LEN],
    pub(crate) envelope: SealedEnvelope,
}

impl CredentialResponse {
    const FIXED_LEN: usize = 2 * group::ELEM_LEN + NONCE_LEN + MAC_LEN;

    /// Serialization into bytes
    pub fn serialize(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(Self::FIXED_LEN + self.envelope.len());
        output.extend_from_slice(&group::element_to_bytes(&self.beta));
        output.extend_from_slice(&self.server_e_pk.to_bytes());
        output.extend_from_slice(&self.server_nonce);
        output.extend_from_slice(&self.auth);
        output.extend_from_slice(&self.envelope.serialize());
        output
    }

    /// Deserialization from bytes
    pub fn deserialize(input: &[u8]) -> Result<Self, ProtocolError> {
        let checked_bytes = check_slice_size_atleast(
            input,
            Self::FIXED_LEN + 8 + ENVELOPE_BASE_LEN,
            "credential_response",
        )?;
        let mut server_nonce = [0u8; NONCE_LEN];
        server_nonce
            .copy_from_slice(&checked_bytes[2 * group::ELEM_LEN..2 * group::ELEM_LEN + NONCE_LEN]);
        let mut auth = [0u8; MAC_LEN];
        auth.copy_from_slice(
            &checked_bytes[2 * group::ELEM_LEN + NONCE_LEN..Self::FIXED_LEN],
        );
        Ok(Self {
            beta: group::from_element_slice(&checked_bytes[..group::ELEM_LEN])?,
            server_e_pk: PublicKey::from_slice(
                &checked_bytes[group::ELEM_LEN..2 * group::ELEM_LEN],
            )?,
            server_nonce,
            auth,
            envelope: SealedEnvelope::deserialize(&checked_bytes[Self::FIXED_LEN..])?,
        })
    }
}

/// The third login flight, from the user: the user authentication tag
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialFinalization {
    pub(crate) mac: [u8; MAC_LEN],
}

impl CredentialFinalization {
    /// Serialization into bytes
    pub fn serialize(&self) -> Vec<u8> {
        self.mac.to_vec()
    }

    /// Deserialization from bytes
    pub fn deserialize(input: &[u8]) -> Result<Self, ProtocolError> {
        let checked_bytes =
            check_slice_size(input, CREDENTIAL_FINALIZATION_LEN, "credential_finalization")?;
        let mut mac = [0u8; MAC_LEN];
        mac.copy_from_slice(checked_bytes);
        Ok(Self { mac })
    }
}
