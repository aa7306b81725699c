// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Contains the static and ephemeral Diffie-Hellman keypair types

use crate::errors::InternalError;
use crate::group;

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Wrapper around a scalar to enforce that it's a private key.
/// Key material is zeroed after use.
#[derive(Clone, Debug, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey(pub(crate) Scalar);

/// Wrapper around a group element to enforce that it's a public key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey(pub(crate) RistrettoPoint);

impl PrivateKey {
    /// Serializes the private key scalar
    pub fn to_bytes(&self) -> [u8; group::SCALAR_LEN] {
        self.0.to_bytes()
    }

    /// Deserializes a private key from its canonical scalar encoding
    pub fn from_slice(input: &[u8]) -> Result<Self, InternalError> {
        Ok(Self(group::from_scalar_slice(input)?))
    }
}

impl PublicKey {
    /// Serializes the public key element
    pub fn to_bytes(&self) -> [u8; group::ELEM_LEN] {
        group::element_to_bytes(&self.0)
    }

    /// Deserializes a public key, validating group membership. This is meant
    /// to be applied on material provided through the network: it rejects
    /// non-canonical encodings and the identity element.
    pub fn from_slice(input: &[u8]) -> Result<Self, InternalError> {
        Ok(Self(group::from_element_slice(input)?))
    }
}

/// A static or ephemeral keypair on the protocol group
#[derive(Clone, Debug, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    #[zeroize(skip)]
    pk: PublicKey,
    sk: PrivateKey,
}

impl KeyPair {
    /// The public key component
    pub fn public(&self) -> &PublicKey {
        &self.pk
    }

    /// The private key component
    pub fn private(&self) -> &PrivateKey {
        &self.sk
    }

    /// Generating a random key pair given a cryptographic rng
    pub(crate) fn generate_random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let sk = group::random_nonzero_scalar(rng);
        let pk = RistrettoPoint::mul_base(&sk);
        Self {
            pk: PublicKey(pk),
            sk: PrivateKey(sk),
        }
    }

    /// Obtaining a public key from secret bytes. At all times, we should have
    /// &public_from_private(self.private()) == self.public()
    pub(crate) fn public_from_private(sk: &PrivateKey) -> PublicKey {
        PublicKey(RistrettoPoint::mul_base(&sk.0))
    }

    /// Computes the diffie hellman function on a public key and private key
    pub(crate) fn diffie_hellman(pk: &PublicKey, sk: &PrivateKey) -> [u8; group::ELEM_LEN] {
        group::element_to_bytes(&(pk.0 * sk.0))
    }
}
