// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Provides the main OPAQUE API: the two registration flows and the login
//! key exchange with explicit mutual authentication.
//!
//! Failures are fatal for the handshake at hand: no step retries, every
//! error leaves the in-progress state unusable, and nothing about the
//! failing step is ever put on the wire. Secret state types zero their
//! contents on drop, so cancelling a handshake is simply dropping it.

use crate::envelope::{self, SealedEnvelope, ENVELOPE_BASE_LEN, MAX_EXTRA_LEN, SEC_ENV_BASE_LEN};
use crate::errors::utils::{check_slice_size, check_slice_size_atleast};
use crate::errors::ProtocolError;
use crate::group;
use crate::key_exchange::{auth_tag, calc_info, server_3dh, user_3dh, verify_tag};
use crate::keypair::{KeyPair, PrivateKey, PublicKey};
use crate::messages::{
    CredentialFinalization, CredentialRequest, CredentialResponse, RegistrationRequest,
    RegistrationResponse, RegistrationUpload, NONCE_LEN,
};
use crate::oprf;
use crate::transcript::Transcript;
use crate::OutputKey;

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

// Parameters
// ==========

/// The identities bound into the handshake transcript. An identity left
/// empty contributes nothing, matching a peer that supplies none.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ids<'a> {
    /// The user identity
    pub client: &'a [u8],
    /// The server identity
    pub server: &'a [u8],
}

/// Optional application-supplied byte strings mixed into the handshake
/// transcript at protocol-fixed positions. `info1` travels conceptually
/// with the first flight, `info2`/`einfo2` with the second, and
/// `info3`/`einfo3` with the third; the third-flight infos are covered
/// only by the user authentication tag.
#[derive(Clone, Copy, Debug, Default)]
pub struct AppInfos<'a> {
    /// First-flight application info
    pub info1: Option<&'a [u8]>,
    /// Second-flight application info
    pub info2: Option<&'a [u8]>,
    /// Second-flight encrypted application info
    pub einfo2: Option<&'a [u8]>,
    /// Third-flight application info
    pub info3: Option<&'a [u8]>,
    /// Third-flight encrypted application info
    pub einfo3: Option<&'a [u8]>,
}

/// Parameters for sealing a user record at registration
#[derive(Clone, Copy, Debug, Default)]
pub struct RegistrationParameters<'a> {
    /// Extra application data sealed into the secret section of the
    /// envelope; the server only ever stores it as ciphertext
    pub extra: &'a [u8],
    /// Optional application key contributed to the randomized-password
    /// derivation; at most 64 bytes
    pub key: Option<&'a [u8]>,
    /// Cleartext data carried beside the secret section; authenticated by
    /// the envelope tag but not encrypted
    pub cleartext: &'a [u8],
}

/// Optional parameters for server login start
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerLoginStartParameters<'a> {
    /// The identities bound into the transcript
    pub ids: Ids<'a>,
    /// The application infos mixed into the transcript
    pub infos: Option<AppInfos<'a>>,
}

/// Optional parameters for client login finish
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientLoginFinishParameters<'a> {
    /// The application key contributed at registration, if any
    pub key: Option<&'a [u8]>,
    /// The identities bound into the transcript; must match the server's
    pub ids: Ids<'a>,
    /// The application infos mixed into the transcript
    pub infos: Option<AppInfos<'a>>,
}

// User record
// ===========

const USER_RECORD_BASE_LEN: usize =
    2 * group::SCALAR_LEN + 2 * group::ELEM_LEN + 8 + ENVELOPE_BASE_LEN;

/// The per-user record stored by the server after registration. Created
/// once and never mutated; compromise of a record does not yield the
/// password without also breaking the memory-hard hash.
#[derive(Clone, Debug, Zeroize, ZeroizeOnDrop)]
pub struct UserRecord {
    pub(crate) oprf_key: Scalar,
    pub(crate) server_s_sk: PrivateKey,
    #[zeroize(skip)]
    pub(crate) client_s_pk: PublicKey,
    #[zeroize(skip)]
    pub(crate) server_s_pk: PublicKey,
    pub(crate) envelope: SealedEnvelope,
}

impl UserRecord {
    /// Registers a user on behalf of a server trusted with the password:
    /// generates the OPRF key and both long-term keypairs, evaluates the
    /// OPRF directly, and seals the envelope. Returns the record to store
    /// and the export key to hand back to the user.
    pub fn register<R: RngCore + CryptoRng>(
        rng: &mut R,
        password: &[u8],
        params: &RegistrationParameters<'_>,
    ) -> Result<(Self, OutputKey), ProtocolError> {
        let oprf_key = group::random_nonzero_scalar(rng);
        let unblinded = oprf::evaluate(&oprf_key, &group::hash_to_group(password))?;
        let rw0 = oprf::finalize(password, &unblinded, params.key)?;
        let rw = oprf::stretch(&rw0)?;

        let server_kp = KeyPair::generate_random(rng);
        let client_kp = KeyPair::generate_random(rng);
        let (envelope, export_key) =
            seal_credentials(rng, &rw, &client_kp, server_kp.public(), params)?;

        Ok((
            Self {
                oprf_key,
                server_s_sk: server_kp.private().clone(),
                client_s_pk: *client_kp.public(),
                server_s_pk: *server_kp.public(),
                envelope,
            },
            export_key,
        ))
    }

    /// Serialization into bytes
    pub fn serialize(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(USER_RECORD_BASE_LEN + self.envelope.extra_len());
        output.extend_from_slice(self.oprf_key.as_bytes());
        output.extend_from_slice(&self.server_s_sk.to_bytes());
        output.extend_from_slice(&self.client_s_pk.to_bytes());
        output.extend_from_slice(&self.server_s_pk.to_bytes());
        output.extend_from_slice(&self.envelope.serialize());
        output
    }

    /// Deserialization from bytes
    pub fn deserialize(input: &[u8]) -> Result<Self, ProtocolError> {
        let checked_bytes = check_slice_size_atleast(input, USER_RECORD_BASE_LEN, "user_record")?;
        Ok(Self {
            oprf_key: group::from_scalar_slice(&checked_bytes[..32])?,
            server_s_sk: PrivateKey::from_slice(&checked_bytes[32..64])?,
            client_s_pk: PublicKey::from_slice(&checked_bytes[64..96])?,
            server_s_pk: PublicKey::from_slice(&checked_bytes[96..128])?,
            envelope: SealedEnvelope::deserialize(&checked_bytes[128..])?,
        })
    }
}

// Builds the secret section `p_u ‖ P_u ‖ P_s ‖ extra` and seals it
fn seal_credentials<R: RngCore + CryptoRng>(
    rng: &mut R,
    rw: &[u8; 32],
    client_kp: &KeyPair,
    server_s_pk: &PublicKey,
    params: &RegistrationParameters<'_>,
) -> Result<(SealedEnvelope, OutputKey), ProtocolError> {
    if params.extra.len() > MAX_EXTRA_LEN {
        return Err(ProtocolError::OverflowError);
    }
    let mut sec_env = Zeroizing::new(Vec::with_capacity(SEC_ENV_BASE_LEN + params.extra.len()));
    sec_env.extend_from_slice(&client_kp.private().to_bytes());
    sec_env.extend_from_slice(&client_kp.public().to_bytes());
    sec_env.extend_from_slice(&server_s_pk.to_bytes());
    if !params.extra.is_empty() {
        sec_env.extend_from_slice(params.extra);
    }
    let (blob, export_key) = envelope::seal(rng, rw, &sec_env, params.cleartext)?;
    Ok((SealedEnvelope::new(params.extra.len(), blob)?, export_key))
}

// Registration
// ============

/// The state the user holds between the two registration flights: the
/// OPRF blinding factor
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ClientRegistration {
    blind: Scalar,
}

/// Contains the fields that are returned by a client registration start
pub struct ClientRegistrationStartResult {
    /// The registration request message to be sent to the server
    pub message: RegistrationRequest,
    /// The client state that must be persisted in order to complete
    /// registration
    pub state: ClientRegistration,
}

/// Contains the fields that are returned by a client registration finish
pub struct ClientRegistrationFinishResult {
    /// The record tail to be sent to the server
    pub message: RegistrationUpload,
    /// The randomized-password derivative handed to the application as a
    /// key for client-side secrets
    pub rwd: OutputKey,
    /// The export key output by client registration
    pub export_key: OutputKey,
}

impl ClientRegistration {
    /// Returns an initial "blinded" request to send to the server, as well
    /// as a [`ClientRegistration`]. The password itself never leaves this
    /// step.
    pub fn start<R: RngCore + CryptoRng>(
        blinding_factor_rng: &mut R,
        password: &[u8],
    ) -> ClientRegistrationStartResult {
        let (blind, alpha) = oprf::blind(password, blinding_factor_rng);
        ClientRegistrationStartResult {
            message: RegistrationRequest { alpha },
            state: Self { blind },
        }
    }

    /// "Unblinds" the server's answer, generates the user's long-term
    /// keypair and seals it, together with the extra data, under the
    /// randomized password. The user's long-term secret is known to the
    /// server only as a public key and as envelope ciphertext.
    pub fn finish<R: RngCore + CryptoRng>(
        self,
        rng: &mut R,
        password: &[u8],
        response: RegistrationResponse,
        params: &RegistrationParameters<'_>,
    ) -> Result<ClientRegistrationFinishResult, ProtocolError> {
        let rw0 = oprf::unblind(password, &self.blind, &response.beta, params.key)?;
        let rw = oprf::stretch(&rw0)?;

        let client_kp = KeyPair::generate_random(rng);
        let (envelope, export_key) =
            seal_credentials(rng, &rw, &client_kp, &response.server_s_pk, params)?;
        let rwd = oprf::derive_rwd(&rw)?;

        Ok(ClientRegistrationFinishResult {
            message: RegistrationUpload {
                client_s_pk: *client_kp.public(),
                envelope,
            },
            rwd,
            export_key,
        })
    }

    /// Serialization into bytes
    pub fn serialize(&self) -> Vec<u8> {
        self.blind.as_bytes().to_vec()
    }

    /// Deserialization from bytes
    pub fn deserialize(input: &[u8]) -> Result<Self, ProtocolError> {
        let checked_bytes = check_slice_size(input, group::SCALAR_LEN, "client_registration")?;
        Ok(Self {
            blind: group::from_scalar_slice(checked_bytes)?,
        })
    }
}

/// The state the server holds between the registration flights: its
/// long-term secret key and the per-user OPRF key
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ServerRegistration {
    server_s_sk: PrivateKey,
    oprf_key: Scalar,
}

/// Contains the fields that are returned by a server registration start
pub struct ServerRegistrationStartResult {
    /// The registration response message to send to the client
    pub message: RegistrationResponse,
    /// The server state that must be persisted in order to complete
    /// registration
    pub state: ServerRegistration,
}

impl ServerRegistration {
    /// From the user's blinded password, samples the per-user keys and
    /// returns the evaluated element together with the server's long-term
    /// public key
    pub fn start<R: RngCore + CryptoRng>(
        rng: &mut R,
        message: RegistrationRequest,
    ) -> Result<ServerRegistrationStartResult, ProtocolError> {
        let oprf_key = group::random_nonzero_scalar(rng);
        let beta = oprf::evaluate(&oprf_key, &message.alpha)?;
        let server_kp = KeyPair::generate_random(rng);

        Ok(ServerRegistrationStartResult {
            message: RegistrationResponse {
                beta,
                server_s_pk: *server_kp.public(),
            },
            state: Self {
                server_s_sk: server_kp.private().clone(),
                oprf_key,
            },
        })
    }

    /// Completes the record from the user's upload and the keys retained
    /// at [`ServerRegistration::start`]. The result is ready to persist.
    pub fn finish(self, upload: RegistrationUpload) -> UserRecord {
        let server_s_pk = KeyPair::public_from_private(&self.server_s_sk);
        UserRecord {
            oprf_key: self.oprf_key,
            server_s_sk: self.server_s_sk.clone(),
            client_s_pk: upload.client_s_pk,
            server_s_pk,
            envelope: upload.envelope,
        }
    }

    /// Serialization into bytes
    pub fn serialize(&self) -> Vec<u8> {
        [self.server_s_sk.to_bytes(), self.oprf_key.to_bytes()].concat()
    }

    /// Deserialization from bytes
    pub fn deserialize(input: &[u8]) -> Result<Self, ProtocolError> {
        let checked_bytes = check_slice_size(input, 2 * group::SCALAR_LEN, "server_registration")?;
        Ok(Self {
            server_s_sk: PrivateKey::from_slice(&checked_bytes[..32])?,
            oprf_key: group::from_scalar_slice(&checked_bytes[32..])?,
        })
    }
}

// Login
// =====

const CLIENT_LOGIN_LEN: usize = 2 * group::SCALAR_LEN + NONCE_LEN + group::ELEM_LEN;

/// The secret state the user holds between the login flights. Never sent
/// anywhere; dropped (and thereby zeroed) on any failure.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ClientLogin {
    blind: Scalar,
    client_e_sk: PrivateKey,
    client_nonce: [u8; NONCE_LEN],
    alpha: RistrettoPoint,
}

/// Contains the fields that are returned by a client login start
pub struct ClientLoginStartResult {
    /// The credential request message to be sent to the server
    pub message: CredentialRequest,
    /// The client state that must be persisted in order to complete login
    pub state: ClientLogin,
}

/// Contains the fields that are returned by a client login finish
pub struct ClientLoginFinishResult {
    /// The credential finalization message to be sent to the server
    pub message: CredentialFinalization,
    /// The shared session key
    pub session_key: OutputKey,
    /// The export key, equal to the one output at registration
    pub export_key: OutputKey,
    /// The randomized-password derivative, equal to the one output at
    /// registration
    pub rwd: OutputKey,
    /// The extra data recovered from the envelope
    pub extra: Zeroizing<Vec<u8>>,
    /// The cleartext data recovered from the envelope
    pub cleartext: Vec<u8>,
}

impl ClientLogin {
    /// Blinds the password and samples the ephemeral key and nonce for one
    /// login attempt
    pub fn start<R: RngCore + CryptoRng>(rng: &mut R, password: &[u8]) -> ClientLoginStartResult {
        let (blind, alpha) = oprf::blind(password, rng);
        let client_e_kp = KeyPair::generate_random(rng);
        let mut client_nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut client_nonce);

        ClientLoginStartResult {
            message: CredentialRequest {
                alpha,
                client_e_pk: *client_e_kp.public(),
                client_nonce,
            },
            state: Self {
                blind,
                client_e_sk: client_e_kp.private().clone(),
                client_nonce,
                alpha,
            },
        }
    }

    /// Recomputes the randomized password, opens the envelope, completes
    /// the triple-DH and verifies the server before anything derived from
    /// the handshake is released. Produces the user authentication tag for
    /// the third flight.
    pub fn finish(
        self,
        password: &[u8],
        response: CredentialResponse,
        params: ClientLoginFinishParameters<'_>,
    ) -> Result<ClientLoginFinishResult, ProtocolError> {
        let rw0 = oprf::unblind(password, &self.blind, &response.beta, params.key)?;
        let rw = oprf::stretch(&rw0)?;

        let (sec_env, cleartext, export_key) = envelope::open(
            &rw,
            response.envelope.blob(),
            response.envelope.secret_len(),
        )?;
        let client_s_sk = PrivateKey::from_slice(&sec_env[..32])?;
        let server_s_pk = PublicKey::from_slice(&sec_env[64..96])?;
        let extra = Zeroizing::new(sec_env[96..].to_vec());

        let rwd = oprf::derive_rwd(&rw)?;

        let infos = params.infos.unwrap_or_default();
        let info = calc_info(
            &self.client_nonce,
            &response.server_nonce,
            params.ids.client,
            params.ids.server,
        );
        let keys = user_3dh(
            &client_s_sk,
            &self.client_e_sk,
            &server_s_pk,
            &response.server_e_pk,
            &info,
        )?;

        let client_e_pk = KeyPair::public_from_private(&self.client_e_sk);
        let transcript = Transcript::new(
            &group::element_to_bytes(&self.alpha),
            &self.client_nonce,
            infos.info1,
            &client_e_pk.to_bytes(),
            &group::element_to_bytes(&response.beta),
            response.envelope.blob(),
            &response.server_nonce,
            infos.info2,
            &response.server_e_pk.to_bytes(),
            infos.einfo2,
        );
        if !verify_tag(&keys.km2, &transcript.digest(), &response.auth)? {
            return Err(ProtocolError::ServerAuthError);
        }

        let mac = auth_tag(
            &keys.km3,
            &transcript.final_digest(infos.info3, infos.einfo3),
        )?;

        Ok(ClientLoginFinishResult {
            message: CredentialFinalization { mac },
            session_key: Zeroizing::new(keys.sk),
            export_key,
            rwd,
            extra,
            cleartext,
        })
    }

    /// Serialization into bytes
    pub fn serialize(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(CLIENT_LOGIN_LEN);
        output.extend_from_slice(self.blind.as_bytes());
        output.extend_from_slice(&self.client_e_sk.to_bytes());
        output.extend_from_slice(&self.client_nonce);
        output.extend_from_slice(&group::element_to_bytes(&self.alpha));
        output
    }

    /// Deserialization from bytes
    pub fn deserialize(input: &[u8]) -> Result<Self, ProtocolError> {
        let checked_bytes = check_slice_size(input, CLIENT_LOGIN_LEN, "client_login")?;
        let mut client_nonce = [0u8; NONCE_LEN];
        client_nonce.copy_from_slice(&checked_bytes[64..96]);
        Ok(Self {
            blind: group::from_scalar_slice(&checked_bytes[..32])?,
            client_e_sk: PrivateKey::from_slice(&checked_bytes[32..64])?,
            client_nonce,
            alpha: group::from_element_slice(&checked_bytes[96..])?,
        })
    }
}

/// The state the server holds between emitting its credential response and
/// verifying the user's authentication tag. Holds a live transcript clone,
/// so it exists only in memory and only for one handshake.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ServerLogin {
    session_key: Zeroizing<[u8; 32]>,
    km3: Zeroizing<[u8; 32]>,
    #[zeroize(skip)]
    transcript: Transcript,
}

/// Contains the fields that are returned by a server login start
pub struct ServerLoginStartResult {
    /// The credential response message to send to the client
    pub message: CredentialResponse,
    /// The server state that must be kept in order to verify the user
    pub state: ServerLogin,
}

/// Contains the fields that are returned by a server login finish
pub struct ServerLoginFinishResult {
    /// The shared session key, now mutually authenticated
    pub session_key: OutputKey,
}

impl ServerLogin {
    /// Evaluates the OPRF on the user's blinded element, completes the
    /// server side of the triple-DH against the stored record, and emits
    /// the second flight carrying the envelope and the server
    /// authentication tag
    pub fn start<R: RngCore + CryptoRng>(
        rng: &mut R,
        record: &UserRecord,
        message: CredentialRequest,
        params: ServerLoginStartParameters<'_>,
    ) -> Result<ServerLoginStartResult, ProtocolError> {
        let CredentialRequest {
            alpha,
            client_e_pk,
            client_nonce,
        } = message;

        let server_e_kp = KeyPair::generate_random(rng);
        let mut server_nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut server_nonce);

        let beta = oprf::evaluate(&record.oprf_key, &alpha)?;

        let infos = params.infos.unwrap_or_default();
        let info = calc_info(
            &client_nonce,
            &server_nonce,
            params.ids.client,
            params.ids.server,
        );
        let keys = server_3dh(
            &record.server_s_sk,
            server_e_kp.private(),
            &record.client_s_pk,
            &client_e_pk,
            &info,
        )?;

        let envelope = record.envelope.clone();
        let transcript = Transcript::new(
            &group::element_to_bytes(&alpha),
            &client_nonce,
            infos.info1,
            &client_e_pk.to_bytes(),
            &group::element_to_bytes(&beta),
            envelope.blob(),
            &server_nonce,
            infos.info2,
            &server_e_kp.public().to_bytes(),
            infos.einfo2,
        );
        let auth = auth_tag(&keys.km2, &transcript.digest())?;

        Ok(ServerLoginStartResult {
            message: CredentialResponse {
                beta,
                server_e_pk: *server_e_kp.public(),
                server_nonce,
                auth,
                envelope,
            },
            state: Self {
                session_key: Zeroizing::new(keys.sk),
                km3: Zeroizing::new(keys.km3),
                transcript,
            },
        })
    }

    /// The session key as derived at [`ServerLogin::start`]. The user is
    /// not authenticated until [`ServerLogin::finish`] succeeds.
    pub fn session_key(&self) -> &[u8; 32] {
        &self.session_key
    }

    /// Verifies the user's authentication tag over the full transcript,
    /// absorbing the third-flight infos into the saved hash state
    pub fn finish(
        self,
        message: CredentialFinalization,
        infos: Option<AppInfos<'_>>,
    ) -> Result<ServerLoginFinishResult, ProtocolError> {
        let infos = infos.unwrap_or_default();
        let digest = self.transcript.final_digest(infos.info3, infos.einfo3);
        if !verify_tag(&self.km3, &digest, &message.mac)? {
            return Err(ProtocolError::UserAuthError);
        }
        Ok(ServerLoginFinishResult {
            session_key: self.session_key.clone(),
        })
    }
}
