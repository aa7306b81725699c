// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! An implementation of the OPAQUE asymmetric password authenticated key
//! exchange protocol, instantiated over Ristretto255 with a Triple
//! Diffie-Hellman key exchange and explicit mutual authentication.
//!
//! A client and a server jointly derive a shared session key from a human
//! password such that the server never learns the password, an offline
//! dictionary attack requires both the server's per-user record and a
//! memory-hard password hash per guess, and the server holds no
//! password-equivalent verifier. On top of the session key, the client
//! obtains an export key and a deterministic randomized-password
//! derivative (`rwd`) usable as a key for other client-side secrets, and
//! recovers application data sealed into its record at registration.
//!
//! The cipher suite is fixed: Ristretto255 for the OPRF and the key
//! exchange, SHA-256 for the transcript and all HKDF/HMAC derivations,
//! keyed BLAKE2b for the OPRF output, and Argon2id with interactive
//! parameters as the password hardening function.
//!
//! # Registration
//!
//! Registration can be run in two ways. In the privacy-preserving flow the
//! password and the user's long-term secret key never leave the client:
//!
//! ```
//! use opaque255::{
//!     errors::ProtocolError,
//!     ClientLogin, ClientLoginFinishParameters, ClientRegistration, Ids,
//!     RegistrationParameters, ServerLogin, ServerLoginStartParameters,
//!     ServerRegistration,
//! };
//! use rand::rngs::OsRng;
//!
//! let mut rng = OsRng;
//! let ids = Ids {
//!     client: b"alice",
//!     server: b"example.org",
//! };
//! let params = RegistrationParameters {
//!     extra: b"sealed beside the keys",
//!     key: None,
//!     cleartext: b"",
//! };
//!
//! let registration_start = ClientRegistration::start(&mut rng, b"correct horse");
//! let server_registration = ServerRegistration::start(&mut rng, registration_start.message)?;
//! let registration_finish = registration_start.state.finish(
//!     &mut rng,
//!     b"correct horse",
//!     server_registration.message,
//!     &params,
//! )?;
//! let record = server_registration.state.finish(registration_finish.message);
//!
//! // Login against the freshly created record.
//! let login_start = ClientLogin::start(&mut rng, b"correct horse");
//! let server_login = ServerLogin::start(
//!     &mut rng,
//!     &record,
//!     login_start.message,
//!     ServerLoginStartParameters { ids, infos: None },
//! )?;
//! let login_finish = login_start.state.finish(
//!     b"correct horse",
//!     server_login.message,
//!     ClientLoginFinishParameters {
//!         key: None,
//!         ids,
//!         infos: None,
//!     },
//! )?;
//! let server_finish = server_login.state.finish(login_finish.message, None)?;
//!
//! assert_eq!(*login_finish.session_key, *server_finish.session_key);
//! assert_eq!(*registration_finish.export_key, *login_finish.export_key);
//! assert_eq!(*registration_finish.rwd, *login_finish.rwd);
//! assert_eq!(&login_finish.extra[..], b"sealed beside the keys");
//! # Ok::<(), ProtocolError>(())
//! ```
//!
//! Alternatively, a server trusted with the password at registration time
//! (but only then) creates the whole record in one step with
//! [`UserRecord::register`] and hands the export key back to the user.
//!
//! # Failure behavior
//!
//! Any verification failure aborts the handshake: the envelope check, the
//! server tag check, and the user tag check each collapse to their own
//! error kind, no output keys are released, and dropped state zeroes its
//! secrets. A peer observing the wire learns only that the handshake did
//! not complete.

#![deny(unsafe_code)]
#![deny(missing_docs)]

// Error types
pub mod errors;

mod envelope;
mod group;
mod key_exchange;
mod messages;
// High-level API
mod opaque;
mod oprf;
mod transcript;

pub mod keypair;

#[cfg(test)]
mod tests;

// Exports

pub use crate::envelope::MAX_EXTRA_LEN;
pub use crate::messages::{
    CredentialFinalization, CredentialRequest, CredentialResponse, RegistrationRequest,
    RegistrationResponse, RegistrationUpload, CREDENTIAL_FINALIZATION_LEN, CREDENTIAL_REQUEST_LEN,
    REGISTRATION_REQUEST_LEN, REGISTRATION_RESPONSE_LEN,
};
pub use crate::opaque::{
    AppInfos, ClientLogin, ClientLoginFinishParameters, ClientLoginFinishResult,
    ClientLoginStartResult, ClientRegistration, ClientRegistrationFinishResult,
    ClientRegistrationStartResult, Ids, RegistrationParameters, ServerLogin,
    ServerLoginFinishResult, ServerLoginStartParameters, ServerLoginStartResult,
    ServerRegistration, ServerRegistrationStartResult, UserRecord,
};

/// A 32-byte secret protocol output (session key, export key or `rwd`),
/// zeroed on drop
pub type OutputKey = zeroize::Zeroizing<[u8; 32]>;
