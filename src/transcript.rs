// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Transcript bookkeeping for the login handshake.
//!
//! Both peers absorb the handshake fields into a running SHA-256 state in
//! one canonical order:
//!
//! `alpha ‖ nonceU ‖ info1* ‖ X_u ‖ beta ‖ envelope ‖ nonceS ‖ info2* ‖
//! X_s ‖ einfo2* ‖ info3* ‖ einfo3*`
//!
//! (starred fields are optional application infos). The server tag covers
//! the transcript up to and including `einfo2`; the user tag additionally
//! covers `info3` and `einfo3`, which belong to the third flight. The state
//! is therefore kept un-finalized at the `einfo2` boundary and cloned for
//! each digest, which is also what lets the server check the user tag
//! later without retaining the handshake fields themselves.

use digest::Digest;
use sha2::Sha256;

/// A login transcript, absorbed up to the second-flight boundary
#[derive(Clone)]
pub(crate) struct Transcript {
    state: Sha256,
}

impl Transcript {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        alpha: &[u8; 32],
        client_nonce: &[u8; 32],
        info1: Option<&[u8]>,
        client_e_pk: &[u8; 32],
        beta: &[u8; 32],
        envelope: &[u8],
        server_nonce: &[u8; 32],
        info2: Option<&[u8]>,
        server_e_pk: &[u8; 32],
        einfo2: Option<&[u8]>,
    ) -> Self {
        let mut state = Sha256::new();
        state.update(alpha);
        state.update(client_nonce);
        if let Some(info1) = info1 {
            state.update(info1);
        }
        state.update(client_e_pk);
        state.update(beta);
        state.update(envelope);
        state.update(server_nonce);
        if let Some(info2) = info2 {
            state.update(info2);
        }
        state.update(server_e_pk);
        if let Some(einfo2) = einfo2 {
            state.update(einfo2);
        }
        Self { state }
    }

    /// The digest covered by the server authentication tag
    pub(crate) fn digest(&self) -> [u8; 32] {
        self.state.clone().finalize().into()
    }

    /// The digest covered by the user authentication tag, including the
    /// third-flight infos
    pub(crate) fn final_digest(&self, info3: Option<&[u8]>, einfo3: Option<&[u8]>) -> [u8; 32] {
        let mut state = self.state.clone();
        if let Some(info3) = info3 {
            state.update(info3);
        }
        if let Some(einfo3) = einfo3 {
            state.update(einfo3);
        }
        state.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transcript {
        Transcript::new(
            &[1u8; 32],
            &[2u8; 32],
            Some(b"info1"),
            &[3u8; 32],
            &[4u8; 32],
            &[5u8; 160],
            &[6u8; 32],
            None,
            &[7u8; 32],
            None,
        )
    }

    #[test]
    fn digest_is_stable_across_clones() {
        let transcript = sample();
        assert_eq!(transcript.digest(), transcript.digest());
        // taking the server digest must not disturb the saved state
        let _ = transcript.digest();
        assert_eq!(
            transcript.final_digest(None, None),
            transcript.digest()
        );
    }

    #[test]
    fn third_flight_infos_extend_the_digest() {
        let transcript = sample();
        let short = transcript.digest();
        let long = transcript.final_digest(Some(b"info3"), Some(b"einfo3"));
        assert_ne!(short, long);
        // absorbing nothing leaves the digest unchanged
        assert_eq!(short, transcript.final_digest(None, None));
    }
}
