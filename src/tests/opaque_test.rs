// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! End-to-end executions of both registration flows and the login
//! handshake, including the failure paths a misbehaving peer can trigger.
//! Every flight crosses the wire format: messages are serialized on one
//! side and deserialized on the other.

use crate::errors::ProtocolError;
use crate::{
    AppInfos, ClientLogin, ClientLoginFinishParameters, ClientLoginFinishResult,
    ClientRegistration, Ids, RegistrationParameters, ServerLogin, ServerLoginFinishResult,
    ServerLoginStartParameters, ServerRegistration, UserRecord,
};

use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

static PASSWORD: &[u8] = b"simple guessable dictionary password";
static EXTRA: &[u8] = b"some additional secret data stored in the blob";
static KEY: &[u8] = b"some optional key contributed to the opaque protocol";
static CLEARTEXT: &[u8] = b"ClrEnv";

fn ids() -> Ids<'static> {
    Ids {
        client: b"user",
        server: b"server",
    }
}

fn registration_parameters() -> RegistrationParameters<'static> {
    RegistrationParameters {
        extra: EXTRA,
        key: Some(KEY),
        cleartext: CLEARTEXT,
    }
}

// Runs a complete login against `record`, passing every flight through its
// byte representation
fn run_login(
    record: &UserRecord,
    password: &[u8],
    key: Option<&[u8]>,
    client_ids: Ids<'_>,
    server_ids: Ids<'_>,
    infos: Option<AppInfos<'_>>,
) -> Result<(ClientLoginFinishResult, ServerLoginFinishResult), ProtocolError> {
    let mut rng = OsRng;
    let client_start = ClientLogin::start(&mut rng, password);
    let request = crate::CredentialRequest::deserialize(&client_start.message.serialize())?;

    let server_start = ServerLogin::start(
        &mut rng,
        record,
        request,
        ServerLoginStartParameters {
            ids: server_ids,
            infos,
        },
    )?;
    let response = crate::CredentialResponse::deserialize(&server_start.message.serialize())?;
    // the server already holds the session key here, before user auth
    let early_session_key = *server_start.state.session_key();

    // park the client state between flights, as a caller would
    let client_state = ClientLogin::deserialize(&client_start.state.serialize())?;
    let client_finish = client_state.finish(
        password,
        response,
        ClientLoginFinishParameters {
            key,
            ids: client_ids,
            infos,
        },
    )?;

    let finalization =
        crate::CredentialFinalization::deserialize(&client_finish.message.serialize())?;
    let server_finish = server_start.state.finish(finalization, infos)?;
    assert_eq!(early_session_key, *server_finish.session_key);
    Ok((client_finish, server_finish))
}

#[test]
fn trusted_registration_then_login() -> Result<(), ProtocolError> {
    let mut rng = OsRng;
    let (record, export_key) =
        UserRecord::register(&mut rng, PASSWORD, &registration_parameters())?;

    let (client, server) = run_login(&record, PASSWORD, Some(KEY), ids(), ids(), None)?;

    assert!(bool::from(
        client.session_key.ct_eq(&*server.session_key)
    ));
    assert!(bool::from(client.export_key.ct_eq(&*export_key)));
    assert_eq!(&client.extra[..], EXTRA);
    assert_eq!(&client.cleartext[..], CLEARTEXT);
    Ok(())
}

#[test]
fn private_registration_then_login() -> Result<(), ProtocolError> {
    let mut rng = OsRng;

    let registration_start = ClientRegistration::start(&mut rng, PASSWORD);
    let request = crate::RegistrationRequest::deserialize(&registration_start.message.serialize())?;

    let server_registration = ServerRegistration::start(&mut rng, request)?;
    let response =
        crate::RegistrationResponse::deserialize(&server_registration.message.serialize())?;

    // park both registration states in their byte form
    let client_state = ClientRegistration::deserialize(&registration_start.state.serialize())?;
    let server_state = ServerRegistration::deserialize(&server_registration.state.serialize())?;

    let registration_finish =
        client_state.finish(&mut rng, PASSWORD, response, &registration_parameters())?;
    let upload = crate::RegistrationUpload::deserialize(&registration_finish.message.serialize())?;
    let record = server_state.finish(upload);

    // the record survives storage as bytes
    let record = UserRecord::deserialize(&record.serialize())?;

    let (client, server) = run_login(&record, PASSWORD, Some(KEY), ids(), ids(), None)?;
    assert!(bool::from(
        client.session_key.ct_eq(&*server.session_key)
    ));
    assert!(bool::from(
        client.export_key.ct_eq(&*registration_finish.export_key)
    ));
    assert!(bool::from(client.rwd.ct_eq(&*registration_finish.rwd)));
    assert_eq!(&client.extra[..], EXTRA);
    Ok(())
}

#[test]
fn wrong_password_fails_envelope_auth() -> Result<(), ProtocolError> {
    let mut rng = OsRng;
    let (record, _) = UserRecord::register(&mut rng, PASSWORD, &registration_parameters())?;

    let result = run_login(
        &record,
        b"Simple guessable dictionary password",
        Some(KEY),
        ids(),
        ids(),
        None,
    );
    assert_eq!(result.err().unwrap(), ProtocolError::EnvelopeAuthError);
    Ok(())
}

#[test]
fn wrong_oprf_key_fails_envelope_auth() -> Result<(), ProtocolError> {
    let mut rng = OsRng;
    let (record, _) = UserRecord::register(&mut rng, PASSWORD, &registration_parameters())?;

    let result = run_login(&record, PASSWORD, Some(b"a different key"), ids(), ids(), None);
    assert_eq!(result.err().unwrap(), ProtocolError::EnvelopeAuthError);
    Ok(())
}

#[test]
fn mismatched_ids_fail_server_auth() -> Result<(), ProtocolError> {
    let mut rng = OsRng;
    let (record, _) = UserRecord::register(&mut rng, PASSWORD, &registration_parameters())?;

    let result = run_login(
        &record,
        PASSWORD,
        Some(KEY),
        Ids {
            client: b"eve",
            server: b"server",
        },
        Ids {
            client: b"alice",
            server: b"server",
        },
        None,
    );
    assert_eq!(result.err().unwrap(), ProtocolError::ServerAuthError);
    Ok(())
}

#[test]
fn tampered_beta_fails() -> Result<(), ProtocolError> {
    let mut rng = OsRng;
    let (record, _) = UserRecord::register(&mut rng, PASSWORD, &registration_parameters())?;

    let client_start = ClientLogin::start(&mut rng, PASSWORD);
    let server_start = ServerLogin::start(
        &mut rng,
        &record,
        client_start.message,
        ServerLoginStartParameters {
            ids: ids(),
            infos: None,
        },
    )?;

    let mut response_bytes = server_start.message.serialize();
    response_bytes[31] ^= 0x80;

    // either the encoding is no longer a group element, or the handshake
    // fails one of its authentication checks downstream
    let result = crate::CredentialResponse::deserialize(&response_bytes).and_then(|response| {
        client_start.state.finish(
            PASSWORD,
            response,
            ClientLoginFinishParameters {
                key: Some(KEY),
                ids: ids(),
                infos: None,
            },
        )
    });
    assert!(result.is_err());
    Ok(())
}

#[test]
fn any_flipped_wire_bit_fails_the_handshake() -> Result<(), ProtocolError> {
    let mut rng = OsRng;
    let (record, _) = UserRecord::register(&mut rng, PASSWORD, &registration_parameters())?;

    // one position inside each field of the first flight:
    // alpha, X_u, nonceU
    for position in [5usize, 37, 70] {
        let client_start = ClientLogin::start(&mut rng, PASSWORD);
        let mut request_bytes = client_start.message.serialize();
        request_bytes[position] ^= 0x04;

        let result = crate::CredentialRequest::deserialize(&request_bytes).and_then(|request| {
            let server_start = ServerLogin::start(
                &mut rng,
                &record,
                request,
                ServerLoginStartParameters {
                    ids: ids(),
                    infos: None,
                },
            )?;
            client_start.state.finish(
                PASSWORD,
                server_start.message,
                ClientLoginFinishParameters {
                    key: Some(KEY),
                    ids: ids(),
                    infos: None,
                },
            )
        });
        assert!(result.is_err(), "bit flip at {position} went unnoticed");
    }

    // one position inside each field of the second flight:
    // beta, X_s, nonceS, auth, envelope nonce, envelope ciphertext
    for position in [5usize, 37, 70, 100, 140, 180] {
        let client_start = ClientLogin::start(&mut rng, PASSWORD);
        let server_start = ServerLogin::start(
            &mut rng,
            &record,
            client_start.message.clone(),
            ServerLoginStartParameters {
                ids: ids(),
                infos: None,
            },
        )?;
        let mut response_bytes = server_start.message.serialize();
        response_bytes[position] ^= 0x04;

        let result = crate::CredentialResponse::deserialize(&response_bytes).and_then(|response| {
            client_start.state.finish(
                PASSWORD,
                response,
                ClientLoginFinishParameters {
                    key: Some(KEY),
                    ids: ids(),
                    infos: None,
                },
            )
        });
        assert!(result.is_err(), "bit flip at {position} went unnoticed");
    }

    // the third flight: the user authentication tag itself
    let client_start = ClientLogin::start(&mut rng, PASSWORD);
    let server_start = ServerLogin::start(
        &mut rng,
        &record,
        client_start.message,
        ServerLoginStartParameters {
            ids: ids(),
            infos: None,
        },
    )?;
    let client_finish = client_start.state.finish(
        PASSWORD,
        server_start.message,
        ClientLoginFinishParameters {
            key: Some(KEY),
            ids: ids(),
            infos: None,
        },
    )?;
    let mut finalization_bytes = client_finish.message.serialize();
    finalization_bytes[7] ^= 0x04;
    let finalization = crate::CredentialFinalization::deserialize(&finalization_bytes)?;
    assert_eq!(
        server_start.state.finish(finalization, None).err().unwrap(),
        ProtocolError::UserAuthError
    );
    Ok(())
}

#[test]
fn empty_extra_record_is_minimal() -> Result<(), ProtocolError> {
    let mut rng = OsRng;
    let (record, export_key) = UserRecord::register(
        &mut rng,
        PASSWORD,
        &RegistrationParameters {
            extra: b"",
            key: None,
            cleartext: b"",
        },
    )?;

    // k_s ‖ p_s ‖ P_u ‖ P_s ‖ extra_len ‖ nonce ‖ C ‖ tag
    let record_bytes = record.serialize();
    assert_eq!(record_bytes.len(), 4 * 32 + 8 + 32 + 96 + 32);
    // with no extra data, the final 32 bytes of the blob are the tag alone
    assert_eq!(
        u64::from_le_bytes(record_bytes[128..136].try_into().unwrap()),
        0
    );

    let (client, server) = run_login(&record, PASSWORD, None, ids(), ids(), None)?;
    assert!(bool::from(
        client.session_key.ct_eq(&*server.session_key)
    ));
    assert!(bool::from(client.export_key.ct_eq(&*export_key)));
    assert!(client.extra.is_empty());
    assert!(client.cleartext.is_empty());
    Ok(())
}

#[test]
fn app_infos_are_bound_into_the_transcript() -> Result<(), ProtocolError> {
    let mut rng = OsRng;
    let (record, _) = UserRecord::register(&mut rng, PASSWORD, &registration_parameters())?;

    let infos = AppInfos {
        info1: Some(b"first flight"),
        info2: Some(b"second flight"),
        einfo2: Some(b"second flight, encrypted"),
        info3: Some(b"third flight"),
        einfo3: Some(b"third flight, encrypted"),
    };

    let (client, server) = run_login(&record, PASSWORD, Some(KEY), ids(), ids(), Some(infos))?;
    assert!(bool::from(
        client.session_key.ct_eq(&*server.session_key)
    ));

    // a client disagreeing on a second-flight info cannot verify the server
    let mut disagreeing = infos;
    disagreeing.einfo2 = Some(b"something else");
    let client_start = ClientLogin::start(&mut rng, PASSWORD);
    let server_start = ServerLogin::start(
        &mut rng,
        &record,
        client_start.message,
        ServerLoginStartParameters {
            ids: ids(),
            infos: Some(infos),
        },
    )?;
    let result = client_start.state.finish(
        PASSWORD,
        server_start.message,
        ClientLoginFinishParameters {
            key: Some(KEY),
            ids: ids(),
            infos: Some(disagreeing),
        },
    );
    assert_eq!(result.err().unwrap(), ProtocolError::ServerAuthError);

    // a server disagreeing on a third-flight info cannot verify the user
    let client_start = ClientLogin::start(&mut rng, PASSWORD);
    let server_start = ServerLogin::start(
        &mut rng,
        &record,
        client_start.message,
        ServerLoginStartParameters {
            ids: ids(),
            infos: Some(infos),
        },
    )?;
    let client_finish = client_start.state.finish(
        PASSWORD,
        server_start.message,
        ClientLoginFinishParameters {
            key: Some(KEY),
            ids: ids(),
            infos: Some(infos),
        },
    )?;
    let mut disagreeing = infos;
    disagreeing.info3 = Some(b"revised third flight");
    assert_eq!(
        server_start
            .state
            .finish(client_finish.message, Some(disagreeing))
            .err()
            .unwrap(),
        ProtocolError::UserAuthError
    );
    Ok(())
}

#[test]
fn malformed_group_elements_are_rejected() {
    // the identity and a non-canonical encoding, in place of alpha
    for bad_alpha in [[0u8; 32], [0xffu8; 32]] {
        let mut request_bytes = Vec::new();
        request_bytes.extend_from_slice(&bad_alpha);
        request_bytes.extend_from_slice(&[1u8; 64]);
        assert!(matches!(
            crate::CredentialRequest::deserialize(&request_bytes),
            Err(ProtocolError::CryptoError(_))
        ));
        assert!(matches!(
            crate::RegistrationRequest::deserialize(&bad_alpha),
            Err(ProtocolError::CryptoError(_))
        ));
    }
}

#[test]
fn oversized_extra_is_rejected() {
    let mut rng = OsRng;
    let extra = vec![0u8; crate::MAX_EXTRA_LEN + 1];
    let result = UserRecord::register(
        &mut rng,
        PASSWORD,
        &RegistrationParameters {
            extra: &extra,
            key: None,
            cleartext: b"",
        },
    );
    assert_eq!(result.unwrap_err(), ProtocolError::OverflowError);
}
