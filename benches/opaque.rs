// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use criterion::{criterion_group, criterion_main, Criterion};
use opaque255::{
    ClientLogin, ClientLoginFinishParameters, Ids, RegistrationParameters, ServerLogin,
    ServerLoginStartParameters, UserRecord,
};
use rand::rngs::OsRng;

static PASSWORD: &[u8] = b"simple guessable dictionary password";

fn bench_client_login_start(c: &mut Criterion) {
    let mut rng = OsRng;
    c.bench_function("client login start", move |b| {
        b.iter(|| ClientLogin::start(&mut rng, PASSWORD))
    });
}

fn bench_server_login_start(c: &mut Criterion) {
    let mut rng = OsRng;
    let (record, _) =
        UserRecord::register(&mut rng, PASSWORD, &RegistrationParameters::default()).unwrap();
    c.bench_function("server login start", move |b| {
        b.iter_batched(
            || ClientLogin::start(&mut rng, PASSWORD).message,
            |request| {
                ServerLogin::start(
                    &mut OsRng,
                    &record,
                    request,
                    ServerLoginStartParameters::default(),
                )
                .unwrap()
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_full_login(c: &mut Criterion) {
    let mut rng = OsRng;
    let ids = Ids {
        client: b"user",
        server: b"server",
    };
    let (record, _) =
        UserRecord::register(&mut rng, PASSWORD, &RegistrationParameters::default()).unwrap();

    c.bench_function("full login handshake", move |b| {
        b.iter(|| {
            let client_start = ClientLogin::start(&mut OsRng, PASSWORD);
            let server_start = ServerLogin::start(
                &mut OsRng,
                &record,
                client_start.message,
                ServerLoginStartParameters { ids, infos: None },
            )
            .unwrap();
            let client_finish = client_start
                .state
                .finish(
                    PASSWORD,
                    server_start.message,
                    ClientLoginFinishParameters {
                        key: None,
                        ids,
                        infos: None,
                    },
                )
                .unwrap();
            server_start.state.finish(client_finish.message, None).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_client_login_start,
    bench_server_login_start,
    bench_full_login
);
criterion_main!(benches);
