use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use gxmss::signature::generalized_xmss::instantiations_poseidon::SigTargetSumLifetime8;
use gxmss::signature::{KeyRetention, SignatureScheme};

type Sig = SigTargetSumLifetime8;

fn bench_lifetime_8(c: &mut Criterion) {
    let mut rng = rand::rng();

    c.bench_function("keygen lifetime 2^8", |b| {
        b.iter(|| {
            let (pk, sk) =
                Sig::key_gen(&mut rng, 0, Sig::LIFETIME, KeyRetention::Full).unwrap();
            black_box((pk, sk))
        });
    });

    let (pk, sk) = Sig::key_gen(&mut rng, 0, Sig::LIFETIME, KeyRetention::Full).unwrap();
    let message: [u8; gxmss::MESSAGE_LENGTH] = rand::Rng::random(&mut rng);
    let epoch = 7;

    c.bench_function("sign lifetime 2^8", |b| {
        b.iter(|| black_box(Sig::sign(&sk, epoch, &message).unwrap()));
    });

    let signature = Sig::sign(&sk, epoch, &message).unwrap();
    c.bench_function("verify lifetime 2^8", |b| {
        b.iter(|| black_box(Sig::verify(&pk, epoch, &message, &signature).unwrap()));
    });
}

criterion_group!(benches, bench_lifetime_8);
criterion_main!(benches);
