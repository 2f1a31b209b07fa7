use core_game::portal::spin;
use core_game::progression::reconcile;
use core_game::{GameConfig, PlayerId, PlayerState, SpinMode};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const T0: i64 = 1_709_290_800;

fn bench_portal(c: &mut Criterion) {
    let config = GameConfig::builtin();
    let mut group = c.benchmark_group("portal");

    for mode in [SpinMode::Single, SpinMode::Bulk] {
        group.bench_with_input(
            BenchmarkId::new("spin", mode.spins()),
            &mode,
            |b, &mode| {
                b.iter_batched(
                    || {
                        let mut player = PlayerState::new(PlayerId(1), T0);
                        player.premium.fragments = 1_000;
                        (player, ChaCha8Rng::seed_from_u64(42))
                    },
                    |(mut player, mut rng)| {
                        for _ in 0..50 {
                            spin(&mut player, mode, T0, &config, &mut rng)
                                .expect("bench player has fragments");
                        }
                        player
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_reconcile(c: &mut Criterion) {
    let config = GameConfig::builtin();
    let mut group = c.benchmark_group("reconcile");

    for minutes in [1i64, 60, 60 * 24 * 30] {
        group.bench_with_input(
            BenchmarkId::new("elapsed_minutes", minutes),
            &minutes,
            |b, &minutes| {
                b.iter_batched(
                    || {
                        let mut player = PlayerState::new(PlayerId(1), T0);
                        player.premium.auto_collector_active = true;
                        player.premium.auto_collector_expires_at = T0 * 2;
                        player
                    },
                    |mut player| reconcile(&mut player, T0 + minutes * 60, &config),
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(portal_benches, bench_portal, bench_reconcile);
criterion_main!(portal_benches);
