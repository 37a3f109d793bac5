use criterion::{criterion_group, criterion_main, Criterion};
use expectimax_2048::engine::{Board, Move};
use expectimax_2048::expectimax::{evaluate, Expectimax, ExpectimaxConfig, SpawnPolicy, SNAKE_WEIGHTS};
use rand::{rngs::StdRng, SeedableRng};
use rayon::ThreadPoolBuilder;
use std::hint::black_box;

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(7777);
    let mut boards = Vec::new();
    let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    boards.push(b);
    let seq = [Move::Left, Move::Up, Move::Right, Move::Down];
    for i in 0..64 {
        let nb = b.shift(seq[i % seq.len()]);
        if nb != b { b = nb.with_random_tile(&mut rng); }
        boards.push(b);
    }
    boards
}

fn bench_evaluate(c: &mut Criterion) {
    let boards = corpus();
    c.bench_function("heuristic/evaluate", |bch| {
        bch.iter(|| {
            let mut acc = 0.0;
            for &bd in &boards { acc += evaluate(black_box(bd), &SNAKE_WEIGHTS); }
            black_box(acc)
        })
    });
}

fn bench_branch_evals(c: &mut Criterion) {
    // Pin a small pool for stability
    let pool = ThreadPoolBuilder::new().num_threads(4).build().unwrap();
    let boards = corpus();
    let mut seq = Expectimax::with_config(ExpectimaxConfig { parallel: false, ..Default::default() });
    let mut par = Expectimax::with_config(ExpectimaxConfig::default());
    let mut full = Expectimax::with_config(ExpectimaxConfig {
        spawn_policy: SpawnPolicy::FullExpectation,
        ..Default::default()
    });

    c.bench_function("expectimax/branch_evals_seq", |bch| {
        bch.iter(|| {
            let mut acc = 0.0;
            for &bd in &boards {
                for be in seq.branch_evals(bd) { if be.legal { acc += be.ev; } }
            }
            black_box(acc)
        })
    });

    c.bench_function("expectimax/branch_evals_par", |bch| {
        bch.iter(|| pool.install(|| {
            let mut acc = 0.0;
            for &bd in &boards {
                for be in par.branch_evals(bd) { if be.legal { acc += be.ev; } }
            }
            black_box(acc)
        }))
    });

    c.bench_function("expectimax/branch_evals_full_expectation", |bch| {
        bch.iter(|| pool.install(|| {
            let mut acc = 0.0;
            for &bd in &boards { acc += full.state_value(bd); }
            black_box(acc)
        }))
    });
}

fn bench_e2e(c: &mut Criterion) {
    let pool = ThreadPoolBuilder::new().num_threads(4).build().unwrap();
    let mut ex = Expectimax::with_config(ExpectimaxConfig { fallback_seed: Some(13), ..Default::default() });
    c.bench_function("e2e/64_moves", |bch| {
        bch.iter(|| pool.install(|| {
            let mut rng = StdRng::seed_from_u64(13);
            let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
            let mut steps = 0;
            while steps < 64 {
                let Some(dir) = ex.best_move(b) else { break };
                b = b.make_move(dir, &mut rng);
                steps += 1;
            }
            black_box((b.raw(), steps))
        }))
    });
}

criterion_group!(benches, bench_evaluate, bench_branch_evals, bench_e2e);
criterion_main!(benches);
