//! expectimax-2048: a 2048 move engine
//!
//! This crate provides:
//! - A compact `Board` type with ergonomic methods (`shift`, `make_move`, `score`, ...)
//! - An Expectimax move selector (`expectimax` module) that scores the four
//!   root directions sequentially or on rayon's pool
//! - A rule-based policy (`rules`) and a random baseline behind the same
//!   [`strategy::Strategy`] interface
//! - TOML configuration (`config`) and a local self-play loop (`selfplay`)
//!
//! Quick start:
//! ```
//! use expectimax_2048::engine::{Board, Move};
//! use expectimax_2048::expectimax::Expectimax;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic board initialization with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let b0 = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
//! let mut ex = Expectimax::new();
//! let dir = ex.best_move(b0).unwrap();
//! assert_ne!(b0.shift(dir), b0);
//! let b1 = b0.make_move(dir, &mut rng);
//! assert_eq!(b1.count_empty(), b0.shift(dir).count_empty() - 1);
//! ```
//!
//! Boards parse from text as well: `"2 2 . . / . . . . / . . . . / . . . 4".parse::<Board>()`.
pub mod config;
pub mod engine;
pub mod expectimax;
pub mod rules;
pub mod selfplay;
pub mod strategy;
