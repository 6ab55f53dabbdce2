use rand::{Rng, RngCore};

use super::table::find_max;

/// Exploration never drops below this, so some exploring always continues.
pub const EPSILON_FLOOR: f32 = 0.01;
pub const EPSILON_START: f32 = 1.0;

/// Where the controller gets its randomness from.
///
/// Every `rand` generator is one. Tests hand in scripted sequences instead.
pub trait RandomSource {
    /// Uniform draw in `[0, 1)`.
    fn uniform(&mut self) -> f32;
    /// Uniform index in `[0, bound)`.
    fn index(&mut self, bound: usize) -> usize;
}

impl<R: RngCore> RandomSource for R {
    fn uniform(&mut self) -> f32 {
        self.gen::<f32>()
    }

    fn index(&mut self, bound: usize) -> usize {
        self.gen_range(0..bound)
    }
}

/// Exploration rate after `iteration` ticks, `ek / (ek + iteration)`.
///
/// Once `current` has reached the floor it stays pinned there until the
/// owner resets it, whatever the iteration count does.
pub fn decayed_epsilon(current: f32, iteration: u32, ek: f32) -> f32 {
    if current <= EPSILON_FLOOR {
        return EPSILON_FLOOR;
    }
    (ek / (ek + iteration as f32)).clamp(EPSILON_FLOOR, EPSILON_START)
}

/// Epsilon-greedy choice over one row of the value table.
///
/// Always consumes exactly one uniform draw, plus an index draw when
/// exploring.
pub fn select_action<S: RandomSource>(row: &[f32], epsilon: f32, rng: &mut S) -> usize {
    if rng.uniform() > epsilon {
        find_max(row).index
    } else {
        rng.index(row.len())
    }
}
