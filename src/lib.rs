#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt; // defmt when enabled, nothing otherwise

pub mod error;
pub mod tracker; // counts electrical rotations from angle bins

pub mod ilc; // iterative learning control
pub mod pulsations; // synthetic torque ripple
pub mod qlearning; // reinforcement learning keyed by rotor angle

pub use error::ConfigurationError;
pub use ilc::{Ilc, IlcConfig};
pub use pulsations::{Harmonic, Pulsator};
pub use qlearning::policy::RandomSource;
pub use qlearning::{DefaultQTable, QConfig, QTable, State, TrainingStats};

// The control interface shared by the ripple compensators.
// Called once per control tick with the electrical rotor angle in [0, 1),
// the measured value and its reference; returns the correction to add to
// the torque command. None of them block, allocate or fail.
pub trait Compensator {
    fn compensation(&mut self, angle: f32, actual: f32, reference: f32) -> f32;
}

// Planning
// Torque ripple from cogging and flux harmonics repeats with the rotor
// angle, so it can be learned as a function of angle and cancelled ahead of
// time. The ILC replays last rotation's error, the Q-table learns which
// correction keeps the measured value steadiest at each angle.
