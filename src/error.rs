use thiserror::Error;

// Everything here is raised by a constructor. Once a controller exists,
// none of its per-tick operations can fail.

/// A controller was set up with parameters it cannot run with.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationError {
    #[error("at least 2 angle bins are required, got {0}")]
    TooFewBins(usize),
    #[error("at least 2 actions are required, got {0}")]
    TooFewActions(usize),
    #[error("learning rate must lie in [0, 1], got {0}")]
    LearningRate(f32),
    #[error("discount factor must lie in [0, 1], got {0}")]
    DiscountFactor(f32),
    #[error("exploration decay must be positive and finite, got {0}")]
    ExplorationDecay(f32),
    #[error("oscillation penalty must be non-negative and finite, got {0}")]
    OscillationPenalty(f32),
    #[error("training budget must be at least one iteration")]
    TrainingBudget,
    #[error("lookup array is not strictly increasing at index {0}")]
    NotMonotonic(usize),
    #[error("forgetting factor must lie in [0, 1], got {0}")]
    ForgettingFactor(f32),
    #[error("learning gain must be finite, got {0}")]
    Gain(f32),
    #[error("ramp down needs at least one step")]
    RampSteps,
    #[error("ILC buffer needs at least 2 positions, got {0}")]
    BufferTooSmall(usize),
}
