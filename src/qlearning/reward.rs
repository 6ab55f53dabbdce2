use micromath::F32;

/// Scores a transition by how far the measured value is from the reference
/// and how much it moved since the previous transition.
///
/// The oscillation term is weighted by `lambda`, which is large on purpose:
/// jitter costs far more than a steady offset.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardModel {
    pub lambda: f32,
    previous_actual: Option<f32>,
}

impl RewardModel {
    pub const fn new(lambda: f32) -> Self {
        RewardModel {
            lambda,
            previous_actual: None,
        }
    }

    /// `-(|actual - reference| + lambda * |actual - previous|)`.
    ///
    /// The very first call has no previous value and scores the tracking
    /// error alone.
    pub fn reward(&mut self, actual: f32, reference: f32) -> f32 {
        let previous = self.previous_actual.unwrap_or(actual);
        let cost = F32(actual - reference).abs().0 + self.lambda * F32(actual - previous).abs().0;
        self.previous_actual = Some(actual);
        -cost
    }

    pub fn previous_actual(&self) -> Option<f32> {
        self.previous_actual
    }

    pub fn reset(&mut self) {
        self.previous_actual = None;
    }
}

/// What one rotation told us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Improvement {
    /// Peak-to-peak of the measured value beat the best rotation so far.
    pub ripple: bool,
    /// A full reward window closed with a better average than any before.
    pub reward: bool,
}

/// Watches the measured value per rotation and the reward per window to
/// tell the training loop when the table is worth checkpointing.
#[derive(Debug, Clone, PartialEq)]
pub struct ImprovementTracker {
    window: usize,

    // extremes of the rotation in progress
    rotation_min: f32,
    rotation_max: f32,
    best_ripple: f32,

    cumulative_reward: f32,
    samples: usize,
    last_average: Option<f32>,
    best_average: f32,
    // set when a window beats the best average, cleared at the next rotation
    average_improved: bool,
}

impl ImprovementTracker {
    /// `window` is the number of rewards per average, normally the bin count.
    pub const fn new(window: usize) -> Self {
        ImprovementTracker {
            window,
            rotation_min: f32::INFINITY,
            rotation_max: f32::NEG_INFINITY,
            best_ripple: f32::INFINITY,
            cumulative_reward: 0.0,
            samples: 0,
            last_average: None,
            best_average: f32::NEG_INFINITY,
            average_improved: false,
        }
    }

    pub fn observe(&mut self, actual: f32) {
        if actual < self.rotation_min {
            self.rotation_min = actual;
        }
        if actual > self.rotation_max {
            self.rotation_max = actual;
        }
    }

    /// Adds a reward to the running window. Returns true when this sample
    /// closed a window whose average beats every earlier window.
    pub fn push_reward(&mut self, reward: f32) -> bool {
        self.cumulative_reward += reward;
        self.samples += 1;
        if self.samples < self.window {
            return false;
        }

        let average = self.cumulative_reward / self.window as f32;
        self.cumulative_reward = 0.0;
        self.samples = 0;
        self.last_average = Some(average);
        if average > self.best_average {
            self.best_average = average;
            self.average_improved = true;
            return true;
        }
        false
    }

    /// Closes the rotation in progress: scores its ripple, reports both
    /// signals and starts tracking the next rotation from scratch.
    pub fn rotation_completed(&mut self) -> Improvement {
        let mut improvement = Improvement {
            ripple: false,
            reward: self.average_improved,
        };

        // a rotation with no samples has nothing to say
        if self.rotation_max >= self.rotation_min {
            let ripple = self.rotation_max - self.rotation_min;
            if ripple < self.best_ripple {
                self.best_ripple = ripple;
                improvement.ripple = true;
            }
        }

        self.rotation_min = f32::INFINITY;
        self.rotation_max = f32::NEG_INFINITY;
        self.average_improved = false;
        improvement
    }

    pub fn best_ripple(&self) -> Option<f32> {
        self.best_ripple.is_finite().then_some(self.best_ripple)
    }

    pub fn best_average(&self) -> Option<f32> {
        self.best_average.is_finite().then_some(self.best_average)
    }

    pub fn last_average(&self) -> Option<f32> {
        self.last_average
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.window);
    }
}
