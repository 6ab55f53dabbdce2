// Tabular Q-learning keyed by rotor angle.
//
// The state is the discretized electrical angle, the action one of a fixed
// set of compensation magnitudes. Learning runs inside the control tick, so
// every table lives inside the controller and nothing here allocates.

pub mod discretize;
pub mod policy;
pub mod reward;
pub mod table;

use crate::error::ConfigurationError;
use crate::tracker::RotationTracker;
use crate::Compensator;

use discretize::{ActionSpace, AngleBins};
use policy::{RandomSource, EPSILON_START};
use reward::{ImprovementTracker, RewardModel};
use table::Table;

pub const ANGLE_NUM: usize = 100;
pub const ACTION_NUM: usize = 7;

/// The controller at its usual firmware size.
pub type DefaultQTable<R> = QTable<R, ANGLE_NUM, ACTION_NUM>;

/// Tunables of the learning controller.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QConfig {
    // learning rate, [0, 1]
    pub alpha: f32,
    // discount factor, [0, 1]
    pub gamma: f32,
    // epsilon = ek / (ek + iteration)
    pub exploration_decay: f32,
    // weight of the oscillation term in the reward
    pub lambda: f32,
    // actions span [-max_action, +max_action]
    pub max_action: f32,
    // ticks until the best checkpoint is promoted and learning stops
    pub training_iterations: u32,
    // reward-average checkpoints are only taken while
    // training_iterations > reward_checkpoint_guard
    pub reward_checkpoint_guard: u32,
}

pub const DEFAULT_QCONFIG: QConfig = QConfig {
    alpha: 0.1,
    gamma: 0.9,
    exploration_decay: 1000.0,
    lambda: 32.0,
    max_action: 0.12,
    training_iterations: 300_000,
    reward_checkpoint_guard: 10_000,
};

impl Default for QConfig {
    fn default() -> Self {
        DEFAULT_QCONFIG
    }
}

impl QConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigurationError::LearningRate(self.alpha));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(ConfigurationError::DiscountFactor(self.gamma));
        }
        if !(self.exploration_decay.is_finite() && self.exploration_decay > 0.0) {
            return Err(ConfigurationError::ExplorationDecay(self.exploration_decay));
        }
        if !(self.lambda.is_finite() && self.lambda >= 0.0) {
            return Err(ConfigurationError::OscillationPenalty(self.lambda));
        }
        if self.training_iterations == 0 {
            return Err(ConfigurationError::TrainingBudget);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Idle,
    Learning,
    Completed,
}

/// A snapshot of the training bookkeeping, for monitoring.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrainingStats {
    pub iteration: u32,
    pub epsilon: f32,
    pub reward: f32,
    pub action: f32,
    // taken since construction, resets do not clear it
    pub checkpoints: u32,
    pub revolutions: i32,
    pub best_ripple: Option<f32>,
    pub best_average: Option<f32>,
}

// The (bin, action) pair chosen on the last transition, waiting for the
// reward of the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    bin: usize,
    action: usize,
}

/// Online Q-learning compensator with `N` angle bins and `A` actions.
pub struct QTable<R: RandomSource, const N: usize, const A: usize> {
    config: QConfig,
    state: State,

    angles: AngleBins<N>,
    actions: ActionSpace<A>,

    // learned values, updated every transition
    live: Table<N, A>,
    // copy of `live` from the last time things got better
    snapshot: Table<N, A>,
    has_snapshot: bool,

    rewards: RewardModel,
    improvement: ImprovementTracker,
    rotation: RotationTracker,
    rng: R,

    pending: Option<Pending>,
    iteration: u32,
    epsilon: f32,
    reward: f32,
    action: f32,
    checkpoints: u32,
}

impl<R: RandomSource, const N: usize, const A: usize> QTable<R, N, A> {
    /// Builds the lookup arrays and zeroed tables. The controller starts
    /// idle; call [`QTable::enable`] to start learning.
    pub fn new(config: QConfig, rng: R) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let angles = AngleBins::new()?;
        let actions = ActionSpace::new(config.max_action)?;

        Ok(QTable {
            config,
            state: State::Idle,
            angles,
            actions,
            live: Table::zeroed(),
            snapshot: Table::zeroed(),
            has_snapshot: false,
            rewards: RewardModel::new(config.lambda),
            improvement: ImprovementTracker::new(N),
            rotation: RotationTracker::new(N),
            rng,
            pending: None,
            iteration: 0,
            epsilon: EPSILON_START,
            reward: 0.0,
            action: 0.0,
            checkpoints: 0,
        })
    }

    pub fn enable(&mut self) {
        match self.state {
            State::Learning => {}
            State::Idle => {
                self.state = State::Learning;
                info!("qtable: learning enabled");
            }
            State::Completed => {
                self.reset();
                self.state = State::Learning;
                info!("qtable: relearning from current weights");
            }
        }
    }

    pub fn disable(&mut self) {
        if self.state == State::Learning {
            self.state = State::Idle;
            info!("qtable: learning disabled at iteration {}", self.iteration);
        }
    }

    /// Clears the training bookkeeping and goes idle. The learned values
    /// and the last checkpoint are kept, use [`QTable::clear_table`] to
    /// start from zero.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.pending = None;
        self.iteration = 0;
        self.epsilon = EPSILON_START;
        self.reward = 0.0;
        self.rewards.reset();
        self.improvement.reset();
        self.rotation.reset();
        info!("qtable: reset");
    }

    pub fn clear_table(&mut self) {
        self.live.zero();
    }

    /// Replaces the live values, e.g. with a table learned on an earlier run.
    pub fn load_weights(&mut self, rows: &[[f32; A]; N]) {
        self.live = Table::from_rows(*rows);
    }

    /// One control tick of learning. Returns the compensation to apply.
    ///
    /// Outside of [`State::Learning`] this is [`QTable::best_action`].
    pub fn train(&mut self, angle: f32, actual: f32, reference: f32) -> f32 {
        if self.state != State::Learning {
            return self.best_action(angle);
        }

        self.epsilon =
            policy::decayed_epsilon(self.epsilon, self.iteration, self.config.exploration_decay);
        let bin = self.angles.bin(angle);

        // Still in the same state, bookkeeping only.
        if let Some(pending) = self.pending {
            if pending.bin == bin {
                self.improvement.observe(actual);
                self.advance();
                return self.action;
            }
        }

        self.reward = self.rewards.reward(actual, reference);
        let action = policy::select_action(self.live.row(bin), self.epsilon, &mut self.rng);

        let wrap = self.rotation.update(bin);
        if let Some(previous) = self.pending {
            let next_best = self.live.best(bin).value;
            let old = self.live.get(previous.bin, previous.action);
            let updated = old + self.config.alpha * (self.reward + self.config.gamma * next_best - old);
            self.live.set(previous.bin, previous.action, updated);

            self.improvement.push_reward(self.reward);
            if wrap.is_some() {
                self.rotation_completed();
            }
        }
        // the current value already belongs to the new rotation
        self.improvement.observe(actual);

        self.pending = Some(Pending { bin, action });
        self.action = self.actions.value(action);
        self.advance();
        self.action
    }

    /// Best known compensation for an angle. No exploring, no learning.
    pub fn best_action(&self, angle: f32) -> f32 {
        let bin = self.angles.bin(angle);
        self.actions.value(self.live.best(bin).index)
    }

    fn rotation_completed(&mut self) {
        let improvement = self.improvement.rotation_completed();
        let reward_allowed =
            self.config.training_iterations > self.config.reward_checkpoint_guard;
        if improvement.ripple || (improvement.reward && reward_allowed) {
            self.checkpoint();
        }
    }

    fn checkpoint(&mut self) {
        self.snapshot.copy_from(&self.live);
        self.has_snapshot = true;
        self.checkpoints += 1;
        debug!(
            "qtable: checkpoint {} at iteration {}",
            self.checkpoints,
            self.iteration
        );
    }

    fn advance(&mut self) {
        self.iteration = self.iteration.saturating_add(1);
        if self.iteration >= self.config.training_iterations {
            self.complete();
        }
    }

    // Put the best weights seen into use and stop learning.
    fn complete(&mut self) {
        // with no checkpoint ever taken there is nothing better to promote
        if self.has_snapshot {
            self.live.copy_from(&self.snapshot);
        }
        self.state = State::Completed;
        info!(
            "qtable: training completed after {} iterations, {} checkpoints",
            self.iteration,
            self.checkpoints
        );
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_learning(&self) -> bool {
        self.state == State::Learning
    }

    pub fn config(&self) -> &QConfig {
        &self.config
    }

    pub fn table(&self) -> &Table<N, A> {
        &self.live
    }

    pub fn snapshot(&self) -> &Table<N, A> {
        &self.snapshot
    }

    pub fn angles(&self) -> &AngleBins<N> {
        &self.angles
    }

    pub fn actions(&self) -> &ActionSpace<A> {
        &self.actions
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn stats(&self) -> TrainingStats {
        TrainingStats {
            iteration: self.iteration,
            epsilon: self.epsilon,
            reward: self.reward,
            action: self.action,
            checkpoints: self.checkpoints,
            revolutions: self.rotation.revolutions(),
            best_ripple: self.improvement.best_ripple(),
            best_average: self.improvement.best_average(),
        }
    }
}

impl<R: RandomSource, const N: usize, const A: usize> Compensator for QTable<R, N, A> {
    fn compensation(&mut self, angle: f32, actual: f32, reference: f32) -> f32 {
        self.train(angle, actual, reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    // Replays the same draw forever. At iteration 0 epsilon is 1, so the
    // first transition always explores whatever the draw.
    #[derive(Clone, Copy)]
    struct Fixed {
        draw: f32,
        index: usize,
    }

    impl RandomSource for Fixed {
        fn uniform(&mut self) -> f32 {
            self.draw
        }

        fn index(&mut self, _bound: usize) -> usize {
            self.index
        }
    }

    const FIXED: Fixed = Fixed { draw: 0.5, index: 0 };

    fn small_config() -> QConfig {
        QConfig {
            alpha: 0.5,
            gamma: 0.9,
            max_action: 1.0,
            ..DEFAULT_QCONFIG
        }
    }

    #[test]
    fn rejects_bad_configuration() {
        let bad_alpha = QConfig { alpha: 1.5, ..DEFAULT_QCONFIG };
        assert_eq!(
            QTable::<_, 4, 3>::new(bad_alpha, FIXED).err(),
            Some(ConfigurationError::LearningRate(1.5))
        );
        let bad_gamma = QConfig { gamma: -0.1, ..DEFAULT_QCONFIG };
        assert_eq!(
            QTable::<_, 4, 3>::new(bad_gamma, FIXED).err(),
            Some(ConfigurationError::DiscountFactor(-0.1))
        );
        let bad_ek = QConfig { exploration_decay: 0.0, ..DEFAULT_QCONFIG };
        assert!(QTable::<_, 4, 3>::new(bad_ek, FIXED).is_err());
        let no_budget = QConfig { training_iterations: 0, ..DEFAULT_QCONFIG };
        assert_eq!(
            QTable::<_, 4, 3>::new(no_budget, FIXED).err(),
            Some(ConfigurationError::TrainingBudget)
        );
        assert_eq!(
            QTable::<_, 1, 3>::new(DEFAULT_QCONFIG, FIXED).err(),
            Some(ConfigurationError::TooFewBins(1))
        );
        assert_eq!(
            QTable::<_, 4, 1>::new(DEFAULT_QCONFIG, FIXED).err(),
            Some(ConfigurationError::TooFewActions(1))
        );
    }

    #[test]
    fn idle_controller_only_infers() {
        let mut rows = [[0.0; 3]; 4];
        rows[2] = [0.0, 0.0, 5.0];
        let mut q = QTable::<_, 4, 3>::new(small_config(), FIXED).unwrap();
        q.load_weights(&rows);

        assert_eq!(q.train(0.5, 1.0, 0.0), 1.0);
        assert_eq!(q.stats().iteration, 0);
        assert_eq!(q.table().rows(), &rows);
    }

    #[test]
    fn enable_disable_cycle() {
        let mut q = QTable::<_, 4, 3>::new(small_config(), FIXED).unwrap();
        assert_eq!(q.state(), State::Idle);
        q.enable();
        assert!(q.is_learning());
        q.train(0.0, 0.0, 0.0);
        q.disable();
        assert_eq!(q.state(), State::Idle);
        q.enable();
        // disabling pauses, it does not reset
        assert_eq!(q.stats().iteration, 1);
    }

    #[test]
    fn greedy_follows_the_table() {
        let mut rows = [[0.0; 3]; 4];
        rows[1] = [0.0, 3.0, 0.0];
        let config = QConfig {
            exploration_decay: 1e-3,
            ..small_config()
        };
        let mut q = QTable::<_, 4, 3>::new(config, FIXED).unwrap();
        q.load_weights(&rows);
        q.enable();

        // explores, FIXED picks action 0
        assert_eq!(q.train(0.0, 0.0, 0.0), -1.0);
        // epsilon is at the floor now and 0.5 is above it
        assert_eq!(q.train(0.25, 0.0, 0.0), 0.0);
        assert_eq!(q.epsilon(), policy::EPSILON_FLOOR);
        assert_eq!(q.best_action(0.25), 0.0);
    }

    #[test]
    fn completed_controller_can_relearn() {
        let config = QConfig {
            training_iterations: 3,
            ..small_config()
        };
        let mut q = QTable::<_, 4, 3>::new(config, SmallRng::seed_from_u64(1)).unwrap();
        q.enable();
        for angle in [0.0, 0.25, 0.5] {
            q.train(angle, 0.0, 0.0);
        }
        assert_eq!(q.state(), State::Completed);
        let learned = q.table().clone();

        q.enable();
        assert!(q.is_learning());
        assert_eq!(q.stats().iteration, 0);
        assert_eq!(q.epsilon(), EPSILON_START);
        assert_eq!(q.table(), &learned);
    }

    #[test]
    fn clear_table_zeroes_live_values() {
        let mut q = QTable::<_, 4, 3>::new(small_config(), FIXED).unwrap();
        q.load_weights(&[[1.0; 3]; 4]);
        q.clear_table();
        assert!(q.table().as_slice().iter().all(|v| *v == 0.0));
    }
}
