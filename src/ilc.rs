use micromath::F32;

use crate::error::ConfigurationError;
use crate::Compensator;

// Angle based Iterative Learning Control.
// The buffers hold one sample per position of a single electrical rotation,
// so what was learned at an angle is replayed the next time round.

pub const BUFFER_SIZE: usize = 750;

// below this the ramp down is considered done
const RAMP_THRESHOLD: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IlcConfig {
    // gain on the error remembered from the last rotation
    pub phi: f32,
    // gain on the error of this tick
    pub gamma: f32,
    // forgetting factor, [0, 1]
    pub alpha: f32,
    // ticks to fade the compensation out after disabling,
    // 2000 * 500us = 1s
    pub ramp_steps: u32,
}

impl IlcConfig {
    pub fn new(phi: f32, gamma: f32, alpha: f32) -> Self {
        IlcConfig {
            phi,
            gamma,
            alpha,
            ramp_steps: 2000,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.phi.is_finite() {
            return Err(ConfigurationError::Gain(self.phi));
        }
        if !self.gamma.is_finite() {
            return Err(ConfigurationError::Gain(self.gamma));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigurationError::ForgettingFactor(self.alpha));
        }
        if self.ramp_steps == 0 {
            return Err(ConfigurationError::RampSteps);
        }
        Ok(())
    }
}

pub struct Ilc<const L: usize> {
    config: IlcConfig,
    enabled: bool,

    // correction terms
    compensation_buffer: [f32; L],
    // error terms
    error_buffer: [f32; L],
    idx: usize,
    // the first position after enabling says nothing about skipped ones
    is_first_iteration: bool,

    compensation: f32,
    ramp_step: u32,
}

impl<const L: usize> Ilc<L> {
    pub fn new(config: IlcConfig) -> Result<Self, ConfigurationError> {
        if L < 2 {
            return Err(ConfigurationError::BufferTooSmall(L));
        }
        config.validate()?;
        Ok(Ilc {
            config,
            enabled: false,
            compensation_buffer: [0.0; L],
            error_buffer: [0.0; L],
            idx: 0,
            is_first_iteration: true,
            compensation: 0.0,
            ramp_step: config.ramp_steps,
        })
    }

    pub fn enable(&mut self) {
        if !self.enabled {
            self.enabled = true;
            self.ramp_step = self.config.ramp_steps;
            info!("ilc: enabled");
        }
    }

    // The operating point may have changed by the next time this is
    // enabled, so whatever was learned is dropped.
    pub fn disable(&mut self) {
        if self.enabled {
            self.clear_buffers();
            self.enabled = false;
            self.is_first_iteration = true;
            info!("ilc: disabled, ramping out {}", self.compensation);
        }
    }

    pub fn toggle(&mut self) {
        if self.enabled {
            self.disable();
        } else {
            self.enable();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// One tick. `rotor_angle` is the electrical angle in `[0, 1]`.
    pub fn compensation_term(&mut self, reference: f32, actual: f32, rotor_angle: f32) -> f32 {
        if self.enabled {
            self.update_index(rotor_angle);
            self.compensation = self.learn(reference, actual);
        } else if F32(self.compensation).abs().0 > RAMP_THRESHOLD {
            self.compensation =
                self.ramp_step as f32 * self.compensation / self.config.ramp_steps as f32;
            self.ramp_step = self.ramp_step.saturating_sub(1);
        } else {
            self.compensation = 0.0;
            self.ramp_step = self.config.ramp_steps;
        }
        self.compensation
    }

    // P-type learning law at the current position
    fn learn(&mut self, reference: f32, actual: f32) -> f32 {
        let error = reference - actual;
        let u = (1.0 - self.config.alpha) * self.compensation_buffer[self.idx]
            + self.config.phi * self.error_buffer[self.idx]
            + self.config.gamma * error;

        self.compensation_buffer[self.idx] = u;
        self.error_buffer[self.idx] = error;
        u
    }

    fn update_index(&mut self, rotor_angle: f32) {
        let previous = self.idx;
        // clamped only so that noise can not index out of the buffers
        let angle = if rotor_angle.is_nan() {
            0.0
        } else {
            rotor_angle.clamp(0.0, 1.0)
        };
        self.idx = (angle * (L - 1) as f32) as usize;

        let (steps, forward) = circular_steps(previous, self.idx, L);
        // ideally never happens, it means a tick skipped positions
        if steps > 1 && !self.is_first_iteration {
            trace!("ilc: filling {} skipped positions", steps - 1);
            fill_gap(&mut self.compensation_buffer, previous, steps, forward);
            fill_gap(&mut self.error_buffer, previous, steps, forward);
        }
        self.is_first_iteration = false;
    }

    fn clear_buffers(&mut self) {
        self.compensation_buffer = [0.0; L];
        self.error_buffer = [0.0; L];
    }

    pub fn config(&self) -> &IlcConfig {
        &self.config
    }

    pub fn index(&self) -> usize {
        self.idx
    }

    pub fn compensation_buffer(&self) -> &[f32; L] {
        &self.compensation_buffer
    }

    pub fn error_buffer(&self) -> &[f32; L] {
        &self.error_buffer
    }
}

impl<const L: usize> Compensator for Ilc<L> {
    fn compensation(&mut self, angle: f32, actual: f32, reference: f32) -> f32 {
        self.compensation_term(reference, actual, angle)
    }
}

// Shortest way round the circle from `from` to `to`: number of steps and
// whether that is in the increasing direction.
fn circular_steps(from: usize, to: usize, len: usize) -> (usize, bool) {
    let up = (to + len - from) % len;
    let down = (from + len - to) % len;
    if up <= down {
        (up, true)
    } else {
        (down, false)
    }
}

// Linear interpolation over the positions strictly between `from` and the
// position `steps` away, wrapping around the end of the buffer as needed.
fn fill_gap(buffer: &mut [f32], from: usize, steps: usize, forward: bool) {
    let len = buffer.len();
    let to = if forward {
        (from + steps) % len
    } else {
        (from + len - steps) % len
    };
    let start = buffer[from];
    let delta = (buffer[to] - start) / steps as f32;
    for k in 1..steps {
        let position = if forward {
            (from + k) % len
        } else {
            (from + len - k) % len
        };
        buffer[position] = start + delta * k as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ilc() -> Ilc<11> {
        let mut ilc = Ilc::new(IlcConfig::new(0.5, 0.25, 0.0)).unwrap();
        ilc.enable();
        ilc
    }

    #[test]
    fn learns_from_the_stored_error() {
        let mut ilc = ilc();
        // error 1 at position 0, nothing remembered yet
        assert_eq!(ilc.compensation_term(1.0, 0.0, 0.0), 0.25);
        assert_eq!(ilc.error_buffer()[0], 1.0);

        // next rotation at the same angle: 0.25 + 0.5 * 1 + 0.25 * 1
        assert_eq!(ilc.compensation_term(1.0, 0.0, 0.0), 1.0);
    }

    #[test]
    fn forgetting_factor_decays_memory() {
        let mut ilc = Ilc::<11>::new(IlcConfig::new(0.0, 1.0, 0.5)).unwrap();
        ilc.enable();
        assert_eq!(ilc.compensation_term(2.0, 0.0, 0.5), 2.0);
        // 0.5 * 2 + 0 + 1 * 0
        assert_eq!(ilc.compensation_term(0.0, 0.0, 0.5), 1.0);
    }

    #[test]
    fn maps_angles_onto_positions() {
        let mut ilc = ilc();
        ilc.compensation_term(0.0, 0.0, 0.5);
        assert_eq!(ilc.index(), 5);
        ilc.compensation_term(0.0, 0.0, 1.0);
        assert_eq!(ilc.index(), 10);
        ilc.compensation_term(0.0, 0.0, -4.0);
        assert_eq!(ilc.index(), 0);
    }

    #[test]
    fn interpolates_skipped_positions() {
        let mut ilc = ilc();
        ilc.compensation_term(0.0, 0.0, 0.0);
        ilc.compensation_term(0.0, 4.0, 0.0); // error -4 stored at 0
        // jump to position 4, whose error will be 4
        ilc.compensation_term(4.0, 0.0, 0.4);
        let errors = ilc.error_buffer();
        // 1..4 were filled between -4 and the stale 0 at position 4
        assert_eq!(&errors[1..4], &[-3.0, -2.0, -1.0]);
        assert_eq!(errors[4], 4.0);
    }

    #[test]
    fn interpolates_across_the_wrap() {
        let mut ilc = ilc();
        ilc.compensation_term(0.0, 0.0, 0.8); // position 8
        ilc.compensation_term(0.0, 3.0, 0.8); // error -3 at 8
        ilc.compensation_term(0.0, 0.0, 0.1); // position 1, the short way is 8 9 10 0 1
        let errors = ilc.error_buffer();
        assert_eq!(errors[9], -2.25);
        assert_eq!(errors[10], -1.5);
        assert_eq!(errors[0], -0.75);
        // the long way round stays untouched
        assert!(errors[2..8].iter().all(|e| *e == 0.0));
    }

    #[test]
    fn first_tick_does_not_interpolate() {
        let mut ilc = ilc();
        ilc.compensation_term(1.0, 0.0, 0.95);
        assert!(ilc.error_buffer()[..9].iter().all(|e| *e == 0.0));
    }

    #[test]
    fn ramps_down_after_disable() {
        let mut ilc = ilc();
        for _ in 0..4 {
            ilc.compensation_term(1.0, 0.0, 0.3);
        }
        ilc.toggle();
        assert!(!ilc.is_enabled());
        assert!(ilc.error_buffer().iter().all(|e| *e == 0.0));

        let mut last = f32::MAX;
        let mut ticks = 0;
        loop {
            let u = ilc.compensation_term(1.0, 0.0, 0.3);
            assert!(u.abs() <= last);
            last = u.abs();
            ticks += 1;
            if u == 0.0 {
                break;
            }
            assert!(ticks < 10_000);
        }
        // stays off
        assert_eq!(ilc.compensation_term(1.0, 0.0, 0.3), 0.0);
    }

    #[test]
    fn rejects_bad_configuration() {
        assert_eq!(
            Ilc::<11>::new(IlcConfig::new(0.5, 0.25, 1.5)).err(),
            Some(ConfigurationError::ForgettingFactor(1.5))
        );
        assert_eq!(
            Ilc::<1>::new(IlcConfig::new(0.5, 0.25, 0.5)).err(),
            Some(ConfigurationError::BufferTooSmall(1))
        );
        let instant = IlcConfig {
            ramp_steps: 0,
            ..IlcConfig::new(0.5, 0.25, 0.5)
        };
        assert_eq!(
            Ilc::<11>::new(instant).err(),
            Some(ConfigurationError::RampSteps)
        );
    }
}
