use core::f32::consts;
use micromath::F32;

// Synthetic torque pulsations, the disturbance the compensators learn to
// cancel. Each harmonic is a multiple of the electrical frequency.

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Harmonic {
    // multiple of the electrical frequency
    pub order: u16,
    pub magnitude: f32,
}

pub const DEFAULT_HARMONICS: [Harmonic; 5] = [
    Harmonic { order: 1, magnitude: 0.02 },
    Harmonic { order: 2, magnitude: 0.003 },
    Harmonic { order: 6, magnitude: 0.006 },
    Harmonic { order: 12, magnitude: 0.00227 },
    Harmonic { order: 18, magnitude: 0.00039 },
];

#[derive(Debug, Clone, PartialEq)]
pub struct Pulsator<const H: usize> {
    // sorted by order, only the first `len` are in use
    harmonics: [Harmonic; H],
    len: usize,
}

impl<const H: usize> Pulsator<H> {
    /// Harmonics are kept ordered by order. When an order shows up more than
    /// once only its first entry counts.
    pub fn new(harmonics: [Harmonic; H]) -> Self {
        let mut sorted = harmonics;
        // insertion sort keeps equal orders in their given order
        for i in 1..H {
            let mut j = i;
            while j > 0 && sorted[j - 1].order > sorted[j].order {
                sorted.swap(j - 1, j);
                j -= 1;
            }
        }

        let mut len = 0;
        for i in 0..H {
            if len == 0 || sorted[len - 1].order != sorted[i].order {
                sorted[len] = sorted[i];
                len += 1;
            }
        }

        Pulsator {
            harmonics: sorted,
            len,
        }
    }

    pub fn harmonics(&self) -> &[Harmonic] {
        &self.harmonics[..self.len]
    }

    /// Pulsation at a rotor angle given as a fraction of a rotation.
    pub fn sample(&self, rotor_angle: f32) -> f32 {
        let rads = consts::TAU * rotor_angle;
        self.harmonics()
            .iter()
            .map(|h| h.magnitude * F32(h.order as f32 * rads).cos().0)
            .sum()
    }
}

impl Pulsator<5> {
    pub fn default_profile() -> Self {
        Self::new(DEFAULT_HARMONICS)
    }
}
