// Counts electrical rotations from consecutive angle bins.
// A jump of more than half the bins between two ticks can only mean the
// angle wrapped around, so that jump marks the start of a new rotation.

/// Which way the angle crossed the wrap point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wrap {
    // end of the rotation overflowed to the start
    Forward,
    // start of the rotation underflowed to the end
    Backward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationTracker {
    // number of full rotations, signed by direction
    revolutions: i32,
    // bin seen on the previous tick
    bin: Option<usize>,
    // number of bins in one rotation
    bins: usize,
}

impl RotationTracker {
    pub const fn new(bins: usize) -> RotationTracker {
        RotationTracker {
            revolutions: 0,
            bin: None,
            bins,
        }
    }

    pub fn update(&mut self, bin: usize) -> Option<Wrap> {
        let previous = self.bin.replace(bin)?;
        // same as |bin - previous| > bins / 2 without the division
        if bin.abs_diff(previous) * 2 <= self.bins {
            return None;
        }

        if bin < previous {
            self.revolutions += 1;
            Some(Wrap::Forward)
        } else {
            self.revolutions -= 1;
            Some(Wrap::Backward)
        }
    }

    pub fn revolutions(&self) -> i32 {
        self.revolutions
    }

    pub fn last_bin(&self) -> Option<usize> {
        self.bin
    }

    // whole and fractional rotations
    pub fn as_float(&self) -> f32 {
        let fraction = match self.bin {
            Some(bin) => bin as f32 / self.bins as f32,
            None => 0.0,
        };
        self.revolutions as f32 + fraction
    }

    pub fn reset(&mut self) {
        self.revolutions = 0;
        self.bin = None;
    }
}
