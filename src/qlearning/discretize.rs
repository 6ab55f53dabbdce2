use micromath::F32;

use crate::error::ConfigurationError;

// Largest angle still inside [0, 1).
const MAX_ANGLE: f32 = 1.0 - f32::EPSILON;

/// Index of the element of `arr` closest to `target`.
///
/// `arr` must be sorted ascending. Targets at or beyond either end clamp to
/// the first or last index. When the target sits exactly halfway between two
/// neighbours the right one wins.
pub fn nearest_index(arr: &[f32], target: f32) -> usize {
    let n = arr.len();
    if n == 0 || target <= arr[0] {
        return 0;
    }
    if target >= arr[n - 1] {
        return n - 1;
    }

    let (mut i, mut j, mut mid) = (0, n, 0);
    while i < j {
        mid = (i + j) / 2;

        if arr[mid] == target {
            return mid;
        }

        if target < arr[mid] {
            // bracketed by mid-1 and mid
            if mid > 0 && target > arr[mid - 1] {
                return closer(arr, mid - 1, mid, target);
            }
            j = mid;
        } else {
            // bracketed by mid and mid+1
            if mid < n - 1 && target < arr[mid + 1] {
                return closer(arr, mid, mid + 1, target);
            }
            i = mid + 1;
        }
    }

    mid
}

// the left index only wins when strictly closer
fn closer(arr: &[f32], left: usize, right: usize, target: f32) -> usize {
    if F32(arr[left] - target).abs().0 < F32(arr[right] - target).abs().0 {
        left
    } else {
        right
    }
}

/// Fails on the first index that does not rise above its predecessor.
pub fn check_monotonic(arr: &[f32]) -> Result<(), ConfigurationError> {
    for i in 1..arr.len() {
        // written this way round so NaN fails too
        if !(arr[i] > arr[i - 1]) {
            return Err(ConfigurationError::NotMonotonic(i));
        }
    }
    Ok(())
}

/// `N` evenly spaced representative rotor angles covering one electrical
/// rotation, `[0, 1/N, ..., (N-1)/N]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleBins<const N: usize> {
    angles: [f32; N],
}

impl<const N: usize> AngleBins<N> {
    pub fn new() -> Result<Self, ConfigurationError> {
        if N < 2 {
            return Err(ConfigurationError::TooFewBins(N));
        }
        let step = 1.0 / N as f32;
        let mut angles = [0.0; N];
        for (i, angle) in angles.iter_mut().enumerate() {
            *angle = i as f32 * step;
        }
        check_monotonic(&angles)?;
        Ok(AngleBins { angles })
    }

    /// Discretize a rotor angle. Input outside `[0, 1)` is clamped rather
    /// than rejected, sensor noise must never stall a tick.
    pub fn bin(&self, angle: f32) -> usize {
        let clamped = if angle.is_nan() {
            0.0
        } else {
            angle.clamp(0.0, MAX_ANGLE)
        };
        nearest_index(&self.angles, clamped)
    }

    pub fn angle(&self, bin: usize) -> f32 {
        self.angles[bin]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.angles
    }
}

/// `A` candidate compensation magnitudes, linearly spaced over
/// `[-max_action, +max_action]` with both ends included.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpace<const A: usize> {
    actions: [f32; A],
}

impl<const A: usize> ActionSpace<A> {
    pub fn new(max_action: f32) -> Result<Self, ConfigurationError> {
        if A < 2 {
            return Err(ConfigurationError::TooFewActions(A));
        }
        let min = -max_action;
        let step = (max_action - min) / (A - 1) as f32;
        let mut actions = [0.0; A];
        for (i, action) in actions.iter_mut().enumerate() {
            *action = min + i as f32 * step;
        }
        check_monotonic(&actions)?;
        Ok(ActionSpace { actions })
    }

    pub fn value(&self, index: usize) -> f32 {
        self.actions[index]
    }

    /// Index of the candidate closest to an arbitrary magnitude.
    pub fn nearest(&self, magnitude: f32) -> usize {
        nearest_index(&self.actions, magnitude)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.actions
    }
}
