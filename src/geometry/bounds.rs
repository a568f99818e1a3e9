//! Simulation box geometry and the rescaled coordinate frame.
//!
//! All exact predicates operate on 52-bit integer mantissas. To obtain them,
//! every input position is mapped into `[1, 2)` by an affine transform chosen
//! at construction time; doubles in that range share a single IEEE exponent,
//! so their mantissas form a linear integer sequence and integer arithmetic
//! on the mantissas is equivalent to exact arithmetic on the rescaled
//! positions.

use thiserror::Error;

/// Mask selecting the 52 explicit mantissa bits of an `f64`.
pub const MANTISSA_MASK: u64 = (1_u64 << 52) - 1;

/// Extract the 52-bit mantissa of a double in `[1, 2)` as an unsigned integer.
///
/// This is the canonical integer coordinate used by every exact predicate.
#[inline]
#[must_use]
pub fn mantissa(rescaled: f64) -> u64 {
    debug_assert!((1.0..2.0).contains(&rescaled));
    rescaled.to_bits() & MANTISSA_MASK
}

/// A position failed to rescale into `[1, 2)`.
///
/// This means the bounding box handed to the tessellation does not contain
/// the position (plus the required ghost margin) and is a host-side
/// precondition violation.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RescaleError {
    /// The rescaled value fell outside the half-open unit range.
    #[error("coordinate {value} on axis {axis} rescales to {rescaled}, outside [1, 2)")]
    OutsideUnitRange {
        /// Axis of the offending coordinate.
        axis: usize,
        /// Original coordinate value.
        value: f64,
        /// Rescaled value that fell outside `[1, 2)`.
        rescaled: f64,
    },
}

/// Axis-aligned extent of the host simulation volume.
///
/// The tessellation derives its (much larger) bounding simplex from this box;
/// every local and ghost generator must fall inside the padded box.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox<const D: usize> {
    /// Lower corner of the box.
    pub anchor: [f64; D],
    /// Side lengths along each axis.
    pub side: [f64; D],
}

impl<const D: usize> BoundingBox<D> {
    /// Create a box from its lower corner and per-axis side lengths.
    #[must_use]
    pub const fn new(anchor: [f64; D], side: [f64; D]) -> Self {
        Self { anchor, side }
    }

    /// Create a cube of the given side length anchored at `anchor`.
    #[must_use]
    pub const fn cube(anchor: [f64; D], side: f64) -> Self {
        Self {
            anchor,
            side: [side; D],
        }
    }
}

/// The affine map from box coordinates to the rescaled `[1, 2)` frame.
///
/// The padded box is anchored one host-box side below the host anchor on
/// every axis and spans `padding` times the largest host side, converted to a
/// square/cube so a single scale factor serves all axes.
#[derive(Clone, Copy, Debug)]
pub struct ScaledBox<const D: usize> {
    anchor: [f64; D],
    side: f64,
    inverse_side: f64,
}

impl<const D: usize> ScaledBox<D> {
    /// Derive the rescaled frame from the host box.
    ///
    /// `padding` is the ratio of the bounding-simplex box to the largest host
    /// side (6 in 2D, 9 in 3D). The `1e-13` slack keeps the largest rescaled
    /// value strictly below 2.0; at exactly 2.0 the exponent changes and the
    /// mantissa is no longer a linear function of position.
    #[must_use]
    pub fn new(bounds: &BoundingBox<D>, padding: f64) -> Self {
        let mut anchor = [0.0; D];
        let mut max_side: f64 = 0.0;
        for axis in 0..D {
            anchor[axis] = bounds.anchor[axis] - bounds.side[axis];
            max_side = max_side.max(bounds.side[axis]);
        }
        let side = padding * max_side;
        Self {
            anchor,
            side,
            inverse_side: (1.0 - 1e-13) / side,
        }
    }

    /// Lower corner of the padded box (also the first auxiliary vertex).
    #[must_use]
    pub const fn anchor(&self) -> [f64; D] {
        self.anchor
    }

    /// Side length of the padded box.
    #[must_use]
    pub const fn side(&self) -> f64 {
        self.side
    }

    /// Map a position into the `[1, 2)` frame.
    ///
    /// # Errors
    ///
    /// Returns [`RescaleError::OutsideUnitRange`] when the position lies
    /// outside the padded box; the caller treats this as a fatal
    /// precondition violation.
    pub fn rescale(&self, position: [f64; D]) -> Result<[f64; D], RescaleError> {
        let mut rescaled = [0.0; D];
        for axis in 0..D {
            let r = 1.0 + (position[axis] - self.anchor[axis]) * self.inverse_side;
            if !(1.0..2.0).contains(&r) {
                return Err(RescaleError::OutsideUnitRange {
                    axis,
                    value: position[axis],
                    rescaled: r,
                });
            }
            rescaled[axis] = r;
        }
        Ok(rescaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rescale_maps_padded_box_into_unit_range() {
        let bounds = BoundingBox::cube([0.0, 0.0], 1.0);
        let scaled = ScaledBox::new(&bounds, 6.0);

        // The padded box is anchored at (-1, -1) with side 6.
        assert_relative_eq!(scaled.anchor()[0], -1.0);
        assert_relative_eq!(scaled.side(), 6.0);

        let low = scaled.rescale([-1.0, -1.0]).unwrap();
        assert_relative_eq!(low[0], 1.0);
        assert_relative_eq!(low[1], 1.0);

        // The far corner of the padded box still lands strictly below 2.
        let high = scaled.rescale([5.0, 5.0]).unwrap();
        assert!(high[0] < 2.0);
        assert!(high[1] < 2.0);
    }

    #[test]
    fn rescale_rejects_positions_outside_padded_box() {
        let bounds = BoundingBox::cube([0.0, 0.0, 0.0], 1.0);
        let scaled = ScaledBox::new(&bounds, 9.0);
        let result = scaled.rescale([100.0, 0.5, 0.5]);
        assert!(matches!(
            result,
            Err(RescaleError::OutsideUnitRange { axis: 0, .. })
        ));
    }

    #[test]
    fn mantissa_is_monotone_in_position() {
        let bounds = BoundingBox::cube([0.0], 1.0);
        let scaled = ScaledBox::new(&bounds, 6.0);
        let mut previous = 0_u64;
        for i in 0..100 {
            let x = f64::from(i) / 100.0;
            let m = mantissa(scaled.rescale([x]).unwrap()[0]);
            assert!(m > previous || i == 0);
            previous = m;
        }
    }
}
