//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{Float, FloatConst};

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where 
    T: Float 
{
    target_range.0 
        + ((value - source_range.0) 
        * (target_range.1 - target_range.0) 
        / (source_range.1 - source_range.0))
}

/// Sign of a value, with zero mapped to zero.
///
/// Unlike `f64::signum` this returns `0` for `+0.0` and `-0.0`.
pub fn sign<T>(value: T) -> T
where
    T: Float
{
    if value > T::zero() {
        T::one()
    }
    else if value < T::zero() {
        -T::one()
    }
    else {
        T::zero()
    }
}

/// Smooth step between `(x_0, y_0)` and `(x_1, y_1)`.
///
/// Below `x_0` the result is `y_0`, above `x_1` it is `y_1`. In between the
/// transition follows `xx - sin(2 pi xx) / (2 pi)`, which has zero slope at
/// both ends.
pub fn sine_step<T>(x: T, x_0: T, y_0: T, x_1: T, y_1: T) -> T
where
    T: Float + FloatConst
{
    if x <= x_0 {
        return y_0;
    }
    if x >= x_1 {
        return y_1;
    }

    let tau_t = T::PI() + T::PI();
    let xx = lin_map((x_0, x_1), (T::zero(), T::one()), x);

    y_0 + (y_1 - y_0) * (xx - (tau_t * xx).sin() / tau_t)
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap an angle into the range [-pi, pi).
pub fn wrap_to_pi<T>(value: T) -> T
where
    T: Float + FloatConst
{
    let tau_t = T::PI() + T::PI();

    rem_euclid(value + T::PI(), tau_t) - T::PI()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sign() {
        assert_eq!(sign(2.5f64), 1.0);
        assert_eq!(sign(-0.1f64), -1.0);
        assert_eq!(sign(0.0f64), 0.0);
        assert_eq!(sign(-0.0f64), 0.0);
    }

    #[test]
    fn test_sine_step() {
        assert_eq!(sine_step(0.01f64, 0.05, 0.0, 0.1, 1.0), 0.0);
        assert_eq!(sine_step(0.2f64, 0.05, 0.0, 0.1, 1.0), 1.0);

        // Symmetric about the midpoint
        let mid = sine_step(0.075f64, 0.05, 0.0, 0.1, 1.0);
        assert!((mid - 0.5).abs() < 1e-12);

        // Monotonic across the transition
        let mut prev = 0.0;
        for i in 0..=100 {
            let x = 0.05 + 0.05 * i as f64 / 100.0;
            let y = sine_step(x, 0.05, 0.0, 0.1, 1.0);
            assert!(y >= prev - 1e-12);
            prev = y;
        }
    }

    #[test]
    fn test_wrap_to_pi() {
        const PI: f64 = std::f64::consts::PI;

        assert!((wrap_to_pi(3.0 * PI) - -PI).abs() < 1e-12);
        assert!((wrap_to_pi(0.5) - 0.5).abs() < 1e-12);
        assert!((wrap_to_pi(-0.5 - 2.0 * PI) - -0.5).abs() < 1e-12);
    }
}
