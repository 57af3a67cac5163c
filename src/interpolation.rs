//! Interpolation curves mapping wall-clock time onto a transition's blend factor.

use std::fmt;
use std::rc::Rc;

/// Signature of a custom curve: `(now, start, end) -> blend factor`, all times in seconds.
pub type InterpolationFn = dyn Fn(f64, f64, f64) -> f64;

/// How a transition's progress is mapped from time.
///
/// The built-in curves normalize time to `[0, 1]` first. Custom curves receive the raw
/// timestamps and are expected, but not required, to be monotonic over the interval.
#[derive(Clone, Default)]
pub enum Interpolation {
    /// Constant speed throughout.
    #[default]
    Linear,
    /// Start slow, accelerate.
    EaseIn,
    /// Start fast, decelerate.
    EaseOut,
    /// Start slow, speed up, then slow down.
    EaseInOut,
    /// Caller-supplied curve.
    Custom(Rc<InterpolationFn>),
}

impl Interpolation {
    pub fn custom(f: impl Fn(f64, f64, f64) -> f64 + 'static) -> Self {
        Interpolation::Custom(Rc::new(f))
    }

    /// Evaluate the curve at `now` for a transition spanning `[start, end]`.
    ///
    /// A zero-length interval is a hard cut and evaluates to `1.0`.
    pub fn evaluate(&self, now: f64, start: f64, end: f64) -> f64 {
        if let Interpolation::Custom(f) = self {
            return f(now, start, end);
        }

        let t = linear(now, start, end).clamp(0.0, 1.0);
        match self {
            Interpolation::Linear => t,
            Interpolation::EaseIn => t * t,
            Interpolation::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Interpolation::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Interpolation::Custom(_) => unreachable!(),
        }
    }
}

/// `(now - start) / (end - start)`, unclamped.
pub fn linear(now: f64, start: f64, end: f64) -> f64 {
    let span = end - start;
    if span <= 0.0 {
        return 1.0;
    }
    (now - start) / span
}

impl fmt::Debug for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpolation::Linear => f.write_str("Linear"),
            Interpolation::EaseIn => f.write_str("EaseIn"),
            Interpolation::EaseOut => f.write_str("EaseOut"),
            Interpolation::EaseInOut => f.write_str("EaseInOut"),
            Interpolation::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
