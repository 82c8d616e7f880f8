//! # Discrete filters
//!
//! Small discrete-time filters used to shape controller channels:
//!
//! - [`Pt1Filter`]: first order lag, `K / (1 + T s)`, discretised exactly for a
//!   held input so the output is a convex blend of the previous output and the
//!   scaled input.
//! - [`Pdt1Filter`]: PD with lag, `K (1 + T_lead s) / (1 + T_lag s)`,
//!   discretised with the bilinear transform.
//!
//! Both filters are built with their sample interval, so an unconfigured
//! filter cannot exist. Controllers which only learn the interval on their
//! first step hold their filters in an `Option` and use [`SampleClock`] to
//! detect a later change of interval.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Relative difference between two sample intervals above which they are
/// considered different.
pub const DT_REL_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// First order lag filter.
#[derive(Debug, Clone, Serialize)]
pub struct Pt1Filter {
    dt_s: f64,
    time_const_s: f64,
    gain: f64,

    /// Discrete decay coefficient, `exp(-dt/T)`
    decay: f64,

    prev_output: f64,
}

/// PD filter with lag.
#[derive(Debug, Clone, Serialize)]
pub struct Pdt1Filter {
    dt_s: f64,
    lag_time_const_s: f64,
    lead_time_const_s: f64,
    gain: f64,

    /// Coefficients of `y_k = b0 u_k + b1 u_k-1 - a1 y_k-1`
    b0: f64,
    b1: f64,
    a1: f64,

    prev_input: f64,
    prev_output: f64,
}

/// Tracks the sample interval used by a controller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SampleClock {
    dt_s: Option<f64>,
    num_drifts: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Result of checking a step's interval against the captured one.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DtCheck {
    /// First interval seen, now captured.
    First,

    /// Same as the captured interval.
    Consistent,

    /// Different from the captured interval. The new interval becomes the
    /// captured one.
    Drift {
        expected_s: f64,
        actual_s: f64,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pt1Filter {
    /// Create a new filter with the given interval, time constant and gain.
    ///
    /// A non-positive time constant gives a pure gain.
    pub fn configure(dt_s: f64, time_const_s: f64, gain: f64) -> Self {
        let mut filter = Self {
            dt_s,
            time_const_s,
            gain,
            decay: 0.0,
            prev_output: 0.0,
        };
        filter.reconfigure(dt_s);
        filter
    }

    /// Change the sample interval, keeping the filter state.
    pub fn reconfigure(&mut self, dt_s: f64) {
        self.dt_s = dt_s;
        self.decay = if self.time_const_s > 0.0 && dt_s > 0.0 {
            (-dt_s / self.time_const_s).exp()
        }
        else {
            0.0
        };
    }

    /// Filter the next input sample.
    pub fn filter(&mut self, input: f64) -> f64 {
        let output = self.decay * self.prev_output + (1.0 - self.decay) * self.gain * input;
        self.prev_output = output;
        output
    }

    /// Zero the filter state.
    pub fn reset(&mut self) {
        self.prev_output = 0.0;
    }

    pub fn dt_s(&self) -> f64 {
        self.dt_s
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }
}

impl Pdt1Filter {
    /// Create a new filter with the given interval, lag and lead time
    /// constants and gain.
    pub fn configure(
        dt_s: f64,
        lag_time_const_s: f64,
        lead_time_const_s: f64,
        gain: f64,
    ) -> Self {
        let mut filter = Self {
            dt_s,
            lag_time_const_s: lag_time_const_s.max(0.0),
            lead_time_const_s: lead_time_const_s.max(0.0),
            gain,
            b0: 0.0,
            b1: 0.0,
            a1: 0.0,
            prev_input: 0.0,
            prev_output: 0.0,
        };
        filter.reconfigure(dt_s);
        filter
    }

    /// Change the sample interval, keeping the filter state.
    pub fn reconfigure(&mut self, dt_s: f64) {
        self.dt_s = dt_s;

        // Bilinear transform s = 2/h (z - 1)/(z + 1) of K (1 + Td s)/(1 + T s)
        let h = dt_s.max(f64::EPSILON);
        let den = h + 2.0 * self.lag_time_const_s;

        self.b0 = self.gain * (h + 2.0 * self.lead_time_const_s) / den;
        self.b1 = self.gain * (h - 2.0 * self.lead_time_const_s) / den;
        self.a1 = (h - 2.0 * self.lag_time_const_s) / den;
    }

    /// Filter the next input sample.
    pub fn filter(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.b1 * self.prev_input - self.a1 * self.prev_output;
        self.prev_input = input;
        self.prev_output = output;
        output
    }

    /// Zero the filter state.
    pub fn reset(&mut self) {
        self.prev_input = 0.0;
        self.prev_output = 0.0;
    }

    pub fn dt_s(&self) -> f64 {
        self.dt_s
    }
}

impl SampleClock {
    /// Check the interval of the current step.
    pub fn check(&mut self, dt_s: f64) -> DtCheck {
        match self.dt_s {
            None => {
                self.dt_s = Some(dt_s);
                DtCheck::First
            },
            Some(expected_s) => {
                if (dt_s - expected_s).abs() <= DT_REL_TOLERANCE * expected_s.abs().max(dt_s.abs()) {
                    DtCheck::Consistent
                }
                else {
                    self.dt_s = Some(dt_s);
                    self.num_drifts += 1;
                    DtCheck::Drift { expected_s, actual_s: dt_s }
                }
            }
        }
    }

    /// The captured interval, if any step has been seen.
    pub fn dt_s(&self) -> Option<f64> {
        self.dt_s
    }

    /// Number of interval changes seen since the clock was created.
    pub fn num_drifts(&self) -> u64 {
        self.num_drifts
    }
}
