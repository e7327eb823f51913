//! Additive scalar observation-noise variance.

/// Scalar measurement-noise variance, constant or per-period.
///
/// This is pure observation noise, not part of the state vector. Past the end
/// of a per-period schedule, [`MeasurementError::at`] recycles the last
/// supplied variance, mirroring the tail fallback of [`crate::VarNoise`].
#[derive(Clone, Debug)]
pub struct MeasurementError {
    variances: Vec<f64>,
}

impl MeasurementError {
    /// Constant variance at every position.
    pub fn constant(variance: f64) -> Self {
        Self {
            variances: vec![variance],
        }
    }

    /// Per-period variances.
    ///
    /// # Panics
    ///
    /// Panics if `variances` is empty (programmer error).
    pub fn time_varying(variances: Vec<f64>) -> Self {
        assert!(!variances.is_empty(), "variance schedule must not be empty");
        Self { variances }
    }

    /// Returns the variance at position `pos`.
    pub fn at(&self, pos: usize) -> f64 {
        let idx = pos.min(self.variances.len() - 1);
        self.variances[idx]
    }

    /// Whether the variance is the same at every position.
    pub fn is_time_invariant(&self) -> bool {
        self.variances.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn constant_everywhere() {
        let me = MeasurementError::constant(0.25);
        assert!(me.is_time_invariant());
        assert_abs_diff_eq!(me.at(0), 0.25, epsilon = 1e-14);
        assert_abs_diff_eq!(me.at(1000), 0.25, epsilon = 1e-14);
    }

    #[test]
    fn schedule_then_recycled_tail() {
        let me = MeasurementError::time_varying(vec![1.0, 2.0, 3.0]);
        assert!(!me.is_time_invariant());
        assert_abs_diff_eq!(me.at(1), 2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(me.at(2), 3.0, epsilon = 1e-14);
        assert_abs_diff_eq!(me.at(99), 3.0, epsilon = 1e-14);
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn empty_schedule_rejected() {
        MeasurementError::time_varying(vec![]);
    }
}
