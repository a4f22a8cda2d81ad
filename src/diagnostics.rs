//! Non-fatal numerical diagnostics.
//!
//! Long batch runs should not abort because one design is badly conditioned or a handful
//! of voxels carry no signal. Such conditions are reported as [`Diagnostic`] values to a
//! [`DiagnosticSink`] and the computation carries on. [`LogSink`] forwards them to the
//! `log` facade; any `Fn(&Diagnostic) + Send + Sync` closure can be used to collect them
//! instead.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// The condition number of X'X exceeded the configured limit.
    IllConditioned { condition_number: f64, limit: f64 },
    /// Voxels whose p-value is undefined (NaN) and were left out of the correction.
    ExcludedVoxels { contrast: usize, count: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::IllConditioned {
                condition_number,
                limit,
            } => write!(
                f,
                "X'X is ill-conditioned: condition number {:e} exceeds {:e}",
                condition_number, limit
            ),
            Diagnostic::ExcludedVoxels { contrast, count } => write!(
                f,
                "contrast {}: {} voxel(s) with undefined p-values excluded from correction",
                contrast, count
            ),
        }
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Default sink, emits every diagnostic as a `log::warn!` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: &Diagnostic) {
        log::warn!("{}", diagnostic);
    }
}

impl<F> DiagnosticSink for F
where
    F: Fn(&Diagnostic) + Send + Sync,
{
    fn report(&self, diagnostic: &Diagnostic) {
        self(diagnostic)
    }
}
