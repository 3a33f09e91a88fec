//! Job classification using fatal-step patterns.

use crate::config::FatalStepMatcher;
use crate::models::{Conclusion, JobStatus, RawJobRun};

/// Classify one job attempt.
///
/// A failure is only reported as [`JobStatus::Failed`] when it is rooted in a
/// fatal (test execution) step; failures in any other step are setup or
/// infrastructure problems and come back as [`JobStatus::NotRunSetupFailed`].
/// Never returns [`JobStatus::Running`].
pub fn classify(run: &RawJobRun, fatal_steps: &FatalStepMatcher) -> JobStatus {
    if run.is_in_flight() {
        return JobStatus::NotRun;
    }

    match run.conclusion() {
        Some(Conclusion::Success) => JobStatus::Passed,
        Some(Conclusion::Failure) => match run.first_failed_step() {
            Some(step) if !fatal_steps.is_fatal(&step.name) => JobStatus::NotRunSetupFailed,
            _ => JobStatus::Failed,
        },
        Some(Conclusion::Cancelled | Conclusion::Skipped) => JobStatus::NotRun,
        Some(Conclusion::TimedOut | Conclusion::Other) | None => JobStatus::NotRun,
    }
}
