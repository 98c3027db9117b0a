use thiserror::Error;

/// Structural errors surfaced at their call site (see SPEC_FULL.md §7).
///
/// In-step numerical anomalies (unstable velocities/densities, neighbor
/// buffer overflow) are *not* represented here — they are funneled through
/// the stability check and logged, not returned as `Result`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error("allocation failure: requested {requested} elements")]
    AllocationFailure { requested: usize },
}

pub type SimResult<T> = Result<T, SimError>;
