use std::fmt;

/// Reduction stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReductionStage {
    ResolvingRegions,
    PreparingOutput,
    MasterBias,
    MasterFlats,
    Groups,
}

impl fmt::Display for ReductionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolvingRegions => write!(f, "Resolving regions"),
            Self::PreparingOutput => write!(f, "Preparing output directory"),
            Self::MasterBias => write!(f, "Building master bias"),
            Self::MasterFlats => write!(f, "Building master flats"),
            Self::Groups => write!(f, "Reducing groups"),
        }
    }
}

/// Thread-safe progress reporting for a reduction run.
///
/// All methods default to no-ops.
pub trait ProgressReporter: Send + Sync {
    /// A stage started. `total_items` is the number of groups in it, if known.
    fn begin_stage(&self, _stage: ReductionStage, _total_items: Option<usize>) {}

    /// `items_done` groups of the current stage are finished.
    fn advance(&self, _items_done: usize) {}

    fn finish_stage(&self) {}
}

pub(crate) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
