pub mod config;
pub mod context;
pub mod dispatcher;
pub mod manifest;
pub mod sequencer;
pub mod store;
mod reducer;
mod types;

pub use config::ReductionConfig;
pub use dispatcher::{GroupDispatcher, GroupKind, GroupOutcome, ObsTypeSet};
pub use manifest::{CalibrationGroup, FrameRecord, NightManifest};
pub use reducer::{GroupReport, Reducer, RunReport};
pub use sequencer::{FrameReductionSequencer, FrameReport, ProvenanceTag, ReductionStep};
pub use store::{find_best_flat, DirectoryStore, FrameStore, MemoryStore};
pub use types::{ProgressReporter, ReductionStage};
