pub mod master;
pub mod sigma_clip;

pub use master::{combine, combine_with_history, MasterFrame};
pub use sigma_clip::{clipped_median_stack, ClipParams};
