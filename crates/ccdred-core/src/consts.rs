/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// First illuminated column of the unbinned spectroscopic ROI (1-based).
pub const SPEC_TRIM_FIRST_COLUMN: f64 = 51.0;

/// Last illuminated column of the unbinned spectroscopic ROI (1-based).
pub const SPEC_TRIM_LAST_COLUMN: f64 = 4110.0;

/// Red camera overscan window, unbinned columns. The first five columns carry
/// an abnormally high signal and are skipped.
pub const RED_OVERSCAN_COLUMNS: (f64, f64) = (6.0, 49.0);

/// Blue camera overscan window, unbinned columns.
pub const BLUE_OVERSCAN_COLUMNS: (f64, f64) = (1.0, 16.0);

/// Default saturation limit in ADU for flat frames.
pub const DEFAULT_SATURATION_LIMIT: f32 = 65_000.0;

/// Symmetric clipping threshold for master bias combination.
pub const BIAS_CLIP_SIGMA: f32 = 3.0;

/// Symmetric clipping threshold for master flat combination.
pub const FLAT_CLIP_SIGMA: f32 = 1.0;

/// Upper bound on per-pixel clipping iterations.
pub const DEFAULT_CLIP_ITERATIONS: usize = 5;

/// Default polynomial order for flat normalization models.
pub const DEFAULT_NORM_ORDER: usize = 15;

/// Fraction of the peak spatial flat profile that counts as illuminated slit.
pub const SLIT_ILLUMINATION_THRESHOLD: f32 = 0.5;

/// Pixels removed on each side of the detected slit edges.
pub const SLIT_EDGE_MARGIN: usize = 2;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// Timestamp layout used by DATE-OBS and the night ephemeris.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Base name of master flat files.
pub const MASTER_FLAT_BASE: &str = "master_flat";

/// Base name of master bias files.
pub const MASTER_BIAS_BASE: &str = "master_bias";

/// Grating keyword value meaning no grating in the beam.
pub const NO_GRATING: &str = "<NO GRATING>";

/// Filter keyword value meaning an empty filter wheel slot.
pub const NO_FILTER: &str = "<NO FILTER>";

/// Default detection threshold (in sigma) for the in-process cosmic ray cleaner.
pub const DEFAULT_COSMIC_SIGMA: f32 = 4.5;

/// Contrast a candidate must show over its fine-structure neighbourhood.
pub const DEFAULT_COSMIC_CONTRAST: f32 = 2.0;

/// Cleaning passes for the in-process cosmic ray cleaner.
pub const DEFAULT_COSMIC_ITERATIONS: usize = 4;
