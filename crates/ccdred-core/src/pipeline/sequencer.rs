//! Per-frame reduction: overscan, trim, bias, flat and cosmic ray steps in
//! that fixed order, with the file name prefix recording what was done.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cosmic::{CosmicContext, CosmicRayRejector};
use crate::error::Result;
use crate::frame::{Frame, Technique};
use crate::ops::{divide, overscan_subtract, subtract, trim};
use crate::region::{NightRegions, Region};

use super::store::FrameStore;

/// One executed reduction step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ReductionStep {
    Overscan,
    Trim,
    SlitTrim,
    Bias,
    Flat,
    CosmicRay,
}

impl ReductionStep {
    /// File name fragment this step contributes.
    pub fn fragment(&self) -> &'static str {
        match self {
            Self::Overscan => "o",
            Self::Trim => "t",
            Self::SlitTrim => "st",
            Self::Bias => "z",
            Self::Flat => "f",
            Self::CosmicRay => "c",
        }
    }
}

impl fmt::Display for ReductionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overscan => write!(f, "overscan"),
            Self::Trim => write!(f, "trim"),
            Self::SlitTrim => write!(f, "slit trim"),
            Self::Bias => write!(f, "bias"),
            Self::Flat => write!(f, "flat"),
            Self::CosmicRay => write!(f, "cosmic ray"),
        }
    }
}

/// Accumulated file name prefix.
///
/// Fragments are prepended in execution order; the first one is followed by
/// an underscore, so overscan then trim gives `to_` and a lone trim `t_`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProvenanceTag(String);

impl ProvenanceTag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: ReductionStep) {
        if self.0.is_empty() {
            self.0 = format!("{}_", step.fragment());
        } else {
            self.0.insert_str(0, step.fragment());
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn file_name(&self, original: &str) -> String {
        format!("{}{}", self.0, original)
    }
}

impl fmt::Display for ProvenanceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happened to one science frame.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FrameReport {
    pub source: String,
    /// Name the reduced frame was written under.
    pub output: Option<String>,
    pub prefix: String,
    pub applied: Vec<ReductionStep>,
    /// Skipped or degraded steps, in order.
    pub notes: Vec<String>,
}

impl FrameReport {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Self::default()
        }
    }

    fn note(&mut self, text: String) {
        warn!(file = %self.source, "{text}");
        self.notes.push(text);
    }
}

/// Runs the reduction steps over science frames of one group.
pub struct FrameReductionSequencer<'a> {
    technique: Technique,
    regions: &'a NightRegions,
    store: &'a dyn FrameStore,
    slit_trim: Option<Region>,
    master_bias: Option<&'a Frame>,
    bias_enabled: bool,
    flat: Option<&'a Frame>,
    flats_enabled: bool,
    rejector: Option<&'a dyn CosmicRayRejector>,
    save_intermediate: bool,
    work_dir: PathBuf,
}

impl<'a> FrameReductionSequencer<'a> {
    pub fn new(technique: Technique, regions: &'a NightRegions, store: &'a dyn FrameStore) -> Self {
        Self {
            technique,
            regions,
            store,
            slit_trim: None,
            master_bias: None,
            bias_enabled: true,
            flat: None,
            flats_enabled: true,
            rejector: None,
            save_intermediate: false,
            work_dir: PathBuf::from("."),
        }
    }

    pub fn with_slit_trim(mut self, section: Option<Region>) -> Self {
        self.slit_trim = section;
        self
    }

    /// Master bias already cut to the science geometry.
    pub fn with_master_bias(mut self, master: Option<&'a Frame>, enabled: bool) -> Self {
        self.master_bias = master;
        self.bias_enabled = enabled;
        self
    }

    /// Normalized flat already cut to the science geometry.
    pub fn with_flat(mut self, flat: Option<&'a Frame>, enabled: bool) -> Self {
        self.flat = flat;
        self.flats_enabled = enabled;
        self
    }

    pub fn with_rejector(mut self, rejector: Option<&'a dyn CosmicRayRejector>) -> Self {
        self.rejector = rejector;
        self
    }

    pub fn save_intermediate(mut self, save: bool) -> Self {
        self.save_intermediate = save;
        self
    }

    /// Scratch directory handed to external cosmic ray tools.
    pub fn with_work_dir(mut self, dir: &Path) -> Self {
        self.work_dir = dir.to_path_buf();
        self
    }

    /// Reduce one raw frame and write the result under `prefix + name`.
    pub fn process(&self, raw: &Frame) -> Result<FrameReport> {
        let mut report = FrameReport::new(&raw.filename);
        let mut tag = ProvenanceTag::new();
        let mut frame = raw.clone();

        if self.technique == Technique::Spectroscopy {
            match &self.regions.overscan {
                Some(region) => {
                    frame = overscan_subtract(&frame, region)?;
                    self.record(ReductionStep::Overscan, &frame, raw, &mut tag, &mut report)?;
                }
                None => report.note("No overscan region, overscan correction skipped".into()),
            }
        }

        frame = trim(&frame, &self.regions.trim)?;
        match (&self.slit_trim, self.technique) {
            (Some(section), Technique::Spectroscopy) => {
                frame = trim(&frame, section)?;
                self.record(ReductionStep::SlitTrim, &frame, raw, &mut tag, &mut report)?;
            }
            _ => self.record(ReductionStep::Trim, &frame, raw, &mut tag, &mut report)?,
        }

        if !self.bias_enabled {
            report.note("Bias correction disabled by request".into());
        } else if let Some(bias) = self.master_bias {
            frame = subtract(&frame, bias)?;
            self.record(ReductionStep::Bias, &frame, raw, &mut tag, &mut report)?;
        } else {
            report.note("No master bias available, bias correction skipped".into());
        }

        if !self.flats_enabled {
            report.note("Flat fielding disabled by request".into());
        } else if let Some(flat) = self.flat {
            frame = divide(&frame, flat)?;
            self.record(ReductionStep::Flat, &frame, raw, &mut tag, &mut report)?;
        } else {
            report.note("No compatible master flat, frame is not flat fielded".into());
        }

        if let Some(rejector) = self.rejector {
            let ctx = CosmicContext {
                work_dir: &self.work_dir,
                prefix: tag.as_str(),
            };
            match rejector.reject(&frame, &ctx) {
                Ok(cleaned) => {
                    frame = cleaned;
                    self.record(ReductionStep::CosmicRay, &frame, raw, &mut tag, &mut report)?;
                }
                Err(e) => report.note(format!(
                    "Cosmic ray rejection with {} failed, frame left uncorrected: {e}",
                    rejector.name()
                )),
            }
        }

        let output = tag.file_name(&raw.filename);
        frame.filename = output.clone();
        frame.refresh_statistics();
        self.store.save(&frame, &output)?;
        info!(file = %raw.filename, output = %output, "Reduced science frame");

        report.prefix = tag.to_string();
        report.output = Some(output);
        Ok(report)
    }

    fn record(
        &self,
        step: ReductionStep,
        frame: &Frame,
        raw: &Frame,
        tag: &mut ProvenanceTag,
        report: &mut FrameReport,
    ) -> Result<()> {
        tag.push(step);
        report.applied.push(step);
        debug!(file = %raw.filename, %step, prefix = %tag, "Applied reduction step");
        if self.save_intermediate {
            self.store.save(frame, &tag.file_name(&raw.filename))?;
        }
        Ok(())
    }
}
