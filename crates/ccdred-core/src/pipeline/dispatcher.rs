use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::combine::{combine, combine_with_history, ClipParams, MasterFrame};
use crate::cosmic::CosmicRayRejector;
use crate::error::{CcdError, Result};
use crate::frame::{Frame, ObsType, Technique};
use crate::naming::{master_bias_name, FlatCatalogNamer, NameMode};
use crate::normalize::NormalizeMethod;
use crate::ops::{overscan_subtract, subtract, trim};
use crate::region::Region;
use crate::slit::slit_trim_section;

use super::config::ReductionConfig;
use super::context::{GroupContext, RunContext};
use super::manifest::CalibrationGroup;
use super::sequencer::{FrameReductionSequencer, FrameReport};
use super::store::{existing_master_biases, find_best_flat, FrameStore};

/// Distinct observation types present in a group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObsTypeSet(BTreeSet<ObsType>);

/// Processing route for a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupKind {
    Bias,
    Flat,
    /// Science or comparison frames, `with_flats` when flats share the group.
    Science { with_flats: bool },
    Unprocessable,
}

impl ObsTypeSet {
    pub fn of(group: &CalibrationGroup) -> Self {
        Self(group.obstypes())
    }

    pub fn contains(&self, obstype: &ObsType) -> bool {
        self.0.contains(obstype)
    }

    fn only(&self, obstype: &ObsType) -> bool {
        self.0.len() == 1 && self.contains(obstype)
    }

    pub fn kind(&self) -> GroupKind {
        if self.contains(&ObsType::Object) || self.contains(&ObsType::Comp) {
            GroupKind::Science {
                with_flats: self.contains(&ObsType::Flat),
            }
        } else if self.only(&ObsType::Bias) {
            GroupKind::Bias
        } else if self.only(&ObsType::Flat) {
            GroupKind::Flat
        } else {
            GroupKind::Unprocessable
        }
    }
}

impl fmt::Display for ObsTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// Result of dispatching one group.
#[derive(Clone, Debug, Serialize)]
pub enum GroupOutcome {
    MasterBias {
        name: String,
        combined: usize,
    },
    BiasSkipped,
    /// Flat-only group: the master and its normalized copy are written and
    /// nothing else consumes them in this run.
    MasterFlat {
        name: String,
        normalized: String,
        combined: usize,
    },
    Science {
        target: String,
        flat: Option<String>,
        slit_trim: Option<String>,
        frames: Vec<FrameReport>,
    },
    Unprocessable {
        obstypes: String,
    },
    Failed {
        error: String,
    },
}

impl GroupOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Routes groups to master bias creation, master flat creation or science
/// reduction.
pub struct GroupDispatcher<'a> {
    config: &'a ReductionConfig,
    store: &'a dyn FrameStore,
    technique: Technique,
    namer: FlatCatalogNamer<'a>,
    rejector: Option<Box<dyn CosmicRayRejector>>,
}

impl<'a> GroupDispatcher<'a> {
    pub fn new(
        config: &'a ReductionConfig,
        store: &'a dyn FrameStore,
        technique: Technique,
        namer: FlatCatalogNamer<'a>,
    ) -> Self {
        Self {
            config,
            store,
            technique,
            namer,
            rejector: config.cosmic_rejector(),
        }
    }

    /// Replace the rejector built from the configuration.
    pub fn with_rejector(mut self, rejector: Option<Box<dyn CosmicRayRejector>>) -> Self {
        self.rejector = rejector;
        self
    }

    /// Process one group. Errors are logged and returned as
    /// [`GroupOutcome::Failed`] so the run can continue.
    pub fn dispatch(&self, group: &CalibrationGroup, run: &mut RunContext) -> GroupOutcome {
        let tags = ObsTypeSet::of(group);
        let bias_enabled = !self.config.ignore_bias;
        let mut group_ctx = GroupContext::new();

        let result = match (tags.kind(), bias_enabled) {
            (GroupKind::Bias, true) => self.master_bias(group, run),
            (GroupKind::Bias, false) => {
                info!(frames = group.len(), "Bias correction disabled, skipping bias group");
                Ok(GroupOutcome::BiasSkipped)
            }
            (GroupKind::Flat, _) => self.flat_group(group, run, &mut group_ctx),
            (GroupKind::Science { with_flats }, _) => {
                self.science_group(group, with_flats, run, &mut group_ctx)
            }
            (GroupKind::Unprocessable, _) => {
                error!(obstypes = %tags, "No processable observation type in group");
                Ok(GroupOutcome::Unprocessable {
                    obstypes: tags.to_string(),
                })
            }
        };

        result.unwrap_or_else(|e| {
            error!(obstypes = %tags, error = %e, "Group failed");
            GroupOutcome::Failed {
                error: e.to_string(),
            }
        })
    }

    /// Overscan and trim a calibration frame into the science geometry.
    /// Imaging flats also get the master bias removed.
    fn prepare_calibration(&self, raw: Frame, run: &RunContext, is_flat: bool) -> Result<Frame> {
        let regions = &run.regions;
        match self.technique {
            Technique::Spectroscopy => {
                let frame = match &regions.overscan {
                    Some(region) => overscan_subtract(&raw, region)?,
                    None => raw,
                };
                trim(&frame, &regions.trim)
            }
            Technique::Imaging => {
                let frame = trim(&raw, &regions.trim)?;
                match run.master_bias() {
                    Some(bias) if is_flat && !self.config.ignore_bias => {
                        subtract(&frame, &bias.frame)
                    }
                    _ => Ok(frame),
                }
            }
        }
    }

    fn load_calibrations(&self, files: &[String], run: &RunContext, is_flat: bool) -> Result<Vec<Frame>> {
        files
            .iter()
            .map(|file| {
                let raw = self.store.load_raw(file)?;
                self.prepare_calibration(raw, run, is_flat)
            })
            .collect()
    }

    fn combine_master(
        &self,
        frames: &[Frame],
        params: &ClipParams,
        saturation_limit: Option<f32>,
    ) -> Result<Frame> {
        if self.config.master_history {
            combine_with_history(frames, params, saturation_limit)
        } else {
            combine(frames, params, saturation_limit)
        }
    }

    fn master_bias(&self, group: &CalibrationGroup, run: &mut RunContext) -> Result<GroupOutcome> {
        let files = group.files_of(&ObsType::Bias);
        info!(frames = files.len(), "Creating master bias");
        let frames = self.load_calibrations(&files, run, false)?;
        let combined = self.combine_master(&frames, &self.config.bias_clip, None)?;
        let name = master_bias_name(existing_master_biases(self.store)?);
        let master = MasterFrame::new(combined, name.clone());
        self.store.save(&master.frame, &name)?;
        info!(name = %name, "Created master bias");

        let count = ncombine(&master.frame);
        run.set_master_bias(master);
        Ok(GroupOutcome::MasterBias {
            name,
            combined: count,
        })
    }

    fn build_master_flat(
        &self,
        group: &CalibrationGroup,
        target_name: &str,
        run: &RunContext,
    ) -> Result<MasterFrame> {
        let files = group.files_of(&ObsType::Flat);
        let first = files
            .first()
            .ok_or_else(|| CcdError::EmptyInput("group has no flat frames".into()))?;
        // Named from the first flat's header, before any correction.
        let sample = self.store.load_raw(first)?;
        let key = self
            .namer
            .name_for(&sample.header, &group.setup(), target_name, NameMode::Create)?;

        info!(frames = files.len(), name = %key, "Creating master flat");
        let frames = self.load_calibrations(&files, run, true)?;
        let combined = self.combine_master(
            &frames,
            &self.config.flat_clip,
            Some(self.config.saturation_limit),
        )?;
        let master = MasterFrame::new(combined, key.as_str());
        self.store.save(&master.frame, &master.name)?;
        info!(name = %master.name, "Created master flat");
        Ok(master)
    }

    fn normalize_method(&self) -> NormalizeMethod {
        match self.technique {
            Technique::Spectroscopy => self.config.flat_normalize,
            Technique::Imaging => NormalizeMethod::Mean,
        }
    }

    fn normalized_flat(&self, flat: &Frame, group_ctx: &mut GroupContext) -> Result<Frame> {
        let norm = group_ctx
            .normalized_flat(flat, self.normalize_method(), self.config.norm_order)?
            .clone();
        self.store.save(&norm, &norm.filename)?;
        Ok(norm)
    }

    fn flat_group(
        &self,
        group: &CalibrationGroup,
        run: &RunContext,
        group_ctx: &mut GroupContext,
    ) -> Result<GroupOutcome> {
        warn!(frames = group.len(), "Only flats found in this group");
        let master = self.build_master_flat(group, "", run)?;
        let norm = self.normalized_flat(&master.frame, group_ctx)?;
        Ok(GroupOutcome::MasterFlat {
            combined: ncombine(&master.frame),
            name: master.name,
            normalized: norm.filename,
        })
    }

    /// Master flat for a science group: built from the group's own flats, or
    /// looked up among existing masters.
    fn science_flat(
        &self,
        group: &CalibrationGroup,
        with_flats: bool,
        target: &str,
        science_files: &[String],
        run: &RunContext,
    ) -> Option<Frame> {
        if self.config.ignore_flats {
            warn!("Ignoring flats by request");
            return None;
        }
        if with_flats {
            return match self.build_master_flat(group, target, run) {
                Ok(master) => Some(master.frame),
                Err(e) => {
                    warn!(error = %e, "Could not build the group master flat");
                    None
                }
            };
        }

        info!("Attempting to find a suitable master flat");
        let lookup = science_files
            .first()
            .ok_or_else(|| CcdError::EmptyInput("group has no science frames".into()))
            .and_then(|file| self.store.load_raw(file))
            .and_then(|sample| {
                self.namer
                    .name_for(&sample.header, &group.setup(), "", NameMode::Lookup)
            })
            .and_then(|key| find_best_flat(self.store, &key));
        match lookup {
            Ok(flat) => Some(flat),
            Err(e) => {
                warn!(error = %e, "No master flat for this group");
                None
            }
        }
    }

    fn science_group(
        &self,
        group: &CalibrationGroup,
        with_flats: bool,
        run: &RunContext,
        group_ctx: &mut GroupContext,
    ) -> Result<GroupOutcome> {
        let target = group.target_name();
        let science_files: Vec<String> = group
            .frames
            .iter()
            .filter(|f| matches!(f.obstype, ObsType::Object | ObsType::Comp))
            .map(|f| f.file.clone())
            .collect();
        info!(target = %target, frames = science_files.len(), "Processing science group");

        let master_flat = self.science_flat(group, with_flats, &target, &science_files, run);

        let slit: Option<Region> = match (&master_flat, self.technique) {
            (Some(flat), Technique::Spectroscopy) => {
                slit_trim_section(flat, &self.config.slit_trim)
            }
            _ => None,
        };

        let flat = match master_flat {
            Some(flat) => {
                let flat = match &slit {
                    Some(section) => trim(&flat, section)?,
                    None => flat,
                };
                Some(self.normalized_flat(&flat, group_ctx)?)
            }
            None => None,
        };

        let bias = match (run.master_bias(), &slit) {
            (Some(b), Some(section)) => Some(trim(&b.frame, section)?),
            (Some(b), None) => Some(b.frame.clone()),
            (None, _) => None,
        };

        let mut sequencer = FrameReductionSequencer::new(self.technique, &run.regions, self.store)
            .with_slit_trim(slit)
            .with_master_bias(bias.as_ref(), !self.config.ignore_bias)
            .with_flat(flat.as_ref(), !self.config.ignore_flats)
            .with_rejector(self.rejector.as_deref())
            .save_intermediate(self.config.save_intermediate);
        sequencer = sequencer.with_work_dir(&self.config.red_path);

        let frames = science_files
            .iter()
            .map(|file| {
                self.store
                    .load_raw(file)
                    .and_then(|raw| sequencer.process(&raw))
                    .unwrap_or_else(|e| {
                        error!(file = %file, error = %e, "Frame reduction failed");
                        FrameReport {
                            source: file.clone(),
                            notes: vec![format!("reduction failed: {e}")],
                            ..FrameReport::default()
                        }
                    })
            })
            .collect();

        Ok(GroupOutcome::Science {
            target,
            flat: flat.map(|f| f.filename),
            slit_trim: slit.map(|s| s.to_string()),
            frames,
        })
    }
}

fn ncombine(frame: &Frame) -> usize {
    frame
        .header
        .get("NCOMBINE")
        .and_then(|v| v.as_i64())
        .unwrap_or(0) as usize
}
