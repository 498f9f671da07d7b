use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::frame::{Instrument, Technique};
use crate::mode::ModeResolver;
use crate::naming::FlatCatalogNamer;
use crate::region::NightRegions;

use super::config::ReductionConfig;
use super::context::RunContext;
use super::dispatcher::{GroupDispatcher, GroupKind, GroupOutcome, ObsTypeSet};
use super::manifest::NightManifest;
use super::types::{NoOpReporter, ProgressReporter, ReductionStage};
use super::store::FrameStore;

/// Outcome of one group, with its position in the manifest.
#[derive(Clone, Debug, Serialize)]
pub struct GroupReport {
    pub index: usize,
    pub obstypes: String,
    pub frames: usize,
    pub outcome: GroupOutcome,
}

/// Everything a reduction run produced.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub technique: String,
    pub instrument: String,
    pub trim_section: String,
    pub overscan_region: Option<String>,
    pub groups: Vec<GroupReport>,
}

impl RunReport {
    pub fn failed_groups(&self) -> usize {
        self.groups.iter().filter(|g| g.outcome.is_failure()).count()
    }

    /// Science frames written.
    pub fn reduced_frames(&self) -> usize {
        self.groups
            .iter()
            .map(|g| match &g.outcome {
                GroupOutcome::Science { frames, .. } => {
                    frames.iter().filter(|f| f.output.is_some()).count()
                }
                _ => 0,
            })
            .sum()
    }

    /// Master bias and master flat files written.
    pub fn masters(&self) -> Vec<&str> {
        self.groups
            .iter()
            .filter_map(|g| match &g.outcome {
                GroupOutcome::MasterBias { name, .. } | GroupOutcome::MasterFlat { name, .. } => {
                    Some(name.as_str())
                }
                GroupOutcome::Science {
                    flat: Some(name), ..
                } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Drives a whole night: regions, output directory, then every group.
pub struct Reducer<'a> {
    config: &'a ReductionConfig,
    store: &'a dyn FrameStore,
    modes: &'a dyn ModeResolver,
}

impl<'a> Reducer<'a> {
    pub fn new(
        config: &'a ReductionConfig,
        store: &'a dyn FrameStore,
        modes: &'a dyn ModeResolver,
    ) -> Self {
        Self {
            config,
            store,
            modes,
        }
    }

    pub fn run(&self, manifest: &NightManifest) -> Result<RunReport> {
        self.run_reported(manifest, Arc::new(NoOpReporter))
    }

    /// Run the night with a progress reporter.
    ///
    /// Configuration problems abort the run. Anything going wrong inside a
    /// group is recorded in that group's outcome instead.
    pub fn run_reported(
        &self,
        manifest: &NightManifest,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<RunReport> {
        self.config.validate()?;
        let technique: Technique = manifest.technique()?;
        let instrument: Instrument = manifest.instrument()?;
        let ephemeris = manifest.ephemeris()?;

        reporter.begin_stage(ReductionStage::ResolvingRegions, None);
        let sample = manifest
            .sample_file()
            .map(|file| self.store.load_raw(file))
            .transpose()?;
        let regions = NightRegions::resolve(technique, instrument, sample.as_ref())?;
        reporter.finish_stage();

        reporter.begin_stage(ReductionStage::PreparingOutput, None);
        self.store.prepare(self.config.auto_clean)?;
        reporter.finish_stage();

        info!(
            %technique,
            %instrument,
            groups = manifest.groups.len(),
            frames = manifest.frame_count(),
            "Starting reduction"
        );

        let namer = FlatCatalogNamer::new(technique, &ephemeris, self.modes);
        let dispatcher = GroupDispatcher::new(self.config, self.store, technique, namer);
        let mut run = RunContext::new(regions);

        // Bias groups first so every later group sees the master bias, then
        // flat-only groups so their masters exist before science looks them up.
        let mut bias = Vec::new();
        let mut flats = Vec::new();
        let mut rest = Vec::new();
        for (index, group) in manifest.groups.iter().enumerate() {
            match ObsTypeSet::of(group).kind() {
                GroupKind::Bias => bias.push((index, group)),
                GroupKind::Flat => flats.push((index, group)),
                _ => rest.push((index, group)),
            }
        }

        let mut groups = Vec::with_capacity(manifest.groups.len());
        let batches = [
            (ReductionStage::MasterBias, bias),
            (ReductionStage::MasterFlats, flats),
            (ReductionStage::Groups, rest),
        ];
        for (stage, batch) in batches {
            reporter.begin_stage(stage, Some(batch.len()));
            for (done, (index, group)) in batch.into_iter().enumerate() {
                let tags = ObsTypeSet::of(group);
                info!(group = index, obstypes = %tags, frames = group.len(), "Dispatching group");
                let outcome = dispatcher.dispatch(group, &mut run);
                groups.push(GroupReport {
                    index,
                    obstypes: tags.to_string(),
                    frames: group.len(),
                    outcome,
                });
                reporter.advance(done + 1);
            }
            reporter.finish_stage();
        }
        groups.sort_by_key(|g| g.index);

        let report = RunReport {
            technique: technique.to_string(),
            instrument: instrument.to_string(),
            trim_section: regions.trim.to_string(),
            overscan_region: regions.overscan.map(|r| r.to_string()),
            groups,
        };
        info!(
            reduced = report.reduced_frames(),
            failed_groups = report.failed_groups(),
            "Reduction finished"
        );
        Ok(report)
    }
}
