use std::collections::HashMap;

use tracing::{debug, warn};

use crate::combine::MasterFrame;
use crate::error::Result;
use crate::frame::Frame;
use crate::normalize::{normalize, NormalizeMethod};
use crate::region::NightRegions;

/// State that lives for a whole run.
#[derive(Debug)]
pub struct RunContext {
    pub regions: NightRegions,
    master_bias: Option<MasterFrame>,
}

impl RunContext {
    pub fn new(regions: NightRegions) -> Self {
        Self {
            regions,
            master_bias: None,
        }
    }

    pub fn master_bias(&self) -> Option<&MasterFrame> {
        self.master_bias.as_ref()
    }

    pub fn set_master_bias(&mut self, master: MasterFrame) {
        if let Some(previous) = &self.master_bias {
            warn!(
                previous = %previous.name,
                current = %master.name,
                "Replacing master bias, later groups use the newest one"
            );
        }
        self.master_bias = Some(master);
    }
}

/// Per-group cache of normalized master flats, keyed by master name.
#[derive(Debug, Default)]
pub struct GroupContext {
    normalized: HashMap<String, Frame>,
}

impl GroupContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized copy of `master`, computed on first use.
    pub fn normalized_flat(
        &mut self,
        master: &Frame,
        method: NormalizeMethod,
        order: usize,
    ) -> Result<&Frame> {
        if !self.normalized.contains_key(&master.filename) {
            let norm = normalize(master, method, order)?;
            self.normalized.insert(master.filename.clone(), norm);
        } else {
            debug!(flat = %master.filename, "Reusing normalized flat");
        }
        // Present: inserted above when missing.
        Ok(&self.normalized[&master.filename])
    }

    pub fn clear(&mut self) {
        self.normalized.clear();
    }

    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}
