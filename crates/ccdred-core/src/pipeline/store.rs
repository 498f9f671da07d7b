use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::consts::MASTER_BIAS_BASE;
use crate::error::{CcdError, Result};
use crate::frame::Frame;
use crate::io::{read_fits, write_fits};
use crate::naming::FlatKey;
use crate::stats::median_mut;

/// Where raw frames come from and where products go.
pub trait FrameStore: Send + Sync {
    fn load_raw(&self, file: &str) -> Result<Frame>;

    fn load_reduced(&self, name: &str) -> Result<Frame>;

    /// Persist `frame` under `name` in the reduced area, replacing any
    /// existing product with that name.
    fn save(&self, frame: &Frame, name: &str) -> Result<()>;

    /// Names of everything already in the reduced area, sorted.
    fn reduced_names(&self) -> Result<Vec<String>>;

    /// Get the reduced area ready for a run.
    fn prepare(&self, _auto_clean: bool) -> Result<()> {
        Ok(())
    }
}

/// How many master bias files the reduced area already holds.
pub fn existing_master_biases(store: &dyn FrameStore) -> Result<usize> {
    Ok(store
        .reduced_names()?
        .iter()
        .filter(|n| n.starts_with(MASTER_BIAS_BASE) && n.ends_with(".fits"))
        .count())
}

/// Load the master flat matching `key`. With several candidates the one with
/// the highest median signal wins.
pub fn find_best_flat(store: &dyn FrameStore, key: &FlatKey) -> Result<Frame> {
    let candidates: Vec<String> = store
        .reduced_names()?
        .into_iter()
        .filter(|n| key.matches(n))
        .collect();
    debug!(key = %key, candidates = candidates.len(), "Looking up master flat");

    let mut best: Option<(f32, Frame)> = None;
    for name in &candidates {
        let frame = match store.load_reduced(name) {
            Ok(f) => f,
            Err(e) => {
                warn!(file = %name, error = %e, "Skipping unreadable master flat candidate");
                continue;
            }
        };
        let mut values: Vec<f32> = frame.data.iter().copied().collect();
        let signal = median_mut(&mut values);
        let better = match &best {
            Some((current, _)) => signal > *current,
            None => true,
        };
        if better {
            best = Some((signal, frame));
        }
    }

    match best {
        Some((signal, frame)) => {
            info!(file = %frame.filename, median = signal, "Selected master flat");
            Ok(frame)
        }
        None => Err(CcdError::Compatibility(format!(
            "no master flat matches {key}"
        ))),
    }
}

/// FITS files on disk: raw frames in one directory, products in another.
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    pub raw_path: PathBuf,
    pub red_path: PathBuf,
}

impl DirectoryStore {
    pub fn new(raw_path: impl Into<PathBuf>, red_path: impl Into<PathBuf>) -> Self {
        Self {
            raw_path: raw_path.into(),
            red_path: red_path.into(),
        }
    }

    /// Make sure the reduced directory exists and is empty.
    ///
    /// A non-empty directory is an error unless `auto_clean` is set, in which
    /// case its contents are deleted.
    pub fn prepare_directory(&self, auto_clean: bool) -> Result<()> {
        if !self.red_path.exists() {
            info!(path = %self.red_path.display(), "Creating reduced data directory");
            fs::create_dir_all(&self.red_path)?;
            return Ok(());
        }
        if !self.red_path.is_dir() {
            return Err(CcdError::Configuration(format!(
                "{} exists and is not a directory",
                self.red_path.display()
            )));
        }

        let entries: Vec<PathBuf> = fs::read_dir(&self.red_path)?
            .map(|e| e.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        if entries.is_empty() {
            return Ok(());
        }
        if !auto_clean {
            return Err(CcdError::Configuration(format!(
                "reduced directory {} is not empty, use auto clean to empty it",
                self.red_path.display()
            )));
        }

        warn!(path = %self.red_path.display(), files = entries.len(), "Cleaning reduced data directory");
        for path in entries {
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn reduced(&self, name: &str) -> PathBuf {
        self.red_path.join(name)
    }
}

impl FrameStore for DirectoryStore {
    fn load_raw(&self, file: &str) -> Result<Frame> {
        read_fits(&self.raw_path.join(file))
    }

    fn load_reduced(&self, name: &str) -> Result<Frame> {
        read_fits(&self.reduced(name))
    }

    fn save(&self, frame: &Frame, name: &str) -> Result<()> {
        write_fits(frame, &self.reduced(name))
    }

    fn reduced_names(&self) -> Result<Vec<String>> {
        list_files(&self.red_path)
    }

    fn prepare(&self, auto_clean: bool) -> Result<()> {
        self.prepare_directory(auto_clean)
    }
}

fn list_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Frames held in memory, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    raw: BTreeMap<String, Frame>,
    reduced: Mutex<BTreeMap<String, Frame>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_raw(&mut self, frame: Frame) {
        self.raw.insert(frame.filename.clone(), frame);
    }

    /// Copy of a stored product.
    pub fn product(&self, name: &str) -> Option<Frame> {
        self.reduced.lock().ok()?.get(name).cloned()
    }
}

impl FrameStore for MemoryStore {
    fn load_raw(&self, file: &str) -> Result<Frame> {
        self.raw.get(file).cloned().ok_or_else(|| {
            CcdError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("raw frame {file} not found"),
            ))
        })
    }

    fn load_reduced(&self, name: &str) -> Result<Frame> {
        self.product(name).ok_or_else(|| {
            CcdError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("product {name} not found"),
            ))
        })
    }

    fn save(&self, frame: &Frame, name: &str) -> Result<()> {
        let mut reduced = self
            .reduced
            .lock()
            .map_err(|_| CcdError::Io(std::io::Error::other("product store poisoned")))?;
        reduced.insert(name.to_string(), frame.clone().with_filename(name));
        Ok(())
    }

    fn reduced_names(&self) -> Result<Vec<String>> {
        let reduced = self
            .reduced
            .lock()
            .map_err(|_| CcdError::Io(std::io::Error::other("product store poisoned")))?;
        Ok(reduced.keys().cloned().collect())
    }
}
