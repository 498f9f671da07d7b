use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::error::{CcdError, Result};
use crate::frame::Frame;
use crate::io::{read_fits, write_fits};

use super::{CosmicContext, CosmicRayRejector};

const DCR_PAR: &str = "dcr.par";

/// Runs the external `dcr` program: `dcr <in> <out> <cosmic>`.
///
/// `dcr` reads its parameters from `dcr.par` in its working directory, so the
/// file is copied from `par_dir` into the work directory before each call.
#[derive(Clone, Debug)]
pub struct DcrRejector {
    pub executable: PathBuf,
    pub par_dir: Option<PathBuf>,
    pub keep_files: bool,
}

impl DcrRejector {
    pub fn new(par_dir: Option<PathBuf>, keep_files: bool) -> Self {
        Self {
            executable: PathBuf::from("dcr"),
            par_dir,
            keep_files,
        }
    }

    fn stage_par_file(&self, work_dir: &Path) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.par_dir else {
            return Ok(None);
        };
        let source = dir.join(DCR_PAR);
        let target = work_dir.join(DCR_PAR);
        if !source.is_file() {
            warn!(path = %source.display(), "dcr.par not found, dcr will use its defaults");
            return Ok(None);
        }
        if source == target || target.exists() {
            return Ok(None);
        }
        fs::copy(&source, &target)?;
        Ok(Some(target))
    }
}

impl CosmicRayRejector for DcrRejector {
    fn name(&self) -> &'static str {
        "dcr"
    }

    fn reject(&self, frame: &Frame, ctx: &CosmicContext<'_>) -> Result<Frame> {
        // dcr runs inside the work directory, so it gets bare file names.
        let base = format!("{}{}", ctx.prefix, frame.filename);
        let input_name = format!("dcr_in_{base}");
        let output_name = format!("c{base}.dcr");
        let cosmic_name = format!("cosmic_{base}");
        let input = ctx.work_dir.join(&input_name);
        let output = ctx.work_dir.join(&output_name);
        let cosmic = ctx.work_dir.join(&cosmic_name);

        write_fits(frame, &input)?;
        let staged_par = self.stage_par_file(ctx.work_dir)?;

        debug!(input = %input.display(), "Running dcr");
        let status = Command::new(&self.executable)
            .arg(&input_name)
            .arg(&output_name)
            .arg(&cosmic_name)
            .current_dir(ctx.work_dir)
            .output();

        let result = match status {
            Ok(out) if out.status.success() => read_fits(&output).map(|cleaned| {
                let mut cleaned = frame.with_data(cleaned.data);
                cleaned
                    .header
                    .add_history("Cosmic rays rejected with dcr");
                cleaned
            }),
            Ok(out) => Err(CcdError::ExternalTool(format!(
                "dcr exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            ))),
            Err(e) => Err(CcdError::ExternalTool(format!(
                "failed to run {}: {e}",
                self.executable.display()
            ))),
        };

        let mut scratch = vec![input, output];
        if !self.keep_files {
            scratch.push(cosmic);
            scratch.extend(staged_par);
        }
        for path in scratch.iter().filter(|p| p.exists()) {
            if let Err(e) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Could not remove dcr scratch file");
            }
        }

        result
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::frame::Header;
    use ndarray::Array2;
    use std::os::unix::fs::PermissionsExt;

    /// Stand-in for dcr that copies its input to its output.
    fn copying_dcr(dir: &Path) -> PathBuf {
        let path = dir.join("dcr");
        fs::write(&path, "#!/bin/sh\ncp \"$1\" \"$2\"\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn runs_in_a_relative_work_dir() {
        let bin = tempfile::tempdir().unwrap();
        let work = tempfile::Builder::new()
            .prefix("dcr_work")
            .tempdir_in(".")
            .unwrap();
        assert!(work.path().is_relative());

        let mut rejector = DcrRejector::new(None, false);
        rejector.executable = copying_dcr(bin.path());

        let data = Array2::from_shape_fn((4, 6), |(r, c)| (r * 6 + c) as f32);
        let frame = Frame::new(data.clone(), Header::new()).with_filename("sci.fits");
        let ctx = CosmicContext {
            work_dir: work.path(),
            prefix: "fzto_",
        };
        let cleaned = rejector.reject(&frame, &ctx).unwrap();

        assert_eq!(cleaned.data, data);
        assert_eq!(cleaned.filename, "sci.fits");
        assert!(cleaned
            .header
            .history()
            .iter()
            .any(|h| h.contains("dcr")));
        let leftovers = fs::read_dir(work.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn missing_executable_is_an_external_tool_error() {
        let work = tempfile::tempdir().unwrap();
        let mut rejector = DcrRejector::new(None, false);
        rejector.executable = work.path().join("no_such_dcr");

        let frame = Frame::new(Array2::zeros((2, 2)), Header::new()).with_filename("sci.fits");
        let ctx = CosmicContext {
            work_dir: work.path(),
            prefix: "zto_",
        };
        let err = rejector.reject(&frame, &ctx).unwrap_err();
        assert!(matches!(err, CcdError::ExternalTool(_)));
    }
}
