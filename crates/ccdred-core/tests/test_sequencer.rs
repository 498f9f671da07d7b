mod common;

use approx::assert_relative_eq;
use ndarray::Array2;

use ccdred_core::cosmic::{CosmicContext, CosmicRayRejector, LaplacianRejector};
use ccdred_core::error::{CcdError, Result};
use ccdred_core::frame::{Frame, Instrument, Technique};
use ccdred_core::pipeline::{FrameReductionSequencer, MemoryStore, ReductionStep};
use ccdred_core::region::{NightRegions, Region};

use common::*;

const TRIMMED: (usize, usize) = (SPEC_ROWS, 507);

/// Overscan columns at 1000 ADU, the rest of the chip at 1500 ADU.
fn science() -> Frame {
    let data = Array2::from_shape_fn((SPEC_ROWS, SPEC_COLS), |(_, c)| {
        if c < 6 {
            1000.0
        } else {
            1500.0
        }
    });
    let mut h = header("OBJECT", "2017-03-14T23:00:00");
    h.set("OBJECT", "NGC2070");
    frame("sci.fits", data, h)
}

fn spec_regions() -> NightRegions {
    NightRegions::resolve(Technique::Spectroscopy, Instrument::Red, Some(&science())).unwrap()
}

fn master(name: &str, shape: (usize, usize), value: f32) -> Frame {
    frame(name, Array2::from_elem(shape, value), header("BIAS", SUNSET))
}

struct FailingRejector;

impl CosmicRayRejector for FailingRejector {
    fn name(&self) -> &'static str {
        "dcr"
    }

    fn reject(&self, _frame: &Frame, _ctx: &CosmicContext<'_>) -> Result<Frame> {
        Err(CcdError::ExternalTool("dcr not installed".into()))
    }
}

#[test]
fn test_full_chain_prefix() {
    let regions = spec_regions();
    assert_eq!(regions.trim, Region::columns(7, 513));
    let store = MemoryStore::new();
    let bias = master("master_bias.fits", TRIMMED, 20.0);
    let flat = master("norm_master_flat.fits", TRIMMED, 2.0);

    let report = FrameReductionSequencer::new(Technique::Spectroscopy, &regions, &store)
        .with_master_bias(Some(&bias), true)
        .with_flat(Some(&flat), true)
        .process(&science())
        .unwrap();

    assert_eq!(report.prefix, "fzto_");
    assert_eq!(report.output.as_deref(), Some("fzto_sci.fits"));
    assert_eq!(
        report.applied,
        vec![
            ReductionStep::Overscan,
            ReductionStep::Trim,
            ReductionStep::Bias,
            ReductionStep::Flat
        ]
    );
    assert!(report.notes.is_empty());

    let out = store.product("fzto_sci.fits").unwrap();
    assert_eq!(out.shape(), TRIMMED);
    // (1500 - 1000 - 20) / 2
    assert_relative_eq!(out.data[[3, 100]], 240.0);
    assert_eq!(out.header.history().len(), 4);
}

#[test]
fn test_slit_trim_prefix() {
    let regions = spec_regions();
    let store = MemoryStore::new();
    let section = Region::rows(2, 6);
    let bias = master("master_bias.fits", (5, 507), 0.0);
    let flat = master("norm_master_flat.fits", (5, 507), 1.0);

    let report = FrameReductionSequencer::new(Technique::Spectroscopy, &regions, &store)
        .with_slit_trim(Some(section))
        .with_master_bias(Some(&bias), true)
        .with_flat(Some(&flat), true)
        .process(&science())
        .unwrap();

    assert_eq!(report.prefix, "fzsto_");
    assert_eq!(store.product("fzsto_sci.fits").unwrap().shape(), (5, 507));
}

#[test]
fn test_missing_bias_is_skipped_with_warning() {
    let regions = spec_regions();
    let store = MemoryStore::new();
    let flat = master("norm_master_flat.fits", TRIMMED, 1.0);

    let report = FrameReductionSequencer::new(Technique::Spectroscopy, &regions, &store)
        .with_master_bias(None, true)
        .with_flat(Some(&flat), true)
        .process(&science())
        .unwrap();

    assert_eq!(report.prefix, "fto_");
    assert_eq!(report.notes.len(), 1);
    assert!(report.notes[0].contains("master bias"));
}

#[test]
fn test_disabled_steps_keep_order() {
    let regions = spec_regions();
    let store = MemoryStore::new();
    let bias = master("master_bias.fits", TRIMMED, 20.0);

    let report = FrameReductionSequencer::new(Technique::Spectroscopy, &regions, &store)
        .with_master_bias(Some(&bias), true)
        .with_flat(None, false)
        .process(&science())
        .unwrap();

    assert_eq!(report.prefix, "zto_");
    assert!(report.notes[0].contains("disabled"));
}

#[test]
fn test_intermediate_products() {
    let regions = spec_regions();
    let store = MemoryStore::new();
    let bias = master("master_bias.fits", TRIMMED, 20.0);
    let flat = master("norm_master_flat.fits", TRIMMED, 2.0);

    FrameReductionSequencer::new(Technique::Spectroscopy, &regions, &store)
        .with_master_bias(Some(&bias), true)
        .with_flat(Some(&flat), true)
        .save_intermediate(true)
        .process(&science())
        .unwrap();

    for name in ["o_sci.fits", "to_sci.fits", "zto_sci.fits", "fzto_sci.fits"] {
        assert!(store.product(name).is_some(), "missing {name}");
    }
    assert_eq!(store.product("o_sci.fits").unwrap().shape(), (SPEC_ROWS, SPEC_COLS));
}

#[test]
fn test_imaging_prefix() {
    let sample = imaging_frame("img.fits", "OBJECT", "g-SDSS", 300.0);
    let regions = NightRegions::resolve(Technique::Imaging, Instrument::Blue, Some(&sample)).unwrap();
    let store = MemoryStore::new();
    let bias = master("master_bias.fits", (10, 8), 100.0);
    let flat = master("norm_master_flat_g_SDSS_sky.fits", (10, 8), 0.5);

    let report = FrameReductionSequencer::new(Technique::Imaging, &regions, &store)
        .with_master_bias(Some(&bias), true)
        .with_flat(Some(&flat), true)
        .process(&sample)
        .unwrap();

    assert_eq!(report.prefix, "fzt_");
    assert_relative_eq!(store.product("fzt_img.fits").unwrap().data[[0, 0]], 400.0);
}

#[test]
fn test_in_process_cosmic_rejection_adds_prefix() {
    let regions = spec_regions();
    let store = MemoryStore::new();
    let bias = master("master_bias.fits", TRIMMED, 0.0);
    let flat = master("norm_master_flat.fits", TRIMMED, 1.0);
    let mut raw = science();
    raw.data[[4, 200]] = 60_000.0;
    let rejector = LaplacianRejector::default();

    let report = FrameReductionSequencer::new(Technique::Spectroscopy, &regions, &store)
        .with_master_bias(Some(&bias), true)
        .with_flat(Some(&flat), true)
        .with_rejector(Some(&rejector))
        .process(&raw)
        .unwrap();

    assert_eq!(report.prefix, "cfzto_");
    let out = store.product("cfzto_sci.fits").unwrap();
    // Column 200 of the raw frame is column 194 after trimming.
    assert!(out.data[[4, 194]] < 1000.0);
}

#[test]
fn test_failed_external_tool_passes_frame_through() {
    let regions = spec_regions();
    let store = MemoryStore::new();
    let bias = master("master_bias.fits", TRIMMED, 0.0);
    let flat = master("norm_master_flat.fits", TRIMMED, 1.0);
    let rejector = FailingRejector;

    let report = FrameReductionSequencer::new(Technique::Spectroscopy, &regions, &store)
        .with_master_bias(Some(&bias), true)
        .with_flat(Some(&flat), true)
        .with_rejector(Some(&rejector))
        .process(&science())
        .unwrap();

    assert_eq!(report.prefix, "fzto_");
    assert!(report.notes[0].contains("dcr"));
    assert!(store.product("fzto_sci.fits").is_some());
}

#[test]
fn test_mismatched_master_is_an_error() {
    let regions = spec_regions();
    let store = MemoryStore::new();
    let bias = master("master_bias.fits", (4, 4), 0.0);

    let err = FrameReductionSequencer::new(Technique::Spectroscopy, &regions, &store)
        .with_master_bias(Some(&bias), true)
        .process(&science())
        .unwrap_err();
    assert!(matches!(err, CcdError::ShapeMismatch { .. }));
}
