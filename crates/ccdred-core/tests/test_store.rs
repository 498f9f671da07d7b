mod common;

use std::fs;

use approx::assert_relative_eq;

use ccdred_core::error::CcdError;
use ccdred_core::frame::Technique;
use ccdred_core::mode::GoodmanModeResolver;
use ccdred_core::naming::{FlatCatalogNamer, FlatKey, FlatSetup, NameMode};
use ccdred_core::pipeline::store::existing_master_biases;
use ccdred_core::pipeline::{find_best_flat, DirectoryStore, FrameStore, MemoryStore};

use common::*;

fn lookup_key() -> FlatKey {
    let eph = ephemeris();
    let namer = FlatCatalogNamer::new(Technique::Spectroscopy, &eph, &GoodmanModeResolver);
    let setup = FlatSetup {
        grating: "SYZY_400".into(),
        slit: "1.0\" long slit".into(),
        ..FlatSetup::default()
    };
    namer
        .name_for(&header("OBJECT", "2017-03-14T23:00:00"), &setup, "", NameMode::Lookup)
        .unwrap()
}

fn master_flat(level: f32) -> ccdred_core::frame::Frame {
    frame("m.fits", filled(4, 6, level), header("FLAT", SUNSET))
}

#[test]
fn test_prepare_creates_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let red = dir.path().join("RED");
    let store = DirectoryStore::new(dir.path(), &red);
    store.prepare(false).unwrap();
    assert!(red.is_dir());
}

#[test]
fn test_prepare_refuses_non_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    let red = dir.path().join("RED");
    fs::create_dir(&red).unwrap();
    fs::write(red.join("old.fits"), b"stale").unwrap();
    fs::create_dir(red.join("scratch")).unwrap();

    let store = DirectoryStore::new(dir.path(), &red);
    let err = store.prepare(false).unwrap_err();
    assert!(matches!(err, CcdError::Configuration(_)));
    assert!(red.join("old.fits").exists());

    store.prepare(true).unwrap();
    assert_eq!(fs::read_dir(&red).unwrap().count(), 0);
}

#[test]
fn test_directory_store_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryStore::new(dir.path(), dir.path().join("RED"));
    store.prepare(false).unwrap();

    let bias = frame("bias.fits", filled(3, 4, 12.5), header("BIAS", SUNSET));
    store.save(&bias, "master_bias.fits").unwrap();
    store.save(&bias, "master_bias_2.fits").unwrap();
    store.save(&bias, "fzto_sci.fits").unwrap();

    assert_eq!(
        store.reduced_names().unwrap(),
        vec!["fzto_sci.fits", "master_bias.fits", "master_bias_2.fits"]
    );
    assert_eq!(existing_master_biases(&store).unwrap(), 2);

    let back = store.load_reduced("master_bias.fits").unwrap();
    assert_eq!(back.filename, "master_bias.fits");
    assert_relative_eq!(back.data[[2, 3]], 12.5);

    // Raw frames are read from the raw directory.
    ccdred_core::io::write_fits(&bias, &dir.path().join("0001_bias.fits")).unwrap();
    assert_eq!(store.load_raw("0001_bias.fits").unwrap().shape(), (3, 4));
}

#[test]
fn test_best_flat_has_highest_median() {
    let store = MemoryStore::new();
    store.save(&master_flat(18_000.0), "master_flat_400_m1_1.0_dome.fits").unwrap();
    store.save(&master_flat(25_000.0), "master_flat_400_m1_1.0_sky.fits").unwrap();
    store.save(&master_flat(40_000.0), "norm_master_flat_400_m1_1.0_night.fits").unwrap();
    store.save(&master_flat(50_000.0), "master_flat_930_m2_1.0_sky.fits").unwrap();

    let best = find_best_flat(&store, &lookup_key()).unwrap();
    assert_eq!(best.filename, "master_flat_400_m1_1.0_sky.fits");
}

#[test]
fn test_no_matching_flat_is_compatibility_error() {
    let store = MemoryStore::new();
    store.save(&master_flat(50_000.0), "master_flat_930_m2_1.0_sky.fits").unwrap();
    let err = find_best_flat(&store, &lookup_key()).unwrap_err();
    assert!(matches!(err, CcdError::Compatibility(_)));
}

#[test]
fn test_memory_store_missing_frames() {
    let mut store = MemoryStore::new();
    assert!(matches!(store.load_raw("x.fits"), Err(CcdError::Io(_))));
    store.insert_raw(master_flat(1.0));
    assert!(store.load_raw("m.fits").is_ok());
    assert!(store.load_reduced("m.fits").is_err());
    assert_eq!(existing_master_biases(&store).unwrap(), 0);
}
