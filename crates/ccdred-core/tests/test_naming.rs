mod common;

use chrono::NaiveDateTime;

use ccdred_core::frame::{parse_timestamp, Technique};
use ccdred_core::mode::GoodmanModeResolver;
use ccdred_core::naming::{
    grating_code, master_bias_name, slit_code, FlatCatalogNamer, FlatSetup, IlluminationContext,
    NameMode,
};

use common::*;

fn at(raw: &str) -> NaiveDateTime {
    parse_timestamp(raw).unwrap()
}

fn spec_setup() -> FlatSetup {
    FlatSetup {
        grating: "SYZY_400".into(),
        slit: "1.0\" long slit".into(),
        filter: "<NO FILTER>".into(),
        filter2: "<NO FILTER>".into(),
    }
}

#[test]
fn test_illumination_contexts() {
    let eph = ephemeris();
    assert_eq!(eph.classify(at("2017-03-14T22:00:00")), IlluminationContext::Night);
    assert_eq!(eph.classify(at("2017-03-14T20:15:00")), IlluminationContext::Sky);
    assert_eq!(eph.classify(at("2017-03-15T05:45:00")), IlluminationContext::Sky);
    assert_eq!(eph.classify(at("2017-03-14T19:00:00")), IlluminationContext::Dome);
    assert_eq!(eph.classify(at("2017-03-15T07:00:00")), IlluminationContext::Dome);
}

#[test]
fn test_boundary_instant_is_other() {
    let eph = ephemeris();
    assert_eq!(eph.classify(at(EVENING_TWILIGHT)), IlluminationContext::Other);
    assert_eq!(eph.classify(at(SUNSET)), IlluminationContext::Other);
}

#[test]
fn test_spectroscopy_key_layout() {
    let eph = ephemeris();
    let namer = FlatCatalogNamer::new(Technique::Spectroscopy, &eph, &GoodmanModeResolver);
    let h = header("FLAT", "2017-03-14T19:00:00");

    let key = namer.name_for(&h, &spec_setup(), "", NameMode::Create).unwrap();
    assert_eq!(key.as_str(), "master_flat_400_m1_1.0_dome.fits");

    let key = namer
        .name_for(&h, &spec_setup(), "NGC2070", NameMode::Create)
        .unwrap();
    assert_eq!(key.as_str(), "master_flat_NGC2070_400_m1_1.0_dome.fits");
}

#[test]
fn test_no_grating_and_second_filter() {
    let eph = ephemeris();
    let namer = FlatCatalogNamer::new(Technique::Spectroscopy, &eph, &GoodmanModeResolver);
    let h = header("FLAT", "2017-03-14T22:00:00");
    let setup = FlatSetup {
        grating: "<NO GRATING>".into(),
        filter2: "GG455".into(),
        ..spec_setup()
    };
    let key = namer.name_for(&h, &setup, "", NameMode::Create).unwrap();
    assert_eq!(key.as_str(), "master_flat_no_grating_GG455_1.0_night.fits");
}

#[test]
fn test_key_is_deterministic_and_ignores_unused_fields() {
    let eph = ephemeris();
    let namer = FlatCatalogNamer::new(Technique::Spectroscopy, &eph, &GoodmanModeResolver);
    let h = header("FLAT", "2017-03-14T20:15:00");

    let a = namer.name_for(&h, &spec_setup(), "", NameMode::Create).unwrap();
    let b = namer.name_for(&h, &spec_setup(), "", NameMode::Create).unwrap();
    assert_eq!(a, b);

    // FILTER is not part of a spectroscopic key.
    let other_filter = FlatSetup {
        filter: "r-SDSS".into(),
        ..spec_setup()
    };
    let c = namer.name_for(&h, &other_filter, "", NameMode::Create).unwrap();
    assert_eq!(a, c);

    let other_grating = FlatSetup {
        grating: "SYZY_930".into(),
        ..spec_setup()
    };
    let d = namer.name_for(&h, &other_grating, "", NameMode::Create).unwrap();
    assert_ne!(a, d);
}

#[test]
fn test_lookup_key_matches_created_name() {
    let eph = ephemeris();
    let namer = FlatCatalogNamer::new(Technique::Spectroscopy, &eph, &GoodmanModeResolver);
    let flat = header("FLAT", "2017-03-14T20:15:00");
    let science = header("OBJECT", "2017-03-14T23:40:00");

    let created = namer.name_for(&flat, &spec_setup(), "", NameMode::Create).unwrap();
    let lookup = namer.name_for(&science, &spec_setup(), "", NameMode::Lookup).unwrap();
    assert!(lookup.is_wildcard());
    assert_eq!(lookup.as_str(), "master_flat_400_m1_1.0*.fits");
    assert!(lookup.matches(created.as_str()));
    assert!(!lookup.matches("norm_master_flat_400_m1_1.0_sky.fits"));
}

#[test]
fn test_imaging_key() {
    let eph = ephemeris();
    let namer = FlatCatalogNamer::new(Technique::Imaging, &eph, &GoodmanModeResolver);
    let h = header("FLAT", "2017-03-14T20:15:00");
    let setup = FlatSetup {
        filter: "g-SDSS".into(),
        ..FlatSetup::default()
    };
    let key = namer.name_for(&h, &setup, "ignored", NameMode::Create).unwrap();
    assert_eq!(key.as_str(), "master_flat_g_SDSS_sky.fits");
    assert_eq!(key.normalized(), "norm_master_flat_g_SDSS_sky.fits");
}

#[test]
fn test_create_needs_date_obs() {
    let eph = ephemeris();
    let namer = FlatCatalogNamer::new(Technique::Imaging, &eph, &GoodmanModeResolver);
    let mut h = header("FLAT", "2017-03-14T20:15:00");
    h.remove("DATE-OBS");
    assert!(namer
        .name_for(&h, &FlatSetup::default(), "", NameMode::Create)
        .is_err());
    assert!(namer
        .name_for(&h, &FlatSetup::default(), "", NameMode::Lookup)
        .is_ok());
}

#[test]
fn test_codes() {
    assert_eq!(grating_code("SYZY_400"), "400");
    assert_eq!(grating_code("KOSI_600"), "600");
    assert_eq!(slit_code("0.45\" long slit"), "0.45");
}

#[test]
fn test_master_bias_names() {
    assert_eq!(master_bias_name(0), "master_bias.fits");
    assert_eq!(master_bias_name(1), "master_bias_2.fits");
    assert_eq!(master_bias_name(2), "master_bias_3.fits");
}

#[test]
fn test_setup_from_header() {
    let mut h = header("FLAT", SUNSET);
    h.remove("FILTER2");
    let setup = FlatSetup::from_header(&h);
    assert_eq!(setup, spec_setup());
}
