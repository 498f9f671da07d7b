mod common;

use ccdred_core::error::CcdError;
use ccdred_core::frame::{Instrument, Technique};
use ccdred_core::region::{resolve_overscan, resolve_trim, NightRegions, Region};

use common::*;

#[test]
fn test_spectroscopy_trim_unbinned() {
    let mut f = spec_frame("a.fits", "OBJECT", SUNSET, 1.0);
    f.header.set("CCDSUM", "1 1");
    let trim = resolve_trim(Technique::Spectroscopy, Instrument::Red, Some(&f)).unwrap();
    assert_eq!(trim, Region::columns(51, 4110));
    assert_eq!(trim.to_string(), "[51:4110,:]");
}

#[test]
fn test_spectroscopy_trim_scales_with_serial_binning() {
    let mut f = spec_frame("a.fits", "OBJECT", SUNSET, 1.0);
    f.header.set("CCDSUM", "2 2");
    let trim = resolve_trim(Technique::Spectroscopy, Instrument::Blue, Some(&f)).unwrap();
    // ceil(51/2) = 26, floor(4110/2) = 2055
    assert_eq!(trim, Region::columns(26, 2055));
}

#[test]
fn test_overscan_per_instrument() {
    let mut f = spec_frame("a.fits", "OBJECT", SUNSET, 1.0);
    f.header.set("CCDSUM", "2 2");

    let red = resolve_overscan(Technique::Spectroscopy, Instrument::Red, Some(&f))
        .unwrap()
        .unwrap();
    assert_eq!(red, Region::new(Some((3, 24)), Some((1, SPEC_ROWS))));

    let blue = resolve_overscan(Technique::Spectroscopy, Instrument::Blue, Some(&f))
        .unwrap()
        .unwrap();
    assert_eq!(blue, Region::new(Some((1, 8)), Some((1, SPEC_ROWS))));
}

#[test]
fn test_imaging_uses_trimsec_and_has_no_overscan() {
    let f = imaging_frame("i.fits", "OBJECT", "g-SDSS", 1.0);
    let regions = NightRegions::resolve(Technique::Imaging, Instrument::Blue, Some(&f)).unwrap();
    assert_eq!(regions.trim, Region::new(Some((2, 9)), Some((1, 10))));
    assert!(regions.overscan.is_none());
}

#[test]
fn test_imaging_without_trimsec_is_configuration_error() {
    let mut f = imaging_frame("i.fits", "OBJECT", "g-SDSS", 1.0);
    f.header.remove("TRIMSEC");
    let err = resolve_trim(Technique::Imaging, Instrument::Red, Some(&f)).unwrap_err();
    assert!(matches!(err, CcdError::Configuration(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_no_sample_frame_is_configuration_error() {
    let err = NightRegions::resolve(Technique::Spectroscopy, Instrument::Red, None).unwrap_err();
    assert!(matches!(err, CcdError::Configuration(_)));
}

#[test]
fn test_unknown_technique_is_configuration_error() {
    let err = "polarimetry".parse::<Technique>().unwrap_err();
    assert!(matches!(err, CcdError::Configuration(_)));
}

#[test]
fn test_section_parsing() {
    let r: Region = "[10:20,5:7]".parse().unwrap();
    assert_eq!(r, Region::new(Some((10, 20)), Some((5, 7))));
    let (rows, cols) = r.to_ranges((10, 30)).unwrap();
    assert_eq!(rows, 4..7);
    assert_eq!(cols, 9..20);

    let full: Region = "[*,:]".parse().unwrap();
    assert_eq!(full, Region::new(None, None));

    assert!("10:20,5:7".parse::<Region>().is_err());
    assert!("[20:10,:]".parse::<Region>().is_err());
}

#[test]
fn test_section_outside_image() {
    let r = Region::columns(1, 40);
    let err = r.to_ranges((10, 30)).unwrap_err();
    assert!(matches!(err, CcdError::InvalidSection(_)));
}
