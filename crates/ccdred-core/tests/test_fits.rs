mod common;

use std::fs;
use std::path::Path;

use approx::assert_relative_eq;
use ndarray::Array2;

use ccdred_core::error::CcdError;
use ccdred_core::frame::HeaderValue;
use ccdred_core::io::{read_fits, write_fits, FitsReader, fits::FITS_BLOCK_SIZE};

use common::*;

fn card(text: &str) -> Vec<u8> {
    let mut c = text.as_bytes().to_vec();
    c.resize(80, b' ');
    c
}

/// Minimal 16-bit integer image with the usual unsigned offset.
fn write_int16_file(path: &Path, width: usize, height: usize, values: &[i16]) {
    let mut bytes = Vec::new();
    for text in [
        "SIMPLE  =                    T".to_string(),
        "BITPIX  =                   16".to_string(),
        "NAXIS   =                    2".to_string(),
        format!("NAXIS1  = {width:>20}"),
        format!("NAXIS2  = {height:>20}"),
        "BZERO   =                32768".to_string(),
        "BSCALE  =                    1".to_string(),
        "OBSTYPE = 'BIAS    '           / observation type".to_string(),
        "INSTCONF= 'Red     '".to_string(),
        "END".to_string(),
    ] {
        bytes.extend(card(&text));
    }
    bytes.resize(FITS_BLOCK_SIZE, b' ');
    for v in values {
        bytes.extend_from_slice(&v.to_be_bytes());
    }
    bytes.resize(2 * FITS_BLOCK_SIZE, 0);
    fs::write(path, bytes).unwrap();
}

#[test]
fn test_roundtrip_keeps_pixels_header_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zto_sci.fits");

    let data = Array2::from_shape_fn((SPEC_ROWS, 30), |(r, c)| r as f32 * 100.0 + c as f32 * 0.5);
    let mut f = frame("zto_sci.fits", data.clone(), header("OBJECT", SUNSET));
    f.header.set("EXPTIME", 300.0);
    f.header.set("SLIT", "0.45\" long slit");
    f.header.set("NOTE", "it's late");
    f.header.add_history("Trimmed to section [7:513,:]");
    f.header.add_history("Subtracted master master_bias.fits");

    write_fits(&f, &path).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len() as usize % FITS_BLOCK_SIZE, 0);

    let back = read_fits(&path).unwrap();
    assert_eq!(back.filename, "zto_sci.fits");
    assert_eq!(back.data, data);
    assert_eq!(back.header.get_string("OBSTYPE").as_deref(), Some("OBJECT"));
    assert_eq!(back.header.get_string("SLIT").as_deref(), Some("0.45\" long slit"));
    assert_eq!(back.header.get_string("NOTE").as_deref(), Some("it's late"));
    assert_relative_eq!(back.header.get_f64("EXPTIME").unwrap(), 300.0);
    assert_relative_eq!(back.header.get_f64("GRT_TARG").unwrap(), 5.8);
    assert_eq!(
        back.header.history(),
        &[
            "Trimmed to section [7:513,:]".to_string(),
            "Subtracted master master_bias.fits".to_string(),
        ]
    );
}

#[test]
fn test_long_history_spans_cards() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("long.fits");
    let mut f = frame("long.fits", filled(2, 2, 1.0), header("BIAS", SUNSET));
    f.header.add_history("x".repeat(100));
    write_fits(&f, &path).unwrap();

    let back = read_fits(&path).unwrap();
    let joined: String = back.header.history().concat();
    assert_eq!(joined, "x".repeat(100));
}

#[test]
fn test_integer_image_applies_bzero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("raw.fits");
    write_int16_file(&path, 3, 2, &[-32768, -32767, 0, 100, -1, 32767]);

    let reader = FitsReader::open(&path).unwrap();
    assert_eq!(reader.layout.bitpix, 16);
    assert_eq!((reader.layout.width, reader.layout.height), (3, 2));
    assert_eq!(reader.layout.data_offset, FITS_BLOCK_SIZE);

    let f = read_fits(&path).unwrap();
    assert_eq!(f.shape(), (2, 3));
    assert_relative_eq!(f.data[[0, 0]], 0.0);
    assert_relative_eq!(f.data[[0, 1]], 1.0);
    assert_relative_eq!(f.data[[0, 2]], 32768.0);
    assert_relative_eq!(f.data[[1, 0]], 32868.0);
    assert_relative_eq!(f.data[[1, 2]], 65535.0);
    assert_eq!(f.header.get("OBSTYPE"), Some(&HeaderValue::Str("BIAS".into())));
    assert_eq!(f.header.get_string("INSTCONF").as_deref(), Some("Red"));
    // Structural keywords stay out of the header map.
    assert!(f.header.get("BZERO").is_none());
    assert!(f.header.get("NAXIS1").is_none());
}

#[test]
fn test_not_a_fits_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.fits");
    fs::write(&path, vec![b'a'; FITS_BLOCK_SIZE]).unwrap();
    assert!(matches!(read_fits(&path), Err(CcdError::InvalidFits(_))));
}

#[test]
fn test_truncated_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.fits");
    write_int16_file(&path, 3, 2, &[0; 6]);
    let mut bytes = fs::read(&path).unwrap();
    bytes.truncate(FITS_BLOCK_SIZE + 4);
    fs::write(&path, bytes).unwrap();

    assert!(matches!(read_fits(&path), Err(CcdError::InvalidFits(_))));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_fits(&dir.path().join("nope.fits")).unwrap_err();
    assert!(matches!(err, CcdError::Io(_)));
}
