#![allow(dead_code)]

use ndarray::Array2;

use ccdred_core::frame::{Frame, Header};
use ccdred_core::naming::NightEphemeris;
use ccdred_core::pipeline::{CalibrationGroup, FrameRecord, NightManifest};
use ccdred_core::pipeline::manifest::EphemerisRecord;

pub const SUNSET: &str = "2017-03-14T20:00:00";
pub const EVENING_TWILIGHT: &str = "2017-03-14T20:30:00";
pub const MORNING_TWILIGHT: &str = "2017-03-15T05:30:00";
pub const SUNRISE: &str = "2017-03-15T06:00:00";

/// Spectroscopic test geometry: 8x binned along the dispersion axis keeps
/// frames small while the fixed trim and overscan limits still apply.
pub const SPEC_ROWS: usize = 8;
pub const SPEC_COLS: usize = 520;
pub const SPEC_CCDSUM: &str = "8 1";

pub fn ephemeris() -> NightEphemeris {
    NightEphemeris::parse(SUNSET, EVENING_TWILIGHT, MORNING_TWILIGHT, SUNRISE).unwrap()
}

pub fn ephemeris_record() -> EphemerisRecord {
    EphemerisRecord {
        sunset: SUNSET.into(),
        evening_twilight: EVENING_TWILIGHT.into(),
        morning_twilight: MORNING_TWILIGHT.into(),
        sunrise: SUNRISE.into(),
    }
}

/// Header with the keys every reduction decision reads.
pub fn header(obstype: &str, date_obs: &str) -> Header {
    let mut h = Header::new();
    h.set("OBSTYPE", obstype);
    h.set("DATE-OBS", date_obs);
    h.set("CCDSUM", SPEC_CCDSUM);
    h.set("OBJECT", "");
    h.set("GRATING", "SYZY_400");
    h.set("SLIT", "1.0\" long slit");
    h.set("FILTER", "<NO FILTER>");
    h.set("FILTER2", "<NO FILTER>");
    h.set("CAM_TARG", 11.6);
    h.set("GRT_TARG", 5.8);
    h
}

pub fn filled(rows: usize, cols: usize, value: f32) -> Array2<f32> {
    Array2::from_elem((rows, cols), value)
}

pub fn frame(name: &str, data: Array2<f32>, header: Header) -> Frame {
    Frame::new(data, header).with_filename(name)
}

/// Spectroscopic raw frame with a constant level.
pub fn spec_frame(name: &str, obstype: &str, date_obs: &str, value: f32) -> Frame {
    frame(
        name,
        filled(SPEC_ROWS, SPEC_COLS, value),
        header(obstype, date_obs),
    )
}

/// Imaging raw frame with a TRIMSEC keeping columns 2..=9 of a 10x10 array.
pub fn imaging_frame(name: &str, obstype: &str, filter: &str, value: f32) -> Frame {
    let mut h = header(obstype, "2017-03-14T19:00:00");
    h.set("CCDSUM", "1 1");
    h.set("FILTER", filter);
    h.set("TRIMSEC", "[2:9,1:10]");
    frame(name, filled(10, 10, value), h)
}

pub fn record(file: &str, obstype: &str) -> FrameRecord {
    let mut r = FrameRecord::new(file, obstype.into());
    r.grating = "SYZY_400".into();
    r.slit = "1.0\" long slit".into();
    r
}

pub fn manifest(instrument: &str, technique: &str, groups: Vec<Vec<FrameRecord>>) -> NightManifest {
    NightManifest {
        instrument: instrument.into(),
        technique: technique.into(),
        ephemeris: ephemeris_record(),
        groups: groups.into_iter().map(CalibrationGroup::new).collect(),
    }
}

pub fn mean(data: &Array2<f32>) -> f64 {
    data.iter().map(|&v| v as f64).sum::<f64>() / data.len() as f64
}
