use tracing::warn;

use crate::frame::Header;

/// Maps a spectrograph setup to the short wavelength-mode code used in
/// master flat names (`_m1`, `_600nm`, ...).
pub trait ModeResolver: Send + Sync {
    /// `grating` is the raw GRATING keyword, angles are in degrees.
    fn mode_code(&self, grating: &str, camera_angle: f64, grating_angle: f64) -> Option<String>;

    /// Resolve from a frame header (`GRATING`, `CAM_TARG`, `GRT_TARG`).
    fn code_for_header(&self, header: &Header) -> String {
        let grating = header.get_string("GRATING").unwrap_or_default();
        match (header.get_f64("CAM_TARG"), header.get_f64("GRT_TARG")) {
            (Some(cam), Some(grt)) => self.mode_code(&grating, cam, grt).unwrap_or_default(),
            _ => {
                warn!(grating = %grating, "CAM_TARG/GRT_TARG missing, flat name gets no mode code");
                String::new()
            }
        }
    }
}

/// A named preset: grating ruling, camera and grating angles.
#[derive(Clone, Copy, Debug)]
struct NamedMode {
    lines_per_mm: u32,
    camera_angle: f64,
    grating_angle: f64,
    code: &'static str,
}

const NAMED_MODES: &[NamedMode] = &[
    NamedMode {
        lines_per_mm: 400,
        camera_angle: 11.6,
        grating_angle: 5.8,
        code: "m1",
    },
    NamedMode {
        lines_per_mm: 400,
        camera_angle: 16.1,
        grating_angle: 7.5,
        code: "m2",
    },
];

/// Angle tolerance when matching a named preset, degrees.
const ANGLE_TOLERANCE: f64 = 0.5;

/// Default resolver: named presets for the 400 l/mm grating, central
/// wavelength from the grating equation for everything else.
#[derive(Clone, Copy, Debug, Default)]
pub struct GoodmanModeResolver;

impl GoodmanModeResolver {
    /// Central wavelength in nm: `1e6/N * (sin(alpha) + sin(beta))` with
    /// `alpha` the grating angle and `beta = camera - alpha`.
    pub fn central_wavelength(lines_per_mm: u32, camera_angle: f64, grating_angle: f64) -> f64 {
        let alpha = grating_angle.to_radians();
        let beta = (camera_angle - grating_angle).to_radians();
        1e6 / lines_per_mm as f64 * (alpha.sin() + beta.sin())
    }
}

impl ModeResolver for GoodmanModeResolver {
    fn mode_code(&self, grating: &str, camera_angle: f64, grating_angle: f64) -> Option<String> {
        let lines_per_mm = grating_ruling(grating)?;
        let named = NAMED_MODES.iter().find(|m| {
            m.lines_per_mm == lines_per_mm
                && (m.camera_angle - camera_angle).abs() <= ANGLE_TOLERANCE
                && (m.grating_angle - grating_angle).abs() <= ANGLE_TOLERANCE
        });
        match named {
            Some(mode) => Some(format!("_{}", mode.code)),
            None => {
                let wavelength =
                    Self::central_wavelength(lines_per_mm, camera_angle, grating_angle);
                Some(format!("_{:.0}nm", wavelength))
            }
        }
    }
}

/// Ruling in lines/mm, taken from the digits of the grating identifier.
fn grating_ruling(grating: &str) -> Option<u32> {
    let digits: String = grating.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok().filter(|&n| n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_mode_matches_within_tolerance() {
        let code = GoodmanModeResolver.mode_code("SYZY_400", 16.0, 7.4);
        assert_eq!(code.as_deref(), Some("_m2"));
    }

    #[test]
    fn unnamed_mode_uses_central_wavelength() {
        let code = GoodmanModeResolver.mode_code("930_Grating", 24.0, 12.0).unwrap();
        let expected = GoodmanModeResolver::central_wavelength(930, 24.0, 12.0);
        assert_eq!(code, format!("_{:.0}nm", expected));
    }

    #[test]
    fn grating_without_digits_has_no_mode() {
        assert!(GoodmanModeResolver.mode_code("MIRROR", 0.0, 0.0).is_none());
    }
}
