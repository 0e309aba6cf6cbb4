//! Axial point-spread function model.
//!
//! Astigmatic 3D imaging stretches the PSF along x or y depending on how far
//! the emitter sits from the focal plane. The widths are described by a
//! 6th-degree polynomial calibration in z.

use serde::{Deserialize, Serialize};

/// Polynomial z calibration of the PSF widths.
///
/// Coefficients are ordered from degree 6 down to the constant term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZCalibration {
    /// Coefficients for the x width
    pub cx: [f64; 7],
    /// Coefficients for the y width
    pub cy: [f64; 7],
    /// Correction for the refractive-index mismatch between sample and immersion
    pub magfac: f64,
}

impl Default for ZCalibration {
    fn default() -> Self {
        Self {
            cx: [
                3.1638306844743706e-17,
                -2.2103661248660896e-14,
                -9.775815406044296e-12,
                8.2178622893072e-09,
                4.91181990105529e-06,
                -0.0028759382006135654,
                1.1756537760039398,
            ],
            cy: [
                1.710907877866197e-17,
                -2.4986657766862576e-15,
                -8.405284979510355e-12,
                1.1548322314075128e-11,
                5.4270591055277476e-06,
                0.0018155881468011011,
                1.011468185618154,
            ],
            magfac: 0.76,
        }
    }
}

/// Evaluate `c[0]*z^6 + ... + c[6]` keeping the power-sum order.
fn polyval(c: &[f64; 7], z: f64) -> f64 {
    let z2 = z * z;
    let z3 = z * z2;
    let z4 = z * z3;
    let z5 = z * z4;
    let z6 = z * z5;
    c[0] * z6 + c[1] * z5 + c[2] * z4 + c[3] * z3 + c[4] * z2 + c[5] * z + c[6]
}

/// PSF widths `(wx, wy)` for an emitter at axial offset `z` (nm).
pub fn calculate_zpsf(z: f64, calibration: &ZCalibration) -> (f64, f64) {
    let z = z / calibration.magfac;
    (polyval(&calibration.cx, z), polyval(&calibration.cy, z))
}

/// Axis-aligned Gaussian sampling widths for one emitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsfWidths {
    pub sigma_x: f64,
    pub sigma_y: f64,
}

impl PsfWidths {
    pub fn isotropic(psf: f64) -> Self {
        Self {
            sigma_x: psf,
            sigma_y: psf,
        }
    }

    /// Widths at depth `z`, i.e. covariance `diag(wx², wy²)`.
    pub fn at_depth(z: f64, calibration: &ZCalibration) -> Self {
        let (wx, wy) = calculate_zpsf(z, calibration);
        // Only the variance enters the sampler, so the sign of w is irrelevant.
        Self {
            sigma_x: wx.abs(),
            sigma_y: wy.abs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_depth_gives_constant_terms() {
        let cal = ZCalibration::default();
        let (wx, wy) = calculate_zpsf(0.0, &cal);
        assert_eq!(wx, cal.cx[6]);
        assert_eq!(wy, cal.cy[6]);
    }

    #[test]
    fn test_magnification_scales_depth() {
        let cal = ZCalibration {
            cx: [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            cy: [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            magfac: 0.5,
        };
        let (wx, wy) = calculate_zpsf(10.0, &cal);
        assert_relative_eq!(wx, 20.0, epsilon = 1e-12);
        assert_relative_eq!(wy, 400.0, epsilon = 1e-9);
    }

    #[test]
    fn test_default_calibration_is_astigmatic() {
        let cal = ZCalibration::default();
        let (wx_above, wy_above) = calculate_zpsf(200.0, &cal);
        let (wx_below, wy_below) = calculate_zpsf(-200.0, &cal);
        // Focus moves in opposite directions for x and y.
        assert!(wx_above < wx_below);
        assert!(wy_above > wy_below);
    }

    #[test]
    fn test_widths_are_nonnegative() {
        let cal = ZCalibration {
            cx: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -1.5],
            cy: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0],
            magfac: 1.0,
        };
        let widths = PsfWidths::at_depth(50.0, &cal);
        assert_eq!(widths.sigma_x, 1.5);
        assert_eq!(widths.sigma_y, 2.0);
        assert_eq!(PsfWidths::isotropic(0.8).sigma_y, 0.8);
    }
}
