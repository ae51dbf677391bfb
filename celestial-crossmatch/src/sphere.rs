//! Positions on the celestial sphere and great-circle separations.
//!
//! Positions are ICRS right ascension and declination in degrees. Nearest
//! neighbour search works on unit vectors, where Euclidean chord length is a
//! monotonic function of angular separation, and reported separations use
//! the Vincenty formula, which stays accurate from 0° to 180°.

use std::f64::consts::PI;

const DEG_TO_RAD: f64 = PI / 180.0;
const RAD_TO_DEG: f64 = 180.0 / PI;

/// Arcseconds per degree.
pub const ARCSEC_PER_DEG: f64 = 3600.0;

/// A right ascension / declination pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPosition {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

impl SkyPosition {
    pub fn new(ra_deg: f64, dec_deg: f64) -> Self {
        Self { ra_deg, dec_deg }
    }

    pub fn is_finite(&self) -> bool {
        self.ra_deg.is_finite() && self.dec_deg.is_finite()
    }

    /// Cartesian unit vector `[x, y, z]`, with z toward the north pole.
    pub fn to_unit_vector(&self) -> [f64; 3] {
        let (sin_ra, cos_ra) = libm::sincos(self.ra_deg * DEG_TO_RAD);
        let (sin_dec, cos_dec) = libm::sincos(self.dec_deg * DEG_TO_RAD);
        [cos_dec * cos_ra, cos_dec * sin_ra, sin_dec]
    }

    /// Great-circle separation to `other`, in degrees.
    pub fn separation_deg(&self, other: &SkyPosition) -> f64 {
        angular_separation_deg(self.ra_deg, self.dec_deg, other.ra_deg, other.dec_deg)
    }
}

/// Great-circle distance between two points, in degrees.
///
/// Vincenty's formula: `atan2(|a × b|, a · b)` written in spherical terms.
pub fn angular_separation_deg(ra1_deg: f64, dec1_deg: f64, ra2_deg: f64, dec2_deg: f64) -> f64 {
    let (sin_dec1, cos_dec1) = libm::sincos(dec1_deg * DEG_TO_RAD);
    let (sin_dec2, cos_dec2) = libm::sincos(dec2_deg * DEG_TO_RAD);
    let (sin_dra, cos_dra) = libm::sincos((ra2_deg - ra1_deg) * DEG_TO_RAD);

    let num = libm::sqrt(
        (cos_dec2 * sin_dra).powi(2)
            + (cos_dec1 * sin_dec2 - sin_dec1 * cos_dec2 * cos_dra).powi(2),
    );
    let den = sin_dec1 * sin_dec2 + cos_dec1 * cos_dec2 * cos_dra;

    libm::atan2(num, den) * RAD_TO_DEG
}

/// Squared Euclidean distance between two unit vectors.
#[inline]
pub fn chord_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}
