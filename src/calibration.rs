//! Five-point touchscreen calibration
//!
//! Raw sensor coordinates are mapped to screen coordinates with an affine
//! transform fitted by least squares over five reference points, followed by
//! an optional axis swap and a rotation of the target screen.
//!
//! The fit runs in `f32`, but the resulting coefficients are fixed point
//! integers and [Calibration::apply] uses integer arithmetic only, so a stored
//! calibration always maps the same raw input to the same output.

/// Number of reference points used by the fit
pub const CALIBRATION_POINTS: usize = 5;

/// Number of values in a set of [Coefficients]
pub const COEFFICIENT_COUNT: usize = 7;

/// Fixed point scale used by [Calibration::perform]
pub const DEFAULT_SCALE: i32 = 65536;

/// Fits whose normal matrix determinant is smaller than this (in magnitude)
/// are rejected as degenerate
pub const DETERMINANT_EPSILON: f32 = 0.1;

/// Any type of error which may occur while calibrating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// The reference points are collinear or too close together to admit a
    /// unique affine fit
    DegenerateGeometry,
    /// A reference point index was not in `0..5`
    InvalidCalibrationIndex(usize),
    /// Something other than 7 coefficients was supplied
    InvalidCoefficientCount(usize),
    /// The scale coefficient was zero
    ZeroScale,
    /// A raw rotation value did not name a supported rotation
    InvalidRotation(u16),
}

/// Rotation of the screen relative to the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Rot90,
    Rot180,
    Rot270,
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::None
    }
}

impl TryFrom<u16> for Rotation {
    type Error = CalibrationError;

    /// Accepts either an index (`0..=3`) or a multiple of 90 degrees
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Rotation::None),
            1 | 90 => Ok(Rotation::Rot90),
            2 | 180 => Ok(Rotation::Rot180),
            3 | 270 => Ok(Rotation::Rot270),
            n => Err(CalibrationError::InvalidRotation(n)),
        }
    }
}

/// Geometry of the target screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationConfig {
    pub screen_width: u16,
    pub screen_height: u16,
    pub rotation: Rotation,
    pub swap_xy: bool,
}

impl CalibrationConfig {
    pub fn new(screen_width: u16, screen_height: u16) -> Self {
        Self {
            screen_width,
            screen_height,
            rotation: Rotation::None,
            swap_xy: false,
        }
    }

    pub fn with_rotation(self, rotation: Rotation) -> Self {
        Self { rotation, ..self }
    }

    pub fn with_swap_xy(self, swap_xy: bool) -> Self {
        Self { swap_xy, ..self }
    }
}

/// A raw sensor position paired with the screen position it should map to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationPoint {
    pub raw_x: i32,
    pub raw_y: i32,
    pub screen_x: i32,
    pub screen_y: i32,
}

/// Fixed point affine coefficients `[a0, a1, a2, a3, a4, a5, scale]`
///
/// ```text
/// x = (a0 + a1 * raw_x + a2 * raw_y) / scale
/// y = (a3 + a4 * raw_x + a5 * raw_y) / scale
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coefficients([i32; COEFFICIENT_COUNT]);

impl Default for Coefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Coefficients {
    /// Leaves raw coordinates unchanged
    pub const IDENTITY: Coefficients = Coefficients([0, 1, 0, 0, 0, 1, 1]);

    pub fn new(values: [i32; COEFFICIENT_COUNT]) -> Result<Self, CalibrationError> {
        if values[COEFFICIENT_COUNT - 1] == 0 {
            return Err(CalibrationError::ZeroScale);
        }

        Ok(Self(values))
    }

    /// Restore coefficients from a flat, previously stored sequence
    pub fn from_slice(values: &[i32]) -> Result<Self, CalibrationError> {
        let values: [i32; COEFFICIENT_COUNT] = values
            .try_into()
            .map_err(|_| CalibrationError::InvalidCoefficientCount(values.len()))?;

        Self::new(values)
    }

    pub fn as_array(&self) -> &[i32; COEFFICIENT_COUNT] {
        &self.0
    }

    pub fn scale(&self) -> i32 {
        self.0[COEFFICIENT_COUNT - 1]
    }

    /// Apply the affine part only
    pub fn transform(&self, raw_x: i32, raw_y: i32) -> (i32, i32) {
        let [a0, a1, a2, a3, a4, a5, scale] = self.0.map(i64::from);
        let (raw_x, raw_y) = (raw_x as i64, raw_y as i64);

        // Integer division truncates toward zero
        let x = (a0 + a1 * raw_x + a2 * raw_y) / scale;
        let y = (a3 + a4 * raw_x + a5 * raw_y) / scale;

        (x as i32, y as i32)
    }
}

impl From<Coefficients> for [i32; COEFFICIENT_COUNT] {
    fn from(coefficients: Coefficients) -> Self {
        coefficients.0
    }
}

impl TryFrom<[i32; COEFFICIENT_COUNT]> for Coefficients {
    type Error = CalibrationError;

    fn try_from(values: [i32; COEFFICIENT_COUNT]) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

/// Fit fixed point coefficients to five reference points
///
/// Ordinary least squares, solved once for screen X and once for screen Y
/// with a shared inverse of the 3x3 normal matrix.
pub fn fit(
    points: &[CalibrationPoint; CALIBRATION_POINTS],
    scale: i32,
) -> Result<Coefficients, CalibrationError> {
    if scale == 0 {
        return Err(CalibrationError::ZeroScale);
    }

    let (mut n, mut x, mut y, mut x2, mut y2, mut xy) = (0f32, 0f32, 0f32, 0f32, 0f32, 0f32);
    for p in points {
        let (px, py) = (p.raw_x as i64, p.raw_y as i64);

        n += 1.0;
        x += px as f32;
        y += py as f32;
        x2 += (px * px) as f32;
        y2 += (py * py) as f32;
        xy += (px * py) as f32;
    }

    let det = n * (x2 * y2 - xy * xy) + x * (xy * y - x * y2) + y * (x * xy - y * x2);
    if det.abs() < DETERMINANT_EPSILON {
        return Err(CalibrationError::DegenerateGeometry);
    }

    // Inverse of the symmetric normal matrix
    let a = (x2 * y2 - xy * xy) / det;
    let b = (xy * y - x * y2) / det;
    let c = (x * xy - y * x2) / det;
    let e = (n * y2 - y * y) / det;
    let f = (x * y - n * xy) / det;
    let i = (n * x2 - x * x) / det;

    let solve = |target: fn(&CalibrationPoint) -> i32| -> [i32; 3] {
        let (mut z, mut zx, mut zy) = (0f32, 0f32, 0f32);
        for p in points {
            let t = target(p) as i64;

            z += t as f32;
            zx += (t * p.raw_x as i64) as f32;
            zy += (t * p.raw_y as i64) as f32;
        }

        let scale = scale as f32;
        [
            ((a * z + b * zx + c * zy) * scale) as i32,
            ((b * z + e * zx + f * zy) * scale) as i32,
            ((c * z + f * zx + i * zy) * scale) as i32,
        ]
    };

    let [a0, a1, a2] = solve(|p: &CalibrationPoint| p.screen_x);
    let [a3, a4, a5] = solve(|p: &CalibrationPoint| p.screen_y);

    Ok(Coefficients([a0, a1, a2, a3, a4, a5, scale]))
}

/// Calibration engine for one touch sensor and screen
#[derive(Debug, Clone)]
pub struct Calibration {
    config: CalibrationConfig,
    points: [CalibrationPoint; CALIBRATION_POINTS],
    coefficients: Coefficients,
}

impl Calibration {
    /// Create an engine using identity coefficients
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            points: [CalibrationPoint::default(); CALIBRATION_POINTS],
            coefficients: Coefficients::IDENTITY,
        }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn points(&self) -> &[CalibrationPoint; CALIBRATION_POINTS] {
        &self.points
    }

    pub fn coefficients(&self) -> Coefficients {
        self.coefficients
    }

    /// Store a reference point in slot `index`, replacing what was there
    ///
    /// Slots never written stay at zero and will spoil the fit.
    pub fn add_point(
        &mut self,
        index: usize,
        screen_x: i32,
        screen_y: i32,
        raw_x: i32,
        raw_y: i32,
    ) -> Result<(), CalibrationError> {
        let slot = self
            .points
            .get_mut(index)
            .ok_or(CalibrationError::InvalidCalibrationIndex(index))?;

        *slot = CalibrationPoint {
            raw_x,
            raw_y,
            screen_x,
            screen_y,
        };

        Ok(())
    }

    /// Fit coefficients to the stored reference points and install them
    ///
    /// A failed fit keeps the previously installed coefficients.
    pub fn perform(&mut self) -> Result<Coefficients, CalibrationError> {
        log::debug!(" # |  FBX  FBY  TSX  TSY");
        for (i, p) in self.points.iter().enumerate() {
            log::debug!(
                "{:2} | {:4} {:4} {:4} {:4}",
                i,
                p.screen_x,
                p.screen_y,
                p.raw_x,
                p.raw_y
            );
        }

        let coefficients = fit(&self.points, DEFAULT_SCALE).map_err(|e| {
            log::warn!("calibration rejected: {:?}", e);
            e
        })?;
        self.install(coefficients);

        Ok(coefficients)
    }

    /// Install coefficients from a flat sequence of exactly 7 values
    pub fn set_coefficients(&mut self, values: &[i32]) -> Result<(), CalibrationError> {
        let coefficients = Coefficients::from_slice(values)?;
        self.install(coefficients);

        Ok(())
    }

    pub fn install(&mut self, coefficients: Coefficients) {
        self.coefficients = coefficients;

        log::debug!("calibration coefficients: {:?}", coefficients.as_array());
    }

    /// Map a raw sensor position to screen coordinates
    pub fn apply(&self, raw_x: i32, raw_y: i32) -> (i32, i32) {
        let (mut x, mut y) = self.coefficients.transform(raw_x, raw_y);

        if self.config.swap_xy {
            core::mem::swap(&mut x, &mut y);
        }

        let width = self.config.screen_width as i32;
        let height = self.config.screen_height as i32;

        match self.config.rotation {
            Rotation::None => (x, y),
            Rotation::Rot90 => (y, width - x - 1),
            Rotation::Rot180 => (width - x - 1, height - y - 1),
            Rotation::Rot270 => (height - y - 1, x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: [(i32, i32); 5] = [(100, 100), (900, 100), (900, 900), (100, 900), (500, 500)];
    const SCREEN: [(i32, i32); 5] = [(0, 0), (239, 0), (239, 319), (0, 319), (120, 160)];

    fn load(calibration: &mut Calibration, raw: &[(i32, i32); 5], screen: &[(i32, i32); 5]) {
        for (i, (r, s)) in raw.iter().zip(screen.iter()).enumerate() {
            calibration.add_point(i, s.0, s.1, r.0, r.1).unwrap();
        }
    }

    #[test]
    fn five_point_fit_reproduces_targets() {
        let mut calibration = Calibration::new(CalibrationConfig::new(240, 320));
        load(&mut calibration, &RAW, &SCREEN);

        let coefficients = calibration.perform().unwrap();
        assert_eq!(coefficients.scale(), DEFAULT_SCALE);
        assert_eq!(calibration.coefficients(), coefficients);

        for (r, s) in RAW.iter().zip(SCREEN.iter()) {
            let (x, y) = calibration.apply(r.0, r.1);
            assert!((x - s.0).abs() <= 1, "x {} vs {}", x, s.0);
            assert!((y - s.1).abs() <= 1, "y {} vs {}", y, s.1);
        }
    }

    #[test]
    fn inverted_axes_fit() {
        // Sensor X runs right to left, like a panel mounted upside down
        let raw = [(3800, 200), (200, 200), (200, 3800), (3800, 3800), (2000, 2000)];
        let screen = [(20, 20), (220, 20), (220, 300), (20, 300), (120, 160)];

        let mut calibration = Calibration::new(CalibrationConfig::new(240, 320));
        load(&mut calibration, &raw, &screen);
        calibration.perform().unwrap();

        let [_, a1, _, _, _, a5, _] = *calibration.coefficients().as_array();
        assert!(a1 < 0);
        assert!(a5 > 0);

        for (r, s) in raw.iter().zip(screen.iter()) {
            let (x, y) = calibration.apply(r.0, r.1);
            assert!((x - s.0).abs() <= 1);
            assert!((y - s.1).abs() <= 1);
        }
    }

    #[test]
    fn collinear_points_keep_previous_coefficients() {
        let mut calibration = Calibration::new(CalibrationConfig::new(240, 320));
        let previous = [10, 2, 0, 20, 0, 2, 2];
        calibration.set_coefficients(&previous).unwrap();

        let collinear = [(100, 100), (200, 200), (300, 300), (400, 400), (500, 500)];
        load(&mut calibration, &collinear, &SCREEN);

        assert_eq!(calibration.perform(), Err(CalibrationError::DegenerateGeometry));
        assert_eq!(calibration.coefficients().as_array(), &previous);
    }

    #[test]
    fn unset_points_are_degenerate() {
        let mut calibration = Calibration::new(CalibrationConfig::new(240, 320));

        assert_eq!(calibration.perform(), Err(CalibrationError::DegenerateGeometry));
        assert_eq!(calibration.coefficients(), Coefficients::IDENTITY);
    }

    #[test]
    fn add_point_overwrites_and_checks_index() {
        let mut calibration = Calibration::new(CalibrationConfig::new(240, 320));

        calibration.add_point(4, 1, 2, 3, 4).unwrap();
        calibration.add_point(4, 5, 6, 7, 8).unwrap();
        assert_eq!(
            calibration.points()[4],
            CalibrationPoint {
                raw_x: 7,
                raw_y: 8,
                screen_x: 5,
                screen_y: 6,
            }
        );

        let before = *calibration.points();
        assert_eq!(
            calibration.add_point(5, 0, 0, 0, 0),
            Err(CalibrationError::InvalidCalibrationIndex(5))
        );
        assert_eq!(calibration.points(), &before);
    }

    #[test]
    fn coefficient_count_and_scale_are_checked() {
        let mut calibration = Calibration::new(CalibrationConfig::new(240, 320));

        assert_eq!(
            calibration.set_coefficients(&[0, 1, 0, 0, 0, 1]),
            Err(CalibrationError::InvalidCoefficientCount(6))
        );
        assert_eq!(
            calibration.set_coefficients(&[0, 1, 0, 0, 0, 1, 1, 1]),
            Err(CalibrationError::InvalidCoefficientCount(8))
        );
        assert_eq!(
            calibration.set_coefficients(&[0, 1, 0, 0, 0, 1, 0]),
            Err(CalibrationError::ZeroScale)
        );
        assert_eq!(calibration.coefficients(), Coefficients::IDENTITY);
    }

    #[test]
    fn identity_leaves_coordinates_unchanged() {
        let calibration = Calibration::new(CalibrationConfig::new(240, 320));

        for &(x, y) in &[(0, 0), (1, 2), (239, 319), (4095, 4095), (-5, 7)] {
            assert_eq!(calibration.apply(x, y), (x, y));
        }
    }

    #[test]
    fn restored_coefficients_apply_with_truncation() {
        let mut calibration = Calibration::new(CalibrationConfig::new(240, 320));
        calibration.set_coefficients(&[-7, 1, 0, 7, 0, 1, 2]).unwrap();

        // (-7 + 4) / 2 = -1.5 and (7 + 4) / 2 = 5.5 both truncate toward zero
        assert_eq!(calibration.apply(4, 4), (-1, 5));
    }

    #[test]
    fn swap_happens_before_rotation() {
        let swapped = Calibration::new(CalibrationConfig::new(240, 320).with_swap_xy(true));
        assert_eq!(swapped.apply(10, 20), (20, 10));

        let rotated = Calibration::new(
            CalibrationConfig::new(240, 320)
                .with_swap_xy(true)
                .with_rotation(Rotation::Rot90),
        );
        // swap gives (20, 10), then (y, w - x - 1)
        assert_eq!(rotated.apply(10, 20), (10, 219));
    }

    #[test]
    fn rotations() {
        let at = |rotation| {
            Calibration::new(CalibrationConfig::new(240, 320).with_rotation(rotation)).apply(10, 20)
        };

        assert_eq!(at(Rotation::None), (10, 20));
        assert_eq!(at(Rotation::Rot90), (20, 229));
        assert_eq!(at(Rotation::Rot180), (229, 299));
        assert_eq!(at(Rotation::Rot270), (299, 10));
    }

    #[test]
    fn rotation_180_is_an_involution() {
        let calibration =
            Calibration::new(CalibrationConfig::new(240, 320).with_rotation(Rotation::Rot180));

        for &(x, y) in &[(0, 0), (239, 319), (10, 20), (120, 160), (239, 0)] {
            let (rx, ry) = calibration.apply(x, y);
            assert!((0..240).contains(&rx) && (0..320).contains(&ry));
            assert_eq!(calibration.apply(rx, ry), (x, y));
        }
    }

    #[test]
    fn rotation_from_raw_values() {
        assert_eq!(Rotation::try_from(0u16), Ok(Rotation::None));
        assert_eq!(Rotation::try_from(1u16), Ok(Rotation::Rot90));
        assert_eq!(Rotation::try_from(180u16), Ok(Rotation::Rot180));
        assert_eq!(Rotation::try_from(3u16), Ok(Rotation::Rot270));
        assert_eq!(Rotation::try_from(4u16), Err(CalibrationError::InvalidRotation(4)));
        assert_eq!(Rotation::try_from(45u16), Err(CalibrationError::InvalidRotation(45)));
    }

    #[test]
    fn fit_honours_custom_scale() {
        let points = {
            let mut points = [CalibrationPoint::default(); CALIBRATION_POINTS];
            for (p, (r, s)) in points.iter_mut().zip(RAW.iter().zip(SCREEN.iter())) {
                *p = CalibrationPoint {
                    raw_x: r.0,
                    raw_y: r.1,
                    screen_x: s.0,
                    screen_y: s.1,
                };
            }
            points
        };

        let coefficients = fit(&points, 1024).unwrap();
        assert_eq!(coefficients.scale(), 1024);
        assert_eq!(fit(&points, 0), Err(CalibrationError::ZeroScale));
    }
}
