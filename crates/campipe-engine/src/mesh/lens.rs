use crate::config::LensConfig;

/// Radial (barrel/pincushion) lens model for a `width x height` sensor.
///
/// Texture coordinates are remapped with `r' = r * (k0 r³ + k1 r² + k2 r + k3)`
/// in aspect-corrected device space, where `r = 1` is the half-height
/// circle. `k3` is normalised on construction so `r' = r` at `r = 1`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LensModel {
    pub width: u32,
    pub height: u32,
    k: [f64; 4],
}

impl LensModel {
    /// `k` as configured, before normalisation.
    pub fn new(width: u32, height: u32, k: [f32; 4]) -> Self {
        let k = k.map(f64::from);
        Self { width, height, k: [k[0], k[1], k[2], k[3] - (k[0] + k[1] + k[2])] }
    }

    pub fn from_config(config: &LensConfig, width: u32, height: u32) -> Self {
        Self::new(width, height, config.k)
    }

    /// Normalised coefficients.
    pub fn coefficients(&self) -> [f64; 4] {
        self.k
    }

    /// Maps a grid point in `[0, 1]²` to the texture coordinate to sample.
    pub fn distort(&self, x: f32, y: f32) -> (f32, f32) {
        let (w, h) = (self.width as f64, self.height as f64);
        let asp = w / h;
        let xoffs = (w - h) / 2.0 / h;

        let xdiff = ((x as f64 * asp - xoffs) * 2.0) - 1.0;
        let ydiff = (y as f64 * 2.0) - 1.0;
        let r = xdiff.hypot(ydiff);

        // At the centre r is zero and the direction is undefined.
        let unit = |d: f64| {
            let u = d / r;
            if u.is_finite() { u } else { 0.0 }
        };
        let (xunit, yunit) = (unit(xdiff), unit(ydiff));

        let [k0, k1, k2, k3] = self.k;
        let newr = r * (k0 * r.powi(3) + k1 * r.powi(2) + k2 * r + k3);

        let xout = (((newr * xunit + 1.0) / 2.0) + xoffs) / asp;
        let yout = (newr * yunit + 1.0) / 2.0;
        (xout as f32, yout as f32)
    }

    /// The distortion as a closure, for [`crate::mesh::build`].
    pub fn distortion(&self) -> impl Fn(f32, f32) -> (f32, f32) + '_ {
        move |x, y| self.distort(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-5 && (a.1 - b.1).abs() < 1e-5
    }

    #[test]
    fn identity_coefficients_are_identity() {
        let lens = LensModel::new(640, 480, [0.0, 0.0, 0.0, 1.0]);
        assert!(close(lens.distort(0.3, 0.7), (0.3, 0.7)));
        assert!(close(lens.distort(0.0, 1.0), (0.0, 1.0)));
    }

    #[test]
    fn centre_is_finite() {
        let lens = LensModel::new(480, 480, [5.12, -0.36, 0.0, 1.0]);
        let (x, y) = lens.distort(0.5, 0.5);
        assert!(x.is_finite() && y.is_finite());
        assert!(close((x, y), (0.5, 0.5)));
    }

    #[test]
    fn k3_is_normalised() {
        let lens = LensModel::new(640, 480, [5.12, -0.36, 0.0, 1.0]);
        let k = lens.coefficients();
        assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn unit_circle_is_fixed() {
        // r = 1 on a square sensor: (0.5, 1.0) is the top of the circle.
        let lens = LensModel::new(480, 480, [5.12, -0.36, 0.0, 1.0]);
        assert!(close(lens.distort(0.5, 1.0), (0.5, 1.0)));
    }

    #[test]
    fn default_model_builds_a_mesh() {
        let lens = LensModel::from_config(&LensConfig::default(), 640, 480);
        let f = lens.distortion();
        let mesh = Mesh::generate(32, 32, Some(&f)).unwrap();
        assert!(mesh.vertices().iter().all(|v| v.tc[0].is_finite() && v.tc[1].is_finite()));
    }
}
