use core::ops::Mul;

/// Column-major 4x4 matrix, laid out the way `glUniformMatrix4fv` expects
/// with `transpose = false`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mat4(pub [f32; 16]);

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4([
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ]);

    #[inline]
    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    pub const fn scale(x: f32, y: f32, z: f32) -> Self {
        Mat4([
            x, 0.0, 0.0, 0.0,
            0.0, y, 0.0, 0.0,
            0.0, 0.0, z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    pub const fn translation(x: f32, y: f32, z: f32) -> Self {
        Mat4([
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            x, y, z, 1.0,
        ])
    }

    /// Maps the unit square `[0, 1]²` onto clip space `[-1, 1]²`.
    pub fn unit_to_clip() -> Self {
        Self::translation(-1.0, -1.0, 0.0) * Self::scale(2.0, 2.0, 1.0)
    }

    /// Mirrors Y in clip space, so row 0 of a top-down image lands at the top.
    pub const fn flip_y() -> Self {
        Self::scale(1.0, -1.0, 1.0)
    }

    #[inline]
    pub fn as_array(&self) -> &[f32; 16] {
        &self.0
    }

    #[inline]
    fn at(&self, row: usize, col: usize) -> f32 {
        self.0[col * 4 + row]
    }

    /// Transforms `(x, y, 0, 1)` and returns the resulting `(x, y)`.
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let tx = self.at(0, 0) * x + self.at(0, 1) * y + self.at(0, 3);
        let ty = self.at(1, 0) * x + self.at(1, 1) * y + self.at(1, 3);
        let tw = self.at(3, 0) * x + self.at(3, 1) * y + self.at(3, 3);
        (tx / tw, ty / tw)
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Mat4 {
    type Output = Mat4;

    fn mul(self, rhs: Mat4) -> Mat4 {
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = (0..4).map(|k| self.at(row, k) * rhs.at(k, col)).sum();
            }
        }
        Mat4(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_neutral() {
        let t = Mat4::translation(1.0, 2.0, 3.0);
        assert_eq!(t * Mat4::IDENTITY, t);
        assert_eq!(Mat4::IDENTITY * t, t);
    }

    #[test]
    fn unit_to_clip_maps_corners() {
        let m = Mat4::unit_to_clip();
        assert_eq!(m.transform_point(0.0, 0.0), (-1.0, -1.0));
        assert_eq!(m.transform_point(1.0, 1.0), (1.0, 1.0));
        assert_eq!(m.transform_point(0.5, 0.5), (0.0, 0.0));
    }

    #[test]
    fn flip_y_mirrors() {
        assert_eq!(Mat4::flip_y().transform_point(0.25, 0.75), (0.25, -0.75));
    }
}
