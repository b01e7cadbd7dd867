use super::{Vec2, Viewport};

/// Axis-aligned rectangle in fractional units of a parent viewport.
///
/// `Rect::new(0.0, 0.0, 1.0, 1.0)` covers the whole parent.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    #[inline]
    pub const fn unit() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.origin.is_finite() && self.size.is_finite()
    }

    /// Normalizes the rectangle so width/height are non-negative.
    #[inline]
    pub fn normalized(self) -> Self {
        let mut x = self.origin.x;
        let mut y = self.origin.y;
        let mut w = self.size.x;
        let mut h = self.size.y;

        if w < 0.0 {
            x += w;
            w = -w;
        }
        if h < 0.0 {
            y += h;
            h = -h;
        }

        Rect::new(x, y, w, h)
    }

    /// Resolves this fractional rect to absolute pixels inside `parent`.
    ///
    /// Edges are truncated toward zero, matching an integer assignment of the
    /// scaled float values.
    pub fn to_viewport(self, parent: Viewport) -> Viewport {
        let r = self.normalized();
        let pw = parent.width as f32;
        let ph = parent.height as f32;

        Viewport::new(
            parent.x + (pw * r.origin.x) as i32,
            parent.y + (ph * r.origin.y) as i32,
            (pw * r.size.x) as i32,
            (ph * r.size.y) as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect { Rect::new(x, y, w, h) }

    // ── normalized ────────────────────────────────────────────────────────

    #[test]
    fn normalized_positive_is_identity() {
        let rect = r(0.1, 0.2, 0.5, 0.25);
        assert_eq!(rect.normalized(), rect);
    }

    #[test]
    fn normalized_negative_width() {
        let n = r(1.0, 0.0, -0.25, 0.5).normalized();
        assert_eq!(n.origin.x, 0.75);
        assert_eq!(n.size.x, 0.25);
    }

    // ── to_viewport ───────────────────────────────────────────────────────

    #[test]
    fn unit_rect_covers_parent() {
        let parent = Viewport::new(10, 20, 640, 480);
        assert_eq!(Rect::unit().to_viewport(parent), parent);
    }

    #[test]
    fn quarter_rect_is_offset_by_parent_origin() {
        let parent = Viewport::new(100, 50, 200, 100);
        let vp = r(0.5, 0.5, 0.5, 0.5).to_viewport(parent);
        assert_eq!(vp, Viewport::new(200, 100, 100, 50));
    }

    // ── is_empty ──────────────────────────────────────────────────────────

    #[test]
    fn is_empty_zero_size() {
        assert!(r(0.0, 0.0, 0.0, 0.5).is_empty());
        assert!(r(0.0, 0.0, 0.5, 0.0).is_empty());
        assert!(!Rect::unit().is_empty());
    }
}
