/// Planes of an I420 frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Plane {
    Y,
    U,
    V,
}

impl Plane {
    pub const ALL: [Plane; 3] = [Plane::Y, Plane::U, Plane::V];

    /// Sampler name the campipe shaders use for this plane.
    pub fn sampler(self) -> &'static str {
        match self {
            Plane::Y => "ytex",
            Plane::U => "utex",
            Plane::V => "vtex",
        }
    }
}

/// One capture buffer: a planar YUV 4:2:0 frame owned by the pool.
///
/// Chroma planes are half size, rounded up.
#[derive(Clone, PartialEq, Eq)]
pub struct CameraBuffer {
    index: usize,
    width: u32,
    height: u32,
    sequence: u64,
    data: Vec<u8>,
}

impl CameraBuffer {
    pub fn new(index: usize, width: u32, height: u32) -> Self {
        let (cw, ch) = Self::chroma_size(width, height);
        let len = (width * height + 2 * cw * ch) as usize;
        Self { index, width, height, sequence: 0, data: vec![0; len] }
    }

    fn chroma_size(width: u32, height: u32) -> (u32, u32) {
        (width.div_ceil(2), height.div_ceil(2))
    }

    /// Slot in the pool this buffer was allocated as.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Frame counter stamped by the producer.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    fn plane_range(&self, plane: Plane) -> (std::ops::Range<usize>, u32, u32) {
        let luma = (self.width * self.height) as usize;
        let (cw, ch) = Self::chroma_size(self.width, self.height);
        let chroma = (cw * ch) as usize;
        match plane {
            Plane::Y => (0..luma, self.width, self.height),
            Plane::U => (luma..luma + chroma, cw, ch),
            Plane::V => (luma + chroma..luma + 2 * chroma, cw, ch),
        }
    }

    /// Tightly packed bytes of `plane` and its dimensions.
    pub fn plane(&self, plane: Plane) -> (&[u8], u32, u32) {
        let (range, w, h) = self.plane_range(plane);
        (&self.data[range], w, h)
    }

    pub fn plane_mut(&mut self, plane: Plane) -> (&mut [u8], u32, u32) {
        let (range, w, h) = self.plane_range(plane);
        (&mut self.data[range], w, h)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl std::fmt::Debug for CameraBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraBuffer")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i420_plane_layout() {
        let buf = CameraBuffer::new(0, 5, 3);
        assert_eq!(buf.as_bytes().len(), 15 + 2 * 3 * 2);

        let (y, w, h) = buf.plane(Plane::Y);
        assert_eq!((y.len(), w, h), (15, 5, 3));
        let (u, w, h) = buf.plane(Plane::U);
        assert_eq!((u.len(), w, h), (6, 3, 2));
        let (v, ..) = buf.plane(Plane::V);
        assert_eq!(v.len(), 6);
    }

    #[test]
    fn plane_mut_writes_only_its_plane() {
        let mut buf = CameraBuffer::new(0, 2, 2);
        buf.plane_mut(Plane::U).0.fill(7);
        assert!(buf.plane(Plane::Y).0.iter().all(|&b| b == 0));
        assert_eq!(buf.plane(Plane::U).0, &[7]);
        assert_eq!(buf.plane(Plane::V).0, &[0]);
    }
}
