use crate::render::MappedFrame;

/// A frame detached from the GPU: packed RGBA8 rows, top row first.
#[derive(Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl OwnedFrame {
    pub fn from_mapped(frame: &MappedFrame<'_>) -> Self {
        Self { width: frame.width, height: frame.height, data: frame.to_top_down() }
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    /// Row `y`, counted from the top.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride();
        &self.data[start..start + self.stride()]
    }
}

impl std::fmt::Debug for OwnedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}
