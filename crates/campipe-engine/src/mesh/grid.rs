use std::path::Path;

use bytemuck::{Pod, Zeroable};

use crate::error::{Error, Result};

/// Interleaved `position.xy, tc.xy`, both in `[0, 1]`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 2],
    pub tc: [f32; 2],
}

impl MeshVertex {
    /// Byte stride of one vertex.
    pub const STRIDE: i32 = std::mem::size_of::<MeshVertex>() as i32;
    pub const POSITION_OFFSET: i32 = 0;
    pub const TC_OFFSET: i32 = 8;
}

/// Number of strip indices for a grid: every row pair emits `2 * xpoints`
/// indices plus two stitch indices, minus the stitch after the last row.
pub const fn index_count(xpoints: u32, ypoints: u32) -> usize {
    (ypoints as usize - 1) * ((xpoints as usize - 1) * 2 + 4) - 2
}

/// Builds the grid vertices row by row, bottom row first.
///
/// `distort` maps a grid point to its texture coordinate; `None` samples
/// the grid point itself.
///
/// # Panics
///
/// If either dimension is below 2.
pub fn build(xpoints: u32, ypoints: u32, distort: Option<&dyn Fn(f32, f32) -> (f32, f32)>) -> Vec<MeshVertex> {
    assert!(xpoints >= 2 && ypoints >= 2, "mesh needs at least 2x2 points, got {xpoints}x{ypoints}");

    let xstep = 1.0 / (xpoints - 1) as f64;
    let ystep = 1.0 / (ypoints - 1) as f64;

    let mut vertices = Vec::with_capacity(xpoints as usize * ypoints as usize);
    for row in 0..ypoints {
        let y = (row as f64 * ystep) as f32;
        for col in 0..xpoints {
            let x = (col as f64 * xstep) as f32;
            let (u, v) = distort.map_or((x, y), |f| f(x, y));
            vertices.push(MeshVertex { position: [x, y], tc: [u, v] });
        }
    }
    vertices
}

/// Builds one triangle strip covering the grid.
///
/// Each row pair is swept left to right alternating between the lower and
/// upper row. Rows are joined by repeating the last index of one row and
/// the first index of the next, which only produces zero-area triangles.
///
/// # Panics
///
/// If either dimension is below 2, or the grid has more vertices than a
/// 16-bit index can address.
pub fn build_indices(xpoints: u32, ypoints: u32) -> Vec<u16> {
    assert!(xpoints >= 2 && ypoints >= 2, "mesh needs at least 2x2 points, got {xpoints}x{ypoints}");
    assert!(
        xpoints as usize * ypoints as usize <= u16::MAX as usize + 1,
        "{xpoints}x{ypoints} mesh does not fit 16-bit indices"
    );

    let nrows = ypoints - 1;
    let mut indices = Vec::with_capacity(index_count(xpoints, ypoints));
    for row in 0..nrows {
        for col in 0..xpoints {
            indices.push((row * xpoints + col) as u16);
            indices.push(((row + 1) * xpoints + col) as u16);
        }
        if row + 1 < nrows {
            let last = ((row + 1) * xpoints + xpoints - 1) as u16;
            indices.push(last);
            indices.push(((row + 1) * xpoints) as u16);
        }
    }
    indices
}

/// Vertices plus strip indices for one grid. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    xpoints: u32,
    ypoints: u32,
    vertices: Vec<MeshVertex>,
    indices: Vec<u16>,
}

impl Mesh {
    /// Builds a grid, rejecting sizes [`build`] would panic on.
    pub fn generate(xpoints: u32, ypoints: u32, distort: Option<&dyn Fn(f32, f32) -> (f32, f32)>) -> Result<Self> {
        if xpoints < 2 || ypoints < 2 || xpoints as usize * ypoints as usize > u16::MAX as usize + 1 {
            return Err(Error::InvalidSize { what: "mesh", width: xpoints, height: ypoints });
        }
        Ok(Self::from_vertices(xpoints, ypoints, build(xpoints, ypoints, distort)))
    }

    /// The flat 2x2 quad: no correction.
    pub fn identity() -> Self {
        Self::from_vertices(2, 2, build(2, 2, None))
    }

    /// Loads a precomputed displacement map. See [`Mesh::parse`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            log::error!("failed to read mesh {}: {e}", path.display());
            crate::error::FormatError::new(path, None, e.to_string())
        })?;
        Self::parse(path, &content)
    }

    /// Parses a displacement map:
    ///
    /// ```text
    /// 3,3
    /// u,v,u,v,u,v
    /// u,v,u,v,u,v
    /// u,v,u,v,u,v
    /// ```
    ///
    /// The header gives `width,height` (which must match), followed by one
    /// line of `width` UV pairs per grid row.
    pub fn parse(path: impl AsRef<Path>, content: &str) -> Result<Self> {
        let (size, uvs) = super::file::parse(path.as_ref(), content)?;
        let mut vertices = build(size, size, None);
        for (v, uv) in vertices.iter_mut().zip(uvs) {
            v.tc = uv;
        }
        log::debug!("loaded {size}x{size} mesh from {}", path.as_ref().display());
        Ok(Self::from_vertices(size, size, vertices))
    }

    fn from_vertices(xpoints: u32, ypoints: u32, vertices: Vec<MeshVertex>) -> Self {
        Self { xpoints, ypoints, vertices, indices: build_indices(xpoints, ypoints) }
    }

    #[inline]
    pub fn xpoints(&self) -> u32 {
        self.xpoints
    }

    #[inline]
    pub fn ypoints(&self) -> u32 {
        self.ypoints
    }

    #[inline]
    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Logs every vertex as `(position)<-(tc)` and the index list, at trace
    /// level.
    pub fn dump(&self) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        for row in self.vertices.chunks(self.xpoints as usize) {
            let line: Vec<String> = row
                .iter()
                .map(|v| format!("({:1.3} {:1.3})<-({:1.3} {:1.3})", v.position[0], v.position[1], v.tc[0], v.tc[1]))
                .collect();
            log::trace!("{}", line.join(" | "));
        }
        let idx: Vec<String> = self.indices.iter().map(u16::to_string).collect();
        log::trace!("indices: {}", idx.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row_col(index: u16, xpoints: u32) -> (u32, u32) {
        (index as u32 / xpoints, index as u32 % xpoints)
    }

    // ── build ─────────────────────────────────────────────────────────────

    #[test]
    fn vertex_layout_is_interleaved() {
        assert_eq!(MeshVertex::STRIDE, 16);
        let v = [MeshVertex { position: [1.0, 2.0], tc: [3.0, 4.0] }];
        let floats: &[f32] = bytemuck::cast_slice(&v);
        assert_eq!(floats, &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn identity_quad() {
        let m = Mesh::identity();
        assert_eq!(m.vertex_count(), 4);
        assert_eq!(m.indices(), &[0, 2, 1, 3]);
        assert_eq!(m.vertices()[3], MeshVertex { position: [1.0, 1.0], tc: [1.0, 1.0] });
    }

    #[test]
    fn distortion_fills_tex_coords_only() {
        let shift = |x: f32, y: f32| (x * 0.5, y + 0.25);
        let v = build(3, 2, Some(&shift));
        assert_eq!(v[1].position, [0.5, 0.0]);
        assert_eq!(v[1].tc, [0.25, 0.25]);
    }

    #[test]
    fn generate_rejects_degenerate_grids() {
        assert!(matches!(Mesh::generate(1, 4, None), Err(Error::InvalidSize { .. })));
        assert!(matches!(Mesh::generate(300, 300, None), Err(Error::InvalidSize { .. })));
    }

    #[test]
    #[should_panic]
    fn build_panics_below_two_points() {
        build(1, 2, None);
    }

    // ── build_indices ─────────────────────────────────────────────────────

    #[test]
    fn three_by_three_strip() {
        assert_eq!(build_indices(3, 3), vec![0, 3, 1, 4, 2, 5, 5, 3, 3, 6, 4, 7, 5, 8]);
    }

    proptest! {
        #[test]
        fn counts_match_grid(x in 2u32..40, y in 2u32..40) {
            let m = Mesh::generate(x, y, None).unwrap();
            prop_assert_eq!(m.vertex_count(), (x * y) as usize);
            prop_assert_eq!(m.index_count(), index_count(x, y));
            prop_assert!(m.indices().iter().all(|&i| (i as u32) < x * y));
        }

        #[test]
        fn strip_has_no_stray_triangles(x in 2u32..24, y in 2u32..24) {
            let idx = build_indices(x, y);
            for w in idx.windows(3) {
                if w[0] == w[1] || w[1] == w[2] || w[0] == w[2] {
                    continue;
                }
                let rc: Vec<_> = w.iter().map(|&i| row_col(i, x)).collect();
                let rows = rc.iter().map(|p| p.0);
                let cols = rc.iter().map(|p| p.1);
                let (rmin, rmax) = (rows.clone().min().unwrap(), rows.max().unwrap());
                let (cmin, cmax) = (cols.clone().min().unwrap(), cols.max().unwrap());
                prop_assert_eq!(rmax - rmin, 1, "triangle {:?} spans rows", w);
                prop_assert_eq!(cmax - cmin, 1, "triangle {:?} spans columns", w);
            }
        }

        #[test]
        fn consecutive_pairs_are_adjacent_rows(x in 2u32..24, y in 2u32..24) {
            let idx = build_indices(x, y);
            // The sweep of row pair r emits (r, c), (r + 1, c) for every column.
            let per_row = 2 * x as usize + 2;
            for (r, chunk) in idx.chunks(per_row).enumerate() {
                for pair in chunk[..2 * x as usize].chunks(2) {
                    prop_assert_eq!(row_col(pair[0], x).0, r as u32);
                    prop_assert_eq!(row_col(pair[1], x).0, r as u32 + 1);
                }
            }
        }
    }
}
