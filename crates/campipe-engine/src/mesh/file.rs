//! Displacement map text format.

use std::path::Path;

use crate::error::{FormatError, Result};

/// Returns the grid size and one UV pair per grid point, row major.
pub(super) fn parse(path: &Path, content: &str) -> Result<(u32, Vec<[f32; 2]>)> {
    let fail = |line: usize, msg: String| {
        let e = FormatError::new(path, Some(line), msg);
        log::error!("{e}");
        e
    };

    let mut lines = content.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));

    let (n, header) = lines.next().ok_or_else(|| fail(1, "empty file".into()))?;
    let (w, h) = header
        .split_once(',')
        .ok_or_else(|| fail(n, format!("expected \"width,height\", got {header:?}")))?;
    let parse_dim = |s: &str| s.trim().parse::<u32>().map_err(|e| fail(n, format!("bad dimension {s:?}: {e}")));
    let (width, height) = (parse_dim(w)?, parse_dim(h)?);

    if width != height {
        return Err(fail(n, format!("mesh must be square, got {width}x{height}")).into());
    }
    if width < 2 || width as usize * width as usize > u16::MAX as usize + 1 {
        return Err(fail(n, format!("unsupported mesh size {width}x{height}")).into());
    }

    let per_row = width as usize * 2;
    let mut uvs = Vec::with_capacity(width as usize * height as usize);
    for row in 0..height {
        let (n, line) = lines
            .next()
            .ok_or_else(|| fail(n + row as usize + 1, format!("missing row {row} of {height}")))?;

        let fields: Vec<&str> = line.trim_end_matches(',').split(',').map(str::trim).collect();
        if fields.len() != per_row {
            return Err(fail(n, format!("expected {per_row} values, got {}", fields.len())).into());
        }
        let mut values = Vec::with_capacity(per_row);
        for f in fields {
            let v: f32 = f.parse().map_err(|_| fail(n, format!("bad float {f:?}")))?;
            if !v.is_finite() {
                return Err(fail(n, format!("non-finite value {f:?}")).into());
            }
            values.push(v);
        }
        uvs.extend(values.chunks_exact(2).map(|p| [p[0], p[1]]));
    }

    if let Some((n, _)) = lines.find(|(_, l)| !l.is_empty()) {
        return Err(fail(n, "trailing data after last row".into()).into());
    }

    Ok((width, uvs))
}
