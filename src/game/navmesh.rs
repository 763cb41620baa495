//! Walkability oracle over the world's occupancy grid

use std::path::Path;

/// Immutable walkable-area mask at 1-unit resolution.
///
/// Loaded once at startup and consulted by both the local prediction and the
/// remote extrapolation paths; every movement candidate must pass through
/// [`NavMesh::is_walkable`] before it is accepted.
#[derive(Debug, Clone)]
pub struct NavMesh {
    width: usize,
    height: usize,
    /// Row-major; true = walkable
    cells: Vec<bool>,
}

impl NavMesh {
    /// Build from row-major grid rows (non-zero = walkable), as stored in
    /// the `navmesh.json` asset.
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self, NavMeshError> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(NavMeshError::Empty);
        }

        let mut cells = Vec::with_capacity(width * height);
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(NavMeshError::Ragged {
                    row: row_idx,
                    expected: width,
                    got: row.len(),
                });
            }
            cells.extend(row.iter().map(|&cell| cell != 0));
        }

        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Fully walkable mesh of the given size.
    pub fn open(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![true; width * height],
        }
    }

    /// Load the JSON grid asset from disk.
    pub fn load(path: &Path) -> Result<Self, NavMeshError> {
        let raw = std::fs::read_to_string(path)?;
        let rows: Vec<Vec<u8>> = serde_json::from_str(&raw)?;
        Self::from_rows(rows)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether the cell containing `(x, y)` can be stood on.
    ///
    /// Coordinates are truncated (not rounded) to cell indices; anything
    /// outside the world rectangle is non-walkable.
    pub fn is_walkable(&self, x: f64, y: f64) -> bool {
        if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
            return false;
        }
        let col = x as usize;
        let row = y as usize;
        if col >= self.width || row >= self.height {
            return false;
        }
        self.cells[row * self.width + col]
    }
}

/// NavMesh loading errors
#[derive(Debug, thiserror::Error)]
pub enum NavMeshError {
    #[error("navmesh grid is empty")]
    Empty,

    #[error("navmesh row {row} has {got} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("failed to read navmesh asset: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse navmesh asset: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> NavMesh {
        // 4 wide, 3 tall; column 2 is a wall.
        NavMesh::from_rows(vec![
            vec![1, 1, 0, 1],
            vec![1, 1, 0, 1],
            vec![1, 1, 0, 1],
        ])
        .unwrap()
    }

    #[test]
    fn out_of_bounds_is_never_walkable() {
        let mesh = corridor();
        assert!(!mesh.is_walkable(-0.1, 1.0));
        assert!(!mesh.is_walkable(1.0, -0.1));
        assert!(!mesh.is_walkable(4.0, 1.0));
        assert!(!mesh.is_walkable(1.0, 3.0));
        assert!(!mesh.is_walkable(f64::NAN, 1.0));
    }

    #[test]
    fn lookup_truncates_to_cell_indices() {
        let mesh = corridor();
        // 1.999 still falls in column 1 (walkable), 2.0 enters the wall.
        assert!(mesh.is_walkable(1.999, 0.5));
        assert!(!mesh.is_walkable(2.0, 0.5));
        assert!(!mesh.is_walkable(2.999, 0.5));
        assert!(mesh.is_walkable(3.0, 0.5));
    }

    #[test]
    fn ragged_grid_is_rejected() {
        let err = NavMesh::from_rows(vec![vec![1, 1], vec![1]]).unwrap_err();
        match err {
            NavMeshError::Ragged { row, expected, got } => {
                assert_eq!((row, expected, got), (1, 2, 1));
            }
            other => panic!("expected ragged error, got {other}"),
        }
        assert!(matches!(
            NavMesh::from_rows(Vec::new()),
            Err(NavMeshError::Empty)
        ));
    }

    #[test]
    fn open_mesh_is_walkable_everywhere_inside() {
        let mesh = NavMesh::open(10, 5);
        assert!(mesh.is_walkable(0.0, 0.0));
        assert!(mesh.is_walkable(9.9, 4.9));
        assert!(!mesh.is_walkable(10.0, 4.9));
    }
}
