//! Grid assembly from row and column boundaries.

use crate::config::ReconstructConfig;
use crate::geometry::Rect;
use serde::Serialize;

/// One cell of an assembled grid.
#[derive(Debug, Clone, Serialize)]
pub struct Cell {
    /// Row index, top to bottom.
    pub row: usize,
    /// Column index, left to right.
    pub col: usize,
    /// Cell bounding box.
    pub bbox: Rect,
}

/// A row × column lattice of cells.
#[derive(Debug, Clone, Serialize)]
pub struct Grid {
    /// Row boundary y-positions, strictly increasing.
    pub row_boundaries: Vec<f32>,
    /// Column boundary x-positions, strictly increasing.
    pub col_boundaries: Vec<f32>,
    /// Cells in row-major order.
    pub cells: Vec<Cell>,
    /// Number of rows.
    pub n_rows: usize,
    /// Number of columns.
    pub n_cols: usize,
}

impl Grid {
    /// Bounding box of the whole grid.
    pub fn bbox(&self) -> Rect {
        Rect::from_points(
            self.col_boundaries[0],
            self.row_boundaries[0],
            *self.col_boundaries.last().unwrap(),
            *self.row_boundaries.last().unwrap(),
        )
    }

    /// Look up a cell by indices.
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        if row >= self.n_rows || col >= self.n_cols {
            return None;
        }
        self.cells.get(row * self.n_cols + col)
    }

    /// Index of the row containing `y`, when inside the grid.
    pub fn row_at(&self, y: f32) -> Option<usize> {
        index_at(&self.row_boundaries, y)
    }

    /// Index of the column containing `x`, when inside the grid.
    pub fn col_at(&self, x: f32) -> Option<usize> {
        index_at(&self.col_boundaries, x)
    }
}

fn index_at(boundaries: &[f32], value: f32) -> Option<usize> {
    if boundaries.len() < 2 || value < boundaries[0] || value > *boundaries.last().unwrap() {
        return None;
    }
    let idx = boundaries.partition_point(|&b| b <= value);
    // A value on the last boundary belongs to the last interval.
    Some(idx.saturating_sub(1).min(boundaries.len() - 2))
}

/// Assemble a grid from boundaries, if the counts meet the minimums.
///
/// Boundaries are deduplicated and must end up strictly increasing; a
/// grid with fewer than `min_rows` rows or `min_cols` columns is not a
/// table, and `None` is returned.
pub fn assemble(
    row_boundaries: &[f32],
    col_boundaries: &[f32],
    cfg: &ReconstructConfig,
) -> Option<Grid> {
    let rows = strictly_increasing(row_boundaries);
    let cols = strictly_increasing(col_boundaries);

    let n_rows = rows.len().saturating_sub(1);
    let n_cols = cols.len().saturating_sub(1);
    if n_rows < cfg.min_rows || n_cols < cfg.min_cols {
        return None;
    }

    let mut cells = Vec::with_capacity(n_rows * n_cols);
    for row in 0..n_rows {
        for col in 0..n_cols {
            cells.push(Cell {
                row,
                col,
                bbox: Rect::from_points(cols[col], rows[row], cols[col + 1], rows[row + 1]),
            });
        }
    }

    Some(Grid {
        row_boundaries: rows,
        col_boundaries: cols,
        cells,
        n_rows,
        n_cols,
    })
}

fn strictly_increasing(values: &[f32]) -> Vec<f32> {
    let mut out: Vec<f32> = Vec::with_capacity(values.len());
    for &v in values {
        match out.last() {
            Some(&last) if v <= last => {},
            _ => out.push(v),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ReconstructConfig {
        ReconstructConfig::default()
    }

    #[test]
    fn test_assemble_valid_grid() {
        let rows = [0.0, 30.0, 60.0, 90.0];
        let cols = [0.0, 100.0, 200.0];
        let grid = assemble(&rows, &cols, &cfg()).unwrap();

        assert_eq!(grid.n_rows, 3);
        assert_eq!(grid.n_cols, 2);
        assert_eq!(grid.cells.len(), 6);
        assert_eq!(grid.bbox(), Rect::from_points(0.0, 0.0, 200.0, 90.0));

        let cell = grid.cell(1, 1).unwrap();
        assert_eq!(cell.bbox, Rect::from_points(100.0, 30.0, 200.0, 60.0));
    }

    #[test]
    fn test_too_few_rows_rejected() {
        let rows = [0.0, 30.0, 60.0]; // 2 rows < 3
        let cols = [0.0, 100.0, 200.0];
        assert!(assemble(&rows, &cols, &cfg()).is_none());
    }

    #[test]
    fn test_too_few_cols_rejected() {
        let rows = [0.0, 30.0, 60.0, 90.0];
        let cols = [0.0, 200.0]; // 1 col < 2
        assert!(assemble(&rows, &cols, &cfg()).is_none());
    }

    #[test]
    fn test_duplicate_boundaries_collapse() {
        let rows = [0.0, 30.0, 30.0, 60.0, 90.0];
        let cols = [0.0, 100.0, 200.0];
        let grid = assemble(&rows, &cols, &cfg()).unwrap();
        assert_eq!(grid.n_rows, 3);
        for w in grid.row_boundaries.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn test_lookup_by_position() {
        let rows = [0.0, 30.0, 60.0, 90.0];
        let cols = [0.0, 100.0, 200.0];
        let grid = assemble(&rows, &cols, &cfg()).unwrap();

        assert_eq!(grid.row_at(45.0), Some(1));
        assert_eq!(grid.col_at(150.0), Some(1));
        assert_eq!(grid.row_at(90.0), Some(2));
        assert_eq!(grid.row_at(91.0), None);
        assert_eq!(grid.col_at(-1.0), None);
    }
}
