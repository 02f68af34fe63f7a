use anyhow::Result;
use simulation_common::{SimParams, Vec2};

/// One bucket of the grid: indices of the bodies binned here this frame.
#[derive(Debug, Clone)]
pub struct Cell {
    is_empty: bool,
    bodies: Vec<usize>,
}

impl Cell {
    fn new() -> Self {
        Cell { is_empty: true, bodies: Vec::new() }
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Indices into the body collection, in insertion order.
    #[inline(always)]
    pub fn bodies(&self) -> &[usize] {
        &self.bodies
    }
}

/// Uniform `rows x columns` lattice over the arena `[0, W) x [0, H)`.
///
/// Rebuilt every frame: `reset`, then `insert` every body. Cells only hold
/// indices, the body collection stays the owner. Cell size is fixed at
/// construction and does not adapt to body density.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    rows: usize,
    columns: usize,
    cell_size: Vec2,
    cells: Vec<Cell>,
}

impl SpatialGrid {
    pub fn new(rows: usize, columns: usize, arena: Vec2) -> Result<Self> {
        if rows == 0 || columns == 0 {
            anyhow::bail!("Grid needs at least one row and one column (got {}x{}).", rows, columns);
        }
        if !(arena.x > 0.0 && arena.y > 0.0) || !arena.is_finite() {
            anyhow::bail!("Arena size must be positive and finite (got {}x{}).", arena.x, arena.y);
        }
        let cell_size = Vec2::new(arena.x / columns as f32, arena.y / rows as f32);
        log::debug!(
            "Spatial grid {}x{} over {}x{} arena, cell size {:.2}x{:.2}",
            rows, columns, arena.x, arena.y, cell_size.x, cell_size.y
        );
        Ok(SpatialGrid {
            rows,
            columns,
            cell_size,
            cells: vec![Cell::new(); rows * columns],
        })
    }

    pub fn from_params(params: &SimParams) -> Result<Self> {
        Self::new(params.grid_rows as usize, params.grid_columns as usize, params.arena())
    }

    pub fn rows(&self) -> usize { self.rows }
    pub fn columns(&self) -> usize { self.columns }
    pub fn cell_size(&self) -> Vec2 { self.cell_size }
    pub fn len(&self) -> usize { self.cells.len() }
    pub fn is_empty(&self) -> bool { self.cells.is_empty() }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Clears every cell and marks it empty.
    pub fn reset(&mut self) {
        for cell in &mut self.cells {
            cell.is_empty = true;
            cell.bodies.clear();
        }
    }

    /// Flattened cell index `row * columns + column` for a position.
    ///
    /// The range check applies to the flattened index, so a centre just past
    /// the left or right wall lands in the edge cell of the neighbouring row.
    /// Anything whose index falls outside the lattice, or that is not finite,
    /// maps to `None`.
    #[inline]
    pub fn cell_index(&self, position: Vec2) -> Option<usize> {
        if !position.is_finite() {
            return None;
        }
        let column = (position.x / self.cell_size.x).floor() as i64;
        let row = (position.y / self.cell_size.y).floor() as i64;
        // far-off centres saturate the casts above; treat overflow as off-lattice
        let index = row.checked_mul(self.columns as i64)?.checked_add(column)?;
        if index >= 0 && (index as usize) < self.cells.len() {
            Some(index as usize)
        } else {
            None
        }
    }

    /// Bins body `body_index` at `position`. Returns the cell it went into,
    /// or `None` if it was left out of this frame's collision pass.
    #[inline]
    pub fn insert(&mut self, body_index: usize, position: Vec2) -> Option<usize> {
        let index = self.cell_index(position)?;
        let cell = &mut self.cells[index];
        cell.bodies.push(body_index);
        cell.is_empty = false;
        Some(index)
    }

    /// Iterates `(cell_index, cell)` over cells holding at least one body.
    pub fn non_empty_cells(&self) -> impl Iterator<Item = (usize, &Cell)> + '_ {
        self.cells.iter().enumerate().filter(|(_, cell)| !cell.is_empty)
    }

    pub fn for_each_non_empty_cell<F>(&self, mut f: F)
    where
        F: FnMut(usize, &Cell),
    {
        for (index, cell) in self.non_empty_cells() {
            f(index, cell);
        }
    }

    /// Number of body references currently binned.
    pub fn binned_count(&self) -> usize {
        self.cells.iter().map(|c| c.bodies.len()).sum()
    }
}
