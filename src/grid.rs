use glam::Vec2;

use crate::SimError;

/// One of the four axis neighbours of a cell.
///
/// North is `y - 1`, south is `y + 1`; rows grow downwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Slot of this direction in a flux array.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    #[inline]
    pub const fn offset(self) -> (isize, isize) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }
}

/// Shape of the simulation domain: a row-major `width * height` grid of
/// square cells of side `cell_size`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    cell_size: f32,
}

impl Grid {
    pub fn new(width: usize, height: usize, cell_size: f32) -> Result<Self, SimError> {
        if width == 0 || height == 0 || width.checked_mul(height).is_none() {
            return Err(SimError::InvalidGrid { width, height });
        }
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(SimError::InvalidCellSize(cell_size));
        }
        Ok(Self {
            width,
            height,
            cell_size,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Total number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    /// Index of the neighbour in `dir`, or `None` when it lies outside the grid.
    #[inline]
    pub fn neighbour(&self, x: usize, y: usize, dir: Direction) -> Option<usize> {
        let (dx, dy) = dir.offset();
        let nx = x.checked_add_signed(dx).filter(|&nx| nx < self.width)?;
        let ny = y.checked_add_signed(dy).filter(|&ny| ny < self.height)?;
        Some(self.index(nx, ny))
    }

    /// Index of the neighbour in `dir`, clamped to the grid edge. At the
    /// boundary this is the cell itself.
    #[inline]
    pub fn clamped(&self, x: usize, y: usize, dir: Direction) -> usize {
        self.neighbour(x, y, dir)
            .unwrap_or_else(|| self.index(x, y))
    }

    /// Converts a position in `[0, 1]^2` to continuous grid coordinates.
    #[inline]
    pub fn denormalize(&self, normalized: Vec2) -> Vec2 {
        normalized * Vec2::new(self.width as f32, self.height as f32)
    }

    /// Centre of cell `(x, y)` in grid coordinates.
    #[inline]
    pub fn cell_center(&self, x: usize, y: usize) -> Vec2 {
        Vec2::new(x as f32 + 0.5, y as f32 + 0.5)
    }
}
