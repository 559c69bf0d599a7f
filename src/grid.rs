use glam::{IVec3, UVec3};

use crate::error::Error;

/// Two equally sized cell buffers; one is read while the other is written.
#[derive(Clone, Debug)]
pub struct DoubleBuffer {
    buffers: [Vec<u32>; 2],
    i: usize,
}

impl DoubleBuffer {
    pub fn new(cells: Vec<u32>) -> Self {
        let second = vec![0; cells.len()];
        Self {
            buffers: [cells, second],
            i: 0,
        }
    }

    pub fn read(&self) -> &[u32] {
        &self.buffers[self.i]
    }

    pub fn read_mut(&mut self) -> &mut [u32] {
        &mut self.buffers[self.i]
    }

    /// Current buffer for reading and the next buffer for writing, borrowed together.
    pub fn split(&mut self) -> (&[u32], &mut [u32]) {
        let [first, second] = &mut self.buffers;
        if self.i == 0 {
            (first.as_slice(), second.as_mut_slice())
        } else {
            (second.as_slice(), first.as_mut_slice())
        }
    }

    pub fn next(&mut self) {
        self.i = (self.i + 1) % 2;
    }

    pub fn clear(&mut self) {
        for buffer in &mut self.buffers {
            buffer.fill(0);
        }
        self.i = 0;
    }
}

/// Linear index of `pos` in a grid of `dim`, x fastest then y then z.
#[inline]
pub fn offset(dim: UVec3, pos: UVec3) -> usize {
    let size_of_layer = dim.x as usize * dim.y as usize;
    let offset_in_layer_to_row = dim.x as usize * pos.y as usize;
    (size_of_layer * pos.z as usize) + offset_in_layer_to_row + pos.x as usize
}

#[inline]
pub fn position(dim: UVec3, index: usize) -> UVec3 {
    let size_of_layer = dim.x as usize * dim.y as usize;
    let in_layer = index % size_of_layer;
    UVec3::new(
        (in_layer % dim.x as usize) as u32,
        (in_layer / dim.x as usize) as u32,
        (index / size_of_layer) as u32,
    )
}

/// Neighbor of `pos` displaced by `delta` (each component in -1..=1), wrapping on every axis.
#[inline]
pub fn wrapped_neighbor(dim: UVec3, pos: UVec3, delta: IVec3) -> UVec3 {
    let wrap = |p: u32, d: i32, size: u32| -> u32 {
        match d {
            d if d < 0 && p == 0 => size - 1,
            d if d > 0 && p == size - 1 => 0,
            d => (p as i64 + d as i64) as u32,
        }
    };
    UVec3::new(
        wrap(pos.x, delta.x, dim.x),
        wrap(pos.y, delta.y, dim.y),
        wrap(pos.z, delta.z, dim.z),
    )
}

/// Neighbor of `pos` displaced by `delta`, or `None` past the grid boundary.
#[inline]
pub fn bounded_neighbor(dim: UVec3, pos: UVec3, delta: IVec3) -> Option<UVec3> {
    let neighbor = pos.as_ivec3() + delta;
    let inside = neighbor.cmpge(IVec3::ZERO).all() && neighbor.cmplt(dim.as_ivec3()).all();
    inside.then(|| neighbor.as_uvec3())
}

/// The 26 offsets of a 3x3x3 neighborhood without its center.
pub fn moore_offsets() -> impl Iterator<Item = IVec3> {
    (-1..=1)
        .flat_map(|z| (-1..=1).flat_map(move |y| (-1..=1).map(move |x| IVec3::new(x, y, z))))
        .filter(|delta| *delta != IVec3::ZERO)
}

/// Dense, double-buffered volume of cell states.
#[derive(Clone, Debug)]
pub struct Grid {
    dim: UVec3,
    buffer: DoubleBuffer,
}

impl Grid {
    pub fn new(dim: UVec3) -> Result<Self, Error> {
        if dim.cmpeq(UVec3::ZERO).any() {
            return Err(Error::EmptyGrid(dim));
        }
        let size = dim.x as usize * dim.y as usize * dim.z as usize;
        Ok(Self {
            dim,
            buffer: DoubleBuffer::new(vec![0; size]),
        })
    }

    pub fn dim(&self) -> UVec3 {
        self.dim
    }

    pub fn size(&self) -> usize {
        self.buffer.read().len()
    }

    pub fn offset(&self, pos: UVec3) -> usize {
        offset(self.dim, pos)
    }

    pub fn get(&self, pos: UVec3) -> u32 {
        self.buffer.read()[self.offset(pos)]
    }

    /// Writes into the current generation. Only valid between passes.
    pub fn set(&mut self, pos: UVec3, state: u32) {
        let offset = self.offset(pos);
        self.buffer.read_mut()[offset] = state;
    }

    pub fn cells(&self) -> &[u32] {
        self.buffer.read()
    }

    pub fn cells_mut(&mut self) -> &mut [u32] {
        self.buffer.read_mut()
    }

    pub fn buffers(&mut self) -> (&[u32], &mut [u32]) {
        self.buffer.split()
    }

    pub fn swap(&mut self) {
        self.buffer.next();
    }

    /// Kills every cell in both buffers.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_x_fastest() {
        let dim = UVec3::new(4, 3, 2);
        assert_eq!(offset(dim, UVec3::new(0, 0, 0)), 0);
        assert_eq!(offset(dim, UVec3::new(1, 0, 0)), 1);
        assert_eq!(offset(dim, UVec3::new(0, 1, 0)), 4);
        assert_eq!(offset(dim, UVec3::new(0, 0, 1)), 12);
        assert_eq!(offset(dim, UVec3::new(3, 2, 1)), 23);
    }

    #[test]
    fn position_inverts_offset() {
        let dim = UVec3::new(5, 3, 4);
        for index in 0..60 {
            assert_eq!(offset(dim, position(dim, index)), index);
        }
    }

    #[test]
    fn neighbors_wrap_per_axis() {
        let dim = UVec3::new(4, 5, 6);
        let corner = UVec3::new(0, 4, 5);
        assert_eq!(
            wrapped_neighbor(dim, corner, IVec3::new(-1, 1, 1)),
            UVec3::new(3, 0, 0)
        );
        assert_eq!(
            wrapped_neighbor(dim, corner, IVec3::new(1, -1, 0)),
            UVec3::new(1, 3, 5)
        );
    }

    #[test]
    fn single_cell_axis_wraps_onto_itself() {
        let dim = UVec3::new(1, 1, 1);
        for delta in moore_offsets() {
            assert_eq!(wrapped_neighbor(dim, UVec3::ZERO, delta), UVec3::ZERO);
        }
    }

    #[test]
    fn bounded_neighbors_stop_at_the_edge() {
        let dim = UVec3::new(2, 2, 2);
        assert_eq!(bounded_neighbor(dim, UVec3::ZERO, IVec3::new(-1, 0, 0)), None);
        assert_eq!(
            bounded_neighbor(dim, UVec3::ZERO, IVec3::new(1, 0, 0)),
            Some(UVec3::new(1, 0, 0))
        );
        assert_eq!(bounded_neighbor(dim, UVec3::ONE, IVec3::new(0, 0, 1)), None);
    }

    #[test]
    fn moore_neighborhood_has_26_cells() {
        assert_eq!(moore_offsets().count(), 26);
    }

    #[test]
    fn rejects_empty_dimensions() {
        assert!(Grid::new(UVec3::new(4, 0, 4)).is_err());
        assert_eq!(Grid::new(UVec3::new(2, 3, 4)).unwrap().size(), 24);
    }

    #[test]
    fn swap_exchanges_buffers_without_copying() {
        let mut grid = Grid::new(UVec3::new(2, 1, 1)).unwrap();
        grid.set(UVec3::ZERO, 1);
        {
            let (read, write) = grid.buffers();
            assert_eq!(read, &[1, 0]);
            write[1] = 1;
        }
        grid.swap();
        assert_eq!(grid.cells(), &[0, 1]);
    }
}
