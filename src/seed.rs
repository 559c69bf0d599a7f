use glam::UVec3;
use rand::Rng;

use crate::grid;
use crate::kernel::{ALIVE, DEAD};

/// Ways of writing cells into a grid between generations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Seed {
    /// Each cell of a centered cube of edge `width` becomes alive with probability `1 / one_in`.
    /// Cells that are not picked keep their state.
    RandomCube { one_in: u32, width: u32 },
    /// Every cell becomes dead.
    Clear,
}

impl Seed {
    pub fn random_cube(one_in: u32, width: u32) -> Self {
        Seed::RandomCube { one_in, width }
    }

    pub fn apply<R: Rng>(&self, cells: &mut [u32], dim: UVec3, rng: &mut R) {
        match *self {
            Seed::RandomCube { one_in, width } => {
                let one_in = one_in.max(1);
                let (min, max) = centered_cube(dim, width);
                for z in min.z..max.z {
                    for y in min.y..max.y {
                        for x in min.x..max.x {
                            if rng.gen_range(0..one_in) == 0 {
                                cells[grid::offset(dim, UVec3::new(x, y, z))] = ALIVE;
                            }
                        }
                    }
                }
            }
            Seed::Clear => cells.fill(DEAD),
        }
    }
}

/// Bounds of a cube of edge `width` centered in `dim`, clamped to the grid.
fn centered_cube(dim: UVec3, width: u32) -> (UVec3, UVec3) {
    let axis = |size: u32| {
        let width = width.min(size);
        let start = (size - width) / 2;
        (start, start + width)
    };
    let (x0, x1) = axis(dim.x);
    let (y0, y1) = axis(dim.y);
    let (z0, z1) = axis(dim.z);
    (UVec3::new(x0, y0, z0), UVec3::new(x1, y1, z1))
}
