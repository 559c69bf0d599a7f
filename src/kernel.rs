//! Per-cell state transition.
//!
//! Every cell's next state is a pure function of the previous generation, so the
//! pass is run as one independent rayon task per cell. Tasks read only the
//! committed buffer and write only their own slot of the next buffer.

use glam::UVec3;
use log::debug;
use rayon::prelude::*;

use crate::grid::{self, Grid};
use crate::rule::RuleSpec;

pub const ALIVE: u32 = 1;
pub const DEAD: u32 = 0;

/// Number of the 26 toroidally wrapped neighbors of `pos` that are exactly alive.
pub fn live_neighbors(cells: &[u32], dim: UVec3, pos: UVec3) -> u32 {
    grid::moore_offsets()
        .map(|delta| grid::wrapped_neighbor(dim, pos, delta))
        .filter(|&neighbor| cells[grid::offset(dim, neighbor)] == ALIVE)
        .count() as u32
}

pub fn next_state(rule: &RuleSpec, state: u32, live_neighbors: u32) -> u32 {
    match state {
        ALIVE if rule.survives(live_neighbors) => ALIVE,
        ALIVE => rule.dying_state(),
        // Refractory cells count down and skip straight past alive.
        2 => DEAD,
        refractory if refractory > 2 => refractory - 1,
        _ if rule.born(live_neighbors) => ALIVE,
        _ => DEAD,
    }
}

/// Advances `grid` by one generation under `rule`.
pub fn step(grid: &mut Grid, rule: &RuleSpec) {
    let dim = grid.dim();
    {
        let (previous, next) = grid.buffers();
        debug!("stepping {} cells under {}", previous.len(), rule);
        next.par_iter_mut().enumerate().for_each(|(index, cell)| {
            let pos = grid::position(dim, index);
            let state = previous[index];
            *cell = next_state(rule, state, live_neighbors(previous, dim, pos));
        });
    }
    grid.swap();
}

/// Single-threaded reference step, used to check the parallel pass.
pub fn step_sequential(grid: &mut Grid, rule: &RuleSpec) {
    let dim = grid.dim();
    {
        let (previous, next) = grid.buffers();
        for z in 0..dim.z {
            for y in 0..dim.y {
                for x in 0..dim.x {
                    let pos = UVec3::new(x, y, z);
                    let index = grid::offset(dim, pos);
                    let neighbors = live_neighbors(previous, dim, pos);
                    next[index] = next_state(rule, previous[index], neighbors);
                }
            }
        }
    }
    grid.swap();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn life() -> RuleSpec {
        RuleSpec::parse("B4/S4/5").unwrap()
    }

    #[test]
    fn refractory_cells_count_down_regardless_of_neighbors() {
        let rule = life();
        for n in 0..=26 {
            assert_eq!(next_state(&rule, 4, n), 3);
            assert_eq!(next_state(&rule, 3, n), 2);
            assert_eq!(next_state(&rule, 2, n), 0);
        }
    }

    #[test]
    fn alive_cells_survive_or_enter_longest_refractory_state() {
        let rule = life();
        assert_eq!(next_state(&rule, 1, 4), 1);
        assert_eq!(next_state(&rule, 1, 3), 4);

        let two_state = RuleSpec::parse("B4/S4").unwrap();
        assert_eq!(next_state(&two_state, 1, 3), 0);
    }

    #[test]
    fn dead_cells_are_born_only_on_birth_counts() {
        let rule = life();
        assert_eq!(next_state(&rule, 0, 4), 1);
        assert_eq!(next_state(&rule, 0, 5), 0);
    }

    #[test]
    fn only_alive_neighbors_count() {
        let dim = UVec3::new(3, 3, 3);
        let mut cells = vec![0; 27];
        cells[grid::offset(dim, UVec3::new(0, 0, 0))] = 1;
        cells[grid::offset(dim, UVec3::new(2, 0, 0))] = 2;
        cells[grid::offset(dim, UVec3::new(0, 2, 0))] = 4;
        assert_eq!(live_neighbors(&cells, dim, UVec3::ONE), 1);
    }

    #[test]
    fn counting_wraps_around_the_edges() {
        let dim = UVec3::new(5, 5, 5);
        let mut cells = vec![0; 125];
        cells[grid::offset(dim, UVec3::new(4, 2, 2))] = 1;
        assert_eq!(live_neighbors(&cells, dim, UVec3::new(0, 2, 2)), 1);
        cells[grid::offset(dim, UVec3::new(4, 4, 4))] = 1;
        assert_eq!(live_neighbors(&cells, dim, UVec3::new(0, 0, 0)), 1);
    }

    #[test]
    fn degenerate_axes_count_the_same_cell_repeatedly() {
        // With a single layer the z-1 and z+1 neighbors both wrap onto the cell's own layer.
        let dim = UVec3::new(3, 3, 1);
        let mut cells = vec![0; 9];
        cells[grid::offset(dim, UVec3::new(0, 1, 0))] = 1;
        assert_eq!(live_neighbors(&cells, dim, UVec3::new(1, 1, 0)), 3);
    }

    #[test]
    fn step_writes_next_generation_and_swaps() {
        let mut grid = Grid::new(UVec3::new(6, 6, 6)).unwrap();
        let rule = RuleSpec::parse("B1/S26/3").unwrap();
        grid.set(UVec3::new(3, 3, 3), 1);
        step(&mut grid, &rule);

        assert_eq!(grid.get(UVec3::new(3, 3, 3)), 2);
        assert_eq!(grid.get(UVec3::new(2, 3, 3)), 1);
        assert_eq!(grid.get(UVec3::new(4, 4, 4)), 1);
        assert_eq!(grid.get(UVec3::new(0, 0, 0)), 0);
        assert_eq!(grid.cells().iter().filter(|&&c| c == 1).count(), 26);

        step(&mut grid, &rule);
        assert_eq!(grid.get(UVec3::new(3, 3, 3)), 0);
    }

    #[test]
    fn parallel_step_matches_sequential_reference() {
        let rule = RuleSpec::parse("B4,5,10,14,21,25/S6,8,12,13,18,25/6").unwrap();
        let mut parallel = Grid::new(UVec3::new(7, 5, 6)).unwrap();
        for (i, cell) in parallel.cells_mut().iter_mut().enumerate() {
            *cell = ((i * 7919) % 11 % 6) as u32;
        }
        let mut sequential = parallel.clone();

        for _ in 0..4 {
            step(&mut parallel, &rule);
            step_sequential(&mut sequential, &rule);
            assert_eq!(parallel.cells(), sequential.cells());
        }
    }
}
