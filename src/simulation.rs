use glam::UVec3;
use log::{info, warn};
use rand::Rng;

use crate::error::Error;
use crate::grid::Grid;
use crate::kernel;
use crate::mesh::{self, Mesh};
use crate::palette::Palette;
use crate::rule::{RuleError, RuleSpec};
use crate::seed::Seed;

/// Cell counts for one generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Census {
    pub alive: usize,
    pub refractory: usize,
}

pub fn census(cells: &[u32]) -> Census {
    cells.iter().fold(Census::default(), |mut census, &state| {
        match state {
            0 => {}
            1 => census.alive += 1,
            _ => census.refractory += 1,
        }
        census
    })
}

/// Host simulation: the active rule, its grid and the mesh derived from it.
pub struct Simulation {
    rule: RuleSpec,
    grid: Grid,
    palette: Palette,
    mesh: Mesh,
    generation: u64,
}

impl Simulation {
    pub fn new(dim: UVec3, rule: &str, palette: Palette) -> Result<Self, Error> {
        let rule = RuleSpec::parse(rule)?;
        let grid = Grid::new(dim)?;
        info!("new {:?} simulation under {}", dim, rule);
        Ok(Self {
            rule,
            grid,
            palette,
            mesh: Mesh::new(dim),
            generation: 0,
        })
    }

    /// Replaces the active rule.
    ///
    /// On a parse failure nothing changes and the previous rule keeps running. On
    /// success both cell buffers are cleared, since states from the old rule may not
    /// exist under the new one.
    pub fn set_rule(&mut self, rule: &str) -> Result<(), RuleError> {
        let rule = match RuleSpec::parse(rule) {
            Ok(rule) => rule,
            Err(err) => {
                warn!("rejected rule {:?}, keeping {}: {}", rule, self.rule, err);
                return Err(err);
            }
        };

        info!("rule changed from {} to {}", self.rule, rule);
        self.rule = rule;
        self.grid.clear();
        self.mesh.clear();
        self.generation = 0;
        Ok(())
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    pub fn rule(&self) -> &RuleSpec {
        &self.rule
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn dim(&self) -> UVec3 {
        self.grid.dim()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn cells(&self) -> &[u32] {
        self.grid.cells()
    }

    /// Raw current buffer for external editing between passes.
    pub fn cells_mut(&mut self) -> &mut [u32] {
        self.grid.cells_mut()
    }

    pub fn set_cell(&mut self, pos: UVec3, state: u32) -> Result<(), Error> {
        let dim = self.grid.dim();
        if pos.cmpge(dim).any() {
            return Err(Error::CellOutOfBounds { pos, dim });
        }
        if state >= self.rule.state_count() {
            return Err(Error::StateOutOfRange {
                state,
                state_count: self.rule.state_count(),
            });
        }
        self.grid.set(pos, state);
        Ok(())
    }

    pub fn seed<R: Rng>(&mut self, seed: &Seed, rng: &mut R) {
        let dim = self.grid.dim();
        seed.apply(self.grid.cells_mut(), dim, rng);
    }

    pub fn step(&mut self) {
        kernel::step(&mut self.grid, &self.rule);
        self.generation += 1;
    }

    pub fn remesh(&mut self) -> &Mesh {
        mesh::mesh_cells(self.grid.cells(), &self.palette, &mut self.mesh);
        &self.mesh
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn census(&self) -> Census {
        census(self.grid.cells())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulation(rule: &str) -> Simulation {
        let palette = Palette::gradient(5, 0xff0000, 0x0000ff);
        Simulation::new(UVec3::new(6, 6, 6), rule, palette).unwrap()
    }

    #[test]
    fn rejects_bad_initial_rule() {
        let result = Simulation::new(UVec3::new(4, 4, 4), "B3S2", Palette::new(vec![0, 1]));
        assert!(matches!(result, Err(Error::Rule(RuleError::MissingSeparator(_)))));
    }

    #[test]
    fn failed_rule_change_keeps_everything() {
        let mut sim = simulation("B4/S4/5");
        sim.set_cell(UVec3::new(1, 1, 1), 1).unwrap();
        sim.step();
        let cells = sim.cells().to_vec();

        assert!(sim.set_rule("B4/S4/256").is_err());
        assert_eq!(sim.rule(), &RuleSpec::parse("B4/S4/5").unwrap());
        assert_eq!(sim.cells(), cells.as_slice());
        assert_eq!(sim.generation(), 1);

        // The old rule is still the one being simulated.
        sim.step();
        assert_eq!(sim.grid().get(UVec3::new(1, 1, 1)), 3);
    }

    #[test]
    fn successful_rule_change_resets_the_grid() {
        let mut sim = simulation("B4/S4/5");
        sim.set_cell(UVec3::new(2, 2, 2), 4).unwrap();
        sim.step();
        sim.set_rule("B3/S2,3").unwrap();
        assert_eq!(sim.rule().state_count(), 2);
        assert!(sim.cells().iter().all(|&c| c == 0));
        assert_eq!(sim.generation(), 0);
        assert_eq!(sim.mesh().emitted_count(), 0);
    }

    #[test]
    fn set_cell_rejects_states_outside_the_rule() {
        let mut sim = simulation("B4/S4/3");
        assert!(sim.set_cell(UVec3::ZERO, 2).is_ok());
        assert!(matches!(
            sim.set_cell(UVec3::new(0, 6, 0), 1),
            Err(Error::CellOutOfBounds { .. })
        ));
        assert!(matches!(
            sim.set_cell(UVec3::ZERO, 3),
            Err(Error::StateOutOfRange { state: 3, state_count: 3 })
        ));
    }

    #[test]
    fn census_splits_alive_and_refractory() {
        assert_eq!(
            census(&[0, 1, 1, 2, 4, 0]),
            Census {
                alive: 2,
                refractory: 2
            }
        );
    }
}
