//! Exposed-face surface extraction.
//!
//! The mesh holds one slot per (cell, face direction) pair, six per cell, each
//! slot four vertices wide. A slot whose face is not visible is filled with
//! [`Vertex::ABSENT`], a coordinate no cell can produce, so the buffer can be
//! drawn as-is and the vertex stage can discard those quads.

use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::{IVec3, UVec3, Vec3};
use log::debug;
use rayon::prelude::*;
use wgpu::{VertexAttribute, VertexBufferLayout};

use crate::grid;
use crate::palette::Palette;

pub const ABSENT_COORDINATE: f32 = 1e38;
pub const FACES_PER_CELL: usize = 6;
pub const VERTICES_PER_FACE: usize = 4;

/// Two triangles per face slot: bottom-left, bottom-right, top-left and
/// top-right, top-left, bottom-right.
pub const QUAD_TRIANGLES: [u32; 6] = [0, 1, 3, 2, 3, 1];

#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub rgb: u32,
}

impl Vertex {
    pub const ABSENT: Vertex = Vertex {
        pos: [ABSENT_COORDINATE; 3],
        rgb: 0xffff_ffff,
    };

    pub fn is_absent(&self) -> bool {
        self.pos[0] == ABSENT_COORDINATE
    }

    pub fn layout<'a>() -> VertexBufferLayout<'a> {
        const ATTRS: [VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Uint32];
        VertexBufferLayout {
            array_stride: mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRS,
        }
    }
}

pub type FaceSlot = [Vertex; VERTICES_PER_FACE];

pub const ABSENT_SLOT: FaceSlot = [Vertex::ABSENT; VERTICES_PER_FACE];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaceDirection {
    NegX,
    PosX,
    NegY,
    PosY,
    NegZ,
    PosZ,
}

impl FaceDirection {
    pub const ALL: [FaceDirection; FACES_PER_CELL] = [
        FaceDirection::NegX,
        FaceDirection::PosX,
        FaceDirection::NegY,
        FaceDirection::PosY,
        FaceDirection::NegZ,
        FaceDirection::PosZ,
    ];

    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn normal(self) -> IVec3 {
        match self {
            FaceDirection::NegX => IVec3::new(-1, 0, 0),
            FaceDirection::PosX => IVec3::new(1, 0, 0),
            FaceDirection::NegY => IVec3::new(0, -1, 0),
            FaceDirection::PosY => IVec3::new(0, 1, 0),
            FaceDirection::NegZ => IVec3::new(0, 0, -1),
            FaceDirection::PosZ => IVec3::new(0, 0, 1),
        }
    }

    /// Unit-cube corners of this face: bottom-left, bottom-right, top-right, top-left.
    pub fn corners(self) -> [Vec3; VERTICES_PER_FACE] {
        let v = Vec3::new;
        match self {
            FaceDirection::NegX => [v(0., 0., 0.), v(0., 0., 1.), v(0., 1., 1.), v(0., 1., 0.)],
            FaceDirection::PosX => [v(1., 0., 0.), v(1., 1., 0.), v(1., 1., 1.), v(1., 0., 1.)],
            FaceDirection::NegY => [v(0., 0., 0.), v(1., 0., 0.), v(1., 0., 1.), v(0., 0., 1.)],
            FaceDirection::PosY => [v(0., 1., 0.), v(0., 1., 1.), v(1., 1., 1.), v(1., 1., 0.)],
            FaceDirection::NegZ => [v(0., 0., 0.), v(0., 1., 0.), v(1., 1., 0.), v(1., 0., 0.)],
            FaceDirection::PosZ => [v(0., 0., 1.), v(1., 0., 1.), v(1., 1., 1.), v(0., 1., 1.)],
        }
    }
}

/// A decoded face slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Face {
    Quad(FaceSlot),
    Absent,
}

/// Flat per-(cell, face) vertex storage with a stable layout across passes.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    dim: UVec3,
    slots: Vec<FaceSlot>,
}

impl Mesh {
    pub fn new(dim: UVec3) -> Self {
        let cells = dim.x as usize * dim.y as usize * dim.z as usize;
        let slots = vec![ABSENT_SLOT; cells * FACES_PER_CELL];
        debug!(
            "mesh storage: {} slots, {} bytes",
            slots.len(),
            slots.len() * mem::size_of::<FaceSlot>()
        );
        Self { dim, slots }
    }

    pub fn dim(&self) -> UVec3 {
        self.dim
    }

    pub fn slots(&self) -> &[FaceSlot] {
        &self.slots
    }

    pub fn vertices(&self) -> &[Vertex] {
        bytemuck::cast_slice(&self.slots)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.slots)
    }

    pub fn face(&self, cell: usize, direction: FaceDirection) -> Face {
        let slot = self.slots[cell * FACES_PER_CELL + direction.slot()];
        if slot[0].is_absent() {
            Face::Absent
        } else {
            Face::Quad(slot)
        }
    }

    /// Every emitted face as (cell index, direction, vertices).
    pub fn emitted_faces(&self) -> impl Iterator<Item = (usize, FaceDirection, &FaceSlot)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot[0].is_absent())
            .map(|(i, slot)| {
                (
                    i / FACES_PER_CELL,
                    FaceDirection::ALL[i % FACES_PER_CELL],
                    slot,
                )
            })
    }

    pub fn emitted_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot[0].is_absent()).count()
    }

    pub fn clear(&mut self) {
        self.slots.fill(ABSENT_SLOT);
    }

    /// Index buffer drawing every slot as two triangles.
    pub fn triangle_indices(&self) -> Vec<u32> {
        triangle_indices(self.slots.len())
    }
}

pub fn triangle_indices(face_slots: usize) -> Vec<u32> {
    (0..face_slots as u32)
        .flat_map(|slot| {
            QUAD_TRIANGLES
                .iter()
                .map(move |corner| slot * VERTICES_PER_FACE as u32 + corner)
        })
        .collect()
}

/// Quad for one face of one cell, or `None` when the face is hidden.
///
/// A face is visible when the cell is non-zero and the neighbor across it is dead
/// or lies outside the grid. Meshing never wraps.
pub fn face_slot(
    cells: &[u32],
    dim: UVec3,
    palette: &Palette,
    cell: usize,
    direction: FaceDirection,
) -> Option<FaceSlot> {
    let state = cells[cell];
    if state == 0 {
        return None;
    }

    let pos = grid::position(dim, cell);
    let exposed = match grid::bounded_neighbor(dim, pos, direction.normal()) {
        Some(neighbor) => cells[grid::offset(dim, neighbor)] == 0,
        None => true,
    };
    if !exposed {
        return None;
    }

    let origin = pos.as_vec3();
    let rgb = palette.color(state);
    Some(direction.corners().map(|corner| Vertex {
        pos: (origin + corner).to_array(),
        rgb,
    }))
}

/// Rebuilds every slot of `mesh` from `cells`, one rayon task per (cell, face).
pub fn mesh_cells(cells: &[u32], palette: &Palette, mesh: &mut Mesh) {
    let dim = mesh.dim;
    assert_eq!(
        cells.len() * FACES_PER_CELL,
        mesh.slots.len(),
        "cell buffer does not match the {:?} mesh",
        dim
    );
    debug!("meshing {} cells", cells.len());
    mesh.slots.par_iter_mut().enumerate().for_each(|(i, slot)| {
        let cell = i / FACES_PER_CELL;
        // Dead cells whose slot is already absent have nothing to rewrite.
        if cells[cell] == 0 && slot[0].is_absent() {
            return;
        }
        let direction = FaceDirection::ALL[i % FACES_PER_CELL];
        *slot = face_slot(cells, dim, palette, cell, direction).unwrap_or(ABSENT_SLOT);
    });
}
