use glam::UVec3;
use thiserror::Error;

use crate::rule::RuleError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error("grid dimensions must all be positive, got {0:?}")]
    EmptyGrid(UVec3),
    #[error("cell {pos:?} lies outside the {dim:?} grid")]
    CellOutOfBounds { pos: UVec3, dim: UVec3 },
    #[error("state {state} is outside the active rule's {state_count} states")]
    StateOutOfRange { state: u32, state_count: u32 },
    #[error("a {dim:?} grid needs a {bytes} byte buffer, the device allows {limit}")]
    GridTooLarge { dim: UVec3, bytes: u64, limit: u64 },
    #[error("no GPU adapter is available")]
    NoAdapter,
    #[error("failed to open GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("failed to map GPU buffer: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),
    #[error("GPU buffer mapping was abandoned before it completed")]
    MapAbandoned,
}
