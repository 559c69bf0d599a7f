//! WGSL generation for the compute backend.
//!
//! Grid dimensions are baked into each module as constants, so a new module is
//! built whenever the grid or rule changes.

use glam::UVec3;

use crate::mesh::{FaceDirection, Vertex, ABSENT_COORDINATE, VERTICES_PER_FACE};
use crate::rule::RuleSpec;
use crate::rule_shader::transition_program;

/// Edge of the cubic workgroup both pipelines are dispatched with.
pub const WORKGROUP_SIZE: u32 = 4;

/// 32-bit words per mesh vertex and per face slot.
pub const VERTEX_WORDS: usize = std::mem::size_of::<Vertex>() / 4;
pub const SLOT_WORDS: usize = VERTEX_WORDS * VERTICES_PER_FACE;

/// Workgroup counts covering every cell of `dim`.
pub fn workgroups(dim: UVec3) -> (u32, u32, u32) {
    let groups = |size: u32| (size + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;
    (groups(dim.x), groups(dim.y), groups(dim.z))
}

fn dimension_constants(dim: UVec3) -> String {
    format!(
        "let WIDTH: u32 = {}u;\nlet HEIGHT: u32 = {}u;\nlet DEPTH: u32 = {}u;\n",
        dim.x, dim.y, dim.z
    )
}

const CELL_INDEX: &str = "
fn cell_index(x: u32, y: u32, z: u32) -> u32 {
    return x + y * WIDTH + z * WIDTH * HEIGHT;
}
";

pub fn transition_shader(rule: &RuleSpec, dim: UVec3) -> String {
    let program = transition_program(rule).to_shader();
    format!(
        r#"@group(0) @binding(0) var<storage, read> previous_state: array<u32>;
@group(0) @binding(1) var<storage, read_write> future_state: array<u32>;

{constants}{cell_index}
fn wrap(p: u32, delta: i32, size: u32) -> u32 {{
    return u32((i32(p) + delta + i32(size)) % i32(size));
}}

fn alive_at(x: u32, y: u32, z: u32) -> u32 {{
    return select(0u, 1u, previous_state[cell_index(x, y, z)] == 1u);
}}

@compute @workgroup_size({wg}, {wg}, {wg})
fn main(@builtin(global_invocation_id) id: vec3<u32>) {{
    if (id.x >= WIDTH || id.y >= HEIGHT || id.z >= DEPTH) {{
        return;
    }}

    var num_neighbors = 0u;
    for (var dz = -1; dz <= 1; dz = dz + 1) {{
        for (var dy = -1; dy <= 1; dy = dy + 1) {{
            for (var dx = -1; dx <= 1; dx = dx + 1) {{
                if (dx == 0 && dy == 0 && dz == 0) {{
                    continue;
                }}
                num_neighbors = num_neighbors + alive_at(
                    wrap(id.x, dx, WIDTH),
                    wrap(id.y, dy, HEIGHT),
                    wrap(id.z, dz, DEPTH)
                );
            }}
        }}
    }}

    let index = cell_index(id.x, id.y, id.z);
    let state = previous_state[index];
    var result = 0u;
    {program}
    future_state[index] = result;
}}
"#,
        constants = dimension_constants(dim),
        cell_index = CELL_INDEX,
        wg = WORKGROUP_SIZE,
        program = program,
    )
}

/// Packs the unit-cube corners of every face, three bits per corner, in slot order.
fn packed_face_corners() -> [u32; 6] {
    FaceDirection::ALL.map(|dir| {
        dir.corners()
            .iter()
            .enumerate()
            .fold(0, |packed, (i, corner)| {
                let bits = corner[0] as u32 | (corner[1] as u32) << 1 | (corner[2] as u32) << 2;
                packed | bits << (3 * i)
            })
    })
}

fn wgsl_array<T: std::fmt::Display>(ty: &str, values: &[T], suffix: &str) -> String {
    let values: Vec<String> = values.iter().map(|v| format!("{}{}", v, suffix)).collect();
    format!("array<{}, {}>({})", ty, values.len(), values.join(", "))
}

pub fn meshing_shader(dim: UVec3) -> String {
    let normals = FaceDirection::ALL.map(|dir| dir.normal());
    let axis = |f: fn(&glam::IVec3) -> i32| normals.iter().map(f).collect::<Vec<i32>>();

    format!(
        r#"@group(0) @binding(0) var<storage, read> cells: array<u32>;
@group(0) @binding(1) var<storage, read> palette: array<u32>;
@group(0) @binding(2) var<storage, read_write> mesh: array<u32>;

{constants}let ABSENT: f32 = {absent:.1e};
let ABSENT_RGB: u32 = 0xffffffffu;
let FALLBACK_RGB: u32 = 0xffffffu;
{cell_index}
fn write_vertex(slot: u32, corner: u32, pos: vec3<f32>, rgb: u32) {{
    let base = slot * {slot_words}u + corner * {vertex_words}u;
    mesh[base] = bitcast<u32>(pos.x);
    mesh[base + 1u] = bitcast<u32>(pos.y);
    mesh[base + 2u] = bitcast<u32>(pos.z);
    mesh[base + 3u] = rgb;
}}

fn neighbor_dead(x: i32, y: i32, z: i32) -> bool {{
    if (x < 0 || y < 0 || z < 0 || x >= i32(WIDTH) || y >= i32(HEIGHT) || z >= i32(DEPTH)) {{
        return true;
    }}
    return cells[cell_index(u32(x), u32(y), u32(z))] == 0u;
}}

@compute @workgroup_size({wg}, {wg}, {wg})
fn main(@builtin(global_invocation_id) id: vec3<u32>) {{
    if (id.x >= WIDTH || id.y >= HEIGHT || id.z >= DEPTH) {{
        return;
    }}

    var corners = {corners};
    var normal_x = {normal_x};
    var normal_y = {normal_y};
    var normal_z = {normal_z};

    let index = cell_index(id.x, id.y, id.z);
    let state = cells[index];
    var color = FALLBACK_RGB;
    if (state < arrayLength(&palette)) {{
        color = palette[state];
    }}
    let origin = vec3<f32>(f32(id.x), f32(id.y), f32(id.z));

    for (var face = 0u; face < 6u; face = face + 1u) {{
        let slot = index * 6u + face;
        if (state == 0u && mesh[slot * {slot_words}u] == bitcast<u32>(ABSENT)) {{
            continue;
        }}

        var exposed = false;
        if (state != 0u) {{
            exposed = neighbor_dead(
                i32(id.x) + normal_x[face],
                i32(id.y) + normal_y[face],
                i32(id.z) + normal_z[face]
            );
        }}

        let packed = corners[face];
        for (var corner = 0u; corner < 4u; corner = corner + 1u) {{
            if (exposed) {{
                let bits = (packed >> (corner * 3u)) & 7u;
                let offset = vec3<f32>(
                    f32(bits & 1u),
                    f32((bits >> 1u) & 1u),
                    f32((bits >> 2u) & 1u)
                );
                write_vertex(slot, corner, origin + offset, color);
            }} else {{
                write_vertex(slot, corner, vec3<f32>(ABSENT, ABSENT, ABSENT), ABSENT_RGB);
            }}
        }}
    }}
}}
"#,
        constants = dimension_constants(dim),
        absent = ABSENT_COORDINATE,
        cell_index = CELL_INDEX,
        wg = WORKGROUP_SIZE,
        slot_words = SLOT_WORDS,
        vertex_words = VERTEX_WORDS,
        corners = wgsl_array("u32", &packed_face_corners(), "u"),
        normal_x = wgsl_array("i32", &axis(|n| n.x), ""),
        normal_y = wgsl_array("i32", &axis(|n| n.y), ""),
        normal_z = wgsl_array("i32", &axis(|n| n.z), ""),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{moore_offsets, wrapped_neighbor};
    use glam::Vec3;

    fn validate(source: &str) {
        let module = naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|err| panic!("{:?}\n{}", err, source));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .unwrap_or_else(|err| panic!("{:?}\n{}", err, source));
    }

    /// Host rendering of the transition shader's `wrap` body.
    fn shader_wrap(p: u32, delta: i32, size: u32) -> u32 {
        ((p as i32 + delta + size as i32) % size as i32) as u32
    }

    #[test]
    fn workgroups_cover_partial_blocks() {
        assert_eq!(workgroups(UVec3::new(4, 5, 1)), (1, 2, 1));
        assert_eq!(workgroups(UVec3::new(128, 128, 128)), (32, 32, 32));
    }

    #[test]
    fn transition_shader_bakes_dimensions_and_rule() {
        let rule = RuleSpec::parse("B4/S4/5").unwrap();
        let shader = transition_shader(&rule, UVec3::new(8, 16, 32));
        assert!(shader.contains("let WIDTH: u32 = 8u;"));
        assert!(shader.contains("let HEIGHT: u32 = 16u;"));
        assert!(shader.contains("let DEPTH: u32 = 32u;"));
        assert!(shader.contains(&transition_program(&rule).to_shader()));
        assert!(shader.contains("result = 4u;"));
        assert!(shader.contains("@workgroup_size(4, 4, 4)"));
    }

    #[test]
    fn shaders_validate() {
        let rules = ["B3/S2,3", "B 2,6,9 / S 4,6,8,9 / 10", "B0/S26/255"];
        for rule in rules {
            let rule = RuleSpec::parse(rule).unwrap();
            for dim in [UVec3::ONE, UVec3::new(2, 5, 3), UVec3::new(128, 128, 128)] {
                validate(&transition_shader(&rule, dim));
            }
        }
        for dim in [UVec3::ONE, UVec3::new(7, 1, 4)] {
            validate(&meshing_shader(dim));
        }
    }

    #[test]
    fn shader_wrap_matches_host_wrap() {
        let shader = transition_shader(&RuleSpec::parse("B3/S2,3").unwrap(), UVec3::ONE);
        assert!(shader.contains("return u32((i32(p) + delta + i32(size)) % i32(size));"));

        for size in [1, 2, 5] {
            let dim = UVec3::splat(size);
            for p in 0..size {
                let pos = UVec3::splat(p);
                for delta in moore_offsets() {
                    let host = wrapped_neighbor(dim, pos, delta);
                    let wrapped = UVec3::new(
                        shader_wrap(p, delta.x, size),
                        shader_wrap(p, delta.y, size),
                        shader_wrap(p, delta.z, size),
                    );
                    assert_eq!(wrapped, host, "size {} pos {} delta {:?}", size, p, delta);
                }
            }
        }
    }

    #[test]
    fn corners_unpack_to_face_corners() {
        let packed = packed_face_corners();
        for (dir, packed) in FaceDirection::ALL.iter().zip(packed) {
            for (i, corner) in dir.corners().iter().enumerate() {
                let bits = (packed >> (3 * i)) & 7;
                let unpacked = Vec3::new(
                    (bits & 1) as f32,
                    ((bits >> 1) & 1) as f32,
                    ((bits >> 2) & 1) as f32,
                );
                assert_eq!(unpacked, *corner);
            }
        }
    }

    #[test]
    fn meshing_shader_carries_slot_layout() {
        assert_eq!(VERTEX_WORDS, 4);
        assert_eq!(SLOT_WORDS, 16);

        let shader = meshing_shader(UVec3::new(3, 3, 3));
        assert!(shader.contains("let ABSENT: f32 = 1.0e38;"));
        assert!(shader.contains("var normal_x = array<i32, 6>(-1, 1, 0, 0, 0, 0);"));
        assert!(shader.contains("var normal_z = array<i32, 6>(0, 0, 0, 0, -1, 1);"));
        assert!(shader.contains("let slot = index * 6u + face;"));
        assert!(shader.contains("let base = slot * 16u + corner * 4u;"));
    }

    #[test]
    fn meshing_shader_skips_only_dead_absent_slots() {
        let shader = meshing_shader(UVec3::new(3, 3, 3));
        // The skip reads the first word of the slot, the x coordinate of its first vertex.
        let absent_bits = Vertex::ABSENT.pos[0].to_bits();
        assert_eq!(absent_bits, ABSENT_COORDINATE.to_bits());
        assert!(shader
            .contains("if (state == 0u && mesh[slot * 16u] == bitcast<u32>(ABSENT)) {"));
        // Live cells always rewrite their slots.
        assert!(shader.contains("if (state != 0u) {"));
    }
}
