//! Static meshes of the street scene.

use glam::Vec3;

use crate::drawable::{DrawableKind, DrawableRegistry, GeometryUploader, MeshData};

const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// Triangle list shared by every axis-aligned box: bottom, four sides, top.
const BOX_INDICES: [u32; 36] = [
    0, 1, 2, 0, 2, 3, //
    0, 4, 5, 0, 5, 1, //
    1, 5, 6, 1, 6, 2, //
    2, 6, 7, 2, 7, 3, //
    3, 7, 4, 3, 4, 0, //
    4, 5, 6, 4, 6, 7, //
];

pub const LANE_Y: f32 = 0.02;
pub const LANE_SEGMENT: f32 = 2.0;
pub const LANE_GAP: f32 = 1.0;

/// Horizontal quad centred on the origin at height `y`.
pub fn ground_quad(half_x: f32, half_z: f32, y: f32) -> MeshData {
    let positions = vec![
        -half_x, y, -half_z, //
        half_x, y, -half_z, //
        half_x, y, half_z, //
        -half_x, y, half_z, //
    ];
    MeshData::indexed(positions, QUAD_INDICES.to_vec())
}

/// Axis-aligned box; corners are emitted bottom ring first, then top ring.
pub fn box_mesh(min: Vec3, max: Vec3) -> MeshData {
    let mut positions = Vec::with_capacity(24);
    for y in [min.y, max.y] {
        for (x, z) in [(min.x, min.z), (max.x, min.z), (max.x, max.z), (min.x, max.z)] {
            positions.extend_from_slice(&[x, y, z]);
        }
    }
    MeshData::indexed(positions, BOX_INDICES.to_vec())
}

/// Dashed centre line: a segment starts every `LANE_SEGMENT + LANE_GAP`
/// while its start is below `max_x`.
pub fn lane_lines(min_x: f32, max_x: f32) -> MeshData {
    let mut positions = Vec::new();
    let mut start = min_x;
    while start < max_x {
        positions.extend_from_slice(&[start, LANE_Y, 0.0]);
        positions.extend_from_slice(&[start + LANE_SEGMENT, LANE_Y, 0.0]);
        start += LANE_SEGMENT + LANE_GAP;
    }
    MeshData::lines(positions)
}

pub fn ground() -> MeshData {
    ground_quad(50.0, 30.0, 0.0)
}

pub fn road() -> MeshData {
    ground_quad(50.0, 5.0, 0.01)
}

pub fn building() -> MeshData {
    box_mesh(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 5.0, 1.0))
}

pub fn car_body() -> MeshData {
    box_mesh(Vec3::new(-1.0, 0.0, -0.5), Vec3::new(1.0, 1.0, 0.5))
}

pub fn wheel() -> MeshData {
    box_mesh(Vec3::new(-0.2, 0.0, -0.1), Vec3::new(0.2, 0.4, 0.1))
}

/// Uploads every built-in mesh. Decorative models are registered separately.
pub fn register_static_meshes<U>(registry: &mut DrawableRegistry, uploader: &mut U)
where
    U: GeometryUploader + ?Sized,
{
    let meshes = [
        (DrawableKind::Ground, ground()),
        (DrawableKind::Road, road()),
        (DrawableKind::LaneLines, lane_lines(-50.0, 50.0)),
        (DrawableKind::Building, building()),
        (DrawableKind::Car, car_body()),
        (DrawableKind::Wheel, wheel()),
    ];
    for (kind, mesh) in &meshes {
        registry.register(*kind, mesh, uploader);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::Topology;
    use crate::render::headless::HeadlessGeometry;

    #[test]
    fn building_matches_reference_corners() {
        let mesh = building();
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(&mesh.positions[..6], &[-1.0, 0.0, -1.0, 1.0, 0.0, -1.0]);
        assert_eq!(&mesh.positions[21..], &[-1.0, 5.0, 1.0]);
        assert_eq!(mesh.element_count(), 36);
    }

    #[test]
    fn lane_lines_cover_road_in_dashes() {
        let mesh = lane_lines(-50.0, 50.0);
        assert_eq!(mesh.topology, Topology::LineList);
        assert_eq!(mesh.vertex_count(), 68);
        assert_eq!(&mesh.positions[..6], &[-50.0, LANE_Y, 0.0, -48.0, LANE_Y, 0.0]);
        let last_start = mesh.positions[mesh.positions.len() - 6];
        assert_eq!(last_start, 49.0);
    }

    #[test]
    fn road_sits_above_ground() {
        assert!(road().positions[1] > ground().positions[1]);
    }

    #[test]
    fn registers_six_static_drawables() {
        let mut registry = DrawableRegistry::new();
        let mut uploader = HeadlessGeometry::default();
        register_static_meshes(&mut registry, &mut uploader);
        assert_eq!(registry.len(), 6);
        assert!(registry.contains(DrawableKind::Car));
        assert!(!registry.contains(DrawableKind::Tree));
        assert_eq!(
            registry.get(DrawableKind::LaneLines).unwrap().element_count(),
            68
        );
    }
}
