use glam::{Mat4, Vec3, Vec4};
use serde::Serialize;

use crate::camera::{CameraController, Projection};
use crate::car::CarState;
use crate::drawable::{Drawable, DrawableKind, DrawableRegistry, Topology};

/// Global fill/outline toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RenderMode {
    #[default]
    Filled,
    Wireframe,
}

impl RenderMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Filled => "filled",
            Self::Wireframe => "wireframe",
        }
    }
}

/// How a command's elements reach the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Submission {
    /// One triangle-list call over the whole index set.
    Triangles { elements: u32 },
    /// One line-list call.
    Lines { elements: u32 },
    /// One closed three-vertex outline per triangle. Edges shared by
    /// neighbouring triangles are drawn twice.
    TriangleOutlines { triangles: u32 },
}

impl Submission {
    pub fn for_drawable(drawable: &Drawable, mode: RenderMode) -> Self {
        match (drawable.topology(), mode) {
            (Topology::LineList, _) => Self::Lines {
                elements: drawable.element_count(),
            },
            (Topology::TriangleList, RenderMode::Filled) => Self::Triangles {
                elements: drawable.element_count(),
            },
            (Topology::TriangleList, RenderMode::Wireframe) => Self::TriangleOutlines {
                triangles: drawable.triangle_count(),
            },
        }
    }

    /// Number of draw calls this submission issues.
    pub fn draw_calls(&self) -> u32 {
        match *self {
            Self::Triangles { .. } | Self::Lines { .. } => 1,
            Self::TriangleOutlines { triangles } => triangles,
        }
    }
}

/// One draw of one drawable at one translation. Rebuilt every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DrawCommand {
    pub kind: DrawableKind,
    pub drawable: Drawable,
    pub color: Vec4,
    pub translation: Vec3,
    pub submission: Submission,
}

impl DrawCommand {
    pub fn model_transform(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
    }
}

/// Everything the submission backend needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub view: Mat4,
    pub projection: Mat4,
    pub clear_color: Vec4,
    pub mode: RenderMode,
    pub commands: Vec<DrawCommand>,
}

impl Frame {
    pub fn count(&self, kind: DrawableKind) -> usize {
        self.commands.iter().filter(|command| command.kind == kind).count()
    }

    pub fn draw_calls(&self) -> u32 {
        self.commands
            .iter()
            .map(|command| command.submission.draw_calls())
            .sum()
    }
}

pub const CLEAR_COLOR: Vec4 = Vec4::new(0.2, 0.2, 0.2, 1.0);
pub const WIREFRAME_COLOR: Vec4 = Vec4::ONE;

pub const GROUND_COLOR: Vec4 = Vec4::new(0.6, 0.8, 0.4, 1.0);
pub const ROAD_COLOR: Vec4 = Vec4::new(0.3, 0.3, 0.3, 1.0);
pub const LANE_COLOR: Vec4 = Vec4::ONE;
pub const BUILDING_COLOR: Vec4 = Vec4::new(0.7, 0.7, 0.7, 1.0);
pub const CAR_COLOR: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);
pub const WHEEL_COLOR: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);
pub const TREE_COLOR: Vec4 = Vec4::new(0.2, 0.6, 0.2, 1.0);
pub const MODEL_BUILDING_COLOR: Vec4 = Vec4::new(0.5, 0.5, 0.5, 1.0);

/// Lateral offsets of the perimeter buildings, one per row.
pub const BUILDING_OFFSETS: [f32; 4] = [-20.0, -10.0, 10.0, 20.0];
pub const BUILDING_ROWS: [f32; 2] = [-15.0, 15.0];

pub const WHEEL_OFFSETS: [Vec3; 4] = [
    Vec3::new(-0.8, 0.0, -0.6),
    Vec3::new(0.8, 0.0, -0.6),
    Vec3::new(-0.8, 0.0, 0.6),
    Vec3::new(0.8, 0.0, 0.6),
];

pub const TREE_POSITIONS: [Vec3; 17] = [
    Vec3::new(-15.0, 0.0, 10.0),
    Vec3::new(-10.0, 0.0, -12.0),
    Vec3::new(12.0, 0.0, 12.0),
    Vec3::new(-5.0, 0.0, -10.0),
    Vec3::new(8.0, 0.0, 8.0),
    Vec3::new(15.0, 0.0, -10.0),
    Vec3::new(12.0, 0.0, -12.0),
    Vec3::new(-20.0, 0.0, 12.0),
    Vec3::new(-20.0, 0.0, -12.0),
    Vec3::new(-25.0, 0.0, -15.0),
    Vec3::new(-5.0, 0.0, 8.0),
    Vec3::new(5.0, 0.0, -8.0),
    Vec3::new(20.0, 0.0, -12.0),
    Vec3::new(2.0, 0.0, -15.0),
    Vec3::new(20.0, 0.0, 12.0),
    Vec3::new(20.0, 0.0, 19.0),
    Vec3::new(2.0, 0.0, 10.0),
];

pub const MODEL_BUILDING_POSITIONS: [Vec3; 8] = [
    Vec3::new(-15.0, 0.0, 10.0),
    Vec3::new(-1.0, 0.0, -12.0),
    Vec3::new(12.0, 0.0, 12.0),
    Vec3::new(-12.0, 0.0, -12.0),
    Vec3::new(1.0, 0.0, 12.0),
    Vec3::new(-5.0, 0.0, -17.0),
    Vec3::new(5.0, 0.0, -17.0),
    Vec3::new(15.0, 0.0, -12.0),
];

/// Builds the ordered draw list of the street scene.
///
/// Drawables missing from the registry are skipped along with all of their
/// instances, so a failed model load only removes decoration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneComposer {
    projection: Projection,
}

impl SceneComposer {
    pub fn new(projection: Projection) -> Self {
        Self { projection }
    }

    pub fn compose_frame(
        &self,
        registry: &DrawableRegistry,
        camera: &CameraController,
        car: &CarState,
        mode: RenderMode,
        aspect: f32,
    ) -> Frame {
        let mut batch = CommandBatch {
            registry,
            mode,
            commands: Vec::with_capacity(64),
        };

        batch.push(DrawableKind::Ground, GROUND_COLOR, Vec3::ZERO);
        batch.push(DrawableKind::Road, ROAD_COLOR, Vec3::ZERO);
        batch.push(DrawableKind::LaneLines, LANE_COLOR, Vec3::ZERO);

        for offset in BUILDING_OFFSETS {
            for row in BUILDING_ROWS {
                batch.push(DrawableKind::Building, BUILDING_COLOR, Vec3::new(offset, 0.0, row));
            }
        }

        if registry.contains(DrawableKind::Car) {
            batch.push(DrawableKind::Car, CAR_COLOR, car.position);
            for offset in WHEEL_OFFSETS {
                batch.push(DrawableKind::Wheel, WHEEL_COLOR, car.position + offset);
            }
        }

        for position in TREE_POSITIONS {
            batch.push(DrawableKind::Tree, TREE_COLOR, position);
        }
        for position in MODEL_BUILDING_POSITIONS {
            batch.push(DrawableKind::ModelBuilding, MODEL_BUILDING_COLOR, position);
        }

        Frame {
            view: camera.view_transform(),
            projection: self.projection.matrix(aspect),
            clear_color: CLEAR_COLOR,
            mode,
            commands: batch.commands,
        }
    }
}

struct CommandBatch<'a> {
    registry: &'a DrawableRegistry,
    mode: RenderMode,
    commands: Vec<DrawCommand>,
}

impl CommandBatch<'_> {
    fn push(&mut self, kind: DrawableKind, color: Vec4, translation: Vec3) {
        let Some(drawable) = self.registry.get(kind) else {
            return;
        };
        let color = match self.mode {
            RenderMode::Filled => color,
            RenderMode::Wireframe => WIREFRAME_COLOR,
        };
        self.commands.push(DrawCommand {
            kind,
            drawable,
            color,
            translation,
            submission: Submission::for_drawable(&drawable, self.mode),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::car::CarMotion;
    use crate::config::CameraConfig;
    use crate::drawable::MeshData;
    use crate::geometry;
    use crate::render::headless::HeadlessGeometry;

    fn static_registry() -> (DrawableRegistry, HeadlessGeometry) {
        let mut registry = DrawableRegistry::new();
        let mut uploader = HeadlessGeometry::default();
        geometry::register_static_meshes(&mut registry, &mut uploader);
        (registry, uploader)
    }

    fn compose(registry: &DrawableRegistry, mode: RenderMode) -> Frame {
        let camera = CameraController::new(&CameraConfig::default());
        let car = CarMotion::default().state();
        SceneComposer::default().compose_frame(registry, &camera, &car, mode, 16.0 / 9.0)
    }

    #[test]
    fn fixed_elements_without_car_or_models() {
        let mut registry = DrawableRegistry::new();
        let mut uploader = HeadlessGeometry::default();
        for (kind, mesh) in [
            (DrawableKind::Ground, geometry::ground()),
            (DrawableKind::Road, geometry::road()),
            (DrawableKind::LaneLines, geometry::lane_lines(-50.0, 50.0)),
            (DrawableKind::Building, geometry::building()),
        ] {
            registry.register(kind, &mesh, &mut uploader);
        }
        let frame = compose(&registry, RenderMode::Filled);
        assert_eq!(frame.commands.len(), 11);
        assert_eq!(frame.count(DrawableKind::Building), 8);
        assert_eq!(frame.count(DrawableKind::Tree), 0);
        assert_eq!(frame.count(DrawableKind::ModelBuilding), 0);
    }

    #[test]
    fn static_scene_adds_car_and_four_wheels() {
        let (registry, _) = static_registry();
        let frame = compose(&registry, RenderMode::Filled);
        assert_eq!(frame.commands.len(), 16);
        assert_eq!(frame.count(DrawableKind::Wheel), 4);

        let car = CarMotion::default().position();
        let wheels: Vec<Vec3> = frame
            .commands
            .iter()
            .filter(|command| command.kind == DrawableKind::Wheel)
            .map(|command| command.translation - car)
            .collect();
        assert_eq!(wheels, WHEEL_OFFSETS.to_vec());
    }

    #[test]
    fn loaded_models_add_trees_and_model_buildings() {
        let (mut registry, mut uploader) = static_registry();
        let triangle = MeshData::indexed(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], vec![0, 1, 2]);
        registry.register(DrawableKind::Tree, &triangle, &mut uploader);
        registry.register(DrawableKind::ModelBuilding, &triangle, &mut uploader);

        let frame = compose(&registry, RenderMode::Filled);
        assert_eq!(frame.count(DrawableKind::Tree), 17);
        assert_eq!(frame.count(DrawableKind::ModelBuilding), 8);
        assert_eq!(frame.commands.len(), 16 + 17 + 8);
        let tree = frame
            .commands
            .iter()
            .find(|command| command.kind == DrawableKind::Tree)
            .unwrap();
        assert_eq!(tree.color, TREE_COLOR);
    }

    #[test]
    fn filled_mode_keeps_palette_and_single_calls() {
        let (registry, _) = static_registry();
        let frame = compose(&registry, RenderMode::Filled);
        assert_eq!(frame.commands[0].color, GROUND_COLOR);
        assert_eq!(frame.commands[0].submission, Submission::Triangles { elements: 6 });
        assert_eq!(frame.commands[2].submission, Submission::Lines { elements: 68 });
        assert_eq!(frame.draw_calls(), 16);
        assert_eq!(frame.clear_color, CLEAR_COLOR);
    }

    #[test]
    fn wireframe_forces_white_and_per_triangle_outlines() {
        let (registry, _) = static_registry();
        let frame = compose(&registry, RenderMode::Wireframe);
        assert!(frame.commands.iter().all(|command| command.color == WIREFRAME_COLOR));

        let building = frame
            .commands
            .iter()
            .find(|command| command.kind == DrawableKind::Building)
            .unwrap();
        assert_eq!(building.submission, Submission::TriangleOutlines { triangles: 12 });
        assert_eq!(building.submission.draw_calls(), 12);
        assert_eq!(frame.commands[2].submission, Submission::Lines { elements: 68 });
    }

    #[test]
    fn wireframe_composition_is_idempotent() {
        let (registry, _) = static_registry();
        let first = compose(&registry, RenderMode::Wireframe);
        let second = compose(&registry, RenderMode::Wireframe);
        assert_eq!(first, second);
    }

    #[test]
    fn car_commands_follow_car_state() {
        let (registry, _) = static_registry();
        let camera = CameraController::new(&CameraConfig::default());
        let mut car = CarMotion::default();
        car.tick();
        let frame = SceneComposer::default().compose_frame(
            &registry,
            &camera,
            &car.state(),
            RenderMode::Filled,
            1.0,
        );
        let body = frame
            .commands
            .iter()
            .find(|command| command.kind == DrawableKind::Car)
            .unwrap();
        assert_eq!(body.translation, car.position());
        assert_eq!(body.model_transform().w_axis.truncate(), car.position());
    }
}
