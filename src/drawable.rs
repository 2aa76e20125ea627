use std::collections::HashMap;

use log::{debug, warn};
use serde::Serialize;

/// Opaque reference to a GPU buffer owned by the graphics backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BufferHandle(u32);

impl BufferHandle {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// Primitive topology a drawable was authored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum Topology {
    #[default]
    TriangleList,
    LineList,
}

/// Uploaded geometry: vertex buffer, optional index buffer and draw count.
///
/// Created once at start-up and never mutated; frames carry copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Drawable {
    vertices: BufferHandle,
    indices: Option<BufferHandle>,
    element_count: u32,
    topology: Topology,
}

impl Drawable {
    pub fn vertices(&self) -> BufferHandle {
        self.vertices
    }

    pub fn indices(&self) -> Option<BufferHandle> {
        self.indices
    }

    /// Index count when indexed, vertex count otherwise.
    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn triangle_count(&self) -> u32 {
        match self.topology {
            Topology::TriangleList => self.element_count / 3,
            Topology::LineList => 0,
        }
    }
}

/// Role of a drawable in the street scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DrawableKind {
    Ground,
    Road,
    LaneLines,
    Building,
    Car,
    Wheel,
    Tree,
    ModelBuilding,
}

impl DrawableKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Ground => "ground",
            Self::Road => "road",
            Self::LaneLines => "lane-lines",
            Self::Building => "building",
            Self::Car => "car",
            Self::Wheel => "wheel",
            Self::Tree => "tree",
            Self::ModelBuilding => "model-building",
        }
    }
}

/// CPU-side geometry ready for upload. Positions are packed `xyz` triples.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub positions: Vec<f32>,
    pub indices: Option<Vec<u32>>,
    pub topology: Topology,
}

impl MeshData {
    pub fn indexed(positions: Vec<f32>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices: Some(indices),
            topology: Topology::TriangleList,
        }
    }

    pub fn lines(positions: Vec<f32>) -> Self {
        Self {
            positions,
            indices: None,
            topology: Topology::LineList,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn element_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len(),
            None => self.vertex_count(),
        }
    }
}

/// Buffer allocation capability of the graphics collaborator.
pub trait GeometryUploader {
    fn upload_vertices(&mut self, label: &str, positions: &[f32]) -> BufferHandle;
    fn upload_indices(&mut self, label: &str, indices: &[u32]) -> BufferHandle;
}

/// Drawables keyed by their role in the scene.
#[derive(Debug, Clone, Default)]
pub struct DrawableRegistry {
    drawables: HashMap<DrawableKind, Drawable>,
}

impl DrawableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads `mesh` and stores the resulting drawable under `kind`.
    ///
    /// A kind can only be registered once; later attempts keep the first
    /// drawable and upload nothing.
    pub fn register<U>(&mut self, kind: DrawableKind, mesh: &MeshData, uploader: &mut U) -> Drawable
    where
        U: GeometryUploader + ?Sized,
    {
        if let Some(existing) = self.drawables.get(&kind) {
            warn!("drawable {} already registered", kind.label());
            return *existing;
        }
        let label = kind.label();
        let vertices = uploader.upload_vertices(label, &mesh.positions);
        let indices = mesh
            .indices
            .as_deref()
            .map(|indices| uploader.upload_indices(label, indices));
        let drawable = Drawable {
            vertices,
            indices,
            element_count: mesh.element_count() as u32,
            topology: mesh.topology,
        };
        debug!(
            "registered {label}: {} vertices, {} elements",
            mesh.vertex_count(),
            drawable.element_count
        );
        self.drawables.insert(kind, drawable);
        drawable
    }

    pub fn get(&self, kind: DrawableKind) -> Option<Drawable> {
        self.drawables.get(&kind).copied()
    }

    pub fn contains(&self, kind: DrawableKind) -> bool {
        self.drawables.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessGeometry;

    #[test]
    fn registers_indexed_and_line_meshes() {
        let mut uploader = HeadlessGeometry::default();
        let mut registry = DrawableRegistry::new();

        let quad = MeshData::indexed(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            vec![0, 1, 2, 0, 2, 3],
        );
        let drawable = registry.register(DrawableKind::Road, &quad, &mut uploader);
        assert_eq!(drawable.element_count(), 6);
        assert_eq!(drawable.triangle_count(), 2);
        assert!(drawable.indices().is_some());

        let lines = MeshData::lines(vec![0.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        let drawable = registry.register(DrawableKind::LaneLines, &lines, &mut uploader);
        assert_eq!(drawable.element_count(), 2);
        assert_eq!(drawable.topology(), Topology::LineList);
        assert!(drawable.indices().is_none());

        assert_eq!(registry.len(), 2);
        assert_eq!(uploader.buffer_count(), 3);
    }

    #[test]
    fn duplicate_registration_keeps_first_drawable() {
        let mut uploader = HeadlessGeometry::default();
        let mut registry = DrawableRegistry::new();
        let first = registry.register(
            DrawableKind::Tree,
            &MeshData::indexed(vec![0.0; 9], vec![0, 1, 2]),
            &mut uploader,
        );
        let second = registry.register(
            DrawableKind::Tree,
            &MeshData::indexed(vec![0.0; 12], vec![0, 1, 2, 0, 2, 3]),
            &mut uploader,
        );
        assert_eq!(first, second);
        assert_eq!(uploader.buffer_count(), 2);
        assert!(registry.get(DrawableKind::Wheel).is_none());
    }
}
