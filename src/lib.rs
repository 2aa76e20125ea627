//! Real-time street scene viewer.
//!
//! The crate renders a ground plane, a road with dashed lane lines, rows of
//! buildings, decorative tree and building models and a car that drives
//! along the road, seen through a first-person camera. The library holds
//! the platform-neutral core (camera, car, scene composition and frame
//! scheduling) plus a wgpu renderer that targets both a native window and
//! a browser canvas.

pub mod app;
pub mod camera;
pub mod car;
pub mod config;
pub mod drawable;
pub mod error;
pub mod geometry;
pub mod input;
pub mod model;
pub mod obj;
pub mod render;
pub mod scene;
pub mod scheduler;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use app::Viewer;
pub use camera::{CameraController, MoveDirection, Projection};
pub use car::{CarMotion, CarPhase, CarState};
pub use config::ViewerConfig;
pub use drawable::{BufferHandle, Drawable, DrawableKind, DrawableRegistry, GeometryUploader};
pub use error::ViewerError;
pub use input::{Action, InputEvent, KeyBindings, KeyCode, NamedKey};
pub use model::{load_models, parse_model, ModelSource};
pub use render::{FrameRecorder, GpuRenderer, HeadlessGeometry};
pub use scene::{DrawCommand, Frame, RenderMode, SceneComposer, Submission};
pub use scheduler::{FramePacer, FrameScheduler, FrameSink, FrameSource};
