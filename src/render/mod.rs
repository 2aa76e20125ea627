pub mod gpu;
pub mod headless;
mod shader;

pub use gpu::GpuRenderer;
pub use headless::{FrameRecorder, HeadlessGeometry};
