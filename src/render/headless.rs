//! Backend without a GPU: allocates handles and records submitted frames.

use crate::drawable::{BufferHandle, GeometryUploader};
use crate::error::ViewerError;
use crate::scene::Frame;
use crate::scheduler::FrameSink;

/// Hands out sequential buffer handles and remembers element counts.
#[derive(Debug, Default)]
pub struct HeadlessGeometry {
    buffers: Vec<(String, usize)>,
}

impl HeadlessGeometry {
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Total number of `f32`/`u32` elements uploaded so far.
    pub fn uploaded_elements(&self) -> usize {
        self.buffers.iter().map(|(_, len)| len).sum()
    }

    fn allocate(&mut self, label: String, len: usize) -> BufferHandle {
        self.buffers.push((label, len));
        BufferHandle::new(self.buffers.len() as u32 - 1)
    }
}

impl GeometryUploader for HeadlessGeometry {
    fn upload_vertices(&mut self, label: &str, positions: &[f32]) -> BufferHandle {
        self.allocate(format!("{label}-vertices"), positions.len())
    }

    fn upload_indices(&mut self, label: &str, indices: &[u32]) -> BufferHandle {
        self.allocate(format!("{label}-indices"), indices.len())
    }
}

/// Keeps the most recent frame and a running count.
#[derive(Debug, Default)]
pub struct FrameRecorder {
    submitted: u64,
    last: Option<Frame>,
}

impl FrameRecorder {
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last.as_ref()
    }
}

impl FrameSink for FrameRecorder {
    fn submit(&mut self, frame: &Frame) -> Result<(), ViewerError> {
        self.submitted += 1;
        self.last = Some(frame.clone());
        Ok(())
    }
}
