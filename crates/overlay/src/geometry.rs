use std::rc::Rc;

use crate::backend::GraphicsBackend;
use crate::error::{OverlayError, SlotKind};
use crate::program::SlotHandle;

/// Clip-space corners in triangle-strip order.
pub const FULLSCREEN_STRIP: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];

const COMPONENTS: i32 = 2;

/// The immutable full-screen quad drawn every frame.
#[derive(Debug)]
pub struct QuadGeometry<B: GraphicsBackend> {
    backend: Rc<B>,
    buffer: Option<B::Geometry>,
}

impl<B: GraphicsBackend> QuadGeometry<B> {
    pub fn create(backend: Rc<B>) -> Result<Self, OverlayError> {
        let buffer = backend
            .create_geometry(&FULLSCREEN_STRIP)
            .map_err(|reason| OverlayError::allocation("vertex buffer", reason))?;
        Ok(Self {
            backend,
            buffer: Some(buffer),
        })
    }

    pub fn vertex_count(&self) -> i32 {
        FULLSCREEN_STRIP.len() as i32 / COMPONENTS
    }

    /// Binds the buffer and feeds it to `slot`, which must be a vertex attribute.
    pub fn bind(&self, slot: &SlotHandle<B>) -> Result<(), OverlayError> {
        let index = slot
            .attribute_index()
            .ok_or_else(|| OverlayError::SlotTypeMismatch {
                name: slot.name().to_owned(),
                expected: SlotKind::Attribute,
                found: slot.kind(),
            })?;
        if let Some(buffer) = &self.buffer {
            self.backend.bind_geometry(buffer, index, COMPONENTS);
        }
        Ok(())
    }

    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.backend.delete_geometry(buffer);
        }
    }
}

impl<B: GraphicsBackend> Drop for QuadGeometry<B> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::CompiledProgram;
    use crate::recording::RecordingBackend;
    use crate::shaders::{CrtTuning, ShaderSources};

    #[test]
    fn strip_covers_clip_space_with_four_vertices() {
        let backend = Rc::new(RecordingBackend::new());
        let quad = QuadGeometry::create(backend.clone()).unwrap();
        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(backend.uploaded_vertices(), vec![FULLSCREEN_STRIP.to_vec()]);
    }

    #[test]
    fn binding_to_a_uniform_is_rejected() {
        let backend = Rc::new(RecordingBackend::new());
        let program =
            CompiledProgram::compile(backend.clone(), &ShaderSources::crt(&CrtTuning::default()))
                .unwrap();
        let quad = QuadGeometry::create(backend).unwrap();
        let err = quad.bind(&program.input_slot("time").unwrap()).unwrap_err();
        assert!(matches!(
            err,
            OverlayError::SlotTypeMismatch {
                expected: SlotKind::Attribute,
                ..
            }
        ));
        quad.bind(&program.input_slot("position").unwrap()).unwrap();
    }

    #[test]
    fn buffer_is_deleted_once() {
        let backend = Rc::new(RecordingBackend::new());
        QuadGeometry::create(backend.clone()).unwrap().dispose();
        assert_eq!(backend.deleted_geometries(), 1);
    }
}
