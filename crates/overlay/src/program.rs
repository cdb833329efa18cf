//! Compiled vertex + fragment program with named input slots.

use std::collections::HashMap;
use std::rc::Rc;

use crate::backend::{GraphicsBackend, InputLocation, ShaderStage};
use crate::error::{OverlayError, SlotKind};
use crate::shaders::{adapt_source, ShaderSources};

/// Resolved handle to one named program input.
#[derive(Debug)]
pub struct SlotHandle<B: GraphicsBackend> {
    name: String,
    kind: SlotKind,
    location: InputLocation<B::Location>,
}

impl<B: GraphicsBackend> Clone for SlotHandle<B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            kind: self.kind,
            location: self.location.clone(),
        }
    }
}

impl<B: GraphicsBackend> SlotHandle<B> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    /// Attribute index for per-vertex slots.
    pub fn attribute_index(&self) -> Option<u32> {
        match self.location {
            InputLocation::Attribute(index) => Some(index),
            InputLocation::Uniform(_) => None,
        }
    }

    fn expect_kind(&self, expected: SlotKind) -> Result<(), OverlayError> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(OverlayError::SlotTypeMismatch {
                name: self.name.clone(),
                expected,
                found: self.kind,
            })
        }
    }
}

#[derive(Debug)]
struct ProgramHandles<B: GraphicsBackend> {
    program: B::Program,
    vertex: B::Shader,
    fragment: B::Shader,
}

/// A linked program. Exactly one exists per mounted overlay.
///
/// Both stages stay attached until [`CompiledProgram::dispose`], which
/// consumes the value; dropping an undisposed program releases it too, so the
/// GL objects are freed exactly once on every path.
pub struct CompiledProgram<B: GraphicsBackend> {
    backend: Rc<B>,
    handles: Option<ProgramHandles<B>>,
    slots: HashMap<String, SlotHandle<B>>,
}

impl<B: GraphicsBackend> std::fmt::Debug for CompiledProgram<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("handles", &self.handles)
            .field("inputs", &self.slots.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<B: GraphicsBackend> CompiledProgram<B> {
    /// Compiles both stages and links them.
    ///
    /// On failure every shader or program object created so far is deleted
    /// before the error is returned.
    pub fn compile(backend: Rc<B>, sources: &ShaderSources) -> Result<Self, OverlayError> {
        let vertex = compile_stage(&*backend, ShaderStage::Vertex, sources)?;
        let fragment = match compile_stage(&*backend, ShaderStage::Fragment, sources) {
            Ok(shader) => shader,
            Err(err) => {
                backend.delete_shader(vertex);
                return Err(err);
            }
        };

        let program = match backend.create_program() {
            Ok(program) => program,
            Err(reason) => {
                backend.delete_shader(vertex);
                backend.delete_shader(fragment);
                return Err(OverlayError::allocation("shader program", reason));
            }
        };
        backend.attach_shader(program, vertex);
        backend.attach_shader(program, fragment);
        if let Err(log) = backend.link_program(program) {
            backend.delete_program(program);
            backend.delete_shader(vertex);
            backend.delete_shader(fragment);
            return Err(OverlayError::ShaderLink { log });
        }

        let slots: HashMap<_, _> = backend
            .active_inputs(program)
            .into_iter()
            .map(|input| {
                let slot = SlotHandle {
                    name: input.name.clone(),
                    kind: input.kind,
                    location: input.location,
                };
                (input.name, slot)
            })
            .collect();
        tracing::debug!(inputs = slots.len(), "linked shader program");

        Ok(Self {
            backend,
            handles: Some(ProgramHandles {
                program,
                vertex,
                fragment,
            }),
            slots,
        })
    }

    /// Looks up an active uniform or attribute by name.
    pub fn input_slot(&self, name: &str) -> Result<SlotHandle<B>, OverlayError> {
        self.slots
            .get(name)
            .cloned()
            .ok_or_else(|| OverlayError::UnknownInput {
                name: name.to_owned(),
            })
    }

    /// Names of every active input, sorted.
    pub fn input_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn backend(&self) -> &Rc<B> {
        &self.backend
    }

    /// Makes this program current for subsequent writes and draws.
    pub fn activate(&self) {
        if let Some(handles) = &self.handles {
            self.backend.use_program(Some(handles.program));
        }
    }

    /// Writes a scalar into a `uniform float` slot. The program must be active.
    pub fn write_scalar(&self, slot: &SlotHandle<B>, value: f32) -> Result<(), OverlayError> {
        slot.expect_kind(SlotKind::Scalar)?;
        if let InputLocation::Uniform(location) = &slot.location {
            self.backend.uniform_f32(location, value);
        }
        Ok(())
    }

    /// Writes into a `uniform vec2` slot. The program must be active.
    pub fn write_vec2(&self, slot: &SlotHandle<B>, x: f32, y: f32) -> Result<(), OverlayError> {
        slot.expect_kind(SlotKind::Vec2)?;
        if let InputLocation::Uniform(location) = &slot.location {
            self.backend.uniform_vec2(location, x, y);
        }
        Ok(())
    }

    /// Releases the program and both stages.
    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(handles) = self.handles.take() {
            self.backend.use_program(None);
            self.backend.delete_program(handles.program);
            self.backend.delete_shader(handles.vertex);
            self.backend.delete_shader(handles.fragment);
            self.slots.clear();
            tracing::debug!("released shader program");
        }
    }
}

impl<B: GraphicsBackend> Drop for CompiledProgram<B> {
    fn drop(&mut self) {
        self.release();
    }
}

fn compile_stage<B: GraphicsBackend>(
    backend: &B,
    stage: ShaderStage,
    sources: &ShaderSources,
) -> Result<B::Shader, OverlayError> {
    let source = adapt_source(stage, sources.source(stage), backend.dialect());
    let shader = backend
        .create_shader(stage)
        .map_err(|reason| OverlayError::allocation("shader object", reason))?;
    if let Err(log) = backend.compile_shader(shader, &source) {
        backend.delete_shader(shader);
        tracing::debug!(%stage, %log, "shader compile failed");
        return Err(OverlayError::ShaderCompile { stage, log });
    }
    Ok(shader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{GlCall, RecordingBackend};
    use crate::shaders::CrtTuning;

    fn crt() -> ShaderSources {
        ShaderSources::crt(&CrtTuning::default())
    }

    #[test]
    fn crt_program_exposes_expected_slots() {
        let backend = Rc::new(RecordingBackend::new());
        let program = CompiledProgram::compile(backend.clone(), &crt()).unwrap();
        assert_eq!(program.input_names(), vec!["position", "resolution", "time"]);
        assert_eq!(program.input_slot("time").unwrap().kind(), SlotKind::Scalar);
        assert_eq!(
            program.input_slot("resolution").unwrap().kind(),
            SlotKind::Vec2
        );
        assert!(program
            .input_slot("position")
            .unwrap()
            .attribute_index()
            .is_some());
    }

    #[test]
    fn unknown_input_is_reported_by_name() {
        let backend = Rc::new(RecordingBackend::new());
        let program = CompiledProgram::compile(backend, &crt()).unwrap();
        match program.input_slot("nonexistent") {
            Err(OverlayError::UnknownInput { name }) => assert_eq!(name, "nonexistent"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn writes_are_checked_against_slot_kind() {
        let backend = Rc::new(RecordingBackend::new());
        let program = CompiledProgram::compile(backend.clone(), &crt()).unwrap();
        let time = program.input_slot("time").unwrap();
        let err = program.write_vec2(&time, 1.0, 2.0).unwrap_err();
        assert!(matches!(
            err,
            OverlayError::SlotTypeMismatch {
                expected: SlotKind::Vec2,
                found: SlotKind::Scalar,
                ..
            }
        ));
        program.write_scalar(&time, 1.5).unwrap();
        assert!(backend
            .calls()
            .iter()
            .any(|call| matches!(call, GlCall::UniformF32 { name, value } if name == "time" && *value == 1.5)));
    }

    #[test]
    fn link_failure_deletes_both_stages() {
        let backend = Rc::new(RecordingBackend::new());
        backend.fail_link("varying mismatch");
        let err = CompiledProgram::compile(backend.clone(), &crt()).unwrap_err();
        assert!(matches!(err, OverlayError::ShaderLink { ref log } if log == "varying mismatch"));
        assert_eq!(backend.live_objects(), 0);
    }

    #[test]
    fn dispose_releases_exactly_once() {
        let backend = Rc::new(RecordingBackend::new());
        let program = CompiledProgram::compile(backend.clone(), &crt()).unwrap();
        program.dispose();
        assert_eq!(backend.deleted_programs(), 1);
        assert_eq!(backend.deleted_shaders(), 2);
        assert_eq!(backend.live_objects(), 0);
    }

    #[test]
    fn dropping_an_undisposed_program_releases_it() {
        let backend = Rc::new(RecordingBackend::new());
        drop(CompiledProgram::compile(backend.clone(), &crt()).unwrap());
        assert_eq!(backend.deleted_programs(), 1);
        assert_eq!(backend.live_objects(), 0);
    }
}
