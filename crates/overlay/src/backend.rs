//! The graphics seam between the render component and a concrete GL.
//!
//! Everything above this trait (program wrapper, geometry, driver) is written
//! against `GraphicsBackend`, so the same code drives a real glow context in
//! the desktop host and the [`RecordingBackend`](crate::recording::RecordingBackend)
//! in tests.

use std::fmt;

use crate::error::SlotKind;

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// GLSL flavour accepted by the active context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslDialect {
    /// GLSL ES 1.00 (WebGL 1, GLES 2+). Sources are passed through untouched.
    Es100,
    /// Desktop core profile; sources get a `#version 330 core` prelude.
    Core330,
}

/// Where a program input lives.
#[derive(Debug, Clone, PartialEq)]
pub enum InputLocation<L> {
    Uniform(L),
    Attribute(u32),
}

/// One active uniform or attribute reported by the linked program.
#[derive(Debug, Clone)]
pub struct ActiveInput<L> {
    pub name: String,
    pub kind: SlotKind,
    pub location: InputLocation<L>,
}

/// Minimal GL surface needed to compile a program, feed it, and draw a strip.
///
/// Creation methods return the backend's own error string; callers translate
/// it into [`OverlayError`](crate::OverlayError) with the right variant.
pub trait GraphicsBackend: fmt::Debug {
    type Shader: Copy + fmt::Debug;
    type Program: Copy + fmt::Debug;
    type Location: Clone + fmt::Debug;
    type Geometry: fmt::Debug;

    fn dialect(&self) -> GlslDialect;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    /// Uploads and compiles `source`. `Err` carries the compiler log.
    fn compile_shader(&self, shader: Self::Shader, source: &str) -> Result<(), String>;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    /// Links the attached stages. `Err` carries the linker log.
    fn link_program(&self, program: Self::Program) -> Result<(), String>;
    fn use_program(&self, program: Option<Self::Program>);
    fn delete_program(&self, program: Self::Program);
    /// Active uniforms and attributes of a linked program.
    fn active_inputs(&self, program: Self::Program) -> Vec<ActiveInput<Self::Location>>;

    fn uniform_f32(&self, location: &Self::Location, value: f32);
    fn uniform_vec2(&self, location: &Self::Location, x: f32, y: f32);

    /// Uploads an immutable vertex buffer of tightly packed `f32`s.
    fn create_geometry(&self, vertices: &[f32]) -> Result<Self::Geometry, String>;
    /// Binds `geometry` and points `attribute` at it with `components` floats per vertex.
    fn bind_geometry(&self, geometry: &Self::Geometry, attribute: u32, components: i32);
    fn delete_geometry(&self, geometry: Self::Geometry);

    fn viewport(&self, width: u32, height: u32);
    fn draw_triangle_strip(&self, first: i32, count: i32);
    /// Reports (and clears) a lost-context condition raised since the last call.
    /// Any other pending errors are logged and cleared.
    fn context_lost(&self) -> bool;
}
