//! `GraphicsBackend` over a live glow context (desktop GL or GLES/WebGL).

use glow::HasContext;

use crate::backend::{ActiveInput, GlslDialect, GraphicsBackend, InputLocation, ShaderStage};
use crate::error::SlotKind;

/// GL keeps one flag per error kind; a handful of reads empties the queue.
const MAX_DRAINED_ERRORS: usize = 16;

/// Result of reading the GL error queue until it is empty.
#[derive(Debug, Default, PartialEq, Eq)]
struct DrainedErrors {
    context_lost: bool,
    other: Vec<u32>,
}

/// Pulls codes from `next_error` until `NO_ERROR`. `CONTEXT_LOST` (GL 4.5 /
/// KHR_robustness, only raised on robust contexts) is reported separately.
fn drain_errors(mut next_error: impl FnMut() -> u32) -> DrainedErrors {
    let mut drained = DrainedErrors::default();
    for _ in 0..MAX_DRAINED_ERRORS {
        match next_error() {
            glow::NO_ERROR => break,
            glow::CONTEXT_LOST => drained.context_lost = true,
            code => drained.other.push(code),
        }
    }
    drained
}

/// Vertex buffer plus the vertex array object core profiles require.
#[derive(Debug)]
pub struct GlGeometry {
    buffer: glow::Buffer,
    vertex_array: Option<glow::VertexArray>,
}

/// Owns the glow function table. Callers must keep the GL context current on
/// this thread for as long as the backend is in use.
pub struct GlowBackend {
    gl: glow::Context,
    dialect: GlslDialect,
}

impl GlowBackend {
    pub fn new(gl: glow::Context) -> Self {
        let version = gl.version();
        let dialect = if version.is_embedded {
            GlslDialect::Es100
        } else {
            GlslDialect::Core330
        };
        tracing::debug!(
            major = version.major,
            minor = version.minor,
            embedded = version.is_embedded,
            vendor = %version.vendor_info,
            ?dialect,
            "initialised glow backend"
        );
        Self { gl, dialect }
    }

    pub fn context(&self) -> &glow::Context {
        &self.gl
    }
}

impl std::fmt::Debug for GlowBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlowBackend")
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

fn uniform_kind(utype: u32) -> SlotKind {
    match utype {
        glow::FLOAT => SlotKind::Scalar,
        glow::FLOAT_VEC2 => SlotKind::Vec2,
        other => SlotKind::Other(other),
    }
}

impl GraphicsBackend for GlowBackend {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type Location = glow::UniformLocation;
    type Geometry = GlGeometry;

    fn dialect(&self) -> GlslDialect {
        self.dialect
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        let ty = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe { self.gl.create_shader(ty) }
    }

    fn compile_shader(&self, shader: Self::Shader, source: &str) -> Result<(), String> {
        unsafe {
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if self.gl.get_shader_compile_status(shader) {
                Ok(())
            } else {
                Err(self.gl.get_shader_info_log(shader))
            }
        }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { self.gl.delete_shader(shader) }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { self.gl.create_program() }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { self.gl.attach_shader(program, shader) }
    }

    fn link_program(&self, program: Self::Program) -> Result<(), String> {
        unsafe {
            self.gl.link_program(program);
            if self.gl.get_program_link_status(program) {
                Ok(())
            } else {
                Err(self.gl.get_program_info_log(program))
            }
        }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { self.gl.use_program(program) }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { self.gl.delete_program(program) }
    }

    fn active_inputs(&self, program: Self::Program) -> Vec<ActiveInput<Self::Location>> {
        let mut inputs = Vec::new();
        unsafe {
            for index in 0..self.gl.get_active_uniforms(program) {
                let Some(uniform) = self.gl.get_active_uniform(program, index) else {
                    continue;
                };
                let Some(location) = self.gl.get_uniform_location(program, &uniform.name) else {
                    continue;
                };
                inputs.push(ActiveInput {
                    name: uniform.name,
                    kind: uniform_kind(uniform.utype),
                    location: InputLocation::Uniform(location),
                });
            }
            for index in 0..self.gl.get_active_attributes(program) {
                let Some(attribute) = self.gl.get_active_attribute(program, index) else {
                    continue;
                };
                // Built-ins such as gl_VertexID report no location.
                let Some(location) = self.gl.get_attrib_location(program, &attribute.name) else {
                    continue;
                };
                inputs.push(ActiveInput {
                    name: attribute.name,
                    kind: SlotKind::Attribute,
                    location: InputLocation::Attribute(location),
                });
            }
        }
        inputs
    }

    fn uniform_f32(&self, location: &Self::Location, value: f32) {
        unsafe { self.gl.uniform_1_f32(Some(location), value) }
    }

    fn uniform_vec2(&self, location: &Self::Location, x: f32, y: f32) {
        unsafe { self.gl.uniform_2_f32(Some(location), x, y) }
    }

    fn create_geometry(&self, vertices: &[f32]) -> Result<Self::Geometry, String> {
        unsafe {
            let vertex_array = match self.dialect {
                GlslDialect::Core330 => {
                    let vao = self.gl.create_vertex_array()?;
                    self.gl.bind_vertex_array(Some(vao));
                    Some(vao)
                }
                GlslDialect::Es100 => None,
            };
            let buffer = match self.gl.create_buffer() {
                Ok(buffer) => buffer,
                Err(err) => {
                    if let Some(vao) = vertex_array {
                        self.gl.bind_vertex_array(None);
                        self.gl.delete_vertex_array(vao);
                    }
                    return Err(err);
                }
            };
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            self.gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(vertices),
                glow::STATIC_DRAW,
            );
            Ok(GlGeometry {
                buffer,
                vertex_array,
            })
        }
    }

    fn bind_geometry(&self, geometry: &Self::Geometry, attribute: u32, components: i32) {
        unsafe {
            if let Some(vao) = geometry.vertex_array {
                self.gl.bind_vertex_array(Some(vao));
            }
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(geometry.buffer));
            self.gl.enable_vertex_attrib_array(attribute);
            self.gl
                .vertex_attrib_pointer_f32(attribute, components, glow::FLOAT, false, 0, 0);
        }
    }

    fn delete_geometry(&self, geometry: Self::Geometry) {
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            self.gl.delete_buffer(geometry.buffer);
            if let Some(vao) = geometry.vertex_array {
                self.gl.bind_vertex_array(None);
                self.gl.delete_vertex_array(vao);
            }
        }
    }

    fn viewport(&self, width: u32, height: u32) {
        let width = i32::try_from(width).unwrap_or(i32::MAX);
        let height = i32::try_from(height).unwrap_or(i32::MAX);
        unsafe { self.gl.viewport(0, 0, width, height) }
    }

    fn draw_triangle_strip(&self, first: i32, count: i32) {
        unsafe { self.gl.draw_arrays(glow::TRIANGLE_STRIP, first, count) }
    }

    fn context_lost(&self) -> bool {
        let drained = drain_errors(|| unsafe { self.gl.get_error() });
        for code in &drained.other {
            tracing::warn!(code = %format_args!("{code:#06x}"), "GL error after draw");
        }
        drained.context_lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_types_map_to_slot_kinds() {
        assert_eq!(uniform_kind(glow::FLOAT), SlotKind::Scalar);
        assert_eq!(uniform_kind(glow::FLOAT_VEC2), SlotKind::Vec2);
        assert_eq!(
            uniform_kind(glow::FLOAT_VEC3),
            SlotKind::Other(glow::FLOAT_VEC3)
        );
    }

    fn queue(codes: &[u32]) -> impl FnMut() -> u32 + '_ {
        let mut codes = codes.iter();
        move || codes.next().copied().unwrap_or(glow::NO_ERROR)
    }

    #[test]
    fn draining_reports_context_loss_behind_other_errors() {
        let drained = drain_errors(queue(&[glow::INVALID_OPERATION, glow::CONTEXT_LOST]));
        assert!(drained.context_lost);
        assert_eq!(drained.other, vec![glow::INVALID_OPERATION]);
    }

    #[test]
    fn draining_keeps_non_loss_errors() {
        let drained = drain_errors(queue(&[glow::INVALID_VALUE, glow::OUT_OF_MEMORY]));
        assert!(!drained.context_lost);
        assert_eq!(drained.other, vec![glow::INVALID_VALUE, glow::OUT_OF_MEMORY]);
        assert_eq!(drain_errors(queue(&[])), DrainedErrors::default());
    }

    #[test]
    fn draining_stops_on_a_stuck_error_queue() {
        let drained = drain_errors(|| glow::CONTEXT_LOST);
        assert!(drained.context_lost);
        assert!(drained.other.is_empty());
    }
}
