//! Recording backend and headless surface.
//!
//! `RecordingBackend` implements [`GraphicsBackend`] without a GPU: it keeps a
//! log of every call, reflects program inputs from the GLSL declarations, and
//! tracks which objects are still alive so callers can assert that nothing
//! leaks or is released twice. Failures can be injected per call site.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::backend::{ActiveInput, GlslDialect, GraphicsBackend, InputLocation, ShaderStage};
use crate::error::SlotKind;
use crate::surface::PlatformSurface;

/// Record of a backend call for test inspection.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    CreateShader { id: u32, stage: ShaderStage },
    CompileShader { id: u32, ok: bool },
    DeleteShader(u32),
    CreateProgram(u32),
    AttachShader { program: u32, shader: u32 },
    LinkProgram { id: u32, ok: bool },
    UseProgram(Option<u32>),
    DeleteProgram(u32),
    UniformF32 { name: String, value: f32 },
    UniformVec2 { name: String, x: f32, y: f32 },
    CreateGeometry { id: u32, vertices: usize },
    BindGeometry { id: u32, attribute: u32, components: i32 },
    DeleteGeometry(u32),
    Viewport(u32, u32),
    DrawTriangleStrip { first: i32, count: i32 },
}

/// Uniform values in effect when a draw was issued.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRecord {
    pub time: Option<f32>,
    pub resolution: Option<(f32, f32)>,
    pub vertex_count: i32,
}

/// Geometry handle handed out by [`RecordingBackend`].
#[derive(Debug, PartialEq, Eq)]
pub struct RecordedGeometry(u32);

#[derive(Debug, Default)]
struct Recorder {
    next_id: u32,
    calls: Vec<GlCall>,
    sources: HashMap<u32, String>,
    compiled: HashSet<u32>,
    attached: HashMap<u32, Vec<u32>>,
    live: HashSet<u32>,
    uniforms: HashMap<String, Vec<f32>>,
    draws: Vec<DrawRecord>,
    uploads: Vec<Vec<f32>>,
    deleted_shaders: usize,
    deleted_programs: usize,
    deleted_geometries: usize,
    invalid_deletes: usize,
    fail_compile: Option<(ShaderStage, String)>,
    fail_link: Option<String>,
    fail_geometry: Option<String>,
    lose_context_after: Option<usize>,
    context_lost: bool,
}

impl Recorder {
    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.live.insert(self.next_id);
        self.next_id
    }

    fn release(&mut self, id: u32) -> bool {
        let released = self.live.remove(&id);
        if !released {
            self.invalid_deletes += 1;
        }
        released
    }
}

/// A [`GraphicsBackend`] that records instead of rendering.
#[derive(Debug)]
pub struct RecordingBackend {
    dialect: GlslDialect,
    state: RefCell<Recorder>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    /// A backend that accepts GLSL ES 1.00 as written.
    pub fn new() -> Self {
        Self::with_dialect(GlslDialect::Es100)
    }

    pub fn with_dialect(dialect: GlslDialect) -> Self {
        Self {
            dialect,
            state: RefCell::new(Recorder::default()),
        }
    }

    /// Makes the next compile of `stage` fail with `log`.
    pub fn fail_compile(&self, stage: ShaderStage, log: impl Into<String>) {
        self.state.borrow_mut().fail_compile = Some((stage, log.into()));
    }

    /// Makes the next link fail with `log`.
    pub fn fail_link(&self, log: impl Into<String>) {
        self.state.borrow_mut().fail_link = Some(log.into());
    }

    /// Makes the next vertex buffer allocation fail.
    pub fn fail_geometry(&self, reason: impl Into<String>) {
        self.state.borrow_mut().fail_geometry = Some(reason.into());
    }

    /// Reports a lost context once `draws` draws have been issued.
    pub fn lose_context_after(&self, draws: usize) {
        self.state.borrow_mut().lose_context_after = Some(draws);
    }

    pub fn calls(&self) -> Vec<GlCall> {
        self.state.borrow().calls.clone()
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.state.borrow().draws.clone()
    }

    /// Vertex data of every buffer created, in order.
    pub fn uploaded_vertices(&self) -> Vec<Vec<f32>> {
        self.state.borrow().uploads.clone()
    }

    /// Shaders, programs and buffers created but not yet deleted.
    pub fn live_objects(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn deleted_shaders(&self) -> usize {
        self.state.borrow().deleted_shaders
    }

    pub fn deleted_programs(&self) -> usize {
        self.state.borrow().deleted_programs
    }

    pub fn deleted_geometries(&self) -> usize {
        self.state.borrow().deleted_geometries
    }

    /// Deletes of objects that were never created or already deleted.
    pub fn invalid_deletes(&self) -> usize {
        self.state.borrow().invalid_deletes
    }

    fn record(&self, call: GlCall) {
        self.state.borrow_mut().calls.push(call);
    }
}

/// Rejects sources a real compiler would choke on: no entry point, or
/// unbalanced braces or parentheses.
fn check_syntax(source: &str) -> Result<(), String> {
    if !source.contains("void main") {
        return Err("ERROR: 0:1: 'main' : function not defined".to_owned());
    }
    let mut depth = [0i64; 2];
    for (line_no, line) in source.lines().enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => depth[0] += 1,
                '}' => depth[0] -= 1,
                '(' => depth[1] += 1,
                ')' => depth[1] -= 1,
                _ => {}
            }
            if depth.iter().any(|d| *d < 0) {
                return Err(format!("ERROR: 0:{}: syntax error, unexpected '{ch}'", line_no + 1));
            }
        }
    }
    if depth.iter().any(|d| *d != 0) {
        return Err("ERROR: 0:0: syntax error, unexpected end of file".to_owned());
    }
    Ok(())
}

/// Declarations of the form `uniform <type> <name>;` or `attribute <type> <name>;`.
fn declarations(source: &str) -> impl Iterator<Item = (&str, &str, &str)> {
    source.lines().filter_map(|line| {
        let mut words = line.trim().trim_end_matches(';').split_whitespace();
        let qualifier = words.next()?;
        if qualifier != "uniform" && qualifier != "attribute" {
            return None;
        }
        let ty = words.next()?;
        let name = words.next()?;
        Some((qualifier, ty, name))
    })
}

impl GraphicsBackend for RecordingBackend {
    type Shader = u32;
    type Program = u32;
    type Location = String;
    type Geometry = RecordedGeometry;

    fn dialect(&self) -> GlslDialect {
        self.dialect
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        let id = self.state.borrow_mut().allocate();
        self.record(GlCall::CreateShader { id, stage });
        Ok(id)
    }

    fn compile_shader(&self, shader: Self::Shader, source: &str) -> Result<(), String> {
        let stage = self.state.borrow().calls.iter().find_map(|call| match call {
            GlCall::CreateShader { id, stage } if *id == shader => Some(*stage),
            _ => None,
        });
        let injected = {
            let mut state = self.state.borrow_mut();
            let targeted = matches!(
                (&state.fail_compile, stage),
                (Some((failing, _)), Some(stage)) if *failing == stage
            );
            if targeted {
                state.fail_compile.take().map(|(_, log)| log)
            } else {
                None
            }
        };
        let result = match injected {
            Some(log) => Err(log),
            None => check_syntax(source),
        };
        self.record(GlCall::CompileShader {
            id: shader,
            ok: result.is_ok(),
        });
        let mut state = self.state.borrow_mut();
        state.sources.insert(shader, source.to_owned());
        if result.is_ok() {
            state.compiled.insert(shader);
        }
        result
    }

    fn delete_shader(&self, shader: Self::Shader) {
        self.record(GlCall::DeleteShader(shader));
        let mut state = self.state.borrow_mut();
        if state.release(shader) {
            state.deleted_shaders += 1;
        }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        let id = self.state.borrow_mut().allocate();
        self.record(GlCall::CreateProgram(id));
        Ok(id)
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        self.record(GlCall::AttachShader { program, shader });
        self.state
            .borrow_mut()
            .attached
            .entry(program)
            .or_default()
            .push(shader);
    }

    fn link_program(&self, program: Self::Program) -> Result<(), String> {
        let result = {
            let mut state = self.state.borrow_mut();
            if let Some(log) = state.fail_link.take() {
                Err(log)
            } else {
                let attached = state.attached.get(&program).cloned().unwrap_or_default();
                if attached.len() == 2 && attached.iter().all(|id| state.compiled.contains(id)) {
                    Ok(())
                } else {
                    Err("ERROR: program needs a compiled vertex and fragment shader".to_owned())
                }
            }
        };
        self.record(GlCall::LinkProgram {
            id: program,
            ok: result.is_ok(),
        });
        result
    }

    fn use_program(&self, program: Option<Self::Program>) {
        self.record(GlCall::UseProgram(program));
    }

    fn delete_program(&self, program: Self::Program) {
        self.record(GlCall::DeleteProgram(program));
        let mut state = self.state.borrow_mut();
        if state.release(program) {
            state.deleted_programs += 1;
            state.attached.remove(&program);
        }
    }

    fn active_inputs(&self, program: Self::Program) -> Vec<ActiveInput<Self::Location>> {
        let state = self.state.borrow();
        let mut seen = HashSet::new();
        let mut inputs = Vec::new();
        let mut next_attribute = 0;
        for shader in state.attached.get(&program).into_iter().flatten() {
            let Some(source) = state.sources.get(shader) else {
                continue;
            };
            for (qualifier, ty, name) in declarations(source) {
                if !seen.insert(name.to_owned()) {
                    continue;
                }
                let (kind, location) = if qualifier == "attribute" {
                    let index = next_attribute;
                    next_attribute += 1;
                    (SlotKind::Attribute, InputLocation::Attribute(index))
                } else {
                    let kind = match ty {
                        "float" => SlotKind::Scalar,
                        "vec2" => SlotKind::Vec2,
                        _ => SlotKind::Other(0),
                    };
                    (kind, InputLocation::Uniform(name.to_owned()))
                };
                inputs.push(ActiveInput {
                    name: name.to_owned(),
                    kind,
                    location,
                });
            }
        }
        inputs
    }

    fn uniform_f32(&self, location: &Self::Location, value: f32) {
        self.record(GlCall::UniformF32 {
            name: location.clone(),
            value,
        });
        self.state
            .borrow_mut()
            .uniforms
            .insert(location.clone(), vec![value]);
    }

    fn uniform_vec2(&self, location: &Self::Location, x: f32, y: f32) {
        self.record(GlCall::UniformVec2 {
            name: location.clone(),
            x,
            y,
        });
        self.state
            .borrow_mut()
            .uniforms
            .insert(location.clone(), vec![x, y]);
    }

    fn create_geometry(&self, vertices: &[f32]) -> Result<Self::Geometry, String> {
        let mut state = self.state.borrow_mut();
        if let Some(reason) = state.fail_geometry.take() {
            return Err(reason);
        }
        let id = state.allocate();
        state.uploads.push(vertices.to_vec());
        state.calls.push(GlCall::CreateGeometry {
            id,
            vertices: vertices.len(),
        });
        Ok(RecordedGeometry(id))
    }

    fn bind_geometry(&self, geometry: &Self::Geometry, attribute: u32, components: i32) {
        self.record(GlCall::BindGeometry {
            id: geometry.0,
            attribute,
            components,
        });
    }

    fn delete_geometry(&self, geometry: Self::Geometry) {
        self.record(GlCall::DeleteGeometry(geometry.0));
        let mut state = self.state.borrow_mut();
        if state.release(geometry.0) {
            state.deleted_geometries += 1;
        }
    }

    fn viewport(&self, width: u32, height: u32) {
        self.record(GlCall::Viewport(width, height));
    }

    fn draw_triangle_strip(&self, first: i32, count: i32) {
        self.record(GlCall::DrawTriangleStrip { first, count });
        let mut state = self.state.borrow_mut();
        let time = state.uniforms.get("time").and_then(|v| v.first().copied());
        let resolution = state
            .uniforms
            .get("resolution")
            .and_then(|v| Some((*v.first()?, *v.get(1)?)));
        state.draws.push(DrawRecord {
            time,
            resolution,
            vertex_count: count,
        });
        if state.lose_context_after == Some(state.draws.len()) {
            state.context_lost = true;
        }
    }

    fn context_lost(&self) -> bool {
        std::mem::take(&mut self.state.borrow_mut().context_lost)
    }
}

/// In-memory [`PlatformSurface`] whose viewport can be changed from outside.
#[derive(Debug)]
pub struct HeadlessSurface {
    viewport: Rc<Cell<(u32, u32)>>,
    drawable: (u32, u32),
    unavailable: Option<String>,
    presents: u64,
    releases: u32,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Rc::new(Cell::new((width, height))),
            drawable: (0, 0),
            unavailable: None,
            presents: 0,
            releases: 0,
        }
    }

    /// A surface whose context can never be acquired.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::new(0, 0)
        }
    }

    /// Shared handle for simulating viewport changes.
    pub fn viewport_handle(&self) -> Rc<Cell<(u32, u32)>> {
        Rc::clone(&self.viewport)
    }

    pub fn drawable_size(&self) -> (u32, u32) {
        self.drawable
    }

    pub fn presents(&self) -> u64 {
        self.presents
    }

    pub fn releases(&self) -> u32 {
        self.releases
    }
}

impl PlatformSurface for HeadlessSurface {
    fn acquire(&mut self) -> Result<(), String> {
        match &self.unavailable {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }

    fn viewport_size(&self) -> (u32, u32) {
        self.viewport.get()
    }

    fn resize_drawable(&mut self, width: u32, height: u32) {
        self.drawable = (width, height);
    }

    fn present(&mut self) -> Result<(), String> {
        self.presents += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.releases += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_check_catches_unbalanced_braces() {
        assert!(check_syntax("void main() { }").is_ok());
        let err = check_syntax("void main() {\n  x = (1.0;\n").unwrap_err();
        assert!(err.contains("syntax error"));
        assert!(check_syntax("void helper() {}").is_err());
    }

    #[test]
    fn declarations_are_reflected() {
        let source = "uniform float time;\n  uniform vec2 resolution;\nattribute vec2 position;\n#define attribute in\n";
        let found: Vec<_> = declarations(source).collect();
        assert_eq!(
            found,
            vec![
                ("uniform", "float", "time"),
                ("uniform", "vec2", "resolution"),
                ("attribute", "vec2", "position"),
            ]
        );
    }

    #[test]
    fn double_delete_is_counted() {
        let backend = RecordingBackend::new();
        let shader = backend.create_shader(ShaderStage::Vertex).unwrap();
        backend.delete_shader(shader);
        backend.delete_shader(shader);
        assert_eq!(backend.deleted_shaders(), 1);
        assert_eq!(backend.invalid_deletes(), 1);
    }

    #[test]
    fn context_loss_is_reported_once() {
        let backend = RecordingBackend::new();
        backend.lose_context_after(1);
        backend.draw_triangle_strip(0, 4);
        assert!(backend.context_lost());
        assert!(!backend.context_lost());
    }
}
