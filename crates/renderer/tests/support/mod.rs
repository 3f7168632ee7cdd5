#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use renderer::{
    AttributeLocations, BufferKind, CanvasElement, CanvasHost, CanvasProps, CanvasSize,
    FrameRequest, FrameScheduler, QuadBuffers, RenderBackend, ShaderRegistry, ShaderStage,
    ShaderVariant, UniformName, UniformValue,
};

/// Marker that makes the spy compiler reject a source.
pub const SYNTAX_ERROR: &str = "@@syntax-error@@";
/// Marker that makes the spy linker reject a program.
pub const LINK_ERROR: &str = "@@link-error@@";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CompileShader { stage: ShaderStage, shader: u32 },
    CompileFailed { stage: ShaderStage },
    LinkProgram { program: u32 },
    LinkFailed,
    DeleteShader(u32),
    DeleteProgram(u32),
    CreateBuffer { kind: BufferKind, buffer: u32 },
    DeleteBuffer(u32),
    UseProgram(u32),
    SetUniform { name: UniformName, value: UniformValue },
    Clear,
    Draw { program: u32, index_count: u32 },
    Resize(CanvasSize),
    RequestFrame(FrameRequest),
    CancelFrame(FrameRequest),
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

pub fn new_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

pub struct SpyShader {
    id: u32,
    source: String,
}

pub struct SpyProgram {
    pub id: u32,
    declared: Vec<UniformName>,
}

pub struct SpyBuffer {
    id: u32,
    kind: BufferKind,
}

/// Records every call and panics on any use of a released handle.
pub struct SpyBackend {
    log: CallLog,
    next_id: u32,
    size: CanvasSize,
    current: Option<u32>,
    pub live_shaders: BTreeSet<u32>,
    pub live_programs: BTreeSet<u32>,
    pub live_buffers: BTreeSet<u32>,
}

impl SpyBackend {
    pub fn new(log: CallLog, size: CanvasSize) -> Self {
        Self {
            log,
            next_id: 1,
            size,
            current: None,
            live_shaders: BTreeSet::new(),
            live_programs: BTreeSet::new(),
            live_buffers: BTreeSet::new(),
        }
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl RenderBackend for SpyBackend {
    type Shader = SpyShader;
    type Program = SpyProgram;
    type Buffer = SpyBuffer;
    type UniformLocation = UniformName;

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<SpyShader, String> {
        if source.contains(SYNTAX_ERROR) {
            self.record(Call::CompileFailed { stage });
            return Err(format!("ERROR: 0:4: '{SYNTAX_ERROR}' : syntax error"));
        }
        let id = self.allocate();
        self.live_shaders.insert(id);
        self.record(Call::CompileShader { stage, shader: id });
        Ok(SpyShader {
            id,
            source: source.to_string(),
        })
    }

    fn link_program(&mut self, vertex: &SpyShader, fragment: &SpyShader) -> Result<SpyProgram, String> {
        assert!(self.live_shaders.contains(&vertex.id), "link with deleted vertex shader");
        assert!(self.live_shaders.contains(&fragment.id), "link with deleted fragment shader");
        if fragment.source.contains(LINK_ERROR) {
            self.record(Call::LinkFailed);
            return Err("ERROR: varying v_texcoord not written by vertex stage".to_string());
        }
        let declared = UniformName::ALL
            .into_iter()
            .filter(|name| {
                let declaration = format!("uniform {} {};", name.glsl_type(), name.as_str());
                vertex.source.contains(&declaration) || fragment.source.contains(&declaration)
            })
            .collect();
        let id = self.allocate();
        self.live_programs.insert(id);
        self.record(Call::LinkProgram { program: id });
        Ok(SpyProgram { id, declared })
    }

    fn delete_shader(&mut self, shader: SpyShader) {
        assert!(self.live_shaders.remove(&shader.id), "shader {} deleted twice", shader.id);
        self.record(Call::DeleteShader(shader.id));
    }

    fn delete_program(&mut self, program: SpyProgram) {
        assert!(self.live_programs.remove(&program.id), "program {} deleted twice", program.id);
        if self.current == Some(program.id) {
            self.current = None;
        }
        self.record(Call::DeleteProgram(program.id));
    }

    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> anyhow::Result<SpyBuffer> {
        assert!(!contents.is_empty());
        let id = self.allocate();
        self.live_buffers.insert(id);
        self.record(Call::CreateBuffer { kind, buffer: id });
        Ok(SpyBuffer { id, kind })
    }

    fn delete_buffer(&mut self, buffer: SpyBuffer) {
        assert!(self.live_buffers.remove(&buffer.id), "buffer {} deleted twice", buffer.id);
        self.record(Call::DeleteBuffer(buffer.id));
    }

    fn attribute_location(&mut self, program: &SpyProgram, name: &str) -> Option<u32> {
        assert!(self.live_programs.contains(&program.id));
        match name {
            "a_position" => Some(0),
            "a_texcoord" => Some(1),
            _ => None,
        }
    }

    fn uniform_location(&mut self, program: &SpyProgram, name: &str) -> Option<UniformName> {
        assert!(self.live_programs.contains(&program.id));
        UniformName::from_name(name).filter(|uniform| program.declared.contains(uniform))
    }

    fn use_program(&mut self, program: &SpyProgram) {
        assert!(
            self.live_programs.contains(&program.id),
            "use of deleted program {}",
            program.id
        );
        self.current = Some(program.id);
        self.record(Call::UseProgram(program.id));
    }

    fn set_uniform(&mut self, location: &UniformName, value: UniformValue) {
        assert!(self.current.is_some(), "uniform write without a program");
        self.record(Call::SetUniform {
            name: *location,
            value,
        });
    }

    fn clear(&mut self, _color: [f32; 4]) {
        self.record(Call::Clear);
    }

    fn draw(
        &mut self,
        quad: &QuadBuffers<SpyBuffer>,
        attributes: &AttributeLocations,
        index_count: u32,
    ) -> anyhow::Result<()> {
        let Some(program) = self.current else {
            anyhow::bail!("draw without a program");
        };
        for buffer in [&quad.positions, &quad.texcoords, &quad.indices] {
            assert!(self.live_buffers.contains(&buffer.id), "draw with deleted buffer {}", buffer.id);
        }
        assert_eq!(quad.indices.kind, BufferKind::Index);
        assert_eq!(attributes.position, Some(0));
        self.record(Call::Draw {
            program,
            index_count,
        });
        Ok(())
    }

    fn resize(&mut self, size: CanvasSize) {
        self.size = size;
        self.record(Call::Resize(size));
    }

    fn drawable_size(&self) -> CanvasSize {
        self.size
    }
}

pub struct SpyScheduler {
    log: CallLog,
    next: u64,
}

impl SpyScheduler {
    pub fn new(log: CallLog) -> Self {
        Self { log, next: 0 }
    }
}

impl FrameScheduler for SpyScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        self.next += 1;
        let request = FrameRequest(self.next);
        self.log.borrow_mut().push(Call::RequestFrame(request));
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        self.log.borrow_mut().push(Call::CancelFrame(request));
    }
}

/// Canvas element that hands out spy contexts, or none when unavailable.
pub struct SpyElement {
    log: CallLog,
    available: bool,
    pub acquisitions: u32,
}

impl SpyElement {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            available: true,
            acquisitions: 0,
        }
    }

    pub fn unavailable(log: CallLog) -> Self {
        Self {
            log,
            available: false,
            acquisitions: 0,
        }
    }
}

impl CanvasElement for SpyElement {
    type Context = SpyBackend;

    fn acquire_context(&mut self, size: CanvasSize) -> Option<SpyBackend> {
        self.acquisitions += 1;
        self.available.then(|| SpyBackend::new(Rc::clone(&self.log), size))
    }
}

pub type SpyHost = CanvasHost<SpyBackend, SpyScheduler>;

pub fn spy_host(registry: ShaderRegistry, props: CanvasProps) -> (SpyHost, CallLog) {
    let log = new_log();
    let host = CanvasHost::new(
        "test",
        Arc::new(registry),
        props,
        SpyScheduler::new(Rc::clone(&log)),
    );
    (host, log)
}

/// A host mounted on an available element at `now`.
pub fn mounted_host(registry: ShaderRegistry, props: CanvasProps, now: Instant) -> (SpyHost, CallLog) {
    let (mut host, log) = spy_host(registry, props);
    let mut element = SpyElement::new(Rc::clone(&log));
    host.mount(&mut element, now);
    (host, log)
}

/// Fragment source that declares every uniform except `pointer`.
pub const NO_POINTER_FRAGMENT: &str = r#"#version 300 es
precision mediump float;
uniform vec2 resolution;
uniform float time;
uniform bool primaryCondition;
uniform bool secondaryCondition;
uniform bool suppressCenterFade;
in vec2 v_texcoord;
out vec4 fragColor;
void main() {
    fragColor = vec4(v_texcoord, sin(time), 1.0);
}
"#;

pub fn registry_with(variant: ShaderVariant) -> ShaderRegistry {
    ShaderRegistry::builder()
        .variant(variant)
        .build()
        .expect("valid registry")
}

pub fn count(log: &CallLog, predicate: impl Fn(&Call) -> bool) -> usize {
    log.borrow().iter().filter(|call| predicate(call)).count()
}

pub fn position(log: &CallLog, predicate: impl Fn(&Call) -> bool) -> Option<usize> {
    log.borrow().iter().position(|call| predicate(call))
}

pub fn clear_log(log: &CallLog) {
    log.borrow_mut().clear();
}
