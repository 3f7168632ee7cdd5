use crate::backend::{RenderBackend, UniformValue};
use crate::resources::GpuResources;

/// Uniform names every fragment variant is expected to declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformName {
    Resolution,
    Time,
    Pointer,
    PrimaryCondition,
    SecondaryCondition,
    SuppressCenterFade,
}

impl UniformName {
    pub const ALL: [UniformName; 6] = [
        UniformName::Resolution,
        UniformName::Time,
        UniformName::Pointer,
        UniformName::PrimaryCondition,
        UniformName::SecondaryCondition,
        UniformName::SuppressCenterFade,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UniformName::Resolution => "resolution",
            UniformName::Time => "time",
            UniformName::Pointer => "pointer",
            UniformName::PrimaryCondition => "primaryCondition",
            UniformName::SecondaryCondition => "secondaryCondition",
            UniformName::SuppressCenterFade => "suppressCenterFade",
        }
    }

    pub fn glsl_type(self) -> &'static str {
        match self {
            UniformName::Resolution | UniformName::Pointer => "vec2",
            UniformName::Time => "float",
            UniformName::PrimaryCondition
            | UniformName::SecondaryCondition
            | UniformName::SuppressCenterFade => "bool",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|uniform| uniform.as_str() == name)
    }
}

/// Pointer position in canvas space, normalized to `[0, 1]` on both axes with
/// the origin at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerPosition {
    pub x: f32,
    pub y: f32,
}

impl PointerPosition {
    pub const CENTER: PointerPosition = PointerPosition { x: 0.5, y: 0.5 };

    /// Normalizes a canvas-local position (origin top-left, same units as
    /// `width`/`height`). Positions outside the box are clamped to its edge.
    pub fn from_canvas(x: f64, y: f64, width: f64, height: f64) -> Self {
        if width <= 0.0 || height <= 0.0 || !x.is_finite() || !y.is_finite() {
            return Self::CENTER;
        }
        let nx = (x / width).clamp(0.0, 1.0);
        let ny = (1.0 - y / height).clamp(0.0, 1.0);
        Self {
            x: nx as f32,
            y: ny as f32,
        }
    }

    pub fn as_array(self) -> [f32; 2] {
        [self.x, self.y]
    }
}

impl Default for PointerPosition {
    fn default() -> Self {
        Self::CENTER
    }
}

/// Host-driven booleans the shaders map onto their palettes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderFlags {
    /// "Has urgent items" in the site's dashboards.
    pub primary_condition: bool,
    /// "Has upcoming items".
    pub secondary_condition: bool,
    /// Disables the radial dimming near the center; used for small previews
    /// with no overlaid text.
    pub suppress_center_fade: bool,
}

/// Per-frame snapshot handed to [`bind`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderState {
    pub elapsed_seconds: f32,
    pub pointer: PointerPosition,
    pub flags: RenderFlags,
}

/// Uniform locations resolved once when a program is initialized.
#[derive(Debug, Clone)]
pub struct UniformLocations<L> {
    pub resolution: Option<L>,
    pub time: Option<L>,
    pub pointer: Option<L>,
    pub primary_condition: Option<L>,
    pub secondary_condition: Option<L>,
    pub suppress_center_fade: Option<L>,
}

impl<L> UniformLocations<L> {
    pub fn resolve<B>(backend: &mut B, program: &B::Program) -> Self
    where
        B: RenderBackend<UniformLocation = L>,
    {
        let mut lookup = |name: UniformName| {
            let location = backend.uniform_location(program, name.as_str());
            if location.is_none() {
                tracing::debug!(uniform = name.as_str(), "program does not declare uniform");
            }
            location
        };
        Self {
            resolution: lookup(UniformName::Resolution),
            time: lookup(UniformName::Time),
            pointer: lookup(UniformName::Pointer),
            primary_condition: lookup(UniformName::PrimaryCondition),
            secondary_condition: lookup(UniformName::SecondaryCondition),
            suppress_center_fade: lookup(UniformName::SuppressCenterFade),
        }
    }

    pub fn get(&self, name: UniformName) -> Option<&L> {
        match name {
            UniformName::Resolution => self.resolution.as_ref(),
            UniformName::Time => self.time.as_ref(),
            UniformName::Pointer => self.pointer.as_ref(),
            UniformName::PrimaryCondition => self.primary_condition.as_ref(),
            UniformName::SecondaryCondition => self.secondary_condition.as_ref(),
            UniformName::SuppressCenterFade => self.suppress_center_fade.as_ref(),
        }
    }

    pub fn resolved_count(&self) -> usize {
        UniformName::ALL
            .into_iter()
            .filter(|name| self.get(*name).is_some())
            .count()
    }
}

/// Pushes `state` into the program's uniforms.
///
/// The program must already be current. Uniforms the program does not declare
/// are skipped.
pub fn bind<B>(backend: &mut B, resources: &GpuResources<B>, state: &RenderState)
where
    B: RenderBackend,
{
    let size = backend.drawable_size();
    let values = [
        (
            UniformName::Resolution,
            UniformValue::Vec2([size.width as f32, size.height as f32]),
        ),
        (UniformName::Time, UniformValue::Float(state.elapsed_seconds)),
        (
            UniformName::Pointer,
            UniformValue::Vec2(state.pointer.as_array()),
        ),
        (
            UniformName::PrimaryCondition,
            UniformValue::Bool(state.flags.primary_condition),
        ),
        (
            UniformName::SecondaryCondition,
            UniformValue::Bool(state.flags.secondary_condition),
        ),
        (
            UniformName::SuppressCenterFade,
            UniformValue::Bool(state.flags.suppress_center_fade),
        ),
    ];

    for (name, value) in values {
        if let Some(location) = resources.uniforms.get(name) {
            backend.set_uniform(location, value);
        }
    }
}
