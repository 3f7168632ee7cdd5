//! Read-only catalog of the fragment shaders a canvas can render.
//!
//! The registry is built once at startup and handed to every canvas host
//! behind an `Arc`. Every fragment source follows the same uniform naming
//! contract (see [`crate::uniforms::UniformName`]) so the binder can push
//! inputs without knowing which variant is running.

use std::borrow::Cow;

/// Vertex stage shared by every variant; draws the unit quad and forwards
/// texture coordinates as `v_texcoord`.
pub const QUAD_VERTEX_SHADER: &str = include_str!("shaders/quad.vert");

const AURORA_FLOW: &str = include_str!("shaders/aurora_flow.frag");
const PULSE_GRID: &str = include_str!("shaders/pulse_grid.frag");
const NEBULA_DRIFT: &str = include_str!("shaders/nebula_drift.frag");
const SIGNAL_WAVES: &str = include_str!("shaders/signal_waves.frag");

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("shader registry must contain at least one variant")]
    Empty,
    #[error("shader id {0} registered more than once")]
    DuplicateId(i32),
}

/// One selectable fragment shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderVariant {
    pub id: i32,
    pub display_name: Cow<'static, str>,
    pub fragment_source: Cow<'static, str>,
}

impl ShaderVariant {
    pub fn new(
        id: i32,
        display_name: impl Into<Cow<'static, str>>,
        fragment_source: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            fragment_source: fragment_source.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShaderRegistry {
    vertex_source: Cow<'static, str>,
    variants: Vec<ShaderVariant>,
}

impl ShaderRegistry {
    /// The four variants shipped with the site, ids 1 through 4.
    pub fn builtin() -> Self {
        Self {
            vertex_source: Cow::Borrowed(QUAD_VERTEX_SHADER),
            variants: builtin_variants(),
        }
    }

    /// Starts from the built-in catalog so callers can append their own variants.
    pub fn builder() -> ShaderRegistryBuilder {
        ShaderRegistryBuilder {
            vertex_source: Cow::Borrowed(QUAD_VERTEX_SHADER),
            variants: builtin_variants(),
        }
    }

    /// Builds a registry from an explicit variant list.
    pub fn new(
        vertex_source: impl Into<Cow<'static, str>>,
        variants: Vec<ShaderVariant>,
    ) -> Result<Self, RegistryError> {
        ShaderRegistryBuilder {
            vertex_source: vertex_source.into(),
            variants,
        }
        .build()
    }

    /// Returns the variant registered under `id`, or the first variant when no
    /// entry matches.
    pub fn lookup(&self, id: i32) -> &ShaderVariant {
        self.get(id).unwrap_or(&self.variants[0])
    }

    pub fn get(&self, id: i32) -> Option<&ShaderVariant> {
        self.variants.iter().find(|variant| variant.id == id)
    }

    pub fn contains(&self, id: i32) -> bool {
        self.get(id).is_some()
    }

    pub fn variants(&self) -> &[ShaderVariant] {
        &self.variants
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    /// Id of the variant registered after `id`, wrapping to the first.
    pub fn next_id(&self, id: i32) -> i32 {
        let position = self
            .variants
            .iter()
            .position(|variant| variant.id == id)
            .map(|index| (index + 1) % self.variants.len())
            .unwrap_or(0);
        self.variants[position].id
    }
}

pub struct ShaderRegistryBuilder {
    vertex_source: Cow<'static, str>,
    variants: Vec<ShaderVariant>,
}

impl ShaderRegistryBuilder {
    pub fn variant(mut self, variant: ShaderVariant) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn build(self) -> Result<ShaderRegistry, RegistryError> {
        if self.variants.is_empty() {
            return Err(RegistryError::Empty);
        }
        for (index, variant) in self.variants.iter().enumerate() {
            if self.variants[..index]
                .iter()
                .any(|earlier| earlier.id == variant.id)
            {
                return Err(RegistryError::DuplicateId(variant.id));
            }
        }
        Ok(ShaderRegistry {
            vertex_source: self.vertex_source,
            variants: self.variants,
        })
    }
}

fn builtin_variants() -> Vec<ShaderVariant> {
    vec![
        ShaderVariant::new(1, "Aurora Flow", AURORA_FLOW),
        ShaderVariant::new(2, "Pulse Grid", PULSE_GRID),
        ShaderVariant::new(3, "Nebula Drift", NEBULA_DRIFT),
        ShaderVariant::new(4, "Signal Waves", SIGNAL_WAVES),
    ]
}
