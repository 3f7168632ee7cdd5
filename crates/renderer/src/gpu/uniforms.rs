use bytemuck::{Pod, Zeroable};

use crate::backend::UniformValue;
use crate::uniforms::UniformName;

/// CPU mirror of the `CanvasParams` std140 block injected by
/// [`super::compile`]. Field order and padding must match `UNIFORM_BLOCK`.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct CanvasUniforms {
    pub resolution: [f32; 2],
    pub pointer: [f32; 2],
    pub time: f32,
    pub primary_condition: f32,
    pub secondary_condition: f32,
    pub suppress_center_fade: f32,
}

unsafe impl Zeroable for CanvasUniforms {}
unsafe impl Pod for CanvasUniforms {}

impl Default for CanvasUniforms {
    fn default() -> Self {
        Self {
            resolution: [1.0, 1.0],
            pointer: [0.5, 0.5],
            time: 0.0,
            primary_condition: 0.0,
            secondary_condition: 0.0,
            suppress_center_fade: 0.0,
        }
    }
}

impl CanvasUniforms {
    /// Writes `value` into the field backing `name`. Returns false when the
    /// value kind does not match the field.
    pub fn apply(&mut self, name: UniformName, value: UniformValue) -> bool {
        match (name, value) {
            (UniformName::Resolution, UniformValue::Vec2(v)) => self.resolution = v,
            (UniformName::Pointer, UniformValue::Vec2(v)) => self.pointer = v,
            (UniformName::Time, UniformValue::Float(v)) => self.time = v,
            (UniformName::PrimaryCondition, UniformValue::Bool(v)) => {
                self.primary_condition = flag(v)
            }
            (UniformName::SecondaryCondition, UniformValue::Bool(v)) => {
                self.secondary_condition = flag(v)
            }
            (UniformName::SuppressCenterFade, UniformValue::Bool(v)) => {
                self.suppress_center_fade = flag(v)
            }
            _ => return false,
        }
        true
    }
}

fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}
