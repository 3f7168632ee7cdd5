use std::fmt;

/// Pipeline stage a shader source is compiled for.
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

/// Failures a canvas can run into while acquiring or (re)building its GPU state.
///
/// None of these escape the canvas host: they are logged and the canvas stays
/// blank until the condition is cleared.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CanvasError {
    #[error("rendering context unavailable")]
    ContextUnavailable,
    #[error("failed to compile {stage} shader for variant {variant}: {log}")]
    Compile {
        stage: ShaderStage,
        variant: i32,
        log: String,
    },
    #[error("failed to link program for variant {variant}: {log}")]
    Link { variant: i32, log: String },
    #[error("failed to create {what}: {message}")]
    Resource { what: &'static str, message: String },
}

impl CanvasError {
    /// Compiler or linker diagnostics, when the failure carries any.
    pub fn diagnostic_log(&self) -> Option<&str> {
        match self {
            CanvasError::Compile { log, .. } | CanvasError::Link { log, .. } => Some(log.as_str()),
            _ => None,
        }
    }

    pub(crate) fn resource(what: &'static str, err: impl fmt::Display) -> Self {
        CanvasError::Resource {
            what,
            message: err.to_string(),
        }
    }
}
