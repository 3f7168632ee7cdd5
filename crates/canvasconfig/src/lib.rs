use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer};
use serde::Deserialize;

pub const DEFAULT_SHADER: i32 = 1;
pub const DEFAULT_SIZE: CanvasDimensions = CanvasDimensions {
    width: 600,
    height: 600,
};
pub const DEFAULT_CANVAS_NAME: &str = "canvas";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Canvas size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasDimensions {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for CanvasDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for CanvasDimensions {
    type Err = String;

    /// Accepts `WIDTHxHEIGHT` or a single integer for a square canvas.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        let (width, height) = match normalized.split_once('x') {
            Some((width, height)) => (width.trim(), height.trim()),
            None => (normalized.as_str(), normalized.as_str()),
        };
        let parse = |value: &str| {
            value
                .parse::<u32>()
                .map_err(|_| format!("invalid canvas size '{raw}'; expected WIDTHxHEIGHT"))
        };
        let dimensions = CanvasDimensions {
            width: parse(width)?,
            height: parse(height)?,
        };
        if dimensions.width == 0 || dimensions.height == 0 {
            return Err(format!("canvas size '{raw}' must be greater than zero"));
        }
        Ok(dimensions)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasConfig {
    pub version: u32,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default, rename = "canvas")]
    pub canvases: Vec<CanvasEntry>,
    #[serde(default, rename = "shader")]
    pub shaders: Vec<ShaderEntry>,
    /// Directory relative shader paths are resolved against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            version: 1,
            defaults: Defaults::default(),
            canvases: Vec::new(),
            shaders: Vec::new(),
            base_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Defaults {
    pub shader: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_size_opt")]
    pub size: Option<CanvasDimensions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasEntry {
    pub name: String,
    #[serde(default)]
    pub shader: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_size_opt")]
    pub size: Option<CanvasDimensions>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub secondary: bool,
    #[serde(default)]
    pub suppress_center_fade: bool,
}

/// Extra fragment shader registered on top of the built-in catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct ShaderEntry {
    pub id: i32,
    pub name: String,
    pub path: PathBuf,
}

/// A canvas with every default applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCanvas {
    pub name: String,
    pub shader: i32,
    pub size: CanvasDimensions,
    pub primary: bool,
    pub secondary: bool,
    pub suppress_center_fade: bool,
}

fn deserialize_size_opt<'de, D>(deserializer: D) -> Result<Option<CanvasDimensions>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(Helper::Str(raw)) => Some(raw.parse().map_err(de::Error::custom)?),
        Some(Helper::Num(value)) => {
            if value <= 0 {
                return Err(de::Error::custom("canvas size must be greater than zero"));
            }
            Some(value.to_string().parse().map_err(de::Error::custom)?)
        }
    };
    Ok(result)
}

impl CanvasConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: CanvasConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates `path`; relative shader paths will resolve against
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&input)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    pub fn default_shader(&self) -> i32 {
        self.defaults.shader.unwrap_or(DEFAULT_SHADER)
    }

    pub fn default_size(&self) -> CanvasDimensions {
        self.defaults.size.unwrap_or(DEFAULT_SIZE)
    }

    pub fn canvas(&self, name: &str) -> Option<&CanvasEntry> {
        self.canvases.iter().find(|canvas| canvas.name == name)
    }

    /// Every declared canvas with defaults applied, or a single default canvas
    /// when none is declared.
    pub fn resolve_canvases(&self) -> Vec<ResolvedCanvas> {
        if self.canvases.is_empty() {
            return vec![ResolvedCanvas {
                name: DEFAULT_CANVAS_NAME.to_string(),
                shader: self.default_shader(),
                size: self.default_size(),
                primary: false,
                secondary: false,
                suppress_center_fade: false,
            }];
        }

        self.canvases
            .iter()
            .map(|canvas| ResolvedCanvas {
                name: canvas.name.clone(),
                shader: canvas.shader.unwrap_or_else(|| self.default_shader()),
                size: canvas.size.unwrap_or_else(|| self.default_size()),
                primary: canvas.primary,
                secondary: canvas.secondary,
                suppress_center_fade: canvas.suppress_center_fade,
            })
            .collect()
    }

    /// Location of a shader entry's source file.
    pub fn shader_path(&self, shader: &ShaderEntry) -> PathBuf {
        match &self.base_dir {
            Some(base) if shader.path.is_relative() => base.join(&shader.path),
            _ => shader.path.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let mut names = BTreeSet::new();
        for canvas in &self.canvases {
            if canvas.name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "canvas name may not be empty".into(),
                ));
            }
            if !names.insert(canvas.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "canvas '{}' is declared more than once",
                    canvas.name
                )));
            }
        }

        let mut ids = BTreeSet::new();
        for shader in &self.shaders {
            if !ids.insert(shader.id) {
                return Err(ConfigError::Invalid(format!(
                    "shader id {} is declared more than once",
                    shader.id
                )));
            }
            if shader.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "shader {} must have a name",
                    shader.id
                )));
            }
            if shader.path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "shader {} ('{}') must have a path",
                    shader.id, shader.name
                )));
            }
        }

        Ok(())
    }
}
