use std::borrow::Cow;

use wgpu::naga;

use crate::error::ShaderStage;
use crate::uniforms::UniformName;

/// GLSL source rewritten for naga's Vulkan-flavoured GLSL frontend.
#[derive(Debug, Clone)]
pub(crate) struct TranslatedShader {
    pub source: String,
    /// Protocol uniforms the original source declared.
    pub declared_uniforms: Vec<UniformName>,
    /// Stage inputs with the locations assigned to them.
    pub inputs: Vec<(String, u32)>,
}

/// Rewrites a GLSL ES 3.00 style shader so wgpu can compile it.
///
/// Steps performed:
///
/// 1. Drop `#version` and `precision` lines.
/// 2. Strip comments, then remove loose `uniform` declarations of the canvas
///    protocol and remember which ones were present. Comma lists are split.
///    Any other loose uniform is rejected.
/// 3. Give every top-level `in`/`out` declaration an explicit location in
///    declaration order.
/// 4. Prepend [`UNIFORM_BLOCK`] plus one macro per declared uniform that maps
///    the name onto the block field.
///
/// Removed lines are replaced by blank ones and the body starts with
/// `#line 1`, so compiler diagnostics point at the original line numbers.
pub(crate) fn translate_glsl_es(source: &str, stage: ShaderStage) -> Result<TranslatedShader, String> {
    let mut body = String::with_capacity(source.len());
    let mut declared_uniforms = Vec::new();
    let mut inputs = Vec::new();
    let mut next_input = 0u32;
    let mut next_output = 0u32;

    let source = strip_comments(source);
    for (index, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("#version") || trimmed.starts_with("precision ") {
            body.push('\n');
            continue;
        }

        if let Some((_, names)) = parse_declaration(trimmed, "uniform") {
            for name in names {
                let Some(uniform) = UniformName::from_name(name) else {
                    return Err(format!(
                        "{}:{}: uniform `{name}` is not part of the canvas uniform interface",
                        stage,
                        index + 1
                    ));
                };
                if !declared_uniforms.contains(&uniform) {
                    declared_uniforms.push(uniform);
                }
            }
            body.push('\n');
            continue;
        }
        if is_qualified(trimmed, "uniform") {
            return Err(format!(
                "{}:{}: unsupported uniform declaration `{trimmed}`; declare canvas uniforms as `uniform <type> <name>;`",
                stage,
                index + 1
            ));
        }

        if let Some((ty, names)) = parse_declaration(trimmed, "in") {
            let mut declarations = Vec::with_capacity(names.len());
            for name in names {
                declarations.push(format!("layout(location = {next_input}) in {ty} {name};"));
                inputs.push((name.to_string(), next_input));
                next_input += 1;
            }
            body.push_str(&declarations.join(" "));
            body.push('\n');
            continue;
        }

        if let Some((ty, names)) = parse_declaration(trimmed, "out") {
            let mut declarations = Vec::with_capacity(names.len());
            for name in names {
                declarations.push(format!("layout(location = {next_output}) out {ty} {name};"));
                next_output += 1;
            }
            body.push_str(&declarations.join(" "));
            body.push('\n');
            continue;
        }

        body.push_str(line);
        body.push('\n');
    }

    let mut header = String::from(UNIFORM_BLOCK);
    for uniform in &declared_uniforms {
        header.push_str(&uniform_macro(*uniform));
        header.push('\n');
    }

    Ok(TranslatedShader {
        source: format!("{header}#line 1\n{body}"),
        declared_uniforms,
        inputs,
    })
}

/// Compiles a translated shader; validation errors are collected through an
/// error scope so the caller gets the diagnostic text instead of a panic.
pub(crate) fn compile_module(
    device: &wgpu::Device,
    translated: &TranslatedShader,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, String> {
    let naga_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(match stage {
            ShaderStage::Vertex => "canvas vertex",
            ShaderStage::Fragment => "canvas fragment",
        }),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(translated.source.clone()),
            stage: naga_stage,
            defines: &[],
        },
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(err.to_string()),
        None => Ok(module),
    }
}

/// Replaces `//` and `/* */` comments with whitespace, keeping every newline
/// so line numbers survive.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_block = false;
    while let Some(c) = chars.next() {
        if in_block {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block = false;
                out.push(' ');
            } else if c == '\n' {
                out.push('\n');
            }
            continue;
        }
        match (c, chars.peek().copied()) {
            ('/', Some('/')) => {
                while chars.next_if(|next| *next != '\n').is_some() {}
            }
            ('/', Some('*')) => {
                chars.next();
                in_block = true;
            }
            _ => out.push(c),
        }
    }
    out
}

fn is_qualified(line: &str, qualifier: &str) -> bool {
    line.strip_prefix(qualifier)
        .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}

/// Splits `<qualifier> [precision] <type> <name>[, <name>...];` into the type
/// and its declarator names.
fn parse_declaration<'a>(line: &'a str, qualifier: &str) -> Option<(&'a str, Vec<&'a str>)> {
    if !is_qualified(line, qualifier) {
        return None;
    }
    let mut rest = line[qualifier.len()..].trim().strip_suffix(';')?.trim_end();
    let ty = loop {
        let (token, tail) = rest.split_once(char::is_whitespace)?;
        rest = tail.trim_start();
        if !matches!(token, "lowp" | "mediump" | "highp") {
            break token;
        }
    };
    let names: Vec<&str> = rest.split(',').map(str::trim).collect();
    let valid = names.iter().all(|name| {
        name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    });
    valid.then_some((ty, names))
}

fn uniform_macro(uniform: UniformName) -> String {
    let name = uniform.as_str();
    match uniform {
        UniformName::Resolution => format!("#define {name} canvas_params.u_resolution"),
        UniformName::Pointer => format!("#define {name} canvas_params.u_pointer"),
        UniformName::Time => format!("#define {name} canvas_params.u_time"),
        UniformName::PrimaryCondition => {
            format!("#define {name} (canvas_params.u_primary_condition > 0.5)")
        }
        UniformName::SecondaryCondition => {
            format!("#define {name} (canvas_params.u_secondary_condition > 0.5)")
        }
        UniformName::SuppressCenterFade => {
            format!("#define {name} (canvas_params.u_suppress_center_fade > 0.5)")
        }
    }
}

/// Layout must match [`super::uniforms::CanvasUniforms`]. Booleans travel as
/// floats because uniform buffers cannot hold `bool`.
const UNIFORM_BLOCK: &str = r"#version 450

layout(std140, set = 0, binding = 0) uniform CanvasParams {
    vec2 u_resolution;
    vec2 u_pointer;
    float u_time;
    float u_primary_condition;
    float u_secondary_condition;
    float u_suppress_center_fade;
} canvas_params;

";
