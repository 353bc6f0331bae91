//! Shader program linking: compiles a vertex and a fragment WGSL stage,
//! checks that they agree on their shared interface, binds named fragment
//! outputs to locations and introspects attributes and uniforms.

use std::fmt;

use log::{debug, info};
use naga::valid::{Capabilities, ValidationFlags, Validator};

/// Errors produced while compiling or linking a program.
///
/// Cloneable so that a failed link can be cached and reported again.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("program '{label}': {stage} stage failed to parse:\n{message}")]
    Parse {
        label: String,
        stage: StageKind,
        message: String,
    },

    #[error("program '{label}': {stage} stage failed validation:\n{message}")]
    Validation {
        label: String,
        stage: StageKind,
        message: String,
    },

    #[error("program '{label}': {stage} stage has no entry point '{entry}'")]
    MissingEntryPoint {
        label: String,
        stage: StageKind,
        entry: String,
    },

    #[error(
        "program '{label}': fragment input at location {location} is not written by the vertex stage"
    )]
    InterfaceMismatch { label: String, location: u32 },

    #[error("program '{label}': output '{name}' must be at location {expected}, found {found:?}")]
    OutputBinding {
        label: String,
        name: String,
        expected: u32,
        found: Option<u32>,
    },
}

/// Which stage of a program an error or entry point refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    fn naga_stage(self) -> naga::ShaderStage {
        match self {
            StageKind::Vertex => naga::ShaderStage::Vertex,
            StageKind::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex"),
            StageKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// A fragment output that must be written at a fixed location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputBinding {
    pub location: u32,
    pub name: String,
}

impl OutputBinding {
    pub fn new(location: u32, name: impl Into<String>) -> Self {
        Self {
            location,
            name: name.into(),
        }
    }
}

/// Everything a linker needs to build one program.
pub struct ProgramDescriptor<'a> {
    /// Debug label used in diagnostics and GPU object names.
    pub label: &'a str,
    pub vertex_source: &'a str,
    pub vertex_entry: &'a str,
    pub fragment_source: &'a str,
    pub fragment_entry: &'a str,
    /// Outputs the fragment stage must expose, checked after compilation.
    pub outputs: &'a [OutputBinding],
    /// Vertex buffer layouts, used by linkers that build GPU pipelines.
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
}

/// A vertex stage input discovered by introspection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramAttribute {
    pub name: String,
    pub location: u32,
}

/// A bound resource (uniform buffer, texture, sampler) discovered by
/// introspection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramUniform {
    pub name: String,
    pub group: u32,
    pub binding: u32,
}

/// A linked program.
#[derive(Debug)]
pub struct Program {
    label: String,
    outputs: Vec<OutputBinding>,
    attributes: Vec<ProgramAttribute>,
    uniforms: Vec<ProgramUniform>,
    pipeline: Option<wgpu::RenderPipeline>,
}

impl Program {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Fragment outputs bound during linking, in location order.
    pub fn outputs(&self) -> &[OutputBinding] {
        &self.outputs
    }

    /// Vertex attributes, in location order.
    pub fn attributes(&self) -> &[ProgramAttribute] {
        &self.attributes
    }

    /// Bound resources of both stages, ordered by group then binding.
    pub fn uniforms(&self) -> &[ProgramUniform] {
        &self.uniforms
    }

    /// GPU pipeline, if the program was linked on a device.
    pub fn pipeline(&self) -> Option<&wgpu::RenderPipeline> {
        self.pipeline.as_ref()
    }

    pub(crate) fn with_pipeline(mut self, pipeline: wgpu::RenderPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }
}

/// Builds programs from WGSL sources.
pub trait ProgramLinker: Send + Sync {
    /// Compiles and links both stages, then binds outputs and introspects
    /// attributes and uniforms.
    fn link(&self, descriptor: &ProgramDescriptor<'_>) -> Result<Program, LinkError>;
}

/// GPU-free linker: validates both stages with naga and checks the stage
/// interface. Produces programs without a pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct NagaLinker;

impl NagaLinker {
    pub fn new() -> Self {
        Self
    }
}

impl ProgramLinker for NagaLinker {
    fn link(&self, descriptor: &ProgramDescriptor<'_>) -> Result<Program, LinkError> {
        let program = link_modules(descriptor)?;
        info!("Linked program '{}'", descriptor.label);
        Ok(program)
    }
}

/// Parses, validates and links both stages of a descriptor.
pub(crate) fn link_modules(descriptor: &ProgramDescriptor<'_>) -> Result<Program, LinkError> {
    let vertex = compile_stage(descriptor.label, StageKind::Vertex, descriptor.vertex_source)?;
    let fragment = compile_stage(
        descriptor.label,
        StageKind::Fragment,
        descriptor.fragment_source,
    )?;

    let vertex_entry = entry_point(
        descriptor.label,
        &vertex,
        StageKind::Vertex,
        descriptor.vertex_entry,
    )?;
    let fragment_entry = entry_point(
        descriptor.label,
        &fragment,
        StageKind::Fragment,
        descriptor.fragment_entry,
    )?;

    let vertex_outputs = stage_outputs(&vertex, vertex_entry);
    for input in stage_inputs(&fragment, fragment_entry) {
        let matched = vertex_outputs
            .iter()
            .any(|output| output.location == input.location && output.ty == input.ty);
        if !matched {
            return Err(LinkError::InterfaceMismatch {
                label: descriptor.label.to_string(),
                location: input.location,
            });
        }
    }

    let outputs = bind_output_locations(
        descriptor.label,
        &stage_outputs(&fragment, fragment_entry),
        descriptor.outputs,
    )?;
    let attributes = init_attributes(&vertex, vertex_entry);
    let uniforms = init_uniforms(&[&vertex, &fragment]);
    debug!(
        "Program '{}': {} attributes, {} uniforms",
        descriptor.label,
        attributes.len(),
        uniforms.len()
    );

    Ok(Program {
        label: descriptor.label.to_string(),
        outputs,
        attributes,
        uniforms,
        pipeline: None,
    })
}

fn compile_stage(label: &str, stage: StageKind, source: &str) -> Result<naga::Module, LinkError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| LinkError::Parse {
        label: label.to_string(),
        stage,
        message: err.emit_to_string(source),
    })?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::default());
    validator
        .validate(&module)
        .map_err(|err| LinkError::Validation {
            label: label.to_string(),
            stage,
            message: err.emit_to_string(source),
        })?;
    Ok(module)
}

fn entry_point<'m>(
    label: &str,
    module: &'m naga::Module,
    stage: StageKind,
    name: &str,
) -> Result<&'m naga::EntryPoint, LinkError> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.name == name && ep.stage == stage.naga_stage())
        .ok_or_else(|| LinkError::MissingEntryPoint {
            label: label.to_string(),
            stage,
            entry: name.to_string(),
        })
}

/// A user-defined (location-bound) stage input or output.
struct InterfaceVar {
    location: u32,
    name: Option<String>,
    ty: naga::TypeInner,
}

fn stage_inputs(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<InterfaceVar> {
    let mut vars = Vec::new();
    for arg in &entry.function.arguments {
        collect_locations(module, arg.ty, arg.binding.as_ref(), arg.name.as_deref(), &mut vars);
    }
    vars
}

fn stage_outputs(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<InterfaceVar> {
    let mut vars = Vec::new();
    if let Some(result) = &entry.function.result {
        collect_locations(module, result.ty, result.binding.as_ref(), None, &mut vars);
    }
    vars
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    name: Option<&str>,
    out: &mut Vec<InterfaceVar>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => out.push(InterfaceVar {
            location: *location,
            name: name.map(str::to_owned),
            ty: module.types[ty].inner.clone(),
        }),
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(
                        module,
                        member.ty,
                        member.binding.as_ref(),
                        member.name.as_deref(),
                        out,
                    );
                }
            }
        }
    }
}

/// Checks every requested output against the fragment stage's outputs.
fn bind_output_locations(
    label: &str,
    fragment_outputs: &[InterfaceVar],
    requested: &[OutputBinding],
) -> Result<Vec<OutputBinding>, LinkError> {
    let mut bound = Vec::with_capacity(requested.len());
    for binding in requested {
        let found = fragment_outputs
            .iter()
            .find(|output| output.name.as_deref() == Some(binding.name.as_str()))
            .map(|output| output.location);
        if found != Some(binding.location) {
            return Err(LinkError::OutputBinding {
                label: label.to_string(),
                name: binding.name.clone(),
                expected: binding.location,
                found,
            });
        }
        bound.push(binding.clone());
    }
    bound.sort_by_key(|binding| binding.location);
    Ok(bound)
}

fn init_attributes(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<ProgramAttribute> {
    let mut attributes: Vec<ProgramAttribute> = stage_inputs(module, entry)
        .into_iter()
        .map(|var| ProgramAttribute {
            name: var.name.unwrap_or_default(),
            location: var.location,
        })
        .collect();
    attributes.sort_by_key(|attribute| attribute.location);
    attributes
}

fn init_uniforms(modules: &[&naga::Module]) -> Vec<ProgramUniform> {
    let mut uniforms: Vec<ProgramUniform> = Vec::new();
    for module in modules {
        for (_, global) in module.global_variables.iter() {
            let Some(binding) = &global.binding else {
                continue;
            };
            let duplicate = uniforms
                .iter()
                .any(|u| u.group == binding.group && u.binding == binding.binding);
            if !duplicate {
                uniforms.push(ProgramUniform {
                    name: global.name.clone().unwrap_or_default(),
                    group: binding.group,
                    binding: binding.binding,
                });
            }
        }
    }
    uniforms.sort_by_key(|u| (u.group, u.binding));
    uniforms
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"
        struct VertexInput {
            @location(0) clip: vec2<f32>,
            @location(1) position: vec3<f32>,
        };

        struct VertexOutput {
            @builtin(position) clip_position: vec4<f32>,
            @location(0) position: vec3<f32>,
        };

        @group(0) @binding(0)
        var<uniform> scale: vec4<f32>;

        @vertex
        fn vs_main(in: VertexInput) -> VertexOutput {
            var out: VertexOutput;
            out.clip_position = vec4<f32>(in.clip, 0.0, 1.0) * scale;
            out.position = in.position;
            return out;
        }
    "#;

    const FRAGMENT: &str = r#"
        struct FragmentOutput {
            @location(0) first: f32,
            @location(1) second: f32,
        };

        @fragment
        fn fs_main(@location(0) position: vec3<f32>) -> FragmentOutput {
            return FragmentOutput(position.x, position.y);
        }
    "#;

    fn descriptor<'a>(fragment: &'a str, outputs: &'a [OutputBinding]) -> ProgramDescriptor<'a> {
        ProgramDescriptor {
            label: "test",
            vertex_source: VERTEX,
            vertex_entry: "vs_main",
            fragment_source: fragment,
            fragment_entry: "fs_main",
            outputs,
            vertex_buffers: &[],
        }
    }

    fn outputs() -> Vec<OutputBinding> {
        vec![OutputBinding::new(1, "second"), OutputBinding::new(0, "first")]
    }

    #[test]
    fn test_link_valid_program() {
        let outputs = outputs();
        let program = NagaLinker::new().link(&descriptor(FRAGMENT, &outputs)).unwrap();

        assert_eq!(program.label(), "test");
        assert!(program.pipeline().is_none());
        let names: Vec<&str> = program.outputs().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_attributes_and_uniforms_are_introspected() {
        let outputs = outputs();
        let program = NagaLinker::new().link(&descriptor(FRAGMENT, &outputs)).unwrap();
        assert_eq!(
            program.attributes(),
            &[
                ProgramAttribute {
                    name: "clip".to_string(),
                    location: 0
                },
                ProgramAttribute {
                    name: "position".to_string(),
                    location: 1
                },
            ]
        );
        assert_eq!(
            program.uniforms(),
            &[ProgramUniform {
                name: "scale".to_string(),
                group: 0,
                binding: 0
            }]
        );
    }

    #[test]
    fn test_parse_error_reports_stage() {
        let err = NagaLinker::new()
            .link(&descriptor("fn broken( {", &[]))
            .unwrap_err();
        assert!(matches!(
            err,
            LinkError::Parse {
                stage: StageKind::Fragment,
                ..
            }
        ));
    }

    #[test]
    fn test_validation_error_reports_stage() {
        let fragment = r#"
            @fragment
            fn fs_main() -> @location(0) f32 {
                let x: f32 = 1u;
                return x;
            }
        "#;
        let err = NagaLinker::new().link(&descriptor(fragment, &[])).unwrap_err();
        assert!(matches!(
            err,
            LinkError::Parse { .. } | LinkError::Validation { .. }
        ));
    }

    #[test]
    fn test_missing_entry_point() {
        let outputs = outputs();
        let mut desc = descriptor(FRAGMENT, &outputs);
        desc.fragment_entry = "main";
        let err = NagaLinker::new().link(&desc).unwrap_err();
        assert_eq!(
            err,
            LinkError::MissingEntryPoint {
                label: "test".to_string(),
                stage: StageKind::Fragment,
                entry: "main".to_string(),
            }
        );
    }

    #[test]
    fn test_fragment_input_without_vertex_output_fails() {
        let fragment = r#"
            @fragment
            fn fs_main(@location(3) value: f32) -> @location(0) f32 {
                return value;
            }
        "#;
        let err = NagaLinker::new().link(&descriptor(fragment, &[])).unwrap_err();
        assert_eq!(
            err,
            LinkError::InterfaceMismatch {
                label: "test".to_string(),
                location: 3
            }
        );
    }

    #[test]
    fn test_output_bound_to_wrong_location_fails() {
        let outputs = [OutputBinding::new(2, "first")];
        let err = NagaLinker::new()
            .link(&descriptor(FRAGMENT, &outputs))
            .unwrap_err();
        assert_eq!(
            err,
            LinkError::OutputBinding {
                label: "test".to_string(),
                name: "first".to_string(),
                expected: 2,
                found: Some(0),
            }
        );
    }

    #[test]
    fn test_unknown_output_fails() {
        let outputs = [OutputBinding::new(0, "missing")];
        let err = NagaLinker::new()
            .link(&descriptor(FRAGMENT, &outputs))
            .unwrap_err();
        assert!(matches!(err, LinkError::OutputBinding { found: None, .. }));
    }
}
