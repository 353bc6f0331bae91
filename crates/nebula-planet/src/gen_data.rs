//! Planet generation program handle and the fixed vertex stage it links against.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use nebula_render::{OutputBinding, Program, ProgramDescriptor};
use nebula_terrain::Channel;
use nebula_terrain::codegen::FRAGMENT_ENTRY_POINT;

/// WGSL source of the fixed generation vertex stage.
pub const GEN_VERTEX_SOURCE: &str = include_str!("gen_vertex.wgsl");

/// Entry point of [`GEN_VERTEX_SOURCE`].
pub const GEN_VERTEX_ENTRY_POINT: &str = "vs_main";

/// Vertex layout for generation passes: clip-space corner (vec2) and sphere position (vec3).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GenVertex {
    pub clip: [f32; 2],
    pub position: [f32; 3],
}

impl GenVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x3];

    /// Vertex buffer layout for [`GEN_VERTEX_SOURCE`].
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GenVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Output bindings every generation program must expose, one per channel.
pub fn gen_outputs() -> Vec<OutputBinding> {
    Channel::ALL
        .into_iter()
        .map(|channel| OutputBinding::new(channel.output_location(), channel.symbol()))
        .collect()
}

/// Runs `f` with a descriptor pairing `fragment_source` with the fixed vertex stage.
pub(crate) fn with_gen_descriptor<T>(
    label: &str,
    fragment_source: &str,
    f: impl FnOnce(&ProgramDescriptor<'_>) -> T,
) -> T {
    let outputs = gen_outputs();
    let buffers = [GenVertex::layout()];
    let descriptor = ProgramDescriptor {
        label,
        vertex_source: GEN_VERTEX_SOURCE,
        vertex_entry: GEN_VERTEX_ENTRY_POINT,
        fragment_source,
        fragment_entry: FRAGMENT_ENTRY_POINT,
        outputs: &outputs,
        vertex_buffers: &buffers,
    };
    f(&descriptor)
}

/// Result of loading a planet: the linked generation program plus texture maps.
///
/// The maps are owned by the surface renderer and are left empty by the loader.
#[derive(Debug, Clone)]
pub struct PlanetGenData {
    pub program: Arc<Program>,
    pub surface_color_map: Option<wgpu::Texture>,
    pub water_color_map: Option<wgpu::Texture>,
    pub biome_maps: Vec<wgpu::Texture>,
}

impl PlanetGenData {
    pub fn new(program: Program) -> Self {
        Self {
            program: Arc::new(program),
            surface_color_map: None,
            water_color_map: None,
            biome_maps: Vec::new(),
        }
    }
}
