//! Planet terrain descriptors and their compilation to WGSL: the descriptor
//! model, a format-independent document view, the descriptor parser and the
//! source generator.

pub mod codegen;
mod descriptor;
pub mod document;
mod noise_layer;

pub use codegen::{generate, generate_descriptor};
pub use descriptor::{BASE_KEY, DescriptorError, ParsedPlanet, parse_channel, parse_planet};
pub use document::{DocValue, DocumentError, DocumentFormat, DocumentNode, NodeKind};
pub use noise_layer::{
    Channel, ChannelSpec, NoiseFunctionKind, NoiseFunctionParams, PlanetDescriptor,
};
