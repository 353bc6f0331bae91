//! WGSL code generation for planet generation programs.

pub mod ast;
mod generator;

pub use generator::{
    FRAGMENT_ENTRY_POINT, NOISE_LIBRARY, NOISE_PRIMITIVE, build_entry_point, generate,
    generate_descriptor, layer_statements,
};
