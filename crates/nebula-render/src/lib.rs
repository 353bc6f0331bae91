//! Shader program linking for planet generation.
//!
//! Provides the [`ProgramLinker`] seam with a GPU-free [`NagaLinker`] and a
//! device-backed [`WgpuLinker`], plus [`HeadlessGpu`] for offscreen device setup.

pub mod gpu;
pub mod pipeline;
pub mod shader;

pub use gpu::{GpuInitError, HeadlessGpu};
pub use pipeline::WgpuLinker;
pub use shader::{
    LinkError, NagaLinker, OutputBinding, Program, ProgramAttribute, ProgramDescriptor,
    ProgramLinker, ProgramUniform, StageKind,
};
