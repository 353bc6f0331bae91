//! Planet loading: reads planet documents, compiles their terrain channels
//! into a generation program and hands back [`PlanetGenData`].

mod gen_data;
mod loader;
mod reader;

pub use gen_data::{
    GEN_VERTEX_ENTRY_POINT, GEN_VERTEX_SOURCE, GenVertex, PlanetGenData, gen_outputs,
};
pub use loader::{DEFAULT_PROGRAM_LABEL, DocumentFormatError, PlanetLoadError, PlanetLoader};
pub use reader::{FileReader, FsReader};
