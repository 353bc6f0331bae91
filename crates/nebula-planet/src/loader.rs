//! Planet loading: document text to a linked generation program.
//!
//! [`PlanetLoader::load_planet`] reads a planet document, parses its three
//! channels, generates the fragment stage and links it against the fixed
//! vertex stage. Nothing is linked unless every channel parsed cleanly.
//!
//! The loader also owns the default program (three empty channels), built
//! on first use and cached for the loader's lifetime. A failed default link
//! is cached too and never retried.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use nebula_render::{LinkError, NagaLinker, Program, ProgramLinker};
use nebula_terrain::{
    DescriptorError, DocumentError, DocumentFormat, PlanetDescriptor, generate_descriptor,
    parse_planet,
};
use tracing::{debug, error, info};

use crate::gen_data::{PlanetGenData, with_gen_descriptor};
use crate::reader::{FileReader, FsReader};

/// Label of the cached default program.
pub const DEFAULT_PROGRAM_LABEL: &str = "default-planet";

/// Why a planet document could not be turned into a tree of channels.
#[derive(Debug, thiserror::Error)]
pub enum DocumentFormatError {
    #[error(transparent)]
    Parse(#[from] DocumentError),

    #[error(transparent)]
    Shape(DescriptorError),
}

/// Errors returned by [`PlanetLoader`].
#[derive(Debug, thiserror::Error)]
pub enum PlanetLoadError {
    /// The document could not be read.
    #[error("failed to read planet '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document did not parse, or its root is missing or not a mapping.
    #[error("planet '{}' is not a valid planet document", path.display())]
    DocumentFormat {
        path: PathBuf,
        #[source]
        source: DocumentFormatError,
    },

    /// A channel field could not be coerced. Carries the first failing
    /// channel's error; every failure is logged.
    #[error("planet '{}' has an invalid field", path.display())]
    FieldCoercion {
        path: PathBuf,
        #[source]
        source: DescriptorError,
    },

    /// The generated program did not link.
    #[error("failed to link planet program '{label}'")]
    Link {
        label: String,
        #[source]
        source: LinkError,
    },
}

/// Loads planet documents and links their generation programs.
pub struct PlanetLoader<R = FsReader, L = NagaLinker> {
    reader: R,
    linker: L,
    dump_source_on_failure: bool,
    default_data: OnceLock<Result<Arc<PlanetGenData>, LinkError>>,
}

impl PlanetLoader<FsReader, NagaLinker> {
    /// Filesystem reader and GPU-free linker.
    pub fn offline() -> Self {
        Self::new(FsReader::new(), NagaLinker::new())
    }
}

impl<R: FileReader, L: ProgramLinker> PlanetLoader<R, L> {
    pub fn new(reader: R, linker: L) -> Self {
        Self {
            reader,
            linker,
            dump_source_on_failure: true,
            default_data: OnceLock::new(),
        }
    }

    /// Whether link failures log the full generated source. On by default.
    pub fn with_dump_source_on_failure(mut self, dump: bool) -> Self {
        self.dump_source_on_failure = dump;
        self
    }

    pub fn linker(&self) -> &L {
        &self.linker
    }

    /// Reads and parses a planet document and returns its generated
    /// fragment source without linking it.
    pub fn generate_source(&self, path: &Path) -> Result<String, PlanetLoadError> {
        let text = self
            .reader
            .read_to_string(path)
            .map_err(|source| PlanetLoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let format_error = |source: DocumentFormatError| PlanetLoadError::DocumentFormat {
            path: path.to_path_buf(),
            source,
        };
        let root = DocumentFormat::from_path(path)
            .parse(&text)
            .map_err(|err| format_error(err.into()))?;
        let parsed = parse_planet(&root).map_err(|err| {
            error!("Planet '{}': {err}", path.display());
            format_error(DocumentFormatError::Shape(err))
        })?;

        let descriptor: PlanetDescriptor =
            parsed
                .into_descriptor()
                .map_err(|source| PlanetLoadError::FieldCoercion {
                    path: path.to_path_buf(),
                    source,
                })?;
        debug!(
            "Planet '{}': {} height, {} temperature, {} humidity layers",
            path.display(),
            descriptor.height.layers.len(),
            descriptor.temperature.layers.len(),
            descriptor.humidity.layers.len()
        );
        Ok(generate_descriptor(&descriptor))
    }

    /// Loads a planet document into a freshly linked program.
    pub fn load_planet(&self, path: &Path) -> Result<PlanetGenData, PlanetLoadError> {
        let source = self.generate_source(path)?;
        let label = path.display().to_string();
        let program = self
            .link_program(&label, &source)
            .map_err(|source| PlanetLoadError::Link { label, source })?;
        info!("Loaded planet '{}'", path.display());
        Ok(PlanetGenData::new(program))
    }

    /// Shared program for planets with no descriptor.
    ///
    /// Linked at most once per loader, even under concurrent callers; every
    /// call returns the same handle or the same cached failure.
    pub fn default_gen_data(&self) -> Result<Arc<PlanetGenData>, PlanetLoadError> {
        self.default_data
            .get_or_init(|| {
                info!("Building default planet program");
                let source = generate_descriptor(&PlanetDescriptor::default());
                self.link_program(DEFAULT_PROGRAM_LABEL, &source)
                    .map(|program| Arc::new(PlanetGenData::new(program)))
                    .inspect_err(|err| {
                        error!("Default planet program is unusable and will not be rebuilt: {err}")
                    })
            })
            .clone()
            .map_err(|source| PlanetLoadError::Link {
                label: DEFAULT_PROGRAM_LABEL.to_string(),
                source,
            })
    }

    fn link_program(&self, label: &str, source: &str) -> Result<Program, LinkError> {
        with_gen_descriptor(label, source, |descriptor| self.linker.link(descriptor)).inspect_err(
            |err| {
                if self.dump_source_on_failure {
                    error!("Failed to link planet program: {err}\n--- generated source ---\n{source}");
                } else {
                    error!("Failed to link planet program: {err}");
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use nebula_render::{ProgramDescriptor, StageKind};
    use nebula_terrain::Channel;

    #[derive(Default)]
    struct MemoryReader {
        files: HashMap<PathBuf, String>,
    }

    impl MemoryReader {
        fn with(path: &str, text: &str) -> Self {
            let mut reader = Self::default();
            reader.files.insert(PathBuf::from(path), text.to_string());
            reader
        }
    }

    impl FileReader for MemoryReader {
        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such planet"))
        }
    }

    /// Counts link calls and remembers the last fragment source.
    #[derive(Default)]
    struct RecordingLinker {
        calls: AtomicUsize,
        last_source: Mutex<Option<String>>,
    }

    impl ProgramLinker for RecordingLinker {
        fn link(&self, descriptor: &ProgramDescriptor<'_>) -> Result<Program, LinkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_source.lock().unwrap() = Some(descriptor.fragment_source.to_string());
            NagaLinker::new().link(descriptor)
        }
    }

    impl RecordingLinker {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    struct RejectingLinker {
        calls: AtomicUsize,
    }

    impl ProgramLinker for RejectingLinker {
        fn link(&self, descriptor: &ProgramDescriptor<'_>) -> Result<Program, LinkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LinkError::Validation {
                label: descriptor.label.to_string(),
                stage: StageKind::Fragment,
                message: "rejected".to_string(),
            })
        }
    }

    fn loader(reader: MemoryReader) -> PlanetLoader<MemoryReader, RecordingLinker> {
        PlanetLoader::new(reader, RecordingLinker::default())
    }

    #[test]
    fn test_load_planet_links_generated_program() {
        let loader = loader(MemoryReader::with(
            "earth.ron",
            "(baseHeight: (base: 0.5, ridgedNoise: (octaves: 4, persistence: 0.5)), \
             temperature: (ridgedNoise: (low: 0.0, high: 30.0)))",
        ));
        let data = loader.load_planet(Path::new("earth.ron")).unwrap();

        assert_eq!(loader.linker().calls(), 1);
        assert_eq!(data.program.label(), "earth.ron");
        assert_eq!(data.program.outputs().len(), 3);
        assert!(data.surface_color_map.is_none());
        assert!(data.biome_maps.is_empty());

        let source = loader.linker().last_source.lock().unwrap().clone().unwrap();
        assert!(source.contains("var height: f32 = 0.5;"));
        assert!(source.contains("octave < 4u"));
    }

    #[test]
    fn test_load_planet_json_document() {
        let loader = loader(MemoryReader::with(
            "mars.json",
            r#"{"humidity": {"base": -0.25}, "extra": true}"#,
        ));
        loader.load_planet(Path::new("mars.json")).unwrap();
        let source = loader.linker().last_source.lock().unwrap().clone().unwrap();
        assert!(source.contains("var humidity: f32 = -0.25;"));
    }

    #[test]
    fn test_each_load_returns_new_program() {
        let loader = loader(MemoryReader::with("a.ron", "(baseHeight: (base: 1.0))"));
        let first = loader.load_planet(Path::new("a.ron")).unwrap();
        let second = loader.load_planet(Path::new("a.ron")).unwrap();
        assert!(!Arc::ptr_eq(&first.program, &second.program));
        assert_eq!(loader.linker().calls(), 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let loader = loader(MemoryReader::default());
        let err = loader.load_planet(Path::new("nowhere.ron")).unwrap_err();
        assert!(matches!(err, PlanetLoadError::Io { .. }));
        assert_eq!(loader.linker().calls(), 0);
    }

    #[test]
    fn test_scalar_root_is_document_format_without_link() {
        let loader = loader(MemoryReader::with("scalar.ron", "42"));
        let err = loader.load_planet(Path::new("scalar.ron")).unwrap_err();
        assert!(matches!(
            err,
            PlanetLoadError::DocumentFormat {
                source: DocumentFormatError::Shape(DescriptorError::RootNotMapping { .. }),
                ..
            }
        ));
        assert_eq!(loader.linker().calls(), 0);
    }

    #[test]
    fn test_empty_document_is_document_format() {
        let loader = loader(MemoryReader::with("empty.ron", "  \n"));
        let err = loader.load_planet(Path::new("empty.ron")).unwrap_err();
        assert!(matches!(err, PlanetLoadError::DocumentFormat { .. }));
        assert_eq!(loader.linker().calls(), 0);
    }

    #[test]
    fn test_unparsable_document_is_document_format() {
        let loader = loader(MemoryReader::with("broken.json", "{\"baseHeight\": "));
        let err = loader.load_planet(Path::new("broken.json")).unwrap_err();
        assert!(matches!(
            err,
            PlanetLoadError::DocumentFormat {
                source: DocumentFormatError::Parse(DocumentError::Json(_)),
                ..
            }
        ));
    }

    #[test]
    fn test_coercion_failure_blocks_link_but_other_channels_parse() {
        let text = "(baseHeight: (base: 5), \
                    temperature: (ridgedNoise: (octaves: \"oops\")), \
                    humidity: (base: 2))";
        let loader = loader(MemoryReader::with("bad.ron", text));
        let err = loader.load_planet(Path::new("bad.ron")).unwrap_err();

        let PlanetLoadError::FieldCoercion { source, .. } = err else {
            panic!("expected FieldCoercion, got {err:?}");
        };
        assert!(matches!(
            source,
            DescriptorError::FieldCoercion {
                channel: Channel::Temperature,
                ..
            }
        ));
        assert_eq!(loader.linker().calls(), 0);

        let root = DocumentFormat::Ron.parse(text).unwrap();
        let parsed = parse_planet(&root).unwrap();
        assert_eq!(parsed.height.as_ref().unwrap().base_offset, 5.0);
        assert_eq!(parsed.humidity.as_ref().unwrap().base_offset, 2.0);
        assert!(parsed.temperature.is_err());
    }

    #[test]
    fn test_link_failure_is_reported() {
        let loader = PlanetLoader::new(
            MemoryReader::with("p.ron", "(baseHeight: (base: 1.0))"),
            RejectingLinker {
                calls: AtomicUsize::new(0),
            },
        )
        .with_dump_source_on_failure(false);
        let err = loader.load_planet(Path::new("p.ron")).unwrap_err();
        assert!(matches!(err, PlanetLoadError::Link { ref label, .. } if label == "p.ron"));
        assert_eq!(loader.linker().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_generate_source_does_not_link() {
        let loader = loader(MemoryReader::with("g.ron", "(temperature: (base: 3.0))"));
        let source = loader.generate_source(Path::new("g.ron")).unwrap();
        assert!(source.contains("var temperature: f32 = 3.0;"));
        assert!(source.contains("fn fs_main("));
        assert_eq!(loader.linker().calls(), 0);
    }

    #[test]
    fn test_default_gen_data_is_cached() {
        let loader = loader(MemoryReader::default());
        let first = loader.default_gen_data().unwrap();
        let second = loader.default_gen_data().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.linker().calls(), 1);
        assert_eq!(first.program.label(), DEFAULT_PROGRAM_LABEL);
    }

    #[test]
    fn test_default_gen_data_outputs_base_constants() {
        let loader = loader(MemoryReader::default());
        loader.default_gen_data().unwrap();
        let source = loader.linker().last_source.lock().unwrap().clone().unwrap();
        assert!(source.contains("var height: f32 = 0.0;"));
        assert!(!source.contains("for ("));
    }

    #[test]
    fn test_default_gen_data_links_once_under_concurrency() {
        let loader = loader(MemoryReader::default());
        let handles: Vec<Arc<PlanetGenData>> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| loader.default_gen_data().unwrap()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(loader.linker().calls(), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    }

    #[test]
    fn test_default_link_failure_is_cached_and_not_retried() {
        let loader = PlanetLoader::new(
            MemoryReader::default(),
            RejectingLinker {
                calls: AtomicUsize::new(0),
            },
        );
        assert!(loader.default_gen_data().is_err());
        let err = loader.default_gen_data().unwrap_err();
        assert!(matches!(err, PlanetLoadError::Link { ref label, .. } if label == DEFAULT_PROGRAM_LABEL));
        assert_eq!(loader.linker().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_from_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("moon.ron"),
            "(baseHeight: (ridgedNoise: [(octaves: 2), (frequency: 4.0, low: 0.0, high: 1.0)]))",
        )
        .unwrap();

        let loader = PlanetLoader::new(FsReader::with_root(dir.path()), NagaLinker::new());
        let data = loader.load_planet(Path::new("moon.ron")).unwrap();
        assert!(data.program.pipeline().is_none());
        let attributes: Vec<&str> = data
            .program
            .attributes()
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(attributes, vec!["clip", "position"]);
    }
}
