use crate::input::Input;
use rand_core::RngCore;
use std::any::Any;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can arise during corpus operations.
#[derive(Error, Debug)]
pub enum CorpusError {
    /// The requested input ID was not found within the corpus.
    #[error("Input ID {0} not found in corpus")]
    InputNotFound(usize),

    /// An I/O error occurred while loading seeds.
    #[error("Corpus I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CorpusError {
    fn from(err: std::io::Error) -> Self {
        CorpusError::Io(err.to_string())
    }
}

/// Metadata stored alongside each corpus entry.
pub type EntryMetadata = Box<dyn Any + Send + Sync>;

/// A collection of inputs the fuzzer mutates from.
///
/// Entries are identified by the index they were added at and are never
/// removed, so an ID stays valid for the lifetime of the corpus.
pub trait Corpus<I: Input>: Send + Sync {
    /// Adds `input` with `metadata` and returns its ID.
    fn add(&mut self, input: I, metadata: EntryMetadata) -> Result<usize, CorpusError>;

    /// The entry added under `id`, if any.
    fn get(&self, id: usize) -> Option<(&I, &EntryMetadata)>;

    /// Selects an entry uniformly at random. `None` when the corpus is empty.
    fn random_select(&self, rng: &mut dyn RngCore) -> Option<(usize, &I, &EntryMetadata)>;

    /// Number of entries in the corpus.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads seed inputs from files and from the files directly inside directories.
    ///
    /// Dotfiles are skipped. Returns the number of seeds loaded.
    fn load_initial_seeds(&mut self, seed_paths: &[PathBuf]) -> Result<usize, CorpusError>;
}

/// A corpus kept entirely in memory.
#[derive(Debug)]
pub struct InMemoryCorpus<I: Input> {
    entries: Vec<(I, EntryMetadata)>,
}

impl<I: Input> InMemoryCorpus<I> {
    /// Creates an empty corpus.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Inputs in the order they were added.
    pub fn inputs(&self) -> impl Iterator<Item = &I> {
        self.entries.iter().map(|(input, _)| input)
    }
}

impl<I: Input> Default for InMemoryCorpus<I> {
    fn default() -> Self {
        Self::new()
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

fn read_seed(path: &Path) -> Result<Vec<u8>, CorpusError> {
    fs::read(path)
        .map_err(|e| CorpusError::Io(format!("Failed to read seed file {:?}: {}", path, e)))
}

impl<I: Input + From<Vec<u8>>> Corpus<I> for InMemoryCorpus<I> {
    fn add(&mut self, input: I, metadata: EntryMetadata) -> Result<usize, CorpusError> {
        let id = self.entries.len();
        self.entries.push((input, metadata));
        Ok(id)
    }

    fn get(&self, id: usize) -> Option<(&I, &EntryMetadata)> {
        self.entries.get(id).map(|(input, meta)| (input, meta))
    }

    fn random_select(&self, rng: &mut dyn RngCore) -> Option<(usize, &I, &EntryMetadata)> {
        if self.entries.is_empty() {
            return None;
        }
        let index = (rng.next_u64() % self.entries.len() as u64) as usize;
        self.entries
            .get(index)
            .map(|(input, meta)| (index, input, meta))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn load_initial_seeds(&mut self, seed_paths: &[PathBuf]) -> Result<usize, CorpusError> {
        let mut loaded = 0;
        for path in seed_paths {
            if path.is_file() {
                let data = read_seed(path)?;
                self.add(I::from(data), Box::new(format!("Seed: {:?}", path)))?;
                loaded += 1;
            } else if path.is_dir() {
                let entries = fs::read_dir(path).map_err(|e| {
                    CorpusError::Io(format!("Failed to read seed directory {:?}: {}", path, e))
                })?;
                for entry in entries {
                    let file_path = entry?.path();
                    if file_path.is_file() && !is_hidden(&file_path) {
                        let data = read_seed(&file_path)?;
                        self.add(I::from(data), Box::new(format!("Seed: {:?}", file_path)))?;
                        loaded += 1;
                    }
                }
            } else {
                log::warn!("Seed path {:?} does not exist, skipping", path);
            }
        }
        Ok(loaded)
    }
}
