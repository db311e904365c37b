//! Loading classified sources and persisting edit journals as JSON.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::{Journal, SourceDocument};
use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::traits::FileSystem;

pub struct DocumentStore {
    fs: Arc<dyn FileSystem>,
}

impl DocumentStore {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Read a classified source document.
    #[instrument(level = "debug", skip(self))]
    pub fn load_source(&self, path: &Path) -> InfraResult<SourceDocument> {
        let content = self
            .fs
            .read_to_string(path)
            .map_err(|e| InfraError::io(format!("read source {}", path.display()), e))?;
        let source: SourceDocument =
            serde_json::from_str(&content).map_err(|e| InfraError::parse(path, e))?;
        debug!(headings = source.headings.len(), "source loaded");
        Ok(source)
    }

    /// Read a journal; a missing file is an empty journal.
    #[instrument(level = "debug", skip(self))]
    pub fn load_journal(&self, path: &Path) -> InfraResult<Journal> {
        if !self.fs.exists(path) {
            debug!("no journal yet");
            return Ok(Journal::new());
        }
        let content = self
            .fs
            .read_to_string(path)
            .map_err(|e| InfraError::io(format!("read journal {}", path.display()), e))?;
        serde_json::from_str(&content).map_err(|e| InfraError::parse(path, e))
    }

    #[instrument(level = "debug", skip(self, journal), fields(entries = journal.len()))]
    pub fn save_journal(&self, path: &Path, journal: &Journal) -> InfraResult<()> {
        let content =
            serde_json::to_string_pretty(journal).map_err(|e| InfraError::parse(path, e))?;
        self.fs
            .ensure_parent(path)
            .map_err(|e| InfraError::io(format!("create directory for {}", path.display()), e))?;
        self.fs
            .write(path, &content)
            .map_err(|e| InfraError::io(format!("write journal {}", path.display()), e))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;
    use crate::domain::{Command, NodeId};

    #[derive(Default)]
    struct MemoryFileSystem {
        files: Mutex<BTreeMap<PathBuf, String>>,
    }

    impl FileSystem for MemoryFileSystem {
        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing"))
        }

        fn write(&self, path: &Path, content: &str) -> io::Result<()> {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), content.to_string());
            Ok(())
        }

        fn exists(&self, path: &Path) -> bool {
            self.files.lock().unwrap().contains_key(path)
        }

        fn ensure_parent(&self, _path: &Path) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn given_saved_journal_when_loading_then_cursor_and_entries_survive() {
        let store = DocumentStore::new(Arc::new(MemoryFileSystem::default()));
        let mut journal = Journal::new();
        journal.record(Command::paste_after(NodeId(2), NodeId(1)));
        journal.record(Command::paste_into(NodeId(3), NodeId(1), 0));
        journal.undo();
        let path = Path::new("edits.json");

        store.save_journal(path, &journal).unwrap();
        let loaded = store.load_journal(path).unwrap();

        assert_eq!(loaded, journal);
        assert!(loaded.can_redo());
    }

    #[test]
    fn given_missing_journal_when_loading_then_empty() {
        let store = DocumentStore::new(Arc::new(MemoryFileSystem::default()));

        let journal = store.load_journal(Path::new("nothing.json")).unwrap();

        assert!(journal.is_empty());
    }

    #[test]
    fn given_malformed_source_when_loading_then_parse_error() {
        let fs = MemoryFileSystem::default();
        fs.write(Path::new("doc.json"), "{ headings: }").unwrap();
        let store = DocumentStore::new(Arc::new(fs));

        let result = store.load_source(Path::new("doc.json"));

        assert!(matches!(result, Err(InfraError::Parse { .. })));
    }
}
