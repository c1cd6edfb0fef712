use std::io;
use std::path::{Path, PathBuf};
use shared::protocol::RECOGNIZED_EXTENSION;

/// Narrow read-only view of the watched directory.
///
/// Implementations are expected to race with external writers; callers
/// treat every answer as a point-in-time observation.
pub trait DirectorySource {
    /// Names (not paths) of the regular files currently in the directory
    fn list(&self) -> io::Result<Vec<String>>;

    /// Raw contents of one file from the listing
    fn read(&self, file_name: &str) -> io::Result<Vec<u8>>;
}

/// What a scan saw for one descriptor file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    Present(Vec<u8>),
    /// Listed but gone (or unreadable) by the time it was read
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// File stem, used as the service name
    pub service: String,
    pub file_name: String,
    pub state: FileState,
}

/// Take a snapshot of every descriptor file in `dir`, sorted by service name.
///
/// Files without the recognized extension never make it into the result.
/// A failure to read an individual file marks it absent; a failure to list
/// the directory is returned to the caller.
pub fn scan(dir: &dyn DirectorySource) -> io::Result<Vec<ScannedFile>> {
    let mut candidates: Vec<(String, String)> = dir
        .list()?
        .into_iter()
        .filter_map(|file_name| {
            let service = service_name(&file_name)?.to_string();
            Some((service, file_name))
        })
        .collect();
    candidates.sort();

    let files = candidates
        .into_iter()
        .map(|(service, file_name)| {
            let state = match dir.read(&file_name) {
                Ok(contents) => FileState::Present(contents),
                Err(e) => {
                    tracing::debug!("Treating {} as absent: {}", file_name, e);
                    FileState::Absent
                }
            };
            ScannedFile {
                service,
                file_name,
                state,
            }
        })
        .collect();

    Ok(files)
}

/// Service name for a descriptor file, or `None` if the file is not one
fn service_name(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    (ext == RECOGNIZED_EXTENSION && !stem.is_empty()).then_some(stem)
}

/// The real filesystem
#[derive(Debug, Clone)]
pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DirectorySource for FsDirectory {
    fn list(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            // Follows symlinks so linked descriptor files are picked up
            let is_file = std::fs::metadata(entry.path())
                .map(|meta| meta.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            // Non UTF-8 names cannot carry a service name
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn read(&self, file_name: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.root.join(file_name))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::testing::MemoryDirectory;

    #[test]
    fn test_service_name() {
        assert_eq!(service_name("service1.json"), Some("service1"));
        assert_eq!(service_name("a.b.json"), Some("a.b"));
        assert_eq!(service_name("service1.abcd"), None);
        assert_eq!(service_name("service1.JSON"), None);
        assert_eq!(service_name("service1.json.tmp"), None);
        assert_eq!(service_name(".json"), None);
        assert_eq!(service_name("json"), None);
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = MemoryDirectory::new();
        dir.write("b.json", "[]");
        dir.write("a.json", "[1]");
        dir.write("a.abcd", "[]");
        dir.write("README", "hello");

        let files = scan(&dir).unwrap();
        let services: Vec<_> = files.iter().map(|f| f.service.as_str()).collect();
        assert_eq!(services, vec!["a", "b"]);
        assert_eq!(files[0].file_name, "a.json");
        assert_eq!(files[0].state, FileState::Present(b"[1]".to_vec()));
    }

    #[test]
    fn test_scan_read_failure_is_absent() {
        let dir = MemoryDirectory::new();
        dir.write("a.json", "[]");
        dir.vanish_on_read("a.json");

        let files = scan(&dir).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].state, FileState::Absent);
    }

    #[test]
    fn test_scan_list_failure_propagates() {
        let dir = MemoryDirectory::new();
        dir.set_unlistable(true);
        assert!(scan(&dir).is_err());
    }

    #[test]
    fn test_fs_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("service1.json"), "[]").unwrap();
        std::fs::write(tmp.path().join("service1.abcd"), "[]").unwrap();
        std::fs::create_dir(tmp.path().join("nested.json")).unwrap();

        let dir = FsDirectory::new(tmp.path());
        let files = scan(&dir).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].service, "service1");
        assert_eq!(files[0].state, FileState::Present(b"[]".to_vec()));
    }

    #[test]
    fn test_fs_directory_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = FsDirectory::new(tmp.path().join("does-not-exist"));
        assert!(scan(&dir).is_err());
    }
}
