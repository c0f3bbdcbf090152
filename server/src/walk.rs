use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, Metadata},
    io,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;
use walkdir::WalkDir;

// -------------------------------------------
// Types
// -------------------------------------------

/// Metadata reported for one visited filesystem node.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EntryRecord {
    pub path: String,
    #[serde(rename = "isdirectory")]
    pub is_directory: bool,
    pub name: String,
    pub permissions: String,
    pub size: u64,
    #[serde(rename = "lastmodified")]
    pub last_modified: DateTime<Local>,
}

/// Failures that abort a tree walk.
#[derive(Debug, Error)]
pub enum WalkError {
    /// A directory could not be read while descending.
    #[error("{0}")]
    Traversal(#[from] walkdir::Error),

    /// The node was listed but is gone by the time it is stat'ed.
    #[error("File or folder does not exist")]
    Vanished(PathBuf),

    /// Stat failed for a reason other than the node being missing.
    #[error("{}: {source}", .path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WalkError {
    /// Metadata failures are not caused by the request itself.
    pub fn is_internal(&self) -> bool {
        matches!(self, WalkError::Metadata { .. })
    }

    /// The node the failure refers to, when known.
    pub fn path(&self) -> Option<&Path> {
        match self {
            WalkError::Traversal(e) => e.path(),
            WalkError::Vanished(path) | WalkError::Metadata { path, .. } => Some(path.as_path()),
        }
    }
}

// -------------------------------------------
// Traversal
// -------------------------------------------

/// Depth-first, pre-order walk over a resolved root.
///
/// Yields the root first, then each directory's children in file-name order.
/// The sequence ends after the first error; it cannot be restarted.
pub struct TreeWalk {
    inner: walkdir::IntoIter,
    failed: bool,
}

impl TreeWalk {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: WalkDir::new(root).sort_by_file_name().into_iter(),
            failed: false,
        }
    }
}

impl Iterator for TreeWalk {
    type Item = Result<EntryRecord, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let item = match self.inner.next()? {
            Ok(entry) => describe(entry.path(), entry.depth() == 0),
            Err(e) => Err(WalkError::from(e)),
        };

        self.failed = item.is_err();
        Some(item)
    }
}

/// Collects the whole tree under `root`, or the first error encountered.
pub fn list_tree(root: &Path) -> Result<Vec<EntryRecord>, WalkError> {
    TreeWalk::new(root).collect()
}

// -------------------------------------------
// Helpers
// -------------------------------------------

fn describe(path: &Path, is_root: bool) -> Result<EntryRecord, WalkError> {
    let meta = fs::metadata(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            WalkError::Vanished(path.to_path_buf())
        } else {
            WalkError::Metadata {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let modified = meta.modified().map_err(|source| WalkError::Metadata {
        path: path.to_path_buf(),
        source,
    })?;

    let name = if is_root {
        root_name(path)
    } else {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    Ok(EntryRecord {
        path: path.to_string_lossy().into_owned(),
        is_directory: meta.is_dir(),
        name,
        permissions: mode_string(&meta),
        size: meta.len(),
        last_modified: DateTime::<Local>::from(modified),
    })
}

/// Last non-empty segment of the root; the filesystem root keeps its own name.
fn root_name(root: &Path) -> String {
    root.components()
        .filter_map(|c| match c {
            Component::Normal(segment) => Some(segment),
            _ => None,
        })
        .last()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.to_string_lossy().into_owned())
}

/// Renders type and permission bits the way `ls -l` style listings do,
/// e.g. `drwxr-xr-x` or `-rw-r--r--`.
#[cfg(unix)]
fn mode_string(meta: &Metadata) -> String {
    use std::os::unix::fs::{FileTypeExt, PermissionsExt};

    let ft = meta.file_type();
    let mode = meta.permissions().mode();
    let mut out = String::with_capacity(12);

    if ft.is_dir() {
        out.push('d');
    }
    if ft.is_symlink() {
        out.push('L');
    }
    if ft.is_block_device() || ft.is_char_device() {
        out.push('D');
    }
    if ft.is_fifo() {
        out.push('p');
    }
    if ft.is_socket() {
        out.push('S');
    }
    if mode & 0o4000 != 0 {
        out.push('u');
    }
    if mode & 0o2000 != 0 {
        out.push('g');
    }
    if ft.is_char_device() {
        out.push('c');
    }
    if mode & 0o1000 != 0 {
        out.push('t');
    }
    if out.is_empty() {
        out.push('-');
    }

    for (i, c) in "rwxrwxrwx".chars().enumerate() {
        out.push(if mode & (1 << (8 - i)) != 0 { c } else { '-' });
    }

    out
}

#[cfg(not(unix))]
fn mode_string(meta: &Metadata) -> String {
    let readonly = meta.permissions().readonly();
    let bits = match (meta.is_dir(), readonly) {
        (true, false) => "drwxrwxrwx",
        (true, true) => "dr-xr-xr-x",
        (false, false) => "-rw-rw-rw-",
        (false, true) => "-r--r--r--",
    };
    bits.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        (dir, root)
    }

    fn names(records: &[EntryRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn lists_root_then_children_in_preorder() {
        let (_dir, root) = fixture();
        fs::write(root.join("a.txt"), b"0123456789").unwrap();
        fs::create_dir(root.join("b")).unwrap();

        let records = list_tree(&root).unwrap();
        let root_segment = root.file_name().unwrap().to_string_lossy();

        assert_eq!(names(&records), vec![&*root_segment, "a.txt", "b"]);
        assert!(records[0].is_directory);
        assert_eq!(records[0].path, root.to_string_lossy());

        assert!(!records[1].is_directory);
        assert_eq!(records[1].size, 10);
        assert_eq!(records[1].path, root.join("a.txt").to_string_lossy());

        assert!(records[2].is_directory);
    }

    #[test]
    fn descends_before_visiting_later_siblings() {
        let (_dir, root) = fixture();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::create_dir_all(root.join("b/inner")).unwrap();
        fs::write(root.join("b/c.txt"), b"c").unwrap();
        fs::write(root.join("d.txt"), b"d").unwrap();

        let records = list_tree(&root).unwrap();
        assert_eq!(names(&records)[1..], ["a.txt", "b", "c.txt", "inner", "d.txt"]);
    }

    #[test]
    fn empty_directory_yields_only_itself() {
        let (_dir, root) = fixture();
        let empty = root.join("empty");
        fs::create_dir(&empty).unwrap();

        let records = list_tree(&empty).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "empty");
        assert!(records[0].is_directory);
    }

    #[test]
    fn root_name_uses_last_segment() {
        assert_eq!(root_name(Path::new("/srv/data/photos")), "photos");
        assert_eq!(root_name(Path::new("/srv/data/photos/")), "photos");
        assert_eq!(root_name(Path::new("/")), "/");
    }

    #[test]
    fn repeated_walks_are_identical() {
        let (_dir, root) = fixture();
        fs::write(root.join("one"), b"1").unwrap();
        fs::create_dir(root.join("two")).unwrap();
        fs::write(root.join("two/three"), b"33").unwrap();

        assert_eq!(list_tree(&root).unwrap(), list_tree(&root).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn renders_unix_modes() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, root) = fixture();
        let file = root.join("secret");
        fs::write(&file, b"x").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o640)).unwrap();
        let sub = root.join("sub");
        fs::create_dir(&sub).unwrap();
        fs::set_permissions(&sub, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(mode_string(&fs::metadata(&file).unwrap()), "-rw-r-----");
        assert_eq!(mode_string(&fs::metadata(&sub).unwrap()), "drwxr-xr-x");
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_aborts_walk() {
        let (_dir, root) = fixture();
        fs::write(root.join("a.txt"), b"a").unwrap();
        std::os::unix::fs::symlink(root.join("missing"), root.join("b-link")).unwrap();
        fs::write(root.join("c.txt"), b"c").unwrap();

        let err = list_tree(&root).unwrap_err();
        assert!(matches!(err, WalkError::Vanished(_)));
        assert_eq!(err.path(), Some(root.join("b-link").as_path()));
        assert!(!err.is_internal());
        assert_eq!(err.to_string(), "File or folder does not exist");
    }

    #[cfg(unix)]
    #[test]
    fn walk_stops_after_first_error() {
        let (_dir, root) = fixture();
        std::os::unix::fs::symlink(root.join("missing"), root.join("a-link")).unwrap();
        fs::write(root.join("b.txt"), b"b").unwrap();

        let mut walk = TreeWalk::new(&root);
        assert!(walk.next().unwrap().is_ok());
        assert!(walk.next().unwrap().is_err());
        assert!(walk.next().is_none());
    }
}
