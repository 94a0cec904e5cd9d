//! Source trees and comparison helpers

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A small directory tree with nested content
pub fn create_source_tree(root: &Path) -> PathBuf {
    let dir = root.join("payload");
    std::fs::create_dir_all(dir.join("nested/deeper")).expect("mkdir");
    std::fs::write(dir.join("readme.txt"), b"top level file\n").expect("write");
    std::fs::write(dir.join("nested/data.bin"), (0u8..=255).cycle().take(64 * 1024).collect::<Vec<_>>())
        .expect("write");
    std::fs::write(dir.join("nested/deeper/empty"), b"").expect("write");
    dir
}

/// Relative path -> contents for every regular file under `root`
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .expect("under root")
                .to_path_buf();
            let contents = std::fs::read(entry.path()).expect("read");
            (relative, contents)
        })
        .collect()
}
