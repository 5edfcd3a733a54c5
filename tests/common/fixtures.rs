use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Builds a throwaway root directory laid out like a mock package repository.
#[derive(Default)]
pub struct RepoFixture {
    files: Vec<(String, Vec<u8>)>,
    dirs: Vec<String>,
}

impl RepoFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small apt-style layout: `repo/` plus a public key next to it.
    pub fn package_repo() -> Self {
        Self::new()
            .file("repo/index.txt", "hello")
            .file("repo/dists/stable/Release", "Suite: stable\n")
            .file(
                "repo/pool/main/s/scalyr-agent-2_2.2.0_all.deb",
                vec![0x21, 0x3c, 0x61, 0x72, 0x63, 0x68, 0x3e, 0x0a, 0x00, 0xff],
            )
            .file("repo_public_key.gpg", "-----BEGIN PGP PUBLIC KEY BLOCK-----\n")
    }

    pub fn file(mut self, relative: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push((relative.to_string(), contents.into()));
        self
    }

    pub fn dir(mut self, relative: &str) -> Self {
        self.dirs.push(relative.to_string());
        self
    }

    pub fn build(self) -> TempDir {
        let root = tempfile::tempdir().expect("failed to create repo root");
        for dir in &self.dirs {
            fs::create_dir_all(root.path().join(dir)).expect("failed to create fixture dir");
        }
        for (relative, contents) in &self.files {
            write_file(root.path(), relative, contents);
        }
        root
    }
}

fn write_file(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create fixture parent dir");
    }
    fs::write(&path, contents)
        .unwrap_or_else(|e| panic!("failed to write fixture {}: {}", path.display(), e));
}
