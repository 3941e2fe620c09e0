//! Texture references declared by configuration manifests.

use std::collections::HashSet;
use std::path::Path;

const MANIFEST_EXTENSION: &str = "ini";
const TEXTURE_EXTENSIONS: &[&str] = &["png", "dds"];
const REFERENCE_KEY: &str = "filename";

fn has_extension(path: &Path, wanted: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| wanted.iter().any(|w| e.eq_ignore_ascii_case(w)))
}

pub fn is_manifest_file(path: &Path) -> bool {
    has_extension(path, &[MANIFEST_EXTENSION])
}

pub fn is_texture_file(path: &Path) -> bool {
    has_extension(path, TEXTURE_EXTENSIONS)
}

/// Extracts the value of a `filename = value` line, if this is one.
///
/// The key is matched case-insensitively; key and value are trimmed and an
/// empty value is not a reference.
pub fn parse_reference(line: &str) -> Option<&str> {
    let line = line.trim_start_matches('\u{feff}').trim();
    let (key, value) = line.split_once('=')?;
    if !key.trim_end().eq_ignore_ascii_case(REFERENCE_KEY) {
        return None;
    }
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Bare filenames referenced by any manifest in a tree.
///
/// Matching is by name only: a reference protects every file with that name,
/// whichever directory it sits in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    names: HashSet<String>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_manifest_text(text: &str) -> Self {
        let mut set = Self::new();
        set.add_manifest_text(text);
        set
    }

    pub fn add_manifest_text(&mut self, text: &str) {
        self.names
            .extend(text.lines().filter_map(parse_reference).map(str::to_string));
    }

    pub fn merge(&mut self, other: ReferenceSet) {
        self.names.extend(other.names);
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.names.contains(file_name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
