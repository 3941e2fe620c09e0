use std::path::{Component, Path};

pub struct RemotePath;

impl RemotePath {
    /// Standardize directory separators to forward slashes, the form used by
    /// the content hub for object paths.
    pub fn normalize(path: &str) -> String {
        path.replace('\\', "/")
    }

    /// Reject anything that could resolve outside the install root.
    pub fn verify_safe(rel_path: &str) -> bool {
        let normalized = Self::normalize(rel_path);
        if normalized.starts_with('/') || normalized.chars().nth(1) == Some(':') {
            return false;
        }
        let p = Path::new(&normalized);
        !p.is_absolute()
            && !p
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    }

    /// True when `path` is `folder` itself or lives below it.
    pub fn is_under(path: &str, folder: &str) -> bool {
        let path = Self::normalize(path);
        let folder = Self::normalize(folder);
        let folder = folder.trim_end_matches('/');
        path == folder
            || path
                .strip_prefix(folder)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}
