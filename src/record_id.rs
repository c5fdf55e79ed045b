use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    path::Path,
};

/// A stable record identifier derived from a source file path and, for
/// multi-record files, a discriminator for the position within the file.
///
/// The same inputs always produce the same identifier, which lets the search
/// index perform true updates instead of duplicate insertions across reloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordId(String);

impl RecordId {
    /// Identifier for a file that yields a single record.
    pub fn from_path(path: &Path) -> Self {
        Self::digest(path, None)
    }

    /// Identifier for one record among several in the same file, e.g. a
    /// checkbox line keyed by its task text and line number.
    pub fn from_path_item(path: &Path, item: &str, position: usize) -> Self {
        Self::digest(path, Some((item, position)))
    }

    /// Identifier for a freshly created record that has no stable source
    /// location yet (history entries, backups), salted with nanos.
    pub fn from_parts(kind: &str, salt: &str, nanos: i64) -> Self {
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        salt.hash(&mut hasher);
        nanos.hash(&mut hasher);
        let a = hasher.finish();
        salt.len().hash(&mut hasher);
        RecordId(format!("{a:016x}{:016x}", hasher.finish()))
    }

    fn digest(path: &Path, item: Option<(&str, usize)>) -> Self {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        if let Some((item, position)) = item {
            item.hash(&mut hasher);
            position.hash(&mut hasher);
        }
        let a = hasher.finish();
        // Second round for a 32-hex-digit id, matching the width callers
        // historically treated as opaque.
        0xa5a5_a5a5_u64.hash(&mut hasher);
        RecordId(format!("{a:016x}{:016x}", hasher.finish()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_path() {
        let a = RecordId::from_path(Path::new("rules/a.md"));
        let b = RecordId::from_path(Path::new("rules/a.md"));
        assert_eq!(a, b);
    }

    #[test]
    fn different_paths_differ() {
        let a = RecordId::from_path(Path::new("rules/a.md"));
        let b = RecordId::from_path(Path::new("rules/b.md"));
        assert_ne!(a, b);
    }

    #[test]
    fn item_discriminator_matters() {
        let path = Path::new("todos/auth.md");
        let a = RecordId::from_path_item(path, "write tests", 3);
        let b = RecordId::from_path_item(path, "write tests", 7);
        let c = RecordId::from_path_item(path, "write docs", 3);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn id_is_32_hex_chars() {
        let id = RecordId::from_path(Path::new("rules/a.md"));
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
