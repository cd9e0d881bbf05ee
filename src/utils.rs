use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Derives a stable table id from a file path so that the same table,
/// reopened in a later process, gets the same id without a registry.
/// Hashes the canonicalized path when it exists on disk yet (so two
/// different paths naming the same file collapse to one id); falls
/// back to hashing the path as given otherwise.
pub fn stable_hash<P: AsRef<Path>>(path: P) -> i32 {
    let path = path.as_ref();
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    (hasher.finish() as i32).wrapping_abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_hashes_the_same() {
        assert_eq!(stable_hash("/tmp/does-not-exist-a"), stable_hash("/tmp/does-not-exist-a"));
    }

    #[test]
    fn different_paths_usually_differ() {
        assert_ne!(
            stable_hash("/tmp/does-not-exist-a"),
            stable_hash("/tmp/does-not-exist-b")
        );
    }
}
