//! Content hashing for index keys
//!
//! Both key kinds hash with xxHash64 (seed 0): Tag keys over the UTF-8 bytes
//! of the source path, Image keys over the raw embedded picture bytes.

use std::path::Path;

const SEED: u64 = 0;

/// Hash raw bytes (embedded artwork)
#[must_use]
pub fn content_hash(data: &[u8]) -> u64 {
    xxhash_rust::xxh64::xxh64(data, SEED)
}

/// Hash a file path by its string form
///
/// Non UTF-8 components are replaced lossily, so the same path always
/// produces the same hash on one platform.
#[must_use]
pub fn path_hash(path: &Path) -> u64 {
    content_hash(path.to_string_lossy().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_deterministic() {
        let data = b"\x89PNG cover art";
        assert_eq!(content_hash(data), content_hash(data));
        assert_ne!(content_hash(data), content_hash(b"other art"));
    }

    #[test]
    fn test_path_hash_matches_string_bytes() {
        let path = Path::new("/music/a.mp3");
        assert_eq!(path_hash(path), content_hash(b"/music/a.mp3"));
        assert_ne!(path_hash(path), path_hash(Path::new("/music/b.mp3")));
    }
}
