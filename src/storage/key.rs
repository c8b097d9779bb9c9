use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;

/// Logical address of one stored image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    gallery_id: String,
    image_id: String,
}

impl ResourceKey {
    pub fn new(gallery_id: impl Into<String>, image_id: impl Into<String>) -> Self {
        Self {
            gallery_id: gallery_id.into(),
            image_id: image_id.into(),
        }
    }

    pub fn gallery_id(&self) -> &str {
        &self.gallery_id
    }

    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    /// Storage path relative to the root: `<gallery>/<image>`.
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.gallery_id, self.image_id)
    }

    /// Both ids must be single path segments, so a key can never address a
    /// file outside its own gallery directory.
    pub fn validate(&self) -> Result<(), StorageError> {
        if is_single_segment(&self.gallery_id) && is_single_segment(&self.image_id) {
            Ok(())
        } else {
            Err(StorageError::PathTraversal)
        }
    }
}

fn is_single_segment(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0'])
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.gallery_id, self.image_id)
    }
}

/// Lexically normalize an untrusted relative key.
///
/// `.` segments are dropped and `..` pops the previous segment. Absolute
/// keys, drive prefixes and any `..` that would climb above the root are
/// `PathTraversal`. No filesystem access happens here.
pub fn normalize_key(key: &str) -> Result<PathBuf, StorageError> {
    let mut normalized = PathBuf::new();
    let mut depth = 0usize;

    for component in Path::new(key).components() {
        match component {
            Component::Normal(segment) => {
                normalized.push(segment);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(StorageError::PathTraversal);
                }
                normalized.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return Err(StorageError::PathTraversal),
        }
    }

    if depth == 0 {
        return Err(StorageError::NotFound);
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain_key() {
        assert_eq!(normalize_key("g1/a.jpg").unwrap(), PathBuf::from("g1/a.jpg"));
        assert_eq!(normalize_key("./g1/./a.jpg").unwrap(), PathBuf::from("g1/a.jpg"));
        assert_eq!(normalize_key("g1/x/../a.jpg").unwrap(), PathBuf::from("g1/a.jpg"));
    }

    #[test]
    fn test_normalize_rejects_escapes() {
        for key in ["../../etc/passwd", "..", "g1/../../x", "/etc/passwd", "g1/../.."] {
            assert!(
                matches!(normalize_key(key), Err(StorageError::PathTraversal)),
                "{:?}",
                key
            );
        }
    }

    #[test]
    fn test_normalize_empty_key_is_not_found() {
        assert!(matches!(normalize_key(""), Err(StorageError::NotFound)));
        assert!(matches!(normalize_key("g1/.."), Err(StorageError::NotFound)));
    }

    #[test]
    fn test_validate_single_segments() {
        assert!(ResourceKey::new("g1", "a.jpg").validate().is_ok());
        assert!(ResourceKey::new("g1", "..a.jpg").validate().is_ok());
        for (gallery, image) in [
            ("g1", "../g2/secret.jpg"),
            ("g1", "sub/a.jpg"),
            ("g1", "..\\g2\\a.jpg"),
            ("g1", ".."),
            ("g1", "."),
            ("g1", ""),
            ("..", "a.jpg"),
            ("g1/../g2", "a.jpg"),
        ] {
            assert!(
                matches!(
                    ResourceKey::new(gallery, image).validate(),
                    Err(StorageError::PathTraversal)
                ),
                "{:?}/{:?}",
                gallery,
                image
            );
        }
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(ResourceKey::new("g1", "a.jpg").relative_path(), "g1/a.jpg");
    }
}
