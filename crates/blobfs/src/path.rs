//! Resolution of filesystem paths into container and object key

use crate::{BlobFsError, Result};
use std::fmt;

const SCHEME_SEPARATOR: &str = "://";
const SEPARATOR: char = '/';

/// A parsed `container[/key]` path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoragePath {
    container: String,
    key: String,
}

impl StoragePath {
    /// Parse a raw filesystem path.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for empty paths, scheme-qualified paths
    /// (`abfss://...`) and keys with empty, `.` or `..` segments.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.contains(SCHEME_SEPARATOR) {
            return Err(BlobFsError::InvalidArgument(format!(
                "expected a path of the form 'container/key', got a URI: '{}'",
                raw
            )));
        }

        let trimmed = raw.strip_prefix(SEPARATOR).unwrap_or(raw);
        let (container, key) = match trimmed.split_once(SEPARATOR) {
            Some((container, key)) => (container, key),
            None => (trimmed, ""),
        };

        if container.is_empty() {
            return Err(BlobFsError::InvalidArgument(format!(
                "path has no container: '{}'",
                raw
            )));
        }

        let segments = key.strip_suffix(SEPARATOR).unwrap_or(key);
        if !segments.is_empty() {
            for segment in segments.split(SEPARATOR) {
                if segment.is_empty() || segment == "." || segment == ".." {
                    return Err(BlobFsError::InvalidArgument(format!(
                        "invalid path segment '{}' in '{}'",
                        segment, raw
                    )));
                }
            }
        }

        Ok(Self {
            container: container.to_string(),
            key: key.to_string(),
        })
    }

    /// Build a path from an already split container and key
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        let container = container.into();
        let key = key.into();
        let path = if key.is_empty() {
            Self::parse(&container)?
        } else {
            Self::parse(&format!("{}/{}", container, key))?
        };
        if path.container != container {
            return Err(BlobFsError::InvalidArgument(format!(
                "invalid container name '{}'",
                container
            )));
        }
        Ok(path)
    }

    /// The container name
    pub fn container(&self) -> &str {
        &self.container
    }

    /// The object key, empty for container paths
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether this path names a container
    pub fn is_container(&self) -> bool {
        self.key.is_empty()
    }

    /// Whether this path ends with a separator, i.e. names a prefix rather than an object
    pub fn is_prefix(&self) -> bool {
        self.key.ends_with(SEPARATOR)
    }

    /// Check that this path can identify an object.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for container paths and trailing-slash paths.
    pub fn require_object(&self) -> Result<&Self> {
        if self.is_container() {
            return Err(BlobFsError::InvalidArgument(format!(
                "'{}' names a container, not a file",
                self
            )));
        }
        if self.is_prefix() {
            return Err(BlobFsError::InvalidArgument(format!(
                "'{}' ends with a '/' and cannot name a file",
                self
            )));
        }
        Ok(self)
    }

    /// The key used when listing the children of this path, always ending in `/` or empty
    pub fn child_prefix(&self) -> String {
        if self.key.is_empty() || self.is_prefix() {
            self.key.clone()
        } else {
            format!("{}{}", self.key, SEPARATOR)
        }
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}", self.container)
        } else {
            write!(f, "{}/{}", self.container, self.key)
        }
    }
}

/// Whether `raw` addresses the root of the account (all containers)
pub(crate) fn is_root(raw: &str) -> bool {
    raw.is_empty() || raw == "/"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_split_container_and_key() {
        let path = StoragePath::parse("container/dir/object.bin").unwrap();
        assert_eq!(path.container(), "container");
        assert_eq!(path.key(), "dir/object.bin");
        assert!(!path.is_container());
        assert!(!path.is_prefix());

        let path = StoragePath::parse("container").unwrap();
        assert_eq!(path.container(), "container");
        assert_eq!(path.key(), "");
        assert!(path.is_container());

        let path = StoragePath::parse("container/").unwrap();
        assert!(path.is_container());
        assert_eq!(path.to_string(), "container");
    }

    #[test]
    fn test_leading_separator_is_stripped() {
        let path = StoragePath::parse("/container/obj").unwrap();
        assert_eq!(path.container(), "container");
        assert_eq!(path.key(), "obj");
    }

    #[test]
    fn test_round_trip() {
        for raw in ["c", "c/obj", "c/a/b/c.txt", "data-2023/x y z", "c/dir/"] {
            let path = StoragePath::parse(raw).unwrap();
            assert_eq!(path.to_string(), raw);
            let again = StoragePath::new(path.container(), path.key()).unwrap();
            assert_eq!(again, path);
        }
    }

    #[test]
    fn test_scheme_qualified_paths_rejected() {
        for raw in ["abfss://c/obj", "az://c", "https://account.blob.core.windows.net/c/o", "c/a://b"] {
            let err = StoragePath::parse(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{}", raw);
        }
    }

    #[test]
    fn test_invalid_segments_rejected() {
        for raw in ["", "/", "//obj", "c//obj", "c/./obj", "c/../obj", "c/a//"] {
            let err = StoragePath::parse(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{:?}", raw);
        }
    }

    #[test]
    fn test_require_object() {
        assert!(StoragePath::parse("c/obj").unwrap().require_object().is_ok());

        let err = StoragePath::parse("c").unwrap().require_object().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = StoragePath::parse("c/obj/").unwrap().require_object().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_child_prefix() {
        assert_eq!(StoragePath::parse("c").unwrap().child_prefix(), "");
        assert_eq!(StoragePath::parse("c/dir").unwrap().child_prefix(), "dir/");
        assert_eq!(StoragePath::parse("c/dir/").unwrap().child_prefix(), "dir/");
    }

    #[test]
    fn test_new_rejects_container_with_separator() {
        assert!(StoragePath::new("a/b", "").is_err());
        assert!(StoragePath::new("", "obj").is_err());
    }
}
