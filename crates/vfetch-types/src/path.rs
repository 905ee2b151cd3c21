use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Separator between components of a [`RelativePath`].
pub const SEPARATOR: char = '/';

/// A single, validated name within a directory.
///
/// A component is never empty, never `.` or `..`, and never contains a
/// directory separator.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathComponent(String);

impl PathComponent {
    /// Validate and wrap a component name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TypeError::EmptyComponent);
        }
        if name.contains(SEPARATOR) || name.contains('\0') {
            return Err(TypeError::ContainsSeparator(name));
        }
        if name == "." || name == ".." {
            return Err(TypeError::ReservedComponent(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PathComponent {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PathComponent {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PathComponent> for String {
    fn from(component: PathComponent) -> Self {
        component.0
    }
}

/// A validated, `/`-separated path relative to the repository root.
///
/// The empty path denotes the root itself.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// The repository root.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Validate and wrap a path. Every component must be a valid
    /// [`PathComponent`]; leading, trailing, or doubled separators are
    /// rejected.
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let path = path.into();
        if path.is_empty() {
            return Ok(Self(path));
        }
        for part in path.split(SEPARATOR) {
            PathComponent::new(part).map_err(|e| TypeError::InvalidPath {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(Self(path))
    }

    /// Returns `true` if this is the repository root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Append one component.
    pub fn join(&self, component: &PathComponent) -> Self {
        if self.0.is_empty() {
            return Self(component.0.clone());
        }
        let mut joined = String::with_capacity(self.0.len() + 1 + component.0.len());
        joined.push_str(&self.0);
        joined.push(SEPARATOR);
        joined.push_str(&component.0);
        Self(joined)
    }

    /// Iterate over the components, root first.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|c| !c.is_empty())
    }

    /// The final component, if any.
    pub fn basename(&self) -> Option<&str> {
        self.components().last()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RelativePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RelativePath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RelativePath> for String {
    fn from(path: RelativePath) -> Self {
        path.0
    }
}

impl From<PathComponent> for RelativePath {
    fn from(component: PathComponent) -> Self {
        Self(component.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn component_rejects_separator() {
        assert_eq!(
            PathComponent::new("a/b").unwrap_err(),
            TypeError::ContainsSeparator("a/b".into())
        );
    }

    #[test]
    fn component_rejects_empty_and_reserved() {
        assert_eq!(PathComponent::new("").unwrap_err(), TypeError::EmptyComponent);
        assert!(matches!(
            PathComponent::new(".."),
            Err(TypeError::ReservedComponent(_))
        ));
        assert!(matches!(
            PathComponent::new("."),
            Err(TypeError::ReservedComponent(_))
        ));
    }

    #[test]
    fn root_path() {
        let root = RelativePath::root();
        assert!(root.is_root());
        assert_eq!(root.components().count(), 0);
        assert_eq!(RelativePath::new("").unwrap(), root);
    }

    #[test]
    fn join_from_root_and_nested() {
        let src = PathComponent::new("src").unwrap();
        let lib = PathComponent::new("lib.rs").unwrap();
        let path = RelativePath::root().join(&src).join(&lib);
        assert_eq!(path.as_str(), "src/lib.rs");
        assert_eq!(path.basename(), Some("lib.rs"));
        assert_eq!(path.components().collect::<Vec<_>>(), vec!["src", "lib.rs"]);
    }

    #[test]
    fn path_rejects_bad_shapes() {
        assert!(RelativePath::new("/abs").is_err());
        assert!(RelativePath::new("trailing/").is_err());
        assert!(RelativePath::new("a//b").is_err());
        assert!(RelativePath::new("a/../b").is_err());
        assert!(RelativePath::new("a/b/c").is_ok());
    }

    #[test]
    fn serde_validates() {
        let ok: RelativePath = serde_json::from_str("\"a/b\"").unwrap();
        assert_eq!(ok.as_str(), "a/b");
        assert!(serde_json::from_str::<RelativePath>("\"a//b\"").is_err());
        assert!(serde_json::from_str::<PathComponent>("\"x/y\"").is_err());
    }

    proptest! {
        #[test]
        fn joined_components_roundtrip(parts in proptest::collection::vec("[a-z0-9_]{1,8}", 0..6)) {
            let mut path = RelativePath::root();
            for part in &parts {
                path = path.join(&PathComponent::new(part.clone()).unwrap());
            }
            let collected: Vec<&str> = path.components().collect();
            prop_assert_eq!(collected, parts.iter().map(String::as_str).collect::<Vec<_>>());
            prop_assert_eq!(RelativePath::new(path.as_str()).unwrap(), path);
        }
    }
}
