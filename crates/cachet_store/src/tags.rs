// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tag lists and lazily-produced tag lists for write options.

use std::sync::Arc;

/// The tags to associate with a write: none, a fixed list, or a producer.
///
/// Callers that compute tag names from request state can defer the work by
/// passing a producer; it is invoked exactly once, at write time.
///
/// # Examples
///
/// ```
/// use cachet_store::TagSource;
///
/// let fixed = TagSource::from(vec!["users".to_string()]);
/// assert_eq!(fixed.resolve(), vec!["users".to_string()]);
///
/// let lazy = TagSource::producer(|| vec!["users".to_string(), "acl".to_string()]);
/// assert_eq!(lazy.resolve().len(), 2);
/// ```
#[derive(Clone, Default)]
pub enum TagSource {
    /// No tags.
    #[default]
    None,
    /// A fixed list of tag names.
    List(Vec<String>),
    /// A callable producing the tag names, resolved eagerly at write time.
    Producer(Arc<dyn Fn() -> Vec<String> + Send + Sync>),
}

impl TagSource {
    /// Creates a tag source from a producer closure.
    pub fn producer<F>(f: F) -> Self
    where
        F: Fn() -> Vec<String> + Send + Sync + 'static,
    {
        Self::Producer(Arc::new(f))
    }

    /// Resolves the source into a concrete list of tag names.
    #[must_use]
    pub fn resolve(&self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::List(names) => names.clone(),
            Self::Producer(f) => f(),
        }
    }
}

impl std::fmt::Debug for TagSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::List(names) => f.debug_tuple("List").field(names).finish(),
            Self::Producer(_) => write!(f, "Producer(<closure>)"),
        }
    }
}

impl From<Vec<String>> for TagSource {
    fn from(names: Vec<String>) -> Self {
        if names.is_empty() {
            Self::None
        } else {
            Self::List(names)
        }
    }
}

impl From<&[&str]> for TagSource {
    fn from(names: &[&str]) -> Self {
        Self::from(names.iter().map(|n| (*n).to_string()).collect::<Vec<_>>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_resolves_empty() {
        assert!(TagSource::None.resolve().is_empty());
    }

    #[test]
    fn empty_list_collapses_to_none() {
        let source = TagSource::from(Vec::<String>::new());
        assert!(matches!(source, TagSource::None));
    }

    #[test]
    fn producer_is_invoked_on_resolve() {
        let source = TagSource::producer(|| vec!["a".to_string()]);
        assert_eq!(source.resolve(), vec!["a".to_string()]);
        // A second resolve invokes the producer again.
        assert_eq!(source.resolve(), vec!["a".to_string()]);
    }

    #[test]
    fn debug_does_not_expose_closure() {
        let source = TagSource::producer(Vec::new);
        assert_eq!(format!("{source:?}"), "Producer(<closure>)");
    }
}
