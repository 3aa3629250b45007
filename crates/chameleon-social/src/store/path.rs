use std::fmt;

/// Slash-separated location of a document in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StorePath(Vec<String>);

impl StorePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse `"a/b/c"`. Empty segments are ignored.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        let mut segments = self.0.clone();
        segments.extend(
            segment
                .as_ref()
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `self` equals `other` or contains it.
    pub fn covers(&self, other: &StorePath) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// True if a change at `changed` can alter the value seen at `self`.
    pub fn overlaps(&self, changed: &StorePath) -> bool {
        self.covers(changed) || changed.covers(self)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}
