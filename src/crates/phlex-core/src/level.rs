//! Level identifiers — immutable paths through the hierarchy
//!
//! A [`LevelId`] is the sequence of `(level_name, level_number)` segments
//! describing where a [`crate::store::ProductStore`] sits in the hierarchy
//! (e.g. `job → run → event → segment`). Every node needs a stable hash;
//! that's computed once at construction, not recomputed on every comparison.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// One `(level_name, level_number)` segment of a [`LevelId`].
pub type Segment = (String, u64);

/// An immutable path through the level hierarchy, e.g. `job:0/run:3/event:12`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelId {
    segments: Vec<Segment>,
    hash: u64,
}

impl LevelId {
    /// The root id: a single segment.
    pub fn root(level_name: impl Into<String>, level_number: u64) -> Self {
        Self::from_segments(vec![(level_name.into(), level_number)])
    }

    /// Append a child segment.
    pub fn child(&self, level_name: impl Into<String>, level_number: u64) -> Self {
        let mut segments = self.segments.clone();
        segments.push((level_name.into(), level_number));
        Self::from_segments(segments)
    }

    fn from_segments(segments: Vec<Segment>) -> Self {
        let mut hasher = DefaultHasher::new();
        segments.hash(&mut hasher);
        Self {
            segments,
            hash: hasher.finish(),
        }
    }

    /// Name of the deepest (most recent) segment.
    pub fn level_name(&self) -> &str {
        &self
            .segments
            .last()
            .expect("LevelId is never constructed empty")
            .0
    }

    /// Number of the deepest segment.
    pub fn level_number(&self) -> u64 {
        self.segments
            .last()
            .expect("LevelId is never constructed empty")
            .1
    }

    /// Stable hash for this id, suitable for use as a map key alongside equality.
    pub fn stable_hash(&self) -> u64 {
        self.hash
    }

    /// All segments, root first.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Depth of this id (number of segments).
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// `true` if `self`'s segments are a strict prefix of `other`'s.
    pub fn is_prefix_of(&self, other: &LevelId) -> bool {
        self.segments.len() < other.segments.len() && self.segments == other.segments[..self.segments.len()]
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.segments.iter().map(|(n, i)| format!("{n}:{i}")).collect();
        write!(f, "{}", rendered.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_one_segment() {
        let root = LevelId::root("job", 0);
        assert_eq!(root.depth(), 1);
        assert_eq!(root.level_name(), "job");
        assert_eq!(root.level_number(), 0);
    }

    #[test]
    fn child_extends_the_path() {
        let root = LevelId::root("job", 0);
        let run = root.child("run", 3);
        assert_eq!(run.depth(), 2);
        assert_eq!(run.level_name(), "run");
        assert!(root.is_prefix_of(&run));
        assert!(!run.is_prefix_of(&root));
    }

    #[test]
    fn equal_paths_hash_equal() {
        let a = LevelId::root("job", 0).child("run", 1);
        let b = LevelId::root("job", 0).child("run", 1);
        assert_eq!(a, b);
        assert_eq!(a.stable_hash(), b.stable_hash());
    }

    #[test]
    fn display_renders_name_colon_number_segments() {
        let id = LevelId::root("job", 0).child("run", 3);
        assert_eq!(id.to_string(), "job:0/run:3");
    }
}
