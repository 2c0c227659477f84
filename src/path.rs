//! Diagnostic paths.
//!
//! A `Path` is the ordered list of display segments from the outermost type
//! down to the current recursion point, e.g. `Point/x: Number`.
//!
//! Stored as a persistent cons list: `extend` allocates one node that points
//! at its parent, so sibling calls share their common prefix and nobody ever
//! mutates a path another call can see.
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
struct Node {
    segment: String,
    parent: Option<Arc<Node>>,
}

#[derive(Clone, Debug, Default)]
pub struct Path {
    tip: Option<Arc<Node>>,
    len: usize,
}

impl Path {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn root(segment: impl Into<String>) -> Self {
        Self::empty().extend(segment)
    }

    /// New path with `segment` appended; `self` is left as-is.
    pub fn extend(&self, segment: impl Into<String>) -> Self {
        Self {
            tip: Some(Arc::new(Node { segment: segment.into(), parent: self.tip.clone() })),
            len: self.len + 1,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn last(&self) -> Option<&str> {
        self.tip.as_deref().map(|n| n.segment.as_str())
    }

    /// Segments in root-first order.
    pub fn segments(&self) -> Vec<&str> {
        let mut out = Vec::with_capacity(self.len);
        let mut cur = self.tip.as_deref();
        while let Some(node) = cur {
            out.push(node.segment.as_str());
            cur = node.parent.as_deref();
        }
        out.reverse();
        out
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments().join("/"))
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.segments() == other.segments()
    }
}

impl Eq for Path {}

impl<S: Into<String>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        iter.into_iter().fold(Path::empty(), |p, s| p.extend(s))
    }
}
