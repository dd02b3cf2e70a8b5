//! Arena of interned join nodes.
//!
//! Every distinct (parent, segment) pair is stored once and addressed by a
//! [`JoinHandle`]. Handle `0` is always the root.

use std::collections::HashMap;
use std::fmt;

use super::{JoinPath, JoinSegment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinHandle(usize);

impl JoinHandle {
    pub const ROOT: JoinHandle = JoinHandle(0);

    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for JoinHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct JoinNode {
    parent: Option<JoinHandle>,
    segment: Option<JoinSegment>,
}

#[derive(Debug, Clone)]
pub struct JoinGraph {
    nodes: Vec<JoinNode>,
    children: HashMap<(JoinHandle, JoinSegment), JoinHandle>,
}

impl Default for JoinGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl JoinGraph {
    pub fn new() -> Self {
        Self {
            nodes: vec![JoinNode {
                parent: None,
                segment: None,
            }],
            children: HashMap::new(),
        }
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Returns the handle of `segment` below `parent`, creating the node on first use.
    pub fn intern_child(&mut self, parent: JoinHandle, segment: JoinSegment) -> JoinHandle {
        if let Some(handle) = self.children.get(&(parent, segment.clone())) {
            return *handle;
        }
        let handle = JoinHandle(self.nodes.len());
        self.nodes.push(JoinNode {
            parent: Some(parent),
            segment: Some(segment.clone()),
        });
        self.children.insert((parent, segment), handle);
        handle
    }

    pub fn intern(&mut self, path: &JoinPath) -> JoinHandle {
        path.segments()
            .iter()
            .fold(JoinHandle::ROOT, |parent, segment| {
                self.intern_child(parent, segment.clone())
            })
    }

    pub fn find_child(&self, parent: JoinHandle, segment: &JoinSegment) -> Option<JoinHandle> {
        self.children.get(&(parent, segment.clone())).copied()
    }

    pub fn find(&self, path: &JoinPath) -> Option<JoinHandle> {
        path.segments()
            .iter()
            .try_fold(JoinHandle::ROOT, |parent, segment| {
                self.find_child(parent, segment)
            })
    }

    pub fn parent(&self, handle: JoinHandle) -> Option<JoinHandle> {
        self.nodes.get(handle.0).and_then(|node| node.parent)
    }

    pub fn segment(&self, handle: JoinHandle) -> Option<&JoinSegment> {
        self.nodes.get(handle.0).and_then(|node| node.segment.as_ref())
    }

    /// Rebuilds the full root-to-node path of `handle`
    pub fn path(&self, handle: JoinHandle) -> JoinPath {
        let mut segments = Vec::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            if let Some(segment) = self.segment(h) {
                segments.push(segment.clone());
            }
            current = self.parent(h);
        }
        segments.reverse();
        JoinPath::from_segments(segments)
    }
}
