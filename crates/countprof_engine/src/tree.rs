//! Call-site aggregation.
//!
//! Samples are merged into a forest keyed by `(source, line)`. Nodes live in a
//! single arena and refer to each other by [`NodeId`]; a parent owns the
//! ordered list of its children and an edge index makes find-or-create a hash
//! lookup instead of a list scan.

use std::sync::Arc;

use ahash::AHashMap;

use crate::error::{ProfilerError, Result};

/// Interned source identifier. Only meaningful for the tree that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u32);

/// Identity of a call-tree node among its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameKey {
    pub source: SourceId,
    pub line: u32,
}

impl FrameKey {
    pub fn new(source: SourceId, line: u32) -> Self {
        Self { source, line }
    }
}

/// Handle to a node in a [`CallTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Source names seen so far, each stored once.
#[derive(Debug, Default, Clone)]
pub struct SourceTable {
    names: Vec<Arc<str>>,
    ids: AHashMap<Arc<str>, SourceId>,
}

impl SourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> Result<SourceId> {
        if let Some(&id) = self.ids.get(name) {
            return Ok(id);
        }

        let id = u32::try_from(self.names.len())
            .map(SourceId)
            .map_err(|_| ProfilerError::Allocation {
                what: "source identifier",
            })?;
        self.names
            .try_reserve(1)
            .map_err(|_| ProfilerError::Allocation {
                what: "source table",
            })?;
        self.ids
            .try_reserve(1)
            .map_err(|_| ProfilerError::Allocation {
                what: "source index",
            })?;

        let name: Arc<str> = Arc::from(name);
        self.names.push(Arc::clone(&name));
        self.ids.insert(name, id);
        Ok(id)
    }

    pub fn name(&self, id: SourceId) -> Option<&str> {
        self.names.get(id.0 as usize).map(AsRef::as_ref)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
        self.ids.clear();
    }
}

#[derive(Debug, Clone)]
struct Node {
    key: FrameKey,
    hits: u64,
    children: Vec<NodeId>,
}

/// Forest of call sites with per-node hit counters.
///
/// Hit counters only grow and nodes are never removed individually; the
/// whole forest can be dropped with [`CallTree::clear`].
#[derive(Debug, Default, Clone)]
pub struct CallTree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    edges: AHashMap<(Option<NodeId>, FrameKey), NodeId>,
    sources: SourceTable,
}

impl CallTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample. `path` runs from the outermost frame to the sampled
    /// one; only the last node's counter is incremented. An empty path records
    /// nothing and returns `None`.
    pub fn record_sample(&mut self, path: &[FrameKey]) -> Result<Option<NodeId>> {
        let mut parent = None;
        for &key in path {
            parent = Some(self.find_or_insert(parent, key)?);
        }

        if let Some(leaf) = parent {
            let node = &mut self.nodes[leaf.index()];
            node.hits = node.hits.saturating_add(1);
        }
        Ok(parent)
    }

    /// Child of `parent` (or root when `None`) keyed by `key`, created on
    /// first use.
    pub fn find_or_insert(&mut self, parent: Option<NodeId>, key: FrameKey) -> Result<NodeId> {
        if let Some(&id) = self.edges.get(&(parent, key)) {
            return Ok(id);
        }

        let id = u32::try_from(self.nodes.len())
            .map(NodeId)
            .map_err(|_| ProfilerError::Allocation { what: "node handle" })?;
        self.nodes
            .try_reserve(1)
            .map_err(|_| ProfilerError::Allocation {
                what: "call tree node",
            })?;
        self.edges
            .try_reserve(1)
            .map_err(|_| ProfilerError::Allocation {
                what: "call tree index",
            })?;
        let siblings = match parent {
            Some(parent) => &mut self.nodes[parent.index()].children,
            None => &mut self.roots,
        };
        siblings
            .try_reserve(1)
            .map_err(|_| ProfilerError::Allocation {
                what: "call tree children",
            })?;

        siblings.push(id);
        self.nodes.push(Node {
            key,
            hits: 0,
            children: Vec::new(),
        });
        self.edges.insert((parent, key), id);
        Ok(id)
    }

    /// Child of `parent` keyed by `key`, if it exists.
    pub fn find(&self, parent: Option<NodeId>, key: FrameKey) -> Option<NodeId> {
        self.edges.get(&(parent, key)).copied()
    }

    /// Node reached by following `path` from the roots.
    pub fn lookup(&self, path: &[FrameKey]) -> Option<NodeId> {
        let mut parent = None;
        for &key in path {
            parent = Some(self.find(parent, key)?);
        }
        parent
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn key(&self, id: NodeId) -> FrameKey {
        self.nodes[id.index()].key
    }

    pub fn hits(&self, id: NodeId) -> u64 {
        self.nodes[id.index()].hits
    }

    /// Sum of all hit counters, i.e. the number of recorded samples.
    pub fn total_hits(&self) -> u64 {
        self.nodes.iter().map(|node| node.hits).sum()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn sources(&self) -> &SourceTable {
        &self.sources
    }

    pub fn sources_mut(&mut self) -> &mut SourceTable {
        &mut self.sources
    }

    pub fn intern(&mut self, source: &str) -> Result<SourceId> {
        self.sources.intern(source)
    }

    /// Source name of a node's frame.
    pub fn source_name(&self, id: NodeId) -> &str {
        self.sources.name(self.key(id).source).unwrap_or("?")
    }

    /// Drop every node and interned source.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.edges.clear();
        self.sources.clear();
    }
}
