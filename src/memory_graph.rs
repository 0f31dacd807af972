//! An in-memory [`GraphHook`] that keeps everything it receives, for dumping and inspection.

use crate::hook::{GraphHook, HookError};
use crate::sequence::SequenceNumber;
use crate::vertex::{Vertex, VertexKind};
use core::fmt;
use displaydoc::Display;
use rustc_hash::FxHashMap;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// AST
    Ast,
    /// SOURCE_FILE
    SourceFile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub from: SequenceNumber,
    pub to: SequenceNumber,
    pub kind: EdgeKind,
}

#[derive(Debug, Default)]
pub struct MemoryGraph {
    vertices: Vec<Vertex>,
    index: FxHashMap<SequenceNumber, usize>,
    // Tree structure, i.e. the `AST` edges. Each vertex has at most one parent.
    parents: FxHashMap<SequenceNumber, SequenceNumber>,
    children: FxHashMap<SequenceNumber, Vec<SequenceNumber>>,
    edges: Vec<Edge>,
    highest: Option<SequenceNumber>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex(&self, seq: SequenceNumber) -> Option<&Vertex> {
        self.index.get(&seq).map(|&i| &self.vertices[i])
    }

    /// Vertices in creation order.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn parent(&self, seq: SequenceNumber) -> Option<SequenceNumber> {
        self.parents.get(&seq).copied()
    }

    /// Children in attachment order.
    pub fn children(&self, seq: SequenceNumber) -> &[SequenceNumber] {
        self.children.get(&seq).map_or(&[], Vec::as_slice)
    }

    pub fn methods(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices
            .iter()
            .filter(|vertex| matches!(vertex.kind, VertexKind::Method { .. }))
    }

    /// The method with the given full name, e.g. `a.B.run:(I)V`.
    pub fn method_by_full_name(&self, name: &str) -> Option<&Vertex> {
        self.methods().find(|vertex| {
            matches!(&vertex.kind, VertexKind::Method { full_name, .. } if full_name == name)
        })
    }

    pub fn dump(&self, root: SequenceNumber) -> TreeDump<'_> {
        TreeDump { graph: self, root }
    }

    fn require(&self, seq: SequenceNumber) -> Result<&Vertex, HookError> {
        self.vertex(seq).ok_or(HookError::UnknownVertex(seq))
    }

    fn require_method(&self, seq: SequenceNumber) -> Result<(), HookError> {
        match self.require(seq)?.kind {
            VertexKind::Method { .. } => Ok(()),
            _ => Err(HookError::NotAMethod(seq)),
        }
    }

    fn add_child(&mut self, parent: SequenceNumber, child: SequenceNumber) -> Result<(), HookError> {
        self.require(parent)?;
        self.require(child)?;
        if let Some(&existing) = self.parents.get(&child) {
            return Err(HookError::AlreadyAttached {
                child,
                parent: existing,
            });
        }
        self.parents.insert(child, parent);
        self.children.entry(parent).or_default().push(child);
        self.edges.push(Edge {
            from: parent,
            to: child,
            kind: EdgeKind::Ast,
        });
        Ok(())
    }
}

impl GraphHook for MemoryGraph {
    fn create_vertex(&mut self, vertex: Vertex) -> Result<(), HookError> {
        if self.index.contains_key(&vertex.seq) {
            return Err(HookError::DuplicateVertex(vertex.seq));
        }
        self.highest = self.highest.max(Some(vertex.seq));
        self.index.insert(vertex.seq, self.vertices.len());
        self.vertices.push(vertex);
        Ok(())
    }

    fn link_file_to_namespace(
        &mut self,
        file: SequenceNumber,
        namespace: SequenceNumber,
    ) -> Result<(), HookError> {
        self.require(file)?;
        self.require(namespace)?;
        self.edges.push(Edge {
            from: namespace,
            to: file,
            kind: EdgeKind::SourceFile,
        });
        Ok(())
    }

    fn link_namespace_chain(
        &mut self,
        parent: SequenceNumber,
        child: SequenceNumber,
    ) -> Result<(), HookError> {
        self.add_child(parent, child)
    }

    fn link_method_to_file(
        &mut self,
        file: SequenceNumber,
        method: SequenceNumber,
    ) -> Result<(), HookError> {
        self.require(file)?;
        self.require_method(method)?;
        self.edges.push(Edge {
            from: method,
            to: file,
            kind: EdgeKind::SourceFile,
        });
        Ok(())
    }

    fn attach_to_method(
        &mut self,
        method: SequenceNumber,
        vertex: SequenceNumber,
    ) -> Result<(), HookError> {
        self.require_method(method)?;
        self.add_child(method, vertex)
    }

    fn attach_under_parent(
        &mut self,
        method: SequenceNumber,
        vertex: SequenceNumber,
        parent: SequenceNumber,
    ) -> Result<(), HookError> {
        self.require_method(method)?;
        self.add_child(parent, vertex)
    }

    fn vertex_exists_at_sequence(&self, seq: SequenceNumber) -> bool {
        self.index.contains_key(&seq)
    }

    fn highest_allocated_sequence_number(&self) -> Option<SequenceNumber> {
        self.highest
    }
}

/// Indented rendering of the subtree under one vertex, one vertex per line.
pub struct TreeDump<'a> {
    graph: &'a MemoryGraph,
    root: SequenceNumber,
}

impl TreeDump<'_> {
    fn write_subtree(
        &self,
        f: &mut fmt::Formatter<'_>,
        seq: SequenceNumber,
        depth: usize,
    ) -> fmt::Result {
        match self.graph.vertex(seq) {
            Some(vertex) => writeln!(f, "{:indent$}{vertex}", "", indent = depth * 2)?,
            None => writeln!(f, "{:indent$}{seq} <missing>", "", indent = depth * 2)?,
        }
        for &child in self.graph.children(seq) {
            self.write_subtree(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for TreeDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_subtree(f, self.root, 0)
    }
}
