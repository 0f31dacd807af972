//! The graph sink interface. Everything the reconstruction produces leaves through a [`GraphHook`].

use crate::sequence::SequenceNumber;
use crate::vertex::Vertex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("No vertex with sequence number {0}")]
    UnknownVertex(SequenceNumber),

    #[error("Vertex {0} was already created")]
    DuplicateVertex(SequenceNumber),

    #[error("Vertex {0} is not a method")]
    NotAMethod(SequenceNumber),

    #[error("Vertex {child} is already attached under {parent}")]
    AlreadyAttached {
        child: SequenceNumber,
        parent: SequenceNumber,
    },

    #[error("Graph backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Receiver of vertices and edges.
///
/// Vertices are handed over fully formed and are never updated afterwards. The reconstruction only
/// ever asks whether a sequence number is known, never reads a vertex back.
pub trait GraphHook {
    fn create_vertex(&mut self, vertex: Vertex) -> Result<(), HookError>;

    fn link_file_to_namespace(
        &mut self,
        file: SequenceNumber,
        namespace: SequenceNumber,
    ) -> Result<(), HookError>;

    fn link_namespace_chain(
        &mut self,
        parent: SequenceNumber,
        child: SequenceNumber,
    ) -> Result<(), HookError>;

    fn link_method_to_file(
        &mut self,
        file: SequenceNumber,
        method: SequenceNumber,
    ) -> Result<(), HookError>;

    /// Attaches a top-level child (parameter, return, modifier, statement) to a method.
    fn attach_to_method(
        &mut self,
        method: SequenceNumber,
        vertex: SequenceNumber,
    ) -> Result<(), HookError>;

    /// Attaches `vertex` under `parent`, somewhere inside the body of `method`.
    fn attach_under_parent(
        &mut self,
        method: SequenceNumber,
        vertex: SequenceNumber,
        parent: SequenceNumber,
    ) -> Result<(), HookError>;

    fn vertex_exists_at_sequence(&self, seq: SequenceNumber) -> bool;

    fn highest_allocated_sequence_number(&self) -> Option<SequenceNumber>;
}

impl<H: GraphHook + ?Sized> GraphHook for &mut H {
    fn create_vertex(&mut self, vertex: Vertex) -> Result<(), HookError> {
        (**self).create_vertex(vertex)
    }

    fn link_file_to_namespace(
        &mut self,
        file: SequenceNumber,
        namespace: SequenceNumber,
    ) -> Result<(), HookError> {
        (**self).link_file_to_namespace(file, namespace)
    }

    fn link_namespace_chain(
        &mut self,
        parent: SequenceNumber,
        child: SequenceNumber,
    ) -> Result<(), HookError> {
        (**self).link_namespace_chain(parent, child)
    }

    fn link_method_to_file(
        &mut self,
        file: SequenceNumber,
        method: SequenceNumber,
    ) -> Result<(), HookError> {
        (**self).link_method_to_file(file, method)
    }

    fn attach_to_method(
        &mut self,
        method: SequenceNumber,
        vertex: SequenceNumber,
    ) -> Result<(), HookError> {
        (**self).attach_to_method(method, vertex)
    }

    fn attach_under_parent(
        &mut self,
        method: SequenceNumber,
        vertex: SequenceNumber,
        parent: SequenceNumber,
    ) -> Result<(), HookError> {
        (**self).attach_under_parent(method, vertex, parent)
    }

    fn vertex_exists_at_sequence(&self, seq: SequenceNumber) -> bool {
        (**self).vertex_exists_at_sequence(seq)
    }

    fn highest_allocated_sequence_number(&self) -> Option<SequenceNumber> {
        (**self).highest_allocated_sequence_number()
    }
}
