use crate::operand::Slot;
use crate::sequence::SequenceNumber;
use crate::types::{EvaluationStrategy, SemanticType, TypeCategory};
use core::fmt;
use displaydoc::Display;

/// A node of the output graph. Created exactly once, never mutated after emission.
#[derive(Clone, Debug, PartialEq)]
pub struct Vertex {
    pub seq: SequenceNumber,
    pub line: Option<u32>,
    pub kind: VertexKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum VertexKind {
    File {
        name: String,
    },
    NamespaceBlock {
        name: String,
        full_name: String,
    },
    Method {
        name: String,
        // `Class.name:descriptor`, unique among the methods of a run.
        full_name: String,
        signature: String,
    },
    MethodParameterIn {
        index: usize,
        name: String,
        type_full_name: SemanticType,
        type_label: TypeCategory,
        evaluation_strategy: EvaluationStrategy,
        signature: String,
    },
    MethodReturn {
        type_full_name: SemanticType,
        evaluation_strategy: EvaluationStrategy,
    },
    Modifier {
        modifier: ModifierKind,
    },
    Block {
        name: String,
        argument_index: u32,
        type_full_name: SemanticType,
    },
    Local {
        slot: Slot,
        name: String,
        type_full_name: SemanticType,
    },
    Literal {
        value: String,
        argument_index: u32,
        type_full_name: SemanticType,
    },
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    /// CONSTRUCTOR
    Constructor,
    /// STATIC
    Static,
    /// PUBLIC
    Public,
    /// PROTECTED
    Protected,
    /// PRIVATE
    Private,
    /// ABSTRACT
    Abstract,
    /// NATIVE
    Native,
    /// VIRTUAL
    Virtual,
}

impl VertexKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::File { .. } => "FILE",
            Self::NamespaceBlock { .. } => "NAMESPACE_BLOCK",
            Self::Method { .. } => "METHOD",
            Self::MethodParameterIn { .. } => "METHOD_PARAMETER_IN",
            Self::MethodReturn { .. } => "METHOD_RETURN",
            Self::Modifier { .. } => "MODIFIER",
            Self::Block { .. } => "BLOCK",
            Self::Local { .. } => "LOCAL",
            Self::Literal { .. } => "LITERAL",
        }
    }

    /// The type the vertex evaluates to, if it has one.
    pub fn type_full_name(&self) -> Option<&SemanticType> {
        match self {
            Self::MethodParameterIn { type_full_name, .. }
            | Self::MethodReturn { type_full_name, .. }
            | Self::Block { type_full_name, .. }
            | Self::Local { type_full_name, .. }
            | Self::Literal { type_full_name, .. } => Some(type_full_name),
            Self::File { .. }
            | Self::NamespaceBlock { .. }
            | Self::Method { .. }
            | Self::Modifier { .. } => None,
        }
    }

    pub fn argument_index(&self) -> Option<u32> {
        match self {
            Self::Block { argument_index, .. } | Self::Literal { argument_index, .. } => {
                Some(*argument_index)
            }
            _ => None,
        }
    }
}

impl fmt::Display for VertexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { name } => write!(f, "FILE {name}"),
            Self::NamespaceBlock { full_name, .. } => write!(f, "NAMESPACE_BLOCK {full_name}"),
            Self::Method { full_name, .. } => write!(f, "METHOD {full_name}"),
            Self::MethodParameterIn {
                index,
                name,
                type_full_name,
                evaluation_strategy,
                ..
            } => write!(
                f,
                "METHOD_PARAMETER_IN {index} {name}: {type_full_name} {evaluation_strategy}"
            ),
            Self::MethodReturn {
                type_full_name,
                evaluation_strategy,
            } => write!(f, "METHOD_RETURN {type_full_name} {evaluation_strategy}"),
            Self::Modifier { modifier } => write!(f, "MODIFIER {modifier}"),
            Self::Block {
                name,
                argument_index,
                type_full_name,
            } => write!(f, "BLOCK {name} @{argument_index}: {type_full_name}"),
            Self::Local {
                name,
                type_full_name,
                ..
            } => write!(f, "LOCAL {name}: {type_full_name}"),
            Self::Literal {
                value,
                argument_index,
                type_full_name,
            } => write!(f, "LITERAL {value} @{argument_index}: {type_full_name}"),
        }
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.seq, self.kind)?;
        if let Some(line) = self.line {
            write!(f, " (line {line})")?;
        }
        Ok(())
    }
}
