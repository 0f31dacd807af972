use crate::operand::Operand;
use crate::sequence::SequenceNumber;
use core::fmt;
use displaydoc::Display;
use rustc_hash::{FxHashMap, FxHashSet};

/// A jump destination, interned per method at first sight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Index into the [`JumpRegistry`] of the current method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JumpId(u32);

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Role {
    /// IF_ROOT
    IfRoot,
    /// IF_BODY
    IfBody,
    /// ELSE_BODY
    ElseBody,
}

impl Role {
    /// Name of the block vertex that groups the statements of a body with this role.
    pub fn body_name(self) -> &'static str {
        match self {
            Self::IfRoot => "IF",
            Self::IfBody => "IF_BODY",
            Self::ElseBody => "ELSE_BODY",
        }
    }

    pub fn argument_index(self) -> u32 {
        match self {
            Self::IfRoot => 0,
            Self::IfBody => 2,
            Self::ElseBody => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JumpKind {
    Conditional,
    Unconditional,
    /// A comparison against zero or `null`. Tracked for nesting, but emits no vertices.
    Unary,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Jump {
    pub kind: JumpKind,
    pub origin: Option<LabelId>,
    pub destination: LabelId,
    pub role: Role,
    // The `IF` vertex of the construct the jump belongs to, if any.
    pub vertex: Option<SequenceNumber>,
}

/// An entry of the nesting stack.
#[derive(Clone, Debug, PartialEq)]
pub enum BlockItem {
    Assignment {
        left: Operand,
        right: Operand,
        label: Option<LabelId>,
        vertex: SequenceNumber,
    },
    ConditionalJump(JumpId),
    UnconditionalJump(JumpId),
    UnaryJump(JumpId),
    NestedBody {
        role: Role,
        label: Option<LabelId>,
        // Materialized lazily, once the body gets its first child or its first label.
        vertex: Option<SequenceNumber>,
    },
}

impl BlockItem {
    pub fn pending_jump(&self) -> Option<JumpId> {
        match self {
            Self::ConditionalJump(jump) | Self::UnconditionalJump(jump) | Self::UnaryJump(jump) => {
                Some(*jump)
            }
            Self::Assignment { .. } | Self::NestedBody { .. } => None,
        }
    }
}

/// Every jump created for one method. Jumps are never removed, only popped off the nesting stack.
#[derive(Debug, Default)]
pub struct JumpRegistry {
    jumps: Vec<Jump>,
    destinations: FxHashSet<LabelId>,
    else_pairs: FxHashMap<JumpId, JumpId>,
}

impl JumpRegistry {
    pub fn register(&mut self, jump: Jump) -> JumpId {
        let id = JumpId(self.jumps.len() as u32);
        self.destinations.insert(jump.destination);
        self.jumps.push(jump);
        id
    }

    pub fn get(&self, id: JumpId) -> &Jump {
        &self.jumps[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: JumpId) -> &mut Jump {
        &mut self.jumps[id.0 as usize]
    }

    pub fn is_destination(&self, label: LabelId) -> bool {
        self.destinations.contains(&label)
    }

    /// Records that `unconditional` jumps over the else-body of `conditional`. A conditional jump is
    /// paired at most once; returns `false` if it already was.
    pub fn pair(&mut self, conditional: JumpId, unconditional: JumpId) -> bool {
        if self.else_pairs.contains_key(&conditional) {
            return false;
        }
        self.else_pairs.insert(conditional, unconditional);
        true
    }

    pub fn else_of(&self, conditional: JumpId) -> Option<JumpId> {
        self.else_pairs.get(&conditional).copied()
    }

    pub fn is_paired(&self, conditional: JumpId) -> bool {
        self.else_pairs.contains_key(&conditional)
    }

    pub fn len(&self) -> usize {
        self.jumps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jumps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jump(kind: JumpKind, destination: u32) -> Jump {
        Jump {
            kind,
            origin: None,
            destination: LabelId(destination),
            role: Role::IfRoot,
            vertex: None,
        }
    }

    #[test]
    fn registry_tracks_destinations() {
        let mut registry = JumpRegistry::default();
        assert!(registry.is_empty());
        let first = registry.register(jump(JumpKind::Conditional, 3));
        let second = registry.register(jump(JumpKind::Unconditional, 7));
        assert_ne!(first, second);
        assert_eq!(registry.len(), 2);
        assert!(registry.is_destination(LabelId(3)));
        assert!(registry.is_destination(LabelId(7)));
        assert!(!registry.is_destination(LabelId(5)));
        assert_eq!(registry.get(second).kind, JumpKind::Unconditional);
    }

    #[test]
    fn conditional_is_paired_once() {
        let mut registry = JumpRegistry::default();
        let conditional = registry.register(jump(JumpKind::Conditional, 1));
        let over_else = registry.register(jump(JumpKind::Unconditional, 2));
        let another = registry.register(jump(JumpKind::Unconditional, 4));
        assert!(!registry.is_paired(conditional));
        assert!(registry.pair(conditional, over_else));
        assert!(!registry.pair(conditional, another));
        assert_eq!(registry.else_of(conditional), Some(over_else));
        assert_eq!(registry.else_of(over_else), None);
    }

    #[test]
    fn only_jumps_are_pending() {
        let mut registry = JumpRegistry::default();
        let id = registry.register(jump(JumpKind::Conditional, 1));
        assert_eq!(BlockItem::ConditionalJump(id).pending_jump(), Some(id));
        let unary = registry.register(jump(JumpKind::Unary, 2));
        assert_eq!(BlockItem::UnaryJump(unary).pending_jump(), Some(unary));
        let body = BlockItem::NestedBody {
            role: Role::IfBody,
            label: None,
            vertex: None,
        };
        assert_eq!(body.pending_jump(), None);
        assert_eq!(Role::ElseBody.to_string(), "ELSE_BODY");
        assert_eq!(Role::IfBody.body_name(), "IF_BODY");
    }
}
