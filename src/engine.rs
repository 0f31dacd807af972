//! Reconstruction of expressions and if/else nesting from the instruction stream of one method.
//!
//! The engine simulates the operand stack to build expression trees, and keeps a nesting stack of
//! not-yet-closed control structures. Block structure is recovered from jump topology alone: a
//! conditional jump opens an `IF` whose body runs until its destination label, and an unconditional
//! jump at the end of such a body that skips further ahead marks the start of an else-body.
//!
//! Vertices are emitted to the [`GraphHook`] as soon as they are fully known. The hook is borrowed
//! per operation and never stored.

use crate::block::{BlockItem, Jump, JumpId, JumpKind, JumpRegistry, LabelId, Role};
use crate::hook::{GraphHook, HookError};
use crate::opcodes::{self, Comparator, ZeroOperand};
use crate::operand::{
    ConstantValue, Operand, OperandStack, Slot, SlotRetypedError, StackUnderflowError,
    VariableBindings,
};
use crate::sequence::{SequenceExhaustedError, SequenceNumber, Sequencer};
use crate::types::SemanticType;
use crate::vertex::{Vertex, VertexKind};
use log::trace;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    StackUnderflow(#[from] StackUnderflowError),

    #[error("Unknown opcode `{0}`")]
    UnknownOpcode(String),

    #[error("Jump to label {0} is never resolved")]
    UnresolvedJump(u32),

    #[error(transparent)]
    SlotRetyped(#[from] SlotRetypedError),

    #[error("Allocated sequence number {allocated}, but the sink already has {highest}")]
    SequenceRegression {
        allocated: SequenceNumber,
        highest: SequenceNumber,
    },

    #[error(transparent)]
    SequenceExhausted(#[from] SequenceExhaustedError),

    #[error("Graph sink failure: {0}")]
    Hook(#[from] HookError),
}

/// Statistics of a finished method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MethodSummary {
    pub vertices: usize,
    pub jumps: usize,
    pub variables: usize,
}

pub struct MethodEngine<'s> {
    sequencer: &'s Sequencer,
    method: SequenceNumber,
    stack: OperandStack,
    bindings: VariableBindings,
    nesting: Vec<BlockItem>,
    jumps: JumpRegistry,
    labels: FxHashMap<u32, LabelId>,
    raw_labels: Vec<u32>,
    visited: FxHashSet<LabelId>,
    line: Option<u32>,
    label: Option<LabelId>,
    emitted: usize,
}

impl<'s> MethodEngine<'s> {
    /// Starts reconstructing the body of the method whose vertex is `method`.
    pub fn new(sequencer: &'s Sequencer, method: SequenceNumber) -> Self {
        Self {
            sequencer,
            method,
            stack: OperandStack::default(),
            bindings: VariableBindings::default(),
            nesting: Vec::new(),
            jumps: JumpRegistry::default(),
            labels: FxHashMap::default(),
            raw_labels: Vec::new(),
            visited: FxHashSet::default(),
            line: None,
            label: None,
            emitted: 0,
        }
    }

    pub fn method(&self) -> SequenceNumber {
        self.method
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn nesting_depth(&self) -> usize {
        self.nesting.len()
    }

    fn intern(&mut self, raw: u32) -> LabelId {
        let next = LabelId(self.raw_labels.len() as u32);
        *self.labels.entry(raw).or_insert_with(|| {
            self.raw_labels.push(raw);
            next
        })
    }

    fn emit<H: GraphHook + ?Sized>(
        &mut self,
        hook: &mut H,
        parent: Option<SequenceNumber>,
        kind: VertexKind,
    ) -> Result<SequenceNumber, EngineError> {
        let seq = self.sequencer.next()?;
        if let Some(highest) = hook
            .highest_allocated_sequence_number()
            .filter(|&highest| highest >= seq)
        {
            return Err(EngineError::SequenceRegression {
                allocated: seq,
                highest,
            });
        }
        trace!("{seq} {kind} under {parent:?}");
        hook.create_vertex(Vertex {
            seq,
            line: self.line,
            kind,
        })?;
        match parent {
            Some(parent) => hook.attach_under_parent(self.method, seq, parent)?,
            None => hook.attach_to_method(self.method, seq)?,
        }
        self.emitted += 1;
        Ok(seq)
    }

    fn emit_block<H: GraphHook + ?Sized>(
        &mut self,
        hook: &mut H,
        parent: Option<SequenceNumber>,
        name: String,
        argument_index: u32,
        type_full_name: SemanticType,
    ) -> Result<SequenceNumber, EngineError> {
        self.emit(
            hook,
            parent,
            VertexKind::Block {
                name,
                argument_index,
                type_full_name,
            },
        )
    }

    /// The vertex new statements attach to: the innermost open structure, or the method root when
    /// there is none.
    fn parent_vertex<H: GraphHook + ?Sized>(
        &mut self,
        hook: &mut H,
    ) -> Result<Option<SequenceNumber>, EngineError> {
        self.parent_below(hook, self.nesting.len())
    }

    fn parent_below<H: GraphHook + ?Sized>(
        &mut self,
        hook: &mut H,
        depth: usize,
    ) -> Result<Option<SequenceNumber>, EngineError> {
        for index in (0..depth).rev() {
            match &self.nesting[index] {
                BlockItem::Assignment { vertex, .. } => return Ok(Some(*vertex)),
                BlockItem::ConditionalJump(jump)
                | BlockItem::UnconditionalJump(jump)
                | BlockItem::UnaryJump(jump) => {
                    if let Some(vertex) = self.jumps.get(*jump).vertex {
                        return Ok(Some(vertex));
                    }
                }
                BlockItem::NestedBody {
                    vertex: Some(vertex),
                    ..
                } if hook.vertex_exists_at_sequence(*vertex) => return Ok(Some(*vertex)),
                BlockItem::NestedBody { role, .. } => {
                    let role = *role;
                    return self.materialize(hook, index, role).map(Some);
                }
            }
        }
        Ok(None)
    }

    /// Emits the block vertex of the nested body at `index`, under whatever encloses it.
    fn materialize<H: GraphHook + ?Sized>(
        &mut self,
        hook: &mut H,
        index: usize,
        role: Role,
    ) -> Result<SequenceNumber, EngineError> {
        let parent = self.parent_below(hook, index)?;
        let vertex = self.emit_block(
            hook,
            parent,
            role.body_name().to_owned(),
            role.argument_index(),
            SemanticType::Void,
        )?;
        if let BlockItem::NestedBody { vertex: slot, .. } = &mut self.nesting[index] {
            *slot = Some(vertex);
        }
        Ok(vertex)
    }

    /// Emits `operand` under `parent` as a literal, a local reference, or an operator block with its
    /// operands below it.
    fn attach_operand<H: GraphHook + ?Sized>(
        &mut self,
        hook: &mut H,
        parent: SequenceNumber,
        operand: &Operand,
        argument_index: u32,
    ) -> Result<(), EngineError> {
        match operand {
            Operand::Constant { value, ty } => {
                self.emit(
                    hook,
                    Some(parent),
                    VertexKind::Literal {
                        value: value.clone(),
                        argument_index,
                        type_full_name: ty.clone(),
                    },
                )?;
            }
            Operand::Variable { slot, ty } => {
                self.emit(
                    hook,
                    Some(parent),
                    VertexKind::Local {
                        slot: *slot,
                        name: slot.to_string(),
                        type_full_name: ty.clone(),
                    },
                )?;
            }
            Operand::Operator { op, ty, operands } => {
                let vertex =
                    self.emit_block(hook, Some(parent), op.to_string(), argument_index, ty.clone())?;
                let [lhs, rhs] = &**operands;
                self.attach_operand(hook, vertex, lhs, 1)?;
                self.attach_operand(hook, vertex, rhs, 2)?;
            }
            Operand::Opaque { name, ty, operands } => {
                let vertex =
                    self.emit_block(hook, Some(parent), name.clone(), argument_index, ty.clone())?;
                for (index, operand) in (1..).zip(operands) {
                    self.attach_operand(hook, vertex, operand, index)?;
                }
            }
        }
        Ok(())
    }

    pub fn push_constant(&mut self, value: ConstantValue) {
        trace!("push {value:?}");
        self.stack.push(value.into_operand());
    }

    pub fn push_constant_opcode(&mut self, mnemonic: &str) -> Result<(), EngineError> {
        match opcodes::classify_zero_operand(mnemonic) {
            Some(ZeroOperand::Constant(value)) => self.push_constant(value),
            Some(ZeroOperand::Operator { op, ty }) => {
                let operands = self.stack.pop_pair()?;
                self.stack.push(Operand::Operator {
                    op,
                    ty,
                    operands: Box::new(operands),
                });
            }
            Some(ZeroOperand::Shuffle(shuffle)) => self.stack.shuffle(shuffle)?,
            Some(ZeroOperand::Opaque { pops, pushes }) => self.opaque(mnemonic, pops, pushes)?,
            Some(ZeroOperand::Unsupported) => trace!("ignoring {mnemonic}"),
            None => return Err(EngineError::UnknownOpcode(mnemonic.to_owned())),
        }
        Ok(())
    }

    /// An instruction whose semantics are not reconstructed but whose stack effect is known. A
    /// produced value keeps the consumed ones as its operands; without one they are dropped.
    pub fn opaque(
        &mut self,
        mnemonic: &str,
        pops: usize,
        pushes: Option<SemanticType>,
    ) -> Result<(), EngineError> {
        let operands = self.stack.pop_many(pops)?;
        match pushes {
            Some(ty) => self.stack.push(Operand::Opaque {
                name: mnemonic.to_owned(),
                ty,
                operands,
            }),
            None => trace!("dropping {} operands of {mnemonic}", operands.len()),
        }
        Ok(())
    }

    pub fn push_constant_immediate(
        &mut self,
        mnemonic: &str,
        immediate: i32,
    ) -> Result<(), EngineError> {
        let ty = opcodes::immediate_type(mnemonic)
            .ok_or_else(|| EngineError::UnknownOpcode(mnemonic.to_owned()))?;
        self.stack.push(Operand::Constant {
            value: immediate.to_string(),
            ty,
        });
        Ok(())
    }

    pub fn load(&mut self, slot: Slot, mnemonic: &str) -> Result<(), EngineError> {
        let ty = opcodes::load_type(mnemonic)
            .ok_or_else(|| EngineError::UnknownOpcode(mnemonic.to_owned()))?;
        let ty = self.bindings.resolve(slot, ty)?;
        self.stack.push(Operand::Variable { slot, ty });
        Ok(())
    }

    pub fn store<H: GraphHook + ?Sized>(
        &mut self,
        hook: &mut H,
        slot: Slot,
        mnemonic: &str,
    ) -> Result<(), EngineError> {
        let ty = opcodes::store_type(mnemonic)
            .ok_or_else(|| EngineError::UnknownOpcode(mnemonic.to_owned()))?;
        let value = self.stack.pop()?;
        let ty = self.bindings.resolve(slot, ty)?;

        let parent = self.parent_vertex(hook)?;
        let vertex = self.emit_block(hook, parent, "STORE".to_owned(), 0, ty.clone())?;
        let left = Operand::Variable { slot, ty };
        self.nesting.push(BlockItem::Assignment {
            left: left.clone(),
            right: value.clone(),
            label: self.label,
            vertex,
        });
        self.attach_operand(hook, vertex, &left, 1)?;
        self.attach_operand(hook, vertex, &value, 2)?;
        self.nesting.pop();
        Ok(())
    }

    pub fn visit_label<H: GraphHook + ?Sized>(
        &mut self,
        hook: &mut H,
        line: Option<u32>,
        raw: u32,
    ) -> Result<(), EngineError> {
        let label = self.intern(raw);
        if line.is_some() {
            self.line = line;
        }
        self.label = Some(label);
        self.visited.insert(label);

        if self.jumps.is_destination(label) {
            self.resolve_destination(label);
        }

        let awaiting = match self.nesting.last() {
            Some(BlockItem::NestedBody { role, vertex, .. })
                if vertex.is_none_or(|vertex| !hook.vertex_exists_at_sequence(vertex)) =>
            {
                Some(*role)
            }
            _ => None,
        };
        if let Some(role) = awaiting {
            self.materialize(hook, self.nesting.len() - 1, role)?;
        }
        Ok(())
    }

    /// Closes every construct that ends at `label`, innermost first. Reaching the end of the body of
    /// an `if` that has an else-branch opens that else-body instead.
    fn resolve_destination(&mut self, label: LabelId) {
        loop {
            let Some((index, jump)) = self.nesting.iter().enumerate().rev().find_map(|(i, item)| {
                item.pending_jump()
                    .filter(|&jump| self.jumps.get(jump).destination == label)
                    .map(|jump| (i, jump))
            }) else {
                return;
            };
            trace!("{label} closes jump at depth {index}");
            self.nesting.truncate(index);

            let resolved = self.jumps.get(jump);
            let if_vertex = resolved.vertex;
            let over_else = match (resolved.kind, resolved.role) {
                (JumpKind::Conditional, Role::IfRoot) => self.jumps.else_of(jump),
                _ => None,
            };
            let Some(over_else) = over_else else {
                continue;
            };
            // The else-body already ended, e.g. it was empty or the jump left a loop.
            if self.visited.contains(&self.jumps.get(over_else).destination) {
                continue;
            }
            let else_jump = self.jumps.get_mut(over_else);
            else_jump.role = Role::ElseBody;
            else_jump.vertex = if_vertex;
            self.nesting.push(BlockItem::UnconditionalJump(over_else));
            self.nesting.push(BlockItem::NestedBody {
                role: Role::ElseBody,
                label: Some(label),
                vertex: None,
            });
            return;
        }
    }

    /// Index and id of the innermost jump still waiting for its destination.
    fn nearest_pending_jump(&self) -> Option<(usize, JumpId)> {
        self.nesting
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, item)| item.pending_jump().map(|jump| (index, jump)))
    }

    pub fn conditional_jump<H: GraphHook + ?Sized>(
        &mut self,
        hook: &mut H,
        mnemonic: &str,
        raw_destination: u32,
    ) -> Result<(), EngineError> {
        let comparator = Comparator::from_binary_jump(mnemonic)
            .ok_or_else(|| EngineError::UnknownOpcode(mnemonic.to_owned()))?;
        let [left, right] = self.stack.pop_pair()?;

        let parent = self.parent_vertex(hook)?;
        let if_vertex = self.emit_block(hook, parent, "IF".to_owned(), 0, SemanticType::Void)?;
        let condition = self.emit_block(
            hook,
            Some(if_vertex),
            comparator.negate().to_string(),
            1,
            SemanticType::Boolean,
        )?;
        self.attach_operand(hook, condition, &left, 1)?;
        self.attach_operand(hook, condition, &right, 2)?;

        let destination = self.intern(raw_destination);
        let jump = self.jumps.register(Jump {
            kind: JumpKind::Conditional,
            origin: self.label,
            destination,
            role: Role::IfRoot,
            vertex: Some(if_vertex),
        });
        if self.visited.contains(&destination) {
            // Loop condition; the body precedes the jump and is already emitted.
            trace!("backward conditional jump to {destination}");
            return Ok(());
        }
        self.nesting.push(BlockItem::ConditionalJump(jump));
        self.nesting.push(BlockItem::NestedBody {
            role: Role::IfBody,
            label: self.label,
            vertex: None,
        });
        Ok(())
    }

    /// The conditional jump whose else-body a forward `goto` to `destination` skips: the innermost
    /// unpaired one that ends elsewhere. A pending single-operand jump stops the search when it ends
    /// at its own label, since the `goto` then closes its branch. One that shares its label with an
    /// enclosing jump is part of a chained condition and is looked through.
    fn else_candidate(&self, destination: LabelId) -> Option<JumpId> {
        let pending: Vec<JumpId> = self
            .nesting
            .iter()
            .filter_map(BlockItem::pending_jump)
            .collect();
        for (depth, &id) in pending.iter().enumerate().rev() {
            let jump = self.jumps.get(id);
            match jump.kind {
                JumpKind::Unary => {
                    let chained = jump.destination == destination
                        || pending[..depth]
                            .iter()
                            .any(|&outer| self.jumps.get(outer).destination == jump.destination);
                    if !chained {
                        return None;
                    }
                }
                JumpKind::Conditional
                    if jump.destination != destination && !self.jumps.is_paired(id) =>
                {
                    return Some(id);
                }
                JumpKind::Conditional | JumpKind::Unconditional => {}
            }
        }
        None
    }

    pub fn unconditional_jump(&mut self, raw_destination: u32) {
        let destination = self.intern(raw_destination);
        let backward = self.visited.contains(&destination);
        let role = self
            .nearest_pending_jump()
            .map_or(Role::IfRoot, |(_, jump)| self.jumps.get(jump).role);
        let jump = self.jumps.register(Jump {
            kind: JumpKind::Unconditional,
            origin: self.label,
            destination,
            role,
            vertex: None,
        });

        if !backward {
            if let Some(conditional) = self.else_candidate(destination) {
                trace!("{destination} jumps over the else-body of a jump at {:?}", self.label);
                self.jumps.pair(conditional, jump);
            }
        }

        match self.nearest_pending_jump() {
            Some((index, pending)) => {
                self.nesting.truncate(index + 1);
                let pending = self.jumps.get(pending);
                if !backward
                    && pending.kind != JumpKind::Unary
                    && pending.destination != destination
                {
                    self.nesting.push(BlockItem::NestedBody {
                        role: Role::ElseBody,
                        label: self.label,
                        vertex: None,
                    });
                }
            }
            None => self.nesting.clear(),
        }
    }

    /// Single-operand comparisons are not reconstructed, but the code they guard is still nested
    /// until their destination so that jumps inside it pair correctly.
    pub fn unary_jump(&mut self, mnemonic: &str, raw_destination: u32) -> Result<(), EngineError> {
        Comparator::from_unary_jump(mnemonic)
            .ok_or_else(|| EngineError::UnknownOpcode(mnemonic.to_owned()))?;
        self.stack.pop()?;
        let destination = self.intern(raw_destination);
        let jump = self.jumps.register(Jump {
            kind: JumpKind::Unary,
            origin: self.label,
            destination,
            role: Role::IfRoot,
            vertex: None,
        });
        if self.visited.contains(&destination) {
            trace!("backward {mnemonic} to {destination}");
        } else {
            self.nesting.push(BlockItem::UnaryJump(jump));
        }
        Ok(())
    }

    pub fn unsupported(&mut self, mnemonic: &str) {
        trace!("unsupported instruction {mnemonic}");
    }

    /// Checks that every construct was closed.
    pub fn finish(self) -> Result<MethodSummary, EngineError> {
        if let Some(jump) = self.nesting.iter().find_map(BlockItem::pending_jump) {
            let destination = self.jumps.get(jump).destination;
            return Err(EngineError::UnresolvedJump(
                self.raw_labels[destination.0 as usize],
            ));
        }
        Ok(MethodSummary {
            vertices: self.emitted,
            jumps: self.jumps.len(),
            variables: self.bindings.len(),
        })
    }
}
