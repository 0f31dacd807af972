use crate::opcodes::{BinOp, StackShuffle};
use crate::types::SemanticType;
use core::fmt;
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use thiserror::Error;

/// A numbered local variable storage location in a method's frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(pub u16);

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot{}", self.0)
    }
}

/// A value on the simulated operand stack. Mirrors the shape of the JVM stack, not its contents.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Constant {
        value: String,
        ty: SemanticType,
    },
    Variable {
        slot: Slot,
        ty: SemanticType,
    },
    // Operators take ownership of the operands they consumed, so expanding one never has to look
    // at the stack again.
    Operator {
        op: BinOp,
        ty: SemanticType,
        operands: Box<[Operand; 2]>,
    },
    /// The result of an instruction that is not reconstructed, e.g. a call or a field read, with the
    /// values it consumed.
    Opaque {
        name: String,
        ty: SemanticType,
        operands: Vec<Operand>,
    },
}

impl Operand {
    pub fn ty(&self) -> &SemanticType {
        match self {
            Self::Constant { ty, .. }
            | Self::Variable { ty, .. }
            | Self::Operator { ty, .. }
            | Self::Opaque { ty, .. } => ty,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant { value, .. } => write!(f, "{value}"),
            Self::Variable { slot, .. } => write!(f, "{slot}"),
            Self::Operator { op, operands, .. } => {
                let [lhs, rhs] = &**operands;
                write!(f, "({lhs}) {op} ({rhs})")
            }
            Self::Opaque { name, operands, .. } => {
                write!(f, "{name}(")?;
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{operand}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A literal decoded from the constant pool or an instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    // Internal name, e.g. `java/lang/String`.
    Class(String),
    Null,
}

impl ConstantValue {
    pub fn semantic_type(&self) -> SemanticType {
        match self {
            Self::Int(_) => SemanticType::Int,
            Self::Long(_) => SemanticType::Long,
            Self::Float(_) => SemanticType::Float,
            Self::Double(_) => SemanticType::Double,
            Self::String(_) => SemanticType::Reference("java.lang.String".to_owned()),
            Self::Class(_) => SemanticType::Reference("java.lang.Class".to_owned()),
            Self::Null => SemanticType::object(),
        }
    }

    /// Source-like rendering of the literal.
    pub fn text(&self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Long(n) => n.to_string(),
            // Debug keeps the trailing `.0` on whole numbers.
            Self::Float(n) => format!("{n:?}"),
            Self::Double(n) => format!("{n:?}"),
            Self::String(s) => format!("{s:?}"),
            Self::Class(name) => format!("{}.class", name.replace('/', ".")),
            Self::Null => "null".to_owned(),
        }
    }

    pub fn into_operand(self) -> Operand {
        Operand::Constant {
            ty: self.semantic_type(),
            value: self.text(),
        }
    }
}

#[derive(Debug, Error)]
#[error("Stack underflow")]
pub struct StackUnderflowError;

#[derive(Debug, Default)]
pub struct OperandStack {
    values: Vec<Operand>,
}

impl OperandStack {
    pub fn push(&mut self, value: Operand) {
        self.values.push(value);
    }

    pub fn pop(&mut self) -> Result<Operand, StackUnderflowError> {
        self.values.pop().ok_or(StackUnderflowError)
    }

    /// Pops two values and returns them in the order they were pushed.
    pub fn pop_pair(&mut self) -> Result<[Operand; 2], StackUnderflowError> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        Ok([lhs, rhs])
    }

    /// Pops `count` values and returns them in the order they were pushed. Leaves the stack alone if
    /// there are fewer.
    pub fn pop_many(&mut self, count: usize) -> Result<Vec<Operand>, StackUnderflowError> {
        let start = self
            .values
            .len()
            .checked_sub(count)
            .ok_or(StackUnderflowError)?;
        Ok(self.values.split_off(start))
    }

    /// Pops values covering exactly `words` stack words. Splitting a `long` or `double` is treated
    /// as an underflow.
    fn pop_words(&mut self, words: usize) -> Result<Vec<Operand>, StackUnderflowError> {
        let mut start = self.values.len();
        let mut taken = 0;
        while taken < words {
            start = start.checked_sub(1).ok_or(StackUnderflowError)?;
            taken += self.values[start].ty().width();
        }
        if taken != words {
            return Err(StackUnderflowError);
        }
        Ok(self.values.split_off(start))
    }

    pub fn shuffle(&mut self, shuffle: StackShuffle) -> Result<(), StackUnderflowError> {
        match shuffle {
            StackShuffle::Pop { words } => {
                self.pop_words(words)?;
            }
            StackShuffle::Dup { words, under } => {
                let top = self.pop_words(words)?;
                let below = self.pop_words(under)?;
                self.values.extend(top.iter().cloned());
                self.values.extend(below);
                self.values.extend(top);
            }
            StackShuffle::Swap => {
                let [lhs, rhs] = self.pop_pair()?;
                self.values.push(rhs);
                self.values.push(lhs);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Error)]
#[error("{slot} was first used as `{first}`, now as `{now}`")]
pub struct SlotRetypedError {
    pub slot: Slot,
    pub first: SemanticType,
    pub now: SemanticType,
}

/// Slot bindings of one method. A slot is bound on first load or store and keeps that type.
#[derive(Debug, Default)]
pub struct VariableBindings {
    slots: FxHashMap<Slot, SemanticType>,
}

impl VariableBindings {
    pub fn resolve(&mut self, slot: Slot, ty: SemanticType) -> Result<SemanticType, SlotRetypedError> {
        match self.slots.entry(slot) {
            Entry::Occupied(entry) => {
                let first = entry.get();
                if first.is_compatible_with(&ty) {
                    Ok(first.clone())
                } else {
                    Err(SlotRetypedError {
                        slot,
                        first: first.clone(),
                        now: ty,
                    })
                }
            }
            Entry::Vacant(entry) => Ok(entry.insert(ty).clone()),
        }
    }

    pub fn get(&self, slot: Slot) -> Option<&SemanticType> {
        self.slots.get(&slot)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
