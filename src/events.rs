use crate::access::{ClassAccessFlags, MethodAccessFlags};
use crate::operand::{ConstantValue, Slot};
use crate::types::SemanticType;
use noak::MStr;
use noak::error::DecodeError;

/// Consumer of a class file's contents, delivered as events in program order.
///
/// Labels are opaque program points. A label event precedes the instructions at that point; jumps
/// refer to the same label values. Every method body starts with a label.
pub trait InstructionVisitor {
    type Error: From<DecodeError>;

    fn class_begin(
        &mut self,
        name: &str,
        super_name: Option<&str>,
        access: ClassAccessFlags,
    ) -> Result<(), Self::Error>;

    /// `line` is the first source line of the method, when known.
    fn method_begin(
        &mut self,
        name: &str,
        descriptor: &MStr,
        access: MethodAccessFlags,
        line: Option<u32>,
    ) -> Result<(), Self::Error>;

    fn line_and_label(&mut self, line: Option<u32>, label: u32) -> Result<(), Self::Error>;

    /// A literal from the constant pool.
    fn constant(&mut self, value: ConstantValue) -> Result<(), Self::Error>;

    /// An instruction without operands: a built-in constant or an operator.
    fn constant_opcode(&mut self, mnemonic: &str) -> Result<(), Self::Error>;

    fn constant_immediate(&mut self, mnemonic: &str, immediate: i32) -> Result<(), Self::Error>;

    fn variable_load(&mut self, slot: Slot, mnemonic: &str) -> Result<(), Self::Error>;

    fn variable_store(&mut self, slot: Slot, mnemonic: &str) -> Result<(), Self::Error>;

    /// A two-operand comparison jump.
    fn conditional_jump(&mut self, mnemonic: &str, label: u32) -> Result<(), Self::Error>;

    fn unconditional_jump(&mut self, label: u32) -> Result<(), Self::Error>;

    /// A comparison of a single operand against zero or `null`.
    fn unary_jump(&mut self, mnemonic: &str, label: u32) -> Result<(), Self::Error>;

    /// An instruction that is not reconstructed but whose stack effect is known: it consumes `pops`
    /// operands, whatever their width, and produces a value of type `pushes`, if any.
    fn opaque(
        &mut self,
        mnemonic: &str,
        pops: usize,
        pushes: Option<SemanticType>,
    ) -> Result<(), Self::Error>;

    /// An instruction or construct with no reconstruction, e.g. a switch.
    fn unsupported(&mut self, mnemonic: &str) -> Result<(), Self::Error>;

    fn method_end(&mut self) -> Result<(), Self::Error>;

    fn class_end(&mut self) -> Result<(), Self::Error>;
}
