//! Opcode mnemonic classification: which instructions denote constants, operators and comparisons,
//! and what type each one implies.

use crate::operand::ConstantValue;
use crate::types::SemanticType;
use core::fmt::{self, Display};
use displaydoc::Display;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    UnsignedShr,
    Compare,
}

impl Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Sub => write!(f, "-"),
            Self::Mul => write!(f, "*"),
            Self::Div => write!(f, "/"),
            Self::Rem => write!(f, "%"),
            Self::And => write!(f, "&"),
            Self::Or => write!(f, "|"),
            Self::Xor => write!(f, "^"),
            Self::Shl => write!(f, "<<"),
            Self::Shr => write!(f, ">>"),
            Self::UnsignedShr => write!(f, ">>>"),
            Self::Compare => write!(f, "<=>"),
        }
    }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// ==
    Eq,
    /// !=
    Ne,
    /// <
    Lt,
    /// >=
    Ge,
    /// >
    Gt,
    /// <=
    Le,
}

impl Comparator {
    pub const ALL: [Comparator; 6] = [
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Ge,
        Self::Gt,
        Self::Le,
    ];

    /// Logical negation. Bytecode encodes the condition under which the body is *skipped*, so the
    /// source-level condition guarding the body is the negation of the jump's comparator.
    pub fn negate(self) -> Self {
        match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Lt => Self::Ge,
            Self::Ge => Self::Lt,
            Self::Gt => Self::Le,
            Self::Le => Self::Gt,
        }
    }

    /// Two-operand comparisons, `if_icmp*` and `if_acmp*`.
    pub fn from_binary_jump(mnemonic: &str) -> Option<Self> {
        Some(match mnemonic {
            "if_icmpeq" | "if_acmpeq" => Self::Eq,
            "if_icmpne" | "if_acmpne" => Self::Ne,
            "if_icmplt" => Self::Lt,
            "if_icmpge" => Self::Ge,
            "if_icmpgt" => Self::Gt,
            "if_icmple" => Self::Le,
            _ => return None,
        })
    }

    /// Single-operand comparisons against zero or `null`.
    pub fn from_unary_jump(mnemonic: &str) -> Option<Self> {
        Some(match mnemonic {
            "ifeq" | "ifnull" => Self::Eq,
            "ifne" | "ifnonnull" => Self::Ne,
            "iflt" => Self::Lt,
            "ifge" => Self::Ge,
            "ifgt" => Self::Gt,
            "ifle" => Self::Le,
            _ => return None,
        })
    }
}

/// Stack manipulation instructions. Sizes are in stack words, so `long` and `double` values count
/// twice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackShuffle {
    Pop { words: usize },
    /// Copies the top `words` and inserts the copy below the `under` words beneath them.
    Dup { words: usize, under: usize },
    Swap,
}

/// What an instruction without operands does to the stack.
#[derive(Clone, Debug, PartialEq)]
pub enum ZeroOperand {
    Constant(ConstantValue),
    Operator { op: BinOp, ty: SemanticType },
    Shuffle(StackShuffle),
    /// Consumes `pops` values and, unless it's a statement, produces one value the reconstruction
    /// cannot see into.
    Opaque {
        pops: usize,
        pushes: Option<SemanticType>,
    },
    // Recognized, but not reconstructed. Negations pop one value and push one of the same type, so
    // ignoring them keeps the stack shape intact.
    Unsupported,
}

/// The type implied by the one-letter prefix of arithmetic and slot access mnemonics.
fn prefix_type(mnemonic: &str) -> Option<SemanticType> {
    Some(match mnemonic.as_bytes().first()? {
        b'i' => SemanticType::Int,
        b'l' => SemanticType::Long,
        b'f' => SemanticType::Float,
        b'd' => SemanticType::Double,
        b'a' => SemanticType::object(),
        _ => return None,
    })
}

fn arithmetic(mnemonic: &str, op: BinOp) -> Option<ZeroOperand> {
    Some(ZeroOperand::Operator {
        op,
        ty: prefix_type(mnemonic)?,
    })
}

pub fn classify_zero_operand(mnemonic: &str) -> Option<ZeroOperand> {
    let constant = |value| Some(ZeroOperand::Constant(value));
    match mnemonic {
        "aconst_null" => constant(ConstantValue::Null),
        "iconst_m1" => constant(ConstantValue::Int(-1)),
        "iconst_0" => constant(ConstantValue::Int(0)),
        "iconst_1" => constant(ConstantValue::Int(1)),
        "iconst_2" => constant(ConstantValue::Int(2)),
        "iconst_3" => constant(ConstantValue::Int(3)),
        "iconst_4" => constant(ConstantValue::Int(4)),
        "iconst_5" => constant(ConstantValue::Int(5)),
        "lconst_0" => constant(ConstantValue::Long(0)),
        "lconst_1" => constant(ConstantValue::Long(1)),
        "fconst_0" => constant(ConstantValue::Float(0.0)),
        "fconst_1" => constant(ConstantValue::Float(1.0)),
        "fconst_2" => constant(ConstantValue::Float(2.0)),
        "dconst_0" => constant(ConstantValue::Double(0.0)),
        "dconst_1" => constant(ConstantValue::Double(1.0)),

        "iadd" | "ladd" | "fadd" | "dadd" => arithmetic(mnemonic, BinOp::Add),
        "isub" | "lsub" | "fsub" | "dsub" => arithmetic(mnemonic, BinOp::Sub),
        "imul" | "lmul" | "fmul" | "dmul" => arithmetic(mnemonic, BinOp::Mul),
        "idiv" | "ldiv" | "fdiv" | "ddiv" => arithmetic(mnemonic, BinOp::Div),
        "irem" | "lrem" | "frem" | "drem" => arithmetic(mnemonic, BinOp::Rem),
        "iand" | "land" => arithmetic(mnemonic, BinOp::And),
        "ior" | "lor" => arithmetic(mnemonic, BinOp::Or),
        "ixor" | "lxor" => arithmetic(mnemonic, BinOp::Xor),
        "ishl" | "lshl" => arithmetic(mnemonic, BinOp::Shl),
        "ishr" | "lshr" => arithmetic(mnemonic, BinOp::Shr),
        "iushr" | "lushr" => arithmetic(mnemonic, BinOp::UnsignedShr),
        "lcmp" | "fcmpl" | "fcmpg" | "dcmpl" | "dcmpg" => Some(ZeroOperand::Operator {
            op: BinOp::Compare,
            ty: SemanticType::Int,
        }),

        "ineg" | "lneg" | "fneg" | "dneg" => Some(ZeroOperand::Unsupported),
        "i2l" | "i2f" | "i2d" | "l2i" | "l2f" | "l2d" | "f2i" | "f2l" | "f2d" | "d2i" | "d2l"
        | "d2f" | "i2b" | "i2c" | "i2s" => opaque(1, conversion_target(mnemonic)),

        "pop" => shuffle(StackShuffle::Pop { words: 1 }),
        "pop2" => shuffle(StackShuffle::Pop { words: 2 }),
        "dup" => shuffle(StackShuffle::Dup { words: 1, under: 0 }),
        "dup_x1" => shuffle(StackShuffle::Dup { words: 1, under: 1 }),
        "dup_x2" => shuffle(StackShuffle::Dup { words: 1, under: 2 }),
        "dup2" => shuffle(StackShuffle::Dup { words: 2, under: 0 }),
        "dup2_x1" => shuffle(StackShuffle::Dup { words: 2, under: 1 }),
        "dup2_x2" => shuffle(StackShuffle::Dup { words: 2, under: 2 }),
        "swap" => shuffle(StackShuffle::Swap),

        "iaload" => opaque(2, Some(SemanticType::Int)),
        "laload" => opaque(2, Some(SemanticType::Long)),
        "faload" => opaque(2, Some(SemanticType::Float)),
        "daload" => opaque(2, Some(SemanticType::Double)),
        "aaload" => opaque(2, Some(SemanticType::object())),
        "baload" => opaque(2, Some(SemanticType::Byte)),
        "caload" => opaque(2, Some(SemanticType::Char)),
        "saload" => opaque(2, Some(SemanticType::Short)),
        "iastore" | "lastore" | "fastore" | "dastore" | "aastore" | "bastore" | "castore"
        | "sastore" => opaque(3, None),
        "arraylength" => opaque(1, Some(SemanticType::Int)),
        "ireturn" | "lreturn" | "freturn" | "dreturn" | "areturn" | "athrow" | "monitorenter"
        | "monitorexit" => opaque(1, None),
        "return" | "nop" => Some(ZeroOperand::Unsupported),
        _ => None,
    }
}

fn shuffle(shuffle: StackShuffle) -> Option<ZeroOperand> {
    Some(ZeroOperand::Shuffle(shuffle))
}

fn opaque(pops: usize, pushes: Option<SemanticType>) -> Option<ZeroOperand> {
    Some(ZeroOperand::Opaque { pops, pushes })
}

/// `i2l` -> `long`, `d2i` -> `int`, ...
fn conversion_target(mnemonic: &str) -> Option<SemanticType> {
    Some(match mnemonic.as_bytes().last()? {
        b'i' => SemanticType::Int,
        b'l' => SemanticType::Long,
        b'f' => SemanticType::Float,
        b'd' => SemanticType::Double,
        b'b' => SemanticType::Byte,
        b'c' => SemanticType::Char,
        b's' => SemanticType::Short,
        _ => return None,
    })
}

/// `bipush` and `sipush`.
pub fn immediate_type(mnemonic: &str) -> Option<SemanticType> {
    match mnemonic {
        "bipush" => Some(SemanticType::Byte),
        "sipush" => Some(SemanticType::Short),
        _ => None,
    }
}

fn slot_access_type(mnemonic: &str, verb: &str) -> Option<SemanticType> {
    let (prefix, rest) = mnemonic.split_at_checked(1)?;
    let suffix = rest.strip_prefix(verb)?;
    if !matches!(suffix, "" | "_0" | "_1" | "_2" | "_3") {
        return None;
    }
    prefix_type(prefix)
}

/// `iload`, `lload_2`, `aload_0`, ...
pub fn load_type(mnemonic: &str) -> Option<SemanticType> {
    slot_access_type(mnemonic, "load")
}

/// `istore`, `dstore_1`, `astore_3`, ...
pub fn store_type(mnemonic: &str) -> Option<SemanticType> {
    slot_access_type(mnemonic, "store")
}
