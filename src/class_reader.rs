//! Class file decoding: walks a class with `noak` and feeds its methods to an
//! [`InstructionVisitor`].

use crate::access::{ClassAccessFlags, MethodAccessFlags};
use crate::events::InstructionVisitor;
use crate::operand::{ConstantValue, Slot};
use crate::types::SemanticType;
use noak::MStr;
use noak::descriptor::MethodDescriptor;
use noak::error::DecodeError;
use noak::reader::{
    Class,
    attributes::{ArrayType, Code, LineNumberTable, RawInstruction::{self, *}},
    cpool::{self, ConstantPool, InterfaceMethodRef, Item, MethodRef},
};
use rustc_hash::{FxHashMap, FxHashSet};

const THROWABLE: &str = "java.lang.Throwable";

pub fn read_class<V: InstructionVisitor>(bytes: &[u8], visitor: &mut V) -> Result<(), V::Error> {
    let class = Class::new(bytes)?;
    let pool = class.pool();

    let name = pool.retrieve(class.this_class())?.name.display().to_string();
    let super_name = match class.super_class() {
        Some(index) => Some(pool.retrieve(index)?.name.display().to_string()),
        None => None,
    };
    let access = ClassAccessFlags::from_bits_truncate(class.access_flags().bits());
    visitor.class_begin(&name, super_name.as_deref(), access)?;

    for method in class.methods() {
        let method = method?;
        let name = pool.retrieve(method.name())?.display().to_string();
        let descriptor = pool.retrieve(method.descriptor())?;
        let access = MethodAccessFlags::from_bits_truncate(method.access_flags().bits());
        // Abstract and native methods have no `Code` attribute.
        let code = method.attributes().find_attribute::<Code>(pool)?;
        let lines = match &code {
            Some(code) => line_starts(pool, code)?,
            None => FxHashMap::default(),
        };
        let first_line = lines
            .iter()
            .min_by_key(|&(&address, _)| address)
            .map(|(_, &line)| line);
        visitor.method_begin(&name, descriptor, access, first_line)?;
        if let Some(code) = &code {
            read_code(pool, code, &lines, visitor)?;
        }
        visitor.method_end()?;
    }

    visitor.class_end()
}

fn branch_offset(insn: &RawInstruction<'_>) -> Option<i32> {
    Some(match insn {
        Goto { offset }
        | IfACmpEq { offset }
        | IfACmpNe { offset }
        | IfICmpEq { offset }
        | IfICmpNe { offset }
        | IfICmpLt { offset }
        | IfICmpGe { offset }
        | IfICmpGt { offset }
        | IfICmpLe { offset }
        | IfEq { offset }
        | IfNe { offset }
        | IfLt { offset }
        | IfGe { offset }
        | IfGt { offset }
        | IfLe { offset }
        | IfNonNull { offset }
        | IfNull { offset } => *offset as i32,
        GotoW { offset } => *offset,
        _ => return None,
    })
}

// A target outside the method never gets a label, so a jump to it stays unresolved.
fn jump_target(address: u32, offset: i32) -> u32 {
    address.wrapping_add_signed(offset)
}

/// Bytecode addresses that get a label: the method entry and every jump target.
fn label_addresses(code: &Code<'_>) -> Result<FxHashSet<u32>, DecodeError> {
    let mut labels = FxHashSet::default();
    labels.insert(0);
    for row in code.raw_instructions() {
        let (address, insn) = row?;
        if let Some(offset) = branch_offset(&insn) {
            labels.insert(jump_target(address.as_u32(), offset));
        }
    }
    Ok(labels)
}

/// Source line of every address that starts one.
fn line_starts(
    pool: &ConstantPool<'_>,
    code: &Code<'_>,
) -> Result<FxHashMap<u32, u32>, DecodeError> {
    let mut lines = FxHashMap::default();
    if let Some(table) = code.attributes().find_attribute::<LineNumberTable>(pool)? {
        for line in table.lines() {
            let line = line?;
            lines.insert(line.start().as_u32(), u32::from(line.line_number()));
        }
    }
    Ok(lines)
}

fn read_code<V: InstructionVisitor>(
    pool: &ConstantPool<'_>,
    code: &Code<'_>,
    lines: &FxHashMap<u32, u32>,
    visitor: &mut V,
) -> Result<(), V::Error> {
    let labels = label_addresses(code)?;
    let mut handlers = FxHashSet::default();
    for handler in code.exception_handlers() {
        visitor.unsupported("try-catch")?;
        handlers.insert(handler.handler().as_u32());
    }
    for row in code.raw_instructions() {
        let (address, insn) = row?;
        let address = address.as_u32();
        let line = lines.get(&address).copied();
        let handler = handlers.contains(&address);
        if line.is_some() || handler || labels.contains(&address) {
            visitor.line_and_label(line, address)?;
        }
        if handler {
            // The caught exception.
            visitor.opaque("catch", 0, Some(SemanticType::from_class_name(THROWABLE)))?;
        }
        read_instruction(pool, address, &insn, visitor)?;
    }
    Ok(())
}

/// Operands consumed and the value produced by a call to a method with `descriptor`.
fn call_effect(
    descriptor: &MStr,
    receiver: bool,
) -> Result<(usize, Option<SemanticType>), DecodeError> {
    let descriptor = MethodDescriptor::parse(descriptor)?;
    let pops = descriptor.parameters().count() + usize::from(receiver);
    let pushes = descriptor
        .return_type()
        .map(|ty| SemanticType::from_descriptor(&ty));
    Ok((pops, pushes))
}

fn field_type(descriptor: &MStr) -> SemanticType {
    SemanticType::parse_descriptor(&descriptor.display().to_string())
        .unwrap_or_else(SemanticType::object)
}

fn class_type(name: &MStr) -> SemanticType {
    SemanticType::from_class_name(&name.display().to_string())
}

fn array_of(element: SemanticType) -> Option<SemanticType> {
    Some(SemanticType::Array(Box::new(element)))
}

fn array_element(atype: &ArrayType) -> SemanticType {
    match atype {
        ArrayType::Boolean => SemanticType::Boolean,
        ArrayType::Byte => SemanticType::Byte,
        ArrayType::Char => SemanticType::Char,
        ArrayType::Short => SemanticType::Short,
        ArrayType::Int => SemanticType::Int,
        ArrayType::Long => SemanticType::Long,
        ArrayType::Float => SemanticType::Float,
        ArrayType::Double => SemanticType::Double,
    }
}

fn read_instruction<V: InstructionVisitor>(
    pool: &ConstantPool<'_>,
    address: u32,
    insn: &RawInstruction<'_>,
    visitor: &mut V,
) -> Result<(), V::Error> {
    let target = |offset: i32| jump_target(address, offset);
    match insn {
        // Constants
        AConstNull => visitor.constant_opcode("aconst_null"),
        IConstM1 => visitor.constant_opcode("iconst_m1"),
        IConst0 => visitor.constant_opcode("iconst_0"),
        IConst1 => visitor.constant_opcode("iconst_1"),
        IConst2 => visitor.constant_opcode("iconst_2"),
        IConst3 => visitor.constant_opcode("iconst_3"),
        IConst4 => visitor.constant_opcode("iconst_4"),
        IConst5 => visitor.constant_opcode("iconst_5"),
        LConst0 => visitor.constant_opcode("lconst_0"),
        LConst1 => visitor.constant_opcode("lconst_1"),
        FConst0 => visitor.constant_opcode("fconst_0"),
        FConst1 => visitor.constant_opcode("fconst_1"),
        FConst2 => visitor.constant_opcode("fconst_2"),
        DConst0 => visitor.constant_opcode("dconst_0"),
        DConst1 => visitor.constant_opcode("dconst_1"),
        BIPush { value } => visitor.constant_immediate("bipush", *value as i32),
        SIPush { value } => visitor.constant_immediate("sipush", *value as i32),
        LdC { index } | LdCW { index } => match pool.get(*index)? {
            Item::Integer(cpool::Integer { value }) => {
                visitor.constant(ConstantValue::Int(*value))
            }
            Item::Float(cpool::Float { value }) => visitor.constant(ConstantValue::Float(*value)),
            Item::String(cpool::String { string }) => visitor.constant(ConstantValue::String(
                pool.retrieve(*string)?.display().to_string(),
            )),
            Item::Class(cpool::Class { name }) => visitor.constant(ConstantValue::Class(
                pool.retrieve(*name)?.display().to_string(),
            )),
            // Method handles, method types and dynamic constants.
            _ => visitor.opaque("ldc", 0, Some(SemanticType::object())),
        },
        LdC2W { index } => match pool.get(*index)? {
            Item::Long(cpool::Long { value }) => visitor.constant(ConstantValue::Long(*value)),
            Item::Double(cpool::Double { value }) => {
                visitor.constant(ConstantValue::Double(*value))
            }
            _ => visitor.unsupported("ldc2_w"),
        },

        // Slot loads
        ILoad { index } => visitor.variable_load(Slot(*index as u16), "iload"),
        LLoad { index } => visitor.variable_load(Slot(*index as u16), "lload"),
        FLoad { index } => visitor.variable_load(Slot(*index as u16), "fload"),
        DLoad { index } => visitor.variable_load(Slot(*index as u16), "dload"),
        ALoad { index } => visitor.variable_load(Slot(*index as u16), "aload"),
        ILoadW { index } => visitor.variable_load(Slot(*index), "iload"),
        LLoadW { index } => visitor.variable_load(Slot(*index), "lload"),
        FLoadW { index } => visitor.variable_load(Slot(*index), "fload"),
        DLoadW { index } => visitor.variable_load(Slot(*index), "dload"),
        ALoadW { index } => visitor.variable_load(Slot(*index), "aload"),
        ILoad0 => visitor.variable_load(Slot(0), "iload_0"),
        ILoad1 => visitor.variable_load(Slot(1), "iload_1"),
        ILoad2 => visitor.variable_load(Slot(2), "iload_2"),
        ILoad3 => visitor.variable_load(Slot(3), "iload_3"),
        LLoad0 => visitor.variable_load(Slot(0), "lload_0"),
        LLoad1 => visitor.variable_load(Slot(1), "lload_1"),
        LLoad2 => visitor.variable_load(Slot(2), "lload_2"),
        LLoad3 => visitor.variable_load(Slot(3), "lload_3"),
        FLoad0 => visitor.variable_load(Slot(0), "fload_0"),
        FLoad1 => visitor.variable_load(Slot(1), "fload_1"),
        FLoad2 => visitor.variable_load(Slot(2), "fload_2"),
        FLoad3 => visitor.variable_load(Slot(3), "fload_3"),
        DLoad0 => visitor.variable_load(Slot(0), "dload_0"),
        DLoad1 => visitor.variable_load(Slot(1), "dload_1"),
        DLoad2 => visitor.variable_load(Slot(2), "dload_2"),
        DLoad3 => visitor.variable_load(Slot(3), "dload_3"),
        ALoad0 => visitor.variable_load(Slot(0), "aload_0"),
        ALoad1 => visitor.variable_load(Slot(1), "aload_1"),
        ALoad2 => visitor.variable_load(Slot(2), "aload_2"),
        ALoad3 => visitor.variable_load(Slot(3), "aload_3"),

        // Slot stores
        IStore { index } => visitor.variable_store(Slot(*index as u16), "istore"),
        LStore { index } => visitor.variable_store(Slot(*index as u16), "lstore"),
        FStore { index } => visitor.variable_store(Slot(*index as u16), "fstore"),
        DStore { index } => visitor.variable_store(Slot(*index as u16), "dstore"),
        AStore { index } => visitor.variable_store(Slot(*index as u16), "astore"),
        IStoreW { index } => visitor.variable_store(Slot(*index), "istore"),
        LStoreW { index } => visitor.variable_store(Slot(*index), "lstore"),
        FStoreW { index } => visitor.variable_store(Slot(*index), "fstore"),
        DStoreW { index } => visitor.variable_store(Slot(*index), "dstore"),
        AStoreW { index } => visitor.variable_store(Slot(*index), "astore"),
        IStore0 => visitor.variable_store(Slot(0), "istore_0"),
        IStore1 => visitor.variable_store(Slot(1), "istore_1"),
        IStore2 => visitor.variable_store(Slot(2), "istore_2"),
        IStore3 => visitor.variable_store(Slot(3), "istore_3"),
        LStore0 => visitor.variable_store(Slot(0), "lstore_0"),
        LStore1 => visitor.variable_store(Slot(1), "lstore_1"),
        LStore2 => visitor.variable_store(Slot(2), "lstore_2"),
        LStore3 => visitor.variable_store(Slot(3), "lstore_3"),
        FStore0 => visitor.variable_store(Slot(0), "fstore_0"),
        FStore1 => visitor.variable_store(Slot(1), "fstore_1"),
        FStore2 => visitor.variable_store(Slot(2), "fstore_2"),
        FStore3 => visitor.variable_store(Slot(3), "fstore_3"),
        DStore0 => visitor.variable_store(Slot(0), "dstore_0"),
        DStore1 => visitor.variable_store(Slot(1), "dstore_1"),
        DStore2 => visitor.variable_store(Slot(2), "dstore_2"),
        DStore3 => visitor.variable_store(Slot(3), "dstore_3"),
        AStore0 => visitor.variable_store(Slot(0), "astore_0"),
        AStore1 => visitor.variable_store(Slot(1), "astore_1"),
        AStore2 => visitor.variable_store(Slot(2), "astore_2"),
        AStore3 => visitor.variable_store(Slot(3), "astore_3"),

        // Arithmetic
        IAdd => visitor.constant_opcode("iadd"),
        LAdd => visitor.constant_opcode("ladd"),
        FAdd => visitor.constant_opcode("fadd"),
        DAdd => visitor.constant_opcode("dadd"),
        ISub => visitor.constant_opcode("isub"),
        LSub => visitor.constant_opcode("lsub"),
        FSub => visitor.constant_opcode("fsub"),
        DSub => visitor.constant_opcode("dsub"),
        IMul => visitor.constant_opcode("imul"),
        LMul => visitor.constant_opcode("lmul"),
        FMul => visitor.constant_opcode("fmul"),
        DMul => visitor.constant_opcode("dmul"),
        IDiv => visitor.constant_opcode("idiv"),
        LDiv => visitor.constant_opcode("ldiv"),
        FDiv => visitor.constant_opcode("fdiv"),
        DDiv => visitor.constant_opcode("ddiv"),
        IRem => visitor.constant_opcode("irem"),
        LRem => visitor.constant_opcode("lrem"),
        FRem => visitor.constant_opcode("frem"),
        DRem => visitor.constant_opcode("drem"),
        IAnd => visitor.constant_opcode("iand"),
        LAnd => visitor.constant_opcode("land"),
        IOr => visitor.constant_opcode("ior"),
        LOr => visitor.constant_opcode("lor"),
        IXor => visitor.constant_opcode("ixor"),
        LXor => visitor.constant_opcode("lxor"),
        IShL => visitor.constant_opcode("ishl"),
        LShL => visitor.constant_opcode("lshl"),
        IShR => visitor.constant_opcode("ishr"),
        LShR => visitor.constant_opcode("lshr"),
        IUShR => visitor.constant_opcode("iushr"),
        LUShR => visitor.constant_opcode("lushr"),
        LCmp => visitor.constant_opcode("lcmp"),
        FCmpL => visitor.constant_opcode("fcmpl"),
        FCmpG => visitor.constant_opcode("fcmpg"),
        DCmpL => visitor.constant_opcode("dcmpl"),
        DCmpG => visitor.constant_opcode("dcmpg"),
        INeg => visitor.constant_opcode("ineg"),
        LNeg => visitor.constant_opcode("lneg"),
        FNeg => visitor.constant_opcode("fneg"),
        DNeg => visitor.constant_opcode("dneg"),

        // Conversions
        I2L => visitor.constant_opcode("i2l"),
        I2F => visitor.constant_opcode("i2f"),
        I2D => visitor.constant_opcode("i2d"),
        L2I => visitor.constant_opcode("l2i"),
        L2F => visitor.constant_opcode("l2f"),
        L2D => visitor.constant_opcode("l2d"),
        F2I => visitor.constant_opcode("f2i"),
        F2L => visitor.constant_opcode("f2l"),
        F2D => visitor.constant_opcode("f2d"),
        D2I => visitor.constant_opcode("d2i"),
        D2L => visitor.constant_opcode("d2l"),
        D2F => visitor.constant_opcode("d2f"),
        I2B => visitor.constant_opcode("i2b"),
        I2C => visitor.constant_opcode("i2c"),
        I2S => visitor.constant_opcode("i2s"),

        // Jumps
        IfICmpEq { offset } => visitor.conditional_jump("if_icmpeq", target(*offset as i32)),
        IfICmpNe { offset } => visitor.conditional_jump("if_icmpne", target(*offset as i32)),
        IfICmpLt { offset } => visitor.conditional_jump("if_icmplt", target(*offset as i32)),
        IfICmpGe { offset } => visitor.conditional_jump("if_icmpge", target(*offset as i32)),
        IfICmpGt { offset } => visitor.conditional_jump("if_icmpgt", target(*offset as i32)),
        IfICmpLe { offset } => visitor.conditional_jump("if_icmple", target(*offset as i32)),
        IfACmpEq { offset } => visitor.conditional_jump("if_acmpeq", target(*offset as i32)),
        IfACmpNe { offset } => visitor.conditional_jump("if_acmpne", target(*offset as i32)),
        IfEq { offset } => visitor.unary_jump("ifeq", target(*offset as i32)),
        IfNe { offset } => visitor.unary_jump("ifne", target(*offset as i32)),
        IfLt { offset } => visitor.unary_jump("iflt", target(*offset as i32)),
        IfGe { offset } => visitor.unary_jump("ifge", target(*offset as i32)),
        IfGt { offset } => visitor.unary_jump("ifgt", target(*offset as i32)),
        IfLe { offset } => visitor.unary_jump("ifle", target(*offset as i32)),
        IfNull { offset } => visitor.unary_jump("ifnull", target(*offset as i32)),
        IfNonNull { offset } => visitor.unary_jump("ifnonnull", target(*offset as i32)),
        Goto { offset } => visitor.unconditional_jump(target(*offset as i32)),
        GotoW { offset } => visitor.unconditional_jump(target(*offset)),

        // Stack shuffles
        Pop => visitor.constant_opcode("pop"),
        Pop2 => visitor.constant_opcode("pop2"),
        Dup => visitor.constant_opcode("dup"),
        DupX1 => visitor.constant_opcode("dup_x1"),
        DupX2 => visitor.constant_opcode("dup_x2"),
        Dup2 => visitor.constant_opcode("dup2"),
        Dup2X1 => visitor.constant_opcode("dup2_x1"),
        Dup2X2 => visitor.constant_opcode("dup2_x2"),
        Swap => visitor.constant_opcode("swap"),

        // Arrays
        IALoad => visitor.constant_opcode("iaload"),
        LALoad => visitor.constant_opcode("laload"),
        FALoad => visitor.constant_opcode("faload"),
        DALoad => visitor.constant_opcode("daload"),
        AALoad => visitor.constant_opcode("aaload"),
        BALoad => visitor.constant_opcode("baload"),
        CALoad => visitor.constant_opcode("caload"),
        SALoad => visitor.constant_opcode("saload"),
        IAStore => visitor.constant_opcode("iastore"),
        LAStore => visitor.constant_opcode("lastore"),
        FAStore => visitor.constant_opcode("fastore"),
        DAStore => visitor.constant_opcode("dastore"),
        AAStore => visitor.constant_opcode("aastore"),
        BAStore => visitor.constant_opcode("bastore"),
        CAStore => visitor.constant_opcode("castore"),
        SAStore => visitor.constant_opcode("sastore"),
        ArrayLength => visitor.constant_opcode("arraylength"),
        NewArray { atype } => visitor.opaque("newarray", 1, array_of(array_element(atype))),
        ANewArray { index } => visitor.opaque(
            "anewarray",
            1,
            array_of(class_type(pool.retrieve(*index)?.name)),
        ),
        MultiANewArray { index, dimensions } => visitor.opaque(
            "multianewarray",
            usize::from(*dimensions),
            Some(class_type(pool.retrieve(*index)?.name)),
        ),

        // Objects
        New { index } => visitor.opaque("new", 0, Some(class_type(pool.retrieve(*index)?.name))),
        CheckCast { index } => visitor.opaque(
            "checkcast",
            1,
            Some(class_type(pool.retrieve(*index)?.name)),
        ),
        InstanceOf { .. } => visitor.opaque("instanceof", 1, Some(SemanticType::Int)),
        GetField { index } => {
            let ty = field_type(pool.retrieve(*index)?.name_and_type.descriptor);
            visitor.opaque("getfield", 1, Some(ty))
        }
        GetStatic { index } => {
            let ty = field_type(pool.retrieve(*index)?.name_and_type.descriptor);
            visitor.opaque("getstatic", 0, Some(ty))
        }
        PutField { .. } => visitor.opaque("putfield", 2, None),
        PutStatic { .. } => visitor.opaque("putstatic", 1, None),
        MonitorEnter => visitor.constant_opcode("monitorenter"),
        MonitorExit => visitor.constant_opcode("monitorexit"),

        // Calls
        InvokeVirtual { index } => {
            let descriptor = pool.retrieve(*index)?.name_and_type.descriptor;
            let (pops, pushes) = call_effect(descriptor, true)?;
            visitor.opaque("invokevirtual", pops, pushes)
        }
        InvokeInterface { index, .. } => {
            let descriptor = pool.retrieve(*index)?.name_and_type.descriptor;
            let (pops, pushes) = call_effect(descriptor, true)?;
            visitor.opaque("invokeinterface", pops, pushes)
        }
        InvokeSpecial { index } => {
            let descriptor = pool.retrieve(*index)?.name_and_type.descriptor;
            let (pops, pushes) = call_effect(descriptor, true)?;
            visitor.opaque("invokespecial", pops, pushes)
        }
        InvokeStatic { index } => match pool.get(*index)? {
            Item::MethodRef(MethodRef { name_and_type, .. })
            | Item::InterfaceMethodRef(InterfaceMethodRef { name_and_type, .. }) => {
                let descriptor = pool.retrieve(*name_and_type)?.descriptor;
                let (pops, pushes) = call_effect(descriptor, false)?;
                visitor.opaque("invokestatic", pops, pushes)
            }
            _ => visitor.unsupported("invokestatic"),
        },
        InvokeDynamic { index } => {
            let (pops, pushes) =
                call_effect(pool.retrieve(*index)?.name_and_type.descriptor, false)?;
            visitor.opaque("invokedynamic", pops, pushes)
        }

        // Method exits
        IReturn => visitor.constant_opcode("ireturn"),
        LReturn => visitor.constant_opcode("lreturn"),
        FReturn => visitor.constant_opcode("freturn"),
        DReturn => visitor.constant_opcode("dreturn"),
        AReturn => visitor.constant_opcode("areturn"),
        Return => visitor.constant_opcode("return"),
        AThrow => visitor.constant_opcode("athrow"),

        // Switches consume their key; the cases are not reconstructed.
        TableSwitch(_) => visitor.opaque("tableswitch", 1, None),
        LookupSwitch(_) => visitor.opaque("lookupswitch", 1, None),
        IInc { .. } | IIncW { .. } => visitor.unsupported("iinc"),
        Nop => visitor.constant_opcode("nop"),
        _ => visitor.unsupported("instruction"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildOptions, ClassGraphBuilder};
    use crate::memory_graph::MemoryGraph;
    use crate::sequence::Sequencer;

    #[test]
    fn branch_targets() {
        assert_eq!(branch_offset(&Goto { offset: -6 }), Some(-6));
        assert_eq!(branch_offset(&GotoW { offset: 70000 }), Some(70000));
        assert_eq!(branch_offset(&IfNull { offset: 9 }), Some(9));
        assert_eq!(branch_offset(&IAdd), None);
        assert_eq!(jump_target(10, -6), 4);
        assert_eq!(jump_target(10, 7), 17);
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl InstructionVisitor for Recorder {
        type Error = DecodeError;

        fn class_begin(
            &mut self,
            name: &str,
            super_name: Option<&str>,
            _: ClassAccessFlags,
        ) -> Result<(), DecodeError> {
            self.events.push(format!("class {name} {super_name:?}"));
            Ok(())
        }

        fn method_begin(
            &mut self,
            name: &str,
            descriptor: &MStr,
            _: MethodAccessFlags,
            line: Option<u32>,
        ) -> Result<(), DecodeError> {
            self.events
                .push(format!("method {name}{} {line:?}", descriptor.display()));
            Ok(())
        }

        fn line_and_label(&mut self, line: Option<u32>, label: u32) -> Result<(), DecodeError> {
            self.events.push(format!("label {label} {line:?}"));
            Ok(())
        }

        fn constant(&mut self, value: ConstantValue) -> Result<(), DecodeError> {
            self.events.push(format!("constant {}", value.text()));
            Ok(())
        }

        fn constant_opcode(&mut self, mnemonic: &str) -> Result<(), DecodeError> {
            self.events.push(mnemonic.to_owned());
            Ok(())
        }

        fn constant_immediate(&mut self, mnemonic: &str, immediate: i32) -> Result<(), DecodeError> {
            self.events.push(format!("{mnemonic} {immediate}"));
            Ok(())
        }

        fn variable_load(&mut self, slot: Slot, mnemonic: &str) -> Result<(), DecodeError> {
            self.events.push(format!("{mnemonic} {slot}"));
            Ok(())
        }

        fn variable_store(&mut self, slot: Slot, mnemonic: &str) -> Result<(), DecodeError> {
            self.events.push(format!("{mnemonic} {slot}"));
            Ok(())
        }

        fn conditional_jump(&mut self, mnemonic: &str, label: u32) -> Result<(), DecodeError> {
            self.events.push(format!("{mnemonic} -> {label}"));
            Ok(())
        }

        fn unconditional_jump(&mut self, label: u32) -> Result<(), DecodeError> {
            self.events.push(format!("goto -> {label}"));
            Ok(())
        }

        fn unary_jump(&mut self, mnemonic: &str, label: u32) -> Result<(), DecodeError> {
            self.events.push(format!("{mnemonic} -> {label}"));
            Ok(())
        }

        fn opaque(
            &mut self,
            mnemonic: &str,
            pops: usize,
            pushes: Option<SemanticType>,
        ) -> Result<(), DecodeError> {
            self.events.push(format!("{mnemonic}/{pops} {pushes:?}"));
            Ok(())
        }

        fn unsupported(&mut self, mnemonic: &str) -> Result<(), DecodeError> {
            self.events.push(format!("unsupported {mnemonic}"));
            Ok(())
        }

        fn method_end(&mut self) -> Result<(), DecodeError> {
            self.events.push("end".to_owned());
            Ok(())
        }

        fn class_end(&mut self) -> Result<(), DecodeError> {
            self.events.push("class end".to_owned());
            Ok(())
        }
    }

    #[test]
    fn garbage_is_rejected() {
        let mut recorder = Recorder::default();
        assert!(read_class(b"definitely not a class file", &mut recorder).is_err());
        assert!(recorder.events.is_empty());
    }

    fn utf8(bytes: &mut Vec<u8>, text: &str) {
        bytes.push(1);
        bytes.extend_from_slice(&(text.len() as u16).to_be_bytes());
        bytes.extend_from_slice(text.as_bytes());
    }

    fn u16s(bytes: &mut Vec<u8>, values: &[u16]) {
        for value in values {
            bytes.extend_from_slice(&value.to_be_bytes());
        }
    }

    /// `class T { int value; int get() { int v = value; return v; } }` with `get` starting at line
    /// 7 and its `return` on line 8.
    fn field_getter_class() -> Vec<u8> {
        let mut bytes = vec![0xca, 0xfe, 0xba, 0xbe];
        u16s(&mut bytes, &[0, 52, 13]);
        utf8(&mut bytes, "T"); // #1
        bytes.push(7); // #2 Class
        u16s(&mut bytes, &[1]);
        utf8(&mut bytes, "java/lang/Object"); // #3
        bytes.push(7); // #4 Class
        u16s(&mut bytes, &[3]);
        utf8(&mut bytes, "value"); // #5
        utf8(&mut bytes, "I"); // #6
        bytes.push(12); // #7 NameAndType
        u16s(&mut bytes, &[5, 6]);
        bytes.push(9); // #8 Fieldref
        u16s(&mut bytes, &[2, 7]);
        utf8(&mut bytes, "get"); // #9
        utf8(&mut bytes, "()I"); // #10
        utf8(&mut bytes, "Code"); // #11
        utf8(&mut bytes, "LineNumberTable"); // #12

        // Access, this, super, no interfaces, no fields, one method.
        u16s(&mut bytes, &[0x0021, 2, 4, 0, 0, 1]);
        u16s(&mut bytes, &[0x0001, 9, 10, 1]);

        // aload_0; getfield #8; istore_1; iload_1; ireturn
        let code = [0x2a, 0xb4, 0x00, 0x08, 0x3c, 0x1b, 0xac];
        let mut line_table = Vec::new();
        u16s(&mut line_table, &[2, 0, 7, 5, 8]);

        u16s(&mut bytes, &[11]);
        let length = 2 + 2 + 4 + code.len() + 2 + 2 + 6 + line_table.len();
        bytes.extend_from_slice(&(length as u32).to_be_bytes());
        u16s(&mut bytes, &[1, 2]);
        bytes.extend_from_slice(&(code.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&code);
        u16s(&mut bytes, &[0, 1, 12]);
        bytes.extend_from_slice(&(line_table.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&line_table);

        // No class attributes.
        u16s(&mut bytes, &[0]);
        bytes
    }

    #[test]
    fn field_access_and_lines() {
        let mut recorder = Recorder::default();
        read_class(&field_getter_class(), &mut recorder).expect("valid class");
        assert_eq!(
            recorder.events,
            [
                "class T Some(\"java/lang/Object\")",
                "method get()I Some(7)",
                "label 0 Some(7)",
                "aload_0 slot0",
                "getfield/1 Some(Int)",
                "istore_1 slot1",
                "label 5 Some(8)",
                "iload_1 slot1",
                "ireturn",
                "end",
                "class end",
            ]
        );
    }

    #[test]
    fn field_loads_reach_the_graph() {
        let sequencer = Sequencer::new();
        let mut builder =
            ClassGraphBuilder::new(MemoryGraph::new(), &sequencer, BuildOptions::default());
        read_class(&field_getter_class(), &mut builder).expect("valid class");
        assert_eq!(builder.report().skipped, 0);

        let graph = builder.hook();
        let method = graph.method_by_full_name("T.get:()I").expect("method vertex");
        assert_eq!(method.line, Some(7));
        let dump = graph.dump(method.seq).to_string();
        assert!(dump.contains("BLOCK STORE @0: int (line 7)"), "{dump}");
        assert!(dump.contains("BLOCK getfield @2: int (line 7)"), "{dump}");
        assert!(dump.contains("LOCAL slot0: java.lang.Object (line 7)"), "{dump}");
    }
}
