use crate::access::{ClassAccessFlags, MethodAccessFlags};
use crate::engine::{EngineError, MethodEngine};
use crate::events::InstructionVisitor;
use crate::hook::GraphHook;
use crate::operand::{ConstantValue, Slot};
use crate::projection::{self, ClassProjection, ProjectionError};
use crate::sequence::{SequenceNumber, Sequencer};
use crate::types::SemanticType;
use log::{debug, warn};
use noak::MStr;
use noak::error::DecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassGraphError {
    #[error("Failed to parse class file: {0}")]
    Noak(#[from] DecodeError),

    #[error("While projecting the class: {0}")]
    Projection(#[from] ProjectionError),

    #[error("In method `{name}`: {error}")]
    Method {
        name: String,
        error: MethodGraphError,
    },

    #[error("Event `{0}` delivered outside of a class")]
    OutOfOrder(&'static str),
}

#[derive(Debug, Error)]
pub enum MethodGraphError {
    #[error("While projecting the signature: {0}")]
    Projection(#[from] ProjectionError),

    #[error("While reconstructing the body: {0}")]
    Engine(#[from] EngineError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Abort on the first method that fails instead of skipping it.
    pub fail_fast: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub classes: usize,
    pub methods: usize,
    pub skipped: usize,
    pub body_vertices: usize,
}

enum MethodState<'s> {
    Idle,
    Reconstructing {
        name: String,
        engine: MethodEngine<'s>,
    },
    // The method failed; its remaining events are dropped.
    Skipping,
}

/// Turns instruction events into a graph: projects declarations and runs one [`MethodEngine`] per
/// method body.
pub struct ClassGraphBuilder<'s, H> {
    hook: H,
    sequencer: &'s Sequencer,
    options: BuildOptions,
    class: Option<ClassProjection>,
    method: MethodState<'s>,
    methods: Vec<SequenceNumber>,
    report: BuildReport,
}

impl<'s, H: GraphHook> ClassGraphBuilder<'s, H> {
    pub fn new(hook: H, sequencer: &'s Sequencer, options: BuildOptions) -> Self {
        Self {
            hook,
            sequencer,
            options,
            class: None,
            method: MethodState::Idle,
            methods: Vec::new(),
            report: BuildReport::default(),
        }
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }

    pub fn into_hook(self) -> H {
        self.hook
    }

    pub fn report(&self) -> BuildReport {
        self.report
    }

    /// Method vertices of every method that was reconstructed successfully, in order.
    pub fn methods(&self) -> &[SequenceNumber] {
        &self.methods
    }

    fn fail(&mut self, name: String, error: MethodGraphError) -> Result<(), ClassGraphError> {
        self.method = MethodState::Skipping;
        if self.options.fail_fast {
            return Err(ClassGraphError::Method { name, error });
        }
        warn!("Skipping method `{name}`: {error}");
        self.report.skipped += 1;
        Ok(())
    }

    fn with_engine(
        &mut self,
        f: impl FnOnce(&mut MethodEngine<'s>, &mut H) -> Result<(), EngineError>,
    ) -> Result<(), ClassGraphError> {
        let MethodState::Reconstructing { engine, .. } = &mut self.method else {
            return Ok(());
        };
        let Err(error) = f(engine, &mut self.hook) else {
            return Ok(());
        };
        let MethodState::Reconstructing { name, .. } =
            core::mem::replace(&mut self.method, MethodState::Skipping)
        else {
            return Ok(());
        };
        self.fail(name, error.into())
    }
}

impl<H: GraphHook> InstructionVisitor for ClassGraphBuilder<'_, H> {
    type Error = ClassGraphError;

    fn class_begin(
        &mut self,
        name: &str,
        super_name: Option<&str>,
        access: ClassAccessFlags,
    ) -> Result<(), ClassGraphError> {
        debug!("class {name} extends {super_name:?} ({access:?})");
        self.method = MethodState::Idle;
        self.class = Some(projection::project_class(
            &mut self.hook,
            self.sequencer,
            name,
        )?);
        self.report.classes += 1;
        Ok(())
    }

    fn method_begin(
        &mut self,
        name: &str,
        descriptor: &MStr,
        access: MethodAccessFlags,
        line: Option<u32>,
    ) -> Result<(), ClassGraphError> {
        let class = self
            .class
            .as_ref()
            .ok_or(ClassGraphError::OutOfOrder("method_begin"))?;
        let full_name = format!("{name}{}", descriptor.display());
        debug!("method {full_name}");
        match projection::project_method(
            &mut self.hook,
            self.sequencer,
            class,
            name,
            descriptor,
            access,
            line,
        ) {
            Ok(method) => {
                self.method = MethodState::Reconstructing {
                    name: full_name,
                    engine: MethodEngine::new(self.sequencer, method),
                };
                Ok(())
            }
            Err(error) => self.fail(full_name, error.into()),
        }
    }

    fn line_and_label(&mut self, line: Option<u32>, label: u32) -> Result<(), ClassGraphError> {
        self.with_engine(|engine, hook| engine.visit_label(hook, line, label))
    }

    fn constant(&mut self, value: ConstantValue) -> Result<(), ClassGraphError> {
        self.with_engine(|engine, _| {
            engine.push_constant(value);
            Ok(())
        })
    }

    fn constant_opcode(&mut self, mnemonic: &str) -> Result<(), ClassGraphError> {
        self.with_engine(|engine, _| engine.push_constant_opcode(mnemonic))
    }

    fn constant_immediate(&mut self, mnemonic: &str, immediate: i32) -> Result<(), ClassGraphError> {
        self.with_engine(|engine, _| engine.push_constant_immediate(mnemonic, immediate))
    }

    fn variable_load(&mut self, slot: Slot, mnemonic: &str) -> Result<(), ClassGraphError> {
        self.with_engine(|engine, _| engine.load(slot, mnemonic))
    }

    fn variable_store(&mut self, slot: Slot, mnemonic: &str) -> Result<(), ClassGraphError> {
        self.with_engine(|engine, hook| engine.store(hook, slot, mnemonic))
    }

    fn conditional_jump(&mut self, mnemonic: &str, label: u32) -> Result<(), ClassGraphError> {
        self.with_engine(|engine, hook| engine.conditional_jump(hook, mnemonic, label))
    }

    fn unconditional_jump(&mut self, label: u32) -> Result<(), ClassGraphError> {
        self.with_engine(|engine, _| {
            engine.unconditional_jump(label);
            Ok(())
        })
    }

    fn unary_jump(&mut self, mnemonic: &str, label: u32) -> Result<(), ClassGraphError> {
        self.with_engine(|engine, _| engine.unary_jump(mnemonic, label))
    }

    fn opaque(
        &mut self,
        mnemonic: &str,
        pops: usize,
        pushes: Option<SemanticType>,
    ) -> Result<(), ClassGraphError> {
        self.with_engine(|engine, _| engine.opaque(mnemonic, pops, pushes))
    }

    fn unsupported(&mut self, mnemonic: &str) -> Result<(), ClassGraphError> {
        self.with_engine(|engine, _| {
            engine.unsupported(mnemonic);
            Ok(())
        })
    }

    fn method_end(&mut self) -> Result<(), ClassGraphError> {
        match core::mem::replace(&mut self.method, MethodState::Idle) {
            MethodState::Reconstructing { name, engine } => {
                let method = engine.method();
                match engine.finish() {
                    Ok(summary) => {
                        debug!(
                            "{name}: {} vertices, {} jumps, {} variables",
                            summary.vertices, summary.jumps, summary.variables
                        );
                        self.report.methods += 1;
                        self.report.body_vertices += summary.vertices;
                        self.methods.push(method);
                        Ok(())
                    }
                    Err(error) => {
                        let result = self.fail(name, error.into());
                        self.method = MethodState::Idle;
                        result
                    }
                }
            }
            MethodState::Idle | MethodState::Skipping => Ok(()),
        }
    }

    fn class_end(&mut self) -> Result<(), ClassGraphError> {
        self.class = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_graph::MemoryGraph;
    use crate::vertex::VertexKind;

    fn mstr(s: &'static str) -> &'static MStr {
        MStr::from_mutf8(s.as_bytes()).expect("valid modified UTF-8")
    }

    /// `static void pick(int x) { int y; if (x > 0) y = 1; else y = 2; }`
    fn pick(builder: &mut ClassGraphBuilder<'_, MemoryGraph>) -> Result<(), ClassGraphError> {
        builder.method_begin("pick", mstr("(I)V"), MethodAccessFlags::STATIC, Some(1))?;
        builder.line_and_label(Some(1), 0)?;
        builder.variable_load(Slot(0), "iload_0")?;
        builder.conditional_jump("if_icmple", 11)?;
        builder.constant_opcode("iconst_1")?;
        builder.variable_store(Slot(1), "istore_1")?;
        builder.unconditional_jump(13)?;
        builder.line_and_label(Some(2), 11)?;
        builder.constant_opcode("iconst_2")?;
        builder.variable_store(Slot(1), "istore_1")?;
        builder.line_and_label(None, 13)?;
        builder.unsupported("return")?;
        builder.method_end()
    }

    #[test]
    fn skips_failing_methods() {
        let sequencer = Sequencer::new();
        let mut builder =
            ClassGraphBuilder::new(MemoryGraph::new(), &sequencer, BuildOptions::default());
        builder
            .class_begin("demo/Sample", Some("java/lang/Object"), ClassAccessFlags::PUBLIC)
            .expect("class");
        // `if_icmple` with a single operand on the stack underflows.
        pick(&mut builder).expect("skipped, not failed");

        builder
            .method_begin("answer", mstr("()I"), MethodAccessFlags::PUBLIC, None)
            .expect("method");
        builder.line_and_label(None, 0).expect("label");
        builder.constant_immediate("bipush", 42).expect("push");
        builder.variable_store(Slot(1), "istore_1").expect("store");
        builder.method_end().expect("end");
        builder.class_end().expect("class end");

        let report = builder.report();
        assert_eq!(report.classes, 1);
        assert_eq!(report.methods, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.body_vertices, 3);

        let graph = builder.into_hook();
        let method = graph
            .method_by_full_name("demo.Sample.answer:()I")
            .expect("method vertex");
        let dump = graph.dump(method.seq).to_string();
        assert!(dump.contains("BLOCK STORE @0: int"), "{dump}");
        assert!(dump.contains("LITERAL 42 @2: byte"), "{dump}");
        assert!(dump.contains("MODIFIER VIRTUAL"), "{dump}");
    }

    #[test]
    fn fail_fast_reports_the_method() {
        let sequencer = Sequencer::new();
        let options = BuildOptions { fail_fast: true };
        let mut builder = ClassGraphBuilder::new(MemoryGraph::new(), &sequencer, options);
        builder
            .class_begin("Sample", None, ClassAccessFlags::empty())
            .expect("class");
        let error = pick(&mut builder).expect_err("underflow");
        assert!(matches!(
            &error,
            ClassGraphError::Method {
                name,
                error: MethodGraphError::Engine(EngineError::StackUnderflow(_)),
            } if name == "pick(I)V"
        ));
    }

    #[test]
    fn if_else_end_to_end() {
        let sequencer = Sequencer::new();
        let mut builder =
            ClassGraphBuilder::new(MemoryGraph::new(), &sequencer, BuildOptions::default());
        builder
            .class_begin("demo/Sample", None, ClassAccessFlags::PUBLIC)
            .expect("class");
        builder
            .method_begin("pick", mstr("(I)V"), MethodAccessFlags::STATIC, Some(1))
            .expect("method");
        builder.line_and_label(Some(1), 0).expect("label");
        builder.variable_load(Slot(0), "iload_0").expect("load");
        builder.constant_opcode("iconst_0").expect("push");
        builder.conditional_jump("if_icmple", 11).expect("jump");
        builder.constant_opcode("iconst_1").expect("push");
        builder.variable_store(Slot(1), "istore_1").expect("store");
        builder.unconditional_jump(13).expect("jump");
        builder.line_and_label(Some(2), 11).expect("label");
        builder.constant_opcode("iconst_2").expect("push");
        builder.variable_store(Slot(1), "istore_1").expect("store");
        builder.line_and_label(None, 13).expect("label");
        builder.unsupported("return").expect("return");
        builder.method_end().expect("end");
        assert_eq!(builder.report().skipped, 0);
        assert_eq!(builder.methods().len(), 1);

        let graph = builder.hook();
        let method = builder.methods()[0];
        let mut blocks = graph.vertices().filter_map(|vertex| match &vertex.kind {
            VertexKind::Block { name, .. } => Some((name.as_str(), vertex.line)),
            _ => None,
        });
        assert_eq!(blocks.next(), Some(("IF", Some(1))));
        assert_eq!(blocks.next(), Some((">", Some(1))));
        assert_eq!(blocks.next(), Some(("IF_BODY", Some(1))));
        assert_eq!(blocks.next(), Some(("STORE", Some(1))));
        assert_eq!(blocks.next(), Some(("ELSE_BODY", Some(2))));
        assert_eq!(blocks.next(), Some(("STORE", Some(2))));
        assert_eq!(blocks.next(), None);
        assert!(graph.dump(method).to_string().starts_with("#"));
    }

    #[test]
    fn methods_need_a_class() {
        let sequencer = Sequencer::new();
        let mut builder =
            ClassGraphBuilder::new(MemoryGraph::new(), &sequencer, BuildOptions::default());
        assert!(matches!(
            builder.method_begin("run", mstr("()V"), MethodAccessFlags::empty(), None),
            Err(ClassGraphError::OutOfOrder("method_begin"))
        ));
    }

    #[test]
    fn field_loads_become_opaque_values() {
        // int get() { int v = this.value; ... }
        let sequencer = Sequencer::new();
        let mut builder =
            ClassGraphBuilder::new(MemoryGraph::new(), &sequencer, BuildOptions::default());
        builder
            .class_begin("demo/Box", None, ClassAccessFlags::PUBLIC)
            .expect("class");
        builder
            .method_begin("get", mstr("()I"), MethodAccessFlags::PUBLIC, Some(7))
            .expect("method");
        builder.line_and_label(Some(7), 0).expect("label");
        builder.variable_load(Slot(0), "aload_0").expect("load");
        builder
            .opaque("getfield", 1, Some(SemanticType::Int))
            .expect("getfield");
        builder.variable_store(Slot(1), "istore_1").expect("store");
        builder.variable_load(Slot(1), "iload_1").expect("load");
        builder.constant_opcode("ireturn").expect("return");
        builder.method_end().expect("end");
        assert_eq!(builder.report().skipped, 0);

        let graph = builder.hook();
        let method = builder.methods()[0];
        assert_eq!(graph.vertex(method).and_then(|vertex| vertex.line), Some(7));
        assert_eq!(
            graph.dump(method).to_string(),
            "#3 METHOD demo.Box.get:()I (line 7)\n\
             \x20 #4 METHOD_RETURN int BY_VALUE (line 7)\n\
             \x20 #5 MODIFIER PUBLIC (line 7)\n\
             \x20 #6 MODIFIER VIRTUAL (line 7)\n\
             \x20 #7 BLOCK STORE @0: int (line 7)\n\
             \x20   #8 LOCAL slot1: int (line 7)\n\
             \x20   #9 BLOCK getfield @2: int (line 7)\n\
             \x20     #10 LOCAL slot0: java.lang.Object (line 7)\n"
        );
    }
}
