//! Declaration-level vertices: namespaces, files, methods and their signatures. Unlike method
//! bodies, these are known up front and emitted in one go.

use crate::access::{self, MethodAccessFlags};
use crate::hook::{GraphHook, HookError};
use crate::sequence::{SequenceExhaustedError, SequenceNumber, Sequencer};
use crate::types::{EvaluationStrategy, QualifiedName, SemanticType};
use crate::vertex::{Vertex, VertexKind};
use log::trace;
use noak::MStr;
use noak::descriptor::MethodDescriptor;
use noak::error::DecodeError;
use thiserror::Error;

pub const GLOBAL_NAMESPACE: &str = "<global>";

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Invalid method descriptor: {0}")]
    Descriptor(#[from] DecodeError),

    #[error(transparent)]
    SequenceExhausted(#[from] SequenceExhaustedError),

    #[error("Graph sink failure: {0}")]
    Hook(#[from] HookError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassProjection {
    pub name: QualifiedName,
    pub file: SequenceNumber,
    // Deepest namespace of the chain.
    pub namespace: SequenceNumber,
}

fn create<H: GraphHook + ?Sized>(
    hook: &mut H,
    sequencer: &Sequencer,
    line: Option<u32>,
    kind: VertexKind,
) -> Result<SequenceNumber, ProjectionError> {
    let seq = sequencer.next()?;
    trace!("{seq} {kind}");
    hook.create_vertex(Vertex { seq, line, kind })?;
    Ok(seq)
}

/// Emits the namespace chain and the file of a class given by its internal name.
pub fn project_class<H: GraphHook + ?Sized>(
    hook: &mut H,
    sequencer: &Sequencer,
    internal_name: &str,
) -> Result<ClassProjection, ProjectionError> {
    let name = QualifiedName::parse(internal_name);

    let segments: Vec<(String, String)> = if name.package.is_empty() {
        vec![(GLOBAL_NAMESPACE.to_owned(), GLOBAL_NAMESPACE.to_owned())]
    } else {
        (1..=name.package.len())
            .map(|depth| (name.package[depth - 1].clone(), name.package[..depth].join(".")))
            .collect()
    };
    let mut chain: Vec<SequenceNumber> = Vec::with_capacity(segments.len());
    for (short_name, full_name) in segments {
        let child = create(
            hook,
            sequencer,
            None,
            VertexKind::NamespaceBlock {
                name: short_name,
                full_name,
            },
        )?;
        if let Some(&parent) = chain.last() {
            hook.link_namespace_chain(parent, child)?;
        }
        chain.push(child);
    }
    let namespace = chain[chain.len() - 1];

    let file = create(
        hook,
        sequencer,
        None,
        VertexKind::File {
            name: format!("{}.class", internal_name.replace('.', "/")),
        },
    )?;
    hook.link_file_to_namespace(file, namespace)?;

    Ok(ClassProjection {
        name,
        file,
        namespace,
    })
}

/// Emits a method vertex with its parameters, return and modifiers, all at the method's first
/// `line`. Returns the method vertex, which the body's statements are attached to.
pub fn project_method<H: GraphHook + ?Sized>(
    hook: &mut H,
    sequencer: &Sequencer,
    class: &ClassProjection,
    name: &str,
    descriptor: &MStr,
    flags: MethodAccessFlags,
    line: Option<u32>,
) -> Result<SequenceNumber, ProjectionError> {
    let parsed = MethodDescriptor::parse(descriptor)?;
    let signature = descriptor.display().to_string();

    let method = create(
        hook,
        sequencer,
        line,
        VertexKind::Method {
            name: name.to_owned(),
            full_name: format!("{}.{name}:{signature}", class.name),
            signature,
        },
    )?;
    hook.link_method_to_file(class.file, method)?;

    for (i, parameter) in parsed.parameters().enumerate() {
        let ty = SemanticType::from_descriptor(&parameter);
        let index = i + 1;
        let vertex = create(
            hook,
            sequencer,
            line,
            VertexKind::MethodParameterIn {
                index,
                name: format!("param{index}"),
                type_label: ty.category(),
                evaluation_strategy: EvaluationStrategy::for_parameter(&ty),
                signature: ty.descriptor(),
                type_full_name: ty,
            },
        )?;
        hook.attach_to_method(method, vertex)?;
    }

    let return_type = parsed
        .return_type()
        .map_or(SemanticType::Void, |ty| SemanticType::from_descriptor(&ty));
    let vertex = create(
        hook,
        sequencer,
        line,
        VertexKind::MethodReturn {
            evaluation_strategy: EvaluationStrategy::for_return(&return_type),
            type_full_name: return_type,
        },
    )?;
    hook.attach_to_method(method, vertex)?;

    for modifier in access::modifiers(name, flags) {
        let vertex = create(hook, sequencer, line, VertexKind::Modifier { modifier })?;
        hook.attach_to_method(method, vertex)?;
    }

    Ok(method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_graph::{EdgeKind, MemoryGraph};
    use crate::types::TypeCategory;
    use crate::vertex::ModifierKind;

    fn mstr(s: &'static str) -> &'static MStr {
        MStr::from_mutf8(s.as_bytes()).expect("valid modified UTF-8")
    }

    #[test]
    fn namespace_chain_and_file() {
        let sequencer = Sequencer::new();
        let mut graph = MemoryGraph::new();
        let class = project_class(&mut graph, &sequencer, "com/example/Foo").expect("project");

        assert_eq!(class.name.to_string(), "com.example.Foo");
        let names: Vec<String> = graph.vertices().map(|vertex| vertex.kind.to_string()).collect();
        assert_eq!(
            names,
            [
                "NAMESPACE_BLOCK com",
                "NAMESPACE_BLOCK com.example",
                "FILE com/example/Foo.class"
            ]
        );
        assert_eq!(graph.parent(class.namespace), Some(SequenceNumber(1)));
        assert!(graph.edges().iter().any(|edge| edge.kind == EdgeKind::SourceFile
            && edge.from == class.namespace
            && edge.to == class.file));
    }

    #[test]
    fn default_package_is_global() {
        let sequencer = Sequencer::new();
        let mut graph = MemoryGraph::new();
        let class = project_class(&mut graph, &sequencer, "Main").expect("project");
        let namespace = graph.vertex(class.namespace).expect("namespace");
        assert_eq!(namespace.kind.to_string(), "NAMESPACE_BLOCK <global>");
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn method_signature_vertices() {
        let sequencer = Sequencer::new();
        let mut graph = MemoryGraph::new();
        let class = project_class(&mut graph, &sequencer, "a/B").expect("project");
        let method = project_method(
            &mut graph,
            &sequencer,
            &class,
            "find",
            mstr("(Ljava/lang/String;J)[I"),
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            Some(12),
        )
        .expect("project");

        let Some(VertexKind::Method { full_name, .. }) = graph.vertex(method).map(|v| &v.kind)
        else {
            panic!("not a method");
        };
        assert_eq!(full_name, "a.B.find:(Ljava/lang/String;J)[I");
        assert_eq!(graph.vertex(method).and_then(|v| v.line), Some(12));

        let children: Vec<&VertexKind> = graph
            .children(method)
            .iter()
            .map(|&seq| &graph.vertex(seq).expect("child").kind)
            .collect();
        assert_eq!(children.len(), 5);
        assert!(
            graph
                .children(method)
                .iter()
                .all(|&seq| graph.vertex(seq).is_some_and(|v| v.line == Some(12)))
        );
        assert!(matches!(
            children[0],
            VertexKind::MethodParameterIn {
                index: 1,
                type_label: TypeCategory::Reference,
                evaluation_strategy: EvaluationStrategy::ByReference,
                ..
            }
        ));
        assert!(matches!(
            children[1],
            VertexKind::MethodParameterIn {
                index: 2,
                type_full_name: SemanticType::Long,
                evaluation_strategy: EvaluationStrategy::ByValue,
                ..
            }
        ));
        assert!(matches!(
            children[2],
            VertexKind::MethodReturn {
                evaluation_strategy: EvaluationStrategy::BySharing,
                ..
            }
        ));
        assert_eq!(
            children[3],
            &VertexKind::Modifier {
                modifier: ModifierKind::Static
            }
        );
        assert_eq!(
            children[4],
            &VertexKind::Modifier {
                modifier: ModifierKind::Public
            }
        );
        assert!(
            graph
                .edges()
                .iter()
                .any(|edge| edge.from == method && edge.to == class.file)
        );
    }

    #[test]
    fn bad_descriptor_is_reported() {
        let sequencer = Sequencer::new();
        let mut graph = MemoryGraph::new();
        let class = project_class(&mut graph, &sequencer, "a/B").expect("project");
        let result = project_method(
            &mut graph,
            &sequencer,
            &class,
            "broken",
            mstr("(Q)V"),
            MethodAccessFlags::empty(),
            None,
        );
        assert!(matches!(result, Err(ProjectionError::Descriptor(_))));
    }
}
