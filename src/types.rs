use core::fmt;
use displaydoc::Display;
use noak::descriptor::{BaseType, TypeDescriptor};

/// The type of a value as far as it can be inferred locally, either from an instruction operand or
/// from a declared type descriptor.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash)]
pub enum SemanticType {
    /// boolean
    Boolean,
    /// byte
    Byte,
    /// char
    Char,
    /// short
    Short,
    /// int
    Int,
    /// long
    Long,
    /// float
    Float,
    /// double
    Double,
    /// void
    Void,
    /// {0}
    Reference(String),
    /// {0}[]
    Array(Box<SemanticType>),
}

/// Coarse classification of a type, used as the type label of parameter vertices.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum TypeCategory {
    /// BOOLEAN
    Boolean,
    /// INTEGRAL
    Integral,
    /// LONG
    Long,
    /// FLOAT
    Float,
    /// DOUBLE
    Double,
    /// VOID
    Void,
    /// REFERENCE
    Reference,
    /// ARRAY
    Array,
}

/// How a value crosses a call boundary.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum EvaluationStrategy {
    /// BY_VALUE
    ByValue,
    /// BY_REFERENCE
    ByReference,
    /// BY_SHARING
    BySharing,
}

impl SemanticType {
    pub const OBJECT: &'static str = "java.lang.Object";

    pub fn object() -> Self {
        Self::Reference(Self::OBJECT.to_owned())
    }

    pub fn from_descriptor(descriptor: &TypeDescriptor<'_>) -> Self {
        let mut ty = match descriptor.base {
            BaseType::Boolean => Self::Boolean,
            BaseType::Byte => Self::Byte,
            BaseType::Char => Self::Char,
            BaseType::Short => Self::Short,
            BaseType::Integer => Self::Int,
            BaseType::Long => Self::Long,
            BaseType::Float => Self::Float,
            BaseType::Double => Self::Double,
            BaseType::Object(name) => Self::Reference(internal_to_dotted(&name.display().to_string())),
        };
        for _ in 0..descriptor.dimensions {
            ty = Self::Array(Box::new(ty));
        }
        ty
    }

    /// Parses a field descriptor such as `I` or `[Ljava/lang/String;`.
    pub fn parse_descriptor(descriptor: &str) -> Option<Self> {
        let element = descriptor.trim_start_matches('[');
        let mut ty = match element {
            "Z" => Self::Boolean,
            "B" => Self::Byte,
            "C" => Self::Char,
            "S" => Self::Short,
            "I" => Self::Int,
            "J" => Self::Long,
            "F" => Self::Float,
            "D" => Self::Double,
            _ => {
                let name = element.strip_prefix('L')?.strip_suffix(';')?;
                if name.is_empty() {
                    return None;
                }
                Self::Reference(internal_to_dotted(name))
            }
        };
        for _ in element.len()..descriptor.len() {
            ty = Self::Array(Box::new(ty));
        }
        Some(ty)
    }

    /// The type named by a class constant: an internal name, or a descriptor for array classes.
    pub fn from_class_name(name: &str) -> Self {
        if name.starts_with('[') {
            Self::parse_descriptor(name).unwrap_or_else(Self::object)
        } else {
            Self::Reference(internal_to_dotted(name))
        }
    }

    /// Number of operand stack words a value of this type occupies.
    pub fn width(&self) -> usize {
        match self {
            Self::Long | Self::Double => 2,
            _ => 1,
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::Reference(_) | Self::Array(_))
    }

    pub fn category(&self) -> TypeCategory {
        match self {
            Self::Boolean => TypeCategory::Boolean,
            Self::Byte | Self::Char | Self::Short | Self::Int => TypeCategory::Integral,
            Self::Long => TypeCategory::Long,
            Self::Float => TypeCategory::Float,
            Self::Double => TypeCategory::Double,
            Self::Void => TypeCategory::Void,
            Self::Reference(_) => TypeCategory::Reference,
            Self::Array(_) => TypeCategory::Array,
        }
    }

    /// Types the JVM operand stack represents as `int`.
    pub fn is_int_like(&self) -> bool {
        matches!(
            self,
            Self::Boolean | Self::Byte | Self::Char | Self::Short | Self::Int
        )
    }

    /// Whether a slot first seen with type `self` may be referenced again as `other` without
    /// being considered re-typed.
    pub fn is_compatible_with(&self, other: &SemanticType) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (a, b) if a.is_int_like() && b.is_int_like() => true,
            // `aload`/`astore` only know that the slot holds some reference.
            (Self::Reference(_) | Self::Array(_), Self::Reference(_) | Self::Array(_)) => true,
            _ => false,
        }
    }

    /// Renders the type back into its field descriptor form, e.g. `[Ljava/lang/String;`.
    pub fn descriptor(&self) -> String {
        match self {
            Self::Boolean => "Z".to_owned(),
            Self::Byte => "B".to_owned(),
            Self::Char => "C".to_owned(),
            Self::Short => "S".to_owned(),
            Self::Int => "I".to_owned(),
            Self::Long => "J".to_owned(),
            Self::Float => "F".to_owned(),
            Self::Double => "D".to_owned(),
            Self::Void => "V".to_owned(),
            Self::Reference(name) => format!("L{};", name.replace('.', "/")),
            Self::Array(element) => format!("[{}", element.descriptor()),
        }
    }
}

impl EvaluationStrategy {
    /// A reference handed into a call cannot be reseated by the callee.
    pub fn for_parameter(ty: &SemanticType) -> Self {
        if ty.is_primitive() {
            Self::ByValue
        } else {
            Self::ByReference
        }
    }

    /// A caller receiving a reference shares the callee's referent.
    pub fn for_return(ty: &SemanticType) -> Self {
        if ty.is_primitive() {
            Self::ByValue
        } else {
            Self::BySharing
        }
    }
}

/// `com/example/Foo` -> `com.example.Foo`
pub fn internal_to_dotted(name: &str) -> String {
    name.replace('/', ".")
}

/// A class name split into its package segments and simple name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QualifiedName {
    pub package: Vec<String>,
    pub simple_name: String,
}

impl QualifiedName {
    pub fn parse(internal_name: &str) -> Self {
        let mut segments: Vec<String> = internal_name
            .split(['/', '.'])
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .collect();
        let simple_name = segments.pop().unwrap_or_default();
        Self {
            package: segments,
            simple_name,
        }
    }

    pub fn package_name(&self) -> String {
        self.package.join(".")
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.package {
            write!(f, "{segment}.")?;
        }
        write!(f, "{}", self.simple_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noak::MStr;
    use noak::descriptor::MethodDescriptor;

    fn parse(descriptor: &'static str) -> (Vec<SemanticType>, SemanticType) {
        let descriptor = MethodDescriptor::parse(
            MStr::from_mutf8(descriptor.as_bytes()).expect("valid modified UTF-8"),
        )
        .expect("valid descriptor");
        let parameters = descriptor
            .parameters()
            .map(|ty| SemanticType::from_descriptor(&ty))
            .collect();
        let ret = descriptor
            .return_type()
            .map(|ty| SemanticType::from_descriptor(&ty))
            .unwrap_or(SemanticType::Void);
        (parameters, ret)
    }

    #[test]
    fn field_descriptors() {
        assert_eq!(SemanticType::parse_descriptor("J"), Some(SemanticType::Long));
        assert_eq!(
            SemanticType::parse_descriptor("[[Ljava/lang/String;"),
            Some(SemanticType::Array(Box::new(SemanticType::Array(Box::new(
                SemanticType::Reference("java.lang.String".to_owned())
            )))))
        );
        assert_eq!(SemanticType::parse_descriptor("L;"), None);
        assert_eq!(SemanticType::parse_descriptor("Q"), None);
        assert_eq!(
            SemanticType::from_class_name("[I"),
            SemanticType::Array(Box::new(SemanticType::Int))
        );
        assert_eq!(SemanticType::from_class_name("a/B").to_string(), "a.B");
        assert_eq!(SemanticType::Double.width(), 2);
        assert_eq!(SemanticType::object().width(), 1);
    }

    #[test]
    fn parameter_round_trip() {
        let string = SemanticType::Reference("java.lang.String".to_owned());
        let table = [
            ("(I)V", vec![SemanticType::Int], SemanticType::Void),
            (
                "(Ljava/lang/String;J)B",
                vec![string.clone(), SemanticType::Long],
                SemanticType::Byte,
            ),
            ("()Z", vec![], SemanticType::Boolean),
            (
                "([IDF)[[Ljava/lang/String;",
                vec![
                    SemanticType::Array(Box::new(SemanticType::Int)),
                    SemanticType::Double,
                    SemanticType::Float,
                ],
                SemanticType::Array(Box::new(SemanticType::Array(Box::new(string.clone())))),
            ),
            ("(CS)J", vec![SemanticType::Char, SemanticType::Short], SemanticType::Long),
        ];
        for (descriptor, parameters, ret) in table {
            let (actual_parameters, actual_ret) = parse(descriptor);
            assert_eq!(actual_parameters, parameters, "parameters of {descriptor}");
            assert_eq!(actual_ret, ret, "return type of {descriptor}");
        }
    }

    #[test]
    fn descriptor_fragments_render_back() {
        let (parameters, ret) = parse("([ILjava/util/List;J)[D");
        let fragments: Vec<String> = parameters.iter().map(SemanticType::descriptor).collect();
        assert_eq!(fragments, ["[I", "Ljava/util/List;", "J"]);
        assert_eq!(ret.descriptor(), "[D");
    }

    #[test]
    fn evaluation_strategies() {
        let (parameters, ret) = parse("(ILjava/lang/Object;[J)Ljava/lang/String;");
        let strategies: Vec<_> = parameters
            .iter()
            .map(EvaluationStrategy::for_parameter)
            .collect();
        assert_eq!(
            strategies,
            [
                EvaluationStrategy::ByValue,
                EvaluationStrategy::ByReference,
                EvaluationStrategy::ByReference,
            ]
        );
        assert_eq!(EvaluationStrategy::for_return(&ret), EvaluationStrategy::BySharing);
        assert_eq!(
            EvaluationStrategy::for_return(&SemanticType::Double),
            EvaluationStrategy::ByValue
        );
        assert_eq!(
            EvaluationStrategy::for_return(&SemanticType::Void),
            EvaluationStrategy::ByValue
        );
        assert_eq!(EvaluationStrategy::BySharing.to_string(), "BY_SHARING");
    }

    #[test]
    fn display_and_categories() {
        let ty = SemanticType::Array(Box::new(SemanticType::Reference("a.B".to_owned())));
        assert_eq!(ty.to_string(), "a.B[]");
        assert_eq!(ty.category(), TypeCategory::Array);
        assert_eq!(SemanticType::Short.category().to_string(), "INTEGRAL");
        assert!(SemanticType::Byte.is_compatible_with(&SemanticType::Int));
        assert!(!SemanticType::Int.is_compatible_with(&SemanticType::Float));
    }

    #[test]
    fn qualified_names() {
        let name = QualifiedName::parse("com/example/Foo");
        assert_eq!(name.package, ["com", "example"]);
        assert_eq!(name.simple_name, "Foo");
        assert_eq!(name.to_string(), "com.example.Foo");
        assert!(QualifiedName::parse("Foo").package.is_empty());
    }
}
