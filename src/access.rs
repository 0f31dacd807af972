use crate::vertex::ModifierKind;
use bitflags::bitflags;

bitflags! {
    /// Access flags on classes
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-4.html#jvms-4.1-200-E.1
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

bitflags! {
    /// Access flags on methods
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-4.html#jvms-4.6-200-A.1
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

pub const CONSTRUCTOR_NAME: &str = "<init>";
pub const CLASS_INITIALIZER_NAME: &str = "<clinit>";

/// Whether a subclass may override the method, i.e. whether calls to it dispatch dynamically.
pub fn is_overridable(name: &str, flags: MethodAccessFlags) -> bool {
    !flags.intersects(MethodAccessFlags::STATIC | MethodAccessFlags::PRIVATE | MethodAccessFlags::FINAL)
        && name != CONSTRUCTOR_NAME
        && name != CLASS_INITIALIZER_NAME
}

/// Modifier vertices to emit for a method, in a fixed order.
pub fn modifiers(name: &str, flags: MethodAccessFlags) -> Vec<ModifierKind> {
    let mut modifiers = Vec::new();
    if name == CONSTRUCTOR_NAME {
        modifiers.push(ModifierKind::Constructor);
    }
    let table = [
        (MethodAccessFlags::STATIC, ModifierKind::Static),
        (MethodAccessFlags::PUBLIC, ModifierKind::Public),
        (MethodAccessFlags::PROTECTED, ModifierKind::Protected),
        (MethodAccessFlags::PRIVATE, ModifierKind::Private),
        (MethodAccessFlags::ABSTRACT, ModifierKind::Abstract),
        (MethodAccessFlags::NATIVE, ModifierKind::Native),
    ];
    for (flag, modifier) in table {
        if flags.contains(flag) {
            modifiers.push(modifier);
        }
    }
    if is_overridable(name, flags) {
        modifiers.push(ModifierKind::Virtual);
    }
    modifiers
}
