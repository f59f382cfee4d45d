//! The context a class is transformed in.

use std::fmt;

/// Chosen by the entry point and fixed for the duration of one
/// `transform` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformationType {
    /// Offline instrumentation of class files or jars.
    Static,
    /// Agent callback while the class is being loaded.
    OnLoad,
    /// VM-initiated retransformation of a loaded class.
    Retransformation,
    /// Explicit redefinition of a loaded class.
    Redefinition,
}

impl TransformationType {
    /// Whether members (finalizers, `run` overrides, initializers) may be
    /// added. Loaded classes must keep their shape.
    pub fn may_alter_structure(self) -> bool {
        matches!(self, TransformationType::Static | TransformationType::OnLoad)
    }
}

impl fmt::Display for TransformationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransformationType::Static => "static",
            TransformationType::OnLoad => "on-load",
            TransformationType::Retransformation => "retransformation",
            TransformationType::Redefinition => "redefinition",
        };
        f.write_str(name)
    }
}
