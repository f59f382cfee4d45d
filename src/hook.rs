//! Class-loading hook.
//!
//! [`ClassFileHook::on_class_load`] is what a JVMTI `ClassFileLoadHook`
//! callback (or a `java.lang.instrument` transformer) forwards to: it
//! filters the class, obtains a backend handle for the bytes under the
//! global transformation lock, runs the [`ClassTransformer`] and emits the
//! edited bytecode.
//!
//! [`PlatformRetransformer`] closes the loop for deferred semantics: it
//! transforms already loaded classes again and hands the new definitions to
//! the platform in one batch.

use std::sync::Arc;

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::backend::ClassFactory;
use crate::error::{InstrumenterError, Result};
use crate::transformation::TransformationType;
use crate::transformer::{ClassTransformer, Retransformer};

/// Failure reported by the platform's redefinition service.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("class {0} cannot be modified")]
    UnmodifiableClass(String),

    #[error("redefinition not supported: {0}")]
    Unsupported(String),

    #[error("invalid class definition for {class}: {reason}")]
    InvalidDefinition { class: String, reason: String },
}

/// New bytes for an already loaded class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDefinition {
    /// Dotted class name.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// The platform's batched class redefinition.
pub trait Redefiner: Send + Sync {
    fn redefine_classes(&self, definitions: &[ClassDefinition]) -> std::result::Result<(), PlatformError>;
}

/// `java/util/List` to `java.util.List`.
pub fn internal_to_java(name: &str) -> String {
    name.replace('/', ".")
}

/// `java.util.List` to `java/util/List`.
pub fn java_to_internal(name: &str) -> String {
    name.replace('.', "/")
}

/// Logs a failed class transformation, naming the edit site the backend
/// attributed the failure to.
pub fn failure_site(class_name: &str, error: &InstrumenterError) {
    match error.location() {
        Some(site) => error!("instrumenting {class_name} failed at {site}: {error}"),
        None => error!("instrumenting {class_name} failed: {error}"),
    }
}

pub struct ClassFileHook {
    factory: Arc<dyn ClassFactory>,
    transformer: Arc<ClassTransformer>,
}

impl ClassFileHook {
    pub fn new(factory: Arc<dyn ClassFactory>, transformer: Arc<ClassTransformer>) -> Self {
        ClassFileHook { factory, transformer }
    }

    pub fn transformer(&self) -> &Arc<ClassTransformer> {
        &self.transformer
    }

    /// Called once per class definition.
    ///
    /// `name` is the slash-separated internal name, `redefining` is set
    /// when an already loaded class is redefined. Returns the new class
    /// bytes, or `None` to keep `bytes`. Failures never escape: they are
    /// logged and the class stays as it is.
    pub fn on_class_load(
        &self,
        loader: Option<&str>,
        name: &str,
        redefining: bool,
        bytes: &[u8],
    ) -> Option<Vec<u8>> {
        let class_name = internal_to_java(name);
        if !self.transformer.should_instrument(name) {
            self.transformer.delete_semantics(&class_name);
            return None;
        }
        if self.transformer.is_instrumented(&class_name) {
            return None;
        }
        let kind = if redefining {
            TransformationType::Redefinition
        } else {
            TransformationType::OnLoad
        };
        debug!("{kind} of {class_name} from loader {}", loader.unwrap_or("<bootstrap>"));

        let _guard = self.transformer.lock();
        match self.instrument(name, bytes, kind) {
            Ok(edited) => edited,
            Err(e) => {
                failure_site(&class_name, &e);
                None
            }
        }
    }

    fn instrument(&self, name: &str, bytes: &[u8], kind: TransformationType) -> Result<Option<Vec<u8>>> {
        let class = self.factory.obtain_class_from_bytes(name, bytes)?;
        if self.transformer.transform(name, &*class, kind)? {
            Ok(Some(class.to_bytecode()?))
        } else {
            Ok(None)
        }
    }
}

/// Retransforms classes with deferred semantics through the platform.
pub struct PlatformRetransformer {
    factory: Arc<dyn ClassFactory>,
    redefiner: Arc<dyn Redefiner>,
}

impl PlatformRetransformer {
    pub fn new(factory: Arc<dyn ClassFactory>, redefiner: Arc<dyn Redefiner>) -> Self {
        PlatformRetransformer { factory, redefiner }
    }

    fn redefinition(
        &self,
        transformer: &ClassTransformer,
        class_name: &str,
    ) -> Result<Option<ClassDefinition>> {
        let Some(class) = self.factory.obtain_class(class_name, true)? else {
            debug!("{class_name} is not loaded, semantics stay deferred");
            return Ok(None);
        };
        let internal = java_to_internal(class_name);
        if !transformer.transform(&internal, &*class, TransformationType::Redefinition)? {
            return Ok(None);
        }
        Ok(Some(ClassDefinition { name: class_name.to_string(), bytes: class.to_bytecode()? }))
    }
}

impl Retransformer for PlatformRetransformer {
    fn retransform_assigned(&self, transformer: &ClassTransformer, class_names: &[String]) {
        let mut definitions = Vec::new();
        for class_name in class_names {
            if transformer.is_instrumented(class_name) {
                continue;
            }
            if !transformer.should_instrument(&java_to_internal(class_name)) {
                transformer.delete_semantics(class_name);
                continue;
            }
            match self.redefinition(transformer, class_name) {
                Ok(Some(definition)) => definitions.push(definition),
                Ok(None) => {}
                Err(e) => failure_site(class_name, &e),
            }
        }
        if definitions.is_empty() {
            return;
        }
        info!("redefining {} classes", definitions.len());
        if let Err(e) = self.redefiner.redefine_classes(&definitions) {
            warn!("redefinition of {} classes rejected: {e}", definitions.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_forms() {
        assert_eq!(internal_to_java("java/util/List"), "java.util.List");
        assert_eq!(java_to_internal("java.util.List"), "java/util/List");
        assert_eq!(internal_to_java("a/B$C"), "a.B$C");
    }

    #[test]
    fn platform_errors_render() {
        let err = PlatformError::UnmodifiableClass("java.lang.Object".into());
        assert_eq!(err.to_string(), "class java.lang.Object cannot be modified");
    }
}
