//! Boundary to the bytecode backend.
//!
//! The decision engine never edits bytecode itself. It queries class
//! structure through [`ClassHandle`], [`BehaviorHandle`] and [`FieldHandle`]
//! and requests edits through [`CodeModifier`] (whole-method and class
//! edits) and [`StatementModifier`] (edits at a single call site, allocation
//! or field access, handed to a [`BehaviorEditor`] while the backend walks a
//! method body).
//!
//! # Handle lifetime
//!
//! Backend handles are not reference counted. Every handle is returned
//! wrapped in a [`Scoped`] guard that calls [`Release::release`] exactly
//! once when it goes out of scope, so handles obtained only for a lookup
//! (superclass, interface, inherited member) cannot leak:
//!
//! ```rust,ignore
//! if let Some(superclass) = class.superclass()? {
//!     // use `superclass` like a `&dyn ClassHandle`
//!     let found = superclass.annotation(AnnotationKind::Monitor, false);
//! } // released here
//! ```

pub mod parsed;

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::error::Result;
use crate::semantics::{
    Annotation, AnnotationKind, ConfigurationChange, Monitor, NotifyValue, StreamType, Timer,
    TimerState,
};

/// Explicit release of a backend resource.
pub trait Release {
    fn release(&mut self);
}

/// A guard that releases a backend handle when dropped.
pub struct Scoped<H: ?Sized + Release> {
    handle: Box<H>,
}

impl<H: ?Sized + Release> Scoped<H> {
    pub fn new(handle: Box<H>) -> Self {
        Scoped { handle }
    }
}

impl<H: ?Sized + Release> Deref for Scoped<H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.handle
    }
}

impl<H: ?Sized + Release> DerefMut for Scoped<H> {
    fn deref_mut(&mut self) -> &mut H {
        &mut self.handle
    }
}

impl<H: ?Sized + Release> Drop for Scoped<H> {
    fn drop(&mut self) {
        self.handle.release();
    }
}

impl<H: ?Sized + Release> fmt::Debug for Scoped<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Scoped(..)")
    }
}

pub type ClassRef = Scoped<dyn ClassHandle>;
pub type BehaviorRef = Scoped<dyn BehaviorHandle>;
pub type FieldRef = Scoped<dyn FieldHandle>;

/// A loaded or loading class.
///
/// Names are dotted (`java.lang.Thread`).
pub trait ClassHandle: Release {
    fn name(&self) -> &str;

    fn is_interface(&self) -> bool;

    fn is_abstract(&self) -> bool;

    fn is_primitive(&self) -> bool;

    /// Whether this class is, extends or implements `type_name`.
    fn is_instance_of(&self, type_name: &str) -> bool;

    /// Annotation of `kind` declared directly on this class. `prune`
    /// removes it from the emitted bytecode.
    fn annotation(&self, kind: AnnotationKind, prune: bool) -> Option<Annotation>;

    fn declared_field_count(&self) -> Result<usize>;

    fn declared_field(&self, index: usize) -> Result<FieldRef>;

    fn declared_behavior_count(&self) -> Result<usize>;

    fn declared_behavior(&self, index: usize) -> Result<BehaviorRef>;

    fn interface_count(&self) -> Result<usize>;

    fn interface(&self, index: usize) -> Result<ClassRef>;

    fn superclass(&self) -> Result<Option<ClassRef>>;

    /// The enclosing class of a nested class.
    fn declaring_class(&self) -> Result<Option<ClassRef>>;

    fn declaring_class_name(&self) -> Option<String>;

    /// The behavior declared here with the same name and descriptor.
    fn find_signature(&self, name: &str, descriptor: &str) -> Result<Option<BehaviorRef>>;

    fn to_bytecode(&self) -> Result<Vec<u8>>;
}

/// A method or constructor.
pub trait BehaviorHandle: Release {
    fn name(&self) -> &str;

    /// JVM method descriptor, for example `(I)V`.
    fn descriptor(&self) -> &str;

    fn declaring_class_name(&self) -> &str;

    fn declaring_class(&self) -> Result<ClassRef>;

    fn annotation(&self, kind: AnnotationKind, prune: bool) -> Option<Annotation>;

    fn is_static(&self) -> bool;

    fn is_abstract(&self) -> bool;

    fn is_native(&self) -> bool;

    fn is_constructor(&self) -> bool;

    fn is_finalize(&self) -> bool;

    fn parameter_count(&self) -> Result<usize>;

    /// Java source form of a parameter type, for example `java.lang.String[]`.
    fn parameter_type_name(&self, index: usize) -> Result<String>;

    /// Walks the body and reports each edit site to `editor`.
    fn instrument(&self, editor: &mut dyn BehaviorEditor) -> Result<()>;
}

pub trait FieldHandle: Release {
    fn name(&self) -> &str;

    /// Java source form of the field type.
    fn type_name(&self) -> &str;

    fn declaring_class_name(&self) -> &str;

    fn annotation(&self, kind: AnnotationKind, prune: bool) -> Option<Annotation>;

    fn is_static(&self) -> bool;
}

/// Method-level and class-level edits.
///
/// Implementations are driven under the transformer's global lock and may
/// use interior mutability.
pub trait CodeModifier: Send + Sync {
    fn notify_timer_call(
        &self,
        behavior: &dyn BehaviorHandle,
        state: TimerState,
        timer: &Timer,
        before: bool,
    ) -> Result<()>;

    /// Registers the executing thread. `behavior` is `None` when a default
    /// `run` method must be added. Returns whether code was changed.
    fn notify_register_thread(
        &self,
        class: &dyn ClassHandle,
        behavior: Option<&dyn BehaviorHandle>,
        is_main: bool,
    ) -> Result<bool>;

    fn value_notification(
        &self,
        behavior: &dyn BehaviorHandle,
        rec_id: Option<&str>,
        annotation: &NotifyValue,
    ) -> Result<()>;

    fn instrument_random_access_file(&self, class: &dyn ClassHandle) -> Result<()>;

    fn instrument_socket_output_stream(&self, class: &dyn ClassHandle) -> Result<()>;

    fn instrument_socket_input_stream(&self, class: &dyn ClassHandle) -> Result<()>;

    fn instrument_end_system(
        &self,
        behavior: &dyn BehaviorHandle,
        print_statistics: bool,
        invoke: &str,
    ) -> Result<()>;

    fn instrument_start_system(
        &self,
        behavior: &dyn BehaviorHandle,
        shutdown_hook: bool,
        invoke: &str,
    ) -> Result<()>;

    fn instrument_configuration_change(
        &self,
        behavior: &dyn BehaviorHandle,
        annotation: &ConfigurationChange,
    ) -> Result<()>;

    fn instrument_finalize(&self, behavior: &dyn BehaviorHandle) -> Result<()>;

    fn instrument_constructor(&self, behavior: &dyn BehaviorHandle) -> Result<()>;

    fn instrument_timing(
        &self,
        behavior: &dyn BehaviorHandle,
        group: &Monitor,
        exclude: bool,
        direct_id: bool,
    ) -> Result<()>;

    fn add_registering_initializer(&self, class: &dyn ClassHandle, group: &Monitor) -> Result<()>;

    fn instrument_variability_handler(&self, behavior: &dyn BehaviorHandle) -> Result<()>;

    fn add_finalizer(&self, class: &dyn ClassHandle, overhead: bool) -> Result<()>;

    fn add_class_annotation(&self, class: &dyn ClassHandle, annotation: &Annotation) -> Result<()>;

    fn add_behavior_annotation(
        &self,
        behavior: &dyn BehaviorHandle,
        annotation: &Annotation,
    ) -> Result<()>;
}

/// Edits and queries at one site inside a method body.
///
/// `mc_*` queries describe the method call at the site, `field_*` queries
/// the accessed field.
pub trait StatementModifier {
    fn replace_created_type(&mut self, new_type: &str, account_memory: bool) -> Result<()>;

    fn append_memory_allocated(&mut self, context_id: Option<&str>) -> Result<()>;

    fn notify_value_changed(&mut self, rec_id: &str) -> Result<()>;

    /// Routes a created stream through an instrumented delegate. A `None`
    /// stream type means the type is derived from the URL protocol.
    fn rechain_stream_creation(&mut self, stream: Option<StreamType>, input: bool) -> Result<()>;

    fn notify_thread_started(&mut self, context_id: Option<&str>) -> Result<()>;

    fn notify_io_datagram_transmission(&mut self, context_id: Option<&str>, write: bool) -> Result<()>;

    fn notify_context_change(&mut self, context_id: Option<&str>) -> Result<()>;

    fn mc_declaring_class_name(&self) -> Result<String>;

    fn mc_declaring_class_instance_of(&self, type_name: &str) -> Result<bool>;

    fn mc_parameter_count(&self) -> Result<usize>;

    fn mc_parameter_type_name(&self, index: usize) -> Result<String>;

    fn mc_is_static(&self) -> Result<bool>;

    fn field_annotation(&self, kind: AnnotationKind) -> Option<Annotation>;

    fn field_declaring_class_name(&self) -> Result<String>;
}

/// Callbacks invoked by [`BehaviorHandle::instrument`] for each edit site.
pub trait BehaviorEditor {
    fn edit_field_access(
        &mut self,
        site: &mut dyn StatementModifier,
        name: &str,
        type_name: &str,
        is_writer: bool,
    ) -> Result<()>;

    fn edit_method_call(
        &mut self,
        site: &mut dyn StatementModifier,
        name: &str,
        descriptor: &str,
        target_class: &str,
    ) -> Result<()>;

    fn edit_new_expression(&mut self, site: &mut dyn StatementModifier, type_name: &str) -> Result<()>;

    fn edit_new_array(&mut self, site: &mut dyn StatementModifier) -> Result<()>;
}

/// Obtains class handles for the class-loading hook.
pub trait ClassFactory: Send + Sync {
    /// Handle for a class being defined from `bytes`.
    fn obtain_class_from_bytes(&self, name: &str, bytes: &[u8]) -> Result<ClassRef>;

    /// Handle for an already known class, `None` if it is unknown.
    /// `redefinition` asks for the currently loaded definition.
    fn obtain_class(&self, name: &str, redefinition: bool) -> Result<Option<ClassRef>>;
}
