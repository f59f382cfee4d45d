//! Class transformation orchestrator.
//!
//! [`ClassTransformer::transform`] decides, for one class, which edits the
//! backend has to perform:
//!
//! 1. classes carrying the `Instrumented` marker, or already recorded in
//!    the instrumented-class ledger, are left alone,
//! 2. platform stream classes get dedicated instrumentation,
//! 3. the recorder's own classes are skipped,
//! 4. members of concrete classes are scanned when deferred semantics are
//!    waiting for the class or member analysis is enabled for it,
//! 5. thread classes get their `run` method instrumented,
//! 6. the class monitoring group is registered for recording.
//!
//! Afterwards the class is always entered into the ledger and its deferred
//! semantics are dropped. Passes that may alter class structure then ask
//! the [`Retransformer`] to revisit the classes that received deferred
//! semantics in the meantime.
//!
//! All of this runs under one reentrant lock, so class loads on different
//! threads are serialized while a retransformation triggered from within
//! `transform` may re-enter on the same thread.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};

use crate::backend::{BehaviorHandle, ClassHandle, CodeModifier};
use crate::config::{AnnotationSearchType, Configuration, ScopeType};
use crate::editor::{EditorPool, MethodEditPolicy, SemanticsCollector, TrackedFields};
use crate::error::{InstrumenterError, Result};
use crate::recorder::{MonitoringGroupSettings, RecorderFrontend};
use crate::registry::{member_key, AssignmentRegistry, ClassAssignments};
use crate::resolver::Resolver;
use crate::semantics::{
    trim_id, Annotation, ConfigurationChange, EndSystem, ExcludeFromMonitoring,
    GroupAccountingType, Instrumented, MethodInstrumented, Monitor, NotifyValue, ResourceType,
    StartSystem, Timer, TimerPosition, ValueChange, VariabilityHandler,
};
use crate::transformation::TransformationType;

/// Slash-separated package of the recorder runtime.
pub const RECORDER_PACKAGE: &str = "de/uni_hildesheim/sse/monitoring/runtime/";

const RECORDER_PACKAGE_DOTTED: &str = "de.uni_hildesheim.sse.monitoring.runtime.";
const SYSTEM_PACKAGE: &str = "de/uni_hildesheim/sse/system";

const SOCKET_INPUT_STREAM: &str = "java/net/SocketInputStream";
const SOCKET_OUTPUT_STREAM: &str = "java/net/SocketOutputStream";
const RANDOM_ACCESS_FILE: &str = "java/io/RandomAccessFile";

const JAVA_LIB_PREFIXES: [&str; 10] = [
    "javax/",
    "com/sun/",
    "com/oracle/",
    "sun/",
    "sunw/",
    "org/xml",
    "org/w3c",
    "org/omg",
    "org/jcp",
    "org/ietf",
];

const JAVA_LANG_THREAD: &str = "java.lang.Thread";
const JAVA_LANG_RUNNABLE: &str = "java.lang.Runnable";
const JAVA_IO_SERIALIZABLE: &str = "java.io.Serializable";
const STRING_ARRAY: &str = "java.lang.String[]";
const SERIAL_VERSION_FIELD: &str = "serialVersionUID";

/// Call targets that never receive deferred semantics.
const UNASSIGNABLE: [&str; 13] = [
    "int",
    "boolean",
    "byte",
    "short",
    "float",
    "double",
    "long",
    "java.lang.Object",
    "java.lang.Class",
    "java.lang.String",
    "java.lang.StringBuilder",
    "java.lang.StringBuffer",
    "java.io.PrintStream",
];

/// Decides whether a failed method edit is skipped.
pub trait MethodErrorHandler: Send + Sync {
    /// Returns `true` to continue with the next method of the class,
    /// `false` to abort the transformation of the whole class.
    fn handle_method_error(&self, error: &InstrumenterError) -> bool;
}

/// Revisits classes that received deferred semantics after they were
/// loaded.
pub trait Retransformer: Send + Sync {
    /// `class_names` is a snapshot taken by the transformer; transforming
    /// the named classes may change the registry freely.
    fn retransform_assigned(&self, transformer: &ClassTransformer, class_names: &[String]);
}

/// Ledger of classes (dotted names) the transformer has processed.
#[derive(Debug, Default)]
pub struct InstrumentedClasses {
    names: Mutex<HashSet<String>>,
}

impl InstrumentedClasses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the class was already recorded.
    pub fn insert(&self, class_name: &str) -> bool {
        self.names.lock().insert(class_name.to_string())
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.names.lock().contains(class_name)
    }

    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.lock().is_empty()
    }
}

/// Forwards call-site semantics to the registry, filtering targets that
/// are instrumented already or must never be retransformed.
struct AssignmentCollector {
    instrumented: Arc<InstrumentedClasses>,
    registry: Arc<AssignmentRegistry>,
}

impl SemanticsCollector for AssignmentCollector {
    fn assign_semantics(&self, class_name: &str, member: &str, semantics: &Arc<Monitor>) {
        if self.instrumented.contains(class_name) || !accepts_assignment(class_name) {
            return;
        }
        debug!("deferring {member} of {class_name} to group {:?}", semantics.ids);
        self.registry.assign(class_name, member.to_string(), Arc::clone(semantics));
    }
}

fn accepts_assignment(class_name: &str) -> bool {
    !(class_name.starts_with(RECORDER_PACKAGE_DOTTED) || UNASSIGNABLE.contains(&class_name))
}

pub struct ClassTransformer {
    config: Arc<Configuration>,
    modifier: Arc<dyn CodeModifier>,
    recorder: Option<Arc<dyn RecorderFrontend>>,
    retransformer: Option<Box<dyn Retransformer>>,
    error_handler: Option<Box<dyn MethodErrorHandler>>,
    is_static: bool,
    instrumented: Arc<InstrumentedClasses>,
    registered: Mutex<HashSet<String>>,
    registry: Arc<AssignmentRegistry>,
    collector: Arc<dyn SemanticsCollector>,
    editors: EditorPool,
    main_count: AtomicUsize,
    lock: ReentrantMutex<()>,
}

impl ClassTransformer {
    /// A transformer for `config`. Static instrumentation is taken from
    /// [`Configuration::static_instrumentation`].
    pub fn new(config: Arc<Configuration>, modifier: Arc<dyn CodeModifier>) -> Self {
        let instrumented = Arc::new(InstrumentedClasses::new());
        let registry = Arc::new(AssignmentRegistry::new());
        let collector: Arc<dyn SemanticsCollector> = Arc::new(AssignmentCollector {
            instrumented: Arc::clone(&instrumented),
            registry: Arc::clone(&registry),
        });
        let editors = EditorPool::new(Arc::clone(&config), Arc::new(TrackedFields::new()));
        ClassTransformer {
            is_static: config.static_instrumentation,
            config,
            modifier,
            recorder: None,
            retransformer: None,
            error_handler: None,
            instrumented,
            registered: Mutex::new(HashSet::new()),
            registry,
            collector,
            editors,
            main_count: AtomicUsize::new(0),
            lock: ReentrantMutex::new(()),
        }
    }

    /// Recorder receiving group registrations in dynamic mode.
    pub fn with_recorder(mut self, recorder: Arc<dyn RecorderFrontend>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_retransformer(mut self, retransformer: Box<dyn Retransformer>) -> Self {
        self.retransformer = Some(retransformer);
        self
    }

    pub fn with_error_handler(mut self, handler: Box<dyn MethodErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn registry(&self) -> &AssignmentRegistry {
        &self.registry
    }

    pub fn instrumented(&self) -> &InstrumentedClasses {
        &self.instrumented
    }

    pub fn tracked_fields(&self) -> &TrackedFields {
        self.editors.tracked_fields()
    }

    /// Number of idle edit policies in the pool.
    pub fn idle_editors(&self) -> usize {
        self.editors.idle()
    }

    /// Number of `main(String[])` methods that received lifecycle
    /// injection. Never exceeds one per transformer.
    pub fn main_count(&self) -> usize {
        self.main_count.load(Ordering::SeqCst)
    }

    /// The global transformation lock.
    ///
    /// Callers that obtain a class handle and emit its bytecode hold this
    /// around the whole sequence; `transform` takes it again.
    pub fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// Whether `class_name` (dotted) went through `transform` already.
    pub fn is_instrumented(&self, class_name: &str) -> bool {
        self.instrumented.contains(class_name)
    }

    /// Drops the deferred semantics of a class (dotted name).
    pub fn delete_semantics(&self, class_name: &str) {
        self.registry.delete(class_name);
    }

    /// Whether a class, given by its slash-separated name, is subject to
    /// instrumentation at all.
    pub fn should_instrument(&self, name: &str) -> bool {
        let config = &self.config;
        if config.instrument_java_lib
            && (name == SOCKET_INPUT_STREAM || name == SOCKET_OUTPUT_STREAM || name == RANDOM_ACCESS_FILE)
        {
            return true;
        }
        if name.starts_with(RECORDER_PACKAGE) {
            return false;
        }
        let java_class = name == "sun/misc/Cleaner"
            || (!config.instrument_java_lib && JAVA_LIB_PREFIXES.iter().any(|p| name.starts_with(p)));
        let additional = (config.instrument_instrumenter && name.starts_with("javassist/"))
            || name.starts_with("com/sun/jmx/remote/internal/")
            || name.starts_with("sun/reflect/Generated");
        if java_class || additional || name.starts_with(SYSTEM_PACKAGE) {
            return false;
        }
        !config.exclude_prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }

    /// Processes one class. `name` is the slash-separated internal name.
    ///
    /// Returns whether the class was modified. A backend failure aborts
    /// the class, unless the [`MethodErrorHandler`] skips the failing
    /// method; an aborted class is not entered into the ledger. Deferred
    /// semantics of the class are consumed even when the transform aborts.
    pub fn transform(
        &self,
        name: &str,
        class: &dyn ClassHandle,
        kind: TransformationType,
    ) -> Result<bool> {
        let _guard = self.lock.lock();
        let class_name = class.name().to_string();
        let assigned = if self.config.scope_type == ScopeType::GroupInherit {
            self.registry.delete(&class_name)
        } else {
            None
        };
        let resolver = Resolver::new(&self.config);

        let mut transformed = false;
        let marked = resolver.class::<Instrumented>(class, AnnotationSearchType::None).is_some();
        if marked || self.instrumented.contains(&class_name) {
            debug!("{class_name} is instrumented already, {kind} pass skipped");
        } else {
            transformed = self.transform_class(name, class, kind, assigned.as_ref(), &resolver)?;
            if transformed && self.is_static {
                self.modifier.add_class_annotation(class, &Annotation::Instrumented(Instrumented {}))?;
            }
        }
        self.instrumented.insert(&class_name);
        self.registry.delete(&class_name);

        if kind.may_alter_structure() {
            let pending = self.registry.pending();
            if !pending.is_empty() {
                match &self.retransformer {
                    Some(retransformer) => {
                        info!("retransforming {} classes with deferred semantics", pending.len());
                        retransformer.retransform_assigned(self, &pending);
                    }
                    None => debug!("{} classes wait for deferred semantics", pending.len()),
                }
            }
        }
        Ok(transformed)
    }

    fn transform_class(
        &self,
        name: &str,
        class: &dyn ClassHandle,
        kind: TransformationType,
        assigned: Option<&ClassAssignments>,
        resolver: &Resolver<'_>,
    ) -> Result<bool> {
        let config = &self.config;
        if name == SOCKET_INPUT_STREAM && config.is_accountable(ResourceType::NetIo) {
            self.modifier.instrument_socket_input_stream(class)?;
            return Ok(true);
        }
        if name == SOCKET_OUTPUT_STREAM && config.is_accountable(ResourceType::NetIo) {
            self.modifier.instrument_socket_output_stream(class)?;
            return Ok(true);
        }
        if name == RANDOM_ACCESS_FILE && config.is_accountable(ResourceType::FileIo) {
            self.modifier.instrument_random_access_file(class)?;
            return Ok(true);
        }
        if name.starts_with(RECORDER_PACKAGE) {
            return Ok(false);
        }

        let group = if kind == TransformationType::Redefinition {
            None
        } else {
            resolver.class_monitor(class).map(Arc::new)
        };
        let mut transformed = false;
        if !class.is_interface() && (assigned.is_some() || self.analyze_members(class)) {
            transformed |= self.scan_members(class, kind, group.as_ref(), assigned, resolver)?;
        }
        if class.is_instance_of(JAVA_LANG_THREAD) || class.is_instance_of(JAVA_LANG_RUNNABLE) {
            transformed |= self.instrument_thread_run(class, kind)?;
        }
        if !class.is_interface() && assigned.is_none() {
            transformed |= self.register_recorder_id(group.as_deref(), class)?;
        }
        Ok(transformed)
    }

    fn analyze_members(&self, class: &dyn ClassHandle) -> bool {
        match &self.config.analyze_members {
            None => true,
            Some(names) => {
                names.contains(class.name())
                    || class.declaring_class_name().map_or(false, |outer| names.contains(&outer))
            }
        }
    }

    fn scan_members(
        &self,
        class: &dyn ClassHandle,
        kind: TransformationType,
        group: Option<&Arc<Monitor>>,
        assigned: Option<&ClassAssignments>,
        resolver: &Resolver<'_>,
    ) -> Result<bool> {
        for index in 0..class.declared_field_count()? {
            let field = class.declared_field(index)?;
            if let Some(change) = resolver.field::<ValueChange>(&*field) {
                self.tracked_fields().put(field.declaring_class_name(), field.name(), trim_id(&change.id));
            }
        }

        let mut policy =
            self.editors.acquire(group.cloned(), false, Some(Arc::clone(&self.collector)), false);
        let scanned = self.scan_behaviors(class, kind, group, assigned, &mut policy, resolver);
        self.editors.release(policy);
        let (mut transformed, has_finalizer) = scanned?;

        if kind.may_alter_structure() && !has_finalizer && self.config.memory_accounting.at_finalizer() {
            self.modifier.add_finalizer(class, false)?;
            transformed = true;
        }
        Ok(transformed)
    }

    /// Returns whether a behavior changed and whether a finalizer exists.
    fn scan_behaviors(
        &self,
        class: &dyn ClassHandle,
        kind: TransformationType,
        group: Option<&Arc<Monitor>>,
        assigned: Option<&ClassAssignments>,
        policy: &mut MethodEditPolicy,
        resolver: &Resolver<'_>,
    ) -> Result<(bool, bool)> {
        let mut transformed = false;
        let mut has_finalizer = false;
        for index in 0..class.declared_behavior_count()? {
            let behavior = class.declared_behavior(index)?;
            has_finalizer |= behavior.is_finalize();
            if behavior.is_abstract() || behavior.is_native() {
                continue;
            }
            let inherited_group = assigned
                .and_then(|members| members.get(&member_key(behavior.name(), behavior.descriptor())))
                .cloned();
            let inherited = inherited_group.is_some();
            if inherited {
                policy.set_group(inherited_group.clone(), false, Some(Arc::clone(&self.collector)), true);
            }
            let semantics = inherited_group.or_else(|| group.cloned());

            match self.process_behavior(class, &*behavior, semantics.as_deref(), inherited, kind, policy, resolver) {
                Ok(changed) => transformed |= changed,
                Err(e) => {
                    warn!(
                        "instrumenting {}.{}{} failed: {e}",
                        class.name(),
                        behavior.name(),
                        behavior.descriptor()
                    );
                    if !self.handle_method_error(&e) {
                        return Err(e);
                    }
                }
            }

            if inherited {
                policy.set_group(group.cloned(), false, Some(Arc::clone(&self.collector)), false);
            }
        }
        Ok((transformed, has_finalizer))
    }

    fn handle_method_error(&self, error: &InstrumenterError) -> bool {
        self.error_handler.as_ref().map_or(false, |handler| handler.handle_method_error(error))
    }

    #[allow(clippy::too_many_arguments)]
    fn process_behavior(
        &self,
        class: &dyn ClassHandle,
        behavior: &dyn BehaviorHandle,
        group: Option<&Monitor>,
        inherited: bool,
        kind: TransformationType,
        policy: &mut MethodEditPolicy,
        resolver: &Resolver<'_>,
    ) -> Result<bool> {
        let mut changed = self.do_method(behavior, group, inherited, kind, policy, resolver)?;
        if self.is_first_main(behavior)? {
            changed |= self.do_first_main(class, behavior, resolver)?;
            self.main_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(changed)
    }

    fn is_first_main(&self, behavior: &dyn BehaviorHandle) -> Result<bool> {
        if self.main_count.load(Ordering::SeqCst) != 0 || behavior.name() != "main" {
            return Ok(false);
        }
        Ok(behavior.parameter_count()? == 1 && behavior.parameter_type_name(0)? == STRING_ARRAY)
    }

    /// Lifecycle injection for the program entry point.
    fn do_first_main(
        &self,
        class: &dyn ClassHandle,
        behavior: &dyn BehaviorHandle,
        resolver: &Resolver<'_>,
    ) -> Result<bool> {
        let mut modified = false;
        let main_default = self.config.main_default;
        if main_default.at_start() || main_default.at_shutdown() {
            if resolver.behavior::<StartSystem>(behavior, AnnotationSearchType::None).is_none() {
                self.modifier.instrument_start_system(behavior, main_default.at_shutdown(), "")?;
                modified = true;
            }
        }
        if main_default.at_stop() {
            if resolver.behavior::<EndSystem>(behavior, AnnotationSearchType::None).is_none() {
                self.modifier.instrument_end_system(behavior, self.config.print_statistics, "")?;
                modified = true;
            }
        }
        if class.is_instance_of(JAVA_LANG_THREAD) {
            modified |= self.modifier.notify_register_thread(class, None, false)?;
        }
        Ok(modified)
    }

    /// Edits one method. `group` is the class group or the deferred group
    /// for this member; `inherited` tells which.
    fn do_method(
        &self,
        behavior: &dyn BehaviorHandle,
        group: Option<&Monitor>,
        inherited: bool,
        kind: TransformationType,
        policy: &mut MethodEditPolicy,
        resolver: &Resolver<'_>,
    ) -> Result<bool> {
        let search = self.config.annotation_search;
        let modifier = &*self.modifier;
        let end_system = resolver.behavior::<EndSystem>(behavior, AnnotationSearchType::None);
        let config_change = resolver.behavior::<ConfigurationChange>(behavior, search);
        let local = resolver.behavior::<Monitor>(behavior, search);
        let timer = resolver.behavior::<Timer>(behavior, search);
        let var_handler = resolver.behavior::<VariabilityHandler>(behavior, search);
        let excluded = resolver.behavior::<ExcludeFromMonitoring>(behavior, search).is_some();
        let manual_detection = !self.config.configuration_detection && config_change.is_some();

        // a local group wins over the class group unless the method is excluded
        let group = match &local {
            Some(local) if !excluded => {
                let declaring = behavior.declaring_class()?;
                self.register_recorder_id(Some(local), &*declaring)?;
                Some(local)
            }
            _ => group,
        };
        let start_system = resolver.behavior::<StartSystem>(behavior, AnnotationSearchType::None);

        let mut modified = false;
        if let Some(timer) = timer.as_ref().filter(|_| !inherited) {
            modified |= self.instrument_timer(behavior, timer)?;
        }
        let memory = policy.memory_accounting();
        if memory.at_finalizer() {
            modifier.instrument_finalize(behavior)?;
            modified = true;
        }
        if memory.at_constructor() && behavior.is_constructor() {
            modifier.instrument_constructor(behavior)?;
            modified = true;
        }

        let timed_group = group.filter(|_| !inherited);
        if !excluded {
            if let Some(group) = timed_group {
                modifier.instrument_timing(behavior, group, false, local.is_some())?;
                modified = true;
            }
            // LOCAL accounting edits bodies of locally annotated methods only
            if policy.group_accounting() != GroupAccountingType::Local || local.is_some() {
                modified |= self.edit_body(behavior, kind, policy, resolver)?;
            }
            if var_handler.is_some() && !inherited && !manual_detection {
                modifier.instrument_variability_handler(behavior)?;
                modified = true;
            }
        } else if let Some(group) = timed_group {
            modifier.instrument_timing(behavior, group, true, true)?;
            modified = true;
        }

        if let Some(change) = config_change.as_ref().filter(|_| !inherited) {
            modifier.instrument_configuration_change(behavior, change)?;
            modified = true;
        }
        modified |= self.process_notifications(behavior, group, resolver)?;
        if let Some(start) = &start_system {
            let declaring = behavior.declaring_class()?;
            modifier.notify_register_thread(&*declaring, Some(behavior), true)?;
            modifier.instrument_start_system(behavior, start.shutdown_hook, &start.invoke)?;
            modified = true;
        }
        if let Some(end) = &end_system {
            modifier.instrument_end_system(behavior, self.config.print_statistics, &end.invoke)?;
            modified = true;
        }
        Ok(modified)
    }

    /// Walks the method body with `policy`. Redefinitions continue the
    /// memory layering recorded on the method by an earlier pass.
    fn edit_body(
        &self,
        behavior: &dyn BehaviorHandle,
        kind: TransformationType,
        policy: &mut MethodEditPolicy,
        resolver: &Resolver<'_>,
    ) -> Result<bool> {
        let redefinition = kind == TransformationType::Redefinition;
        if redefinition {
            if let Some(record) = resolver.behavior::<MethodInstrumented>(behavior, AnnotationSearchType::None) {
                policy.set_instrumentation_record(Some(&record));
            }
        }
        let walked = behavior.instrument(policy);
        let mut modified = policy.take_edits() > 0;
        if redefinition {
            let mem = policy.mem_record();
            policy.set_instrumentation_record(None);
            walked?;
            if mem > 0 {
                let marker = Annotation::MethodInstrumented(MethodInstrumented { mem });
                self.modifier.add_behavior_annotation(behavior, &marker)?;
                modified = true;
            }
        } else {
            walked?;
        }
        Ok(modified)
    }

    fn instrument_timer(&self, behavior: &dyn BehaviorHandle, timer: &Timer) -> Result<bool> {
        let state = timer.state;
        let position = if timer.affect_at == TimerPosition::Default
            || state.default_position() == TimerPosition::Both
        {
            state.default_position()
        } else {
            timer.affect_at
        };
        let (beginning, end) = match position {
            TimerPosition::Both => state.split(),
            TimerPosition::Beginning => (Some(state), None),
            TimerPosition::End => (None, Some(state)),
            TimerPosition::Default => (None, None),
        };
        if let Some(beginning) = beginning {
            self.modifier.notify_timer_call(behavior, beginning, timer, true)?;
        }
        if let Some(end) = end {
            self.modifier.notify_timer_call(behavior, end, timer, false)?;
        }
        Ok(beginning.is_some() || end.is_some())
    }

    fn process_notifications(
        &self,
        behavior: &dyn BehaviorHandle,
        group: Option<&Monitor>,
        resolver: &Resolver<'_>,
    ) -> Result<bool> {
        let Some(notify) = resolver.behavior::<NotifyValue>(behavior, AnnotationSearchType::None) else {
            return Ok(false);
        };
        let rec_id = match trim_id(&notify.id) {
            "" => group.and_then(|group| self.config.rec_id(&group.ids)),
            id => Some(id.to_string()),
        };
        self.modifier.value_notification(behavior, rec_id.as_deref(), &notify)?;
        Ok(true)
    }

    /// Thread registration for `Thread` and `Runnable` classes.
    fn instrument_thread_run(&self, class: &dyn ClassHandle, kind: TransformationType) -> Result<bool> {
        if class.is_interface() || class.is_abstract() {
            return Ok(false);
        }
        let mut modified = false;
        let mut found = false;
        for index in 0..class.declared_behavior_count()? {
            let behavior = class.declared_behavior(index)?;
            if behavior.name() == "run" && behavior.parameter_count()? == 0 {
                if !behavior.is_abstract() {
                    modified = self.modifier.notify_register_thread(class, Some(&*behavior), false)?;
                }
                found = true;
            }
        }
        if !found && kind.may_alter_structure() && self.may_add_run(class)? {
            modified = self.modifier.notify_register_thread(class, None, false)?;
        }
        Ok(modified)
    }

    /// Adding a member changes the default serial version of a
    /// serializable class, so it needs an explicit one.
    fn may_add_run(&self, class: &dyn ClassHandle) -> Result<bool> {
        if !class.is_instance_of(JAVA_IO_SERIALIZABLE) {
            return Ok(true);
        }
        for index in 0..class.declared_field_count()? {
            let field = class.declared_field(index)?;
            if field.type_name() == "long" && field.name() == SERIAL_VERSION_FIELD {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Registers `group` of `class` for recording.
    ///
    /// Static builds inject a registering initializer once per class;
    /// dynamic instrumentation registers with the recorder directly.
    fn register_recorder_id(&self, group: Option<&Monitor>, class: &dyn ClassHandle) -> Result<bool> {
        let Some(group) = group else {
            return Ok(false);
        };
        if group.uses_reserved_id() {
            warn!("@Monitor for {} uses an internal recorder id, ignored", class.name());
            return Ok(false);
        }
        if group.is_ignored() {
            return Ok(false);
        }
        if self.is_static {
            let mut registered = self.registered.lock();
            if registered.contains(class.name()) {
                return Ok(false);
            }
            self.modifier.add_registering_initializer(class, group)?;
            registered.insert(class.name().to_string());
            return Ok(true);
        }
        let settings = MonitoringGroupSettings::for_group(class.name(), group);
        match &self.recorder {
            Some(recorder) => recorder.register_for_recording(class.name(), &settings),
            None => debug!("no recorder attached, {} not registered", class.name()),
        }
        Ok(false)
    }
}
