#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use jvmti_monitoring::backend::{
    BehaviorEditor, BehaviorHandle, BehaviorRef, ClassFactory, ClassHandle, ClassRef, CodeModifier,
    FieldHandle, FieldRef, Release, Scoped, StatementModifier,
};
use jvmti_monitoring::error::{InstrumenterError, Result};
use jvmti_monitoring::hook::{ClassDefinition, PlatformError, Redefiner};
use jvmti_monitoring::recorder::{MonitoringGroupSettings, RecorderFrontend};
use jvmti_monitoring::semantics::{
    Annotation, AnnotationKind, ConfigurationChange, Monitor, NotifyValue, StreamType, Timer,
    TimerState,
};

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn push(log: &Log, entry: String) {
    log.lock().unwrap().push(entry);
}

// ---------------------------------------------------------------------------
// Class model
// ---------------------------------------------------------------------------

/// An edit site inside a mock method body.
#[derive(Clone, Debug)]
pub enum Site {
    New(String),
    NewArray,
    Call {
        name: String,
        descriptor: String,
        target: String,
        instance_of: Vec<String>,
        params: Vec<String>,
        is_static: bool,
    },
    FieldWrite {
        name: String,
        type_name: String,
        declaring: String,
    },
}

impl Site {
    pub fn call(name: &str, descriptor: &str, target: &str) -> Site {
        Site::Call {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            target: target.to_string(),
            instance_of: vec![target.to_string()],
            params: Vec::new(),
            is_static: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MethodSpec {
    pub name: String,
    pub descriptor: String,
    pub annotations: Vec<Annotation>,
    pub params: Vec<String>,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_native: bool,
    pub sites: Vec<Site>,
    pub fail_walk: bool,
}

impl MethodSpec {
    pub fn new(name: &str, descriptor: &str) -> Self {
        MethodSpec { name: name.to_string(), descriptor: descriptor.to_string(), ..Default::default() }
    }

    pub fn main() -> Self {
        let mut spec = MethodSpec::new("main", "([Ljava/lang/String;)V");
        spec.params = vec!["java.lang.String[]".to_string()];
        spec.is_static = true;
        spec
    }

    pub fn annotated(mut self, annotation: impl Into<Annotation>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    pub fn site(mut self, site: Site) -> Self {
        self.sites.push(site);
        self
    }

    pub fn abstract_(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_walk = true;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct FieldSpec {
    pub name: String,
    pub type_name: String,
    pub annotations: Vec<Annotation>,
    pub is_static: bool,
}

impl FieldSpec {
    pub fn new(name: &str, type_name: &str) -> Self {
        FieldSpec { name: name.to_string(), type_name: type_name.to_string(), ..Default::default() }
    }

    pub fn annotated(mut self, annotation: impl Into<Annotation>) -> Self {
        self.annotations.push(annotation.into());
        self
    }
}

#[derive(Debug, Default)]
pub struct ClassSpec {
    pub name: String,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub instance_of: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub fields: Vec<FieldSpec>,
    pub methods: Vec<MethodSpec>,
    pub superclass: Option<Arc<ClassSpec>>,
    pub interfaces: Vec<Arc<ClassSpec>>,
    pub outer: Option<Arc<ClassSpec>>,
    /// Statement edits requested while walking method bodies.
    pub site_log: Log,
}

impl ClassSpec {
    pub fn new(name: &str) -> Self {
        ClassSpec { name: name.to_string(), site_log: new_log(), ..Default::default() }
    }

    pub fn annotated(mut self, annotation: impl Into<Annotation>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn extends(mut self, superclass: Arc<ClassSpec>) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: Arc<ClassSpec>) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn nested_in(mut self, outer: Arc<ClassSpec>) -> Self {
        self.outer = Some(outer);
        self
    }

    pub fn instance_of(mut self, type_name: &str) -> Self {
        self.instance_of.push(type_name.to_string());
        self
    }

    pub fn interface(mut self) -> Self {
        self.is_interface = true;
        self
    }

    pub fn build(self) -> Arc<ClassSpec> {
        Arc::new(self)
    }

    fn is_instance_of(&self, type_name: &str) -> bool {
        self.name == type_name
            || self.instance_of.iter().any(|t| t == type_name)
            || self.superclass.as_ref().map_or(false, |s| s.is_instance_of(type_name))
            || self.interfaces.iter().any(|i| i.is_instance_of(type_name))
    }
}

fn find(annotations: &[Annotation], kind: AnnotationKind) -> Option<Annotation> {
    annotations.iter().find(|a| a.kind() == kind).cloned()
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Counts released handles.
#[derive(Clone, Debug, Default)]
pub struct Releases(Arc<AtomicUsize>);

impl Releases {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockClass {
    pub spec: Arc<ClassSpec>,
    releases: Releases,
}

impl MockClass {
    pub fn new(spec: &Arc<ClassSpec>, releases: &Releases) -> Self {
        MockClass { spec: Arc::clone(spec), releases: releases.clone() }
    }

    fn scoped(spec: &Arc<ClassSpec>, releases: &Releases) -> ClassRef {
        Scoped::new(Box::new(MockClass::new(spec, releases)) as Box<dyn ClassHandle>)
    }
}

impl Release for MockClass {
    fn release(&mut self) {
        self.releases.bump();
    }
}

impl ClassHandle for MockClass {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn is_interface(&self) -> bool {
        self.spec.is_interface
    }

    fn is_abstract(&self) -> bool {
        self.spec.is_abstract || self.spec.is_interface
    }

    fn is_primitive(&self) -> bool {
        false
    }

    fn is_instance_of(&self, type_name: &str) -> bool {
        self.spec.is_instance_of(type_name)
    }

    fn annotation(&self, kind: AnnotationKind, _prune: bool) -> Option<Annotation> {
        find(&self.spec.annotations, kind)
    }

    fn declared_field_count(&self) -> Result<usize> {
        Ok(self.spec.fields.len())
    }

    fn declared_field(&self, index: usize) -> Result<FieldRef> {
        if index >= self.spec.fields.len() {
            return Err(InstrumenterError::NotFound(format!("field {index}")));
        }
        let field = MockField { class: Arc::clone(&self.spec), index, releases: self.releases.clone() };
        Ok(Scoped::new(Box::new(field) as Box<dyn FieldHandle>))
    }

    fn declared_behavior_count(&self) -> Result<usize> {
        Ok(self.spec.methods.len())
    }

    fn declared_behavior(&self, index: usize) -> Result<BehaviorRef> {
        if index >= self.spec.methods.len() {
            return Err(InstrumenterError::NotFound(format!("behavior {index}")));
        }
        Ok(MockBehavior::scoped(&self.spec, index, &self.releases))
    }

    fn interface_count(&self) -> Result<usize> {
        Ok(self.spec.interfaces.len())
    }

    fn interface(&self, index: usize) -> Result<ClassRef> {
        match self.spec.interfaces.get(index) {
            Some(interface) => Ok(MockClass::scoped(interface, &self.releases)),
            None => Err(InstrumenterError::NotFound(format!("interface {index}"))),
        }
    }

    fn superclass(&self) -> Result<Option<ClassRef>> {
        Ok(self.spec.superclass.as_ref().map(|s| MockClass::scoped(s, &self.releases)))
    }

    fn declaring_class(&self) -> Result<Option<ClassRef>> {
        Ok(self.spec.outer.as_ref().map(|o| MockClass::scoped(o, &self.releases)))
    }

    fn declaring_class_name(&self) -> Option<String> {
        self.spec.outer.as_ref().map(|o| o.name.clone())
    }

    fn find_signature(&self, name: &str, descriptor: &str) -> Result<Option<BehaviorRef>> {
        let index = self
            .spec
            .methods
            .iter()
            .position(|m| m.name == name && m.descriptor == descriptor);
        Ok(index.map(|index| MockBehavior::scoped(&self.spec, index, &self.releases)))
    }

    fn to_bytecode(&self) -> Result<Vec<u8>> {
        Ok(format!("edited:{}", self.spec.name).into_bytes())
    }
}

pub struct MockBehavior {
    class: Arc<ClassSpec>,
    index: usize,
    releases: Releases,
}

impl MockBehavior {
    fn scoped(class: &Arc<ClassSpec>, index: usize, releases: &Releases) -> BehaviorRef {
        let behavior = MockBehavior { class: Arc::clone(class), index, releases: releases.clone() };
        Scoped::new(Box::new(behavior) as Box<dyn BehaviorHandle>)
    }

    fn spec(&self) -> &MethodSpec {
        &self.class.methods[self.index]
    }
}

impl Release for MockBehavior {
    fn release(&mut self) {
        self.releases.bump();
    }
}

impl BehaviorHandle for MockBehavior {
    fn name(&self) -> &str {
        &self.spec().name
    }

    fn descriptor(&self) -> &str {
        &self.spec().descriptor
    }

    fn declaring_class_name(&self) -> &str {
        &self.class.name
    }

    fn declaring_class(&self) -> Result<ClassRef> {
        Ok(MockClass::scoped(&self.class, &self.releases))
    }

    fn annotation(&self, kind: AnnotationKind, _prune: bool) -> Option<Annotation> {
        find(&self.spec().annotations, kind)
    }

    fn is_static(&self) -> bool {
        self.spec().is_static
    }

    fn is_abstract(&self) -> bool {
        self.spec().is_abstract
    }

    fn is_native(&self) -> bool {
        self.spec().is_native
    }

    fn is_constructor(&self) -> bool {
        self.spec().name == "<init>"
    }

    fn is_finalize(&self) -> bool {
        self.spec().name == "finalize" && self.spec().descriptor == "()V"
    }

    fn parameter_count(&self) -> Result<usize> {
        Ok(self.spec().params.len())
    }

    fn parameter_type_name(&self, index: usize) -> Result<String> {
        self.spec()
            .params
            .get(index)
            .cloned()
            .ok_or_else(|| InstrumenterError::NotFound(format!("parameter {index}")))
    }

    fn instrument(&self, editor: &mut dyn BehaviorEditor) -> Result<()> {
        let spec = self.spec();
        if spec.fail_walk {
            return Err(InstrumenterError::bytecode(
                format!("{}.{}{}", self.class.name, spec.name, spec.descriptor),
                "cannot compile inserted code",
            ));
        }
        for site in &spec.sites {
            let mut modifier = MockSite { site: site.clone(), log: Arc::clone(&self.class.site_log) };
            match site {
                Site::New(type_name) => editor.edit_new_expression(&mut modifier, type_name)?,
                Site::NewArray => editor.edit_new_array(&mut modifier)?,
                Site::Call { name, descriptor, target, .. } => {
                    editor.edit_method_call(&mut modifier, name, descriptor, target)?
                }
                Site::FieldWrite { name, type_name, .. } => {
                    editor.edit_field_access(&mut modifier, name, type_name, true)?
                }
            }
        }
        Ok(())
    }
}

pub struct MockField {
    class: Arc<ClassSpec>,
    index: usize,
    releases: Releases,
}

impl MockField {
    fn spec(&self) -> &FieldSpec {
        &self.class.fields[self.index]
    }
}

impl Release for MockField {
    fn release(&mut self) {
        self.releases.bump();
    }
}

impl FieldHandle for MockField {
    fn name(&self) -> &str {
        &self.spec().name
    }

    fn type_name(&self) -> &str {
        &self.spec().type_name
    }

    fn declaring_class_name(&self) -> &str {
        &self.class.name
    }

    fn annotation(&self, kind: AnnotationKind, _prune: bool) -> Option<Annotation> {
        find(&self.spec().annotations, kind)
    }

    fn is_static(&self) -> bool {
        self.spec().is_static
    }
}

/// Statement modifier for one site; logs every requested edit.
pub struct MockSite {
    site: Site,
    log: Log,
}

impl MockSite {
    fn call(&self) -> Result<(&str, &[String], &[String], bool)> {
        match &self.site {
            Site::Call { target, instance_of, params, is_static, .. } => {
                Ok((target.as_str(), instance_of.as_slice(), params.as_slice(), *is_static))
            }
            _ => Err(InstrumenterError::bytecode("site", "not a method call")),
        }
    }
}

impl StatementModifier for MockSite {
    fn replace_created_type(&mut self, new_type: &str, account_memory: bool) -> Result<()> {
        push(&self.log, format!("replace {new_type} memory={account_memory}"));
        Ok(())
    }

    fn append_memory_allocated(&mut self, context_id: Option<&str>) -> Result<()> {
        push(&self.log, format!("memory {context_id:?}"));
        Ok(())
    }

    fn notify_value_changed(&mut self, rec_id: &str) -> Result<()> {
        push(&self.log, format!("value_changed {rec_id}"));
        Ok(())
    }

    fn rechain_stream_creation(&mut self, stream: Option<StreamType>, input: bool) -> Result<()> {
        push(&self.log, format!("rechain {stream:?} input={input}"));
        Ok(())
    }

    fn notify_thread_started(&mut self, context_id: Option<&str>) -> Result<()> {
        push(&self.log, format!("thread_started {context_id:?}"));
        Ok(())
    }

    fn notify_io_datagram_transmission(&mut self, context_id: Option<&str>, write: bool) -> Result<()> {
        push(&self.log, format!("datagram {context_id:?} write={write}"));
        Ok(())
    }

    fn notify_context_change(&mut self, context_id: Option<&str>) -> Result<()> {
        push(&self.log, format!("context {context_id:?}"));
        Ok(())
    }

    fn mc_declaring_class_name(&self) -> Result<String> {
        Ok(self.call()?.0.to_string())
    }

    fn mc_declaring_class_instance_of(&self, type_name: &str) -> Result<bool> {
        Ok(self.call()?.1.iter().any(|t| t == type_name))
    }

    fn mc_parameter_count(&self) -> Result<usize> {
        Ok(self.call()?.2.len())
    }

    fn mc_parameter_type_name(&self, index: usize) -> Result<String> {
        self.call()?
            .2
            .get(index)
            .cloned()
            .ok_or_else(|| InstrumenterError::NotFound(format!("parameter {index}")))
    }

    fn mc_is_static(&self) -> Result<bool> {
        Ok(self.call()?.3)
    }

    fn field_annotation(&self, _kind: AnnotationKind) -> Option<Annotation> {
        None
    }

    fn field_declaring_class_name(&self) -> Result<String> {
        match &self.site {
            Site::FieldWrite { declaring, .. } => Ok(declaring.clone()),
            _ => Err(InstrumenterError::bytecode("site", "not a field access")),
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Code modifier that logs every call as `operation target [details]`.
#[derive(Default)]
pub struct RecordingModifier {
    pub log: Log,
    /// Methods (`Class.name`) whose timing edit fails.
    pub fail_timing: Vec<String>,
}

impl RecordingModifier {
    pub fn new() -> Self {
        RecordingModifier { log: new_log(), fail_timing: Vec::new() }
    }

    pub fn failing_timing(method: &str) -> Self {
        RecordingModifier { log: new_log(), fail_timing: vec![method.to_string()] }
    }

    pub fn entries(&self) -> Vec<String> {
        entries(&self.log)
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }

    fn record(&self, entry: String) {
        push(&self.log, entry);
    }
}

fn method_id(behavior: &dyn BehaviorHandle) -> String {
    format!("{}.{}", behavior.declaring_class_name(), behavior.name())
}

impl CodeModifier for RecordingModifier {
    fn notify_timer_call(
        &self,
        behavior: &dyn BehaviorHandle,
        state: TimerState,
        timer: &Timer,
        before: bool,
    ) -> Result<()> {
        self.record(format!("timer {} {state:?} {} before={before}", method_id(behavior), timer.id));
        Ok(())
    }

    fn notify_register_thread(
        &self,
        class: &dyn ClassHandle,
        behavior: Option<&dyn BehaviorHandle>,
        is_main: bool,
    ) -> Result<bool> {
        let target = behavior.map_or_else(|| "<default run>".to_string(), method_id);
        self.record(format!("register_thread {} {target} main={is_main}", class.name()));
        Ok(true)
    }

    fn value_notification(
        &self,
        behavior: &dyn BehaviorHandle,
        rec_id: Option<&str>,
        _annotation: &NotifyValue,
    ) -> Result<()> {
        self.record(format!("value_notification {} {rec_id:?}", method_id(behavior)));
        Ok(())
    }

    fn instrument_random_access_file(&self, class: &dyn ClassHandle) -> Result<()> {
        self.record(format!("random_access_file {}", class.name()));
        Ok(())
    }

    fn instrument_socket_output_stream(&self, class: &dyn ClassHandle) -> Result<()> {
        self.record(format!("socket_output_stream {}", class.name()));
        Ok(())
    }

    fn instrument_socket_input_stream(&self, class: &dyn ClassHandle) -> Result<()> {
        self.record(format!("socket_input_stream {}", class.name()));
        Ok(())
    }

    fn instrument_end_system(&self, behavior: &dyn BehaviorHandle, print_statistics: bool, _invoke: &str) -> Result<()> {
        self.record(format!("end_system {} statistics={print_statistics}", method_id(behavior)));
        Ok(())
    }

    fn instrument_start_system(&self, behavior: &dyn BehaviorHandle, shutdown_hook: bool, _invoke: &str) -> Result<()> {
        self.record(format!("start_system {} shutdown_hook={shutdown_hook}", method_id(behavior)));
        Ok(())
    }

    fn instrument_configuration_change(
        &self,
        behavior: &dyn BehaviorHandle,
        _annotation: &ConfigurationChange,
    ) -> Result<()> {
        self.record(format!("configuration_change {}", method_id(behavior)));
        Ok(())
    }

    fn instrument_finalize(&self, behavior: &dyn BehaviorHandle) -> Result<()> {
        self.record(format!("finalize {}", method_id(behavior)));
        Ok(())
    }

    fn instrument_constructor(&self, behavior: &dyn BehaviorHandle) -> Result<()> {
        self.record(format!("constructor {}", method_id(behavior)));
        Ok(())
    }

    fn instrument_timing(&self, behavior: &dyn BehaviorHandle, group: &Monitor, exclude: bool, direct_id: bool) -> Result<()> {
        let method = method_id(behavior);
        if self.fail_timing.contains(&method) {
            return Err(InstrumenterError::bytecode(method, "timing edit rejected"));
        }
        self.record(format!("timing {method} {:?} exclude={exclude} direct={direct_id}", group.ids));
        Ok(())
    }

    fn add_registering_initializer(&self, class: &dyn ClassHandle, group: &Monitor) -> Result<()> {
        self.record(format!("registering_initializer {} {:?}", class.name(), group.ids));
        Ok(())
    }

    fn instrument_variability_handler(&self, behavior: &dyn BehaviorHandle) -> Result<()> {
        self.record(format!("variability_handler {}", method_id(behavior)));
        Ok(())
    }

    fn add_finalizer(&self, class: &dyn ClassHandle, overhead: bool) -> Result<()> {
        self.record(format!("add_finalizer {} overhead={overhead}", class.name()));
        Ok(())
    }

    fn add_class_annotation(&self, class: &dyn ClassHandle, annotation: &Annotation) -> Result<()> {
        self.record(format!("class_annotation {} {:?}", class.name(), annotation.kind()));
        Ok(())
    }

    fn add_behavior_annotation(&self, behavior: &dyn BehaviorHandle, annotation: &Annotation) -> Result<()> {
        self.record(format!("behavior_annotation {} {annotation:?}", method_id(behavior)));
        Ok(())
    }
}

/// Recorder that keeps every registration.
#[derive(Default)]
pub struct RecordingRecorder {
    pub registrations: Mutex<Vec<(String, MonitoringGroupSettings)>>,
}

impl RecordingRecorder {
    pub fn registered_ids(&self) -> Vec<(String, Vec<String>)> {
        self.registrations
            .lock()
            .unwrap()
            .iter()
            .map(|(class, settings)| (class.clone(), settings.ids.clone()))
            .collect()
    }
}

impl RecorderFrontend for RecordingRecorder {
    fn register_for_recording(&self, class_name: &str, settings: &MonitoringGroupSettings) {
        self.registrations.lock().unwrap().push((class_name.to_string(), settings.clone()));
    }
}

/// Class factory over a fixed set of specs, keyed by dotted name.
#[derive(Default)]
pub struct MockFactory {
    pub classes: HashMap<String, Arc<ClassSpec>>,
    pub releases: Releases,
}

impl MockFactory {
    pub fn with(specs: &[&Arc<ClassSpec>]) -> Self {
        let classes = specs.iter().map(|spec| (spec.name.clone(), Arc::clone(spec))).collect();
        MockFactory { classes, releases: Releases::default() }
    }
}

impl ClassFactory for MockFactory {
    fn obtain_class_from_bytes(&self, name: &str, _bytes: &[u8]) -> Result<ClassRef> {
        let dotted = name.replace('/', ".");
        match self.classes.get(&dotted) {
            Some(spec) => Ok(MockClass::scoped(spec, &self.releases)),
            None => Err(InstrumenterError::NotFound(dotted)),
        }
    }

    fn obtain_class(&self, name: &str, _redefinition: bool) -> Result<Option<ClassRef>> {
        Ok(self.classes.get(name).map(|spec| MockClass::scoped(spec, &self.releases)))
    }
}

/// Redefiner that records batches, optionally rejecting them.
#[derive(Default)]
pub struct RecordingRedefiner {
    pub batches: Mutex<Vec<Vec<ClassDefinition>>>,
    pub reject: bool,
}

impl Redefiner for RecordingRedefiner {
    fn redefine_classes(&self, definitions: &[ClassDefinition]) -> std::result::Result<(), PlatformError> {
        self.batches.lock().unwrap().push(definitions.to_vec());
        if self.reject {
            return Err(PlatformError::UnmodifiableClass(definitions[0].name.clone()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Class file bytes
// ---------------------------------------------------------------------------

pub struct CpBuilder {
    entries: Vec<Vec<u8>>,
}

impl CpBuilder {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    fn push(&mut self, entry: Vec<u8>) -> u16 {
        self.entries.push(entry);
        self.entries.len() as u16
    }

    pub fn utf8(&mut self, s: &str) -> u16 {
        let mut entry = vec![1];
        entry.extend_from_slice(&(s.len() as u16).to_be_bytes());
        entry.extend_from_slice(s.as_bytes());
        self.push(entry)
    }

    pub fn class(&mut self, name_index: u16) -> u16 {
        let mut entry = vec![7];
        entry.extend_from_slice(&name_index.to_be_bytes());
        self.push(entry)
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let mut entry = vec![3];
        entry.extend_from_slice(&value.to_be_bytes());
        self.push(entry)
    }

    pub fn count(&self) -> u16 {
        self.entries.len() as u16 + 1
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        u2(out, self.count());
        for entry in &self.entries {
            out.extend_from_slice(entry);
        }
    }
}

pub fn u1(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}

pub fn u2(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn u4(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn push_attr(out: &mut Vec<u8>, name_index: u16, info: &[u8]) {
    u2(out, name_index);
    u4(out, info.len() as u32);
    out.extend_from_slice(info);
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
