//! Per-method edit policy.
//!
//! A [`MethodEditPolicy`] is configured for the monitoring group of the
//! method being processed and then handed to the backend as the
//! [`BehaviorEditor`] for the method body. It decides, site by site, which
//! statement edits to request. Policies are recycled through an
//! [`EditorPool`]; one is needed per class scan.
//!
//! # Resource selection
//!
//! | Scope | Semantics | Accounted resources |
//! |-------|-----------|---------------------|
//! | sum, or `use_sum_resources` | any | configured sum resources |
//! | group | declared default | configured default group resources |
//! | group | declared set | declared set restricted to accountable resources |
//! | group | none | "anyway" resources |
//!
//! `ALL` is further narrowed to the default group resources, or to the
//! anyway resources when the semantics were inherited from a call site.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{BehaviorEditor, StatementModifier};
use crate::config::{Configuration, MemoryAccountingType, ScopeType};
use crate::error::Result;
use crate::registry::member_key;
use crate::semantics::{
    trim_id, AnnotationKind, AnnotationType, GroupAccountingType, MethodInstrumented, Monitor,
    ResourceSet, ResourceType, StreamType, ValueContext,
};

const WRAP_PACKAGE: &str = "de.uni_hildesheim.sse.monitoring.runtime.wrap.";

/// Receives call-site semantics for classes that are not instrumented yet.
pub trait SemanticsCollector: Send + Sync {
    /// `member` is the called member's name followed by its descriptor.
    fn assign_semantics(&self, class_name: &str, member: &str, semantics: &Arc<Monitor>);
}

/// Fields whose writes are reported as value changes, keyed by
/// `declaring.Class.field`, mapped to the recording id.
#[derive(Debug, Default)]
pub struct TrackedFields {
    fields: Mutex<HashMap<String, String>>,
}

impl TrackedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, declaring_class: &str, field: &str, rec_id: &str) {
        self.fields.lock().insert(field_id(declaring_class, field), rec_id.to_string());
    }

    pub fn get(&self, declaring_class: &str, field: &str) -> Option<String> {
        self.fields.lock().get(&field_id(declaring_class, field)).cloned()
    }

    pub fn len(&self) -> usize {
        self.fields.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.lock().is_empty()
    }
}

fn field_id(declaring_class: &str, field: &str) -> String {
    format!("{declaring_class}.{field}")
}

/// Instrumented replacement for a created platform stream type.
fn instrumented_type(type_name: &str) -> Option<String> {
    let simple = match type_name {
        "java.io.FileInputStream" => "InstrumentedFileInputStream",
        "java.io.FileOutputStream" => "InstrumentedFileOutputStream",
        "java.io.FileReader" => "InstrumentedFileReader",
        "java.io.FileWriter" => "InstrumentedFileWriter",
        "java.io.RandomAccessFile" => "DelegatingRandomAccessFile",
        _ => return None,
    };
    Some(format!("{WRAP_PACKAGE}{simple}"))
}

/// Classes whose `getInputStream` / `getOutputStream` results are
/// rechained when the platform library itself is not instrumented.
const STREAM_SOURCE_CLASSES: [&str; 1] = ["java.net.Socket"];

pub struct MethodEditPolicy {
    config: Arc<Configuration>,
    tracked: Arc<TrackedFields>,
    collector: Option<Arc<dyn SemanticsCollector>>,
    semantics: Option<Arc<Monitor>>,
    monitor_cpu_time: bool,
    memory_accounting: MemoryAccountingType,
    group_accounting: GroupAccountingType,
    monitor_net_io: bool,
    monitor_file_io: bool,
    last_field_access_type: Option<String>,
    last_field_access_context: Option<ValueContext>,
    mem_record: i32,
    edits: usize,
}

impl MethodEditPolicy {
    fn new(config: Arc<Configuration>, tracked: Arc<TrackedFields>) -> Self {
        MethodEditPolicy {
            config,
            tracked,
            collector: None,
            semantics: None,
            monitor_cpu_time: false,
            memory_accounting: MemoryAccountingType::None,
            group_accounting: GroupAccountingType::Local,
            monitor_net_io: false,
            monitor_file_io: false,
            last_field_access_type: None,
            last_field_access_context: None,
            mem_record: 0,
            edits: 0,
        }
    }

    /// Recomputes the accounted resources for `semantics`.
    ///
    /// Each inherited group that enables memory accounting adds a layer to
    /// the memory record; while layers remain, inherited groups without
    /// memory accounting keep it enabled.
    pub fn set_group(
        &mut self,
        semantics: Option<Arc<Monitor>>,
        use_sum_resources: bool,
        collector: Option<Arc<dyn SemanticsCollector>>,
        inherited: bool,
    ) {
        let config = Arc::clone(&self.config);
        self.collector = collector;
        self.group_accounting = config.group_accounting;
        self.monitor_cpu_time = false;
        self.memory_accounting = MemoryAccountingType::None;
        self.monitor_net_io = false;
        self.monitor_file_io = false;

        let mut accountable = if !use_sum_resources && config.scope_type.is_group() {
            match &semantics {
                Some(group) if group.resources.is_default() => config.default_group_resources.clone(),
                Some(group) if group.resources.is_all() => ResourceSet::all(),
                Some(group) => config.accountable_resources.ensure_subset(&group.resources),
                None => config.anyway_resources.clone(),
            }
        } else {
            config.sum_resources.clone()
        };
        self.semantics = semantics;

        if !accountable.is_none() {
            if accountable.is_all() {
                accountable = if inherited {
                    config.anyway_resources.clone()
                } else {
                    config.default_group_resources.clone()
                };
            }
            self.enable(&accountable, config.memory_accounting);
        }

        if inherited {
            if !self.memory_accounting.is_none() {
                self.mem_record += 1;
            } else if self.mem_record > 0 {
                self.memory_accounting = config.memory_accounting;
            }
        }
    }

    fn enable(&mut self, accountable: &ResourceSet, memory: MemoryAccountingType) {
        if accountable.is_all() {
            self.monitor_cpu_time = true;
            self.memory_accounting = memory;
            self.monitor_net_io = true;
            self.monitor_file_io = true;
            return;
        }
        for resource in accountable.iter() {
            match resource {
                ResourceType::CpuTime => self.monitor_cpu_time = true,
                ResourceType::Memory => self.memory_accounting = memory,
                ResourceType::NetIo => self.monitor_net_io = true,
                ResourceType::FileIo => self.monitor_file_io = true,
                ResourceType::None | ResourceType::All => {}
            }
        }
    }

    pub fn instrument_cpu_time(&self) -> bool {
        self.monitor_cpu_time
    }

    pub fn instrument_net_io(&self) -> bool {
        self.monitor_net_io
    }

    pub fn instrument_file_io(&self) -> bool {
        self.monitor_file_io
    }

    pub fn memory_accounting(&self) -> MemoryAccountingType {
        self.memory_accounting
    }

    pub fn group_accounting(&self) -> GroupAccountingType {
        self.group_accounting
    }

    pub fn semantics(&self) -> Option<&Arc<Monitor>> {
        self.semantics.as_ref()
    }

    /// Adds the layers recorded on a previously instrumented method, or
    /// resets the record for `None`.
    pub fn set_instrumentation_record(&mut self, record: Option<&MethodInstrumented>) {
        match record {
            Some(record) => self.mem_record += record.mem,
            None => self.mem_record = 0,
        }
    }

    pub fn mem_record(&self) -> i32 {
        self.mem_record
    }

    /// Number of site edits requested since the last call.
    pub fn take_edits(&mut self) -> usize {
        std::mem::take(&mut self.edits)
    }

    /// Resets all per-method state before the policy goes back to the pool.
    pub fn clear(&mut self) {
        self.monitor_cpu_time = false;
        self.group_accounting = GroupAccountingType::Local;
        self.memory_accounting = MemoryAccountingType::None;
        self.monitor_net_io = false;
        self.monitor_file_io = false;
        self.last_field_access_type = None;
        self.last_field_access_context = None;
        self.mem_record = 0;
        self.edits = 0;
        self.semantics = None;
        self.collector = None;
    }

    fn assign_semantics(&self, class_name: &str, name: &str, descriptor: &str) {
        if let (Some(semantics), Some(collector)) = (&self.semantics, &self.collector) {
            if self.config.scope_type == ScopeType::GroupInherit {
                collector.assign_semantics(class_name, &member_key(name, descriptor), semantics);
            }
        }
    }

    /// Context id of the field read that produced the call target.
    fn context_rec_id(&self, site: &dyn StatementModifier) -> Result<Option<String>> {
        if let (Some(field_type), Some(context)) =
            (&self.last_field_access_type, &self.last_field_access_context)
        {
            if *field_type == site.mc_declaring_class_name()? && !site.mc_is_static()? {
                return Ok(Some(trim_id(&context.id).to_string()));
            }
        }
        Ok(None)
    }

    fn declaring_class_instance_of(site: &dyn StatementModifier, types: &[&str]) -> Result<bool> {
        for type_name in types {
            if site.mc_declaring_class_instance_of(type_name)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn is_url_open_stream(&self, site: &dyn StatementModifier, name: &str) -> Result<bool> {
        Ok(name == "openStream"
            && site.mc_declaring_class_instance_of("java.net.URL")?
            && self.monitor_net_io)
    }

    /// Rechains streams returned by socket and URL calls. Used when the
    /// platform library is not instrumented itself.
    fn process_net_io_call(&self, site: &mut dyn StatementModifier, name: &str) -> Result<bool> {
        if name == "getOutputStream"
            && Self::declaring_class_instance_of(site, &STREAM_SOURCE_CLASSES)?
        {
            site.rechain_stream_creation(Some(StreamType::Net), false)?;
            return Ok(true);
        }
        if self.is_url_open_stream(site, name)? {
            site.rechain_stream_creation(None, true)?;
            return Ok(true);
        }
        if name == "getInputStream"
            && Self::declaring_class_instance_of(site, &STREAM_SOURCE_CLASSES)?
        {
            site.rechain_stream_creation(Some(StreamType::Net), true)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// With an instrumented platform library only the URL stream needs
    /// its underlying type resolved.
    fn process_other_io_call(&self, site: &mut dyn StatementModifier, name: &str) -> Result<bool> {
        if self.is_url_open_stream(site, name)? {
            site.rechain_stream_creation(None, true)?;
            return Ok(true);
        }
        Ok(false)
    }
}

impl BehaviorEditor for MethodEditPolicy {
    fn edit_new_expression(&mut self, site: &mut dyn StatementModifier, type_name: &str) -> Result<()> {
        let account_memory = self.memory_accounting.at_object_creation();
        let replacement = if self.monitor_file_io { instrumented_type(type_name) } else { None };
        match replacement {
            Some(new_type) => site.replace_created_type(&new_type, account_memory)?,
            None if account_memory => site.append_memory_allocated(None)?,
            None => return Ok(()),
        }
        self.edits += 1;
        Ok(())
    }

    fn edit_new_array(&mut self, site: &mut dyn StatementModifier) -> Result<()> {
        if self.memory_accounting.at_array_creation() {
            site.append_memory_allocated(None)?;
            self.edits += 1;
        }
        Ok(())
    }

    fn edit_method_call(
        &mut self,
        site: &mut dyn StatementModifier,
        name: &str,
        descriptor: &str,
        target_class: &str,
    ) -> Result<()> {
        let context = self.context_rec_id(site)?;
        let context = context.as_deref();
        let (handled, edited) = match name {
            "start" => {
                let thread = site.mc_declaring_class_instance_of("java.lang.Thread")?;
                if thread {
                    site.notify_thread_started(context)?;
                }
                (true, thread)
            }
            "clone" => {
                let account = site.mc_parameter_count()? == 0
                    && target_class == "java.lang.Object"
                    && self.memory_accounting.at_object_creation();
                if account {
                    site.append_memory_allocated(context)?;
                }
                (true, account)
            }
            "send" | "receive" => {
                let datagram = site.mc_declaring_class_instance_of("java.net.DatagramSocket")?
                    && self.monitor_net_io
                    && site.mc_parameter_count()? == 1
                    && site.mc_parameter_type_name(0)? == "java.net.DatagramPacket";
                if datagram {
                    site.notify_io_datagram_transmission(context, name == "send")?;
                }
                (true, datagram)
            }
            _ if !self.config.instrument_java_lib => {
                let rechained = self.process_net_io_call(site, name)?;
                (rechained, rechained)
            }
            _ => {
                let rechained = self.process_other_io_call(site, name)?;
                (rechained, rechained)
            }
        };
        if !handled {
            site.notify_context_change(context)?;
        }
        if edited || !handled {
            self.edits += 1;
        }
        self.assign_semantics(target_class, name, descriptor);
        Ok(())
    }

    fn edit_field_access(
        &mut self,
        site: &mut dyn StatementModifier,
        name: &str,
        type_name: &str,
        is_writer: bool,
    ) -> Result<()> {
        self.last_field_access_type = Some(type_name.to_string());
        self.last_field_access_context = site
            .field_annotation(AnnotationKind::ValueContext)
            .and_then(ValueContext::from_annotation);
        if is_writer {
            let declaring = site.field_declaring_class_name()?;
            if let Some(rec_id) = self.tracked.get(&declaring, name) {
                site.notify_value_changed(&rec_id)?;
                self.edits += 1;
            }
        }
        Ok(())
    }
}

/// Free list of [`MethodEditPolicy`] instances.
///
/// The pool has its own lock, independent of the transformation lock.
pub struct EditorPool {
    config: Arc<Configuration>,
    tracked: Arc<TrackedFields>,
    free: Mutex<Vec<MethodEditPolicy>>,
}

impl EditorPool {
    pub fn new(config: Arc<Configuration>, tracked: Arc<TrackedFields>) -> Self {
        EditorPool { config, tracked, free: Mutex::new(Vec::new()) }
    }

    pub fn acquire(
        &self,
        semantics: Option<Arc<Monitor>>,
        use_sum_resources: bool,
        collector: Option<Arc<dyn SemanticsCollector>>,
        inherited: bool,
    ) -> MethodEditPolicy {
        let pooled = self.free.lock().pop();
        let mut policy = pooled.unwrap_or_else(|| {
            MethodEditPolicy::new(Arc::clone(&self.config), Arc::clone(&self.tracked))
        });
        policy.set_group(semantics, use_sum_resources, collector, inherited);
        policy
    }

    pub fn release(&self, mut policy: MethodEditPolicy) {
        policy.clear();
        self.free.lock().push(policy);
    }

    pub fn tracked_fields(&self) -> &Arc<TrackedFields> {
        &self.tracked
    }

    /// Number of idle policies.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}
