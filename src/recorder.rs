//! Live recording frontend used by dynamic instrumentation.
//!
//! In static mode monitoring groups are registered by an injected class
//! initializer. When classes are instrumented at load time the transformer
//! registers them directly through a [`RecorderFrontend`].

use crate::semantics::{
    BooleanValue, DebugState, GroupAccountingType, InstanceIdentifierKind, Monitor, ResourceSet,
    StreamType,
};

/// Settings of one monitoring group as handed to the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MonitoringGroupSettings {
    pub ids: Vec<String>,
    pub debug: Vec<DebugState>,
    pub group_accounting: GroupAccountingType,
    pub resources: ResourceSet,
    pub instance_identifier_kind: InstanceIdentifierKind,
    pub distribute_values: BooleanValue,
    pub consider_contained: BooleanValue,
}

impl MonitoringGroupSettings {
    /// Settings for `group` declared on `class_name`.
    ///
    /// Ids are trimmed and an empty id stands for the class itself. The
    /// multi-id flags are only taken over when more than one id is
    /// declared.
    pub fn for_group(class_name: &str, group: &Monitor) -> Self {
        let ids = group
            .ids
            .iter()
            .map(|id| match id.trim() {
                "" => class_name.to_string(),
                trimmed => trimmed.to_string(),
            })
            .collect::<Vec<_>>();
        let multi = ids.len() > 1;
        let mut settings = MonitoringGroupSettings::default();
        settings.set_basics(
            ids,
            group.debug.clone(),
            group.group_accounting,
            group.resources.clone(),
            group.instance_identifier_kind,
        );
        if multi {
            settings.set_multi(group.distribute_values, group.consider_contained);
        }
        settings
    }

    pub fn set_basics(
        &mut self,
        ids: Vec<String>,
        debug: Vec<DebugState>,
        group_accounting: GroupAccountingType,
        resources: ResourceSet,
        instance_identifier_kind: InstanceIdentifierKind,
    ) {
        self.ids = ids;
        self.debug = debug;
        self.group_accounting = group_accounting;
        self.resources = resources;
        self.instance_identifier_kind = instance_identifier_kind;
    }

    pub fn set_multi(&mut self, distribute_values: BooleanValue, consider_contained: BooleanValue) {
        self.distribute_values = distribute_values;
        self.consider_contained = consider_contained;
    }

    pub fn is_multi(&self) -> bool {
        self.ids.len() > 1
    }
}

/// The process-wide recorder, passed to the transformer explicitly.
///
/// Only [`register_for_recording`](RecorderFrontend::register_for_recording)
/// is required; the remaining notifications default to no-ops.
pub trait RecorderFrontend: Send + Sync {
    fn register_for_recording(&self, class_name: &str, settings: &MonitoringGroupSettings);

    /// Bytes read through an instrumented stream. Returns `bytes`.
    fn read_io(&self, _rec_id: Option<&str>, _caller: &str, bytes: i32, _stream: StreamType) -> i32 {
        bytes
    }

    /// Bytes written through an instrumented stream. Returns `bytes`.
    fn write_io(&self, _rec_id: Option<&str>, _caller: &str, bytes: i32, _stream: StreamType) -> i32 {
        bytes
    }

    fn notify_program_end(&self) {}

    fn print_statistics(&self) {}

    fn end_system(&self) {}
}
