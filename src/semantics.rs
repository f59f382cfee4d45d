//! Monitoring semantics: the annotation kinds the decision engine reacts to.
//!
//! Every annotation the engine understands is a variant of the closed
//! [`Annotation`] type. Resolution code is parameterized by
//! [`AnnotationKind`] and converts back to the concrete payload through
//! [`AnnotationType`], so no runtime type tokens are involved.
//!
//! | Kind | Target | Effect |
//! |------|--------|--------|
//! | [`Monitor`] | class, method | monitoring group, resources, ids |
//! | [`Timer`] | method | timer start/stop notifications |
//! | [`NotifyValue`] | method | value notification on exit |
//! | [`StartSystem`] / [`EndSystem`] | method | program lifecycle hooks |
//! | [`ConfigurationChange`] | method | configuration change notification |
//! | [`VariabilityHandler`] | method | variability handler injection |
//! | [`ExcludeFromMonitoring`] | class, method | stops inheritance and timing |
//! | [`ValueChange`] / [`ValueContext`] | field | value tracking |
//! | [`Instrumented`] | class | idempotence marker |
//! | [`MethodInstrumented`] | method | memory layering record |

use serde::Deserialize;

/// Id reserved for the recorder itself.
pub const RECORDER_ID: &str = "*recorder*";

/// Id reserved for the whole program.
pub const PROGRAM_ID: &str = "program";

/// A group carrying this id is not registered for recording.
pub const IGNORE_ID: &str = "*";

/// Prefix of generated ids for multi-id groups.
pub const PSEUDO_ID_PREFIX: &str = "*pseudo*";

pub fn trim_id(id: &str) -> &str {
    id.trim()
}

pub fn create_pseudo_id(index: usize) -> String {
    format!("{PSEUDO_ID_PREFIX}{index}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    None,
    All,
    CpuTime,
    Memory,
    FileIo,
    NetIo,
}

impl ResourceType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "NONE" => Some(ResourceType::None),
            "ALL" => Some(ResourceType::All),
            "CPU_TIME" => Some(ResourceType::CpuTime),
            "MEMORY" => Some(ResourceType::Memory),
            "FILE_IO" => Some(ResourceType::FileIo),
            "NET_IO" => Some(ResourceType::NetIo),
            _ => None,
        }
    }
}

/// An ordered set of resources as written in an annotation or configuration.
///
/// The empty set means "use the default", a single `NONE` means nothing is
/// accounted and a single `ALL` means everything is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ResourceSet(Vec<ResourceType>);

impl ResourceSet {
    pub fn new(resources: impl Into<Vec<ResourceType>>) -> Self {
        ResourceSet(resources.into())
    }

    pub fn default_set() -> Self {
        ResourceSet(Vec::new())
    }

    pub fn none() -> Self {
        ResourceSet(vec![ResourceType::None])
    }

    pub fn all() -> Self {
        ResourceSet(vec![ResourceType::All])
    }

    /// File and network I/O, accounted even for inherited semantics.
    pub fn anyway() -> Self {
        ResourceSet(vec![ResourceType::FileIo, ResourceType::NetIo])
    }

    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_all(&self) -> bool {
        self.0.len() == 1 && self.0[0] == ResourceType::All
    }

    pub fn is_none(&self) -> bool {
        self.0.len() == 1 && self.0[0] == ResourceType::None
    }

    pub fn contains(&self, resource: ResourceType) -> bool {
        if self.is_none() {
            false
        } else if self.is_all() {
            true
        } else {
            self.0.contains(&resource)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = ResourceType> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[ResourceType] {
        &self.0
    }

    /// Restricts `target` to the members of `self`.
    ///
    /// A default or `ALL` target becomes `self`. `target` is returned
    /// unchanged when it is `NONE`, or when `self` is `ALL` or default. An
    /// empty intersection yields `NONE`. The result keeps the order of
    /// `self`.
    pub fn ensure_subset(&self, target: &ResourceSet) -> ResourceSet {
        if target.is_none() || self.is_all() || self.is_default() {
            return target.clone();
        }
        if target.is_default() || target.is_all() {
            return self.clone();
        }
        let subset: Vec<ResourceType> =
            self.0.iter().copied().filter(|r| target.0.contains(r)).collect();
        if subset.is_empty() {
            ResourceSet::none()
        } else {
            ResourceSet(subset)
        }
    }
}

impl From<Vec<ResourceType>> for ResourceSet {
    fn from(resources: Vec<ResourceType>) -> Self {
        ResourceSet(resources)
    }
}

/// How a group accounts resources of nested calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupAccountingType {
    #[default]
    Default,
    Direct,
    Indirect,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BooleanValue {
    #[default]
    Default,
    True,
    False,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceIdentifierKind {
    #[default]
    None,
    IdentityHashcode,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebugState {
    Configuration,
    MemoryFree,
    MethodEnter,
    MethodExit,
    MemoryAllocation,
    NetIn,
    NetOut,
    FileIn,
    FileOut,
}

/// Where a timer notification is placed within a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerPosition {
    #[default]
    Default,
    Beginning,
    End,
    Both,
}

/// Timer transitions. The ordinal is part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerState {
    Start,
    Suspend,
    Resume,
    Finish,
    StartFinish,
    ResumeSuspend,
    SuspendResume,
}

impl TimerState {
    const ALL: [TimerState; 7] = [
        TimerState::Start,
        TimerState::Suspend,
        TimerState::Resume,
        TimerState::Finish,
        TimerState::StartFinish,
        TimerState::ResumeSuspend,
        TimerState::SuspendResume,
    ];

    pub fn default_position(self) -> TimerPosition {
        match self {
            TimerState::Start | TimerState::Resume => TimerPosition::Beginning,
            TimerState::Suspend | TimerState::Finish => TimerPosition::End,
            TimerState::StartFinish | TimerState::ResumeSuspend | TimerState::SuspendResume => {
                TimerPosition::Both
            }
        }
    }

    pub fn ordinal(self) -> i32 {
        self as i32
    }

    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        usize::try_from(ordinal).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Splits a combined state into its beginning and end halves.
    pub fn split(self) -> (Option<TimerState>, Option<TimerState>) {
        match self {
            TimerState::StartFinish => (Some(TimerState::Start), Some(TimerState::Finish)),
            TimerState::ResumeSuspend => (Some(TimerState::Resume), Some(TimerState::Suspend)),
            TimerState::SuspendResume => (Some(TimerState::Suspend), Some(TimerState::Resume)),
            _ => (None, None),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "START" => Some(TimerState::Start),
            "SUSPEND" => Some(TimerState::Suspend),
            "RESUME" => Some(TimerState::Resume),
            "FINISH" => Some(TimerState::Finish),
            "START_FINISH" => Some(TimerState::StartFinish),
            "RESUME_SUSPEND" => Some(TimerState::ResumeSuspend),
            "SUSPEND_RESUME" => Some(TimerState::SuspendResume),
            _ => None,
        }
    }
}

/// What a value notification measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasurementValue {
    All,
    #[default]
    Value,
    MemAllocated,
    MemUnallocated,
    NetIn,
    NetOut,
    FileIn,
    FileOut,
}

/// Kind of stream produced by a stream-creating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    None,
    Net,
    File,
}

impl StreamType {
    pub fn name(self) -> &'static str {
        match self {
            StreamType::None => "NONE",
            StreamType::Net => "NET",
            StreamType::File => "FILE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "NONE" => Some(StreamType::None),
            "NET" => Some(StreamType::Net),
            "FILE" => Some(StreamType::File),
            _ => None,
        }
    }

    pub fn resource(self) -> Option<ResourceType> {
        match self {
            StreamType::None => None,
            StreamType::Net => Some(ResourceType::NetIo),
            StreamType::File => Some(ResourceType::FileIo),
        }
    }
}

/// Monitoring group attached to a class or method.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Monitor {
    #[serde(alias = "id")]
    pub ids: Vec<String>,
    pub debug: Vec<DebugState>,
    pub group_accounting: GroupAccountingType,
    pub resources: ResourceSet,
    pub distribute_values: BooleanValue,
    pub consider_contained: BooleanValue,
    pub instance_identifier_kind: InstanceIdentifierKind,
}

impl Default for Monitor {
    fn default() -> Self {
        Monitor {
            ids: vec![String::new()],
            debug: Vec::new(),
            group_accounting: GroupAccountingType::Default,
            resources: ResourceSet::default_set(),
            distribute_values: BooleanValue::Default,
            consider_contained: BooleanValue::Default,
            instance_identifier_kind: InstanceIdentifierKind::None,
        }
    }
}

impl Monitor {
    pub fn with_id(id: impl Into<String>) -> Self {
        Monitor { ids: vec![id.into()], ..Monitor::default() }
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.ids.iter().any(|candidate| trim_id(candidate) == id)
    }

    /// True when any id asks to skip recording registration.
    pub fn is_ignored(&self) -> bool {
        self.has_id(IGNORE_ID)
    }

    /// True when an id collides with one reserved for internal use.
    pub fn uses_reserved_id(&self) -> bool {
        self.has_id(PROGRAM_ID) || self.has_id(RECORDER_ID)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Timer {
    pub id: String,
    pub state: TimerState,
    #[serde(default)]
    pub affect_at: TimerPosition,
    #[serde(default)]
    pub consider_threads: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct NotifyValue {
    pub id: String,
    pub expression: String,
    pub value: MeasurementValue,
    pub tag_expression: String,
    pub notify_difference: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct StartSystem {
    pub statistics_interval: i32,
    pub swing_timer: bool,
    pub shutdown_hook: bool,
    pub invoke: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct EndSystem {
    pub invoke: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct ConfigurationChange {
    pub id_expression: String,
    pub value_expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct VariabilityHandler {}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ExcludeFromMonitoring {}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct ValueChange {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct ValueContext {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Instrumented {}

/// Memory layering count carried over between redefinitions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct MethodInstrumented {
    pub mem: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    Monitor,
    Timer,
    NotifyValue,
    StartSystem,
    EndSystem,
    ConfigurationChange,
    VariabilityHandler,
    ExcludeFromMonitoring,
    ValueChange,
    ValueContext,
    Instrumented,
    MethodInstrumented,
}

impl AnnotationKind {
    /// Simple type name of the annotation interface.
    pub fn simple_name(self) -> &'static str {
        match self {
            AnnotationKind::Monitor => "Monitor",
            AnnotationKind::Timer => "Timer",
            AnnotationKind::NotifyValue => "NotifyValue",
            AnnotationKind::StartSystem => "StartSystem",
            AnnotationKind::EndSystem => "EndSystem",
            AnnotationKind::ConfigurationChange => "ConfigurationChange",
            AnnotationKind::VariabilityHandler => "VariabilityHandler",
            AnnotationKind::ExcludeFromMonitoring => "ExcludeFromMonitoring",
            AnnotationKind::ValueChange => "ValueChange",
            AnnotationKind::ValueContext => "ValueContext",
            AnnotationKind::Instrumented => "Instrumented",
            AnnotationKind::MethodInstrumented => "MethodInstrumented",
        }
    }

    pub fn from_simple_name(name: &str) -> Option<Self> {
        const KINDS: [AnnotationKind; 12] = [
            AnnotationKind::Monitor,
            AnnotationKind::Timer,
            AnnotationKind::NotifyValue,
            AnnotationKind::StartSystem,
            AnnotationKind::EndSystem,
            AnnotationKind::ConfigurationChange,
            AnnotationKind::VariabilityHandler,
            AnnotationKind::ExcludeFromMonitoring,
            AnnotationKind::ValueChange,
            AnnotationKind::ValueContext,
            AnnotationKind::Instrumented,
            AnnotationKind::MethodInstrumented,
        ];
        KINDS.into_iter().find(|kind| kind.simple_name() == name)
    }
}

/// A resolved annotation instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum Annotation {
    Monitor(Monitor),
    Timer(Timer),
    NotifyValue(NotifyValue),
    StartSystem(StartSystem),
    EndSystem(EndSystem),
    ConfigurationChange(ConfigurationChange),
    VariabilityHandler(VariabilityHandler),
    ExcludeFromMonitoring(ExcludeFromMonitoring),
    ValueChange(ValueChange),
    ValueContext(ValueContext),
    Instrumented(Instrumented),
    MethodInstrumented(MethodInstrumented),
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Annotation::Monitor(_) => AnnotationKind::Monitor,
            Annotation::Timer(_) => AnnotationKind::Timer,
            Annotation::NotifyValue(_) => AnnotationKind::NotifyValue,
            Annotation::StartSystem(_) => AnnotationKind::StartSystem,
            Annotation::EndSystem(_) => AnnotationKind::EndSystem,
            Annotation::ConfigurationChange(_) => AnnotationKind::ConfigurationChange,
            Annotation::VariabilityHandler(_) => AnnotationKind::VariabilityHandler,
            Annotation::ExcludeFromMonitoring(_) => AnnotationKind::ExcludeFromMonitoring,
            Annotation::ValueChange(_) => AnnotationKind::ValueChange,
            Annotation::ValueContext(_) => AnnotationKind::ValueContext,
            Annotation::Instrumented(_) => AnnotationKind::Instrumented,
            Annotation::MethodInstrumented(_) => AnnotationKind::MethodInstrumented,
        }
    }
}

/// Typed access to one [`Annotation`] variant.
pub trait AnnotationType: Sized {
    const KIND: AnnotationKind;

    fn from_annotation(annotation: Annotation) -> Option<Self>;
}

macro_rules! annotation_type {
    ($($ty:ident),* $(,)?) => {
        $(
            impl AnnotationType for $ty {
                const KIND: AnnotationKind = AnnotationKind::$ty;

                fn from_annotation(annotation: Annotation) -> Option<Self> {
                    match annotation {
                        Annotation::$ty(value) => Some(value),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Annotation {
                fn from(value: $ty) -> Self {
                    Annotation::$ty(value)
                }
            }
        )*
    };
}

annotation_type!(
    Monitor,
    Timer,
    NotifyValue,
    StartSystem,
    EndSystem,
    ConfigurationChange,
    VariabilityHandler,
    ExcludeFromMonitoring,
    ValueChange,
    ValueContext,
    Instrumented,
    MethodInstrumented,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_keeps_only_accountable_resources() {
        let accountable = ResourceSet::new(vec![ResourceType::CpuTime, ResourceType::FileIo]);
        let declared = ResourceSet::new(vec![
            ResourceType::CpuTime,
            ResourceType::Memory,
            ResourceType::NetIo,
        ]);
        let result = accountable.ensure_subset(&declared);
        assert_eq!(result.as_slice(), &[ResourceType::CpuTime]);
    }

    #[test]
    fn empty_intersection_is_none() {
        let accountable = ResourceSet::new(vec![ResourceType::CpuTime]);
        let declared = ResourceSet::new(vec![ResourceType::Memory]);
        assert!(accountable.ensure_subset(&declared).is_none());
    }

    #[test]
    fn open_targets_narrow_to_accountable() {
        let accountable = ResourceSet::new(vec![ResourceType::CpuTime, ResourceType::FileIo]);
        assert_eq!(accountable.ensure_subset(&ResourceSet::all()), accountable);
        assert_eq!(accountable.ensure_subset(&ResourceSet::default_set()), accountable);
        assert!(accountable.ensure_subset(&ResourceSet::none()).is_none());
    }

    #[test]
    fn open_accountable_keeps_target() {
        let declared = ResourceSet::new(vec![ResourceType::Memory]);
        assert_eq!(ResourceSet::all().ensure_subset(&declared), declared);
        assert_eq!(ResourceSet::default_set().ensure_subset(&declared), declared);
        assert!(ResourceSet::all().ensure_subset(&ResourceSet::all()).is_all());
    }

    #[test]
    fn contains_respects_all_and_none() {
        assert!(ResourceSet::all().contains(ResourceType::NetIo));
        assert!(!ResourceSet::none().contains(ResourceType::NetIo));
        assert!(ResourceSet::anyway().contains(ResourceType::FileIo));
        assert!(!ResourceSet::anyway().contains(ResourceType::CpuTime));
    }

    #[test]
    fn timer_states_map_to_positions() {
        assert_eq!(TimerState::Start.default_position(), TimerPosition::Beginning);
        assert_eq!(TimerState::Finish.default_position(), TimerPosition::End);
        assert_eq!(TimerState::ResumeSuspend.default_position(), TimerPosition::Both);
        assert_eq!(
            TimerState::SuspendResume.split(),
            (Some(TimerState::Suspend), Some(TimerState::Resume))
        );
        assert_eq!(TimerState::from_ordinal(6), Some(TimerState::SuspendResume));
        assert_eq!(TimerState::from_ordinal(7), None);
        assert_eq!(TimerState::from_ordinal(-1), None);
    }

    #[test]
    fn reserved_and_ignored_ids() {
        assert!(Monitor::with_id(" program ").uses_reserved_id());
        assert!(Monitor::with_id(RECORDER_ID).uses_reserved_id());
        assert!(Monitor::with_id("*").is_ignored());
        assert!(!Monitor::with_id("g1").is_ignored());
    }

    #[test]
    fn typed_extraction() {
        let annotation: Annotation = Monitor::with_id("g1").into();
        assert_eq!(annotation.kind(), AnnotationKind::Monitor);
        assert!(Timer::from_annotation(annotation.clone()).is_none());
        assert_eq!(Monitor::from_annotation(annotation).map(|m| m.ids), Some(vec!["g1".to_string()]));
        assert_eq!(
            AnnotationKind::from_simple_name("ExcludeFromMonitoring"),
            Some(AnnotationKind::ExcludeFromMonitoring)
        );
    }
}
