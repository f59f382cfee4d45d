//! Instrumentation configuration.
//!
//! [`Configuration`] is a context object handed to the transformer and the
//! method edit policy. It is normally loaded from TOML and then
//! [`normalize`](Configuration::normalize)d:
//!
//! ```toml
//! accountable_resources = ["CPU_TIME", "MEMORY"]
//! scope_type = "GROUP_INHERIT"
//! annotation_search = "ALL"
//! exclude_prefixes = ["com/example/generated/"]
//!
//! [overrides]
//! exclusive = false
//!
//! [[overrides.classes."com.example.Service"]]
//! type = "Monitor"
//! ids = ["service"]
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;

use crate::semantics::{
    create_pseudo_id, trim_id, Annotation, AnnotationKind, GroupAccountingType, ResourceSet,
    ResourceType,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read configuration: {0}")]
    Read(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Whether group semantics are applied per call or summed up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeType {
    #[default]
    Sum,
    Group,
    GroupInherit,
}

impl ScopeType {
    pub fn is_group(self) -> bool {
        !matches!(self, ScopeType::Sum)
    }
}

/// How far annotation lookup walks the type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnnotationSearchType {
    #[default]
    None,
    Interfaces,
    Superclasses,
    All,
}

impl AnnotationSearchType {
    pub fn consider_interfaces(self) -> bool {
        matches!(self, AnnotationSearchType::Interfaces | AnnotationSearchType::All)
    }

    pub fn consider_superclass(self) -> bool {
        matches!(self, AnnotationSearchType::Superclasses | AnnotationSearchType::All)
    }
}

const AT_CONSTRUCTOR: u8 = 1 << 0;
const AT_OBJECT_CREATION: u8 = 1 << 1;
const AT_FINALIZER: u8 = 1 << 2;
const AT_ARRAY_CREATION: u8 = 1 << 3;
const NATIVE_UNALLOCATION: u8 = 1 << 4;

/// Granularity of memory accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryAccountingType {
    None,
    ConstructionUnallocation,
    ConstructionNativeUnallocation,
    Construction,
    ConstructionNativeUnallocationArrays,
    ConstructionArrays,
    CreationUnallocation,
    CreationNativeUnallocation,
    #[default]
    Creation,
}

impl MemoryAccountingType {
    fn flags(self) -> u8 {
        match self {
            MemoryAccountingType::None => 0,
            MemoryAccountingType::ConstructionUnallocation => AT_CONSTRUCTOR | AT_FINALIZER,
            MemoryAccountingType::ConstructionNativeUnallocation => {
                AT_CONSTRUCTOR | NATIVE_UNALLOCATION
            }
            MemoryAccountingType::Construction => AT_CONSTRUCTOR,
            MemoryAccountingType::ConstructionNativeUnallocationArrays => {
                AT_CONSTRUCTOR | NATIVE_UNALLOCATION | AT_ARRAY_CREATION
            }
            MemoryAccountingType::ConstructionArrays => AT_CONSTRUCTOR | AT_ARRAY_CREATION,
            MemoryAccountingType::CreationUnallocation => AT_OBJECT_CREATION | AT_FINALIZER,
            MemoryAccountingType::CreationNativeUnallocation => {
                AT_OBJECT_CREATION | NATIVE_UNALLOCATION
            }
            MemoryAccountingType::Creation => AT_OBJECT_CREATION,
        }
    }

    pub fn is_none(self) -> bool {
        self.flags() == 0
    }

    pub fn at_constructor(self) -> bool {
        self.flags() & AT_CONSTRUCTOR != 0
    }

    pub fn at_object_creation(self) -> bool {
        self.flags() & AT_OBJECT_CREATION != 0
    }

    pub fn at_finalizer(self) -> bool {
        self.flags() & AT_FINALIZER != 0
    }

    pub fn at_array_creation(self) -> bool {
        self.flags() & AT_ARRAY_CREATION != 0
    }

    pub fn native_unallocation(self) -> bool {
        self.flags() & NATIVE_UNALLOCATION != 0
    }
}

/// Lifecycle injections applied to the first `main` method of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MainDefaultType {
    None,
    Start,
    End,
    Shutdown,
    StartEnd,
    StartStop,
    StartShutdown,
    #[default]
    StartEndShutdown,
}

impl MainDefaultType {
    pub fn at_start(self) -> bool {
        matches!(
            self,
            MainDefaultType::Start
                | MainDefaultType::StartEnd
                | MainDefaultType::StartStop
                | MainDefaultType::StartShutdown
                | MainDefaultType::StartEndShutdown
        )
    }

    pub fn at_stop(self) -> bool {
        matches!(
            self,
            MainDefaultType::End
                | MainDefaultType::StartEnd
                | MainDefaultType::StartStop
                | MainDefaultType::StartEndShutdown
        )
    }

    pub fn at_shutdown(self) -> bool {
        matches!(
            self,
            MainDefaultType::Shutdown
                | MainDefaultType::StartShutdown
                | MainDefaultType::StartEndShutdown
        )
    }
}

/// Annotations supplied from configuration instead of bytecode.
///
/// Class entries are keyed by the dotted class name, member entries by
/// `class.name` followed by the member descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnnotationOverrides {
    /// When set, the configured answer is final, including "not found".
    pub exclusive: bool,
    pub classes: HashMap<String, Vec<Annotation>>,
    pub members: HashMap<String, Vec<Annotation>>,
}

impl AnnotationOverrides {
    pub fn member_key(class_name: &str, name: &str, descriptor: &str) -> String {
        format!("{class_name}.{name}{descriptor}")
    }

    pub fn for_class(&self, class_name: &str, kind: AnnotationKind) -> Option<Annotation> {
        Self::find(self.classes.get(class_name), kind)
    }

    pub fn for_member(
        &self,
        class_name: &str,
        name: &str,
        descriptor: &str,
        kind: AnnotationKind,
    ) -> Option<Annotation> {
        let key = Self::member_key(class_name, name, descriptor);
        Self::find(self.members.get(&key), kind)
    }

    fn find(list: Option<&Vec<Annotation>>, kind: AnnotationKind) -> Option<Annotation> {
        list.and_then(|annotations| annotations.iter().find(|a| a.kind() == kind).cloned())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub accountable_resources: ResourceSet,
    pub default_group_resources: ResourceSet,
    pub sum_resources: ResourceSet,
    pub anyway_resources: ResourceSet,
    pub scope_type: ScopeType,
    pub annotation_search: AnnotationSearchType,
    pub memory_accounting: MemoryAccountingType,
    pub group_accounting: GroupAccountingType,
    pub main_default: MainDefaultType,
    pub instrument_java_lib: bool,
    /// Exclude the bytecode library's own classes.
    pub instrument_instrumenter: bool,
    pub prune_annotations: bool,
    pub static_instrumentation: bool,
    pub configuration_detection: bool,
    pub print_statistics: bool,
    /// Slash-separated class name prefixes never instrumented.
    pub exclude_prefixes: Vec<String>,
    /// When present, only these classes (or their nested classes) have
    /// their members analyzed.
    pub analyze_members: Option<HashSet<String>>,
    pub overrides: Option<AnnotationOverrides>,
    #[serde(skip)]
    pseudo_ids: Mutex<HashMap<String, String>>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            accountable_resources: ResourceSet::all(),
            default_group_resources: ResourceSet::all(),
            sum_resources: ResourceSet::all(),
            anyway_resources: ResourceSet::anyway(),
            scope_type: ScopeType::Sum,
            annotation_search: AnnotationSearchType::None,
            memory_accounting: MemoryAccountingType::Creation,
            group_accounting: GroupAccountingType::Direct,
            main_default: MainDefaultType::StartEndShutdown,
            instrument_java_lib: true,
            instrument_instrumenter: true,
            prune_annotations: false,
            static_instrumentation: false,
            configuration_detection: true,
            print_statistics: true,
            exclude_prefixes: Vec::new(),
            analyze_members: None,
            overrides: None,
            pseudo_ids: Mutex::new(HashMap::new()),
        }
    }
}

impl Configuration {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: Configuration = toml::from_str(text)?;
        config.normalize();
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        log::info!("loaded instrumentation configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Makes the derived resource sets consistent with the accountable set.
    pub fn normalize(&mut self) {
        if !self.accountable_resources.is_default() {
            self.default_group_resources =
                self.accountable_resources.ensure_subset(&self.default_group_resources);
            self.sum_resources = self.accountable_resources.ensure_subset(&self.sum_resources);
            self.anyway_resources = ResourceSet::anyway().ensure_subset(&self.accountable_resources);
        }
        if !self.accountable_resources.contains(ResourceType::Memory) {
            self.memory_accounting = MemoryAccountingType::None;
        }
        if self.static_instrumentation && self.scope_type == ScopeType::GroupInherit {
            self.scope_type = ScopeType::Group;
        }
    }

    pub fn is_accountable(&self, resource: ResourceType) -> bool {
        self.accountable_resources.contains(resource)
    }

    /// Whether annotations of `kind` are stripped from emitted bytecode.
    ///
    /// The `Instrumented` marker survives static builds.
    pub fn prune_annotation(&self, kind: AnnotationKind) -> bool {
        if !self.prune_annotations {
            return false;
        }
        match kind {
            AnnotationKind::Instrumented => !self.static_instrumentation,
            _ => true,
        }
    }

    /// Recording id for a group with the given ids.
    ///
    /// Multiple ids map to a stable pseudo id allocated on first use.
    pub fn rec_id(&self, ids: &[String]) -> Option<String> {
        let parts: Vec<&str> = ids.iter().map(|id| trim_id(id)).filter(|id| !id.is_empty()).collect();
        match parts.len() {
            0 => None,
            1 => Some(parts[0].to_string()),
            _ => {
                let joined = parts.join(",");
                let mut pseudo = self.pseudo_ids.lock();
                let next = pseudo.len();
                Some(pseudo.entry(joined).or_insert_with(|| create_pseudo_id(next)).clone())
            }
        }
    }

    /// Reverse lookup of a pseudo id, for diagnostics.
    pub fn pseudo_mapping(&self, rec_id: &str) -> Option<String> {
        self.pseudo_ids
            .lock()
            .iter()
            .find(|(_, pseudo)| pseudo.as_str() == rec_id)
            .map(|(ids, _)| ids.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::Monitor;

    #[test]
    fn defaults_account_everything() {
        let config = Configuration::default();
        assert!(config.accountable_resources.is_all());
        assert_eq!(config.scope_type, ScopeType::Sum);
        assert!(config.memory_accounting.at_object_creation());
        assert!(config.main_default.at_start());
        assert!(config.main_default.at_stop());
        assert!(config.main_default.at_shutdown());
    }

    #[test]
    fn normalize_restricts_derived_sets() {
        let mut config = Configuration::default();
        config.accountable_resources = ResourceSet::new(vec![ResourceType::CpuTime, ResourceType::FileIo]);
        config.default_group_resources = ResourceSet::new(vec![ResourceType::CpuTime, ResourceType::Memory]);
        config.normalize();
        assert_eq!(config.default_group_resources.as_slice(), &[ResourceType::CpuTime]);
        assert_eq!(config.anyway_resources.as_slice(), &[ResourceType::FileIo]);
        assert_eq!(config.sum_resources, config.accountable_resources);
        assert_eq!(config.memory_accounting, MemoryAccountingType::None);
    }

    #[test]
    fn static_mode_downgrades_group_inherit() {
        let mut config = Configuration::default();
        config.static_instrumentation = true;
        config.scope_type = ScopeType::GroupInherit;
        config.normalize();
        assert_eq!(config.scope_type, ScopeType::Group);
    }

    #[test]
    fn pruning_keeps_marker_for_static_builds() {
        let mut config = Configuration::default();
        assert!(!config.prune_annotation(AnnotationKind::Monitor));
        config.prune_annotations = true;
        assert!(config.prune_annotation(AnnotationKind::Monitor));
        assert!(config.prune_annotation(AnnotationKind::Instrumented));
        config.static_instrumentation = true;
        assert!(!config.prune_annotation(AnnotationKind::Instrumented));
    }

    #[test]
    fn rec_ids_use_stable_pseudo_ids() {
        let config = Configuration::default();
        assert_eq!(config.rec_id(&[]), None);
        assert_eq!(config.rec_id(&[" ".to_string()]), None);
        assert_eq!(config.rec_id(&[" g1 ".to_string()]), Some("g1".to_string()));

        let multi = vec!["a".to_string(), "b".to_string()];
        let first = config.rec_id(&multi);
        assert_eq!(first, Some("*pseudo*0".to_string()));
        assert_eq!(config.rec_id(&multi), first);
        assert_eq!(config.rec_id(&["c".to_string(), "d".to_string()]), Some("*pseudo*1".to_string()));
        assert_eq!(config.pseudo_mapping("*pseudo*0"), Some("a,b".to_string()));
    }

    #[test]
    fn parses_toml_with_overrides() {
        let text = r#"
            accountable_resources = ["CPU_TIME", "MEMORY"]
            scope_type = "GROUP_INHERIT"
            annotation_search = "SUPERCLASSES"
            memory_accounting = "CONSTRUCTION_UNALLOCATION"
            exclude_prefixes = ["com/example/gen/"]

            [overrides]
            exclusive = true

            [[overrides.classes."com.example.Service"]]
            type = "Monitor"
            ids = ["service"]

            [[overrides.members."com.example.Service.run()V"]]
            type = "Timer"
            id = "t"
            state = "START_FINISH"
        "#;
        let config = Configuration::from_toml_str(text).unwrap();
        assert_eq!(config.scope_type, ScopeType::GroupInherit);
        assert!(config.annotation_search.consider_superclass());
        assert!(!config.annotation_search.consider_interfaces());
        assert!(config.memory_accounting.at_finalizer());
        assert_eq!(config.exclude_prefixes, vec!["com/example/gen/".to_string()]);

        let overrides = config.overrides.as_ref().unwrap();
        assert!(overrides.exclusive);
        assert_eq!(
            overrides.for_class("com.example.Service", AnnotationKind::Monitor),
            Some(Annotation::Monitor(Monitor::with_id("service")))
        );
        assert!(overrides
            .for_member("com.example.Service", "run", "()V", AnnotationKind::Timer)
            .is_some());
        assert!(overrides.for_class("com.example.Other", AnnotationKind::Monitor).is_none());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitoring.toml");
        fs::write(&path, "print_statistics = false\nmain_default = \"START_STOP\"\n").unwrap();
        let config = Configuration::load(&path).unwrap();
        assert!(!config.print_statistics);
        assert_eq!(config.main_default, MainDefaultType::StartStop);
    }

    #[test]
    fn rejects_unknown_enum_values() {
        let err = Configuration::from_toml_str("scope_type = \"EVERYWHERE\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
