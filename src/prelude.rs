//! Common imports for wiring the transformer into an agent.

pub use crate::backend::{
    BehaviorHandle, ClassFactory, ClassHandle, CodeModifier, FieldHandle, Release, Scoped,
};
pub use crate::config::Configuration;
pub use crate::error::{InstrumenterError, Result};
pub use crate::hook::{ClassDefinition, ClassFileHook, PlatformError, PlatformRetransformer, Redefiner};
pub use crate::protocol::strategy::RecorderStrategy;
pub use crate::protocol::{read_event, write_event, Event, EventTag};
pub use crate::recorder::{MonitoringGroupSettings, RecorderFrontend};
pub use crate::transformation::TransformationType;
pub use crate::transformer::{ClassTransformer, MethodErrorHandler, Retransformer};
