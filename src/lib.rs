//! # jvmti-monitoring
//!
//! Instrumentation decisions and recording events for resource-monitoring
//! JVM agents.
//!
//! For every class the JVM presents to an agent, this crate decides
//! whether and how it gets instrumented: it resolves the monitoring
//! annotations of the class and its members (following superclasses,
//! interfaces and configured overrides), picks the resources to account
//! per method and drives a pluggable bytecode editor through the edits.
//! Events produced by instrumented code are encoded with a compact binary
//! protocol so they can travel to a recorder in another process.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use jvmti_monitoring::prelude::*;
//!
//! let config = Arc::new(Configuration::load("monitoring.toml")?);
//! let transformer = Arc::new(
//!     ClassTransformer::new(config, Arc::new(MyModifier::default()))
//!         .with_recorder(Arc::new(MyRecorder::default())),
//! );
//! let hook = ClassFileHook::new(Arc::new(MyClassFactory::default()), transformer);
//!
//! // from the ClassFileLoadHook callback
//! if let Some(bytes) = hook.on_class_load(None, "com/example/Service", false, class_bytes) {
//!     // hand `bytes` back to the JVM
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Agent (JVMTI / java.lang.instrument)        │
//! ├─────────────────────────────────────────────────────────┤
//! │   hook::ClassFileHook        hook::PlatformRetransformer │
//! ├─────────────────────────────────────────────────────────┤
//! │   transformer::ClassTransformer                          │
//! │     resolver::Resolver     editor::EditorPool            │
//! │     registry::AssignmentRegistry                         │
//! ├─────────────────────────────────────────────────────────┤
//! │   backend traits (ClassHandle, CodeModifier, ...)        │
//! │     backend::parsed - read-only class file backend       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`semantics`] | Monitoring annotations and resource sets |
//! | [`config`] | Agent configuration, loaded from TOML |
//! | [`backend`] | Traits implemented by the bytecode editor |
//! | [`resolver`] | Annotation lookup through class hierarchies |
//! | [`editor`] | Per-method edit policy and its pool |
//! | [`registry`] | Semantics assigned to not yet loaded classes |
//! | [`transformer`] | Per-class transformation |
//! | [`hook`] | Class-load entry point and retransformation |
//! | [`recorder`] | Recorder frontend for dynamic registration |
//! | [`protocol`] | Recording events and their wire format |
//! | [`classfile`] | Minimal class file parser |

pub mod backend;
pub mod classfile;
pub mod config;
pub mod editor;
pub mod error;
pub mod hook;
pub mod prelude;
pub mod protocol;
pub mod recorder;
pub mod registry;
pub mod resolver;
pub mod semantics;
pub mod transformation;
pub mod transformer;

pub use error::{InstrumenterError, Result};
pub use transformation::TransformationType;
