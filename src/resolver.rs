//! Monitoring-semantics resolution.
//!
//! An annotation is looked up in this order:
//!
//! 1. the configured [`AnnotationOverrides`]; an exclusive override source
//!    is final, including "not found",
//! 2. the annotation declared on the class or member itself,
//! 3. if the search type allows it and this level is not excluded from
//!    monitoring, the superclass and then the interfaces in declaration
//!    order. The first match wins.
//!
//! Handles obtained for the search are released as soon as their level has
//! been inspected. Backend failures during the search end it quietly; the
//! caller sees "not found".
//!
//! [`AnnotationOverrides`]: crate::config::AnnotationOverrides

use log::debug;

use crate::backend::{BehaviorHandle, ClassHandle, FieldHandle};
use crate::config::{AnnotationSearchType, Configuration};
use crate::error::Result;
use crate::semantics::{Annotation, AnnotationKind, AnnotationType, Monitor};

/// Annotation lookups against one configuration.
#[derive(Clone, Copy)]
pub struct Resolver<'c> {
    config: &'c Configuration,
}

impl<'c> Resolver<'c> {
    pub fn new(config: &'c Configuration) -> Self {
        Resolver { config }
    }

    pub fn class<T: AnnotationType>(
        &self,
        class: &dyn ClassHandle,
        search: AnnotationSearchType,
    ) -> Option<T> {
        self.class_annotation(class, T::KIND, search).and_then(T::from_annotation)
    }

    pub fn behavior<T: AnnotationType>(
        &self,
        behavior: &dyn BehaviorHandle,
        search: AnnotationSearchType,
    ) -> Option<T> {
        self.behavior_annotation(behavior, T::KIND, search).and_then(T::from_annotation)
    }

    pub fn field<T: AnnotationType>(&self, field: &dyn FieldHandle) -> Option<T> {
        self.field_annotation(field, T::KIND).and_then(T::from_annotation)
    }

    pub fn class_annotation(
        &self,
        class: &dyn ClassHandle,
        kind: AnnotationKind,
        search: AnnotationSearchType,
    ) -> Option<Annotation> {
        let found = self.declared_on_class(class, kind);
        if found.is_some() || search == AnnotationSearchType::None {
            return found;
        }
        if kind != AnnotationKind::ExcludeFromMonitoring
            && self.declared_on_class(class, AnnotationKind::ExcludeFromMonitoring).is_some()
        {
            return None;
        }
        match self.search_class_ancestors(class, kind, search) {
            Ok(found) => found,
            Err(e) => {
                debug!("@{} search above {} stopped: {e}", kind.simple_name(), class.name());
                None
            }
        }
    }

    pub fn behavior_annotation(
        &self,
        behavior: &dyn BehaviorHandle,
        kind: AnnotationKind,
        search: AnnotationSearchType,
    ) -> Option<Annotation> {
        if search == AnnotationSearchType::None {
            return self.declared_on_behavior(behavior, behavior.declaring_class_name(), kind);
        }
        match behavior.declaring_class() {
            Ok(declaring) => self.behavior_annotation_in(behavior, &*declaring, kind, search),
            Err(e) => {
                debug!("no declaring class for {}: {e}", behavior.name());
                self.declared_on_behavior(behavior, behavior.declaring_class_name(), kind)
            }
        }
    }

    pub fn field_annotation(&self, field: &dyn FieldHandle, kind: AnnotationKind) -> Option<Annotation> {
        if let Some(overrides) = &self.config.overrides {
            let found = overrides.for_member(field.declaring_class_name(), field.name(), "", kind);
            if found.is_some() || overrides.exclusive {
                return found;
            }
        }
        field.annotation(kind, self.config.prune_annotation(kind))
    }

    /// The `Monitor` of a class.
    ///
    /// Without a `Monitor` of its own, a class that is not excluded takes
    /// the one of its nearest enclosing class. The walk outwards stops at
    /// the first enclosing class that is excluded.
    pub fn class_monitor(&self, class: &dyn ClassHandle) -> Option<Monitor> {
        let search = self.config.annotation_search;
        if let Some(monitor) = self.class::<Monitor>(class, search) {
            return Some(monitor);
        }
        if self.is_excluded(class, search) {
            return None;
        }
        let mut outer = self.enclosing(class);
        while let Some(current) = outer {
            if let Some(monitor) = self.class::<Monitor>(&*current, search) {
                return Some(monitor);
            }
            if self.is_excluded(&*current, search) {
                return None;
            }
            outer = self.enclosing(&*current);
        }
        None
    }

    fn is_excluded(&self, class: &dyn ClassHandle, search: AnnotationSearchType) -> bool {
        self.class_annotation(class, AnnotationKind::ExcludeFromMonitoring, search).is_some()
    }

    fn enclosing(&self, class: &dyn ClassHandle) -> Option<crate::backend::ClassRef> {
        match class.declaring_class() {
            Ok(outer) => outer,
            Err(e) => {
                debug!("enclosing class of {} unavailable: {e}", class.name());
                None
            }
        }
    }

    fn declared_on_class(&self, class: &dyn ClassHandle, kind: AnnotationKind) -> Option<Annotation> {
        if let Some(overrides) = &self.config.overrides {
            let found = overrides.for_class(class.name(), kind);
            if found.is_some() || overrides.exclusive {
                return found;
            }
        }
        class.annotation(kind, self.config.prune_annotation(kind))
    }

    fn declared_on_behavior(
        &self,
        behavior: &dyn BehaviorHandle,
        class_name: &str,
        kind: AnnotationKind,
    ) -> Option<Annotation> {
        if let Some(overrides) = &self.config.overrides {
            let found = overrides.for_member(class_name, behavior.name(), behavior.descriptor(), kind);
            if found.is_some() || overrides.exclusive {
                return found;
            }
        }
        behavior.annotation(kind, self.config.prune_annotation(kind))
    }

    fn search_class_ancestors(
        &self,
        class: &dyn ClassHandle,
        kind: AnnotationKind,
        search: AnnotationSearchType,
    ) -> Result<Option<Annotation>> {
        if search.consider_superclass() {
            if let Some(superclass) = class.superclass()? {
                let found = self.class_annotation(&*superclass, kind, search);
                if found.is_some() {
                    return Ok(found);
                }
            }
        }
        if search.consider_interfaces() {
            for index in 0..class.interface_count()? {
                let interface = class.interface(index)?;
                let found = self.class_annotation(&*interface, kind, search);
                if found.is_some() {
                    return Ok(found);
                }
            }
        }
        Ok(None)
    }

    /// `behavior` is the member with the searched signature declared in
    /// `search_in`.
    fn behavior_annotation_in(
        &self,
        behavior: &dyn BehaviorHandle,
        search_in: &dyn ClassHandle,
        kind: AnnotationKind,
        search: AnnotationSearchType,
    ) -> Option<Annotation> {
        let found = self.declared_on_behavior(behavior, search_in.name(), kind);
        if found.is_some() || search == AnnotationSearchType::None {
            return found;
        }
        if kind != AnnotationKind::ExcludeFromMonitoring
            && self.declared_on_class(search_in, AnnotationKind::ExcludeFromMonitoring).is_some()
        {
            return None;
        }
        match self.search_behavior_ancestors(behavior, search_in, kind, search) {
            Ok(found) => found,
            Err(e) => {
                debug!(
                    "@{} search for {}{} above {} stopped: {e}",
                    kind.simple_name(),
                    behavior.name(),
                    behavior.descriptor(),
                    search_in.name()
                );
                None
            }
        }
    }

    fn search_behavior_ancestors(
        &self,
        behavior: &dyn BehaviorHandle,
        search_in: &dyn ClassHandle,
        kind: AnnotationKind,
        search: AnnotationSearchType,
    ) -> Result<Option<Annotation>> {
        let (name, descriptor) = (behavior.name(), behavior.descriptor());
        if search.consider_superclass() {
            if let Some(superclass) = search_in.superclass()? {
                if let Some(inherited) = superclass.find_signature(name, descriptor)? {
                    let found = self.behavior_annotation_in(&*inherited, &*superclass, kind, search);
                    if found.is_some() {
                        return Ok(found);
                    }
                }
            }
        }
        if search.consider_interfaces() {
            for index in 0..search_in.interface_count()? {
                let interface = search_in.interface(index)?;
                if let Some(inherited) = interface.find_signature(name, descriptor)? {
                    let found = self.behavior_annotation_in(&*inherited, &*interface, kind, search);
                    if found.is_some() {
                        return Ok(found);
                    }
                }
            }
        }
        Ok(None)
    }
}
