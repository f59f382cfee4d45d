//! Read-only backend over parsed class files.
//!
//! [`ClassPool`] keeps every class it was handed as raw bytes, parses it
//! with [`crate::classfile`] and serves [`ClassHandle`]s that answer
//! structural queries. Framework annotations (those in
//! [`ANNOTATION_PACKAGE`]) are mapped into [`Annotation`] values by
//! feeding their element values through serde, so the same field names
//! and enum spellings work for class files and configuration overrides.
//!
//! The pool never rewrites code: `prune` requests are ignored,
//! [`BehaviorHandle::instrument`] reports no edit sites and
//! [`ClassHandle::to_bytecode`] returns the bytes the class was parsed from.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::warn;
use parking_lot::RwLock;

use super::{
    BehaviorEditor, BehaviorHandle, BehaviorRef, ClassFactory, ClassHandle, ClassRef, FieldHandle,
    FieldRef, Release, Scoped,
};
use crate::classfile::{
    self, parameter_descriptors, java_type_name, ClassFile, ConstantPool, CpInfo, ElementValue,
    ACC_ABSTRACT, ACC_NATIVE, ACC_STATIC,
};
use crate::error::{InstrumenterError, Result};
use crate::semantics::{Annotation, AnnotationKind};

/// Internal package of the monitoring annotation types.
pub const ANNOTATION_PACKAGE: &str = "de/uni_hildesheim/sse/monitoring/runtime/annotations/";

const PRIMITIVES: [&str; 9] =
    ["boolean", "byte", "char", "short", "int", "long", "float", "double", "void"];

#[derive(Debug)]
struct ParsedClass {
    name: String,
    access_flags: u16,
    super_name: Option<String>,
    interfaces: Vec<String>,
    outer: Option<String>,
    annotations: Vec<Annotation>,
    fields: Vec<ParsedField>,
    behaviors: Vec<ParsedBehavior>,
    bytes: Vec<u8>,
}

#[derive(Debug)]
struct ParsedField {
    name: String,
    type_name: String,
    access_flags: u16,
    annotations: Vec<Annotation>,
}

#[derive(Debug)]
struct ParsedBehavior {
    name: String,
    descriptor: String,
    access_flags: u16,
    parameters: Vec<String>,
    annotations: Vec<Annotation>,
}

impl ParsedClass {
    fn parse(bytes: &[u8]) -> Result<Self> {
        let cf = ClassFile::parse(bytes)?;
        let cp = &cf.constant_pool;

        let mut fields = Vec::with_capacity(cf.fields.len());
        for field in &cf.fields {
            fields.push(ParsedField {
                name: field.name(cp)?.to_string(),
                type_name: java_type_name(field.descriptor(cp)?)?,
                access_flags: field.access_flags,
                annotations: convert_annotations(cp, field.annotations()),
            });
        }

        let mut behaviors = Vec::with_capacity(cf.methods.len());
        for method in &cf.methods {
            let name = method.name(cp)?;
            // class initializers are not behaviors
            if name == "<clinit>" {
                continue;
            }
            let descriptor = method.descriptor(cp)?;
            let parameters = parameter_descriptors(descriptor)?
                .into_iter()
                .map(java_type_name)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            behaviors.push(ParsedBehavior {
                name: name.to_string(),
                descriptor: descriptor.to_string(),
                access_flags: method.access_flags,
                parameters,
                annotations: convert_annotations(cp, method.annotations()),
            });
        }

        Ok(ParsedClass {
            name: dotted(cf.class_name()?),
            access_flags: cf.access_flags,
            super_name: cf.super_class_name()?.map(dotted),
            interfaces: cf.interface_names()?.into_iter().map(dotted).collect(),
            outer: cf.outer_class_name()?.map(dotted),
            annotations: convert_annotations(cp, cf.annotations()),
            fields,
            behaviors,
            bytes: bytes.to_vec(),
        })
    }
}

fn dotted(internal: &str) -> String {
    internal.replace('/', ".")
}

fn find_annotation(annotations: &[Annotation], kind: AnnotationKind) -> Option<Annotation> {
    annotations.iter().find(|a| a.kind() == kind).cloned()
}

fn convert_annotations<'a>(
    cp: &ConstantPool,
    raw: impl Iterator<Item = &'a classfile::Annotation>,
) -> Vec<Annotation> {
    raw.filter_map(|annotation| convert_annotation(cp, annotation)).collect()
}

fn convert_annotation(cp: &ConstantPool, raw: &classfile::Annotation) -> Option<Annotation> {
    let descriptor = cp.get_utf8(raw.type_index).ok()?;
    let simple = descriptor
        .strip_prefix('L')?
        .strip_suffix(';')?
        .strip_prefix(ANNOTATION_PACKAGE)?;
    let kind = AnnotationKind::from_simple_name(simple)?;

    let mut table = toml::map::Map::new();
    table.insert("type".to_string(), toml::Value::String(kind.simple_name().to_string()));
    for pair in &raw.element_value_pairs {
        let Ok(name) = cp.get_utf8(pair.element_name_index) else {
            warn!("@{simple}: element name #{} unresolvable", pair.element_name_index);
            continue;
        };
        match element_value(cp, &pair.value) {
            Some(value) => {
                table.insert(snake_case(name), value);
            }
            None => warn!("@{simple}: ignoring unsupported value of element {name}"),
        }
    }

    match toml::Value::Table(table).try_into::<Annotation>() {
        Ok(annotation) => Some(annotation),
        Err(e) => {
            warn!("@{simple}: malformed annotation: {e}");
            None
        }
    }
}

fn element_value(cp: &ConstantPool, value: &ElementValue) -> Option<toml::Value> {
    match value {
        ElementValue::Const { tag, const_value_index } => {
            let constant = cp.get(*const_value_index).ok()?;
            match (tag, constant) {
                (b's', CpInfo::Utf8(s)) => Some(toml::Value::String(s.clone())),
                (b'Z', CpInfo::Integer(v)) => Some(toml::Value::Boolean(*v != 0)),
                (b'B' | b'C' | b'I' | b'S', CpInfo::Integer(v)) => Some(toml::Value::Integer(*v as i64)),
                (b'J', CpInfo::Long(v)) => Some(toml::Value::Integer(*v)),
                (b'F', CpInfo::Float(v)) => Some(toml::Value::Float(*v as f64)),
                (b'D', CpInfo::Double(v)) => Some(toml::Value::Float(*v)),
                _ => None,
            }
        }
        ElementValue::EnumConst { const_name_index, .. } => {
            cp.get_utf8(*const_name_index).ok().map(|name| toml::Value::String(name.to_string()))
        }
        ElementValue::ArrayValue(values) => values
            .iter()
            .map(|v| element_value(cp, v))
            .collect::<Option<Vec<_>>>()
            .map(toml::Value::Array),
        ElementValue::ClassInfo { .. } | ElementValue::AnnotationValue(_) => None,
    }
}

/// `groupAccounting` -> `group_accounting`
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Parsed classes by dotted name.
///
/// Cloning is cheap; clones share the same classes.
#[derive(Clone, Default)]
pub struct ClassPool {
    classes: Arc<RwLock<HashMap<String, Arc<ParsedClass>>>>,
}

impl ClassPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and stores a class, replacing an earlier definition.
    /// Returns the dotted class name.
    pub fn insert(&self, bytes: &[u8]) -> Result<String> {
        let class = ParsedClass::parse(bytes)?;
        let name = class.name.clone();
        self.classes.write().insert(name.clone(), Arc::new(class));
        Ok(name)
    }

    /// Accepts dotted or slash-separated names.
    pub fn get(&self, name: &str) -> Option<ClassRef> {
        self.lookup(name).map(|class| self.handle(class))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }

    fn lookup(&self, name: &str) -> Option<Arc<ParsedClass>> {
        let classes = self.classes.read();
        if name.contains('/') {
            classes.get(&dotted(name)).cloned()
        } else {
            classes.get(name).cloned()
        }
    }

    fn handle(&self, class: Arc<ParsedClass>) -> ClassRef {
        Scoped::new(Box::new(PooledClass { pool: self.clone(), class }))
    }

    fn required(&self, name: &str) -> Result<ClassRef> {
        self.get(name).ok_or_else(|| InstrumenterError::NotFound(name.to_string()))
    }

    fn is_subtype(&self, class: &ParsedClass, target: &str, seen: &mut HashSet<String>) -> bool {
        if class.name == target {
            return true;
        }
        if !seen.insert(class.name.clone()) {
            return false;
        }
        for parent in class.super_name.iter().chain(class.interfaces.iter()) {
            if parent == target {
                return true;
            }
            if let Some(parent) = self.lookup(parent) {
                if self.is_subtype(&parent, target, seen) {
                    return true;
                }
            }
        }
        false
    }
}

impl ClassFactory for ClassPool {
    fn obtain_class_from_bytes(&self, name: &str, bytes: &[u8]) -> Result<ClassRef> {
        let parsed = self.insert(bytes)?;
        if parsed != dotted(name) {
            warn!("class bytes for {name} define {parsed}");
        }
        self.required(&parsed)
    }

    fn obtain_class(&self, name: &str, _redefinition: bool) -> Result<Option<ClassRef>> {
        Ok(self.get(name))
    }
}

struct PooledClass {
    pool: ClassPool,
    class: Arc<ParsedClass>,
}

impl Release for PooledClass {
    fn release(&mut self) {}
}

impl ClassHandle for PooledClass {
    fn name(&self) -> &str {
        &self.class.name
    }

    fn is_interface(&self) -> bool {
        self.class.access_flags & classfile::ACC_INTERFACE != 0
    }

    fn is_abstract(&self) -> bool {
        self.class.access_flags & ACC_ABSTRACT != 0
    }

    fn is_primitive(&self) -> bool {
        PRIMITIVES.contains(&self.class.name.as_str())
    }

    fn is_instance_of(&self, type_name: &str) -> bool {
        self.pool.is_subtype(&self.class, type_name, &mut HashSet::new())
    }

    fn annotation(&self, kind: AnnotationKind, _prune: bool) -> Option<Annotation> {
        find_annotation(&self.class.annotations, kind)
    }

    fn declared_field_count(&self) -> Result<usize> {
        Ok(self.class.fields.len())
    }

    fn declared_field(&self, index: usize) -> Result<FieldRef> {
        if index >= self.class.fields.len() {
            return Err(InstrumenterError::NotFound(format!("{} field #{index}", self.class.name)));
        }
        Ok(Scoped::new(Box::new(PooledField { class: Arc::clone(&self.class), index })))
    }

    fn declared_behavior_count(&self) -> Result<usize> {
        Ok(self.class.behaviors.len())
    }

    fn declared_behavior(&self, index: usize) -> Result<BehaviorRef> {
        if index >= self.class.behaviors.len() {
            return Err(InstrumenterError::NotFound(format!(
                "{} behavior #{index}",
                self.class.name
            )));
        }
        Ok(Scoped::new(Box::new(PooledBehavior {
            pool: self.pool.clone(),
            class: Arc::clone(&self.class),
            index,
        })))
    }

    fn interface_count(&self) -> Result<usize> {
        Ok(self.class.interfaces.len())
    }

    fn interface(&self, index: usize) -> Result<ClassRef> {
        let name = self.class.interfaces.get(index).ok_or_else(|| {
            InstrumenterError::NotFound(format!("{} interface #{index}", self.class.name))
        })?;
        self.pool.required(name)
    }

    fn superclass(&self) -> Result<Option<ClassRef>> {
        self.class.super_name.as_deref().map(|name| self.pool.required(name)).transpose()
    }

    fn declaring_class(&self) -> Result<Option<ClassRef>> {
        self.class.outer.as_deref().map(|name| self.pool.required(name)).transpose()
    }

    fn declaring_class_name(&self) -> Option<String> {
        self.class.outer.clone()
    }

    fn find_signature(&self, name: &str, descriptor: &str) -> Result<Option<BehaviorRef>> {
        let found = self
            .class
            .behaviors
            .iter()
            .position(|b| b.name == name && b.descriptor == descriptor);
        found.map(|index| self.declared_behavior(index)).transpose()
    }

    fn to_bytecode(&self) -> Result<Vec<u8>> {
        Ok(self.class.bytes.clone())
    }
}

struct PooledBehavior {
    pool: ClassPool,
    class: Arc<ParsedClass>,
    index: usize,
}

impl PooledBehavior {
    fn data(&self) -> &ParsedBehavior {
        &self.class.behaviors[self.index]
    }
}

impl Release for PooledBehavior {
    fn release(&mut self) {}
}

impl BehaviorHandle for PooledBehavior {
    fn name(&self) -> &str {
        &self.data().name
    }

    fn descriptor(&self) -> &str {
        &self.data().descriptor
    }

    fn declaring_class_name(&self) -> &str {
        &self.class.name
    }

    fn declaring_class(&self) -> Result<ClassRef> {
        Ok(self.pool.handle(Arc::clone(&self.class)))
    }

    fn annotation(&self, kind: AnnotationKind, _prune: bool) -> Option<Annotation> {
        find_annotation(&self.data().annotations, kind)
    }

    fn is_static(&self) -> bool {
        self.data().access_flags & ACC_STATIC != 0
    }

    fn is_abstract(&self) -> bool {
        self.data().access_flags & ACC_ABSTRACT != 0
    }

    fn is_native(&self) -> bool {
        self.data().access_flags & ACC_NATIVE != 0
    }

    fn is_constructor(&self) -> bool {
        self.data().name == "<init>"
    }

    fn is_finalize(&self) -> bool {
        let data = self.data();
        data.name == "finalize" && data.descriptor == "()V"
    }

    fn parameter_count(&self) -> Result<usize> {
        Ok(self.data().parameters.len())
    }

    fn parameter_type_name(&self, index: usize) -> Result<String> {
        self.data().parameters.get(index).cloned().ok_or_else(|| {
            InstrumenterError::NotFound(format!(
                "{}.{}{} parameter #{index}",
                self.class.name,
                self.name(),
                self.descriptor()
            ))
        })
    }

    fn instrument(&self, _editor: &mut dyn BehaviorEditor) -> Result<()> {
        Ok(())
    }
}

struct PooledField {
    class: Arc<ParsedClass>,
    index: usize,
}

impl PooledField {
    fn data(&self) -> &ParsedField {
        &self.class.fields[self.index]
    }
}

impl Release for PooledField {
    fn release(&mut self) {}
}

impl FieldHandle for PooledField {
    fn name(&self) -> &str {
        &self.data().name
    }

    fn type_name(&self) -> &str {
        &self.data().type_name
    }

    fn declaring_class_name(&self) -> &str {
        &self.class.name
    }

    fn annotation(&self, kind: AnnotationKind, _prune: bool) -> Option<Annotation> {
        find_annotation(&self.data().annotations, kind)
    }

    fn is_static(&self) -> bool {
        self.data().access_flags & ACC_STATIC != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_names_become_field_names() {
        assert_eq!(snake_case("groupAccounting"), "group_accounting");
        assert_eq!(snake_case("instanceIdentifierKind"), "instance_identifier_kind");
        assert_eq!(snake_case("id"), "id");
    }

    #[test]
    fn unknown_names_are_absent() {
        let pool = ClassPool::new();
        assert!(pool.is_empty());
        assert!(pool.get("com.example.Missing").is_none());
        assert!(matches!(
            pool.obtain_class("com/example/Missing", false),
            Ok(None)
        ));
    }
}
