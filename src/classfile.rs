//! Class file reader.
//!
//! Parses the parts of a `.class` file that instrumentation decisions look
//! at: the constant pool, access flags, the type hierarchy, fields, methods,
//! runtime annotations and the nesting attributes. Every other attribute is
//! kept as raw bytes.

use thiserror::Error;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<Option<CpInfo>>,
}

impl ConstantPool {
    pub fn get(&self, index: u16) -> Result<&CpInfo, ClassFileError> {
        if index == 0 {
            return Err(ClassFileError::InvalidConstantPoolIndex(index));
        }
        self.entries
            .get(index as usize)
            .and_then(|e| e.as_ref())
            .ok_or(ClassFileError::InvalidConstantPoolIndex(index))
    }

    pub fn get_utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            CpInfo::Utf8(s) => Ok(s.as_str()),
            _ => Err(ClassFileError::InvalidConstantPoolIndex(index)),
        }
    }

    /// Internal (slash separated) name of a `CONSTANT_Class` entry.
    pub fn get_class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            CpInfo::Class { name_index } => self.get_utf8(*name_index),
            _ => Err(ClassFileError::InvalidConstantPoolIndex(index)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }
}

#[derive(Debug, Clone)]
pub enum CpInfo {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { string_index: u16 },
    Fieldref { class_index: u16, name_and_type_index: u16 },
    Methodref { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodref { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
}

#[derive(Debug, Clone)]
pub enum AttributeInfo {
    InnerClasses { classes: Vec<InnerClassInfo> },
    EnclosingMethod { class_index: u16, method_index: u16 },
    RuntimeVisibleAnnotations { annotations: Vec<Annotation> },
    RuntimeInvisibleAnnotations { annotations: Vec<Annotation> },
    Unknown { name: String, info: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct InnerClassInfo {
    pub inner_class_info_index: u16,
    pub outer_class_info_index: u16,
    pub inner_name_index: u16,
    pub inner_class_access_flags: u16,
}

#[derive(Debug, Clone)]
pub struct Annotation {
    pub type_index: u16,
    pub element_value_pairs: Vec<ElementValuePair>,
}

#[derive(Debug, Clone)]
pub struct ElementValuePair {
    pub element_name_index: u16,
    pub value: ElementValue,
}

#[derive(Debug, Clone)]
pub enum ElementValue {
    Const { tag: u8, const_value_index: u16 },
    EnumConst { type_name_index: u16, const_name_index: u16 },
    ClassInfo { class_info_index: u16 },
    AnnotationValue(Annotation),
    ArrayValue(Vec<ElementValue>),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassFileError {
    #[error("unexpected end of file")]
    UnexpectedEof,
    #[error("invalid magic: {0:#x}")]
    InvalidMagic(u32),
    #[error("invalid constant pool index: {0}")]
    InvalidConstantPoolIndex(u16),
    #[error("invalid constant pool tag: {0}")]
    InvalidConstantPoolTag(u8),
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn read_u1(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u2(&mut self) -> Result<u16, ClassFileError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u4(&mut self) -> Result<u32, ClassFileError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ClassFileError> {
        if self.remaining() < len {
            return Err(ClassFileError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFileError> {
        let mut r = Reader::new(bytes);
        let magic = r.read_u4()?;
        if magic != MAGIC {
            return Err(ClassFileError::InvalidMagic(magic));
        }

        let minor_version = r.read_u2()?;
        let major_version = r.read_u2()?;

        let constant_pool = parse_constant_pool(&mut r)?;

        let access_flags = r.read_u2()?;
        let this_class = r.read_u2()?;
        let super_class = r.read_u2()?;

        let interfaces_count = r.read_u2()?;
        let mut interfaces = Vec::with_capacity(interfaces_count as usize);
        for _ in 0..interfaces_count {
            interfaces.push(r.read_u2()?);
        }

        let fields_count = r.read_u2()?;
        let mut fields = Vec::with_capacity(fields_count as usize);
        for _ in 0..fields_count {
            let (access_flags, name_index, descriptor_index, attributes) =
                parse_member(&mut r, &constant_pool)?;
            fields.push(FieldInfo { access_flags, name_index, descriptor_index, attributes });
        }

        let methods_count = r.read_u2()?;
        let mut methods = Vec::with_capacity(methods_count as usize);
        for _ in 0..methods_count {
            let (access_flags, name_index, descriptor_index, attributes) =
                parse_member(&mut r, &constant_pool)?;
            methods.push(MethodInfo { access_flags, name_index, descriptor_index, attributes });
        }

        let attributes = parse_attributes(&mut r, &constant_pool)?;

        Ok(Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Internal name of this class, for example `java/lang/Thread`.
    pub fn class_name(&self) -> Result<&str, ClassFileError> {
        self.constant_pool.get_class_name(self.this_class)
    }

    /// `None` only for `java/lang/Object` and module descriptors.
    pub fn super_class_name(&self) -> Result<Option<&str>, ClassFileError> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.constant_pool.get_class_name(self.super_class).map(Some)
    }

    pub fn interface_names(&self) -> Result<Vec<&str>, ClassFileError> {
        self.interfaces
            .iter()
            .map(|&index| self.constant_pool.get_class_name(index))
            .collect()
    }

    /// The lexically enclosing class: the outer class of a member class,
    /// or the class named by `EnclosingMethod` for local and anonymous
    /// classes.
    pub fn outer_class_name(&self) -> Result<Option<&str>, ClassFileError> {
        for attr in &self.attributes {
            if let AttributeInfo::InnerClasses { classes } = attr {
                for entry in classes {
                    if entry.inner_class_info_index == self.this_class
                        && entry.outer_class_info_index != 0
                    {
                        return self
                            .constant_pool
                            .get_class_name(entry.outer_class_info_index)
                            .map(Some);
                    }
                }
            }
        }
        for attr in &self.attributes {
            if let AttributeInfo::EnclosingMethod { class_index, .. } = attr {
                return self.constant_pool.get_class_name(*class_index).map(Some);
            }
        }
        Ok(None)
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        annotations(&self.attributes)
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & ACC_ABSTRACT != 0
    }
}

impl FieldInfo {
    pub fn name<'a>(&self, cp: &'a ConstantPool) -> Result<&'a str, ClassFileError> {
        cp.get_utf8(self.name_index)
    }

    pub fn descriptor<'a>(&self, cp: &'a ConstantPool) -> Result<&'a str, ClassFileError> {
        cp.get_utf8(self.descriptor_index)
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        annotations(&self.attributes)
    }
}

impl MethodInfo {
    pub fn name<'a>(&self, cp: &'a ConstantPool) -> Result<&'a str, ClassFileError> {
        cp.get_utf8(self.name_index)
    }

    pub fn descriptor<'a>(&self, cp: &'a ConstantPool) -> Result<&'a str, ClassFileError> {
        cp.get_utf8(self.descriptor_index)
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        annotations(&self.attributes)
    }
}

/// Visible and invisible runtime annotations in declaration order.
pub fn annotations(attributes: &[AttributeInfo]) -> impl Iterator<Item = &Annotation> {
    attributes.iter().flat_map(|attr| {
        let list: &[Annotation] = match attr {
            AttributeInfo::RuntimeVisibleAnnotations { annotations }
            | AttributeInfo::RuntimeInvisibleAnnotations { annotations } => annotations,
            _ => &[],
        };
        list.iter()
    })
}

/// Splits a method descriptor into its parameter field descriptors.
pub fn parameter_descriptors(descriptor: &str) -> Result<Vec<&str>, ClassFileError> {
    let invalid = || ClassFileError::InvalidDescriptor(descriptor.to_string());
    let body = descriptor
        .strip_prefix('(')
        .and_then(|rest| rest.split_once(')'))
        .map(|(params, _)| params)
        .ok_or_else(invalid)?;

    let bytes = body.as_bytes();
    let mut params = Vec::new();
    let mut start = 0;
    while start < bytes.len() {
        let mut end = start;
        while end < bytes.len() && bytes[end] == b'[' {
            end += 1;
        }
        match bytes.get(end) {
            Some(b'L') => {
                let semi = body[end..].find(';').ok_or_else(invalid)?;
                end += semi + 1;
            }
            Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => end += 1,
            _ => return Err(invalid()),
        }
        params.push(&body[start..end]);
        start = end;
    }
    Ok(params)
}

/// Java source form of a field descriptor: `[Ljava/lang/String;` becomes
/// `java.lang.String[]`, `J` becomes `long`.
pub fn java_type_name(descriptor: &str) -> Result<String, ClassFileError> {
    let dims = descriptor.bytes().take_while(|&b| b == b'[').count();
    let element = &descriptor[dims..];
    let mut name = match element {
        "B" => "byte".to_string(),
        "C" => "char".to_string(),
        "D" => "double".to_string(),
        "F" => "float".to_string(),
        "I" => "int".to_string(),
        "J" => "long".to_string(),
        "S" => "short".to_string(),
        "Z" => "boolean".to_string(),
        "V" => "void".to_string(),
        _ => element
            .strip_prefix('L')
            .and_then(|rest| rest.strip_suffix(';'))
            .map(|internal| internal.replace('/', "."))
            .ok_or_else(|| ClassFileError::InvalidDescriptor(descriptor.to_string()))?,
    };
    for _ in 0..dims {
        name.push_str("[]");
    }
    Ok(name)
}

fn parse_constant_pool(r: &mut Reader) -> Result<ConstantPool, ClassFileError> {
    let count = r.read_u2()? as usize;
    let mut entries: Vec<Option<CpInfo>> = Vec::with_capacity(count);
    entries.push(None); // index 0 is unused

    let mut i = 1;
    while i < count {
        let tag = r.read_u1()?;
        let entry = match tag {
            1 => {
                let len = r.read_u2()? as usize;
                let bytes = r.read_bytes(len)?;
                CpInfo::Utf8(String::from_utf8_lossy(bytes).into_owned())
            }
            3 => CpInfo::Integer(r.read_u4()? as i32),
            4 => CpInfo::Float(f32::from_bits(r.read_u4()?)),
            5 | 6 => {
                let high = r.read_u4()? as u64;
                let low = r.read_u4()? as u64;
                let bits = (high << 32) | low;
                let wide = if tag == 5 {
                    CpInfo::Long(bits as i64)
                } else {
                    CpInfo::Double(f64::from_bits(bits))
                };
                // long and double take two slots
                entries.push(Some(wide));
                entries.push(None);
                i += 2;
                continue;
            }
            7 => CpInfo::Class { name_index: r.read_u2()? },
            8 => CpInfo::String { string_index: r.read_u2()? },
            9 => CpInfo::Fieldref { class_index: r.read_u2()?, name_and_type_index: r.read_u2()? },
            10 => CpInfo::Methodref { class_index: r.read_u2()?, name_and_type_index: r.read_u2()? },
            11 => CpInfo::InterfaceMethodref { class_index: r.read_u2()?, name_and_type_index: r.read_u2()? },
            12 => CpInfo::NameAndType { name_index: r.read_u2()?, descriptor_index: r.read_u2()? },
            15 => CpInfo::MethodHandle { reference_kind: r.read_u1()?, reference_index: r.read_u2()? },
            16 => CpInfo::MethodType { descriptor_index: r.read_u2()? },
            17 => CpInfo::Dynamic { bootstrap_method_attr_index: r.read_u2()?, name_and_type_index: r.read_u2()? },
            18 => CpInfo::InvokeDynamic { bootstrap_method_attr_index: r.read_u2()?, name_and_type_index: r.read_u2()? },
            19 => CpInfo::Module { name_index: r.read_u2()? },
            20 => CpInfo::Package { name_index: r.read_u2()? },
            _ => return Err(ClassFileError::InvalidConstantPoolTag(tag)),
        };

        entries.push(Some(entry));
        i += 1;
    }

    Ok(ConstantPool { entries })
}

fn parse_member(
    r: &mut Reader,
    cp: &ConstantPool,
) -> Result<(u16, u16, u16, Vec<AttributeInfo>), ClassFileError> {
    let access_flags = r.read_u2()?;
    let name_index = r.read_u2()?;
    let descriptor_index = r.read_u2()?;
    let attributes = parse_attributes(r, cp)?;
    Ok((access_flags, name_index, descriptor_index, attributes))
}

fn parse_attributes(r: &mut Reader, cp: &ConstantPool) -> Result<Vec<AttributeInfo>, ClassFileError> {
    let count = r.read_u2()? as usize;
    let mut attrs = Vec::with_capacity(count);
    for _ in 0..count {
        let name_index = r.read_u2()?;
        let length = r.read_u4()? as usize;
        let name = cp.get_utf8(name_index)?;
        let info_bytes = r.read_bytes(length)?;
        let mut sub = Reader::new(info_bytes);

        let attr = match name {
            "InnerClasses" => {
                let num = sub.read_u2()? as usize;
                let mut classes = Vec::with_capacity(num);
                for _ in 0..num {
                    classes.push(InnerClassInfo {
                        inner_class_info_index: sub.read_u2()?,
                        outer_class_info_index: sub.read_u2()?,
                        inner_name_index: sub.read_u2()?,
                        inner_class_access_flags: sub.read_u2()?,
                    });
                }
                AttributeInfo::InnerClasses { classes }
            }
            "EnclosingMethod" => AttributeInfo::EnclosingMethod {
                class_index: sub.read_u2()?,
                method_index: sub.read_u2()?,
            },
            "RuntimeVisibleAnnotations" => AttributeInfo::RuntimeVisibleAnnotations {
                annotations: parse_annotations(&mut sub)?,
            },
            "RuntimeInvisibleAnnotations" => AttributeInfo::RuntimeInvisibleAnnotations {
                annotations: parse_annotations(&mut sub)?,
            },
            _ => {
                sub.pos = info_bytes.len();
                AttributeInfo::Unknown { name: name.to_string(), info: info_bytes.to_vec() }
            }
        };

        if sub.remaining() != 0 {
            return Err(ClassFileError::InvalidAttribute(name.to_string()));
        }

        attrs.push(attr);
    }
    Ok(attrs)
}

fn parse_annotations(r: &mut Reader) -> Result<Vec<Annotation>, ClassFileError> {
    let num = r.read_u2()? as usize;
    let mut annotations = Vec::with_capacity(num);
    for _ in 0..num {
        annotations.push(parse_annotation(r)?);
    }
    Ok(annotations)
}

fn parse_annotation(r: &mut Reader) -> Result<Annotation, ClassFileError> {
    let type_index = r.read_u2()?;
    let num_pairs = r.read_u2()? as usize;
    let mut element_value_pairs = Vec::with_capacity(num_pairs);
    for _ in 0..num_pairs {
        let element_name_index = r.read_u2()?;
        let value = parse_element_value(r)?;
        element_value_pairs.push(ElementValuePair { element_name_index, value });
    }
    Ok(Annotation { type_index, element_value_pairs })
}

fn parse_element_value(r: &mut Reader) -> Result<ElementValue, ClassFileError> {
    let tag = r.read_u1()?;
    let value = match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => {
            ElementValue::Const { tag, const_value_index: r.read_u2()? }
        }
        b'e' => ElementValue::EnumConst {
            type_name_index: r.read_u2()?,
            const_name_index: r.read_u2()?,
        },
        b'c' => ElementValue::ClassInfo { class_info_index: r.read_u2()? },
        b'@' => ElementValue::AnnotationValue(parse_annotation(r)?),
        b'[' => {
            let num_values = r.read_u2()? as usize;
            let mut values = Vec::with_capacity(num_values);
            for _ in 0..num_values {
                values.push(parse_element_value(r)?);
            }
            ElementValue::ArrayValue(values)
        }
        _ => return Err(ClassFileError::InvalidAttribute("annotation".to_string())),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_parameter_descriptors() {
        let params = parameter_descriptors("(I[Ljava/lang/String;[[JLjava/util/List;)V").unwrap();
        assert_eq!(params, vec!["I", "[Ljava/lang/String;", "[[J", "Ljava/util/List;"]);
        assert!(parameter_descriptors("()V").unwrap().is_empty());
        assert!(parameter_descriptors("(Ljava/lang/String)V").is_err());
        assert!(parameter_descriptors("V").is_err());
    }

    #[test]
    fn renders_java_type_names() {
        assert_eq!(java_type_name("[Ljava/lang/String;").unwrap(), "java.lang.String[]");
        assert_eq!(java_type_name("J").unwrap(), "long");
        assert_eq!(java_type_name("[[I").unwrap(), "int[][]");
        assert!(java_type_name("Q").is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let err = ClassFile::parse(&[0xCA, 0xFE, 0xBA, 0xBF, 0, 0, 0, 52]).unwrap_err();
        assert_eq!(err, ClassFileError::InvalidMagic(0xCAFE_BABF));
        assert_eq!(err.to_string(), "invalid magic: 0xcafebabf");
    }

    #[test]
    fn truncated_input_is_eof() {
        assert_eq!(ClassFile::parse(&[0xCA, 0xFE]).unwrap_err(), ClassFileError::UnexpectedEof);
    }
}
