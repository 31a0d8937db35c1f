//! CDR message writer.
//!
//! Encoding is two-pass: [`MessageWriter::calculate_byte_size`] walks the
//! value with the same traversal as the write pass, and
//! [`MessageWriter::write_message`] allocates the buffer once after sizing
//! succeeds. The two traversals must stay in lockstep; the write pass
//! asserts the final length against the size pass.
//!
//! Missing fields are filled from their defaults. In member-header framing
//! (`@mutable` types), absent optional fields are omitted entirely.

use bytes::BufMut;

use omgidl_common::{
    Definition, IdlMap, PrimitiveType, StructValue, UNION_DISCRIMINATOR_KEY, Value,
};

use crate::deser_info::{
    ComplexInfo, DeserializationInfoCache, FieldInfo, FieldType, StructInfo, UnionInfo,
};
use crate::encapsulation::EncapsulationKind;
use crate::error::SerializationError;

/// Serializes [`Value`] trees into CDR buffers against a fixed root type.
#[derive(Debug)]
pub struct MessageWriter {
    cache: DeserializationInfoCache,
    root: String,
    kind: EncapsulationKind,
}

impl MessageWriter {
    /// Build a little-endian classic-CDR writer for `root_name`.
    pub fn new(root_name: &str, definitions: &[Definition]) -> Result<Self, SerializationError> {
        Self::with_encapsulation_kind(root_name, definitions, EncapsulationKind::CdrLe)
    }

    /// Build a writer emitting the given encapsulation kind.
    pub fn with_encapsulation_kind(
        root_name: &str,
        definitions: &[Definition],
        kind: EncapsulationKind,
    ) -> Result<Self, SerializationError> {
        let map = IdlMap::build(definitions);
        let root = map
            .find_root(root_name)
            .ok_or_else(|| SerializationError::RootNotFound(root_name.to_string()))?
            .to_string();
        let cache = DeserializationInfoCache::from_map(&map)?;
        Ok(Self { cache, root, kind })
    }

    /// Exact encoded size of `message`, including the 4-byte encapsulation
    /// header.
    pub fn calculate_byte_size(&self, message: &Value) -> Result<usize, SerializationError> {
        let sizer = SizePass {
            cache: &self.cache,
            is_cdr2: self.kind.is_cdr2(),
        };
        let info = self.cache.complex(&self.root)?;
        sizer.complex_size(info, Some(message), 4, &self.root)
    }

    /// Encode `message` into an owned buffer.
    pub fn write_message(&self, message: &Value) -> Result<Vec<u8>, SerializationError> {
        let size = self.calculate_byte_size(message)?;
        let mut encoder = WritePass {
            cache: &self.cache,
            buf: Vec::with_capacity(size),
            little_endian: self.kind.is_little_endian(),
            is_cdr2: self.kind.is_cdr2(),
        };
        encoder.buf.extend([0x00, self.kind.as_byte(), 0x00, 0x00]);
        let info = self.cache.complex(&self.root)?;
        encoder.write_complex(info, Some(message), &self.root)?;
        // A mismatch here is a bug in the size pass, not a caller error.
        assert_eq!(
            encoder.buf.len(),
            size,
            "CDR size pass disagrees with write pass"
        );
        Ok(encoder.buf)
    }
}

/// Padding needed at absolute `offset` to reach `width`-alignment relative
/// to the end of the 4-byte encapsulation header.
fn padding(offset: usize, width: usize) -> usize {
    (width - ((offset - 4) % width)) % width
}

fn as_struct_opt<'v>(
    value: Option<&'v Value>,
    path: &str,
) -> Result<Option<&'v StructValue>, SerializationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Struct(s)) => Ok(Some(s)),
        Some(_) => Err(SerializationError::UnexpectedValue {
            field: path.to_string(),
            expected: "a struct value",
        }),
    }
}

fn as_array_opt<'v>(
    value: Option<&'v Value>,
    path: &str,
) -> Result<&'v [Value], SerializationError> {
    match value {
        None => Ok(&[]),
        Some(Value::Array(a)) => Ok(a),
        Some(_) => Err(SerializationError::UnexpectedValue {
            field: path.to_string(),
            expected: "an array value",
        }),
    }
}

/// Resolve a union's discriminator (falling back to the switch default)
/// and the case it selects.
fn union_parts<'u>(
    cache: &DeserializationInfoCache,
    info: &'u UnionInfo,
    msg: Option<&StructValue>,
) -> Result<(Value, &'u FieldInfo), SerializationError> {
    let discriminator = match msg.and_then(|m| m.get(UNION_DISCRIMINATOR_KEY)) {
        Some(v) if !matches!(v, Value::Null) => v.clone(),
        _ => cache.field_default(&info.discriminator)?,
    };
    let Some(case) = info.select_case(&discriminator) else {
        return Err(SerializationError::UnionNoCase {
            union: info.name.clone(),
            discriminator: format!("{discriminator:?}"),
        });
    };
    Ok((discriminator, case))
}

fn check_sequence_bound(
    len: usize,
    bound: Option<usize>,
    path: &str,
) -> Result<(), SerializationError> {
    if let Some(max) = bound
        && len > max
    {
        return Err(SerializationError::BoundViolation {
            field: path.to_string(),
            kind: "sequence",
            got: len,
            max,
        });
    }
    Ok(())
}

fn check_string_bound(
    s: &str,
    bound: Option<usize>,
    path: &str,
) -> Result<(), SerializationError> {
    if let Some(max) = bound {
        let got = s.chars().count();
        if got > max {
            return Err(SerializationError::BoundViolation {
                field: path.to_string(),
                kind: "string",
                got,
                max,
            });
        }
    }
    Ok(())
}

/// The string to encode for a scalar string field: the supplied value, the
/// field's `@default`, or empty.
fn string_to_write<'v>(
    field: &'v FieldInfo,
    value: Option<&'v Value>,
    path: &str,
) -> Result<&'v str, SerializationError> {
    match value {
        Some(Value::String(s)) => Ok(s.as_ref()),
        Some(_) => Err(SerializationError::UnexpectedValue {
            field: path.to_string(),
            expected: "a string value",
        }),
        None => match &field.default {
            Some(Value::String(s)) => Ok(s.as_ref()),
            _ => Ok(""),
        },
    }
}

// ── size pass ────────────────────────────────────────────────────────────

struct SizePass<'c> {
    cache: &'c DeserializationInfoCache,
    is_cdr2: bool,
}

impl SizePass<'_> {
    fn complex_size(
        &self,
        info: &ComplexInfo,
        value: Option<&Value>,
        mut offset: usize,
        path: &str,
    ) -> Result<usize, SerializationError> {
        let framing = info.framing();
        if framing.uses_delimiter_header && self.is_cdr2 {
            offset += padding(offset, 4) + 4;
        }
        match info {
            ComplexInfo::Struct(s) => {
                self.struct_size(s, framing.uses_member_header, value, offset, path)
            }
            ComplexInfo::Union(u) => {
                self.union_size(u, framing.uses_member_header, value, offset, path)
            }
        }
    }

    fn struct_size(
        &self,
        info: &StructInfo,
        use_member_header: bool,
        value: Option<&Value>,
        mut offset: usize,
        path: &str,
    ) -> Result<usize, SerializationError> {
        let msg = as_struct_opt(value, path)?;
        for field in &info.fields {
            let v = msg.and_then(|m| m.get(&field.name));
            if use_member_header {
                if v.is_none() && field.is_optional && field.default.is_none() {
                    continue;
                }
                offset += padding(offset, 4) + 4;
            }
            let field_path = format!("{path}.{}", field.name);
            offset = self.field_size(field, v, offset, &field_path)?;
        }
        if use_member_header {
            offset += padding(offset, 4) + 4; // sentinel
        }
        Ok(offset)
    }

    fn union_size(
        &self,
        info: &UnionInfo,
        use_member_header: bool,
        value: Option<&Value>,
        mut offset: usize,
        path: &str,
    ) -> Result<usize, SerializationError> {
        let msg = as_struct_opt(value, path)?;
        let (discriminator, case) = union_parts(self.cache, info, msg)?;

        if use_member_header {
            offset += padding(offset, 4) + 4;
        }
        let disc_path = format!("{path}.{UNION_DISCRIMINATOR_KEY}");
        offset = self.field_size(&info.discriminator, Some(&discriminator), offset, &disc_path)?;

        if use_member_header {
            offset += padding(offset, 4) + 4;
        }
        let case_value = msg.and_then(|m| m.get(&case.name));
        let case_path = format!("{path}.{}", case.name);
        offset = self.field_size(case, case_value, offset, &case_path)?;

        if use_member_header {
            offset += padding(offset, 4) + 4; // sentinel
        }
        Ok(offset)
    }

    fn field_size(
        &self,
        field: &FieldInfo,
        value: Option<&Value>,
        offset: usize,
        path: &str,
    ) -> Result<usize, SerializationError> {
        if !field.array_lengths.is_empty() {
            return self.array_size(field, &field.array_lengths, value, offset, path);
        }
        if field.is_sequence {
            return self.sequence_size(field, value, offset, path);
        }
        self.scalar_size(field, value, offset, path)
    }

    fn array_size(
        &self,
        field: &FieldInfo,
        lengths: &[usize],
        value: Option<&Value>,
        mut offset: usize,
        path: &str,
    ) -> Result<usize, SerializationError> {
        let elems = as_array_opt(value, path)?;
        for i in 0..lengths[0] {
            let elem = elems.get(i);
            let elem_path = format!("{path}[{i}]");
            offset = if lengths.len() > 1 {
                self.array_size(field, &lengths[1..], elem, offset, &elem_path)?
            } else if field.is_sequence {
                self.sequence_size(field, elem, offset, &elem_path)?
            } else {
                self.scalar_size(field, elem, offset, &elem_path)?
            };
        }
        Ok(offset)
    }

    fn sequence_size(
        &self,
        field: &FieldInfo,
        value: Option<&Value>,
        mut offset: usize,
        path: &str,
    ) -> Result<usize, SerializationError> {
        let elems = as_array_opt(value, path)?;
        check_sequence_bound(elems.len(), field.sequence_bound, path)?;
        offset += padding(offset, 4) + 4;
        for (i, elem) in elems.iter().enumerate() {
            let elem_path = format!("{path}[{i}]");
            offset = self.scalar_size(field, Some(elem), offset, &elem_path)?;
        }
        Ok(offset)
    }

    fn scalar_size(
        &self,
        field: &FieldInfo,
        value: Option<&Value>,
        mut offset: usize,
        path: &str,
    ) -> Result<usize, SerializationError> {
        match &field.ty {
            FieldType::Primitive(PrimitiveType::String) => {
                let s = string_to_write(field, value, path)?;
                check_string_bound(s, field.string_upper_bound, path)?;
                Ok(offset + padding(offset, 4) + 4 + s.len() + 1)
            }
            FieldType::Primitive(PrimitiveType::WString) => {
                let s = string_to_write(field, value, path)?;
                check_string_bound(s, field.string_upper_bound, path)?;
                let units = s.encode_utf16().count();
                Ok(offset + padding(offset, 4) + 4 + units * 2 + 2)
            }
            FieldType::Primitive(p) => {
                let size = p.size();
                Ok(offset + padding(offset, size) + size)
            }
            FieldType::Enum(_) => Ok(offset + padding(offset, 4) + 4),
            FieldType::Complex(name) => {
                let info = self.cache.complex(name)?;
                offset = self.complex_size(info, value, offset, path)?;
                Ok(offset)
            }
        }
    }
}

// ── write pass ───────────────────────────────────────────────────────────

struct WritePass<'c> {
    cache: &'c DeserializationInfoCache,
    buf: Vec<u8>,
    little_endian: bool,
    is_cdr2: bool,
}

impl WritePass<'_> {
    fn pad_to(&mut self, width: usize) {
        let pad = padding(self.buf.len(), width);
        for _ in 0..pad {
            self.buf.push(0);
        }
    }

    fn put_u16(&mut self, v: u16) {
        if self.little_endian {
            self.buf.put_u16_le(v);
        } else {
            self.buf.put_u16(v);
        }
    }

    fn put_u32(&mut self, v: u32) {
        if self.little_endian {
            self.buf.put_u32_le(v);
        } else {
            self.buf.put_u32(v);
        }
    }

    fn put_u64(&mut self, v: u64) {
        if self.little_endian {
            self.buf.put_u64_le(v);
        } else {
            self.buf.put_u64(v);
        }
    }

    fn patch_u16(&mut self, at: usize, v: u16) {
        let bytes = if self.little_endian {
            v.to_le_bytes()
        } else {
            v.to_be_bytes()
        };
        self.buf[at..at + 2].copy_from_slice(&bytes);
    }

    fn patch_u32(&mut self, at: usize, v: u32) {
        let bytes = if self.little_endian {
            v.to_le_bytes()
        } else {
            v.to_be_bytes()
        };
        self.buf[at..at + 4].copy_from_slice(&bytes);
    }

    // ── complex types ────────────────────────────────────────────────────

    fn write_complex(
        &mut self,
        info: &ComplexInfo,
        value: Option<&Value>,
        path: &str,
    ) -> Result<(), SerializationError> {
        let framing = info.framing();
        let use_delimiter = framing.uses_delimiter_header && self.is_cdr2;
        let mut delimiter_at = 0;
        if use_delimiter {
            self.pad_to(4);
            delimiter_at = self.buf.len();
            self.put_u32(0);
        }
        match info {
            ComplexInfo::Struct(s) => {
                self.write_struct(s, framing.uses_member_header, value, path)?;
            }
            ComplexInfo::Union(u) => {
                self.write_union(u, framing.uses_member_header, value, path)?;
            }
        }
        if use_delimiter {
            let body_len = self.buf.len() - delimiter_at - 4;
            self.patch_u32(delimiter_at, body_len as u32);
        }
        Ok(())
    }

    fn write_struct(
        &mut self,
        info: &StructInfo,
        use_member_header: bool,
        value: Option<&Value>,
        path: &str,
    ) -> Result<(), SerializationError> {
        let msg = as_struct_opt(value, path)?;
        for field in &info.fields {
            let v = msg.and_then(|m| m.get(&field.name));
            let field_path = format!("{path}.{}", field.name);
            if use_member_header {
                if v.is_none() && field.is_optional && field.default.is_none() {
                    continue;
                }
                self.write_member(field, v, &field_path)?;
            } else {
                self.write_field(field, v, &field_path)?;
            }
        }
        if use_member_header {
            self.write_sentinel();
        }
        Ok(())
    }

    fn write_union(
        &mut self,
        info: &UnionInfo,
        use_member_header: bool,
        value: Option<&Value>,
        path: &str,
    ) -> Result<(), SerializationError> {
        let msg = as_struct_opt(value, path)?;
        let (discriminator, case) = union_parts(self.cache, info, msg)?;

        let disc_path = format!("{path}.{UNION_DISCRIMINATOR_KEY}");
        let case_value = msg.and_then(|m| m.get(&case.name));
        let case_path = format!("{path}.{}", case.name);
        if use_member_header {
            self.write_member(&info.discriminator, Some(&discriminator), &disc_path)?;
            self.write_member(case, case_value, &case_path)?;
            self.write_sentinel();
        } else {
            self.write_field(&info.discriminator, Some(&discriminator), &disc_path)?;
            self.write_field(case, case_value, &case_path)?;
        }
        Ok(())
    }

    /// Emit a `(uint16 id, uint16 size)` member header, the field payload,
    /// and patch the size back in.
    fn write_member(
        &mut self,
        field: &FieldInfo,
        value: Option<&Value>,
        path: &str,
    ) -> Result<(), SerializationError> {
        self.pad_to(4);
        let header_at = self.buf.len();
        self.put_u16(field.id);
        self.put_u16(0);
        let payload_start = self.buf.len();
        self.write_field(field, value, path)?;
        let size = self.buf.len() - payload_start;
        let size = u16::try_from(size).map_err(|_| SerializationError::EncodingError {
            field: path.to_string(),
            detail: "member payload exceeds 65535 bytes".to_string(),
        })?;
        self.patch_u16(header_at + 2, size);
        Ok(())
    }

    fn write_sentinel(&mut self) {
        self.pad_to(4);
        self.put_u32(0);
    }

    // ── fields ───────────────────────────────────────────────────────────

    fn write_field(
        &mut self,
        field: &FieldInfo,
        value: Option<&Value>,
        path: &str,
    ) -> Result<(), SerializationError> {
        if !field.array_lengths.is_empty() {
            return self.write_array(field, &field.array_lengths, value, path);
        }
        if field.is_sequence {
            return self.write_sequence(field, value, path);
        }
        self.write_scalar(field, value, path)
    }

    fn write_array(
        &mut self,
        field: &FieldInfo,
        lengths: &[usize],
        value: Option<&Value>,
        path: &str,
    ) -> Result<(), SerializationError> {
        // Short input arrays are padded with element defaults; excess
        // elements are ignored.
        let elems = as_array_opt(value, path)?;
        for i in 0..lengths[0] {
            let elem = elems.get(i);
            let elem_path = format!("{path}[{i}]");
            if lengths.len() > 1 {
                self.write_array(field, &lengths[1..], elem, &elem_path)?;
            } else if field.is_sequence {
                self.write_sequence(field, elem, &elem_path)?;
            } else {
                self.write_scalar(field, elem, &elem_path)?;
            }
        }
        Ok(())
    }

    fn write_sequence(
        &mut self,
        field: &FieldInfo,
        value: Option<&Value>,
        path: &str,
    ) -> Result<(), SerializationError> {
        let elems = as_array_opt(value, path)?;
        check_sequence_bound(elems.len(), field.sequence_bound, path)?;
        self.pad_to(4);
        self.put_u32(elems.len() as u32);
        for (i, elem) in elems.iter().enumerate() {
            let elem_path = format!("{path}[{i}]");
            self.write_scalar(field, Some(elem), &elem_path)?;
        }
        Ok(())
    }

    fn write_scalar(
        &mut self,
        field: &FieldInfo,
        value: Option<&Value>,
        path: &str,
    ) -> Result<(), SerializationError> {
        match &field.ty {
            FieldType::Primitive(PrimitiveType::String) => {
                let s = string_to_write(field, value, path)?;
                check_string_bound(s, field.string_upper_bound, path)?;
                self.pad_to(4);
                self.put_u32((s.len() + 1) as u32);
                self.buf.extend_from_slice(s.as_bytes());
                self.buf.push(0);
                Ok(())
            }
            FieldType::Primitive(PrimitiveType::WString) => {
                let s = string_to_write(field, value, path)?;
                check_string_bound(s, field.string_upper_bound, path)?;
                let units: Vec<u16> = s.encode_utf16().collect();
                self.pad_to(4);
                self.put_u32((units.len() * 2 + 2) as u32);
                // UTF-16LE payload under both stream endiannesses.
                for unit in units {
                    self.buf.extend_from_slice(&unit.to_le_bytes());
                }
                self.buf.extend_from_slice(&[0, 0]);
                Ok(())
            }
            FieldType::Primitive(p) => self.write_primitive(*p, field, value, path),
            FieldType::Enum(_) => {
                let v = self.unsigned_to_write(field, value, u64::from(u32::MAX), path)?;
                self.pad_to(4);
                self.put_u32(v as u32);
                Ok(())
            }
            FieldType::Complex(name) => {
                let info = self.cache.complex(name)?;
                self.write_complex(info, value, path)
            }
        }
    }

    fn write_primitive(
        &mut self,
        p: PrimitiveType,
        field: &FieldInfo,
        value: Option<&Value>,
        path: &str,
    ) -> Result<(), SerializationError> {
        self.pad_to(p.size());
        match p {
            PrimitiveType::Bool => {
                let v = match value.or(field.default.as_ref()) {
                    None => false,
                    Some(v) => v.as_bool().ok_or_else(|| unexpected(path, "a boolean value"))?,
                };
                self.buf.push(v as u8);
            }
            PrimitiveType::I8 => {
                let v = self.signed_to_write(field, value, i64::from(i8::MIN), i64::from(i8::MAX), path)?;
                self.buf.push(v as i8 as u8);
            }
            PrimitiveType::I16 => {
                let v = self.signed_to_write(field, value, i64::from(i16::MIN), i64::from(i16::MAX), path)?;
                self.put_u16(v as i16 as u16);
            }
            PrimitiveType::I32 => {
                let v = self.signed_to_write(field, value, i64::from(i32::MIN), i64::from(i32::MAX), path)?;
                self.put_u32(v as i32 as u32);
            }
            PrimitiveType::I64 => {
                let v = self.signed_to_write(field, value, i64::MIN, i64::MAX, path)?;
                self.put_u64(v as u64);
            }
            PrimitiveType::U8 => {
                let v = self.unsigned_to_write(field, value, u64::from(u8::MAX), path)?;
                self.buf.push(v as u8);
            }
            PrimitiveType::U16 => {
                let v = self.unsigned_to_write(field, value, u64::from(u16::MAX), path)?;
                self.put_u16(v as u16);
            }
            PrimitiveType::U32 => {
                let v = self.unsigned_to_write(field, value, u64::from(u32::MAX), path)?;
                self.put_u32(v as u32);
            }
            PrimitiveType::U64 => {
                let v = self.unsigned_to_write(field, value, u64::MAX, path)?;
                self.put_u64(v);
            }
            PrimitiveType::F32 => {
                let v = self.float_to_write(field, value, path)?;
                self.put_u32((v as f32).to_bits());
            }
            PrimitiveType::F64 => {
                let v = self.float_to_write(field, value, path)?;
                self.put_u64(v.to_bits());
            }
            PrimitiveType::String | PrimitiveType::WString => {
                unreachable!("strings are handled in write_scalar")
            }
        }
        Ok(())
    }

    fn signed_to_write(
        &self,
        field: &FieldInfo,
        value: Option<&Value>,
        min: i64,
        max: i64,
        path: &str,
    ) -> Result<i64, SerializationError> {
        let Some(v) = value.or(field.default.as_ref()) else {
            return Ok(0);
        };
        let v = v
            .to_i64()
            .ok_or_else(|| unexpected(path, "an integer value"))?;
        if v < min || v > max {
            return Err(unexpected(path, "an integer in range for the field width"));
        }
        Ok(v)
    }

    fn unsigned_to_write(
        &self,
        field: &FieldInfo,
        value: Option<&Value>,
        max: u64,
        path: &str,
    ) -> Result<u64, SerializationError> {
        let Some(v) = value.or(field.default.as_ref()) else {
            return Ok(0);
        };
        let v = v
            .to_u64()
            .ok_or_else(|| unexpected(path, "an unsigned integer value"))?;
        if v > max {
            return Err(unexpected(path, "an integer in range for the field width"));
        }
        Ok(v)
    }

    fn float_to_write(
        &self,
        field: &FieldInfo,
        value: Option<&Value>,
        path: &str,
    ) -> Result<f64, SerializationError> {
        match value.or(field.default.as_ref()) {
            None => Ok(0.0),
            Some(v) => v
                .to_f64()
                .ok_or_else(|| unexpected(path, "a numeric value")),
        }
    }
}

fn unexpected(path: &str, expected: &'static str) -> SerializationError {
    SerializationError::UnexpectedValue {
        field: path.to_string(),
        expected,
    }
}
