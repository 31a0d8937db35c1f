//! CDR message reader.
//!
//! Decodes a CDR byte buffer into a [`Value`] tree against a root type.
//! Endianness and CDR variant come from the encapsulation header; framing
//! (delimiter and member headers) comes from each type's extensibility
//! annotations combined with the stream kind.

use bytes::Buf;

use omgidl_common::{
    Definition, IdlMap, PrimitiveType, StructValue, UNION_DISCRIMINATOR_KEY, Value,
};

use crate::deser_info::{
    ComplexInfo, DeserializationInfoCache, FieldInfo, FieldType, StructInfo, UnionInfo,
};
use crate::encapsulation::EncapsulationKind;
use crate::error::SerializationError;

/// Deserializes CDR-encoded buffers produced against a fixed root type.
///
/// The reader borrows the input buffer only for the duration of
/// [`read_message`](Self::read_message); decoded values own their data.
#[derive(Debug)]
pub struct MessageReader {
    cache: DeserializationInfoCache,
    root: String,
}

impl MessageReader {
    /// Build a reader for `root_name` (fully qualified, or unqualified when
    /// unambiguous) against parsed schema definitions.
    pub fn new(root_name: &str, definitions: &[Definition]) -> Result<Self, SerializationError> {
        let map = IdlMap::build(definitions);
        let root = map
            .find_root(root_name)
            .ok_or_else(|| SerializationError::RootNotFound(root_name.to_string()))?
            .to_string();
        let cache = DeserializationInfoCache::from_map(&map)?;
        Ok(Self { cache, root })
    }

    /// Decode one message.
    pub fn read_message(&self, data: &[u8]) -> Result<Value, SerializationError> {
        if data.len() < 4 {
            return Err(SerializationError::BufferUnderflow(
                "encapsulation header".to_string(),
            ));
        }
        let kind = EncapsulationKind::from_byte(data[1])
            .ok_or(SerializationError::BadEncapsulation(data[1]))?;

        let mut decoder = Decoder {
            buf: &data[4..],
            payload_len: data.len() - 4,
            little_endian: kind.is_little_endian(),
            is_cdr2: kind.is_cdr2(),
            cache: &self.cache,
        };
        let info = self.cache.complex(&self.root)?;
        decoder.read_complex(info, &self.root)
    }
}

struct Decoder<'a, 'c> {
    /// Payload after the 4-byte encapsulation header; shrinks as we read.
    buf: &'a [u8],
    payload_len: usize,
    little_endian: bool,
    is_cdr2: bool,
    cache: &'c DeserializationInfoCache,
}

impl Decoder<'_, '_> {
    /// Offset relative to the end of the encapsulation header, which is
    /// what CDR alignment is measured from.
    fn pos(&self) -> usize {
        self.payload_len - self.buf.len()
    }

    fn align(&mut self, width: usize, path: &str) -> Result<(), SerializationError> {
        let pad = (width - self.pos() % width) % width;
        if self.buf.len() < pad {
            return Err(SerializationError::BufferUnderflow(path.to_string()));
        }
        self.buf.advance(pad);
        Ok(())
    }

    fn underflow(&self, path: &str) -> SerializationError {
        SerializationError::BufferUnderflow(path.to_string())
    }

    fn read_bytes(&mut self, n: usize, path: &str) -> Result<&[u8], SerializationError> {
        if self.buf.len() < n {
            return Err(self.underflow(path));
        }
        let buf = self.buf;
        let (head, tail) = buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn get_u16(&mut self, path: &str) -> Result<u16, SerializationError> {
        let got = if self.little_endian {
            self.buf.try_get_u16_le()
        } else {
            self.buf.try_get_u16()
        };
        got.map_err(|_| self.underflow(path))
    }

    fn get_u32(&mut self, path: &str) -> Result<u32, SerializationError> {
        let got = if self.little_endian {
            self.buf.try_get_u32_le()
        } else {
            self.buf.try_get_u32()
        };
        got.map_err(|_| self.underflow(path))
    }

    fn get_u64(&mut self, path: &str) -> Result<u64, SerializationError> {
        let got = if self.little_endian {
            self.buf.try_get_u64_le()
        } else {
            self.buf.try_get_u64()
        };
        got.map_err(|_| self.underflow(path))
    }

    // ── complex types ────────────────────────────────────────────────────

    fn read_complex(
        &mut self,
        info: &ComplexInfo,
        path: &str,
    ) -> Result<Value, SerializationError> {
        let framing = info.framing();
        if framing.uses_delimiter_header && self.is_cdr2 {
            self.align(4, path)?;
            let body_len = self.get_u32(path)? as usize;
            if body_len > self.buf.len() {
                return Err(self.underflow(path));
            }
            // The schema dictates field order; the length is only verified.
        }
        match info {
            ComplexInfo::Struct(s) => self.read_struct(s, framing.uses_member_header, path),
            ComplexInfo::Union(u) => self.read_union(u, framing.uses_member_header, path),
        }
    }

    fn read_struct(
        &mut self,
        info: &StructInfo,
        use_member_header: bool,
        path: &str,
    ) -> Result<Value, SerializationError> {
        // Start from the default value so that omitted optional members and
        // permuted or missing PL_CDR ids still produce a complete message.
        let mut msg = self.cache.struct_default(info)?;

        if use_member_header {
            loop {
                self.align(4, path)?;
                let id = self.get_u16(path)?;
                let size = self.get_u16(path)?;
                if id == 0 && size == 0 {
                    break;
                }
                match info.fields.iter().find(|f| f.id == id) {
                    Some(field) => {
                        let field_path = format!("{path}.{}", field.name);
                        let value = self.read_field(field, &field_path)?;
                        msg.insert(field.name.clone(), value);
                    }
                    None => {
                        // Unknown member id: skip the advertised payload.
                        if self.buf.len() < size as usize {
                            return Err(self.underflow(path));
                        }
                        self.buf.advance(size as usize);
                    }
                }
            }
        } else {
            for field in &info.fields {
                let field_path = format!("{path}.{}", field.name);
                let value = self.read_field(field, &field_path)?;
                msg.insert(field.name.clone(), value);
            }
        }
        Ok(Value::Struct(msg))
    }

    fn read_union(
        &mut self,
        info: &UnionInfo,
        use_member_header: bool,
        path: &str,
    ) -> Result<Value, SerializationError> {
        if use_member_header {
            self.align(4, path)?;
            self.get_u16(path)?;
            self.get_u16(path)?;
        }
        let disc_path = format!("{path}.{UNION_DISCRIMINATOR_KEY}");
        let discriminator = self.read_field(&info.discriminator, &disc_path)?;
        let case = info.select_case(&discriminator);

        let mut msg = StructValue::new();
        msg.insert(UNION_DISCRIMINATOR_KEY, discriminator);
        if let Some(field) = case {
            if use_member_header {
                self.align(4, path)?;
                self.get_u16(path)?;
                self.get_u16(path)?;
            }
            let field_path = format!("{path}.{}", field.name);
            let value = self.read_field(field, &field_path)?;
            msg.insert(field.name.clone(), value);
        }
        if use_member_header {
            self.align(4, path)?;
            self.get_u32(path)?; // sentinel
        }
        Ok(Value::Struct(msg))
    }

    // ── fields ───────────────────────────────────────────────────────────

    fn read_field(
        &mut self,
        field: &FieldInfo,
        path: &str,
    ) -> Result<Value, SerializationError> {
        if !field.array_lengths.is_empty() {
            return self.read_array(field, &field.array_lengths, path);
        }
        if field.is_sequence {
            return self.read_sequence(field, path);
        }
        self.read_scalar(field, path)
    }

    fn read_array(
        &mut self,
        field: &FieldInfo,
        lengths: &[usize],
        path: &str,
    ) -> Result<Value, SerializationError> {
        let mut arr = Vec::with_capacity(lengths[0]);
        for i in 0..lengths[0] {
            let elem_path = format!("{path}[{i}]");
            arr.push(if lengths.len() > 1 {
                self.read_array(field, &lengths[1..], &elem_path)?
            } else if field.is_sequence {
                self.read_sequence(field, &elem_path)?
            } else {
                self.read_scalar(field, &elem_path)?
            });
        }
        Ok(Value::Array(arr))
    }

    fn read_sequence(
        &mut self,
        field: &FieldInfo,
        path: &str,
    ) -> Result<Value, SerializationError> {
        self.align(4, path)?;
        let len = self.get_u32(path)? as usize;
        if let Some(max) = field.sequence_bound
            && len > max
        {
            return Err(SerializationError::BoundViolation {
                field: path.to_string(),
                kind: "sequence",
                got: len,
                max,
            });
        }
        // Elements occupy at least one byte each, so this cannot
        // over-reserve past the buffer on malformed input.
        let mut arr = Vec::with_capacity(len.min(self.buf.len()));
        for i in 0..len {
            let elem_path = format!("{path}[{i}]");
            arr.push(self.read_scalar(field, &elem_path)?);
        }
        Ok(Value::Array(arr))
    }

    fn read_scalar(
        &mut self,
        field: &FieldInfo,
        path: &str,
    ) -> Result<Value, SerializationError> {
        match &field.ty {
            FieldType::Primitive(PrimitiveType::String) => {
                let s = self.read_string(path)?;
                check_string_bound(&s, field.string_upper_bound, path)?;
                Ok(Value::string(s))
            }
            FieldType::Primitive(PrimitiveType::WString) => {
                let s = self.read_wstring(path)?;
                check_string_bound(&s, field.string_upper_bound, path)?;
                Ok(Value::string(s))
            }
            FieldType::Primitive(p) => self.read_primitive(*p, path),
            FieldType::Enum(_) => {
                // Enums are demoted to uint32 on the wire.
                self.align(4, path)?;
                Ok(Value::U32(self.get_u32(path)?))
            }
            FieldType::Complex(name) => {
                let info = self.cache.complex(name)?;
                self.read_complex(info, path)
            }
        }
    }

    fn read_primitive(
        &mut self,
        p: PrimitiveType,
        path: &str,
    ) -> Result<Value, SerializationError> {
        self.align(p.size(), path)?;
        Ok(match p {
            PrimitiveType::Bool => {
                Value::Bool(self.buf.try_get_i8().map_err(|_| self.underflow(path))? != 0)
            }
            PrimitiveType::I8 => {
                Value::I8(self.buf.try_get_i8().map_err(|_| self.underflow(path))?)
            }
            PrimitiveType::U8 => {
                Value::U8(self.buf.try_get_u8().map_err(|_| self.underflow(path))?)
            }
            PrimitiveType::I16 => Value::I16(self.get_u16(path)? as i16),
            PrimitiveType::U16 => Value::U16(self.get_u16(path)?),
            PrimitiveType::I32 => Value::I32(self.get_u32(path)? as i32),
            PrimitiveType::U32 => Value::U32(self.get_u32(path)?),
            PrimitiveType::I64 => Value::I64(self.get_u64(path)? as i64),
            PrimitiveType::U64 => Value::U64(self.get_u64(path)?),
            PrimitiveType::F32 => Value::F32(f32::from_bits(self.get_u32(path)?)),
            PrimitiveType::F64 => Value::F64(f64::from_bits(self.get_u64(path)?)),
            PrimitiveType::String | PrimitiveType::WString => {
                unreachable!("strings are handled in read_scalar")
            }
        })
    }

    fn read_string(&mut self, path: &str) -> Result<String, SerializationError> {
        self.align(4, path)?;
        let len = self.get_u32(path)? as usize;
        if len == 0 {
            return Ok(String::new());
        }
        let bytes = self.read_bytes(len, path)?;
        if bytes.last() != Some(&0) {
            return Err(encoding_error(path, "missing string terminator"));
        }
        String::from_utf8(bytes[..len - 1].to_vec())
            .map_err(|e| encoding_error(path, &e.to_string()))
    }

    fn read_wstring(&mut self, path: &str) -> Result<String, SerializationError> {
        self.align(4, path)?;
        let len = self.get_u32(path)? as usize;
        if len == 0 {
            return Ok(String::new());
        }
        if len < 2 || len % 2 != 0 {
            return Err(encoding_error(path, "invalid wstring byte length"));
        }
        let bytes = self.read_bytes(len, path)?;
        if bytes[len - 2..] != [0, 0] {
            return Err(encoding_error(path, "missing wstring terminator"));
        }
        // The payload is UTF-16LE under both stream endiannesses.
        let units: Vec<u16> = bytes[..len - 2]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        char::decode_utf16(units)
            .collect::<Result<String, _>>()
            .map_err(|e| encoding_error(path, &e.to_string()))
    }
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

fn encoding_error(path: &str, detail: &str) -> SerializationError {
    SerializationError::EncodingError {
        field: path.to_string(),
        detail: detail.to_string(),
    }
}
