//! Binary tokens and binary object sequences (PLRM §3.14.1-3.14.2,
//! lead bytes 128-159).
//!
//! Grounded on `core/binary_token.py`. Self-contained like its model: it
//! never calls back into `text.rs`.

use super::{syntax_error, NameLookup, TokenOutcome};
use crate::bytestream::ByteSource;
use crate::error::{Error, ErrorKind};
use crate::names;
use crate::object::{Name, Object, Value, View, VmOrigin};
use crate::vm::{Backing, Vm};

const MAX_BOS_DEPTH: u32 = 100;

fn read_bytes(source: &mut dyn ByteSource, n: usize) -> Option<Vec<u8>> {
    let mut buf = Vec::with_capacity(n);
    for _ in 0..n {
        buf.push(source.read_byte()?);
    }
    Some(buf)
}

fn read_u16(source: &mut dyn ByteSource, big_endian: bool) -> Option<u16> {
    let b = read_bytes(source, 2)?;
    let arr: [u8; 2] = [b[0], b[1]];
    Some(if big_endian { u16::from_be_bytes(arr) } else { u16::from_le_bytes(arr) })
}

fn read_u32(source: &mut dyn ByteSource, big_endian: bool) -> Option<u32> {
    let b = read_bytes(source, 4)?;
    let arr: [u8; 4] = [b[0], b[1], b[2], b[3]];
    Some(if big_endian { u32::from_be_bytes(arr) } else { u32::from_le_bytes(arr) })
}

fn read_i32(source: &mut dyn ByteSource, big_endian: bool) -> Option<i32> {
    read_u32(source, big_endian).map(|v| v as i32)
}

fn read_i16(source: &mut dyn ByteSource, big_endian: bool) -> Option<i16> {
    read_u16(source, big_endian).map(|v| v as i16)
}

fn read_f32(source: &mut dyn ByteSource, big_endian: bool) -> Option<f32> {
    read_u32(source, big_endian).map(f32::from_bits)
}

fn push_int(v: i32) -> Value {
    Value::literal(Object::Int(v))
}

fn push_real(v: f64) -> Value {
    Value::literal(Object::Real(v))
}

fn alloc_string(vm: &mut Vm, origin: VmOrigin, bytes: Vec<u8>) -> Value {
    let len = bytes.len();
    let r = vm.alloc(origin, Backing::String(bytes));
    Value::literal(Object::String(r, View { offset: 0, length: len }))
}

pub(super) fn dispatch(
    token_type: u8,
    source: &mut dyn ByteSource,
    vm: &mut Vm,
    origin: VmOrigin,
    lookup: &mut dyn NameLookup,
) -> Result<TokenOutcome, Error> {
    match token_type {
        128..=131 => parse_binary_object_sequence(token_type, source, vm, origin, lookup),
        132 => parse_int(source, true, 4).map(TokenOutcome::Value),
        133 => parse_int(source, false, 4).map(TokenOutcome::Value),
        134 => parse_int(source, true, 2).map(TokenOutcome::Value),
        135 => parse_int(source, false, 2).map(TokenOutcome::Value),
        136 => parse_int8(source).map(TokenOutcome::Value),
        137 => parse_fixed_point(source).map(TokenOutcome::Value),
        138 => parse_real(source, true).map(TokenOutcome::Value),
        139 | 140 => parse_real(source, false).map(TokenOutcome::Value),
        141 => parse_bool(source).map(TokenOutcome::Value),
        142 => parse_string_short(source, vm, origin).map(TokenOutcome::Value),
        143 => parse_string_long(source, vm, origin, true).map(TokenOutcome::Value),
        144 => parse_string_long(source, vm, origin, false).map(TokenOutcome::Value),
        145 => parse_system_name(source, true),
        146 => parse_system_name(source, false),
        147 | 148 => Err(syntax_error(source, "--token--")),
        149 => parse_homogeneous_number_array(source, vm, origin).map(TokenOutcome::Value),
        _ => Err(syntax_error(source, "--token--")),
    }
}

fn parse_int(source: &mut dyn ByteSource, big_endian: bool, nbytes: usize) -> Result<Value, Error> {
    let v = if nbytes == 4 {
        read_i32(source, big_endian)
    } else {
        read_i16(source, big_endian).map(i32::from)
    };
    v.map(push_int).ok_or_else(|| syntax_error(source, "--token--"))
}

fn parse_int8(source: &mut dyn ByteSource) -> Result<Value, Error> {
    source
        .read_byte()
        .map(|b| push_int(b as i8 as i32))
        .ok_or_else(|| syntax_error(source, "--token--"))
}

fn parse_real(source: &mut dyn ByteSource, big_endian: bool) -> Result<Value, Error> {
    read_f32(source, big_endian).map(|f| push_real(f64::from(f))).ok_or_else(|| syntax_error(source, "--token--"))
}

fn parse_bool(source: &mut dyn ByteSource) -> Result<Value, Error> {
    source.read_byte().map(|b| Value::literal(Object::Bool(b != 0))).ok_or_else(|| syntax_error(source, "--token--"))
}

fn parse_string_short(source: &mut dyn ByteSource, vm: &mut Vm, origin: VmOrigin) -> Result<Value, Error> {
    let len = source.read_byte().ok_or_else(|| syntax_error(source, "--token--"))?;
    read_binary_string(source, vm, origin, len as usize)
}

fn parse_string_long(source: &mut dyn ByteSource, vm: &mut Vm, origin: VmOrigin, big_endian: bool) -> Result<Value, Error> {
    let len = read_u16(source, big_endian).ok_or_else(|| syntax_error(source, "--token--"))?;
    read_binary_string(source, vm, origin, len as usize)
}

fn read_binary_string(source: &mut dyn ByteSource, vm: &mut Vm, origin: VmOrigin, len: usize) -> Result<Value, Error> {
    let bytes = read_bytes(source, len).ok_or_else(|| syntax_error(source, "--token--"))?;
    Ok(alloc_string(vm, origin, bytes))
}

fn parse_system_name(source: &mut dyn ByteSource, literal: bool) -> Result<TokenOutcome, Error> {
    let index = source.read_byte().ok_or_else(|| syntax_error(source, "--token--"))?;
    match names::lookup(index as usize) {
        Some(bytes) if !bytes.is_empty() => {
            let name = Name::new(bytes);
            let value = if literal { Value::literal(Object::Name(name)) } else { Value::executable(Object::Name(name)) };
            Ok(TokenOutcome::Value(value))
        }
        _ => Err(Error::new(ErrorKind::Undefined, "--token--")),
    }
}

fn fixed_point_params(r: u8) -> Option<(bool, usize, u32)> {
    match r {
        0..=31 => Some((true, 4, u32::from(r))),
        32..=47 => Some((true, 2, u32::from(r - 32))),
        128..=159 => Some((false, 4, u32::from(r - 128))),
        160..=175 => Some((false, 2, u32::from(r - 160))),
        _ => None,
    }
}

fn parse_fixed_point(source: &mut dyn ByteSource) -> Result<Value, Error> {
    let r = source.read_byte().ok_or_else(|| syntax_error(source, "--token--"))?;
    let (big_endian, nbytes, scale) = fixed_point_params(r).ok_or_else(|| syntax_error(source, "--token--"))?;
    let raw = if nbytes == 4 {
        read_i32(source, big_endian)
    } else {
        read_i16(source, big_endian).map(i32::from)
    }
    .ok_or_else(|| syntax_error(source, "--token--"))?;
    Ok(fixed_to_value(raw, scale))
}

fn fixed_to_value(raw: i32, scale: u32) -> Value {
    if scale == 0 {
        push_int(raw)
    } else {
        push_real(f64::from(raw) / (1u64 << scale) as f64)
    }
}

enum ArrayElemFmt {
    Fixed { big_endian: bool, nbytes: usize, scale: u32 },
    Real32 { big_endian: bool },
}

fn number_array_params(r: u8) -> Option<(ArrayElemFmt, bool)> {
    match r {
        0..=31 => Some((ArrayElemFmt::Fixed { big_endian: true, nbytes: 4, scale: u32::from(r) }, true)),
        32..=47 => Some((ArrayElemFmt::Fixed { big_endian: true, nbytes: 2, scale: u32::from(r - 32) }, true)),
        48 | 49 => Some((ArrayElemFmt::Real32 { big_endian: r == 48 }, true)),
        128..=159 => Some((ArrayElemFmt::Fixed { big_endian: false, nbytes: 4, scale: u32::from(r - 128) }, false)),
        160..=175 => Some((ArrayElemFmt::Fixed { big_endian: false, nbytes: 2, scale: u32::from(r - 160) }, false)),
        176 | 177 => Some((ArrayElemFmt::Real32 { big_endian: false }, false)),
        _ => None,
    }
}

fn parse_homogeneous_number_array(source: &mut dyn ByteSource, vm: &mut Vm, origin: VmOrigin) -> Result<Value, Error> {
    let r = source.read_byte().ok_or_else(|| syntax_error(source, "--token--"))?;
    let (elem_fmt, count_big_endian) = number_array_params(r).ok_or_else(|| syntax_error(source, "--token--"))?;
    let count = read_u16(source, count_big_endian).ok_or_else(|| syntax_error(source, "--token--"))?;

    let mut elements = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let value = match elem_fmt {
            ArrayElemFmt::Fixed { big_endian, nbytes, scale } => {
                let raw = if nbytes == 4 {
                    read_i32(source, big_endian)
                } else {
                    read_i16(source, big_endian).map(i32::from)
                }
                .ok_or_else(|| syntax_error(source, "--token--"))?;
                fixed_to_value(raw, scale)
            }
            ArrayElemFmt::Real32 { big_endian } => {
                let f = read_f32(source, big_endian).ok_or_else(|| syntax_error(source, "--token--"))?;
                push_real(f64::from(f))
            }
        };
        elements.push(value);
    }

    let len = elements.len();
    let r = vm.alloc(origin, Backing::Array(elements));
    Ok(Value::literal(Object::Array(r, View { offset: 0, length: len })))
}

struct Entry {
    type_byte: u8,
    length: u16,
    value: u32,
}

fn read_entry(data: &[u8], pos: usize, big_endian: bool) -> Option<Entry> {
    if pos + 8 > data.len() {
        return None;
    }
    let length = if big_endian {
        u16::from_be_bytes([data[pos + 2], data[pos + 3]])
    } else {
        u16::from_le_bytes([data[pos + 2], data[pos + 3]])
    };
    let value_bytes = [data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]];
    let value = if big_endian { u32::from_be_bytes(value_bytes) } else { u32::from_le_bytes(value_bytes) };
    Some(Entry { type_byte: data[pos], length, value })
}

#[allow(clippy::too_many_arguments)]
fn build_bos_object(
    data: &[u8],
    pos: usize,
    depth: u32,
    big_endian: bool,
    vm: &mut Vm,
    origin: VmOrigin,
    lookup: &mut dyn NameLookup,
    building: &mut std::collections::HashSet<usize>,
) -> Result<Value, BosError> {
    if depth > MAX_BOS_DEPTH {
        return Err(BosError::Malformed);
    }
    let entry = read_entry(data, pos, big_endian).ok_or(BosError::Malformed)?;
    let type_code = entry.type_byte & 0x7F;
    let is_exec = entry.type_byte & 0x80 != 0;

    match type_code {
        0 => Ok(Value::literal(Object::Null)),
        1 => {
            let bytes = [data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]];
            let raw = if big_endian { i32::from_be_bytes(bytes) } else { i32::from_le_bytes(bytes) };
            Ok(Value::literal(Object::Int(raw)))
        }
        2 => {
            let bytes = [data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]];
            let value = if entry.length == 0 {
                let bits = if big_endian { u32::from_be_bytes(bytes) } else { u32::from_le_bytes(bytes) };
                f64::from(f32::from_bits(bits))
            } else {
                let raw = if big_endian { i32::from_be_bytes(bytes) } else { i32::from_le_bytes(bytes) };
                f64::from(raw) / 2f64.powi(i32::from(entry.length))
            };
            let mut v = Value::literal(Object::Real(value));
            if is_exec {
                v.attr = crate::object::Attribute::Executable;
            }
            Ok(v)
        }
        3 | 6 => {
            let signed_len = if big_endian {
                i16::from_be_bytes([data[pos + 2], data[pos + 3]])
            } else {
                i16::from_le_bytes([data[pos + 2], data[pos + 3]])
            };
            let name_bytes: Vec<u8> = if signed_len == -1 {
                match names::lookup(entry.value as usize) {
                    Some(b) if !b.is_empty() => b.to_vec(),
                    _ => return Err(BosError::Malformed),
                }
            } else if signed_len > 0 {
                let offset = entry.value as usize;
                let n = signed_len as usize;
                data.get(offset..offset + n).ok_or(BosError::Malformed)?.to_vec()
            } else {
                return Err(BosError::Malformed);
            };
            if type_code == 6 {
                let name = Name::new(&name_bytes);
                return lookup.lookup(vm, &name).map(|v| v.object).map(Value::literal).ok_or(BosError::Undefined(name_bytes));
            }
            let name = Name::new(&name_bytes);
            Ok(if is_exec { Value::executable(Object::Name(name)) } else { Value::literal(Object::Name(name)) })
        }
        4 => Ok(Value::literal(Object::Bool(entry.value != 0))),
        5 => {
            let bytes = if entry.length == 0 {
                Vec::new()
            } else {
                let offset = entry.value as usize;
                let n = entry.length as usize;
                data.get(offset..offset + n).ok_or(BosError::Malformed)?.to_vec()
            };
            let mut v = alloc_string(vm, origin, bytes);
            if is_exec {
                v.attr = crate::object::Attribute::Executable;
            }
            Ok(v)
        }
        9 => {
            if entry.length == 0 {
                let r = vm.alloc(origin, Backing::Array(Vec::new()));
                let mut v = Value::literal(Object::Array(r, View { offset: 0, length: 0 }));
                if is_exec {
                    v.attr = crate::object::Attribute::Executable;
                }
                return Ok(v);
            }
            let offset = entry.value as usize;
            if offset % 8 != 0 {
                return Err(BosError::Malformed);
            }
            if !building.insert(pos) {
                return Err(BosError::Malformed);
            }
            let mut elements = Vec::with_capacity(entry.length as usize);
            for i in 0..entry.length as usize {
                match build_bos_object(data, offset + i * 8, depth + 1, big_endian, vm, origin, lookup, building) {
                    Ok(v) => elements.push(v),
                    Err(e) => {
                        building.remove(&pos);
                        return Err(e);
                    }
                }
            }
            building.remove(&pos);
            let len = elements.len();
            let r = vm.alloc(origin, Backing::Array(elements));
            let mut v = Value::literal(Object::Array(r, View { offset: 0, length: len }));
            if is_exec {
                v.attr = crate::object::Attribute::Executable;
            }
            Ok(v)
        }
        10 => Ok(Value::literal(Object::Mark)),
        _ => Err(BosError::Malformed),
    }
}

enum BosError {
    Malformed,
    Undefined(Vec<u8>),
}

fn parse_binary_object_sequence(
    token_type: u8,
    source: &mut dyn ByteSource,
    vm: &mut Vm,
    origin: VmOrigin,
    lookup: &mut dyn NameLookup,
) -> Result<TokenOutcome, Error> {
    let big_endian = matches!(token_type, 128 | 130);

    let byte1 = source.read_byte().ok_or_else(|| syntax_error(source, "--token--"))?;
    let top_level_count = read_u16(source, big_endian).ok_or_else(|| syntax_error(source, "--token--"))?;

    let (overall_length, header_size) = if byte1 > 0 {
        (u32::from(byte1), 4usize)
    } else {
        let len = read_u32(source, big_endian).ok_or_else(|| syntax_error(source, "--token--"))?;
        (len, 8usize)
    };

    let data_size = overall_length as i64 - header_size as i64;
    if data_size < 0 || (data_size as u64) < u64::from(top_level_count) * 8 {
        return Err(syntax_error(source, "--token--"));
    }
    let data = read_bytes(source, data_size as usize).ok_or_else(|| syntax_error(source, "--token--"))?;

    let mut building = std::collections::HashSet::new();
    let mut results = Vec::with_capacity(top_level_count as usize);
    for i in 0..top_level_count as usize {
        match build_bos_object(&data, i * 8, 0, big_endian, vm, origin, lookup, &mut building) {
            Ok(v) => results.push(v),
            Err(BosError::Malformed) => return Err(syntax_error(source, "--token--")),
            Err(BosError::Undefined(_)) => return Err(Error::new(ErrorKind::Undefined, "--token--")),
        }
    }

    let r = vm.alloc(origin, Backing::Array(results));
    let len = vm.get(r).and_then(crate::vm::Backing::as_array).map_or(0, Vec::len);
    let value = Value::executable(Object::Array(r, View { offset: 0, length: len }));
    Ok(TokenOutcome::Value(value))
}
