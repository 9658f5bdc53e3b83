//! ABI encoding and decoding
//!
//! Canonical head/tail scheme: static values are encoded in place as 32-byte
//! aligned words; dynamic values contribute an offset word to the head and a
//! length-prefixed payload to the tail, offsets relative to the start of the
//! enclosing argument block. Decoding is the exact inverse and rejects
//! payloads shorter than the declared type list requires.
//!
//! Integers are carried as [`U256`]/[`I256`] end to end; token amounts and
//! gas values routinely exceed 64 bits and must never be truncated.

use crate::abi::param::ParamType;
use crate::abi::parser::AbiFunction;
use crate::error::{AbiError, Result};
use alloy::primitives::{Address, I256, U256};

const WORD: usize = 32;

/// A typed runtime value crossing the ABI boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Address(Address),
    Bool(bool),
    Uint(U256),
    Int(I256),
    /// Fixed-size byte array, 1..=32 bytes
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
}

impl Value {
    fn kind_name(&self) -> &'static str {
        match self {
            Value::Address(_) => "address",
            Value::Bool(_) => "bool",
            Value::Uint(_) => "uint",
            Value::Int(_) => "int",
            Value::FixedBytes(_) => "fixed bytes",
            Value::Bytes(_) => "bytes",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Tuple(_) => "tuple",
        }
    }

    /// Unwrap helpers for callers that know the declared return shape
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            Value::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Value::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Encode a function call: 4-byte selector followed by the argument block
pub fn encode_function_call(function: &AbiFunction, args: &[Value]) -> Result<Vec<u8>> {
    if args.len() != function.inputs.len() {
        return Err(AbiError::Mismatch(format!(
            "{} takes {} argument(s), got {}",
            function.signature(),
            function.inputs.len(),
            args.len()
        ))
        .into());
    }
    let types: Vec<ParamType> = function.inputs.iter().map(|p| p.kind.clone()).collect();
    let mut out = function.selector().to_vec();
    out.extend(encode_values(&types, args)?);
    Ok(out)
}

/// Decode return data against a function's declared outputs
pub fn decode_return(function: &AbiFunction, data: &[u8]) -> Result<Vec<Value>> {
    let types: Vec<ParamType> = function.outputs.iter().map(|p| p.kind.clone()).collect();
    decode_values(&types, data)
}

/// Encode an ordered value sequence as one argument block
pub fn encode_values(types: &[ParamType], values: &[Value]) -> Result<Vec<u8>> {
    if types.len() != values.len() {
        return Err(AbiError::Mismatch(format!(
            "expected {} value(s), got {}",
            types.len(),
            values.len()
        ))
        .into());
    }
    for (ty, value) in types.iter().zip(values) {
        check_value(ty, value)?;
    }

    let head_len: usize = types.iter().map(|t| t.head_len()).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for (ty, value) in types.iter().zip(values) {
        if ty.is_dynamic() {
            head.extend(uint_word(U256::from(head_len + tail.len())));
            tail.extend(encode_tail(ty, value)?);
        } else {
            encode_static(ty, value, &mut head)?;
        }
    }

    head.extend(tail);
    Ok(head)
}

/// Decode an argument block against an ordered type list
pub fn decode_values(types: &[ParamType], data: &[u8]) -> Result<Vec<Value>> {
    let mut offset = 0usize;
    let mut out = Vec::with_capacity(types.len());
    for ty in types {
        if ty.is_dynamic() {
            let start = read_offset(data, offset)?;
            out.push(decode_tail(ty, data, start)?);
            offset += WORD;
        } else {
            out.push(decode_static(ty, data, &mut offset)?);
        }
    }
    Ok(out)
}

/// Decode the standard `Error(string)` revert payload (selector 0x08c379a0).
///
/// Custom-error selectors are not recoverable without their ABI; callers keep
/// the raw hex in that case.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != [0x08, 0xc3, 0x79, 0xa0] {
        return None;
    }
    let decoded = decode_values(&[ParamType::String], &data[4..]).ok()?;
    match decoded.into_iter().next() {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Verify a value matches the declared type shape, including integer width
fn check_value(ty: &ParamType, value: &Value) -> Result<()> {
    let mismatch = |expected: &ParamType, got: &Value| -> crate::error::Error {
        AbiError::Mismatch(format!(
            "expected {}, got {}",
            expected.canonical(),
            got.kind_name()
        ))
        .into()
    };

    match (ty, value) {
        (ParamType::Address, Value::Address(_)) => Ok(()),
        (ParamType::Bool, Value::Bool(_)) => Ok(()),
        (ParamType::Uint(bits), Value::Uint(v)) => {
            if *bits < 256 && v.bit_len() > *bits {
                return Err(AbiError::Mismatch(format!(
                    "{v} does not fit in uint{bits}"
                ))
                .into());
            }
            Ok(())
        }
        (ParamType::Int(bits), Value::Int(v)) => {
            if *bits < 256 && !int_fits(*v, *bits) {
                return Err(
                    AbiError::Mismatch(format!("{v} does not fit in int{bits}")).into()
                );
            }
            Ok(())
        }
        (ParamType::FixedBytes(n), Value::FixedBytes(b)) => {
            if b.len() != *n {
                return Err(AbiError::Mismatch(format!(
                    "expected bytes{n}, got {} byte(s)",
                    b.len()
                ))
                .into());
            }
            Ok(())
        }
        (ParamType::Bytes, Value::Bytes(_)) => Ok(()),
        (ParamType::String, Value::String(_)) => Ok(()),
        (ParamType::Array(inner), Value::Array(items)) => {
            for item in items {
                check_value(inner, item)?;
            }
            Ok(())
        }
        (ParamType::FixedArray(inner, len), Value::Array(items)) => {
            if items.len() != *len {
                return Err(AbiError::Mismatch(format!(
                    "expected {} element(s) for {}, got {}",
                    len,
                    ty.canonical(),
                    items.len()
                ))
                .into());
            }
            for item in items {
                check_value(inner, item)?;
            }
            Ok(())
        }
        (ParamType::Tuple(components), Value::Tuple(fields)) => {
            if components.len() != fields.len() {
                return Err(AbiError::Mismatch(format!(
                    "expected {} field(s) for {}, got {}",
                    components.len(),
                    ty.canonical(),
                    fields.len()
                ))
                .into());
            }
            for (c, f) in components.iter().zip(fields) {
                check_value(c, f)?;
            }
            Ok(())
        }
        (expected, got) => Err(mismatch(expected, got)),
    }
}

/// Two's-complement fit check: all bits above bit (bits-1) must equal the sign
fn int_fits(v: I256, bits: usize) -> bool {
    let bytes = v.to_be_bytes::<32>();
    let sign: u8 = if v.is_negative() { 0xff } else { 0x00 };
    let prefix = WORD - bits / 8;
    if bytes[..prefix].iter().any(|b| *b != sign) {
        return false;
    }
    (bytes[prefix] & 0x80 == 0x80) == (sign == 0xff)
}

fn uint_word(v: U256) -> [u8; WORD] {
    v.to_be_bytes::<WORD>()
}

fn encode_static(ty: &ParamType, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match (ty, value) {
        (ParamType::Address, Value::Address(a)) => {
            out.extend([0u8; 12]);
            out.extend(a.as_slice());
        }
        (ParamType::Bool, Value::Bool(b)) => {
            out.extend([0u8; 31]);
            out.push(*b as u8);
        }
        (ParamType::Uint(_), Value::Uint(v)) => out.extend(uint_word(*v)),
        (ParamType::Int(_), Value::Int(v)) => out.extend(v.to_be_bytes::<WORD>()),
        (ParamType::FixedBytes(_), Value::FixedBytes(b)) => {
            out.extend(b);
            out.extend(std::iter::repeat(0u8).take(WORD - b.len()));
        }
        (ParamType::FixedArray(inner, _), Value::Array(items)) => {
            for item in items {
                encode_static(inner, item, out)?;
            }
        }
        (ParamType::Tuple(components), Value::Tuple(fields)) => {
            for (c, f) in components.iter().zip(fields) {
                encode_static(c, f, out)?;
            }
        }
        // unreachable after check_value, but do not panic in library code
        _ => {
            return Err(AbiError::Mismatch(format!(
                "cannot encode {} as {}",
                value.kind_name(),
                ty.canonical()
            ))
            .into())
        }
    }
    Ok(())
}

fn encode_tail(ty: &ParamType, value: &Value) -> Result<Vec<u8>> {
    match (ty, value) {
        (ParamType::Bytes, Value::Bytes(b)) => Ok(length_prefixed(b)),
        (ParamType::String, Value::String(s)) => Ok(length_prefixed(s.as_bytes())),
        (ParamType::Array(inner), Value::Array(items)) => {
            let types: Vec<ParamType> = std::iter::repeat(inner.as_ref().clone())
                .take(items.len())
                .collect();
            let mut out = uint_word(U256::from(items.len())).to_vec();
            out.extend(encode_values(&types, items)?);
            Ok(out)
        }
        (ParamType::FixedArray(inner, len), Value::Array(items)) => {
            let types: Vec<ParamType> = std::iter::repeat(inner.as_ref().clone())
                .take(*len)
                .collect();
            encode_values(&types, items)
        }
        (ParamType::Tuple(components), Value::Tuple(fields)) => {
            encode_values(components, fields)
        }
        _ => Err(AbiError::Mismatch(format!(
            "cannot encode {} as {}",
            value.kind_name(),
            ty.canonical()
        ))
        .into()),
    }
}

fn length_prefixed(payload: &[u8]) -> Vec<u8> {
    let mut out = uint_word(U256::from(payload.len())).to_vec();
    out.extend(payload);
    let rem = payload.len() % WORD;
    if rem != 0 {
        out.extend(std::iter::repeat(0u8).take(WORD - rem));
    }
    out
}

fn read_word(data: &[u8], offset: usize) -> Result<[u8; WORD]> {
    let end = offset.checked_add(WORD).ok_or(AbiError::Truncated {
        needed: usize::MAX,
        have: data.len(),
    })?;
    let slice = data.get(offset..end).ok_or(AbiError::Truncated {
        needed: end,
        have: data.len(),
    })?;
    let mut word = [0u8; WORD];
    word.copy_from_slice(slice);
    Ok(word)
}

/// Read an offset word; an offset pointing past the payload is a truncation
fn read_offset(data: &[u8], at: usize) -> Result<usize> {
    let value = U256::from_be_bytes(read_word(data, at)?);
    let offset: usize = value.try_into().map_err(|_| AbiError::Truncated {
        needed: usize::MAX,
        have: data.len(),
    })?;
    if offset > data.len() {
        return Err(AbiError::Truncated {
            needed: offset,
            have: data.len(),
        }
        .into());
    }
    Ok(offset)
}

fn read_length(data: &[u8], at: usize) -> Result<usize> {
    let value = U256::from_be_bytes(read_word(data, at)?);
    value.try_into().map_err(|_| {
        AbiError::Truncated {
            needed: usize::MAX,
            have: data.len(),
        }
        .into()
    })
}

fn decode_static(ty: &ParamType, data: &[u8], offset: &mut usize) -> Result<Value> {
    match ty {
        ParamType::Address => {
            let word = read_word(data, *offset)?;
            *offset += WORD;
            Ok(Value::Address(Address::from_slice(&word[12..])))
        }
        ParamType::Bool => {
            let word = read_word(data, *offset)?;
            *offset += WORD;
            Ok(Value::Bool(word[WORD - 1] != 0))
        }
        ParamType::Uint(_) => {
            let word = read_word(data, *offset)?;
            *offset += WORD;
            Ok(Value::Uint(U256::from_be_bytes(word)))
        }
        ParamType::Int(_) => {
            let word = read_word(data, *offset)?;
            *offset += WORD;
            Ok(Value::Int(I256::from_raw(U256::from_be_bytes(word))))
        }
        ParamType::FixedBytes(n) => {
            let word = read_word(data, *offset)?;
            *offset += WORD;
            Ok(Value::FixedBytes(word[..*n].to_vec()))
        }
        ParamType::FixedArray(inner, len) => {
            let mut items = Vec::with_capacity(*len);
            for _ in 0..*len {
                items.push(decode_static(inner, data, offset)?);
            }
            Ok(Value::Array(items))
        }
        ParamType::Tuple(components) => {
            let mut fields = Vec::with_capacity(components.len());
            for c in components {
                fields.push(decode_static(c, data, offset)?);
            }
            Ok(Value::Tuple(fields))
        }
        ParamType::Bytes | ParamType::String | ParamType::Array(_) => Err(AbiError::Mismatch(
            format!("{} is not a static type", ty.canonical()),
        )
        .into()),
    }
}

fn decode_tail(ty: &ParamType, data: &[u8], start: usize) -> Result<Value> {
    match ty {
        ParamType::Bytes | ParamType::String => {
            let len = read_length(data, start)?;
            let payload_start = start + WORD;
            let end = payload_start.checked_add(len).ok_or(AbiError::Truncated {
                needed: usize::MAX,
                have: data.len(),
            })?;
            let payload = data.get(payload_start..end).ok_or(AbiError::Truncated {
                needed: end,
                have: data.len(),
            })?;
            if matches!(ty, ParamType::String) {
                let s = std::str::from_utf8(payload)
                    .map_err(|_| AbiError::Mismatch("invalid utf-8 in string".to_string()))?;
                Ok(Value::String(s.to_string()))
            } else {
                Ok(Value::Bytes(payload.to_vec()))
            }
        }
        ParamType::Array(inner) => {
            let len = read_length(data, start)?;
            // element offsets are relative to the start of the element block
            let region = data.get(start + WORD..).ok_or(AbiError::Truncated {
                needed: start + WORD,
                have: data.len(),
            })?;
            // every element needs at least one head word; a length claiming
            // more is a truncated (or hostile) payload, not an allocation
            if len > region.len() / WORD {
                return Err(AbiError::Truncated {
                    needed: len.saturating_mul(WORD),
                    have: region.len(),
                }
                .into());
            }
            let types: Vec<ParamType> = std::iter::repeat(inner.as_ref().clone())
                .take(len)
                .collect();
            Ok(Value::Array(decode_values(&types, region)?))
        }
        ParamType::FixedArray(inner, len) => {
            let region = data.get(start..).ok_or(AbiError::Truncated {
                needed: start,
                have: data.len(),
            })?;
            let types: Vec<ParamType> = std::iter::repeat(inner.as_ref().clone())
                .take(*len)
                .collect();
            Ok(Value::Array(decode_values(&types, region)?))
        }
        ParamType::Tuple(components) => {
            let region = data.get(start..).ok_or(AbiError::Truncated {
                needed: start,
                have: data.len(),
            })?;
            Ok(Value::Tuple(decode_values(components, region)?))
        }
        _ => Err(AbiError::Mismatch(format!(
            "{} is not a dynamic type",
            ty.canonical()
        ))
        .into()),
    }
}
