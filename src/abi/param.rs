//! Solidity type grammar
//!
//! Parses canonical type strings ("uint256", "address[]", "(bytes32,uint8)[4]")
//! into a typed representation used by the encoder and decoder.

use crate::error::{AbiError, Result};

/// A Solidity parameter type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// 20-byte address
    Address,
    /// Boolean
    Bool,
    /// Unsigned integer of the given bit width (8..=256, multiple of 8)
    Uint(usize),
    /// Signed integer of the given bit width (8..=256, multiple of 8)
    Int(usize),
    /// Fixed-size byte array, 1..=32 bytes
    FixedBytes(usize),
    /// Dynamic byte array
    Bytes,
    /// UTF-8 string
    String,
    /// Dynamic-length array
    Array(Box<ParamType>),
    /// Fixed-length array
    FixedArray(Box<ParamType>, usize),
    /// Tuple of component types
    Tuple(Vec<ParamType>),
}

impl ParamType {
    /// Parse a canonical Solidity type string.
    ///
    /// Accepts the aliases `uint` and `int` for the 256-bit widths, matching
    /// what human-readable ABIs commonly contain.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AbiError::ParseError("empty type".to_string()).into());
        }

        // Array suffixes bind last: peel them off from the right.
        if let Some(open) = s.rfind('[') {
            if s.ends_with(']') && open > 0 {
                let inner = Self::parse(&s[..open])?;
                let len_str = &s[open + 1..s.len() - 1];
                return if len_str.is_empty() {
                    Ok(ParamType::Array(Box::new(inner)))
                } else {
                    let len: usize = len_str.parse().map_err(|_| {
                        AbiError::ParseError(format!("bad array length in '{s}'"))
                    })?;
                    Ok(ParamType::FixedArray(Box::new(inner), len))
                };
            }
        }

        if s.starts_with('(') && s.ends_with(')') {
            let components = split_components(&s[1..s.len() - 1])?;
            let mut parsed = Vec::with_capacity(components.len());
            for c in components {
                parsed.push(Self::parse(c)?);
            }
            return Ok(ParamType::Tuple(parsed));
        }

        match s {
            "address" => return Ok(ParamType::Address),
            "bool" => return Ok(ParamType::Bool),
            "bytes" => return Ok(ParamType::Bytes),
            "string" => return Ok(ParamType::String),
            "uint" => return Ok(ParamType::Uint(256)),
            "int" => return Ok(ParamType::Int(256)),
            _ => {}
        }

        if let Some(width) = s.strip_prefix("uint") {
            let bits = parse_int_width(width, s)?;
            return Ok(ParamType::Uint(bits));
        }
        if let Some(width) = s.strip_prefix("int") {
            let bits = parse_int_width(width, s)?;
            return Ok(ParamType::Int(bits));
        }
        if let Some(size) = s.strip_prefix("bytes") {
            let n: usize = size
                .parse()
                .map_err(|_| AbiError::ParseError(format!("unknown type '{s}'")))?;
            if n == 0 || n > 32 {
                return Err(AbiError::ParseError(format!("bad bytes size '{s}'")).into());
            }
            return Ok(ParamType::FixedBytes(n));
        }

        Err(AbiError::ParseError(format!("unknown type '{s}'")).into())
    }

    /// Canonical form used for signature hashing ("uint256", not "uint")
    pub fn canonical(&self) -> String {
        match self {
            ParamType::Address => "address".to_string(),
            ParamType::Bool => "bool".to_string(),
            ParamType::Uint(bits) => format!("uint{bits}"),
            ParamType::Int(bits) => format!("int{bits}"),
            ParamType::FixedBytes(n) => format!("bytes{n}"),
            ParamType::Bytes => "bytes".to_string(),
            ParamType::String => "string".to_string(),
            ParamType::Array(inner) => format!("{}[]", inner.canonical()),
            ParamType::FixedArray(inner, len) => format!("{}[{len}]", inner.canonical()),
            ParamType::Tuple(components) => {
                let inner: Vec<String> = components.iter().map(|c| c.canonical()).collect();
                format!("({})", inner.join(","))
            }
        }
    }

    /// Whether the encoded form lives in the tail with an offset in the head
    pub fn is_dynamic(&self) -> bool {
        match self {
            ParamType::Bytes | ParamType::String | ParamType::Array(_) => true,
            ParamType::FixedArray(inner, _) => inner.is_dynamic(),
            ParamType::Tuple(components) => components.iter().any(|c| c.is_dynamic()),
            _ => false,
        }
    }

    /// Encoded width of this type's head slot, in bytes.
    ///
    /// Dynamic types occupy one offset word; static composites occupy the sum
    /// of their components.
    pub fn head_len(&self) -> usize {
        if self.is_dynamic() {
            return 32;
        }
        match self {
            ParamType::FixedArray(inner, len) => inner.head_len() * len,
            ParamType::Tuple(components) => components.iter().map(|c| c.head_len()).sum(),
            _ => 32,
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

fn parse_int_width(width: &str, full: &str) -> Result<usize> {
    let bits: usize = width
        .parse()
        .map_err(|_| AbiError::ParseError(format!("unknown type '{full}'")))?;
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(AbiError::ParseError(format!("bad integer width '{full}'")).into());
    }
    Ok(bits)
}

/// Split a comma-separated component list, respecting nested parentheses.
pub(crate) fn split_components(s: &str) -> Result<Vec<&str>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Vec::new());
    }

    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| AbiError::ParseError(format!("unbalanced parens in '{s}'")))?;
            }
            ',' if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(AbiError::ParseError(format!("unbalanced parens in '{s}'")).into());
    }
    parts.push(s[start..].trim());
    Ok(parts)
}
