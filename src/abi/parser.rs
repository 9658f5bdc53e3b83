//! ABI descriptor parsing
//!
//! Accepts contract ABIs in two equivalent forms and normalizes both into
//! [`AbiFunction`]/[`AbiEvent`] descriptors parsed once at bind time:
//!
//! - human-readable fragments:
//!   `"function balanceOf(address account) view returns (uint256)"`,
//!   `"event Transfer(address indexed from, address indexed to, uint256 value)"`
//! - JSON ABI fragments as emitted by solc / block explorers
//!
//! All later encoding and decoding operates on the typed descriptors, never
//! on raw strings.

use crate::abi::param::{split_components, ParamType};
use crate::error::{AbiError, Result};
use alloy::primitives::{keccak256, B256};
use serde::Deserialize;

/// Function state mutability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mutability {
    Pure,
    View,
    #[default]
    NonPayable,
    Payable,
}

impl Mutability {
    /// Pure and view functions never mutate chain state
    pub fn is_read_only(&self) -> bool {
        matches!(self, Mutability::Pure | Mutability::View)
    }
}

/// A named function parameter or return value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamType,
}

/// A named event parameter with its indexing flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventParam {
    pub name: String,
    pub kind: ParamType,
    pub indexed: bool,
}

/// A callable contract function, parsed once from an ABI fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiFunction {
    pub name: String,
    pub inputs: Vec<Param>,
    pub outputs: Vec<Param>,
    pub mutability: Mutability,
}

impl AbiFunction {
    /// Parse a human-readable fragment, with or without the `function` prefix
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("function ").unwrap_or(s).trim();

        let (name, args, rest) = split_prototype(s)?;
        let inputs = parse_params(args)?;

        let mut mutability = Mutability::NonPayable;
        let mut outputs = Vec::new();

        let rest = rest.trim();
        let (modifiers, returns) = match rest.find("returns") {
            Some(pos) => (&rest[..pos], Some(rest[pos + "returns".len()..].trim())),
            None => (rest, None),
        };

        for word in modifiers.split_whitespace() {
            match word {
                "pure" => mutability = Mutability::Pure,
                "view" => mutability = Mutability::View,
                "payable" => mutability = Mutability::Payable,
                "nonpayable" => mutability = Mutability::NonPayable,
                // visibility keywords carry no ABI meaning
                "external" | "public" => {}
                other => {
                    return Err(AbiError::ParseError(format!(
                        "unexpected token '{other}' in '{s}'"
                    ))
                    .into())
                }
            }
        }

        if let Some(ret) = returns {
            let ret = ret
                .strip_prefix('(')
                .and_then(|r| r.strip_suffix(')'))
                .ok_or_else(|| {
                    AbiError::ParseError(format!("malformed returns clause in '{s}'"))
                })?;
            outputs = parse_params(ret)?;
        }

        Ok(Self {
            name: name.to_string(),
            inputs,
            outputs,
            mutability,
        })
    }

    /// Canonical signature string, e.g. `balanceOf(address)`
    pub fn signature(&self) -> String {
        let types: Vec<String> = self.inputs.iter().map(|p| p.kind.canonical()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    /// First 4 bytes of the keccak256 hash of the canonical signature
    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }
}

/// An event descriptor, used to compute topic0 and decode matching logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiEvent {
    pub name: String,
    pub inputs: Vec<EventParam>,
}

impl AbiEvent {
    /// Parse a human-readable fragment.
    ///
    /// Accepts the full form with an `event` prefix and `indexed` markers, or
    /// a bare signature like `Transfer(address,address,uint256)`. The bare
    /// form carries no indexing information and is only suitable for
    /// computing topic0 filters, not for decoding.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("event ").unwrap_or(s).trim();

        let (name, args, rest) = split_prototype(s)?;
        if !rest.trim().is_empty() && rest.trim() != "anonymous" {
            return Err(
                AbiError::ParseError(format!("unexpected trailer '{}' in '{s}'", rest.trim()))
                    .into(),
            );
        }

        let mut inputs = Vec::new();
        for component in split_components(args)? {
            if component.is_empty() {
                continue;
            }
            let mut tokens: Vec<&str> = component.split_whitespace().collect();
            let indexed = tokens.contains(&"indexed");
            tokens.retain(|t| *t != "indexed");
            let (ty, name) = match tokens.as_slice() {
                [ty] => (*ty, String::new()),
                [ty, name] => (*ty, name.to_string()),
                _ => {
                    return Err(AbiError::ParseError(format!(
                        "malformed event parameter '{component}'"
                    ))
                    .into())
                }
            };
            inputs.push(EventParam {
                name,
                kind: ParamType::parse(ty)?,
                indexed,
            });
        }

        Ok(Self {
            name: name.to_string(),
            inputs,
        })
    }

    /// Canonical signature string, e.g. `Transfer(address,address,uint256)`
    pub fn signature(&self) -> String {
        let types: Vec<String> = self.inputs.iter().map(|p| p.kind.canonical()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    /// Full keccak256 hash of the canonical signature (the topic0 value)
    pub fn topic0(&self) -> B256 {
        keccak256(self.signature().as_bytes())
    }

    /// Number of indexed parameters (= expected topics beyond topic0)
    pub fn indexed_count(&self) -> usize {
        self.inputs.iter().filter(|p| p.indexed).count()
    }
}

/// A parsed contract ABI: ordered functions and events
#[derive(Debug, Clone, Default)]
pub struct Abi {
    pub functions: Vec<AbiFunction>,
    pub events: Vec<AbiEvent>,
}

impl Abi {
    /// Parse a list of human-readable fragments
    pub fn parse(fragments: &[&str]) -> Result<Self> {
        let mut abi = Abi::default();
        for fragment in fragments {
            let trimmed = fragment.trim();
            if trimmed.starts_with("event ") {
                abi.events.push(AbiEvent::parse(trimmed)?);
            } else {
                abi.functions.push(AbiFunction::parse(trimmed)?);
            }
        }
        Ok(abi)
    }

    /// Parse a JSON ABI document (an array of fragment objects)
    pub fn parse_json(json: &str) -> Result<Self> {
        let entries: Vec<JsonAbiEntry> = serde_json::from_str(json)
            .map_err(|e| AbiError::ParseError(format!("invalid ABI JSON: {e}")))?;

        let mut abi = Abi::default();
        for entry in entries {
            match entry.kind.as_str() {
                "function" => {
                    let name = entry.name.ok_or_else(|| {
                        AbiError::ParseError("function fragment missing name".to_string())
                    })?;
                    abi.functions.push(AbiFunction {
                        name,
                        inputs: json_params(&entry.inputs)?,
                        outputs: json_params(&entry.outputs)?,
                        mutability: match entry.state_mutability.as_deref() {
                            Some("pure") => Mutability::Pure,
                            Some("view") => Mutability::View,
                            Some("payable") => Mutability::Payable,
                            _ => Mutability::NonPayable,
                        },
                    });
                }
                "event" => {
                    let name = entry.name.ok_or_else(|| {
                        AbiError::ParseError("event fragment missing name".to_string())
                    })?;
                    let mut inputs = Vec::new();
                    for p in entry.inputs.unwrap_or_default() {
                        inputs.push(EventParam {
                            name: p.name.clone(),
                            kind: p.param_type()?,
                            indexed: p.indexed.unwrap_or(false),
                        });
                    }
                    abi.events.push(AbiEvent { name, inputs });
                }
                // constructor / fallback / receive / error fragments are not
                // callable through this client
                _ => {}
            }
        }
        Ok(abi)
    }

    /// Find a function by name
    pub fn function(&self, name: &str) -> Result<&AbiFunction> {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| AbiError::FunctionNotFound(name.to_string()).into())
    }

    /// Find an event by name
    pub fn event(&self, name: &str) -> Result<&AbiEvent> {
        self.events
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| AbiError::EventNotFound(name.to_string()).into())
    }
}

/// The minimal ERC-20 fragment set: reads, transfer/approve, Transfer event
pub fn erc20_abi() -> Abi {
    Abi::parse(&[
        "function name() view returns (string)",
        "function symbol() view returns (string)",
        "function decimals() view returns (uint8)",
        "function totalSupply() view returns (uint256)",
        "function balanceOf(address account) view returns (uint256)",
        "function allowance(address owner, address spender) view returns (uint256)",
        "function approve(address spender, uint256 value) returns (bool)",
        "function transfer(address to, uint256 value) returns (bool)",
        "event Transfer(address indexed from, address indexed to, uint256 value)",
        "event Approval(address indexed owner, address indexed spender, uint256 value)",
    ])
    .expect("static ABI fragments are well-formed")
}

/// Split `name(args)rest` at the balanced closing paren
fn split_prototype(s: &str) -> Result<(&str, &str, &str)> {
    let open = s
        .find('(')
        .ok_or_else(|| AbiError::ParseError(format!("missing '(' in '{s}'")))?;
    let name = s[..open].trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(AbiError::ParseError(format!("bad name in '{s}'")).into());
    }

    let mut depth = 0usize;
    for (i, ch) in s[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let close = open + i;
                    return Ok((name, &s[open + 1..close], &s[close + 1..]));
                }
            }
            _ => {}
        }
    }
    Err(AbiError::ParseError(format!("unbalanced parens in '{s}'")).into())
}

/// Parse a function parameter list: `type [modifier] [name], ...`
fn parse_params(s: &str) -> Result<Vec<Param>> {
    let mut params = Vec::new();
    for component in split_components(s)? {
        if component.is_empty() {
            continue;
        }
        let mut tokens: Vec<&str> = component.split_whitespace().collect();
        tokens.retain(|t| !matches!(*t, "memory" | "calldata" | "storage"));
        let (ty, name) = match tokens.as_slice() {
            [ty] => (*ty, String::new()),
            [ty, name] => (*ty, name.to_string()),
            _ => {
                return Err(
                    AbiError::ParseError(format!("malformed parameter '{component}'")).into(),
                )
            }
        };
        params.push(Param {
            name,
            kind: ParamType::parse(ty)?,
        });
    }
    Ok(params)
}

#[derive(Debug, Deserialize)]
struct JsonAbiEntry {
    #[serde(rename = "type")]
    kind: String,
    name: Option<String>,
    inputs: Option<Vec<JsonAbiParam>>,
    outputs: Option<Vec<JsonAbiParam>>,
    #[serde(rename = "stateMutability")]
    state_mutability: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonAbiParam {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    ty: String,
    indexed: Option<bool>,
    components: Option<Vec<JsonAbiParam>>,
}

impl JsonAbiParam {
    /// Resolve the parameter type, expanding `tuple` via `components`
    fn param_type(&self) -> Result<ParamType> {
        if let Some(suffix) = self.ty.strip_prefix("tuple") {
            let components = self.components.as_deref().unwrap_or(&[]);
            let mut inner = Vec::with_capacity(components.len());
            for c in components {
                inner.push(c.param_type()?);
            }
            // re-apply any array suffixes that followed the `tuple` keyword
            let mut ty = ParamType::Tuple(inner);
            let mut rest = suffix;
            while let Some(stripped) = rest.strip_prefix('[') {
                let close = stripped.find(']').ok_or_else(|| {
                    AbiError::ParseError(format!("bad tuple suffix '{}'", self.ty))
                })?;
                let len = &stripped[..close];
                ty = if len.is_empty() {
                    ParamType::Array(Box::new(ty))
                } else {
                    let n: usize = len.parse().map_err(|_| {
                        AbiError::ParseError(format!("bad tuple suffix '{}'", self.ty))
                    })?;
                    ParamType::FixedArray(Box::new(ty), n)
                };
                rest = &stripped[close + 1..];
            }
            return Ok(ty);
        }
        ParamType::parse(&self.ty)
    }
}

fn json_params(params: &Option<Vec<JsonAbiParam>>) -> Result<Vec<Param>> {
    let mut out = Vec::new();
    for p in params.as_deref().unwrap_or(&[]) {
        out.push(Param {
            name: p.name.clone(),
            kind: p.param_type()?,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_view_function() {
        let f = AbiFunction::parse("function balanceOf(address account) view returns (uint256)")
            .unwrap();
        assert_eq!(f.name, "balanceOf");
        assert_eq!(f.signature(), "balanceOf(address)");
        assert_eq!(f.mutability, Mutability::View);
        assert_eq!(f.inputs.len(), 1);
        assert_eq!(f.inputs[0].name, "account");
        assert_eq!(f.outputs.len(), 1);
        assert_eq!(f.outputs[0].kind, ParamType::Uint(256));
    }

    #[test]
    fn test_known_selectors() {
        let balance_of =
            AbiFunction::parse("function balanceOf(address) view returns (uint256)").unwrap();
        assert_eq!(balance_of.selector(), [0x70, 0xa0, 0x82, 0x31]);

        let transfer =
            AbiFunction::parse("function transfer(address to, uint256 value) returns (bool)")
                .unwrap();
        assert_eq!(transfer.selector(), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_transfer_event_topic0() {
        let event = AbiEvent::parse(
            "event Transfer(address indexed from, address indexed to, uint256 value)",
        )
        .unwrap();
        assert_eq!(event.signature(), "Transfer(address,address,uint256)");
        assert_eq!(event.indexed_count(), 2);
        assert_eq!(
            format!("{:x}", event.topic0()),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_bare_event_signature() {
        let event = AbiEvent::parse("Transfer(address,address,uint256)").unwrap();
        assert_eq!(
            format!("{:x}", event.topic0()),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
        // bare form has no indexing information
        assert_eq!(event.indexed_count(), 0);
    }

    #[test]
    fn test_json_and_human_readable_normalize_identically() {
        let json = r#"[
            {
                "type": "function",
                "name": "transfer",
                "stateMutability": "nonpayable",
                "inputs": [
                    {"name": "to", "type": "address"},
                    {"name": "value", "type": "uint256"}
                ],
                "outputs": [{"name": "", "type": "bool"}]
            },
            {
                "type": "event",
                "name": "Transfer",
                "inputs": [
                    {"name": "from", "type": "address", "indexed": true},
                    {"name": "to", "type": "address", "indexed": true},
                    {"name": "value", "type": "uint256", "indexed": false}
                ]
            }
        ]"#;
        let from_json = Abi::parse_json(json).unwrap();
        let from_hr = Abi::parse(&[
            "function transfer(address to, uint256 value) returns (bool)",
            "event Transfer(address indexed from, address indexed to, uint256 value)",
        ])
        .unwrap();

        assert_eq!(from_json.functions, from_hr.functions);
        assert_eq!(from_json.events, from_hr.events);
    }

    #[test]
    fn test_json_tuple_components() {
        let json = r#"[
            {
                "type": "function",
                "name": "submit",
                "stateMutability": "nonpayable",
                "inputs": [{
                    "name": "order",
                    "type": "tuple",
                    "components": [
                        {"name": "maker", "type": "address"},
                        {"name": "amount", "type": "uint256"}
                    ]
                }],
                "outputs": []
            }
        ]"#;
        let abi = Abi::parse_json(json).unwrap();
        let f = abi.function("submit").unwrap();
        assert_eq!(f.signature(), "submit((address,uint256))");
    }

    #[test]
    fn test_payable_and_default_mutability() {
        let f = AbiFunction::parse("function deposit() payable").unwrap();
        assert_eq!(f.mutability, Mutability::Payable);
        assert!(!f.mutability.is_read_only());

        let f = AbiFunction::parse("function transfer(address,uint256) returns (bool)").unwrap();
        assert_eq!(f.mutability, Mutability::NonPayable);
    }

    #[test]
    fn test_lookup_errors() {
        let abi = erc20_abi();
        assert!(abi.function("balanceOf").is_ok());
        assert!(abi.function("mint").is_err());
        assert!(abi.event("Transfer").is_ok());
        assert!(abi.event("Burn").is_err());
    }
}
