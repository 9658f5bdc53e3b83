//! ABI descriptors, encoding, and decoding

mod codec;
mod decoder;
mod param;
mod parser;

pub use codec::{
    decode_return, decode_revert_reason, decode_values, encode_function_call, encode_values,
    Value,
};
pub use decoder::{decode_log, DecodedLog, LogDecoder};
pub use param::ParamType;
pub use parser::{erc20_abi, Abi, AbiEvent, AbiFunction, EventParam, Mutability, Param};
