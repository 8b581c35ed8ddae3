//! Protocol module: message types, the JSON codec and origin checks.

pub mod codec;
pub mod messages;
pub mod origin;

pub use codec::{
    decode_host_message, decode_page_message, encode_host_message, encode_page_message,
    validate_document, ProtocolError,
};
pub use messages::*;
pub use origin::{OriginPolicy, TargetOrigin};
