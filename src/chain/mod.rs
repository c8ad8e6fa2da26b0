pub mod address;
pub mod contracts;
pub mod rpc;

pub use address::{is_address, parse_address, short_address};
