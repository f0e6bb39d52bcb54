pub mod signature;

pub use signature::{canonical_payload, verify_order_signature};
