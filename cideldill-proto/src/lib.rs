pub mod actions;
pub mod calls;
pub mod cid;
pub mod codec;
pub mod endpoints;
pub mod errors;
pub mod value;

pub use serde_json::Value;
