//! Wire protocol definitions for the RPC endpoint
//!
//! Requests and replies are JSON text frames:
//! - **Request**: `{"id": "...", "method": "...", "params": [...]}`
//! - **Reply**: `{"id": "...", "result": ...}` or `{"id": "...", "error": {"message": "..."}}`
//! - **Push**: `{"method": "notify", "params": [...]}` (no id)

pub mod request;
pub mod response;
pub mod types;

pub use request::{CrudMethod, RpcRequest};
pub use response::{Inbound, RpcError, RpcReply, NOTIFY_METHOD};
pub use types::{Auth, Patch, UseConfig};
