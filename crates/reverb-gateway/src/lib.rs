//! Reverb Gateway
//!
//! Validates JSON-RPC invocation requests, resolves the method through the
//! [`FunctionRegistry`](reverb_function::FunctionRegistry), advances the
//! execution by one step and translates the outcome into a response.
//!
//! Requests without an `id` are fire-and-forget: the status code is still
//! meaningful but no body is returned.

mod error;
mod gateway;
mod routes;
mod rpc;

pub use error::GatewayError;
pub use gateway::{Gateway, GatewayReply};
pub use routes::router;
pub use rpc::{JSONRPC_VERSION, RequestId, RpcParams, RpcRequest, RpcResponse};
