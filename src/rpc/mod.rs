//! JSON-RPC 2.0 delimitado por linha via stdio.
//!
//! ## Métodos
//!
//! - `initialize`
//! - `submit_query {query, conversation_id?}`
//! - `submit_feedback {message_id, score}`
//! - `store_status`
//! - `learn_now` - executa um lote de aprendizado
//! - `shutdown`

pub mod handlers;
pub mod protocol;
pub mod server;
pub mod transport;

pub use server::RpcServer;
pub use transport::{Incoming, LineTransport};
