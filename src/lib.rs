//! # lorebank
//!
//! Knowledge store de recuperação que se aprimora sozinho, para perguntas
//! restritas a um domínio.
//!
//! Perguntas ao vivo são respondidas a partir de um store de similaridade
//! vetorial com pares prompt/completion. Misses recebem uma resposta fixa e
//! entram em uma fila de revisão, que um pipeline em background esvazia por
//! meio de um serviço de raciocínio externo, promovendo respostas dentro do
//! tema de volta ao store.
//!
//! ## Módulos
//!
//! - [`store`] - Knowledge store (índice flat + metadados, escritor único)
//! - [`retrieval`] - Política de resposta ao vivo
//! - [`learning`] - Pipeline de aprendizado recursivo e scheduler
//! - [`ledger`] - Conversas em SQLite e fila de revisão
//! - [`gateways`] - Adaptadores de embeddings e raciocínio
//! - [`cache`] - Cache LRU para embeddings
//! - [`rpc`] - JSON-RPC via stdio
//! - [`app`] - Raiz de composição
//! - [`cli`] - Interface de linha de comando
//! - [`types`] - Tipos compartilhados

pub mod app;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod gateways;
pub mod learning;
pub mod ledger;
pub mod retrieval;
pub mod rpc;
pub mod store;
pub mod types;

pub use app::App;
pub use types::config::Config;
pub use types::errors::{LoreError, LoreResult};
