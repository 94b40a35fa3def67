//! Tipos compartilhados.

pub mod config;
pub mod errors;
pub mod knowledge;
pub mod transcript;
