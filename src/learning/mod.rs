//! Aprendizado recursivo: transforma misses marcados em respostas armazenadas.
//!
//! [`RecursiveLearner`] executa um lote; [`Scheduler`] o repete em
//! background.

mod pipeline;
mod scheduler;

pub use pipeline::{backoff_delay, LearningReport, RecursiveLearner};
pub use scheduler::Scheduler;
