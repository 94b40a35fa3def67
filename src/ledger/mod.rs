//! Ledger de conversas: mensagens, feedback e a fila de revisão que o
//! pipeline de aprendizado esvazia.

mod sqlite;

pub use sqlite::TranscriptLedger;
