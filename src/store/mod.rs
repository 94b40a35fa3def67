//! Knowledge store de similaridade vetorial.
//!
//! ## Componentes
//!
//! - **KnowledgeStore**: add/search/persist com dedup por prompt exato e
//!   disciplina de escritor único
//! - **FlatIndex**: busca exata de vizinho mais próximo por L2 ao quadrado
//! - **StoreFiles**: artefatos de índice + metadados e a checagem de
//!   consistência na carga
//! - **Ingest/Export/Import**: movimentação de entradas em lote

mod index;
mod knowledge;
mod persist;
mod transfer;

pub use index::{squared_l2, FlatIndex};
pub use knowledge::KnowledgeStore;
pub use persist::{StoreFiles, INDEX_FILE, META_FILE};
pub use transfer::{IngestReport, KnowledgeExport, SeedRecord};

pub(crate) use knowledge::truncate;
