//! Interface de linha de comando do lorebank.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::types::transcript::PendingStatus;

/// lorebank - knowledge store de recuperação que se aprimora sozinho.
#[derive(Parser, Debug)]
#[command(name = "lorebank")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Arquivo de configuração.
    #[arg(short, long, default_value = "lorebank.toml")]
    pub config: PathBuf,

    /// Modo verbose.
    #[arg(short, long)]
    pub verbose: bool,

    /// Modo silencioso.
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cria configuração padrão e diretório de dados.
    Init {
        /// Diretório de destino (padrão: diretório atual).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Inicia o servidor JSON-RPC via stdio, aprendendo em background.
    Serve {
        /// Não inicia o scheduler de aprendizado.
        #[arg(long)]
        no_learning: bool,
    },

    /// Responde uma única pergunta.
    Ask {
        query: String,

        /// Continua uma conversa existente.
        #[arg(long)]
        conversation: Option<i64>,

        /// Imprime a resposta completa em JSON.
        #[arg(long)]
        json: bool,
    },

    /// Carrega um corpus JSONL de registros {"prompt", "completion"}.
    Ingest { input: PathBuf },

    /// Executa um lote de aprendizado agora.
    Learn,

    /// Lista a fila de revisão.
    Pending {
        /// Mostra apenas linhas com este status.
        #[arg(short, long, value_enum)]
        status: Option<StatusFilter>,

        /// Máximo de linhas a mostrar.
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Grava todas as entradas em um arquivo JSON.
    Export {
        #[arg(short, long, default_value = "lorebank-export.json")]
        output: PathBuf,
    },

    /// Adiciona entradas de um export anterior.
    Import { input: PathBuf },

    /// Mostra status do store, da fila e dos gateways.
    Status,

    /// Mostra versão.
    Version,
}

/// Status da fila de revisão aceito na linha de comando.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusFilter {
    Unresolved,
    Promoted,
    Dropped,
    Parked,
}

impl From<StatusFilter> for PendingStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Unresolved => PendingStatus::Unresolved,
            StatusFilter::Promoted => PendingStatus::Promoted,
            StatusFilter::Dropped => PendingStatus::Dropped,
            StatusFilter::Parked => PendingStatus::Parked,
        }
    }
}
