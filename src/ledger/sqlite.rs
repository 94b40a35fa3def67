//! Ledger de conversas e fila de revisão em SQLite.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;

use crate::types::transcript::{
    Conversation, Message, PendingQuery, PendingStatus, QueueStats,
};
use crate::{LoreError, LoreResult};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        conversation_id INTEGER NOT NULL REFERENCES conversations(id),
        is_user BOOLEAN NOT NULL,
        content TEXT NOT NULL,
        needs_review BOOLEAN NOT NULL DEFAULT 0,
        feedback INTEGER,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS pending_queries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        conversation_id INTEGER REFERENCES conversations(id),
        first_seen_at TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'unresolved',
        attempts INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        next_attempt_at TEXT,
        resolved_at TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);
    CREATE INDEX IF NOT EXISTS idx_pending_status ON pending_queries(status);
    CREATE INDEX IF NOT EXISTS idx_pending_text ON pending_queries(text);
"#;

const PENDING_COLUMNS: &str = "id, text, conversation_id, first_seen_at, status, attempts,
                               last_error, next_attempt_at, resolved_at";

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, is_user, content, needs_review, feedback, created_at";

/// Timestamps UTC de largura fixa; comparação de texto no SQL é cronológica.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => parse_ts(row, idx).map(Some),
        None => Ok(None),
    }
}

fn pending_from_row(row: &Row<'_>) -> rusqlite::Result<PendingQuery> {
    Ok(PendingQuery {
        id: row.get(0)?,
        text: row.get(1)?,
        conversation_id: row.get(2)?,
        first_seen_at: parse_ts(row, 3)?,
        status: PendingStatus::from_str(&row.get::<_, String>(4)?),
        attempts: row.get(5)?,
        last_error: row.get(6)?,
        next_attempt_at: parse_opt_ts(row, 7)?,
        resolved_at: parse_opt_ts(row, 8)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        is_user: row.get(2)?,
        content: row.get(3)?,
        needs_review: row.get(4)?,
        feedback: row.get(5)?,
        created_at: parse_ts(row, 6)?,
    })
}

/// Conversas, mensagens, feedback e a fila de revisão pendente.
///
/// `rusqlite::Connection` não é `Sync`; a conexão fica atrás de um mutex
/// assíncrono e todos os métodos recebem `&self`.
pub struct TranscriptLedger {
    conn: Mutex<Connection>,
}

impl TranscriptLedger {
    /// Abre ou cria o banco do ledger.
    pub fn open(path: &Path) -> LoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    /// Ledger que vive apenas enquanto o processo.
    pub fn open_in_memory() -> LoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> LoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Conversas e mensagens
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn create_conversation(&self, title: Option<&str>) -> LoreResult<Conversation> {
        let conn = self.conn.lock().await;
        let now = Utc::now();
        let title = title.unwrap_or("New Chat").to_string();

        conn.execute(
            "INSERT INTO conversations (title, created_at) VALUES (?, ?)",
            params![title, ts(now)],
        )?;

        Ok(Conversation {
            id: conn.last_insert_rowid(),
            title,
            created_at: now,
        })
    }

    /// Busca uma conversa ou falha com `NotFound`.
    pub async fn conversation(&self, id: i64) -> LoreResult<Conversation> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT id, title, created_at FROM conversations WHERE id = ?",
            params![id],
            |row| {
                Ok(Conversation {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    created_at: parse_ts(row, 2)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| LoreError::not_found(format!("conversation {}", id)))
    }

    pub async fn append_message(
        &self,
        conversation_id: i64,
        is_user: bool,
        content: &str,
        needs_review: bool,
    ) -> LoreResult<Message> {
        let conn = self.conn.lock().await;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO messages (conversation_id, is_user, content, needs_review, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![conversation_id, is_user, content, needs_review, ts(now)],
        )?;

        Ok(Message {
            id: conn.last_insert_rowid(),
            conversation_id,
            is_user,
            content: content.to_string(),
            needs_review,
            feedback: None,
            created_at: now,
        })
    }

    /// Mensagens de uma conversa, em ordem.
    pub async fn messages(&self, conversation_id: i64) -> LoreResult<Vec<Message>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM messages WHERE conversation_id = ? ORDER BY id",
            MESSAGE_COLUMNS
        ))?;
        let messages = stmt
            .query_map(params![conversation_id], message_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    /// Registra uma nota de feedback em uma mensagem.
    pub async fn record_feedback(&self, message_id: i64, score: i32) -> LoreResult<()> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE messages SET feedback = ? WHERE id = ?",
            params![score, message_id],
        )?;

        if updated == 0 {
            return Err(LoreError::not_found(format!("message {}", message_id)));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Fila de revisão
    // ═══════════════════════════════════════════════════════════════════════

    /// Marca uma query para revisão. Retorna `None` quando o mesmo texto já
    /// está aguardando sem resolução.
    pub async fn enqueue_pending(
        &self,
        text: &str,
        conversation_id: Option<i64>,
    ) -> LoreResult<Option<i64>> {
        let conn = self.conn.lock().await;
        let inserted = conn.execute(
            "INSERT INTO pending_queries (text, conversation_id, first_seen_at, status)
             SELECT ?1, ?2, ?3, 'unresolved'
             WHERE NOT EXISTS (
                 SELECT 1 FROM pending_queries WHERE text = ?1 AND status = 'unresolved'
             )",
            params![text, conversation_id, ts(Utc::now())],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }

    /// Queries não resolvidas mais antigas cujo backoff (se houver) já passou.
    pub async fn due_pending(&self, limit: usize, now: DateTime<Utc>) -> LoreResult<Vec<PendingQuery>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM pending_queries
             WHERE status = 'unresolved'
               AND (next_attempt_at IS NULL OR next_attempt_at <= ?)
             ORDER BY first_seen_at, id
             LIMIT ?",
            PENDING_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![ts(now), limit as i64], pending_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Lista linhas da fila, opcionalmente filtradas por status, mais antigas primeiro.
    pub async fn list_pending(
        &self,
        status: Option<PendingStatus>,
        limit: usize,
    ) -> LoreResult<Vec<PendingQuery>> {
        let conn = self.conn.lock().await;
        let rows = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM pending_queries WHERE status = ? ORDER BY first_seen_at, id LIMIT ?",
                    PENDING_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![status.to_string(), limit as i64], pending_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM pending_queries ORDER BY first_seen_at, id LIMIT ?",
                    PENDING_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![limit as i64], pending_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(rows)
    }

    pub async fn pending(&self, id: i64) -> LoreResult<PendingQuery> {
        let conn = self.conn.lock().await;
        conn.query_row(
            &format!("SELECT {} FROM pending_queries WHERE id = ?", PENDING_COLUMNS),
            params![id],
            pending_from_row,
        )
        .optional()?
        .ok_or_else(|| LoreError::not_found(format!("pending query {}", id)))
    }

    /// Fecha uma query como promoted, dropped ou parked.
    pub async fn resolve_pending(&self, id: i64, status: PendingStatus) -> LoreResult<()> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE pending_queries SET status = ?, resolved_at = ?, next_attempt_at = NULL
             WHERE id = ?",
            params![status.to_string(), ts(Utc::now()), id],
        )?;

        if updated == 0 {
            return Err(LoreError::not_found(format!("pending query {}", id)));
        }
        Ok(())
    }

    /// Registra uma tentativa falha; a query continua não resolvida e volta a
    /// ficar elegível em `next_attempt_at` (imediatamente quando `None`).
    pub async fn record_failure(
        &self,
        id: i64,
        error: &str,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> LoreResult<u32> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE pending_queries
             SET attempts = attempts + 1, last_error = ?, next_attempt_at = ?
             WHERE id = ?",
            params![error, next_attempt_at.map(ts), id],
        )?;

        let attempts: u32 = conn
            .query_row(
                "SELECT attempts FROM pending_queries WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| LoreError::not_found(format!("pending query {}", id)))?;
        Ok(attempts)
    }

    pub async fn queue_stats(&self) -> LoreResult<QueueStats> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM pending_queries GROUP BY status")?;

        let mut stats = QueueStats::default();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            let count = count as usize;
            match PendingStatus::from_str(&status) {
                PendingStatus::Unresolved => stats.unresolved += count,
                PendingStatus::Promoted => stats.promoted += count,
                PendingStatus::Dropped => stats.dropped += count,
                PendingStatus::Parked => stats.parked += count,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ledger() -> TranscriptLedger {
        TranscriptLedger::open_in_memory().unwrap()
    }

    #[tokio::test]
    async fn test_conversation_and_messages() {
        let ledger = ledger();
        let conv = ledger.create_conversation(None).await.unwrap();
        assert_eq!(conv.title, "New Chat");

        ledger.append_message(conv.id, true, "What is a WAL?", false).await.unwrap();
        let reply = ledger
            .append_message(conv.id, false, "A write-ahead log.", false)
            .await
            .unwrap();

        let messages = ledger.messages(conv.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_user);
        assert_eq!(messages[1].id, reply.id);
    }

    #[tokio::test]
    async fn test_missing_conversation_is_not_found() {
        let ledger = ledger();
        assert!(matches!(
            ledger.conversation(99).await,
            Err(LoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_feedback() {
        let ledger = ledger();
        let conv = ledger.create_conversation(Some("db")).await.unwrap();
        let msg = ledger.append_message(conv.id, false, "answer", false).await.unwrap();

        ledger.record_feedback(msg.id, 1).await.unwrap();
        assert_eq!(ledger.messages(conv.id).await.unwrap()[0].feedback, Some(1));

        assert!(matches!(
            ledger.record_feedback(12345, -1).await,
            Err(LoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_enqueue_skips_unresolved_duplicate() {
        let ledger = ledger();
        let first = ledger.enqueue_pending("What is Redis?", None).await.unwrap();
        let second = ledger.enqueue_pending("What is Redis?", None).await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());

        ledger
            .resolve_pending(first.unwrap(), PendingStatus::Dropped)
            .await
            .unwrap();
        let third = ledger.enqueue_pending("What is Redis?", None).await.unwrap();
        assert!(third.is_some());
    }

    #[tokio::test]
    async fn test_due_pending_respects_limit_and_order() {
        let ledger = ledger();
        for i in 0..4 {
            ledger.enqueue_pending(&format!("q{}", i), None).await.unwrap();
        }

        let due = ledger.due_pending(3, Utc::now()).await.unwrap();
        let texts: Vec<&str> = due.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["q0", "q1", "q2"]);
        assert!(due.iter().all(|p| p.status == PendingStatus::Unresolved));
    }

    #[tokio::test]
    async fn test_failure_with_backoff_delays_query() {
        let ledger = ledger();
        let id = ledger.enqueue_pending("slow", None).await.unwrap().unwrap();
        let now = Utc::now();

        let attempts = ledger
            .record_failure(id, "timeout", Some(now + Duration::seconds(60)))
            .await
            .unwrap();
        assert_eq!(attempts, 1);

        assert!(ledger.due_pending(10, now).await.unwrap().is_empty());
        let later = ledger
            .due_pending(10, now + Duration::seconds(61))
            .await
            .unwrap();
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_queue_stats() {
        let ledger = ledger();
        let a = ledger.enqueue_pending("a", None).await.unwrap().unwrap();
        let b = ledger.enqueue_pending("b", None).await.unwrap().unwrap();
        ledger.enqueue_pending("c", None).await.unwrap();
        ledger.resolve_pending(a, PendingStatus::Promoted).await.unwrap();
        ledger.resolve_pending(b, PendingStatus::Parked).await.unwrap();

        let stats = ledger.queue_stats().await.unwrap();
        assert_eq!(
            stats,
            QueueStats {
                unresolved: 1,
                promoted: 1,
                dropped: 0,
                parked: 1
            }
        );

        let parked = ledger
            .list_pending(Some(PendingStatus::Parked), 10)
            .await
            .unwrap();
        assert_eq!(parked.len(), 1);
        assert!(parked[0].resolved_at.is_some());
        assert_eq!(ledger.list_pending(None, 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_file_backed_ledger_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.db");
        {
            let ledger = TranscriptLedger::open(&path).unwrap();
            ledger.enqueue_pending("persisted?", Some(1)).await.unwrap();
        }
        let ledger = TranscriptLedger::open(&path).unwrap();
        let rows = ledger.list_pending(None, 10).await.unwrap();
        assert_eq!(rows[0].text, "persisted?");
    }

    #[tokio::test]
    async fn test_unparseable_timestamp_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("ledger.db");
        let ledger = TranscriptLedger::open(&db).unwrap();
        ledger.enqueue_pending("What is a GIN index?", None).await.unwrap();

        Connection::open(&db)
            .unwrap()
            .execute("UPDATE pending_queries SET first_seen_at = 'last tuesday'", [])
            .unwrap();

        assert!(matches!(
            ledger.list_pending(None, 10).await,
            Err(LoreError::Database(_))
        ));
        assert!(ledger.due_pending(10, Utc::now()).await.is_err());
    }
}
