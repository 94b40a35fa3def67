//! Implementação dos comandos CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;

use super::StatusFilter;
use crate::app::App;
use crate::rpc::{LineTransport, RpcServer};
use crate::store::truncate;
use crate::types::config::Config;
use crate::LoreResult;

/// Inicializa configuração no diretório especificado.
pub async fn init(path: Option<PathBuf>) -> LoreResult<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));

    if !target_dir.exists() {
        std::fs::create_dir_all(&target_dir)?;
        tracing::info!("Directory created: {}", target_dir.display());
    }

    let config_path = target_dir.join("lorebank.toml");

    if config_path.exists() {
        println!("Configuration already exists at: {}", config_path.display());
        return Ok(());
    }

    let data_dir = target_dir.join(".lorebank");
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!(".lorebank/ directory created");
    }

    update_gitignore(&target_dir)?;

    let config = Config::default_config();
    config.save(&config_path)?;

    println!("lorebank initialized successfully!");
    println!("Configuration created at: {}", config_path.display());
    println!("Data directory: .lorebank/");
    println!();
    println!("Next steps:");
    println!("  1. Seed the store: lorebank ingest corpus.jsonl");
    println!("  2. Ask something: lorebank ask \"What is a B-tree?\"");
    println!("  3. Serve clients: lorebank serve");

    Ok(())
}

/// Atualiza ou cria .gitignore para incluir .lorebank/
fn update_gitignore(target_dir: &Path) -> LoreResult<()> {
    let gitignore_path = target_dir.join(".gitignore");
    let entry = ".lorebank/";
    let comment = "# lorebank - knowledge store and transcript ledger";

    if gitignore_path.exists() {
        let content = std::fs::read_to_string(&gitignore_path)?;

        if content
            .lines()
            .any(|line| line.trim() == entry || line.trim() == ".lorebank")
        {
            tracing::debug!(".gitignore already contains .lorebank/");
            return Ok(());
        }

        let mut new_content = content.trim_end().to_string();
        if !new_content.is_empty() {
            new_content.push_str("\n\n");
        }
        new_content.push_str(comment);
        new_content.push('\n');
        new_content.push_str(entry);
        new_content.push('\n');

        std::fs::write(&gitignore_path, new_content)?;
        println!(".gitignore updated with .lorebank/");
    } else {
        std::fs::write(&gitignore_path, format!("{}\n{}\n", comment, entry))?;
        println!(".gitignore created with .lorebank/");
    }

    Ok(())
}

/// Serve JSON-RPC via stdio até EOF ou `shutdown`.
pub async fn serve(no_learning: bool, config: &Config) -> LoreResult<()> {
    let app = Arc::new(App::from_config(config.clone()).await?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = if no_learning {
        None
    } else {
        app.scheduler().map(|s| s.spawn(shutdown_rx))
    };

    let mut server = RpcServer::new(app.clone(), LineTransport::stdio());
    let result = server.run().await;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Learning scheduler task panicked");
        }
    }

    result
}

/// Responde uma pergunta pela linha de comando.
pub async fn ask(
    query: &str,
    conversation: Option<i64>,
    json: bool,
    config: &Config,
) -> LoreResult<()> {
    let app = App::from_config(config.clone()).await?;
    let answer = app.retrieval.answer(query, conversation).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    println!("{}", answer.text);
    if answer.needs_review {
        println!();
        println!("(no stored answer; queued for review)");
    } else if let Some(distance) = answer.distance {
        tracing::debug!(distance, "Matched stored answer");
    }

    Ok(())
}

/// Carrega um corpus JSONL inicial.
pub async fn ingest(input: &Path, config: &Config) -> LoreResult<()> {
    let app = App::from_config(config.clone()).await?;
    let file = std::fs::File::open(input)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Ingesting {}", input.display()));

    let report = app
        .store
        .ingest_jsonl(std::io::BufReader::new(file), |r| {
            spinner.set_message(format!(
                "{} added, {} skipped, {} invalid",
                r.added, r.skipped, r.invalid
            ));
        })
        .await;

    let report = match report {
        Ok(report) => report,
        Err(e) => {
            spinner.abandon_with_message("Ingest failed");
            return Err(e);
        }
    };

    spinner.finish_with_message(format!(
        "Ingested {} records: {} added, {} skipped, {} invalid",
        report.processed(),
        report.added,
        report.skipped,
        report.invalid
    ));

    Ok(())
}

/// Executa um lote de aprendizado e imprime o relatório.
pub async fn learn(config: &Config) -> LoreResult<()> {
    let app = App::from_config(config.clone()).await?;
    let report = app.learner.run_once().await?;

    println!("Learning run complete");
    println!("  examined:      {}", report.examined);
    println!("  promoted:      {}", report.promoted);
    println!("  dropped:       {}", report.dropped);
    println!("  already known: {}", report.already_known);
    println!("  failed:        {}", report.failed);
    if report.parked > 0 {
        println!("  parked:        {}", report.parked);
    }

    Ok(())
}

/// Lista linhas da fila de revisão.
pub async fn pending(status: Option<StatusFilter>, limit: usize, config: &Config) -> LoreResult<()> {
    let ledger = crate::ledger::TranscriptLedger::open(&config.general.ledger_path)?;
    let rows = ledger.list_pending(status.map(Into::into), limit).await?;

    if rows.is_empty() {
        println!("Review queue is empty.");
        return Ok(());
    }

    println!("{:<6} {:<11} {:>8}  {:<20} QUERY", "ID", "STATUS", "ATTEMPTS", "FIRST SEEN");
    for row in rows {
        println!(
            "{:<6} {:<11} {:>8}  {:<20} {}",
            row.id,
            row.status.to_string(),
            row.attempts,
            row.first_seen_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            truncate(&row.text)
        );
        if let Some(err) = row.last_error {
            println!("{:<6} last error: {}", "", err);
        }
    }

    Ok(())
}

/// Exporta o knowledge store.
pub async fn export(output: &Path, config: &Config) -> LoreResult<()> {
    let app = App::from_config(config.clone()).await?;
    let export = app.store.export(output).await?;

    println!(
        "Exported {} entries ({} original, {} generated) to {}",
        export.entries.len(),
        export.stats.original,
        export.stats.generated,
        output.display()
    );
    Ok(())
}

/// Importa um export anterior.
pub async fn import(input: &Path, config: &Config) -> LoreResult<()> {
    let app = App::from_config(config.clone()).await?;
    let report = app.store.import(input).await?;

    println!(
        "Imported {} entries ({} already present)",
        report.added, report.skipped
    );
    Ok(())
}

/// Mostra status do store, da fila e dos gateways.
pub async fn status(config: &Config) -> LoreResult<()> {
    let app = App::from_config(config.clone()).await?;
    let status = app.status().await?;

    println!("Knowledge store");
    println!("  directory:  {}", app.store.files().dir().display());
    println!(
        "  entries:    {} ({} original, {} generated)",
        status.store.entries, status.store.original, status.store.generated
    );
    println!("  dimension:  {}", status.store.dimension);
    println!("  threshold:  {}", status.threshold);
    println!();
    println!("Review queue");
    println!("  unresolved: {}", status.queue.unresolved);
    println!("  promoted:   {}", status.queue.promoted);
    println!("  dropped:    {}", status.queue.dropped);
    println!("  parked:     {}", status.queue.parked);
    println!();
    println!("Gateways");
    println!("  embedding:  {}", status.embedding_model);
    println!("  reasoning:  {}", status.reasoning_gateway);
    if let Some(cache) = status.embedding_cache {
        println!(
            "  cache:      {}/{} entries, {:.0}% hit rate",
            cache.size,
            cache.capacity,
            cache.hit_rate() * 100.0
        );
    }

    Ok(())
}

/// Mostra versão.
pub fn version() {
    println!("lorebank {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Self-improving retrieval knowledge store");
}
