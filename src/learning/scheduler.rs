//! Execução periódica em background do pipeline de aprendizado.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::pipeline::RecursiveLearner;

/// Executa [`RecursiveLearner::run_once`] a cada `interval` até receber ordem de parar.
///
/// Ticks que vencem durante uma execução em andamento são pulados. Uma
/// execução com falha é logada e o agendamento continua.
pub struct Scheduler {
    learner: Arc<RecursiveLearner>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(learner: Arc<RecursiveLearner>, interval: Duration) -> Self {
        Self { learner, interval }
    }

    /// Inicia o loop. Enviar `true` pelo (ou descartar o) `watch::Sender`
    /// pareado encerra o loop após a execução atual.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(interval_secs = self.interval.as_secs(), "Learning scheduler started");

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.learner.run_once().await {
                            tracing::error!(error = %e, "Learning run failed");
                        }
                    }
                }
            }

            tracing::info!("Learning scheduler stopped");
        })
    }
}
