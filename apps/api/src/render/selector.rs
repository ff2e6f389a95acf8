//! Engine Selector: tries PDF backends in priority order until one succeeds.
//!
//! Unavailable engines are skipped without counting as failures; installed
//! engines that error, time out or return nothing are recorded as failures and
//! the cascade moves on. Every attempt is kept for diagnostics.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::PdfConfig;
use crate::render::backends::{Availability, BackendError, Engine, PdfBackend, RenderOptions};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Skipped(String),
    Failed(String),
    Succeeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineAttempt {
    pub engine: Engine,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

impl fmt::Display for EngineAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::Skipped(reason) => write!(f, "{}: skipped ({reason})", self.engine),
            AttemptOutcome::Failed(reason) => write!(f, "{}: failed ({reason})", self.engine),
            AttemptOutcome::Succeeded => write!(f, "{}: succeeded", self.engine),
        }
    }
}

#[derive(Debug)]
pub struct GeneratedPdf {
    pub bytes: Bytes,
    pub engine: Engine,
    /// Every attempt made, the successful one last.
    pub attempts: Vec<EngineAttempt>,
}

/// Raised when no backend produced a PDF.
#[derive(Debug, Error)]
pub struct AllBackendsExhausted {
    pub attempts: Vec<EngineAttempt>,
}

impl fmt::Display for AllBackendsExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempts.is_empty() {
            return f.write_str("no PDF engines are configured");
        }
        f.write_str("all PDF engines failed: ")?;
        for (i, attempt) in self.attempts.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{attempt}")?;
        }
        Ok(())
    }
}

/// One row of the operator engine report.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub engine: Engine,
    pub position: usize,
    pub availability: Availability,
}

pub struct EngineSelector {
    backends: Vec<Arc<dyn PdfBackend>>,
    preferred: Option<Engine>,
    attempt_timeout: Duration,
}

impl EngineSelector {
    pub fn new(backends: Vec<Arc<dyn PdfBackend>>, preferred: Option<Engine>, attempt_timeout: Duration) -> Self {
        Self {
            backends,
            preferred,
            attempt_timeout,
        }
    }

    /// Reads the `PDF_ENGINE` override from config. An unrecognised value is
    /// logged and ignored so the default order still applies.
    pub fn from_config(backends: Vec<Arc<dyn PdfBackend>>, config: &PdfConfig) -> Self {
        let preferred = config
            .preferred_engine
            .as_deref()
            .and_then(|raw| match raw.parse::<Engine>() {
                Ok(engine) => Some(engine),
                Err(e) => {
                    warn!("Ignoring PDF_ENGINE: {e}");
                    None
                }
            });
        if let Some(engine) = preferred {
            info!(engine = %engine, "PDF engine override active");
        }
        Self::new(backends, preferred, config.attempt_timeout)
    }

    /// Backends in the order they will be tried: the preferred engine first,
    /// then the default fidelity order. Engines without a registered backend
    /// are left out.
    pub fn candidate_order(&self) -> Vec<Arc<dyn PdfBackend>> {
        let mut order: Vec<Engine> = Vec::with_capacity(Engine::DEFAULT_ORDER.len());
        if let Some(preferred) = self.preferred {
            order.push(preferred);
        }
        for engine in Engine::DEFAULT_ORDER {
            if !order.contains(&engine) {
                order.push(engine);
            }
        }

        order
            .into_iter()
            .filter_map(|engine| self.backends.iter().find(|b| b.engine() == engine).cloned())
            .collect()
    }

    pub fn engine_report(&self) -> Vec<EngineStatus> {
        self.candidate_order()
            .iter()
            .enumerate()
            .map(|(position, backend)| EngineStatus {
                engine: backend.engine(),
                position,
                availability: backend.availability().clone(),
            })
            .collect()
    }

    pub fn preferred(&self) -> Option<Engine> {
        self.preferred
    }

    /// Runs the cascade for one document.
    pub async fn generate(&self, html: &str, options: &RenderOptions) -> Result<GeneratedPdf, AllBackendsExhausted> {
        let mut attempts = Vec::new();

        for backend in self.candidate_order() {
            let engine = backend.engine();

            if let Availability::Unavailable(reason) = backend.availability() {
                info!(engine = %engine, "Skipping PDF engine: {reason}");
                attempts.push(EngineAttempt {
                    engine,
                    outcome: AttemptOutcome::Skipped(reason.clone()),
                });
                continue;
            }

            let result = match tokio::time::timeout(self.attempt_timeout, backend.render(html, options)).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout(self.attempt_timeout)),
            };

            match result {
                Ok(bytes) if !bytes.is_empty() => {
                    info!(engine = %engine, size = bytes.len(), "PDF generated");
                    attempts.push(EngineAttempt {
                        engine,
                        outcome: AttemptOutcome::Succeeded,
                    });
                    return Ok(GeneratedPdf {
                        bytes: Bytes::from(bytes),
                        engine,
                        attempts,
                    });
                }
                Ok(_) => {
                    warn!(engine = %engine, "PDF engine returned empty output");
                    attempts.push(EngineAttempt {
                        engine,
                        outcome: AttemptOutcome::Failed("produced empty output".to_string()),
                    });
                }
                Err(BackendError::Unavailable(reason)) => {
                    info!(engine = %engine, "Skipping PDF engine: {reason}");
                    attempts.push(EngineAttempt {
                        engine,
                        outcome: AttemptOutcome::Skipped(reason),
                    });
                }
                Err(e) => {
                    warn!(engine = %engine, "PDF engine failed: {e}");
                    attempts.push(EngineAttempt {
                        engine,
                        outcome: AttemptOutcome::Failed(e.to_string()),
                    });
                }
            }
        }

        warn!("All PDF engines exhausted after {} attempt(s)", attempts.len());
        Err(AllBackendsExhausted { attempts })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub enum Behavior {
        Succeed(Vec<u8>),
        Fail(String),
        Hang,
    }

    /// Scripted backend for cascade tests.
    pub struct MockBackend {
        pub engine: Engine,
        pub availability: Availability,
        pub behavior: Behavior,
        pub calls: AtomicUsize,
    }

    impl MockBackend {
        pub fn new(engine: Engine, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                engine,
                availability: Availability::Available,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn unavailable(engine: Engine, reason: &str) -> Arc<Self> {
            Arc::new(Self {
                engine,
                availability: Availability::Unavailable(reason.to_string()),
                behavior: Behavior::Fail("must not be called".to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PdfBackend for MockBackend {
        fn engine(&self) -> Engine {
            self.engine
        }

        fn availability(&self) -> &Availability {
            &self.availability
        }

        async fn render(&self, _html: &str, _options: &RenderOptions) -> Result<Vec<u8>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Succeed(bytes) => Ok(bytes.clone()),
                Behavior::Fail(reason) => Err(BackendError::Generation(reason.clone())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(b"%PDF-late".to_vec())
                }
            }
        }
    }
}
