//! Latest-wins resolution for keystroke-driven callers.
//!
//! Each `submit` supersedes the previous one: its token is cancelled and
//! its result, if it still arrives, is discarded. An optional debounce
//! delays the work so bursts of input collapse into one trailing request.

use super::resolver::LocationResolver;
use super::types::Resolution;
use crate::config::Config;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Single best coordinate (`resolve_input`).
    Resolve,
    /// Candidate list (`suggest`).
    Suggest,
}

struct Inner {
    generation: AtomicU64,
    current: Mutex<Option<CancellationToken>>,
    latest: Mutex<Option<(String, Resolution)>>,
}

#[derive(Clone)]
pub struct ResolutionSession {
    resolver: Arc<LocationResolver>,
    mode: SessionMode,
    debounce: Duration,
    inner: Arc<Inner>,
}

impl ResolutionSession {
    pub fn new(resolver: Arc<LocationResolver>, mode: SessionMode) -> Self {
        Self {
            resolver,
            mode,
            debounce: Duration::ZERO,
            inner: Arc::new(Inner {
                generation: AtomicU64::new(0),
                current: Mutex::new(None),
                latest: Mutex::new(None),
            }),
        }
    }

    /// Suggest sessions debounce by `suggest_debounce`; resolve sessions run at once.
    pub fn from_config(resolver: Arc<LocationResolver>, mode: SessionMode, config: &Config) -> Self {
        let debounce = match mode {
            SessionMode::Resolve => Duration::ZERO,
            SessionMode::Suggest => config.suggest_debounce,
        };
        Self::new(resolver, mode).with_debounce(debounce)
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Run a resolution for `input`, superseding any in-flight one.
    ///
    /// Returns `None` when this call was itself superseded before it
    /// finished; only the newest submission ever reaches `latest()`.
    pub async fn submit(&self, input: &str) -> Option<Resolution> {
        let token = CancellationToken::new();
        let generation = {
            let mut current = self.inner.current.lock().ok()?;
            if let Some(previous) = current.replace(token.clone()) {
                previous.cancel();
            }
            self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        if !self.debounce.is_zero() {
            tokio::select! {
                _ = token.cancelled() => return None,
                _ = tokio::time::sleep(self.debounce) => {}
            }
        }

        let result = match self.mode {
            SessionMode::Resolve => self.resolver.resolve_input(input, &token).await,
            SessionMode::Suggest => self.resolver.suggest(input, &token).await,
        };
        let resolution = result.ok()?;

        // Publish under the lock that `submit` takes, so a newer call cannot
        // slip in between the generation check and the write.
        let current = self.inner.current.lock().ok()?;
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(input, "dropping superseded resolution");
            return None;
        }
        if let Ok(mut latest) = self.inner.latest.lock() {
            *latest = Some((input.to_string(), resolution.clone()));
        }
        drop(current);
        Some(resolution)
    }

    /// Abandon whatever is in flight.
    pub fn cancel(&self) {
        if let Ok(mut current) = self.inner.current.lock() {
            if let Some(token) = current.take() {
                token.cancel();
            }
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// The input and result of the newest completed submission.
    pub fn latest(&self) -> Option<(String, Resolution)> {
        self.inner.latest.lock().ok()?.clone()
    }
}
