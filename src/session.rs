//! Per-user session: owns the model (through the resolver), the sandbox and
//! the one command waiting to be executed.
//!
//! One request at a time. The busy flag is taken with a compare-and-swap, so
//! a `Session` shared between tasks still never runs two resolutions or two
//! dispatches at once; the loser gets `FiletalkError::Busy`.

use crate::command::Command;
use crate::error::{FiletalkError, Result};
use crate::intent::{IntentResolver, Resolution};
use crate::normalize::normalize;
use crate::sandbox::Sandbox;
use crate::tools::dispatch;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of interpreting one utterance.
#[derive(Clone, Debug)]
pub struct Interpretation {
    pub command: Command,
    /// The fixed fallback was used because the model never answered in JSON.
    pub fell_back: bool,
    pub attempts: usize,
}

pub struct Session {
    resolver: IntentResolver,
    sandbox: Sandbox,
    pending: Mutex<Option<Command>>,
    busy: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

/// Releases the busy flag on drop.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Session {
    pub fn new(resolver: IntentResolver, sandbox: Sandbox) -> Self {
        Self {
            resolver,
            sandbox,
            pending: Mutex::new(None),
            busy: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// The command waiting for `execute`, if any.
    pub fn pending(&self) -> Option<Command> {
        self.pending.lock().ok().and_then(|slot| slot.clone())
    }

    /// Drops the pending command without running it.
    pub fn discard(&self) -> Option<Command> {
        self.pending.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Aborts the model call in flight, if any.
    pub fn cancel(&self) {
        if let Ok(token) = self.cancel.lock() {
            token.cancel();
        }
    }

    /// Resolves and normalizes `utterance`, storing the result as the pending
    /// command. Nothing is executed. Fails with `Cancelled` if `cancel` fires
    /// first, leaving no pending command.
    pub async fn interpret(&self, utterance: &str) -> Result<Interpretation> {
        let _guard = self.acquire()?;
        self.interpret_locked(utterance).await
    }

    /// Runs the pending command and clears the slot.
    pub async fn execute(&self) -> Result<String> {
        let _guard = self.acquire()?;
        self.execute_locked().await
    }

    /// Interpret then execute, holding the busy flag across both steps.
    pub async fn run(&self, utterance: &str) -> Result<(Interpretation, String)> {
        let _guard = self.acquire()?;
        let interpretation = self.interpret_locked(utterance).await?;
        let output = self.execute_locked().await?;
        Ok((interpretation, output))
    }

    fn acquire(&self) -> Result<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| FiletalkError::Busy)?;
        Ok(BusyGuard(&self.busy))
    }

    async fn interpret_locked(&self, utterance: &str) -> Result<Interpretation> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(FiletalkError::EmptyUtterance);
        }

        // 요청마다 새 토큰
        let token = CancellationToken::new();
        if let Ok(mut slot) = self.cancel.lock() {
            *slot = token.clone();
        }

        let Resolution {
            candidate,
            attempts,
            fell_back,
            cancelled,
        } = self.resolver.resolve(utterance, &token).await;
        if cancelled {
            // 취소된 요청은 아무것도 남기지 않음
            info!(attempts, "request cancelled");
            self.discard();
            return Err(FiletalkError::Cancelled);
        }
        if fell_back {
            warn!(attempts, "using fallback command");
        }

        let command = normalize(&candidate, &self.sandbox);
        info!(tool = %command.kind(), mutates = command.mutates(), "interpreted request");

        if let Ok(mut slot) = self.pending.lock() {
            *slot = Some(command.clone());
        }

        Ok(Interpretation {
            command,
            fell_back,
            attempts,
        })
    }

    async fn execute_locked(&self) -> Result<String> {
        let command = self
            .pending
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or(FiletalkError::NoPendingCommand)?;

        let sandbox = self.sandbox.clone();
        let output = tokio::task::spawn_blocking(move || dispatch(&command, &sandbox))
            .await
            .unwrap_or_else(|e| format!("Execution failed: {}", e));
        Ok(output)
    }
}
