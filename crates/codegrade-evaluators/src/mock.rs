//! Scriptable evaluator for exercising the engine without real analysis.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use codegrade_core::{CodeArtifact, EvaluationError, Evaluator};

/// What a [`MockEvaluator`] does when invoked.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return this payload.
    Fixed(serde_json::Value),
    /// Fail with this error.
    Fail(EvaluationError),
    /// Panic with this message.
    Panic(String),
    /// Sleep, then return the payload.
    Delay(Duration, serde_json::Value),
}

pub struct MockEvaluator {
    behavior: MockBehavior,
    call_count: AtomicU32,
    last_input: Mutex<Option<String>>,
    cancelled: Option<Arc<AtomicBool>>,
}

impl MockEvaluator {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            call_count: AtomicU32::new(0),
            last_input: Mutex::new(None),
            cancelled: None,
        }
    }

    pub fn with_payload(payload: serde_json::Value) -> Self {
        Self::new(MockBehavior::Fixed(payload))
    }

    pub fn failing(error: EvaluationError) -> Self {
        Self::new(MockBehavior::Fail(error))
    }

    pub fn panicking(message: impl Into<String>) -> Self {
        Self::new(MockBehavior::Panic(message.into()))
    }

    pub fn delayed(delay: Duration, payload: serde_json::Value) -> Self {
        Self::new(MockBehavior::Delay(delay, payload))
    }

    /// Set `flag` if an invocation is dropped before it finishes.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(flag);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_input(&self) -> Option<String> {
        self.last_input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct CancelGuard {
    flag: Option<Arc<AtomicBool>>,
    finished: bool,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if !self.finished {
            if let Some(flag) = &self.flag {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }
}

#[async_trait]
impl Evaluator for MockEvaluator {
    fn kind(&self) -> &str {
        "mock"
    }

    async fn evaluate(&self, artifact: &CodeArtifact) -> Result<serde_json::Value, EvaluationError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_input.lock().unwrap_or_else(PoisonError::into_inner) = Some(artifact.as_str().to_string());

        let mut guard = CancelGuard {
            flag: self.cancelled.clone(),
            finished: false,
        };
        let result = match &self.behavior {
            MockBehavior::Fixed(payload) => Ok(payload.clone()),
            MockBehavior::Fail(error) => Err(error.clone()),
            MockBehavior::Panic(message) => {
                guard.finished = true;
                panic!("{message}")
            }
            MockBehavior::Delay(delay, payload) => {
                tokio::time::sleep(*delay).await;
                Ok(payload.clone())
            }
        };
        guard.finished = true;
        result
    }
}
