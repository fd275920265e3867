// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted model backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use parley_core::error::BackendError;
use parley_core::traits::ModelBackend;
use parley_core::types::{Completion, PromptContext, TokenUsage};

/// A backend that replays a scripted sequence of results, then falls back to
/// a canned success. Records every call for assertions.
pub struct MockBackend {
    name: String,
    /// `None` serves every model.
    models: Option<Vec<String>>,
    script: Mutex<VecDeque<Result<Completion, BackendError>>>,
    /// Sleep inserted before every reply, for tests that need an in-flight
    /// generation to race against.
    delay: Mutex<Option<std::time::Duration>>,
    calls: AtomicUsize,
    contexts: Mutex<Vec<PromptContext>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            models: None,
            script: Mutex::new(VecDeque::new()),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Restricts the backend to the given models.
    pub fn serving(mut self, models: &[&str]) -> Self {
        self.models = Some(models.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn completion(text: &str) -> Completion {
        Completion {
            text: text.to_string(),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 20,
            },
            stop_reason: Some("end_turn".to_string()),
            verdict: None,
        }
    }

    /// Queues a successful completion.
    pub fn push_ok(&self, text: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(Self::completion(text)));
    }

    /// Queues a failure.
    pub fn push_err(&self, error: BackendError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Queues `n` copies of the same failure.
    pub fn push_errs(&self, error: BackendError, n: usize) {
        for _ in 0..n {
            self.push_err(error.clone());
        }
    }

    /// Every subsequent call sleeps this long before replying.
    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every context the backend was called with, in order.
    pub fn contexts(&self) -> Vec<PromptContext> {
        self.contexts.lock().unwrap().clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, model: &str) -> bool {
        match &self.models {
            Some(models) => models.iter().any(|m| m == model),
            None => true,
        }
    }

    async fn complete(&self, ctx: PromptContext) -> Result<Completion, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(ctx);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::completion("mock reply")))
    }
}
