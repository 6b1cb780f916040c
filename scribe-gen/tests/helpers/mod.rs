//! Shared test doubles for scribe-gen integration tests
//!
//! Backends are scripted by trigger text: the first rule whose trigger occurs in
//! the rendered system or user prompt decides the reply.

#![allow(dead_code)]

use async_trait::async_trait;
use scribe_gen::pipeline::directives::DirectiveTable;
use scribe_gen::pipeline::dispatcher::DispatchConfig;
use scribe_gen::pipeline::placeholders::PlaceholderResolver;
use scribe_gen::pipeline::{Pipeline, PipelineConfig};
use scribe_gen::types::{MediaLookup, RenderedPrompt, TextGenerator, UnitFailure};
use scribe_gen::{build_router, AppState};
use scribe_common::FailurePolicy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a scripted backend does when a trigger matches
#[derive(Debug, Clone)]
pub enum Behavior {
    Reply(String),
    Status(u16, &'static str),
    Hang,
}

/// Scripted text generator
///
/// Without a matching rule it answers `改写：<user prompt>`.
#[derive(Default)]
pub struct ScriptedBackend {
    rules: Vec<(&'static str, Behavior)>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<RenderedPrompt>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, trigger: &'static str, behavior: Behavior) -> Self {
        self.rules.push((trigger, behavior));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<RenderedPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, prompt: &RenderedPrompt) -> Result<String, UnitFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());

        let rule = self
            .rules
            .iter()
            .find(|(trigger, _)| prompt.system.contains(trigger) || prompt.user.contains(trigger));

        match rule.map(|(_, behavior)| behavior.clone()) {
            Some(Behavior::Reply(text)) => Ok(text),
            Some(Behavior::Status(status, message)) => Err(UnitFailure::from_status(status, message)),
            Some(Behavior::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok("too late".to_string())
            }
            None => Ok(format!("改写：{}", prompt.user)),
        }
    }
}

/// Media lookup backed by a fixed keyword map
#[derive(Default)]
pub struct FixedMedia {
    urls: HashMap<String, String>,
}

impl FixedMedia {
    pub fn with(mut self, keyword: &str, url: &str) -> Self {
        self.urls.insert(keyword.to_string(), url.to_string());
        self
    }
}

#[async_trait]
impl MediaLookup for FixedMedia {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn lookup(&self, keyword: &str) -> Option<String> {
        self.urls.get(keyword).cloned()
    }
}

/// Pipeline settings with a short unit timeout
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        dispatch: DispatchConfig {
            max_concurrency: 4,
            unit_timeout: Duration::from_millis(200),
        },
        min_block_chars: 5,
        default_policy: FailurePolicy::Retain,
    }
}

/// Pipeline over the bundled directives; one backend serves every flow
pub fn test_pipeline(backend: Arc<ScriptedBackend>, media: FixedMedia) -> Pipeline {
    let directives = DirectiveTable::bundled().expect("bundled directives must load");
    let placeholders = PlaceholderResolver::new(Arc::new(media), Duration::from_millis(200), 4);
    Pipeline::new(
        Arc::new(directives),
        backend.clone(),
        backend,
        placeholders,
        test_config(),
    )
}

/// In-process router plus its state
pub fn test_app(backend: Arc<ScriptedBackend>, media: FixedMedia) -> (axum::Router, AppState) {
    let state = AppState::new(Arc::new(test_pipeline(backend, media)));
    (build_router(state.clone()), state)
}
