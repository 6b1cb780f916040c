//! Transformation dispatcher
//!
//! Fans a batch of [`GenerationUnit`]s out to a [`TextGenerator`] and joins on the
//! full set of outcomes.
//!
//! # Architecture
//! - Bounded worker pool: at most `max_concurrency` units in flight, via
//!   `futures::stream::buffer_unordered`
//! - One request per unit, no batching across units
//! - Per-unit timeout, started when the unit enters the pool
//! - Per-unit error isolation: a failing unit becomes a failed outcome, the rest of
//!   the batch carries on
//!
//! Outcome order follows completion, not submission; consumers re-key by id.

use crate::error::PipelineError;
use crate::types::{GenerationOutcome, GenerationUnit, TextGenerator, UnitFailure};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Dispatcher configuration
#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    /// Maximum in-flight requests per batch
    pub max_concurrency: usize,
    /// Timeout applied to each unit independently
    pub unit_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            unit_timeout: Duration::from_secs(180),
        }
    }
}

/// Concurrent fan-out over one generation backend
#[derive(Clone)]
pub struct Dispatcher {
    generator: Arc<dyn TextGenerator>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(generator: Arc<dyn TextGenerator>, config: DispatchConfig) -> Self {
        Self {
            generator,
            config: DispatchConfig {
                max_concurrency: config.max_concurrency.max(1),
                ..config
            },
        }
    }

    /// Dispatch a batch and wait for every unit
    ///
    /// # Returns
    /// One outcome per unit, in completion order
    ///
    /// # Errors
    /// `EmptyInput` when `units` is empty. Unit failures never fail the batch.
    pub async fn dispatch(
        &self,
        units: Vec<GenerationUnit>,
    ) -> Result<Vec<GenerationOutcome>, PipelineError> {
        if units.is_empty() {
            return Err(PipelineError::EmptyInput(
                "no generation units to dispatch".to_string(),
            ));
        }

        let batch_id = Uuid::new_v4();
        let total = units.len();
        let start = Instant::now();

        info!(
            batch_id = %batch_id,
            units = total,
            backend = self.generator.name(),
            max_concurrency = self.config.max_concurrency,
            "Dispatching generation batch"
        );

        let outcomes: Vec<GenerationOutcome> = stream::iter(units)
            .map(|unit| {
                let generator = Arc::clone(&self.generator);
                let unit_timeout = self.config.unit_timeout;
                async move { run_unit(generator.as_ref(), unit, unit_timeout, batch_id).await }
            })
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await;

        let failed = outcomes.iter().filter(|o| !o.succeeded).count();
        info!(
            batch_id = %batch_id,
            units = total,
            succeeded = total - failed,
            failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Generation batch complete"
        );

        Ok(outcomes)
    }
}

/// Run one unit under its own timeout, converting every failure to data
async fn run_unit(
    generator: &dyn TextGenerator,
    unit: GenerationUnit,
    unit_timeout: Duration,
    batch_id: Uuid,
) -> GenerationOutcome {
    let prompt = unit.directive.render(&unit.input);

    debug!(batch_id = %batch_id, unit = %unit.id, "Unit started");

    let result = match tokio::time::timeout(unit_timeout, generator.generate(&prompt)).await {
        Ok(result) => result,
        Err(_) => Err(UnitFailure::Timeout(unit_timeout)),
    };

    match result {
        Ok(output) => {
            debug!(batch_id = %batch_id, unit = %unit.id, chars = output.chars().count(), "Unit succeeded");
            GenerationOutcome::success(unit.id, output)
        }
        Err(failure) => {
            warn!(
                batch_id = %batch_id,
                unit = %unit.id,
                error = %failure,
                "Unit failed (non-fatal)"
            );
            GenerationOutcome::failure(unit.id, &failure)
        }
    }
}
