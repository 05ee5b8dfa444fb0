use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::format_count;
use crate::{
    behavior::{ActivationGuard, PageBehavior, PageContext},
    lock,
    markup::{self, Tag},
};

/// Home page: metric counters and the typed subtitle.
#[derive(Default)]
pub struct HomeBehavior {
    guard: ActivationGuard,
    initializations: AtomicUsize,
    metrics: Mutex<Vec<f64>>,
}

impl HomeBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> Vec<f64> {
        lock(&self.metrics).clone()
    }
}

fn metric_target(tag: &Tag) -> Option<f64> {
    tag.attr("data-metric")
        .map(|raw| raw.trim().parse::<f64>().unwrap_or(0.0))
        .filter(|value| value.is_finite())
}

fn typed_text(tag: &Tag) -> Option<String> {
    tag.attr("data-typing")
        .or_else(|| tag.attr("data-typing-text"))
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}

#[async_trait]
impl PageBehavior for HomeBehavior {
    async fn activate(&self, context: &PageContext) -> Result<()> {
        if !self.guard.begin(context.generation) {
            return Ok(());
        }
        self.initializations.fetch_add(1, Ordering::AcqRel);

        let mut metrics = Vec::new();
        context.update_viewport(|html| {
            let (rewritten, changed) = markup::rewrite_text(html, |tag| {
                if let Some(target) = metric_target(tag) {
                    metrics.push(target);
                    return Some(format_count(target));
                }
                typed_text(tag)
            });
            (changed > 0).then_some(rewritten)
        });
        debug!(generation = context.generation, metrics = metrics.len(), "home initialized");
        *lock(&self.metrics) = metrics;
        Ok(())
    }
}
