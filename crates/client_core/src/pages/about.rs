use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use super::{format_count, projects::fetch_projects};
use crate::{
    behavior::{ActivationGuard, PageBehavior, PageContext},
    lock,
    markup::{self, Tag},
};

fn is_counter(tag: &Tag) -> bool {
    (tag.has_class("stat-number") && tag.attr("data-target").is_some())
        || tag.attr("data-count-to").is_some()
}

fn counter_target(tag: &Tag) -> Option<f64> {
    let raw = tag.attr("data-count-to").or_else(|| tag.attr("data-target"))?;
    let raw = raw.trim();
    let value = if raw.is_empty() { 0.0 } else { raw.parse::<f64>().ok()? };
    value.is_finite().then_some(value)
}

fn percent(raw: Option<&str>) -> f64 {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 100.0)
}

fn is_projects_built_label(text: &str) -> bool {
    text.split_whitespace()
        .collect::<String>()
        .to_lowercase()
        .contains("projectsbuilt")
}

/// Points the "Projects Built" stat at `count`. Returns `None` when the page
/// has no such stat.
pub fn set_projects_built(html: &str, count: usize) -> Option<String> {
    let tags = markup::start_tags(html);
    let label = tags.iter().position(|tag| {
        tag.has_class("stat-label") && is_projects_built_label(markup::leaf_text(html, tag))
    })?;
    let card_start = tags[..label]
        .iter()
        .rposition(|tag| tag.has_class("stat-card"))
        .unwrap_or(0);
    let card_end = tags[label..]
        .iter()
        .position(|tag| tag.has_class("stat-card"))
        .map(|offset| label + offset)
        .unwrap_or(tags.len());
    let number = (card_start..card_end).find(|&index| tags[index].has_class("stat-number"))?;
    let span = tags[number].span;

    let (rewritten, changed) = markup::rewrite_tags(html, |tag| {
        if tag.span != span {
            return false;
        }
        tag.set_attr("data-target", &count.to_string());
        true
    });
    (changed > 0).then_some(rewritten)
}

/// Sets every counter's text to its target value.
pub fn settle_counters(html: &str) -> (String, Vec<f64>) {
    let mut targets = Vec::new();
    let (rewritten, _) = markup::rewrite_text(html, |tag| {
        if !is_counter(tag) {
            return None;
        }
        let target = counter_target(tag)?;
        targets.push(target);
        Some(format_count(target))
    });
    (rewritten, targets)
}

/// Fills progress bars, tech levels and balance scales to their clamped
/// percentages.
pub fn fill_progress(html: &str) -> String {
    let mut pending: Option<f64> = None;
    let (rewritten, _) = markup::rewrite_tags(html, |tag| {
        let width = if tag.attr("data-progress").is_some() {
            pending = Some(percent(tag.attr("data-progress")));
            return false;
        } else if tag.has_class("progress-bar") {
            match pending.take() {
                Some(width) => width,
                None => return false,
            }
        } else if tag.has_class("tech-progress") && tag.attr("data-level").is_some() {
            percent(tag.attr("data-level"))
        } else if tag.has_class("scale-fill") && tag.attr("data-percent").is_some() {
            percent(tag.attr("data-percent"))
        } else {
            return false;
        };
        tag.set_attr("style", &format!("width: {width}%"));
        true
    });
    rewritten
}

fn journey_panels(tags: &[Tag]) -> Vec<String> {
    tags.iter()
        .filter(|tag| tag.has_class("timeline-expand"))
        .filter_map(|tag| tag.attr("data-target").map(str::to_string))
        .filter(|id| !id.is_empty())
        .collect()
}

/// Collapses every journey panel named by a `.timeline-expand` button.
pub fn collapse_journey(html: &str) -> String {
    let panels = journey_panels(&markup::start_tags(html));
    let (rewritten, _) = markup::rewrite_tags(html, |tag| {
        let is_panel = tag.attr("id").is_some_and(|id| panels.iter().any(|p| p == id));
        if is_panel {
            tag.set_attr("hidden", "");
        }
        is_panel
    });
    rewritten
}

/// Opens the journey panel `id` and closes the others. Toggling an open
/// panel closes it.
pub fn toggle_journey(html: &str, id: &str) -> Option<String> {
    let tags = markup::start_tags(html);
    let button = tags
        .iter()
        .find(|tag| tag.has_class("timeline-expand") && tag.attr("data-target") == Some(id))?;
    let open = !button.has_class("active");
    let panels = journey_panels(&tags);

    let (rewritten, _) = markup::rewrite_tags(html, |tag| {
        if tag.has_class("timeline-expand") {
            let Some(target) = tag.attr("data-target").map(str::to_string) else {
                return false;
            };
            tag.toggle_class("active", open && target == id);
            return true;
        }
        let Some(panel) = tag.attr("id").map(str::to_string) else {
            return false;
        };
        if !panels.contains(&panel) {
            return false;
        }
        if open && panel == id {
            tag.remove_attr("hidden");
        } else {
            tag.set_attr("hidden", "");
        }
        true
    });
    Some(rewritten)
}

/// About page: stat counters, progress bars and the journey timeline.
#[derive(Default)]
pub struct AboutBehavior {
    guard: ActivationGuard,
    initializations: AtomicUsize,
    counters: Mutex<Vec<f64>>,
    context: Mutex<Option<PageContext>>,
}

impl AboutBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::Acquire)
    }

    pub fn counters(&self) -> Vec<f64> {
        lock(&self.counters).clone()
    }

    pub fn toggle_journey(&self, id: &str) -> bool {
        let Some(context) = lock(&self.context).clone() else {
            return false;
        };
        context.update_viewport(|html| toggle_journey(html, id))
    }
}

#[async_trait]
impl PageBehavior for AboutBehavior {
    async fn activate(&self, context: &PageContext) -> Result<()> {
        if !self.guard.begin(context.generation) {
            return Ok(());
        }
        self.initializations.fetch_add(1, Ordering::AcqRel);
        *lock(&self.context) = Some(context.clone());

        // A failed count keeps the number already in the markup.
        let project_count = match fetch_projects(context.fetcher.as_ref()).await {
            Ok(projects) => Some(projects.len()),
            Err(err) => {
                warn!(error = %err, "project count unavailable");
                None
            }
        };

        let mut counters = Vec::new();
        context.update_viewport(|html| {
            let mut html = html.to_string();
            if let Some(count) = project_count {
                if let Some(updated) = set_projects_built(&html, count) {
                    html = updated;
                }
            }
            let (settled, targets) = settle_counters(&html);
            counters = targets;
            Some(collapse_journey(&fill_progress(&settled)))
        });
        debug!(generation = context.generation, counters = counters.len(), "about initialized");
        *lock(&self.counters) = counters;
        Ok(())
    }
}
