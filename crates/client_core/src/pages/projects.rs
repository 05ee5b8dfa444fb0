use std::{
    cmp::Ordering as CmpOrdering,
    collections::BTreeSet,
    fmt,
    sync::Mutex,
};

use anyhow::Result;
use async_trait::async_trait;
use shared::protocol::{ProjectRecord, ProjectsDocument};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    behavior::{ActivationGuard, PageBehavior, PageContext},
    fetcher::{FetchError, ResourceFetcher},
    lock,
    markup::{self, escape_html},
};

pub const PROJECTS_DATA: &str = "data/projects.json";
pub const MAX_SUGGESTIONS: usize = 6;
const DEFAULT_MIN_COMPLEXITY: f64 = 1.0;

const GRID_ID: &str = "projects-grid";
const CHIPS_ID: &str = "active-filters";
const SUGGESTIONS_ID: &str = "search-suggestions";
pub const MODAL_ID: &str = "project-modal";
pub const MODAL_BODY_ID: &str = "modal-body";
pub const MODAL_CLOSE_ID: &str = "modal-close";
const MODAL_OPEN_CLASS: &str = "is-open";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("malformed project data: {0}")]
    Parse(#[from] serde_json::Error),
}

pub async fn fetch_projects(fetcher: &dyn ResourceFetcher) -> Result<Vec<ProjectRecord>, CatalogError> {
    let body = fetcher.fetch_text(PROJECTS_DATA).await?;
    let document: ProjectsDocument = serde_json::from_str(&body)?;
    Ok(document.into_records())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Complexity,
    Impact,
    Recent,
    Alphabetical,
}

impl SortKey {
    /// Unrecognized values sort by complexity.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "impact" => SortKey::Impact,
            "recent" => SortKey::Recent,
            "alphabetical" => SortKey::Alphabetical,
            _ => SortKey::Complexity,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Complexity => "complexity",
            SortKey::Impact => "impact",
            SortKey::Recent => "recent",
            SortKey::Alphabetical => "alphabetical",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Chip {
    Technology(String),
    Kind(String),
    Complexity(f64),
    Query(String),
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chip::Technology(value) | Chip::Kind(value) => f.write_str(value),
            Chip::Complexity(min) => write!(f, "Complexity {min}+"),
            Chip::Query(query) => write!(f, "Search: \"{}\"", query.trim()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogFilters {
    pub query: String,
    pub technologies: BTreeSet<String>,
    pub kinds: BTreeSet<String>,
    pub min_complexity: f64,
    pub sort: SortKey,
}

impl Default for CatalogFilters {
    fn default() -> Self {
        Self {
            query: String::new(),
            technologies: BTreeSet::new(),
            kinds: BTreeSet::new(),
            min_complexity: DEFAULT_MIN_COMPLEXITY,
            sort: SortKey::default(),
        }
    }
}

/// Searchable, filterable view over the normalized project list.
#[derive(Debug, Clone, Default)]
pub struct ProjectCatalog {
    projects: Vec<ProjectRecord>,
    filters: CatalogFilters,
}

fn normalized(value: &str) -> String {
    value.trim().to_lowercase()
}

impl ProjectCatalog {
    pub fn new(projects: Vec<ProjectRecord>) -> Self {
        Self {
            projects,
            filters: CatalogFilters::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn filters(&self) -> &CatalogFilters {
        &self.filters
    }

    pub fn set_query(&mut self, query: &str) {
        self.filters.query = query.to_string();
    }

    pub fn set_technology(&mut self, technology: &str, selected: bool) {
        toggle(&mut self.filters.technologies, technology, selected);
    }

    pub fn set_kind(&mut self, kind: &str, selected: bool) {
        toggle(&mut self.filters.kinds, kind, selected);
    }

    pub fn set_min_complexity(&mut self, min: f64) {
        self.filters.min_complexity = if min.is_finite() { min } else { DEFAULT_MIN_COMPLEXITY };
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.filters.sort = sort;
    }

    pub fn reset(&mut self) {
        self.filters = CatalogFilters::default();
    }

    pub fn remove_chip(&mut self, chip: &Chip) {
        match chip {
            Chip::Technology(value) => self.set_technology(value, false),
            Chip::Kind(value) => self.set_kind(value, false),
            Chip::Complexity(_) => self.filters.min_complexity = DEFAULT_MIN_COMPLEXITY,
            Chip::Query(_) => self.filters.query.clear(),
        }
    }

    pub fn filtered(&self) -> Vec<&ProjectRecord> {
        let mut matching: Vec<&ProjectRecord> = self
            .projects
            .iter()
            .filter(|project| self.matches(project))
            .collect();
        match self.filters.sort {
            SortKey::Complexity => matching.sort_by(|a, b| descending(a.complexity, b.complexity)),
            SortKey::Impact => matching.sort_by(|a, b| descending(a.impact, b.impact)),
            SortKey::Recent => {
                matching.sort_by(|a, b| b.year.unwrap_or_default().cmp(&a.year.unwrap_or_default()))
            }
            SortKey::Alphabetical => {
                matching.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
            }
        }
        matching
    }

    /// Titles containing the current query, capped at [`MAX_SUGGESTIONS`].
    pub fn suggestions(&self) -> Vec<&str> {
        let query = normalized(&self.filters.query);
        if query.is_empty() {
            return Vec::new();
        }
        self.projects
            .iter()
            .map(|project| project.title.as_str())
            .filter(|title| !title.is_empty() && title.to_lowercase().contains(&query))
            .take(MAX_SUGGESTIONS)
            .collect()
    }

    pub fn chips(&self) -> Vec<Chip> {
        let mut chips: Vec<Chip> = self
            .filters
            .technologies
            .iter()
            .cloned()
            .map(Chip::Technology)
            .collect();
        chips.extend(self.filters.kinds.iter().cloned().map(Chip::Kind));
        if self.filters.min_complexity > DEFAULT_MIN_COMPLEXITY {
            chips.push(Chip::Complexity(self.filters.min_complexity));
        }
        if !self.filters.query.trim().is_empty() {
            chips.push(Chip::Query(self.filters.query.clone()));
        }
        chips
    }

    fn matches(&self, project: &ProjectRecord) -> bool {
        let query = normalized(&self.filters.query);
        if !query.is_empty() && !search_blob(project).contains(&query) {
            return false;
        }

        if !self.filters.technologies.is_empty() {
            let has_any = project
                .technologies
                .iter()
                .map(|tech| normalized(tech))
                .any(|tech| self.filters.technologies.contains(&tech));
            if !has_any {
                return false;
            }
        }

        if !self.filters.kinds.is_empty() && !self.filters.kinds.contains(&normalized(&project.kind)) {
            return false;
        }

        project.complexity >= self.filters.min_complexity
    }
}

fn toggle(set: &mut BTreeSet<String>, value: &str, selected: bool) {
    let value = normalized(value);
    if value.is_empty() {
        return;
    }
    if selected {
        set.insert(value);
    } else {
        set.remove(&value);
    }
}

fn descending(a: f64, b: f64) -> CmpOrdering {
    b.partial_cmp(&a).unwrap_or(CmpOrdering::Equal)
}

fn search_blob(project: &ProjectRecord) -> String {
    let year = project.year.map(|y| y.to_string()).unwrap_or_default();
    let mut parts = vec![
        project.title.as_str(),
        project.description.as_str(),
        project.kind.as_str(),
        project.status.as_str(),
        year.as_str(),
    ];
    parts.extend(project.technologies.iter().map(String::as_str));
    parts.extend([
        project.url.as_str(),
        project.live_url.as_str(),
        project.repo_url.as_str(),
    ]);
    parts.join(" ").to_lowercase()
}

pub fn render_card(index: usize, project: &ProjectRecord) -> String {
    let title = if project.title.is_empty() {
        format!("Project {}", index + 1)
    } else {
        project.title.clone()
    };
    let mut pills = String::new();
    for (class, value) in [
        ("pill--type", project.kind.clone()),
        ("pill--status", project.status.clone()),
        ("pill--year", project.year.map(|y| y.to_string()).unwrap_or_default()),
    ] {
        if !value.is_empty() {
            pills.push_str(&format!("<span class=\"pill {class}\">{}</span>", escape_html(&value)));
        }
    }
    let tags: String = project
        .technologies
        .iter()
        .map(|tech| format!("<span>{}</span>", escape_html(&normalized(tech))))
        .collect();

    let mut card = format!(
        "<article class=\"project-card\" data-project-open=\"{index}\"><div class=\"project-emoji\">{}</div><h3>{}</h3><div class=\"project-mini-meta\">{pills}</div>",
        escape_html(&project.image),
        escape_html(&title),
    );
    if !project.description.is_empty() {
        card.push_str(&format!("<p>{}</p>", escape_html(&project.description)));
    }
    if !tags.is_empty() {
        card.push_str(&format!("<div class=\"project-tags\">{tags}</div>"));
    }
    card.push_str("</article>");
    card
}

/// Modal body for one project: header pills, description, link buttons,
/// technologies and the optional challenge/solution/stack/features blocks.
pub fn render_details(project: &ProjectRecord) -> String {
    let title = if project.title.is_empty() {
        "Project"
    } else {
        project.title.as_str()
    };
    let mut pills = String::new();
    for (class, value) in [
        ("pill--type", project.kind.clone()),
        ("pill--status", project.status.clone()),
        ("pill--year", project.year.map(|y| y.to_string()).unwrap_or_default()),
    ] {
        if !value.is_empty() {
            pills.push_str(&format!("<span class=\"pill {class}\">{}</span>", escape_html(&value)));
        }
    }

    let mut body = format!(
        "<div class=\"project-modal-header\"><div class=\"project-emoji\">{}</div><div><h3>{}</h3><div class=\"project-modal-meta\">{pills}</div></div></div>",
        escape_html(&project.image),
        escape_html(title),
    );
    if !project.description.is_empty() {
        body.push_str(&format!("<p>{}</p>", escape_html(&project.description)));
    }

    let live = project.live_link();
    let repo = project.repo_link();
    if live.is_some() || repo.is_some() {
        body.push_str("<div class=\"project-links\">");
        if let Some(url) = live {
            body.push_str(&format!(
                "<a class=\"btn btn--primary\" href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">Live Demo</a>",
                escape_html(url)
            ));
        }
        if let Some(url) = repo {
            body.push_str(&format!(
                "<a class=\"btn btn--secondary\" href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">Repository</a>",
                escape_html(url)
            ));
        }
        body.push_str("</div>");
    }
    if !project.technologies.is_empty() {
        body.push_str(&format!(
            "<p><strong>Technologies:</strong> {}</p>",
            escape_html(&project.technologies.join(", "))
        ));
    }

    let details = &project.details;
    let block = |heading: &str, inner: String| {
        format!("<div class=\"project-detail-block\"><h4>{heading}</h4>{inner}</div>")
    };
    if let Some(challenge) = details.challenge.as_deref().filter(|v| !v.is_empty()) {
        body.push_str(&block("Challenge", format!("<p>{}</p>", escape_html(challenge))));
    }
    if let Some(solution) = details.solution.as_deref().filter(|v| !v.is_empty()) {
        body.push_str(&block("Solution", format!("<p>{}</p>", escape_html(solution))));
    }
    if !details.technologies.is_empty() {
        body.push_str(&block(
            "Stack",
            format!("<p>{}</p>", escape_html(&details.technologies.join(", "))),
        ));
    }
    if !details.features.is_empty() {
        let items: String = details
            .features
            .iter()
            .map(|feature| format!("<li>{}</li>", escape_html(feature)))
            .collect();
        body.push_str(&block("Key Features", format!("<ul>{items}</ul>")));
    }
    body
}

/// Shows or hides `#project-modal`. `None` when the page has no modal.
pub fn set_modal_open(html: &str, open: bool) -> Option<String> {
    let (rewritten, count) = markup::rewrite_tags(html, |tag| {
        if tag.attr("id") != Some(MODAL_ID) {
            return false;
        }
        tag.toggle_class(MODAL_OPEN_CLASS, open);
        if open {
            tag.remove_attr("hidden");
        } else {
            tag.set_attr("hidden", "");
        }
        true
    });
    (count > 0).then_some(rewritten)
}

fn render_chip(chip: &Chip) -> String {
    let (kind, value) = match chip {
        Chip::Technology(value) => ("tech", value.clone()),
        Chip::Kind(value) => ("type", value.clone()),
        Chip::Complexity(min) => ("complexity", min.to_string()),
        Chip::Query(query) => ("query", query.clone()),
    };
    let label = escape_html(&chip.to_string());
    format!(
        "<button class=\"filter-chip\" type=\"button\" data-chip-kind=\"{kind}\" data-chip-value=\"{}\">{label}</button>",
        escape_html(&value),
    )
}

/// Projects page: loads the catalog on every fresh render and keeps the
/// grid, chips and suggestions in sync with the filters.
pub struct ProjectsBehavior {
    guard: ActivationGuard,
    catalog: Mutex<ProjectCatalog>,
    context: Mutex<Option<PageContext>>,
    open_card: Mutex<Option<usize>>,
}

impl Default for ProjectsBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectsBehavior {
    pub fn new() -> Self {
        Self {
            guard: ActivationGuard::default(),
            catalog: Mutex::new(ProjectCatalog::default()),
            context: Mutex::new(None),
            open_card: Mutex::new(None),
        }
    }

    /// Card index (within the filtered list) whose details are showing.
    pub fn open_project(&self) -> Option<usize> {
        *lock(&self.open_card)
    }

    /// Fills the modal with the details of the `index`-th visible card and
    /// opens it. Returns `false` for an unknown card, a page without a modal
    /// or content that has since been replaced.
    pub fn open_details(&self, index: usize) -> bool {
        let Some(body) = lock(&self.catalog)
            .filtered()
            .get(index)
            .map(|project| render_details(project))
        else {
            debug!(index, "no project card at index");
            return false;
        };
        let Some(context) = lock(&self.context).clone() else {
            return false;
        };
        let opened = context.update_viewport(|html| {
            let filled = markup::set_inner_html(html, MODAL_BODY_ID, &body)?;
            set_modal_open(&filled, true)
        });
        if opened {
            *lock(&self.open_card) = Some(index);
        }
        opened
    }

    pub fn close_details(&self) -> bool {
        if lock(&self.open_card).take().is_none() {
            return false;
        }
        let Some(context) = lock(&self.context).clone() else {
            return false;
        };
        context.update_viewport(|html| set_modal_open(html, false))
    }

    /// Escape closes the modal; other keys are ignored.
    pub fn handle_modal_key(&self, key: &str) -> bool {
        key == "Escape" && self.close_details()
    }

    /// Clicks on the close button or on the backdrop (the modal element
    /// itself) close the modal. Clicks inside the dialog do not.
    pub fn handle_modal_click(&self, target_id: Option<&str>) -> bool {
        matches!(target_id, Some(MODAL_ID | MODAL_CLOSE_ID)) && self.close_details()
    }

    pub fn catalog(&self) -> ProjectCatalog {
        lock(&self.catalog).clone()
    }

    /// Applies a filter change and re-renders the page if it is still shown.
    pub fn update<F>(&self, change: F) -> bool
    where
        F: FnOnce(&mut ProjectCatalog),
    {
        let catalog = {
            let mut catalog = lock(&self.catalog);
            change(&mut catalog);
            catalog.clone()
        };
        let context = lock(&self.context).clone();
        match context {
            Some(context) => render_catalog(&context, &catalog),
            None => false,
        }
    }
}

fn render_catalog(context: &PageContext, catalog: &ProjectCatalog) -> bool {
    let cards: String = catalog
        .filtered()
        .into_iter()
        .enumerate()
        .map(|(index, project)| render_card(index, project))
        .collect();
    let chips: String = catalog.chips().iter().map(render_chip).collect();
    let suggestions: String = catalog
        .suggestions()
        .into_iter()
        .map(|title| {
            let title = escape_html(title);
            format!("<div class=\"suggestion\" data-suggest=\"{title}\">{title}</div>")
        })
        .collect();

    context.update_viewport(|html| {
        let mut html = html.to_string();
        for (id, inner) in [(GRID_ID, &cards), (CHIPS_ID, &chips), (SUGGESTIONS_ID, &suggestions)] {
            if let Some(updated) = markup::set_inner_html(&html, id, inner) {
                html = updated;
            }
        }
        Some(html)
    })
}

#[async_trait]
impl PageBehavior for ProjectsBehavior {
    async fn activate(&self, context: &PageContext) -> Result<()> {
        if !self.guard.begin(context.generation) {
            return Ok(());
        }
        *lock(&self.context) = Some(context.clone());
        *lock(&self.open_card) = None;

        match fetch_projects(context.fetcher.as_ref()).await {
            Ok(projects) => {
                debug!(count = projects.len(), "projects loaded");
                let catalog = {
                    let mut catalog = lock(&self.catalog);
                    *catalog = ProjectCatalog::new(projects);
                    catalog.clone()
                };
                render_catalog(context, &catalog);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "failed to load project data");
                context.update_viewport(|html| {
                    markup::set_inner_html(
                        html,
                        GRID_ID,
                        "<p class=\"projects-error\">Failed to load projects.</p>",
                    )
                });
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/projects_tests.rs"]
mod tests;
