use super::*;
use crate::{
    pages::tests::{context_with_renders, context_with_site},
    shell::ShellDocument,
    test_support::StaticSite,
};
use shared::{domain::PageKey, protocol::RawProject};

fn project(title: &str, kind: &str, techs: &[&str], complexity: f64, impact: f64, year: i32) -> ProjectRecord {
    RawProject {
        title: Some(title.to_string()),
        kind: Some(kind.to_string()),
        technologies: Some(techs.iter().map(|t| t.to_string()).collect()),
        complexity: Some(complexity.into()),
        impact: Some(impact.into()),
        year: Some(year.into()),
        ..RawProject::default()
    }
    .normalize()
}

fn sample() -> ProjectCatalog {
    ProjectCatalog::new(vec![
        project("Ray Tracer", "Graphics", &["Rust", "WGPU"], 4.0, 2.0, 2022),
        project("Budget App", "Web", &["TypeScript", "React"], 2.0, 5.0, 2024),
        project("Audio Synth", "Audio", &["Rust"], 5.0, 3.0, 2021),
        project("Notes", "Web", &["Go"], 1.0, 1.0, 2023),
    ])
}

fn titles(catalog: &ProjectCatalog) -> Vec<&str> {
    catalog.filtered().into_iter().map(|p| p.title.as_str()).collect()
}

#[test]
fn default_sort_is_complexity_descending() {
    let catalog = sample();
    assert_eq!(
        titles(&catalog),
        vec!["Audio Synth", "Ray Tracer", "Budget App", "Notes"]
    );
}

#[test]
fn sort_keys_parse_leniently() {
    assert_eq!(SortKey::parse("Impact"), SortKey::Impact);
    assert_eq!(SortKey::parse("recent"), SortKey::Recent);
    assert_eq!(SortKey::parse("alphabetical"), SortKey::Alphabetical);
    assert_eq!(SortKey::parse("shuffle"), SortKey::Complexity);

    let mut catalog = sample();
    catalog.set_sort(SortKey::Recent);
    assert_eq!(titles(&catalog)[0], "Budget App");
    catalog.set_sort(SortKey::Alphabetical);
    assert_eq!(titles(&catalog), vec!["Audio Synth", "Budget App", "Notes", "Ray Tracer"]);
}

#[test]
fn query_matches_across_fields_case_insensitively() {
    let mut catalog = sample();
    catalog.set_query("  RUST ");
    assert_eq!(titles(&catalog), vec!["Audio Synth", "Ray Tracer"]);

    catalog.set_query("2024");
    assert_eq!(titles(&catalog), vec!["Budget App"]);
}

#[test]
fn technology_filter_matches_any_selected_and_combines_with_kind() {
    let mut catalog = sample();
    catalog.set_technology("Go", true);
    catalog.set_technology("react", true);
    assert_eq!(titles(&catalog), vec!["Budget App", "Notes"]);

    catalog.set_kind("web", true);
    catalog.set_min_complexity(2.0);
    assert_eq!(titles(&catalog), vec!["Budget App"]);
}

#[test]
fn chips_reflect_active_filters_and_can_be_removed() {
    let mut catalog = sample();
    assert!(catalog.chips().is_empty());

    catalog.set_technology("Rust", true);
    catalog.set_min_complexity(3.0);
    catalog.set_query("tracer");
    let chips = catalog.chips();
    let labels: Vec<String> = chips.iter().map(ToString::to_string).collect();
    assert_eq!(labels, vec!["rust", "Complexity 3+", "Search: \"tracer\""]);

    for chip in &chips {
        catalog.remove_chip(chip);
    }
    assert!(catalog.chips().is_empty());
    assert_eq!(catalog.filters(), &CatalogFilters::default());
}

#[test]
fn suggestions_are_capped_titles_containing_the_query() {
    let many: Vec<ProjectRecord> = (0..10)
        .map(|i| project(&format!("Widget {i}"), "Web", &[], 1.0, 1.0, 2020))
        .collect();
    let mut catalog = ProjectCatalog::new(many);
    assert!(catalog.suggestions().is_empty());

    catalog.set_query("widget");
    assert_eq!(catalog.suggestions().len(), MAX_SUGGESTIONS);
}

const PROJECTS_PAGE: &str = r#"<section data-page="projects"><div id="active-filters"></div><div id="search-suggestions"></div><div id="projects-grid"><p>Loading…</p></div></section>"#;

#[tokio::test]
async fn activation_renders_cards_and_rerenders_on_filter_changes() {
    let site = StaticSite::new().with(
        PROJECTS_DATA,
        r#"{"projects":[{"title":"Ray Tracer","type":"Graphics","technologies":["Rust"],"complexity":4},{"name":"Notes <v2>","tags":["Go"],"complexity":"2"}]}"#,
    );
    let (context, shell) = context_with_site(PageKey::Projects, PROJECTS_PAGE, site);
    let projects = ProjectsBehavior::new();

    projects.activate(&context).await.expect("activate");
    let viewport = shell.viewport().unwrap_or_default();
    assert_eq!(viewport.matches("class=\"project-card\"").count(), 2);
    assert!(viewport.contains("Notes &lt;v2&gt;"));
    assert!(!viewport.contains("Loading"));

    assert!(projects.update(|catalog| catalog.set_technology("go", true)));
    let viewport = shell.viewport().unwrap_or_default();
    assert_eq!(viewport.matches("class=\"project-card\"").count(), 1);
    assert!(viewport.contains("data-chip-kind=\"tech\""));
    assert_eq!(projects.catalog().len(), 2);
}

#[tokio::test]
async fn load_failure_shows_an_inline_error() {
    let site = StaticSite::new().failing(PROJECTS_DATA, 503);
    let (context, shell) = context_with_site(PageKey::Projects, PROJECTS_PAGE, site);
    let projects = ProjectsBehavior::new();

    let err = projects.activate(&context).await.expect_err("fetch fails");
    assert!(format!("{err}").contains("503"));
    assert!(shell
        .viewport()
        .unwrap_or_default()
        .contains("Failed to load projects."));
}

const MODAL_PAGE: &str = r#"<section data-page="projects"><div id="projects-grid"></div><div id="project-modal" class="modal" hidden><div class="modal-dialog"><button id="modal-close" type="button">Close</button><div id="modal-body"></div></div></div></section>"#;

const MODAL_DATA: &str = r#"[{"title":"Ray Tracer","type":"Graphics","status":"Complete","year":2023,"technologies":["Rust"],"complexity":5,"liveUrl":"https://rays.example.com","repoUrl":"javascript:alert(1)","details":{"challenge":"Noise <everywhere>","solution":"Importance sampling","features":["BVH","Denoiser"],"technologies":["Rust","WGPU"]}},{"title":"Notes","complexity":1}]"#;

#[tokio::test]
async fn details_modal_opens_with_project_details_and_closes() {
    let site = StaticSite::new().with(PROJECTS_DATA, MODAL_DATA);
    let (context, shell) = context_with_site(PageKey::Projects, MODAL_PAGE, site);
    let projects = ProjectsBehavior::new();
    projects.activate(&context).await.expect("activate");

    assert!(!projects.open_details(7));
    assert!(projects.open_details(0));
    assert_eq!(projects.open_project(), Some(0));
    let viewport = shell.viewport().unwrap_or_default();
    assert!(viewport.contains(r#"<div id="project-modal" class="modal is-open">"#));
    assert!(viewport.contains("<h4>Challenge</h4><p>Noise &lt;everywhere&gt;</p>"));
    assert!(viewport.contains("<li>BVH</li><li>Denoiser</li>"));
    assert!(viewport.contains(r#"href="https://rays.example.com""#));
    assert!(!viewport.contains("Repository"));

    assert!(!projects.handle_modal_click(Some("modal-body")));
    assert!(!projects.handle_modal_key("Enter"));
    assert!(projects.handle_modal_click(Some("project-modal")));
    assert_eq!(projects.open_project(), None);
    assert!(shell
        .viewport()
        .unwrap_or_default()
        .contains(r#"<div id="project-modal" class="modal" hidden>"#));

    assert!(projects.open_details(1));
    assert!(projects.handle_modal_key("Escape"));
    assert!(!projects.close_details());
}

#[tokio::test]
async fn details_modal_ignores_replaced_content() {
    let site = StaticSite::new().with(PROJECTS_DATA, MODAL_DATA);
    let (context, shell, renders) = context_with_renders(PageKey::Projects, MODAL_PAGE, site);
    let projects = ProjectsBehavior::new();
    projects.activate(&context).await.expect("activate");

    renders.inject(shell.as_ref(), PageKey::Projects, MODAL_PAGE);

    assert!(!projects.open_details(0));
    assert_eq!(projects.open_project(), None);
    assert_eq!(shell.viewport().as_deref(), Some(MODAL_PAGE));
}
