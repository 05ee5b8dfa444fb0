use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use axum::{http::StatusCode, Json};
use shared::error::{ApiError, ErrorCode};
use tracing::{debug, error};

pub const PROJECTS_FILE: &str = "projects.json";

/// Read-only view of the site tree: `pages/`, `components/` and `data/`.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Pages,
    Components,
    Data,
}

impl Section {
    fn dir(self) -> &'static str {
        match self {
            Section::Pages => "pages",
            Section::Components => "components",
            Section::Data => "data",
        }
    }
}

pub type ApiFailure = (StatusCode, Json<ApiError>);

fn not_found(what: &str) -> ApiFailure {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::not_found(what)),
    )
}

/// Fragment names are a single path segment ending in `.html`.
pub fn is_fragment_name(name: &str) -> bool {
    name.len() > ".html".len()
        && name.ends_with(".html")
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn fragment(&self, section: Section, name: &str) -> Result<String, ApiFailure> {
        if !is_fragment_name(name) {
            debug!(name, "rejected fragment name");
            return Err(not_found(name));
        }
        self.read(section, name).await
    }

    pub async fn projects(&self) -> Result<String, ApiFailure> {
        self.read(Section::Data, PROJECTS_FILE).await
    }

    async fn read(&self, section: Section, name: &str) -> Result<String, ApiFailure> {
        let path = self.root.join(section.dir()).join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(body),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(not_found(name)),
            Err(err) => {
                error!(path = %path.display(), error = %err, "failed to read content");
                Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiError::new(ErrorCode::Internal, "failed to read content")),
                ))
            }
        }
    }
}
