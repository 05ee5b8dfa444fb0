use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiException;

const DEFAULT_PROJECT_IMAGE: &str = "✨";
pub const MAX_CONTACT_FIELD_BYTES: usize = 4 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetails {
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
}

/// A project as it appears in `data/projects.json` before normalization.
/// Field synonyms (`name`, `summary`, `tags`) and loosely typed numbers are
/// accepted here and resolved by [`RawProject::normalize`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub technologies: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub complexity: Option<Value>,
    #[serde(default)]
    pub impact: Option<Value>,
    #[serde(default)]
    pub year: Option<Value>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub live_url: Option<String>,
    #[serde(default)]
    pub repo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub technologies: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub image: String,
    pub complexity: f64,
    pub impact: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub details: ProjectDetails,
    pub url: String,
    pub live_url: String,
    pub repo_url: String,
}

impl RawProject {
    pub fn normalize(self) -> ProjectRecord {
        let year = self
            .year
            .as_ref()
            .and_then(loose_number)
            .map(|year| year as i32)
            .or_else(|| self.published_at.as_deref().and_then(year_from_date));

        let details = match self.details {
            Some(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
            _ => ProjectDetails::default(),
        };

        ProjectRecord {
            id: self.id,
            title: non_empty(self.title)
                .or_else(|| non_empty(self.name))
                .unwrap_or_default(),
            description: non_empty(self.description)
                .or_else(|| non_empty(self.summary))
                .unwrap_or_default(),
            technologies: self.technologies.or(self.tags).unwrap_or_default(),
            kind: self.kind.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            image: non_empty(self.image).unwrap_or_else(|| DEFAULT_PROJECT_IMAGE.to_string()),
            complexity: self.complexity.as_ref().and_then(loose_number).unwrap_or(0.0),
            impact: self.impact.as_ref().and_then(loose_number).unwrap_or(0.0),
            year,
            details,
            url: safe_url(self.url.as_deref()),
            live_url: safe_url(self.live_url.as_deref()),
            repo_url: safe_url(self.repo_url.as_deref()),
        }
    }
}

impl ProjectRecord {
    /// Live demo link: `liveUrl` first, then the generic `url`.
    pub fn live_link(&self) -> Option<&str> {
        [&self.live_url, &self.url]
            .into_iter()
            .find(|url| !url.is_empty())
            .map(String::as_str)
    }

    pub fn repo_link(&self) -> Option<&str> {
        (!self.repo_url.is_empty()).then_some(self.repo_url.as_str())
    }
}

/// `data/projects.json` is either a bare array or `{ "projects": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProjectsDocument {
    List(Vec<RawProject>),
    Wrapped {
        #[serde(default)]
        projects: Vec<RawProject>,
    },
}

impl ProjectsDocument {
    pub fn into_records(self) -> Vec<ProjectRecord> {
        let raw = match self {
            ProjectsDocument::List(list) => list,
            ProjectsDocument::Wrapped { projects } => projects,
        };
        raw.into_iter().map(RawProject::normalize).collect()
    }

    pub fn len(&self) -> usize {
        match self {
            ProjectsDocument::List(list) => list.len(),
            ProjectsDocument::Wrapped { projects } => projects.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps only absolute http(s) links; anything else becomes empty.
pub fn safe_url(raw: Option<&str>) -> String {
    let value = raw.unwrap_or_default().trim();
    let lower = value.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        value.to_string()
    } else {
        String::new()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn loose_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn year_from_date(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.year());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.year())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactSubmission {
    pub fn validate(&self) -> Result<(), ApiException> {
        let fields = [
            ("name", &self.name),
            ("email", &self.email),
            ("message", &self.message),
        ];
        for (label, value) in fields {
            if value.trim().is_empty() {
                return Err(ApiException::validation(format!("{label} is required")));
            }
            if value.len() > MAX_CONTACT_FIELD_BYTES {
                return Err(ApiException::validation(format!(
                    "{label} exceeds {MAX_CONTACT_FIELD_BYTES} bytes"
                )));
            }
        }
        if !self.email.contains('@') {
            return Err(ApiException::validation("email must contain '@'"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactReceipt {
    pub submission_id: Uuid,
    pub received_at: DateTime<Utc>,
}
