use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKey {
    Home,
    Projects,
    Creative,
    About,
    Contact,
}

impl PageKey {
    pub const ALL: [PageKey; 5] = [
        PageKey::Home,
        PageKey::Projects,
        PageKey::Creative,
        PageKey::About,
        PageKey::Contact,
    ];

    pub const DEFAULT: PageKey = PageKey::Home;

    pub fn as_str(self) -> &'static str {
        match self {
            PageKey::Home => "home",
            PageKey::Projects => "projects",
            PageKey::Creative => "creative",
            PageKey::About => "about",
            PageKey::Contact => "contact",
        }
    }

    /// Fragment form used in the address bar, e.g. `#projects`.
    pub fn fragment(self) -> String {
        format!("#{}", self.as_str())
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown page key: {0:?}")]
pub struct UnknownPageKey(pub String);

impl FromStr for PageKey {
    type Err = UnknownPageKey;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        PageKey::ALL
            .into_iter()
            .find(|key| key.as_str() == trimmed)
            .ok_or_else(|| UnknownPageKey(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}
