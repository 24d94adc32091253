//! Pre-recorded route fixtures and their lookup.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::PayloadFormat;

/// Departure and arrival codes concatenated, e.g. `ATLMIA`.
///
/// Keys are compared exactly: no case folding and no reversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RouteKey(String);

impl RouteKey {
    pub fn new(departure: &str, arrival: &str) -> Self {
        Self(format!("{departure}{arrival}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RouteKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for RouteKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One canned response recorded for a route.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureRecord {
    /// Selector metadata for choosing among fixtures on the same route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Inline payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Symbolic resource name, loaded on each call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Payload format; detected from the payload when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<PayloadFormat>,
}

/// Where a fixture's payload comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource<'a> {
    Inline(&'a str),
    Resource(&'a str),
}

impl FixtureRecord {
    pub fn inline(body: impl Into<String>) -> Self {
        Self {
            tag: None,
            body: Some(body.into()),
            resource: None,
            format: None,
        }
    }

    pub fn from_resource(name: impl Into<String>) -> Self {
        Self {
            tag: None,
            body: None,
            resource: Some(name.into()),
            format: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_format(mut self, format: PayloadFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// `None` when the record carries neither or both payload kinds.
    pub fn source(&self) -> Option<PayloadSource<'_>> {
        match (&self.body, &self.resource) {
            (Some(body), None) => Some(PayloadSource::Inline(body)),
            (None, Some(name)) => Some(PayloadSource::Resource(name)),
            _ => None,
        }
    }

    /// Format of a loaded payload for this fixture.
    pub fn format_for(&self, payload: &str) -> PayloadFormat {
        self.format.unwrap_or_else(|| PayloadFormat::detect(payload))
    }
}

/// Chooses one fixture among those recorded for a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureSelector {
    Index(usize),
    Tag(String),
}

impl FixtureSelector {
    /// Returns the position and record selected from `fixtures`.
    pub fn pick<'a>(&self, fixtures: &'a [FixtureRecord]) -> Option<(usize, &'a FixtureRecord)> {
        match self {
            FixtureSelector::Index(index) => fixtures.get(*index).map(|f| (*index, f)),
            FixtureSelector::Tag(tag) => fixtures
                .iter()
                .enumerate()
                .find(|(_, f)| f.tag.as_deref() == Some(tag.as_str())),
        }
    }
}

impl fmt::Display for FixtureSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureSelector::Index(index) => write!(f, "index {index}"),
            FixtureSelector::Tag(tag) => write!(f, "tag {tag}"),
        }
    }
}

/// Route catalog, fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct FixtureRepository {
    routes: Option<HashMap<RouteKey, Vec<FixtureRecord>>>,
}

impl FixtureRepository {
    /// A repository with no catalog configured.
    pub fn unconfigured() -> Self {
        Self { routes: None }
    }

    pub fn new(routes: HashMap<RouteKey, Vec<FixtureRecord>>) -> Self {
        Self {
            routes: Some(routes),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.routes.is_some()
    }

    /// Fixtures recorded for `route` in configuration order; empty when none.
    pub fn lookup(&self, route: &RouteKey) -> &[FixtureRecord] {
        let Some(routes) = &self.routes else {
            debug!("No route catalog configured, no fixtures for {}", route);
            return &[];
        };
        match routes.get(route) {
            Some(fixtures) => fixtures,
            None => {
                debug!("No fixtures configured for route {}", route);
                &[]
            }
        }
    }

    pub fn route_count(&self) -> usize {
        self.routes.as_ref().map_or(0, HashMap::len)
    }

    pub fn routes(&self) -> impl Iterator<Item = (&RouteKey, &[FixtureRecord])> {
        self.routes
            .iter()
            .flat_map(|routes| routes.iter().map(|(k, v)| (k, v.as_slice())))
    }
}
