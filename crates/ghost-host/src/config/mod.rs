//! Configuration types for the ghost host.

mod overrides;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

pub use overrides::OverrideConfig;

use crate::delay::{DelayConfig, DelaySimulator};
use crate::fixtures::{FixtureRecord, FixtureRepository, RouteKey};
use crate::resource::ResourceResolver;
use crate::rewrite::{FieldKind, FieldNames, FieldRewriter};

pub const DEFAULT_AIRLINE_CODE: &str = "MH";

fn default_airline_code() -> String {
    DEFAULT_AIRLINE_CODE.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GhostConfig {
    /// Airline identity for generated responses that do not carry one
    #[serde(default = "default_airline_code")]
    pub airline_code: String,

    #[serde(flatten)]
    pub delay: DelayConfig,

    /// Seed for the shared random source; entropy when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<u64>,

    /// Route catalog. Absent means no catalog at all, which is not an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_defined_routes: Option<HashMap<RouteKey, Vec<FixtureRecord>>>,

    #[serde(flatten)]
    pub overrides: OverrideConfig,

    /// Ordered search path for fixture resources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_roots: Vec<PathBuf>,

    /// Document names carrying each field kind, replacing the defaults per kind
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub field_names: HashMap<FieldKind, Vec<String>>,
}

impl Default for GhostConfig {
    fn default() -> Self {
        Self {
            airline_code: default_airline_code(),
            delay: DelayConfig::default(),
            random_seed: None,
            pre_defined_routes: None,
            overrides: OverrideConfig::default(),
            resource_roots: Vec::new(),
            field_names: HashMap::new(),
        }
    }
}

impl GhostConfig {
    /// Load and validate a YAML configuration file.
    ///
    /// Relative resource roots are taken relative to the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&contents)?;
        if let Some(base) = path.parent() {
            for root in &mut config.resource_roots {
                if root.is_relative() {
                    *root = base.join(&*root);
                }
            }
        }
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, anyhow::Error> {
        let config: GhostConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, anyhow::Error> {
        let config: GhostConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.airline_code.trim().is_empty() {
            anyhow::bail!("'airlineCode' must not be empty");
        }

        if let Some(routes) = &self.pre_defined_routes {
            for (route, fixtures) in routes {
                if route.as_str().is_empty() {
                    anyhow::bail!("Route keys in 'preDefinedRoutes' must not be empty");
                }
                for (index, fixture) in fixtures.iter().enumerate() {
                    if fixture.source().is_none() {
                        anyhow::bail!(
                            "Fixture {} on route '{}' must set exactly one of 'body' or 'resource'",
                            index,
                            route
                        );
                    }
                }
            }
        }

        for rule in self.overrides.rules().rules() {
            if rule.is_half_configured() {
                anyhow::bail!(
                    "Override for '{}' needs both '{}ChangeFrom' and '{}ChangeTo'",
                    rule.field,
                    rule.field,
                    rule.field
                );
            }
        }

        for (kind, names) in &self.field_names {
            if names.is_empty() || names.iter().any(|n| n.is_empty()) {
                anyhow::bail!("'fieldNames.{}' must list at least one non-empty name", kind);
            }
        }

        let delay = &self.delay;
        if delay.delay == 0 && delay.random_delay_max > 0 && !delay.is_random() {
            warn!(
                "randomDelayMin ({}) is not below randomDelayMax ({}), random delay disabled",
                delay.random_delay_min, delay.random_delay_max
            );
        }

        Ok(())
    }

    pub fn repository(&self) -> FixtureRepository {
        match &self.pre_defined_routes {
            Some(routes) => FixtureRepository::new(routes.clone()),
            None => FixtureRepository::unconfigured(),
        }
    }

    pub fn rewriter(&self) -> FieldRewriter {
        FieldRewriter::new(
            self.overrides.rules(),
            FieldNames::with_overrides(self.field_names.clone()),
        )
    }

    pub fn delay_simulator(&self) -> DelaySimulator {
        match self.random_seed {
            Some(seed) => DelaySimulator::with_seed(self.delay, seed),
            None => DelaySimulator::new(self.delay),
        }
    }

    pub fn resolver(&self) -> ResourceResolver {
        ResourceResolver::new(self.resource_roots.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PayloadFormat;
    use crate::fixtures::PayloadSource;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
airlineCode: BA
delay: 0
randomDelayMin: 100
randomDelayMax: 500
randomSeed: 7
resourceRoots:
  - /srv/fixtures
preDefinedRoutes:
  ATLMIA:
    - tag: morning
      resource: atlmia/morning.xml
    - tag: evening
      body: "<Flight><Origin>ATL</Origin></Flight>"
      format: xml
  LAXORD:
    - body: '{"flightNumber": "100"}'
originChangeFrom: JFK
originChangeTo: LGA
flightNumberChangeFrom: "100"
flightNumberChangeTo: "200"
fieldNames:
  origin: [DepartureAirport]
"#;

        let config = GhostConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.airline_code, "BA");
        assert_eq!(config.delay, DelayConfig::random(100, 500));
        assert_eq!(config.random_seed, Some(7));
        assert_eq!(config.resource_roots, vec![PathBuf::from("/srv/fixtures")]);

        let routes = config.pre_defined_routes.as_ref().unwrap();
        let atlmia = &routes[&RouteKey::from("ATLMIA")];
        assert_eq!(atlmia.len(), 2);
        assert_eq!(atlmia[0].tag.as_deref(), Some("morning"));
        assert_eq!(
            atlmia[0].source(),
            Some(PayloadSource::Resource("atlmia/morning.xml"))
        );
        assert_eq!(atlmia[1].format, Some(PayloadFormat::Xml));

        let rules = config.overrides.rules();
        assert_eq!(rules.active_count(), 2);
        assert_eq!(
            config.field_names[&FieldKind::Origin],
            vec!["DepartureAirport".to_string()]
        );
    }

    #[test]
    fn test_defaults() {
        let config = GhostConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.airline_code, DEFAULT_AIRLINE_CODE);
        assert_eq!(config.delay, DelayConfig::default());
        assert!(config.pre_defined_routes.is_none());
        assert!(!config.repository().is_configured());
        assert_eq!(config.overrides.rules().active_count(), 0);
    }

    #[test]
    fn test_parse_json_config() {
        let json = r#"{"delay": 50, "preDefinedRoutes": {"LAXORD": [{"body": "{}"}]}}"#;
        let config = GhostConfig::from_json_str(json).unwrap();
        assert_eq!(config.delay, DelayConfig::fixed(50));
        assert_eq!(config.repository().route_count(), 1);
    }

    #[test]
    fn test_unquoted_numeric_overrides() {
        let yaml = "flightNumberChangeFrom: 100\nflightNumberChangeTo: 200\nresourceRoots: [/srv/fixtures]\n";
        let config = GhostConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(
            config.overrides.rules().rule(FieldKind::FlightNumber).unwrap().substitution(),
            Some(("100", "200"))
        );
        assert_eq!(
            config.resolver().roots().to_vec(),
            vec![PathBuf::from("/srv/fixtures")]
        );

        let json = r#"{"flightNumberChangeFrom": 100, "flightNumberChangeTo": 200}"#;
        let config = GhostConfig::from_json_str(json).unwrap();
        assert_eq!(config.overrides.rules().active_count(), 1);
    }

    #[test]
    fn test_rejects_fixture_without_payload() {
        let yaml = r#"
preDefinedRoutes:
  ATLMIA:
    - tag: empty
"#;
        let err = GhostConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("exactly one of 'body' or 'resource'"));
    }

    #[test]
    fn test_rejects_fixture_with_both_payloads() {
        let yaml = r#"
preDefinedRoutes:
  ATLMIA:
    - body: "<a/>"
      resource: a.xml
"#;
        assert!(GhostConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_rejects_half_configured_override() {
        let err = GhostConfig::from_yaml_str("destinationChangeTo: SFO").unwrap_err();
        assert!(err.to_string().contains("destination"));
    }

    #[test]
    fn test_rejects_empty_field_names() {
        let err = GhostConfig::from_yaml_str("fieldNames:\n  origin: []").unwrap_err();
        assert!(err.to_string().contains("fieldNames.origin"));
    }

    #[test]
    fn test_inverted_random_range_is_accepted() {
        let config = GhostConfig::from_yaml_str("randomDelayMin: 500\nrandomDelayMax: 100").unwrap();
        assert!(!config.delay.is_random());
        assert_eq!(config.delay_simulator().compute_delay(), 0);
    }

    #[test]
    fn test_from_file_resolves_relative_roots() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ghost.yaml");
        std::fs::write(&path, "resourceRoots: [fixtures, /abs/fixtures]\n").unwrap();

        let config = GhostConfig::from_file(&path).unwrap();
        assert_eq!(
            config.resource_roots,
            vec![dir.path().join("fixtures"), PathBuf::from("/abs/fixtures")]
        );
    }
}
