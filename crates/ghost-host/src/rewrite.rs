//! Field overrides applied to every fixture served.
//!
//! Four field kinds can be rewritten independently. A rule only fires when a
//! field's whole current value equals its `from` value, so applying the same
//! rules twice changes nothing the second time.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::Document;

/// Semantic fields that override rules can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    OperatingAirline,
    Origin,
    Destination,
    FlightNumber,
}

impl FieldKind {
    pub const ALL: [FieldKind; 4] = [
        FieldKind::OperatingAirline,
        FieldKind::Origin,
        FieldKind::Destination,
        FieldKind::FlightNumber,
    ];

    /// Element, attribute and key names carrying this field unless configured otherwise.
    pub fn default_names(&self) -> &'static [&'static str] {
        match self {
            FieldKind::OperatingAirline => &["operatingAirline", "OperatingAirline"],
            FieldKind::Origin => &["origin", "Origin"],
            FieldKind::Destination => &["destination", "Destination"],
            FieldKind::FlightNumber => &["flightNumber", "FlightNumber"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::OperatingAirline => "operatingAirline",
            FieldKind::Origin => "origin",
            FieldKind::Destination => "destination",
            FieldKind::FlightNumber => "flightNumber",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps each field kind to the document names that carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNames(HashMap<FieldKind, Vec<String>>);

impl Default for FieldNames {
    fn default() -> Self {
        Self::with_overrides(HashMap::new())
    }
}

impl FieldNames {
    /// Defaults for every kind, replaced per kind by `overrides`.
    pub fn with_overrides(mut overrides: HashMap<FieldKind, Vec<String>>) -> Self {
        let names = FieldKind::ALL
            .iter()
            .map(|kind| {
                let names = overrides.remove(kind).unwrap_or_else(|| {
                    kind.default_names().iter().map(|s| s.to_string()).collect()
                });
                (*kind, names)
            })
            .collect();
        Self(names)
    }

    pub fn get(&self, kind: FieldKind) -> &[String] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }
}

/// A single from→to substitution for one field kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRule {
    pub field: FieldKind,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl OverrideRule {
    pub fn new(field: FieldKind, from: Option<String>, to: Option<String>) -> Self {
        Self { field, from, to }
    }

    /// The substitution, if the rule can fire at all.
    pub fn substitution(&self) -> Option<(&str, &str)> {
        match (&self.from, &self.to) {
            (Some(from), Some(to)) if from != to => Some((from, to)),
            _ => None,
        }
    }

    /// Exactly one side configured.
    pub fn is_half_configured(&self) -> bool {
        self.from.is_some() != self.to.is_some()
    }
}

/// The override rule set, one slot per field kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideRules {
    rules: Vec<OverrideRule>,
}

impl OverrideRules {
    pub fn new(rules: impl IntoIterator<Item = OverrideRule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    pub fn rules(&self) -> &[OverrideRule] {
        &self.rules
    }

    pub fn rule(&self, field: FieldKind) -> Option<&OverrideRule> {
        self.rules.iter().find(|r| r.field == field)
    }

    pub fn active_count(&self) -> usize {
        self.rules
            .iter()
            .filter(|r| r.substitution().is_some())
            .count()
    }
}

/// Applies override rules to loaded documents.
#[derive(Debug, Clone, Default)]
pub struct FieldRewriter {
    rules: OverrideRules,
    names: FieldNames,
}

impl FieldRewriter {
    pub fn new(rules: OverrideRules, names: FieldNames) -> Self {
        Self { rules, names }
    }

    pub fn rules(&self) -> &OverrideRules {
        &self.rules
    }

    /// Rewrite every matching field; returns how many values changed.
    pub fn apply(&self, document: &mut Document) -> usize {
        let mut total = 0;
        for rule in self.rules.rules() {
            let Some((from, to)) = rule.substitution() else {
                continue;
            };
            let changed = document.replace_field(self.names.get(rule.field), from, to);
            if changed > 0 {
                debug!("Rewrote {} {} field(s) {} -> {}", changed, rule.field, from, to);
            }
            total += changed;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PayloadFormat;

    fn rule(field: FieldKind, from: Option<&str>, to: Option<&str>) -> OverrideRule {
        OverrideRule::new(field, from.map(String::from), to.map(String::from))
    }

    fn rewriter(rules: Vec<OverrideRule>) -> FieldRewriter {
        FieldRewriter::new(OverrideRules::new(rules), FieldNames::default())
    }

    const FLIGHT: &str = "<Flight><OperatingAirline>MH</OperatingAirline><Origin>JFK</Origin><Destination>MIA</Destination><FlightNumber>100</FlightNumber></Flight>";

    fn values(doc: &Document, kind: FieldKind) -> Vec<String> {
        doc.field_values(FieldNames::default().get(kind))
    }

    #[test]
    fn test_origin_rewrite_is_idempotent() {
        let rewriter = rewriter(vec![rule(FieldKind::Origin, Some("JFK"), Some("LGA"))]);
        let mut doc = Document::parse(FLIGHT, PayloadFormat::Xml).unwrap();

        assert_eq!(rewriter.apply(&mut doc), 1);
        assert_eq!(values(&doc, FieldKind::Origin), vec!["LGA"]);

        assert_eq!(rewriter.apply(&mut doc), 0);
        assert_eq!(values(&doc, FieldKind::Origin), vec!["LGA"]);
    }

    #[test]
    fn test_fields_are_independent() {
        let rewriter = rewriter(vec![
            rule(FieldKind::OperatingAirline, Some("MH"), Some("BA")),
            rule(FieldKind::Destination, Some("ORD"), Some("SFO")),
            rule(FieldKind::FlightNumber, Some("100"), Some("200")),
        ]);
        let mut doc = Document::parse(FLIGHT, PayloadFormat::Xml).unwrap();

        assert_eq!(rewriter.apply(&mut doc), 2);
        assert_eq!(values(&doc, FieldKind::OperatingAirline), vec!["BA"]);
        assert_eq!(values(&doc, FieldKind::Origin), vec!["JFK"]);
        assert_eq!(values(&doc, FieldKind::Destination), vec!["MIA"]);
        assert_eq!(values(&doc, FieldKind::FlightNumber), vec!["200"]);
    }

    #[test]
    fn test_inert_rules_never_rewrite() {
        let inert = vec![
            rule(FieldKind::Origin, None, Some("LGA")),
            rule(FieldKind::Destination, None, None),
            rule(FieldKind::FlightNumber, Some("100"), None),
            rule(FieldKind::OperatingAirline, Some("MH"), Some("MH")),
        ];
        let rewriter = rewriter(inert);
        for input in [
            FLIGHT,
            "<Flight><Origin></Origin></Flight>",
            "<Flight><Origin>LGA</Origin></Flight>",
        ] {
            let mut doc = Document::parse(input, PayloadFormat::Xml).unwrap();
            let before = doc.to_text().unwrap();
            assert_eq!(rewriter.apply(&mut doc), 0);
            assert_eq!(doc.to_text().unwrap(), before);
        }
    }

    #[test]
    fn test_custom_field_names() {
        let mut overrides = HashMap::new();
        overrides.insert(FieldKind::Origin, vec!["DepartureAirport".to_string()]);
        let names = FieldNames::with_overrides(overrides);
        assert_eq!(names.get(FieldKind::Origin).to_vec(), vec!["DepartureAirport"]);
        assert_eq!(
            names.get(FieldKind::Destination).to_vec(),
            vec!["destination", "Destination"]
        );

        let rewriter = FieldRewriter::new(
            OverrideRules::new([rule(FieldKind::Origin, Some("JFK"), Some("LGA"))]),
            names,
        );
        let mut doc = Document::parse(
            r#"{"DepartureAirport":"JFK","origin":"JFK"}"#,
            PayloadFormat::Json,
        )
        .unwrap();
        assert_eq!(rewriter.apply(&mut doc), 1);
        assert_eq!(
            doc.to_text().unwrap(),
            r#"{"DepartureAirport":"LGA","origin":"JFK"}"#
        );
    }

    #[test]
    fn test_half_configured_detection() {
        assert!(rule(FieldKind::Origin, Some("JFK"), None).is_half_configured());
        assert!(rule(FieldKind::Origin, None, Some("LGA")).is_half_configured());
        assert!(!rule(FieldKind::Origin, None, None).is_half_configured());
        assert!(!rule(FieldKind::Origin, Some("JFK"), Some("LGA")).is_half_configured());
    }
}
