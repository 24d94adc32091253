//! The ghost service: fixture selection, loading, rewriting and delay per call.
//!
//! Each call moves through the same steps: select a fixture for the route, load
//! its payload when it lives in a resource, rewrite the configured fields,
//! simulate the configured delay, then return. A resolution failure ends the
//! call with an error; nothing is retried here.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GhostConfig;
use crate::delay::{DelayOutcome, DelaySimulator};
use crate::document::{Document, PayloadFormat};
use crate::error::{GhostError, GhostResult, ResourceError};
use crate::fixtures::{FixtureRecord, FixtureRepository, FixtureSelector, PayloadSource, RouteKey};
use crate::resource::ResourceResolver;
use crate::rewrite::FieldRewriter;

/// A fixture as delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedFixture {
    pub route: RouteKey,
    /// Position of the fixture within its route
    pub index: usize,
    pub tag: Option<String>,
    pub format: PayloadFormat,
    pub payload: String,
    /// Number of field values rewritten by override rules
    pub rewrites: usize,
    pub delay: DelayOutcome,
}

/// Stand-in for a real backend, built once from configuration.
///
/// Safe to share across tasks; all state except the delay random source is
/// read-only after construction.
#[derive(Debug)]
pub struct GhostService {
    airline_code: String,
    repository: FixtureRepository,
    rewriter: FieldRewriter,
    delay: DelaySimulator,
    resolver: Arc<ResourceResolver>,
}

impl GhostService {
    pub fn new(config: GhostConfig) -> Result<Self, anyhow::Error> {
        config.validate()?;
        let service = Self::from_parts(
            config.airline_code.clone(),
            config.repository(),
            config.rewriter(),
            config.delay_simulator(),
            config.resolver(),
        );
        info!(
            "Ghost service ready: {} route(s), {} active override(s), delay {:?}",
            service.repository.route_count(),
            service.rewriter.rules().active_count(),
            service.delay.config()
        );
        Ok(service)
    }

    pub fn from_parts(
        airline_code: String,
        repository: FixtureRepository,
        rewriter: FieldRewriter,
        delay: DelaySimulator,
        resolver: ResourceResolver,
    ) -> Self {
        Self {
            airline_code,
            repository,
            rewriter,
            delay,
            resolver: Arc::new(resolver),
        }
    }

    pub fn airline_code(&self) -> &str {
        &self.airline_code
    }

    pub fn repository(&self) -> &FixtureRepository {
        &self.repository
    }

    pub fn delay_simulator(&self) -> &DelaySimulator {
        &self.delay
    }

    /// Fixtures configured for a route; empty when none.
    pub fn predefined_routes(&self, route: &RouteKey) -> &[FixtureRecord] {
        self.repository.lookup(route)
    }

    /// Resolve and read a resource as line-concatenated text.
    pub async fn load_text(&self, name: &str) -> GhostResult<String> {
        let resolver = Arc::clone(&self.resolver);
        let name = name.to_string();
        let text = tokio::task::spawn_blocking(move || resolver.load_text(&name))
            .await
            .map_err(|e| GhostError::LoaderPanicked(e.to_string()))??;
        Ok(text)
    }

    /// Resolve, read and parse a resource. The format is detected when not given.
    pub async fn load_document(
        &self,
        name: &str,
        format: Option<PayloadFormat>,
    ) -> GhostResult<Document> {
        let text = self.load_text(name).await?;
        let format = format.unwrap_or_else(|| PayloadFormat::detect(&text));
        Document::parse(&text, format)
    }

    /// Serve the selected fixture for `route`.
    ///
    /// `Ok(None)` means no data is available for the route or selector; the
    /// caller decides how to fall back.
    pub async fn serve(
        &self,
        route: &RouteKey,
        selector: Option<&FixtureSelector>,
    ) -> GhostResult<Option<ServedFixture>> {
        self.serve_with_cancel(route, selector, &CancellationToken::new())
            .await
    }

    /// Like [`serve`](Self::serve), but the simulated delay ends early when
    /// `cancel` fires. The rewritten payload is still returned in that case.
    pub async fn serve_with_cancel(
        &self,
        route: &RouteKey,
        selector: Option<&FixtureSelector>,
        cancel: &CancellationToken,
    ) -> GhostResult<Option<ServedFixture>> {
        let fixtures = self.repository.lookup(route);
        if fixtures.is_empty() {
            warn!("No fixtures available for route {}", route);
            return Ok(None);
        }

        let picked = match selector {
            Some(selector) => selector.pick(fixtures),
            None => fixtures.first().map(|fixture| (0, fixture)),
        };
        let Some((index, fixture)) = picked else {
            if let Some(selector) = selector {
                warn!("No fixture on route {} matches {}", route, selector);
            }
            return Ok(None);
        };
        debug!("Selected fixture {} for route {}", index, route);

        let raw = match fixture.source() {
            Some(PayloadSource::Inline(body)) => body.to_string(),
            Some(PayloadSource::Resource(name)) => self.load_text(name).await?,
            None => {
                return Err(ResourceError::Malformed(format!(
                    "fixture {index} on route {route} has no single payload"
                ))
                .into())
            }
        };

        let format = fixture.format_for(&raw);
        let (payload, rewrites) = self.rewrite_payload(raw, format)?;
        let delay = self.delay.simulate(cancel).await;

        Ok(Some(ServedFixture {
            route: route.clone(),
            index,
            tag: fixture.tag.clone(),
            format,
            payload,
            rewrites,
            delay,
        }))
    }

    /// Apply override rules. Payloads nothing was rewritten in are returned as loaded.
    fn rewrite_payload(&self, raw: String, format: PayloadFormat) -> GhostResult<(String, usize)> {
        if format == PayloadFormat::Text {
            return Ok((raw, 0));
        }
        let mut document = Document::parse(&raw, format)?;
        let rewrites = self.rewriter.apply(&mut document);
        if rewrites == 0 {
            return Ok((raw, 0));
        }
        Ok((document.to_text()?, rewrites))
    }
}
