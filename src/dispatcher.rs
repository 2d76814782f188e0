use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::errors::{LookupError, UpstreamError};
use crate::models::{LookupResult, LookupSource, RawPayload, TaxpayerId};
use crate::normalizer;
use crate::portal::{CreaScraper, ScrapeOutcome};
use crate::rate_limiter::{Admission, RateLimiter};
use crate::services::{PersonApiService, RegistryApiService};

/// One upstream backend, reachable through a single fetch call.
///
/// Implementations only see identifiers of their source's accepted kind; the
/// dispatcher rejects everything else before calling them.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> LookupSource;

    /// Fetches the raw record. "No such record" is `UpstreamError::NotFound`.
    async fn fetch(&self, id: &TaxpayerId) -> Result<RawPayload, UpstreamError>;
}

#[async_trait]
impl SourceAdapter for RegistryApiService {
    fn source(&self) -> LookupSource {
        LookupSource::RegistryApi
    }

    async fn fetch(&self, id: &TaxpayerId) -> Result<RawPayload, UpstreamError> {
        self.lookup_company(id).await.map(RawPayload::Company)
    }
}

#[async_trait]
impl SourceAdapter for PersonApiService {
    fn source(&self) -> LookupSource {
        LookupSource::ThirdPartyApi
    }

    async fn fetch(&self, id: &TaxpayerId) -> Result<RawPayload, UpstreamError> {
        self.lookup_person(id).await.map(RawPayload::Person)
    }
}

#[async_trait]
impl SourceAdapter for CreaScraper {
    fn source(&self) -> LookupSource {
        LookupSource::PortalScrape
    }

    async fn fetch(&self, id: &TaxpayerId) -> Result<RawPayload, UpstreamError> {
        match self.lookup_professional(id).await? {
            ScrapeOutcome::Found(record) => Ok(RawPayload::Professional(record)),
            ScrapeOutcome::NotFound => Err(UpstreamError::not_found(
                "Profissional não encontrado no CREA-MG.",
            )),
        }
    }
}

/// Runs one lookup end to end: validate, admit, route, fetch, normalize.
#[derive(Clone)]
pub struct SourceDispatcher {
    rate_limiter: Arc<RateLimiter>,
    adapters: HashMap<LookupSource, Arc<dyn SourceAdapter>>,
}

impl SourceDispatcher {
    /// Wires the three production backends from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let registry = RegistryApiService::new(config).context("registry API client")?;
        let person = PersonApiService::new(config).context("person API client")?;
        let scraper = CreaScraper::new(config);

        let adapters: Vec<Arc<dyn SourceAdapter>> =
            vec![Arc::new(registry), Arc::new(person), Arc::new(scraper)];

        Ok(Self::new(
            Arc::new(RateLimiter::new(
                config.rate_limit_max_requests,
                config.rate_limit_window_secs,
            )),
            adapters,
        ))
    }

    /// Builds a dispatcher over the given adapters. A later adapter for the
    /// same source replaces an earlier one.
    pub fn new(rate_limiter: Arc<RateLimiter>, adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.source(), adapter))
            .collect();
        Self {
            rate_limiter,
            adapters,
        }
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Looks `raw_id` up on `source` on behalf of `caller_key`.
    ///
    /// An identifier that fails validation, or whose kind the source does not
    /// accept, is rejected before the rate limiter and never reaches an
    /// adapter.
    pub async fn dispatch(
        &self,
        source: LookupSource,
        raw_id: &str,
        caller_key: &str,
    ) -> Result<LookupResult, LookupError> {
        let kind = source.accepted_kind();
        let Some(id) = TaxpayerId::parse(raw_id, kind) else {
            tracing::warn!("[{}] Rejected invalid {} input", source, kind.label());
            return Err(LookupError::Invalid { kind });
        };

        if let Admission::Denied { retry_after_secs } = self.rate_limiter.try_acquire(caller_key) {
            tracing::debug!(
                "[{}] Caller {} rate limited for {}s",
                source,
                caller_key,
                retry_after_secs
            );
            return Err(LookupError::RateLimited { retry_after_secs });
        }

        let adapter = self.adapters.get(&source).ok_or_else(|| {
            tracing::error!("[{}] No adapter configured", source);
            LookupError::Upstream(UpstreamError::UpstreamFailure(format!(
                "no adapter configured for {}",
                source
            )))
        })?;

        tracing::info!("[{}] Looking up {}", source, id);
        match adapter.fetch(&id).await {
            Ok(raw) => {
                let result = normalizer::normalize(&id, &raw);
                tracing::info!("[{}] Found {}", source, id);
                Ok(result)
            }
            Err(UpstreamError::NotFound { message, code }) => {
                tracing::info!("[{}] No record for {}", source, id);
                Err(LookupError::NotFound { message, code })
            }
            Err(e) => {
                match &e {
                    UpstreamError::StructuralChange(_) => tracing::error!(
                        target: "portal_structural_change",
                        "[{}] Lookup of {} failed: {}",
                        source,
                        id,
                        e
                    ),
                    _ => tracing::error!("[{}] Lookup of {} failed: {}", source, id, e),
                }
                Err(LookupError::Upstream(e))
            }
        }
    }
}
