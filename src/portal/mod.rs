//! CREA-MG professional-registry lookup through a headless browser.
//!
//! The flow is a single function (`CreaScraper::lookup_professional`) that
//! drives one freshly launched session through the search form and classifies
//! the resulting page. Selector strings live in [`selectors`]; page reading is
//! the pure [`page::classify`].

pub mod chromium;
pub mod page;
pub mod selectors;
pub mod session;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

use crate::config::Config;
use crate::errors::UpstreamError;
use crate::models::{IdKind, ProfessionalRecord, TaxpayerId};
use page::PageState;
use session::{PortalSession, SessionGuard, SessionLauncher};

pub use chromium::ChromiumLauncher;
pub use session::SessionError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of a portal lookup that reached a recognizable page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    Found(ProfessionalRecord),
    NotFound,
}

/// Scrapes the professional registry portal.
#[derive(Clone)]
pub struct CreaScraper {
    launcher: Arc<dyn SessionLauncher>,
    search_url: String,
    budget: Duration,
    poll_interval: Duration,
}

impl CreaScraper {
    pub fn new(config: &Config) -> Self {
        Self::with_launcher(
            Arc::new(ChromiumLauncher::new(config)),
            config.crea_url.clone(),
            Duration::from_millis(config.scrape_timeout_ms),
        )
    }

    pub fn with_launcher(
        launcher: Arc<dyn SessionLauncher>,
        search_url: String,
        budget: Duration,
    ) -> Self {
        Self {
            launcher,
            search_url,
            budget,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Looks a CPF up on the portal.
    ///
    /// The whole flow, browser launch included, runs within the configured
    /// budget. The session is owned by a [`SessionGuard`], so it is closed on
    /// every path out, including when this future is dropped mid-flow.
    pub async fn lookup_professional(
        &self,
        cpf: &TaxpayerId,
    ) -> Result<ScrapeOutcome, UpstreamError> {
        if cpf.kind() != IdKind::Cpf {
            return Err(UpstreamError::UpstreamFailure(
                "portal lookup requires a CPF".to_string(),
            ));
        }

        let deadline = Instant::now() + self.budget;
        tracing::info!("[CREA] Consultando {}", cpf);

        let mut guard = match timeout_at(deadline, self.launcher.launch()).await {
            Ok(Ok(session)) => SessionGuard::new(session),
            Ok(Err(e)) => {
                tracing::error!("[CREA] Browser launch failed: {}", e);
                return Err(e.into());
            }
            Err(_) => {
                tracing::error!("[CREA] Browser launch exceeded {:?}", self.budget);
                return Err(UpstreamError::Timeout(format!(
                    "browser launch exceeded {}ms budget",
                    self.budget.as_millis()
                )));
            }
        };

        let result = match guard.session() {
            Ok(session) => match timeout_at(deadline, self.drive(session, cpf, deadline)).await {
                Ok(result) => result,
                Err(_) => Err(UpstreamError::Timeout(format!(
                    "portal lookup exceeded {}ms budget",
                    self.budget.as_millis()
                ))),
            },
            Err(e) => Err(e.into()),
        };

        guard.close().await;

        match &result {
            Ok(ScrapeOutcome::Found(_)) => {
                tracing::info!("[CREA] Profissional encontrado: {}", cpf)
            }
            Ok(ScrapeOutcome::NotFound) => tracing::info!("[CREA] Nenhum registro para {}", cpf),
            Err(UpstreamError::StructuralChange(reason)) => tracing::error!(
                target: "portal_structural_change",
                "[CREA] Portal markup no longer matches selectors ({}): {}",
                cpf,
                reason
            ),
            Err(e) => tracing::error!("[CREA] Lookup failed for {}: {}", cpf, e),
        }

        result
    }

    /// Runs steps 2-8 of the flow on an open session.
    async fn drive(
        &self,
        session: &mut dyn PortalSession,
        cpf: &TaxpayerId,
        deadline: Instant,
    ) -> Result<ScrapeOutcome, UpstreamError> {
        // Leave room to read the page once a wait lapses.
        let wait_deadline = deadline - (self.budget / 10).min(Duration::from_secs(2));

        session.goto(&self.search_url).await?;

        if self
            .wait_for_any(session, &[selectors::CPF_INPUT], wait_deadline)
            .await?
            .is_none()
        {
            return Err(UpstreamError::StructuralChange(format!(
                "search input '{}' not found",
                selectors::CPF_INPUT
            )));
        }
        session
            .type_into(selectors::CPF_INPUT, &cpf.formatted())
            .await?;

        if self
            .wait_for_any(session, &[selectors::SUBMIT_BUTTON], wait_deadline)
            .await?
            .is_none()
        {
            return Err(UpstreamError::StructuralChange(format!(
                "submit control '{}' not found",
                selectors::SUBMIT_BUTTON
            )));
        }
        session.click(selectors::SUBMIT_BUTTON).await?;

        // Results and "no records" arrive through the same navigation; only
        // the marker that shows up tells them apart.
        match self
            .wait_for_any(session, &selectors::RESULT_MARKERS, wait_deadline)
            .await?
        {
            Some(marker) => tracing::debug!("[CREA] Result marker '{}' appeared", marker),
            None => tracing::warn!("[CREA] No result marker appeared, reading page as-is"),
        }

        let html = session.html().await?;
        match page::classify(&html) {
            PageState::NoRecords => Ok(ScrapeOutcome::NotFound),
            PageState::Record(record) => Ok(ScrapeOutcome::Found(record)),
            PageState::Unrecognized(reason) => Err(UpstreamError::StructuralChange(reason)),
        }
    }

    /// Polls until one of `candidates` exists, returning it, or `None` once
    /// `until` passes.
    async fn wait_for_any<'s>(
        &self,
        session: &mut dyn PortalSession,
        candidates: &[&'s str],
        until: Instant,
    ) -> Result<Option<&'s str>, UpstreamError> {
        loop {
            for selector in candidates {
                if session.has_element(selector).await? {
                    return Ok(Some(*selector));
                }
            }
            if Instant::now() >= until {
                return Ok(None);
            }
            tokio::time::sleep_until((Instant::now() + self.poll_interval).min(until)).await;
        }
    }
}
