//! Chromium-backed portal sessions using chromiumoxide.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::session::{PortalSession, SessionError, SessionLauncher};
use crate::config::Config;

/// Launches one headless Chromium per session.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    headless: bool,
    executable: Option<PathBuf>,
    request_timeout: Duration,
}

impl ChromiumLauncher {
    pub fn new(config: &Config) -> Self {
        Self {
            headless: config.browser_headless,
            executable: config.chrome_executable.as_ref().map(PathBuf::from),
            request_timeout: Duration::from_millis(config.scrape_timeout_ms),
        }
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn PortalSession>, SessionError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--ignore-certificate-errors")
            .request_timeout(self.request_timeout);
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(SessionError::Launch)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        // Spawn browser handler
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Chromium handler event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(SessionError::Launch(format!("failed to open page: {}", e)));
            }
        };

        tracing::debug!("Chromium session launched");
        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
        }))
    }
}

/// One Chromium process with a single page.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl PortalSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<(), SessionError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| SessionError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn has_element(&mut self, selector: &str) -> Result<bool, SessionError> {
        // chromiumoxide reports a missing node as an error; mid-navigation
        // lookups fail the same way and are retried by the caller's poll.
        Ok(self.page.find_element(selector).await.is_ok())
    }

    async fn type_into(&mut self, selector: &str, text: &str) -> Result<(), SessionError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| SessionError::ElementNotFound(format!("{}: {}", selector, e)))?;
        element
            .click()
            .await
            .map_err(|e| SessionError::Interaction(format!("focus {}: {}", selector, e)))?;
        element
            .type_str(text)
            .await
            .map_err(|e| SessionError::Interaction(format!("type into {}: {}", selector, e)))?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), SessionError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| SessionError::ElementNotFound(format!("{}: {}", selector, e)))?;
        element
            .click()
            .await
            .map_err(|e| SessionError::Interaction(format!("click {}: {}", selector, e)))?;
        Ok(())
    }

    async fn html(&mut self) -> Result<String, SessionError> {
        self.page
            .content()
            .await
            .map_err(|e| SessionError::Interaction(format!("read page content: {}", e)))
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        let ChromiumSession {
            mut browser,
            page,
            handler_task,
        } = *self;

        if let Err(e) = page.close().await {
            tracing::debug!("Closing page failed: {}", e);
        }
        let closed = browser.close().await;
        let _ = browser.wait().await;
        handler_task.abort();

        closed
            .map(|_| ())
            .map_err(|e| SessionError::Interaction(format!("close browser: {}", e)))
    }
}
