//! Shared fixtures: a scripted portal session backed by static HTML pages.
#![allow(dead_code)]

use async_trait::async_trait;
use rust_consulta_api::portal::page;
use rust_consulta_api::portal::selectors;
use rust_consulta_api::portal::session::{PortalSession, SessionError, SessionLauncher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const VALID_CPF: &str = "111.444.777-35";
pub const VALID_CNPJ: &str = "11.222.333/0001-81";

pub const SEARCH_PAGE: &str = r#"<html><body>
    <form method="post">
        <input type="text" id="cpfcnpj" name="cpfcnpj">
        <button type="submit" class="btn btn-primary">Pesquisar</button>
    </form>
</body></html>"#;

pub const NO_RECORDS_PAGE: &str = r#"<html><body>
    <div class="alert alert-warning" role="alert">Nenhum registro encontrado para os dados informados.</div>
</body></html>"#;

pub const RESULT_PAGE: &str = r#"<html><body>
    <div class="table-responsive"><table class="table">
        <thead><tr><th>Registro</th><th>Nome</th><th>Situação</th><th>Título</th></tr></thead>
        <tbody>
            <tr><td>MG0000123456D</td><td>MARIA DAS GRAÇAS SILVA</td><td>Ativo</td><td>Engenheira Civil</td></tr>
            <tr><td>MG0000999999D</td><td>OUTRO NOME</td><td>Inativo</td><td>Técnico</td></tr>
        </tbody>
    </table></div>
</body></html>"#;

pub const MAINTENANCE_PAGE: &str = r#"<html><body>
    <h1>Serviço temporariamente indisponível</h1>
</body></html>"#;

/// Counters shared by a launcher and every session it creates.
#[derive(Debug, Default)]
pub struct SessionStats {
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub typed: Mutex<Vec<String>>,
}

impl SessionStats {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Launches sessions that serve `search_page` on navigation and
/// `result_page` after the submit button is clicked.
pub struct FixtureLauncher {
    pub search_page: String,
    pub result_page: String,
    pub hang_on_goto: bool,
    pub stats: Arc<SessionStats>,
}

impl FixtureLauncher {
    pub fn new(result_page: &str) -> Self {
        Self {
            search_page: SEARCH_PAGE.to_string(),
            result_page: result_page.to_string(),
            hang_on_goto: false,
            stats: Arc::new(SessionStats::default()),
        }
    }

    pub fn with_search_page(mut self, search_page: &str) -> Self {
        self.search_page = search_page.to_string();
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang_on_goto = true;
        self
    }
}

#[async_trait]
impl SessionLauncher for FixtureLauncher {
    async fn launch(&self) -> Result<Box<dyn PortalSession>, SessionError> {
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FixtureSession {
            search_page: self.search_page.clone(),
            result_page: self.result_page.clone(),
            hang_on_goto: self.hang_on_goto,
            current: String::new(),
            stats: self.stats.clone(),
        }))
    }
}

pub struct FixtureSession {
    search_page: String,
    result_page: String,
    hang_on_goto: bool,
    current: String,
    stats: Arc<SessionStats>,
}

#[async_trait]
impl PortalSession for FixtureSession {
    async fn goto(&mut self, _url: &str) -> Result<(), SessionError> {
        if self.hang_on_goto {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.current = self.search_page.clone();
        Ok(())
    }

    async fn has_element(&mut self, selector: &str) -> Result<bool, SessionError> {
        Ok(page::contains(&self.current, selector))
    }

    async fn type_into(&mut self, selector: &str, text: &str) -> Result<(), SessionError> {
        if !page::contains(&self.current, selector) {
            return Err(SessionError::ElementNotFound(selector.to_string()));
        }
        self.stats.typed.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), SessionError> {
        if !page::contains(&self.current, selector) {
            return Err(SessionError::ElementNotFound(selector.to_string()));
        }
        if selector == selectors::SUBMIT_BUTTON {
            self.current = self.result_page.clone();
        }
        Ok(())
    }

    async fn html(&mut self) -> Result<String, SessionError> {
        Ok(self.current.clone())
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
