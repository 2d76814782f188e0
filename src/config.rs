use serde::Deserialize;

const DEFAULT_PERSON_API_URL: &str = "https://apicpf.com/api/consulta";
const DEFAULT_CNPJ_API_URL: &str = "https://receitaws.com.br/v1/cnpj";
const DEFAULT_CREA_URL: &str = "https://crea-mg.sitac.com.br/?servico=profissionais-cadastrados";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub external_api_key: String,
    pub external_api_base_url: String,
    pub cnpj_api_base_url: String,
    pub crea_url: String,
    pub scrape_timeout_ms: u64,
    pub browser_headless: bool,
    pub chrome_executable: Option<String>,
    pub person_api_timeout_secs: u64,
    pub cnpj_api_timeout_secs: u64,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window_secs: u64,
}

fn http_url(var: &str, default: &str) -> anyhow::Result<String> {
    let url = std::env::var(var)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", var);
    }
    url::Url::parse(&url).map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", var, e))?;
    Ok(url)
}

fn number<T: std::str::FromStr>(var: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", var)),
        _ => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let scrape_timeout_ms = match std::env::var("SCRAPE_TIMEOUT_MS") {
            Ok(v) if !v.trim().is_empty() => number("SCRAPE_TIMEOUT_MS", 20_000)?,
            _ => number("PUPPETEER_TIMEOUT", 20_000)?,
        };
        let window_ms: u64 = number("API_RATE_LIMIT_WINDOW_MS", 60_000)?;

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            external_api_key: std::env::var("EXTERNAL_API_KEY")
                .map_err(|_| anyhow::anyhow!("EXTERNAL_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("EXTERNAL_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            external_api_base_url: http_url("EXTERNAL_API_BASE_URL", DEFAULT_PERSON_API_URL)?,
            cnpj_api_base_url: http_url("CNPJ_API_BASE_URL", DEFAULT_CNPJ_API_URL)?,
            crea_url: http_url("CREA_URL", DEFAULT_CREA_URL)?,
            scrape_timeout_ms,
            browser_headless: std::env::var("BROWSER_HEADLESS")
                .map(|v| !v.trim().eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            chrome_executable: std::env::var("CHROME_EXECUTABLE")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            person_api_timeout_secs: number("PERSON_API_TIMEOUT_SECS", 15)?,
            cnpj_api_timeout_secs: number("CNPJ_API_TIMEOUT_SECS", 15)?,
            rate_limit_max_requests: number("API_RATE_LIMIT_MAX_REQUESTS", 10)?,
            rate_limit_window_secs: window_ms.div_ceil(1000).max(1),
        };

        // Log configuration without the API key
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Person API URL: {}", config.external_api_base_url);
        tracing::debug!("CNPJ API URL: {}", config.cnpj_api_base_url);
        tracing::debug!(
            "CREA portal URL: {} (timeout {}ms, headless: {})",
            config.crea_url,
            config.scrape_timeout_ms,
            config.browser_headless
        );
        tracing::debug!(
            "Rate limit: {} requests per {}s",
            config.rate_limit_max_requests,
            config.rate_limit_window_secs
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
