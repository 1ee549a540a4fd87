use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::addons::{Addon, AddonSource};
use crate::config::{AppConfig, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::error::{RecipeError, RecipeResult};
use crate::scanner::AddonScanner;

#[derive(Debug, Clone)]
pub struct WikiClientOptions {
    pub url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl WikiClientOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            url: config.addons_url(),
            user_agent: config.user_agent(),
            timeout: Duration::from_secs(config.settings.fetch_timeout_secs.max(1)),
        }
    }
}

impl Default for WikiClientOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Live addon source: one GET of the addons wiki page, scanned for addon links.
#[derive(Clone)]
pub struct WikiClient {
    client: Client,
    options: WikiClientOptions,
    scanner: AddonScanner,
}

impl WikiClient {
    pub fn new(options: WikiClientOptions) -> RecipeResult<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|error| {
                RecipeError::Fetch(format!("failed to build HTTP client: {error}"))
            })?;
        let scanner = AddonScanner::for_page(&options.url);
        Ok(Self {
            client,
            options,
            scanner,
        })
    }

    pub fn url(&self) -> &str {
        &self.options.url
    }

    pub fn scanner(&self) -> &AddonScanner {
        &self.scanner
    }

    fn fetch_page(&self) -> RecipeResult<String> {
        let url = &self.options.url;
        let user_agent = if self.options.user_agent.trim().is_empty() {
            DEFAULT_USER_AGENT
        } else {
            self.options.user_agent.as_str()
        };
        let response = self
            .client
            .get(url)
            .header("User-Agent", user_agent)
            .header("Accept", "text/html, text/plain;q=0.9,*/*;q=0.1")
            .send()
            .map_err(|error| RecipeError::Fetch(format!("failed to fetch {url}: {error}")))?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(RecipeError::Fetch(format!(
                "HTTP {} while fetching {url}",
                status.as_u16()
            )));
        }
        response
            .text()
            .map_err(|error| RecipeError::Fetch(format!("failed to read response body: {error}")))
    }
}

impl AddonSource for WikiClient {
    fn fetch_addons(&self) -> RecipeResult<Vec<Addon>> {
        info!(
            "fetching addons from {} (timeout {}s)",
            self.options.url,
            self.options.timeout.as_secs()
        );
        let html = self.fetch_page()?;
        debug!("received {} bytes of HTML", html.len());
        let addons = self.scanner.scan(&html);
        info!("found {} addon links", addons.len());
        Ok(addons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_config() {
        let mut config = AppConfig::default();
        config.settings.addons_url = "http://127.0.0.1:9/wiki/addons".to_string();
        config.settings.fetch_timeout_secs = 0;
        let options = WikiClientOptions::from_config(&config);
        assert_eq!(options.timeout, Duration::from_secs(1));
        assert!(options.user_agent.contains("KubeJS"));
        assert_eq!(
            WikiClientOptions::default().timeout,
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS)
        );
    }

    #[test]
    fn scanner_origin_comes_from_page_url() {
        let client = WikiClient::new(WikiClientOptions {
            url: "http://127.0.0.1:9/wiki/addons".to_string(),
            user_agent: String::new(),
            timeout: Duration::from_secs(1),
        })
        .expect("client");
        assert_eq!(client.scanner().origin(), "http://127.0.0.1:9");
        assert_eq!(client.url(), "http://127.0.0.1:9/wiki/addons");
    }
}
