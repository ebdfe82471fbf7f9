use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::EnrichConfig;
use crate::error::ScrapeError;

/// A scripted browser tab. Every call blocks until the browser answers.
#[async_trait]
pub trait RenderSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), ScrapeError>;

    /// Polls until `selector` matches a rendered, visible element.
    async fn wait_visible(&self, selector: &str, timeout: Duration, poll: Duration) -> Result<(), ScrapeError>;

    async fn click(&self, selector: &str) -> Result<(), ScrapeError>;

    async fn evaluate(&self, script: &str) -> Result<Value, ScrapeError>;

    async fn scroll_into_view(&self, selector: &str) -> Result<(), ScrapeError>;

    async fn read_text(&self, selector: &str) -> Result<String, ScrapeError>;

    async fn read_outer_html(&self, selector: &str) -> Result<String, ScrapeError>;

    async fn scroll_by_half_viewport(&self) -> Result<(), ScrapeError> {
        self.evaluate("window.scrollBy(0, window.innerHeight / 2);").await?;
        Ok(())
    }
}

pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    pub async fn launch(config: &EnrichConfig) -> Result<Self, ScrapeError> {
        info!("Initializing browser");

        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .viewport(None)
            .arg("--disable-gpu");
        if !config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScrapeError::Navigation(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScrapeError::Navigation(format!("Failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    error!("Browser handler error: {:?}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::Navigation(e.to_string()))?;

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    pub async fn close(mut self) -> Result<(), ScrapeError> {
        self.browser
            .close()
            .await
            .map_err(|e| ScrapeError::Navigation(format!("Failed to close browser: {}", e)))?;
        self.handler.abort();
        Ok(())
    }

    async fn element(&self, selector: &str) -> Result<chromiumoxide::Element, ScrapeError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| ScrapeError::ElementNotFound(format!("{}: {}", selector, e)))
    }
}

fn visibility_probe(selector: &str) -> String {
    // serde_json quoting gives a valid JS string literal.
    let quoted = Value::String(selector.to_string()).to_string();
    format!(
        r#"(() => {{
            const el = document.querySelector({});
            if (!el) return false;
            const rect = el.getBoundingClientRect();
            const style = window.getComputedStyle(el);
            return rect.width > 0 && rect.height > 0
                && style.visibility !== 'hidden' && style.display !== 'none';
        }})()"#,
        quoted
    )
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
        debug!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| ScrapeError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn wait_visible(&self, selector: &str, timeout: Duration, poll: Duration) -> Result<(), ScrapeError> {
        let probe = visibility_probe(selector);
        let start = std::time::Instant::now();

        loop {
            if self.evaluate(&probe).await?.as_bool() == Some(true) {
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(ScrapeError::Timeout(format!(
                    "{} not visible after {:?}",
                    selector, timeout
                )));
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn click(&self, selector: &str) -> Result<(), ScrapeError> {
        self.element(selector)
            .await?
            .click()
            .await
            .map_err(|e| ScrapeError::Script(format!("click {}: {}", selector, e)))?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, ScrapeError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| ScrapeError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), ScrapeError> {
        self.element(selector)
            .await?
            .scroll_into_view()
            .await
            .map_err(|e| ScrapeError::Script(format!("scroll to {}: {}", selector, e)))?;
        Ok(())
    }

    async fn read_text(&self, selector: &str) -> Result<String, ScrapeError> {
        let text = self
            .element(selector)
            .await?
            .inner_text()
            .await
            .map_err(|e| ScrapeError::Script(e.to_string()))?;
        Ok(text.unwrap_or_default())
    }

    async fn read_outer_html(&self, selector: &str) -> Result<String, ScrapeError> {
        let html = self
            .element(selector)
            .await?
            .outer_html()
            .await
            .map_err(|e| ScrapeError::Script(e.to_string()))?;
        Ok(html.unwrap_or_default())
    }
}
