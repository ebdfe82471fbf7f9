use scraper::{Html, Selector};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::browser::RenderSession;
use crate::config::{EnrichConfig, RecommendationTarget};
use crate::error::ScrapeError;
use crate::models::{EnrichmentResult, SizeChartTable, NOT_AVAILABLE};

const PAGE_BODY: &str = "body";
const REMOVE_MODAL: &str = r#"document.querySelector("div#modalArea.modalArea")?.remove();"#;
const SIZE_HEADING: &str = "h3.sizeDescriptionWrapHeading";
const SIZE_CHART: &str = "div.sizeChart";

const AVG_RATING: &str = "div.BVRRRatingNormalOutOf span.BVRRNumber.BVRRRatingNumber";
const REVIEWS_COUNT: &str = "span.BVRRNumber.BVRRBuyAgainTotal";
const RECOMMENDATION: &str = "span.BVRRBuyAgainPercentage span.BVRRNumber";

const HEADER_CELLS: &str = "thead.sizeChartTHeader th";
const BODY_ROWS: &str = "tbody tr";
const BODY_CELLS: &str = "td";

pub struct EnrichmentExtractor<'a, R: RenderSession + ?Sized> {
    session: &'a R,
    config: &'a EnrichConfig,
    header_cells: Selector,
    body_rows: Selector,
    body_cells: Selector,
}

impl<'a, R: RenderSession + ?Sized> EnrichmentExtractor<'a, R> {
    pub fn new(session: &'a R, config: &'a EnrichConfig) -> Result<Self, ScrapeError> {
        let parse = |s: &str| Selector::parse(s).map_err(|e| ScrapeError::Selector(format!("{}: {}", s, e)));
        Ok(Self {
            session,
            config,
            header_cells: parse(HEADER_CELLS)?,
            body_rows: parse(BODY_ROWS)?,
            body_cells: parse(BODY_CELLS)?,
        })
    }

    /// Runs the interaction script for `url` under the overall deadline.
    /// Script failure or deadline expiry yields an empty result.
    pub async fn enrich(&self, url: &str) -> EnrichmentResult {
        match timeout(self.config.deadline, self.run(url)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Enrichment of {} exceeded {:?}, abandoning", url, self.config.deadline);
                EnrichmentResult::default()
            }
        }
    }

    async fn run(&self, url: &str) -> EnrichmentResult {
        let fragment = match self.capture_size_chart(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Error scraping product at URL: {}. Error: {}", url, e);
                return EnrichmentResult::default();
            }
        };

        let mut result = EnrichmentResult {
            avg_score: self.lookup(AVG_RATING, "avgScore").await,
            reviews_count: self.lookup(REVIEWS_COUNT, "Reviews count").await,
            ..Default::default()
        };

        match self.session.read_text(RECOMMENDATION).await {
            Ok(text) => match self.config.recommendation_target {
                RecommendationTarget::AvgScore => result.avg_score = text,
                RecommendationTarget::Recommendation => result.recommendation = text,
            },
            Err(_) => {
                info!("recommendation element not found, assigning default value.");
                result.recommendation = NOT_AVAILABLE.to_string();
            }
        }

        result.size_chart = self.parse_size_chart(&fragment);
        if result.size_chart.is_empty() {
            info!("No size chart data found for URL: {}. Skipping...", url);
            result.size_chart = SizeChartTable::default();
        }
        result
    }

    /// The fixed interaction script. Any failing step aborts the rest.
    async fn capture_size_chart(&self, url: &str) -> Result<String, ScrapeError> {
        let config = self.config;
        let session = self.session;

        session.navigate(url).await?;
        session
            .wait_visible(PAGE_BODY, config.visible_timeout, config.poll_interval)
            .await?;
        sleep(config.initial_settle).await;

        session.click(PAGE_BODY).await?;
        sleep(config.click_settle).await;

        session.evaluate(REMOVE_MODAL).await?;
        sleep(config.overlay_settle).await;

        self.smooth_scroll().await?;

        session
            .wait_visible(SIZE_HEADING, config.visible_timeout, config.poll_interval)
            .await?;
        session.scroll_into_view(SIZE_HEADING).await?;
        session.read_outer_html(SIZE_CHART).await
    }

    /// Half-viewport steps to trigger lazy-loaded content.
    async fn smooth_scroll(&self) -> Result<(), ScrapeError> {
        for _ in 0..self.config.scroll_steps {
            self.session.scroll_by_half_viewport().await?;
            sleep(self.config.scroll_delay).await;
        }
        Ok(())
    }

    async fn lookup(&self, selector: &str, label: &str) -> String {
        match self.session.read_text(selector).await {
            Ok(text) => text,
            Err(_) => {
                info!("{} element not found, assigning default value.", label);
                NOT_AVAILABLE.to_string()
            }
        }
    }

    /// Header texts (blank ones dropped) and body rows of a size-chart fragment.
    /// Returns an empty table if either part is missing.
    pub fn parse_size_chart(&self, fragment: &str) -> SizeChartTable {
        let doc = Html::parse_document(fragment);

        let header: Vec<String> = doc
            .select(&self.header_cells)
            .map(|th| th.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty())
            .collect();

        let rows: Vec<Vec<String>> = doc
            .select(&self.body_rows)
            .map(|tr| {
                tr.select(&self.body_cells)
                    .map(|td| td.text().collect::<String>().trim().to_string())
                    .collect()
            })
            .collect();

        if header.is_empty() || rows.is_empty() {
            return SizeChartTable::default();
        }
        SizeChartTable { header, rows }
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;

    pub const CHART: &str = r#"
    <div class="sizeChart"><table>
      <thead class="sizeChartTHeader"><tr><th></th><th>S</th><th>M</th></tr></thead>
      <tbody>
        <tr><td>Chest</td><td>88</td><td>96</td></tr>
        <tr><td>Waist</td><td>72</td><td>80</td></tr>
      </tbody>
    </table></div>"#;

    /// Scripted stand-in for a browser tab.
    #[derive(Default)]
    pub struct FakeSession {
        pub texts: HashMap<String, String>,
        pub html: HashMap<String, String>,
        pub invisible: Vec<String>,
        pub navigate_delay: Option<Duration>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeSession {
        pub fn with_size_chart(mut self, html: &str) -> Self {
            self.html.insert(SIZE_CHART.to_string(), html.to_string());
            self
        }

        pub fn with_text(mut self, selector: &str, text: &str) -> Self {
            self.texts.insert(selector.to_string(), text.to_string());
            self
        }

        pub fn with_reviews(self, avg_score: &str, reviews_count: &str) -> Self {
            self.with_text(AVG_RATING, avg_score)
                .with_text(REVIEWS_COUNT, reviews_count)
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl RenderSession for FakeSession {
        async fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
            self.record(format!("navigate {}", url));
            if let Some(delay) = self.navigate_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(())
        }

        async fn wait_visible(&self, selector: &str, _: Duration, _: Duration) -> Result<(), ScrapeError> {
            self.record(format!("wait {}", selector));
            if self.invisible.iter().any(|s| s == selector) {
                return Err(ScrapeError::Timeout(selector.to_string()));
            }
            Ok(())
        }

        async fn click(&self, selector: &str) -> Result<(), ScrapeError> {
            self.record(format!("click {}", selector));
            Ok(())
        }

        async fn evaluate(&self, script: &str) -> Result<Value, ScrapeError> {
            self.record(format!("eval {}", script));
            Ok(Value::Null)
        }

        async fn scroll_into_view(&self, selector: &str) -> Result<(), ScrapeError> {
            self.record(format!("scroll {}", selector));
            Ok(())
        }

        async fn read_text(&self, selector: &str) -> Result<String, ScrapeError> {
            self.texts
                .get(selector)
                .cloned()
                .ok_or_else(|| ScrapeError::ElementNotFound(selector.to_string()))
        }

        async fn read_outer_html(&self, selector: &str) -> Result<String, ScrapeError> {
            self.html
                .get(selector)
                .cloned()
                .ok_or_else(|| ScrapeError::ElementNotFound(selector.to_string()))
        }
    }
}
