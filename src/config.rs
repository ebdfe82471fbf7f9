use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CategoryQuery {
    pub category: String,
    pub condition: String,
    pub limit: u32,
}

impl Default for CategoryQuery {
    fn default() -> Self {
        Self {
            category: "wear".to_string(),
            condition: "6".to_string(),
            limit: 120,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub origin: String,
    pub listing_path: String,
    pub query: CategoryQuery,
    pub max_pages: u32,
    pub max_products: usize,
    /// Row 1 is the header.
    pub first_row: u32,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            origin: "https://shop.adidas.jp".to_string(),
            listing_path: "/item/".to_string(),
            query: CategoryQuery::default(),
            max_pages: 30,
            max_products: 300,
            first_row: 2,
            request_timeout: Duration::from_secs(30),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) catalog-scraper/0.1".to_string(),
        }
    }
}

impl CrawlConfig {
    /// Listing URL for page 1; later pages append `page=k`.
    pub fn category_url(&self) -> String {
        format!(
            "{}{}?category={}&condition={}&limit={}",
            self.origin.trim_end_matches('/'),
            self.listing_path,
            self.query.category,
            self.query.condition,
            self.query.limit
        )
    }
}

/// Where the recommendation-percentage lookup stores its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecommendationTarget {
    /// Historic behaviour: the percentage lands in the average-score slot and
    /// `Recommendation` only ever holds the sentinel.
    #[default]
    AvgScore,
    #[cfg_attr(not(test), allow(dead_code))]
    Recommendation,
}

#[derive(Debug, Clone)]
pub struct EnrichConfig {
    pub headless: bool,
    pub deadline: Duration,
    pub initial_settle: Duration,
    pub click_settle: Duration,
    pub overlay_settle: Duration,
    pub scroll_steps: u32,
    pub scroll_delay: Duration,
    pub visible_timeout: Duration,
    pub poll_interval: Duration,
    pub recommendation_target: RecommendationTarget,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            headless: true,
            deadline: Duration::from_secs(4 * 60),
            initial_settle: Duration::from_secs(10),
            click_settle: Duration::from_secs(1),
            overlay_settle: Duration::from_secs(2),
            scroll_steps: 10,
            scroll_delay: Duration::from_millis(500),
            visible_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
            recommendation_target: RecommendationTarget::default(),
        }
    }
}

impl EnrichConfig {
    /// No settle or scroll delays. Used where the render source answers instantly.
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            initial_settle: Duration::ZERO,
            click_settle: Duration::ZERO,
            overlay_settle: Duration::ZERO,
            scroll_delay: Duration::ZERO,
            visible_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(5),
            ..Default::default()
        }
    }

    #[cfg(test)]
    pub fn with_recommendation_target(mut self, target: RecommendationTarget) -> Self {
        self.recommendation_target = target;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub crawl: CrawlConfig,
    pub enrich: EnrichConfig,
    pub output_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            crawl: CrawlConfig::default(),
            enrich: EnrichConfig::default(),
            output_path: PathBuf::from("products.xlsx"),
        }
    }
}
