use serde::{Deserialize, Serialize};

/// Header row of the output sheet, in column order.
pub const COLUMNS: [&str; 23] = [
    "Name",
    "Category",
    "Price",
    "Available Sizes",
    "Images",
    "Breadcrumbs",
    "URL",
    "SizeFit",
    "PopupImage",
    "PopupPrice",
    "TitleOfDescription",
    "GeneralDescription",
    "Features",
    "ArticleID",
    "Color",
    "Country",
    "Tags",
    "SizeChartHeader",
    "FirstDataRow",
    "AllDataRows",
    "AvgScore",
    "ReviewsCount",
    "Recommendation",
];

/// 1-based column of the merge key.
pub const URL_COLUMN: u16 = 7;

/// 1-based column of the first enrichment cell; the six enrichment cells are contiguous.
pub const ENRICHMENT_FIRST_COLUMN: u16 = 18;

/// Number of columns written during the crawl phase.
#[cfg(test)]
pub const STATIC_COLUMN_COUNT: usize = 17;

pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetailSet {
    pub features: Vec<String>,
    pub article_id: String,
    pub color: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub category: String,
    pub price: String,
    pub available_sizes: Vec<String>,
    pub images: Vec<String>,
    pub breadcrumbs: Vec<String>,
    pub url: String,
    pub size_fit: String,
    pub popup_image: String,
    pub popup_price: String,
    pub title_of_description: String,
    pub general_description: String,
    pub details: ProductDetailSet,
    pub tags: Vec<String>,
}

impl ProductRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Flattens the record into a full sheet row. Enrichment cells start empty.
    pub fn to_row(&self) -> Vec<String> {
        let mut row = vec![
            self.name.clone(),
            self.category.clone(),
            self.price.clone(),
            self.available_sizes.join(", "),
            self.images.join("; "),
            self.breadcrumbs.join(" > "),
            self.url.clone(),
            self.size_fit.clone(),
            self.popup_image.clone(),
            self.popup_price.clone(),
            self.title_of_description.clone(),
            self.general_description.clone(),
            self.details.features.join(", "),
            self.details.article_id.clone(),
            self.details.color.clone(),
            self.details.country.clone(),
            self.tags.join(", "),
        ];
        row.resize(COLUMNS.len(), String::new());
        row
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeChartTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SizeChartTable {
    /// A table with no header cells or no body rows carries no data.
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() || self.rows.is_empty()
    }

    pub fn first_row(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub size_chart: SizeChartTable,
    pub avg_score: String,
    pub reviews_count: String,
    pub recommendation: String,
}

impl EnrichmentResult {
    /// True when the interaction script produced nothing at all.
    pub fn is_empty(&self) -> bool {
        self.size_chart.is_empty()
            && self.avg_score.is_empty()
            && self.reviews_count.is_empty()
            && self.recommendation.is_empty()
    }

    /// The six enrichment cells in column order. `None` leaves the cell untouched.
    pub fn to_cells(&self) -> [Option<String>; 6] {
        let chart = &self.size_chart;
        let (header, first_row, all_rows) = if chart.is_empty() {
            (None, None, None)
        } else {
            (
                Some(chart.header.join(", ")),
                chart.first_row().map(|row| row.join(", ")),
                Some(format_all_rows(&chart.rows)),
            )
        };

        [
            header,
            first_row,
            all_rows,
            Some(self.avg_score.clone()),
            Some(self.reviews_count.clone()),
            Some(self.recommendation.clone()),
        ]
    }
}

pub fn format_all_rows(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| row.join(","))
        .collect::<Vec<_>>()
        .join(";")
}
