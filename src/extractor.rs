use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};
use url::Url;

use crate::error::{ScrapeError, StoreError};
use crate::fetcher::{DocumentSource, FetchedDocument};
use crate::models::{ProductDetailSet, ProductRecord};
use crate::repository::ProductRepository;

const NAME: &str = "h1.itemTitle.test-itemTitle";
const CATEGORY: &str = "a.groupName span.categoryName.test-categoryName";
const PRICE: &str = "span.price-value.test-price-value";
const SIZES: &str = "li.sizeSelectorListItem button.sizeSelectorListItemButton";
const IMAGES: &str = "ul.selectable-image-group li.selectableImageListItem img.selectableImage";
const BREADCRUMBS: &str =
    "div.breadcrumb_wrap ul.breadcrumbList li.breadcrumbListItem a.breadcrumbListItemLink";
const SIZE_FIT: &str = "div.sizeFitBar div.label span";
const OUTFIT_TILE: &str = "div.coordinate_item_tile.test-coordinate_item_tile";
const OUTFIT_IMAGE: &str = "div.coordinate_image img.coordinate_image_body";
const OUTFIT_PRICE: &str = "div.coordinate_price span.price-value.test-price-value";
const DESCRIPTION_TITLE: &str = "h4.heading.itemFeature.test-commentItem-subheading";
const DESCRIPTION_BODY: &str = "div.commentItem-mainText.test-commentItem-mainText";
const FEATURE_ITEMS: &str = "ul.articleFeatures.description_part.css-1lxspbu li.articleFeaturesItem";
const ARTICLE_ID: &str = ".test-itemComment-article";
const TAGS: &str = "div.test-category_link a";

/// Marker classes on a product-detail list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailMarker {
    Feature,
    ArticleId,
    Color,
    Country,
}

impl DetailMarker {
    const ALL: [(&'static str, DetailMarker); 4] = [
        ("test-feature", DetailMarker::Feature),
        ("test-articleId", DetailMarker::ArticleId),
        ("test-itemColor", DetailMarker::Color),
        ("test-itemCountry", DetailMarker::Country),
    ];

    /// First marker the item carries, in priority order. Unmarked items yield `None`
    /// and are dropped by the caller.
    pub fn classify(item: &ElementRef) -> Option<Self> {
        let classes: Vec<&str> = item.value().classes().collect();
        Self::ALL
            .iter()
            .find(|(class, _)| classes.contains(class))
            .map(|(_, marker)| *marker)
    }
}

fn compile(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|e| ScrapeError::Selector(format!("{}: {}", selector, e)))
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect()
}

pub struct ProductExtractor {
    origin: Url,
    name: Selector,
    category: Selector,
    price: Selector,
    sizes: Selector,
    images: Selector,
    breadcrumbs: Selector,
    size_fit: Selector,
    outfit_tile: Selector,
    outfit_image: Selector,
    outfit_price: Selector,
    description_title: Selector,
    description_body: Selector,
    feature_items: Selector,
    article_id: Selector,
    tags: Selector,
}

impl ProductExtractor {
    /// `origin` is the site root used to absolutise image paths.
    pub fn new(origin: &str) -> Result<Self, ScrapeError> {
        Ok(Self {
            origin: Url::parse(origin)?,
            name: compile(NAME)?,
            category: compile(CATEGORY)?,
            price: compile(PRICE)?,
            sizes: compile(SIZES)?,
            images: compile(IMAGES)?,
            breadcrumbs: compile(BREADCRUMBS)?,
            size_fit: compile(SIZE_FIT)?,
            outfit_tile: compile(OUTFIT_TILE)?,
            outfit_image: compile(OUTFIT_IMAGE)?,
            outfit_price: compile(OUTFIT_PRICE)?,
            description_title: compile(DESCRIPTION_TITLE)?,
            description_body: compile(DESCRIPTION_BODY)?,
            feature_items: compile(FEATURE_ITEMS)?,
            article_id: compile(ARTICLE_ID)?,
            tags: compile(TAGS)?,
        })
    }

    /// Fetches a product page and maps it to a record keyed by the final URL.
    pub async fn fetch_record<S>(&self, source: &S, url: &str) -> Result<ProductRecord, ScrapeError>
    where
        S: DocumentSource + ?Sized,
    {
        let doc = source.fetch(url).await?;
        Ok(self.extract(&doc))
    }

    /// Writes `record` at `row` and saves the store.
    pub fn save_record<R: ProductRepository>(
        &self,
        repo: &mut R,
        row: u32,
        record: &ProductRecord,
    ) -> Result<(), StoreError> {
        repo.insert(row, record)?;
        repo.persist()?;
        info!("File saved: row {} <- {}", row, record.url);
        Ok(())
    }

    /// Maps a product document to a record. Missing elements leave empty values.
    pub fn extract(&self, doc: &FetchedDocument) -> ProductRecord {
        let html = Html::parse_document(&doc.body);
        let mut product = ProductRecord::new(doc.url.as_str());

        product.name = self.child_text(&html, &self.name);
        product.category = self.child_text(&html, &self.category);
        product.price = self.child_text(&html, &self.price);
        product.available_sizes = html.select(&self.sizes).map(|el| element_text(&el)).collect();
        product.images = html
            .select(&self.images)
            .filter_map(|el| el.value().attr("src"))
            .filter_map(|src| self.absolute(src))
            .collect();
        product.breadcrumbs = html.select(&self.breadcrumbs).map(|el| element_text(&el)).collect();
        product.size_fit = html
            .select(&self.size_fit)
            .map(|el| element_text(&el) + " ")
            .collect();

        self.extract_outfit(&html, &mut product);

        product.title_of_description = self.child_text(&html, &self.description_title);
        product.general_description = self.child_text(&html, &self.description_body);
        product.details = self.extract_details(&html);
        product.tags = html.select(&self.tags).map(|el| element_text(&el)).collect();

        if product.name.is_empty() {
            warn!("No product name found at {}", product.url);
        }
        product
    }

    /// Last tile with an image wins for the image; the same holds for the price.
    fn extract_outfit(&self, html: &Html, product: &mut ProductRecord) {
        for tile in html.select(&self.outfit_tile) {
            let image = tile
                .select(&self.outfit_image)
                .next()
                .and_then(|img| img.value().attr("src"))
                .filter(|src| !src.is_empty())
                .and_then(|src| self.absolute(src));
            if let Some(image) = image {
                product.popup_image = image;
            }

            let price: String = tile
                .select(&self.outfit_price)
                .map(|el| element_text(&el))
                .collect::<String>()
                .trim()
                .to_string();
            if !price.is_empty() {
                product.popup_price = price;
            }
        }
    }

    fn extract_details(&self, html: &Html) -> ProductDetailSet {
        let mut details = ProductDetailSet::default();

        for item in html.select(&self.feature_items) {
            match DetailMarker::classify(&item) {
                Some(DetailMarker::Feature) => details.features.push(element_text(&item)),
                Some(DetailMarker::ArticleId) => {
                    details.article_id = item
                        .select(&self.article_id)
                        .map(|el| element_text(&el))
                        .collect::<String>()
                        .trim()
                        .to_string();
                }
                Some(DetailMarker::Color) => details.color = element_text(&item),
                Some(DetailMarker::Country) => details.country = element_text(&item),
                None => {}
            }
        }

        details
    }

    /// Trimmed text of the first match in document order.
    fn child_text(&self, html: &Html, selector: &Selector) -> String {
        html.select(selector)
            .next()
            .map(|el| element_text(&el).trim().to_string())
            .unwrap_or_default()
    }

    fn absolute(&self, src: &str) -> Option<String> {
        self.origin.join(src.trim()).ok().map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::testing::StaticSource;
    use crate::repository::SheetRepository;

    const PRODUCT_URL: &str = "https://shop.adidas.jp/products/IT2491";

    const PRODUCT_PAGE: &str = r#"
    <html><body>
      <div class="breadcrumb_wrap"><ul class="breadcrumbList">
        <li class="breadcrumbListItem"><a class="breadcrumbListItemLink">Home</a></li>
        <li class="breadcrumbListItem"><a class="breadcrumbListItemLink">Wear</a></li>
      </ul></div>
      <a class="groupName"><span class="categoryName test-categoryName">Originals</span></a>
      <h1 class="itemTitle test-itemTitle"> Trefoil Tee </h1>
      <span class="price-value test-price-value">¥4,389</span>
      <ul>
        <li class="sizeSelectorListItem"><button class="sizeSelectorListItemButton">S</button></li>
        <li class="sizeSelectorListItem"><button class="sizeSelectorListItemButton">M</button></li>
        <li class="sizeSelectorListItem"><button class="sizeSelectorListItemButton">L</button></li>
      </ul>
      <ul class="selectable-image-group">
        <li class="selectableImageListItem"><img class="selectableImage" src="/img/a.jpg"></li>
        <li class="selectableImageListItem"><img class="selectableImage" src="/img/b.jpg"></li>
      </ul>
      <div class="sizeFitBar"><div class="label"><span>Small</span><span>Large</span></div></div>
      <div class="coordinate_item_tile test-coordinate_item_tile">
        <div class="coordinate_image"><img class="coordinate_image_body" src="/img/p1.jpg"></div>
        <div class="coordinate_price"><span class="price-value test-price-value">¥1,000</span></div>
      </div>
      <div class="coordinate_item_tile test-coordinate_item_tile">
        <div class="coordinate_image"><img class="coordinate_image_body" src="/img/p2.jpg"></div>
      </div>
      <h4 class="heading itemFeature test-commentItem-subheading">Everyday classic</h4>
      <div class="commentItem-mainText test-commentItem-mainText">Soft cotton jersey.</div>
      <ul class="articleFeatures description_part css-1lxspbu">
        <li class="articleFeaturesItem test-feature">Regular fit</li>
        <li class="articleFeaturesItem test-feature">Ribbed crewneck</li>
        <li class="articleFeaturesItem test-articleId">Article: <span class="test-itemComment-article">IT2491</span></li>
        <li class="articleFeaturesItem test-itemColor">White</li>
        <li class="articleFeaturesItem test-itemCountry">Vietnam</li>
        <li class="articleFeaturesItem">Unmarked</li>
      </ul>
      <div class="test-category_link"><a>Tee</a><a>Men</a></div>
    </body></html>
    "#;

    fn doc(body: &str) -> FetchedDocument {
        FetchedDocument::new(Url::parse(PRODUCT_URL).unwrap(), body)
    }

    fn extractor() -> ProductExtractor {
        ProductExtractor::new("https://shop.adidas.jp").unwrap()
    }

    #[test]
    fn extracts_full_product() {
        let product = extractor().extract(&doc(PRODUCT_PAGE));

        assert_eq!(product.url, PRODUCT_URL);
        assert_eq!(product.name, "Trefoil Tee");
        assert_eq!(product.category, "Originals");
        assert_eq!(product.price, "¥4,389");
        assert_eq!(product.available_sizes, vec!["S", "M", "L"]);
        assert_eq!(
            product.images,
            vec!["https://shop.adidas.jp/img/a.jpg", "https://shop.adidas.jp/img/b.jpg"]
        );
        assert_eq!(product.breadcrumbs, vec!["Home", "Wear"]);
        assert_eq!(product.size_fit, "Small Large ");
        assert_eq!(product.title_of_description, "Everyday classic");
        assert_eq!(product.general_description, "Soft cotton jersey.");
        assert_eq!(product.tags, vec!["Tee", "Men"]);
    }

    #[test]
    fn routes_detail_items_by_marker() {
        let details = extractor().extract(&doc(PRODUCT_PAGE)).details;

        assert_eq!(details.features, vec!["Regular fit", "Ribbed crewneck"]);
        assert_eq!(details.article_id, "IT2491");
        assert_eq!(details.color, "White");
        assert_eq!(details.country, "Vietnam");
    }

    #[test]
    fn popup_fields_are_last_wins_per_field() {
        let product = extractor().extract(&doc(PRODUCT_PAGE));

        assert_eq!(product.popup_image, "https://shop.adidas.jp/img/p2.jpg");
        assert_eq!(product.popup_price, "¥1,000");
    }

    #[test]
    fn missing_fields_degrade_to_empty() {
        let product = extractor().extract(&doc("<html><body><p>gone</p></body></html>"));

        assert_eq!(product.url, PRODUCT_URL);
        assert!(product.name.is_empty());
        assert!(product.available_sizes.is_empty());
        assert!(product.popup_image.is_empty());
        assert!(product.popup_price.is_empty());
        assert_eq!(product.details, ProductDetailSet::default());
        assert_eq!(product.to_row()[8], "");
        assert_eq!(product.to_row()[9], "");
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = extractor();
        assert_eq!(extractor.extract(&doc(PRODUCT_PAGE)), extractor.extract(&doc(PRODUCT_PAGE)));
    }

    #[tokio::test]
    async fn fetched_record_is_written_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.xlsx");
        let source = StaticSource::default().with_page(PRODUCT_URL, PRODUCT_PAGE);
        let mut repo = SheetRepository::create(&path);
        let extractor = extractor();

        let record = extractor.fetch_record(&source, PRODUCT_URL).await.unwrap();
        extractor.save_record(&mut repo, 2, &record).unwrap();

        assert_eq!(record.name, "Trefoil Tee");
        assert_eq!(repo.list(), vec![(PRODUCT_URL.to_string(), 2)]);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn redirected_product_is_keyed_by_final_url() {
        let source = StaticSource::default()
            .with_page(PRODUCT_URL, PRODUCT_PAGE)
            .with_redirect("https://shop.adidas.jp/products/it2491", PRODUCT_URL);

        let record = extractor()
            .fetch_record(&source, "https://shop.adidas.jp/products/it2491")
            .await
            .unwrap();

        assert_eq!(record.url, PRODUCT_URL);
    }

    #[tokio::test]
    async fn unreachable_product_is_a_scrape_error() {
        let source = StaticSource::default();

        let err = extractor().fetch_record(&source, PRODUCT_URL).await.unwrap_err();

        assert!(matches!(err, ScrapeError::Navigation(_)));
    }
}
