use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use ram_tracker::mock::{MockBackend, MockReply};
use ram_tracker::{
    Capacity, DealAggregator, ExtractionClient, Filter, Generation, OfferPolicy, Retailer,
    RetailerCatalog, RetailerScope, ScanError,
};

const AMAZON: &str = "site:amazon.com";
const NEWEGG: &str = "site:newegg.com";

fn aggregator(backend: MockBackend) -> (Arc<MockBackend>, DealAggregator) {
    let backend = Arc::new(backend);
    let extractor = ExtractionClient::new(backend.clone(), "extract-model", OfferPolicy::default());
    (backend, DealAggregator::new(RetailerCatalog::default(), extractor))
}

fn offers_json(items: &[(&str, f64, &str)]) -> String {
    let values: Vec<serde_json::Value> = items
        .iter()
        .map(|(title, price, url)| serde_json::json!({"title": title, "price": price, "url": url}))
        .collect();
    serde_json::Value::Array(values).to_string()
}

fn ddr5_32gb_6000_all() -> Filter {
    Filter::new(
        Capacity::Gb32,
        Generation::Ddr5,
        "6000MHz".parse().unwrap(),
        RetailerScope::All,
    )
    .unwrap()
}

#[tokio::test]
async fn merges_both_retailers_by_price() {
    let (_, aggregator) = aggregator(
        MockBackend::new()
            .reply_when(
                AMAZON,
                MockReply::text(offers_json(&[(
                    "Corsair Vengeance 32GB DDR5 6000",
                    95.50,
                    "https://www.amazon.com/dp/B0BZHTVHN5",
                )])),
            )
            .reply_when(
                NEWEGG,
                MockReply::text(offers_json(&[(
                    "G.Skill Flare X5 32GB DDR5 6000",
                    89.99,
                    "https://www.newegg.com/p/N82E16820374445",
                )])),
            ),
    );

    let offers = aggregator.scan(&ddr5_32gb_6000_all()).await.unwrap();

    let prices: Vec<f64> = offers.iter().map(|o| o.price()).collect();
    assert_eq!(prices, vec![89.99, 95.50]);
    assert_eq!(offers.best().unwrap().retailer(), "Newegg");
}

#[tokio::test]
async fn failing_retailer_is_dropped_silently() {
    let (_, aggregator) = aggregator(
        MockBackend::new()
            .reply_when(AMAZON, MockReply::fail("429 RESOURCE_EXHAUSTED"))
            .reply_when(
                NEWEGG,
                MockReply::text(offers_json(&[(
                    "Kingston Fury Beast 32GB",
                    104.99,
                    "https://www.newegg.com/p/N82E1",
                )])),
            ),
    );

    let offers = aggregator.scan(&ddr5_32gb_6000_all()).await.unwrap();

    assert_eq!(offers.len(), 1);
    assert_eq!(offers.best().unwrap().retailer(), "Newegg");
}

#[tokio::test]
async fn all_retailers_failing_is_an_empty_success() {
    let (_, aggregator) = aggregator(MockBackend::new().otherwise(MockReply::fail("offline")));

    let offers = aggregator.scan(&Filter::default()).await.unwrap();

    assert!(offers.is_empty());
}

#[tokio::test]
async fn suspicious_offers_never_reach_the_result() {
    let (_, aggregator) = aggregator(
        MockBackend::new()
            .reply_when(
                AMAZON,
                MockReply::text(offers_json(&[
                    ("Placeholder", 0.01, "https://www.amazon.com/dp/A"),
                    ("Elsewhere", 80.0, "https://www.bestbuy.com/site/1"),
                    ("Real kit", 120.0, "https://www.amazon.com/dp/B"),
                ])),
            )
            .reply_when(
                NEWEGG,
                MockReply::text(offers_json(&[
                    ("Amazon link", 70.0, "https://www.amazon.com/dp/C"),
                    ("Bounce", 75.0, "https://www.google.com/url?q=https://www.newegg.com/p/1"),
                ])),
            ),
    );

    let offers = aggregator.scan(&ddr5_32gb_6000_all()).await.unwrap();

    assert_eq!(offers.len(), 1);
    for offer in &offers {
        assert!(offer.price() > 10.0);
        assert!(offer.url().starts_with("https://"));
        assert!(offer.url().contains("amazon.com"));
        assert_eq!(offer.retailer(), "Amazon");
    }
}

#[tokio::test]
async fn admitted_urls_are_canonical_even_when_reported_loosely() {
    let (_, aggregator) = aggregator(
        MockBackend::new()
            .reply_when(
                AMAZON,
                MockReply::text(offers_json(&[
                    ("Padded", 91.0, "  https://www.amazon.com/dp/X\n"),
                    ("Shouting", 92.0, "HTTPS://WWW.AMAZON.COM/dp/Y"),
                ])),
            )
            .reply_when(
                NEWEGG,
                MockReply::text(offers_json(&[("Dotted", 93.0, "https://www.newegg.com./p/Z")])),
            ),
    );

    let offers = aggregator.scan(&ddr5_32gb_6000_all()).await.unwrap();

    assert_eq!(offers.len(), 3);
    for offer in &offers {
        let url = url::Url::parse(offer.url()).unwrap();
        assert!(
            offer.url().starts_with("https://") || offer.url().starts_with("http://"),
            "{}",
            offer.url()
        );
        let domain = if offer.retailer() == "Amazon" { "amazon.com" } else { "newegg.com" };
        assert!(ram_tracker::HostMatch::IgnoreWww.matches(url.host_str().unwrap(), domain));
    }
    let urls: Vec<&str> = offers.iter().map(|o| o.url()).collect();
    assert_eq!(
        urls,
        vec![
            "https://www.amazon.com/dp/X",
            "https://www.amazon.com/dp/Y",
            "https://www.newegg.com./p/Z",
        ]
    );
}

#[tokio::test]
async fn single_retailer_scope_queries_only_that_retailer() {
    let (backend, aggregator) = aggregator(MockBackend::new().otherwise(MockReply::text("[]")));
    let filter = Filter::default()
        .with_generation(Generation::Ddr4)
        .with_scope(RetailerScope::Only("newegg".into()));

    let offers = aggregator.scan(&filter).await.unwrap();

    assert!(offers.is_empty());
    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let prompt = requests[0].last_user_text().unwrap();
    assert!(prompt.contains("site:newegg.com buy \"32GB\" \"DDR4\" 3200MHz RAM memory"));
}

#[tokio::test]
async fn unknown_retailer_fails_before_any_request() {
    let (backend, aggregator) = aggregator(MockBackend::new());
    let filter = Filter::default().with_scope(RetailerScope::Only("microcenter".into()));

    let err = aggregator.scan(&filter).await.unwrap_err();

    assert_eq!(err, ScanError::UnknownRetailer("microcenter".into()));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn empty_catalog_fails() {
    let backend = Arc::new(MockBackend::new());
    let extractor = ExtractionClient::new(backend, "m", OfferPolicy::default());
    let aggregator = DealAggregator::new(RetailerCatalog::new(Vec::new()), extractor);

    assert_eq!(
        aggregator.scan(&Filter::default()).await.unwrap_err(),
        ScanError::NoRetailers
    );
}

#[tokio::test(start_paused = true)]
async fn retailers_are_queried_concurrently() {
    let slow = |price: f64, url: &str| {
        MockReply::delayed(
            Duration::from_millis(100),
            MockReply::text(offers_json(&[("Kit", price, url)])),
        )
    };
    let (_, aggregator) = aggregator(
        MockBackend::new()
            .reply_when(AMAZON, slow(99.0, "https://www.amazon.com/dp/A"))
            .reply_when(NEWEGG, slow(98.0, "https://www.newegg.com/p/B")),
    );

    let start = tokio::time::Instant::now();
    let offers = aggregator.scan(&Filter::default()).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(offers.len(), 2);
    assert!(elapsed < Duration::from_millis(200), "took {:?}", elapsed);
}

#[tokio::test]
async fn custom_catalog_attributes_offers_to_its_labels() {
    let backend = Arc::new(MockBackend::new().otherwise(MockReply::text(offers_json(&[(
        "Crucial Pro 16GB DDR5",
        49.99,
        "https://www.bhphotovideo.com/c/product/1",
    )]))));
    let extractor = ExtractionClient::new(backend, "m", OfferPolicy::default());
    let catalog = RetailerCatalog::new(vec![Retailer::new("bh", "B&H", "bhphotovideo.com")]);
    let aggregator = DealAggregator::new(catalog, extractor);

    let offers = aggregator.scan(&Filter::default()).await.unwrap();

    assert_eq!(offers.best().unwrap().retailer(), "B&H");
}
