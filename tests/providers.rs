// tests/providers.rs
//
// Provider adapters against pinned upstream fixtures (no network):
// - embedded-data pages (Defra single step, ONS two step)
// - scraping contract (Datarade)
// - compressed binary API (AWS Marketplace)
// - CKAN family
// - full wiring through the Aggregator with a mix of good and broken upstreams

mod common;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use catalog_aggregator::aggregate::http::{FetchResponse, Fetcher};
use catalog_aggregator::aggregate::providers::aws_marketplace::{self, AwsMarketplaceAdapter};
use catalog_aggregator::aggregate::providers::ckan::{CkanAdapter, CkanSite};
use catalog_aggregator::aggregate::providers::datarade::{self, DataradeAdapter, CARD_CONTRACT};
use catalog_aggregator::aggregate::providers::defra::{self, DefraAdapter};
use catalog_aggregator::aggregate::providers::ons::{self, OnsAdapter};
use catalog_aggregator::aggregate::providers::{agrimetrics, databricks, opendatasoft, snowflake};
use catalog_aggregator::{Aggregator, AggregatorConfig, ProviderAdapter};
use common::{fixture, FixtureFetcher};
use flate2::write::ZlibEncoder;
use flate2::Compression;

fn zlib(data: &str) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::best());
    enc.write_all(data.as_bytes()).expect("compress");
    enc.finish().expect("finish")
}

#[tokio::test]
async fn defra_reads_embedded_datasets() {
    let fetcher = FixtureFetcher::new()
        .route(defra::BASE_URL, FetchResponse::html(fixture("defra_search.html")))
        .into_arc();
    let out = DefraAdapter::new(fetcher).search("water").await.expect("defra ok");

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].title, "Hydrology Data");
    assert_eq!(out[0].subtitle, "water, hydrology");
    assert_eq!(out[0].updated, "09/03/2024 16:00");
    assert_eq!(
        out[0].url,
        "https://environment.data.gov.uk/dataset/0b2d6a9c-3e1f-4a57-9d1c-5f2b8e7a1c40"
    );
    assert_eq!(out[1].subtitle, "");
    assert_eq!(out[1].updated, "20/03/2024 12:00");
}

#[tokio::test]
async fn ons_resolves_build_id_then_queries_data_route() {
    let fetcher = FixtureFetcher::new()
        .route(ons::PAGE_URL, FetchResponse::html(fixture("ons_search.html")))
        .route(
            "https://ons.metadata.works/_next/data/rTq3ZxVb8kLm2/",
            FetchResponse::json(fixture("ons_search.json")),
        )
        .into_arc();

    let out = OnsAdapter::new(fetcher.clone())
        .search("population")
        .await
        .expect("ons ok");
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].subtitle, "labour market, population");
    assert_eq!(out[0].provider.title, "Office for National Statistics");
    assert_eq!(out[0].provider.description, "ONS SRS Metadata Catalogue");
    assert_eq!(out[0].updated, "01/02/2024 09:30");

    let seen = fetcher.seen();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].cache_key.is_none());
    assert_eq!(
        seen[1].cache_key.as_deref(),
        Some("ons-search-rTq3ZxVb8kLm2-population")
    );
}

#[tokio::test]
async fn ons_stale_build_id_surfaces_as_error() {
    // Data route for a different deployment only: the discovered id will not match.
    let fetcher = FixtureFetcher::new()
        .route(ons::PAGE_URL, FetchResponse::html(fixture("ons_search.html")))
        .route(
            "https://ons.metadata.works/_next/data/",
            FetchResponse::new(404, Some("text/html"), "not found"),
        )
        .into_arc();
    let err = OnsAdapter::new(fetcher).search("x").await.unwrap_err();
    assert_eq!(err.kind(), "status");
}

#[tokio::test]
async fn datarade_card_contract_v1() {
    assert_eq!(CARD_CONTRACT.version, 1);

    let fetcher = FixtureFetcher::new()
        .route(datarade::SEARCH_URL, FetchResponse::html(fixture("datarade_search.html")))
        .into_arc();
    let out = DataradeAdapter::new(fetcher).search("footfall").await.expect("datarade ok");

    let titles: Vec<_> = out.iter().map(|l| l.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["UK Retail Footfall Data", "Weather History & Forecasts", "Mobility Panel"],
        "untitled promo card is skipped"
    );

    assert_eq!(
        out[0].url,
        "https://datarade.ai/data-products/uk-retail-footfall-data-acme"
    );
    assert_eq!(out[0].id, out[0].url);
    assert_eq!(
        out[0].description,
        "Hourly footfall counts across 2,000 UK high streets, updated daily."
    );
    assert_eq!(out[0].subtitle, "by Acme Analytics");
    assert_eq!(out[1].url, "https://datarade.ai/data-products/weather-history");
    assert_eq!(out[2].url, "https://datarade.ai/search/products?keywords=footfall");
    assert!(out.iter().all(|l| l.updated == "unknown" && l.source == "Datarade"));
}

#[tokio::test]
async fn aws_marketplace_inflates_and_maps() {
    let payload = r#"{"ListingSummaries":[
        {"Id":"prodview-abc123",
         "DisplayAttributes":{"Title":"Global Shipping AIS","LongDescription":"Vessel positions."},
         "Categories":[{"DisplayName":"Data Products"},{"DisplayName":"Transport"}],
         "ProductAttributes":{"Creator":{"DisplayName":"Ocean Data Co"}},
         "OfferSummary":{"PricingSummary":"Free trial"}},
        {"Id":"prodview-def456","DisplayAttributes":{"Title":"Bare"}}
    ]}"#;
    let fetcher = FixtureFetcher::new()
        .route(
            aws_marketplace::DISCOVERY_URL,
            FetchResponse::new(200, Some("application/x-amz-json-1.1"), zlib(payload)),
        )
        .into_arc();

    let out = AwsMarketplaceAdapter::new(fetcher.clone())
        .search("shipping")
        .await
        .expect("aws ok");
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].subtitle, "Data Products, Transport");
    assert_eq!(out[0].provider.title, "Ocean Data Co");
    assert_eq!(out[0].provider.description, "Free trial");
    assert!(out[0].url.contains("prodview-abc123"));
    assert_eq!(out[1].subtitle, "");
    assert_eq!(out[1].provider.title, "");
    assert!(out.iter().all(|l| l.updated == "unknown"));

    let req = &fetcher.seen()[0];
    assert_eq!(
        req.header_value("X-Amz-Target"),
        Some("AWSMPDiscoveryService.SearchListings")
    );
}

#[tokio::test]
async fn aws_marketplace_corrupt_stream_is_decode_error() {
    // Neither a zlib header nor a valid DEFLATE block type.
    let bytes = vec![0xff, 0xfe, 0xfd, 0x00, 0x13, 0x37];
    let fetcher = FixtureFetcher::new()
        .route(
            aws_marketplace::DISCOVERY_URL,
            FetchResponse::new(200, None, bytes),
        )
        .into_arc();
    let err = AwsMarketplaceAdapter::new(fetcher).search("x").await.unwrap_err();
    assert_eq!(err.kind(), "decode");
}

#[tokio::test]
async fn ckan_london_datastore_fixture() {
    let site = CkanSite::london_datastore();
    let fetcher = FixtureFetcher::new()
        .route(site.api_url, FetchResponse::json(fixture("ckan_package_search.json")))
        .into_arc();
    let out = CkanAdapter::new(site, fetcher).search("air").await.expect("ckan ok");

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].subtitle, "UK Open Government Licence (OGL v3)");
    assert_eq!(out[0].url, "https://data.london.gov.uk/download/air-quality.csv");
    assert_eq!(out[0].updated, "15/01/2024 08:45");
    assert_eq!(out[0].provider.title, "Greater London Authority");

    assert_eq!(out[1].url, "https://data.london.gov.uk/dataset/borough-boundaries");
    assert_eq!(out[1].description, "");
    assert_eq!(out[1].updated, "unknown");
}

#[tokio::test]
async fn ckan_ssen_uses_tags_and_site_fallback() {
    let site = CkanSite::ssen();
    let fetcher = FixtureFetcher::new()
        .route(site.api_url, FetchResponse::json(fixture("ckan_package_search.json")))
        .into_arc();
    let out = CkanAdapter::new(site, fetcher).search("air").await.expect("ckan ok");
    assert_eq!(out[0].subtitle, "air quality");
    // blank dataset url falls through to the site page
    assert_eq!(
        out[0].url,
        "https://ckan-prod.sse.datopian.com/dataset/air-quality-monitoring"
    );
    assert!(out.iter().all(|l| l.source == "SSEN"));
}

/// Full provider set behind one fetcher: some upstreams answer, the rest are unreachable.
#[tokio::test]
async fn full_provider_set_degrades_per_provider() {
    let fetcher: Arc<dyn Fetcher> = FixtureFetcher::new()
        .route(defra::BASE_URL, FetchResponse::html(fixture("defra_search.html")))
        .route(datarade::SEARCH_URL, FetchResponse::html(fixture("datarade_search.html")))
        .route(
            databricks::LISTINGS_URL,
            FetchResponse::new(503, Some("text/html"), "maintenance"),
        )
        .route(
            opendatasoft::CATALOG_URL,
            FetchResponse::json(r#"{"total_count":0,"results":[]}"#),
        )
        .into_arc();

    let cfg = AggregatorConfig::default();
    let agg = Aggregator::with_fetcher(fetcher, &cfg);
    assert_eq!(agg.adapters().len(), 13);
    assert_eq!(agg.adapter_timeout(), Duration::from_millis(10_000));

    let out = agg.run("water").await;
    assert_eq!(out.stats.len(), 13);

    let mut sorted: Vec<_> = out.stats.iter().map(|s| s.source.clone()).collect();
    sorted.sort();
    let reported: Vec<_> = out.stats.iter().map(|s| s.source.clone()).collect();
    assert_eq!(reported, sorted);

    let stat = |name: &str| out.stats.iter().find(|s| s.source == name).unwrap();
    assert_eq!(stat("Defra").result_count, 2);
    assert_eq!(stat("Datarade").result_count, 3);
    assert!(stat("OpenDataSoft").error.is_none());
    assert_eq!(stat("OpenDataSoft").result_count, 0);
    assert!(stat("Databricks")
        .error
        .as_deref()
        .unwrap()
        .contains("Status 503"));
    assert!(stat(snowflake::SOURCE).is_error());
    assert!(stat(agrimetrics::SOURCE).is_error());

    // Defra precedes Datarade in adapter order, so it leads each round.
    let sources: Vec<_> = out.results.iter().map(|r| r.source.as_str()).collect();
    assert_eq!(
        sources,
        vec!["Defra", "Datarade", "Defra", "Datarade", "Datarade"]
    );
}

#[tokio::test]
async fn enabled_sources_limits_the_fan_out() {
    let fetcher = FixtureFetcher::new()
        .route(defra::BASE_URL, FetchResponse::html(fixture("defra_search.html")))
        .into_arc();
    let cfg = AggregatorConfig {
        enabled_sources: vec!["defra".into()],
        ..Default::default()
    };
    let agg = Aggregator::with_fetcher(fetcher.clone(), &cfg);
    let out = agg.run("water").await;

    assert_eq!(out.stats.len(), 1);
    assert_eq!(out.results.len(), 2);
    assert_eq!(fetcher.seen().len(), 1);
}

/// Every adapter behind one set of pinned upstream bytes, so repeated runs can be compared.
fn pinned_upstreams() -> Arc<FixtureFetcher> {
    const SNOWFLAKE: &str = r#"{"resultGroups":[{"results":[
        {"type":"listing","typeSpecific":{"globalName":"GZ1WATER","listing":{
          "title":"Water quality","description":"Sampling points","provider":{"title":"Hydro Ltd"}}}}
    ]}]}"#;
    const DATABRICKS: &str = r#"{"listings":[
        {"id":"db-1","summary":{"name":"Water usage","updated_at":"1710000000000"}},
        {"id":"db-2","summary":{"name":"Retail footfall"}}
    ]}"#;
    const AGRIMETRICS: &str = r#"{"dataSets":[{"id":"ag-1","title":"Irrigation water","tags":["water"]}]}"#;
    const OPENDATASOFT: &str = r#"{"total_count":1,"results":[
        {"dataset_id":"eau","metas":{"default":{"title":"Water points","keyword":["water"]}}}
    ]}"#;
    const AWS: &str = r#"{"ListingSummaries":[{"Id":"prodview-w1","DisplayAttributes":{"Title":"Water risk"}}]}"#;

    let mut fetcher = FixtureFetcher::new()
        .route(defra::BASE_URL, FetchResponse::html(fixture("defra_search.html")))
        .route(ons::PAGE_URL, FetchResponse::html(fixture("ons_search.html")))
        .route(
            "https://ons.metadata.works/_next/data/rTq3ZxVb8kLm2/",
            FetchResponse::json(fixture("ons_search.json")),
        )
        .route(datarade::SEARCH_URL, FetchResponse::html(fixture("datarade_search.html")))
        .route(
            aws_marketplace::DISCOVERY_URL,
            FetchResponse::new(200, Some("application/x-amz-json-1.1"), zlib(AWS)),
        )
        .route(snowflake::SEARCH_URL, FetchResponse::json(SNOWFLAKE))
        .route(databricks::LISTINGS_URL, FetchResponse::json(DATABRICKS))
        .route(agrimetrics::CATALOG_URL, FetchResponse::json(AGRIMETRICS))
        .route(opendatasoft::CATALOG_URL, FetchResponse::json(OPENDATASOFT));
    for site in [
        CkanSite::ssen(),
        CkanSite::data_gov_uk(),
        CkanSite::london_datastore(),
        CkanSite::nhsbsa(),
        CkanSite::york_open_data(),
    ] {
        fetcher = fetcher.route(site.api_url, FetchResponse::json(fixture("ckan_package_search.json")));
    }
    fetcher.into_arc()
}

#[tokio::test]
async fn repeated_queries_are_byte_identical() {
    let agg = Aggregator::with_fetcher(pinned_upstreams(), &AggregatorConfig::default());
    assert_eq!(agg.adapters().len(), 13);

    for adapter in agg.adapters() {
        let name = adapter.name();
        let first = adapter
            .search("water")
            .await
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        let second = adapter.search("water").await.expect("second run");
        assert!(!first.is_empty(), "{name} returned nothing");
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap(),
            "{name}"
        );
    }

    let a = agg.run("water").await;
    let b = agg.run("water").await;
    assert_eq!(
        serde_json::to_vec(&a.results).unwrap(),
        serde_json::to_vec(&b.results).unwrap()
    );
    let shape = |o: &catalog_aggregator::QueryOutcome| {
        o.stats
            .iter()
            .map(|s| (s.source.clone(), s.result_count, s.error.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&a), shape(&b));
    assert!(a.stats.iter().all(|s| s.error.is_none()));
}
