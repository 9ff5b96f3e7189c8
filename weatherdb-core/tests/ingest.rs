//! End-to-end ingestion against a mock WeatherAPI and an on-disk database.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use tempfile::tempdir;
use weatherdb_core::{
    Config, IngestConfig, Pipeline, RecordFilter, WeatherStore, provider_from_config,
    provider::weatherapi::WeatherApiProvider,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn day(date: &str) -> serde_json::Value {
    serde_json::json!({
        "date": date,
        "day": {
            "avgtemp_c": 21.4,
            "avgtemp_f": 70.5,
            "maxwind_kph": 18.0,
            "avghumidity": 62,
            "condition": { "text": "Partly cloudy" }
        }
    })
}

fn response(dates: &[&str]) -> ResponseTemplate {
    let days: Vec<_> = dates.iter().map(|d| day(d)).collect();
    ResponseTemplate::new(200)
        .set_body_json(serde_json::json!({ "forecast": { "forecastday": days } }))
}

async fn mount_city(server: &MockServer, city: &str) {
    Mock::given(method("GET"))
        .and(path("/history.json"))
        .and(query_param("q", city))
        .respond_with(response(&["2024-01-08"]))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/forecast.json"))
        .and(query_param("q", city))
        .and(query_param("days", "3"))
        .respond_with(response(&["2024-01-10", "2024-01-11", "2024-01-12"]))
        .mount(server)
        .await;
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
}

fn stamp(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn ingest_config(cities: &[&str]) -> IngestConfig {
    IngestConfig {
        cities: cities.iter().map(|c| c.to_string()).collect(),
        history_offsets: vec![2, 1],
        forecast_days: 3,
    }
}

fn provider(server: &MockServer) -> WeatherApiProvider {
    WeatherApiProvider::with_base_url("KEY".into(), &server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn successful_run_inserts_window_per_city() {
    let server = MockServer::start().await;
    for city in ["Hyderabad", "Mumbai", "Delhi", "Bangalore"] {
        mount_city(&server, city).await;
    }

    let dir = tempdir().unwrap();
    let mut store = WeatherStore::open(dir.path().join("weather_data.db")).unwrap();
    let cfg = ingest_config(&["Hyderabad", "Mumbai", "Delhi", "Bangalore"]);
    let provider = provider(&server);

    let report = Pipeline::new(&provider, &cfg)
        .run_at(&mut store, today(), stamp("2024-01-10 09:00:00"))
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.inserted, 20);

    for city in &cfg.cities {
        let rows = store
            .query(&RecordFilter { city: Some(city.clone()), ..Default::default() })
            .unwrap();
        assert_eq!(rows.len(), 5, "rows for {city}");
        assert!(rows.iter().all(|r| &r.record.city == city));
    }

    // History records carry the requested date, not the response's.
    let hyd = store
        .query(&RecordFilter { city: Some("Hyderabad".into()), ..Default::default() })
        .unwrap();
    let dates: Vec<_> = hyd.iter().map(|r| r.record.date_string()).collect();
    assert_eq!(dates, vec!["2024-01-08", "2024-01-09", "2024-01-10", "2024-01-11", "2024-01-12"]);
}

#[tokio::test]
async fn upstream_failures_skip_only_affected_fetches() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/history.json"))
        .and(query_param("q", "Mumbai"))
        .and(query_param("dt", "2024-01-08"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("q", "Atlantis"))
        .respond_with(ResponseTemplate::new(400).set_body_string("No matching location found."))
        .mount(&server)
        .await;
    mount_city(&server, "Mumbai").await;
    mount_city(&server, "Delhi").await;

    let mut store = WeatherStore::in_memory().unwrap();
    let cfg = ingest_config(&["Mumbai", "Atlantis", "Delhi"]);
    let provider = provider(&server);

    let report = Pipeline::new(&provider, &cfg)
        .run_at(&mut store, today(), stamp("2024-01-10 09:00:00"))
        .await
        .unwrap();

    // Mumbai loses one history day, Atlantis loses everything.
    assert_eq!(report.inserted, 4 + 5);
    assert_eq!(report.failures.len(), 1 + 3);
    assert_eq!(report.failures.iter().filter(|f| f.city == "Atlantis").count(), 3);

    assert_eq!(store.cities().unwrap(), vec!["Mumbai", "Delhi"]);
    let mumbai_jan8 = store
        .query(&RecordFilter {
            city: Some("Mumbai".into()),
            from: Some(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()),
            to: Some(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()),
            ..Default::default()
        })
        .unwrap();
    assert!(mumbai_jan8.is_empty());
}

#[tokio::test]
async fn two_runs_append_distinct_batches() {
    let server = MockServer::start().await;
    mount_city(&server, "Delhi").await;

    let mut store = WeatherStore::in_memory().unwrap();
    let cfg = ingest_config(&["Delhi"]);
    let provider = provider(&server);
    let pipeline = Pipeline::new(&provider, &cfg);

    let first = pipeline.run_at(&mut store, today(), stamp("2024-01-10 09:00:00")).await.unwrap();
    let second = pipeline.run_at(&mut store, today(), stamp("2024-01-10 10:00:00")).await.unwrap();

    assert_eq!(first.inserted, 5);
    assert_eq!(second.inserted, 5);
    assert_eq!(store.count().unwrap(), 10);

    let batches = store.batches("Delhi").unwrap();
    assert_eq!(batches, vec![second.fetched_at, first.fetched_at]);

    for batch in batches {
        let rows = store
            .query(&RecordFilter { fetched_at: Some(batch), ..Default::default() })
            .unwrap();
        assert_eq!(rows.len(), 5);
    }
}

#[tokio::test]
async fn run_with_everything_failing_leaves_store_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut store = WeatherStore::in_memory().unwrap();
    let cfg = ingest_config(&["Delhi", "Mumbai"]);
    let provider = provider(&server);

    let report = Pipeline::new(&provider, &cfg)
        .run_at(&mut store, today(), stamp("2024-01-10 09:00:00"))
        .await
        .unwrap();

    assert_eq!(report.inserted, 0);
    assert_eq!(report.failures.len(), 6);
    assert_eq!(store.count().unwrap(), 0);
    assert!(store.summary().unwrap().is_none());
}

#[tokio::test]
async fn provider_from_config_targets_configured_base_url() {
    let server = MockServer::start().await;
    mount_city(&server, "Pune").await;

    let config = Config {
        api_key: Some("KEY".into()),
        base_url: server.uri(),
        cities: vec!["Pune".into()],
        ..Default::default()
    };

    let provider = provider_from_config(&config).unwrap();
    let ingest = config.ingest_config();
    let mut store = WeatherStore::in_memory().unwrap();

    let report = Pipeline::new(provider.as_ref(), &ingest)
        .run_at(&mut store, today(), stamp("2024-01-10 09:00:00"))
        .await
        .unwrap();

    assert_eq!(report.inserted, ingest.expected_records());
}
