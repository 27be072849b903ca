#![expect(clippy::unwrap_used, reason = "tests fail loudly on unexpected errors")]
// Integration tests for the Bern source against a mocked XML feed.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parkli_core::{
    AdapterContext, CityAdapter, CityId, DataSource, ErrorKind, FacilityStatus, ReferenceStore,
    Settings,
};
use parkli_provider_bern::BernSource;

const FEED_PATH: &str = "/parkdata.xml";

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<parkings updated="2024-05-01T12:00:00">
  <parking name="P01" state="1" spacecount="520" spacefree="130"/>
  <parking name="P02" state="0" spacecount="300" spacefree="44"/>
  <parking name="P+R" state="1" spacecount="-1" spacefree="75"/>
  <parking name="P05" state="1" spacecount="n/a" spacefree="10"/>
  <parking name="P99" state="1" spacecount="10" spacefree="3"/>
</parkings>"#;

const REFERENCE: &str = r#"{
    "parkhaus-bahnhof": {"name": "Parking Bahnhof", "total_spaces": 500},
    "parkhaus-metro": {"name": "Parking Metro", "total_spaces": 300},
    "parkhaus-neufeld-p+r": {"name": "P+R Neufeld", "total_spaces": 60},
    "parkhaus-casino": {"name": "Casino Parking", "total_spaces": 50}
}"#;

fn adapter(server: &MockServer) -> CityAdapter<BernSource> {
    let base = AdapterContext::from_settings(&Settings::default()).unwrap();
    let reference =
        ReferenceStore::from_documents(None, [(CityId::from("bern"), REFERENCE.to_owned())]);
    CityAdapter::new(
        BernSource::with_url(format!("{}{FEED_PATH}", server.uri())),
        AdapterContext {
            reference: Arc::new(reference),
            ..base
        },
    )
}

async fn serve(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn feed_is_merged_with_reference() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200).set_body_raw(FEED, "application/xml"),
    )
    .await;

    let city = adapter(&server).get_data().await.unwrap();

    let summary: Vec<_> = city
        .facilities
        .iter()
        .map(|f| (f.id.0.as_str(), f.status, f.available_spaces, f.total_spaces))
        .collect();
    assert_eq!(
        summary,
        [
            ("parkhaus-bahnhof", FacilityStatus::Open, 130, 520),
            ("parkhaus-metro", FacilityStatus::Closed, 0, 300),
            ("parkhaus-neufeld-p+r", FacilityStatus::Open, 60, 60),
            ("parkhaus-casino", FacilityStatus::Open, 15, 50),
        ]
    );
    assert_eq!(city.name, "Bern");
    assert!(city.last_updated.is_some());
}

#[tokio::test]
async fn server_error_propagates() {
    let server = MockServer::start().await;
    serve(&server, ResponseTemplate::new(500)).await;

    let err = adapter(&server).get_data().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fetch);
    assert_eq!(err.source_name(), "BernParkingSource");
}

#[tokio::test]
async fn truncated_xml_is_a_parse_error() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200)
            .set_body_raw(r#"<parkings><parking name="P01" state="1">"#, "application/xml"),
    )
    .await;

    let err = adapter(&server).get_data().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[tokio::test]
async fn feed_without_parkings_is_no_data() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200).set_body_raw(r#"<parkings updated="now"/>"#, "text/xml"),
    )
    .await;

    let err = adapter(&server).get_data().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoData);
}
