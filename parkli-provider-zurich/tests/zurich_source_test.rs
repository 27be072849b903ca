#![expect(clippy::unwrap_used, reason = "tests fail loudly on unexpected errors")]
// Integration tests for the Zurich source against a mocked RSS feed and the bundled dataset.

use std::time::Duration;

use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parkli_core::{
    AdapterContext, CityAdapter, DataSource, ErrorKind, FacilityId, FacilityStatus, Settings,
};
use parkli_provider_zurich::ZurichSource;

const FEED_PATH: &str = "/plsFeed/rss";

const FEED: &str = r"<?xml version='1.0' encoding='UTF-8'?>
<rss version='2.0'>
  <channel>
    <title>Parkleitsystem Stadt Zürich</title>
    <item>
      <title>Parkhaus Jelmoli</title>
      <description>open / 100</description>
    </item>
    <item>
      <title>Parkhaus Zürichhorn</title>
      <description>geschlossen / 0</description>
    </item>
    <item>
      <title>Parkhaus Urania</title>
      <description>open / ???</description>
    </item>
    <item>
      <title>Parkhaus Neumarkt</title>
      <description>open / 17</description>
    </item>
    <item>
      <title>Parkhaus Jelmoli</title>
      <description>open / 5</description>
    </item>
  </channel>
</rss>";

fn adapter(server: &MockServer) -> CityAdapter<ZurichSource> {
    CityAdapter::new(
        ZurichSource::with_url(format!("{}{FEED_PATH}", server.uri())),
        AdapterContext::from_settings(&Settings::default()).unwrap(),
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
async fn rss_items_are_resolved_by_slug() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200).set_body_raw(FEED, "application/rss+xml"),
    )
    .await;

    let city = adapter(&server).get_data().await.unwrap();
    let facility = |id: &str| city.facility(&FacilityId::from(id)).unwrap();

    let jelmoli = facility("parkhaus-jelmoli");
    assert_eq!(
        (jelmoli.status, jelmoli.available_spaces, jelmoli.total_spaces),
        (FacilityStatus::Open, 100, 222)
    );
    assert_eq!(jelmoli.address.as_deref(), Some("Steinmühleplatz 1"));

    let horn = facility("parkhaus-zuerichhorn");
    assert_eq!((horn.status, horn.available_spaces), (FacilityStatus::Closed, 0));

    let urania = facility("parkhaus-urania");
    assert_eq!((urania.status, urania.available_spaces), (FacilityStatus::Unknown, 0));

    let neumarkt = facility("parkhaus-neumarkt");
    assert_eq!(neumarkt.name, "Parkhaus Neumarkt");
    assert_eq!(neumarkt.total_spaces, 0);
    assert_eq!(neumarkt.available_spaces, 17);

    let globus = facility("parkhaus-globus");
    assert_eq!(
        (globus.status, globus.available_spaces),
        (FacilityStatus::Open, 53)
    );

    let ids: Vec<_> = city.facilities.iter().map(|f| f.id.0.as_str()).collect();
    assert_eq!(ids.iter().filter(|id| **id == "parkhaus-jelmoli").count(), 1);
    assert_eq!(ids.first().copied(), Some("parkhaus-jelmoli"));
    assert_eq!(city.name, "Zürich");
    assert!(city.latitude.is_some());
}

#[tokio::test]
async fn server_error_propagates() {
    let server = MockServer::start().await;
    serve(&server, ResponseTemplate::new(503)).await;

    let err = adapter(&server).get_data().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fetch);
    assert_eq!(err.source_name(), "ZurichParkingSource");
}

#[tokio::test]
async fn json_instead_of_rss_is_a_parse_error() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200).set_body_raw(r#"{"items": []}"#, "application/json"),
    )
    .await;

    let err = adapter(&server).get_data().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[tokio::test]
async fn slow_feed_is_a_fetch_error() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200)
            .set_body_raw(FEED, "application/rss+xml")
            .set_delay(Duration::from_millis(500)),
    )
    .await;

    let base = AdapterContext::from_settings(&Settings::default()).unwrap();
    let adapter = CityAdapter::new(
        ZurichSource::with_url(format!("{}{FEED_PATH}", server.uri())),
        AdapterContext {
            fetcher: base.fetcher.clone().with_timeout(Duration::from_millis(50)),
            ..base
        },
    );

    let err = adapter.get_data().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fetch);
    assert!(err.message().contains("timed out"), "{}", err.message());
    assert!(adapter.last_updated().is_none());
}
