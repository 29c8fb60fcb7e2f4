//! iTunes Lookup client against a local mock server.

use mockito::{Matcher, Server};
use relwatch_connectors::ItunesLookupClient;
use relwatch_core::{PortError, ReleaseLookup};

fn query(id: &str, country: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("id".into(), id.into()),
        Matcher::UrlEncoded("country".into(), country.into()),
    ])
}

#[tokio::test]
async fn online_app_reports_store_version() {
    let mut server = Server::new_async().await;
    let lookup = server
        .mock("GET", "/lookup")
        .match_query(query("42", "us"))
        .with_status(200)
        .with_header("content-type", "text/javascript; charset=utf-8")
        .with_body(
            r#"{"resultCount":1,"results":[{"version":"1.2","trackName":"Atlas","bundleId":"com.acme.atlas",
               "releaseDate":"2024-01-02T08:00:00Z","currentVersionReleaseDate":"2026-02-01T08:00:00Z",
               "trackViewUrl":"https://apps.apple.com/us/app/atlas/id42"}]}"#,
        )
        .create_async()
        .await;

    let client = ItunesLookupClient::with_base_url(server.url()).expect("client");
    let status = client
        .lookup_release_status(42)
        .await
        .expect("lookup")
        .expect("answer");

    assert!(status.is_online);
    assert_eq!(status.version.as_deref(), Some("1.2"));
    assert_eq!(status.display_name.as_deref(), Some("Atlas"));
    assert_eq!(
        status.current_version_release_date.as_deref(),
        Some("2026-02-01T08:00:00Z")
    );
    lookup.assert_async().await;
}

#[tokio::test]
async fn zero_results_means_offline() {
    let mut server = Server::new_async().await;
    let _lookup = server
        .mock("GET", "/lookup")
        .match_query(query("7", "cn"))
        .with_status(200)
        .with_body(r#"{"resultCount":0,"results":[]}"#)
        .create_async()
        .await;

    let client = ItunesLookupClient::with_base_url(server.url())
        .expect("client")
        .with_country("cn");
    let status = client.lookup(7).await.expect("lookup");

    assert!(!status.is_online);
    assert!(status.version.is_none());
}

#[tokio::test]
async fn server_error_is_connectivity() {
    let mut server = Server::new_async().await;
    let _lookup = server
        .mock("GET", "/lookup")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("Service Unavailable")
        .create_async()
        .await;

    let client = ItunesLookupClient::with_base_url(server.url()).expect("client");
    let err = client
        .lookup_release_status(9)
        .await
        .expect_err("lookup fails");

    assert!(matches!(err, PortError::Connectivity(ref m) if m.contains("503")));
}

#[tokio::test]
async fn garbage_body_is_malformed() {
    let mut server = Server::new_async().await;
    let _lookup = server
        .mock("GET", "/lookup")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let client = ItunesLookupClient::with_base_url(server.url()).expect("client");
    let err = client
        .lookup_release_status(9)
        .await
        .expect_err("lookup fails");

    assert!(matches!(err, PortError::Malformed(_)));
}
