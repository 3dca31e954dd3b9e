use core_test_support::permission_page;
use core_test_support::permissions_path;
use core_test_support::plain_drive_client;
use docshare_async_utils::CancelScope;
use docshare_core::DocumentId;
use docshare_core::SyncError;
use docshare_core::find_permission;
use pretty_assertions::assert_eq;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;
use wiremock::matchers::query_param_is_missing;

const TARGET: &str = "alice@example.com";

#[tokio::test]
async fn finds_match_on_second_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(permissions_path("doc1")))
        .and(query_param_is_missing("pageToken"))
        .and(query_param("pageSize", "10"))
        .and(query_param("fields", "nextPageToken,permissions(id,emailAddress)"))
        .and(query_param("supportsTeamDrives", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(permission_page(
            Some("page-2"),
            &[("p1", "bob@example.com"), ("p2", "carol@example.com")],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(permissions_path("doc1")))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(permission_page(
            None,
            &[("p3", TARGET)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = plain_drive_client(&server);
    let found = find_permission(&client, &DocumentId::from("doc1"), TARGET, &CancelScope::new())
        .await
        .expect("resolution succeeds")
        .expect("permission is present");

    assert_eq!(found.id.as_str(), "p3");
    assert_eq!(found.email_address, TARGET);
}

#[tokio::test]
async fn first_match_wins() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(permissions_path("doc1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(permission_page(
            Some("unused"),
            &[("first", TARGET), ("second", TARGET)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = plain_drive_client(&server);
    let found = find_permission(&client, &DocumentId::from("doc1"), TARGET, &CancelScope::new())
        .await
        .expect("resolution succeeds")
        .expect("permission is present");

    assert_eq!(found.id.as_str(), "first");
}

#[tokio::test]
async fn empty_page_without_token_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(permissions_path("doc1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(permission_page(None, &[])))
        .expect(1)
        .mount(&server)
        .await;

    let client = plain_drive_client(&server);
    let found = find_permission(&client, &DocumentId::from("doc1"), TARGET, &CancelScope::new())
        .await
        .expect("absence is not an error");

    assert_eq!(found, None);
}

#[tokio::test]
async fn empty_page_stops_even_with_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(permissions_path("doc1")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(permission_page(Some("more"), &[])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = plain_drive_client(&server);
    let found = find_permission(&client, &DocumentId::from("doc1"), TARGET, &CancelScope::new())
        .await
        .expect("absence is not an error");

    assert_eq!(found, None);
}

#[tokio::test]
async fn match_without_id_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(permissions_path("doc1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(permission_page(
            None,
            &[("", TARGET)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = plain_drive_client(&server);
    let err = find_permission(&client, &DocumentId::from("doc1"), TARGET, &CancelScope::new())
        .await
        .expect_err("empty id must not pass as a permission");

    match err {
        SyncError::MissingPermissionId { email } => assert_eq!(email, TARGET),
        other => panic!("expected missing id error, got {other:?}"),
    }
}

#[tokio::test]
async fn transient_failure_mid_walk_retries_that_page_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(permissions_path("doc1")))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(permission_page(
            Some("page-2"),
            &[("p1", "bob@example.com")],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(permissions_path("doc1")))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(permissions_path("doc1")))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(permission_page(
            None,
            &[("p2", TARGET)],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = plain_drive_client(&server);
    let found = find_permission(&client, &DocumentId::from("doc1"), TARGET, &CancelScope::new())
        .await
        .expect("resolution succeeds")
        .expect("permission is present");

    assert_eq!(found.id.as_str(), "p2");
}

#[tokio::test]
async fn terminal_listing_failure_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(permissions_path("doc1")))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .expect(1)
        .mount(&server)
        .await;

    let client = plain_drive_client(&server);
    let err = find_permission(&client, &DocumentId::from("doc1"), TARGET, &CancelScope::new())
        .await
        .expect_err("404 is terminal");

    assert!(matches!(err, SyncError::Api(_)), "got {err:?}");
}
