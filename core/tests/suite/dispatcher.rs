use std::sync::Arc;
use std::time::Duration;

use core_test_support::GatedTransport;
use core_test_support::drive_client;
use core_test_support::permission_page;
use core_test_support::permissions_path;
use core_test_support::plain_drive_client;
use docshare_async_utils::CancelErr;
use docshare_async_utils::CancelScope;
use docshare_core::Completion;
use docshare_core::DispatchOptions;
use docshare_core::Dispatcher;
use docshare_core::DocumentId;
use docshare_core::Operation;
use docshare_core::SyncError;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_json;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::path_regex;
use wiremock::matchers::query_param;

fn options(concurrency: usize) -> DispatchOptions {
    DispatchOptions {
        concurrency,
        task_timeout: Duration::from_secs(10),
        notify: false,
    }
}

fn docs(ids: &[&str]) -> Vec<DocumentId> {
    ids.iter().copied().map(DocumentId::from).collect()
}

#[tokio::test]
async fn grant_issues_one_create_per_document() {
    let server = MockServer::start().await;
    for doc in ["d1", "d2"] {
        Mock::given(method("POST"))
            .and(path(permissions_path(doc)))
            .and(query_param("sendNotificationEmail", "false"))
            .and(query_param("supportsTeamDrives", "true"))
            .and(body_json(json!({
                "role": "reader",
                "type": "user",
                "emailAddress": "alice@example.com"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dispatcher = Dispatcher::new(Arc::new(plain_drive_client(&server)), options(10));
    let report = dispatcher
        .run(
            Operation::Grant,
            "alice@example.com",
            docs(&["d1", "d2"]),
            &CancelScope::new(),
        )
        .await;

    assert_eq!(report.failures(), 0);
    assert_eq!(report.successes(), 2);
    let ids: Vec<&str> = report
        .outcomes
        .iter()
        .map(|outcome| outcome.document_id.as_str())
        .collect();
    assert_eq!(ids, vec!["d1", "d2"]);
    assert!(
        report
            .outcomes
            .iter()
            .all(|outcome| matches!(outcome.result, Ok(Completion::Granted)))
    );
}

#[tokio::test]
async fn in_flight_work_never_exceeds_ceiling() {
    const CEILING: usize = 4;
    const DOCS: usize = 25;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/drive/v3/files/[^/]+/permissions$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(DOCS as u64)
        .mount(&server)
        .await;

    let transport = Arc::new(GatedTransport::new());
    let client = drive_client(&server, transport.clone());
    let dispatcher = Dispatcher::new(Arc::new(client), options(CEILING));
    let ids: Vec<DocumentId> = (0..DOCS).map(|n| DocumentId::new(format!("doc{n}"))).collect();

    let run = tokio::spawn(async move {
        dispatcher
            .run(Operation::Grant, "alice@example.com", ids, &CancelScope::new())
            .await
    });

    tokio::time::timeout(Duration::from_secs(5), async {
        while transport.in_flight() < CEILING {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("ceiling reached");

    // Give any task that slipped past the limiter a chance to show up.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.in_flight(), CEILING);
    assert_eq!(transport.calls(), CEILING);

    transport.open();
    let report = run.await.expect("dispatcher task");

    assert_eq!(report.failures(), 0);
    assert_eq!(report.outcomes.len(), DOCS);
    assert_eq!(transport.peak(), CEILING);
    assert_eq!(transport.calls(), DOCS);
}

#[tokio::test]
async fn revoke_resolves_then_deletes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(permissions_path("d1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(permission_page(
            None,
            &[("owner", "owner@example.com"), ("perm-a", "alice@example.com")],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/perm-a", permissions_path("d1"))))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(permissions_path("d2")))
        .respond_with(ResponseTemplate::new(200).set_body_json(permission_page(
            None,
            &[("owner", "owner@example.com")],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/drive/v3/files/d2/permissions/.+$"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(Arc::new(plain_drive_client(&server)), options(10));
    let report = dispatcher
        .run(
            Operation::Revoke,
            "alice@example.com",
            docs(&["d1", "d2"]),
            &CancelScope::new(),
        )
        .await;

    assert_eq!(report.failures(), 0);
    assert!(matches!(report.outcomes[0].result, Ok(Completion::Revoked)));
    assert!(matches!(report.outcomes[1].result, Ok(Completion::AlreadyAbsent)));
}

#[tokio::test]
async fn one_failing_document_does_not_stop_the_rest() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(permissions_path("bad")))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "errors": [{
                    "domain": "global",
                    "reason": "insufficientFilePermissions",
                    "message": "The user does not have sufficient permissions for this file."
                }],
                "code": 403,
                "message": "The user does not have sufficient permissions for this file."
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    for doc in ["good1", "good2"] {
        Mock::given(method("POST"))
            .and(path(permissions_path(doc)))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dispatcher = Dispatcher::new(Arc::new(plain_drive_client(&server)), options(2));
    let report = dispatcher
        .run(
            Operation::Grant,
            "alice@example.com",
            docs(&["good1", "bad", "good2"]),
            &CancelScope::new(),
        )
        .await;

    assert_eq!(report.failures(), 1);
    let failed: Vec<&str> = report
        .failed()
        .map(|outcome| outcome.document_id.as_str())
        .collect();
    assert_eq!(failed, vec!["bad"]);
    match &report.outcomes[1].result {
        Err(SyncError::Api(err)) => assert_eq!(
            err.to_string(),
            "The user does not have sufficient permissions for this file."
        ),
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn stuck_document_times_out_alone() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(permissions_path("slow")))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(permissions_path("fast")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(
        Arc::new(plain_drive_client(&server)),
        DispatchOptions {
            concurrency: 2,
            task_timeout: Duration::from_millis(200),
            notify: false,
        },
    );
    let report = dispatcher
        .run(
            Operation::Grant,
            "alice@example.com",
            docs(&["slow", "fast"]),
            &CancelScope::new(),
        )
        .await;

    assert!(matches!(
        report.outcomes[0].result,
        Err(SyncError::Cancelled {
            reason: CancelErr::DeadlineExceeded,
            ..
        })
    ));
    assert!(matches!(report.outcomes[1].result, Ok(Completion::Granted)));
}

#[tokio::test]
async fn cancelled_batch_reports_every_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let scope = CancelScope::new();
    scope.cancel();

    let dispatcher = Dispatcher::new(Arc::new(plain_drive_client(&server)), options(1));
    let report = dispatcher
        .run(Operation::Grant, "alice@example.com", docs(&["d1", "d2", "d3"]), &scope)
        .await;

    assert_eq!(report.failures(), 3);
    assert!(report.failed().all(|outcome| matches!(
        outcome.result,
        Err(SyncError::Cancelled {
            reason: CancelErr::Cancelled,
            ..
        })
    )));
}

#[tokio::test]
async fn extreme_limits_run_unbounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/drive/v3/files/[^/]+/permissions$"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(
        Arc::new(plain_drive_client(&server)),
        DispatchOptions {
            concurrency: usize::MAX,
            task_timeout: Duration::from_secs(u64::MAX),
            notify: false,
        },
    );
    let report = dispatcher
        .run(
            Operation::Grant,
            "alice@example.com",
            docs(&["d1", "d2"]),
            &CancelScope::new(),
        )
        .await;

    assert_eq!(report.failures(), 0);
    assert_eq!(report.successes(), 2);
}
