//! Retry bookkeeping and host-disabling policy on fetch failures.

mod common;

use dispatcher::DispatcherConfig;
use serde_json::json;

fn no_cooldown() -> DispatcherConfig {
    let mut config = DispatcherConfig::default();
    config.scheduling.host_cooldown_secs = 0;
    config
}

#[tokio::test]
async fn dns_failure_resets_row_and_disables_host_immediately() {
    let server = common::spawn(no_cooldown()).await;
    {
        let mut store = server.open_store();
        store
            .insert_seed_urls(["http://unresolvable.example.com/tune.abc"])
            .unwrap();
    }

    let assigned = common::request(server.addr, json!({"action": "get_url"})).await;
    assert_eq!(assigned["status"], "ok");
    let url_id = assigned["url_id"].as_i64().unwrap();

    let ack = common::request(
        server.addr,
        json!({
            "action": "submit_result",
            "url_id": url_id,
            "size_bytes": 0,
            "mime_type": "",
            "error_type": "dns",
        }),
    )
    .await;
    assert_eq!(ack["status"], "ok");

    let store = server.open_store();
    let snap = store.url_snapshot(url_id).unwrap().unwrap();
    assert_eq!(snap.status, "");
    assert_eq!(snap.retries, 1);

    let host = store
        .host_record("unresolvable.example.com")
        .unwrap()
        .unwrap();
    assert!(host.disabled);
    assert_eq!(host.disabled_reason.as_deref(), Some("dns"));
    assert!(host.disabled_at.is_some());

    // No url on that host is ever dispatched again.
    let resp = common::request(server.addr, json!({"action": "get_url"})).await;
    assert_eq!(resp["status"], "no_urls");
}

#[tokio::test]
async fn timeouts_disable_only_after_the_retry_budget() {
    let server = common::spawn(no_cooldown()).await;
    {
        let mut store = server.open_store();
        store
            .insert_seed_urls(["http://slow.example.com/x"])
            .unwrap();
    }

    for attempt in 1..=3i64 {
        let assigned = common::request(server.addr, json!({"action": "get_url"})).await;
        assert_eq!(assigned["status"], "ok", "attempt {attempt}");
        let url_id = assigned["url_id"].as_i64().unwrap();

        common::request(
            server.addr,
            json!({
                "action": "submit_result",
                "url_id": url_id,
                "size_bytes": 0,
                "mime_type": "",
                "error_type": "timeout",
            }),
        )
        .await;

        let store = server.open_store();
        let snap = store.url_snapshot(url_id).unwrap().unwrap();
        let host = store.host_record("slow.example.com").unwrap().unwrap();
        if attempt < 3 {
            assert_eq!(snap.status, "", "attempt {attempt}");
            assert!(!host.disabled, "attempt {attempt}");
        } else {
            assert_eq!(snap.status, "error");
            assert!(host.disabled);
            assert_eq!(host.disabled_reason.as_deref(), Some("timeout"));
        }
    }
}

#[tokio::test]
async fn http_errors_bump_retries_without_disabling() {
    let server = common::spawn(no_cooldown()).await;
    {
        let mut store = server.open_store();
        store
            .insert_seed_urls(["http://flaky.example.com/x"])
            .unwrap();
    }

    let assigned = common::request(server.addr, json!({"action": "get_url"})).await;
    let url_id = assigned["url_id"].as_i64().unwrap();
    common::request(
        server.addr,
        json!({
            "action": "submit_result",
            "url_id": url_id,
            "size_bytes": 0,
            "mime_type": "",
            "http_status": 503,
        }),
    )
    .await;

    let store = server.open_store();
    let snap = store.url_snapshot(url_id).unwrap().unwrap();
    assert_eq!(snap.status, "");
    assert_eq!(snap.retries, 1);
    assert_eq!(snap.http_status, Some(503));
    let host = store.host_record("flaky.example.com").unwrap().unwrap();
    assert!(!host.disabled);
    assert_eq!(host.last_http_status, Some(503));
}

#[tokio::test]
async fn successful_fetch_stores_document_and_resets_retries() {
    let server = common::spawn(no_cooldown()).await;
    {
        let mut store = server.open_store();
        store
            .insert_seed_urls(["http://good.example.com/book.abc"])
            .unwrap();
    }

    let assigned = common::request(server.addr, json!({"action": "get_url"})).await;
    let url_id = assigned["url_id"].as_i64().unwrap();

    let body = "X:1\nT:Foo\nK:D\nABc|def|\n";
    let encoded = {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode(body)
    };
    let ack = common::request(
        server.addr,
        json!({
            "action": "submit_result",
            "url_id": url_id,
            "size_bytes": body.len(),
            "mime_type": "text/plain",
            "document": encoded,
            "http_status": 200,
        }),
    )
    .await;
    assert_eq!(ack["status"], "ok");

    let store = server.open_store();
    let snap = store.url_snapshot(url_id).unwrap().unwrap();
    assert_eq!(snap.status, "fetched");
    assert_eq!(snap.retries, 0);
    assert_eq!(snap.http_status, Some(200));
    let stored = store
        .document_for_url("http://good.example.com/book.abc")
        .unwrap()
        .unwrap();
    assert_eq!(stored, body.as_bytes());
    let host = store.host_record("good.example.com").unwrap().unwrap();
    assert_eq!(host.downloads, 1);
}
