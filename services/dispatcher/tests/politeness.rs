//! Per-host politeness: the cooldown window is authoritative and a url id
//! is never claimed twice concurrently.

mod common;

use dispatcher::DispatcherConfig;
use serde_json::json;

#[tokio::test]
async fn same_host_is_dispatched_once_per_cooldown_window() {
    let mut config = DispatcherConfig::default();
    config.scheduling.host_cooldown_secs = 2;
    let server = common::spawn(config).await;

    {
        let mut store = server.open_store();
        store
            .insert_seed_urls([
                "http://polite.example.com/one",
                "http://polite.example.com/two",
            ])
            .unwrap();
    }

    // Two back-to-back claims inside the cooldown: exactly one wins.
    let first = common::request(server.addr, json!({"action": "get_url"})).await;
    assert_eq!(first["status"], "ok");
    let second = common::request(server.addr, json!({"action": "get_url"})).await;
    assert_eq!(second["status"], "no_urls");

    // After the cooldown elapses, the second url is dispatched.
    tokio::time::sleep(std::time::Duration::from_secs(3)).await;
    let third = common::request(server.addr, json!({"action": "get_url"})).await;
    assert_eq!(third["status"], "ok");
    assert_ne!(third["url"], first["url"]);
}

#[tokio::test]
async fn concurrent_claims_on_one_url_have_a_single_winner() {
    let mut config = DispatcherConfig::default();
    config.scheduling.host_cooldown_secs = 0;
    let server = common::spawn(config).await;

    {
        let mut store = server.open_store();
        store
            .insert_seed_urls(["http://single.example.com/only"])
            .unwrap();
    }

    let (a, b) = tokio::join!(
        common::request(server.addr, json!({"action": "get_url"})),
        common::request(server.addr, json!({"action": "get_url"})),
    );
    let ok_count = [&a, &b]
        .iter()
        .filter(|resp| resp["status"] == "ok")
        .count();
    assert_eq!(ok_count, 1, "responses: {a} / {b}");
}

#[tokio::test]
async fn disabled_hosts_are_never_dispatched() {
    let config = DispatcherConfig::default();
    let server = common::spawn(config).await;

    {
        let mut store = server.open_store();
        store
            .insert_seed_urls(["http://dead.example.com/x"])
            .unwrap();
        store.disable_host("dead.example.com", "dns").unwrap();
    }

    let resp = common::request(server.addr, json!({"action": "get_url"})).await;
    assert_eq!(resp["status"], "no_urls");
}
