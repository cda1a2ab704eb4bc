mod common;

use common::{TEST_SECRET, TestServer, assert_action};
use serde_json::json;

fn config_body() -> serde_json::Value {
    json!({
        "display_name": "Admin Tenant",
        "secret_key": TEST_SECRET,
        "ip_rpm": 0,
        "tenant_rpm": 0,
        "trigger": {
            "expr": "$.event.type",
            "target": {"topic": "T", "target_rpm": 0}
        }
    })
}

#[tokio::test]
async fn put_get_round_trips_configuration() {
    let server = TestServer::spawn().await.expect("spawn");

    let response = server
        .client
        .put(format!("{}/admin/tenants/tenant-admin", server.base_url))
        .json(&config_body())
        .send()
        .await
        .expect("put");
    assert_eq!(response.status().as_u16(), 204);

    let response = server
        .client
        .get(format!("{}/admin/tenants/tenant-admin", server.base_url))
        .send()
        .await
        .expect("get");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("body");
    assert_eq!(body["display_name"], "Admin Tenant");
    assert_eq!(body["trigger"]["expr"], "$.event.type");
    assert_eq!(body["trigger"]["target"]["topic"], "T");
}

#[tokio::test]
async fn stored_tenant_accepts_notifications() {
    let server = TestServer::spawn().await.expect("spawn");
    let response = server
        .client
        .put(format!("{}/admin/tenants/tenant-admin-live", server.base_url))
        .json(&config_body())
        .send()
        .await
        .expect("put");
    assert_eq!(response.status().as_u16(), 204);

    let response = server
        .notify(
            "tenant-admin-live",
            TEST_SECRET,
            &json!({"event": {"type": "e1"}}),
        )
        .await
        .expect("notify");
    assert_action(response, "edge_triggered_forward").await;
}

#[tokio::test]
async fn invalid_configuration_is_rejected() {
    let server = TestServer::spawn().await.expect("spawn");

    let mut body = config_body();
    body["secret_key"] = json!("short");
    let response = server
        .client
        .put(format!("{}/admin/tenants/tenant-admin-bad", server.base_url))
        .json(&body)
        .send()
        .await
        .expect("put");
    assert_eq!(response.status().as_u16(), 400);
    let error: serde_json::Value = response.json().await.expect("body");
    assert_eq!(error["code"], "validation_error");

    // Nothing was stored.
    let response = server
        .client
        .get(format!("{}/admin/tenants/tenant-admin-bad", server.base_url))
        .send()
        .await
        .expect("get");
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn bad_flapping_bounds_are_rejected() {
    let server = TestServer::spawn().await.expect("spawn");

    let mut body = config_body();
    body["trigger"]["flapping"] = json!({
        "window_seconds": 5
    });
    let response = server
        .client
        .put(format!("{}/admin/tenants/tenant-admin-flap", server.base_url))
        .json(&body)
        .send()
        .await
        .expect("put");
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn list_returns_sorted_tenants() {
    let server = TestServer::spawn().await.expect("spawn");
    for tenant in ["tenant-bbb", "tenant-aaa"] {
        let response = server
            .client
            .put(format!("{}/admin/tenants/{tenant}", server.base_url))
            .json(&config_body())
            .send()
            .await
            .expect("put");
        assert_eq!(response.status().as_u16(), 204);
    }

    let response = server
        .client
        .get(format!("{}/admin/tenants", server.base_url))
        .send()
        .await
        .expect("list");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("body");
    assert_eq!(body["items"], json!(["tenant-aaa", "tenant-bbb"]));
}

#[tokio::test]
async fn delete_removes_the_tenant() {
    let server = TestServer::spawn().await.expect("spawn");
    let response = server
        .client
        .put(format!("{}/admin/tenants/tenant-admin-del", server.base_url))
        .json(&config_body())
        .send()
        .await
        .expect("put");
    assert_eq!(response.status().as_u16(), 204);

    let response = server
        .client
        .delete(format!("{}/admin/tenants/tenant-admin-del", server.base_url))
        .send()
        .await
        .expect("delete");
    assert_eq!(response.status().as_u16(), 204);

    let response = server
        .client
        .delete(format!("{}/admin/tenants/tenant-admin-del", server.base_url))
        .send()
        .await
        .expect("delete again");
    assert_eq!(response.status().as_u16(), 404);

    let response = server
        .client
        .get(format!("{}/admin/tenants/tenant-admin-del", server.base_url))
        .send()
        .await
        .expect("get");
    assert_eq!(response.status().as_u16(), 404);
}
