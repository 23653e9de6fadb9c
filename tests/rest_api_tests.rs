//! End-to-end tests of the REST exposure
//!
//! These tests drive the full stack from HTTP request to envelope: entity
//! registration from configuration, operator translation, related tables
//! and method restrictions.

use axum::http::StatusCode;
use axum_test::TestServer;
use crudgate::prelude::*;

fn create_test_server() -> TestServer {
    let db = InMemoryDatabase::new();
    let app = ServerBuilder::new()
        .register_config(&AppConfig::default_config(), &db)
        .build()
        .expect("Failed to build router");
    TestServer::new(app)
}

async fn put(server: &TestServer, entity: &str, body: Value) -> Value {
    let response = server
        .post(&format!("/{}/put", entity))
        .json(&json!({ "data": { "body": body } }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()["response"].clone()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_health_lists_entities() {
        let server = create_test_server();
        let response = server.get("/health").await;
        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["entities"], json!(["Customer", "Order", "Product"]));
    }
}

mod crud {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete_cycle() {
        let server = create_test_server();
        let created = put(&server, "Customer", json!({"name": "Ann"})).await;
        let uuid = created["uuid"].clone();
        assert!(uuid.is_string());

        let response = server
            .post("/Customer/get")
            .json(&json!({"data": {"uuid": uuid}}))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["response"]["name"], "Ann");

        let response = server
            .post("/Customer/delete")
            .json(&json!({"data": {"uuid": uuid}}))
            .await;
        assert_eq!(response.json::<Value>(), json!({"response": {"ok": true}}));

        let response = server
            .post("/Customer/get")
            .json(&json!({"data": {"uuid": uuid}}))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body = response.json::<Value>();
        assert_eq!(body["error"]["status"], 404);
        assert!(body["error"]["message"].is_string());
        assert!(body.get("response").is_none());
    }

    #[tokio::test]
    async fn test_update_merges_and_keeps_identity() {
        let server = create_test_server();
        let created = put(&server, "Customer", json!({"name": "Ann", "city": "Oslo"})).await;

        let response = server
            .post("/Customer/put")
            .json(&json!({"data": {"uuid": created["uuid"], "body": {"city": "Bergen"}}}))
            .await;
        let updated = response.json::<Value>()["response"].clone();
        assert_eq!(updated["uuid"], created["uuid"]);
        assert_eq!(updated["name"], "Ann");
        assert_eq!(updated["city"], "Bergen");
    }

    #[tokio::test]
    async fn test_unknown_entity_and_method() {
        let server = create_test_server();
        server
            .post("/Invoice/get")
            .json(&json!({}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let response = server.post("/Customer/archive").json(&json!({})).await;
        assert!(response.status_code().is_client_error());
        assert!(response.json::<Value>()["error"]["message"].is_string());
    }

    #[tokio::test]
    async fn test_restricted_entity_rejects_writes() {
        let server = create_test_server();
        let response = server
            .post("/Product/put")
            .json(&json!({"data": {"body": {"sku": "A"}}}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        server
            .post("/Product/query")
            .json(&json!({"data": {}}))
            .await
            .assert_status_ok();
    }
}

mod related_tables {
    use super::*;

    #[tokio::test]
    async fn test_lines_are_replaced_on_update() {
        let server = create_test_server();
        let created = put(
            &server,
            "Order",
            json!({"number": 1, "lines": [{"sku": "A"}, {"sku": "B"}]}),
        )
        .await;
        let skus: Vec<&Value> = created["lines"].as_array().unwrap().iter().map(|l| &l["sku"]).collect();
        assert_eq!(skus, vec!["A", "B"]);

        let response = server
            .post("/Order/put")
            .json(&json!({"data": {"uuid": created["uuid"], "body": {"lines": [{"sku": "C"}]}}}))
            .await;
        let updated = response.json::<Value>()["response"].clone();
        assert_eq!(updated["number"], 1);
        assert_eq!(updated["lines"].as_array().map(Vec::len), Some(1));
        assert_eq!(updated["lines"][0]["sku"], "C");
        assert_eq!(updated["lines"][0]["orderUuid"], created["uuid"]);

        let response = server
            .post("/Order/get")
            .json(&json!({"data": {"uuid": created["uuid"]}}))
            .await;
        assert_eq!(response.json::<Value>()["response"]["lines"][0]["sku"], "C");
    }
}

mod conditions {
    use super::*;

    async fn seed(server: &TestServer) {
        for (name, total) in [("a", 5), ("b", 10), ("c", 20)] {
            put(server, "Customer", json!({"name": name, "total": total})).await;
        }
    }

    async fn names(server: &TestServer, data: Value) -> Value {
        let response = server.post("/Customer/query").json(&json!({ "data": data })).await;
        response.assert_status_ok();
        let items = response.json::<Value>()["response"].clone();
        Value::Array(
            items
                .as_array()
                .unwrap()
                .iter()
                .map(|item| item["name"].clone())
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_comparison_operators() {
        let server = create_test_server();
        seed(&server).await;

        let data = json!({"where": {"total": {"$gte": 10}}, "order": [["total", "ASC"]]});
        assert_eq!(names(&server, data).await, json!(["b", "c"]));
    }

    #[tokio::test]
    async fn test_logical_operators() {
        let server = create_test_server();
        seed(&server).await;

        let data = json!({
            "where": {"$or": [{"name": "a"}, {"total": {"$gt": 15}}]},
            "order": [["name", "DESC"]]
        });
        assert_eq!(names(&server, data).await, json!(["c", "a"]));
    }

    #[tokio::test]
    async fn test_limit_offset() {
        let server = create_test_server();
        seed(&server).await;

        let data = json!({"order": [["total", "DESC"]], "limit": 1, "offset": 1});
        assert_eq!(names(&server, data).await, json!(["b"]));
    }

    #[tokio::test]
    async fn test_unknown_operator_is_error_envelope() {
        let server = create_test_server();
        seed(&server).await;

        let response = server
            .post("/Customer/query")
            .json(&json!({"data": {"where": {"total": {"$near": 10}}}}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["error"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("$near")));
    }
}
