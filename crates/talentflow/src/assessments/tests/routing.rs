use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::assessments::builder::NewAssessment;
use crate::assessments::repository::{self as records};
use crate::assessments::response::AssessmentResponse;
use crate::assessments::{assessment_router, AssessmentService};

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn create_then_fetch_round_trips() {
    let router = router_with(Arc::new(Default::default()));

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/assessments",
            json!({ "title": "Data screening", "job_id": "job-9" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json_body(response).await;
    let id = created["id"].as_str().expect("id").to_string();
    assert_eq!(created["is_published"], json!(false));

    let response = router
        .oneshot(empty_request(
            Method::GET,
            &format!("/api/v1/assessments/{id}"),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = read_json_body(response).await;
    assert_eq!(fetched["title"], json!("Data screening"));
    assert_eq!(fetched["job_id"], json!("job-9"));
}

#[tokio::test]
async fn blank_titles_are_unprocessable() {
    let router = router_with(Arc::new(Default::default()));
    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/assessments",
            json!({ "title": "" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], json!("assessment title is required"));
}

#[tokio::test]
async fn missing_assessments_return_not_found() {
    let router = router_with(Arc::new(Default::default()));
    for (method, uri) in [
        (Method::GET, "/api/v1/assessments/nope"),
        (Method::DELETE, "/api/v1/assessments/nope"),
        (Method::POST, "/api/v1/assessments/nope/publish"),
        (Method::GET, "/api/v1/assessments/nope/responses"),
    ] {
        let response = router
            .clone()
            .oneshot(empty_request(method, uri))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn questions_are_added_and_reordered_over_http() {
    let store = seeded_store(&quiz()).await;
    let router = router_with(store.clone());

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/assessments/quiz/sections/s1/questions",
            json!({ "title": "Salary expectation", "type": "numeric-range", "min_value": 0 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["edited_while_published"], json!(false));
    let questions = body["assessment"]["sections"][0]["questions"]
        .as_array()
        .expect("questions")
        .clone();
    assert_eq!(questions.len(), 3);
    let added = questions[2]["id"].as_str().expect("id").to_string();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/assessments/quiz/sections/s1/questions",
            json!({ "ids": [added.clone(), "q1"] }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let order: Vec<(String, u64)> = body["assessment"]["sections"][0]["questions"]
        .as_array()
        .expect("questions")
        .iter()
        .map(|q| {
            (
                q["id"].as_str().unwrap_or_default().to_string(),
                q["order"].as_u64().unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        order,
        vec![
            (added.clone(), 0),
            ("q1".to_string(), 1),
            ("q2".to_string(), 2)
        ]
    );
}

#[tokio::test]
async fn dangling_conditions_are_rejected_over_http() {
    let store = seeded_store(&quiz()).await;
    let router = router_with(store);

    let response = router
        .oneshot(json_request(
            Method::PATCH,
            "/api/v1/assessments/quiz/sections/s1/questions/q2",
            json!({
                "conditional_logic": {
                    "show_if": [{ "question_id": "q404", "operator": "equals", "value": "A" }]
                }
            }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn evaluate_reports_visibility_and_validation() {
    let store = seeded_store(&quiz()).await;
    let router = router_with(store);

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/assessments/quiz/evaluate",
            json!({ "answers": { "q1": "A" } }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["visible_question_ids"], json!(["q1", "q2"]));
    assert_eq!(body["validation"]["can_submit"], json!(false));
    assert_eq!(body["messages"]["q2"], json!("This question is required"));
    assert_eq!(body["progress"]["percent"], json!(50));
}

#[tokio::test]
async fn options_can_be_managed_over_http() {
    let store = seeded_store(&quiz()).await;
    let router = router_with(store);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/assessments/quiz/sections/s1/questions/q1/options",
            json!({ "label": "Neither" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let options = &body["assessment"]["sections"][0]["questions"][0]["options"];
    assert_eq!(options[2]["label"], json!("Neither"));
    assert_eq!(options[2]["value"], json!("option_3"));

    let response = router
        .oneshot(empty_request(
            Method::DELETE,
            "/api/v1/assessments/quiz/sections/s1/questions/q1/options/opt-A",
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let options = body["assessment"]["sections"][0]["questions"][0]["options"]
        .as_array()
        .expect("options")
        .len();
    assert_eq!(options, 2);
}

#[tokio::test]
async fn deleting_an_assessment_returns_no_content_and_drops_responses() {
    let store = seeded_store(&quiz()).await;
    let response = AssessmentResponse::start(quiz().id, None);
    records::put(store.as_ref(), &response).await.expect("seed");
    let router = router_with(store.clone());

    let listed = router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/assessments/quiz/responses"))
        .await
        .expect("router responds");
    assert_eq!(read_json_body(listed).await.as_array().map(Vec::len), Some(1));

    let deleted = router
        .oneshot(empty_request(Method::DELETE, "/api/v1/assessments/quiz"))
        .await
        .expect("router responds");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    assert!(stored_responses(store.as_ref()).await.is_empty());
}

#[tokio::test]
async fn store_failures_map_to_internal_errors() {
    let service = Arc::new(AssessmentService::new(Arc::new(UnavailableStore)));

    let response = crate::assessments::router::create_handler::<UnavailableStore>(
        State(service.clone()),
        axum::Json(NewAssessment {
            title: "Ops".to_string(),
            ..NewAssessment::default()
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = crate::assessments::router::get_handler::<UnavailableStore>(
        State(service.clone()),
        Path("quiz".to_string()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let router = assessment_router(service);
    let response = router
        .oneshot(empty_request(Method::GET, "/api/v1/assessments"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
