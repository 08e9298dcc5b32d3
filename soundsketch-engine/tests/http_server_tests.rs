//! HTTP API integration tests: the full pipeline exercised through the
//! router with canned collaborators and an in-memory database.

mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use soundsketch_engine::providers::{GainSuggestion, MixRefinement};
use soundsketch_engine::services::rules;
use soundsketch_engine::{build_router, AppState};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use support::{recording, test_app_state, CannedSearch, ScriptedLlm};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn patch_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Canned results for every tag the rules produce for a prompt, two
/// recordings per tag so swaps have an alternative.
fn results_for_prompt(prompt: &str) -> HashMap<String, Vec<soundsketch_engine::models::Recording>> {
    rules::map_prompt_to_tags(prompt)
        .tags
        .iter()
        .enumerate()
        .map(|(i, tag)| {
            let base = 1000 + (i as u64) * 10;
            (
                tag.clone(),
                vec![
                    recording(base, &format!("{tag} loop"), 4.5),
                    recording(base + 1, &format!("{tag} ambience"), 3.5),
                ],
            )
        })
        .collect()
}

async fn app_for_prompt(prompt: &str) -> (axum::Router, AppState) {
    let search = Arc::new(CannedSearch::with_results(results_for_prompt(prompt)));
    let state = test_app_state(search, None).await;
    (build_router(state.clone()), state)
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (app, _) = app_for_prompt("rain").await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "soundsketch-engine");
    assert_eq!(body["llm_available"], false);
}

#[tokio::test]
async fn generate_builds_a_scene_and_reports_cache_status() {
    let prompt = "light rain in a quiet alley";
    let (app, _) = app_for_prompt(prompt).await;

    let response = app
        .clone()
        .oneshot(post_json("/generate", json!({ "prompt": prompt })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["cache_status"], "miss");
    assert_eq!(body["analysis"]["provenance"], "rules");
    // quiet words scale the mix down
    assert_eq!(body["mix_scale"], 0.7);
    let layers = body["layers"].as_array().unwrap();
    assert!(!layers.is_empty());
    for layer in layers {
        assert!(layer["recording"]["preview_url"].is_string());
    }

    // Same prompt again: served from the cache
    let response = app
        .oneshot(post_json("/generate", json!({ "prompt": prompt })))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["cache_status"], "hit");
}

#[tokio::test]
async fn superseded_generation_never_overwrites_a_fresher_scene() {
    let mut by_tag = results_for_prompt("rain");
    by_tag.extend(results_for_prompt("waves on a beach"));
    let search = Arc::new(CannedSearch::with_results(by_tag));
    let state = test_app_state(search, None).await;

    // Two generations claim epochs in order; the older one commits last
    let stale_epoch = state.epoch.fetch_add(1, Ordering::SeqCst) + 1;
    let stale = state.generator.generate("rain").await;
    let fresh_epoch = state.epoch.fetch_add(1, Ordering::SeqCst) + 1;
    let fresh = state.generator.generate("waves on a beach").await;

    let committed = state
        .commit_generation(fresh_epoch, "waves on a beach".into(), fresh)
        .await;
    assert!(committed.is_some());
    drop(committed);

    let discarded = state.commit_generation(stale_epoch, "rain".into(), stale).await;
    assert!(discarded.is_none());

    let scene = state.scene.read().await;
    assert_eq!(scene.prompt, "waves on a beach");
    assert!(!scene.layers.is_empty());
}

#[tokio::test]
async fn blank_prompt_is_rejected() {
    let (app, _) = app_for_prompt("rain").await;

    let response = app
        .oneshot(post_json("/generate", json!({ "prompt": "   " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn scene_reflects_the_last_generation() {
    let prompt = "waves on a beach";
    let (app, _) = app_for_prompt(prompt).await;

    app.clone()
        .oneshot(post_json("/generate", json!({ "prompt": prompt })))
        .await
        .unwrap();

    let response = app.oneshot(get("/scene")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["prompt"], prompt);
    assert!(!body["layers"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn manual_add_with_no_usable_results_is_not_found() {
    let (app, _) = app_for_prompt("rain").await;

    let response = app
        .oneshot(post_json("/scene/layers", json!({ "tag": "kazoo" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn manual_add_uses_a_synthetic_id() {
    let search = Arc::new(CannedSearch::with_results(HashMap::from([(
        "thunder".to_string(),
        vec![recording(77, "thunder roll", 4.0)],
    )])));
    let state = test_app_state(search, None).await;
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(post_json("/scene/layers", json!({ "tag": "Thunder" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["tag"], "thunder");
    // synthetic id, not the tag, so duplicate tags can coexist
    assert_ne!(body["id"], "thunder");
    assert_eq!(body["recording"]["id"], 77);
}

#[tokio::test]
async fn swap_replaces_the_recording_with_a_different_one() {
    let prompt = "rain";
    let (app, _) = app_for_prompt(prompt).await;

    app.clone()
        .oneshot(post_json("/generate", json!({ "prompt": prompt })))
        .await
        .unwrap();

    let scene = body_json(app.clone().oneshot(get("/scene")).await.unwrap()).await;
    let layer = &scene["layers"][0];
    let id = layer["id"].as_str().unwrap().to_string();
    let old_recording = layer["recording"]["id"].as_u64().unwrap();

    let response = app
        .oneshot(post_json(&format!("/scene/layers/{id}/swap"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["swapped"], true);
    let new_recording = body["layer"]["recording"]["id"].as_u64().unwrap();
    assert_ne!(new_recording, old_recording);
    // identity and position survive the swap
    assert_eq!(body["layer"]["id"], id);
}

#[tokio::test]
async fn swap_with_no_alternative_reports_a_noop() {
    // Only one recording exists for the tag, so excluding the current one
    // leaves nothing
    let search = Arc::new(CannedSearch::with_results(HashMap::from([(
        "thunder".to_string(),
        vec![recording(77, "thunder roll", 4.0)],
    )])));
    let state = test_app_state(search, None).await;
    let app = build_router(state);

    let created = body_json(
        app.clone()
            .oneshot(post_json("/scene/layers", json!({ "tag": "thunder" })))
            .await
            .unwrap(),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let body = body_json(
        app.oneshot(post_json(&format!("/scene/layers/{id}/swap"), json!({})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["swapped"], false);
    assert_eq!(body["layer"]["recording"]["id"], 77);
}

#[tokio::test]
async fn deleting_a_layer_twice_is_not_found() {
    let prompt = "rain";
    let (app, _) = app_for_prompt(prompt).await;

    app.clone()
        .oneshot(post_json("/generate", json!({ "prompt": prompt })))
        .await
        .unwrap();
    let scene = body_json(app.clone().oneshot(get("/scene")).await.unwrap()).await;
    let id = scene["layers"][0]["id"].as_str().unwrap().to_string();

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/scene/layers/{id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(delete).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let delete_again = Request::builder()
        .method("DELETE")
        .uri(format!("/scene/layers/{id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(delete_again).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn muting_a_layer_zeroes_its_effective_gain() {
    let prompt = "rain";
    let (app, _) = app_for_prompt(prompt).await;

    app.clone()
        .oneshot(post_json("/generate", json!({ "prompt": prompt })))
        .await
        .unwrap();
    let scene = body_json(app.clone().oneshot(get("/scene")).await.unwrap()).await;
    let id = scene["layers"][0]["id"].as_str().unwrap().to_string();

    let body = body_json(
        app.clone()
            .oneshot(patch_json(
                &format!("/scene/layers/{id}"),
                json!({ "muted": true }),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["muted"], true);
    assert_eq!(body["gain"], 0.0);

    let body = body_json(
        app.oneshot(patch_json(
            &format!("/scene/layers/{id}"),
            json!({ "muted": false, "gain": 0.25 }),
        ))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(body["muted"], false);
    assert_eq!(body["gain"], 0.25);
}

#[tokio::test]
async fn mix_scale_is_clamped() {
    let (app, _) = app_for_prompt("rain").await;

    let body = body_json(
        app.clone()
            .oneshot(patch_json("/scene/mix", json!({ "scale": 5.0 })))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["mix_scale"], 2.0);

    let body = body_json(
        app.oneshot(patch_json("/scene/mix", json!({ "scale": 0.0 })))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["mix_scale"], 0.3);
}

#[tokio::test]
async fn mix_refinement_applies_llm_suggestions() {
    let prompt = "rain";
    let search = Arc::new(CannedSearch::with_results(results_for_prompt(prompt)));
    let llm = Arc::new(ScriptedLlm {
        refinement: Some(MixRefinement {
            suggestions: vec![GainSuggestion {
                tag: "rain".to_string(),
                new_gain: 0.9,
                reasoning: None,
            }],
            overall_gain_scale: Some(0.8),
            confidence: Some(0.9),
        }),
        ..Default::default()
    });
    let state = test_app_state(search, Some(llm)).await;
    let app = build_router(state);

    app.clone()
        .oneshot(post_json("/generate", json!({ "prompt": prompt })))
        .await
        .unwrap();

    let response = app
        .oneshot(post_json("/scene/mix/refine", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["mix_scale"], 0.8);
    let rain = body["layers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["tag"] == "rain")
        .unwrap();
    // effective gain = 0.9 * 0.8
    assert!((rain["gain"].as_f64().unwrap() - 0.72).abs() < 1e-9);
}

#[tokio::test]
async fn refinement_without_llm_is_rejected() {
    let (app, _) = app_for_prompt("rain").await;

    app.clone()
        .oneshot(post_json("/generate", json!({ "prompt": "rain" })))
        .await
        .unwrap();

    let response = app
        .oneshot(post_json("/scene/mix/refine", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn backdrop_generation_requires_a_prompt() {
    let search = Arc::new(CannedSearch::default());
    let llm = Arc::new(ScriptedLlm::default());
    let state = test_app_state(search, Some(llm)).await;
    let app = build_router(state);

    let response = app
        .oneshot(post_json("/scene/image", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn backdrop_generation_stores_the_url() {
    let prompt = "rain";
    let search = Arc::new(CannedSearch::with_results(results_for_prompt(prompt)));
    let llm = Arc::new(ScriptedLlm::default());
    let state = test_app_state(search, Some(llm)).await;
    let app = build_router(state);

    app.clone()
        .oneshot(post_json("/generate", json!({ "prompt": prompt })))
        .await
        .unwrap();

    let body = body_json(
        app.clone()
            .oneshot(post_json("/scene/image", json!({})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["url"], "https://images.example/backdrop.png");

    let scene = body_json(app.oneshot(get("/scene")).await.unwrap()).await;
    assert_eq!(scene["backdrop_url"], "https://images.example/backdrop.png");
}
