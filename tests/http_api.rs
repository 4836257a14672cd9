mod common;

use std::net::SocketAddr;

use axum::Router;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use wc26_predictor::api::{AppState, create_app};
use wc26_predictor::encoder::TeamEncoder;
use wc26_predictor::service::PredictionService;
use wc26_predictor::teams::{TeamRegistry, WORLD_CUP_TEAMS};

fn app_for(peer: [u8; 4]) -> Router {
    let state = AppState::with_service(common::world_cup_service(), 10);
    create_app(state).layer(MockConnectInfo(SocketAddr::from((peer, 40_000))))
}

fn predict_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn home_reports_the_banner() {
    let response = app_for([127, 0, 0, 1])
        .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "message": "FIFA World Cup AI API (Secured)" })
    );
}

#[tokio::test]
async fn brazil_v_france_on_neutral_ground() {
    let response = app_for([127, 0, 0, 1])
        .oneshot(predict_request(&json!({
            "home_team": "Brazil",
            "away_team": "France",
            "neutral_venue": true
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let prediction = body["prediction"].as_u64().expect("prediction code");
    assert!(prediction <= 2);

    let probability = &body["probability"];
    let mut total = 0.0;
    for key in ["draw", "home_win", "away_win"] {
        let p = probability[key].as_f64().expect("probability");
        assert!((0.0..=1.0).contains(&p));
        assert_eq!(p, (p * 100.0).round() / 100.0);
        total += p;
    }
    assert!((total - 1.0).abs() <= 0.02);

    assert_eq!(
        body["match_info"],
        json!({ "home": "Brazil", "away": "France", "neutral": true })
    );
}

#[tokio::test]
async fn neutral_venue_defaults_to_false() {
    let response = app_for([127, 0, 0, 1])
        .oneshot(predict_request(&json!({
            "home_team": "Spain",
            "away_team": "Japan"
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["match_info"]["neutral"], false);
}

#[tokio::test]
async fn same_team_is_a_bad_request() {
    let response = app_for([127, 0, 0, 1])
        .oneshot(predict_request(&json!({
            "home_team": "Brazil",
            "away_team": "Brazil",
            "neutral_venue": false
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["message"], "teams must be different");
}

#[tokio::test]
async fn unknown_team_is_a_bad_request() {
    let response = app_for([127, 0, 0, 1])
        .oneshot(predict_request(&json!({
            "home_team": "Atlantis",
            "away_team": "France"
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "validation_error");
}

#[tokio::test]
async fn registry_team_missing_from_encoder_is_an_encoding_failure() {
    let encoder = TeamEncoder::fit(WORLD_CUP_TEAMS.iter().filter(|t| **t != "Qatar"));
    let forest = common::world_cup_forest(&encoder);
    let service = PredictionService::new(
        TeamRegistry::world_cup().clone(),
        encoder,
        Box::new(forest),
    );
    let app = create_app(AppState::with_service(service, 10))
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40_000))));

    let response = app
        .clone()
        .oneshot(predict_request(&json!({
            "home_team": "Qatar",
            "away_team": "Brazil",
            "neutral_venue": false
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "encoding_failed");
    assert!(body["message"].as_str().expect("message").contains("Qatar"));

    // Teams the encoder does know still predict.
    let response = app
        .oneshot(predict_request(&json!({
            "home_team": "Brazil",
            "away_team": "France"
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let app = app_for([127, 0, 0, 1]);

    let missing_field = app
        .clone()
        .oneshot(predict_request(&json!({ "home_team": "Brazil" })))
        .await
        .expect("response");
    assert_eq!(missing_field.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(missing_field).await["error"], "validation_error");

    let wrong_type = app
        .clone()
        .oneshot(predict_request(&json!({
            "home_team": "Brazil",
            "away_team": "France",
            "neutral_venue": "yes"
        })))
        .await
        .expect("response");
    assert_eq!(wrong_type.status(), StatusCode::BAD_REQUEST);

    let not_json = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn eleventh_request_in_a_minute_is_limited() {
    let app = app_for([10, 0, 0, 7]);
    let body = json!({ "home_team": "Brazil", "away_team": "France", "neutral_venue": true });

    for attempt in 1..=10 {
        let response = app
            .clone()
            .oneshot(predict_request(&body))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK, "attempt {attempt}");
    }

    let response = app
        .clone()
        .oneshot(predict_request(&body))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .expect("retry-after header")
        .to_str()
        .expect("ascii")
        .parse()
        .expect("seconds");
    // The spent quota only comes back once the full minute has passed.
    assert!((55..=60).contains(&retry_after), "retry-after {retry_after}");
    assert_eq!(json_body(response).await["error"], "rate_limited");

    // The banner route is not limited.
    let home = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(home.status(), StatusCode::OK);
}
