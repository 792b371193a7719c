use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use hailer::db::MemoryStore;
use hailer::engine::Engine;
use hailer::server::router;

fn app() -> Router {
    router(Engine::new(MemoryStore::default()).unwrap())
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = match bytes.is_empty() {
        true => Value::Null,
        false => serde_json::from_slice(&bytes).unwrap(),
    };

    (status, body)
}

async fn sign_up(app: &Router, name: &str, phone: &str, role: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({
            "name": name,
            "email": format!("{name}@example.com"),
            "phoneNumber": phone,
            "role": role,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User created successfully");
    assert_eq!(body["member"]["role"], role);

    body["token"].as_str().unwrap().to_string()
}

fn booking(fare: f64) -> Value {
    json!({
        "pickupLocation": "Saddar",
        "dropLocation": "Clifton",
        "rideType": "car",
        "distanceKm": 5.0,
        "fare": fare,
    })
}

#[tokio::test]
async fn ride_lifecycle_over_http() {
    let app = app();
    let passenger = sign_up(&app, "parveen", "03001234567", "passenger").await;
    let driver = sign_up(&app, "dawood", "03007654321", "driver").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/rides/book",
        Some(&passenger),
        Some(booking(120.0)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Ride booked successfully");
    assert_eq!(body["ride"]["status"], "requested");
    assert_eq!(body["ride"]["passenger"]["name"], "parveen");
    let id = body["ride"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, "/rides/available", Some(&driver), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rides"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/rides/{id}/accept"),
        Some(&driver),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ride"]["status"], "accepted");
    assert_eq!(body["ride"]["driver"]["name"], "dawood");

    for next in ["in_progress", "completed"] {
        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/rides/{id}/status"),
            Some(&driver),
            Some(json!({ "status": next })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ride"]["status"], next);
    }

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/rides/{id}/rate"),
        Some(&passenger),
        Some(json!({ "rating": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ride"]["rating"], 5);

    let (status, body) = send(
        &app,
        Method::GET,
        "/rides/driver/stats?utcOffsetMinutes=0",
        Some(&driver),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["totalRides"], 1);
    assert_eq!(body["stats"]["totalEarnings"], 120.0);
    assert_eq!(body["stats"]["averageRating"], 5.0);

    let (status, body) = send(&app, Method::GET, &format!("/rides/{id}"), Some(&passenger), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ride"]["status"], "completed");

    let (status, body) = send(&app, Method::GET, "/rides/passenger", Some(&passenger), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rides"][0]["driver"]["name"], "dawood");
}

#[tokio::test]
async fn missing_or_unknown_token_is_unauthorized() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/rides", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized");

    let token = Uuid::new_v4().to_string();
    let (status, _) = send(&app, Method::GET, "/rides", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let app = app();
    let passenger = sign_up(&app, "parveen", "03001234567", "passenger").await;
    let driver = sign_up(&app, "dawood", "03007654321", "driver").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/rides/book",
        Some(&driver),
        Some(booking(120.0)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Only passengers can book rides");

    let (status, body) = send(
        &app,
        Method::POST,
        "/rides/book",
        Some(&passenger),
        Some(json!({ "pickupLocation": "Saddar" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing required fields");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/rides/{}/accept", Uuid::new_v4()),
        Some(&driver),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Ride not found");

    let (_, body) = send(
        &app,
        Method::POST,
        "/rides/book",
        Some(&passenger),
        Some(booking(120.0)),
    )
    .await;
    let id = body["ride"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/rides/{id}/status"),
        Some(&driver),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You can only update your own rides");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/rides/{id}/reject"),
        Some(&driver),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Ride rejected successfully");
}

#[tokio::test]
async fn sign_up_reports_field_errors() {
    let app = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({
            "name": "p",
            "email": "not-an-email",
            "phoneNumber": "123",
            "role": "admin",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    assert!(body["errors"]["email"].is_array());
    assert!(body["errors"]["phoneNumber"].is_array());
}

#[tokio::test]
async fn fare_estimate_uses_query_parameters() {
    let app = app();
    let passenger = sign_up(&app, "parveen", "03001234567", "passenger").await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/rides/fare?rideType=bike&distanceKm=4",
        Some(&passenger),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fare"], 60.0);
}

async fn send_raw(app: &Router, uri: &str, token: &str, body: &'static str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();

    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn numeric_strings_are_accepted_when_booking() {
    let app = app();
    let passenger = sign_up(&app, "parveen", "03001234567", "passenger").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/rides/book",
        Some(&passenger),
        Some(json!({
            "pickupLocation": "Saddar",
            "dropLocation": "Clifton",
            "rideType": "car",
            "distanceKm": "5",
            "fare": "120.5",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ride"]["distanceKm"], 5.0);
    assert_eq!(body["ride"]["fare"], 120.5);
}

#[tokio::test]
async fn unreadable_bodies_keep_the_check_order() {
    let app = app();
    let passenger = sign_up(&app, "parveen", "03001234567", "passenger").await;
    let driver = sign_up(&app, "dawood", "03007654321", "driver").await;

    let (status, body) = send_raw(&app, "/rides/book", &driver, "{not json").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Only passengers can book rides");

    let (status, body) = send_raw(&app, "/rides/book", &passenger, "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing required fields");

    let (_, body) = send(
        &app,
        Method::POST,
        "/rides/book",
        Some(&passenger),
        Some(booking(120.0)),
    )
    .await;
    let id = body["ride"]["id"].as_str().unwrap().to_string();
    send(&app, Method::POST, &format!("/rides/{id}/accept"), Some(&driver), None).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/rides/{id}/status"),
        Some(&driver),
        Some(json!({ "status": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid status provided");
}

#[tokio::test]
async fn malformed_ride_ids_are_not_found() {
    let app = app();
    let passenger = sign_up(&app, "parveen", "03001234567", "passenger").await;
    let driver = sign_up(&app, "dawood", "03007654321", "driver").await;

    let (status, body) = send(&app, Method::POST, "/rides/not-a-uuid/accept", Some(&driver), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Ride not found");

    // the role check still comes first
    let (status, body) = send(
        &app,
        Method::POST,
        "/rides/not-a-uuid/accept",
        Some(&passenger),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Only drivers can accept rides");

    let (status, body) = send(&app, Method::GET, "/rides/not-a-uuid", Some(&passenger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Ride not found");
}

#[tokio::test]
async fn malformed_query_parameters_are_json_errors() {
    let app = app();
    let passenger = sign_up(&app, "parveen", "03001234567", "passenger").await;
    let driver = sign_up(&app, "dawood", "03007654321", "driver").await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/rides/fare?rideType=car&distanceKm=far",
        Some(&passenger),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid query parameters");

    let (status, body) = send(
        &app,
        Method::GET,
        "/rides/driver/stats?utcOffsetMinutes=noon",
        Some(&passenger),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Only drivers can view stats");

    let (status, body) = send(
        &app,
        Method::GET,
        "/rides/driver/stats?utcOffsetMinutes=noon",
        Some(&driver),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid UTC offset");
}
