use actix_web::{http::StatusCode, test, web, App};
use async_trait::async_trait;
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use geoguard::config::{Config, GeoProvider, PersistenceConfig, SmsConfig};
use geoguard::geolocation::{GeoError, GeoLocator, IpStackClient, LookupTarget};
use geoguard::model::{ModelError, RiskModel, UnavailableModel};
use geoguard::notify::{SmsError, SmsSender, TwilioClient};
use geoguard::{AppState, PersistenceClient};

/// Geolocation stub returning a fixed payload, or failing when `None`
struct StubLocator {
    payload: Option<Value>,
    calls: AtomicUsize,
    last_target: Mutex<Option<LookupTarget>>,
}

impl StubLocator {
    fn new(payload: Option<Value>) -> Arc<Self> {
        Arc::new(StubLocator {
            payload,
            calls: AtomicUsize::new(0),
            last_target: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeoLocator for StubLocator {
    async fn lookup(&self, target: &LookupTarget) -> Result<Value, GeoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_target.lock().unwrap() = Some(target.clone());
        self.payload.clone().ok_or(GeoError::Provider {
            code: 101,
            info: "invalid_access_key".to_string(),
        })
    }
}

struct StubModel(f64);

impl RiskModel for StubModel {
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        assert_eq!(features.len(), 2);
        Ok(self.0)
    }
}

/// SMS stub recording every message
struct StubSms {
    result: Option<Value>,
    sent: Mutex<Vec<(String, String)>>,
}

impl StubSms {
    fn new(result: Option<Value>) -> Arc<Self> {
        Arc::new(StubSms {
            result,
            sent: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SmsSender for StubSms {
    async fn send(&self, to: &str, body: &str) -> Result<Value, SmsError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        self.result.clone().ok_or(SmsError::Provider {
            status: 401,
            message: "Authenticate".to_string(),
        })
    }
}

fn state(
    geolocator: Arc<dyn GeoLocator>,
    model: Arc<dyn RiskModel>,
    sms: Arc<dyn SmsSender>,
) -> web::Data<AppState> {
    web::Data::new(AppState {
        geolocator,
        model,
        sms,
        persistence: PersistenceClient::new(&PersistenceConfig::default()),
        threshold: 0.5,
    })
}

fn geo_payload() -> Value {
    json!({"city": "X", "region_name": "Y", "latitude": 1, "longitude": 2, "country_code": "ZZ"})
}

/// Gives up long before the slow mocks answer
fn slow_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap()
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(App::new().app_data($state).configure(geoguard::configure)).await
    };
}

#[actix_web::test]
async fn test_index_is_always_up() {
    let app = app!(state(
        StubLocator::new(None),
        Arc::new(UnavailableModel::new("no model")),
        StubSms::new(None),
    ));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(body, "Backend server is running properly!");
}

#[actix_web::test]
async fn test_notify_success_returns_provider_result() {
    let provider_result = json!({"sid": "SM42", "status": "queued"});
    let sms = StubSms::new(Some(provider_result.clone()));
    let app = app!(state(StubLocator::new(None), Arc::new(StubModel(0.9)), sms.clone()));

    let req = test::TestRequest::post()
        .uri("/notify")
        .set_json(json!({"to": "+15551234567", "message": "New login detected"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Notification sent");
    assert_eq!(body["result"], provider_result);
    assert_eq!(
        sms.sent.lock().unwrap().as_slice(),
        &[("+15551234567".to_string(), "New login detected".to_string())]
    );
}

#[actix_web::test]
async fn test_notify_provider_failure_is_500() {
    let app = app!(state(
        StubLocator::new(None),
        Arc::new(StubModel(0.9)),
        StubSms::new(None),
    ));

    let req = test::TestRequest::post()
        .uri("/notify")
        .set_json(json!({"to": "+15551234567", "message": "hi"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Failed to send notification"}));
}

#[actix_web::test]
async fn test_notify_missing_fields_is_400() {
    let sms = StubSms::new(Some(json!({})));
    let app = app!(state(StubLocator::new(None), Arc::new(StubModel(0.9)), sms.clone()));

    let req = test::TestRequest::post()
        .uri("/notify")
        .set_json(json!({"to": "+15551234567"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "to and message are required"}));
    assert!(sms.sent.lock().unwrap().is_empty());
}

#[actix_web::test]
async fn test_geolocation_failure_is_500() {
    let app = app!(state(
        StubLocator::new(None),
        Arc::new(StubModel(0.9)),
        StubSms::new(None),
    ));

    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/geolocation").to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Failed to fetch geolocation"}));
}

#[actix_web::test]
async fn test_geolocation_returns_payload_and_ignores_body() {
    let geo = StubLocator::new(Some(geo_payload()));
    let app = app!(state(geo.clone(), Arc::new(StubModel(0.9)), StubSms::new(None)));

    let peer: SocketAddr = "198.51.100.4:51234".parse().unwrap();
    let req = test::TestRequest::post()
        .uri("/geolocation")
        .peer_addr(peer)
        .insert_header(("content-type", "application/json"))
        .set_payload("this is not json")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"location": geo_payload()}));
    assert_eq!(
        *geo.last_target.lock().unwrap(),
        Some(LookupTarget::Requester(Some(peer.ip())))
    );
}

#[actix_web::test]
async fn test_adaptive_login_allowed() {
    let geo = StubLocator::new(Some(geo_payload()));
    let app = app!(state(geo.clone(), Arc::new(StubModel(0.8)), StubSms::new(None)));

    let req = test::TestRequest::post()
        .uri("/adaptive-login")
        .set_json(json!({"userId": "user-1", "ip": "203.0.113.9"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["decision"], "Login Allowed");
    assert_eq!(
        body["location"],
        json!({"city": "X", "region_name": "Y", "latitude": 1.0, "longitude": 2.0})
    );
    assert_eq!(
        *geo.last_target.lock().unwrap(),
        Some(LookupTarget::Address("203.0.113.9".to_string()))
    );
}

#[actix_web::test]
async fn test_adaptive_login_denied() {
    let app = app!(state(
        StubLocator::new(Some(geo_payload())),
        Arc::new(StubModel(0.3)),
        StubSms::new(None),
    ));

    let req = test::TestRequest::post()
        .uri("/adaptive-login")
        .set_json(json!({"userId": "user-1", "ip": "203.0.113.9"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["decision"], "Login Denied");
}

#[actix_web::test]
async fn test_adaptive_login_missing_fields_rejected_before_lookup() {
    let geo = StubLocator::new(Some(geo_payload()));
    let app = app!(state(geo.clone(), Arc::new(StubModel(0.8)), StubSms::new(None)));

    for body in [json!({"userId": "user-1"}), json!({"ip": "203.0.113.9"}), json!({})] {
        let req = test::TestRequest::post()
            .uri("/adaptive-login")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "userId and ip are required"}));
    }

    assert_eq!(geo.calls(), 0);
}

#[actix_web::test]
async fn test_adaptive_login_invalid_json() {
    let geo = StubLocator::new(Some(geo_payload()));
    let app = app!(state(geo.clone(), Arc::new(StubModel(0.8)), StubSms::new(None)));

    let req = test::TestRequest::post()
        .uri("/adaptive-login")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"userId\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Invalid JSON body"}));
    assert_eq!(geo.calls(), 0);
}

#[actix_web::test]
async fn test_adaptive_login_failures_collapse_to_500() {
    let working_model = || Arc::new(StubModel(0.8)) as Arc<dyn RiskModel>;
    let cases: Vec<(Arc<StubLocator>, Arc<dyn RiskModel>)> = vec![
        // Geolocation rejected
        (StubLocator::new(None), working_model()),
        // Private address, no coordinates
        (
            StubLocator::new(Some(json!({"ip": "10.0.0.1", "latitude": null, "longitude": null}))),
            working_model(),
        ),
        // Model failed to load at startup
        (
            StubLocator::new(Some(geo_payload())),
            Arc::new(UnavailableModel::new("model.json not found")) as Arc<dyn RiskModel>,
        ),
    ];

    for (geo, model) in cases {
        let app = app!(state(geo, model, StubSms::new(None)));
        let req = test::TestRequest::post()
            .uri("/adaptive-login")
            .set_json(json!({"userId": "user-1", "ip": "10.0.0.1"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Failed to process adaptive login"}));
    }
}

#[actix_web::test]
async fn test_geolocation_upstream_timeout_is_504() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/check");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(geo_payload());
        })
        .await;

    let locator = IpStackClient::new(slow_client(), &server.base_url(), "test-key").unwrap();
    let app = app!(state(
        Arc::new(locator),
        Arc::new(StubModel(0.8)),
        StubSms::new(None),
    ));

    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/geolocation").to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Failed to fetch geolocation"}));
}

#[actix_web::test]
async fn test_adaptive_login_upstream_timeout_is_504() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/203.0.113.9");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(geo_payload());
        })
        .await;

    let locator = IpStackClient::new(slow_client(), &server.base_url(), "test-key").unwrap();
    let app = app!(state(
        Arc::new(locator),
        Arc::new(StubModel(0.8)),
        StubSms::new(None),
    ));

    let req = test::TestRequest::post()
        .uri("/adaptive-login")
        .set_json(json!({"userId": "user-1", "ip": "203.0.113.9"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Failed to process adaptive login"}));
}

#[actix_web::test]
async fn test_notify_upstream_timeout_is_504() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/2010-04-01/Accounts/AC123/Messages.json");
            then.status(201)
                .delay(Duration::from_millis(500))
                .json_body(json!({"sid": "SM0001", "status": "queued"}));
        })
        .await;

    let config = SmsConfig {
        base_url: server.base_url(),
        account_sid: "AC123".to_string(),
        auth_token: "tok".to_string(),
        from_number: "+15550000000".to_string(),
    };
    let sms = TwilioClient::new(slow_client(), &config).unwrap();
    let app = app!(state(
        StubLocator::new(None),
        Arc::new(StubModel(0.8)),
        Arc::new(sms),
    ));

    let req = test::TestRequest::post()
        .uri("/notify")
        .set_json(json!({"to": "+15551234567", "message": "Suspicious login"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Failed to send notification"}));
}

#[actix_web::test]
async fn test_misconfigured_providers_still_serve() {
    let mut config = Config::default();
    config.geolocation.provider = GeoProvider::Maxmind;
    config.geolocation.database_path = "missing/GeoLite2-City.mmdb".into();
    config.model.path = "missing/model.json".into();
    config.sms.base_url = "not a url".to_string();

    let state = web::Data::new(AppState::from_config(&config).unwrap());
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/geolocation").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Failed to fetch geolocation"}));

    let req = test::TestRequest::post()
        .uri("/notify")
        .set_json(json!({"to": "+15551234567", "message": "hi"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Failed to send notification"}));
}
