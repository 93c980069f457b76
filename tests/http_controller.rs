//! HTTP management-plane client against raw-TCP backends.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{start_programmable_backend, start_silent_backend, test_config, wait_terminal};
use resource_breaker::config::ControllerConfig;
use resource_breaker::controller::{ControllerError, HttpResourceController, ResourceController};
use resource_breaker::lifecycle::build_service;
use resource_breaker::workflow::{BreakerConfig, RuntimeClock, WorkflowState};

fn controller_for(base_url: String) -> HttpResourceController {
    HttpResourceController::new(&ControllerConfig {
        base_url,
        bearer_token: Some("secret-token".to_string()),
        request_timeout_secs: 1,
        ..ControllerConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn stop_posts_to_operation_url_with_token() {
    let (addr, seen) = start_programmable_backend(|| (200, String::new())).await;
    let controller = controller_for(format!("http://{addr}"));

    let status = controller.stop("/subscriptions/s1/sites/app").await.unwrap();
    assert!(status.is_success());

    let requests = seen.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0]
        .starts_with("POST /subscriptions/s1/sites/app/stop?api-version=2016-08-01 HTTP/1.1"));
    assert!(requests[0]
        .to_ascii_lowercase()
        .contains("authorization: bearer secret-token"));
}

#[tokio::test]
async fn non_success_status_is_a_value() {
    let (addr, _) = start_programmable_backend(|| (409, "conflicting operation".to_string())).await;
    let controller = controller_for(format!("http://{addr}"));

    let status = controller.start("sites/app").await.unwrap();
    assert_eq!(status.code, 409);
    assert_eq!(status.detail, "conflicting operation");
    assert!(!status.is_retryable());
}

#[tokio::test]
async fn unresponsive_backend_times_out() {
    let addr = start_silent_backend().await;
    let controller = controller_for(format!("http://{addr}"));

    let err = controller.stop("sites/app").await.unwrap_err();
    assert_eq!(err, ControllerError::Timeout(Duration::from_secs(1)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let controller = controller_for(format!("http://{addr}"));
    let err = controller.stop("sites/app").await.unwrap_err();
    assert!(matches!(err, ControllerError::Transport(_)));
}

#[tokio::test]
async fn workflow_drives_http_backend() {
    let (addr, seen) = start_programmable_backend(|| (202, String::new())).await;
    let controller = Arc::new(controller_for(format!("http://{addr}")));
    let service = build_service(&test_config(), controller, RuntimeClock::new()).unwrap();

    let config = BreakerConfig::new("sites/app", Duration::from_millis(200)).unwrap();
    service.workflows.start_instance(config).unwrap();

    let status = wait_terminal(&service.workflows, "sites/app").await;
    assert_eq!(status.state, WorkflowState::Completed);

    let requests = seen.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].starts_with("POST /sites/app/stop?"));
    assert!(requests[1].starts_with("POST /sites/app/start?"));
}
