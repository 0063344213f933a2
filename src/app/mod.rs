// HTTP control surface

use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::ServiceConfig;
use crate::registry::DeviceRecord;
use crate::remote::{Delivery, ExecutionResult};
use crate::render::TemplateRenderer;

pub mod execute;
pub mod heaters;

/// Shared, read-only per-process state handed to every handler.
pub struct AppState {
    pub config: ServiceConfig,
    pub renderer: TemplateRenderer,
    pub delivery: Arc<dyn Delivery>,
}

impl AppState {
    pub fn new(config: ServiceConfig, delivery: Arc<dyn Delivery>) -> Self {
        let renderer = TemplateRenderer::new(config.render_dir.clone(), config.placeholder.clone());
        Self {
            config,
            renderer,
            delivery,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "heater-control", description = "Start, stop and reconfigure heater miners"),
    components(schemas(
        DeviceRecord,
        ExecutionResult,
        execute::ExecuteRequest,
        execute::NamedCommand,
        execute::CommandsResponse,
        heaters::SetHeaterRequest,
        heaters::PowerAction,
        heaters::MessageResponse,
    ))
)]
pub struct ApiDoc;

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("../../public/index.html"))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn openapi_yaml() -> impl IntoResponse {
    match ApiDoc::openapi().to_yaml() {
        Ok(yaml) => (StatusCode::OK, [(header::CONTENT_TYPE, "application/yaml")], yaml),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            e.to_string(),
        ),
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/openapi.json", get(openapi_json))
        .route("/openapi.yaml", get(openapi_yaml))
        .merge(heaters::routes())
        .merge(execute::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SshSettings;
    use crate::remote::mock::RecordingDelivery;
    use crate::remote::SshDelivery;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::path::Path;
    use tower::ServiceExt;

    const REGISTRY: &str = r#"[
        {"heaterName": "office", "hostname": "miner-office", "ipAddress": "10.0.0.5", "location": "Office", "type": "s9"},
        {"heaterName": "garage", "hostname": "miner-garage", "ipAddress": "10.0.0.6", "location": "Garage", "type": "s9"}
    ]"#;

    struct Fixture {
        dir: tempfile::TempDir,
        delivery: Arc<RecordingDelivery>,
        app: Router,
    }

    fn config_in(dir: &Path) -> ServiceConfig {
        ServiceConfig {
            registry_path: dir.join("heaters.json"),
            template_dir: dir.join("bosminerConfig"),
            render_dir: dir.join("tmpFile"),
            ..ServiceConfig::default()
        }
    }

    async fn fixture_with(delivery: RecordingDelivery, registry: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        if let Some(contents) = registry {
            tokio::fs::write(&config.registry_path, contents).await.unwrap();
        }
        tokio::fs::create_dir_all(&config.template_dir).await.unwrap();
        for action in ["low", "medium", "high"] {
            tokio::fs::write(
                config.template_dir.join(format!("bosminer-s9-{action}.toml")),
                format!("[pool]\nuser = \"acct.{{hostname}}\"\nmode = \"{action}\"\nlabel = \"{{hostname}}\"\n"),
            )
            .await
            .unwrap();
        }

        let delivery = Arc::new(delivery);
        let state = Arc::new(AppState::new(config, delivery.clone()));
        Fixture {
            app: router(state),
            delivery,
            dir,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(RecordingDelivery::default(), Some(REGISTRY)).await
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn rendered_files(dir: &Path) -> usize {
        std::fs::read_dir(dir.join("tmpFile"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn index_is_served() {
        let fx = fixture().await;
        let response = fx
            .app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        // Registry values are untrusted and must only reach the page as text.
        assert!(html.contains("textContent"));
        assert!(!html.contains("innerHTML"));
    }

    #[tokio::test]
    async fn commands_are_listed() {
        let fx = fixture().await;
        let (status, body) = send(&fx.app, "GET", "/commands", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"available_commands": {
                "start": "/etc/init.d/bosminer start",
                "stop": "/etc/init.d/bosminer stop"
            }})
        );
    }

    #[tokio::test]
    async fn execute_runs_named_command() {
        let fx = fixture().await;
        let (status, body) = send(
            &fx.app,
            "POST",
            "/execute",
            Some(json!({"host": "10.0.0.5", "command": "stop"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["host"], "10.0.0.5");
        assert_eq!(body["command"], "/etc/init.d/bosminer stop");
        assert_eq!(body["exit_code"], 0);
        assert!(body.get("error").is_none());

        let calls = fx.delivery.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "10.0.0.5");
        assert_eq!(calls[0].1.command.as_deref(), Some("/etc/init.d/bosminer stop"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_still_ok() {
        let delivery = RecordingDelivery {
            exit_code: 3,
            ..Default::default()
        };
        let fx = fixture_with(delivery, Some(REGISTRY)).await;
        let (status, body) = send(
            &fx.app,
            "POST",
            "/execute",
            Some(json!({"host": "10.0.0.5", "command": "start"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["exit_code"], 3);
    }

    #[tokio::test]
    async fn execute_rejects_unknown_command_without_connecting() {
        let fx = fixture().await;
        let (status, body) = send(
            &fx.app,
            "POST",
            "/execute",
            Some(json!({"host": "10.0.0.5", "command": "rm -rf /"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid command"));
        assert_eq!(fx.delivery.call_count(), 0);
    }

    #[tokio::test]
    async fn execute_rejects_missing_fields() {
        let fx = fixture().await;
        for payload in [json!({"host": "10.0.0.5"}), json!({"command": "start"}), json!({})] {
            let (status, body) = send(&fx.app, "POST", "/execute", Some(payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "Missing 'host' or 'command' in request body");
        }

        let request = Request::builder()
            .method("POST")
            .uri("/execute")
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let response = fx.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(fx.delivery.call_count(), 0);
    }

    #[tokio::test]
    async fn execute_reports_delivery_failure_as_500() {
        let fx = fixture_with(RecordingDelivery::failing("Authentication failed: denied"), Some(REGISTRY)).await;
        let (status, body) = send(
            &fx.app,
            "POST",
            "/execute",
            Some(json!({"host": "10.0.0.5", "command": "start"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Authentication failed: denied");
        assert!(body.get("exit_code").is_none());
    }

    #[tokio::test]
    async fn execute_against_unreachable_host_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.ssh = SshSettings {
            port: 1,
            connect_timeout_ms: 2_000,
            private_key_path: dir.path().join("id_rsa"),
            ..SshSettings::default()
        };
        let delivery = Arc::new(SshDelivery::new(config.ssh.clone()));
        let app = router(Arc::new(AppState::new(config, delivery)));

        let (status, body) = send(
            &app,
            "POST",
            "/execute",
            Some(json!({"host": "127.0.0.1", "command": "start"})),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["error"].as_str().unwrap().is_empty());
        assert!(body.get("exit_code").is_none());
    }

    #[tokio::test]
    async fn heaters_are_listed() {
        let fx = fixture().await;
        let (status, body) = send(&fx.app, "GET", "/heaters", None).await;
        assert_eq!(status, StatusCode::OK);
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["heaterName"], "office");
        assert_eq!(list[1]["ipAddress"], "10.0.0.6");
    }

    #[tokio::test]
    async fn heaters_missing_registry_is_404() {
        let fx = fixture_with(RecordingDelivery::default(), None).await;
        let (status, body) = send(&fx.app, "GET", "/heaters", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Heaters data not found");

        // The service keeps answering afterwards.
        let (status, _) = send(&fx.app, "GET", "/commands", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn heaters_malformed_registry_is_500() {
        let fx = fixture_with(RecordingDelivery::default(), Some("[{\"heaterName\":")).await;
        let (status, body) = send(&fx.app, "GET", "/heaters", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Invalid heaters data format");
    }

    #[tokio::test]
    async fn set_heater_uploads_rendered_config() {
        let fx = fixture().await;
        let (status, body) = send(
            &fx.app,
            "POST",
            "/set_heater",
            Some(json!({"heaterName": "office", "action": "medium"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["message"],
            "Heater 'office' configuration updated to 'medium' mode for type 's9'"
        );

        let calls = fx.delivery.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "miner-office.local");
        let upload = calls[0].1.upload.as_ref().unwrap();
        assert_eq!(upload.remote_path, "/etc/bosminer.toml");
        drop(calls);

        let uploads = fx.delivery.uploads.lock().unwrap();
        assert_eq!(
            uploads[0],
            "[pool]\nuser = \"acct.miner-office\"\nmode = \"medium\"\nlabel = \"miner-office\"\n"
        );
        drop(uploads);

        assert_eq!(rendered_files(fx.dir.path()), 0);
    }

    #[tokio::test]
    async fn set_heater_unknown_name_is_404_without_side_effects() {
        let fx = fixture().await;
        let (status, body) = send(
            &fx.app,
            "POST",
            "/set_heater",
            Some(json!({"heaterName": "attic", "action": "low"})),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Heater 'attic' not found");
        assert_eq!(fx.delivery.call_count(), 0);
        assert!(!fx.dir.path().join("tmpFile").exists());
    }

    #[tokio::test]
    async fn set_heater_invalid_action_is_400() {
        let fx = fixture().await;
        let (status, body) = send(
            &fx.app,
            "POST",
            "/set_heater",
            Some(json!({"heaterName": "office", "action": "turbo"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid action. Valid actions are 'low', 'medium', 'high'");
        assert_eq!(fx.delivery.call_count(), 0);
    }

    #[tokio::test]
    async fn set_heater_invalid_action_checked_before_registry() {
        let fx = fixture_with(RecordingDelivery::default(), None).await;
        let (status, _) = send(
            &fx.app,
            "POST",
            "/set_heater",
            Some(json!({"heaterName": "office", "action": "turbo"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn set_heater_missing_fields_is_400() {
        let fx = fixture().await;
        let (status, body) = send(&fx.app, "POST", "/set_heater", Some(json!({"heaterName": "office"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing 'heaterName' or 'action' in request body");
        assert_eq!(fx.delivery.call_count(), 0);
    }

    #[tokio::test]
    async fn set_heater_missing_template_is_404() {
        let fx = fixture().await;
        tokio::fs::remove_file(fx.dir.path().join("bosminerConfig/bosminer-s9-high.toml"))
            .await
            .unwrap();
        let (status, body) = send(
            &fx.app,
            "POST",
            "/set_heater",
            Some(json!({"heaterName": "office", "action": "high"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("template"));
        assert_eq!(fx.delivery.call_count(), 0);
    }

    #[tokio::test]
    async fn set_heater_transfer_failure_is_500() {
        let fx = fixture_with(RecordingDelivery::failing("Connection error: refused"), Some(REGISTRY)).await;
        let (status, body) = send(
            &fx.app,
            "POST",
            "/set_heater",
            Some(json!({"heaterName": "garage", "action": "low"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["error"],
            "Failed to update heater configuration: Connection error: refused"
        );
        assert_eq!(rendered_files(fx.dir.path()), 0);
    }

    #[tokio::test]
    async fn concurrent_applies_do_not_cross_contaminate() {
        let fx = fixture().await;
        let office = send(
            &fx.app,
            "POST",
            "/set_heater",
            Some(json!({"heaterName": "office", "action": "high"})),
        );
        let garage = send(
            &fx.app,
            "POST",
            "/set_heater",
            Some(json!({"heaterName": "garage", "action": "high"})),
        );
        let ((s1, _), (s2, _)) = tokio::join!(office, garage);
        assert_eq!(s1, StatusCode::OK);
        assert_eq!(s2, StatusCode::OK);

        let calls = fx.delivery.calls.lock().unwrap();
        let uploads = fx.delivery.uploads.lock().unwrap();
        assert_eq!(calls.len(), 2);
        for ((target, _), content) in calls.iter().zip(uploads.iter()) {
            let hostname = target.trim_end_matches(".local");
            assert!(content.contains(&format!("acct.{hostname}\"")), "{target} got {content}");
        }
    }

    #[tokio::test]
    async fn openapi_document_lists_schemas() {
        let fx = fixture().await;
        let (status, body) = send(&fx.app, "GET", "/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["components"]["schemas"]["DeviceRecord"].is_object());
        assert!(body["components"]["schemas"]["ExecutionResult"].is_object());
    }
}
