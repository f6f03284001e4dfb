use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use classify_module::LlmClient;
use gmail_module::{CalendarClient, GmailClient, GoogleAuth};

use crate::actions::{execute_approved, ActionStore, ExecutorDeps};
use crate::category_store::CategoryStore;
use crate::declutter::{self, DeclutterDeps, DeclutterError, DeclutterRequest, DeclutterStore};
use crate::email_store::EmailStore;
use crate::process::{self, ProcessError, ProcessRequest, ScanDeps};
use crate::sender_store::SenderStore;
use crate::settings_store::SettingsStore;
use crate::store_util::normalize_email;

use super::config::ServiceConfig;
use super::state::AppState;
use super::BoxError;

pub async fn run_server(
    config: ServiceConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), BoxError> {
    let config = Arc::new(config);
    let llm = Arc::new(LlmClient::new(config.llm.clone())?);
    let emails = Arc::new(EmailStore::new(&config.emails_db_path)?);
    let senders = Arc::new(SenderStore::new(&config.senders_db_path)?);
    let categories = Arc::new(CategoryStore::new(&config.categories_db_path)?);
    let settings = Arc::new(SettingsStore::new(&config.settings_db_path)?);
    let actions = Arc::new(ActionStore::new(&config.actions_db_path)?);
    let declutter = Arc::new(DeclutterStore::new(&config.declutter_db_path)?);

    let state = AppState {
        config: config.clone(),
        llm,
        emails,
        senders,
        categories,
        settings,
        actions,
        declutter,
    };

    let host: IpAddr = config
        .host
        .parse()
        .map_err(|_| format!("invalid host: {}", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    info!("zeno assistant service listening on {}", addr);

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/process-emails", post(process_emails))
        .route("/api/declutter/scan", post(declutter_scan))
        .route("/api/actions/execute", post(execute_actions))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(config.body_max_bytes));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

/// POST /api/process-emails — run one inbox scan for the caller.
async fn process_emails(
    State(state): State<AppState>,
    Json(mut request): Json<ProcessRequest>,
) -> impl IntoResponse {
    request.user_email = normalize_email(&request.user_email);
    if request.user_email.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "user_email is required");
    }
    if request.access_token.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "access_token is required");
    }

    let deps = ScanDeps {
        llm: &state.llm,
        emails: &state.emails,
        senders: &state.senders,
        categories: &state.categories,
        settings: &state.settings,
        enhanced: state.config.enhanced_classification,
        default_max_emails: state.config.max_emails,
    };
    match process::run_scan(&deps, &request).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => {
            error!(user = %request.user_email, error = %err, "process-emails failed");
            let status = match err {
                ProcessError::Gmail(_) => StatusCode::BAD_GATEWAY,
                ProcessError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_response(status, err.to_string())
        }
    }
}

/// POST /api/declutter/scan — flag spam-dominant senders.
async fn declutter_scan(
    State(state): State<AppState>,
    Json(mut request): Json<DeclutterRequest>,
) -> impl IntoResponse {
    request.user_email = normalize_email(&request.user_email);
    if request.user_email.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "user_email is required");
    }
    if request.access_token.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "access_token is required");
    }

    let deps = DeclutterDeps {
        llm: &state.llm,
        categories: &state.categories,
        store: &state.declutter,
    };
    match declutter::run_scan(&deps, &request).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => {
            error!(user = %request.user_email, error = %err, "declutter scan failed");
            let status = match err {
                DeclutterError::Gmail(_) => StatusCode::BAD_GATEWAY,
                DeclutterError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_response(status, err.to_string())
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ExecuteActionsRequest {
    user_email: String,
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// POST /api/actions/execute — run every approved action for the caller.
async fn execute_actions(
    State(state): State<AppState>,
    Json(mut request): Json<ExecuteActionsRequest>,
) -> impl IntoResponse {
    request.user_email = normalize_email(&request.user_email);
    if request.user_email.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "user_email is required");
    }
    if request.access_token.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "access_token is required");
    }

    let auth = GoogleAuth::from_tokens(request.access_token.clone(), request.refresh_token.clone());
    let gmail = match GmailClient::new(auth) {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "gmail client setup failed");
            return error_response(StatusCode::BAD_GATEWAY, err.to_string());
        }
    };
    let calendar = CalendarClient::with_connection(gmail.connection());

    let deps = ExecutorDeps {
        actions: &state.actions,
        gmail: &gmail,
        calendar: &calendar,
    };
    match execute_approved(&deps, &request.user_email).await {
        Ok(outcomes) => (StatusCode::OK, Json(outcomes)).into_response(),
        Err(err) => {
            error!(user = %request.user_email, error = %err, "action execution failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let message = message.into();
    (status, Json(json!({"error": message}))).into_response()
}
