use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use parley_store::{MailboxStore, StoreError};
use parley_types::api::{
    CreateUserRequest, SendMessageRequest, SendMessageResponse, SubscribeQuery, UsersResponse,
};
use parley_types::{Message, User};

use crate::delivery::DeliveryConfig;
use crate::ws;

pub struct AppState {
    pub store: MailboxStore,
    pub delivery: DeliveryConfig,
    pub fail_fast: bool,
}

pub type SharedState = Arc<AppState>;

/// `GET /users` — every known user, or a 500 with no partial results.
pub async fn get_users(
    State(state): State<SharedState>,
) -> Result<Json<UsersResponse>, StatusCode> {
    let users = state
        .store
        .users()
        .await
        .map_err(|e| store_failure(&state, "list users", e))?;
    Ok(Json(UsersResponse { users }))
}

/// `POST /users` — create (or overwrite) a user record.
pub async fn create_user(
    State(state): State<SharedState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<StatusCode, StatusCode> {
    let user = User {
        login: req.login,
        full_name: req.full_name,
    };
    state
        .store
        .create_user(&user)
        .await
        .map_err(|e| store_failure(&state, "create user", e))?;
    Ok(StatusCode::CREATED)
}

/// `POST /messages` — stamp the server time and enqueue.
///
/// The receipt string goes back whenever storage succeeds; whether
/// `login_to` names a real or subscribed user is not checked.
pub async fn send_message(
    State(state): State<SharedState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, StatusCode> {
    let message = Message {
        login_from: req.login_from,
        login_to: req.login_to,
        created_at: chrono::Utc::now().timestamp() as i32,
        body: req.body,
    };
    state
        .store
        .create_message(&message)
        .await
        .map_err(|e| store_failure(&state, "store message", e))?;

    Ok(Json(SendMessageResponse {
        status: format!(
            "{} received message from {}",
            message.login_to, message.login_from
        ),
    }))
}

/// `GET /subscribe?login=...` — upgrade and hand the socket to a delivery
/// loop for `login`.
pub async fn subscribe(
    State(state): State<SharedState>,
    Query(query): Query<SubscribeQuery>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| {
        ws::handle_subscription(
            socket,
            state.store.clone(),
            state.delivery.clone(),
            query.login,
        )
    })
}

/// Failure policy for unary calls: log and return a 500 by default; under
/// the opt-in fail-fast policy the process exits instead.
fn store_failure(state: &AppState, what: &str, err: StoreError) -> StatusCode {
    error!("{} failed: {}", what, err);
    if state.fail_fast {
        std::process::exit(1);
    }
    StatusCode::INTERNAL_SERVER_ERROR
}
