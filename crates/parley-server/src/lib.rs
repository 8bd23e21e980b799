pub mod config;
pub mod delivery;
pub mod routes;
pub mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_store::{MailboxStore, StoreError};
use parley_types::User;

use crate::routes::SharedState;

pub fn app(state: SharedState) -> Router {
    Router::new()
        .route("/users", get(routes::get_users).post(routes::create_user))
        .route("/messages", post(routes::send_message))
        .route("/subscribe", get(routes::subscribe))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Seed the demo users on first boot. A store that already has users is
/// left alone, so restarts are idempotent.
pub async fn seed_users(store: &MailboxStore) -> Result<(), StoreError> {
    if !store.users().await?.is_empty() {
        return Ok(());
    }
    for i in 0..4 {
        let login = format!("user{i}");
        store
            .create_user(&User {
                full_name: format!("{login}_{login}"),
                login,
            })
            .await?;
    }
    info!("seeded 4 demo users");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parley_store::MemoryKv;

    use super::*;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = MailboxStore::new(Arc::new(MemoryKv::new()));
        seed_users(&store).await.unwrap();
        seed_users(&store).await.unwrap();

        let users = store.users().await.unwrap();
        assert_eq!(users.len(), 4);
        assert_eq!(users[0].login, "user0");
        assert_eq!(users[0].full_name, "user0_user0");
    }

    #[tokio::test]
    async fn seeding_leaves_existing_users_alone() {
        let store = MailboxStore::new(Arc::new(MemoryKv::new()));
        store
            .create_user(&User {
                login: "ann".into(),
                full_name: "Ann".into(),
            })
            .await
            .unwrap();
        seed_users(&store).await.unwrap();

        assert_eq!(store.users().await.unwrap().len(), 1);
    }
}
