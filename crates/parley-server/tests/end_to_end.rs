use std::sync::Arc;
use std::time::Duration;

use parley_client::Client;
use parley_server::delivery::DeliveryConfig;
use parley_server::routes::AppState;
use parley_server::{app, seed_users};
use parley_store::{Kv, KvError, MailboxStore, MemoryKv};
use parley_types::User;

async fn serve() -> (Client, MailboxStore) {
    serve_with(MailboxStore::new(Arc::new(MemoryKv::new()))).await
}

async fn serve_with(store: MailboxStore) -> (Client, MailboxStore) {
    let state = Arc::new(AppState {
        store: store.clone(),
        delivery: DeliveryConfig {
            poll_interval: Duration::from_millis(50),
            send_delay: Duration::from_millis(1),
        },
        fail_fast: false,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });

    (Client::new(format!("http://{addr}")), store)
}

async fn wait_for_empty_mailbox(store: &MailboxStore, login: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !store.messages(login).await.unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("mailbox never drained");
}

#[tokio::test]
async fn send_then_subscribe_drains_the_mailbox() {
    let (client, store) = serve().await;

    // "bob" is not a registered user; sending still succeeds and the
    // receipt names him anyway.
    let status = client.send_message("ann", "bob", "hello bob").await.unwrap();
    assert_eq!(status, "bob received message from ann");
    client.send_message("cid", "bob", "hi from cid").await.unwrap();

    let mut sub = client.subscribe("bob").await.unwrap();
    let first = sub.next().await.unwrap().unwrap();
    let second = sub.next().await.unwrap().unwrap();

    // Store scan order: "ann" sorts before "cid" under bob's key prefix.
    assert_eq!((first.login_from.as_str(), first.body.as_str()), ("ann", "hello bob"));
    assert_eq!((second.login_from.as_str(), second.body.as_str()), ("cid", "hi from cid"));

    wait_for_empty_mailbox(&store, "bob").await;
}

#[tokio::test]
async fn messages_sent_during_a_subscription_arrive_on_a_later_poll() {
    let (client, store) = serve().await;

    let mut sub = client.subscribe("bob").await.unwrap();
    client.send_message("ann", "bob", "late arrival").await.unwrap();

    let delivered = tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .expect("nothing delivered within poll window")
        .unwrap()
        .unwrap();
    assert_eq!(delivered.body, "late arrival");

    wait_for_empty_mailbox(&store, "bob").await;
}

#[tokio::test]
async fn users_roundtrip_over_http() {
    let (client, store) = serve().await;
    seed_users(&store).await.unwrap();

    let users = client.get_users().await.unwrap();
    assert_eq!(users.len(), 4);
    assert!(users.iter().any(|u| u.login == "user0"));

    client
        .create_user(&User {
            login: "ann".into(),
            full_name: "Ann A.".into(),
        })
        .await
        .unwrap();

    let users = client.get_users().await.unwrap();
    assert_eq!(users.len(), 5);
}

/// Writes land, reads fail: the server boots but every delivery poll errors.
struct ReadBrokenKv;

#[async_trait::async_trait]
impl Kv for ReadBrokenKv {
    async fn put(&self, _: &str, _: Vec<u8>) -> Result<(), KvError> {
        Ok(())
    }
    async fn get_prefix(&self, _: &str) -> Result<Vec<(String, Vec<u8>)>, KvError> {
        Err(KvError("store offline".into()))
    }
    async fn delete(&self, _: &str) -> Result<(), KvError> {
        Ok(())
    }
}

#[tokio::test]
async fn store_outage_closes_the_subscription_stream() {
    let (client, _store) = serve_with(MailboxStore::new(Arc::new(ReadBrokenKv))).await;

    // The delivery loop hits the store error on its first poll and the
    // server closes the socket; the client observes end-of-stream, not an
    // error item, and is expected to resubscribe later.
    let mut sub = client.subscribe("bob").await.unwrap();
    let end = tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .expect("stream never terminated");
    assert!(end.is_none());
}

#[tokio::test]
async fn resubscribe_resumes_pending_messages() {
    let (client, store) = serve().await;

    client.send_message("ann", "bob", "first").await.unwrap();
    {
        let mut sub = client.subscribe("bob").await.unwrap();
        let m = sub.next().await.unwrap().unwrap();
        assert_eq!(m.body, "first");
        // Subscription dropped here; the server loop gets cancelled.
    }
    wait_for_empty_mailbox(&store, "bob").await;

    client.send_message("ann", "bob", "second").await.unwrap();
    let mut sub = client.subscribe("bob").await.unwrap();
    let m = tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .expect("no delivery after resubscribe")
        .unwrap()
        .unwrap();
    assert_eq!(m.body, "second");
}
