//! End-to-end session flow against the mock auth API over real HTTP

use dashkit::auth::{MockAuthService, DEMO_EMAIL, DEMO_PASSWORD};
use dashkit::config::{AuthMode, Config, StorageBackendKind};
use dashkit::http::{HttpError, LogNavigator, ReqwestTransport};
use dashkit::mock_api::{self, AppState};
use dashkit::session::{AuthStatus, Principal, SessionError, SessionEvent};
use dashkit::storage::{keys, FileStorage, MemoryStorage, StorageBackend};
use dashkit::Dashkit;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct TestServer {
    base_url: String,
    auth: Arc<MockAuthService>,
    _shutdown: oneshot::Sender<()>,
}

async fn start_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let auth = Arc::new(MockAuthService::new(Duration::ZERO));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(mock_api::run(
        listener,
        AppState::new(Arc::clone(&auth)),
        async move {
            let _ = shutdown_rx.await;
        },
    ));

    TestServer {
        base_url: format!("http://{}", addr),
        auth,
        _shutdown: shutdown_tx,
    }
}

fn http_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.api.timeout_ms = 5_000;
    config.auth.mode = AuthMode::Http;
    config.storage.backend = StorageBackendKind::Memory;
    config
}

fn client_over(server: &TestServer, backend: Arc<dyn StorageBackend>) -> Dashkit {
    let transport = Arc::new(ReqwestTransport::new(server.base_url.clone()).unwrap());
    Dashkit::with_parts(
        http_config(&server.base_url),
        backend,
        transport,
        Arc::new(LogNavigator),
    )
}

#[tokio::test]
async fn test_login_request_and_server_side_expiry() {
    let server = start_server().await;
    let storage = MemoryStorage::new();
    let client = client_over(&server, Arc::new(storage.clone()));

    // Rejected credentials leave the client anonymous
    let err = client.session().login(DEMO_EMAIL, "wrong").await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Authentication("Invalid email or password".to_string())
    );
    assert_eq!(client.session().status(), AuthStatus::Anonymous);

    let principal = client
        .session()
        .login(DEMO_EMAIL, DEMO_PASSWORD)
        .await
        .unwrap();
    assert_eq!(principal.role, "Administrator");

    // The adapter injects the persisted token
    let me: Principal = client.api().get("/auth/me").await.unwrap();
    assert_eq!(me, principal);

    // Server forgets the token: the next request ends the session
    let token = client.session().token().unwrap();
    assert!(server.auth.revoke_token(&token));

    let err = client.api().get::<Principal>("/auth/me").await.unwrap_err();
    assert_eq!(err, HttpError::SessionEnded);
    assert_eq!(client.session().status(), AuthStatus::Anonymous);
    assert_eq!(storage.get(keys::TOKEN).unwrap(), None);
    assert_eq!(storage.get(keys::USER).unwrap(), None);
}

#[tokio::test]
async fn test_verify_session_over_http() {
    let server = start_server().await;
    let storage = MemoryStorage::new();
    let client = client_over(&server, Arc::new(storage.clone()));
    let mut events = client.session().subscribe_events();

    assert_eq!(client.session().verify().await.unwrap(), None);

    let principal = client
        .session()
        .login(DEMO_EMAIL, DEMO_PASSWORD)
        .await
        .unwrap();
    assert_eq!(client.session().verify().await.unwrap(), Some(principal));

    let token = client.session().token().unwrap();
    assert!(server.auth.revoke_token(&token));

    assert_eq!(client.session().verify().await.unwrap(), None);
    assert_eq!(client.session().status(), AuthStatus::Anonymous);
    assert_eq!(storage.get(keys::TOKEN).unwrap(), None);
    assert_eq!(storage.get(keys::USER).unwrap(), None);

    assert!(matches!(events.try_recv().unwrap(), SessionEvent::LoggedIn(_)));
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_failed_login_keeps_existing_session() {
    let server = start_server().await;
    let client = client_over(&server, Arc::new(MemoryStorage::new()));

    let principal = client
        .session()
        .login(DEMO_EMAIL, DEMO_PASSWORD)
        .await
        .unwrap();

    // A 401 from the credential exchange is not a session expiry
    assert!(client.session().login(DEMO_EMAIL, "nope").await.is_err());
    assert_eq!(client.session().current_principal(), Some(principal));
    assert!(client.api().get::<Principal>("/auth/me").await.is_ok());
}

#[tokio::test]
async fn test_register_over_http() {
    let server = start_server().await;
    let client = client_over(&server, Arc::new(MemoryStorage::new()));

    let principal = client
        .session()
        .register("Jane Roe", "jane@example.com", "hunter22")
        .await
        .unwrap();
    assert_eq!(principal.role, "User");
    assert_eq!(server.auth.account_count(), 2);

    let err = client
        .session()
        .register("Jane Again", "jane@example.com", "hunter22")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SessionError::Registration("Email already in use".to_string())
    );
    assert_eq!(client.session().current_principal(), Some(principal));
}

#[tokio::test]
async fn test_second_process_sees_login_and_logout() {
    let server = start_server().await;
    let dir = tempfile::tempdir().unwrap();

    let first = client_over(&server, Arc::new(FileStorage::open(dir.path()).unwrap()));
    let second = client_over(&server, Arc::new(FileStorage::open(dir.path()).unwrap()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = second
        .storage()
        .subscribe(keys::USER, move |user: Option<Principal>| {
            sink.lock().unwrap().push(user.map(|u| u.email));
        });

    first
        .session()
        .login(DEMO_EMAIL, DEMO_PASSWORD)
        .await
        .unwrap();
    second.storage().poll_external_changes();

    first.session().logout();
    second.storage().poll_external_changes();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some(DEMO_EMAIL.to_string()), None]
    );

    // A client started after the login would have resumed it; after the
    // logout it starts anonymous
    let third = client_over(&server, Arc::new(FileStorage::open(dir.path()).unwrap()));
    assert_eq!(third.session().status(), AuthStatus::Anonymous);
}
