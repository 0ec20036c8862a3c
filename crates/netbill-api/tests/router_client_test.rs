#![allow(clippy::unwrap_used)]
// Integration tests for `RouterClient` against an in-process fake router.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio_util::codec::Framed;

use netbill_api::codec::SentenceCodec;
use netbill_api::{
    Error, NewSecret, RouterClient, RouterEndpoint, SecretChange, Sentence, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

type Log = Arc<Mutex<Vec<Vec<String>>>>;

fn s(words: &[&str]) -> Sentence {
    Sentence::from_words(words.iter().map(|w| (*w).to_owned()).collect())
}

/// Spawn a router that answers `/login` with password `pass` and hands
/// every other sentence to `handler`. Every received sentence is logged.
async fn fake_router<F>(handler: F) -> (SocketAddr, Log)
where
    F: Fn(&Sentence) -> Vec<Sentence> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: Log = Arc::default();
    let handler = Arc::new(handler);

    let server_log = Arc::clone(&log);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let handler = Arc::clone(&handler);
            let log = Arc::clone(&server_log);
            tokio::spawn(async move {
                let mut framed = Framed::new(stream, SentenceCodec::new());
                while let Some(Ok(sentence)) = framed.next().await {
                    log.lock().unwrap().push(sentence.words().to_vec());
                    let replies = if sentence.command() == Some("/login") {
                        if sentence.attribute("password") == Some("pass") {
                            vec![s(&["!done"])]
                        } else {
                            vec![
                                s(&["!trap", "=message=invalid user name or password (6)"]),
                                s(&["!done"]),
                            ]
                        }
                    } else {
                        (*handler)(&sentence)
                    };
                    for reply in replies {
                        if framed.send(reply).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    (addr, log)
}

fn client_for(addr: SocketAddr, password: &str) -> RouterClient {
    let endpoint = RouterEndpoint::new(
        addr.ip().to_string(),
        "admin",
        SecretString::from(password.to_owned()),
    )
    .with_port(addr.port());
    RouterClient::new(Some(endpoint), TransportConfig::with_timeout(Duration::from_secs(5)))
}

/// Secrets table with one entry, `budi` at id `*5`.
fn secrets_handler(sentence: &Sentence) -> Vec<Sentence> {
    match sentence.command() {
        Some("/ppp/secret/print") => {
            if sentence.words().iter().any(|w| w == "?name=budi") {
                vec![s(&["!re", "=.id=*5", "=name=budi"]), s(&["!done"])]
            } else {
                vec![s(&["!done"])]
            }
        }
        _ => vec![s(&["!done"])],
    }
}

fn commands(log: &Log) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|words| words.first().cloned())
        .collect()
}

// ── Connection tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_login_sends_credentials() {
    let (addr, log) = fake_router(secrets_handler).await;
    let client = client_for(addr, "pass");

    let session = client.connect().await.unwrap();
    session.close().await;

    let first = log.lock().unwrap()[0].clone();
    assert_eq!(first, ["/login", "=name=admin", "=password=pass"]);
}

#[tokio::test]
async fn test_login_failure() {
    let (addr, _log) = fake_router(secrets_handler).await;
    let client = client_for(addr, "wrong");

    let result = client.find_secret_id("budi").await;
    assert!(
        matches!(&result, Err(Error::AuthenticationFailed { message }) if message.contains("invalid user name")),
        "expected AuthenticationFailed, got: {result:?}"
    );
    assert!(!client.toggle_secret("budi", false).await);
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(addr, "pass");
    let result = client.connect().await;
    assert!(
        matches!(result, Err(Error::ConnectionFailed { .. })),
        "expected ConnectionFailed, got: {result:?}"
    );
}

#[tokio::test]
async fn test_read_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // Accept and hold the socket without ever answering.
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let endpoint = RouterEndpoint::new("127.0.0.1", "admin", SecretString::from("pass".to_owned()))
        .with_port(addr.port());
    let client = RouterClient::new(
        Some(endpoint),
        TransportConfig::with_timeout(Duration::from_millis(200)),
    );

    let result = client.connect().await;
    assert!(
        matches!(result, Err(Error::Timeout { .. })),
        "expected Timeout, got: {result:?}"
    );
}

#[tokio::test]
async fn test_stream_closed_during_login() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // Read the login sentence, then hang up without answering.
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, SentenceCodec::new());
        let _login = framed.next().await;
    });

    let client = client_for(addr, "pass");
    let result = client.connect().await;
    assert!(
        matches!(result, Err(Error::AuthenticationFailed { .. })),
        "expected AuthenticationFailed, got: {result:?}"
    );
}

#[tokio::test]
async fn test_connect_timeout_is_connection_failure() {
    // TEST-NET-1 is never routed: the connect either hangs until the bound
    // or fails outright, and both surface as ConnectionFailed.
    let endpoint = RouterEndpoint::new("192.0.2.1", "admin", SecretString::from("pass".to_owned()));
    let client = RouterClient::new(
        Some(endpoint),
        TransportConfig::with_timeout(Duration::from_millis(200)),
    );

    let result = client.connect().await;
    assert!(
        matches!(result, Err(Error::ConnectionFailed { .. })),
        "expected ConnectionFailed, got: {result:?}"
    );
}

// ── Secret tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_find_secret_id() {
    let (addr, log) = fake_router(secrets_handler).await;
    let client = client_for(addr, "pass");

    assert_eq!(client.find_secret_id("budi").await.unwrap().as_deref(), Some("*5"));
    assert_eq!(client.find_secret_id("nobody").await.unwrap(), None);

    let print = log.lock().unwrap()[1].clone();
    assert_eq!(print, ["/ppp/secret/print", "?name=budi"]);
}

#[tokio::test]
async fn test_toggle_disables_by_id() {
    let (addr, log) = fake_router(secrets_handler).await;
    let client = client_for(addr, "pass");

    let change = client.try_toggle_secret("budi", false).await.unwrap();
    assert_eq!(change, SecretChange::Applied);

    let sent = log.lock().unwrap().last().cloned().unwrap();
    assert_eq!(sent, ["/ppp/secret/disable", "=.id=*5"]);
}

#[tokio::test]
async fn test_toggle_lookup_miss() {
    let (addr, log) = fake_router(secrets_handler).await;
    let client = client_for(addr, "pass");

    let change = client.try_toggle_secret("ghost", true).await.unwrap();
    assert_eq!(change, SecretChange::NotFound);
    assert!(!client.toggle_secret("ghost", true).await);
    assert!(!commands(&log).iter().any(|c| c == "/ppp/secret/enable"));
}

#[tokio::test]
async fn test_remove_secret() {
    let (addr, log) = fake_router(secrets_handler).await;
    let client = client_for(addr, "pass");

    assert!(client.remove_secret("budi").await);
    let sent = log.lock().unwrap().last().cloned().unwrap();
    assert_eq!(sent, ["/ppp/secret/remove", "=.id=*5"]);
}

#[tokio::test]
async fn test_add_secret_attributes() {
    let (addr, log) = fake_router(secrets_handler).await;
    let client = client_for(addr, "pass");

    let mut secret = NewSecret::new("sari002", SecretString::from("Ab12Cd34".to_owned()));
    secret.remote_address = Some("10.10.0.20".into());
    secret.comment = Some("Customer: Sari".into());
    assert!(client.add_secret(&secret).await);

    let sent = log.lock().unwrap().last().cloned().unwrap();
    assert_eq!(
        sent,
        [
            "/ppp/secret/add",
            "=name=sari002",
            "=password=Ab12Cd34",
            "=service=pppoe",
            "=profile=default",
            "=remote-address=10.10.0.20",
            "=comment=Customer: Sari",
        ]
    );
}

#[tokio::test]
async fn test_add_secret_trap() {
    let (addr, _log) = fake_router(|_| {
        vec![
            s(&["!trap", "=message=failure: secret with the same name already exists"]),
            s(&["!done"]),
        ]
    })
    .await;
    let client = client_for(addr, "pass");
    let secret = NewSecret::new("budi", SecretString::from("x".to_owned()));

    let result = client.try_add_secret(&secret).await;
    assert!(
        matches!(&result, Err(Error::Trap { message, .. }) if message.contains("already exists")),
        "expected Trap, got: {result:?}"
    );
    assert!(!client.add_secret(&secret).await);
}

// ── Monitoring tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_active_connections() {
    let (addr, _log) = fake_router(|_| {
        vec![
            s(&["!re", "=.id=*A", "=name=budi", "=address=10.10.0.2", "=uptime=1h2m"]),
            s(&["!re", "=.id=*B", "=service=pppoe"]),
            s(&["!re", "=.id=*C", "=name=sari", "=address=10.10.0.3"]),
            s(&["!done"]),
        ]
    })
    .await;
    let client = client_for(addr, "pass");

    let active = client.list_active_connections().await;
    let names: Vec<_> = active.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["budi", "sari"]);
    assert_eq!(active[0].address(), Some("10.10.0.2"));
    assert_eq!(active[0].uptime(), Some("1h2m"));
}

#[tokio::test]
async fn test_list_active_connections_degrades_to_empty() {
    let (addr, _log) = fake_router(secrets_handler).await;
    let client = client_for(addr, "wrong");
    assert!(client.list_active_connections().await.is_empty());
}

#[tokio::test]
async fn test_connection_probe() {
    let (addr, _log) = fake_router(|_| vec![s(&["!re", "=name=MikroTik"]), s(&["!done"])]).await;
    let client = client_for(addr, "pass");

    let probe = client.test_connection().await;
    assert!(probe.success);
    assert_eq!(probe.message, "Connected to MikroTik");
    assert_eq!(
        probe.raw_reply.unwrap(),
        ["!re", "=name=MikroTik", "!done"]
    );

    let failing = client_for(addr, "wrong").test_connection().await;
    assert!(!failing.success);
    assert!(failing.message.starts_with("Authentication failed"));
}
