//! Integration Test Utilities and Common Code

#![allow(dead_code)]

use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri, Version};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::collections::VecDeque;
use std::net::TcpListener;
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use tokio::sync::Notify;

pub use assert_cmd::prelude::*;
pub use assert_fs::prelude::*;
pub use assert_fs::{fixture::ChildPath, TempDir};
pub use predicates::prelude::*;
pub use predicates::str::{contains, is_empty, RegexPredicate};
pub use pretty_assertions::{assert_eq, assert_ne};
pub use std::path::Path;
pub use std::process::Command;

/// Build a `Command` for the `fanquote` crate binary with variadic command-line arguments.
///
/// The arguments can be anything that is allowed by `Command::arg`.
#[macro_export]
macro_rules! fanquote {
    ( $( $arg:expr ),* ) => {
        {
            let mut cmd = fanquote_cmd();
            $(
                cmd.arg($arg);
            )*
            cmd
        }
    }
}

/// Build an `assert_cmd::assert::Assert` by calling `fanquote!(args).assert().success()`.
#[macro_export]
macro_rules! fanquote_success {
    ( $( $arg:expr ),* ) => { fanquote!($( $arg ),*).assert().success() }
}

/// Build an `assert_cmd::assert::Assert` by calling `fanquote!(args).assert().failure()`.
#[macro_export]
macro_rules! fanquote_failure {
    ( $( $arg:expr ),* ) => { fanquote!($( $arg ),*).assert().failure() }
}

// make macros easily visible to other modules
pub use {fanquote, fanquote_failure, fanquote_success};

/// Build a `Command` for the `fanquote` crate binary, isolated from any configuration in the
/// environment.
pub fn fanquote_cmd() -> Command {
    let mut cmd = Command::cargo_bin("fanquote").expect("fanquote should be executable");
    cmd.env_remove("FQ_API_URL")
        .env_remove("FQ_ACCESS_URL")
        .env_remove("FQ_DATASTORE")
        .env_remove("FQ_TIMEOUT")
        .env_remove("FQ_LOG")
        .env("NO_COLOR", "1");
    cmd
}

/// Create a `RegexPredicate` from the given pattern.
pub fn is_match(pat: &str) -> RegexPredicate {
    predicates::str::is_match(pat).expect("pattern should compile")
}

// -------------------------------------------------------------------------------------------------
// Test environment
// -------------------------------------------------------------------------------------------------
/// A scratch directory holding input files and a quote log.
pub struct TestEnv {
    pub root: TempDir,
    pub datastore: ChildPath,
}

impl TestEnv {
    pub fn new() -> Self {
        let root = TempDir::new().expect("should be able to create tempdir");
        let datastore = root.child("fanquote.db.d");
        assert!(!datastore.exists());

        Self { root, datastore }
    }

    /// Create a file within this environment with the given name and contents.
    pub fn input_file(&self, name: &str, contents: &str) -> ChildPath {
        let input = self.root.child(name);
        input
            .write_str(contents)
            .expect("should be able to write input file contents");
        input
    }

    /// Create a name for a child entry within this environment, without touching the filesystem.
    pub fn child(&self, name: &str) -> ChildPath {
        self.root.child(name)
    }

    pub fn dspath(&self) -> &Path {
        self.datastore.path()
    }
}

// -------------------------------------------------------------------------------------------------
// Fake HTTP server
// -------------------------------------------------------------------------------------------------
/// A request as received by a `FakeServer`.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    /// e.g. `GET /history?length=2500 HTTP/1.1`
    pub request_line: String,
    pub body: String,
}

impl ReceivedRequest {
    pub fn method(&self) -> &str {
        self.request_line.split(' ').next().unwrap_or("")
    }

    pub fn target(&self) -> &str {
        self.request_line.split(' ').nth(1).unwrap_or("")
    }
}

/// Shared state of a running `FakeServer`.
struct Canned {
    responses: Mutex<VecDeque<(u16, String)>>,
    received: Mutex<Vec<ReceivedRequest>>,
    exhausted: Notify,
}

/// Answer every request, whatever its route, with the next canned response.
async fn respond(
    State(canned): State<Arc<Canned>>,
    method: Method,
    uri: Uri,
    version: Version,
    body: String,
) -> Response {
    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    canned.received.lock().unwrap().push(ReceivedRequest {
        request_line: format!("{method} {target} {version:?}"),
        body,
    });

    let next = {
        let mut responses = canned.responses.lock().unwrap();
        let next = responses.pop_front();
        if responses.is_empty() {
            canned.exhausted.notify_one();
        }
        next
    };
    let (status, body) = next.unwrap_or((500, r#"{"錯誤": "unexpected request"}"#.to_string()));
    let status = StatusCode::from_u16(status).expect("canned status should be valid");
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// A local HTTP server that answers a fixed sequence of requests with canned JSON responses,
/// and shuts down once all of them have been served.
pub struct FakeServer {
    pub url: String,
    canned: Arc<Canned>,
    handle: JoinHandle<()>,
}

impl FakeServer {
    pub fn start(responses: Vec<(u16, String)>) -> Self {
        let canned = Arc::new(Canned {
            responses: Mutex::new(responses.into()),
            received: Mutex::new(Vec::new()),
            exhausted: Notify::new(),
        });
        if canned.responses.lock().unwrap().is_empty() {
            canned.exhausted.notify_one();
        }

        let (url_tx, url_rx) = mpsc::channel();
        let state = canned.clone();
        let handle = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("should be able to start a runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("should be able to bind");
                let addr = listener.local_addr().unwrap();
                url_tx.send(format!("http://{addr}")).unwrap();

                let app = Router::new().fallback(respond).with_state(state.clone());
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { state.exhausted.notified().await })
                    .await
                    .expect("fake server should run");
            });
        });
        let url = url_rx.recv().expect("fake server should report its address");

        FakeServer { url, canned, handle }
    }

    /// A server that answers a single request.
    pub fn once(status: u16, body: &str) -> Self {
        Self::start(vec![(status, body.to_string())])
    }

    /// Wait for all expected requests to be served, returning them in order.
    pub fn finish(self) -> Vec<ReceivedRequest> {
        self.handle.join().expect("fake server thread should not panic");
        let received = self.canned.received.lock().unwrap();
        received.clone()
    }
}

/// A URL on which nothing is listening.
pub fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("should be able to bind");
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
