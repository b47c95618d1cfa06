mod identity;
mod sink;

use std::{net::SocketAddr, time::Duration};

use axum::Router;
use config::Config;
use server::{Envelope, ServeConfig};
use tokio::{net::TcpListener, time::timeout};

pub use identity::{EXPIRED_TOKEN, MockIdentityService, SLOW_TOKEN, VALID_TOKEN};
pub use sink::MockSink;

/// Test client for making HTTP requests to the test server
pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TestClient {
    /// Create a new test client for the given base URL
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Start a request to the given path, optionally carrying a bearer token
    pub fn request(&self, method: http::Method, path: &str, token: Option<&str>) -> reqwest::RequestBuilder {
        let request = self.client.request(method, format!("{}{}", self.base_url, path));

        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a GET request to the given path
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.request(http::Method::GET, path, None).send().await.unwrap()
    }

    /// Send an authenticated GET request to the given path
    pub async fn get_as(&self, path: &str, token: &str) -> reqwest::Response {
        self.request(http::Method::GET, path, Some(token)).send().await.unwrap()
    }

    /// Send an authenticated POST request to the given path with JSON body
    pub async fn post_as<T: serde::Serialize>(&self, path: &str, token: &str, body: &T) -> reqwest::Response {
        self.request(http::Method::POST, path, Some(token))
            .json(body)
            .send()
            .await
            .unwrap()
    }
}

/// Builder for a [`TestServer`]
#[derive(Default)]
pub struct TestServerBuilder {
    routes: Option<Router<Envelope>>,
    identity_url: Option<String>,
    sink_url: Option<String>,
}

impl TestServerBuilder {
    /// Business routes to serve next to the built-in endpoints
    pub fn routes(mut self, routes: Router<Envelope>) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Point the authentication relay at this mock
    pub fn identity(mut self, identity: &MockIdentityService) -> Self {
        self.identity_url = Some(identity.url());
        self
    }

    /// Point the telemetry emitter at this mock
    pub fn sink(mut self, sink: &MockSink) -> Self {
        self.sink_url = Some(sink.url());
        self
    }

    /// Start the server with the given TOML configuration
    pub async fn build(self, config_toml: &str) -> TestServer {
        let mut config: Config = toml::from_str(config_toml).unwrap();

        if let Some(url) = self.identity_url {
            config.identity.url = url.parse().unwrap();
        }

        if let Some(url) = self.sink_url {
            config.telemetry.url = url.parse().unwrap();
        }

        TestServer::start(config, self.routes.unwrap_or_default()).await
    }
}

/// Test server that manages the lifecycle of a server instance
pub struct TestServer {
    pub client: TestClient,
    pub address: SocketAddr,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Create a builder for a test server
    pub fn builder() -> TestServerBuilder {
        TestServerBuilder::default()
    }

    async fn start(config: Config, routes: Router<Envelope>) -> Self {
        config.validate().unwrap();

        // Find an available port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let serve_config = ServeConfig {
            listen_address: address,
            config,
            routes,
        };

        let (tx, mut rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(async move {
            // Drop the listener so the server can bind to the address
            drop(listener);

            let _ = tx.send(server::serve(serve_config).await);
        });

        // Wait for the server to start up or fail
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Check if the server failed to start (non-blocking check)
        if let Ok(Err(e)) = rx.try_recv() {
            eprintln!("Server failed to start: {e}");
            std::process::exit(1);
        }

        let client = TestClient::new(format!("http://{address}"));

        // Verify the server is actually running by making a simple request
        let mut retries = 10;
        while retries > 0 {
            if timeout(Duration::from_millis(100), client.request(http::Method::GET, "/", None).send())
                .await
                .is_ok_and(|response| response.is_ok())
            {
                break;
            }
            retries -= 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestServer {
            client,
            address,
            _handle: handle,
        }
    }
}
