//! Test utilities for API server integration tests

use axum_test::TestServer;
use std::sync::Arc;
use tradesentient::config::Settings;
use tradesentient::core::http::create_router;
use tradesentient::core::runtime::ServiceContext;
use wiremock::MockServer;

/// Test helper for API server integration tests
///
/// Upstream APIs point at a mock server with no routes mounted, so every
/// upstream lookup fails and the seeded ticker lists and fallback forex rate
/// are served.
#[allow(dead_code)]
pub struct TestApiServer {
    pub server: TestServer,
    pub context: Arc<ServiceContext>,
    pub upstream: MockServer,
}

impl TestApiServer {
    pub async fn new() -> Self {
        Self::with_windows(10, 30).await
    }

    pub async fn with_windows(short_window: usize, long_window: usize) -> Self {
        Self::with_settings(|settings| {
            settings.short_window = short_window;
            settings.long_window = long_window;
        })
        .await
    }

    /// Test server whose settings are adjusted by `configure` before startup
    pub async fn with_settings(configure: impl FnOnce(&mut Settings)) -> Self {
        let upstream = MockServer::start().await;
        let mut settings = test_settings(&upstream, 10, 30);
        configure(&mut settings);

        let context = Arc::new(ServiceContext::local(settings).expect("service context"));
        let app = create_router(context.app_state());
        let server = TestServer::new(app).expect("start test server");

        Self {
            server,
            context,
            upstream,
        }
    }
}

pub fn test_settings(upstream: &MockServer, short_window: usize, long_window: usize) -> Settings {
    Settings {
        short_window,
        long_window,
        endpoint_buffer: 64,
        forex_api_url: upstream.uri(),
        forex_backup_api_url: upstream.uri(),
        coingecko_api_url: upstream.uri(),
        wikipedia_url: upstream.uri(),
        ..Settings::default()
    }
}
