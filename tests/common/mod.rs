//! Common test utilities for E2E tests

use std::sync::Once;

use newsboard::data::RECENT_POSTS_LIMIT;
use newsboard::{AppState, config};
use reqwest::multipart::{Form, Part};
use tempfile::TempDir;
use tokio::net::TcpListener;

static METRICS: Once = Once::new();

/// Marker served from the test public directory
pub const INDEX_MARKER: &str = "<h1>Newsboard test index</h1>";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // The registry is process-wide; register collectors only once
        METRICS.call_once(newsboard::metrics::init_metrics);

        // Temporary directory for the database, uploads and public assets
        let temp_dir = TempDir::new().unwrap();
        let public_dir = temp_dir.path().join("public");
        std::fs::create_dir_all(&public_dir).unwrap();
        std::fs::write(public_dir.join("index.html"), INDEX_MARKER).unwrap();

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            database: config::DatabaseConfig {
                url: format!(
                    "sqlite:{}?mode=rwc",
                    temp_dir.path().join("test.db").display()
                ),
                max_connections: 5,
                query_timeout_secs: 5,
            },
            storage: config::StorageConfig {
                uploads_dir: temp_dir.path().join("uploads"),
                public_dir,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = newsboard::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// POST a caption + image form to /api/posts
    pub async fn create_post(&self, caption: &str, file_name: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/posts"))
            .multipart(image_form(caption, file_name, sample_image()))
            .send()
            .await
            .unwrap()
    }

    /// Number of files currently in the upload directory
    pub fn stored_upload_count(&self) -> usize {
        std::fs::read_dir(self.state.uploads.root())
            .unwrap()
            .count()
    }

    /// Number of visible posts (at most `RECENT_POSTS_LIMIT`)
    pub async fn post_count(&self) -> usize {
        self.state
            .db
            .list_recent_posts(RECENT_POSTS_LIMIT)
            .await
            .unwrap()
            .len()
    }
}

/// A few bytes resembling a JPEG header; content is never inspected
pub fn sample_image() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F']
}

/// Build a multipart form with `caption` and an `image` file part
pub fn image_form(caption: &str, file_name: &str, data: Vec<u8>) -> Form {
    Form::new()
        .text("caption", caption.to_string())
        .part("image", Part::bytes(data).file_name(file_name.to_string()))
}
