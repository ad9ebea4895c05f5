use std::path::PathBuf;

use axum::Router;
use axum_test::multipart::{MultipartForm, Part};
use clap::Parser;
use tempfile::TempDir;

use govdocs::app::{build_router, init_state, AppState};
use govdocs::config::ServerConfig;

/// A local-backend server rooted in a temporary directory.
///
/// The directory lives as long as this struct; dropping it removes every
/// file the test wrote.
pub struct TestEnv {
    _dir: TempDir,
    pub router: Router,
    pub state: AppState,
    pub config: ServerConfig,
    pub data_dir: PathBuf,
    pub uploads_dir: PathBuf,
}

impl TestEnv {
    /// Build an Axum router wired to the JSON file and local upload stores.
    pub async fn local() -> Self {
        Self::local_with_args(&[]).await
    }

    /// Same as `local`, with extra command-line flags appended.
    pub async fn local_with_args(extra: &[&str]) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let data_dir = dir.path().join("data");
        let uploads_dir = dir.path().join("uploads");

        let mut args = vec![
            "govdocs",
            "--backend",
            "local",
            "--data-dir",
            data_dir.to_str().expect("temp path should be UTF-8"),
            "--uploads-dir",
            uploads_dir.to_str().expect("temp path should be UTF-8"),
        ];
        args.extend_from_slice(extra);

        let config = ServerConfig::try_parse_from(args).expect("Failed to parse test config");

        let state = init_state(&config)
            .await
            .expect("Failed to initialize local stores");
        let router = build_router(state.clone(), &config);

        Self {
            _dir: dir,
            router,
            state,
            config,
            data_dir,
            uploads_dir,
        }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }
}

/// Helper: the multipart form the client sends for a save.
pub fn save_form(document: serde_json::Value, original_doc_id: Option<&str>) -> MultipartForm {
    let form = MultipartForm::new().add_text("document", document.to_string());
    match original_doc_id {
        Some(original) => form.add_text("originalDocId", original),
        None => form,
    }
}

/// Helper: a save form carrying an attachment.
pub fn save_form_with_file(
    document: serde_json::Value,
    file_name: &str,
    mime_type: &str,
    content: Vec<u8>,
) -> MultipartForm {
    save_form(document, None).add_part(
        "attachment",
        Part::bytes(content).file_name(file_name).mime_type(mime_type),
    )
}

/// Helper: save a document via the API.
pub async fn save(
    server: &axum_test::TestServer,
    document: serde_json::Value,
    original_doc_id: Option<&str>,
) -> axum_test::TestResponse {
    server
        .post("/api/documents")
        .multipart(save_form(document, original_doc_id))
        .await
}

/// Helper: fetch both collections via the API.
pub async fn list(server: &axum_test::TestServer) -> govdocs::db::models::DocumentsResponse {
    server.get("/api/documents").await.json()
}

/// Helper: ids of a list of documents, in order.
pub fn ids(documents: &[govdocs::db::models::DocumentRecord]) -> Vec<String> {
    documents
        .iter()
        .filter_map(|doc| doc.id().map(str::to_string))
        .collect()
}
