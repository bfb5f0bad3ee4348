#![allow(dead_code)]

use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use image::{Rgba, RgbaImage};
use tempfile::TempDir;
use tower::ServiceExt;

use certgen_api::config::ServerConfig;
use certgen_api::router::build_app_router;
use certgen_api::state::AppState;

/// Three rows; the last has no name and falls back to `generated_2.png`.
pub const NAMES_CSV: &str = "name,id\nAlice,1\nBob,2\n,3\n";

/// DejaVu Sans Mono, bundled so text rendering does not depend on the host.
pub const FIXTURE_FONT: &[u8] = include_bytes!("../../../core/tests/fixtures/DejaVuSansMono.ttf");

pub const FIXTURE_FONT_NAME: &str = "DejaVuSansMono.ttf";

const BOUNDARY: &str = "certgen-test-boundary";

/// A router wired to scratch directories that live as long as this value.
pub struct TestApp {
    pub dir: TempDir,
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    pub fn upload_dir(&self) -> &Path {
        &self.state.config.upload_dir
    }

    pub fn font_dir(&self) -> &Path {
        &self.state.config.font_dirs[0]
    }

    /// Write raw bytes into the upload directory and return the path.
    pub fn write_upload(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.upload_dir().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// Put the bundled font into the first font directory.
    pub fn install_fixture_font(&self) -> PathBuf {
        let path = self.font_dir().join(FIXTURE_FONT_NAME);
        std::fs::write(&path, FIXTURE_FONT).unwrap();
        path
    }

    /// Write a white PNG template into the upload directory.
    pub fn write_template(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let path = self.upload_dir().join(name);
        RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
            .save(&path)
            .unwrap();
        path
    }
}

/// Build a test `ServerConfig` rooted in `root`.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout. The font directory starts empty.
pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 10 * 1024 * 1024,
        upload_dir: root.join("uploads"),
        output_dir: root.join("outputs"),
        font_dirs: vec![root.join("fonts")],
        default_font: "Missing Default.ttf".to_string(),
        job_ttl_secs: 600,
        job_stale_secs: 3600,
        janitor_interval_secs: 60,
    }
}

/// Build the full application router with all middleware layers, backed by
/// fresh temporary directories.
pub fn build_test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.upload_dir).unwrap();
    std::fs::create_dir_all(&config.output_dir).unwrap();
    std::fs::create_dir_all(&config.font_dirs[0]).unwrap();

    let state = AppState::new(config.clone());
    let router = build_app_router(state.clone(), &config);
    TestApp { dir, state, router }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST an `application/x-www-form-urlencoded` body.
pub async fn post_form(app: Router, uri: &str, fields: &[(&str, &str)]) -> Response {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencode(k), urlencode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// One part of a multipart body.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        bytes: &'a [u8],
    },
}

/// POST a `multipart/form-data` body.
pub async fn post_multipart(app: Router, uri: &str, parts: &[Part<'_>]) -> Response {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Sorted entry names of a zip archive.
pub fn zip_entry_names(bytes: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

/// Horizontal center of the pixels darker than mid-gray, if any.
pub fn dark_center_x(image: &RgbaImage) -> Option<i32> {
    let xs: Vec<u32> = image
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] < 128)
        .map(|(x, _, _)| x)
        .collect();
    let (min, max) = (xs.iter().min()?, xs.iter().max()?);
    Some((min + max) as i32 / 2)
}

fn urlencode(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            b' ' => "+".to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}
