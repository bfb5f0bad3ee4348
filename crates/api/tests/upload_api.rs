//! Integration tests for uploads, font listing and static file serving.

mod common;

use std::io::Cursor;

use axum::http::StatusCode;
use common::{body_bytes, body_json, get, post_multipart, Part, NAMES_CSV};
use image::{ImageFormat, Rgba, RgbaImage};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

#[tokio::test]
async fn upload_stores_files_and_reports_columns() {
    let test = common::build_test_app();
    std::fs::write(test.font_dir().join("Serif.ttf"), b"placeholder").unwrap();
    let png = png_bytes(8, 8);

    let response = post_multipart(
        test.app(),
        "/upload",
        &[
            Part::File {
                name: "image",
                filename: "my template.png",
                bytes: &png,
            },
            Part::File {
                name: "data_file",
                filename: "people.csv",
                bytes: NAMES_CSV.as_bytes(),
            },
            Part::Text("headers_present", "on"),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["headers_present"], true);
    assert_eq!(json["columns"], serde_json::json!(["name", "id"]));
    assert_eq!(json["fonts"], serde_json::json!(["Serif.ttf"]));

    let image = json["image"].as_str().unwrap();
    let data_file = json["data_file"].as_str().unwrap();
    assert!(image.ends_with("_my_template.png"), "{image}");
    assert!(data_file.ends_with("_people.csv"), "{data_file}");
    assert!(test.upload_dir().join(image).is_file());
    assert!(test.upload_dir().join(data_file).is_file());
}

#[tokio::test]
async fn upload_without_headers_names_columns_by_position() {
    let test = common::build_test_app();
    let png = png_bytes(4, 4);

    let response = post_multipart(
        test.app(),
        "/upload",
        &[
            Part::File {
                name: "image",
                filename: "t.png",
                bytes: &png,
            },
            Part::File {
                name: "file",
                filename: "rows.csv",
                bytes: b"Alice,1\nBob,2\n",
            },
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["headers_present"], false);
    assert_eq!(json["columns"], serde_json::json!(["0", "1"]));
}

#[tokio::test]
async fn upload_requires_both_files() {
    let test = common::build_test_app();
    let png = png_bytes(4, 4);

    let response = post_multipart(
        test.app(),
        "/upload",
        &[Part::File {
            name: "image",
            filename: "t.png",
            bytes: &png,
        }],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(std::fs::read_dir(test.upload_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn upload_with_unreadable_workbook_is_rejected_and_cleaned_up() {
    let test = common::build_test_app();
    let png = png_bytes(4, 4);

    let response = post_multipart(
        test.app(),
        "/upload",
        &[
            Part::File {
                name: "image",
                filename: "t.png",
                bytes: &png,
            },
            Part::File {
                name: "data_file",
                filename: "broken.xlsx",
                bytes: b"not a workbook",
            },
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(std::fs::read_dir(test.upload_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn fonts_lists_ttf_files() {
    let test = common::build_test_app();
    std::fs::write(test.font_dir().join("B.ttf"), b"x").unwrap();
    std::fs::write(test.font_dir().join("A.TTF"), b"x").unwrap();
    std::fs::write(test.font_dir().join("notes.txt"), b"x").unwrap();

    let response = get(test.app(), "/fonts").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["fonts"], serde_json::json!(["A.TTF", "B.ttf"]));
}

#[tokio::test]
async fn uploads_are_served_as_static_files() {
    let test = common::build_test_app();
    test.write_upload("hello.csv", b"name\nAlice\n");

    let response = get(test.app(), "/uploads/hello.csv").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"name\nAlice\n");
}
