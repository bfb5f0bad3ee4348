//! Integration tests for `POST /preview`.

mod common;

use axum::http::StatusCode;
use common::{
    body_bytes, body_json, dark_center_x, post_form, post_multipart, Part, FIXTURE_FONT_NAME,
    NAMES_CSV,
};

#[tokio::test]
async fn preview_returns_png_of_template_size() {
    let test = common::build_test_app();
    let template = test.write_template("template.png", 48, 24);
    let data = test.write_upload("data.csv", NAMES_CSV.as_bytes());

    let response = post_form(
        test.app(),
        "/preview",
        &[
            ("image", "template.png"),
            ("data_file", "data.csv"),
            ("headers_present", "true"),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");

    let png = body_bytes(response).await;
    let image = image::load_from_memory(&png).unwrap();
    assert_eq!((image.width(), image.height()), (48, 24));

    // Previewing never consumes the uploads.
    assert!(template.exists());
    assert!(data.exists());
}

#[tokio::test]
async fn preview_works_without_a_data_file() {
    let test = common::build_test_app();
    test.write_template("template.png", 16, 16);

    let response = post_multipart(
        test.app(),
        "/preview",
        &[Part::Text("image", "template.png")],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
}

#[tokio::test]
async fn preview_with_missing_template_returns_404() {
    let test = common::build_test_app();

    let response = post_form(test.app(), "/preview", &[("image", "ghost.png")]).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn preview_with_corrupt_template_returns_400() {
    let test = common::build_test_app();
    test.write_upload("broken.png", b"not really a png");

    let response = post_form(test.app(), "/preview", &[("image", "broken.png")]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_IMAGE");
}

#[tokio::test]
async fn preview_draws_row_text_centered_with_installed_font() {
    let test = common::build_test_app();
    test.install_fixture_font();
    test.write_template("template.png", 200, 100);
    test.write_upload("data.csv", NAMES_CSV.as_bytes());

    let response = post_form(
        test.app(),
        "/preview",
        &[
            ("image", "template.png"),
            ("data_file", "data.csv"),
            ("headers_present", "true"),
            ("pos_name_x", "0.5"),
            ("pos_name_y", "0.5"),
            ("size_name", "32"),
            ("font_choice", FIXTURE_FONT_NAME),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let png = body_bytes(response).await;
    let image = image::load_from_memory(&png).unwrap().to_rgba8();

    let cx = dark_center_x(&image).expect("row text was drawn");
    assert!((cx - 100).abs() <= 3, "horizontal center was {cx}");
}
