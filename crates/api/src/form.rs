//! Form extraction shared by the generation and preview endpoints.
//!
//! The browser front end posts `multipart/form-data` (it may carry a font
//! upload) while scripted clients often send `application/x-www-form-urlencoded`.
//! [`GenerationForm`] accepts either and exposes the fields the handlers need.

use std::collections::HashMap;
use std::path::PathBuf;

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Form;
use certgen_core::fonts::FontLibrary;
use certgen_core::placement::PlacementPlan;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Value of `font_choice` that selects the uploaded `font_file`.
const FONT_CHOICE_UPLOAD: &str = "other";

/// Values of `headers_present` treated as true. Checkbox inputs send `on`.
const TRUTHY: &[&str] = &["true", "True", "1", "on", "yes"];

pub(crate) fn is_truthy(value: &str) -> bool {
    TRUTHY.contains(&value.trim())
}

/// A font file posted alongside the form fields.
#[derive(Debug, Clone)]
pub struct FontUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Text fields of a generation request plus an optional font upload.
#[derive(Debug, Clone, Default)]
pub struct GenerationForm {
    fields: HashMap<String, String>,
    font_file: Option<FontUpload>,
}

impl<S> FromRequest<S> for GenerationForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return Self::from_multipart(multipart).await;
        }

        let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(Self::from_fields(fields))
    }
}

impl GenerationForm {
    pub fn from_fields(fields: HashMap<String, String>) -> Self {
        Self {
            fields,
            font_file: None,
        }
    }

    async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();
            let filename = field.file_name().map(str::to_string);
            match (name.as_str(), filename) {
                ("font_file", Some(filename)) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    if !filename.is_empty() && !bytes.is_empty() {
                        form.font_file = Some(FontUpload {
                            filename,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                // Files posted under any other name are not part of the form.
                (_, Some(_)) => {}
                _ => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Trimmed, non-empty value of a text field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> AppResult<&str> {
        self.field(name)
            .ok_or_else(|| AppError::BadRequest(format!("Missing form field '{name}'")))
    }

    /// Path of the uploaded template image.
    pub fn image_path(&self, state: &AppState) -> AppResult<PathBuf> {
        state.upload_path(self.required("image")?)
    }

    /// Path of the uploaded data file.
    pub fn data_path(&self, state: &AppState) -> AppResult<PathBuf> {
        state.upload_path(self.required("data_file")?)
    }

    /// Path of the data file when one was named; the preview works without.
    pub fn optional_data_path(&self, state: &AppState) -> AppResult<Option<PathBuf>> {
        self.field("data_file")
            .map(|name| state.upload_path(name))
            .transpose()
    }

    pub fn headers_present(&self) -> bool {
        self.field("headers_present").is_some_and(is_truthy)
    }

    pub fn file_column(&self) -> Option<String> {
        self.field("file_column").map(str::to_string)
    }

    pub fn plan(&self) -> PlacementPlan {
        PlacementPlan::from_fields(&self.fields)
    }

    /// Font selector for this request.
    ///
    /// `font_choice=other` installs the posted `.ttf` into the font library
    /// and selects it; without a usable upload the default font is used.
    /// Any other non-empty choice is passed through as a selector.
    pub fn resolve_font(&self, fonts: &FontLibrary) -> AppResult<Option<String>> {
        match self.field("font_choice") {
            Some(FONT_CHOICE_UPLOAD) => match &self.font_file {
                Some(upload) if upload.filename.to_lowercase().ends_with(".ttf") => {
                    Ok(Some(fonts.install(&upload.filename, &upload.bytes)?))
                }
                _ => {
                    tracing::debug!("Font upload selected but no .ttf provided, using default");
                    Ok(None)
                }
            },
            Some(choice) => Ok(Some(choice.to_string())),
            None => Ok(None),
        }
    }
}
