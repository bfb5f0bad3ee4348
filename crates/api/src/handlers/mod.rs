//! Request handlers.
//!
//! Each submodule groups the handlers for one area of the API. Rendering and
//! archive work is blocking, so handlers push it onto the blocking pool via
//! [`blocking`] and map errors via [`AppError`].

pub mod fonts;
pub mod generation;
pub mod jobs;
pub mod preview;
pub mod upload;

use crate::error::{AppError, AppResult};

/// Run `f` on the blocking pool and flatten the join error.
pub(crate) async fn blocking<T, E, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::InternalError(format!("Blocking task failed: {e}")))?
        .map_err(Into::into)
}
