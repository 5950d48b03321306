//! Shared state, response envelope, errors and authentication

use axum::extract::{FromRequest, FromRequestParts, Multipart, Request};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use citifix_core::{Actor, Service, Upload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state
pub struct AppState {
    pub service: RwLock<Service>,
}

impl AppState {
    pub fn new(service: Service) -> Arc<Self> {
        Arc::new(Self {
            service: RwLock::new(service),
        })
    }
}

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// 200 with the data wrapped in the envelope
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
}

pub fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::ok(data))).into_response()
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] citifix_core::Error),

    #[error("{0}")]
    BadRequest(String),
}

pub type ApiResult = Result<Response, ApiError>;

impl ApiError {
    fn status(&self) -> StatusCode {
        use citifix_core::Error;
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(e) => match e {
                Error::Validation(_)
                | Error::InvalidStatus(_)
                | Error::InvalidCategory(_)
                | Error::InvalidRole(_) => StatusCode::UNPROCESSABLE_ENTITY,
                Error::Conflict(_) => StatusCode::CONFLICT,
                Error::Forbidden(_) => StatusCode::FORBIDDEN,
                Error::Unauthenticated => StatusCode::UNAUTHORIZED,
                Error::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Core(e) if !e.is_client_error() => {
                tracing::error!(error = %e, "request failed");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };
        (status, Json(ApiResponse::<()>::err(message))).into_response()
    }
}

/// Authenticated caller, resolved from `Authorization: Bearer <token>`
pub struct Auth {
    pub actor: Actor,
    pub token: String,
}

impl FromRequestParts<Arc<AppState>> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(citifix_core::Error::Unauthenticated)?
            .to_string();

        let actor = state.service.read().await.authenticate(&token)?;
        Ok(Auth { actor, token })
    }
}

/// Text fields and files of a multipart body
#[derive(Debug, Default)]
pub struct Form {
    fields: HashMap<String, String>,
    pub uploads: Vec<Upload>,
}

impl Form {
    /// Non-empty text field, trimmed
    pub fn optional(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn text(&self, name: &str) -> Result<String, ApiError> {
        self.optional(name).ok_or_else(|| {
            citifix_core::Error::Validation(format!("{name} is required")).into()
        })
    }

    pub fn parse<T>(&self, name: &str) -> Result<T, ApiError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.text(name)?
            .parse()
            .map_err(|e| citifix_core::Error::Validation(format!("{name}: {e}")).into())
    }
}

/// Request bodies that can also arrive as multipart form fields
pub trait FromForm: Sized {
    fn from_form(form: &Form) -> Result<Self, ApiError>;
}

/// Fields plus attached files. JSON bodies carry no files; multipart bodies
/// carry form fields and every file part (`media[]`).
pub struct Submission<T> {
    pub fields: T,
    pub uploads: Vec<Upload>,
}

impl<T> FromRequest<Arc<AppState>> for Submission<T>
where
    T: DeserializeOwned + FromForm + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            let form = read_form(multipart).await?;
            let fields = T::from_form(&form)?;
            Ok(Self {
                fields,
                uploads: form.uploads,
            })
        } else {
            let Json(fields) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            Ok(Self {
                fields,
                uploads: Vec::new(),
            })
        }
    }
}

/// Split a multipart body into text fields and file parts
pub async fn read_form(mut multipart: Multipart) -> Result<Form, ApiError> {
    let mut form = Form::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            form.fields.insert(name, value);
            continue;
        };
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        form.uploads
            .push(Upload::new(file_name, mime_type, bytes.to_vec()));
    }
    Ok(form)
}

/// Collect every file part of a multipart body
pub async fn read_uploads(multipart: Multipart) -> Result<Vec<Upload>, ApiError> {
    read_form(multipart).await.map(|form| form.uploads)
}
