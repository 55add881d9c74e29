use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use engine_logging::engine_debug;

use crate::publish::{MergedSink, SinkError};
use crate::session::{SessionStore, TOKEN_KEY, USER_KEY};

/// Client-side word limit for generation prompts; the form enforces the
/// same bound before submission.
const PROMPT_WORD_LIMIT: usize = 300;
/// Generated clips have a fixed length; the service accepts nothing else.
const VIDEO_DURATION_SECONDS: &str = "8";
const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http status {status}: {message}")]
    Http { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response shape: {0}")]
    Decode(String),
    #[error("not signed in")]
    NotSignedIn,
    #[error("reference images must be JPEG")]
    InvalidImage,
    #[error("prompt exceeds {limit} words")]
    PromptTooLong { limit: usize },
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    user: UserProfile,
}

/// One entry of the project-history listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub video_url: String,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn created_at_ms(&self) -> i64 {
        self.created_at.timestamp_millis()
    }
}

#[derive(Debug, Deserialize)]
struct HistoryEnvelope {
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    tokens: u32,
}

/// A purchasable credit package, price in cents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageInfo {
    pub id: String,
    pub name: String,
    pub price: u32,
    pub tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub prompt: String,
    /// `"pc"` (landscape) or `"mobile"` (portrait), as the service spells
    /// them.
    pub aspect_ratio: String,
    pub language: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    url: String,
    #[serde(default)]
    tokens_remaining: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub video_url: String,
    pub tokens_remaining: Option<u32>,
}

#[derive(Serialize)]
struct GenerateJsonBody<'a> {
    prompt: &'a str,
    duration: &'a str,
    #[serde(rename = "aspectRatio")]
    aspect_ratio: &'a str,
    language: &'a str,
    #[serde(rename = "imageUrl")]
    image_url: &'a str,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignupBody<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct CheckoutBody<'a> {
    #[serde(rename = "packageId")]
    package_id: &'a str,
    email: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// HTTP client for the generation service. The bearer token lives in the
/// injected session store, never in the client itself.
#[derive(Clone)]
pub struct ServiceClient {
    base_url: String,
    http: reqwest::Client,
    session: Arc<dyn SessionStore>,
}

impl ServiceClient {
    pub fn new(
        base_url: impl Into<String>,
        session: Arc<dyn SessionStore>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn bearer(&self) -> Result<String, ApiError> {
        self.session.get(TOKEN_KEY).ok_or(ApiError::NotSignedIn)
    }

    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ApiError> {
        let response = self
            .http
            .post(self.url("/auth/signup"))
            .json(&SignupBody {
                username,
                email,
                password,
            })
            .send()
            .await?;
        self.store_auth(parse_json::<AuthResponse>(response).await?)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&LoginBody { email, password })
            .send()
            .await?;
        self.store_auth(parse_json::<AuthResponse>(response).await?)
    }

    fn store_auth(&self, auth: AuthResponse) -> Result<UserProfile, ApiError> {
        let raw = serde_json::to_string(&auth.user)
            .map_err(|err| ApiError::Decode(err.to_string()))?;
        self.session.set(TOKEN_KEY, &auth.token);
        self.session.set(USER_KEY, &raw);
        Ok(auth.user)
    }

    pub fn logout(&self) {
        self.session.clear();
    }

    /// The profile cached at sign-in, if any.
    pub fn stored_profile(&self) -> Option<UserProfile> {
        self.session
            .get(USER_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    pub async fn video_history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
        let token = self.bearer()?;
        let response = self
            .http
            .get(self.url("/video/history"))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(parse_json::<HistoryEnvelope>(response).await?.history)
    }

    pub async fn balance(&self) -> Result<u32, ApiError> {
        let token = self.bearer()?;
        let response = self
            .http
            .get(self.url("/users/balance"))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(parse_json::<BalanceResponse>(response).await?.tokens)
    }

    /// Submits a generation request. With a reference image the service
    /// wants JSON; without one it wants a multipart form.
    pub async fn generate_video(
        &self,
        request: &GenerateRequest,
    ) -> Result<GenerationResult, ApiError> {
        if request.prompt.split_whitespace().count() > PROMPT_WORD_LIMIT {
            return Err(ApiError::PromptTooLong {
                limit: PROMPT_WORD_LIMIT,
            });
        }
        let token = self.bearer()?;
        let response = match request.image_url.as_deref() {
            Some(image_url) => {
                self.http
                    .post(self.url("/video/generate"))
                    .bearer_auth(token)
                    .json(&GenerateJsonBody {
                        prompt: &request.prompt,
                        duration: VIDEO_DURATION_SECONDS,
                        aspect_ratio: &request.aspect_ratio,
                        language: &request.language,
                        image_url,
                    })
                    .send()
                    .await?
            }
            None => {
                let form = reqwest::multipart::Form::new()
                    .text("prompt", request.prompt.clone())
                    .text("duration", VIDEO_DURATION_SECONDS)
                    .text("aspectRatio", request.aspect_ratio.clone())
                    .text("language", request.language.clone());
                self.http
                    .post(self.url("/video/generate"))
                    .bearer_auth(token)
                    .multipart(form)
                    .send()
                    .await?
            }
        };
        let body = parse_json::<GenerateResponse>(response).await?;
        Ok(GenerationResult {
            video_url: body.url,
            tokens_remaining: body.tokens_remaining,
        })
    }

    /// Uploads a JPEG reference image, returning its public URL.
    pub async fn upload_image(&self, bytes: Bytes) -> Result<String, ApiError> {
        if !bytes.starts_with(&JPEG_MAGIC) {
            return Err(ApiError::InvalidImage);
        }
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name("reference.jpg")
            .mime_str("image/jpeg")
            .map_err(|err| ApiError::Network(err.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await?;
        Ok(parse_json::<UploadResponse>(response).await?.url)
    }

    pub async fn payment_packages(&self) -> Result<Vec<PackageInfo>, ApiError> {
        let token = self.bearer()?;
        let response = self
            .http
            .get(self.url("/payment/packages"))
            .bearer_auth(token)
            .send()
            .await?;
        parse_json(response).await
    }

    /// Returns the external checkout URL for a package purchase.
    pub async fn create_payment_session(
        &self,
        package_id: &str,
        email: &str,
    ) -> Result<String, ApiError> {
        let token = self.bearer()?;
        let response = self
            .http
            .post(self.url("/payment/create-session"))
            .bearer_auth(token)
            .json(&CheckoutBody { package_id, email })
            .send()
            .await?;
        Ok(parse_json::<CheckoutResponse>(response).await?.url)
    }

    /// Uploads merged bytes as a new project-history entry, returning the
    /// durable URL.
    pub async fn upload_merged(&self, filename: &str, bytes: Bytes) -> Result<String, ApiError> {
        let token = self.bearer()?;
        engine_debug!("uploading merged result {filename} ({} bytes)", bytes.len());
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(filename.to_string())
            .mime_str("video/mp4")
            .map_err(|err| ApiError::Network(err.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(self.url("/video/merged"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        Ok(parse_json::<UploadResponse>(response).await?.url)
    }
}

#[async_trait::async_trait]
impl MergedSink for ServiceClient {
    async fn store(&self, filename: &str, bytes: Bytes) -> Result<String, SinkError> {
        self.upload_merged(filename, bytes).await.map_err(|err| match err {
            ApiError::Http { status, .. } => SinkError::HttpStatus(status),
            ApiError::NotSignedIn => SinkError::NotSignedIn,
            ApiError::Decode(_) => SinkError::MissingUrl,
            other => SinkError::Network(other.to_string()),
        })
    }
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| status.to_string());
        return Err(ApiError::Http {
            status: status.as_u16(),
            message,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|err| ApiError::Decode(err.to_string()))
}
