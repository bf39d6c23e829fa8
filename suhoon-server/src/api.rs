use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use suhoon_logic::{
    DIAGNOSIS_UNAVAILABLE_MESSAGE, DiagnosisClient, DiagnosisRequest, DiagnosisResult, Engineer,
    GeoCoordinate, ImageUpload, InvalidPhoneSuffix, PhoneSuffix, SiteProfile, SubmitError,
    TrackingSnapshot,
};

use crate::state::{CreateTrackerError, ServerState, SessionId};

/// Leaves room for a base64 encoded image at the size limit plus the text
const BODY_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Session was not found
    NotFound,
    /// Session limit reached
    TooManySessions,
    /// Tracking lookup without a valid phone number suffix
    InvalidLookup(InvalidPhoneSuffix),
    /// Something broke on our side, details are only logged
    Internal,
    /// Input was refused before reaching the diagnosis service
    Submit(SubmitError),
    /// The diagnosis service failed, details are only logged
    DiagnosisUnavailable,
}

impl From<ApiError> for StatusCode {
    fn from(val: ApiError) -> Self {
        match val {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::TooManySessions => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InvalidLookup(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Submit(SubmitError::ImageTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Submit(SubmitError::Busy) => StatusCode::CONFLICT,
            ApiError::Submit(_) => StatusCode::BAD_REQUEST,
            ApiError::DiagnosisUnavailable => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(why: SubmitError) -> Self {
        Self::Submit(why)
    }
}

impl From<InvalidPhoneSuffix> for ApiError {
    fn from(why: InvalidPhoneSuffix) -> Self {
        Self::InvalidLookup(why)
    }
}

impl From<CreateTrackerError> for ApiError {
    fn from(why: CreateTrackerError) -> Self {
        match why {
            CreateTrackerError::TooManySessions => Self::TooManySessions,
            CreateTrackerError::Session(why) => {
                error!("Failed to create tracking session: {why:#}");
                Self::Internal
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = match &self {
            Self::NotFound => "세션을 찾을 수 없습니다.".to_string(),
            Self::TooManySessions | Self::Internal => "잠시 후 다시 시도해주세요.".to_string(),
            Self::InvalidLookup(why) => why.to_string(),
            Self::Submit(why) => why.to_string(),
            Self::DiagnosisUnavailable => DIAGNOSIS_UNAVAILABLE_MESSAGE.to_string(),
        };
        (StatusCode::from(self), Json(ErrorBody { error })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImagePayload {
    /// `data:image/png;base64,...` as produced by a file reader
    DataUrl(String),
    Inline { mime_type: String, data: String },
}

impl ImagePayload {
    fn decode(self) -> Result<ImageUpload, SubmitError> {
        match self {
            Self::DataUrl(url) => ImageUpload::from_data_url(&url),
            Self::Inline { mime_type, data } => ImageUpload::from_base64(mime_type, &data),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DiagnoseBody {
    #[serde(default)]
    text: String,
    #[serde(default)]
    image: Option<ImagePayload>,
}

#[derive(Debug, Deserialize)]
struct CreateTrackingBody {
    /// Validated by hand so a missing suffix gets the same message as a bad one
    #[serde(default)]
    phone_suffix: String,
}

#[derive(Debug, Deserialize)]
struct LocateBody {
    /// `None` when the browser couldn't get a position
    #[serde(default)]
    position: Option<GeoCoordinate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedSession {
    pub id: SessionId,
    pub phone_suffix: PhoneSuffix,
    /// Who is on the way, with a `tel:` link to call them
    pub engineer: Engineer,
    pub snapshot: TrackingSnapshot,
}

async fn site<C: DiagnosisClient>(State(state): State<ServerState<C>>) -> Json<SiteProfile> {
    Json(state.site().clone())
}

async fn diagnose<C: DiagnosisClient>(
    State(state): State<ServerState<C>>,
    Json(body): Json<DiagnoseBody>,
) -> ApiResult<Json<DiagnosisResult>> {
    let image = body.image.map(ImagePayload::decode).transpose()?;
    let request = DiagnosisRequest::new(body.text, image)?;

    let Some(client) = state.diagnosis() else {
        error!("AI diagnosis error: no API key configured");
        return Err(ApiError::DiagnosisUnavailable);
    };

    client.diagnose(&request).await.map(Json).map_err(|why| {
        if why.is_bad_response() {
            warn!("AI diagnosis returned an unusable answer: {why}");
        } else {
            error!("AI diagnosis error: {why}");
        }
        ApiError::DiagnosisUnavailable
    })
}

async fn create_tracking<C: DiagnosisClient>(
    State(state): State<ServerState<C>>,
    Json(body): Json<CreateTrackingBody>,
) -> ApiResult<(StatusCode, Json<CreatedSession>)> {
    let phone_suffix = PhoneSuffix::parse(&body.phone_suffix)?;
    let (id, tracker) = state.create_tracker(phone_suffix)?;
    let created = CreatedSession {
        id,
        phone_suffix: tracker.phone_suffix.clone(),
        engineer: state.site().engineer.clone(),
        snapshot: tracker.session.snapshot().await,
    };
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_tracking<C: DiagnosisClient>(
    State(state): State<ServerState<C>>,
    Path(id): Path<SessionId>,
) -> ApiResult<Json<TrackingSnapshot>> {
    let tracker = state.tracker(&id).ok_or(ApiError::NotFound)?;
    Ok(Json(tracker.session.snapshot().await))
}

async fn locate<C: DiagnosisClient>(
    State(state): State<ServerState<C>>,
    Path(id): Path<SessionId>,
    Json(body): Json<LocateBody>,
) -> ApiResult<Json<TrackingSnapshot>> {
    let tracker = state.tracker(&id).ok_or(ApiError::NotFound)?;
    Ok(Json(tracker.locate(body.position).await))
}

async fn reset<C: DiagnosisClient>(
    State(state): State<ServerState<C>>,
    Path(id): Path<SessionId>,
) -> ApiResult<Json<TrackingSnapshot>> {
    let tracker = state.tracker(&id).ok_or(ApiError::NotFound)?;
    tracker.session.reset().await;
    Ok(Json(tracker.session.snapshot().await))
}

async fn delete_tracking<C: DiagnosisClient>(
    State(state): State<ServerState<C>>,
    Path(id): Path<SessionId>,
) -> ApiResult<StatusCode> {
    let tracker = state.remove_tracker(&id).ok_or(ApiError::NotFound)?;
    tracker.session.reset().await;
    debug!("{} tracking sessions remaining", state.session_count());
    Ok(StatusCode::NO_CONTENT)
}

pub fn router<C: DiagnosisClient + 'static>(state: ServerState<C>) -> Router {
    Router::new()
        .route("/api/site", get(site::<C>))
        .route("/api/diagnose", post(diagnose::<C>))
        .route("/api/tracking", post(create_tracking::<C>))
        .route(
            "/api/tracking/{id}",
            get(get_tracking::<C>).delete(delete_tracking::<C>),
        )
        .route("/api/tracking/{id}/locate", post(locate::<C>))
        .route("/api/tracking/{id}/reset", post(reset::<C>))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}
