use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::image::ImageUpload;

/// Fixed instruction sent with every diagnosis, constrains the model to the
/// four fields of [DiagnosisResult]
pub const SYSTEM_INSTRUCTION: &str = "\
당신은 20년 경력의 배관·하수구 및 에어컨 세척 전문 기사입니다.
고객이 보낸 증상 설명과 사진을 분석해 아래 네 항목만 담은 JSON 객체로 답하십시오.
고객의 안전을 가장 먼저 고려하고, 신뢰감 있는 전문가의 말투를 사용하십시오.

- diagnosis: 추정되는 기술적 원인을 한 문장으로 요약. 사진이 있으면 색상, 부식, 위치 등 시각적 단서를 근거로 드십시오.
- severity: '경미', '보통', '긴급' 중 하나.
  - 긴급: 누수, 역류, 화재 위험, 심한 부식처럼 즉시 조치가 필요한 경우
  - 보통: 생활이 불편하지만 당장 위험하지는 않은 경우
  - 경미: 소모품 교체나 청소로 해결되는 경우
- action_tips: 기사가 도착하기 전 고객이 할 수 있는 안전 조치나 임시 방편 한 문장.
- estimated_time: 전문가가 작업할 때 예상되는 소요 시간.
";

/// The only failure message a user ever sees from the diagnosis service
pub const DIAGNOSIS_UNAVAILABLE_MESSAGE: &str =
    "AI 진단 서비스를 일시적으로 사용할 수 없습니다. 잠시 후 다시 시도해주세요.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
/// How urgently a technician is needed
pub enum Severity {
    /// Fixable with cleaning or a consumable part
    #[serde(rename = "경미", alias = "mild")]
    Mild,
    /// Inconvenient but not dangerous yet
    #[serde(rename = "보통", alias = "moderate")]
    Moderate,
    /// Leaks, backflow, fire risk, heavy corrosion
    #[serde(rename = "긴급", alias = "urgent")]
    Urgent,
}

impl Severity {
    pub const ALL: [Self; 3] = [Self::Mild, Self::Moderate, Self::Urgent];

    /// Label used on the wire and shown to the user
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Mild => "경미",
            Self::Moderate => "보통",
            Self::Urgent => "긴급",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosisResult {
    /// One sentence on the likely cause
    pub diagnosis: String,
    pub severity: Severity,
    /// What the user can safely do before the technician arrives
    pub action_tips: String,
    /// How long the repair is expected to take
    pub estimated_time: String,
}

impl DiagnosisResult {
    /// Parse and validate the model's JSON answer
    pub fn parse(text: &str) -> Result<Self, DiagnosisError> {
        let result = serde_json::from_str::<Self>(text.trim())?;

        let empty = [
            ("diagnosis", &result.diagnosis),
            ("action_tips", &result.action_tips),
            ("estimated_time", &result.estimated_time),
        ]
        .into_iter()
        .find(|(_, v)| v.trim().is_empty());

        if let Some((field, _)) = empty {
            Err(DiagnosisError::SchemaMismatch(format!("`{field}` is empty")))
        } else {
            Ok(result)
        }
    }
}

/// A single submission to a [DiagnosisClient]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisRequest {
    pub text: String,
    pub image: Option<ImageUpload>,
}

impl DiagnosisRequest {
    /// Build a request, refusing one with no description and no photo
    pub fn new(text: impl Into<String>, image: Option<ImageUpload>) -> Result<Self, SubmitError> {
        let text = text.into();
        if text.trim().is_empty() && image.is_none() {
            Err(SubmitError::EmptyInput)
        } else {
            Ok(Self { text, image })
        }
    }

    /// Text part of the prompt sent to the model
    pub fn prompt(&self) -> String {
        format!("사용자 증상 설명: {}", self.text)
    }
}

/// Reasons a submission is refused before anything is sent. The messages are
/// shown to the user as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("증상 설명이나 사진을 입력해주세요.")]
    EmptyInput,
    #[error("이미지는 10MB 이하만 가능합니다.")]
    ImageTooLarge { size: usize },
    #[error("이미지 파일만 첨부할 수 있습니다. ({0})")]
    NotAnImage(String),
    #[error("이미지를 읽을 수 없습니다. ({0})")]
    InvalidEncoding(String),
    #[error("이미지를 읽을 수 없습니다. ({0})")]
    Unreadable(String),
    #[error("진단이 이미 진행 중입니다.")]
    Busy,
}

/// Failures from the diagnosis service. These are logged, the user only gets
/// [DIAGNOSIS_UNAVAILABLE_MESSAGE].
#[derive(Debug, Error)]
pub enum DiagnosisError {
    #[error("Diagnosis service unavailable: {0:#}")]
    Unavailable(#[from] anyhow::Error),
    #[error("Diagnosis service returned no text")]
    EmptyResponse,
    #[error("Diagnosis response is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Diagnosis response doesn't match the schema: {0}")]
    SchemaMismatch(String),
}

impl DiagnosisError {
    /// Whether the service answered but with something unusable
    pub fn is_bad_response(&self) -> bool {
        !matches!(self, Self::Unavailable(_))
    }
}

pub trait DiagnosisClient: Send + Sync {
    fn diagnose(
        &self,
        request: &DiagnosisRequest,
    ) -> impl Future<Output = Result<DiagnosisResult, DiagnosisError>> + Send;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
/// What the diagnosis widget is showing
pub enum DiagnosisState {
    /// Taking input
    #[default]
    Input,
    /// A request is in flight
    Loading,
    /// Got a result
    Done(DiagnosisResult),
    /// The service failed, contains the message for the user
    Failed(String),
}

#[derive(Default)]
struct DeskState {
    text: String,
    image: Option<ImageUpload>,
    state: DiagnosisState,
    /// Bumped on every reset so a result for discarded input is dropped
    generation: u64,
}

/// The diagnosis widget: collects a description and optional photo, submits
/// them to a [DiagnosisClient], and holds the outcome until reset.
pub struct Diagnosis<C: DiagnosisClient> {
    client: C,
    desk: Mutex<DeskState>,
}

impl<C: DiagnosisClient> Diagnosis<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            desk: Mutex::new(DeskState::default()),
        }
    }

    pub async fn state(&self) -> DiagnosisState {
        self.desk.lock().await.state.clone()
    }

    pub async fn set_text(&self, text: impl Into<String>) {
        self.desk.lock().await.text = text.into();
    }

    /// Attach a photo. Oversized or non-image files are refused and any
    /// previously attached photo is kept.
    pub async fn attach_image(
        &self,
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
    ) -> Result<(), SubmitError> {
        match ImageUpload::new(bytes, mime_type) {
            Ok(image) => {
                self.attach(image).await;
                Ok(())
            }
            Err(why) => {
                warn!("Refusing image: {why:?}");
                Err(why)
            }
        }
    }

    /// Attach an already validated photo, replacing any previous one
    pub async fn attach(&self, image: ImageUpload) {
        self.desk.lock().await.image = Some(image);
    }

    /// The attached photo, if any
    pub async fn preview(&self) -> Option<ImageUpload> {
        self.desk.lock().await.image.clone()
    }

    pub async fn clear_image(&self) {
        self.desk.lock().await.image = None;
    }

    /// Send the current input off for diagnosis.
    ///
    /// Refused without calling the client if there's nothing to diagnose or a
    /// request is already in flight. A service failure is not an `Err`, it
    /// shows up as [DiagnosisState::Failed].
    pub async fn submit(&self) -> Result<DiagnosisState, SubmitError> {
        let (request, generation) = {
            let mut desk = self.desk.lock().await;
            if desk.state == DiagnosisState::Loading {
                return Err(SubmitError::Busy);
            }
            let request = DiagnosisRequest::new(desk.text.clone(), desk.image.clone())?;
            desk.state = DiagnosisState::Loading;
            (request, desk.generation)
        };

        info!(
            "Submitting diagnosis ({} chars, image: {})",
            request.text.chars().count(),
            request.image.is_some()
        );

        let res = self.client.diagnose(&request).await;

        let mut desk = self.desk.lock().await;
        if desk.generation != generation {
            info!("Dropping diagnosis result for input that was reset");
            return Ok(desk.state.clone());
        }

        desk.state = match res {
            Ok(result) => DiagnosisState::Done(result),
            Err(why) => {
                error!("AI diagnosis error: {why}");
                DiagnosisState::Failed(DIAGNOSIS_UNAVAILABLE_MESSAGE.to_string())
            }
        };

        Ok(desk.state.clone())
    }

    /// Clear the input, photo, and any result or error
    pub async fn reset(&self) {
        let mut desk = self.desk.lock().await;
        let generation = desk.generation + 1;
        *desk = DeskState {
            generation,
            ..Default::default()
        };
    }
}
