use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use suhoon_logic::{DiagnosisRequest, SYSTEM_INSTRUCTION, Severity};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 encoded bytes
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: &'static str,
    pub response_schema: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

/// JSON schema the model's answer must follow
pub fn response_schema() -> Value {
    let severities = Severity::ALL.map(|s| s.label());
    json!({
        "type": "OBJECT",
        "properties": {
            "diagnosis": { "type": "STRING" },
            "severity": { "type": "STRING", "enum": severities },
            "action_tips": { "type": "STRING" },
            "estimated_time": { "type": "STRING" },
        },
        "required": ["diagnosis", "severity", "action_tips", "estimated_time"],
    })
}

impl From<&DiagnosisRequest> for GenerateContentRequest {
    fn from(req: &DiagnosisRequest) -> Self {
        let mut parts = vec![Part::text(req.prompt())];

        if let Some(image) = &req.image {
            parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: image.mime_type().to_string(),
                    data: image.to_base64(),
                }),
            });
        }

        Self {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(SYSTEM_INSTRUCTION)],
            },
            contents: vec![Content {
                role: Some("user"),
                parts,
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// All text parts of the first candidate joined together, `None` if there's no text
    pub fn text(&self) -> Option<String> {
        let text = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<String>();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[cfg(test)]
mod tests {
    use suhoon_logic::ImageUpload;

    use super::*;

    #[test]
    fn test_request_shape_text_only() {
        let req = DiagnosisRequest::new("싱크대가 막혔어요", None).unwrap();
        let body = serde_json::to_value(GenerateContentRequest::from(&req)).unwrap();

        assert_eq!(
            body["contents"][0]["parts"][0]["text"],
            "사용자 증상 설명: 싱크대가 막혔어요"
        );
        assert_eq!(body["contents"][0]["parts"].as_array().unwrap().len(), 1);
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            SYSTEM_INSTRUCTION
        );
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(
            body["generationConfig"]["responseSchema"]["properties"]["severity"]["enum"],
            json!(["경미", "보통", "긴급"])
        );
    }

    #[test]
    fn test_request_shape_with_image() {
        let image = ImageUpload::new(vec![0xab, 0xcd, 0xef], "image/jpeg").unwrap();
        let req = DiagnosisRequest::new("", Some(image)).unwrap();
        let body = serde_json::to_value(GenerateContentRequest::from(&req)).unwrap();

        let inline = &body["contents"][0]["parts"][1]["inlineData"];
        assert_eq!(inline["mimeType"], "image/jpeg");
        assert_eq!(inline["data"], "q83v");
        assert!(body["contents"][0]["parts"][1].get("text").is_none());
    }

    #[test]
    fn test_response_text() {
        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(resp.text().as_deref(), Some("{\"a\":1}"));

        let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(empty.text().is_none());

        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert!(blocked.text().is_none());
    }
}
