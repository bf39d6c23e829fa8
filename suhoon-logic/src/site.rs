use serde::{Deserialize, Serialize};

const OWNER: &str = "강정수";
const PHONE: &str = "010-4647-0990";
const SMS_BODY: &str = "상담 문의드립니다.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceItem {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessStep {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Review {
    pub author: String,
    pub text: String,
    pub tag: String,
}

/// Engineer dispatched to a tracked visit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Engineer {
    pub name: String,
    pub title: String,
    pub phone: String,
    /// `tel:` link for the call button
    pub call_uri: String,
}

impl Default for Engineer {
    fn default() -> Self {
        Self {
            name: OWNER.to_string(),
            title: "대표".to_string(),
            phone: PHONE.to_string(),
            call_uri: call_uri(PHONE),
        }
    }
}

/// Everything the landing page shows that isn't layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteProfile {
    pub business_name: String,
    pub owner: String,
    pub phone: String,
    pub registration_number: String,
    pub address: String,
    pub hours: String,
    /// `tel:` link for call buttons
    pub call_uri: String,
    /// `sms:` link with a prefilled body for the booking button
    pub sms_uri: String,
    pub services: Vec<ServiceItem>,
    pub process: Vec<ProcessStep>,
    pub reviews: Vec<Review>,
    /// Shown on the tracking panel once a visit is found
    pub engineer: Engineer,
}

/// `tel:` URI for a phone number
pub fn call_uri(phone: &str) -> String {
    format!("tel:{phone}")
}

/// `sms:` URI with the body percent-encoded
pub fn sms_uri(phone: &str, body: &str) -> String {
    format!("sms:{phone}?body={}", urlencoding::encode(body))
}

fn service(id: &str, title: &str, summary: &str, highlights: &[&str]) -> ServiceItem {
    ServiceItem {
        id: id.to_string(),
        title: title.to_string(),
        summary: summary.to_string(),
        highlights: highlights.iter().map(|h| h.to_string()).collect(),
    }
}

fn step(title: &str, description: &str) -> ProcessStep {
    ProcessStep {
        title: title.to_string(),
        description: description.to_string(),
    }
}

fn review(author: &str, text: &str, tag: &str) -> Review {
    Review {
        author: author.to_string(),
        text: text.to_string(),
        tag: tag.to_string(),
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            business_name: "수훈라인".to_string(),
            owner: OWNER.to_string(),
            phone: PHONE.to_string(),
            registration_number: "123-45-67890".to_string(),
            address: "서울시 중랑구 면목동 127-8 B02".to_string(),
            hours: "365일 24시간 상담 환영".to_string(),
            call_uri: call_uri(PHONE),
            sms_uri: sms_uri(PHONE, SMS_BODY),
            services: vec![
                service(
                    "drain",
                    "배관·하수구",
                    "싱크대, 변기, 하수구 막힘과 역류를 장비로 진단하고 뚫어 드립니다.",
                    &["내시경 카메라 진단", "고압 세척", "긴급 출동"],
                ),
                service(
                    "aircon",
                    "에어컨 세척",
                    "분해 세척으로 곰팡이와 악취의 원인을 제거합니다.",
                    &["완전 분해 세척", "친환경 세제", "작업 전후 사진 제공"],
                ),
            ],
            process: vec![
                step("01. 문의", "증상 확인 및 일정 조율"),
                step("02. 출동", "30분 내 현장 도착"),
                step("03. 케어", "원인 진단 및 해결"),
                step("04. 보장", "작업 후 1년 무상 AS"),
            ],
            reviews: vec![
                review(
                    "강남구 논현동 식당",
                    "영업 중 하수구가 역류했는데 30분 만에 와서 해결해 주셨습니다.",
                    "긴급출동",
                ),
                review(
                    "서초구 반포 자이",
                    "에어컨 냄새 때문에 불렀는데 분해해서 곰팡이까지 깨끗하게 닦아 주셨어요.",
                    "에어컨청소",
                ),
                review(
                    "송파구 문정동 사무실",
                    "다른 업체가 못 뚫은 변기를 10분 만에 해결해 주셨습니다.",
                    "변기막힘",
                ),
            ],
            engineer: Engineer::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links() {
        let site = SiteProfile::default();
        assert_eq!(site.call_uri, "tel:010-4647-0990");
        assert!(site.sms_uri.starts_with("sms:010-4647-0990?body="));
        assert!(!site.sms_uri.contains(' '), "SMS body is not encoded");
    }

    #[test]
    fn test_engineer_is_owner() {
        let site = SiteProfile::default();
        assert_eq!(site.engineer.name, site.owner);
        assert_eq!(site.engineer.title, "대표");
        assert_eq!(site.engineer.call_uri, site.call_uri);
    }

    #[test]
    fn test_sms_body_round_trips() {
        let uri = sms_uri(PHONE, SMS_BODY);
        let (_, encoded) = uri.split_once("?body=").unwrap();
        assert_eq!(urlencoding::decode(encoded).unwrap(), SMS_BODY);
    }
}
