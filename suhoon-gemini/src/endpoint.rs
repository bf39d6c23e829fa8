use anyhow::anyhow;
use suhoon_logic::prelude::*;

const fn api_host() -> &'static str {
    if let Some(host) = option_env!("GEMINI_API_HOST") {
        host
    } else {
        "https://generativelanguage.googleapis.com"
    }
}

const fn api_version() -> &'static str {
    if let Some(version) = option_env!("GEMINI_API_VERSION") {
        version
    } else {
        "v1beta"
    }
}

const fn default_model() -> &'static str {
    if let Some(model) = option_env!("GEMINI_MODEL") {
        model
    } else {
        "gemini-2.5-flash"
    }
}

pub const API_HOST: &str = api_host();
const API_VERSION: &str = api_version();
pub const DEFAULT_MODEL: &str = default_model();

const MODELS_PATH: &str = const_str::concat!("/", API_VERSION, "/models/");

/// Header the API key is sent in
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Env vars checked (in order) for the API key
const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// `generateContent` URL for a model on the given host
pub fn generate_url(host: &str, model: &str) -> String {
    format!(
        "{}{MODELS_PATH}{model}:generateContent",
        host.trim_end_matches('/')
    )
}

/// Read the API key from the environment
pub fn api_key_from_env() -> Result<String> {
    API_KEY_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|k| !k.trim().is_empty()))
        .ok_or_else(|| anyhow!("No API key set, set one of {}", API_KEY_VARS.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_url() {
        assert_eq!(
            generate_url("http://localhost:1234/", "gemini-2.5-flash"),
            format!("http://localhost:1234/{API_VERSION}/models/gemini-2.5-flash:generateContent")
        );
    }
}
