//! Ollama auto-discovery helpers.
//!
//! Used by the first-run wizard and the startup probe when the `ollama`
//! provider is selected.  Blocking: call only outside the Tokio runtime.

use serde::Deserialize;

/// A single model entry returned by Ollama's `/api/tags` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<OllamaModel>,
}

/// Ping the Ollama server and return the list of available models.
pub fn fetch_models(base_url: &str) -> Result<Vec<OllamaModel>, String> {
    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
    let response =
        reqwest::blocking::get(&url).map_err(|e| format!("Ollama unreachable at {}: {}", url, e))?;

    if !response.status().is_success() {
        return Err(format!("Ollama returned HTTP {}", response.status()));
    }

    let tags: TagsResponse = response
        .json()
        .map_err(|e| format!("Failed to parse Ollama response: {}", e))?;

    Ok(tags.models)
}

/// `true` when `wanted` is among `models`.  A bare name matches its
/// `:latest` tag, so `llama3` finds `llama3:latest`.
pub fn has_model(models: &[OllamaModel], wanted: &str) -> bool {
    models.iter().any(|m| {
        m.name == wanted || m.name.strip_suffix(":latest").is_some_and(|base| base == wanted)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models(names: &[&str]) -> Vec<OllamaModel> {
        names.iter().map(|n| OllamaModel { name: n.to_string() }).collect()
    }

    #[test]
    fn bare_name_matches_latest_tag() {
        let available = models(&["llama3:latest", "mistral:7b"]);
        assert!(has_model(&available, "llama3"));
        assert!(has_model(&available, "llama3:latest"));
        assert!(has_model(&available, "mistral:7b"));
        assert!(!has_model(&available, "mistral"));
        assert!(!has_model(&[], "llama3"));
    }

    #[test]
    fn tags_response_parses() {
        let raw = r#"{"models":[{"name":"llama3:latest","size":1},{"name":"phi3"}]}"#;
        let tags: TagsResponse = serde_json::from_str(raw).expect("valid tags");
        assert_eq!(tags.models.len(), 2);
        assert!(has_model(&tags.models, "llama3"));
        assert_eq!(tags.models[1].name, "phi3");
    }

    #[test]
    fn unreachable_server_is_an_error() {
        // Port 9 (discard) on loopback is closed on test machines.
        let err = fetch_models("http://127.0.0.1:9").expect_err("offline");
        assert!(err.contains("unreachable"));
    }
}
