use serde::{Deserialize, Serialize};

/// A file uploaded through the Gemini file API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDocument {
    pub uri: String,
    pub name: String,
    pub display_name: String,
    pub mime_type: String,
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: "user".to_string(),
            parts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn file(document: &RemoteDocument) -> Self {
        Part::FileData {
            file_data: FileData {
                mime_type: document.mime_type.clone(),
                file_uri: document.uri.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

/// Sampling settings for narrative generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
}

impl GenerationConfig {
    pub fn narrative(max_output_tokens: u32) -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens,
            response_mime_type: "text/plain".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let document = RemoteDocument {
            uri: "https://files/abc".to_string(),
            name: "files/abc".to_string(),
            display_name: "report.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            state: "ACTIVE".to_string(),
        };
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text("hi"), Part::file(&document)])],
            generation_config: GenerationConfig::narrative(8192),
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(
            json["contents"][0]["parts"][1]["fileData"]["fileUri"],
            "https://files/abc"
        );
        assert_eq!(json["generationConfig"]["topK"], 40);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(json["generationConfig"]["responseMimeType"], "text/plain");
    }

    #[test]
    fn test_response_parses_text_parts() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Variance ..."}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        let candidates = response.candidates.unwrap();
        assert!(matches!(
            &candidates[0].content.parts[0],
            Part::Text { text } if text == "Variance ..."
        ));
    }
}
