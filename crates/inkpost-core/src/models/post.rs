use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Post identifiers arrive as numbers from the API but as strings in URLs;
/// keep them as strings on the client.
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Post {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(rename = "image_url", alias = "imageUrl", default)]
    pub image_url: Option<String>,
}

impl Post {
    pub fn author_display(&self) -> &str {
        self.author.as_deref().unwrap_or("Unknown Author")
    }
}

/// Header image attached to a new post
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Guess the MIME type from the file extension; anything unknown is
    /// sent as a generic binary so the server can decide.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let mime_type = match extension.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "svg" => "image/svg+xml",
            _ => "application/octet-stream",
        }
        .to_string();
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }
}

/// Draft for `POST /posts/`
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub snippet: String,
    /// Markdown body
    pub content: String,
    pub date: NaiveDate,
    pub image: Option<ImageUpload>,
}

impl NewPost {
    /// Check the fields the form marks as required.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Post title is required.".to_string());
        }
        if self.snippet.trim().is_empty() {
            return Err("Snippet is required.".to_string());
        }
        if self.content.trim().is_empty() {
            return Err("Post content is required.".to_string());
        }
        Ok(())
    }
}
