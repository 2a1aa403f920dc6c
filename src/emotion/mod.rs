//! Emotion classification boundary.
//!
//! A reaction comment carries a captured camera frame; an external
//! collaborator turns the frame into a label from a fixed vocabulary. The
//! process detail lives entirely behind `EmotionClassifier`; callers only
//! see `classify(image) -> label`, and any failure or timeout on the far
//! side degrades to `Emotion::Neutral` instead of failing the request.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Label vocabulary of the classification model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl Emotion {
    pub fn label(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
        }
    }

    /// Display glyph shown next to the label in a reaction comment.
    pub fn glyph(&self) -> &'static str {
        match self {
            Emotion::Angry => "\u{1F620}",    // 😠
            Emotion::Fear => "\u{1F628}",     // 😨
            Emotion::Happy => "\u{1F604}",    // 😄
            Emotion::Neutral => "\u{1F610}",  // 😐
            Emotion::Sad => "\u{1F622}",      // 😢
            Emotion::Surprise => "\u{1F632}", // 😲
        }
    }

    /// Case-insensitive label lookup; None for anything outside the vocabulary.
    pub fn parse(s: &str) -> Option<Emotion> {
        match s.to_ascii_lowercase().as_str() {
            "angry" => Some(Emotion::Angry),
            "fear" => Some(Emotion::Fear),
            "happy" => Some(Emotion::Happy),
            "neutral" => Some(Emotion::Neutral),
            "sad" => Some(Emotion::Sad),
            "surprise" => Some(Emotion::Surprise),
            _ => None,
        }
    }
}

/// Body text of a reaction comment.
pub fn reaction_body(emotion: Emotion) -> String {
    format!("reacted with emotion: {} {}", emotion.label(), emotion.glyph())
}

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("classifier request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("classifier returned label outside the vocabulary: {0}")]
    UnknownLabel(String),
}

/// Narrow interface over the external classifier.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    /// Classify a base64-encoded image into an emotion label.
    async fn classify(&self, image_data: &str) -> Result<Emotion, ClassifyError>;
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    image_data: &'a str,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    label: String,
}

/// HTTP-backed classifier with a hard request timeout.
pub struct HttpEmotionClassifier {
    client: Client,
    url: String,
}

impl HttpEmotionClassifier {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            url,
        }
    }
}

#[async_trait]
impl EmotionClassifier for HttpEmotionClassifier {
    async fn classify(&self, image_data: &str) -> Result<Emotion, ClassifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ClassifyRequest { image_data })
            .send()
            .await?
            .error_for_status()?;

        let body = response.json::<ClassifyResponse>().await?;
        Emotion::parse(&body.label).ok_or(ClassifyError::UnknownLabel(body.label))
    }
}

/// Classifier that always answers with a fixed label. Used when no
/// classifier endpoint is configured, and as a test double.
pub struct StaticClassifier(pub Emotion);

#[async_trait]
impl EmotionClassifier for StaticClassifier {
    async fn classify(&self, _image_data: &str) -> Result<Emotion, ClassifyError> {
        Ok(self.0)
    }
}

/// Classifier that always fails. Test double for the degraded path.
pub struct FailingClassifier;

#[async_trait]
impl EmotionClassifier for FailingClassifier {
    async fn classify(&self, _image_data: &str) -> Result<Emotion, ClassifyError> {
        Err(ClassifyError::UnknownLabel("unavailable".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip() {
        for e in [
            Emotion::Angry,
            Emotion::Fear,
            Emotion::Happy,
            Emotion::Neutral,
            Emotion::Sad,
            Emotion::Surprise,
        ] {
            assert_eq!(Emotion::parse(e.label()), Some(e));
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Emotion::parse("Happy"), Some(Emotion::Happy));
        assert_eq!(Emotion::parse("SURPRISE"), Some(Emotion::Surprise));
        assert_eq!(Emotion::parse("bored"), None);
    }

    #[test]
    fn test_reaction_body_format() {
        let body = reaction_body(Emotion::Happy);
        assert_eq!(body, format!("reacted with emotion: happy {}", Emotion::Happy.glyph()));
    }

    #[tokio::test]
    async fn test_static_classifier() {
        let classifier = StaticClassifier(Emotion::Sad);
        assert_eq!(classifier.classify("abc").await.unwrap(), Emotion::Sad);
    }

    #[tokio::test]
    async fn test_failing_classifier() {
        assert!(FailingClassifier.classify("abc").await.is_err());
    }
}
