// Emotion API data models
//
// This module contains the request and response types used across the API.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::{Deserialize, Serialize as SerializeDerive};

use crate::config::LabelLocale;
use crate::emotion::{AnalysisResult, EmotionDistribution};

/// Body of `POST /predict/text`
#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

/// Emotion label to probability, serialized as a JSON object in model order
#[derive(Debug, Clone)]
pub struct EmotionScores {
    distribution: EmotionDistribution,
    locale: LabelLocale,
}

impl Serialize for EmotionScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(crate::emotion::NUM_EMOTIONS))?;
        for (emotion, probability) in self.distribution.iter() {
            map.serialize_entry(emotion.label(self.locale), &probability)?;
        }
        map.end()
    }
}

/// Response for both prediction endpoints
#[derive(Debug, SerializeDerive)]
pub struct PredictionResponse {
    /// Analysed text (the trimmed input, or the transcript for audio)
    pub text: String,
    pub emotions: EmotionScores,
    pub dominant_emotion: &'static str,
    pub confidence: f64,
}

impl PredictionResponse {
    pub fn new(result: AnalysisResult, locale: LabelLocale) -> Self {
        Self {
            text: result.text,
            dominant_emotion: result.dominant_emotion.label(locale),
            confidence: result.confidence,
            emotions: EmotionScores {
                distribution: result.emotions,
                locale,
            },
        }
    }
}

/// Response for `GET /`
#[derive(Debug, SerializeDerive)]
pub struct ServiceInfo {
    pub status: &'static str,
    pub version: &'static str,
    pub designer: &'static str,
}

/// Error response for API
#[derive(Debug, SerializeDerive)]
pub struct ErrorResponse {
    /// Client-facing message
    pub detail: String,
}
