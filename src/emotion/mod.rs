// Emotion classification
//
// This module defines the emotion taxonomy and the per-request analysis types,
// plus the classifier backends and the service owning the model lifecycle.

pub mod classifier;
pub mod service;

pub use classifier::{ClassifierError, ModelLoader, OnnxClassifier, OnnxModelLoader, SequenceClassifier};
pub use service::EmotionService;

use crate::config::LabelLocale;

/// Number of emotion classes produced by the model
pub const NUM_EMOTIONS: usize = 7;

/// Emotion labels, in the order of the model's logits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Love,
    Neutral,
}

impl Emotion {
    /// All labels, in logit order
    pub const ALL: [Emotion; NUM_EMOTIONS] = [
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Surprise,
        Emotion::Love,
        Emotion::Neutral,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Love => "love",
            Emotion::Neutral => "neutral",
        }
    }

    pub fn arabic_label(self) -> &'static str {
        match self {
            Emotion::Joy => "فرح",
            Emotion::Sadness => "حزن",
            Emotion::Anger => "غضب",
            Emotion::Fear => "خوف",
            Emotion::Surprise => "مفاجأة",
            Emotion::Love => "حب",
            Emotion::Neutral => "محايد",
        }
    }

    /// Label used in API responses
    pub fn label(self, locale: LabelLocale) -> &'static str {
        match locale {
            LabelLocale::Arabic => self.arabic_label(),
            LabelLocale::English => self.name(),
        }
    }
}

/// Probability for each emotion, in `Emotion::ALL` order
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionDistribution {
    probabilities: [f64; NUM_EMOTIONS],
}

impl EmotionDistribution {
    /// Build a distribution from raw model logits.
    ///
    /// Only the first `NUM_EMOTIONS` logits are used; returns `None` when fewer
    /// are available or when any of them is not finite.
    pub fn from_logits(logits: &[f32]) -> Option<Self> {
        if logits.len() < NUM_EMOTIONS {
            return None;
        }
        let logits = &logits[..NUM_EMOTIONS];
        if logits.iter().any(|l| !l.is_finite()) {
            return None;
        }

        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
        let mut probabilities = [0.0f64; NUM_EMOTIONS];
        let mut sum = 0.0;
        for (p, &l) in probabilities.iter_mut().zip(logits) {
            *p = (l as f64 - max).exp();
            sum += *p;
        }
        for p in probabilities.iter_mut() {
            *p /= sum;
        }

        Some(Self { probabilities })
    }

    pub fn probability(&self, emotion: Emotion) -> f64 {
        self.probabilities[emotion as usize]
    }

    /// (emotion, probability) pairs in label order
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        Emotion::ALL.iter().map(move |&e| (e, self.probability(e)))
    }

    /// Most probable emotion; the earliest label wins ties
    pub fn dominant(&self) -> Emotion {
        let mut best = Emotion::ALL[0];
        for (emotion, p) in self.iter().skip(1) {
            if p > self.probability(best) {
                best = emotion;
            }
        }
        best
    }
}

/// Result of analysing one input text
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub text: String,
    pub emotions: EmotionDistribution,
    pub dominant_emotion: Emotion,
    pub confidence: f64,
}

impl AnalysisResult {
    pub fn new(text: String, emotions: EmotionDistribution) -> Self {
        let dominant_emotion = emotions.dominant();
        let confidence = emotions.probability(dominant_emotion);
        Self {
            text,
            emotions,
            dominant_emotion,
            confidence,
        }
    }
}

/// Collapse whitespace runs into single spaces
pub fn preprocess_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
