use jiff::Timestamp;
use serde::Serialize;

use crate::{
    emotion::{EmotionMode, EmotionRequest, EmotionVector},
    error::{Result, TtsError},
    staging::Upload,
};

/// Longest accepted input text, in characters
pub const MAX_TEXT_CHARS: usize = 1000;

pub const MIN_TEXT_TOKENS_PER_SEGMENT: u32 = 50;
pub const MAX_TEXT_TOKENS_PER_SEGMENT: u32 = 500;
pub const DEFAULT_TEXT_TOKENS_PER_SEGMENT: u32 = 120;

const DEFAULT_EMO_ALPHA: f64 = 1.0;

/// Engine knobs passed through unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationOptions {
    pub use_random: bool,
    pub max_text_tokens_per_segment: u32,
    pub verbose: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            use_random: false,
            max_text_tokens_per_segment: DEFAULT_TEXT_TOKENS_PER_SEGMENT,
            verbose: false,
        }
    }
}

/// Synthesis form fields as received, before any validation
#[derive(Debug, Default)]
pub struct SynthesisForm {
    pub text: Option<String>,
    pub emo_control_mode: Option<String>,
    pub emo_alpha: Option<String>,
    pub emo_vector: Option<String>,
    pub emo_text: Option<String>,
    pub use_random: Option<String>,
    pub max_text_tokens_per_segment: Option<String>,
    pub verbose: Option<String>,
    pub speaker_audio: Option<Upload>,
    pub emotion_audio: Option<Upload>,
}

/// Validated scalar inputs of a synthesis request
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisParams {
    pub text: String,
    pub emotion: EmotionRequest,
    pub options: GenerationOptions,
}

/// Uploaded reference clips, not yet staged
#[derive(Debug, Default)]
pub struct SynthesisUploads {
    pub speaker: Option<Upload>,
    pub emotion: Option<Upload>,
}

impl SynthesisForm {
    /// Validate every scalar field and split off the uploads
    pub fn into_parts(self) -> Result<(SynthesisParams, SynthesisUploads)> {
        let text = self
            .text
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| TtsError::validation("text", "is required"))?;

        let chars = text.chars().count();
        if chars > MAX_TEXT_CHARS {
            return Err(TtsError::validation(
                "text",
                format!("must be at most {MAX_TEXT_CHARS} characters, got {chars}"),
            ));
        }

        let mode = parse_field::<i64>("emoControlMode", self.emo_control_mode.as_deref())?.unwrap_or(0);
        let weight = parse_field::<f64>("emoAlpha", self.emo_alpha.as_deref())?.unwrap_or(DEFAULT_EMO_ALPHA);

        let vector = present(self.emo_vector.as_deref())
            .map(EmotionVector::parse)
            .transpose()?;

        let emotion = EmotionRequest::new(
            mode,
            weight,
            vector.as_ref().map(|vector| vector.values().as_slice()),
            self.emo_text,
        )?;

        let max_text_tokens_per_segment =
            parse_field::<u32>("maxTextTokensPerSegment", self.max_text_tokens_per_segment.as_deref())?
                .unwrap_or(DEFAULT_TEXT_TOKENS_PER_SEGMENT);

        if !(MIN_TEXT_TOKENS_PER_SEGMENT..=MAX_TEXT_TOKENS_PER_SEGMENT).contains(&max_text_tokens_per_segment) {
            return Err(TtsError::validation(
                "maxTextTokensPerSegment",
                format!(
                    "must be between {MIN_TEXT_TOKENS_PER_SEGMENT} and {MAX_TEXT_TOKENS_PER_SEGMENT}, got {max_text_tokens_per_segment}"
                ),
            ));
        }

        let options = GenerationOptions {
            use_random: parse_bool("useRandom", self.use_random.as_deref())?.unwrap_or(false),
            max_text_tokens_per_segment,
            verbose: parse_bool("verbose", self.verbose.as_deref())?.unwrap_or(false),
        };

        let uploads = SynthesisUploads {
            speaker: self.speaker_audio,
            emotion: self.emotion_audio,
        };

        Ok((
            SynthesisParams {
                text,
                emotion,
                options,
            },
            uploads,
        ))
    }
}

/// Blank form values count as not sent
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_field<T>(field: &'static str, value: Option<&str>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    present(value)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|e| TtsError::validation(field, format!("'{value}' is not valid: {e}")))
        })
        .transpose()
}

fn parse_bool(field: &'static str, value: Option<&str>) -> Result<Option<bool>> {
    let Some(value) = present(value) else {
        return Ok(None);
    };

    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(TtsError::validation(field, format!("'{value}' is not a boolean"))),
    }
}

/// JSON body of `POST /tts`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisResponse {
    pub success: bool,
    pub audio_url: String,
    pub task_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub created_at: Timestamp,
    pub effective_emotion_mode: EmotionMode,
    pub emotion_fallback: bool,
    /// The mode that was asked for, present only when it fell back
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_emotion_mode: Option<EmotionMode>,
}
