//! Emotion-control resolution
//!
//! The four wire modes collapse into one [`EmotionControl`] value that carries
//! exactly the inputs its mode needs. A mode whose input is missing degrades to
//! same-timbre, and the degradation is reported instead of swallowed.

use std::path::{Path, PathBuf};

use serde::Serialize;
use strum::{AsRefStr, Display, IntoStaticStr};

use crate::error::{Result, TtsError};

/// Canonical order of the emotion vector dimensions
pub const EMOTION_DIMENSIONS: [&str; 8] = [
    "happy",
    "angry",
    "sad",
    "afraid",
    "disgusted",
    "melancholic",
    "surprised",
    "calm",
];

/// Emotion-control mode as selected on the wire (`emoControlMode` 0 to 3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EmotionMode {
    SameTimbre,
    ReferenceAudio,
    Vector,
    DescriptiveText,
}

impl EmotionMode {
    /// Map a wire code to its mode
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Self::SameTimbre),
            1 => Ok(Self::ReferenceAudio),
            2 => Ok(Self::Vector),
            3 => Ok(Self::DescriptiveText),
            other => Err(TtsError::validation(
                "emoControlMode",
                format!("must be between 0 and 3, got {other}"),
            )),
        }
    }
}

/// Eight emotion intensities in [`EMOTION_DIMENSIONS`] order
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EmotionVector([f64; 8]);

impl EmotionVector {
    /// Build a vector from exactly eight finite values
    pub fn from_values(values: &[f64]) -> Result<Self> {
        let array: [f64; 8] = values.try_into().map_err(|_| {
            TtsError::validation(
                "emoVector",
                format!("must have {} elements, got {}", EMOTION_DIMENSIONS.len(), values.len()),
            )
        })?;

        if let Some(position) = array.iter().position(|value| !value.is_finite()) {
            return Err(TtsError::validation(
                "emoVector",
                format!("{} must be a finite number", EMOTION_DIMENSIONS[position]),
            ));
        }

        Ok(Self(array))
    }

    /// Parse the wire form: a JSON array of numbers
    pub fn parse(raw: &str) -> Result<Self> {
        let values: Vec<f64> = serde_json::from_str(raw)
            .map_err(|e| TtsError::validation("emoVector", format!("must be a JSON array of numbers: {e}")))?;

        Self::from_values(&values)
    }

    pub const fn values(&self) -> &[f64; 8] {
        &self.0
    }
}

/// Engine-facing emotion input; each variant carries only what its mode needs
#[derive(Debug, Clone, PartialEq)]
pub enum EmotionControl {
    SameTimbre,
    ReferenceAudio(PathBuf),
    Vector(EmotionVector),
    DescriptiveText(String),
}

impl EmotionControl {
    pub const fn mode(&self) -> EmotionMode {
        match self {
            Self::SameTimbre => EmotionMode::SameTimbre,
            Self::ReferenceAudio(_) => EmotionMode::ReferenceAudio,
            Self::Vector(_) => EmotionMode::Vector,
            Self::DescriptiveText(_) => EmotionMode::DescriptiveText,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmotionConfig {
    /// Blend weight in [0, 1]
    pub weight: f64,
    pub control: EmotionControl,
}

/// A resolved configuration and, when it degraded, the mode that was asked for
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionResolution {
    pub config: EmotionConfig,
    pub degraded_from: Option<EmotionMode>,
}

impl EmotionResolution {
    pub const fn effective_mode(&self) -> EmotionMode {
        self.config.control.mode()
    }

    pub const fn is_degraded(&self) -> bool {
        self.degraded_from.is_some()
    }
}

/// Validated emotion inputs, pending the staged reference audio
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionRequest {
    mode: EmotionMode,
    weight: f64,
    vector: Option<EmotionVector>,
    text: Option<String>,
}

impl EmotionRequest {
    /// Validate mode code, weight and vector length
    pub fn new(mode: i64, weight: f64, vector: Option<&[f64]>, text: Option<String>) -> Result<Self> {
        let mode = EmotionMode::from_code(mode)?;

        if !(0.0..=1.0).contains(&weight) {
            return Err(TtsError::validation(
                "emoAlpha",
                format!("must be between 0.0 and 1.0, got {weight}"),
            ));
        }

        let vector = vector.map(EmotionVector::from_values).transpose()?;

        Ok(Self {
            mode,
            weight,
            vector,
            text,
        })
    }

    pub const fn mode(&self) -> EmotionMode {
        self.mode
    }

    /// Pick the control for the requested mode, falling back to same-timbre
    /// when the mode's input is absent
    pub fn resolve(&self, reference_audio: Option<&Path>) -> EmotionResolution {
        let control = match self.mode {
            EmotionMode::SameTimbre => Some(EmotionControl::SameTimbre),
            EmotionMode::ReferenceAudio => reference_audio.map(|path| EmotionControl::ReferenceAudio(path.to_path_buf())),
            EmotionMode::Vector => self.vector.map(EmotionControl::Vector),
            EmotionMode::DescriptiveText => self
                .text
                .as_ref()
                .filter(|text| !text.trim().is_empty())
                .map(|text| EmotionControl::DescriptiveText(text.clone())),
        };

        let (control, degraded_from) = match control {
            Some(control) => (control, None),
            None => (EmotionControl::SameTimbre, Some(self.mode)),
        };

        EmotionResolution {
            config: EmotionConfig {
                weight: self.weight,
                control,
            },
            degraded_from,
        }
    }
}
