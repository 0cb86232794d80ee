use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::catalog::DEFAULT_STYLE;

pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 3.0;
pub const SCALE_STEP: f32 = 0.1;
pub const MIN_FILTER_PERCENT: u16 = 50;
pub const MAX_FILTER_PERCENT: u16 = 150;

/// Quarter-turn rotation applied to the source photo before baking.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarter => 270,
        }
    }

    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Quarter),
            180 => Some(Rotation::Half),
            270 => Some(Rotation::ThreeQuarter),
            _ => None,
        }
    }

    /// Clockwise by 90°, wrapping at 360.
    pub fn next(self) -> Self {
        match self {
            Rotation::None => Rotation::Quarter,
            Rotation::Quarter => Rotation::Half,
            Rotation::Half => Rotation::ThreeQuarter,
            Rotation::ThreeQuarter => Rotation::None,
        }
    }

    /// True when the post-rotation bounding box swaps width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Quarter | Rotation::ThreeQuarter)
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Rotation::from_degrees(value).ok_or_else(|| format!("rotation must be a multiple of 90, got {value}"))
    }
}

impl From<Rotation> for u16 {
    fn from(r: Rotation) -> u16 { r.degrees() }
}

/// Geometric and color adjustments baked into the submitted raster.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Adjustments {
    pub rotation: Rotation,
    pub scale: f32,
    pub brightness: u16,
    pub contrast: u16,
    pub sharpen: bool,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self { rotation: Rotation::None, scale: 1.0, brightness: 100, contrast: 100, sharpen: true }
    }
}

impl Adjustments {
    pub fn clamp_scale(scale: f32) -> f32 {
        scale.clamp(MIN_SCALE, MAX_SCALE)
    }

    pub fn clamp_filter(percent: u16) -> u16 {
        percent.clamp(MIN_FILTER_PERCENT, MAX_FILTER_PERCENT)
    }

    /// Copy with every field forced into its allowed range.
    pub fn clamped(self) -> Self {
        Self {
            scale: Self::clamp_scale(self.scale),
            brightness: Self::clamp_filter(self.brightness),
            contrast: Self::clamp_filter(self.contrast),
            ..self
        }
    }
}

/// Structured critique of a tattoo concept.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Analysis {
    pub rating: f64,
    pub feedback: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub result_image_url: String,
    pub analysis: Analysis,
}

/// One point-in-time record of everything the user can edit.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EditSnapshot {
    pub id: Uuid,
    pub prompt: String,
    pub style: String,
    pub adjustments: Adjustments,
    pub result_image_url: Option<String>,
    pub analysis: Option<Analysis>,
}

impl EditSnapshot {
    pub fn new(prompt: impl Into<String>, style: impl Into<String>, adjustments: Adjustments) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            style: style.into(),
            adjustments: adjustments.clamped(),
            result_image_url: None,
            analysis: None,
        }
    }

    pub fn with_result(mut self, result_image_url: Option<String>, analysis: Option<Analysis>) -> Self {
        self.result_image_url = result_image_url;
        self.analysis = analysis;
        self
    }

    /// The state a freshly loaded photo starts from.
    pub fn initial() -> Self {
        Self::new("", DEFAULT_STYLE, Adjustments::default())
    }
}

/// Record handed to the caller for durable storage.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TattooSimulation {
    pub id: Uuid,
    pub original_image: String,
    pub result_image: String,
    pub prompt: String,
    pub style: String,
    pub boldness_rating: f64,
    pub analysis: String,
    pub timestamp: DateTime<Utc>,
}

impl TattooSimulation {
    pub fn from_result(original_image: String, prompt: &str, style: &str, result: &GenerationResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_image,
            result_image: result.result_image_url.clone(),
            prompt: prompt.to_string(),
            style: style.to_string(),
            boldness_rating: result.analysis.rating,
            analysis: result.analysis.feedback.clone(),
            timestamp: Utc::now(),
        }
    }
}
