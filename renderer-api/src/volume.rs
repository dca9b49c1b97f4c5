//! Volume normalization
//!
//! Renderers report volume as linear percent, as decibel attenuation or as an
//! index into a stepped range. Everything above the adapter works with
//! [`CanonicalVolume`], an integer percent in `0..=100`. The functions here
//! convert between the two and never fail: out-of-range readings clamp.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

/// Volume as a whole percent, always within `0..=100`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CanonicalVolume(u8);

impl CanonicalVolume {
    pub const MIN: CanonicalVolume = CanonicalVolume(0);
    pub const MAX: CanonicalVolume = CanonicalVolume(100);

    pub fn new(percent: u8) -> Result<Self> {
        if percent > 100 {
            return Err(ControlError::InvalidParameter(format!(
                "volume {} is out of range (0..=100)",
                percent
            )));
        }
        Ok(Self(percent))
    }

    /// Round and clamp an arbitrary percent value. NaN maps to 0.
    pub fn saturating(percent: f64) -> Self {
        if percent.is_nan() {
            return Self::MIN;
        }
        Self(percent.round().clamp(0.0, 100.0) as u8)
    }

    /// Apply a signed step, clamping at both ends
    pub fn offset(self, delta: i16) -> Self {
        Self(i16::from(self.0).saturating_add(delta).clamp(0, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for CanonicalVolume {
    type Error = ControlError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Display for CanonicalVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Attenuation range of a decibel-reporting renderer
///
/// The common -80..0 dB window is only a default; some devices bottom out at
/// -60 dB or report a positive ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecibelRange {
    pub floor: f64,
    pub ceiling: f64,
}

impl DecibelRange {
    pub const DEFAULT_FLOOR: f64 = -80.0;
    pub const DEFAULT_CEILING: f64 = 0.0;

    pub fn new(floor: f64, ceiling: f64) -> Result<Self> {
        let range = Self { floor, ceiling };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if self.floor.is_finite() && self.ceiling.is_finite() && self.floor < self.ceiling {
            Ok(())
        } else {
            Err(ControlError::InvalidParameter(format!(
                "decibel floor {} must be below ceiling {}",
                self.floor, self.ceiling
            )))
        }
    }

    fn span(&self) -> f64 {
        self.ceiling - self.floor
    }
}

impl Default for DecibelRange {
    fn default() -> Self {
        Self {
            floor: Self::DEFAULT_FLOOR,
            ceiling: Self::DEFAULT_CEILING,
        }
    }
}

/// Index range of a step-based renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl StepRange {
    pub fn new(min: f64, max: f64, step: f64) -> Result<Self> {
        let range = Self { min, max, step };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        let finite = self.min.is_finite() && self.max.is_finite() && self.step.is_finite();
        if finite && self.min < self.max && self.step > 0.0 && self.step <= self.max - self.min {
            Ok(())
        } else {
            Err(ControlError::InvalidParameter(format!(
                "invalid step range {}..={} step {}",
                self.min, self.max, self.step
            )))
        }
    }

    /// Index of the highest step that does not pass `max`
    fn last_index(&self) -> f64 {
        ((self.max - self.min) / self.step).floor()
    }
}

/// How a renderer expresses volume on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeEncoding {
    LinearPercent,
    Decibel,
    SteppedIndex,
}

/// Bounds of a raw reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeRange {
    pub min: f64,
    pub max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

/// An encoding together with the parameters needed to convert it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeScale {
    LinearPercent,
    Decibel(DecibelRange),
    SteppedIndex(StepRange),
}

impl VolumeScale {
    pub fn encoding(&self) -> VolumeEncoding {
        match self {
            VolumeScale::LinearPercent => VolumeEncoding::LinearPercent,
            VolumeScale::Decibel(_) => VolumeEncoding::Decibel,
            VolumeScale::SteppedIndex(_) => VolumeEncoding::SteppedIndex,
        }
    }

    pub fn range(&self) -> VolumeRange {
        match self {
            VolumeScale::LinearPercent => VolumeRange {
                min: 0.0,
                max: 100.0,
                step: None,
            },
            VolumeScale::Decibel(db) => VolumeRange {
                min: db.floor,
                max: db.ceiling,
                step: None,
            },
            VolumeScale::SteppedIndex(steps) => VolumeRange {
                min: steps.min,
                max: steps.max,
                step: Some(steps.step),
            },
        }
    }

    /// Wrap a raw value reported in this scale
    pub fn reading(&self, value: f64) -> RawVolumeReading {
        RawVolumeReading {
            encoding: self.encoding(),
            value,
            range: self.range(),
        }
    }

    pub fn to_percent(&self, value: f64) -> CanonicalVolume {
        match self {
            VolumeScale::LinearPercent => CanonicalVolume::saturating(value),
            VolumeScale::Decibel(range) => decibel_to_percent(value, *range),
            VolumeScale::SteppedIndex(range) => stepped_to_percent(value, *range),
        }
    }

    pub fn from_percent(&self, percent: CanonicalVolume) -> f64 {
        match self {
            VolumeScale::LinearPercent => f64::from(percent.value()),
            VolumeScale::Decibel(range) => percent_to_decibel(percent, *range),
            VolumeScale::SteppedIndex(range) => percent_to_stepped(percent, *range),
        }
    }
}

/// A volume value exactly as a renderer reported it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RawVolumeReading {
    pub encoding: VolumeEncoding,
    pub value: f64,
    pub range: VolumeRange,
}

impl RawVolumeReading {
    /// The scale this reading was taken in
    pub fn scale(&self) -> VolumeScale {
        match self.encoding {
            VolumeEncoding::LinearPercent => VolumeScale::LinearPercent,
            VolumeEncoding::Decibel => VolumeScale::Decibel(DecibelRange {
                floor: self.range.min,
                ceiling: self.range.max,
            }),
            VolumeEncoding::SteppedIndex => VolumeScale::SteppedIndex(StepRange {
                min: self.range.min,
                max: self.range.max,
                step: self.range.step.unwrap_or(1.0),
            }),
        }
    }

    pub fn to_canonical(&self) -> CanonicalVolume {
        self.scale().to_percent(self.value)
    }
}

/// `round((db - floor) / (ceiling - floor) * 100)`, clamped to `0..=100`
pub fn decibel_to_percent(db: f64, range: DecibelRange) -> CanonicalVolume {
    if range.span() <= 0.0 {
        return CanonicalVolume::MIN;
    }
    CanonicalVolume::saturating((db - range.floor) / range.span() * 100.0)
}

/// Inverse of [`decibel_to_percent`]; exact, the caller decides on rounding
pub fn percent_to_decibel(percent: CanonicalVolume, range: DecibelRange) -> f64 {
    f64::from(percent.value()) / 100.0 * range.span() + range.floor
}

/// `round((value - min) / (max - min) * 100)`, clamped to `0..=100`
pub fn stepped_to_percent(value: f64, range: StepRange) -> CanonicalVolume {
    let span = range.max - range.min;
    if span <= 0.0 {
        return CanonicalVolume::MIN;
    }
    CanonicalVolume::saturating((value - range.min) / span * 100.0)
}

/// Percent to the nearest valid step within the range
pub fn percent_to_stepped(percent: CanonicalVolume, range: StepRange) -> f64 {
    if range.step <= 0.0 || range.max <= range.min {
        return range.min;
    }
    let target = f64::from(percent.value()) / 100.0 * (range.max - range.min);
    let index = (target / range.step).round().clamp(0.0, range.last_index());
    range.min + index * range.step
}
