//! Hit point arithmetic for a single participant.
//!
//! Every operation takes a snapshot by value and returns a new one, so the
//! engine can apply it to a working copy and discard the copy on rejection.
//! Invariant after every call: `0 <= current <= maximum`, `temporary >= 0`.

use serde::{Deserialize, Serialize};

use super::errors::ValidationError;

/// Default percentage of maximum hit points at or below which a participant
/// is classified as critical.
pub const DEFAULT_CRITICAL_PERCENT: u8 = 25;

/// A participant's hit point pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    /// Current hit points, `0..=maximum`.
    #[serde(rename = "current_hit_points")]
    pub current: i32,
    /// Maximum hit points, at least 1.
    #[serde(rename = "max_hit_points")]
    pub maximum: i32,
    /// Temporary hit points; absorbed before current hit points.
    #[serde(rename = "temporary_hit_points", default)]
    pub temporary: i32,
}

/// Derived health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HpStatus {
    /// Current hit points are zero.
    Unconscious,
    /// Current hit points are at or below the critical threshold.
    Critical,
    /// Below maximum but above the critical threshold.
    Injured,
    /// At maximum.
    Healthy,
}

/// Thresholds used to classify [`HpStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpStatusPolicy {
    /// Percentage of maximum at or below which a participant is critical.
    pub critical_percent: u8,
}

impl Default for HpStatusPolicy {
    fn default() -> Self {
        Self {
            critical_percent: DEFAULT_CRITICAL_PERCENT,
        }
    }
}

fn non_negative(amount: i32) -> Result<i32, ValidationError> {
    if amount < 0 {
        return Err(ValidationError::NegativeAmount(amount));
    }
    Ok(amount)
}

impl HitPoints {
    /// Creates a pool at full health with no temporary hit points.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidMaxHitPoints` if `maximum < 1`.
    pub fn full(maximum: i32) -> Result<Self, ValidationError> {
        if maximum < 1 {
            return Err(ValidationError::InvalidMaxHitPoints(maximum));
        }
        Ok(Self {
            current: maximum,
            maximum,
            temporary: 0,
        })
    }

    /// Creates a pool from explicit values, clamping `current` into range.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if `maximum < 1` or `temporary` is negative.
    pub fn new(current: i32, maximum: i32, temporary: i32) -> Result<Self, ValidationError> {
        let pool = Self::full(maximum)?;
        let temporary = non_negative(temporary)?;
        Ok(Self {
            current: current.clamp(0, maximum),
            temporary,
            ..pool
        })
    }

    /// Applies damage: temporary hit points absorb first, the remainder comes
    /// off current hit points, which floor at zero.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NegativeAmount` for a negative amount.
    pub fn apply_damage(self, amount: i32) -> Result<Self, ValidationError> {
        let amount = non_negative(amount)?;
        let absorbed = amount.min(self.temporary);
        let remainder = amount - absorbed;
        Ok(Self {
            current: self.current.saturating_sub(remainder).max(0),
            temporary: self.temporary - absorbed,
            ..self
        })
    }

    /// Heals current hit points up to the maximum. Temporary hit points are
    /// never increased by healing.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NegativeAmount` for a negative amount.
    pub fn apply_healing(self, amount: i32) -> Result<Self, ValidationError> {
        let amount = non_negative(amount)?;
        Ok(Self {
            current: self.current.saturating_add(amount).min(self.maximum),
            ..self
        })
    }

    /// Grants temporary hit points. Pools do not stack: the new value only
    /// replaces the old one when it is larger.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NegativeAmount` for a negative amount.
    pub fn set_temporary(self, amount: i32) -> Result<Self, ValidationError> {
        let amount = non_negative(amount)?;
        Ok(Self {
            temporary: self.temporary.max(amount),
            ..self
        })
    }

    /// Changes the maximum, pulling current hit points down if they exceed it.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidMaxHitPoints` if `maximum < 1`.
    pub fn set_maximum(self, maximum: i32) -> Result<Self, ValidationError> {
        if maximum < 1 {
            return Err(ValidationError::InvalidMaxHitPoints(maximum));
        }
        Ok(Self {
            current: self.current.min(maximum),
            maximum,
            ..self
        })
    }

    /// Sets current hit points, clamped to `0..=maximum`.
    #[must_use]
    pub fn set_current(self, value: i32) -> Self {
        Self {
            current: value.clamp(0, self.maximum),
            ..self
        }
    }

    /// Classifies the pool under the given policy.
    #[must_use]
    pub fn status(&self, policy: &HpStatusPolicy) -> HpStatus {
        let current = i64::from(self.current);
        let threshold = i64::from(self.maximum) * i64::from(policy.critical_percent);
        if self.current == 0 {
            HpStatus::Unconscious
        } else if current * 100 <= threshold {
            HpStatus::Critical
        } else if self.current < self.maximum {
            HpStatus::Injured
        } else {
            HpStatus::Healthy
        }
    }

    /// Whether the participant still has current hit points.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    /// Current plus temporary hit points, for display only.
    #[must_use]
    pub fn effective(&self) -> i32 {
        self.current.saturating_add(self.temporary)
    }
}
