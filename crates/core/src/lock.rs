use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockType {
    Manual,
    Duration,
    Datetime,
}

impl LockType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "manual" => Some(Self::Manual),
            "duration" => Some(Self::Duration),
            "datetime" | "date" => Some(Self::Datetime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStatus {
    Open,
    Locked,
    Expiring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    pub status: LockStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<String>,
}

/// When a new map stops accepting pins.
pub fn editable_until(
    lock_type: LockType,
    duration_hours: Option<f64>,
    lock_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match lock_type {
        LockType::Manual => None,
        LockType::Duration => duration_hours
            .filter(|hours| hours.is_finite() && *hours > 0.0)
            .map(|hours| now + Duration::milliseconds((hours * 3_600_000.0) as i64)),
        LockType::Datetime => lock_date,
    }
}

pub fn lock_state(
    is_locked: bool,
    editable_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> LockState {
    if is_locked {
        return LockState {
            status: LockStatus::Locked,
            time_remaining: None,
        };
    }

    let Some(until) = editable_until else {
        return LockState {
            status: LockStatus::Open,
            time_remaining: None,
        };
    };

    let remaining = until - now;
    if remaining <= Duration::zero() {
        return LockState {
            status: LockStatus::Locked,
            time_remaining: None,
        };
    }

    let hours = remaining.num_hours();
    let minutes = remaining.num_minutes() % 60;
    let time_remaining = if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    };

    LockState {
        status: LockStatus::Expiring,
        time_remaining: Some(time_remaining),
    }
}
