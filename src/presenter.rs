//! Display values for attendance percentages.

use crate::model::StudentSummary;
use serde::Serialize;
use std::f64::consts::PI;

pub const RING_SIZE: f64 = 72.0;
pub const RING_STROKE: f64 = 8.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ring {
    pub size: f64,
    pub stroke: f64,
    pub radius: f64,
    pub circumference: f64,
    pub dash_offset: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentDisplay {
    pub percent: f64,
    pub label: String,
    pub ring: Ring,
}

pub fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

pub fn ring(percent: f64, size: f64, stroke: f64) -> Ring {
    let p = clamp_percent(percent);
    let radius = (size - stroke) / 2.0;
    let circumference = 2.0 * PI * radius;
    Ring {
        size,
        stroke,
        radius,
        circumference,
        dash_offset: circumference - (p / 100.0) * circumference,
    }
}

/// "—" for students no save has reached yet.
pub fn display(summary: Option<&StudentSummary>) -> PercentDisplay {
    let percent = clamp_percent(summary.map(|s| s.percent).unwrap_or(0.0));
    let label = match summary {
        // Halves round up, so 1 of 8 days reads "13%".
        Some(_) => format!("{}%", percent.round() as u32),
        None => "—".to_string(),
    };
    PercentDisplay {
        percent,
        label,
        ring: ring(percent, RING_SIZE, RING_STROKE),
    }
}
