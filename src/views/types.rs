//! View models consumed by the dashboard's display components.

use serde::Serialize;

use crate::api::{DamageType, SeverityLevel};

/// Overlay color for an analysis, chosen by its overall severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityColor {
    Red,
    Amber,
    Green,
}

impl SeverityColor {
    pub fn for_level(level: SeverityLevel) -> Self {
        match level {
            SeverityLevel::Severe => SeverityColor::Red,
            SeverityLevel::Moderate => SeverityColor::Amber,
            SeverityLevel::Minor => SeverityColor::Green,
        }
    }

    /// CSS color used by the web dashboard.
    pub fn hsl(self) -> &'static str {
        match self {
            SeverityColor::Red => "hsl(0 84% 60%)",
            SeverityColor::Amber => "hsl(38 92% 50%)",
            SeverityColor::Green => "hsl(160 84% 39%)",
        }
    }

    /// ANSI SGR color code for terminal output.
    pub fn ansi_code(self) -> u8 {
        match self {
            SeverityColor::Red => 31,
            SeverityColor::Amber => 33,
            SeverityColor::Green => 32,
        }
    }
}

/// One overlay rectangle on the damage image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBoxView {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub label: String,
    pub damage_type: DamageType,
    /// Percentage, 0-100
    pub confidence: u32,
    pub color: SeverityColor,
}

/// One card in the damage list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageSummaryView {
    pub id: String,
    pub part: String,
    pub damage_type: DamageType,
    /// Percentage, 0-100
    pub confidence: u32,
    /// Inherited from the analysis's overall severity
    pub severity: SeverityLevel,
    /// Whole currency units
    pub estimated_cost: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutBreakdown {
    pub total: i64,
    pub parts_cost: i64,
    pub labor_cost: i64,
    /// AI confidence percentage, 0-100
    pub confidence: u32,
    /// Seconds, one decimal
    pub processing_time_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityGaugeView {
    pub level: SeverityLevel,
    pub label: &'static str,
    /// 0-100
    pub score: u32,
    pub description: String,
    pub color: SeverityColor,
}

/// Everything the dashboard page renders for one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub analysis_id: String,
    pub header: String,
    pub image_url: String,
    pub bounding_boxes: Vec<BoundingBoxView>,
    pub damages: Vec<DamageSummaryView>,
    pub severity: SeverityGaugeView,
    pub payout: PayoutBreakdown,
    pub summary: String,
}
