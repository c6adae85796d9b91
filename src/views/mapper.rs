//! Pure transforms from an analysis record to dashboard view models.
//!
//! Nothing here reads the clock or any other ambient state: the processing
//! time is computed from the claim's two timestamps only, so the same
//! inputs always produce the same views.

use chrono::{DateTime, NaiveDateTime, Utc};

use super::types::*;
use crate::api::{AnalysisRecord, Claim, SeverityLevel};

/// Labor is priced at 40% of parts, so parts are 1/1.4 of the total and
/// labor 0.4/1.4. These are product policy, not derived from the analysis.
pub const LABOR_TO_PARTS_RATIO: f64 = 0.4;

/// Parts share of the total payout (1 / 1.4, as displayed).
pub const PARTS_SHARE: f64 = 0.714;

/// Labor share of the total payout (0.4 / 1.4, as displayed).
pub const LABOR_SHARE: f64 = 0.286;

/// Shown when the claim or one of its timestamps is unavailable.
pub const FALLBACK_PROCESSING_TIME_SECS: f64 = 8.4;

/// Convert a 0.0-1.0 score to a rounded 0-100 percentage.
pub fn to_percent(score: f64) -> u32 {
    if !score.is_finite() {
        return 0;
    }
    (score * 100.0).round().clamp(0.0, 100.0) as u32
}

/// Round a currency amount to whole units. Negative and NaN amounts are 0.
pub fn to_whole_units(amount: f64) -> i64 {
    if !amount.is_finite() || amount <= 0.0 {
        return 0;
    }
    amount.round() as i64
}

/// One overlay box per damage, in order, all in the analysis's color.
pub fn bounding_boxes(record: &AnalysisRecord) -> Vec<BoundingBoxView> {
    let color = SeverityColor::for_level(record.overall_severity.level);
    record
        .damages
        .iter()
        .map(|damage| BoundingBoxView {
            id: damage.id.clone(),
            x: finite_or_zero(damage.bounding_box.x),
            y: finite_or_zero(damage.bounding_box.y),
            width: finite_or_zero(damage.bounding_box.width),
            height: finite_or_zero(damage.bounding_box.height),
            label: damage.part_identified.clone(),
            damage_type: damage.damage_type,
            confidence: to_percent(damage.confidence_score),
            color,
        })
        .collect()
}

pub fn damage_summaries(record: &AnalysisRecord) -> Vec<DamageSummaryView> {
    let severity = record.overall_severity.level;
    record
        .damages
        .iter()
        .map(|damage| DamageSummaryView {
            id: damage.id.clone(),
            part: damage.part_identified.clone(),
            damage_type: damage.damage_type,
            confidence: to_percent(damage.confidence_score),
            severity,
            estimated_cost: to_whole_units(damage.estimated_cost),
        })
        .collect()
}

/// Split the estimated total into parts and labor.
pub fn payout_breakdown(record: &AnalysisRecord, claim: Option<&Claim>) -> PayoutBreakdown {
    let total = if record.total_estimated_cost.is_finite() {
        record.total_estimated_cost.max(0.0)
    } else {
        0.0
    };

    PayoutBreakdown {
        total: to_whole_units(total),
        parts_cost: to_whole_units(total * PARTS_SHARE),
        labor_cost: to_whole_units(total * LABOR_SHARE),
        confidence: to_percent(record.ai_confidence),
        processing_time_secs: claim
            .and_then(|c| processing_time_secs(&c.submitted_at, c.processed_at.as_deref()?))
            .unwrap_or(FALLBACK_PROCESSING_TIME_SECS),
    }
}

/// Seconds between submission and processing, rounded to one decimal.
///
/// Returns None if either timestamp is unparseable or processing precedes
/// submission.
pub fn processing_time_secs(submitted_at: &str, processed_at: &str) -> Option<f64> {
    let submitted = parse_timestamp(submitted_at)?;
    let processed = parse_timestamp(processed_at)?;
    let millis = (processed - submitted).num_milliseconds();
    if millis < 0 {
        return None;
    }
    Some((millis as f64 / 100.0).round() / 10.0)
}

/// Parse RFC 3339 timestamps, or naive ISO timestamps (taken as UTC) as
/// the backend writes them.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub fn severity_gauge(record: &AnalysisRecord) -> SeverityGaugeView {
    let severity = &record.overall_severity;
    let score = if severity.score.is_finite() {
        severity.score.round().clamp(0.0, 100.0) as u32
    } else {
        0
    };

    SeverityGaugeView {
        level: severity.level,
        label: severity_label(severity.level),
        score,
        description: severity.description.clone(),
        color: SeverityColor::for_level(severity.level),
    }
}

pub fn severity_label(level: SeverityLevel) -> &'static str {
    match level {
        SeverityLevel::Minor => "Minor",
        SeverityLevel::Moderate => "Moderate",
        SeverityLevel::Severe => "Severe",
    }
}

/// Header line: claim number, vehicle model and plate once a claim exists.
pub fn header_line(claim: Option<&Claim>) -> String {
    match claim {
        Some(claim) => format!(
            "Claim #{} \u{2022} {} \u{2022} Plate: {}",
            claim.claim_number,
            claim
                .vehicle_info
                .model
                .as_deref()
                .filter(|m| !m.is_empty())
                .unwrap_or("Vehicle"),
            claim.vehicle_plate
        ),
        None => "Analysis in progress...".to_string(),
    }
}

fn summary_line(record: &AnalysisRecord) -> String {
    let description = if record.overall_severity.description.is_empty() {
        "Analyzing vehicle damage using AI models."
    } else {
        record.overall_severity.description.as_str()
    };
    format!(
        "{} AI confidence score: {}%",
        description,
        to_percent(record.ai_confidence)
    )
}

/// Bundle every view the dashboard page needs.
pub fn dashboard_view(record: &AnalysisRecord, claim: Option<&Claim>) -> DashboardView {
    DashboardView {
        analysis_id: record.id.clone(),
        header: header_line(claim),
        image_url: record.image_url.clone(),
        bounding_boxes: bounding_boxes(record),
        damages: damage_summaries(record),
        severity: severity_gauge(record),
        payout: payout_breakdown(record, claim),
        summary: summary_line(record),
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
