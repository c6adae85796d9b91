//! Plain-text rendering of dashboard views for the terminal.

use std::fmt::Write;

use super::format::{format_hours, format_inr, format_percent, format_seconds};
use super::types::*;
use crate::api::{Claim, DashboardStats, Paginated, TrendPoint};

/// Marker drawn next to the highlighted damage in both panels.
const SELECTED: &str = "\u{25b6}";

fn colorize(text: &str, color: SeverityColor, ansi: bool) -> String {
    if ansi {
        format!("\x1b[{}m{}\x1b[0m", color.ansi_code(), text)
    } else {
        text.to_string()
    }
}

/// Render the dashboard page. `selected` is the shared selection, so the
/// overlay list and the damage list highlight the same item.
pub fn render_dashboard(view: &DashboardView, selected: Option<&str>, ansi: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Damage Analysis  [{}]", view.analysis_id);
    let _ = writeln!(out, "{}", view.header);
    if !view.image_url.is_empty() {
        let _ = writeln!(out, "Image: {}", view.image_url);
    }

    let _ = writeln!(out, "\nOverlay");
    if view.bounding_boxes.is_empty() {
        let _ = writeln!(out, "  (no damage regions)");
    }
    for b in &view.bounding_boxes {
        let marker = if selected == Some(b.id.as_str()) { SELECTED } else { " " };
        let line = format!(
            "{} {:<8} {:<20} {:<11} at ({:.0},{:.0}) {:.0}x{:.0}  {}",
            marker,
            b.id,
            b.label,
            b.damage_type.as_str(),
            b.x,
            b.y,
            b.width,
            b.height,
            format_percent(b.confidence)
        );
        let _ = writeln!(out, "{}", colorize(&line, b.color, ansi));
    }

    let _ = writeln!(out, "\nDamages");
    if view.damages.is_empty() {
        let _ = writeln!(out, "  No damages detected");
    }
    for d in &view.damages {
        let marker = if selected == Some(d.id.as_str()) { SELECTED } else { " " };
        let _ = writeln!(
            out,
            "{} {:<20} {:<11} {:>4}  {:<8} {}",
            marker,
            d.part,
            d.damage_type.as_str(),
            format_percent(d.confidence),
            d.severity.as_str(),
            format_inr(d.estimated_cost)
        );
    }

    let gauge = &view.severity;
    let filled = (gauge.score as usize) / 5;
    let bar = format!("[{}{}]", "#".repeat(filled), "-".repeat(20 - filled.min(20)));
    let _ = writeln!(
        out,
        "\nSeverity  {} {} {}/100",
        colorize(gauge.label, gauge.color, ansi),
        bar,
        gauge.score
    );

    let p = &view.payout;
    let _ = writeln!(out, "\nEstimated Payout  {}", format_inr(p.total));
    let _ = writeln!(
        out,
        "  Parts {}  Labor {}",
        format_inr(p.parts_cost),
        format_inr(p.labor_cost)
    );
    let _ = writeln!(
        out,
        "  Confidence {}  Processed in {}",
        format_percent(p.confidence),
        format_seconds(p.processing_time_secs)
    );
    let _ = writeln!(out, "\n{}", view.summary);
    out
}

pub fn render_claim(claim: &Claim) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Claim #{} ({})", claim.claim_number, claim.id);
    let _ = writeln!(out, "  Status:     {}", claim.status.as_str());
    let _ = writeln!(out, "  Plate:      {}", claim.vehicle_plate);
    let _ = writeln!(out, "  Payout:     {}", format_inr(super::to_whole_units(claim.total_payout)));
    let _ = writeln!(out, "  Confidence: {}", format_percent(super::to_percent(claim.ai_confidence)));
    let _ = writeln!(out, "  Submitted:  {}", claim.submitted_at);
    if let Some(ref processed) = claim.processed_at {
        let _ = writeln!(out, "  Processed:  {}", processed);
    }
    if let Some(ref notes) = claim.adjuster_notes {
        let _ = writeln!(out, "  Notes:      {}", notes);
    }
    out
}

/// Claims ledger table with a pagination footer.
pub fn render_claims_page(page: &Paginated<Claim>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<22} {:<12} {:<13} {:>12} {:>5}  {}",
        "CLAIM", "PLATE", "STATUS", "PAYOUT", "CONF", "SUBMITTED"
    );
    for c in &page.data {
        let _ = writeln!(
            out,
            "{:<22} {:<12} {:<13} {:>12} {:>5}  {}",
            c.claim_number,
            c.vehicle_plate,
            c.status.as_str(),
            format_inr(super::to_whole_units(c.total_payout)),
            format_percent(super::to_percent(c.ai_confidence)),
            c.submitted_at
        );
    }
    let _ = writeln!(
        out,
        "Page {} of {} ({} claims)",
        page.page,
        page.total_pages.max(1),
        page.total
    );
    out
}

pub fn render_stats(stats: &DashboardStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total claims:        {}", stats.total_claims);
    let _ = writeln!(out, "Pending claims:      {}", stats.pending_claims);
    let _ = writeln!(out, "Approved today:      {}", stats.approved_today);
    let _ = writeln!(out, "Avg processing time: {}", format_hours(stats.average_processing_time));
    let _ = writeln!(out, "Total payouts:       {}", format_inr(super::to_whole_units(stats.total_payouts)));
    out
}

pub fn render_trends(points: &[TrendPoint]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<12} {:>7} {:>9} {:>9}", "DATE", "CLAIMS", "APPROVED", "REJECTED");
    for p in points {
        let _ = writeln!(
            out,
            "{:<12} {:>7} {:>9} {:>9}",
            p.date, p.claims, p.approved, p.rejected
        );
    }
    out
}
