//! Wire types for the AutoGuard REST backend.
//!
//! Field names follow the backend's camelCase JSON. Closed enums are
//! normalized at the boundary: analysis and claim statuses must match a
//! known variant, while severity levels and damage types fall back to a
//! default variant (with a warning) so one odd detection never hides a
//! whole analysis.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// ANALYSIS
// =============================================================================

/// Processing state of an analysis record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AnalysisStatus::Processing)
    }

    /// Status only ever moves processing -> {completed, failed}.
    pub fn can_transition_to(self, next: AnalysisStatus) -> bool {
        match self {
            AnalysisStatus::Processing => true,
            terminal => terminal == next,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }
}

/// Overall severity bucket of an analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum SeverityLevel {
    #[default]
    Minor,
    Moderate,
    Severe,
}

impl From<String> for SeverityLevel {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "minor" => SeverityLevel::Minor,
            "moderate" => SeverityLevel::Moderate,
            "severe" => SeverityLevel::Severe,
            other => {
                warn!("Unknown severity level '{}', treating as minor", other);
                SeverityLevel::Minor
            }
        }
    }
}

impl SeverityLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SeverityLevel::Minor => "minor",
            SeverityLevel::Moderate => "moderate",
            SeverityLevel::Severe => "severe",
        }
    }
}

/// Kind of damage detected on a vehicle part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum DamageType {
    #[default]
    Scratch,
    Dent,
    Crack,
    Shatter,
    Deformation,
    Missing,
}

impl From<String> for DamageType {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "scratch" => DamageType::Scratch,
            "dent" => DamageType::Dent,
            "crack" => DamageType::Crack,
            "shatter" => DamageType::Shatter,
            "deformation" => DamageType::Deformation,
            "missing" => DamageType::Missing,
            other => {
                warn!("Unknown damage type '{}', treating as scratch", other);
                DamageType::Scratch
            }
        }
    }
}

impl DamageType {
    pub fn as_str(self) -> &'static str {
        match self {
            DamageType::Scratch => "scratch",
            DamageType::Dent => "dent",
            DamageType::Crack => "crack",
            DamageType::Shatter => "shatter",
            DamageType::Deformation => "deformation",
            DamageType::Missing => "missing",
        }
    }
}

/// Damage region as percentages of the image dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(default, deserialize_with = "null_as_default")]
    pub x: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub y: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub width: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub height: f64,
}

impl BoundingBox {
    /// Soft invariant for drawable overlays: every edge inside [0, 100].
    pub fn is_within_image(&self) -> bool {
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        in_range(self.x)
            && in_range(self.y)
            && in_range(self.width)
            && in_range(self.height)
            && self.x + self.width <= 100.0
            && self.y + self.height <= 100.0
    }
}

/// A single damaged part detected in the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageAssessment {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub part_identified: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub damage_type: DamageType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bounding_box: BoundingBox,
    #[serde(default, deserialize_with = "null_as_default")]
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub level: SeverityLevel,
    /// 0-100
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// An AI damage analysis of one uploaded vehicle photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vehicle_info: VehicleInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub damages: Vec<DamageAssessment>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub overall_severity: SeverityInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_estimated_cost: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ai_confidence: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub processed_at: String,
    pub status: AnalysisStatus,
}

impl AnalysisRecord {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn damage(&self, damage_id: &str) -> Option<&DamageAssessment> {
        self.damages.iter().find(|d| d.id == damage_id)
    }

    pub fn first_damage_id(&self) -> Option<&str> {
        self.damages.first().map(|d| d.id.as_str())
    }
}

/// Response of the upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub analysis_id: String,
    pub status: UploadStatus,
    /// Seconds
    #[serde(default)]
    pub estimated_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Queued,
    Processing,
}

/// Lightweight status probe for an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisProgress {
    pub status: AnalysisStatus,
    #[serde(default)]
    pub progress: u8,
}

// =============================================================================
// CLAIMS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Pending,
    Processing,
    Approved,
    Rejected,
    UnderReview,
}

impl ClaimStatus {
    /// Approved and rejected are final; everything else may still be
    /// approved, rejected or sent (back) to review.
    pub fn can_transition_to(self, next: ClaimStatus) -> bool {
        match self {
            ClaimStatus::Approved | ClaimStatus::Rejected => false,
            _ => matches!(
                next,
                ClaimStatus::Approved | ClaimStatus::Rejected | ClaimStatus::UnderReview
            ),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Processing => "processing",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Rejected => "rejected",
            ClaimStatus::UnderReview => "under_review",
        }
    }
}

impl std::str::FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(ClaimStatus::Pending),
            "processing" => Ok(ClaimStatus::Processing),
            "approved" => Ok(ClaimStatus::Approved),
            "rejected" => Ok(ClaimStatus::Rejected),
            "under_review" => Ok(ClaimStatus::UnderReview),
            other => Err(format!("Unknown claim status: {}", other)),
        }
    }
}

/// A persisted insurance claim created from a completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: String,
    pub claim_number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vehicle_plate: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vehicle_info: VehicleInfo,
    pub submitted_at: String,
    #[serde(default)]
    pub processed_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ai_confidence: f64,
    pub status: ClaimStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_payout: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_result: Option<AnalysisRecord>,
    #[serde(default)]
    pub adjuster_notes: Option<String>,
}

/// Filters for the claims ledger listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimFilters {
    pub status: Option<ClaimStatus>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub min_confidence: Option<f64>,
    pub search_query: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ClaimFilters {
    /// Query parameters for the set filters, in a stable order.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(status) = self.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(ref from) = self.date_from {
            query.push(("dateFrom", from.clone()));
        }
        if let Some(ref to) = self.date_to {
            query.push(("dateTo", to.clone()));
        }
        if let Some(min) = self.min_confidence {
            query.push(("minConfidence", min.to_string()));
        }
        if let Some(ref q) = self.search_query {
            if !q.trim().is_empty() {
                query.push(("searchQuery", q.trim().to_string()));
            }
        }
        if let Some(page) = self.page {
            query.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        query
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

// =============================================================================
// REPORTS & ANALYTICS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Pdf,
    Json,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub claim_id: String,
    pub include_images: bool,
    pub include_confidence_metrics: bool,
    pub format: ReportFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_claims: u64,
    pub pending_claims: u64,
    pub approved_today: u64,
    /// Hours
    pub average_processing_time: f64,
    pub total_payouts: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: String,
    pub claims: u64,
    pub approved: u64,
    pub rejected: u64,
}

// =============================================================================
// AUTH & ERRORS
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
}

/// Error body returned by the backend. Handlers raise FastAPI-style
/// `{"detail": ...}` while the documented contract is `{code, message}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ApiErrorBody {
    pub fn into_message(self) -> Option<String> {
        if let Some(message) = self.message.filter(|m| !m.is_empty()) {
            return Some(message);
        }
        match self.detail? {
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETED: &str = r#"{
        "id": "an-1",
        "imageUrl": "/api/v1/uploads/an-1.jpg",
        "vehicleInfo": {"make": "BMW", "model": "5 Series", "plateNumber": "ABC 1234"},
        "damages": [
            {
                "id": "d1",
                "partIdentified": "Front Bumper",
                "damageType": "dent",
                "confidenceScore": 0.94,
                "boundingBox": {"x": 32, "y": 18, "width": 20, "height": 22},
                "estimatedCost": 12000
            }
        ],
        "overallSeverity": {"level": "severe", "score": 90, "description": "Severe vehicle damage detected"},
        "totalEstimatedCost": 28000,
        "aiConfidence": 0.91,
        "processedAt": "2024-03-01T10:00:00",
        "status": "completed"
    }"#;

    #[test]
    fn test_analysis_record_deserialize() {
        let record: AnalysisRecord = serde_json::from_str(COMPLETED).unwrap();
        assert_eq!(record.id, "an-1");
        assert_eq!(record.status, AnalysisStatus::Completed);
        assert_eq!(record.overall_severity.level, SeverityLevel::Severe);
        assert_eq!(record.damages.len(), 1);
        assert_eq!(record.damages[0].damage_type, DamageType::Dent);
        assert_eq!(record.damages[0].bounding_box.x, 32.0);
        assert_eq!(record.vehicle_info.plate_number.as_deref(), Some("ABC 1234"));
        assert_eq!(record.first_damage_id(), Some("d1"));
    }

    #[test]
    fn test_missing_and_null_fields_default() {
        let json = r#"{
            "id": "an-2",
            "damages": [{"id": "d1", "boundingBox": {"x": 5, "y": null}, "estimatedCost": null}],
            "overallSeverity": null,
            "status": "processing"
        }"#;
        let record: AnalysisRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.overall_severity.level, SeverityLevel::Minor);
        assert_eq!(record.total_estimated_cost, 0.0);
        let damage = &record.damages[0];
        assert_eq!(damage.bounding_box.x, 5.0);
        assert_eq!(damage.bounding_box.y, 0.0);
        assert_eq!(damage.bounding_box.width, 0.0);
        assert_eq!(damage.estimated_cost, 0.0);
        assert_eq!(damage.part_identified, "");
    }

    #[test]
    fn test_unknown_variants_normalize() {
        let json = r#"{"id":"d9","damageType":"melted","confidenceScore":0.5}"#;
        let damage: DamageAssessment = serde_json::from_str(json).unwrap();
        assert_eq!(damage.damage_type, DamageType::Scratch);

        let severity: SeverityInfo =
            serde_json::from_str(r#"{"level":"CATASTROPHIC","score":99}"#).unwrap();
        assert_eq!(severity.level, SeverityLevel::Minor);

        let severity: SeverityInfo = serde_json::from_str(r#"{"level":"Severe"}"#).unwrap();
        assert_eq!(severity.level, SeverityLevel::Severe);
    }

    #[test]
    fn test_unknown_analysis_status_rejected() {
        let json = r#"{"id":"an-3","status":"exploded"}"#;
        assert!(serde_json::from_str::<AnalysisRecord>(json).is_err());
    }

    #[test]
    fn test_enums_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&SeverityLevel::Moderate).unwrap(), "\"moderate\"");
        assert_eq!(serde_json::to_string(&DamageType::Shatter).unwrap(), "\"shatter\"");
        assert_eq!(
            serde_json::to_string(&ClaimStatus::UnderReview).unwrap(),
            "\"under_review\""
        );
    }

    #[test]
    fn test_analysis_status_transitions() {
        use AnalysisStatus::*;
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Completed));
    }

    #[test]
    fn test_claim_status_transitions() {
        use ClaimStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(UnderReview));
        assert!(UnderReview.can_transition_to(UnderReview));
        assert!(UnderReview.can_transition_to(Rejected));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(UnderReview));
        assert!(!Pending.can_transition_to(Pending));
        assert_eq!("under-review".parse::<ClaimStatus>().unwrap(), UnderReview);
        assert!("closed".parse::<ClaimStatus>().is_err());
    }

    #[test]
    fn test_bounding_box_soft_invariant() {
        let inside = BoundingBox { x: 32.0, y: 18.0, width: 20.0, height: 22.0 };
        assert!(inside.is_within_image());
        let overflow = BoundingBox { x: 90.0, y: 10.0, width: 20.0, height: 5.0 };
        assert!(!overflow.is_within_image());
    }

    #[test]
    fn test_claim_filters_query() {
        let filters = ClaimFilters {
            status: Some(ClaimStatus::UnderReview),
            search_query: Some("  ABC ".to_string()),
            page: Some(2),
            limit: Some(10),
            ..Default::default()
        };
        let query = filters.to_query();
        assert_eq!(
            query,
            vec![
                ("status", "under_review".to_string()),
                ("searchQuery", "ABC".to_string()),
                ("page", "2".to_string()),
                ("limit", "10".to_string()),
            ]
        );
        assert!(ClaimFilters::default().to_query().is_empty());
    }

    #[test]
    fn test_claim_deserialize() {
        let json = r#"{
            "id": "an-1",
            "claimNumber": "CLM-20240301-AB12",
            "vehiclePlate": "ABC 1234",
            "vehicleInfo": {"model": "5 Series"},
            "submittedAt": "2024-03-01T10:00:00",
            "processedAt": null,
            "aiConfidence": 0.91,
            "status": "pending",
            "totalPayout": 28000
        }"#;
        let claim: Claim = serde_json::from_str(json).unwrap();
        assert_eq!(claim.claim_number, "CLM-20240301-AB12");
        assert_eq!(claim.status, ClaimStatus::Pending);
        assert!(claim.processed_at.is_none());
        assert!(claim.analysis_result.is_none());
    }

    #[test]
    fn test_error_body_message() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"detail":"Analysis not found"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Analysis not found"));

        let body: ApiErrorBody =
            serde_json::from_str(r#"{"code":"E1","message":"Claim exists"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Claim exists"));

        assert!(ApiErrorBody::default().into_message().is_none());
    }
}
