//! Warning entity and issue command.
//!
//! # Data Flow
//! ```text
//! Inbound issue frame
//!     → IssueCommand (option-typed, nothing trusted yet)
//!     → into_warning() (validate, derive expires_at)
//!     → Warning (persisted, broadcast)
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::RelayError;

/// Validity window bounds, in minutes.
pub const MIN_DURATION_MINUTES: i64 = 1;
pub const MAX_DURATION_MINUTES: i64 = 1440;

/// Warning geometry: rings of (latitude, longitude) pairs.
///
/// Opaque to the engine beyond shape validation; passed through to
/// subscribers and query clients in structured form.
pub type Polygon = Vec<Vec<[f64; 2]>>;

/// A time-bounded geospatial alert.
///
/// One row per `id`; re-issuing the same id replaces the prior row and
/// starts a new activation episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    /// Unique identifier, stable across reissues.
    pub id: String,

    /// Category label, free-form (e.g. "TOR", "SVR").
    #[serde(rename = "type")]
    pub kind: String,

    /// Validity polygon.
    pub polygon: Polygon,

    /// Caller-supplied moment of issuance.
    pub issued_at: DateTime<Utc>,

    /// Caller-supplied validity window in minutes.
    pub duration_minutes: i64,

    /// Derived: `issued_at + duration_minutes`. Never independently
    /// supplied.
    pub expires_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub possible_tag: Option<String>,

    /// True until expired by timer or manual command.
    pub active: bool,

    /// Server-assigned at first persistence of this id.
    pub created_at: DateTime<Utc>,
}

/// Raw issue command as received from a transport.
///
/// Every field is optional so that missing-field rejection is a
/// validation concern, not a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueCommand {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub polygon: Option<Polygon>,
    pub issued_at: Option<String>,
    pub duration_minutes: Option<i64>,
    pub wind: Option<String>,
    pub hail: Option<String>,
    pub threat: Option<String>,
    pub author: Option<String>,
    pub info: Option<String>,
    pub possible_tag: Option<String>,
}

impl IssueCommand {
    /// Validate the command and build the warning it describes.
    ///
    /// `created_at` is the server-assigned timestamp for a first
    /// persistence; the store preserves an earlier one on replacement.
    pub fn into_warning(self, created_at: DateTime<Utc>) -> Result<Warning, RelayError> {
        let id = require(self.id, "id")?;
        let kind = require(self.kind, "type")?;
        let polygon = require(self.polygon, "polygon")?;
        let issued_at_raw = require(self.issued_at, "issuedAt")?;
        let duration_minutes = require(self.duration_minutes, "durationMinutes")?;

        if polygon.is_empty() || polygon.iter().any(|ring| ring.is_empty()) {
            return Err(RelayError::Validation(
                "polygon must be a non-empty sequence of non-empty rings".into(),
            ));
        }

        let issued_at = DateTime::parse_from_rfc3339(&issued_at_raw)
            .map_err(|e| {
                RelayError::Validation(format!("issuedAt is not an ISO-8601 timestamp: {e}"))
            })?
            .with_timezone(&Utc);

        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
            return Err(RelayError::Validation(format!(
                "durationMinutes must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES}, got {duration_minutes}"
            )));
        }

        let expires_at = issued_at + Duration::minutes(duration_minutes);

        Ok(Warning {
            id,
            kind,
            polygon,
            issued_at,
            duration_minutes,
            expires_at,
            wind: self.wind,
            hail: self.hail,
            threat: self.threat,
            author: self.author,
            info: self.info,
            possible_tag: self.possible_tag,
            active: true,
            created_at,
        })
    }
}

fn require<T>(field: Option<T>, name: &str) -> Result<T, RelayError> {
    field.ok_or_else(|| RelayError::Validation(format!("missing required field: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_command() -> IssueCommand {
        IssueCommand {
            id: Some("W1".into()),
            kind: Some("TOR".into()),
            polygon: Some(vec![vec![[40.0, -90.0], [40.1, -90.0], [40.1, -90.1]]]),
            issued_at: Some("2024-05-01T12:00:00.000Z".into()),
            duration_minutes: Some(30),
            ..IssueCommand::default()
        }
    }

    #[test]
    fn expires_at_is_issued_at_plus_duration() {
        let warning = valid_command().into_warning(Utc::now()).unwrap();
        assert_eq!(
            warning.expires_at,
            "2024-05-01T12:30:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert!(warning.active);
    }

    #[test]
    fn missing_fields_are_rejected() {
        for strip in ["id", "type", "polygon", "issuedAt", "durationMinutes"] {
            let mut cmd = valid_command();
            match strip {
                "id" => cmd.id = None,
                "type" => cmd.kind = None,
                "polygon" => cmd.polygon = None,
                "issuedAt" => cmd.issued_at = None,
                _ => cmd.duration_minutes = None,
            }
            let err = cmd.into_warning(Utc::now()).unwrap_err();
            match err {
                RelayError::Validation(msg) => assert!(msg.contains(strip), "{msg}"),
                other => panic!("expected validation error, got {other}"),
            }
        }
    }

    #[test]
    fn empty_polygon_is_rejected() {
        let mut cmd = valid_command();
        cmd.polygon = Some(vec![]);
        assert!(matches!(
            cmd.into_warning(Utc::now()),
            Err(RelayError::Validation(_))
        ));

        let mut cmd = valid_command();
        cmd.polygon = Some(vec![vec![]]);
        assert!(matches!(
            cmd.into_warning(Utc::now()),
            Err(RelayError::Validation(_))
        ));
    }

    #[test]
    fn unparsable_timestamp_is_rejected() {
        let mut cmd = valid_command();
        cmd.issued_at = Some("May 1st, noonish".into());
        assert!(matches!(
            cmd.into_warning(Utc::now()),
            Err(RelayError::Validation(_))
        ));
    }

    #[test]
    fn duration_bounds_are_enforced() {
        for bad in [0, -5, 1441] {
            let mut cmd = valid_command();
            cmd.duration_minutes = Some(bad);
            assert!(
                matches!(cmd.into_warning(Utc::now()), Err(RelayError::Validation(_))),
                "duration {bad} should be rejected"
            );
        }
        for good in [1, 1440] {
            let mut cmd = valid_command();
            cmd.duration_minutes = Some(good);
            assert!(cmd.into_warning(Utc::now()).is_ok());
        }
    }

    #[test]
    fn wire_names_are_camel_case() {
        let warning = valid_command().into_warning(Utc::now()).unwrap();
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["type"], "TOR");
        assert!(json.get("issuedAt").is_some());
        assert!(json.get("durationMinutes").is_some());
        assert!(json.get("expiresAt").is_some());
        assert!(json.get("createdAt").is_some());
        // Unset metadata is omitted, not null.
        assert!(json.get("wind").is_none());
    }

    #[test]
    fn offset_timestamps_normalize_to_utc() {
        let mut cmd = valid_command();
        cmd.issued_at = Some("2024-05-01T07:00:00-05:00".into());
        let warning = cmd.into_warning(Utc::now()).unwrap();
        assert_eq!(
            warning.issued_at,
            "2024-05-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }
}
