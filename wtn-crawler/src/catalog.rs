//! Catalog domain types
//!
//! Work items as the upstream catalog reports them ([`RawRecord`]) and the
//! status/day-tag vocabulary stored in the `webtoons` table.

use crate::error::DataShapeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// Catalog-assigned work item ID (never generated locally)
pub type TitleId = i64;

/// Publication status of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    Ongoing,
    Hiatus,
    Finished,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Ongoing => "ongoing",
            WorkStatus::Hiatus => "hiatus",
            WorkStatus::Finished => "finished",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ongoing" => Some(WorkStatus::Ongoing),
            "hiatus" => Some(WorkStatus::Hiatus),
            "finished" => Some(WorkStatus::Finished),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, WorkStatus::Finished)
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Day-of-week / category tag stored with each work item
///
/// For finished items the tag is historical: the last weekday the item was
/// listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayTag {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
    Daily,
    /// Never seen in a weekday listing
    #[serde(rename = "none")]
    Unassigned,
}

impl DayTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayTag::Mon => "mon",
            DayTag::Tue => "tue",
            DayTag::Wed => "wed",
            DayTag::Thu => "thu",
            DayTag::Fri => "fri",
            DayTag::Sat => "sat",
            DayTag::Sun => "sun",
            DayTag::Daily => "daily",
            DayTag::Unassigned => "none",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "mon" => Some(DayTag::Mon),
            "tue" => Some(DayTag::Tue),
            "wed" => Some(DayTag::Wed),
            "thu" => Some(DayTag::Thu),
            "fri" => Some(DayTag::Fri),
            "sat" => Some(DayTag::Sat),
            "sun" => Some(DayTag::Sun),
            "daily" => Some(DayTag::Daily),
            "none" => Some(DayTag::Unassigned),
            _ => None,
        }
    }
}

impl fmt::Display for DayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing element as it arrives on the wire; unknown fields are ignored
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRecord {
    title_id: TitleId,
    title_name: String,
    author: Option<String>,
    rest: Option<bool>,
}

/// One listing element as reported by either catalog endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub id: TitleId,
    pub title: String,
    pub author: Option<String>,
    /// Upstream "rest" flag: temporarily paused rather than actively updating
    pub resting: bool,
}

impl RawRecord {
    pub fn new(id: TitleId, title: impl Into<String>, author: Option<&str>, resting: bool) -> Self {
        Self {
            id,
            title: title.into(),
            author: author.map(str::to_string),
            resting,
        }
    }

    /// Decode one listing element
    ///
    /// Requires an integer `titleId` and a non-empty `titleName`. `author` is
    /// optional (blank counts as absent) and `rest` defaults to false.
    pub fn from_json(value: &Value, origin: &str) -> Result<Self, DataShapeError> {
        let shape_error = |reason: String| DataShapeError {
            origin: origin.to_string(),
            reason,
        };

        // derived struct impls also accept sequences
        if !value.is_object() {
            return Err(shape_error("element is not an object".to_string()));
        }
        let wire = WireRecord::deserialize(value).map_err(|e| shape_error(e.to_string()))?;

        let title = wire.title_name.trim();
        if title.is_empty() {
            return Err(shape_error(format!("titleId {}: empty titleName", wire.title_id)));
        }

        let author = wire
            .author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        Ok(Self {
            id: wire.title_id,
            title: title.to_string(),
            author,
            resting: wire.rest.unwrap_or(false),
        })
    }
}

/// Decode a listing, skipping (and logging) malformed elements
pub fn decode_records(values: &[Value], origin: &str) -> Vec<RawRecord> {
    values
        .iter()
        .filter_map(|value| match RawRecord::from_json(value, origin) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(origin, error = %e, "Skipping malformed record");
                None
            }
        })
        .collect()
}
