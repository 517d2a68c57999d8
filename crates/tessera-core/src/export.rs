//! # Export Transformer
//!
//! Turns taxonomy entities into MISP-shaped events.
//!
//! ## Pipeline
//!
//! 1. Sanitize the event codes (never an error, always a safe default)
//! 2. Ask every entity for its export object, skipping the ones that decline
//! 3. Either return the event as-is (preview) or hand it to an
//!    `EventSubmitter` and annotate the receipt with a browsable URL
//!
//! The core stays synchronous and network-free: submission goes through the
//! `EventSubmitter` trait, implemented by the application.

use crate::basket::ExportBasket;
use crate::context::Context;
use crate::investigation::Investigation;
use crate::objects::{AilObject, get_objects};
use crate::primitives::{
    DEFAULT_EVENT_INFO, DEFAULT_THREAT_LEVEL, MAX_ANALYSIS, MAX_DISTRIBUTION, MIN_THREAT_LEVEL,
};
use crate::TesseraError;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// SANITIZATION
// =============================================================================

/// A caller-supplied event code, before sanitization.
///
/// Only `Int` can ever be accepted. Text, even numeric text, is invalid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCode {
    Int(i64),
    Text(String),
    Missing,
    Other(serde_json::Value),
}

impl From<i64> for RawCode {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for RawCode {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Option<i64>> for RawCode {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Missing, Self::Int)
    }
}

fn sanitize_code(raw: RawCode, min: i64, max: i64, default: i64) -> u8 {
    let value = match raw {
        RawCode::Int(n) if (min..=max).contains(&n) => n,
        _ => default,
    };
    // Bounds are all within 0..=4.
    value as u8
}

/// Sharing scope: `0..=3`, anything else becomes `0`.
pub fn sanitize_distribution(raw: impl Into<RawCode>) -> u8 {
    sanitize_code(raw.into(), 0, MAX_DISTRIBUTION, 0)
}

/// Severity: `1..=4`, anything else becomes `4` (undefined).
pub fn sanitize_threat_level(raw: impl Into<RawCode>) -> u8 {
    sanitize_code(
        raw.into(),
        MIN_THREAT_LEVEL,
        DEFAULT_THREAT_LEVEL,
        DEFAULT_THREAT_LEVEL,
    )
}

/// Analysis maturity: `0..=2`, anything else becomes `0`.
pub fn sanitize_analysis(raw: impl Into<RawCode>) -> u8 {
    sanitize_code(raw.into(), 0, MAX_ANALYSIS, 0)
}

// =============================================================================
// EXCHANGE STRUCTURES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTag {
    pub name: String,
}

/// One typed value inside an export object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportAttribute {
    pub uuid: String,
    pub object_relation: String,
    #[serde(rename = "type")]
    pub attr_type: String,
    pub value: String,
    #[serde(rename = "Tag", default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<ExportTag>,
}

impl ExportAttribute {
    pub fn add_tag(&mut self, name: &str) {
        self.tags.push(ExportTag {
            name: name.to_string(),
        });
    }
}

/// One entity's exchange representation (a MISP object).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportObject {
    pub uuid: String,
    /// Object template name (`telegram-account`, `domain-ip`, ...).
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    #[serde(rename = "Attribute", default)]
    pub attributes: Vec<ExportAttribute>,
}

impl ExportObject {
    /// Empty object of template `name` with a fresh identifier.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            name: name.to_string(),
            first_seen: None,
            last_seen: None,
            attributes: Vec::new(),
        }
    }

    pub fn add_attribute(&mut self, relation: &str, attr_type: &str, value: &str) -> &mut ExportAttribute {
        self.attributes.push(ExportAttribute {
            uuid: Uuid::new_v4().to_string(),
            object_relation: relation.to_string(),
            attr_type: attr_type.to_string(),
            value: value.to_string(),
            tags: Vec::new(),
        });
        let last = self.attributes.len() - 1;
        &mut self.attributes[last]
    }

    pub fn set_first_seen(&mut self, epoch: i64) {
        self.first_seen = epoch_to_rfc3339(epoch);
    }

    pub fn set_last_seen(&mut self, epoch: i64) {
        self.last_seen = epoch_to_rfc3339(epoch);
    }
}

fn epoch_to_rfc3339(epoch: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(epoch, 0).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// A complete exchange event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEvent {
    pub uuid: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub info: String,
    pub published: bool,
    pub distribution: u8,
    pub threat_level_id: u8,
    pub analysis: u8,
    #[serde(rename = "Tag", default)]
    pub tags: Vec<ExportTag>,
    #[serde(rename = "Object", default)]
    pub objects: Vec<ExportObject>,
}

impl ExportEvent {
    /// The wire document: `{"Event": {...}}`.
    pub fn to_document(&self) -> Result<serde_json::Value, TesseraError> {
        let event =
            serde_json::to_value(self).map_err(|e| TesseraError::Serialization(e.to_string()))?;
        Ok(serde_json::json!({ "Event": event }))
    }
}

// =============================================================================
// REQUEST & OUTCOME
// =============================================================================

/// Caller-controlled event fields. Every call builds its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventRequest {
    pub event_uuid: Option<String>,
    pub date: Option<NaiveDate>,
    pub publish: bool,
    pub info: Option<String>,
    pub tags: Vec<String>,
    pub analysis: RawCode,
    pub distribution: RawCode,
    pub threat_level: RawCode,
}

impl Default for EventRequest {
    fn default() -> Self {
        Self {
            event_uuid: None,
            date: None,
            publish: false,
            info: None,
            tags: Vec::new(),
            analysis: RawCode::Int(0),
            distribution: RawCode::Int(0),
            threat_level: RawCode::Int(DEFAULT_THREAT_LEVEL),
        }
    }
}

/// What the remote instance answered to a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    /// Server-assigned event uuid.
    pub uuid: String,
    /// The raw response envelope.
    pub response: serde_json::Value,
}

/// A submitted event, annotated with its browsable URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmittedEvent {
    pub uuid: String,
    pub url: String,
    pub response: serde_json::Value,
}

/// Result of `Exporter::export`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportOutcome {
    /// Dry run: the event itself, nothing left the process.
    Preview(ExportEvent),
    /// The event was accepted by the remote instance.
    Submitted(SubmittedEvent),
}

/// Boundary to the remote exchange instance.
///
/// Synchronous with no timeout or retry; errors must be returned, not
/// swallowed.
pub trait EventSubmitter: Send + Sync {
    /// Base URL of the instance, without trailing `/`.
    fn base_url(&self) -> &str;

    fn submit(&self, event: &ExportEvent) -> Result<SubmissionReceipt, TesseraError>;
}

// =============================================================================
// EXPORTER
// =============================================================================

/// Builds events and optionally submits them.
pub struct Exporter<'a> {
    ctx: &'a Context,
    submitter: Option<&'a dyn EventSubmitter>,
}

impl<'a> Exporter<'a> {
    /// Exporter limited to previews.
    pub fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            submitter: None,
        }
    }

    #[must_use]
    pub fn with_submitter(mut self, submitter: &'a dyn EventSubmitter) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Assemble an event from `objects`, in input order.
    ///
    /// Entities that decline export are skipped.
    pub fn build_event(
        &self,
        objects: &[Box<dyn AilObject>],
        request: &EventRequest,
    ) -> Result<ExportEvent, TesseraError> {
        let uuid = request
            .event_uuid
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let date = request.date.unwrap_or_else(|| Utc::now().date_naive());
        let info = request
            .info
            .clone()
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT_INFO.to_string());

        let mut exported = Vec::with_capacity(objects.len());
        for object in objects {
            match object.to_export_object(self.ctx)? {
                Some(export) => exported.push(export),
                None => tracing::debug!(gid = %object.global_id(), "object declined export"),
            }
        }

        Ok(ExportEvent {
            uuid,
            date: date.format("%Y-%m-%d").to_string(),
            info,
            published: request.publish,
            distribution: sanitize_distribution(request.distribution.clone()),
            threat_level_id: sanitize_threat_level(request.threat_level.clone()),
            analysis: sanitize_analysis(request.analysis.clone()),
            tags: request
                .tags
                .iter()
                .map(|name| ExportTag { name: name.clone() })
                .collect(),
            objects: exported,
        })
    }

    /// Build the event, then preview it or submit it.
    pub fn export(
        &self,
        objects: &[Box<dyn AilObject>],
        request: &EventRequest,
        submit: bool,
    ) -> Result<ExportOutcome, TesseraError> {
        let event = self.build_event(objects, request)?;
        if !submit {
            return Ok(ExportOutcome::Preview(event));
        }
        self.submit(&event).map(ExportOutcome::Submitted)
    }

    /// Export `actor`'s resolved basket.
    ///
    /// A successful submission unstages the entries it covered. A preview or
    /// a failed submission leaves the basket untouched.
    pub fn export_basket(
        &self,
        actor: &str,
        request: &EventRequest,
        submit: bool,
    ) -> Result<ExportOutcome, TesseraError> {
        let basket = ExportBasket::new(self.ctx.store());
        let staged = basket.list(actor)?;
        let objects = get_objects(&basket.expand(actor, &staged)?)?;

        let outcome = self.export(&objects, request, submit)?;
        if matches!(outcome, ExportOutcome::Submitted(_)) {
            basket.remove_exported(actor, &staged)?;
        }
        Ok(outcome)
    }

    fn submit(&self, event: &ExportEvent) -> Result<SubmittedEvent, TesseraError> {
        let submitter = self.submitter.ok_or(TesseraError::SubmitterUnavailable)?;
        let receipt = submitter.submit(event)?;
        let url = format!("{}/events/view/{}", submitter.base_url(), receipt.uuid);
        tracing::info!(uuid = %receipt.uuid, objects = event.objects.len(), %url, "event submitted");
        Ok(SubmittedEvent {
            uuid: receipt.uuid,
            url,
            response: receipt.response,
        })
    }

    /// Submit an investigation's declared objects and record the URL on it.
    pub fn export_investigation(&self, investigation_uuid: &str) -> Result<String, TesseraError> {
        let investigation = Investigation::open(self.ctx, investigation_uuid)?;
        let objects = get_objects(&investigation.get_objects(self.ctx)?)?;
        let request = EventRequest {
            date: investigation.get_date(self.ctx)?,
            info: investigation.get_info(self.ctx)?,
            tags: investigation.get_tags(self.ctx)?.into_iter().collect(),
            analysis: investigation.get_analysis(self.ctx)?.into(),
            distribution: RawCode::Int(0),
            threat_level: investigation.get_threat_level(self.ctx)?.into(),
            ..EventRequest::default()
        };

        let event = self.build_event(&objects, &request)?;
        let submitted = self.submit(&event)?;
        investigation.add_misp_event(self.ctx, &submitted.url)?;
        Ok(submitted.url)
    }
}

// =============================================================================
// TESTS
// =============================================================================
