//! # Investigations
//!
//! A named, analyst-curated set of entities plus the event fields used when
//! the set is exported. Only the declared objects are exported; nothing is
//! reached through correlations.
//!
//! Each export's URL is appended to the investigation's own history.

use crate::context::Context;
use crate::primitives::INVESTIGATION_PREFIX;
use crate::{GlobalId, TesseraError};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fields supplied when opening a new investigation.
#[derive(Debug, Clone, Default)]
pub struct NewInvestigation {
    pub info: String,
    pub date: Option<NaiveDate>,
    pub threat_level: Option<i64>,
    pub analysis: Option<i64>,
    pub tags: Vec<String>,
}

/// Read-only snapshot of an investigation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestigationSummary {
    pub uuid: String,
    pub info: Option<String>,
    pub date: Option<NaiveDate>,
    pub threat_level: Option<i64>,
    pub analysis: Option<i64>,
    pub tags: BTreeSet<String>,
    pub objects: Vec<GlobalId>,
    pub misp_events: BTreeSet<String>,
}

/// Handle on one stored investigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Investigation {
    uuid: String,
}

impl Investigation {
    /// Persist a new investigation and return its handle.
    pub fn create(ctx: &Context, fields: NewInvestigation) -> Result<Self, TesseraError> {
        let investigation = Self {
            uuid: Uuid::new_v4().to_string(),
        };
        let store = ctx.store();
        let key = investigation.key();

        store.hset(&key, "info", &fields.info)?;
        if let Some(date) = fields.date {
            store.hset(&key, "date", &date.format(DATE_FORMAT).to_string())?;
        }
        if let Some(level) = fields.threat_level {
            store.hset(&key, "threat_level", &level.to_string())?;
        }
        if let Some(analysis) = fields.analysis {
            store.hset(&key, "analysis", &analysis.to_string())?;
        }
        for tag in &fields.tags {
            store.sadd(&investigation.tags_key(), tag)?;
        }
        tracing::info!(uuid = %investigation.uuid, "investigation created");
        Ok(investigation)
    }

    /// Open an existing investigation.
    pub fn open(ctx: &Context, uuid: &str) -> Result<Self, TesseraError> {
        let investigation = Self {
            uuid: uuid.to_string(),
        };
        if !ctx.store().exists(&investigation.key())? {
            return Err(TesseraError::InvestigationNotFound(uuid.to_string()));
        }
        Ok(investigation)
    }

    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    fn key(&self) -> String {
        format!("{INVESTIGATION_PREFIX}:{}", self.uuid)
    }

    fn tags_key(&self) -> String {
        format!("{INVESTIGATION_PREFIX}:tags:{}", self.uuid)
    }

    fn objects_key(&self) -> String {
        format!("{INVESTIGATION_PREFIX}:objs:{}", self.uuid)
    }

    fn misp_key(&self) -> String {
        format!("{INVESTIGATION_PREFIX}:misp:{}", self.uuid)
    }

    fn get_int(&self, ctx: &Context, field: &str) -> Result<Option<i64>, TesseraError> {
        Ok(ctx
            .store()
            .hget(&self.key(), field)?
            .and_then(|raw| raw.parse().ok()))
    }

    pub fn get_info(&self, ctx: &Context) -> Result<Option<String>, TesseraError> {
        Ok(ctx.store().hget(&self.key(), "info")?.filter(|i| !i.is_empty()))
    }

    pub fn get_date(&self, ctx: &Context) -> Result<Option<NaiveDate>, TesseraError> {
        Ok(ctx
            .store()
            .hget(&self.key(), "date")?
            .and_then(|raw| NaiveDate::parse_from_str(&raw, DATE_FORMAT).ok()))
    }

    /// Stored threat level; unparseable values read as unknown.
    pub fn get_threat_level(&self, ctx: &Context) -> Result<Option<i64>, TesseraError> {
        self.get_int(ctx, "threat_level")
    }

    pub fn get_analysis(&self, ctx: &Context) -> Result<Option<i64>, TesseraError> {
        self.get_int(ctx, "analysis")
    }

    pub fn get_tags(&self, ctx: &Context) -> Result<BTreeSet<String>, TesseraError> {
        ctx.store().smembers(&self.tags_key())
    }

    pub fn add_tag(&self, ctx: &Context, tag: &str) -> Result<bool, TesseraError> {
        ctx.store().sadd(&self.tags_key(), tag)
    }

    /// Declare `gid` part of the investigation.
    pub fn add_object(&self, ctx: &Context, gid: &GlobalId) -> Result<bool, TesseraError> {
        ctx.store().sadd(&self.objects_key(), &gid.to_string())
    }

    pub fn remove_object(&self, ctx: &Context, gid: &GlobalId) -> Result<bool, TesseraError> {
        ctx.store().srem(&self.objects_key(), &gid.to_string())
    }

    /// Declared objects, sorted by global id.
    pub fn get_objects(&self, ctx: &Context) -> Result<Vec<GlobalId>, TesseraError> {
        ctx.store()
            .smembers(&self.objects_key())?
            .iter()
            .map(|raw| GlobalId::parse(raw))
            .collect()
    }

    /// Record the URL of an event produced from this investigation.
    pub fn add_misp_event(&self, ctx: &Context, url: &str) -> Result<(), TesseraError> {
        ctx.store().sadd(&self.misp_key(), url)?;
        Ok(())
    }

    pub fn get_misp_events(&self, ctx: &Context) -> Result<BTreeSet<String>, TesseraError> {
        ctx.store().smembers(&self.misp_key())
    }

    pub fn summary(&self, ctx: &Context) -> Result<InvestigationSummary, TesseraError> {
        Ok(InvestigationSummary {
            uuid: self.uuid.clone(),
            info: self.get_info(ctx)?,
            date: self.get_date(ctx)?,
            threat_level: self.get_threat_level(ctx)?,
            analysis: self.get_analysis(ctx)?,
            tags: self.get_tags(ctx)?,
            objects: self.get_objects(ctx)?,
            misp_events: self.get_misp_events(ctx)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CoreSettings;

    fn ctx() -> Context {
        Context::in_memory(CoreSettings::default())
    }

    #[test]
    fn create_and_reopen() {
        let ctx = ctx();
        let created = Investigation::create(
            &ctx,
            NewInvestigation {
                info: "phishing wave".to_string(),
                date: NaiveDate::from_ymd_opt(2023, 11, 2),
                threat_level: Some(2),
                analysis: Some(1),
                tags: vec!["tlp:amber".to_string()],
            },
        )
        .expect("create");

        let opened = Investigation::open(&ctx, created.uuid()).expect("open");
        let summary = opened.summary(&ctx).expect("summary");
        assert_eq!(summary.info.as_deref(), Some("phishing wave"));
        assert_eq!(summary.date, NaiveDate::from_ymd_opt(2023, 11, 2));
        assert_eq!(summary.threat_level, Some(2));
        assert_eq!(summary.analysis, Some(1));
        assert!(summary.tags.contains("tlp:amber"));
    }

    #[test]
    fn open_unknown_is_not_found() {
        let ctx = ctx();
        assert!(matches!(
            Investigation::open(&ctx, "missing"),
            Err(TesseraError::InvestigationNotFound(_))
        ));
    }

    #[test]
    fn objects_and_events() {
        let ctx = ctx();
        let inv = Investigation::create(&ctx, NewInvestigation::default()).expect("create");
        let gid = GlobalId::new("cve", "", "CVE-2015-0410").expect("gid");

        assert!(inv.add_object(&ctx, &gid).expect("add"));
        assert!(!inv.add_object(&ctx, &gid).expect("add"));
        inv.add_misp_event(&ctx, "https://misp.example/events/view/x")
            .expect("event");

        assert_eq!(inv.get_objects(&ctx).expect("objects"), vec![gid.clone()]);
        assert_eq!(inv.get_misp_events(&ctx).expect("events").len(), 1);
        assert!(inv.remove_object(&ctx, &gid).expect("remove"));
        assert!(inv.get_info(&ctx).expect("info").is_none());
    }
}
