//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Anything that talks to MISP runs on the blocking pool: the client is
//! synchronous and must never block the async runtime.

use super::{BasketCommand, InvestigationCommand, MispCommand, ObjectCommand, TimelineCommand};
use crate::api;
use crate::config::Settings;
use crate::misp::MispClient;
use serde::Serialize;
use std::collections::BTreeMap;
use tessera_core::{
    CorrelationIndex, EventRequest, ExportBasket, ExportOutcome, Exporter, GlobalId,
    Investigation, MetaOptions, NewInvestigation, ObjectType, TesseraError, Timeline, get_object,
    get_objects, objects::get_all,
};

/// Print `value` as pretty JSON.
fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

fn parse_gid(raw: &str) -> Result<GlobalId, TesseraError> {
    GlobalId::parse(raw).map_err(|_| TesseraError::InvalidIdentifier(raw.to_string()))
}

/// Run `job` on the blocking pool.
async fn blocking<T, F>(job: F) -> Result<T, TesseraError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TesseraError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| TesseraError::Io(format!("Background task failed: {}", e)))?
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(settings: &Settings, host: &str, port: u16) -> Result<(), TesseraError> {
    let ctx = settings.open_context()?;

    println!("Tessera Object Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {:?}", settings.store.backend);
    println!("  Database: {:?}", settings.store.path);
    println!();
    println!("Endpoints:");
    println!("  GET    /object               - Object meta");
    println!("  GET    /object/correlations  - Object correlations");
    println!("  GET    /basket/{{actor}}       - List export basket");
    println!("  POST   /basket/{{actor}}       - Stage an object");
    println!("  DELETE /basket/{{actor}}       - Clear export basket");
    println!("  DELETE /basket/{{actor}}/entry - Unstage an object");
    println!("  POST   /export/preview       - Preview an event");
    println!("  GET    /health               - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, ctx, &settings.api).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Count registered objects per type.
pub fn cmd_status(settings: &Settings, json_mode: bool) -> Result<(), TesseraError> {
    let ctx = settings.open_context()?;

    let mut counts = BTreeMap::new();
    for kind in ObjectType::ALL {
        let total: usize = get_all(&ctx, kind)?.values().map(|ids| ids.len()).sum();
        counts.insert(kind.as_str(), total);
    }

    if json_mode {
        print_json(&serde_json::json!({
            "database": settings.store.path.to_string_lossy(),
            "backend": settings.store.backend,
            "misp_configured": settings.misp.is_configured(),
            "objects": counts,
        }));
        return Ok(());
    }

    println!("Tessera Store Status");
    println!("====================");
    println!("Database: {:?}", settings.store.path);
    println!("Backend:  {:?}", settings.store.backend);
    println!(
        "MISP:     {}",
        settings.misp.url.as_deref().unwrap_or("not configured")
    );
    println!();
    for (kind, total) in counts {
        println!("{:<16} {}", kind, total);
    }
    Ok(())
}

// =============================================================================
// OBJECT COMMANDS
// =============================================================================

pub fn cmd_object(
    settings: &Settings,
    command: ObjectCommand,
    json_mode: bool,
) -> Result<(), TesseraError> {
    let ctx = settings.open_context()?;

    match command {
        ObjectCommand::Show { gid, options } => {
            let object = get_object(&parse_gid(&gid)?)?;
            let options = options
                .as_deref()
                .map(MetaOptions::parse_list)
                .unwrap_or_else(MetaOptions::none);
            let meta = object.get_meta(&ctx, &options)?;
            if json_mode {
                print_json(&meta);
            } else {
                println!("{}", object.global_id());
                println!("  exists:     {}", object.exists(&ctx)?);
                println!("  first_seen: {:?}", meta.first_seen);
                println!("  last_seen:  {:?}", meta.last_seen);
                for (field, value) in &meta.extra {
                    println!(
                        "  {}: {}",
                        field,
                        serde_json::to_string(value).unwrap_or_default()
                    );
                }
            }
        }
        ObjectCommand::Tag { gid, tag } => {
            let object = get_object(&parse_gid(&gid)?)?;
            let added = object.add_tag(&ctx, &tag)?;
            println!("{} {}", if added { "Tagged" } else { "Already tagged" }, gid);
        }
        ObjectCommand::Untag { gid, tag } => {
            let object = get_object(&parse_gid(&gid)?)?;
            let removed = object.remove_tag(&ctx, &tag)?;
            println!("{} {}", if removed { "Untagged" } else { "Not tagged" }, gid);
        }
        ObjectCommand::Seen { gid, timestamp } => {
            let object = get_object(&parse_gid(&gid)?)?;
            object.update_seen(&ctx, timestamp)?;
            println!(
                "{}: first_seen={:?} last_seen={:?}",
                gid,
                object.get_first_seen(&ctx)?,
                object.get_last_seen(&ctx)?
            );
        }
        ObjectCommand::Correlate { gid, other } => {
            let object = get_object(&parse_gid(&gid)?)?;
            let other = get_object(&parse_gid(&other)?)?;
            object.add_correlation(&ctx, other.global_id())?;
            println!("Correlated {} <-> {}", object.global_id(), other.global_id());
        }
        ObjectCommand::Correlations { gid } => {
            let gid = parse_gid(&gid)?;
            let edges = CorrelationIndex::new(ctx.store()).get_all_edges(&gid)?;
            let grouped: BTreeMap<String, Vec<String>> = edges
                .into_iter()
                .map(|(ctype, gids)| {
                    (
                        ctype.as_str().to_string(),
                        gids.iter().map(ToString::to_string).collect(),
                    )
                })
                .collect();
            if json_mode {
                print_json(&grouped);
            } else {
                for (ctype, gids) in grouped {
                    println!("{}:", ctype);
                    for gid in gids {
                        println!("  {}", gid);
                    }
                }
            }
        }
        ObjectCommand::Delete { gid } => {
            let object = get_object(&parse_gid(&gid)?)?;
            object.delete(&ctx)?;
            tracing::info!(%gid, "object deleted");
            println!("Deleted {}", gid);
        }
    }
    Ok(())
}

// =============================================================================
// TIMELINE COMMANDS
// =============================================================================

pub fn cmd_timeline(
    settings: &Settings,
    command: TimelineCommand,
    json_mode: bool,
) -> Result<(), TesseraError> {
    let ctx = settings.open_context()?;

    match command {
        TimelineCommand::Add {
            gid,
            attribute,
            timestamp,
            value,
        } => {
            let object = get_object(&parse_gid(&gid)?)?;
            object.base().register(ctx.store())?;
            Timeline::new(ctx.store(), object.global_id(), &attribute)
                .add_timestamp(timestamp, &value)?;
            println!("{} {} @ {} = {}", gid, attribute, timestamp, value);
        }
        TimelineCommand::Show { gid, attribute } => {
            let gid = parse_gid(&gid)?;
            let entries = Timeline::new(ctx.store(), &gid, &attribute).get_entries()?;
            if json_mode {
                print_json(&entries);
            } else if entries.is_empty() {
                println!("No history for {} {}", gid, attribute);
            } else {
                for entry in entries {
                    println!("{:>12}  {}", entry.timestamp, entry.value);
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// BASKET COMMANDS
// =============================================================================

pub fn cmd_basket(
    settings: &Settings,
    command: BasketCommand,
    json_mode: bool,
) -> Result<(), TesseraError> {
    let ctx = settings.open_context()?;
    let basket = ExportBasket::new(ctx.store());

    match command {
        BasketCommand::List { actor } => {
            let entries = basket.list(&actor)?;
            if json_mode {
                print_json(&entries);
            } else if entries.is_empty() {
                println!("Basket of {} is empty", actor);
            } else {
                for entry in entries {
                    println!(
                        "{}:{}:{}  lvl={}",
                        entry.obj_type, entry.subtype, entry.id, entry.lvl
                    );
                }
            }
        }
        BasketCommand::Add {
            actor,
            obj_type,
            id,
            subtype,
            lvl,
        } => {
            let entry = match lvl {
                Some(lvl) => basket.add(&actor, &obj_type, subtype.as_deref(), &id, lvl.as_str())?,
                None => basket.add(&actor, &obj_type, subtype.as_deref(), &id, None::<i64>)?,
            };
            if json_mode {
                print_json(&entry);
            } else {
                println!("Staged {} (lvl {})", entry.global_id()?, entry.lvl);
            }
        }
        BasketCommand::Remove {
            actor,
            obj_type,
            id,
            subtype,
        } => {
            let removed = basket.remove(&actor, &obj_type, subtype.as_deref(), &id)?;
            println!("{}", if removed { "Removed" } else { "Not staged" });
        }
        BasketCommand::Clear { actor } => {
            basket.clear(&actor)?;
            println!("Cleared basket of {}", actor);
        }
        // Routed to cmd_export by the dispatcher.
        BasketCommand::Export { .. } => {}
    }
    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Where the exported objects come from.
#[derive(Debug, Clone)]
pub enum ExportSource {
    /// Explicit global ids, in order.
    Objects(Vec<String>),
    /// An actor's resolved basket.
    Basket(String),
}

/// Preview or submit an event.
pub async fn cmd_export(
    settings: &Settings,
    source: ExportSource,
    request: EventRequest,
    submit: bool,
    json_mode: bool,
) -> Result<(), TesseraError> {
    let ctx = settings.open_context()?;
    let misp = settings.misp.clone();

    let outcome = blocking(move || {
        let client = if submit {
            MispClient::from_settings(&misp)?
        } else {
            None
        };

        let mut exporter = Exporter::new(&ctx);
        if let Some(client) = client.as_ref() {
            exporter = exporter.with_submitter(client);
        }
        match source {
            ExportSource::Objects(raw) => {
                let gids = raw
                    .iter()
                    .map(|gid| parse_gid(gid))
                    .collect::<Result<Vec<_>, _>>()?;
                exporter.export(&get_objects(&gids)?, &request, submit)
            }
            // A successful submission unstages the exported entries.
            ExportSource::Basket(actor) => exporter.export_basket(&actor, &request, submit),
        }
    })
    .await?;

    match outcome {
        ExportOutcome::Preview(event) => {
            let document = event.to_document()?;
            print_json(&document);
        }
        ExportOutcome::Submitted(submitted) => {
            if json_mode {
                print_json(&submitted);
            } else {
                println!("Event submitted: {}", submitted.url);
            }
        }
    }
    Ok(())
}

// =============================================================================
// INVESTIGATION COMMANDS
// =============================================================================

pub async fn cmd_investigation(
    settings: &Settings,
    command: InvestigationCommand,
    json_mode: bool,
) -> Result<(), TesseraError> {
    let ctx = settings.open_context()?;

    match command {
        InvestigationCommand::Create {
            info,
            date,
            threat_level,
            analysis,
            tags,
        } => {
            let investigation = Investigation::create(
                &ctx,
                NewInvestigation {
                    info,
                    date,
                    threat_level,
                    analysis,
                    tags,
                },
            )?;
            println!("{}", investigation.uuid());
        }
        InvestigationCommand::AddObject { uuid, gid } => {
            let investigation = Investigation::open(&ctx, &uuid)?;
            let object = get_object(&parse_gid(&gid)?)?;
            investigation.add_object(&ctx, object.global_id())?;
            println!("Added {} to {}", gid, uuid);
        }
        InvestigationCommand::RemoveObject { uuid, gid } => {
            let investigation = Investigation::open(&ctx, &uuid)?;
            let removed = investigation.remove_object(&ctx, &parse_gid(&gid)?)?;
            println!("{}", if removed { "Removed" } else { "Not declared" });
        }
        InvestigationCommand::Show { uuid } => {
            let summary = Investigation::open(&ctx, &uuid)?.summary(&ctx)?;
            if json_mode {
                print_json(&summary);
            } else {
                println!("Investigation {}", summary.uuid);
                println!("  info:    {}", summary.info.as_deref().unwrap_or("-"));
                println!("  objects: {}", summary.objects.len());
                for gid in &summary.objects {
                    println!("    {}", gid);
                }
                for url in &summary.misp_events {
                    println!("  exported: {}", url);
                }
            }
        }
        InvestigationCommand::Export { uuid } => {
            let misp = settings.misp.clone();
            let url = blocking(move || {
                let client = MispClient::from_settings(&misp)?;
                let mut exporter = Exporter::new(&ctx);
                if let Some(client) = client.as_ref() {
                    exporter = exporter.with_submitter(client);
                }
                exporter.export_investigation(&uuid)
            })
            .await?;
            println!("Event submitted: {}", url);
        }
    }
    Ok(())
}

// =============================================================================
// MISP COMMANDS
// =============================================================================

pub async fn cmd_misp(
    settings: &Settings,
    command: MispCommand,
    json_mode: bool,
) -> Result<(), TesseraError> {
    let misp = settings.misp.clone();

    match command {
        MispCommand::Ping => {
            let version = blocking(move || {
                let client =
                    MispClient::from_settings(&misp)?.ok_or(TesseraError::SubmitterUnavailable)?;
                Ok(client.ping()?)
            })
            .await?;
            if json_mode {
                print_json(&version);
            } else {
                println!(
                    "MISP version: {}",
                    version
                        .get("version")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("unknown")
                );
            }
        }
        MispCommand::Uuid => {
            let uuid = blocking(move || {
                let client =
                    MispClient::from_settings(&misp)?.ok_or(TesseraError::SubmitterUnavailable)?;
                Ok(client.instance_uuid()?)
            })
            .await?;
            println!("{}", uuid.as_deref().unwrap_or("unknown"));
        }
    }
    Ok(())
}
