use std::cmp::Ordering;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, WatchTarget};
use crate::detector::{self, Classified};
use crate::exporter::Exporter;
use crate::extractor::Extractor;
use crate::fetcher::Fetch;
use crate::models::{
    AlertReason, AlertRecord, Candidate, Listing, ListingKind, ListingStatus, ListingValue,
};
use crate::notifier::{AlertPayload, Notify};
use crate::scorer::{self, ScoreConfig, Signal};
use crate::store::Store;
use crate::utils::error::{AppError, Result};

/// Everything one run needs, passed explicitly into each target's
/// processing. No ambient globals.
pub struct RunContext<'a> {
    pub store: &'a Store,
    pub fetcher: &'a dyn Fetch,
    pub notifier: &'a dyn Notify,
    pub config: &'a AppConfig,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub fetched: usize,
    pub extracted: usize,
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped_malformed: usize,
    pub alerted: usize,
    pub alert_suppressed: usize,
    pub notify_failed: usize,
    pub store_failed: usize,
    pub targets_skipped: usize,
}

struct PendingAlert {
    listing: Listing,
    signal: Signal,
    reason: AlertReason,
}

/// One full run: every configured target in order, then the export. A
/// failing target is skipped, never fatal to the others.
pub async fn run(ctx: &RunContext<'_>) -> Result<RunSummary> {
    let reference = load_reference(ctx.config)?;
    let score_config = ScoreConfig {
        threshold: ctx.config.tracker.threshold.abs(),
        skills: ctx.config.tracker.skills.clone(),
        skill_bonus: ctx.config.tracker.skill_bonus,
    };
    let extractor = Extractor::new();
    let mut summary = RunSummary::default();

    for target in &ctx.config.targets {
        match process_target(
            ctx,
            &extractor,
            target,
            reference.as_deref(),
            &score_config,
            &mut summary,
        )
        .await
        {
            Ok(()) => {}
            Err(e) => {
                warn!(target = %target.name, error = %e, "target skipped for this run");
                summary.targets_skipped += 1;
            }
        }
    }

    let listings = ctx.store.all_listings().await?;
    let exporter = Exporter::new(&ctx.config.export.path);
    let exported = exporter.write_snapshot(&listings)?;
    info!(exported, path = %exporter.path().display(), "snapshot exported");

    Ok(summary)
}

fn load_reference(config: &AppConfig) -> Result<Option<String>> {
    match &config.tracker.reference_path {
        Some(path) => Ok(Some(std::fs::read_to_string(path)?)),
        None => Ok(None),
    }
}

async fn process_target(
    ctx: &RunContext<'_>,
    extractor: &Extractor,
    target: &WatchTarget,
    reference: Option<&str>,
    score_config: &ScoreConfig,
    summary: &mut RunSummary,
) -> Result<()> {
    let page = ctx.fetcher.fetch(target).await?;
    summary.fetched += 1;

    let extraction = extractor.extract(&page.html, target);
    summary.extracted += extraction.candidates.len();
    summary.skipped_malformed += extraction.skipped;
    debug!(
        target = %target.name,
        candidates = extraction.candidates.len(),
        skipped = extraction.skipped,
        items_on_page = page.item_count,
        "extraction finished"
    );

    let collapsed = detector::collapse(extraction.candidates);
    let outcome = detector::classify(ctx.store, collapsed).await?;
    summary.skipped_malformed += outcome.dropped;

    let mut pending = Vec::new();

    for item in outcome.items {
        if let Err(e) = apply(ctx, item, reference, score_config, summary, &mut pending).await {
            // The listing is lost for this run; the rest keep going.
            error!(target = %target.name, error = %e, "listing processing failed");
            summary.store_failed += 1;
        }
    }

    dispatch_alerts(ctx, pending, score_config, summary).await;
    Ok(())
}

async fn apply(
    ctx: &RunContext<'_>,
    item: Classified,
    reference: Option<&str>,
    score_config: &ScoreConfig,
    summary: &mut RunSummary,
    pending: &mut Vec<PendingAlert>,
) -> Result<()> {
    let now = Utc::now();
    match item {
        Classified::New { candidate } => {
            insert_new(ctx, candidate, reference, score_config, summary, pending).await
        }
        Classified::Updated {
            candidate,
            existing,
        } => {
            update_existing(
                ctx,
                candidate,
                existing,
                reference,
                score_config,
                summary,
                pending,
            )
            .await
        }
        Classified::Unchanged { existing, .. } => {
            summary.unchanged += 1;
            // `alerted` refers to the current value; once that value is
            // observed again the listing has been seen.
            let status = match existing.status {
                ListingStatus::Alerted | ListingStatus::Seen => ListingStatus::Seen,
                _ => ListingStatus::Unchanged,
            };
            ctx.store
                .touch(&existing.id, now, status)
                .await
                .map_err(|e| store_write_err(&existing.id, e))
        }
    }
}

async fn insert_new(
    ctx: &RunContext<'_>,
    candidate: Candidate,
    reference: Option<&str>,
    score_config: &ScoreConfig,
    summary: &mut RunSummary,
    pending: &mut Vec<PendingAlert>,
) -> Result<()> {
    let value = match candidate.value.clone() {
        Some(v) => v,
        None => return Ok(()), // the detector never emits these
    };
    let now = Utc::now();
    let listing = candidate.into_listing(&value, ListingStatus::New, now, now)?;

    ctx.store
        .upsert(&listing)
        .await
        .map_err(|e| store_write_err(&listing.id, e))?;
    ctx.store
        .append_history(&listing.id, &value, now)
        .await
        .map_err(|e| store_write_err(&listing.id, e))?;
    summary.new += 1;

    // A job's match signal exists on first sight; prices need a prior
    // observation before they can move.
    if listing.kind == ListingKind::Job {
        if let (Some(reference), Some(text)) = (reference, value.as_description()) {
            let signal = scorer::text_match(reference, text, score_config);
            if signal.alert_worthy {
                pending.push(PendingAlert {
                    listing,
                    signal,
                    reason: AlertReason::MatchScore,
                });
            }
        }
    }
    Ok(())
}

async fn update_existing(
    ctx: &RunContext<'_>,
    candidate: Candidate,
    existing: Listing,
    reference: Option<&str>,
    score_config: &ScoreConfig,
    summary: &mut RunSummary,
    pending: &mut Vec<PendingAlert>,
) -> Result<()> {
    let value = match candidate.value.clone() {
        Some(v) => v,
        None => return Ok(()),
    };
    let now = Utc::now();

    let mut status = ListingStatus::Updated;
    let mut alert: Option<(Signal, AlertReason)> = None;

    match (&value, existing.value().ok()) {
        (
            ListingValue::Price {
                amount: new_amount, ..
            },
            Some(ListingValue::Price {
                amount: old_amount, ..
            }),
        ) => match scorer::price_delta(old_amount, *new_amount, score_config) {
            Ok(signal) => {
                if signal.alert_worthy {
                    alert = Some((signal, AlertReason::PriceDrop));
                }
            }
            Err(AppError::DivideByZero) => {
                // A zero prior price carries no usable baseline; record the
                // observation as new.
                status = ListingStatus::New;
            }
            Err(e) => return Err(e),
        },
        (ListingValue::Description { text }, _) => {
            if let Some(reference) = reference {
                let signal = scorer::text_match(reference, text, score_config);
                if signal.alert_worthy {
                    alert = Some((signal, AlertReason::MatchScore));
                }
            }
        }
        _ => {}
    }

    let listing = candidate.into_listing(&value, status, existing.first_seen_at, now)?;
    ctx.store
        .upsert(&listing)
        .await
        .map_err(|e| store_write_err(&listing.id, e))?;
    ctx.store
        .append_history(&listing.id, &value, now)
        .await
        .map_err(|e| store_write_err(&listing.id, e))?;

    if status == ListingStatus::New {
        summary.new += 1;
    } else {
        summary.updated += 1;
    }

    if let Some((signal, reason)) = alert {
        pending.push(PendingAlert {
            listing,
            signal,
            reason,
        });
    }
    Ok(())
}

fn store_write_err(listing_id: &str, source: AppError) -> AppError {
    AppError::StoreWrite {
        listing_id: listing_id.to_string(),
        message: source.to_string(),
    }
}

/// Most significant alerts go out first; the per-run send cap bounds
/// webhook volume on noisy runs.
fn order_by_significance(pending: &mut [PendingAlert]) {
    pending.sort_by(|a, b| {
        b.signal
            .value
            .abs()
            .partial_cmp(&a.signal.value.abs())
            .unwrap_or(Ordering::Equal)
    });
}

async fn dispatch_alerts(
    ctx: &RunContext<'_>,
    mut pending: Vec<PendingAlert>,
    score_config: &ScoreConfig,
    summary: &mut RunSummary,
) {
    order_by_significance(&mut pending);

    let cap = ctx.config.notifications.max_alerts_per_run;
    if cap > 0 && pending.len() > cap {
        warn!(
            dropped = pending.len() - cap,
            cap, "alert volume capped for this run"
        );
        pending.truncate(cap);
    }

    for alert in pending {
        let already = match ctx
            .store
            .has_alerted(&alert.listing.id, alert.signal.value)
            .await
        {
            Ok(already) => already,
            Err(e) => {
                error!(id = %alert.listing.id, error = %e, "alert ledger lookup failed");
                summary.store_failed += 1;
                continue;
            }
        };
        if already {
            debug!(id = %alert.listing.id, signal = alert.signal.value, "alert suppressed");
            summary.alert_suppressed += 1;
            continue;
        }

        let now = Utc::now();
        let payload = AlertPayload {
            title: alert.listing.title.clone(),
            url: alert.listing.url.clone(),
            signal_value: alert.signal.value,
            reason: alert.reason,
            timestamp: now,
        };

        match ctx.notifier.send(&payload).await {
            Ok(()) => {
                summary.alerted += 1;
                info!(
                    id = %alert.listing.id,
                    title = %alert.listing.title,
                    signal = alert.signal.value,
                    "alert delivered"
                );
                let record = AlertRecord::new(
                    alert.listing.id.clone(),
                    alert.signal.value,
                    alert.reason,
                    score_config.threshold,
                    now,
                );
                if let Err(e) = ctx.store.record_alert(&record).await {
                    error!(id = %alert.listing.id, error = %e, "alert ledger write failed");
                    summary.store_failed += 1;
                    continue;
                }
                if let Err(e) = ctx
                    .store
                    .set_status(&alert.listing.id, ListingStatus::Alerted)
                    .await
                {
                    error!(id = %alert.listing.id, error = %e, "status update failed");
                    summary.store_failed += 1;
                }
            }
            Err(e) => {
                // No in-run retry: the listing stays unalerted for this
                // value, so the next run re-evaluates and may re-send.
                warn!(id = %alert.listing.id, error = %e, "alert delivery failed");
                summary.notify_failed += 1;
            }
        }
    }
}
