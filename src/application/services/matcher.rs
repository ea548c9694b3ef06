//! Provider matching
//!
//! Ranks provider candidates for a service plan by a weighted score.
//! Per-candidate scoring is pure and runs fanned out on independent tasks;
//! results are joined, sorted and truncated. No shared mutable state exists
//! between scoring tasks, so the only synchronization is the join itself.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::NaiveDate;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info};
use validator::Validate;

use crate::config::MatcherConfig;
use crate::domain::{BookingError, BookingResult, Provider, ServicePlan, TimeSlot};
use crate::infrastructure::storage::Storage;
use crate::shared::geo::GeoPoint;

/// Per-term score decomposition, kept for explainability
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoreBreakdown {
    pub location: f64,
    pub verified: f64,
    pub completed: f64,
    pub rating: f64,
    pub slots: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.location + self.verified + self.completed + self.rating + self.slots
    }
}

/// One ranked match result
#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub provider_id: String,
    pub display_name: String,
    pub distance_km: f64,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    /// Set on the top-ranked entry only
    pub preferred: bool,
}

/// Service for ranking provider candidates
pub struct MatchService {
    storage: Arc<dyn Storage>,
    config: MatcherConfig,
}

impl MatchService {
    pub fn new(storage: Arc<dyn Storage>, config: MatcherConfig) -> Self {
        Self { storage, config }
    }

    /// Rank providers for the plan, best first.
    ///
    /// Returns an empty list (not an error) when nobody qualifies. Identical
    /// candidates and search center always produce the identical order:
    /// scoring is deterministic and ties break on provider id.
    pub async fn match_plan(&self, plan: &ServicePlan) -> BookingResult<Vec<RankedCandidate>> {
        plan.validate()
            .map_err(|e| BookingError::Validation(e.to_string()))?;

        let mut inputs = Vec::new();
        for provider in self
            .storage
            .list_providers()
            .await?
            .into_iter()
            .filter(|p| p.offers(&plan.service_type))
        {
            let slots = self
                .storage
                .list_slots_for_provider(&provider.id, plan.date)
                .await?;
            inputs.push((provider, slots));
        }

        debug!(
            service_type = plan.service_type.as_str(),
            candidates = inputs.len(),
            "Scoring candidates"
        );

        // fan-out: one task per candidate, no shared state
        let center = plan.location;
        let date = plan.date;
        let tasks: Vec<_> = inputs
            .into_iter()
            .map(|(provider, slots)| {
                let config = self.config.clone();
                tokio::spawn(
                    async move { score_candidate(&provider, &slots, center, date, &config) },
                )
            })
            .collect();

        // fan-in
        let mut ranked: Vec<RankedCandidate> = join_all(tasks)
            .await
            .into_iter()
            .filter_map(|joined| joined.ok())
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.provider_id.cmp(&b.provider_id))
        });
        ranked.truncate(self.config.max_results);
        if let Some(top) = ranked.first_mut() {
            top.preferred = true;
        }

        info!(
            service_type = plan.service_type.as_str(),
            results = ranked.len(),
            "Match completed"
        );

        Ok(ranked)
    }
}

/// Pure scoring of one candidate against the search center.
fn score_candidate(
    provider: &Provider,
    slots: &[TimeSlot],
    center: GeoPoint,
    date: NaiveDate,
    config: &MatcherConfig,
) -> RankedCandidate {
    let distance_km = center.distance_km(&provider.profile.location);

    let location = if distance_km >= config.max_radius_km {
        0.0
    } else {
        config.location_weight * (1.0 - distance_km / config.max_radius_km)
    };

    let verified = if provider.profile.verified {
        config.verified_bonus
    } else {
        0.0
    };

    // diminishing returns on history
    let completed = config.completed_weight * (1.0 + provider.profile.completed_bookings as f64).ln();

    let rating = config.rating_weight * provider.profile.rating.clamp(0.0, 5.0);

    let open_units = open_units_on(provider, slots, date);
    let slots_score = (config.slot_weight * open_units as f64).min(config.slot_score_cap);

    let breakdown = ScoreBreakdown {
        location,
        verified,
        completed,
        rating,
        slots: slots_score,
    };

    RankedCandidate {
        provider_id: provider.id.clone(),
        display_name: provider.display_name.clone(),
        distance_km,
        score: breakdown.total(),
        breakdown,
        preferred: false,
    }
}

/// Open units across the provider's templates on `date`, overlaying any
/// stored instances (which carry live usage and blocks).
fn open_units_on(provider: &Provider, slots: &[TimeSlot], date: NaiveDate) -> u32 {
    provider
        .templates_on(date)
        .map(|template| {
            match slots.iter().find(|s| s.id == template.id) {
                Some(instance) if instance.blocked => 0,
                Some(instance) => instance.remaining_total(),
                // no instance yet: fully open
                None => template.capacity,
            }
        })
        .sum()
}

// ── Tests ──────────────────────────────────────────────────────
