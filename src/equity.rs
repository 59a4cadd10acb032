//! Répartition équitable des créneaux de repos.
//!
//! Deux phases gloutonnes :
//! 1. minimum garanti par semaine, les plus fatigués servis en premier. Les
//!    semaines sont regroupées par numéro seul : sur un horizon qui traverse
//!    le 1er janvier, deux semaines de même numéro partagent un pool ;
//! 2. reste distribué au score le plus élevé, avec décroissance ×0.95 après
//!    chaque créneau et exclusion définitive au quota.

use crate::model::{Distribution, OffSlot, StaffId, StaffMember};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};

/// Nombre de semaines pris en compte pour le quota. Fixe : il ne dépend pas
/// de l'horizon réellement planifié.
pub const WEEK_COUNT: u32 = 4;

/// Facteur appliqué au score d'un membre après chaque créneau reçu.
pub const SCORE_DECAY: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquityConfig {
    pub min_off_per_week: u32,
    pub max_off_per_week: u32,
}

impl Default for EquityConfig {
    fn default() -> Self {
        Self {
            min_off_per_week: 1,
            max_off_per_week: 2,
        }
    }
}

impl EquityConfig {
    /// Quota total sur `WEEK_COUNT` semaines, borné à `u32::MAX`.
    pub fn quota(&self) -> usize {
        self.max_off_per_week.saturating_mul(WEEK_COUNT) as usize
    }
}

/// Numéro de semaine (semaines commençant le dimanche, 1er janvier en semaine 1).
///
/// `ceil((jours depuis le 1er janvier + jour de semaine du 1er janvier + 1) / 7)`,
/// ce n'est pas la numérotation ISO-8601.
pub fn week_number(date: NaiveDate) -> u32 {
    let jan1 = NaiveDate::from_yo_opt(date.year(), 1).unwrap_or(date);
    let days = (date - jan1).num_days();
    let offset = i64::from(jan1.weekday().num_days_from_sunday());
    let n = days + offset + 1;
    ((n + 6) / 7) as u32
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EquityDistributor {
    config: EquityConfig,
}

#[derive(Debug)]
struct ScoreRecord {
    staff: StaffId,
    score: f64,
}

impl EquityDistributor {
    pub fn new(config: EquityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> EquityConfig {
        self.config
    }

    /// Répartit `slots` entre `staff`. Chaque membre a une entrée, même vide.
    pub fn distribute(&self, staff: &[StaffMember], slots: &[OffSlot]) -> Distribution {
        let mut distribution: Distribution = staff
            .iter()
            .map(|s| (s.id.clone(), Vec::new()))
            .collect();

        if staff.is_empty() || slots.is_empty() {
            return distribution;
        }

        let mut taken = vec![false; slots.len()];
        self.guarantee_minimum(staff, slots, &mut taken, &mut distribution);

        let remaining: VecDeque<&OffSlot> = slots
            .iter()
            .zip(taken.iter())
            .filter(|(_, used)| !**used)
            .map(|(slot, _)| slot)
            .collect();
        let leftover = self.distribute_remainder(staff, remaining, &mut distribution);

        tracing::info!(
            staff = staff.len(),
            slots = slots.len(),
            unallocated = leftover,
            "off-slot distribution computed"
        );
        distribution
    }

    fn guarantee_minimum(
        &self,
        staff: &[StaffMember],
        slots: &[OffSlot],
        taken: &mut [bool],
        distribution: &mut Distribution,
    ) {
        // clé : numéro de semaine seul, l'année n'y entre pas
        let mut weeks: BTreeMap<u32, VecDeque<usize>> = BTreeMap::new();
        for (idx, slot) in slots.iter().enumerate() {
            weeks.entry(week_number(slot.date)).or_default().push_back(idx);
        }

        let mut by_fatigue: Vec<&StaffMember> = staff.iter().collect();
        by_fatigue.sort_by(|a, b| desc(a.fatigue.score, b.fatigue.score));

        let min = self.config.min_off_per_week as usize;
        for (week, pool) in weeks.iter_mut() {
            for member in &by_fatigue {
                let Some(allocated) = distribution.get_mut(&member.id) else {
                    continue;
                };
                let current = allocated
                    .iter()
                    .filter(|s| week_number(s.date) == *week)
                    .count();
                for _ in current..min {
                    let Some(idx) = pool.pop_front() else {
                        break;
                    };
                    taken[idx] = true;
                    allocated.push(slots[idx].clone());
                }
            }
        }
    }

    fn distribute_remainder(
        &self,
        staff: &[StaffMember],
        mut remaining: VecDeque<&OffSlot>,
        distribution: &mut Distribution,
    ) -> usize {
        let quota = self.config.quota();
        let mut records: Vec<ScoreRecord> = staff
            .iter()
            .map(|s| ScoreRecord {
                staff: s.id.clone(),
                score: s.fatigue.score,
            })
            .collect();

        while !remaining.is_empty() && !records.is_empty() {
            records.sort_by(|a, b| desc(a.score, b.score));
            let top = &mut records[0];
            let allocated = distribution.entry(top.staff.clone()).or_default();
            if allocated.len() < quota {
                if let Some(slot) = remaining.pop_front() {
                    allocated.push(slot.clone());
                }
                top.score *= SCORE_DECAY;
            } else {
                tracing::debug!(staff = top.staff.as_str(), quota, "off quota reached");
                records.remove(0);
            }
        }

        if !remaining.is_empty() {
            tracing::warn!(
                unallocated = remaining.len(),
                "every candidate reached its off quota"
            );
        }
        remaining.len()
    }
}

/// Ordre décroissant, stable pour les égalités.
fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
