//! Modèle de fatigue : points par attribution, récupération par repos,
//! seuils d'alerte et critique.
//!
//! Aucune erreur n'est jamais levée ici : une entrée de configuration absente
//! vaut zéro (ou le seuil par défaut) au point de lecture.

use crate::clock::{Clock, SystemClock};
use crate::model::{Attribution, AttributionType, FatigueEntry, OffPeriod, OffPeriodType, StaffMember};
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

pub const DEFAULT_ALERT_THRESHOLD: f64 = 50.0;
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 80.0;
pub const DEFAULT_NIGHT_START_HOUR: u32 = 18;
pub const DEFAULT_NIGHT_END_HOUR: u32 = 8;
pub const DEFAULT_SUPERVISION_THRESHOLD: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub full_day: Option<f64>,
    pub half_day: Option<f64>,
    pub weekend: Option<f64>,
    /// Récupération par jour de congé (bornes incluses).
    pub leave_per_day: Option<f64>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            full_day: Some(15.0),
            half_day: Some(8.0),
            weekend: Some(30.0),
            leave_per_day: Some(15.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FatigueThresholds {
    pub alert: Option<f64>,
    pub critical: Option<f64>,
}

impl Default for FatigueThresholds {
    fn default() -> Self {
        Self {
            alert: Some(DEFAULT_ALERT_THRESHOLD),
            critical: Some(DEFAULT_CRITICAL_THRESHOLD),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FatigueConfig {
    /// Points de base par type d'attribution.
    pub points: BTreeMap<AttributionType, f64>,
    /// Pénalité de supervision, appliquée au-delà de `supervision_threshold` salles.
    pub supervision_penalty: Option<f64>,
    pub supervision_threshold: Option<u32>,
    pub heavy_specialty_penalty: Option<f64>,
    pub heavy_specialties: Vec<String>,
    pub night_bonus: Option<f64>,
    pub night_start_hour: Option<u32>,
    pub night_end_hour: Option<u32>,
    pub recovery: RecoveryConfig,
    pub thresholds: FatigueThresholds,
}

impl Default for FatigueConfig {
    fn default() -> Self {
        let points = BTreeMap::from([
            (AttributionType::Duty, 20.0),
            (AttributionType::OnCall, 10.0),
            (AttributionType::Pediatric, 25.0),
        ]);
        Self {
            points,
            supervision_penalty: Some(15.0),
            supervision_threshold: Some(DEFAULT_SUPERVISION_THRESHOLD),
            heavy_specialty_penalty: Some(20.0),
            heavy_specialties: ["trauma", "neurosurgery", "icu", "er"]
                .into_iter()
                .map(String::from)
                .collect(),
            night_bonus: Some(5.0),
            night_start_hour: Some(DEFAULT_NIGHT_START_HOUR),
            night_end_hour: Some(DEFAULT_NIGHT_END_HOUR),
            recovery: RecoveryConfig::default(),
            thresholds: FatigueThresholds::default(),
        }
    }
}

impl FatigueConfig {
    pub fn alert_threshold(&self) -> f64 {
        self.thresholds.alert.unwrap_or(DEFAULT_ALERT_THRESHOLD)
    }

    pub fn critical_threshold(&self) -> f64 {
        self.thresholds.critical.unwrap_or(DEFAULT_CRITICAL_THRESHOLD)
    }
}

/// Point d'extension : mesures compensatoires autorisant une attribution
/// au-dessus du seuil d'alerte (mais sous le seuil critique).
pub trait CompensatoryMeasures: Debug + Send + Sync {
    fn has_compensatory_measures(
        &self,
        staff: &StaffMember,
        attribution: &Attribution,
        projected: f64,
    ) -> bool;
}

/// Politique par défaut : aucune compensation, donc refus au-delà du seuil d'alerte.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCompensation;

impl CompensatoryMeasures for NoCompensation {
    fn has_compensatory_measures(&self, _: &StaffMember, _: &Attribution, _: f64) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FatigueLevel {
    Normal,
    Alert,
    Critical,
}

/// Projection de la fatigue si l'attribution était acceptée.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FatigueAssessment {
    pub current: f64,
    pub points: f64,
    pub projected: f64,
    pub level: FatigueLevel,
    pub allowed: bool,
}

#[derive(Debug, Clone)]
pub struct FatigueModel {
    config: FatigueConfig,
    compensation: Arc<dyn CompensatoryMeasures>,
    clock: Arc<dyn Clock>,
}

impl Default for FatigueModel {
    fn default() -> Self {
        Self::new(FatigueConfig::default())
    }
}

impl FatigueModel {
    pub fn new(config: FatigueConfig) -> Self {
        Self {
            config,
            compensation: Arc::new(NoCompensation),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_compensation(mut self, compensation: Arc<dyn CompensatoryMeasures>) -> Self {
        self.compensation = compensation;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &FatigueConfig {
        &self.config
    }

    /// Points de fatigue générés par une attribution.
    pub fn calculate_fatigue_points(&self, attribution: &Attribution) -> f64 {
        let base = match attribution.kind {
            AttributionType::Supervision => {
                let threshold = self
                    .config
                    .supervision_threshold
                    .unwrap_or(DEFAULT_SUPERVISION_THRESHOLD);
                if attribution.supervision_count.unwrap_or(0) > threshold {
                    self.config.supervision_penalty.unwrap_or(0.0)
                } else {
                    0.0
                }
            }
            kind => match self.config.points.get(&kind) {
                Some(points) => *points,
                None => self.heavy_specialty_points(attribution),
            },
        };
        base + self.night_bonus(attribution)
    }

    fn heavy_specialty_points(&self, attribution: &Attribution) -> f64 {
        let Some(specialty) = attribution.specialty.as_deref() else {
            return 0.0;
        };
        let heavy = self
            .config
            .heavy_specialties
            .iter()
            .any(|s| s.eq_ignore_ascii_case(specialty.trim()));
        if heavy {
            self.config.heavy_specialty_penalty.unwrap_or(0.0)
        } else {
            0.0
        }
    }

    fn night_bonus(&self, attribution: &Attribution) -> f64 {
        let from = self.config.night_start_hour.unwrap_or(DEFAULT_NIGHT_START_HOUR);
        let until = self.config.night_end_hour.unwrap_or(DEFAULT_NIGHT_END_HOUR);
        let is_night = |hour: u32| hour >= from || hour <= until;
        if is_night(attribution.start.hour()) || is_night(attribution.end.hour()) {
            self.config.night_bonus.unwrap_or(0.0)
        } else {
            0.0
        }
    }

    /// Points de récupération d'une période de repos.
    pub fn calculate_recovery(&self, off: &OffPeriod) -> f64 {
        let recovery = &self.config.recovery;
        match off.kind {
            OffPeriodType::FullDay => recovery.full_day.unwrap_or(0.0),
            OffPeriodType::HalfDay => recovery.half_day.unwrap_or(0.0),
            OffPeriodType::Weekend => recovery.weekend.unwrap_or(0.0),
            OffPeriodType::Leave => {
                let days = ((off.end - off.start).num_days() + 1).max(0);
                recovery.leave_per_day.unwrap_or(0.0) * days as f64
            }
        }
    }

    pub fn assess(&self, staff: &StaffMember, attribution: &Attribution) -> FatigueAssessment {
        let current = staff.fatigue.score;
        let points = self.calculate_fatigue_points(attribution);
        let projected = current + points;

        let (level, allowed) = if projected > self.config.critical_threshold() {
            (FatigueLevel::Critical, false)
        } else if projected > self.config.alert_threshold() {
            let compensated =
                self.compensation
                    .has_compensatory_measures(staff, attribution, projected);
            (FatigueLevel::Alert, compensated)
        } else {
            (FatigueLevel::Normal, true)
        };

        if !allowed {
            tracing::debug!(
                staff = staff.id.as_str(),
                projected,
                ?level,
                "fatigue gate denies assignment"
            );
        }

        FatigueAssessment {
            current,
            points,
            projected,
            level,
            allowed,
        }
    }

    pub fn can_take_assignment(&self, staff: &StaffMember, attribution: &Attribution) -> bool {
        self.assess(staff, attribution).allowed
    }

    /// Renvoie une copie du membre avec la fatigue augmentée et une entrée d'historique.
    pub fn update_fatigue_after_assignment(
        &self,
        staff: &StaffMember,
        attribution: &Attribution,
    ) -> StaffMember {
        let points = self.calculate_fatigue_points(attribution);
        let score = staff.fatigue.score + points;
        let reason = format!(
            "assignment {} ({}): +{points}",
            attribution.id.as_str(),
            attribution.kind.as_str()
        );
        self.append(staff, score, reason)
    }

    /// Renvoie une copie du membre avec la fatigue diminuée (plancher à zéro).
    pub fn update_fatigue_after_rest(&self, staff: &StaffMember, off: &OffPeriod) -> StaffMember {
        let recovery = self.calculate_recovery(off);
        let score = (staff.fatigue.score - recovery).max(0.0);
        let reason = format!("rest {} ({}): -{recovery}", off.id, off.kind.as_str());
        self.append(staff, score, reason)
    }

    fn append(&self, staff: &StaffMember, score: f64, reason: String) -> StaffMember {
        let mut updated = staff.clone();
        // l'historique reste ordonné même si l'horloge recule
        let at = self.clock.now().max(staff.fatigue.last_update);
        updated.fatigue.score = score.max(0.0);
        updated.fatigue.last_update = at;
        updated.fatigue.history.push(FatigueEntry {
            date: at,
            score: updated.fatigue.score,
            reason,
        });
        updated
    }
}
