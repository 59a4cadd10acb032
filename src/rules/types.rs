use crate::model::{Attribution, AttributionType, LeaveRequest, StaffMember};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    #[default]
    Global,
    Department,
    Service,
    Doctor,
}

/// Discriminant d'une règle : clé des registres de validateurs et de solveurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    MinRestPeriod,
    MaxShiftsPerWeek,
    ShiftQualification,
    MinAdvanceNotice,
    SeasonQuota,
    ShiftSpacing,
    MandatoryRest,
    Incompatibility,
    FatigueLimit,
}

impl RuleType {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleType::MinRestPeriod => "MIN_REST_PERIOD",
            RuleType::MaxShiftsPerWeek => "MAX_SHIFTS_PER_WEEK",
            RuleType::ShiftQualification => "SHIFT_QUALIFICATION",
            RuleType::MinAdvanceNotice => "MIN_ADVANCE_NOTICE",
            RuleType::SeasonQuota => "SEASON_QUOTA",
            RuleType::ShiftSpacing => "SHIFT_SPACING",
            RuleType::MandatoryRest => "MANDATORY_REST",
            RuleType::Incompatibility => "INCOMPATIBILITY",
            RuleType::FatigueLimit => "FATIGUE_LIMIT",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinRestParams {
    pub min_hours: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxShiftsParams {
    pub max_shifts: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualificationParams {
    pub qualifications: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvanceNoticeParams {
    pub min_days: Option<i64>,
}

/// Quota de congés sur une saison ; bornes au format `MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonQuotaParams {
    pub quota: Option<i64>,
    pub season_start: Option<String>,
    pub season_end: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiftSpacingParams {
    pub min_days_between: Option<i64>,
    /// Écart minimal spécifique au type de l'attribution proposée.
    pub by_type: BTreeMap<AttributionType, i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MandatoryRestParams {
    pub rest_hours: Option<f64>,
    /// Repos spécifique au type de l'attribution précédente (ex. nuit).
    pub by_type: BTreeMap<AttributionType, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeIncompatibility {
    pub first: AttributionType,
    pub second: AttributionType,
    #[serde(default)]
    pub min_hours_between: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIncompatibility {
    pub first: String,
    pub second: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncompatibilityParams {
    pub type_pairs: Vec<TypeIncompatibility>,
    pub service_pairs: Vec<ServiceIncompatibility>,
}

/// Type de règle et paramètres typés associés.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "parameters", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    MinRestPeriod(MinRestParams),
    MaxShiftsPerWeek(MaxShiftsParams),
    ShiftQualification(QualificationParams),
    MinAdvanceNotice(AdvanceNoticeParams),
    SeasonQuota(SeasonQuotaParams),
    ShiftSpacing(ShiftSpacingParams),
    MandatoryRest(MandatoryRestParams),
    Incompatibility(IncompatibilityParams),
    FatigueLimit,
}

impl RuleKind {
    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleKind::MinRestPeriod(_) => RuleType::MinRestPeriod,
            RuleKind::MaxShiftsPerWeek(_) => RuleType::MaxShiftsPerWeek,
            RuleKind::ShiftQualification(_) => RuleType::ShiftQualification,
            RuleKind::MinAdvanceNotice(_) => RuleType::MinAdvanceNotice,
            RuleKind::SeasonQuota(_) => RuleType::SeasonQuota,
            RuleKind::ShiftSpacing(_) => RuleType::ShiftSpacing,
            RuleKind::MandatoryRest(_) => RuleType::MandatoryRest,
            RuleKind::Incompatibility(_) => RuleType::Incompatibility,
            RuleKind::FatigueLimit => RuleType::FatigueLimit,
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

/// Règle de planification. `id` est unique dans un moteur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub kind: RuleKind,
    pub severity: Severity,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_value: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    pub fn new<I: Into<String>, N: Into<String>>(
        id: I,
        name: N,
        kind: RuleKind,
        severity: Severity,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            severity,
            scope: Scope::Global,
            scope_value: None,
            enabled: true,
            priority: 0,
            updated_at,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_scope<S: Into<String>>(mut self, scope: Scope, value: S) -> Self {
        self.scope = scope;
        self.scope_value = Some(value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn rule_type(&self) -> RuleType {
        self.kind.rule_type()
    }

    /// La règle concerne-t-elle ce contexte (portée département / service / médecin) ?
    pub fn applies_to(&self, context: &RuleEvaluationContext) -> bool {
        let value = self.scope_value.as_deref();
        let doctor = context.doctor.as_ref();
        match self.scope {
            Scope::Global => true,
            Scope::Department => doctor.and_then(|d| d.department.as_deref()) == value,
            Scope::Service => {
                let service = context
                    .proposed_shift
                    .as_ref()
                    .and_then(|s| s.service.as_deref())
                    .or_else(|| doctor.and_then(|d| d.service.as_deref()));
                value.is_some() && service == value
            }
            Scope::Doctor => value.is_some() && doctor.map(|d| d.id.as_str()) == value,
        }
    }
}

/// Instantané construit par l'appelant ; jamais persisté.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleEvaluationContext {
    pub proposed_shift: Option<Attribution>,
    pub proposed_leave: Option<LeaveRequest>,
    pub existing_shifts: Option<Vec<Attribution>>,
    pub existing_leaves: Option<Vec<LeaveRequest>>,
    pub doctor: Option<StaffMember>,
    pub current_date: Option<NaiveDate>,
}

impl RuleEvaluationContext {
    pub fn for_shift(shift: Attribution) -> Self {
        Self {
            proposed_shift: Some(shift),
            ..Self::default()
        }
    }

    pub fn for_leave(leave: LeaveRequest) -> Self {
        Self {
            proposed_leave: Some(leave),
            ..Self::default()
        }
    }

    pub fn with_doctor(mut self, doctor: StaffMember) -> Self {
        self.doctor = Some(doctor);
        self
    }

    pub fn with_existing_shifts(mut self, shifts: Vec<Attribution>) -> Self {
        self.existing_shifts = Some(shifts);
        self
    }

    pub fn with_existing_leaves(mut self, leaves: Vec<LeaveRequest>) -> Self {
        self.existing_leaves = Some(leaves);
        self
    }

    pub fn with_current_date(mut self, date: NaiveDate) -> Self {
        self.current_date = Some(date);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluationResult {
    pub rule_id: String,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
    /// Contexte insuffisant : la règle n'a pas pu être évaluée et ne bloque pas.
    #[serde(default)]
    pub incomplete: bool,
}

impl RuleEvaluationResult {
    pub fn pass<M: Into<String>>(rule: &Rule, message: M) -> Self {
        Self {
            rule_id: rule.id.clone(),
            passed: true,
            severity: rule.severity,
            message: message.into(),
            details: serde_json::Value::Null,
            incomplete: false,
        }
    }

    pub fn fail<M: Into<String>>(rule: &Rule, message: M, details: serde_json::Value) -> Self {
        Self {
            rule_id: rule.id.clone(),
            passed: false,
            severity: rule.severity,
            message: message.into(),
            details,
            incomplete: false,
        }
    }

    pub fn incomplete<M: Into<String>>(rule: &Rule, message: M) -> Self {
        let message = message.into();
        tracing::debug!(rule = rule.id.as_str(), %message, "rule skipped: context incomplete");
        Self {
            incomplete: true,
            ..Self::pass(rule, message)
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// Synthèse d'une évaluation. `score` : plus bas = meilleur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub is_valid: bool,
    pub violations: Vec<RuleEvaluationResult>,
    pub warnings: Vec<RuleEvaluationResult>,
    pub score: u32,
    pub from_cache: bool,
}

pub const VIOLATION_WEIGHT: u32 = 100;
pub const WARNING_WEIGHT: u32 = 10;

impl EvaluationSummary {
    pub fn from_results(
        violations: Vec<RuleEvaluationResult>,
        warnings: Vec<RuleEvaluationResult>,
    ) -> Self {
        let score =
            VIOLATION_WEIGHT * violations.len() as u32 + WARNING_WEIGHT * warnings.len() as u32;
        Self {
            is_valid: violations.is_empty(),
            violations,
            warnings,
            score,
            from_cache: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionStrategy {
    Reject,
    Reschedule,
    Reassign,
    Override,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub rule_type: RuleType,
    pub strategy: ResolutionStrategy,
    pub message: String,
    pub rule_ids: Vec<String>,
}

impl Resolution {
    /// Résolution synthétisée quand aucun solveur n'est enregistré.
    pub fn reject(rule_type: RuleType, violations: &[RuleEvaluationResult]) -> Self {
        Self {
            rule_type,
            strategy: ResolutionStrategy::Reject,
            message: format!("no automatic resolution available for {rule_type}; assignment rejected"),
            rule_ids: violations.iter().map(|v| v.rule_id.clone()).collect(),
        }
    }
}

/// Validateur d'un type de règle. Une erreur remonte telle quelle à l'appelant.
pub trait RuleValidator: Send + Sync {
    fn validate(
        &self,
        rule: &Rule,
        context: &RuleEvaluationContext,
    ) -> anyhow::Result<RuleEvaluationResult>;
}

impl<F> RuleValidator for F
where
    F: Fn(&Rule, &RuleEvaluationContext) -> anyhow::Result<RuleEvaluationResult> + Send + Sync,
{
    fn validate(
        &self,
        rule: &Rule,
        context: &RuleEvaluationContext,
    ) -> anyhow::Result<RuleEvaluationResult> {
        self(rule, context)
    }
}

/// Solveur de conflits pour un type de règle.
pub trait ConflictSolver: Send + Sync {
    fn resolve(&self, violations: &[RuleEvaluationResult]) -> anyhow::Result<Resolution>;
}

impl<F> ConflictSolver for F
where
    F: Fn(&[RuleEvaluationResult]) -> anyhow::Result<Resolution> + Send + Sync,
{
    fn resolve(&self, violations: &[RuleEvaluationResult]) -> anyhow::Result<Resolution> {
        self(violations)
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid rule: {0}")]
    InvalidRule(String),
    #[error("validator failed for rule {rule_id}: {source}")]
    Validator {
        rule_id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("solver failed for {rule_type}: {source}")]
    Solver {
        rule_type: RuleType,
        #[source]
        source: anyhow::Error,
    },
}
