mod builtin;
mod temporal;
mod types;
mod util;

pub use builtin::{
    FatigueLimitValidator, MaxShiftsPerWeekValidator, MinAdvanceNoticeValidator,
    MinRestPeriodValidator, SeasonQuotaValidator, ShiftQualificationValidator,
};
pub use temporal::{TemporalRuleSet, DEFAULT_MIN_DAYS_BETWEEN, DEFAULT_REST_HOURS};
pub use types::{
    AdvanceNoticeParams, ConflictSolver, EngineError, EvaluationSummary, IncompatibilityParams,
    MandatoryRestParams, MaxShiftsParams, MinRestParams, QualificationParams, Resolution,
    ResolutionStrategy, Rule, RuleEvaluationContext, RuleEvaluationResult, RuleKind, RuleType,
    RuleValidator, Scope, SeasonQuotaParams, ServiceIncompatibility, Severity, ShiftSpacingParams,
    TypeIncompatibility, VIOLATION_WEIGHT, WARNING_WEIGHT,
};

use crate::cache::{CacheConfig, CacheSweeper, RuleEvaluationCache};
use crate::fatigue::FatigueModel;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub(crate) const NOT_APPLICABLE: &str = "rule not applicable in this context";

/// Options du moteur
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub use_cache: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { use_cache: true }
    }
}

/// Moteur de règles : registre des règles, validateurs et solveurs par type.
pub struct RuleEngine {
    rules: Vec<Rule>,
    validators: HashMap<RuleType, Arc<dyn RuleValidator>>,
    solvers: HashMap<RuleType, Arc<dyn ConflictSolver>>,
    cache: Arc<RuleEvaluationCache>,
    sweeper: Option<CacheSweeper>,
    options: EngineOptions,
}

impl fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.rules.len())
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .field("solvers", &self.solvers.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .field("sweeping", &self.sweeper.is_some())
            .finish()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl RuleEngine {
    /// Moteur avec son propre cache ; balayage de fond lancé si le cache est actif.
    pub fn new(options: EngineOptions) -> Self {
        let config = CacheConfig::default();
        let cache = Arc::new(RuleEvaluationCache::from_config(&config));
        let engine = Self::with_cache(options, cache);
        if options.use_cache {
            engine.with_sweeper(config.sweep_interval())
        } else {
            engine
        }
    }

    /// Moteur partageant un cache déjà construit, sans balayage de fond.
    pub fn with_cache(options: EngineOptions, cache: Arc<RuleEvaluationCache>) -> Self {
        Self {
            rules: Vec::new(),
            validators: HashMap::new(),
            solvers: HashMap::new(),
            cache,
            sweeper: None,
            options,
        }
    }

    /// Balaye le cache toutes les `every` tant que le moteur vit.
    pub fn with_sweeper(mut self, every: std::time::Duration) -> Self {
        self.sweeper = Some(self.cache.start_sweeper(every));
        self
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper.is_some()
    }

    /// Enregistre tous les validateurs fournis.
    pub fn with_builtin_validators(mut self, fatigue: FatigueModel) -> Self {
        self.register_validator(RuleType::MinRestPeriod, MinRestPeriodValidator);
        self.register_validator(RuleType::MaxShiftsPerWeek, MaxShiftsPerWeekValidator);
        self.register_validator(RuleType::ShiftQualification, ShiftQualificationValidator);
        self.register_validator(RuleType::MinAdvanceNotice, MinAdvanceNoticeValidator);
        self.register_validator(RuleType::SeasonQuota, SeasonQuotaValidator);
        self.register_validator(RuleType::ShiftSpacing, TemporalRuleSet);
        self.register_validator(RuleType::MandatoryRest, TemporalRuleSet);
        self.register_validator(RuleType::Incompatibility, TemporalRuleSet);
        self.register_validator(RuleType::FatigueLimit, FatigueLimitValidator::new(fatigue));
        self
    }

    pub fn cache(&self) -> &Arc<RuleEvaluationCache> {
        &self.cache
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Ajoute (ou remplace, à id égal) une règle. Vide tout le cache.
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), EngineError> {
        if rule.id.trim().is_empty() {
            return Err(EngineError::InvalidRule("rule id cannot be empty".into()));
        }
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
        self.cache.clear();
        Ok(())
    }

    /// Retire une règle. Vide tout le cache.
    pub fn remove_rule(&mut self, id: &str) -> Option<Rule> {
        let pos = self.rules.iter().position(|r| r.id == id)?;
        let removed = self.rules.remove(pos);
        self.cache.clear();
        Some(removed)
    }

    pub fn register_validator<V>(&mut self, rule_type: RuleType, validator: V)
    where
        V: RuleValidator + 'static,
    {
        self.validators.insert(rule_type, Arc::new(validator));
    }

    pub fn register_solver<S>(&mut self, rule_type: RuleType, solver: S)
    where
        S: ConflictSolver + 'static,
    {
        self.solvers.insert(rule_type, Arc::new(solver));
    }

    /// Règles actives, par priorité décroissante (ordre d'ajout à égalité).
    fn active_rules(&self) -> Vec<Rule> {
        if self.options.use_cache {
            if let Some(active) = self.cache.get_rules(&self.rules) {
                return active;
            }
        }
        let mut active: Vec<Rule> = self.rules.iter().filter(|r| r.enabled).cloned().collect();
        active.sort_by(|a, b| b.priority.cmp(&a.priority));
        if self.options.use_cache {
            self.cache.set_rules(&self.rules, active.clone());
        }
        active
    }

    /// Évalue toutes les règles actives sur le contexte.
    ///
    /// Une erreur de validateur n'est pas rattrapée : elle interrompt
    /// l'évaluation et remonte telle quelle.
    pub fn evaluate(
        &self,
        context: &RuleEvaluationContext,
    ) -> Result<EvaluationSummary, EngineError> {
        if self.options.use_cache {
            if let Some(mut hit) = self.cache.get_evaluation(context) {
                hit.from_cache = true;
                return Ok(hit);
            }
        }

        let mut violations = Vec::new();
        let mut warnings = Vec::new();
        for rule in self.active_rules() {
            let Some(validator) = self.validators.get(&rule.rule_type()) else {
                tracing::warn!(
                    rule = rule.id.as_str(),
                    rule_type = %rule.rule_type(),
                    "no validator registered, rule skipped"
                );
                continue;
            };
            let result = validator
                .validate(&rule, context)
                .map_err(|source| EngineError::Validator {
                    rule_id: rule.id.clone(),
                    source,
                })?;
            if result.passed {
                continue;
            }
            match result.severity {
                Severity::Error => violations.push(result),
                Severity::Warning => warnings.push(result),
                Severity::Info => {}
            }
        }

        let summary = EvaluationSummary::from_results(violations, warnings);
        tracing::debug!(
            valid = summary.is_valid,
            score = summary.score,
            violations = summary.violations.len(),
            warnings = summary.warnings.len(),
            "evaluation complete"
        );
        if self.options.use_cache {
            self.cache.set_evaluation(context, summary.clone());
        }
        Ok(summary)
    }

    /// Regroupe les violations par type de règle et délègue à chaque solveur.
    ///
    /// Les violations dont la règle a disparu sont ignorées ; sans solveur,
    /// la résolution est un rejet.
    pub fn resolve_conflicts(
        &self,
        violations: &[RuleEvaluationResult],
    ) -> Result<Vec<Resolution>, EngineError> {
        let mut groups: Vec<(RuleType, Vec<RuleEvaluationResult>)> = Vec::new();
        for violation in violations {
            let Some(rule) = self.rule(&violation.rule_id) else {
                continue;
            };
            let rule_type = rule.rule_type();
            match groups.iter_mut().find(|(t, _)| *t == rule_type) {
                Some((_, group)) => group.push(violation.clone()),
                None => groups.push((rule_type, vec![violation.clone()])),
            }
        }

        let mut resolutions = Vec::with_capacity(groups.len());
        for (rule_type, group) in groups {
            let resolution = match self.solvers.get(&rule_type) {
                Some(solver) => solver
                    .resolve(&group)
                    .map_err(|source| EngineError::Solver { rule_type, source })?,
                None => Resolution::reject(rule_type, &group),
            };
            resolutions.push(resolution);
        }
        Ok(resolutions)
    }
}
