#![forbid(unsafe_code)]
//! Garde : moteur de règles, de fatigue et d'équité pour plannings médicaux.
//!
//! - Évaluation de règles priorisées avec cache TTL par contexte.
//! - Modèle de fatigue cumulée (points, récupération, seuils).
//! - Contraintes temporelles : espacement, repos obligatoire, incompatibilités.
//! - Répartition équitable des créneaux de repos.
//! - Tout en UTC ; la persistance reste à l'appelant.

pub mod cache;
pub mod clock;
pub mod config;
pub mod equity;
pub mod fatigue;
pub mod io;
pub mod model;
pub mod rules;
pub mod storage;

pub use cache::{context_key, rules_key, CacheConfig, CacheEntry, CacheSweeper, RuleEvaluationCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use equity::{week_number, EquityConfig, EquityDistributor, WEEK_COUNT};
pub use fatigue::{
    CompensatoryMeasures, FatigueAssessment, FatigueConfig, FatigueLevel, FatigueModel,
    NoCompensation,
};
pub use model::{
    Attribution, AttributionType, Distribution, FatigueEntry, FatigueState, LeaveRequest,
    LeaveStatus, OffPeriod, OffPeriodType, OffSlot, Roster, ShiftId, StaffId, StaffMember,
};
pub use rules::{
    EngineError, EngineOptions, EvaluationSummary, Resolution, ResolutionStrategy, Rule,
    RuleEngine, RuleEvaluationContext, RuleEvaluationResult, RuleKind, RuleType, Scope, Severity,
    TemporalRuleSet,
};
pub use storage::{JsonStorage, Storage};
