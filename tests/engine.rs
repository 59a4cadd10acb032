#![forbid(unsafe_code)]
use chrono::{DateTime, TimeZone, Utc};
use garde::fatigue::FatigueModel;
use garde::model::{Attribution, AttributionType, StaffId, StaffMember};
use garde::rules::{
    EngineError, EngineOptions, MaxShiftsParams, MinRestParams, Resolution, ResolutionStrategy,
    Rule, RuleEngine, RuleEvaluationContext, RuleEvaluationResult, RuleKind, RuleType, Severity,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
}

fn min_rest(id: &str, hours: i64) -> Rule {
    Rule::new(
        id,
        "repos minimal",
        RuleKind::MinRestPeriod(MinRestParams { min_hours: Some(hours) }),
        Severity::Error,
        at(1, 0),
    )
}

fn max_shifts(id: &str, max: usize) -> Rule {
    Rule::new(
        id,
        "gardes par semaine",
        RuleKind::MaxShiftsPerWeek(MaxShiftsParams { max_shifts: Some(max) }),
        Severity::Error,
        at(1, 0),
    )
}

fn doctor(score: f64) -> StaffMember {
    let mut d = StaffMember::with_id("d1", "Dr Martin", at(1, 0));
    d.fatigue.score = score;
    d
}

/// Garde existante le 03/03 8h-20h, proposition le 04/03 6h-14h (10h de repos).
fn short_rest_context() -> RuleEvaluationContext {
    let existing = Attribution::new(AttributionType::Duty, StaffId::new("d1"), at(3, 8), at(3, 20))
        .unwrap()
        .with_id("e1");
    let proposed = Attribution::new(AttributionType::Duty, StaffId::new("d1"), at(4, 6), at(4, 14))
        .unwrap()
        .with_id("p1");
    RuleEvaluationContext::for_shift(proposed)
        .with_doctor(doctor(0.0))
        .with_existing_shifts(vec![existing])
}

fn builtin_engine(options: EngineOptions) -> RuleEngine {
    RuleEngine::new(options).with_builtin_validators(FatigueModel::default())
}

fn failing(severity: Severity) -> impl Fn(&Rule, &RuleEvaluationContext) -> anyhow::Result<RuleEvaluationResult> {
    move |rule: &Rule, _: &RuleEvaluationContext| -> anyhow::Result<RuleEvaluationResult> {
        Ok(RuleEvaluationResult::fail(rule, "failed", json!({})).with_severity(severity))
    }
}

#[test]
fn short_rest_is_a_violation() {
    let mut engine = builtin_engine(EngineOptions::default());
    engine.add_rule(min_rest("rest", 24)).unwrap();
    engine.add_rule(max_shifts("week", 2)).unwrap();

    let summary = engine.evaluate(&short_rest_context()).unwrap();
    assert!(!summary.is_valid);
    assert_eq!(summary.violations.len(), 1);
    assert_eq!(summary.violations[0].rule_id, "rest");
    assert_eq!(summary.violations[0].details["hoursDiff"], 10);
    assert!(summary.warnings.is_empty());
    assert_eq!(summary.score, 100);
    assert!(!summary.from_cache);
}

#[test]
fn second_evaluation_comes_from_cache() {
    let mut engine = builtin_engine(EngineOptions::default());
    engine.add_rule(min_rest("rest", 24)).unwrap();
    let ctx = short_rest_context();

    let first = engine.evaluate(&ctx).unwrap();
    let second = engine.evaluate(&ctx).unwrap();
    assert!(second.from_cache);
    assert_eq!(second.violations, first.violations);
    assert_eq!(second.score, first.score);
}

#[test]
fn rule_changes_clear_the_cache() {
    let mut engine = builtin_engine(EngineOptions::default());
    engine.add_rule(min_rest("rest", 24)).unwrap();
    let ctx = short_rest_context();
    assert!(!engine.evaluate(&ctx).unwrap().is_valid);

    // même id : remplacement
    engine.add_rule(min_rest("rest", 8)).unwrap();
    assert_eq!(engine.rules().len(), 1);
    let summary = engine.evaluate(&ctx).unwrap();
    assert!(!summary.from_cache);
    assert!(summary.is_valid);

    engine.add_rule(min_rest("strict", 12)).unwrap();
    assert!(!engine.evaluate(&ctx).unwrap().is_valid);
    assert!(engine.remove_rule("strict").is_some());
    let summary = engine.evaluate(&ctx).unwrap();
    assert!(summary.is_valid);
    assert!(!summary.from_cache);
}

#[test]
fn cache_can_be_disabled() {
    let mut engine = builtin_engine(EngineOptions { use_cache: false });
    engine.add_rule(min_rest("rest", 24)).unwrap();
    let ctx = short_rest_context();
    engine.evaluate(&ctx).unwrap();
    assert!(!engine.evaluate(&ctx).unwrap().from_cache);
    assert!(engine.cache().is_empty());
    assert!(!engine.is_sweeping());
    assert!(builtin_engine(EngineOptions::default()).is_sweeping());
}

#[test]
fn empty_rule_id_is_rejected() {
    let mut engine = RuleEngine::default();
    let err = engine.add_rule(min_rest("  ", 11)).unwrap_err();
    assert!(matches!(err, EngineError::InvalidRule(_)));
}

#[test]
fn disabled_and_unregistered_rules_are_skipped() {
    let mut engine = RuleEngine::default();
    engine.register_validator(RuleType::MinRestPeriod, failing(Severity::Error));
    engine.add_rule(min_rest("off", 24).disabled()).unwrap();
    // aucun validateur MAX_SHIFTS_PER_WEEK
    engine.add_rule(max_shifts("week", 0)).unwrap();

    let summary = engine.evaluate(&short_rest_context()).unwrap();
    assert!(summary.is_valid);
    assert_eq!(summary.score, 0);
}

#[test]
fn warnings_weigh_ten_and_info_is_dropped() {
    let mut engine = RuleEngine::default();
    engine.register_validator(RuleType::MinRestPeriod, failing(Severity::Warning));
    engine.register_validator(RuleType::MaxShiftsPerWeek, failing(Severity::Info));
    engine.add_rule(min_rest("rest", 11)).unwrap();
    engine.add_rule(max_shifts("week", 2)).unwrap();

    let summary = engine.evaluate(&short_rest_context()).unwrap();
    assert!(summary.is_valid);
    assert_eq!(summary.warnings.len(), 1);
    assert_eq!(summary.warnings[0].rule_id, "rest");
    assert!(summary.violations.is_empty());
    assert_eq!(summary.score, 10);
}

#[test]
fn validator_error_aborts_evaluation() {
    let mut engine = RuleEngine::default();
    engine.register_validator(
        RuleType::MinRestPeriod,
        |_: &Rule, _: &RuleEvaluationContext| -> anyhow::Result<RuleEvaluationResult> {
            anyhow::bail!("roster backend unavailable")
        },
    );
    engine.add_rule(min_rest("rest", 11)).unwrap();

    let err = engine.evaluate(&short_rest_context()).unwrap_err();
    match err {
        EngineError::Validator { rule_id, source } => {
            assert_eq!(rule_id, "rest");
            assert!(source.to_string().contains("unavailable"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.cache().stats().evaluations, 0);
}

#[test]
fn rules_run_by_descending_priority() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let mut engine = RuleEngine::new(EngineOptions { use_cache: false });
    engine.register_validator(
        RuleType::MinRestPeriod,
        move |rule: &Rule, _: &RuleEvaluationContext| -> anyhow::Result<RuleEvaluationResult> {
            log.lock().unwrap().push(rule.id.clone());
            Ok(RuleEvaluationResult::pass(rule, "ok"))
        },
    );
    engine.add_rule(min_rest("low", 11).with_priority(1)).unwrap();
    engine.add_rule(min_rest("high", 11).with_priority(10)).unwrap();
    engine.add_rule(min_rest("mid-a", 11).with_priority(5)).unwrap();
    engine.add_rule(min_rest("mid-b", 11).with_priority(5)).unwrap();

    engine.evaluate(&short_rest_context()).unwrap();
    assert_eq!(*seen.lock().unwrap(), ["high", "mid-a", "mid-b", "low"]);
}

#[test]
fn conflicts_grouped_by_rule_type() {
    let mut engine = RuleEngine::default();
    engine.register_validator(RuleType::MinRestPeriod, failing(Severity::Error));
    engine.register_validator(RuleType::MaxShiftsPerWeek, failing(Severity::Error));
    engine.register_solver(
        RuleType::MaxShiftsPerWeek,
        |violations: &[RuleEvaluationResult]| -> anyhow::Result<Resolution> {
            Ok(Resolution {
                rule_type: RuleType::MaxShiftsPerWeek,
                strategy: ResolutionStrategy::Reassign,
                message: "reassign to a colleague".into(),
                rule_ids: violations.iter().map(|v| v.rule_id.clone()).collect(),
            })
        },
    );
    engine.add_rule(max_shifts("week", 2)).unwrap();
    engine.add_rule(min_rest("rest-a", 11)).unwrap();
    engine.add_rule(min_rest("rest-b", 11)).unwrap();

    let summary = engine.evaluate(&short_rest_context()).unwrap();
    assert_eq!(summary.violations.len(), 3);
    let resolutions = engine.resolve_conflicts(&summary.violations).unwrap();
    assert_eq!(resolutions.len(), 2);

    assert_eq!(resolutions[0].rule_type, RuleType::MaxShiftsPerWeek);
    assert_eq!(resolutions[0].strategy, ResolutionStrategy::Reassign);
    assert_eq!(resolutions[0].rule_ids, ["week"]);

    assert_eq!(resolutions[1].rule_type, RuleType::MinRestPeriod);
    assert_eq!(resolutions[1].strategy, ResolutionStrategy::Reject);
    assert_eq!(resolutions[1].rule_ids, ["rest-a", "rest-b"]);
}

#[test]
fn violations_of_removed_rules_are_ignored() {
    let mut engine = RuleEngine::default();
    engine.register_validator(RuleType::MinRestPeriod, failing(Severity::Error));
    engine.add_rule(min_rest("rest", 11)).unwrap();
    let summary = engine.evaluate(&short_rest_context()).unwrap();

    engine.remove_rule("rest");
    let resolutions = engine.resolve_conflicts(&summary.violations).unwrap();
    assert!(resolutions.is_empty());
}

#[test]
fn solver_error_is_reported_with_rule_type() {
    let mut engine = RuleEngine::default();
    engine.register_validator(RuleType::MinRestPeriod, failing(Severity::Error));
    engine.register_solver(
        RuleType::MinRestPeriod,
        |_: &[RuleEvaluationResult]| -> anyhow::Result<Resolution> { anyhow::bail!("no colleague available") },
    );
    engine.add_rule(min_rest("rest", 11)).unwrap();
    let summary = engine.evaluate(&short_rest_context()).unwrap();

    let err = engine.resolve_conflicts(&summary.violations).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Solver {
            rule_type: RuleType::MinRestPeriod,
            ..
        }
    ));
}

#[test]
fn fatigue_limit_blocks_exhausted_doctor() {
    // la clé de cache ne dépend pas du score de fatigue
    let mut engine = builtin_engine(EngineOptions { use_cache: false });
    engine
        .add_rule(Rule::new("fatigue", "fatigue", RuleKind::FatigueLimit, Severity::Error, at(1, 0)))
        .unwrap();

    let proposed = Attribution::new(AttributionType::Duty, StaffId::new("d1"), at(4, 10), at(4, 16))
        .unwrap()
        .with_id("p1");
    let tired = RuleEvaluationContext::for_shift(proposed.clone()).with_doctor(doctor(70.0));
    let summary = engine.evaluate(&tired).unwrap();
    assert!(!summary.is_valid);
    assert_eq!(summary.violations[0].details["projected"], 90.0);

    let rested = RuleEvaluationContext::for_shift(proposed).with_doctor(doctor(10.0));
    assert!(engine.evaluate(&rested).unwrap().is_valid);
}
