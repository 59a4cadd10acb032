#![forbid(unsafe_code)]
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use garde::model::{Attribution, AttributionType, LeaveRequest, LeaveStatus, StaffId, StaffMember};
use garde::rules::{
    AdvanceNoticeParams, MaxShiftsParams, MaxShiftsPerWeekValidator, MinAdvanceNoticeValidator,
    MinRestParams, MinRestPeriodValidator, QualificationParams, Rule, RuleEvaluationContext,
    RuleKind, RuleValidator, Scope, SeasonQuotaParams, SeasonQuotaValidator, Severity,
    ShiftQualificationValidator,
};

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, d).unwrap()
}

fn shift(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Attribution {
    Attribution::new(AttributionType::Duty, StaffId::new("d1"), start, end)
        .unwrap()
        .with_id(id)
}

fn doctor() -> StaffMember {
    let mut d = StaffMember::with_id("d1", "Dr Martin", at(1, 0));
    d.department = Some("urgences".into());
    d.qualifications = vec!["pediatrics".into()];
    d
}

fn rule(kind: RuleKind) -> Rule {
    Rule::new("r1", "builtin", kind, Severity::Error, at(1, 0))
}

fn leave(id: &str, start: NaiveDate, end: NaiveDate, status: LeaveStatus) -> LeaveRequest {
    LeaveRequest {
        id: id.into(),
        staff_id: StaffId::new("d1"),
        kind: "ANNUAL".into(),
        start_date: start,
        end_date: end,
        status,
    }
}

#[test]
fn min_rest_counts_whole_hours_after_each_shift() {
    let rule = rule(RuleKind::MinRestPeriod(MinRestParams { min_hours: Some(11) }));
    let existing = vec![shift("e1", at(3, 8), at(3, 20))];

    // 10h de repos pour 11h exigées
    let proposed = Attribution::new(AttributionType::Duty, StaffId::new("d1"), at(4, 6), at(4, 14))
        .unwrap()
        .with_id("p");
    let ctx = RuleEvaluationContext::for_shift(proposed)
        .with_doctor(doctor())
        .with_existing_shifts(existing.clone());
    let result = MinRestPeriodValidator.validate(&rule, &ctx).unwrap();
    assert!(!result.passed);
    assert_eq!(result.details["hoursDiff"], 10);

    let after = shift("p", at(4, 7), at(4, 12));
    let ctx = RuleEvaluationContext::for_shift(after)
        .with_doctor(doctor())
        .with_existing_shifts(existing);
    assert!(MinRestPeriodValidator.validate(&rule, &ctx).unwrap().passed);
}

#[test]
fn min_rest_ignores_later_shifts_and_needs_history() {
    let rule = rule(RuleKind::MinRestPeriod(MinRestParams::default()));
    let later = vec![shift("e1", at(6, 8), at(6, 20))];
    let ctx = RuleEvaluationContext::for_shift(shift("p", at(4, 8), at(4, 20)))
        .with_doctor(doctor())
        .with_existing_shifts(later);
    assert!(MinRestPeriodValidator.validate(&rule, &ctx).unwrap().passed);

    let empty = RuleEvaluationContext::for_shift(shift("p", at(4, 8), at(4, 20)))
        .with_doctor(doctor())
        .with_existing_shifts(vec![]);
    let result = MinRestPeriodValidator.validate(&rule, &empty).unwrap();
    assert!(result.passed && result.incomplete);
}

#[test]
fn min_rest_without_doctor_is_not_applicable() {
    let rule = rule(RuleKind::MinRestPeriod(MinRestParams { min_hours: Some(11) }));
    let existing = vec![shift("e1", at(3, 8), at(3, 20))];
    let ctx = RuleEvaluationContext::for_shift(shift("p", at(4, 6), at(4, 14))).with_existing_shifts(existing);
    let result = MinRestPeriodValidator.validate(&rule, &ctx).unwrap();
    assert!(result.passed);
    assert!(!result.incomplete);
    assert_eq!(result.message, "rule not applicable in this context");
}

#[test]
fn max_shifts_counts_monday_based_week() {
    let rule = rule(RuleKind::MaxShiftsPerWeek(MaxShiftsParams { max_shifts: Some(2) }));
    let proposed = shift("p", at(7, 8), at(7, 20));

    let full = vec![shift("mon", at(3, 8), at(3, 20)), shift("wed", at(5, 8), at(5, 20))];
    let ctx = RuleEvaluationContext::for_shift(proposed.clone())
        .with_doctor(doctor())
        .with_existing_shifts(full);
    let result = MaxShiftsPerWeekValidator.validate(&rule, &ctx).unwrap();
    assert!(!result.passed);
    assert_eq!(result.details["currentCount"], 2);

    // le dimanche après minuit sort de la fenêtre, la semaine précédente aussi
    let edges = vec![
        shift("mon", at(3, 8), at(3, 20)),
        shift("sun", at(9, 8), at(9, 20)),
        shift("prev", at(2, 8), at(2, 20)),
    ];
    let ctx = RuleEvaluationContext::for_shift(proposed)
        .with_doctor(doctor())
        .with_existing_shifts(edges);
    assert!(MaxShiftsPerWeekValidator.validate(&rule, &ctx).unwrap().passed);
}

#[test]
fn qualification_lists_missing_entries() {
    let rule = rule(RuleKind::ShiftQualification(QualificationParams {
        qualifications: vec!["pediatrics".into(), "resuscitation".into()],
    }));
    let ctx = RuleEvaluationContext::for_shift(shift("p", at(4, 8), at(4, 20))).with_doctor(doctor());
    let result = ShiftQualificationValidator.validate(&rule, &ctx).unwrap();
    assert!(!result.passed);
    assert_eq!(result.details["missingQualifications"], serde_json::json!(["resuscitation"]));

    let none = self::rule(RuleKind::ShiftQualification(QualificationParams::default()));
    assert!(ShiftQualificationValidator.validate(&none, &ctx).unwrap().passed);
}

#[test]
fn advance_notice_uses_current_date() {
    let rule = rule(RuleKind::MinAdvanceNotice(AdvanceNoticeParams::default()));
    let request = leave("l1", date(3, 20), date(3, 22), LeaveStatus::Pending);

    let ctx = RuleEvaluationContext::for_leave(request.clone()).with_current_date(date(3, 1));
    let result = MinAdvanceNoticeValidator.validate(&rule, &ctx).unwrap();
    assert!(!result.passed);
    assert_eq!(result.details["daysNotice"], 19);

    let relaxed = self::rule(RuleKind::MinAdvanceNotice(AdvanceNoticeParams { min_days: Some(10) }));
    assert!(MinAdvanceNoticeValidator.validate(&relaxed, &ctx).unwrap().passed);

    let undated = RuleEvaluationContext::for_leave(request);
    assert!(MinAdvanceNoticeValidator.validate(&rule, &undated).unwrap().incomplete);
}

#[test]
fn season_quota_counts_approved_days_only() {
    let rule = rule(RuleKind::SeasonQuota(SeasonQuotaParams::default()));
    let history = vec![
        leave("a", date(7, 1), date(7, 6), LeaveStatus::Approved),
        leave("p", date(8, 1), date(8, 10), LeaveStatus::Pending),
        // chevauche le début de saison : 2 jours comptés
        leave("b", date(5, 30), date(6, 2), LeaveStatus::Approved),
    ];
    let request = leave("new", date(8, 18), date(8, 20), LeaveStatus::Pending);
    let ctx = RuleEvaluationContext::for_leave(request)
        .with_doctor(doctor())
        .with_existing_leaves(history.clone());
    let result = SeasonQuotaValidator.validate(&rule, &ctx).unwrap();
    assert!(!result.passed);
    assert_eq!(result.details["daysTakenInSeason"], 8);
    assert_eq!(result.details["proposedDaysInSeason"], 3);

    let short = leave("new", date(8, 18), date(8, 19), LeaveStatus::Pending);
    let ctx = RuleEvaluationContext::for_leave(short)
        .with_doctor(doctor())
        .with_existing_leaves(history.clone());
    assert!(SeasonQuotaValidator.validate(&rule, &ctx).unwrap().passed);

    let winter = leave("new", date(12, 20), date(12, 31), LeaveStatus::Pending);
    let ctx = RuleEvaluationContext::for_leave(winter)
        .with_doctor(doctor())
        .with_existing_leaves(history);
    assert!(SeasonQuotaValidator.validate(&rule, &ctx).unwrap().passed);
}

#[test]
fn malformed_season_bound_is_an_error() {
    let rule = rule(RuleKind::SeasonQuota(SeasonQuotaParams {
        quota: Some(5),
        season_start: Some("June 1st".into()),
        season_end: None,
    }));
    let ctx = RuleEvaluationContext::for_leave(leave("new", date(7, 1), date(7, 2), LeaveStatus::Pending))
        .with_doctor(doctor())
        .with_existing_leaves(vec![]);
    assert!(SeasonQuotaValidator.validate(&rule, &ctx).is_err());
}

#[test]
fn scoped_rules_skip_other_departments() {
    let rule = rule(RuleKind::ShiftQualification(QualificationParams {
        qualifications: vec!["resuscitation".into()],
    }));
    let ctx = RuleEvaluationContext::for_shift(shift("p", at(4, 8), at(4, 20))).with_doctor(doctor());

    let elsewhere = rule.clone().with_scope(Scope::Department, "bloc");
    assert!(ShiftQualificationValidator.validate(&elsewhere, &ctx).unwrap().passed);

    let here = rule.with_scope(Scope::Department, "urgences");
    assert!(!ShiftQualificationValidator.validate(&here, &ctx).unwrap().passed);
}

#[test]
fn validator_rejects_foreign_rule_kind() {
    let rule = rule(RuleKind::FatigueLimit);
    let ctx = RuleEvaluationContext::for_shift(shift("p", at(4, 8), at(4, 20)));
    assert!(MinRestPeriodValidator.validate(&rule, &ctx).is_err());
    assert!(SeasonQuotaValidator.validate(&rule, &ctx).is_err());
}
