//! Validateurs fournis avec le moteur : repos minimal, gardes par semaine,
//! qualifications, préavis et quota saisonnier de congés, limite de fatigue.

use super::types::{
    AdvanceNoticeParams, MaxShiftsParams, MinRestParams, QualificationParams, Rule,
    RuleEvaluationContext, RuleEvaluationResult, RuleKind, RuleValidator, SeasonQuotaParams,
};
use super::{util, NOT_APPLICABLE};
use crate::fatigue::FatigueModel;
use crate::model::LeaveStatus;
use anyhow::{bail, Context};
use chrono::{Datelike, Duration, NaiveDate};
use serde_json::json;

pub const DEFAULT_MIN_REST_HOURS: i64 = 11;
pub const DEFAULT_MAX_SHIFTS_PER_WEEK: usize = 2;
pub const DEFAULT_MIN_ADVANCE_DAYS: i64 = 30;
pub const DEFAULT_SEASON_QUOTA: i64 = 10;
pub const DEFAULT_SEASON_START: &str = "06-01";
pub const DEFAULT_SEASON_END: &str = "09-30";

const MISSING_DATA: &str = "insufficient data to evaluate";

fn wrong_kind(rule: &Rule, expected: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "rule {} is {}, validator expects {expected}",
        rule.id,
        rule.rule_type()
    )
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MinRestPeriodValidator;

impl MinRestPeriodValidator {
    pub fn check(
        &self,
        rule: &Rule,
        params: &MinRestParams,
        context: &RuleEvaluationContext,
    ) -> RuleEvaluationResult {
        let min_hours = params.min_hours.unwrap_or(DEFAULT_MIN_REST_HOURS);
        let (Some(proposed), Some(existing)) = (&context.proposed_shift, &context.existing_shifts)
        else {
            return RuleEvaluationResult::incomplete(rule, "no existing shift to compare");
        };
        if existing.is_empty() {
            return RuleEvaluationResult::incomplete(rule, "no existing shift to compare");
        }

        for shift in existing {
            let hours = (proposed.start - shift.end).num_hours();
            if (0..min_hours).contains(&hours) {
                return RuleEvaluationResult::fail(
                    rule,
                    format!("insufficient rest period ({hours}h < {min_hours}h required)"),
                    json!({
                        "hoursDiff": hours,
                        "minHours": min_hours,
                        "conflictingShift": shift.id.as_str(),
                    }),
                );
            }
        }
        RuleEvaluationResult::pass(rule, format!("rest period respected (>= {min_hours}h)"))
    }
}

impl RuleValidator for MinRestPeriodValidator {
    fn validate(
        &self,
        rule: &Rule,
        context: &RuleEvaluationContext,
    ) -> anyhow::Result<RuleEvaluationResult> {
        let RuleKind::MinRestPeriod(params) = &rule.kind else {
            return Err(wrong_kind(rule, "MIN_REST_PERIOD"));
        };
        // sans médecin, pas de planning à qui l'appliquer
        if context.doctor.is_none() || !rule.applies_to(context) {
            return Ok(RuleEvaluationResult::pass(rule, NOT_APPLICABLE));
        }
        Ok(self.check(rule, params, context))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MaxShiftsPerWeekValidator;

impl MaxShiftsPerWeekValidator {
    /// Semaine du lundi 00:00 au lundi + 6 jours 00:00, bornes incluses.
    pub fn check(
        &self,
        rule: &Rule,
        params: &MaxShiftsParams,
        context: &RuleEvaluationContext,
    ) -> RuleEvaluationResult {
        let max_shifts = params.max_shifts.unwrap_or(DEFAULT_MAX_SHIFTS_PER_WEEK);
        let (Some(proposed), Some(existing), Some(_)) =
            (&context.proposed_shift, &context.existing_shifts, &context.doctor)
        else {
            return RuleEvaluationResult::incomplete(rule, MISSING_DATA);
        };

        let week_start = util::start_of_week(proposed.start);
        let week_end = week_start + Duration::days(6);
        let in_week = existing
            .iter()
            .filter(|s| s.start >= week_start && s.start <= week_end)
            .count();

        if in_week >= max_shifts {
            return RuleEvaluationResult::fail(
                rule,
                format!("maximum of {max_shifts} shifts per week exceeded"),
                json!({
                    "currentCount": in_week,
                    "maxAllowed": max_shifts,
                    "weekRange": {
                        "start": week_start.to_rfc3339(),
                        "end": week_end.to_rfc3339(),
                    },
                }),
            );
        }
        RuleEvaluationResult::pass(
            rule,
            format!("shifts per week respected ({}/{max_shifts})", in_week + 1),
        )
    }
}

impl RuleValidator for MaxShiftsPerWeekValidator {
    fn validate(
        &self,
        rule: &Rule,
        context: &RuleEvaluationContext,
    ) -> anyhow::Result<RuleEvaluationResult> {
        let RuleKind::MaxShiftsPerWeek(params) = &rule.kind else {
            return Err(wrong_kind(rule, "MAX_SHIFTS_PER_WEEK"));
        };
        if !rule.applies_to(context) {
            return Ok(RuleEvaluationResult::pass(rule, NOT_APPLICABLE));
        }
        Ok(self.check(rule, params, context))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ShiftQualificationValidator;

impl ShiftQualificationValidator {
    pub fn check(
        &self,
        rule: &Rule,
        params: &QualificationParams,
        context: &RuleEvaluationContext,
    ) -> RuleEvaluationResult {
        let (Some(_), Some(doctor)) = (&context.proposed_shift, &context.doctor) else {
            return RuleEvaluationResult::incomplete(rule, MISSING_DATA);
        };
        if params.qualifications.is_empty() {
            return RuleEvaluationResult::pass(rule, "no specific qualification required");
        }

        let missing: Vec<&str> = params
            .qualifications
            .iter()
            .filter(|q| !doctor.qualifications.contains(q))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return RuleEvaluationResult::fail(
                rule,
                format!("missing qualifications for this shift: {}", missing.join(", ")),
                json!({
                    "missingQualifications": missing,
                    "doctorQualifications": doctor.qualifications,
                }),
            );
        }
        RuleEvaluationResult::pass(rule, "all required qualifications present")
    }
}

impl RuleValidator for ShiftQualificationValidator {
    fn validate(
        &self,
        rule: &Rule,
        context: &RuleEvaluationContext,
    ) -> anyhow::Result<RuleEvaluationResult> {
        let RuleKind::ShiftQualification(params) = &rule.kind else {
            return Err(wrong_kind(rule, "SHIFT_QUALIFICATION"));
        };
        if !rule.applies_to(context) {
            return Ok(RuleEvaluationResult::pass(rule, NOT_APPLICABLE));
        }
        Ok(self.check(rule, params, context))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MinAdvanceNoticeValidator;

impl MinAdvanceNoticeValidator {
    pub fn check(
        &self,
        rule: &Rule,
        params: &AdvanceNoticeParams,
        context: &RuleEvaluationContext,
    ) -> RuleEvaluationResult {
        let min_days = params.min_days.unwrap_or(DEFAULT_MIN_ADVANCE_DAYS);
        let (Some(leave), Some(today)) = (&context.proposed_leave, context.current_date) else {
            return RuleEvaluationResult::incomplete(rule, MISSING_DATA);
        };

        let notice = (leave.start_date - today).num_days();
        if notice < min_days {
            return RuleEvaluationResult::fail(
                rule,
                format!("insufficient notice ({notice} days < {min_days} days required)"),
                json!({ "daysNotice": notice, "minDays": min_days }),
            );
        }
        RuleEvaluationResult::pass(
            rule,
            format!("notice respected ({notice} days >= {min_days} days required)"),
        )
    }
}

impl RuleValidator for MinAdvanceNoticeValidator {
    fn validate(
        &self,
        rule: &Rule,
        context: &RuleEvaluationContext,
    ) -> anyhow::Result<RuleEvaluationResult> {
        let RuleKind::MinAdvanceNotice(params) = &rule.kind else {
            return Err(wrong_kind(rule, "MIN_ADVANCE_NOTICE"));
        };
        if !rule.applies_to(context) {
            return Ok(RuleEvaluationResult::pass(rule, NOT_APPLICABLE));
        }
        Ok(self.check(rule, params, context))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SeasonQuotaValidator;

fn season_date(year: i32, month_day: &str) -> anyhow::Result<NaiveDate> {
    let (month, day) = month_day
        .trim()
        .split_once('-')
        .with_context(|| format!("invalid season bound {month_day:?}, expected MM-DD"))?;
    let month: u32 = month.parse().with_context(|| format!("invalid month in {month_day:?}"))?;
    let day: u32 = day.parse().with_context(|| format!("invalid day in {month_day:?}"))?;
    NaiveDate::from_ymd_opt(year, month, day)
        .with_context(|| format!("invalid season bound {month_day:?} for {year}"))
}

impl SeasonQuotaValidator {
    /// Paramètres de saison invalides : erreur (remonte à l'appelant du moteur).
    pub fn check(
        &self,
        rule: &Rule,
        params: &SeasonQuotaParams,
        context: &RuleEvaluationContext,
    ) -> anyhow::Result<RuleEvaluationResult> {
        let quota = params.quota.unwrap_or(DEFAULT_SEASON_QUOTA);
        let (Some(leave), Some(existing), Some(_)) =
            (&context.proposed_leave, &context.existing_leaves, &context.doctor)
        else {
            return Ok(RuleEvaluationResult::incomplete(rule, MISSING_DATA));
        };

        let year = leave.start_date.year();
        let season_start = season_date(
            year,
            params.season_start.as_deref().unwrap_or(DEFAULT_SEASON_START),
        )?;
        let season_end = season_date(
            year,
            params.season_end.as_deref().unwrap_or(DEFAULT_SEASON_END),
        )?;
        if season_end < season_start {
            bail!("season end {season_end} precedes season start {season_start}");
        }

        if !util::date_ranges_overlap(leave.start_date, leave.end_date, season_start, season_end) {
            return Ok(RuleEvaluationResult::pass(
                rule,
                "proposed leave is outside the seasonal restriction period",
            ));
        }

        let taken: i64 = existing
            .iter()
            .filter(|l| l.status == LeaveStatus::Approved && l.id != leave.id)
            .filter(|l| util::date_ranges_overlap(l.start_date, l.end_date, season_start, season_end))
            .map(|l| util::overlapping_days(l.start_date, l.end_date, season_start, season_end))
            .sum();
        let requested =
            util::overlapping_days(leave.start_date, leave.end_date, season_start, season_end);

        if taken + requested > quota {
            return Ok(RuleEvaluationResult::fail(
                rule,
                format!(
                    "seasonal leave quota exceeded ({taken} days taken + {requested} requested > {quota} allowed)"
                ),
                json!({
                    "daysTakenInSeason": taken,
                    "proposedDaysInSeason": requested,
                    "seasonQuota": quota,
                    "season": {
                        "start": season_start.to_string(),
                        "end": season_end.to_string(),
                    },
                }),
            ));
        }
        Ok(RuleEvaluationResult::pass(
            rule,
            format!("seasonal leave quota respected ({}/{quota} days)", taken + requested),
        ))
    }
}

impl RuleValidator for SeasonQuotaValidator {
    fn validate(
        &self,
        rule: &Rule,
        context: &RuleEvaluationContext,
    ) -> anyhow::Result<RuleEvaluationResult> {
        let RuleKind::SeasonQuota(params) = &rule.kind else {
            return Err(wrong_kind(rule, "SEASON_QUOTA"));
        };
        if !rule.applies_to(context) {
            return Ok(RuleEvaluationResult::pass(rule, NOT_APPLICABLE));
        }
        self.check(rule, params, context)
    }
}

/// Refuse une attribution que le modèle de fatigue n'autorise pas.
#[derive(Debug, Clone, Default)]
pub struct FatigueLimitValidator {
    model: FatigueModel,
}

impl FatigueLimitValidator {
    pub fn new(model: FatigueModel) -> Self {
        Self { model }
    }

    pub fn check(&self, rule: &Rule, context: &RuleEvaluationContext) -> RuleEvaluationResult {
        let (Some(proposed), Some(doctor)) = (&context.proposed_shift, &context.doctor) else {
            return RuleEvaluationResult::incomplete(rule, MISSING_DATA);
        };
        let assessment = self.model.assess(doctor, proposed);
        if !assessment.allowed {
            return RuleEvaluationResult::fail(
                rule,
                format!(
                    "fatigue would reach {:.1} (alert {}, critical {})",
                    assessment.projected,
                    self.model.config().alert_threshold(),
                    self.model.config().critical_threshold()
                ),
                json!({
                    "current": assessment.current,
                    "points": assessment.points,
                    "projected": assessment.projected,
                    "level": assessment.level,
                }),
            );
        }
        RuleEvaluationResult::pass(
            rule,
            format!("fatigue within limits ({:.1})", assessment.projected),
        )
    }
}

impl RuleValidator for FatigueLimitValidator {
    fn validate(
        &self,
        rule: &Rule,
        context: &RuleEvaluationContext,
    ) -> anyhow::Result<RuleEvaluationResult> {
        if !matches!(rule.kind, RuleKind::FatigueLimit) {
            return Err(wrong_kind(rule, "FATIGUE_LIMIT"));
        }
        if !rule.applies_to(context) {
            return Ok(RuleEvaluationResult::pass(rule, NOT_APPLICABLE));
        }
        Ok(self.check(rule, context))
    }
}
