//! Contraintes temporelles entre une attribution proposée et le planning
//! existant du même membre : espacement, repos obligatoire, incompatibilités.
//!
//! Sans médecin, attribution proposée ou planning existant, chaque validateur
//! renvoie un succès marqué `incomplete` : il ne bloque pas, sans valoir une
//! vraie validation.

use super::types::{
    IncompatibilityParams, MandatoryRestParams, Rule, RuleEvaluationContext, RuleEvaluationResult,
    RuleKind, RuleValidator, Severity, ShiftSpacingParams,
};
use super::util;
use crate::model::Attribution;
use anyhow::bail;
use serde_json::json;

pub const DEFAULT_MIN_DAYS_BETWEEN: i64 = 1;
pub const DEFAULT_REST_HOURS: f64 = 11.0;

const INCOMPLETE: &str = "context incomplete: doctor, proposed shift and existing shifts are required";

#[derive(Debug, Default, Clone, Copy)]
pub struct TemporalRuleSet;

/// Attribution proposée et attributions existantes du même membre.
fn schedule(context: &RuleEvaluationContext) -> Option<(&Attribution, Vec<&Attribution>)> {
    context.doctor.as_ref()?;
    let proposed = context.proposed_shift.as_ref()?;
    let existing = context.existing_shifts.as_ref()?;
    let same_staff = existing
        .iter()
        .filter(|s| s.staff_id == proposed.staff_id && s.id != proposed.id)
        .collect();
    Some((proposed, same_staff))
}

impl TemporalRuleSet {
    /// Échoue sur la première attribution trop proche (pas la pire).
    pub fn validate_shift_spacing(
        &self,
        rule: &Rule,
        params: &ShiftSpacingParams,
        context: &RuleEvaluationContext,
    ) -> RuleEvaluationResult {
        let Some((proposed, prior)) = schedule(context) else {
            return RuleEvaluationResult::incomplete(rule, INCOMPLETE);
        };
        let required = params
            .by_type
            .get(&proposed.kind)
            .copied()
            .or(params.min_days_between)
            .unwrap_or(DEFAULT_MIN_DAYS_BETWEEN);

        for shift in prior {
            let days = util::rounded_day_diff(proposed.start, shift.end);
            if days < required {
                return RuleEvaluationResult::fail(
                    rule,
                    format!("shifts too close: {days} day(s) apart, {required} required"),
                    json!({
                        "conflictingShift": shift.id.as_str(),
                        "actualDays": days,
                        "requiredDays": required,
                    }),
                );
            }
        }
        RuleEvaluationResult::pass(rule, format!("shift spacing respected (>= {required} day(s))"))
    }

    /// Repos minimal après la dernière attribution. Tout chevauchement avec une
    /// attribution du même membre, antérieure ou postérieure, est une erreur.
    pub fn validate_mandatory_rest(
        &self,
        rule: &Rule,
        params: &MandatoryRestParams,
        context: &RuleEvaluationContext,
    ) -> RuleEvaluationResult {
        let Some((proposed, prior)) = schedule(context) else {
            return RuleEvaluationResult::incomplete(rule, INCOMPLETE);
        };
        if let Some(overlapping) = prior
            .iter()
            .find(|s| util::overlaps(proposed.start, proposed.end, s.start, s.end))
        {
            return RuleEvaluationResult::fail(
                rule,
                "proposed shift overlaps an existing assignment",
                json!({
                    "conflictingShift": overlapping.id.as_str(),
                    "conflictingStart": overlapping.start.to_rfc3339(),
                    "conflictingEnd": overlapping.end.to_rfc3339(),
                    "proposedStart": proposed.start.to_rfc3339(),
                    "proposedEnd": proposed.end.to_rfc3339(),
                }),
            )
            .with_severity(Severity::Error);
        }

        let Some(last) = prior
            .into_iter()
            .filter(|s| s.start <= proposed.start)
            .max_by_key(|s| s.end)
        else {
            return RuleEvaluationResult::pass(rule, "no previous assignment");
        };

        let required = params
            .by_type
            .get(&last.kind)
            .copied()
            .or(params.rest_hours)
            .unwrap_or(DEFAULT_REST_HOURS);
        let rest = util::gap_hours(last.start, last.end, proposed.start, proposed.end);
        if rest < required {
            return RuleEvaluationResult::fail(
                rule,
                format!("insufficient rest: {rest:.1}h < {required}h required"),
                json!({
                    "conflictingShift": last.id.as_str(),
                    "restHours": rest,
                    "requiredHours": required,
                }),
            );
        }
        RuleEvaluationResult::pass(rule, format!("rest respected (>= {required}h)"))
    }

    pub fn validate_incompatibilities(
        &self,
        rule: &Rule,
        params: &IncompatibilityParams,
        context: &RuleEvaluationContext,
    ) -> RuleEvaluationResult {
        let Some((proposed, prior)) = schedule(context) else {
            return RuleEvaluationResult::incomplete(rule, INCOMPLETE);
        };

        for shift in &prior {
            let pair = params.type_pairs.iter().find(|p| {
                (p.first == proposed.kind && p.second == shift.kind)
                    || (p.first == shift.kind && p.second == proposed.kind)
            });
            let Some(pair) = pair else {
                continue;
            };
            let overlapping = util::overlaps(proposed.start, proposed.end, shift.start, shift.end);
            let gap = util::gap_hours(proposed.start, proposed.end, shift.start, shift.end);
            if overlapping || gap < pair.min_hours_between {
                return RuleEvaluationResult::fail(
                    rule,
                    format!(
                        "{} is incompatible with {} within {}h",
                        proposed.kind.as_str(),
                        shift.kind.as_str(),
                        pair.min_hours_between
                    ),
                    json!({
                        "conflictingShift": shift.id.as_str(),
                        "gapHours": gap,
                        "requiredHours": pair.min_hours_between,
                    }),
                );
            }
        }

        if let Some(service) = proposed.service.as_deref() {
            for shift in &prior {
                let Some(other) = shift.service.as_deref() else {
                    continue;
                };
                let incompatible = params.service_pairs.iter().any(|p| {
                    (p.first == service && p.second == other)
                        || (p.first == other && p.second == service)
                });
                if incompatible
                    && util::overlaps(proposed.start, proposed.end, shift.start, shift.end)
                {
                    return RuleEvaluationResult::fail(
                        rule,
                        format!("service {service} is incompatible with concurrent service {other}"),
                        json!({
                            "conflictingShift": shift.id.as_str(),
                            "service": service,
                            "conflictingService": other,
                        }),
                    );
                }
            }
        }

        RuleEvaluationResult::pass(rule, "no incompatibility")
    }
}

impl RuleValidator for TemporalRuleSet {
    fn validate(
        &self,
        rule: &Rule,
        context: &RuleEvaluationContext,
    ) -> anyhow::Result<RuleEvaluationResult> {
        if !rule.applies_to(context) {
            return Ok(RuleEvaluationResult::pass(rule, super::NOT_APPLICABLE));
        }
        let result = match &rule.kind {
            RuleKind::ShiftSpacing(p) => self.validate_shift_spacing(rule, p, context),
            RuleKind::MandatoryRest(p) => self.validate_mandatory_rest(rule, p, context),
            RuleKind::Incompatibility(p) => self.validate_incompatibilities(rule, p, context),
            other => bail!(
                "rule {} ({}) is not a temporal rule",
                rule.id,
                other.rule_type()
            ),
        };
        Ok(result)
    }
}
