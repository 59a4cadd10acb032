use crate::model::{Distribution, FatigueState, OffSlot, StaffMember};
use crate::rules::EvaluationSummary;
use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs;
use std::io::Write;
use std::path::Path;

fn optional(field: Option<&str>) -> Option<&str> {
    field.map(str::trim).filter(|s| !s.is_empty())
}

/// Import des effectifs : header `id,name[,department][,service][,fatigue]`
pub fn import_staff_csv<P: AsRef<Path>>(
    path: P,
    at: DateTime<Utc>,
) -> anyhow::Result<Vec<StaffMember>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let id = rec.get(0).context("missing id")?.trim();
        let name = rec.get(1).context("missing name")?.trim();
        if id.is_empty() || name.is_empty() {
            bail!("invalid staff row (empty)");
        }
        let mut member = StaffMember::with_id(id, name, at);
        member.department = optional(rec.get(2)).map(String::from);
        member.service = optional(rec.get(3)).map(String::from);
        if let Some(score) = optional(rec.get(4)) {
            let score: f64 = score
                .parse()
                .with_context(|| format!("invalid fatigue value for {id}"))?;
            if score < 0.0 {
                bail!("fatigue for {id} must not be negative");
            }
            member.fatigue = FatigueState::with_score(score, at);
        }
        out.push(member);
    }
    Ok(out)
}

fn parse_bool(s: &str) -> anyhow::Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "oui" => Ok(true),
        "false" | "0" | "no" | "n" | "non" => Ok(false),
        _ => bail!("expected boolean"),
    }
}

/// Import des créneaux de repos : header `id,date,type,is_weekend,is_holiday`
pub fn import_off_slots_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<OffSlot>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let id = rec.get(0).context("missing id")?.trim().to_string();
        let date = rec.get(1).context("missing date")?.trim();
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .with_context(|| format!("invalid date for slot {id}: {date}"))?;
        let kind = optional(rec.get(2)).unwrap_or("FULL_DAY").to_string();
        let is_weekend = match optional(rec.get(3)) {
            Some(flag) => parse_bool(flag)
                .with_context(|| format!("invalid is_weekend value for slot {id}"))?,
            None => false,
        };
        let is_holiday = match optional(rec.get(4)) {
            Some(flag) => parse_bool(flag)
                .with_context(|| format!("invalid is_holiday value for slot {id}"))?,
            None => false,
        };
        out.push(OffSlot {
            id,
            date,
            kind,
            is_weekend,
            is_holiday,
        });
    }
    Ok(out)
}

/// Écrit la répartition en CSV: header `staff_id,slot_id,date,type`
pub fn write_distribution_csv<W: Write>(writer: W, distribution: &Distribution) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_writer(writer);
    w.write_record(["staff_id", "slot_id", "date", "type"])?;
    for (staff, slots) in distribution {
        for slot in slots {
            let date = slot.date.to_string();
            w.write_record([staff.as_str(), slot.id.as_str(), date.as_str(), slot.kind.as_str()])?;
        }
    }
    w.flush()?;
    Ok(())
}

pub fn export_distribution_csv<P: AsRef<Path>>(
    path: P,
    distribution: &Distribution,
) -> anyhow::Result<()> {
    let file = fs::File::create(path.as_ref())
        .with_context(|| format!("creating {}", path.as_ref().display()))?;
    write_distribution_csv(file, distribution)
}

/// Export JSON de la répartition (jolie mise en forme)
pub fn export_distribution_json<P: AsRef<Path>>(
    path: P,
    distribution: &Distribution,
) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(distribution)?;
    fs::write(path, s)?;
    Ok(())
}

pub fn export_summary_json<P: AsRef<Path>>(
    path: P,
    summary: &EvaluationSummary,
) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(summary)?;
    fs::write(path, s)?;
    Ok(())
}
