#![forbid(unsafe_code)]
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use garde::{
    io,
    model::{Attribution, AttributionType, OffPeriod, OffPeriodType, StaffId},
    rules::RuleEvaluationContext,
    storage::{JsonStorage, Storage},
    Clock, Config, SystemClock,
};
use std::fs;
use std::sync::Arc;
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

/// CLI du moteur de gardes : fatigue, règles, répartition des repos
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Active les logs (feature `logging`)
    #[arg(long, global = true)]
    log: bool,

    /// Fichier JSON de l'état (effectifs, planning, fatigue)
    #[arg(long, global = true, default_value = "roster.json")]
    roster: String,

    /// Fichier JSON de configuration (défauts sinon)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Importer des membres depuis un CSV
    ImportStaff {
        #[arg(long)]
        csv: String,
    },

    /// Afficher la fatigue de chaque membre
    Fatigue,

    /// Enregistrer une attribution si la fatigue le permet
    Assign {
        #[arg(long)]
        staff: String,
        /// DUTY, ON_CALL, SUPERVISION, PEDIATRIC, ...
        #[arg(long)]
        kind: String,
        /// RFC3339 UTC
        #[arg(long)]
        start: String,
        /// RFC3339 UTC
        #[arg(long)]
        end: String,
        #[arg(long)]
        service: Option<String>,
        #[arg(long)]
        specialty: Option<String>,
        #[arg(long)]
        supervision_count: Option<u32>,
    },

    /// Enregistrer une période de repos
    Rest {
        #[arg(long)]
        staff: String,
        /// FULL_DAY, HALF_DAY, WEEKEND, LEAVE
        #[arg(long)]
        kind: String,
        /// RFC3339 UTC
        #[arg(long)]
        start: String,
        /// RFC3339 UTC
        #[arg(long)]
        end: String,
    },

    /// Évaluer un contexte (JSON) contre les règles configurées
    Evaluate {
        #[arg(long)]
        context: String,
        #[arg(long)]
        out: Option<String>,
    },

    /// Répartir des créneaux de repos (CSV) entre les membres
    Distribute {
        #[arg(long)]
        slots: String,
        #[arg(long)]
        out_csv: Option<String>,
        #[arg(long)]
        out_json: Option<String>,
    },
}

fn parse_time(raw: &str, field: &str) -> Result<DateTime<Utc>> {
    raw.parse()
        .with_context(|| format!("{field} must be RFC3339 UTC: {raw}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "logging")]
    if cli.log {
        let _ = Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let storage = JsonStorage::open(&cli.roster)?;
    let mut roster = storage.load_or_default()?;

    let code = match cli.cmd {
        Commands::ImportStaff { csv } => {
            let staff = io::import_staff_csv(csv, clock.now())?;
            for member in staff {
                if roster.find_staff(&member.id).is_some() {
                    bail!("staff {} already exists", member.id.as_str());
                }
                roster.staff.push(member);
            }
            storage.save(&roster)?;
            0
        }
        Commands::Fatigue => {
            let model = config.fatigue_model(clock);
            let alert = model.config().alert_threshold();
            let critical = model.config().critical_threshold();
            for member in &roster.staff {
                let score = member.fatigue.score;
                let flag = if score > critical {
                    "CRITICAL"
                } else if score > alert {
                    "ALERT"
                } else {
                    "ok"
                };
                println!("{} | {} | {:.1} | {}", member.id.as_str(), member.name, score, flag);
            }
            0
        }
        Commands::Assign {
            staff,
            kind,
            start,
            end,
            service,
            specialty,
            supervision_count,
        } => {
            let staff_id = StaffId::new(&staff);
            let kind = AttributionType::parse(&kind)
                .ok_or_else(|| anyhow!("unknown attribution type: {kind}"))?;
            let mut attribution = Attribution::new(
                kind,
                staff_id.clone(),
                parse_time(&start, "start")?,
                parse_time(&end, "end")?,
            )
            .map_err(anyhow::Error::msg)?;
            attribution.service = service;
            attribution.specialty = specialty;
            attribution.supervision_count = supervision_count;

            let model = config.fatigue_model(clock);
            let member = roster
                .find_staff(&staff_id)
                .ok_or_else(|| anyhow!("unknown staff: {staff}"))?;
            let assessment = model.assess(member, &attribution);
            if assessment.allowed {
                let updated = model.update_fatigue_after_assignment(member, &attribution);
                println!(
                    "{} assigned {} ({}) | fatigue {:.1} -> {:.1}",
                    staff,
                    attribution.id.as_str(),
                    kind.as_str(),
                    assessment.current,
                    updated.fatigue.score
                );
                if let Some(slot) = roster.find_staff_mut(&staff_id) {
                    *slot = updated;
                }
                roster.shifts.push(attribution);
                storage.save(&roster)?;
                0
            } else {
                eprintln!(
                    "refused: fatigue would reach {:.1} ({:?})",
                    assessment.projected, assessment.level
                );
                2
            }
        }
        Commands::Rest {
            staff,
            kind,
            start,
            end,
        } => {
            let staff_id = StaffId::new(&staff);
            let kind =
                OffPeriodType::parse(&kind).ok_or_else(|| anyhow!("unknown rest type: {kind}"))?;
            let off = OffPeriod::new(
                kind,
                staff_id.clone(),
                parse_time(&start, "start")?,
                parse_time(&end, "end")?,
            )
            .map_err(anyhow::Error::msg)?;

            let model = config.fatigue_model(clock);
            let member = roster
                .find_staff(&staff_id)
                .ok_or_else(|| anyhow!("unknown staff: {staff}"))?;
            let updated = model.update_fatigue_after_rest(member, &off);
            println!(
                "{} rested ({}) | fatigue {:.1} -> {:.1}",
                staff,
                kind.as_str(),
                member.fatigue.score,
                updated.fatigue.score
            );
            if let Some(slot) = roster.find_staff_mut(&staff_id) {
                *slot = updated;
            }
            roster.off_periods.push(off);
            storage.save(&roster)?;
            0
        }
        Commands::Evaluate { context, out } => {
            let data = fs::read(&context).with_context(|| format!("reading {context}"))?;
            let context: RuleEvaluationContext =
                serde_json::from_slice(&data).with_context(|| "parsing evaluation context")?;
            let engine = config.engine(clock)?;
            let summary = engine.evaluate(&context)?;
            if let Some(path) = out {
                io::export_summary_json(path, &summary)?;
            }
            for v in &summary.violations {
                println!("ERROR   {} | {}", v.rule_id, v.message);
            }
            for w in &summary.warnings {
                println!("WARNING {} | {}", w.rule_id, w.message);
            }
            println!("valid={} score={}", summary.is_valid, summary.score);
            // Code 2 = règles violées
            if summary.is_valid {
                0
            } else {
                2
            }
        }
        Commands::Distribute {
            slots,
            out_csv,
            out_json,
        } => {
            let slots = io::import_off_slots_csv(slots)?;
            let distribution = config.distributor().distribute(&roster.staff, &slots);
            if let Some(path) = out_csv {
                io::export_distribution_csv(path, &distribution)?;
            }
            if let Some(path) = out_json {
                io::export_distribution_json(path, &distribution)?;
            }
            for (staff, allocated) in &distribution {
                let dates: Vec<String> = allocated.iter().map(|s| s.date.to_string()).collect();
                println!("{} | {} | {}", staff.as_str(), allocated.len(), dates.join(","));
            }
            0
        }
    };

    std::process::exit(code);
}
