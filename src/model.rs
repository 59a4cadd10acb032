use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identifiant fort pour un membre du personnel
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StaffId(String);

impl StaffId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifiant fort pour une attribution (garde, astreinte, ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShiftId(String);

impl ShiftId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Entrée d'historique de fatigue. Jamais réécrite une fois ajoutée.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueEntry {
    pub date: DateTime<Utc>,
    pub score: f64,
    pub reason: String,
}

/// Fatigue cumulée d'un membre du personnel.
///
/// Le score n'est jamais négatif et `history` est ordonné dans le temps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueState {
    pub score: f64,
    #[serde(default)]
    pub history: Vec<FatigueEntry>,
    pub last_update: DateTime<Utc>,
}

impl FatigueState {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            score: 0.0,
            history: Vec::new(),
            last_update: at,
        }
    }

    pub fn with_score(score: f64, at: DateTime<Utc>) -> Self {
        Self {
            score: score.max(0.0),
            history: Vec::new(),
            last_update: at,
        }
    }
}

/// Membre du personnel (médecin, IADE, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: StaffId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualifications: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub fatigue: FatigueState,
}

impl StaffMember {
    pub fn new<S: Into<String>>(name: S, at: DateTime<Utc>) -> Self {
        Self {
            id: StaffId::random(),
            name: name.into(),
            qualifications: Vec::new(),
            department: None,
            service: None,
            fatigue: FatigueState::new(at),
        }
    }

    pub fn with_id<I: AsRef<str>, S: Into<String>>(id: I, name: S, at: DateTime<Utc>) -> Self {
        Self {
            id: StaffId::new(id),
            ..Self::new(name, at)
        }
    }
}

/// Type d'attribution. Les types inconnus sont lus comme `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributionType {
    Duty,
    OnCall,
    Supervision,
    Pediatric,
    Consultation,
    Surgery,
    Night,
    #[serde(other)]
    Other,
}

impl AttributionType {
    pub fn as_str(self) -> &'static str {
        match self {
            AttributionType::Duty => "DUTY",
            AttributionType::OnCall => "ON_CALL",
            AttributionType::Supervision => "SUPERVISION",
            AttributionType::Pediatric => "PEDIATRIC",
            AttributionType::Consultation => "CONSULTATION",
            AttributionType::Surgery => "SURGERY",
            AttributionType::Night => "NIGHT",
            AttributionType::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "DUTY" => Some(AttributionType::Duty),
            "ON_CALL" => Some(AttributionType::OnCall),
            "SUPERVISION" => Some(AttributionType::Supervision),
            "PEDIATRIC" => Some(AttributionType::Pediatric),
            "CONSULTATION" => Some(AttributionType::Consultation),
            "SURGERY" => Some(AttributionType::Surgery),
            "NIGHT" => Some(AttributionType::Night),
            "OTHER" => Some(AttributionType::Other),
            _ => None,
        }
    }
}

/// Attribution (UTC). Immuable une fois créée : les points de fatigue en
/// sont dérivés, jamais stockés dessus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub id: ShiftId,
    pub kind: AttributionType,
    pub staff_id: StaffId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervision_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
}

impl Attribution {
    /// Crée une attribution en validant que `end > start`.
    pub fn new(
        kind: AttributionType,
        staff_id: StaffId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, String> {
        if end <= start {
            return Err("end must be strictly after start".to_string());
        }
        Ok(Self {
            id: ShiftId::random(),
            kind,
            staff_id,
            start,
            end,
            service: None,
            supervision_count: None,
            specialty: None,
        })
    }

    pub fn with_id<S: AsRef<str>>(mut self, id: S) -> Self {
        self.id = ShiftId::new(id);
        self
    }

    pub fn with_service<S: Into<String>>(mut self, service: S) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_specialty<S: Into<String>>(mut self, specialty: S) -> Self {
        self.specialty = Some(specialty.into());
        self
    }

    pub fn with_supervision_count(mut self, count: u32) -> Self {
        self.supervision_count = Some(count);
        self
    }

    /// Durée en minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Type de repos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OffPeriodType {
    FullDay,
    HalfDay,
    Weekend,
    Leave,
}

impl OffPeriodType {
    pub fn as_str(self) -> &'static str {
        match self {
            OffPeriodType::FullDay => "FULL_DAY",
            OffPeriodType::HalfDay => "HALF_DAY",
            OffPeriodType::Weekend => "WEEKEND",
            OffPeriodType::Leave => "LEAVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "FULL_DAY" => Some(OffPeriodType::FullDay),
            "HALF_DAY" => Some(OffPeriodType::HalfDay),
            "WEEKEND" => Some(OffPeriodType::Weekend),
            "LEAVE" => Some(OffPeriodType::Leave),
            _ => None,
        }
    }
}

/// Période de repos effectuée (intervalle UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffPeriod {
    pub id: String,
    pub kind: OffPeriodType,
    pub staff_id: StaffId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl OffPeriod {
    pub fn new(
        kind: OffPeriodType,
        staff_id: StaffId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, String> {
        if end < start {
            return Err("off period end must not precede start".to_string());
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            kind,
            staff_id,
            start,
            end,
        })
    }
}

/// Créneau de repos disponible, pas encore attribué.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffSlot {
    pub id: String,
    pub date: NaiveDate,
    pub kind: String,
    #[serde(default)]
    pub is_weekend: bool,
    #[serde(default)]
    pub is_holiday: bool,
}

/// Répartition des créneaux de repos : reconstruite entièrement à chaque calcul.
pub type Distribution = BTreeMap<StaffId, Vec<OffSlot>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LeaveStatus::Pending => "PENDING",
            LeaveStatus::Approved => "APPROVED",
            LeaveStatus::Rejected => "REJECTED",
            LeaveStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Demande de congé (dates incluses).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: String,
    pub staff_id: StaffId,
    pub kind: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: LeaveStatus,
}

/// État complet côté appelant (effectifs, planning, repos).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Roster {
    #[serde(default)]
    pub staff: Vec<StaffMember>,
    #[serde(default)]
    pub shifts: Vec<Attribution>,
    #[serde(default)]
    pub leaves: Vec<LeaveRequest>,
    #[serde(default)]
    pub off_periods: Vec<OffPeriod>,
}

impl Roster {
    pub fn find_staff<'a>(&'a self, id: &StaffId) -> Option<&'a StaffMember> {
        self.staff.iter().find(|s| &s.id == id)
    }
    pub fn find_staff_mut(&mut self, id: &StaffId) -> Option<&mut StaffMember> {
        self.staff.iter_mut().find(|s| &s.id == id)
    }
    pub fn shifts_of<'a>(&'a self, id: &'a StaffId) -> impl Iterator<Item = &'a Attribution> + 'a {
        self.shifts.iter().filter(move |s| &s.staff_id == id)
    }
    pub fn leaves_of<'a>(&'a self, id: &'a StaffId) -> impl Iterator<Item = &'a LeaveRequest> + 'a {
        self.leaves.iter().filter(move |l| &l.staff_id == id)
    }
}
