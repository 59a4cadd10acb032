//! Cache TTL des évaluations et des jeux de règles.
//!
//! Une entrée expirée est absente à la lecture (et supprimée à ce moment-là),
//! qu'un balayage de fond soit passé ou non.

use crate::clock::{Clock, SystemClock};
use crate::model::StaffId;
use crate::rules::{EvaluationSummary, Rule, RuleEvaluationContext};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_ms: u64,
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: 5 * 60 * 1000,
            sweep_interval_ms: 60 * 1000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.ttl_ms).unwrap_or(i64::MAX))
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Entrée de cache : `expires_at = timestamp + ttl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn new(data: T, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            data,
            timestamp: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub evaluations: usize,
    pub rule_sets: usize,
}

/// Clé canonique d'un contexte : projection réduite, ids existants triés.
pub fn context_key(context: &RuleEvaluationContext) -> String {
    let shift = context.proposed_shift.as_ref().map(|s| {
        json!({
            "id": s.id.as_str(),
            "doctorId": s.staff_id.as_str(),
            "type": s.kind.as_str(),
            "startTime": s.start.to_rfc3339(),
            "endTime": s.end.to_rfc3339(),
        })
    });
    let leave = context.proposed_leave.as_ref().map(|l| {
        json!({
            "id": l.id,
            "doctorId": l.staff_id.as_str(),
            "type": l.kind,
            "startDate": l.start_date.to_string(),
            "endDate": l.end_date.to_string(),
            "status": l.status.as_str(),
        })
    });

    let mut shift_ids: Vec<&str> = context
        .existing_shifts
        .iter()
        .flatten()
        .map(|s| s.id.as_str())
        .collect();
    shift_ids.sort_unstable();
    let mut leave_ids: Vec<&str> = context
        .existing_leaves
        .iter()
        .flatten()
        .map(|l| l.id.as_str())
        .collect();
    leave_ids.sort_unstable();

    json!({
        "proposedShift": shift,
        "proposedLeave": leave,
        "doctorId": context.doctor.as_ref().map(|d| d.id.as_str()),
        "currentDate": context.current_date.map(|d| d.to_string()),
        "existingShiftIds": shift_ids,
        "existingLeaveIds": leave_ids,
    })
    .to_string()
}

/// Clé d'un jeu de règles : seuls `id`, `updatedAt` et `enabled` comptent.
pub fn rules_key(rules: &[Rule]) -> String {
    let mut reduced: Vec<&Rule> = rules.iter().collect();
    reduced.sort_by(|a, b| a.id.cmp(&b.id));
    let reduced: Vec<serde_json::Value> = reduced
        .into_iter()
        .map(|r| {
            json!({
                "id": r.id,
                "updatedAt": r.updated_at.to_rfc3339(),
                "enabled": r.enabled,
            })
        })
        .collect();
    serde_json::Value::Array(reduced).to_string()
}

#[derive(Debug)]
pub struct RuleEvaluationCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    evaluations: Mutex<HashMap<String, CacheEntry<EvaluationSummary>>>,
    rule_sets: Mutex<HashMap<String, CacheEntry<Vec<Rule>>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lookup<T: Clone>(
    map: &Mutex<HashMap<String, CacheEntry<T>>>,
    key: &str,
    now: DateTime<Utc>,
) -> Option<T> {
    let mut map = lock(map);
    let expired = map.get(key)?.is_expired(now);
    if expired {
        map.remove(key);
        return None;
    }
    map.get(key).map(|e| e.data.clone())
}

impl Default for RuleEvaluationCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl RuleEvaluationCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            evaluations: Mutex::new(HashMap::new()),
            rule_sets: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), Arc::new(SystemClock))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get_evaluation(&self, context: &RuleEvaluationContext) -> Option<EvaluationSummary> {
        let key = context_key(context);
        let hit = lookup(&self.evaluations, &key, self.clock.now());
        tracing::debug!(hit = hit.is_some(), "evaluation cache lookup");
        hit
    }

    pub fn set_evaluation(&self, context: &RuleEvaluationContext, summary: EvaluationSummary) {
        let entry = CacheEntry::new(summary, self.clock.now(), self.ttl);
        lock(&self.evaluations).insert(context_key(context), entry);
    }

    pub fn get_rules(&self, rules: &[Rule]) -> Option<Vec<Rule>> {
        lookup(&self.rule_sets, &rules_key(rules), self.clock.now())
    }

    pub fn set_rules(&self, rules: &[Rule], data: Vec<Rule>) {
        let entry = CacheEntry::new(data, self.clock.now(), self.ttl);
        lock(&self.rule_sets).insert(rules_key(rules), entry);
    }

    /// Purge toutes les entrées dont la clé référence ce membre.
    pub fn invalidate_for_doctor(&self, doctor: &StaffId) -> usize {
        let quoted = serde_json::Value::from(doctor.as_str()).to_string();
        let needle = format!("\"doctorId\":{quoted}");
        let mut removed = 0;
        {
            let mut map = lock(&self.evaluations);
            let before = map.len();
            map.retain(|key, _| !key.contains(&needle));
            removed += before - map.len();
        }
        {
            let mut map = lock(&self.rule_sets);
            let before = map.len();
            map.retain(|key, _| !key.contains(&needle));
            removed += before - map.len();
        }
        tracing::debug!(doctor = doctor.as_str(), removed, "cache invalidated for doctor");
        removed
    }

    pub fn clear(&self) {
        lock(&self.evaluations).clear();
        lock(&self.rule_sets).clear();
    }

    /// Supprime les entrées expirées des deux tables.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        {
            let mut map = lock(&self.evaluations);
            let before = map.len();
            map.retain(|_, e| !e.is_expired(now));
            removed += before - map.len();
        }
        {
            let mut map = lock(&self.rule_sets);
            let before = map.len();
            map.retain(|_, e| !e.is_expired(now));
            removed += before - map.len();
        }
        if removed > 0 {
            tracing::debug!(removed, "expired cache entries swept");
        }
        removed
    }

    /// Entrées non expirées.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        CacheStats {
            evaluations: lock(&self.evaluations)
                .values()
                .filter(|e| !e.is_expired(now))
                .count(),
            rule_sets: lock(&self.rule_sets)
                .values()
                .filter(|e| !e.is_expired(now))
                .count(),
        }
    }

    /// Entrées physiquement présentes, expirées ou non.
    pub fn len(&self) -> usize {
        lock(&self.evaluations).len() + lock(&self.rule_sets).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lance le balayage périodique sur un thread dédié.
    ///
    /// Le thread s'arrête quand le garde est relâché ou quand le cache disparaît.
    pub fn start_sweeper(self: &Arc<Self>, every: std::time::Duration) -> CacheSweeper {
        let cache: Weak<Self> = Arc::downgrade(self);
        let (stop, rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || loop {
            match rx.recv_timeout(every) {
                Err(RecvTimeoutError::Timeout) => match cache.upgrade() {
                    Some(cache) => {
                        cache.sweep_expired();
                    }
                    None => break,
                },
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        CacheSweeper {
            stop: Some(stop),
            handle: Some(handle),
        }
    }
}

/// Garde du balayage de fond ; l'arrête et attend le thread au drop.
#[derive(Debug)]
pub struct CacheSweeper {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
