use crate::cache::{CacheConfig, RuleEvaluationCache};
use crate::clock::Clock;
use crate::equity::{EquityConfig, EquityDistributor};
use crate::fatigue::{FatigueConfig, FatigueModel};
use crate::rules::{EngineOptions, Rule, RuleEngine};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Configuration complète : fatigue, équité, cache et jeu de règles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fatigue: FatigueConfig,
    pub equity: EquityConfig,
    pub cache: CacheConfig,
    pub rules: Vec<Rule>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                bail!("rule id cannot be empty");
            }
            if !seen.insert(rule.id.as_str()) {
                bail!("duplicate rule id {}", rule.id);
            }
        }
        let fatigue = &self.fatigue;
        if fatigue.alert_threshold() > fatigue.critical_threshold() {
            bail!(
                "fatigue alert threshold ({}) must not exceed critical threshold ({})",
                fatigue.alert_threshold(),
                fatigue.critical_threshold()
            );
        }
        if self.equity.min_off_per_week > self.equity.max_off_per_week {
            bail!(
                "min_off_per_week ({}) must not exceed max_off_per_week ({})",
                self.equity.min_off_per_week,
                self.equity.max_off_per_week
            );
        }
        if self.cache.ttl_ms == 0 {
            bail!("cache ttl_ms must be > 0");
        }
        if self.cache.sweep_interval_ms == 0 {
            bail!("cache sweep_interval_ms must be > 0");
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_json::from_slice(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.validate()?;
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    pub fn fatigue_model(&self, clock: Arc<dyn Clock>) -> FatigueModel {
        FatigueModel::new(self.fatigue.clone()).with_clock(clock)
    }

    pub fn distributor(&self) -> EquityDistributor {
        EquityDistributor::new(self.equity)
    }

    /// Moteur avec validateurs intégrés et règles de la configuration. Le cache
    /// actif est balayé toutes les `sweep_interval_ms` en plus de l'expiration
    /// à la lecture.
    pub fn engine(&self, clock: Arc<dyn Clock>) -> Result<RuleEngine> {
        let cache = Arc::new(RuleEvaluationCache::new(self.cache.ttl(), clock.clone()));
        let options = EngineOptions {
            use_cache: self.cache.enabled,
        };
        let mut engine = RuleEngine::with_cache(options, cache)
            .with_builtin_validators(self.fatigue_model(clock));
        if self.cache.enabled {
            engine = engine.with_sweeper(self.cache.sweep_interval());
        }
        for rule in &self.rules {
            engine.add_rule(rule.clone())?;
        }
        Ok(engine)
    }
}
