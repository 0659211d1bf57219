use crate::types::YearMonth;
use serde::{Deserialize, Serialize};

// ── Calendar ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Earliest year a schedule may be generated for.
    pub min_year: i32,
    /// Latest year a schedule may be generated for.
    pub max_year: i32,
}

// ── Rotation ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    pub epoch_year:  i32,
    pub epoch_month: u32,
    /// When a persisted rotation names an engineer who has since been
    /// deleted, drop them in place. When false the lookup fails with
    /// `RotationConflict`.
    pub skip_missing_members: bool,
}

impl RotationConfig {
    pub fn epoch(&self) -> YearMonth {
        YearMonth::new(self.epoch_year, self.epoch_month)
    }
}

// ── Scoring ────────────────────────────────────────────────────────

/// Weights of the composite score. See `allocation` for how they combine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Score of the first engineer in the monthly rotation; later positions
    /// get proportionally less. Keep it below `waiting_unit * deficit_weight`.
    pub rotation_weight: f64,
    /// Bonus for a rank-1 preferred day. Rank r earns weight / r.
    pub preference_weight: f64,
    /// Ranks beyond this position earn no bonus.
    pub preference_ranks_considered: usize,
    pub deficit_weight: f64,
    /// Subtracted once an engineer has reached their requested count.
    pub soft_limit_penalty: f64,
    /// Deficit removed from the engineer picked for a day.
    pub paydown_unit: f64,
    /// Deficit added to every other eligible engineer for that day.
    pub waiting_unit: f64,
    /// Hard ceiling on shifts per engineer per month.
    pub max_shifts_per_month: u32,
}

// ── Preferences ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceConfig {
    pub min_requested: u32,
    pub max_requested: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskConfig {
    pub calendar:    CalendarConfig,
    pub rotation:    RotationConfig,
    pub scoring:     ScoringConfig,
    pub preferences: PreferenceConfig,
}

impl DeskConfig {
    /// Load from the data/ directory.
    /// In tests, use DeskConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/scheduling/desk_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: DeskConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the allocation engine cannot honour.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.calendar.min_year > self.calendar.max_year {
            anyhow::bail!(
                "calendar.min_year {} exceeds max_year {}",
                self.calendar.min_year, self.calendar.max_year
            );
        }
        if !(1..=12).contains(&self.rotation.epoch_month) {
            anyhow::bail!("rotation.epoch_month {} out of 1..=12", self.rotation.epoch_month);
        }
        let p = &self.preferences;
        if p.min_requested == 0 || p.min_requested > p.max_requested {
            anyhow::bail!(
                "preferences range {}..={} is empty or starts at zero",
                p.min_requested, p.max_requested
            );
        }
        let s = &self.scoring;
        if s.max_shifts_per_month == 0 {
            anyhow::bail!("scoring.max_shifts_per_month must be positive");
        }
        if s.paydown_unit < 0.0 || s.waiting_unit < 0.0 || s.soft_limit_penalty < 0.0 {
            anyhow::bail!("scoring units and penalty must be non-negative");
        }
        Ok(())
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self {
            calendar: CalendarConfig {
                min_year: 2000,
                max_year: 2100,
            },
            rotation: RotationConfig {
                epoch_year: 2000,
                epoch_month: 1,
                skip_missing_members: true,
            },
            scoring: ScoringConfig {
                rotation_weight: 0.1,
                preference_weight: 10.0,
                preference_ranks_considered: 10,
                deficit_weight: 1.0,
                soft_limit_penalty: 1_000.0,
                paydown_unit: 1.0,
                waiting_unit: 0.25,
                max_shifts_per_month: 8,
            },
            preferences: PreferenceConfig {
                min_requested: 1,
                max_requested: 8,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        DeskConfig::default_test().validate().unwrap();
    }

    #[test]
    fn inverted_year_span_is_rejected() {
        let mut config = DeskConfig::default_test();
        config.calendar.min_year = 2200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");
        let loaded = DeskConfig::load(dir).expect("load data/scheduling/desk_config.json");
        let defaults = DeskConfig::default_test();
        assert_eq!(loaded.scoring.max_shifts_per_month, defaults.scoring.max_shifts_per_month);
        assert_eq!(loaded.preferences.max_requested, defaults.preferences.max_requested);
        assert!(loaded.rotation.skip_missing_members);
    }
}
