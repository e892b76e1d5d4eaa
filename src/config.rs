//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How cross-section compatibility between a demand and a stock piece is judged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CrossSectionPolicy {
    /// Reject when `stock_area / demand_area` exceeds the cap.
    RatioCeiling { max_stock_to_demand_area_ratio: f64 },
    /// Reject when `demand_area / stock_area` falls below the floor.
    RatioFloor { min_cross_section_ratio: f64 },
}

impl Default for CrossSectionPolicy {
    fn default() -> Self {
        CrossSectionPolicy::RatioCeiling {
            max_stock_to_demand_area_ratio: 10.0,
        }
    }
}

/// How strength classes partition the passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassPolicy {
    /// One unbanded pass per tier; class is only a feasibility minimum.
    #[default]
    HardMinimum,
    /// One pass per distinct class `c`, ascending: demands of class `<= c`
    /// against stock of class `>= c`.
    Upgrade,
}

/// Multi-demand consolidation onto one stock piece. No defaults: callers
/// must choose both values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// Followers must occupy at least this share of the stock's cross-section.
    pub min_cross_section_ratio: f64,
    /// Width of the band around the lead's ratio that counts as lead-compatible.
    pub cross_section_tolerance: f64,
}

/// Buffers applied when a custom piece is synthesized for a demand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub length_buffer: f64,
    pub section_buffer: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            length_buffer: 0.05,
            section_buffer: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Remnants at or above this length are recovered as leftover stock.
    pub minimum_significant_leftover_length: f64,

    pub cross_section_policy: CrossSectionPolicy,

    pub class_policy: ClassPolicy,

    /// Consolidation is off unless this is set.
    pub grouping: Option<GroupingConfig>,

    /// When set, demands that nothing else can serve get a custom piece.
    pub synthesis: Option<SynthesisConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            minimum_significant_leftover_length: 100.0,
            cross_section_policy: CrossSectionPolicy::default(),
            class_policy: ClassPolicy::HardMinimum,
            grouping: None,
            synthesis: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Market/extended mode: ratio-floor sections, upgradeable classes,
    /// grouping and custom synthesis all enabled.
    pub fn extended(min_cross_section_ratio: f64, cross_section_tolerance: f64) -> Self {
        Self {
            cross_section_policy: CrossSectionPolicy::RatioFloor {
                min_cross_section_ratio,
            },
            class_policy: ClassPolicy::Upgrade,
            grouping: Some(GroupingConfig {
                min_cross_section_ratio,
                cross_section_tolerance,
            }),
            synthesis: Some(SynthesisConfig::default()),
            ..Self::default()
        }
    }

    pub fn with_minimum_leftover(mut self, length: f64) -> Self {
        self.minimum_significant_leftover_length = length;
        self
    }

    pub fn with_cross_section_policy(mut self, policy: CrossSectionPolicy) -> Self {
        self.cross_section_policy = policy;
        self
    }

    pub fn with_class_policy(mut self, policy: ClassPolicy) -> Self {
        self.class_policy = policy;
        self
    }

    pub fn with_grouping(mut self, min_cross_section_ratio: f64, cross_section_tolerance: f64) -> Self {
        self.grouping = Some(GroupingConfig {
            min_cross_section_ratio,
            cross_section_tolerance,
        });
        self
    }

    pub fn with_synthesis(mut self, synthesis: SynthesisConfig) -> Self {
        self.synthesis = Some(synthesis);
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.minimum_significant_leftover_length >= 0.0) {
            return Err(ConfigError::Invalid(
                "minimum_significant_leftover_length must be non-negative".to_string(),
            ));
        }
        match self.cross_section_policy {
            CrossSectionPolicy::RatioCeiling {
                max_stock_to_demand_area_ratio,
            } if !(max_stock_to_demand_area_ratio > 0.0) => {
                return Err(ConfigError::Invalid(
                    "max_stock_to_demand_area_ratio must be positive".to_string(),
                ));
            }
            CrossSectionPolicy::RatioFloor {
                min_cross_section_ratio,
            } if !(min_cross_section_ratio >= 0.0) => {
                return Err(ConfigError::Invalid(
                    "min_cross_section_ratio must be non-negative".to_string(),
                ));
            }
            _ => {}
        }
        if let Some(g) = self.grouping
            && (!(g.min_cross_section_ratio >= 0.0) || !(g.cross_section_tolerance >= 0.0))
        {
            return Err(ConfigError::Invalid(
                "grouping ratio and tolerance must be non-negative".to_string(),
            ));
        }
        if let Some(s) = self.synthesis
            && (!(s.length_buffer >= 0.0) || !(s.section_buffer >= 0.0))
        {
            return Err(ConfigError::Invalid(
                "synthesis buffers must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
