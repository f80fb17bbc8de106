use crate::domain::{parse_timestamp, Decimal, FeeSpec, NotionalBpsFee, PerUnitFee, Symbol};
use crate::ledger::{ApplyOptions, StaticInstrumentRegistry};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: String,
    pub eps_ns: i64,
    pub allow_rebates: bool,
    pub verbose: bool,
    pub init_date: DateTime<Utc>,
    pub contract_multipliers: Vec<(Symbol, Decimal)>,
    pub fee_rule: Option<FeeRuleConfig>,
}

/// Fee rule selected through `FEE_RULE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeRuleConfig {
    Fixed(Decimal),
    PerUnit(Decimal),
    Bps { bps: Decimal, min_fee: Decimal },
}

impl FeeRuleConfig {
    pub fn to_fee_spec(self) -> FeeSpec {
        match self {
            FeeRuleConfig::Fixed(amount) => FeeSpec::Fixed(amount),
            FeeRuleConfig::PerUnit(rate) => FeeSpec::computed(PerUnitFee { rate }),
            FeeRuleConfig::Bps { bps, min_fee } => {
                FeeSpec::computed(NotionalBpsFee { bps, min_fee })
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let eps_ns = env_map
            .get("TXN_EPS_NS")
            .map(|s| s.as_str())
            .unwrap_or("1000")
            .parse::<i64>()
            .ok()
            .filter(|ns| *ns > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "TXN_EPS_NS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let allow_rebates = parse_bool(&env_map, "ALLOW_REBATES")?;
        let verbose = parse_bool(&env_map, "TXN_VERBOSE")?;

        let init_raw = env_map
            .get("INIT_DATE")
            .map(|s| s.as_str())
            .unwrap_or("1950-01-01");
        let init_date = parse_timestamp(init_raw).ok_or_else(|| {
            ConfigError::InvalidValue(
                "INIT_DATE".to_string(),
                format!("must be RFC 3339 or YYYY-MM-DD, got {}", init_raw),
            )
        })?;

        let contract_multipliers = parse_multipliers_from_map(&env_map)?;

        let fee_rule = env_map
            .get("FEE_RULE")
            .map(|raw| parse_fee_rule(raw))
            .transpose()?;

        Ok(Config {
            database_path,
            eps_ns,
            allow_rebates,
            verbose,
            init_date,
            contract_multipliers,
            fee_rule,
        })
    }

    pub fn eps(&self) -> Duration {
        Duration::nanoseconds(self.eps_ns)
    }

    pub fn registry(&self) -> StaticInstrumentRegistry {
        self.contract_multipliers.iter().cloned().collect()
    }

    pub fn apply_options(&self) -> ApplyOptions {
        ApplyOptions {
            allow_rebates: self.allow_rebates,
            eps: self.eps(),
            verbose: self.verbose,
            contract_multiplier: None,
        }
    }
}

fn parse_bool(env_map: &HashMap<String, String>, key: &str) -> Result<bool, ConfigError> {
    match env_map.get(key).map(|s| s.as_str()).unwrap_or("false") {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be true or false, got {}", other),
        )),
    }
}

fn parse_multipliers_from_map(
    env_map: &HashMap<String, String>,
) -> Result<Vec<(Symbol, Decimal)>, ConfigError> {
    if let Some(pairs) = env_map.get("CONTRACT_MULTIPLIERS") {
        parse_multiplier_entries(pairs.split(','), "CONTRACT_MULTIPLIERS")
    } else if let Some(file_path) = env_map.get("CONTRACT_MULTIPLIERS_FILE") {
        let content = std::fs::read_to_string(file_path).map_err(|_| {
            ConfigError::InvalidValue(
                "CONTRACT_MULTIPLIERS_FILE".to_string(),
                "file not found or unreadable".to_string(),
            )
        })?;
        parse_multiplier_entries(content.lines(), "CONTRACT_MULTIPLIERS_FILE")
    } else {
        Ok(Vec::new())
    }
}

fn parse_multiplier_entries<'a>(
    entries: impl Iterator<Item = &'a str>,
    key: &str,
) -> Result<Vec<(Symbol, Decimal)>, ConfigError> {
    entries
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| -> Result<(Symbol, Decimal), ConfigError> {
            let (symbol, multiplier) = entry.split_once('=').ok_or_else(|| {
                ConfigError::InvalidValue(
                    key.to_string(),
                    format!("expected SYMBOL=MULT, got {}", entry),
                )
            })?;
            let multiplier = Decimal::from_str_canonical(multiplier).map_err(|_| {
                ConfigError::InvalidValue(
                    key.to_string(),
                    format!("invalid multiplier in {}", entry),
                )
            })?;
            Ok((Symbol::new(symbol.trim()), multiplier))
        })
        .collect()
}

fn parse_fee_rule(raw: &str) -> Result<FeeRuleConfig, ConfigError> {
    let invalid = || {
        ConfigError::InvalidValue(
            "FEE_RULE".to_string(),
            format!("must be fixed:<amt>, per_unit:<rate> or bps:<bps>[:<min>], got {}", raw),
        )
    };
    let mut parts = raw.trim().split(':');
    let kind = parts.next().ok_or_else(invalid)?;
    let mut next_decimal = || {
        parts
            .next()
            .and_then(|s| Decimal::from_str_canonical(s).ok())
    };

    let rule = match kind {
        "fixed" => FeeRuleConfig::Fixed(next_decimal().ok_or_else(invalid)?),
        "per_unit" => FeeRuleConfig::PerUnit(next_decimal().ok_or_else(invalid)?),
        "bps" => {
            let bps = next_decimal().ok_or_else(invalid)?;
            let min_fee = next_decimal().unwrap_or_default();
            FeeRuleConfig::Bps { bps, min_fee }
        }
        _ => return Err(invalid()),
    };
    Ok(rule)
}
