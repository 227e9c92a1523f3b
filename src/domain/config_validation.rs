//! Configuration validation.
//!
//! Checks every key of the `[simulation]`, `[strategy]` and `[output]`
//! sections before a run, and provides the typed readers used to build
//! the run from the same file.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::str::FromStr;

use crate::domain::currency::Currency;
use crate::domain::error::FxsimError;
use crate::domain::granularity::Granularity;
use crate::domain::position::{Direction, Lot};
use crate::ports::config_port::ConfigPort;

/// Accepts `YYYY-MM-DD HH:MM:SS` (taken as UTC) or RFC 3339.
pub fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|time| time.with_timezone(&Utc))
        })
}

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), FxsimError> {
    validate_balance(config)?;
    read_currency(config)?;
    validate_symbols(config)?;
    read_granularities(config)?;
    validate_window(config)?;
    validate_output(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), FxsimError> {
    validate_instrument(config)?;
    read_parsed::<Lot>(config, "strategy", "lot")?;
    read_parsed::<Direction>(config, "strategy", "direction")?;
    read_count::<u32>(config, "strategy", "count")?;
    read_count::<usize>(config, "strategy", "max_running")?;
    read_distance(config, "take_profit")?;
    read_distance(config, "stop_loss")?;
    Ok(())
}

pub fn read_required(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, FxsimError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(FxsimError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

pub fn read_time(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<DateTime<Utc>, FxsimError> {
    let value = read_required(config, section, key)?;
    parse_time(&value).ok_or_else(|| FxsimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("invalid time {value}, expected YYYY-MM-DD HH:MM:SS or RFC 3339"),
    })
}

/// Unknown codes surface as `UnknownCurrency`.
pub fn read_currency(config: &dyn ConfigPort) -> Result<Currency, FxsimError> {
    read_required(config, "simulation", "currency")?.parse()
}

/// `granularities` if given, otherwise just `time_step`.
pub fn read_granularities(config: &dyn ConfigPort) -> Result<Vec<Granularity>, FxsimError> {
    let time_step: Granularity = read_required(config, "simulation", "time_step")?.parse()?;
    let listed = config.get_list("simulation", "granularities");
    if listed.is_empty() {
        return Ok(vec![time_step]);
    }
    listed.iter().map(|code| code.parse()).collect()
}

/// Optional price distance; must be positive when present.
pub fn read_distance(config: &dyn ConfigPort, key: &str) -> Result<Option<f64>, FxsimError> {
    let Some(raw) = config
        .get_string("strategy", key)
        .filter(|s| !s.trim().is_empty())
    else {
        return Ok(None);
    };
    match raw.trim().parse::<f64>() {
        Ok(value) if value > 0.0 => Ok(Some(value)),
        _ => Err(FxsimError::ConfigInvalid {
            section: "strategy".to_string(),
            key: key.to_string(),
            reason: format!("{key} must be a positive price distance"),
        }),
    }
}

pub fn read_parsed<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<T, FxsimError>
where
    T: FromStr<Err = String>,
{
    read_required(config, section, key)?
        .parse()
        .map_err(|reason| FxsimError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason,
        })
}

/// Positive count defaulting to 1; must fit `T`.
pub fn read_count<T: TryFrom<i64>>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<T, FxsimError> {
    let value = config.get_int(section, key, 1);
    let invalid = |reason: String| FxsimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    };
    if value < 1 {
        return Err(invalid(format!("{key} must be at least 1")));
    }
    T::try_from(value).map_err(|_| invalid(format!("{key} = {value} is out of range")))
}

fn validate_balance(config: &dyn ConfigPort) -> Result<(), FxsimError> {
    let value = config.get_double("simulation", "balance", 0.0);
    if value <= 0.0 {
        return Err(FxsimError::ConfigInvalid {
            section: "simulation".to_string(),
            key: "balance".to_string(),
            reason: "balance must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), FxsimError> {
    let symbols = config.get_list("simulation", "symbols");
    if symbols.is_empty() {
        return Err(FxsimError::ConfigMissing {
            section: "simulation".to_string(),
            key: "symbols".to_string(),
        });
    }
    for symbol in &symbols {
        let Some((first, second)) = symbol.split_once('_') else {
            return Err(FxsimError::ConfigInvalid {
                section: "simulation".to_string(),
                key: "symbols".to_string(),
                reason: format!("{symbol} is not a currency pair like EUR_USD"),
            });
        };
        first.parse::<Currency>()?;
        second.parse::<Currency>()?;
    }
    Ok(())
}

fn validate_window(config: &dyn ConfigPort) -> Result<(), FxsimError> {
    let from = read_time(config, "simulation", "time_from")?;
    let to = read_time(config, "simulation", "time_to")?;
    if from > to {
        return Err(FxsimError::ConfigInvalid {
            section: "simulation".to_string(),
            key: "time_from".to_string(),
            reason: "time_from must not be after time_to".to_string(),
        });
    }
    Ok(())
}

fn validate_output(config: &dyn ConfigPort) -> Result<(), FxsimError> {
    read_count::<u64>(config, "output", "every").map(|_| ())
}

fn validate_instrument(config: &dyn ConfigPort) -> Result<(), FxsimError> {
    let instrument = read_required(config, "strategy", "instrument")?;
    let symbols = config.get_list("simulation", "symbols");
    if !symbols.contains(&instrument) {
        return Err(FxsimError::ConfigInvalid {
            section: "strategy".to_string(),
            key: "instrument".to_string(),
            reason: format!("{instrument} is not listed in [simulation] symbols"),
        });
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use chrono::TimeZone;

    const VALID: &str = r#"
[simulation]
balance = 50000
currency = USD
symbols = EUR_USD, GBP_USD
granularities = M1,M5
time_step = M1
time_from = 2024-04-01 09:05:00
time_to = 2024-04-01 16:45:00

[strategy]
instrument = EUR_USD
lot = MICRO
count = 1
direction = SHORT
take_profit = 0.0050
stop_loss = 0.0050
max_running = 20

[output]
every = 10
"#;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn with(key: &str, value: &str) -> FileConfigAdapter {
        let content = VALID
            .lines()
            .map(|line| {
                if line.split('=').next().map(str::trim) == Some(key) {
                    format!("{key} = {value}")
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        make_config(&content)
    }

    #[test]
    fn valid_config_passes() {
        let config = make_config(VALID);
        assert!(validate_simulation_config(&config).is_ok());
        assert!(validate_strategy_config(&config).is_ok());
    }

    #[test]
    fn parse_time_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 4, 1, 9, 5, 0).unwrap();
        assert_eq!(parse_time("2024-04-01 09:05:00"), Some(expected));
        assert_eq!(parse_time("2024-04-01T09:05:00Z"), Some(expected));
        assert_eq!(parse_time("2024-04-01T11:05:00+02:00"), Some(expected));
        assert_eq!(parse_time("2024-04-01"), None);
    }

    #[test]
    fn balance_must_be_positive() {
        let err = validate_simulation_config(&with("balance", "0")).unwrap_err();
        assert!(matches!(err, FxsimError::ConfigInvalid { key, .. } if key == "balance"));
    }

    #[test]
    fn unknown_currency_fails() {
        let err = validate_simulation_config(&with("currency", "XYZ")).unwrap_err();
        assert!(matches!(err, FxsimError::UnknownCurrency { code } if code == "XYZ"));
    }

    #[test]
    fn symbol_with_unknown_leg_fails() {
        let err = validate_simulation_config(&with("symbols", "EUR_XXX")).unwrap_err();
        assert!(matches!(err, FxsimError::UnknownCurrency { .. }));

        let err = validate_simulation_config(&with("symbols", "EURUSD")).unwrap_err();
        assert!(matches!(err, FxsimError::ConfigInvalid { key, .. } if key == "symbols"));
    }

    #[test]
    fn missing_symbols_fails() {
        let err = validate_simulation_config(&with("symbols", "")).unwrap_err();
        assert!(matches!(err, FxsimError::ConfigMissing { key, .. } if key == "symbols"));
    }

    #[test]
    fn unknown_granularity_fails() {
        let err = validate_simulation_config(&with("granularities", "M1,M7")).unwrap_err();
        assert!(matches!(err, FxsimError::UnknownGranularity { code } if code == "M7"));
    }

    #[test]
    fn granularities_default_to_time_step() {
        let config = with("granularities", "");
        assert_eq!(read_granularities(&config).unwrap(), vec![Granularity::M1]);
        assert_eq!(
            read_granularities(&make_config(VALID)).unwrap(),
            vec![Granularity::M1, Granularity::M5]
        );
    }

    #[test]
    fn invalid_time_fails() {
        let err = validate_simulation_config(&with("time_to", "tomorrow")).unwrap_err();
        assert!(matches!(err, FxsimError::ConfigInvalid { key, .. } if key == "time_to"));
    }

    #[test]
    fn inverted_window_fails() {
        let err =
            validate_simulation_config(&with("time_from", "2024-04-02 00:00:00")).unwrap_err();
        assert!(matches!(err, FxsimError::ConfigInvalid { key, .. } if key == "time_from"));
    }

    #[test]
    fn output_every_at_least_one() {
        let err = validate_simulation_config(&with("every", "0")).unwrap_err();
        assert!(matches!(err, FxsimError::ConfigInvalid { key, .. } if key == "every"));
    }

    #[test]
    fn strategy_instrument_must_be_simulated() {
        let err = validate_strategy_config(&with("instrument", "AUD_USD")).unwrap_err();
        assert!(matches!(err, FxsimError::ConfigInvalid { key, .. } if key == "instrument"));
    }

    #[test]
    fn strategy_lot_and_direction_parsed() {
        let err = validate_strategy_config(&with("lot", "HUGE")).unwrap_err();
        assert!(matches!(err, FxsimError::ConfigInvalid { key, .. } if key == "lot"));

        let err = validate_strategy_config(&with("direction", "UP")).unwrap_err();
        assert!(matches!(err, FxsimError::ConfigInvalid { key, .. } if key == "direction"));
    }

    #[test]
    fn strategy_counts_at_least_one() {
        let err = validate_strategy_config(&with("count", "0")).unwrap_err();
        assert!(matches!(err, FxsimError::ConfigInvalid { key, .. } if key == "count"));

        let err = validate_strategy_config(&with("max_running", "-1")).unwrap_err();
        assert!(matches!(err, FxsimError::ConfigInvalid { key, .. } if key == "max_running"));
    }

    #[test]
    fn count_must_fit_its_type() {
        let config = with("count", "4294967297");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, FxsimError::ConfigInvalid { key, .. } if key == "count"));
        assert_eq!(read_count::<u64>(&config, "strategy", "count").unwrap(), 4_294_967_297);
        assert_eq!(read_count::<u32>(&config, "strategy", "missing").unwrap(), 1);
    }

    #[test]
    fn distances_optional_but_positive() {
        assert_eq!(read_distance(&with("take_profit", ""), "take_profit").unwrap(), None);
        assert_eq!(
            read_distance(&make_config(VALID), "stop_loss").unwrap(),
            Some(0.005)
        );
        let err = validate_strategy_config(&with("stop_loss", "-0.001")).unwrap_err();
        assert!(matches!(err, FxsimError::ConfigInvalid { key, .. } if key == "stop_loss"));
    }
}
