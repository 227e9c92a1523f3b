//! Account and quote currencies with a static conversion table.

use std::fmt;
use std::str::FromStr;

use super::error::FxsimError;

/// Round `value` to `decimals` places, ties to even.
pub fn round_dp(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round_ties_even() / factor
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    AUD,
    CAD,
    CHF,
    NZD,
    ZAR,
    CNY,
    CZK,
    SEK,
}

impl Currency {
    pub const ALL: [Currency; 12] = [
        Currency::USD,
        Currency::EUR,
        Currency::GBP,
        Currency::JPY,
        Currency::AUD,
        Currency::CAD,
        Currency::CHF,
        Currency::NZD,
        Currency::ZAR,
        Currency::CNY,
        Currency::CZK,
        Currency::SEK,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::JPY => "JPY",
            Currency::AUD => "AUD",
            Currency::CAD => "CAD",
            Currency::CHF => "CHF",
            Currency::NZD => "NZD",
            Currency::ZAR => "ZAR",
            Currency::CNY => "CNY",
            Currency::CZK => "CZK",
            Currency::SEK => "SEK",
        }
    }

    /// Value of one unit in USD.
    pub fn exchange_rate(&self) -> f64 {
        match self {
            Currency::USD => 1.0,
            Currency::EUR => 1.2,
            Currency::GBP => 1.4,
            Currency::JPY => 0.01,
            Currency::AUD => 0.8,
            Currency::CAD => 0.9,
            Currency::CHF => 1.1,
            Currency::NZD => 0.7,
            Currency::ZAR => 0.06,
            Currency::CNY => 0.15,
            Currency::CZK => 0.05,
            Currency::SEK => 0.1,
        }
    }

    pub fn decimals(&self) -> u32 {
        match self {
            Currency::JPY | Currency::CZK => 0,
            _ => 2,
        }
    }

    /// Unrounded; callers round in the target currency.
    pub fn convert(&self, value: f64, to: Currency) -> f64 {
        if *self == to {
            return value;
        }
        value * self.exchange_rate() / to.exchange_rate()
    }

    pub fn round(&self, value: f64) -> f64 {
        round_dp(value, self.decimals())
    }

    pub fn format(&self, value: f64) -> String {
        format!("{:.*}", self.decimals() as usize, self.round(value))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = FxsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_uppercase();
        Currency::ALL
            .iter()
            .copied()
            .find(|c| c.code() == code)
            .ok_or(FxsimError::UnknownCurrency { code })
    }
}
