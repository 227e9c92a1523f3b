//! OHLC candle representation.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
}

impl Candle {
    pub fn new(open: f64, close: f64, high: f64, low: f64) -> Self {
        Candle {
            open,
            close,
            high,
            low,
        }
    }

    /// Sign of close - open: 1 bullish, -1 bearish, 0 flat.
    pub fn direction(&self) -> i8 {
        if self.close > self.open {
            1
        } else if self.close < self.open {
            -1
        } else {
            0
        }
    }

    /// (open + low + high + close) / 4
    pub fn mean(&self) -> f64 {
        (self.open + self.low + self.high + self.close) / 4.0
    }

    pub fn span(&self) -> f64 {
        self.high - self.low
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn shadow_up(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn shadow_down(&self) -> f64 {
        self.open.min(self.close) - self.low
    }
}
