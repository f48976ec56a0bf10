//! Runtime settings that can be modified while the scope is running
//!
//! These settings control triggering, the timebase and per-trace display
//! attributes. Changes to the trigger go through the quiescence barrier
//! since the real-time sampler reads the trigger configuration every period.
//!
//! # Main Types
//!
//! - [`TriggerConfig`] - Trigger direction, threshold, channel, holding and holdoff
//! - [`Timebase`] - Grid divisions and time per division
//! - [`TraceStyle`] - Color, width and line style of a trace
//!
//! # Scale Ladder
//!
//! Vertical scales follow the 1-2-5 sequence from 10 V/div down to 1 pV/div.
//! Index 0 is 10 V/div, index 2 is 2 V/div (the default for new channels),
//! index 39 is 1 pV/div.

use crate::types::{ChannelId, TriggerDirection};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of entries in the volts/div ladder
pub const SCALE_STEPS: usize = 40;

/// Number of entries in the time/div ladder (5 s/div .. 1 us/div)
pub const TIME_STEPS: usize = 21;

/// Scale assigned to newly added channels (2 V/div)
pub const DEFAULT_SCALE: f64 = 2.0;

const SCALE_UNITS: [&str; 5] = ["V", "mV", "uV", "nV", "pV"];

/// Volts per division for a ladder index
pub fn scale_from_index(index: usize) -> f64 {
    let decade = (index / 3) as i32;
    match index % 3 {
        0 => 10f64.powi(1 - decade),
        1 => 5.0 * 10f64.powi(-decade),
        _ => 2.0 * 10f64.powi(-decade),
    }
}

/// Closest ladder index for a volts/div value
pub fn index_from_scale(scale: f64) -> usize {
    if !(scale.is_finite() && scale > 0.0) {
        return 2;
    }
    let index = (3.0 * ((1.0 / scale).log10() + 1.0)).round();
    index.clamp(0.0, (SCALE_STEPS - 1) as f64) as usize
}

/// Human readable label for a volts/div value, e.g. "500 mV/div"
pub fn scale_label(scale: f64) -> String {
    let index = index_from_scale(scale);
    let mantissa = match index % 3 {
        0 => 10,
        1 => 5,
        _ => 2,
    };
    // 10 V, 5 V, 2 V, 1 V, 500 mV ... each unit spans three ladder decades
    let (value, unit) = if index < 3 {
        (mantissa, 0)
    } else {
        let shifted = index - 3;
        let unit = shifted / 9;
        let within = shifted % 9;
        let value = match within {
            0 => 1,
            1 => 500,
            2 => 200,
            3 => 100,
            4 => 50,
            5 => 20,
            6 => 10,
            7 => 5,
            _ => 2,
        };
        // Entries 1..=8 of each block belong to the next smaller unit
        if within == 0 {
            (value, unit)
        } else {
            (value, unit + 1)
        }
    };
    let unit = SCALE_UNITS[unit.min(SCALE_UNITS.len() - 1)];
    format!("{} {}/div", value, unit)
}

/// Milliseconds per division for a time ladder index (5 s/div .. 1 us/div)
pub fn div_t_from_index(index: usize) -> f64 {
    let decade = (index / 3) as i32;
    match index % 3 {
        1 => 2.0 * 10f64.powi(3 - decade),
        2 => 10f64.powi(3 - decade),
        _ => 5.0 * 10f64.powi(3 - decade),
    }
}

/// Trigger configuration read by the sampler every period
///
/// `holding` and `holdoff` are carried here but only the consumer-side
/// trigger gate acts on them; the sampler applies the straddle test alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerConfig {
    /// Which crossings to report
    pub direction: TriggerDirection,
    /// Threshold value
    pub threshold: f64,
    /// Channel the trigger watches, if any
    pub channel: Option<ChannelId>,
    /// Freeze the display after the first accepted trigger
    pub holding: bool,
    /// Minimum time between accepted triggers
    pub holdoff: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            direction: TriggerDirection::None,
            threshold: 0.0,
            channel: None,
            holding: false,
            holdoff: Duration::ZERO,
        }
    }
}

impl TriggerConfig {
    /// Create an edge trigger on `channel`
    pub fn on(channel: ChannelId, direction: TriggerDirection, threshold: f64) -> Self {
        Self {
            direction,
            threshold,
            channel: Some(channel),
            ..Self::default()
        }
    }

    /// Whether the sampler should evaluate crossings at all
    pub fn is_armed(&self) -> bool {
        self.channel.is_some() && self.direction != TriggerDirection::None
    }

    /// Force the trigger off, keeping threshold and holdoff settings
    pub fn disable(&mut self) {
        self.direction = TriggerDirection::None;
        self.channel = None;
    }

    /// A trigger without a channel has no direction
    pub fn normalized(mut self) -> Self {
        if self.channel.is_none() {
            self.direction = TriggerDirection::None;
        }
        self
    }
}

/// Display grid and time per division
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timebase {
    /// Horizontal divisions
    pub div_x: u32,
    /// Vertical divisions
    pub div_y: u32,
    /// Milliseconds per horizontal division
    pub div_t_ms: f64,
}

impl Default for Timebase {
    fn default() -> Self {
        Self {
            div_x: 10,
            div_y: 8,
            div_t_ms: 1.0,
        }
    }
}

impl Timebase {
    /// Number of samples one screen holds at the given real-time period
    pub fn data_size(&self, period: Duration) -> usize {
        let period_us = period.as_micros() as f64;
        if period_us <= 0.0 {
            return 1;
        }
        let samples = (self.div_t_ms * 1e3 * self.div_x as f64 / period_us).ceil();
        // Saturating float cast; NaN becomes 0
        (samples as usize).saturating_add(1)
    }

    /// Clamp divisions into the range the display supports (1..=25) and the
    /// time per division onto the time ladder's span
    ///
    /// A non-finite time per division falls back to the default.
    pub fn clamped(mut self) -> Self {
        self.div_x = self.div_x.clamp(1, 25);
        self.div_y = self.div_y.clamp(1, 25);
        self.div_t_ms = if self.div_t_ms.is_finite() {
            self.div_t_ms.clamp(div_t_from_index(TIME_STEPS - 1), div_t_from_index(0))
        } else {
            Timebase::default().div_t_ms
        };
        self
    }
}

/// Trace color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TraceColor {
    #[default]
    Red,
    Yellow,
    Green,
    Blue,
    Magenta,
    Cyan,
    Black,
}

impl TraceColor {
    /// Color name in "#rrggbb" form
    pub fn hex(&self) -> &'static str {
        match self {
            TraceColor::Red => "#ff0000",
            TraceColor::Yellow => "#ffff00",
            TraceColor::Green => "#00ff00",
            TraceColor::Blue => "#0000ff",
            TraceColor::Magenta => "#ff00ff",
            TraceColor::Cyan => "#00ffff",
            TraceColor::Black => "#000000",
        }
    }
}

/// Trace line style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LineStyle {
    #[default]
    Solid,
    Dash,
    Dot,
    DashDot,
    DashDotDot,
}

/// Display-only attributes of a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceStyle {
    pub color: TraceColor,
    /// Line width in pixels (1..=5)
    pub width: u8,
    pub line: LineStyle,
}

impl Default for TraceStyle {
    fn default() -> Self {
        Self {
            color: TraceColor::Red,
            width: 1,
            line: LineStyle::Solid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() <= b.abs() * 1e-9
    }

    #[test]
    fn test_scale_ladder_endpoints() {
        assert!(approx(scale_from_index(0), 10.0));
        assert!(approx(scale_from_index(1), 5.0));
        assert!(approx(scale_from_index(2), 2.0));
        assert!(approx(scale_from_index(3), 1.0));
        assert!(approx(scale_from_index(4), 0.5));
        assert!(approx(scale_from_index(SCALE_STEPS - 1), 1e-12));
    }

    #[test]
    fn test_scale_index_inverse() {
        for i in 0..SCALE_STEPS {
            assert_eq!(index_from_scale(scale_from_index(i)), i, "index {}", i);
        }
    }

    #[test]
    fn test_scale_labels() {
        assert_eq!(scale_label(10.0), "10 V/div");
        assert_eq!(scale_label(2.0), "2 V/div");
        assert_eq!(scale_label(1.0), "1 V/div");
        assert_eq!(scale_label(0.5), "500 mV/div");
        assert_eq!(scale_label(0.002), "2 mV/div");
        assert_eq!(scale_label(0.001), "1 mV/div");
        assert_eq!(scale_label(5e-4), "500 uV/div");
        assert_eq!(scale_label(1e-12), "1 pV/div");
    }

    #[test]
    fn test_time_ladder() {
        assert!(approx(div_t_from_index(0), 5000.0));
        assert!(approx(div_t_from_index(1), 2000.0));
        assert!(approx(div_t_from_index(2), 1000.0));
        assert!(approx(div_t_from_index(11), 1.0));
        assert!(approx(div_t_from_index(TIME_STEPS - 1), 1e-3));
    }

    #[test]
    fn test_data_size() {
        let tb = Timebase::default();
        // 10 divisions of 1 ms at a 1 ms period
        assert_eq!(tb.data_size(Duration::from_millis(1)), 11);
        // 10 divisions of 1 ms at 100 us
        assert_eq!(tb.data_size(Duration::from_micros(100)), 101);
    }

    #[test]
    fn test_trigger_normalized() {
        let cfg = TriggerConfig {
            direction: TriggerDirection::Rising,
            ..TriggerConfig::default()
        };
        assert_eq!(cfg.normalized().direction, TriggerDirection::None);
        assert!(!cfg.is_armed());

        let cfg = TriggerConfig::on(ChannelId(1), TriggerDirection::Falling, 0.5);
        assert!(cfg.is_armed());
        let mut off = cfg;
        off.disable();
        assert!(!off.is_armed());
        assert_eq!(off.threshold, 0.5);
    }

    #[test]
    fn test_timebase_clamped() {
        let tb = Timebase {
            div_x: 0,
            div_y: 99,
            div_t_ms: 1.0,
        }
        .clamped();
        assert_eq!(tb.div_x, 1);
        assert_eq!(tb.div_y, 25);
        assert_eq!(tb.div_t_ms, 1.0);
    }

    #[test]
    fn test_timebase_clamps_time_per_division() {
        let with_div_t = |div_t_ms: f64| {
            Timebase {
                div_t_ms,
                ..Timebase::default()
            }
            .clamped()
            .div_t_ms
        };

        assert_eq!(with_div_t(f64::INFINITY), 1.0);
        assert_eq!(with_div_t(f64::NEG_INFINITY), 1.0);
        assert_eq!(with_div_t(f64::NAN), 1.0);
        assert!(approx(with_div_t(-3.0), div_t_from_index(TIME_STEPS - 1)));
        assert!(approx(with_div_t(0.0), div_t_from_index(TIME_STEPS - 1)));
        assert!(approx(with_div_t(1e300), div_t_from_index(0)));
        assert!(approx(with_div_t(20.0), 20.0));
    }

    #[test]
    fn test_data_size_never_overflows() {
        let period = Duration::from_millis(1);
        let raw = |div_t_ms: f64| Timebase {
            div_t_ms,
            ..Timebase::default()
        };

        assert_eq!(raw(f64::INFINITY).data_size(period), usize::MAX);
        assert_eq!(raw(1e300).data_size(period), usize::MAX);
        assert_eq!(raw(f64::NAN).data_size(period), 1);
        assert_eq!(raw(-5.0).data_size(period), 1);

        // 5 s/div over 10 divisions at 1 ms
        assert_eq!(raw(1e300).clamped().data_size(period), 50_001);
    }
}
