//! Signal tables
//!
//! Indicators and news keywords map onto a closed set of `SignalKind`s, and
//! each regime is a weighted profile over those signals. Adding a regime or
//! an indicator is a table edit; the detector never branches on names.

use serde::{Deserialize, Serialize};

use crate::regime::types::{NewsEvent, RegimeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    RateRising,
    RateFalling,
    InflationRising,
    InflationFalling,
    GdpRising,
    GdpFalling,
    UnemploymentRising,
    UnemploymentFalling,
    VolatilityRising,
    VolatilityFalling,
    EquityRising,
    EquityFalling,
    Geopolitical,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::RateRising => "rate_rising",
            SignalKind::RateFalling => "rate_falling",
            SignalKind::InflationRising => "inflation_rising",
            SignalKind::InflationFalling => "inflation_falling",
            SignalKind::GdpRising => "gdp_rising",
            SignalKind::GdpFalling => "gdp_falling",
            SignalKind::UnemploymentRising => "unemployment_rising",
            SignalKind::UnemploymentFalling => "unemployment_falling",
            SignalKind::VolatilityRising => "volatility_rising",
            SignalKind::VolatilityFalling => "volatility_falling",
            SignalKind::EquityRising => "equity_rising",
            SignalKind::EquityFalling => "equity_falling",
            SignalKind::Geopolitical => "geopolitical",
        }
    }
}

/// Indicator name -> (signal when rising, signal when falling)
pub const INDICATOR_SIGNALS: &[(&str, SignalKind, SignalKind)] = &[
    ("interest_rate", SignalKind::RateRising, SignalKind::RateFalling),
    ("policy_rate", SignalKind::RateRising, SignalKind::RateFalling),
    ("fed_funds_rate", SignalKind::RateRising, SignalKind::RateFalling),
    ("inflation", SignalKind::InflationRising, SignalKind::InflationFalling),
    ("cpi", SignalKind::InflationRising, SignalKind::InflationFalling),
    ("gdp_growth", SignalKind::GdpRising, SignalKind::GdpFalling),
    ("gdp", SignalKind::GdpRising, SignalKind::GdpFalling),
    ("unemployment", SignalKind::UnemploymentRising, SignalKind::UnemploymentFalling),
    ("unemployment_rate", SignalKind::UnemploymentRising, SignalKind::UnemploymentFalling),
    ("volatility", SignalKind::VolatilityRising, SignalKind::VolatilityFalling),
    ("vix", SignalKind::VolatilityRising, SignalKind::VolatilityFalling),
    ("equity_index", SignalKind::EquityRising, SignalKind::EquityFalling),
    ("sp500", SignalKind::EquityRising, SignalKind::EquityFalling),
];

/// Lowercase keyword -> signal it evidences
pub const NEWS_KEYWORDS: &[(&str, SignalKind)] = &[
    ("rate hike", SignalKind::RateRising),
    ("raises rates", SignalKind::RateRising),
    ("tightening", SignalKind::RateRising),
    ("hawkish", SignalKind::RateRising),
    ("rate cut", SignalKind::RateFalling),
    ("cuts rates", SignalKind::RateFalling),
    ("easing", SignalKind::RateFalling),
    ("dovish", SignalKind::RateFalling),
    ("inflation", SignalKind::InflationRising),
    ("price surge", SignalKind::InflationRising),
    ("disinflation", SignalKind::InflationFalling),
    ("recession", SignalKind::GdpFalling),
    ("contraction", SignalKind::GdpFalling),
    ("boom", SignalKind::GdpRising),
    ("layoffs", SignalKind::UnemploymentRising),
    ("job losses", SignalKind::UnemploymentRising),
    ("hiring", SignalKind::UnemploymentFalling),
    ("crash", SignalKind::EquityFalling),
    ("sell-off", SignalKind::EquityFalling),
    ("selloff", SignalKind::EquityFalling),
    ("panic", SignalKind::VolatilityRising),
    ("turmoil", SignalKind::VolatilityRising),
    ("rally", SignalKind::EquityRising),
    ("war", SignalKind::Geopolitical),
    ("invasion", SignalKind::Geopolitical),
    ("sanctions", SignalKind::Geopolitical),
    ("conflict", SignalKind::Geopolitical),
    ("coup", SignalKind::Geopolitical),
];

/// Weighted signal profile for one regime
#[derive(Debug, Clone, Copy)]
pub struct RegimeProfile {
    pub regime: RegimeType,
    pub weights: &'static [(SignalKind, f64)],
    /// Classified from news alone (no indicator carries this signal)
    pub news_only: bool,
}

pub const REGIME_PROFILES: &[RegimeProfile] = &[
    RegimeProfile {
        regime: RegimeType::MonetaryTightening,
        weights: &[(SignalKind::RateRising, 0.8), (SignalKind::InflationRising, 0.2)],
        news_only: false,
    },
    RegimeProfile {
        regime: RegimeType::MonetaryEasing,
        weights: &[(SignalKind::RateFalling, 0.8), (SignalKind::InflationFalling, 0.2)],
        news_only: false,
    },
    RegimeProfile {
        regime: RegimeType::InflationSurge,
        weights: &[(SignalKind::InflationRising, 0.8), (SignalKind::RateRising, 0.2)],
        news_only: false,
    },
    RegimeProfile {
        regime: RegimeType::Recession,
        weights: &[(SignalKind::GdpFalling, 0.5), (SignalKind::UnemploymentRising, 0.5)],
        news_only: false,
    },
    RegimeProfile {
        regime: RegimeType::Expansion,
        weights: &[(SignalKind::GdpRising, 0.6), (SignalKind::UnemploymentFalling, 0.4)],
        news_only: false,
    },
    RegimeProfile {
        regime: RegimeType::MarketStress,
        weights: &[(SignalKind::VolatilityRising, 0.6), (SignalKind::EquityFalling, 0.4)],
        news_only: false,
    },
    RegimeProfile {
        regime: RegimeType::GeopoliticalShock,
        weights: &[(SignalKind::Geopolitical, 1.0)],
        news_only: true,
    },
];

/// (rising, falling) signals for a known indicator
pub fn indicator_signals(indicator: &str) -> Option<(SignalKind, SignalKind)> {
    INDICATOR_SIGNALS
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(indicator))
        .map(|(_, rising, falling)| (*rising, *falling))
}

/// Distinct signals named by a news item's headline and body
pub fn news_signals(event: &NewsEvent) -> Vec<SignalKind> {
    let text = format!("{} {}", event.headline, event.content).to_lowercase();
    let mut signals: Vec<SignalKind> = NEWS_KEYWORDS
        .iter()
        .filter(|(keyword, _)| contains_word(&text, keyword))
        .map(|(_, kind)| *kind)
        .collect();
    signals.sort();
    signals.dedup();
    signals
}

pub fn profile_for(regime: RegimeType) -> Option<&'static RegimeProfile> {
    REGIME_PROFILES.iter().find(|p| p.regime == regime)
}

/// Keyword match on word boundaries, so "war" does not match "award"
fn contains_word(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(start, _)| {
        let end = start + keyword.len();
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
