//! Data sources and billing plans.

use serde::{Deserialize, Serialize};

/// An external analytics platform a store can link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "analytics_platform", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Meta (Facebook/Instagram) Ads.
    Meta,
    /// Google Analytics 4.
    Ga4,
    /// Google Business Profile.
    Gbp,
}

impl Platform {
    /// All platforms, in dashboard display order.
    pub const ALL: [Self; 3] = [Self::Meta, Self::Ga4, Self::Gbp];

    /// Stable lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Ga4 => "ga4",
            Self::Gbp => "gbp",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meta" => Ok(Self::Meta),
            "ga4" => Ok(Self::Ga4),
            "gbp" => Ok(Self::Gbp),
            _ => Err(format!("invalid platform: {s}")),
        }
    }
}

/// Subscription plan of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "plan_tier", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Standard,
    Premium,
}

impl PlanTier {
    /// Whether AI creative generation is included.
    #[must_use]
    pub const fn includes_creatives(self) -> bool {
        matches!(self, Self::Standard | Self::Premium)
    }

    /// Creative variants allowed per generation request.
    #[must_use]
    pub const fn max_creative_variants(self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Standard => 3,
            Self::Premium => 10,
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Standard => write!(f, "standard"),
            Self::Premium => write!(f, "premium"),
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            _ => Err(format!("invalid plan: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trips_through_str() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
    }

    #[test]
    fn test_plan_limits() {
        assert!(!PlanTier::Free.includes_creatives());
        assert_eq!(PlanTier::Standard.max_creative_variants(), 3);
        assert!(PlanTier::Premium.includes_creatives());
    }
}
