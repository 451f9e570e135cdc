use serde::{Deserialize, Serialize};

/// Automated bidding strategies used for new campaigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BiddingStrategy {
    MaximizeConversions,
    MaximizeClicks,
}

impl BiddingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BiddingStrategy::MaximizeConversions => "MAXIMIZE_CONVERSIONS",
            BiddingStrategy::MaximizeClicks => "MAXIMIZE_CLICKS",
        }
    }

    /// Campaign field carrying the strategy in a REST `create` body.
    /// Maximize clicks is expressed as `targetSpend` in the API.
    pub(crate) fn campaign_field(&self) -> &'static str {
        match self {
            BiddingStrategy::MaximizeConversions => "maximizeConversions",
            BiddingStrategy::MaximizeClicks => "targetSpend",
        }
    }
}

/// Pick the bidding strategy for a campaign objective.
///
/// Conversion-oriented objectives maximize conversions; everything else,
/// including unknown objectives, maximizes clicks.
pub fn automatic_bidding_strategy(objective: &str) -> BiddingStrategy {
    match objective.trim().to_lowercase().as_str() {
        "sales" | "leads" | "app" => BiddingStrategy::MaximizeConversions,
        "traffic" | "awareness" => BiddingStrategy::MaximizeClicks,
        _ => BiddingStrategy::MaximizeClicks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_objectives() {
        for objective in ["sales", "leads", "app", "Sales ", "LEADS"] {
            assert_eq!(
                automatic_bidding_strategy(objective),
                BiddingStrategy::MaximizeConversions,
                "objective {}",
                objective
            );
        }
    }

    #[test]
    fn test_click_objectives() {
        for objective in ["traffic", "awareness", "consideration"] {
            assert_eq!(
                automatic_bidding_strategy(objective),
                BiddingStrategy::MaximizeClicks
            );
        }
    }

    #[test]
    fn test_unknown_objective_defaults_to_clicks() {
        assert_eq!(
            automatic_bidding_strategy("world-domination"),
            BiddingStrategy::MaximizeClicks
        );
        assert_eq!(automatic_bidding_strategy(""), BiddingStrategy::MaximizeClicks);
    }

    #[test]
    fn test_strategy_serializes_as_google_enum() {
        let json = serde_json::to_string(&BiddingStrategy::MaximizeConversions).unwrap();
        assert_eq!(json, "\"MAXIMIZE_CONVERSIONS\"");
        assert_eq!(BiddingStrategy::MaximizeClicks.campaign_field(), "targetSpend");
    }
}
