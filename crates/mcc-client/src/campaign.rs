//! Campaign creation as a sequence of dependent Google Ads mutations.
//!
//! budget -> campaign -> ad group -> keywords -> ads -> location targeting
//! -> language targeting. Each step consumes resource names produced by the
//! steps before it. A failed required step removes what was already created
//! (campaign first, then budget) and returns the full step report.

use std::fmt;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::bidding::{automatic_bidding_strategy, BiddingStrategy};
use crate::client::{normalize_customer_id, resource_id, MccClient};
use crate::error::{McError, Result};

pub const MIN_HEADLINES: usize = 3;
pub const MAX_HEADLINES: usize = 15;
pub const MIN_DESCRIPTIONS: usize = 2;
pub const MAX_DESCRIPTIONS: usize = 4;

const DEFAULT_CPC_BID_MICROS: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetType {
    #[default]
    Daily,
    Total,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignBudget {
    /// Amount in the account currency (not micros)
    pub amount: f64,
    #[serde(rename = "type", default)]
    pub kind: BudgetType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeywordMatchType {
    #[default]
    Broad,
    Phrase,
    Exact,
}

impl KeywordMatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeywordMatchType::Broad => "BROAD",
            KeywordMatchType::Phrase => "PHRASE",
            KeywordMatchType::Exact => "EXACT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSettings {
    #[serde(default = "default_true")]
    pub target_google_search: bool,
    #[serde(default = "default_true")]
    pub target_search_network: bool,
    #[serde(default)]
    pub target_content_network: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            target_google_search: true,
            target_search_network: true,
            target_content_network: false,
        }
    }
}

/// Everything needed to build a search campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignData {
    pub name: String,
    #[serde(default)]
    pub objective: String,
    pub budget: CampaignBudget,
    /// Overrides the strategy derived from `objective`
    #[serde(default)]
    pub bidding_strategy: Option<BiddingStrategy>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub keyword_match_type: KeywordMatchType,
    #[serde(default)]
    pub headlines: Vec<String>,
    #[serde(default)]
    pub descriptions: Vec<String>,
    pub final_url: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub network_settings: NetworkSettings,
    #[serde(default)]
    pub start_paused: bool,
    #[serde(default)]
    pub cpc_bid_micros: Option<i64>,
}

fn non_empty(values: &[String]) -> Vec<&str> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect()
}

impl CampaignData {
    /// Check the payload before anything is sent to Google.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(McError::validation("campaign name is required"));
        }
        if !self.budget.amount.is_finite() || self.budget.amount <= 0.0 {
            return Err(McError::validation("budget amount must be positive"));
        }
        if self.budget.kind == BudgetType::Total && self.end_date.is_none() {
            return Err(McError::validation("a total budget requires an end date"));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(McError::validation("end date is before start date"));
            }
        }
        if self.final_url.trim().is_empty() {
            return Err(McError::validation("final URL is required"));
        }

        let headlines = non_empty(&self.headlines).len();
        if headlines < MIN_HEADLINES {
            return Err(McError::validation(format!(
                "responsive search ads need at least {} headlines, got {}",
                MIN_HEADLINES, headlines
            )));
        }
        let descriptions = non_empty(&self.descriptions).len();
        if descriptions < MIN_DESCRIPTIONS {
            return Err(McError::validation(format!(
                "responsive search ads need at least {} descriptions, got {}",
                MIN_DESCRIPTIONS, descriptions
            )));
        }

        Ok(())
    }

    pub fn effective_bidding_strategy(&self) -> BiddingStrategy {
        self.bidding_strategy
            .unwrap_or_else(|| automatic_bidding_strategy(&self.objective))
    }

    fn budget_micros(&self) -> i64 {
        (self.budget.amount * 1_000_000.0).round() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStep {
    Budget,
    Campaign,
    AdGroup,
    Keywords,
    Ads,
    LocationTargeting,
    LanguageTargeting,
}

impl CampaignStep {
    pub const ALL: [CampaignStep; 7] = [
        CampaignStep::Budget,
        CampaignStep::Campaign,
        CampaignStep::AdGroup,
        CampaignStep::Keywords,
        CampaignStep::Ads,
        CampaignStep::LocationTargeting,
        CampaignStep::LanguageTargeting,
    ];

    /// Required steps abort the run when they fail.
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            CampaignStep::Budget | CampaignStep::Campaign | CampaignStep::AdGroup | CampaignStep::Ads
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStep::Budget => "budget",
            CampaignStep::Campaign => "campaign",
            CampaignStep::AdGroup => "ad_group",
            CampaignStep::Keywords => "keywords",
            CampaignStep::Ads => "ads",
            CampaignStep::LocationTargeting => "location_targeting",
            CampaignStep::LanguageTargeting => "language_targeting",
        }
    }
}

impl fmt::Display for CampaignStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Completed { resource_names: Vec<String> },
    Skipped { reason: String },
    Degraded { warning: String },
    Failed { error: String },
    Compensated,
    CompensationFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: CampaignStep,
    #[serde(flatten)]
    pub state: StepState,
}

/// Step-by-step report of a campaign creation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignCreation {
    pub customer_id: String,
    pub campaign_id: Option<String>,
    pub budget_id: Option<String>,
    pub ad_group_id: Option<String>,
    pub ad_ids: Vec<String>,
    pub steps: Vec<StepRecord>,
    pub warnings: Vec<String>,
}

impl CampaignCreation {
    fn new(customer_id: &str) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            campaign_id: None,
            budget_id: None,
            ad_group_id: None,
            ad_ids: Vec::new(),
            steps: CampaignStep::ALL
                .iter()
                .map(|step| StepRecord {
                    step: *step,
                    state: StepState::Pending,
                })
                .collect(),
            warnings: Vec::new(),
        }
    }

    pub fn state(&self, step: CampaignStep) -> Option<&StepState> {
        self.steps
            .iter()
            .find(|record| record.step == step)
            .map(|record| &record.state)
    }

    fn set(&mut self, step: CampaignStep, state: StepState) {
        if let Some(record) = self.steps.iter_mut().find(|record| record.step == step) {
            record.state = state;
        }
    }

    /// Record a completed step and return its first resource name.
    fn completed(&mut self, step: CampaignStep, resource_names: Vec<String>) -> String {
        let first = resource_names.first().cloned().unwrap_or_default();
        self.set(step, StepState::Completed { resource_names });
        first
    }

    fn degraded(&mut self, step: CampaignStep, error: &McError) {
        let warning = format!("{} failed: {}", step, error);
        tracing::warn!(step = %step, customer_id = %self.customer_id, "{}", warning);
        self.warnings.push(warning.clone());
        self.set(step, StepState::Degraded { warning });
    }

    fn skipped(&mut self, step: CampaignStep, reason: &str) {
        tracing::debug!(step = %step, "Skipping step: {}", reason);
        self.set(
            step,
            StepState::Skipped {
                reason: reason.to_string(),
            },
        );
    }

    fn created_resource(&self, step: CampaignStep) -> Option<String> {
        match self.state(step) {
            Some(StepState::Completed { resource_names }) => resource_names.first().cloned(),
            _ => None,
        }
    }
}

impl MccClient {
    /// Create a complete search campaign for `customer_id`.
    ///
    /// On a required-step failure the returned [`McError::StepFailed`]
    /// carries the report, with compensation outcomes for the campaign and
    /// budget.
    pub async fn create_campaign(
        &self,
        customer_id: &str,
        data: &CampaignData,
    ) -> Result<CampaignCreation> {
        data.validate()?;
        let cid = normalize_customer_id(customer_id)?;
        let mut report = CampaignCreation::new(&cid);

        tracing::info!(customer_id = %cid, "Creating campaign '{}'", data.name);

        // budget
        let budget_name = match self
            .mutate(&cid, "campaignBudgets", vec![budget_operation(data)])
            .await
        {
            Ok(names) => report.completed(CampaignStep::Budget, names),
            Err(e) => return Err(self.abort(report, CampaignStep::Budget, e).await),
        };
        report.budget_id = resource_id(&budget_name).ok();

        // campaign
        let campaign_name = match self
            .mutate(&cid, "campaigns", vec![campaign_operation(data, &budget_name)])
            .await
        {
            Ok(names) => report.completed(CampaignStep::Campaign, names),
            Err(e) => return Err(self.abort(report, CampaignStep::Campaign, e).await),
        };
        report.campaign_id = resource_id(&campaign_name).ok();

        // ad group
        let ad_group_op = json!({
            "create": {
                "name": format!("{} Ad Group", data.name.trim()),
                "campaign": campaign_name,
                "status": "ENABLED",
                "type": "SEARCH_STANDARD",
                "cpcBidMicros": data.cpc_bid_micros.unwrap_or(DEFAULT_CPC_BID_MICROS).to_string(),
            }
        });
        let ad_group_name = match self.mutate(&cid, "adGroups", vec![ad_group_op]).await {
            Ok(names) => report.completed(CampaignStep::AdGroup, names),
            Err(e) => return Err(self.abort(report, CampaignStep::AdGroup, e).await),
        };
        report.ad_group_id = resource_id(&ad_group_name).ok();

        // keywords
        let keywords = non_empty(&data.keywords);
        if keywords.is_empty() {
            report.skipped(CampaignStep::Keywords, "no keywords");
        } else {
            let operations = keywords
                .iter()
                .map(|text| {
                    json!({
                        "create": {
                            "adGroup": ad_group_name,
                            "status": "ENABLED",
                            "keyword": {
                                "text": text,
                                "matchType": data.keyword_match_type.as_str(),
                            }
                        }
                    })
                })
                .collect();
            match self.mutate(&cid, "adGroupCriteria", operations).await {
                Ok(names) => {
                    report.completed(CampaignStep::Keywords, names);
                }
                Err(e) => report.degraded(CampaignStep::Keywords, &e),
            }
        }

        // ads
        let ad_op = ad_operation(data, &ad_group_name, &mut report.warnings);
        match self.mutate(&cid, "adGroupAds", vec![ad_op]).await {
            Ok(names) => {
                report.ad_ids = names.iter().filter_map(|n| resource_id(n).ok()).collect();
                report.completed(CampaignStep::Ads, names);
            }
            Err(e) => return Err(self.abort(report, CampaignStep::Ads, e).await),
        }

        // location targeting
        let locations = self.catalog().resolve_locations(data.locations.as_slice());
        for name in &locations.unresolved {
            report
                .warnings
                .push(format!("Unresolved location: {}", name));
        }
        let operations: Vec<Value> = locations
            .ids
            .iter()
            .map(|id| {
                json!({
                    "create": {
                        "campaign": campaign_name,
                        "location": { "geoTargetConstant": format!("geoTargetConstants/{}", id) }
                    }
                })
            })
            .collect();
        self.optional_criteria(
            &mut report,
            CampaignStep::LocationTargeting,
            operations,
            "no resolved locations",
        )
        .await;

        // language targeting
        let languages = self.catalog().resolve_languages(data.languages.as_slice());
        for name in &languages.unresolved {
            report
                .warnings
                .push(format!("Unresolved language: {}", name));
        }
        let operations: Vec<Value> = languages
            .ids
            .iter()
            .map(|id| {
                json!({
                    "create": {
                        "campaign": campaign_name,
                        "language": { "languageConstant": format!("languageConstants/{}", id) }
                    }
                })
            })
            .collect();
        self.optional_criteria(
            &mut report,
            CampaignStep::LanguageTargeting,
            operations,
            "no resolved languages",
        )
        .await;

        tracing::info!(
            customer_id = %cid,
            campaign_id = ?report.campaign_id,
            warnings = report.warnings.len(),
            "Campaign created"
        );

        Ok(report)
    }

    async fn optional_criteria(
        &self,
        report: &mut CampaignCreation,
        step: CampaignStep,
        operations: Vec<Value>,
        skip_reason: &str,
    ) {
        if operations.is_empty() {
            report.skipped(step, skip_reason);
            return;
        }
        let customer_id = report.customer_id.clone();
        match self.mutate(&customer_id, "campaignCriteria", operations).await {
            Ok(names) => {
                report.completed(step, names);
            }
            Err(e) => report.degraded(step, &e),
        }
    }

    /// Mark `step` failed, remove the campaign and then the budget if they
    /// were created, and wrap everything into the returned error.
    async fn abort(
        &self,
        mut report: CampaignCreation,
        step: CampaignStep,
        error: McError,
    ) -> McError {
        tracing::error!(
            step = %step,
            customer_id = %report.customer_id,
            "Campaign step failed: {}",
            error
        );
        report.set(
            step,
            StepState::Failed {
                error: error.to_string(),
            },
        );

        for (created, collection) in [
            (CampaignStep::Campaign, "campaigns"),
            (CampaignStep::Budget, "campaignBudgets"),
        ] {
            let Some(resource_name) = report.created_resource(created) else {
                continue;
            };
            let operation = json!({ "remove": resource_name });
            match self.mutate(&report.customer_id, collection, vec![operation]).await {
                Ok(_) => {
                    tracing::info!(step = %created, "Compensated {}", resource_name);
                    report.set(created, StepState::Compensated);
                }
                Err(e) => {
                    tracing::error!(step = %created, "Failed to remove {}: {}", resource_name, e);
                    report.set(
                        created,
                        StepState::CompensationFailed {
                            error: e.to_string(),
                        },
                    );
                }
            }
        }

        McError::StepFailed {
            step,
            source: Box::new(error),
            report: Box::new(report),
        }
    }
}

fn budget_operation(data: &CampaignData) -> Value {
    let micros = data.budget_micros().to_string();
    let mut budget = Map::new();
    budget.insert(
        "name".into(),
        json!(format!("{} Budget #{}", data.name.trim(), Utc::now().timestamp_millis())),
    );
    match data.budget.kind {
        BudgetType::Daily => {
            budget.insert("amountMicros".into(), json!(micros));
            budget.insert("period".into(), json!("DAILY"));
        }
        BudgetType::Total => {
            budget.insert("totalAmountMicros".into(), json!(micros));
            budget.insert("period".into(), json!("CUSTOM_PERIOD"));
        }
    }
    budget.insert("deliveryMethod".into(), json!("STANDARD"));
    budget.insert("explicitlyShared".into(), json!(false));

    json!({ "create": budget })
}

fn campaign_operation(data: &CampaignData, budget_name: &str) -> Value {
    let strategy = data.effective_bidding_strategy();
    let network = data.network_settings;

    let mut campaign = Map::new();
    campaign.insert("name".into(), json!(data.name.trim()));
    campaign.insert(
        "status".into(),
        json!(if data.start_paused { "PAUSED" } else { "ENABLED" }),
    );
    campaign.insert("advertisingChannelType".into(), json!("SEARCH"));
    campaign.insert("campaignBudget".into(), json!(budget_name));
    campaign.insert(strategy.campaign_field().into(), json!({}));
    campaign.insert(
        "networkSettings".into(),
        json!({
            "targetGoogleSearch": network.target_google_search,
            "targetSearchNetwork": network.target_search_network,
            "targetContentNetwork": network.target_content_network,
            "targetPartnerSearchNetwork": false,
        }),
    );
    if let Some(start) = data.start_date {
        campaign.insert("startDate".into(), json!(start.to_string()));
    }
    if let Some(end) = data.end_date {
        campaign.insert("endDate".into(), json!(end.to_string()));
    }
    campaign.insert(
        "containsEuPoliticalAdvertising".into(),
        json!("DOES_NOT_CONTAIN_EU_POLITICAL_ADVERTISING"),
    );

    json!({ "create": campaign })
}

fn ad_operation(data: &CampaignData, ad_group_name: &str, warnings: &mut Vec<String>) -> Value {
    let headlines = capped(non_empty(&data.headlines), MAX_HEADLINES, "headlines", warnings);
    let descriptions = capped(
        non_empty(&data.descriptions),
        MAX_DESCRIPTIONS,
        "descriptions",
        warnings,
    );

    let text_assets = |items: Vec<&str>| -> Vec<Value> {
        items.into_iter().map(|text| json!({ "text": text })).collect()
    };

    json!({
        "create": {
            "adGroup": ad_group_name,
            "status": "ENABLED",
            "ad": {
                "finalUrls": [data.final_url.trim()],
                "responsiveSearchAd": {
                    "headlines": text_assets(headlines),
                    "descriptions": text_assets(descriptions),
                }
            }
        }
    })
}

fn capped<'a>(
    mut items: Vec<&'a str>,
    limit: usize,
    label: &str,
    warnings: &mut Vec<String>,
) -> Vec<&'a str> {
    if items.len() > limit {
        warnings.push(format!(
            "Dropped {} {} beyond the limit of {}",
            items.len() - limit,
            label,
            limit
        ));
        items.truncate(limit);
    }
    items
}
