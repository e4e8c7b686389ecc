use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::TokenCounts;

pub const PRICE_TABLE_VERSION: u32 = 1;

/// Price table shipped with the binary, used when no override is configured.
pub const DEFAULT_PRICE_TABLE_JSON: &str = include_str!("../assets/default-pricing.json");

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("unsupported price table version {0}")]
    UnsupportedVersion(u32),
    #[error("price table has no models")]
    Empty,
    #[error("negative price for model {0}")]
    NegativePrice(String),
    #[error("family {keyword} points at unknown model {model}")]
    UnknownFamilyModel { keyword: String, model: String },
    #[error("default family {0} is not a declared family")]
    MissingDefaultFamily(String),
    #[error("price table json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Prices for one model, in USD per million tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPriceConfig {
    pub input_per_1m: Decimal,
    pub output_per_1m: Decimal,
    pub cache_read_per_1m: Decimal,
    pub cache_write_5m_per_1m: Decimal,
    pub cache_write_1h_per_1m: Decimal,
}

/// Keyword used to map an unknown model id onto a priced model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFamily {
    pub keyword: String,
    pub model: String,
}

/// On-disk shape of the price table asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTableConfig {
    pub version: u32,
    pub default_family: String,
    pub families: Vec<ModelFamily>,
    pub models: BTreeMap<String, ModelPriceConfig>,
}

/// Per-token prices derived from the per-million table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPrices {
    pub input: Decimal,
    pub output: Decimal,
    pub cache_read: Decimal,
    pub cache_write_5m: Decimal,
    pub cache_write_1h: Decimal,
}

impl TokenPrices {
    fn from_per_million(config: &ModelPriceConfig) -> Self {
        let million = Decimal::from(1_000_000u32);
        Self {
            input: config.input_per_1m / million,
            output: config.output_per_1m / million,
            cache_read: config.cache_read_per_1m / million,
            cache_write_5m: config.cache_write_5m_per_1m / million,
            cache_write_1h: config.cache_write_1h_per_1m / million,
        }
    }
}

/// Maps a model id onto a family by keyword, first declared match wins.
/// Falls back to `default_family` so every input resolves.
pub fn normalize_model<'a>(
    model: &str,
    families: &'a [ModelFamily],
    default_family: &'a ModelFamily,
) -> &'a ModelFamily {
    let model = model.trim().to_ascii_lowercase();
    families
        .iter()
        .find(|family| model.contains(family.keyword.as_str()))
        .unwrap_or(default_family)
}

/// Immutable price lookup, built once at startup.
#[derive(Debug, Clone)]
pub struct PriceTable {
    models: HashMap<String, TokenPrices>,
    families: Vec<ModelFamily>,
    default_family: ModelFamily,
    default_prices: TokenPrices,
}

impl PriceTable {
    pub fn bundled() -> Result<Self, PricingError> {
        Self::from_json(DEFAULT_PRICE_TABLE_JSON)
    }

    pub fn from_json(data: &str) -> Result<Self, PricingError> {
        let config: PriceTableConfig = serde_json::from_str(data)?;
        Self::from_config(config)
    }

    pub fn from_config(config: PriceTableConfig) -> Result<Self, PricingError> {
        if config.version != PRICE_TABLE_VERSION {
            return Err(PricingError::UnsupportedVersion(config.version));
        }
        if config.models.is_empty() {
            return Err(PricingError::Empty);
        }
        let mut models = HashMap::with_capacity(config.models.len());
        for (name, prices) in &config.models {
            let all = [
                prices.input_per_1m,
                prices.output_per_1m,
                prices.cache_read_per_1m,
                prices.cache_write_5m_per_1m,
                prices.cache_write_1h_per_1m,
            ];
            if all.iter().any(|price| *price < Decimal::ZERO) {
                return Err(PricingError::NegativePrice(name.clone()));
            }
            models.insert(
                name.trim().to_ascii_lowercase(),
                TokenPrices::from_per_million(prices),
            );
        }
        let mut families = Vec::with_capacity(config.families.len());
        for family in config.families {
            let model = family.model.trim().to_ascii_lowercase();
            if !models.contains_key(&model) {
                return Err(PricingError::UnknownFamilyModel {
                    keyword: family.keyword,
                    model: family.model,
                });
            }
            families.push(ModelFamily {
                keyword: family.keyword.trim().to_ascii_lowercase(),
                model,
            });
        }
        let default_keyword = config.default_family.trim().to_ascii_lowercase();
        let default_family = families
            .iter()
            .find(|family| family.keyword == default_keyword)
            .cloned()
            .ok_or(PricingError::MissingDefaultFamily(config.default_family))?;
        let default_prices = models[&default_family.model];
        Ok(Self {
            models,
            families,
            default_family,
            default_prices,
        })
    }

    /// Returns the priced model id and its per-token prices.
    pub fn resolve(&self, model: &str) -> (&str, &TokenPrices) {
        if let Some((name, prices)) = self.models.get_key_value(model) {
            return (name.as_str(), prices);
        }
        let lowered = model.trim().to_ascii_lowercase();
        if let Some((name, prices)) = self.models.get_key_value(&lowered) {
            return (name.as_str(), prices);
        }
        let family = normalize_model(&lowered, &self.families, &self.default_family);
        self.models
            .get_key_value(&family.model)
            .map(|(name, prices)| (name.as_str(), prices))
            .unwrap_or((self.default_family.model.as_str(), &self.default_prices))
    }

    pub fn cost(
        &self,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        cache_read_tokens: u64,
        cache_write_5m_tokens: u64,
        cache_write_1h_tokens: u64,
    ) -> Decimal {
        let (_, prices) = self.resolve(model);
        Decimal::from(input_tokens) * prices.input
            + Decimal::from(output_tokens) * prices.output
            + Decimal::from(cache_read_tokens) * prices.cache_read
            + Decimal::from(cache_write_5m_tokens) * prices.cache_write_5m
            + Decimal::from(cache_write_1h_tokens) * prices.cache_write_1h
    }

    /// Pricing for callers that report a single cache-write count: all of it
    /// is billed at the 5-minute rate.
    pub fn cost_legacy(
        &self,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        cache_read_tokens: u64,
        cache_write_tokens: u64,
    ) -> Decimal {
        self.cost(
            model,
            input_tokens,
            output_tokens,
            cache_read_tokens,
            cache_write_tokens,
            0,
        )
    }

    pub fn cost_for(&self, model: &str, tokens: &TokenCounts) -> Decimal {
        self.cost(
            model,
            tokens.input,
            tokens.output,
            tokens.cache_read,
            tokens.cache_write_5m,
            tokens.cache_write_1h,
        )
    }

    pub fn cost_usd(&self, model: &str, tokens: &TokenCounts) -> f64 {
        self.cost_for(model, tokens).to_f64().unwrap_or_default()
    }

    pub fn families(&self) -> &[ModelFamily] {
        &self.families
    }

    pub fn default_family(&self) -> &ModelFamily {
        &self.default_family
    }
}
