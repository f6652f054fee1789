use std::collections::HashMap;

use anyhow::Context;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::model_id::pricing_key;

const BUILTIN_PRICING: &str = include_str!("../../pricing.json");

const TOKENS_PER_PRICE_UNIT: u32 = 1_000_000;
const COST_DECIMAL_PLACES: u32 = 6;

/// Price in USD per million tokens.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Price {
    pub input: Decimal,
    pub output: Decimal,
}

/// Conservative rate used for models missing from the table.
pub const DEFAULT_PRICE: Price = Price {
    input: Decimal::ONE,
    output: Decimal::from_parts(3, 0, 0, false, 0),
};

#[derive(Debug, Deserialize, Clone)]
pub struct PriceEntry {
    pub provider: String,
    #[serde(flatten)]
    pub price: Price,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingTable {
    pub version: String,
    models: HashMap<String, PriceEntry>,
}

impl PricingTable {
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading pricing table from {path}"))?;
        Self::from_json(&data).with_context(|| format!("parsing pricing table {path}"))
    }

    pub fn builtin() -> Result<Self, serde_json::Error> {
        Self::from_json(BUILTIN_PRICING)
    }

    /// Loads the override file when given, otherwise the table compiled into
    /// the binary. Never fails: an unusable table degrades to an empty one,
    /// which prices every model at [`DEFAULT_PRICE`].
    pub fn resolve(override_path: Option<&str>) -> Self {
        if let Some(path) = override_path.filter(|p| !p.is_empty()) {
            match Self::load(path) {
                Ok(table) => {
                    tracing::info!(
                        path = %path,
                        version = %table.version,
                        models = table.len(),
                        "Pricing table loaded"
                    );
                    return table;
                }
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "Pricing override unusable, using built-in table");
                }
            }
        }

        match Self::builtin() {
            Ok(table) => table,
            Err(err) => {
                tracing::warn!(error = %err, "Built-in pricing table unusable, all models use default price");
                Self {
                    version: "empty".to_string(),
                    models: HashMap::new(),
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Price> {
        self.models.get(key).map(|entry| entry.price)
    }

    pub fn price_for(&self, model: &str) -> Price {
        self.get(pricing_key(model)).unwrap_or(DEFAULT_PRICE)
    }

    /// Cost in USD of one call, rounded to six decimal places.
    pub fn calculate_cost(&self, model: &str, prompt_tokens: u32, completion_tokens: u32) -> Decimal {
        let price = self.price_for(model);
        let per_unit = Decimal::from(TOKENS_PER_PRICE_UNIT);

        let input_cost = Decimal::from(prompt_tokens) / per_unit * price.input;
        let output_cost = Decimal::from(completion_tokens) / per_unit * price.output;

        (input_cost + output_cost).round_dp(COST_DECIMAL_PLACES)
    }
}
