//! Token usage and cost accounting.
//!
//! [`UsageTracker`] keeps cumulative totals plus one [`UsageRecord`] per
//! model call. Costs are estimates from [`pricing_for_model`].

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Per-model pricing for cost estimation (USD per 1M tokens).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    pub fn estimate_cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (completion_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self {
            input_per_million: 0.50,
            output_per_million: 1.50,
        }
    }
}

/// Approximate pricing for a model by name.
///
/// Matches on the segment after the last `/`, so `"openai/gpt-4o"` and
/// `"gpt-4o"` price the same.
pub fn pricing_for_model(model: &str) -> ModelPricing {
    let name = model.rsplit('/').next().unwrap_or(model).to_lowercase();

    let (input, output) = if name.contains("4o-mini") {
        (0.15, 0.60)
    } else if name.contains("gpt-4o") {
        (2.50, 10.0)
    } else if name.contains("gpt-4.1-mini") {
        (0.40, 1.60)
    } else if name.contains("gpt-4") {
        (2.00, 8.00)
    } else if name.contains("gpt-3.5") {
        (0.50, 1.50)
    } else if name.starts_with("o1") || name.starts_with("o3") {
        (15.0, 60.0)
    } else if name.contains("deepseek") {
        (0.27, 1.10)
    } else if name.contains("llama") || name.contains("mixtral") {
        (0.20, 0.20)
    } else {
        return ModelPricing::default();
    };

    ModelPricing {
        input_per_million: input,
        output_per_million: output,
    }
}

/// Cumulative usage across calls.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost: f64,
}

/// Usage reported by a single call.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UsageRecord {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub estimated_cost: f64,
    pub timestamp: String,
}

#[derive(Debug, Default, Clone)]
pub struct UsageTracker {
    totals: TokenUsage,
    history: Vec<UsageRecord>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call. A missing `total_tokens` is computed from the parts.
    pub fn record(
        &mut self,
        prompt_tokens: u32,
        completion_tokens: u32,
        total_tokens: Option<u32>,
        pricing: &ModelPricing,
    ) {
        let total_tokens =
            total_tokens.unwrap_or(prompt_tokens.saturating_add(completion_tokens));
        let estimated_cost = pricing.estimate_cost(prompt_tokens, completion_tokens);

        self.totals.prompt_tokens += u64::from(prompt_tokens);
        self.totals.completion_tokens += u64::from(completion_tokens);
        self.totals.total_tokens += u64::from(total_tokens);
        self.totals.estimated_cost += estimated_cost;

        self.history.push(UsageRecord {
            prompt_tokens,
            completion_tokens,
            total_tokens,
            estimated_cost,
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        });
    }

    pub fn totals(&self) -> &TokenUsage {
        &self.totals
    }

    /// One record per call, oldest first.
    pub fn history(&self) -> &[UsageRecord] {
        &self.history
    }

    pub fn reset(&mut self) {
        self.totals = TokenUsage::default();
        self.history.clear();
    }

    pub fn summary(&self) -> String {
        format!(
            "tokens: {} prompt + {} completion = {} total, est. cost: ${:.4}",
            self.totals.prompt_tokens,
            self.totals.completion_tokens,
            self.totals.total_tokens,
            self.totals.estimated_cost,
        )
    }
}
