use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{PricePoint, SimError};

/// Supplier of historical price series, keyed by symbol
#[async_trait]
pub trait PriceSupplier: Send + Sync {
    async fn fetch(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<String, Vec<PricePoint>>, SimError>;

    fn name(&self) -> &'static str;
}

/// Black-box advisor: takes a natural-language prompt, returns free-form advice
#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend(&self, prompt: &str) -> Result<String, SimError>;

    fn name(&self) -> &'static str;
}
