use crate::types::PricePoint;

const PRICES_PREFIX: &str = "Recent prices (oldest first):";

/// Prompt sent to the advisor for one advisory cycle.
pub fn build_prompt(symbol: &str, window: &[PricePoint]) -> String {
    let prices = window
        .iter()
        .map(|p| format!("{:.5}", p.price))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are advising a trader in a currency trading simulation for {symbol}.\n\
         {PRICES_PREFIX} {prices}\n\
         Should the trader buy, sell or hold right now? Start your answer with \
         exactly one of BUY, SELL or HOLD, then give a short explanation in plain language."
    )
}

/// Recover the embedded price list from a prompt built by [`build_prompt`].
pub fn extract_prices(prompt: &str) -> Vec<f64> {
    prompt
        .lines()
        .find_map(|line| line.trim().strip_prefix(PRICES_PREFIX))
        .map(|rest| {
            rest.split(',')
                .filter_map(|v| v.trim().parse::<f64>().ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_symbol_and_window() {
        let window = vec![PricePoint::new(1, 1.1), PricePoint::new(2, 1.10234)];
        let prompt = build_prompt("EUR/USD", &window);

        assert!(prompt.contains("EUR/USD"));
        assert!(prompt.contains("1.10000, 1.10234"));
        assert_eq!(extract_prices(&prompt), vec![1.1, 1.10234]);
    }

    #[test]
    fn test_extract_prices_without_window() {
        assert!(extract_prices("hello").is_empty());
        assert!(extract_prices(&build_prompt("EUR/USD", &[])).is_empty());
    }
}
