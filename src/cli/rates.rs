use super::ui;
use crate::core::{AssetClass, Currency};
use crate::fetcher::RateFetcher;
use anyhow::{Result, bail};
use chrono::NaiveDate;
use comfy_table::Cell;
use std::collections::BTreeMap;

/// Table of every supported code of `class`. Codes without a rate show as N/A.
pub fn render_rates(
    rates: &BTreeMap<String, f64>,
    class: AssetClass,
    date: Option<NaiveDate>,
) -> String {
    let currencies: Vec<Currency> = match class {
        AssetClass::Fiat => Currency::all_fiat().collect(),
        AssetClass::Crypto => Currency::all_crypto().collect(),
    };

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Rate (RUB)"),
    ]);
    for currency in &currencies {
        table.add_row(vec![
            Cell::new(currency.code),
            ui::format_optional_cell(rates.get(currency.code).copied(), ui::format_rub),
        ]);
    }

    let (source, when) = match (class, date) {
        (AssetClass::Fiat, Some(date)) => ("CBR", date.to_string()),
        (AssetClass::Fiat, None) => ("CBR", "today".to_string()),
        (AssetClass::Crypto, _) => ("CoinGecko", "now".to_string()),
    };
    let title = format!("{} rates ({source}), {when}", capitalize(&class.to_string()));

    format!(
        "{}\n\n{}\n\n{}",
        ui::style_text(&title, ui::StyleType::Title),
        table,
        ui::style_text(
            &format!("{} of {} rates available", rates.len(), currencies.len()),
            ui::StyleType::Subtle
        )
    )
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

pub async fn run(fetcher: &RateFetcher, crypto: bool, date: Option<NaiveDate>) -> Result<()> {
    if crypto && date.is_some() {
        bail!("--date applies to fiat rates only");
    }

    let (class, rates) = if crypto {
        let spinner = ui::new_spinner("Fetching crypto rates from CoinGecko");
        let rates = fetcher.get_all_crypto_rates().await;
        spinner.finish_and_clear();
        (AssetClass::Crypto, rates)
    } else {
        let spinner = ui::new_spinner("Fetching fiat rates from the CBR");
        let rates = fetcher.get_all_fiat_rates(date).await;
        spinner.finish_and_clear();
        (AssetClass::Fiat, rates)
    };

    if rates.is_empty() {
        bail!("No {class} rates could be fetched");
    }

    println!("{}", render_rates(&rates, class, date));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fiat_rates_marks_missing() {
        let rates = BTreeMap::from([("USD".to_string(), 91.6359), ("EUR".to_string(), 99.7204)]);
        let output = render_rates(&rates, AssetClass::Fiat, NaiveDate::from_ymd_opt(2024, 1, 3));

        assert!(output.contains("Fiat rates (CBR), 2024-01-03"));
        assert!(output.contains("91.6359"));
        assert!(output.contains("SEK"));
        assert_eq!(output.matches("N/A").count(), 8);
        assert!(output.contains("2 of 10 rates available"));
    }

    #[test]
    fn test_render_crypto_rates() {
        let rates = BTreeMap::from([("BTC".to_string(), 6000000.0)]);
        let output = render_rates(&rates, AssetClass::Crypto, None);

        assert!(output.contains("Crypto rates (CoinGecko), now"));
        assert!(output.contains("6000000"));
        assert!(output.contains("MATIC"));
    }
}
