use super::ui;
use crate::core::{Currency, DateRange, Period, RateSample};
use crate::fetcher::RateFetcher;
use crate::web::chart::ChartData;
use anyhow::{Context, Result, bail};
use chrono::Local;
use comfy_table::Cell;

/// Last sample of each calendar day. Fiat histories already have one per day.
pub fn daily_closes(history: &[RateSample]) -> Vec<&RateSample> {
    let mut closes: Vec<&RateSample> = Vec::new();
    for sample in history {
        match closes.last_mut() {
            Some(last) if last.day() == sample.day() => *last = sample,
            _ => closes.push(sample),
        }
    }
    closes
}

/// History table with day-over-day change, followed by min, max and current rate.
pub fn render_history(
    currency: Currency,
    range: &DateRange,
    history: &[RateSample],
) -> Option<String> {
    let summary = ChartData::from_history(history)?;
    let closes = daily_closes(history);

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Rate (RUB)"),
        ui::header_cell("Change"),
    ]);

    let mut previous: Option<f64> = None;
    for sample in &closes {
        let change = previous.map(|p| (sample.rate - p) / p * 100.0);
        table.add_row(vec![
            Cell::new(sample.day()),
            ui::rate_cell(sample.rate),
            change.map_or_else(ui::na_cell, ui::change_cell),
        ]);
        previous = Some(sample.rate);
    }

    let title = format!(
        "{} to RUB, {} to {}",
        currency.code,
        range.start(),
        range.end()
    );
    let mut output = format!(
        "{}\n\n{}\n\n",
        ui::style_text(&title, ui::StyleType::Title),
        table
    );
    for (label, value) in [
        ("Min", summary.min),
        ("Max", summary.max),
        ("Current", summary.current),
    ] {
        output.push_str(&format!(
            "{}: {}\n",
            ui::style_text(label, ui::StyleType::TotalLabel),
            ui::style_text(&ui::format_rub(value), ui::StyleType::TotalValue)
        ));
    }
    Some(output)
}

pub async fn run(
    fetcher: &RateFetcher,
    code: &str,
    period: Period,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    let currency =
        Currency::lookup(code).with_context(|| format!("Currency {code} is not supported"))?;
    let period = if from.is_some() || to.is_some() {
        Period::Custom
    } else {
        period
    };
    let range = DateRange::resolve(period, from, to, currency.class, Local::now().date_naive())?;

    let spinner = ui::new_spinner(format!("Fetching {code} history"));
    let history = fetcher
        .get_history(currency, range.start(), range.end())
        .await;
    spinner.finish_and_clear();

    let Some(output) = render_history(currency, &range, &history) else {
        bail!(
            "No data for {code} between {} and {}",
            range.start(),
            range.end()
        );
    };
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(day: u32, hour: u32, rate: f64) -> RateSample {
        let date: NaiveDateTime = NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        RateSample::new(date, rate, "BTC")
    }

    #[test]
    fn test_daily_closes_keep_last_sample_per_day() {
        let history = vec![at(1, 0, 1.0), at(1, 12, 2.0), at(2, 6, 3.0), at(2, 18, 4.0)];
        let closes: Vec<f64> = daily_closes(&history).iter().map(|s| s.rate).collect();
        assert_eq!(closes, vec![2.0, 4.0]);
    }

    #[test]
    fn test_render_history() {
        let btc = Currency::lookup("BTC").unwrap();
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        )
        .unwrap();
        let history = vec![at(1, 0, 5000000.0), at(2, 0, 5500000.0)];

        let output = render_history(btc, &range, &history).unwrap();
        assert!(output.contains("BTC to RUB, 2024-03-01 to 2024-03-02"));
        assert!(output.contains("+10.00%"));
        assert!(output.contains("5500000"));
    }

    #[test]
    fn test_render_empty_history_is_none() {
        let usd = Currency::lookup("USD").unwrap();
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
        )
        .unwrap();
        assert!(render_history(usd, &range, &[]).is_none());
    }
}
