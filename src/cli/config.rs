use super::ui;
use crate::core::config::AppConfig;
use comfy_table::Cell;

fn section(title: &str, rows: &[(&str, String)]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Setting"), ui::header_cell("Value")]);
    for (label, value) in rows {
        let value = if value == "Not set" {
            ui::style_text(value, ui::StyleType::Error)
        } else {
            value.clone()
        };
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    format!("{}\n\n{}\n", ui::style_text(title, ui::StyleType::Title), table)
}

/// Host, database and upstream settings as shown on the dashboard. The password is masked.
pub fn render_config(config: &AppConfig) -> String {
    let server = &config.server;
    let db = &config.database;
    let cbr = config.cbr();
    let gecko = config.coingecko();

    let host = section(
        "Host Configuration",
        &[
            ("Host", server.host.clone()),
            ("Port", server.port.to_string()),
            ("Debug", server.debug.to_string()),
            ("Environment", config.deployment.name().to_string()),
            ("Static files", config.static_path().display().to_string()),
        ],
    );
    let database = section(
        "Database Configuration",
        &[
            ("DB Host", db.host.clone()),
            ("DB Port", db.port.clone()),
            ("DB Name", db.name.clone()),
            ("DB User", db.user.clone()),
            ("DB Password", db.masked_password()),
            ("DB URL", db.display_url().to_string()),
        ],
    );
    let providers = section(
        "Rate Providers",
        &[
            ("CBR", format!("{} ({}s)", cbr.base_url, cbr.timeout_secs)),
            (
                "CoinGecko",
                format!(
                    "{} ({}s, charts {}s)",
                    gecko.base_url, gecko.timeout_secs, gecko.chart_timeout_secs
                ),
            ),
            (
                "Fiat pause",
                format!("{}ms", config.providers.fiat_pause_ms),
            ),
        ],
    );

    format!("{host}\n{database}\n{providers}")
}

pub fn run(config: &AppConfig) {
    println!("{}", render_config(config));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_config_masks_password() {
        let mut config = AppConfig::default();
        config.database.password = "hunter2".to_string();
        config.database.url = "postgres://localhost/test_db".to_string();

        let output = render_config(&config);
        assert!(output.contains("*******"));
        assert!(!output.contains("hunter2"));
        assert!(output.contains("postgres://localhost/test_db"));
        assert!(output.contains("localhost"));
        assert!(output.contains("https://www.cbr.ru (10s)"));
    }
}
