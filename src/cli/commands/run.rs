//! One-shot run command.

use console::style;

use crate::cli::helpers::build_wiring;
use crate::config::Settings;
use crate::pipeline::RunReport;

/// Run the pipeline once and print what happened.
pub async fn cmd_run(settings: &Settings) -> anyhow::Result<()> {
    let wiring = build_wiring(settings)?;

    println!(
        "{} Scanning {} seed(s)...",
        style("→").cyan(),
        settings.seeds.len()
    );
    let report = wiring.pipeline.run().await;
    print_report(&report, settings);

    Ok(())
}

fn print_report(report: &RunReport, settings: &Settings) {
    if report.pages_total == 0 {
        println!("{} No pages could be discovered", style("✗").red());
        return;
    }

    println!(
        "  Pages: {} ({} failed)",
        report.pages_total, report.pages_failed
    );
    if report.seeds_failed > 0 {
        println!(
            "  {} {} seed(s) could not be paginated",
            style("!").yellow(),
            report.seeds_failed
        );
    }
    println!("  Ads scraped: {}", report.ads_scraped);
    println!("  Already known: {}", report.known_before);

    if report.new_ads.is_empty() {
        println!("{} No new ads", style("✓").green());
        return;
    }

    match report.persisted {
        Some(written) => println!(
            "{} {} new ad(s) saved to {}",
            style("✓").green(),
            written,
            settings.storage.csv_path.display()
        ),
        None => println!(
            "{} {} new ad(s) found but could not be saved",
            style("✗").red(),
            report.new_ads.len()
        ),
    }
}
