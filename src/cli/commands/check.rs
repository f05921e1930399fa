//! Configuration check command.

use console::style;

use crate::config::Settings;
use crate::scrapers::{HttpClient, Paginator, SiteSelectors};
use crate::storage::DedupStore;

/// Validate settings and show the pages each seed resolves to.
///
/// Fetches only the first page of every seed; nothing is extracted, stored
/// or sent.
pub async fn cmd_check(settings: &Settings) -> anyhow::Result<()> {
    settings.validate_scrape()?;
    println!("{} Scrape configuration is valid", style("✓").green());

    match settings.telegram.credentials() {
        Ok((_, chat_id)) => println!(
            "{} Telegram credentials present (chat {})",
            style("✓").green(),
            chat_id
        ),
        Err(e) => println!("{} {}", style("!").yellow(), e),
    }

    if let Err(e) = settings.bot.webhook_url() {
        println!("  {} Webhook transport unavailable: {}", style("!").yellow(), e);
    }

    let known = DedupStore::new(&settings.storage.csv_path).load_known_urls();
    println!(
        "  {} known URL(s) in {}",
        known.len(),
        settings.storage.csv_path.display()
    );

    let source = HttpClient::new(&settings.fetch)?;
    let paginator = Paginator::new(SiteSelectors::from_config(&settings.site)?);

    let mut failed = 0;
    for seed in &settings.seeds {
        println!("\n{}", style(seed.label()).bold());
        let pages = paginator.discover_pages(&source, &seed.url).await;
        if pages.is_empty() {
            println!("  {} No pages discovered", style("✗").red());
            failed += 1;
            continue;
        }
        for page in &pages {
            println!("  {}", page);
        }
    }

    if failed > 0 {
        anyhow::bail!("{} seed(s) could not be paginated", failed);
    }
    Ok(())
}
