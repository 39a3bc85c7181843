use anyhow::Result;
use clap::Parser;

use linkstash::db::Database;
use linkstash::favicon::favicon_url;
use linkstash::store::Store;

#[derive(Parser)]
#[command(name = "favicon-backfill")]
#[command(about = "Fill in missing favicon URLs for stored bookmarks")]
struct Cli {
    #[arg(short, long, default_value = "server.db")]
    database: String,
}

#[derive(Debug, Default, PartialEq)]
struct BackfillStats {
    updated: usize,
    unresolved: usize,
    failed: usize,
}

async fn backfill(store: &Store<'_>) -> Result<BackfillStats> {
    let mut stats = BackfillStats::default();

    for bookmark in store.list_bookmarks_missing_favicon().await? {
        let favicon = favicon_url(&bookmark.url);
        if favicon.is_empty() {
            stats.unresolved += 1;
            continue;
        }

        match store.set_favicon(bookmark.id, &favicon).await {
            Ok(_) => {
                stats.updated += 1;
                println!("Updated bookmark {}: {}", bookmark.id, favicon);
            }
            Err(e) => {
                tracing::error!(id = bookmark.id, error = %e, "failed to update bookmark");
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    let db = Database::open(&cli.database).await?;
    let stats = backfill(&Store::new(db.connection())).await?;

    println!(
        "\nSuccessfully updated {} bookmarks with favicon URLs ({} unresolved, {} failed)",
        stats.updated, stats.unresolved, stats.failed
    );
    Ok(())
}
