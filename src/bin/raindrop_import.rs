use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Parser;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Read, Write};

use linkstash::favicon::favicon_url;

/// Raindrop.io export columns:
/// id, title, note, excerpt, url, folder, tags, created, cover, highlights, favorite
const COL_TITLE: usize = 1;
const COL_NOTE: usize = 2;
const COL_URL: usize = 4;
const COL_FOLDER: usize = 5;
const COL_TAGS: usize = 6;
const COL_CREATED: usize = 7;
const COL_FAVORITE: usize = 10;
const MIN_COLUMNS: usize = 5;

// Raindrop's name for folderless bookmarks
const UNSORTED_FOLDER: &str = "Unsorted";

#[derive(Parser)]
#[command(name = "raindrop-import")]
#[command(about = "Convert a Raindrop.io CSV export into SQL inserts for linkstash")]
struct Cli {
    #[arg(short, long)]
    input: String,
    #[arg(short, long)]
    output: String,
}

#[derive(Debug, PartialEq)]
struct ImportedBookmark {
    url: String,
    name: String,
    favicon_url: String,
    note: String,
    folder: Option<String>,
    tags: String,
    favorite: bool,
    bookmarked_at: String,
}

#[derive(Debug, Default)]
struct Import {
    bookmarks: Vec<ImportedBookmark>,
    skipped: usize,
}

fn parse_created(value: &str, now: DateTime<Utc>) -> String {
    let created = DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);
    created.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_records<R: Read>(reader: R, now: DateTime<Utc>) -> Result<Import> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut import = Import::default();

    for (i, result) in csv_reader.records().enumerate() {
        // header is line 1
        let line = i + 2;
        let record = result.with_context(|| format!("failed to read CSV row {line}"))?;

        if record.len() < MIN_COLUMNS {
            tracing::warn!("skipping row {} with insufficient columns", line);
            import.skipped += 1;
            continue;
        }

        let field = |idx: usize| record.get(idx).unwrap_or_default().trim().to_string();

        let url = field(COL_URL);
        if url.is_empty() {
            tracing::warn!("skipping row {} with empty URL", line);
            import.skipped += 1;
            continue;
        }

        let folder = field(COL_FOLDER);
        let folder = if folder.is_empty() || folder == UNSORTED_FOLDER {
            None
        } else {
            Some(folder)
        };

        // untitled rows are named after their URL
        let name = match field(COL_TITLE) {
            title if title.is_empty() => url.clone(),
            title => title,
        };

        import.bookmarks.push(ImportedBookmark {
            favicon_url: favicon_url(&url),
            name,
            note: field(COL_NOTE),
            folder,
            tags: field(COL_TAGS),
            favorite: field(COL_FAVORITE).eq_ignore_ascii_case("true"),
            bookmarked_at: parse_created(&field(COL_CREATED), now),
            url,
        });
    }

    Ok(import)
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn to_sql(bookmarks: &[ImportedBookmark]) -> Vec<String> {
    let mut statements = vec!["BEGIN TRANSACTION;".to_string()];

    let folders: BTreeSet<&str> = bookmarks.iter().filter_map(|b| b.folder.as_deref()).collect();
    for folder in folders {
        let name = quote(folder);
        statements.push(format!(
            "INSERT INTO folders (name) SELECT {name} WHERE NOT EXISTS (SELECT 1 FROM folders WHERE name = {name});"
        ));
    }

    for b in bookmarks {
        let folder_id = match &b.folder {
            Some(name) => format!("(SELECT id FROM folders WHERE name = {} ORDER BY id LIMIT 1)", quote(name)),
            None => "NULL".to_string(),
        };
        statements.push(format!(
            "INSERT INTO bookmarks (url, name, favicon_url, note, folder_id, tags, favorite, bookmarked_at) VALUES ({}, {}, {}, {}, {}, {}, {}, {});",
            quote(&b.url),
            quote(&b.name),
            quote(&b.favicon_url),
            quote(&b.note),
            folder_id,
            quote(&b.tags),
            i64::from(b.favorite),
            quote(&b.bookmarked_at),
        ));
    }

    statements.push("COMMIT;".to_string());
    statements
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    let input = File::open(&cli.input).with_context(|| format!("Failed to open input file: {}", cli.input))?;
    let import = parse_records(input, Utc::now())?;

    if import.bookmarks.is_empty() && import.skipped == 0 {
        anyhow::bail!("CSV file is empty: {}", cli.input);
    }

    let output = File::create(&cli.output).with_context(|| format!("Failed to create output file: {}", cli.output))?;
    let mut writer = BufWriter::new(output);
    for statement in to_sql(&import.bookmarks) {
        writeln!(writer, "{}", statement)?;
    }
    writer.flush()?;

    println!(
        "Successfully generated {} with {} bookmarks ({} rows skipped)",
        cli.output,
        import.bookmarks.len(),
        import.skipped
    );
    Ok(())
}
