//! Keyword subcommand handlers.

use std::path::Path;

use anyhow::Context;
use tracing::info;

use herbie_checkpoint::{FileStateStore, KeywordTables};

use crate::cli::KeywordsAction;
use crate::AppContext;

pub(crate) async fn handle_keywords_command(
    ctx: &AppContext,
    action: KeywordsAction,
) -> anyhow::Result<()> {
    let store = FileStateStore::new(&ctx.state_path).await?;
    match action {
        KeywordsAction::Import { file } => import(&store, &file).await,
        KeywordsAction::List { domain } => list(&store, domain.as_deref()).await,
    }
}

async fn import(store: &FileStateStore, file: &Path) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let tables: KeywordTables = serde_json::from_str(&content)
        .with_context(|| format!("Invalid keyword tables in {}", file.display()))?;

    let global = tables.global.len();
    let domains = tables.local.len();
    store.import_keywords(tables).await?;
    info!(
        "Imported {} global keywords and {} local domains into {}",
        global,
        domains,
        store.path().display()
    );
    Ok(())
}

async fn list(store: &FileStateStore, domain: Option<&str>) -> anyhow::Result<()> {
    let tables = store.keyword_tables().await?;
    let output = match domain {
        Some(domain) => serde_json::to_string_pretty(
            tables.local.get(domain).map(Vec::as_slice).unwrap_or_default(),
        )?,
        None => serde_json::to_string_pretty(&tables)?,
    };
    println!("{output}");
    Ok(())
}
