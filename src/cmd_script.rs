//! Script subcommand handlers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::info;

use herbie_checkpoint::{FileStateStore, KeywordTables};
use herbie_core::{
    domain_for_url, ExecutionSession, KeywordSet, RunOutcome, ScriptParser, TracingSink,
    UsabilityTask,
};
use herbie_page_cdp::{CdpClient, CdpPage};
use herbie_protocols::ExecutionStore;

use crate::AppContext;

async fn read_script(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read script {}", path.display()))
}

/// Parse a script offline and print the command tree.
pub(crate) async fn parse(
    ctx: &AppContext,
    script: &Path,
    url: Option<&str>,
    keywords: Option<&Path>,
) -> anyhow::Result<()> {
    let text = read_script(script).await?;

    let mut tables: KeywordTables = match keywords {
        Some(file) => {
            let content = tokio::fs::read_to_string(file)
                .await
                .with_context(|| format!("Failed to read keywords {}", file.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid keyword tables in {}", file.display()))?
        }
        None => FileStateStore::new(&ctx.state_path).await?.keyword_tables().await?,
    };

    let local = url
        .and_then(domain_for_url)
        .and_then(|domain| tables.local.remove(&domain))
        .unwrap_or_default();
    let keyword_set = KeywordSet::new(tables.global, local);

    let tree = ScriptParser::from_config(&ctx.config.parser).parse(&text, &keyword_set);
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

/// Attach to Chrome and build an engine session over the state file.
async fn connect(
    ctx: &AppContext,
    endpoint: Option<&str>,
    url: Option<&str>,
) -> anyhow::Result<(CdpClient, ExecutionSession)> {
    let endpoint = endpoint.unwrap_or(&ctx.config.browser.cdp_endpoint);
    let client = CdpClient::connect(endpoint)
        .await
        .with_context(|| format!("Failed to connect to Chrome at {endpoint}"))?;
    let page = Arc::new(CdpPage::new(client.page(url).await?));

    let store = Arc::new(FileStateStore::new(&ctx.state_path).await?);
    let session = ExecutionSession::new(
        page,
        store.clone(),
        store,
        Arc::new(TracingSink),
        ctx.config.clone(),
    );
    Ok((client, session))
}

fn report_outcome(outcome: RunOutcome) -> anyhow::Result<()> {
    match outcome {
        RunOutcome::Completed => {
            info!("Script completed");
            Ok(())
        }
        RunOutcome::Stopped { at } => {
            info!("Script stopped before step {}", at);
            Ok(())
        }
        RunOutcome::Aborted { at, failure } => bail!("Step {at} failed: {failure}"),
    }
}

pub(crate) async fn run(
    ctx: &AppContext,
    script: &Path,
    url: Option<&str>,
    start_line: usize,
    endpoint: Option<&str>,
) -> anyhow::Result<()> {
    let text = read_script(script).await?;
    let (_client, session) = connect(ctx, endpoint, url).await?;
    info!("Running {} from step {}", script.display(), start_line);
    report_outcome(session.run_script(&text, start_line).await?)
}

pub(crate) async fn resume(ctx: &AppContext, endpoint: Option<&str>) -> anyhow::Result<()> {
    let (_client, session) = connect(ctx, endpoint, None).await?;
    match session.resume().await? {
        Some(outcome) => report_outcome(outcome),
        None => {
            info!("Nothing left to resume");
            Ok(())
        }
    }
}

/// Set the persisted stop flag. A running `herbie run` halts before its next step.
pub(crate) async fn stop(ctx: &AppContext) -> anyhow::Result<()> {
    let store = FileStateStore::new(&ctx.state_path).await?;
    store.set_stop_flag(true).await?;
    info!("Stop requested in {}", ctx.state_path.display());
    Ok(())
}

/// Watch the script's verify statements for `duration_secs` or until Ctrl-C,
/// then print the usability report.
pub(crate) async fn observe(
    ctx: &AppContext,
    script: &Path,
    task_name: String,
    tester_name: String,
    duration_secs: u64,
    endpoint: Option<&str>,
) -> anyhow::Result<()> {
    let text = read_script(script).await?;
    let (_client, session) = connect(ctx, endpoint, None).await?;

    let task_id = session
        .start_usability_test(UsabilityTask {
            task_name,
            tester_name,
            script: text,
            ..Default::default()
        })
        .await?;
    info!("Usability test {} started, watching for {}s", task_id, duration_secs);

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(duration_secs)) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted, ending test"),
    }

    let report = session.end_usability_test().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
