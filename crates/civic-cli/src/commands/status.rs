use civic_core::{Feature, Location};
use serde::Serialize;

use crate::commands::common::{format_sync_timestamp, open_client, Context};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct SyncStatusItem {
    pub feature: Feature,
    pub last_sync_time_millis: i64,
    pub last_location: Option<Location>,
    pub due: bool,
    pub reason: String,
    pub bbox: Option<String>,
}

pub async fn run_status(context: &Context, as_json: bool) -> Result<(), CliError> {
    let client = open_client(context).await?;
    let coordinator = client.coordinator();

    let mut items = Vec::with_capacity(Feature::ALL.len());
    for feature in Feature::ALL {
        let checkpoint = coordinator.checkpoint(feature).await?;
        let status = coordinator.check_sync_status(feature, false).await?;
        items.push(SyncStatusItem {
            feature,
            last_sync_time_millis: checkpoint.last_sync_time_millis,
            last_location: checkpoint.last_location,
            due: status.should_fetch,
            reason: format!("{:?}", status.reason),
            bbox: status.bbox_string(),
        });
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    for line in format_status_lines(&items) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_status_lines(items: &[SyncStatusItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let due = if item.due { "due" } else { "fresh" };
            let synced = format_sync_timestamp(item.last_sync_time_millis);
            format!(
                "{:<12}  {due:<5}  {:<16}  last={synced}",
                item.feature.as_str(),
                item.reason
            )
        })
        .collect()
}
