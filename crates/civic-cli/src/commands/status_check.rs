use tokio_util::sync::CancellationToken;

use crate::commands::common::{open_client, require_user, Context};
use crate::error::CliError;

/// One detector pass; Ctrl-C stops it between candidates.
pub async fn run_status_check(context: &Context) -> Result<(), CliError> {
    let client = open_client(context).await?;
    let user_id = require_user(&client).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let report = client.status_detector().run(&user_id, &cancel).await;
    interrupt.abort();

    println!(
        "checked={} changed={} failed={}{}",
        report.checked,
        report.changed,
        report.failed,
        if report.cancelled { " (cancelled)" } else { "" }
    );
    Ok(())
}
