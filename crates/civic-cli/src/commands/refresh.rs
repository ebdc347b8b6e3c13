use civic_core::repository::RefreshOutcome;
use civic_core::{CivicClient, Feature};

use crate::commands::common::{open_client, Context};
use crate::error::CliError;

pub async fn run_refresh(
    context: &Context,
    feature: Option<&str>,
    force: bool,
) -> Result<(), CliError> {
    let client = open_client(context).await?;

    let results = match feature {
        Some(name) => {
            let feature: Feature = name.parse()?;
            vec![(feature, refresh_feature(&client, feature, force).await)]
        }
        None => client.refresh_all(force).await,
    };

    let mut first_error = None;
    for (feature, result) in results {
        match result {
            Ok(outcome) => println!("{}", format_refresh_line(feature, outcome)),
            Err(error) => {
                eprintln!("{feature:<12} failed: {error}");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
    }
    first_error.map_or(Ok(()), |error| Err(error.into()))
}

async fn refresh_feature(
    client: &CivicClient,
    feature: Feature,
    force: bool,
) -> civic_core::Result<RefreshOutcome> {
    match feature {
        Feature::Office => client.offices().refresh_offices(force).await,
        Feature::Info => client.infos().refresh_infos(force).await,
        Feature::Ticket => {
            let user_id = client.users().current_user_id().await?;
            client
                .tickets()
                .refresh_tickets(user_id.as_deref(), force)
                .await
        }
        Feature::Appointment => {
            let user_id = client
                .users()
                .current_user_id()
                .await?
                .ok_or_else(|| civic_core::Error::InvalidInput("Not signed in".into()))?;
            client
                .appointments()
                .refresh_appointments(&user_id, force)
                .await
        }
        Feature::User => client.users().refresh_profile(force).await,
    }
}

pub fn format_refresh_line(feature: Feature, outcome: RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Skipped => format!("{feature:<12} up to date"),
        RefreshOutcome::Refreshed { count } => format!("{feature:<12} refreshed {count} item(s)"),
    }
}
