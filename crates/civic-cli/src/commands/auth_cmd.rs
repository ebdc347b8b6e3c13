use civic_core::models::Credentials;

use crate::commands::common::{format_sync_timestamp, open_client, Context};
use crate::error::CliError;

pub async fn run_login(context: &Context, email: &str, password: &str) -> Result<(), CliError> {
    let client = open_client(context).await?;
    let credentials = Credentials {
        email: email.trim().to_string(),
        password: password.to_string(),
    };
    let session = client.users().login(&credentials).await?;

    println!(
        "Signed in as {} (session expires {})",
        session.user_id,
        format_sync_timestamp(session.expires_at)
    );
    Ok(())
}

pub async fn run_logout(context: &Context, clear_data: bool) -> Result<(), CliError> {
    let client = open_client(context).await?;
    client.users().logout(clear_data).await?;

    if clear_data {
        println!("Signed out and removed local user data");
    } else {
        println!("Signed out");
    }
    Ok(())
}
