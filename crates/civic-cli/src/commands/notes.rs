use crate::cli::NoteCommands;
use crate::commands::common::{open_client, Context};
use crate::error::CliError;

pub async fn run_notes(context: &Context, command: NoteCommands) -> Result<(), CliError> {
    let client = open_client(context).await?;
    match command {
        NoteCommands::Purge => {
            let removed = client.appointments().purge_expired_notes().await?;
            println!("Removed {removed} expired note(s)");
        }
    }
    Ok(())
}
