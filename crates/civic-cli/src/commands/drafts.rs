use civic_core::models::DraftInput;

use crate::cli::DraftCommands;
use crate::commands::common::{
    draft_to_list_item, format_draft_lines, normalize_title, open_client, require_user, Context,
    DraftListItem,
};
use crate::error::CliError;

pub async fn run_drafts(context: &Context, command: DraftCommands) -> Result<(), CliError> {
    let client = open_client(context).await?;
    let user_id = require_user(&client).await?;
    let drafts = client.drafts();

    match command {
        DraftCommands::List { json } => {
            let items = drafts.list(&user_id).await?;
            if json {
                let json_items = items
                    .iter()
                    .map(draft_to_list_item)
                    .collect::<Vec<DraftListItem>>();
                println!("{}", serde_json::to_string_pretty(&json_items)?);
            } else if items.is_empty() {
                println!("No drafts.");
            } else {
                for line in format_draft_lines(&items) {
                    println!("{line}");
                }
            }
        }
        DraftCommands::Create {
            title,
            description,
            category,
            address,
            images,
        } => {
            let input = DraftInput {
                title: normalize_title(&title)?,
                description: description.trim().to_string(),
                category,
                location: context.location,
                address,
                image_paths: images
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect(),
            };
            let draft = drafts.create(&user_id, input).await?;
            println!("{}", draft.local_id);
        }
        DraftCommands::Promote { local_id } => {
            if drafts.get(local_id).await?.is_none() {
                return Err(CliError::DraftNotFound(local_id));
            }
            let outcome = drafts.promote(local_id).await?;
            println!("{}", outcome.value.id);
            if let Some(failure) = outcome.secondary_failure {
                eprintln!("Warning: {failure}");
            }
        }
        DraftCommands::Delete { local_id } => {
            if !drafts.delete(local_id).await? {
                return Err(CliError::DraftNotFound(local_id));
            }
            println!("Deleted draft {local_id}");
        }
    }
    Ok(())
}
