use civic_core::models::FavoriteType;

use crate::cli::{FavoriteCommands, FavoriteKind};
use crate::commands::common::{open_client, require_user, Context};
use crate::error::CliError;

pub const fn favorite_type(kind: FavoriteKind) -> FavoriteType {
    match kind {
        FavoriteKind::Office => FavoriteType::Office,
        FavoriteKind::Info => FavoriteType::Info,
        FavoriteKind::Ticket => FavoriteType::Ticket,
    }
}

pub async fn run_favorites(context: &Context, command: FavoriteCommands) -> Result<(), CliError> {
    let client = open_client(context).await?;
    let user_id = require_user(&client).await?;
    let favorites = client.favorites();

    match command {
        FavoriteCommands::Toggle { kind, id } => {
            let now_favorite = favorites.toggle(&user_id, id, favorite_type(kind)).await?;
            let state = if now_favorite { "added" } else { "removed" };
            println!("{} {id} {state}", favorite_type(kind).as_str().to_lowercase());
        }
        FavoriteCommands::List { kind } => {
            for id in favorites.ids(&user_id, favorite_type(kind)).await? {
                println!("{id}");
            }
        }
    }
    Ok(())
}
