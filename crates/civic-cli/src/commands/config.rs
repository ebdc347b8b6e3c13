use crate::cli::ConfigCommands;
use crate::commands::common::{load_config, Context};
use crate::error::CliError;

pub fn run_config(context: &Context, command: &ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => {
            let config = load_config(&context.config_path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Path => {
            let exists = if context.config_path.exists() {
                ""
            } else {
                " (not created, defaults in use)"
            };
            println!("{}{exists}", context.config_path.display());
        }
    }
    Ok(())
}
