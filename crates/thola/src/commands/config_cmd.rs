use std::path::Path;

use thola_config::Config;

use crate::cli::ConfigCommand;
use crate::error::CliError;
use crate::output;

pub fn handle(command: &ConfigCommand, config_file: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommand::Show => {
            let config: Config = thola_config::load_config(config_file)?;
            output::print_output(config.to_toml()?.trim_end());
        }
        ConfigCommand::Path => {
            let path = config_file.map_or_else(thola_config::config_path, Path::to_path_buf);
            output::print_output(&path.display().to_string());
        }
    }
    Ok(())
}
