//! Configuration view: `appforge config show`.

use anyhow::Result;

use super::super::{Cli, ConfigCommands};
use super::{EXIT_ACCEPT, load_config};

pub fn cmd_config(cli: &Cli, command: Option<&ConfigCommands>) -> Result<u8> {
    use appforge::config::CONFIG_FILE_NAME;

    match command {
        None | Some(ConfigCommands::Show) => {
            let config = load_config(cli)?;
            let source = match &cli.config {
                Some(path) => path.display().to_string(),
                None if std::path::Path::new(CONFIG_FILE_NAME).exists() => CONFIG_FILE_NAME.to_string(),
                None => "defaults".to_string(),
            };

            println!("# appforge configuration (source: {}, with env/CLI overrides)", source);
            println!();
            print!("{}", config.to_toml_string()?);
        }
    }
    Ok(EXIT_ACCEPT)
}
