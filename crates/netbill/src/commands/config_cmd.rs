//! Config subcommand handlers.

use dialoguer::Password;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "[REDACTED]";

/// Resolved config as a TOML value with every router password masked.
fn redacted(cfg: &netbill_config::Config) -> Result<toml::Value, CliError> {
    let mut value = toml::Value::try_from(cfg).map_err(|e| CliError::Render {
        message: e.to_string(),
    })?;
    if let Some(routers) = value.get_mut("routers").and_then(toml::Value::as_table_mut) {
        for (_, entry) in routers.iter_mut() {
            if let Some(password) = entry.get_mut("password") {
                *password = toml::Value::String(REDACTED.into());
            }
        }
    }
    Ok(value)
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let value = redacted(&cfg)?;
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => {
                    toml::to_string_pretty(&value).map_err(|e| CliError::Render {
                        message: e.to_string(),
                    })?
                }
                _ => output::render_single(
                    &global.output,
                    &value,
                    |_| String::new(),
                    |_| String::new(),
                )?,
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let cfg = config::load(global)?;
            let out = format!(
                "config: {}\ndata:   {}",
                config::config_file(global).display(),
                config::data_file(global, &cfg).display()
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::SetPassword { router } => {
            let cfg = config::load(global)?;
            cfg.router(&router)?;

            let password = Password::new()
                .with_prompt(format!("Password for router '{router}'"))
                .interact()
                .map_err(|e| CliError::validation("interactive", format!("prompt failed: {e}")))?;
            netbill_config::store_router_secret(&router, &password)?;
            if !global.quiet {
                eprintln!("Password for '{router}' stored in the system keyring");
            }
            Ok(())
        }
    }
}
