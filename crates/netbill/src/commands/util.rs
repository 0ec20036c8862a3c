//! Shared helpers for command handlers.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::validation("interactive", format!("prompt failed: {e}")))
}

/// Parse a decimal money amount.
pub fn parse_amount(field: &str, raw: &str) -> Result<Decimal, CliError> {
    Decimal::from_str(raw.trim())
        .map_err(|e| CliError::validation(field, format!("'{raw}' is not a decimal amount: {e}")))
}

/// Print a status line on stderr unless `--quiet`.
pub fn note(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}
