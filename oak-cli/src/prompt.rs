//! Interactive conflict resolution

use dialoguer::{theme::ColorfulTheme, Input, Select};
use oak_common::merge::{ConflictResolver, FieldConflict, Resolution};
use oak_common::{Error, FieldValue, Result};

const CHOICES: [&str; 4] = [
    "Keep stored value",
    "Accept imported value",
    "Enter a value manually",
    "Skip this species",
];

/// Asks on the terminal for every conflict the importer reports
pub struct PromptResolver {
    theme: ColorfulTheme,
}

impl PromptResolver {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }

    fn manual_value(&self, conflict: &FieldConflict) -> Result<FieldValue> {
        let hint = match conflict.incoming {
            FieldValue::List(_) => " (comma separated)",
            FieldValue::Flag(_) => " (true/false)",
            FieldValue::Text(_) => "",
        };
        loop {
            let input: String = Input::with_theme(&self.theme)
                .with_prompt(format!("New value for {}{}", conflict.field, hint))
                .interact_text()
                .map_err(prompt_error)?;
            match parse_manual(&conflict.incoming, &input) {
                Some(value) => return Ok(value),
                None => eprintln!("'{}' is not a valid value for {}", input, conflict.field),
            }
        }
    }
}

impl Default for PromptResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictResolver for PromptResolver {
    fn resolve(&mut self, conflict: &FieldConflict) -> Result<Resolution> {
        eprintln!();
        eprintln!(
            "Conflict in {} (source {}) on {}",
            conflict.species, conflict.source_id, conflict.field
        );
        eprintln!("  stored:   {}", conflict.existing);
        eprintln!("  imported: {}", conflict.incoming);

        let choice = Select::with_theme(&self.theme)
            .with_prompt("Resolution")
            .items(&CHOICES)
            .default(0)
            .interact()
            .map_err(prompt_error)?;

        match choice {
            0 => Ok(Resolution::KeepExisting),
            1 => Ok(Resolution::AcceptImported),
            2 => Ok(Resolution::Manual(self.manual_value(conflict)?)),
            _ => Ok(Resolution::SkipEntry),
        }
    }
}

/// Interpret typed input in the shape of the conflicting value
pub fn parse_manual(shape: &FieldValue, input: &str) -> Option<FieldValue> {
    let input = input.trim();
    match shape {
        FieldValue::Flag(_) => match input.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(FieldValue::Flag(true)),
            "false" | "no" | "n" | "0" => Some(FieldValue::Flag(false)),
            _ => None,
        },
        FieldValue::List(_) => Some(FieldValue::List(
            input
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        FieldValue::Text(_) if input.is_empty() => None,
        FieldValue::Text(_) => Some(FieldValue::Text(input.to_string())),
    }
}

fn prompt_error(e: impl std::fmt::Display) -> Error {
    Error::Io(std::io::Error::other(e.to_string()))
}
