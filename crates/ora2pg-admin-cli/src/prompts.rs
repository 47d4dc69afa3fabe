use std::io::IsTerminal;

use dialoguer::{Confirm, Input, MultiSelect, Password, Select};

use crate::theme::admin_theme;

/// Prompts need a terminal on both ends.
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

pub fn text(prompt: &str, default: &str) -> Result<String, String> {
    text_with(prompt, default, |_| Ok(()))
}

/// Free text, re-prompting until `validate` accepts it.
pub fn text_with(
    prompt: &str,
    default: &str,
    validate: impl Fn(&str) -> Result<(), String>,
) -> Result<String, String> {
    let theme = admin_theme();
    let mut input = Input::<String>::with_theme(&theme)
        .with_prompt(prompt)
        .allow_empty(true)
        .validate_with(|value: &String| validate(value.trim()));
    if !default.is_empty() {
        input = input.default(default.to_string());
    }
    input
        .interact_text()
        .map(|s| s.trim().to_string())
        .map_err(|e| e.to_string())
}

/// Non-empty text.
pub fn required(prompt: &str, default: &str) -> Result<String, String> {
    text_with(prompt, default, |value| {
        if value.is_empty() {
            Err("a value is required".to_string())
        } else {
            Ok(())
        }
    })
}

pub fn port(prompt: &str, default: u32) -> Result<u32, String> {
    Input::<u32>::with_theme(&admin_theme())
        .with_prompt(prompt)
        .default(default)
        .validate_with(|p: &u32| {
            if ora2pg_admin_config::validate::is_valid_port(*p) {
                Ok(())
            } else {
                Err("port must be between 1 and 65535")
            }
        })
        .interact_text()
        .map_err(|e| e.to_string())
}

pub fn number(prompt: &str, default: u32, range: std::ops::RangeInclusive<u32>) -> Result<u32, String> {
    let (lo, hi) = (*range.start(), *range.end());
    Input::<u32>::with_theme(&admin_theme())
        .with_prompt(prompt)
        .default(default)
        .validate_with(move |n: &u32| {
            if range.contains(n) {
                Ok(())
            } else {
                Err(format!("must be between {lo} and {hi}"))
            }
        })
        .interact_text()
        .map_err(|e| e.to_string())
}

/// Hidden input. An empty answer keeps `current`, which may be a `${VAR}`
/// placeholder.
pub fn password(prompt: &str, current: &str) -> Result<String, String> {
    let hint = if current.is_empty() {
        prompt.to_string()
    } else {
        format!("{prompt} (enter to keep current)")
    };
    let value = Password::with_theme(&admin_theme())
        .with_prompt(hint)
        .allow_empty_password(true)
        .interact()
        .map_err(|e| e.to_string())?;
    Ok(if value.is_empty() {
        current.to_string()
    } else {
        value
    })
}

pub fn confirm(prompt: &str, default: bool) -> Result<bool, String> {
    Confirm::with_theme(&admin_theme())
        .with_prompt(prompt)
        .default(default)
        .interact()
        .map_err(|e| e.to_string())
}

pub fn select<T: std::fmt::Display>(prompt: &str, items: &[T], default: usize) -> Result<usize, String> {
    Select::with_theme(&admin_theme())
        .with_prompt(prompt)
        .items(items)
        .default(default)
        .interact()
        .map_err(|e| e.to_string())
}

/// Indices of the checked items; at least one must be checked.
pub fn multi_select<T: std::fmt::Display>(
    prompt: &str,
    items: &[T],
    checked: &[bool],
) -> Result<Vec<usize>, String> {
    let theme = admin_theme();
    loop {
        let picked = MultiSelect::with_theme(&theme)
            .with_prompt(prompt)
            .items(items)
            .defaults(checked)
            .interact()
            .map_err(|e| e.to_string())?;
        if !picked.is_empty() {
            return Ok(picked);
        }
        eprintln!("{} select at least one item", crate::style::warning_prefix());
    }
}
