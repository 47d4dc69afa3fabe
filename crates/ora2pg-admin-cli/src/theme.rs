use console::{Style, style};
use dialoguer::theme::{ColorfulTheme, Theme};
use std::fmt;

/// Prompt theme for the ora2pg-admin wizards.
///
/// Visual rules:
/// - No prompt prefix (no `?` or other leading character)
/// - Colon suffix: `Prompt:`
/// - Active item: cyan+bold `>`
/// - After-selection: `✔ Prompt: value`
/// - Passwords are never echoed back, only `********`
pub struct AdminTheme {
    inner: ColorfulTheme,
}

pub fn admin_theme() -> AdminTheme {
    AdminTheme {
        inner: ColorfulTheme {
            values_style: Style::new().for_stderr().cyan(),
            active_item_prefix: style(">".to_string()).for_stderr().cyan().bold(),
            active_item_style: Style::new().for_stderr().cyan().bold(),
            defaults_style: Style::new().for_stderr().cyan(),
            checked_item_prefix: style("[x]".to_string()).for_stderr().green(),
            unchecked_item_prefix: style("[ ]".to_string()).for_stderr().dim(),
            ..ColorfulTheme::default()
        },
    }
}

fn done_prefix() -> console::StyledObject<&'static str> {
    style("\u{2714}").for_stderr().green().bold()
}

impl Theme for AdminTheme {
    fn format_prompt(&self, f: &mut dyn fmt::Write, prompt: &str) -> fmt::Result {
        write!(f, "{}:", Style::new().for_stderr().bold().apply_to(prompt))
    }

    fn format_error(&self, f: &mut dyn fmt::Write, err: &str) -> fmt::Result {
        self.inner.format_error(f, err)
    }

    /// `Prompt (default): ` or `Prompt: `
    fn format_input_prompt(
        &self,
        f: &mut dyn fmt::Write,
        prompt: &str,
        default: Option<&str>,
    ) -> fmt::Result {
        let bold_prompt = Style::new().for_stderr().bold().apply_to(prompt);
        match default {
            Some(default) => write!(
                f,
                "{} {}: ",
                bold_prompt,
                Style::new()
                    .for_stderr()
                    .cyan()
                    .apply_to(format!("({default})"))
            ),
            None => write!(f, "{bold_prompt}: "),
        }
    }

    fn format_confirm_prompt(
        &self,
        f: &mut dyn fmt::Write,
        prompt: &str,
        default: Option<bool>,
    ) -> fmt::Result {
        let hint = match default {
            Some(true) => "(Y/n)",
            Some(false) => "(y/N)",
            None => "(y/n)",
        };
        write!(
            f,
            "{} {}: ",
            Style::new().for_stderr().bold().apply_to(prompt),
            Style::new().for_stderr().dim().apply_to(hint)
        )
    }

    fn format_input_prompt_selection(
        &self,
        f: &mut dyn fmt::Write,
        prompt: &str,
        sel: &str,
    ) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            done_prefix(),
            Style::new().for_stderr().bold().apply_to(prompt),
            Style::new().for_stderr().cyan().apply_to(sel)
        )
    }

    fn format_password_prompt(&self, f: &mut dyn fmt::Write, prompt: &str) -> fmt::Result {
        self.format_input_prompt(f, prompt, None)
    }

    fn format_password_prompt_selection(
        &self,
        f: &mut dyn fmt::Write,
        prompt: &str,
    ) -> fmt::Result {
        self.format_input_prompt_selection(f, prompt, "********")
    }

    fn format_confirm_prompt_selection(
        &self,
        f: &mut dyn fmt::Write,
        prompt: &str,
        selection: Option<bool>,
    ) -> fmt::Result {
        let value = match selection {
            Some(true) => "yes",
            Some(false) => "no",
            None => "",
        };
        self.format_input_prompt_selection(f, prompt, value)
    }

    fn format_select_prompt_selection(
        &self,
        f: &mut dyn fmt::Write,
        prompt: &str,
        sel: &str,
    ) -> fmt::Result {
        self.format_input_prompt_selection(f, prompt, sel)
    }

    fn format_multi_select_prompt_selection(
        &self,
        f: &mut dyn fmt::Write,
        prompt: &str,
        selections: &[&str],
    ) -> fmt::Result {
        self.format_input_prompt_selection(f, prompt, &selections.join(", "))
    }

    fn format_select_prompt_item(
        &self,
        f: &mut dyn fmt::Write,
        text: &str,
        active: bool,
    ) -> fmt::Result {
        self.inner.format_select_prompt_item(f, text, active)
    }

    fn format_multi_select_prompt_item(
        &self,
        f: &mut dyn fmt::Write,
        text: &str,
        checked: bool,
        active: bool,
    ) -> fmt::Result {
        self.inner
            .format_multi_select_prompt_item(f, text, checked, active)
    }
}
