use inquire::{
    ui::{Color, RenderConfig, StyleSheet, Styled},
    Confirm, Password, PasswordDisplayMode, Text,
};
use once_cell::sync::Lazy;
use owo_colors::OwoColorize;

use crate::cli::error::LwError;
use crate::context::Prompter;

static GREY_TEXT: Lazy<StyleSheet> = Lazy::new(|| StyleSheet::default().with_fg(Color::Grey));
static PROMPT_CONFIG: Lazy<RenderConfig> = Lazy::new(|| {
    RenderConfig::default()
        .with_prompt_prefix(Styled::new(">").with_fg(Color::LightBlue))
        .with_selected_option(Some(StyleSheet::default().with_fg(Color::DarkMagenta)))
        .with_answer(*GREY_TEXT)
        .with_help_message(*GREY_TEXT)
});

/// No echo and no second entry; `update-context --password` fixes a typo.
fn password_prompt(message: &str) -> Password<'_> {
    Password::new(message)
        .with_render_config(*PROMPT_CONFIG)
        .with_display_mode(PasswordDisplayMode::Hidden)
        .without_confirmation()
}

/// Prompts on the controlling terminal.
pub(super) struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn text(&mut self, message: &str, default: Option<&str>) -> Result<String, LwError> {
        let mut prompt = Text::new(message).with_render_config(*PROMPT_CONFIG);
        if let Some(default) = default {
            prompt = prompt.with_default(default);
        }

        Ok(prompt.prompt()?)
    }

    fn password(&mut self, message: &str) -> Result<String, LwError> {
        Ok(password_prompt(message).prompt()?)
    }

    fn confirm(&mut self, message: &str, default: bool) -> Result<bool, LwError> {
        Ok(Confirm::new(message)
            .with_render_config(*PROMPT_CONFIG)
            .with_default(default)
            .prompt()?)
    }

    fn notify(&mut self, message: &str) {
        eprintln!("{}", message.yellow());
    }
}

#[cfg(test)]
mod test {
    use inquire::PasswordDisplayMode;

    use super::password_prompt;

    #[test]
    fn passwords_are_not_echoed() {
        let prompt = password_prompt("Password:");
        assert_eq!(prompt.display_mode, PasswordDisplayMode::Hidden);
        assert!(!prompt.enable_display_toggle);
        assert!(!prompt.enable_confirmation);
    }
}
