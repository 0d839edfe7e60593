//! Portfolio context and prompt construction.

use super::chat::Question;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Built-in persona and background text.
const DEFAULT_CONTEXT: &str = include_str!("../../context/portfolio.txt");

const QUESTION_LABEL: &str = "User question:";
const RESPONSE_CUE: &str = "Assistant response:";

/// Immutable background text prepended to every prompt. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioContext(Arc<str>);

impl PortfolioContext {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// Read the context from a file once at startup.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PortfolioContext {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT)
    }
}

/// Prompt template variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptStyle {
    /// Context, blank line, labelled question.
    Plain,
    /// `Plain` followed by a cue steering the model toward a direct answer.
    #[default]
    Guided,
}

impl FromStr for PromptStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(PromptStyle::Plain),
            "guided" => Ok(PromptStyle::Guided),
            other => Err(format!("unknown prompt style '{}'", other)),
        }
    }
}

impl fmt::Display for PromptStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PromptStyle::Plain => "plain",
            PromptStyle::Guided => "guided",
        })
    }
}

/// Full text sent to the provider for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn build_prompt(context: &PortfolioContext, question: &Question, style: PromptStyle) -> Prompt {
    let mut text = format!(
        "{}\n\n{} {}",
        context.as_str(),
        QUESTION_LABEL,
        question.as_str()
    );
    if style == PromptStyle::Guided {
        text.push_str("\n\n");
        text.push_str(RESPONSE_CUE);
    }
    Prompt(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(s: &str) -> Question {
        Question::parse(Some(s), 2000).unwrap()
    }

    #[test]
    fn plain_prompt_layout() {
        let ctx = PortfolioContext::new("About Alexis.");
        let prompt = build_prompt(&ctx, &question("Skills?"), PromptStyle::Plain);
        assert_eq!(prompt.as_str(), "About Alexis.\n\nUser question: Skills?");
    }

    #[test]
    fn guided_prompt_ends_with_response_cue() {
        let ctx = PortfolioContext::new("About Alexis.");
        let prompt = build_prompt(&ctx, &question("Skills?"), PromptStyle::Guided);
        assert_eq!(
            prompt.as_str(),
            "About Alexis.\n\nUser question: Skills?\n\nAssistant response:"
        );
    }

    #[test]
    fn context_is_a_verbatim_prefix_followed_by_the_question() {
        let ctx = PortfolioContext::default();
        for style in [PromptStyle::Plain, PromptStyle::Guided] {
            for q in ["What projects has Alexis built?", "Does he know CSS Grid?"] {
                let prompt = build_prompt(&ctx, &question(q), style);
                assert!(prompt.as_str().starts_with(ctx.as_str()));
                let rest = &prompt.as_str()[ctx.as_str().len()..];
                assert!(rest.contains(q));
            }
        }
    }

    #[test]
    fn building_twice_is_deterministic() {
        let ctx = PortfolioContext::default();
        let q = question("Where can I find his GitHub?");
        assert_eq!(
            build_prompt(&ctx, &q, PromptStyle::Guided),
            build_prompt(&ctx, &q, PromptStyle::Guided)
        );
    }

    #[test]
    fn default_context_mentions_the_portfolio_owner() {
        assert!(PortfolioContext::default().as_str().contains("Alexis Patac"));
    }

    #[test]
    fn prompt_style_parses_case_insensitively() {
        assert_eq!("Plain".parse::<PromptStyle>(), Ok(PromptStyle::Plain));
        assert_eq!(" guided ".parse::<PromptStyle>(), Ok(PromptStyle::Guided));
        assert!("chatty".parse::<PromptStyle>().is_err());
    }
}
