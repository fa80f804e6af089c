use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Color {
    Red,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    SetVisible(bool),
    SetColor(Color),
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRule {
    pub keywords: Vec<String>,
    pub action: Action,
}

impl CommandRule {
    pub fn new(keywords: &[&str], action: Action) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            action,
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|keyword| text.contains(keyword.as_str()))
    }
}

/// Maps normalized transcripts to actions. Rules are tried in order and the
/// first one with a contained keyword wins, so "显示红色" shows the object
/// rather than painting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDispatcher {
    rules: Vec<CommandRule>,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::with_rules(vec![
            CommandRule::new(&["出现", "显示"], Action::SetVisible(true)),
            CommandRule::new(&["隐藏", "消失"], Action::SetVisible(false)),
            CommandRule::new(&["红"], Action::SetColor(Color::Red)),
            CommandRule::new(&["蓝"], Action::SetColor(Color::Blue)),
        ])
    }
}

impl CommandDispatcher {
    pub fn with_rules(rules: Vec<CommandRule>) -> Self {
        Self { rules }
    }

    pub fn dispatch(&self, normalized: &str) -> Action {
        if normalized.is_empty() {
            return Action::NoOp;
        }
        self.rules
            .iter()
            .find(|rule| rule.matches(normalized))
            .map(|rule| rule.action)
            .unwrap_or(Action::NoOp)
    }
}

pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
