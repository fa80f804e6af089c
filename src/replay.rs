//! JSON-lines scripts of engine and platform events, replayed against a
//! controller wired to the simulated engine and permission provider.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    engine::SimulatedEngine, permission::SimulatedPermissions,
    state_machine::SpeechSessionController,
};

pub const DEMO_SCRIPT: &str = r#"
# user answers the microphone dialog
{"type": "focus", "granted": true}
{"type": "partial", "text": "显"}
{"type": "final", "text": "显示"}
{"type": "final", "text": "变成红色"}
{"type": "error", "code": 1014, "message": "no speech detected"}
{"type": "final", "text": "蓝色"}
{"type": "final", "text": "跳舞"}
{"type": "error", "code": 7, "message": "network jitter"}
{"type": "final", "text": "隐藏"}
{"type": "disable"}
{"type": "final", "text": "显示"}
{"type": "enable"}
{"type": "advance", "ms": 250}
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayStep {
    Partial { text: String },
    Final { text: String },
    Error { code: i32, message: String },
    ResultError { message: String },
    /// App regains focus after the permission dialog with this answer.
    Focus { granted: bool },
    /// User withdraws the permission in system settings.
    Revoke,
    Enable,
    Disable,
    Retry,
    Advance { ms: u64 },
}

/// Blank lines and lines starting with `#` are skipped.
pub fn parse_script(input: &str) -> Result<Vec<ReplayStep>> {
    input
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("invalid replay step on line {line_no}"))
        })
        .collect()
}

pub struct Replay {
    engine: SimulatedEngine,
    permissions: SimulatedPermissions,
    clock: Instant,
    deny_permission: bool,
}

impl Replay {
    pub fn new(engine: SimulatedEngine, permissions: SimulatedPermissions) -> Self {
        Self {
            engine,
            permissions,
            clock: Instant::now(),
            deny_permission: false,
        }
    }

    /// Every permission dialog in the script is answered with "deny".
    pub fn deny_permission(mut self, deny: bool) -> Self {
        self.deny_permission = deny;
        self
    }

    pub fn run(&mut self, controller: &mut SpeechSessionController, steps: &[ReplayStep]) {
        for step in steps {
            self.apply(controller, step);
        }
    }

    pub fn apply(&mut self, controller: &mut SpeechSessionController, step: &ReplayStep) {
        debug!(?step, "replay step");
        let delivered = match step {
            ReplayStep::Partial { text } => self.engine.emit_result(text, false),
            ReplayStep::Final { text } => self.engine.emit_result(text, true),
            ReplayStep::Error { code, message } => self.engine.emit_error(*code, message),
            ReplayStep::ResultError { message } => self.engine.emit_result_error(message),
            ReplayStep::Focus { granted } => {
                self.permissions.set_granted(*granted && !self.deny_permission);
                controller.on_application_focus(true);
                true
            }
            ReplayStep::Revoke => {
                self.permissions.set_granted(false);
                true
            }
            ReplayStep::Enable => {
                controller.enable();
                true
            }
            ReplayStep::Disable => {
                controller.disable();
                true
            }
            ReplayStep::Retry => {
                controller.retry();
                true
            }
            ReplayStep::Advance { ms } => {
                self.clock += Duration::from_millis(*ms);
                true
            }
        };
        if !delivered {
            debug!(?step, "engine had no callback registered");
        }
        controller.tick(self.clock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_steps_and_skips_comments() {
        let steps = parse_script(
            "# warmup\n\n{\"type\":\"final\",\"text\":\"隐藏\"}\n{\"type\":\"advance\",\"ms\":5}\n{\"type\":\"revoke\"}",
        )
        .expect("parse");
        assert_eq!(
            steps,
            vec![
                ReplayStep::Final {
                    text: "隐藏".into()
                },
                ReplayStep::Advance { ms: 5 },
                ReplayStep::Revoke,
            ]
        );
    }

    #[test]
    fn reports_offending_line() {
        let err = parse_script("{\"type\":\"final\",\"text\":\"a\"}\n{\"type\":\"jump\"}")
            .expect_err("unknown step");
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn demo_script_parses() {
        assert!(parse_script(DEMO_SCRIPT).expect("demo").len() > 5);
    }
}
