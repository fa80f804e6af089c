use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::dispatch::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("no interactive object is bound")]
    Unbound,
    #[error("bound object has no renderable surface")]
    MissingSurface,
}

/// Scene object a voice command acts on.
pub trait InteractiveTarget: Send {
    fn set_active(&mut self, active: bool);
    fn set_color(&mut self, color: Color) -> Result<(), TargetError>;
}

#[derive(Default)]
pub struct InteractiveTargetAdapter {
    target: Option<Box<dyn InteractiveTarget>>,
}

impl InteractiveTargetAdapter {
    pub fn new(target: Option<Box<dyn InteractiveTarget>>) -> Self {
        Self { target }
    }

    pub fn set_visible(&mut self, visible: bool) -> Result<(), TargetError> {
        let target = self.target.as_mut().ok_or(TargetError::Unbound)?;
        target.set_active(visible);
        Ok(())
    }

    pub fn set_color(&mut self, color: Color) -> Result<(), TargetError> {
        self.target.as_mut().ok_or(TargetError::Unbound)?.set_color(color)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneObjectState {
    pub active: bool,
    pub color: Option<Color>,
    pub has_renderer: bool,
}

/// In-memory scene object. Clones share state.
#[derive(Debug, Clone)]
pub struct SceneObject {
    state: Arc<Mutex<SceneObjectState>>,
}

impl Default for SceneObject {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneObject {
    pub fn new() -> Self {
        Self::with_renderer(true)
    }

    pub fn without_renderer() -> Self {
        Self::with_renderer(false)
    }

    fn with_renderer(has_renderer: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SceneObjectState {
                active: true,
                color: None,
                has_renderer,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SceneObjectState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> SceneObjectState {
        *self.lock()
    }
}

impl InteractiveTarget for SceneObject {
    fn set_active(&mut self, active: bool) {
        debug!(active, "scene object visibility");
        self.lock().active = active;
    }

    fn set_color(&mut self, color: Color) -> Result<(), TargetError> {
        let mut state = self.lock();
        if !state.has_renderer {
            return Err(TargetError::MissingSurface);
        }
        state.color = Some(color);
        Ok(())
    }
}
