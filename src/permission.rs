use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::model::PermissionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Microphone,
}

/// Platform permission API. A `request` shows the system dialog; the answer is
/// observed later through `has_permission` once the app regains focus.
pub trait PermissionProvider: Send {
    fn has_permission(&self, permission: Permission) -> bool;
    fn request(&mut self, permission: Permission);
}

#[derive(Debug, Clone)]
pub struct PermissionGate {
    state: PermissionState,
    pending: bool,
    gated: bool,
}

impl PermissionGate {
    /// `gated` is false on platforms without a runtime microphone permission.
    pub fn new(gated: bool) -> Self {
        Self {
            state: PermissionState::Unknown,
            pending: false,
            gated,
        }
    }

    pub fn state(&self) -> PermissionState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn request(&mut self, provider: &mut dyn PermissionProvider) -> PermissionState {
        if self.state == PermissionState::Granted {
            return self.state;
        }
        if !self.gated || provider.has_permission(Permission::Microphone) {
            self.pending = false;
            self.state = PermissionState::Granted;
            return self.state;
        }
        if self.pending {
            debug!("microphone permission request already pending");
            return self.state;
        }

        info!("requesting microphone permission");
        provider.request(Permission::Microphone);
        self.pending = true;
        self.state = PermissionState::Requested;
        self.state
    }

    /// Accepts one resolution per outstanding request.
    pub fn on_resolved(&mut self, granted: bool) -> Option<PermissionState> {
        if !self.pending {
            debug!(granted, "ignoring permission resolution with no pending request");
            return None;
        }
        self.pending = false;
        self.state = if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        info!(state = ?self.state, "microphone permission resolved");
        Some(self.state)
    }

    pub fn revoke(&mut self) {
        self.pending = false;
        self.state = PermissionState::Denied;
    }
}

#[derive(Debug, Default)]
struct SimulatedPermissionsInner {
    granted: bool,
    requests: u32,
}

/// Scriptable permission provider. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPermissions {
    inner: Arc<Mutex<SimulatedPermissionsInner>>,
}

impl SimulatedPermissions {
    pub fn new(granted: bool) -> Self {
        let permissions = Self::default();
        permissions.set_granted(granted);
        permissions
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedPermissionsInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Simulates the user answering the dialog, or revoking in system settings.
    pub fn set_granted(&self, granted: bool) {
        self.lock().granted = granted;
    }

    pub fn request_count(&self) -> u32 {
        self.lock().requests
    }
}

impl PermissionProvider for SimulatedPermissions {
    fn has_permission(&self, _permission: Permission) -> bool {
        self.lock().granted
    }

    fn request(&mut self, _permission: Permission) {
        self.lock().requests += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pending_request_does_not_open_second_dialog() {
        let mut provider = SimulatedPermissions::new(false);
        let mut gate = PermissionGate::new(true);

        assert_eq!(gate.request(&mut provider), PermissionState::Requested);
        assert_eq!(gate.request(&mut provider), PermissionState::Requested);
        assert_eq!(provider.request_count(), 1);
    }

    #[test]
    fn non_gated_platform_is_granted_immediately() {
        let mut provider = SimulatedPermissions::new(false);
        let mut gate = PermissionGate::new(false);
        assert_eq!(gate.request(&mut provider), PermissionState::Granted);
        assert_eq!(provider.request_count(), 0);
    }

    #[test]
    fn resolution_is_accepted_once() {
        let mut provider = SimulatedPermissions::new(false);
        let mut gate = PermissionGate::new(true);
        gate.request(&mut provider);

        assert_eq!(gate.on_resolved(false), Some(PermissionState::Denied));
        assert_eq!(gate.on_resolved(true), None);
        assert_eq!(gate.state(), PermissionState::Denied);
    }

    #[test]
    fn revoked_gate_asks_again() {
        let mut provider = SimulatedPermissions::new(true);
        let mut gate = PermissionGate::new(true);
        assert_eq!(gate.request(&mut provider), PermissionState::Granted);

        provider.set_granted(false);
        gate.revoke();
        assert_eq!(gate.request(&mut provider), PermissionState::Requested);
        assert_eq!(provider.request_count(), 1);
    }
}
