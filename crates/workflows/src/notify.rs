//! Outbound tenant notifications.

use std::sync::Mutex;

use propledger_core::{OrgId, TenantId, TraceId};

/// A tenant-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub org_id: OrgId,
    pub tenant_id: TenantId,
    pub subject: String,
    pub body: String,
    pub trace_id: TraceId,
}

/// Outbound notification dispatcher.
///
/// Delivery is fire-and-forget from the caller's point of view: a failed
/// notification is logged by the caller and never rolls anything back.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice) -> anyhow::Result<()>;
}

/// Records notices instead of delivering them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notice> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("lock poisoned"))?
            .push(notice.clone());
        Ok(())
    }
}
