use keystone_core::PrincipalId;
use uuid::Uuid;

/// Correlation context for a request, attached by the trace stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: Uuid,
}

impl TraceContext {
    pub fn new(trace_id: Uuid) -> Self {
        Self { trace_id }
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }
}

/// Authenticated identity for a request, attached by the auth stage.
///
/// Its presence is the only proof downstream stages accept that
/// authentication succeeded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId) -> Self {
        Self { principal_id }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }
}
