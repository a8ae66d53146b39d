//! Saga state persistence.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use propledger_core::{OrgId, SagaId};

use crate::error::SagaError;
use crate::state::{SagaState, SagaStatus};

/// Saga state store abstraction.
///
/// Implementations must keep instances strictly org-scoped: a lookup with
/// the wrong organization id is an isolation violation, not a miss.
pub trait SagaStore: Send + Sync {
    /// Persist a new instance.
    fn insert(&self, state: SagaState) -> Result<(), SagaError>;

    /// Fetch an instance by id within an organization.
    fn get(&self, org_id: OrgId, id: SagaId) -> Result<Option<SagaState>, SagaError>;

    /// Overwrite an existing instance with its next state.
    fn update(&self, state: &SagaState) -> Result<(), SagaError>;

    /// All running instances for an organization, oldest first.
    fn list_running(&self, org_id: OrgId) -> Result<Vec<SagaState>, SagaError>;
}

impl<S> SagaStore for Arc<S>
where
    S: SagaStore + ?Sized,
{
    fn insert(&self, state: SagaState) -> Result<(), SagaError> {
        (**self).insert(state)
    }

    fn get(&self, org_id: OrgId, id: SagaId) -> Result<Option<SagaState>, SagaError> {
        (**self).get(org_id, id)
    }

    fn update(&self, state: &SagaState) -> Result<(), SagaError> {
        (**self).update(state)
    }

    fn list_running(&self, org_id: OrgId) -> Result<Vec<SagaState>, SagaError> {
        (**self).list_running(org_id)
    }
}

/// In-memory saga store for tests and development.
#[derive(Debug, Default)]
pub struct InMemorySagaStore {
    sagas: RwLock<HashMap<SagaId, SagaState>>,
}

impl InMemorySagaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SagaStore for InMemorySagaStore {
    fn insert(&self, state: SagaState) -> Result<(), SagaError> {
        let mut sagas = self
            .sagas
            .write()
            .map_err(|_| SagaError::Store("lock poisoned".to_string()))?;

        if sagas.contains_key(&state.id) {
            return Err(SagaError::Store(format!("saga already exists: {}", state.id)));
        }
        sagas.insert(state.id, state);
        Ok(())
    }

    fn get(&self, org_id: OrgId, id: SagaId) -> Result<Option<SagaState>, SagaError> {
        let sagas = self
            .sagas
            .read()
            .map_err(|_| SagaError::Store("lock poisoned".to_string()))?;

        match sagas.get(&id) {
            Some(state) if state.org_id == org_id => Ok(Some(state.clone())),
            Some(_) => Err(SagaError::OrgIsolation),
            None => Ok(None),
        }
    }

    fn update(&self, state: &SagaState) -> Result<(), SagaError> {
        let mut sagas = self
            .sagas
            .write()
            .map_err(|_| SagaError::Store("lock poisoned".to_string()))?;

        match sagas.get(&state.id) {
            Some(existing) if existing.org_id != state.org_id => Err(SagaError::OrgIsolation),
            Some(_) => {
                sagas.insert(state.id, state.clone());
                Ok(())
            }
            None => Err(SagaError::SagaNotFound { id: state.id }),
        }
    }

    fn list_running(&self, org_id: OrgId) -> Result<Vec<SagaState>, SagaError> {
        let sagas = self
            .sagas
            .read()
            .map_err(|_| SagaError::Store("lock poisoned".to_string()))?;

        let mut running: Vec<_> = sagas
            .values()
            .filter(|s| s.org_id == org_id && s.status == SagaStatus::Running)
            .cloned()
            .collect();

        running.sort_by_key(|s| s.started_at);
        Ok(running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    use propledger_core::TraceId;

    fn test_state(org_id: OrgId, offset_ms: i64) -> SagaState {
        let now = Utc::now() + chrono::Duration::milliseconds(offset_ms);
        SagaState {
            id: SagaId::new(),
            org_id,
            name: "test".to_string(),
            current_step: "first".to_string(),
            payload: json!({}),
            status: SagaStatus::Running,
            trace_id: TraceId::new(),
            timeout: Duration::from_secs(1800),
            last_heartbeat_at: now,
            started_at: now,
            updated_at: now,
            result: None,
            error: None,
        }
    }

    #[test]
    fn insert_get_update_round_trip() {
        let store = InMemorySagaStore::new();
        let org = OrgId::new();
        let state = test_state(org, 0);
        let id = state.id;

        store.insert(state.clone()).unwrap();
        assert_eq!(store.get(org, id).unwrap().unwrap().current_step, "first");

        let mut next = state;
        next.current_step = "second".to_string();
        store.update(&next).unwrap();
        assert_eq!(store.get(org, id).unwrap().unwrap().current_step, "second");
    }

    #[test]
    fn wrong_org_is_isolation_not_a_miss() {
        let store = InMemorySagaStore::new();
        let org = OrgId::new();
        let state = test_state(org, 0);
        let id = state.id;
        store.insert(state).unwrap();

        assert!(matches!(
            store.get(OrgId::new(), id),
            Err(SagaError::OrgIsolation)
        ));
        assert!(store.get(org, SagaId::new()).unwrap().is_none());
    }

    #[test]
    fn update_requires_existing_instance() {
        let store = InMemorySagaStore::new();
        let state = test_state(OrgId::new(), 0);

        assert!(matches!(
            store.update(&state),
            Err(SagaError::SagaNotFound { .. })
        ));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let store = InMemorySagaStore::new();
        let state = test_state(OrgId::new(), 0);

        store.insert(state.clone()).unwrap();
        assert!(matches!(store.insert(state), Err(SagaError::Store(_))));
    }

    #[test]
    fn list_running_filters_and_orders() {
        let store = InMemorySagaStore::new();
        let org = OrgId::new();
        let other_org = OrgId::new();

        let oldest = test_state(org, 0);
        let newest = test_state(org, 50);
        let mut finished = test_state(org, 25);
        finished.status = SagaStatus::Completed;
        let foreign = test_state(other_org, 10);

        store.insert(newest.clone()).unwrap();
        store.insert(oldest.clone()).unwrap();
        store.insert(finished).unwrap();
        store.insert(foreign).unwrap();

        let running = store.list_running(org).unwrap();
        let ids: Vec<_> = running.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![oldest.id, newest.id]);
    }
}
