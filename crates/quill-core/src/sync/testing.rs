//! In-memory remote used by engine tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::models::{NoteId, NoteRecord};
use crate::remote::{RemoteError, RemoteFilter, RemoteNotes, RemoteResult};

/// A request the fake received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    List,
    Upsert { id: NoteId, title: String },
    Delete(NoteId),
}

enum Failure {
    Error(RemoteError),
    /// Apply the write, then lose the response
    DropResponse,
}

#[derive(Default)]
struct FakeState {
    records: BTreeMap<NoteId, NoteRecord>,
    calls: Vec<RemoteCall>,
    failures: HashMap<NoteId, VecDeque<Failure>>,
    list_failure: Option<RemoteError>,
    reachable: bool,
    delay: Option<Duration>,
}

pub struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                reachable: true,
                ..FakeState::default()
            }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn fail_next(&self, id: NoteId, error: RemoteError) {
        self.lock()
            .failures
            .entry(id)
            .or_default()
            .push_back(Failure::Error(error));
    }

    pub fn drop_next_response(&self, id: NoteId) {
        self.lock()
            .failures
            .entry(id)
            .or_default()
            .push_back(Failure::DropResponse);
    }

    pub fn fail_next_list(&self, error: RemoteError) {
        self.lock().list_failure = Some(error);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    pub fn seed(&self, record: NoteRecord) {
        self.lock().records.insert(record.id, record);
    }

    pub fn record(&self, id: &NoteId) -> Option<NoteRecord> {
        self.lock().records.get(id).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    pub fn write_calls(&self) -> Vec<RemoteCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, RemoteCall::List))
            .collect()
    }

    fn next_failure(state: &mut FakeState, id: &NoteId) -> Option<Failure> {
        state.failures.get_mut(id).and_then(VecDeque::pop_front)
    }

    fn delayed<T: Send>(
        delay: Option<Duration>,
        result: RemoteResult<T>,
    ) -> impl Future<Output = RemoteResult<T>> + Send {
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        }
    }
}

impl RemoteNotes for FakeRemote {
    fn list(
        &self,
        filter: &RemoteFilter,
    ) -> impl Future<Output = RemoteResult<Vec<NoteRecord>>> + Send {
        let mut state = self.lock();
        state.calls.push(RemoteCall::List);
        let result = match state.list_failure.take() {
            Some(error) => Err(error),
            None => Ok(state
                .records
                .values()
                .filter(|record| {
                    filter
                        .tag
                        .as_ref()
                        .is_none_or(|tag| record.tags.contains(tag))
                })
                .filter(|record| {
                    filter
                        .collection_id
                        .as_ref()
                        .is_none_or(|collection| record.collection_id.as_ref() == Some(collection))
                })
                .cloned()
                .collect()),
        };
        Self::delayed(state.delay, result)
    }

    fn upsert(&self, record: &NoteRecord) -> impl Future<Output = RemoteResult<()>> + Send {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Upsert {
            id: record.id,
            title: record.title.clone(),
        });
        let result = match Self::next_failure(&mut state, &record.id) {
            Some(Failure::Error(error)) => Err(error),
            Some(Failure::DropResponse) => {
                state.records.insert(record.id, record.clone());
                Err(RemoteError::Transient("connection reset".to_string()))
            }
            None => {
                state.records.insert(record.id, record.clone());
                Ok(())
            }
        };
        Self::delayed(state.delay, result)
    }

    fn delete(&self, id: &NoteId) -> impl Future<Output = RemoteResult<()>> + Send {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Delete(*id));
        let result = match Self::next_failure(&mut state, id) {
            Some(Failure::Error(error)) => Err(error),
            Some(Failure::DropResponse) => {
                state.records.remove(id);
                Err(RemoteError::Transient("connection reset".to_string()))
            }
            None => {
                if state.records.remove(id).is_some() {
                    Ok(())
                } else {
                    Err(RemoteError::NotFound)
                }
            }
        };
        Self::delayed(state.delay, result)
    }

    fn probe(&self) -> impl Future<Output = bool> + Send {
        let reachable = self.lock().reachable;
        async move { reachable }
    }
}
