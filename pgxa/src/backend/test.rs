//! In-memory PostgreSQL stand-in for tests.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{Address, Connector, Error, Row, ServerConnector, Transport};

#[derive(Default, Debug)]
struct State {
    committed: Vec<String>,
    prepared: Vec<(String, Vec<String>)>,
    queries: Vec<String>,
    fail: Vec<String>,
    refuse: bool,
    connections: usize,
    closed: usize,
}

/// Fake server shared by all sessions opened through its connector.
#[derive(Clone, Default, Debug)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        let backend = self.clone();
        Arc::new(ServerConnector::new(move |addr: &Address| {
            backend.connect(addr)
        }))
    }

    fn connect(&self, addr: &Address) -> Result<FakeTransport, Error> {
        let mut state = self.state.lock();
        if state.refuse {
            return Err(Error::Connect {
                addr: addr.to_string(),
                reason: "connection refused".into(),
            });
        }
        state.connections += 1;

        Ok(FakeTransport {
            backend: self.clone(),
            in_transaction: false,
            writes: vec![],
            savepoints: vec![],
        })
    }

    /// Fail the next query starting with `prefix`.
    pub fn fail_on(&self, prefix: &str) {
        self.state.lock().fail.push(prefix.to_uppercase());
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse = refuse;
    }

    /// Transaction prepared by another client.
    pub fn prepare_external(&self, gid: &str) {
        self.state.lock().prepared.push((gid.to_string(), vec![]));
    }

    /// Writes visible to everyone.
    pub fn committed(&self) -> Vec<String> {
        self.state.lock().committed.clone()
    }

    /// Prepared transaction identifiers.
    pub fn prepared(&self) -> Vec<String> {
        self.state
            .lock()
            .prepared
            .iter()
            .map(|(gid, _)| gid.clone())
            .collect()
    }

    /// Every query received, in order.
    pub fn queries(&self) -> Vec<String> {
        self.state.lock().queries.clone()
    }

    pub fn connections(&self) -> usize {
        self.state.lock().connections
    }

    pub fn closed(&self) -> usize {
        self.state.lock().closed
    }
}

fn gid(query: &str) -> Result<String, Error> {
    let start = query.find('\'');
    let end = query.rfind('\'');

    match (start, end) {
        (Some(start), Some(end)) if end > start => Ok(query[start + 1..end].to_string()),
        _ => Err(Error::Server(format!("syntax error: {}", query))),
    }
}

fn name(query: &str) -> String {
    query
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .to_lowercase()
}

struct FakeTransport {
    backend: FakeBackend,
    in_transaction: bool,
    writes: Vec<String>,
    savepoints: Vec<(String, usize)>,
}

impl FakeTransport {
    fn finish(&mut self) -> Vec<String> {
        self.in_transaction = false;
        self.savepoints.clear();
        std::mem::take(&mut self.writes)
    }
}

impl Transport for FakeTransport {
    fn query(&mut self, query: &str) -> Result<Vec<Row>, Error> {
        let normalized = query.trim().trim_end_matches(';').to_uppercase();
        let shared = self.backend.state.clone();
        let mut state = shared.lock();
        state.queries.push(query.to_string());

        if let Some(pos) = state.fail.iter().position(|f| normalized.starts_with(f)) {
            state.fail.remove(pos);
            return Err(Error::Server(format!("injected failure: {}", query)));
        }

        if normalized == "BEGIN" {
            self.in_transaction = true;
        } else if normalized == "COMMIT" {
            let writes = self.finish();
            state.committed.extend(writes);
        } else if normalized == "ROLLBACK" {
            self.finish();
        } else if normalized.starts_with("SAVEPOINT") {
            if !self.in_transaction {
                return Err(Error::Server(
                    "SAVEPOINT can only be used in transaction blocks".into(),
                ));
            }
            self.savepoints.push((name(query), self.writes.len()));
        } else if normalized.starts_with("ROLLBACK TO SAVEPOINT") {
            let name = name(query);
            let pos = self
                .savepoints
                .iter()
                .rposition(|(n, _)| n == &name)
                .ok_or_else(|| Error::Server(format!("savepoint \"{}\" does not exist", name)))?;
            let mark = self.savepoints[pos].1;
            self.savepoints.truncate(pos + 1);
            self.writes.truncate(mark);
        } else if normalized.starts_with("RELEASE SAVEPOINT") {
            let name = name(query);
            if let Some(pos) = self.savepoints.iter().rposition(|(n, _)| n == &name) {
                self.savepoints.truncate(pos);
            }
        } else if normalized.starts_with("PREPARE TRANSACTION") {
            let gid = gid(query)?;
            if state.prepared.iter().any(|(g, _)| g == &gid) {
                self.finish();
                return Err(Error::Server(format!(
                    "transaction identifier \"{}\" is already in use",
                    gid
                )));
            }
            let writes = self.finish();
            state.prepared.push((gid, writes));
        } else if normalized.starts_with("COMMIT PREPARED")
            || normalized.starts_with("ROLLBACK PREPARED")
        {
            if self.in_transaction {
                return Err(Error::Server(
                    "cannot run inside a transaction block".into(),
                ));
            }
            let gid = gid(query)?;
            let pos = state
                .prepared
                .iter()
                .position(|(g, _)| g == &gid)
                .ok_or_else(|| {
                    Error::Server(format!(
                        "prepared transaction with identifier \"{}\" does not exist",
                        gid
                    ))
                })?;
            let (_, writes) = state.prepared.remove(pos);
            if normalized.starts_with("COMMIT") {
                state.committed.extend(writes);
            }
        } else if normalized.starts_with("SELECT GID FROM PG_PREPARED_XACTS") {
            return Ok(state
                .prepared
                .iter()
                .map(|(gid, _)| Row::new(vec![Some(gid.clone())]))
                .collect());
        } else if normalized.starts_with("SELECT") {
            // Reads don't change anything.
        } else if self.in_transaction {
            self.writes.push(query.to_string());
        } else {
            state.committed.push(query.to_string());
        }

        Ok(vec![])
    }

    fn close(&mut self) {
        self.backend.state.lock().closed += 1;
    }
}
