use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use cideldill_proto::{
    calls::{CallId, CallRecord, CallSite, CallStatus, CallType, ExceptionInfo},
    cid::Cid,
    endpoints::call::CompletionStatus,
};
use parking_lot::Mutex;

/// Everything `call/start` hands the registry about a new invocation.
pub struct NewCall {
    pub call_type: CallType,
    pub method_name: String,
    pub target_cid: Cid,
    pub args: Vec<Cid>,
    pub kwargs: HashMap<String, Cid>,
    pub call_site: CallSite,
    pub break_on_exception: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CompleteError {
    /// No record exists for the given call.
    Unknown,
    /// The call already accepted its one completion.
    Duplicate,
}

#[derive(Default)]
struct SecondSequence {
    second: i64,
    next: u32,
}

/// Assigns call identifiers and retains one record per intercepted call
/// for the lifetime of the process.
#[derive(Default)]
pub struct CallRegistry {
    // call ids sort chronologically, so a BTreeMap keeps the operator
    // listing in arrival order for free
    records: Mutex<BTreeMap<CallId, CallRecord>>,
    sequence: Mutex<SecondSequence>,
}

impl CallRegistry {
    /// Records a started call and returns its freshly minted identifier.
    pub fn begin(&self, call: NewCall) -> CallId {
        let started_at = Utc::now();
        let call_id = self.next_id(started_at);

        let record = CallRecord {
            call_id: call_id.clone(),
            call_type: call.call_type,
            method_name: call.method_name,
            target_cid: call.target_cid,
            args: call.args,
            kwargs: call.kwargs,
            call_site: call.call_site,
            started_at,
            status: CallStatus::Running,
            result_cid: None,
            exception: None,
            break_on_exception: call.break_on_exception,
        };

        self.records.lock().insert(call_id.clone(), record);

        call_id
    }

    /// Accepts the single completion a call is allowed. Returns whether an
    /// on-exception rule was armed when the call started, so the endpoint
    /// can decide to hold the caller for inspection.
    pub fn complete(
        &self,
        call_id: &CallId,
        status: CompletionStatus,
        result_cid: Option<Cid>,
        exception: Option<ExceptionInfo>,
    ) -> Result<bool, CompleteError> {
        let mut records = self.records.lock();

        let record = records.get_mut(call_id).ok_or(CompleteError::Unknown)?;

        if matches!(record.status, CallStatus::Completed | CallStatus::Failed) {
            return Err(CompleteError::Duplicate);
        }

        record.status = match status {
            CompletionStatus::Success => CallStatus::Completed,
            CompletionStatus::Exception => CallStatus::Failed,
        };
        record.result_cid = result_cid;
        record.exception = exception;

        Ok(record.break_on_exception)
    }

    pub fn set_status(&self, call_id: &CallId, status: CallStatus) {
        if let Some(record) = self.records.lock().get_mut(call_id) {
            record.status = status;
        }
    }

    /// Marks a paused call running again; records whose outcome is already
    /// fixed are left alone (a post-completion hold does not change what
    /// happened).
    pub fn resume(&self, call_id: &CallId) {
        if let Some(record) = self.records.lock().get_mut(call_id) {
            if record.status == CallStatus::Paused {
                record.status = CallStatus::Running;
            }
        }
    }

    pub fn list(&self) -> Vec<CallRecord> {
        self.records.lock().values().cloned().collect()
    }

    /// Mints `<unix-seconds.microseconds>-<per-second-sequence>`. The
    /// sequence resets whenever the clock ticks over to a new second.
    fn next_id(&self, now: DateTime<Utc>) -> CallId {
        let mut sequence = self.sequence.lock();

        let second = now.timestamp();
        if sequence.second != second {
            sequence.second = second;
            sequence.next = 0;
        }

        let serial = sequence.next;
        sequence.next += 1;

        CallId::new(format!(
            "{second}.{micros:06}-{serial}",
            micros = now.timestamp_subsec_micros()
        ))
    }
}
