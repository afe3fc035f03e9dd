use crate::{
    breakpoints::BreakpointTable,
    callables::CallableRegistry,
    calls::CallRegistry,
    config::{Config, PollSettings},
    rendezvous::PauseController,
    store::ContentStore,
};

/// Everything the endpoints share: the content store, the call registry,
/// the breakpoint table, and the pause controller. Each subsystem guards
/// its own state; no lock is ever held across more than one of them.
pub struct Context {
    pub store: ContentStore,
    pub calls: CallRegistry,
    pub callables: CallableRegistry,
    pub breakpoints: BreakpointTable,
    pub pauses: PauseController,
    pub poll: PollSettings,
}

impl Context {
    pub fn new(config: Config) -> Self {
        Self {
            store: ContentStore::default(),
            calls: CallRegistry::default(),
            callables: CallableRegistry::default(),
            breakpoints: BreakpointTable::default(),
            pauses: PauseController::default(),
            poll: config.poll,
        }
    }
}
