use cideldill_proto::endpoints::operator::Breakpoint;
use parking_lot::RwLock;

/// The rule set consulted on every `call/start`.
///
/// Kept as an insertion-ordered list so the operator listing is stable;
/// the set stays small enough that a linear scan per call is fine.
#[derive(Default)]
pub struct BreakpointTable {
    rules: RwLock<Vec<Breakpoint>>,
}

impl BreakpointTable {
    pub fn add(&self, rule: Breakpoint) {
        let mut rules = self.rules.write();
        if !rules.contains(&rule) {
            rules.push(rule);
        }
    }

    pub fn remove(&self, rule: &Breakpoint) -> bool {
        let mut rules = self.rules.write();
        let before = rules.len();
        rules.retain(|r| r != rule);
        rules.len() != before
    }

    pub fn list(&self) -> Vec<Breakpoint> {
        self.rules.read().clone()
    }

    /// Should a call to `method_name` pause before running?
    pub fn pauses(&self, method_name: &str) -> bool {
        self.rules.read().iter().any(|rule| match rule {
            Breakpoint::All => true,
            Breakpoint::Callable { name } => name == method_name,
            Breakpoint::OnException => false,
        })
    }

    /// Is an exception rule armed right now? Sampled at start time so the
    /// call record can be flagged for the operator UI.
    pub fn arms_on_exception(&self) -> bool {
        self.rules
            .read()
            .iter()
            .any(|rule| matches!(rule, Breakpoint::OnException))
    }
}
