use backtrace::Backtrace;
use chrono::Utc;
use cideldill_proto::{
    calls::{CallSite, StackFrame},
    cid::Cid,
};

/// Frames kept per capture; enough to place the call without shipping the
/// runtime's own stack bottom on every invocation.
const MAX_FRAMES: usize = 16;

/// Captures the stack at the moment of interception. Frames inside this
/// library and the backtrace machinery are skipped so the trace starts at
/// the intercepted caller.
pub(crate) fn capture(target_cid: Cid) -> CallSite {
    let backtrace = Backtrace::new();
    let mut stack_trace = Vec::new();

    'frames: for frame in backtrace.frames() {
        for symbol in frame.symbols() {
            let function = match symbol.name() {
                Some(name) => name.to_string(),
                None => continue,
            };

            if function.starts_with("cideldill_client::")
                || function.starts_with("backtrace::")
            {
                continue;
            }

            let file = symbol
                .filename()
                .map(|path| path.display().to_string())
                .unwrap_or_default();
            let line = symbol.lineno().unwrap_or(0);

            stack_trace.push(StackFrame {
                source_context: source_line(&file, line),
                file,
                line,
                function,
            });

            if stack_trace.len() >= MAX_FRAMES {
                break 'frames;
            }
        }
    }

    CallSite {
        timestamp: Utc::now(),
        target_cid,
        stack_trace,
    }
}

fn source_line(file: &str, line: u32) -> Option<String> {
    if file.is_empty() || line == 0 {
        return None;
    }

    let content = std::fs::read_to_string(file).ok()?;

    content
        .lines()
        .nth(line as usize - 1)
        .map(|text| text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use cideldill_proto::cid::Cid;

    use super::{capture, MAX_FRAMES};

    #[test]
    fn capture_skips_this_library_and_stays_bounded() {
        let site = capture(Cid::of(b"target"));

        assert!(site.stack_trace.len() <= MAX_FRAMES);
        assert!(site
            .stack_trace
            .iter()
            .all(|frame| !frame.function.starts_with("cideldill_client::")));
    }
}
