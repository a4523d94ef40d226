use core::fmt::Arguments;

/// Nested diagnostic sink.
///
/// Carries only an indentation depth and forwards everything to the `log`
/// facade; callers hand it down with [`nest`](Logger::nest) so sub-steps
/// indent under the step that spawned them. Never interpreted beyond that.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger {
    depth: usize,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A logger one level deeper, for diagnostics of sub-steps.
    pub fn nest(&self) -> Self {
        Self {
            depth: self.depth + 1,
        }
    }

    pub fn debug(&self, args: Arguments<'_>) {
        log::debug!("{:width$}{args}", "", width = self.depth * 2);
    }

    pub fn trace(&self, args: Arguments<'_>) {
        log::trace!("{:width$}{args}", "", width = self.depth * 2);
    }
}
