use crate::error::{ConfigurationError, ReadError};
use crate::event::LineId;

/// Instantaneous access to digital input lines.
///
/// Implementations must return promptly from [`read`](LineSampler::read): the poll loop
/// calls it for every configured line on every tick.
pub trait LineSampler {
    /// Prepare `line` for input (export, set direction). Called during bring-up only.
    fn claim(&mut self, line: LineId) -> Result<(), ConfigurationError>;

    /// Current electrical level of `line` (`true` = HIGH).
    fn read(&mut self, line: LineId) -> Result<bool, ReadError>;

    /// Best-effort release of every claimed line. Errors are logged, not returned.
    fn release_all(&mut self);

    /// Short backend label for diagnostics.
    fn name(&self) -> &str;
}

impl<S: LineSampler + ?Sized> LineSampler for Box<S> {
    fn claim(&mut self, line: LineId) -> Result<(), ConfigurationError> {
        (**self).claim(line)
    }

    fn read(&mut self, line: LineId) -> Result<bool, ReadError> {
        (**self).read(line)
    }

    fn release_all(&mut self) {
        (**self).release_all()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
