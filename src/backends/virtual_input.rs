use crate::config::DeckConfig;
use crate::error::{CommandError, ConfigurationError, ReadError};
use crate::event::{Direction, LineId};
use crate::sampler::LineSampler;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How long a console `tap` holds an encoder button down.
pub const TAP_HOLD: Duration = Duration::from_millis(50);

#[derive(Default)]
struct Lines {
    levels: HashMap<LineId, bool>,
    faulty: HashSet<LineId>,
    refuse_claims: u32,
    claimed: Vec<LineId>,
    releases: u32,
}

/// Control handle for a [`VirtualSampler`]. Cheap to clone; all clones drive the same lines.
///
/// Lines that were never set read HIGH (idle level with pull-ups).
#[derive(Clone, Default)]
pub struct VirtualLines(Arc<Mutex<Lines>>);

impl VirtualLines {
    fn lock(&self) -> MutexGuard<'_, Lines> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drive `line` to `level`.
    pub fn set(&self, line: LineId, level: bool) {
        self.lock().levels.insert(line, level);
    }

    /// Drive both phases of an encoder at once.
    pub fn set_phases(&self, a: LineId, b: LineId, levels: (bool, bool)) {
        let mut lines = self.lock();
        lines.levels.insert(a, levels.0);
        lines.levels.insert(b, levels.1);
    }

    pub fn level(&self, line: LineId) -> bool {
        self.lock().levels.get(&line).copied().unwrap_or(true)
    }

    /// Make reads of `line` fail until [`heal`](Self::heal) is called.
    pub fn fail(&self, line: LineId) {
        self.lock().faulty.insert(line);
    }

    pub fn heal(&self, line: LineId) {
        self.lock().faulty.remove(&line);
    }

    /// Make the next `count` claims fail.
    pub fn refuse_claims(&self, count: u32) {
        self.lock().refuse_claims = count;
    }

    /// Lines currently claimed by the sampler.
    pub fn claimed(&self) -> Vec<LineId> {
        self.lock().claimed.clone()
    }

    /// How many times `release_all` ran.
    pub fn releases(&self) -> u32 {
        self.lock().releases
    }

    /// Move an encoder's phases by one A edge in `direction`.
    pub fn turn(&self, a: LineId, b: LineId, direction: Direction) {
        let next_a = !self.level(a);
        let next_b = match direction {
            Direction::Forward => !next_a,
            Direction::Backward => next_a,
        };
        self.set_phases(a, b, (next_a, next_b));
    }

    /// Carry out one console command against the lines wired in `config`.
    pub fn apply(&self, config: &DeckConfig, command: &Command) -> Result<(), CommandError> {
        match command {
            Command::Toggle(name) => {
                let line = config
                    .keys
                    .iter()
                    .chain(&config.switches)
                    .find(|input| input.name == *name)
                    .map(|input| input.line)
                    .ok_or_else(|| CommandError::UnknownInput(name.clone()))?;
                self.set(line, !self.level(line));
            }
            Command::Turn(id, direction) => {
                let enc = config
                    .encoders
                    .iter()
                    .find(|e| e.id == *id)
                    .ok_or(CommandError::UnknownEncoder(*id))?;
                self.turn(enc.phase_a, enc.phase_b, *direction);
            }
            Command::Tap(id) => {
                let enc = config
                    .encoders
                    .iter()
                    .find(|e| e.id == *id)
                    .ok_or(CommandError::UnknownEncoder(*id))?;
                let button = enc.button.ok_or(CommandError::NoButton(*id))?;
                self.set(button, false);
                std::thread::sleep(TAP_HOLD);
                self.set(button, true);
            }
        }
        Ok(())
    }
}

/// One line typed at the simulator console.
///
/// - `<name>` toggles the key or switch called `name`
/// - `e<id>+` / `e<id>-` turns encoder `id` one step forward / backward
/// - `e<id>p` taps the encoder's button
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Toggle(String),
    Turn(u32, Direction),
    Tap(u32),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CommandError::Empty);
        }

        let encoder = s.strip_prefix('e').and_then(|rest| {
            let op = rest.chars().last()?;
            let id = rest[..rest.len() - op.len_utf8()].parse::<u32>().ok()?;
            Some((id, op))
        });
        Ok(match encoder {
            Some((id, '+')) => Command::Turn(id, Direction::Forward),
            Some((id, '-')) => Command::Turn(id, Direction::Backward),
            Some((id, 'p')) => Command::Tap(id),
            _ => Command::Toggle(s.to_string()),
        })
    }
}

/// In-memory sampler for simulation and tests.
#[derive(Default)]
pub struct VirtualSampler {
    lines: VirtualLines,
}

impl VirtualSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that stays valid after the sampler has been moved into an engine.
    pub fn handle(&self) -> VirtualLines {
        self.lines.clone()
    }
}

impl LineSampler for VirtualSampler {
    fn claim(&mut self, line: LineId) -> Result<(), ConfigurationError> {
        let mut lines = self.lines.lock();
        if lines.refuse_claims > 0 {
            lines.refuse_claims -= 1;
            return Err(ConfigurationError::Claim {
                line,
                reason: "line busy".into(),
            });
        }
        lines.claimed.push(line);
        Ok(())
    }

    fn read(&mut self, line: LineId) -> Result<bool, ReadError> {
        let lines = self.lines.lock();
        if lines.faulty.contains(&line) {
            return Err(ReadError::new(line, "injected fault"));
        }
        Ok(lines.levels.get(&line).copied().unwrap_or(true))
    }

    fn release_all(&mut self) {
        let mut lines = self.lines.lock();
        lines.claimed.clear();
        lines.releases += 1;
    }

    fn name(&self) -> &str {
        "virtual"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_drives_sampler() {
        let mut sampler = VirtualSampler::new();
        let lines = sampler.handle();
        assert_eq!(sampler.read(LineId(5)), Ok(true));
        lines.set(LineId(5), false);
        assert_eq!(sampler.read(LineId(5)), Ok(false));
        lines.fail(LineId(5));
        assert!(sampler.read(LineId(5)).is_err());
        lines.heal(LineId(5));
        assert_eq!(sampler.read(LineId(5)), Ok(false));
    }

    #[test]
    fn console_commands_parse() {
        assert_eq!("green".parse::<Command>(), Ok(Command::Toggle("green".into())));
        assert_eq!(" e2+ ".parse::<Command>(), Ok(Command::Turn(2, Direction::Forward)));
        assert_eq!("e12-".parse::<Command>(), Ok(Command::Turn(12, Direction::Backward)));
        assert_eq!("e1p".parse::<Command>(), Ok(Command::Tap(1)));
        assert_eq!("enter".parse::<Command>(), Ok(Command::Toggle("enter".into())));
        assert_eq!("".parse::<Command>(), Err(CommandError::Empty));
    }

    #[test]
    fn console_commands_drive_configured_lines() {
        let config = DeckConfig::default();
        let lines = VirtualLines::default();

        lines.apply(&config, &Command::Toggle("blue".into())).unwrap();
        assert!(!lines.level(LineId(20)));
        lines.apply(&config, &Command::Toggle("blue".into())).unwrap();
        assert!(lines.level(LineId(20)));

        // Encoder 1 idles at (1,1); forward is A falling with B high.
        lines.apply(&config, &Command::Turn(1, Direction::Forward)).unwrap();
        assert_eq!((lines.level(LineId(5)), lines.level(LineId(6))), (false, true));
        lines.apply(&config, &Command::Turn(1, Direction::Backward)).unwrap();
        assert_eq!((lines.level(LineId(5)), lines.level(LineId(6))), (true, true));

        lines.apply(&config, &Command::Tap(1)).unwrap();
        assert!(lines.level(LineId(26)));

        assert_eq!(
            lines.apply(&config, &Command::Toggle("purple".into())),
            Err(CommandError::UnknownInput("purple".into()))
        );
        assert_eq!(
            lines.apply(&config, &Command::Tap(4)),
            Err(CommandError::NoButton(4))
        );
        assert_eq!(
            lines.apply(&config, &Command::Turn(9, Direction::Forward)),
            Err(CommandError::UnknownEncoder(9))
        );
    }

    #[test]
    fn refused_claims_run_out() {
        let mut sampler = VirtualSampler::new();
        let lines = sampler.handle();
        lines.refuse_claims(1);
        assert!(sampler.claim(LineId(1)).is_err());
        assert!(sampler.claim(LineId(1)).is_ok());
        assert_eq!(lines.claimed(), vec![LineId(1)]);
        sampler.release_all();
        assert!(lines.claimed().is_empty());
        assert_eq!(lines.releases(), 1);
    }
}
