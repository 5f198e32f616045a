use super::{Direction, Level, LineController, MuxSetting, PinDescriptor};
use crate::errors::{PinError, PinResult};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Last commanded configuration of an exported line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineState {
    pub direction: Option<Direction>,
    pub value: Option<Level>,
}

/// An acquired logical pin, identified by its primary line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinHandle {
    line: u32,
    direction: Direction,
}

impl PinHandle {
    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

#[derive(Debug)]
struct MuxClaim {
    level: Level,
    /// Primary lines of the logical pins routed through this mux line
    owners: BTreeSet<u32>,
}

/// Owns every line exported on behalf of a board.
///
/// Mux lines are not reference counted: once driven they stay exported and
/// asserted until [`release_all`](Self::release_all), even if the pin that
/// asserted them is released.
#[derive(Debug)]
pub struct PinResourceManager<C> {
    controller: C,
    lines: BTreeMap<u32, LineState>,
    mux_claims: BTreeMap<u32, MuxClaim>,
    /// Primary lines whose export and mux chain completed
    routed: BTreeSet<u32>,
}

impl<C: LineController> PinResourceManager<C> {
    pub fn new(controller: C) -> Self {
        Self {
            controller,
            lines: BTreeMap::new(),
            mux_claims: BTreeMap::new(),
            routed: BTreeSet::new(),
        }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn is_exported(&self, line: u32) -> bool {
        self.lines.contains_key(&line)
    }

    pub fn state(&self, line: u32) -> Option<LineState> {
        self.lines.get(&line).copied()
    }

    pub fn exported_lines(&self) -> impl Iterator<Item = u32> + '_ {
        self.lines.keys().copied()
    }

    /// Mux lines currently claimed by more than one logical pin, with the
    /// primary lines of their claimants.
    pub fn shared_mux_lines(&self) -> Vec<(u32, Vec<u32>)> {
        self.mux_claims
            .iter()
            .filter(|(_, claim)| claim.owners.len() > 1)
            .map(|(line, claim)| (*line, claim.owners.iter().copied().collect()))
            .collect()
    }

    /// Export `line` and start tracking it. Already tracked lines are left
    /// alone.
    pub fn export_line(&mut self, line: u32) -> PinResult<()> {
        if self.lines.contains_key(&line) {
            return Ok(());
        }
        self.controller.export(line)?;
        self.lines.insert(line, LineState::default());
        Ok(())
    }

    /// Set direction, and optionally drive, a tracked line
    pub fn configure_line(
        &mut self,
        line: u32,
        direction: Direction,
        level: Option<Level>,
    ) -> PinResult<()> {
        self.set_direction(line, direction)?;
        if let Some(level) = level {
            self.drive(line, level)?;
        }
        Ok(())
    }

    /// Export, configure and unexport a line without tracking it. Lines this
    /// manager already owns are configured but stay exported.
    pub fn configure_transient(
        &mut self,
        line: u32,
        direction: Direction,
        level: Option<Level>,
    ) -> PinResult<()> {
        if self.lines.contains_key(&line) {
            debug!("[gpio] line {} is tracked, configuring in place", line);
            return self.configure_line(line, direction, level);
        }
        self.controller.export(line)?;
        self.controller.set_direction(line, direction)?;
        if let Some(level) = level {
            self.controller.write(line, level)?;
        }
        self.controller.unexport(line)
    }

    /// Drive a tracked line
    pub fn drive(&mut self, line: u32, level: Level) -> PinResult<()> {
        let state = self
            .lines
            .get_mut(&line)
            .ok_or(PinError::NotAcquired { line })?;
        self.controller.write(line, level)?;
        state.value = Some(level);
        Ok(())
    }

    fn set_direction(&mut self, line: u32, direction: Direction) -> PinResult<()> {
        let state = self
            .lines
            .get_mut(&line)
            .ok_or(PinError::NotAcquired { line })?;
        self.controller.set_direction(line, direction)?;
        state.direction = Some(direction);
        Ok(())
    }

    fn assert_mux(&mut self, pin: &PinDescriptor, owner: u32, mux: MuxSetting) -> PinResult<()> {
        self.export_line(mux.line)?;
        self.configure_line(mux.line, Direction::Output, Some(mux.level))?;

        let claim = self.mux_claims.entry(mux.line).or_insert(MuxClaim {
            level: mux.level,
            owners: BTreeSet::new(),
        });
        let others: Vec<u32> = claim.owners.iter().copied().filter(|o| *o != owner).collect();
        if !others.is_empty() {
            if claim.level != mux.level {
                warn!(
                    "[gpio] mux line {} re-driven {:?} for {} while lines {:?} expect {:?}",
                    mux.line, mux.level, pin.name, others, claim.level
                );
            } else {
                warn!(
                    "[gpio] mux line {} shared by {} and lines {:?}; released only at teardown",
                    mux.line, pin.name, others
                );
            }
        }
        claim.level = mux.level;
        claim.owners.insert(owner);
        Ok(())
    }

    /// Make a logical pin usable in `direction`.
    ///
    /// On first acquisition the primary, resistor and level-shifter lines are
    /// exported in that order, then each mux line is exported and driven in
    /// list order. Later acquisitions skip straight to direction setup once
    /// that chain has completed; after a failure the whole chain is retried.
    pub fn acquire(&mut self, pin: &PinDescriptor, direction: Direction) -> PinResult<PinHandle> {
        let line = pin.gpio.ok_or_else(|| PinError::NoGpioLine {
            pin: pin.name.to_string(),
        })?;

        if !self.routed.contains(&line) {
            debug!("[gpio] acquiring {} on line {}", pin.name, line);
            self.export_line(line)?;
            if let Some(resistor) = pin.resistor {
                self.export_line(resistor)?;
            }
            if let Some(shifter) = pin.level_shifter {
                self.export_line(shifter)?;
            }
            for mux in pin.mux {
                self.assert_mux(pin, line, *mux)?;
            }
            self.routed.insert(line);
        }

        match direction {
            Direction::Input => {
                self.set_direction(line, Direction::Input)?;
                if let Some(resistor) = pin.resistor {
                    self.configure_line(resistor, Direction::Output, Some(Level::Low))?;
                }
                if let Some(shifter) = pin.level_shifter {
                    self.configure_line(shifter, Direction::Output, Some(Level::Low))?;
                }
            }
            Direction::Output => {
                self.set_direction(line, Direction::Output)?;
                if let Some(resistor) = pin.resistor {
                    self.configure_line(resistor, Direction::Input, None)?;
                }
                if let Some(shifter) = pin.level_shifter {
                    self.configure_line(shifter, Direction::Output, Some(Level::High))?;
                }
            }
        }

        Ok(PinHandle { line, direction })
    }

    pub fn read(&mut self, handle: PinHandle) -> PinResult<Level> {
        let line = handle.line;
        let state = self
            .lines
            .get_mut(&line)
            .ok_or(PinError::NotAcquired { line })?;
        let level = self.controller.read(line)?;
        state.value = Some(level);
        Ok(level)
    }

    pub fn write(&mut self, handle: PinHandle, level: Level) -> PinResult<()> {
        self.drive(handle.line, level)
    }

    /// Unexport the pin's primary line. Releasing twice is a no-op.
    pub fn release(&mut self, handle: PinHandle) -> PinResult<()> {
        self.release_line(handle.line)
    }

    /// Unexport a single tracked line; untracked lines are ignored
    pub fn release_line(&mut self, line: u32) -> PinResult<()> {
        if self.lines.remove(&line).is_none() {
            return Ok(());
        }
        self.routed.remove(&line);
        for (mux_line, claim) in self.mux_claims.iter_mut() {
            if claim.owners.remove(&line) && !claim.owners.is_empty() {
                warn!(
                    "[gpio] released line {} shares mux line {} with active lines {:?}",
                    line, mux_line, claim.owners
                );
            }
        }
        self.controller.unexport(line)
    }

    /// Unexport every tracked line, mux lines included, reporting every
    /// failure rather than stopping at the first.
    pub fn release_all(&mut self) -> Vec<PinError> {
        self.mux_claims.clear();
        self.routed.clear();
        let lines = std::mem::take(&mut self.lines);
        let mut errors = Vec::new();
        for line in lines.into_keys() {
            if let Err(e) = self.controller.unexport(line) {
                warn!("[gpio] teardown of line {} failed: {}", line, e);
                errors.push(e);
            }
        }
        errors
    }
}
