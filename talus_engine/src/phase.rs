use std::cell::Cell;

/// Execution contexts during which record mutation is policy-rejected.
/// Both phases must observe an identical, stable snapshot on every game
/// instance, so writes are refused rather than synchronized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Render-callback code is running.
    Render,
    /// A networked input command is being built deterministically.
    InputBuild,
}

impl Phase {
    pub fn description(self) -> &'static str {
        match self {
            Phase::Render => "rendering",
            Phase::InputBuild => "input-command building",
        }
    }
}

/// Shared token tracking which forbidden phases are currently active.
/// Callers enter a phase through an RAII guard instead of flipping a bare
/// global flag.
#[derive(Debug, Default)]
pub struct PhaseContext {
    render: Cell<u32>,
    input_build: Cell<u32>,
}

impl PhaseContext {
    pub fn new() -> PhaseContext {
        PhaseContext::default()
    }

    pub fn enter(&self, phase: Phase) -> PhaseGuard<'_> {
        let cell = self.cell(phase);
        cell.set(cell.get() + 1);
        PhaseGuard { ctx: self, phase }
    }

    pub fn is_active(&self, phase: Phase) -> bool {
        self.cell(phase).get() > 0
    }

    /// The phase currently banning mutation, if any. Render wins when both
    /// are somehow active.
    pub fn forbidden(&self) -> Option<Phase> {
        if self.is_active(Phase::Render) {
            Some(Phase::Render)
        } else if self.is_active(Phase::InputBuild) {
            Some(Phase::InputBuild)
        } else {
            None
        }
    }

    fn cell(&self, phase: Phase) -> &Cell<u32> {
        match phase {
            Phase::Render => &self.render,
            Phase::InputBuild => &self.input_build,
        }
    }
}

pub struct PhaseGuard<'a> {
    ctx: &'a PhaseContext,
    phase: Phase,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        let cell = self.ctx.cell(self.phase);
        cell.set(cell.get() - 1);
    }
}
