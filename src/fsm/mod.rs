//! Function-pointer mode state machine.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  ModeTable                                                       │
//! │  ┌─────────────┬──────────┬─────────┬──────────────┬──────────┐  │
//! │  │ SystemMode  │ on_enter │ on_exit │ on_input     │ on_tick  │  │
//! │  ├─────────────┼──────────┼─────────┼──────────────┼──────────┤  │
//! │  │ Standby     │ fn(ctx)  │    -    │ fn(ctx, ev)  │ fn(ctx)  │  │
//! │  │ Working     │ fn(ctx)  │    -    │ fn(ctx, ev)  │    -     │  │
//! │  │ Setting     │ fn(ctx)  │ fn(ctx) │ fn(ctx, ev)  │ fn(ctx)  │  │
//! │  │ Calibration │ fn(ctx)  │ fn(ctx) │ fn(ctx, ev)  │    -     │  │
//! │  │ Autotune    │ fn(ctx)  │ fn(ctx) │ fn(ctx, ev)  │ fn(ctx)  │  │
//! │  │ Manual      │ fn(ctx)  │    -    │ fn(ctx, ev)  │    -     │  │
//! │  └─────────────┴──────────┴─────────┴──────────────┴──────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The input task calls [`ModeMachine::handle_input`] for every debounced
//! gesture and [`ModeMachine::tick`] once per period, both while holding
//! the system lock.  The current mode lives in the shared state so the
//! emergency handler can force Standby without going through the table.
//! Handlers never block: tones and storage writes are returned in the
//! [`ModeOutcome`] for the caller to perform after releasing the lock.

pub mod context;
pub mod states;

use context::{ModeContext, ModeOutcome};
use log::info;

use crate::app::ports::InputEvent;
use crate::channel::Channel;
use crate::config::SystemConfig;
use crate::state::SystemState;

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// Must stay in sync with the table built in [`states::build_mode_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SystemMode {
    Standby = 0,
    Working = 1,
    Setting = 2,
    Calibration = 3,
    Autotune = 4,
    Manual = 5,
}

impl SystemMode {
    pub const COUNT: usize = 6;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Standby,
        Self::Working,
        Self::Setting,
        Self::Calibration,
        Self::Autotune,
        Self::Manual,
    ];

    /// Convert an index back to a mode.  Out-of-range falls back to Standby.
    pub fn from_index(idx: usize) -> Self {
        Self::ALL.get(idx).copied().unwrap_or_else(|| {
            debug_assert!(false, "invalid mode index: {idx}");
            Self::Standby
        })
    }

    /// Idle status text shown while in this mode.
    pub fn status_message(self) -> &'static str {
        match self {
            Self::Standby => "***standby mode***",
            Self::Working => "***working mode***",
            Self::Setting => "***SETTING MODE***",
            Self::Calibration => "***CALIBRATION MODE***",
            Self::Autotune => "***AUTOTUNE MODE***",
            Self::Manual => "***MANUAL MODE***",
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// `on_enter` / `on_exit` action.  Runs once per transition.
pub type ModeActionFn<C, const N: usize> = fn(&mut ModeContext<'_, C, N>);

/// Gesture handler.  Returns `Some(next)` to transition.
pub type ModeInputFn<C, const N: usize> =
    fn(&mut ModeContext<'_, C, N>, InputEvent) -> Option<SystemMode>;

/// Per-period handler for timeouts.  Returns `Some(next)` to transition.
pub type ModeTickFn<C, const N: usize> = fn(&mut ModeContext<'_, C, N>) -> Option<SystemMode>;

/// One row of the mode table.
pub struct ModeDescriptor<C, const N: usize> {
    pub id: SystemMode,
    pub name: &'static str,
    pub on_enter: Option<ModeActionFn<C, N>>,
    pub on_exit: Option<ModeActionFn<C, N>>,
    pub on_input: ModeInputFn<C, N>,
    pub on_tick: Option<ModeTickFn<C, N>>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct ModeMachine<C, const N: usize> {
    table: [ModeDescriptor<C, N>; SystemMode::COUNT],
    config: SystemConfig,
    /// Time of the last gesture on any channel.
    last_input_ms: u32,
    /// Time of the last Standby setpoint refresh.
    last_refresh_ms: u32,
}

impl<C: Channel, const N: usize> ModeMachine<C, N> {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            table: states::build_mode_table(),
            config,
            last_input_ms: 0,
            last_refresh_ms: 0,
        }
    }

    /// Interpret one gesture from `channel`.  `combo_held` reports whether
    /// the combination partner (channel C) is currently held.
    pub fn handle_input(
        &mut self,
        state: &mut SystemState<C, N>,
        channel: usize,
        event: InputEvent,
        combo_held: bool,
        now_ms: u32,
    ) -> ModeOutcome {
        let mut ctx = self.context(state, channel, combo_held, now_ms);
        let current = ctx.state.mode;
        let acted = match (self.table[current as usize].on_input)(&mut ctx, event) {
            Some(next) => {
                Self::transition(&self.table, &mut ctx, next);
                true
            }
            None => ctx.handled,
        };
        let (last_refresh_ms, outcome) = ctx.into_parts();
        self.last_refresh_ms = last_refresh_ms;
        // Ignored gestures do not hold off the idle timeouts.
        if acted {
            self.last_input_ms = now_ms;
        }
        outcome
    }

    /// Evaluate timeouts for the current mode.
    pub fn tick(&mut self, state: &mut SystemState<C, N>, now_ms: u32) -> ModeOutcome {
        let mut ctx = self.context(state, 0, false, now_ms);
        let current = ctx.state.mode;
        if let Some(on_tick) = self.table[current as usize].on_tick {
            if let Some(next) = on_tick(&mut ctx) {
                Self::transition(&self.table, &mut ctx, next);
            }
        }
        let (last_refresh_ms, outcome) = ctx.into_parts();
        self.last_refresh_ms = last_refresh_ms;
        outcome
    }

    /// Jump straight to `next`, running exit/enter actions.
    pub fn force_transition(
        &mut self,
        state: &mut SystemState<C, N>,
        next: SystemMode,
        now_ms: u32,
    ) -> ModeOutcome {
        let mut ctx = self.context(state, 0, false, now_ms);
        Self::transition(&self.table, &mut ctx, next);
        let (last_refresh_ms, outcome) = ctx.into_parts();
        self.last_refresh_ms = last_refresh_ms;
        outcome
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn last_input_ms(&self) -> u32 {
        self.last_input_ms
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn context<'a>(
        &'a self,
        state: &'a mut SystemState<C, N>,
        channel: usize,
        combo_held: bool,
        now_ms: u32,
    ) -> ModeContext<'a, C, N> {
        ModeContext::new(
            state,
            &self.config,
            channel,
            combo_held,
            now_ms,
            self.last_input_ms,
            self.last_refresh_ms,
        )
    }

    fn transition(
        table: &[ModeDescriptor<C, N>; SystemMode::COUNT],
        ctx: &mut ModeContext<'_, C, N>,
        next: SystemMode,
    ) {
        let current = ctx.state.mode;
        if next == current {
            return;
        }
        info!(
            "MODE | {} -> {}",
            table[current as usize].name, table[next as usize].name
        );
        if let Some(exit) = table[current as usize].on_exit {
            exit(ctx);
        }
        ctx.state.mode = next;
        if let Some(enter) = table[next as usize].on_enter {
            enter(ctx);
        }
    }
}
