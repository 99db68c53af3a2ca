//! Per-mode handlers and the table builder.
//!
//! ```text
//!                 hold(B)                     click
//!   ┌──────────────────────────────┐   ┌────────────────┐
//!   │                              ▼   │                ▼
//!  STANDBY ──click──▶ WORKING ──click──▶ SETTING ──click(same)──▶ WORKING
//!   │  ▲  ▲             │                   │  ▲
//!   │  │  └──hold(any)──┘      idle > 5 s ──┘  └─ rotate (active channel)
//!   │  │
//!   │  └──── hold / click ──── CALIBRATION ◀── hold(C) ── STANDBY
//!   │                              │
//!   └── hold(A) while C held ──▶ AUTOTUNE ── done / hold ──▶ STANDBY
//!
//!  MANUAL is entered only by forced transition; hold leaves it.
//!  Emergency forces STANDBY from anywhere (outside this table).
//! ```

use log::{info, warn};

use super::context::ModeContext;
use super::{ModeDescriptor, SystemMode};
use crate::app::alerts::Alert;
use crate::app::ports::InputEvent;
use crate::channel::Channel;

/// Channel whose hold opens Setting from Standby.
pub const SETTING_CHANNEL: usize = 1;
/// Channel whose hold opens Calibration; also the combination partner.
pub const CALIBRATION_CHANNEL: usize = 2;
/// Channel whose hold, while the partner is held, starts autotune.
pub const AUTOTUNE_CHANNEL: usize = 0;

/// Build the mode table.  Called once when the machine is created.
pub fn build_mode_table<C: Channel, const N: usize>() -> [ModeDescriptor<C, N>; SystemMode::COUNT]
{
    [
        ModeDescriptor {
            id: SystemMode::Standby,
            name: "Standby",
            on_enter: Some(standby_enter::<C, N>),
            on_exit: None,
            on_input: standby_input::<C, N>,
            on_tick: Some(standby_tick::<C, N>),
        },
        ModeDescriptor {
            id: SystemMode::Working,
            name: "Working",
            on_enter: Some(working_enter::<C, N>),
            on_exit: None,
            on_input: working_input::<C, N>,
            on_tick: None,
        },
        ModeDescriptor {
            id: SystemMode::Setting,
            name: "Setting",
            on_enter: Some(setting_enter::<C, N>),
            on_exit: Some(setting_exit::<C, N>),
            on_input: setting_input::<C, N>,
            on_tick: Some(setting_tick::<C, N>),
        },
        ModeDescriptor {
            id: SystemMode::Calibration,
            name: "Calibration",
            on_enter: Some(calibration_enter::<C, N>),
            on_exit: Some(calibration_exit::<C, N>),
            on_input: calibration_input::<C, N>,
            on_tick: None,
        },
        ModeDescriptor {
            id: SystemMode::Autotune,
            name: "Autotune",
            on_enter: Some(autotune_enter::<C, N>),
            on_exit: Some(autotune_exit::<C, N>),
            on_input: autotune_input::<C, N>,
            on_tick: Some(autotune_tick::<C, N>),
        },
        ModeDescriptor {
            id: SystemMode::Manual,
            name: "Manual",
            on_enter: Some(manual_enter::<C, N>),
            on_exit: None,
            on_input: manual_input::<C, N>,
            on_tick: None,
        },
    ]
}

fn is_combo<C, const N: usize>(ctx: &ModeContext<'_, C, N>) -> bool {
    ctx.channel == AUTOTUNE_CHANNEL && ctx.combo_held
}

// ═══════════════════════════════════════════════════════════════════════════
//  STANDBY
// ═══════════════════════════════════════════════════════════════════════════

fn standby_enter<C: Channel, const N: usize>(ctx: &mut ModeContext<'_, C, N>) {
    ctx.state.end_edit();
    ctx.state.autotune_hold = None;
    ctx.state.set_status(SystemMode::Standby.status_message());
}

fn standby_input<C: Channel, const N: usize>(
    ctx: &mut ModeContext<'_, C, N>,
    event: InputEvent,
) -> Option<SystemMode> {
    match event {
        InputEvent::Click => {
            if ctx.state.any_channel_faulted() {
                warn!("STANDBY | sensor fault present, refusing to start");
                ctx.alert(Alert::Error);
                return None;
            }
            ctx.alert(Alert::Confirm);
            Some(SystemMode::Working)
        }
        InputEvent::Hold => match ctx.channel {
            SETTING_CHANNEL => Some(SystemMode::Setting),
            CALIBRATION_CHANNEL => Some(SystemMode::Calibration),
            _ if is_combo(ctx) => Some(SystemMode::Autotune),
            _ => None,
        },
        InputEvent::Turn(_) => {
            let step = ctx.config.setpoint_step_c;
            if let Some(ch) = ctx.state.channels.get_mut(ctx.channel) {
                ch.process_input(event, step);
                ctx.handled = true;
            }
            None
        }
    }
}

/// Once the knobs have been idle for a while, re-apply every setpoint
/// through the clamp and ask for the table to be persisted.
fn standby_tick<C: Channel, const N: usize>(ctx: &mut ModeContext<'_, C, N>) -> Option<SystemMode> {
    let interval = ctx.config.standby_refresh_ms;
    let refresh_due = ctx.now_ms.wrapping_sub(ctx.last_refresh_ms) >= interval;
    if ctx.idle_ms() > interval && refresh_due {
        for ch in ctx.state.channels.iter_mut() {
            let sp = ch.setpoint();
            ch.set_setpoint(sp);
        }
        ctx.persist.setpoints = true;
        ctx.last_refresh_ms = ctx.now_ms;
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  WORKING
// ═══════════════════════════════════════════════════════════════════════════

fn working_enter<C: Channel, const N: usize>(ctx: &mut ModeContext<'_, C, N>) {
    ctx.state.set_status(SystemMode::Working.status_message());
    ctx.state.system_active = true;
    for ch in ctx.state.channels.iter_mut() {
        ch.rearm();
    }
    info!("WORKING | closed-loop control on {} channels", N);
}

fn working_input<C: Channel, const N: usize>(
    ctx: &mut ModeContext<'_, C, N>,
    event: InputEvent,
) -> Option<SystemMode> {
    match event {
        InputEvent::Click if ctx.channel < N => {
            ctx.state.begin_edit(ctx.channel);
            Some(SystemMode::Setting)
        }
        InputEvent::Hold => Some(SystemMode::Standby),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  SETTING
// ═══════════════════════════════════════════════════════════════════════════

fn set_edit_status<C: Channel, const N: usize>(ctx: &mut ModeContext<'_, C, N>) {
    match ctx.state.active_channel {
        Some(ch) => {
            let mut text: heapless::String<24> = heapless::String::new();
            if core::fmt::write(&mut text, format_args!("***SET TEMP SP{}***", ch + 1)).is_err() {
                warn!("SETTING | edit prompt truncated");
            }
            ctx.state.set_status(&text);
        }
        None => ctx.state.set_status(SystemMode::Setting.status_message()),
    }
}

fn setting_enter<C: Channel, const N: usize>(ctx: &mut ModeContext<'_, C, N>) {
    set_edit_status(ctx);
}

fn setting_exit<C: Channel, const N: usize>(ctx: &mut ModeContext<'_, C, N>) {
    ctx.state.end_edit();
}

fn setting_input<C: Channel, const N: usize>(
    ctx: &mut ModeContext<'_, C, N>,
    event: InputEvent,
) -> Option<SystemMode> {
    let active = ctx.state.active_channel;
    match event {
        InputEvent::Click => match active {
            Some(ch) if ch == ctx.channel => {
                info!(
                    "SETTING | SP{} committed at {:.1}",
                    ch + 1,
                    ctx.state.channels[ch].setpoint()
                );
                Some(commit_edit(ctx, Alert::Confirm))
            }
            Some(_) => None,
            None if ctx.channel < N => {
                ctx.state.begin_edit(ctx.channel);
                set_edit_status(ctx);
                ctx.handled = true;
                None
            }
            None => None,
        },
        InputEvent::Turn(_) => {
            if active == Some(ctx.channel) {
                let step = ctx.config.setpoint_step_c;
                ctx.state.channels[ctx.channel].process_input(event, step);
                ctx.handled = true;
            }
            None
        }
        InputEvent::Hold => Some(SystemMode::Standby),
    }
}

/// Persist the edit and resume control, unless a sensor is faulted: then
/// the edit is kept but the machine falls back to Standby with the error
/// tone.
fn commit_edit<C: Channel, const N: usize>(
    ctx: &mut ModeContext<'_, C, N>,
    tone: Alert,
) -> SystemMode {
    ctx.persist.setpoints = true;
    if ctx.state.any_channel_faulted() {
        warn!("SETTING | sensor fault present, not resuming control");
        ctx.alert(Alert::Error);
        return SystemMode::Standby;
    }
    ctx.alert(tone);
    SystemMode::Working
}

/// An edit left idle past the timeout is committed as-is.
fn setting_tick<C: Channel, const N: usize>(ctx: &mut ModeContext<'_, C, N>) -> Option<SystemMode> {
    if ctx.state.setting_active && ctx.idle_ms() > ctx.config.edit_timeout_ms {
        info!("SETTING | edit timed out, committing");
        return Some(commit_edit(ctx, Alert::Error));
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  CALIBRATION
// ═══════════════════════════════════════════════════════════════════════════

fn calibration_enter<C: Channel, const N: usize>(ctx: &mut ModeContext<'_, C, N>) {
    ctx.state.set_status(SystemMode::Calibration.status_message());
}

fn calibration_exit<C: Channel, const N: usize>(ctx: &mut ModeContext<'_, C, N>) {
    ctx.persist.calibration = true;
}

fn calibration_input<C: Channel, const N: usize>(
    ctx: &mut ModeContext<'_, C, N>,
    event: InputEvent,
) -> Option<SystemMode> {
    match event {
        InputEvent::Turn(rotation) => {
            let step = ctx.config.setpoint_step_c;
            if let Some(ch) = ctx.state.channels.get_mut(ctx.channel) {
                let offset = ch.calibration_offset() + rotation.sign() * step;
                ch.set_calibration_offset(offset);
                ctx.handled = true;
            }
            None
        }
        InputEvent::Click => {
            ctx.alert(Alert::Confirm);
            Some(SystemMode::Standby)
        }
        InputEvent::Hold if is_combo(ctx) => Some(SystemMode::Autotune),
        InputEvent::Hold => Some(SystemMode::Standby),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  AUTOTUNE
// ═══════════════════════════════════════════════════════════════════════════

fn autotune_enter<C: Channel, const N: usize>(ctx: &mut ModeContext<'_, C, N>) {
    ctx.state.autotune_complete = false;
    ctx.state.set_status(SystemMode::Autotune.status_message());
    ctx.alert(Alert::Confirm);
}

fn autotune_exit<C: Channel, const N: usize>(ctx: &mut ModeContext<'_, C, N>) {
    ctx.state.autotune_hold = None;
    ctx.state.autotune_complete = false;
}

fn autotune_input<C: Channel, const N: usize>(
    _ctx: &mut ModeContext<'_, C, N>,
    event: InputEvent,
) -> Option<SystemMode> {
    match event {
        InputEvent::Hold => {
            info!("AUTOTUNE | aborted by user");
            Some(SystemMode::Standby)
        }
        _ => None,
    }
}

fn autotune_tick<C: Channel, const N: usize>(ctx: &mut ModeContext<'_, C, N>) -> Option<SystemMode> {
    ctx.state.autotune_complete.then_some(SystemMode::Standby)
}

// ═══════════════════════════════════════════════════════════════════════════
//  MANUAL
// ═══════════════════════════════════════════════════════════════════════════

fn manual_enter<C: Channel, const N: usize>(ctx: &mut ModeContext<'_, C, N>) {
    ctx.state.set_status(SystemMode::Manual.status_message());
}

fn manual_input<C: Channel, const N: usize>(
    _ctx: &mut ModeContext<'_, C, N>,
    event: InputEvent,
) -> Option<SystemMode> {
    matches!(event, InputEvent::Hold).then_some(SystemMode::Standby)
}
