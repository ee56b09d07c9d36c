//! The embedder-facing root context: [`Config`] and [`Hooks`].
//!
//! Mirrors the teacher's `Config`/`Hook` split (`core/config.rs`,
//! `core/hooks.rs`): a plain data struct for the handful of tunables this
//! core itself needs, plus a trait of no-op-by-default trigger points an
//! embedding application overrides to plug in the out-of-scope collaborators
//! spec.md §1 names (background composition, decoration policy, IPC) without
//! this crate knowing those modules exist.

use crate::event::XEvent;
use crate::group::GroupId;
use crate::screen::ScreenLayout;
use crate::systray::SystrayObject;
use crate::win::WinId;

/// Tunables for the core itself. Everything an embedder would otherwise
/// reach for a config file to set, short of the file parsing itself, which
/// stays out of scope (spec.md, Non-goals).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Target animation frame rate in Hz, used to derive the event pump's
    /// `select()` timeout (spec.md §4.C8 step 7) when an animation or timer
    /// is pending.
    pub frame_rate_hz: u32,
    /// Override the `$DISPLAY` environment variable when opening the
    /// connection. `None` uses the default resolution the backend provides.
    pub display_name: Option<String>,
    /// Restrict management to a single screen number rather than every
    /// screen the display advertises. `None` manages all of them.
    pub screen_override: Option<usize>,
    /// Maximum animation frames the engine will silently skip to catch up
    /// after a scheduling stall before it logs a warning (Supplemented
    /// Features: frame-skip accounting).
    pub max_frame_skip: u32,
    /// Maximum rectangle count a single shape region may carry before the
    /// shape engine treats it as a malformed/hostile client event and
    /// truncates it (spec.md §9, Open Question: shape-rectangle sanity
    /// threshold — resolved in `DESIGN.md`).
    pub max_shape_rects: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_rate_hz: 60,
            display_name: None,
            screen_override: None,
            max_frame_skip: 8,
            max_shape_rects: 4096,
        }
    }
}

impl Config {
    /// Builder-style setter, following the teacher's `Config` field-setter
    /// convention (`core/config.rs`).
    pub fn frame_rate_hz(&mut self, val: u32) -> &mut Self {
        self.frame_rate_hz = val;
        self
    }

    /// Builder-style setter for [`Self::display_name`].
    pub fn display_name(&mut self, val: impl Into<String>) -> &mut Self {
        self.display_name = Some(val.into());
        self
    }

    /// Builder-style setter for [`Self::screen_override`].
    pub fn screen_override(&mut self, val: usize) -> &mut Self {
        self.screen_override = Some(val);
        self
    }

    /// Builder-style setter for [`Self::max_frame_skip`].
    pub fn max_frame_skip(&mut self, val: u32) -> &mut Self {
        self.max_frame_skip = val;
        self
    }

    /// Builder-style setter for [`Self::max_shape_rects`].
    pub fn max_shape_rects(&mut self, val: usize) -> &mut Self {
        self.max_shape_rects = val;
        self
    }
}

/// Utility type for defining hooks, following the teacher's
/// `pub type Hooks<X> = Vec<Box<dyn Hook<X>>>` alias (`core/hooks.rs`).
pub type Hooks = Vec<Box<dyn Hook>>;

/// User-defined functionality triggered at the points where this core hands
/// off to an out-of-scope collaborator.
///
/// Every method has a no-op default, the same contract as the teacher's
/// `Hook` trait (`core/hooks.rs`): an embedder only overrides the trigger
/// points it actually cares about. All registered hooks run, in
/// registration order, at each trigger; none of them may block the core
/// past their own return.
#[allow(unused_variables)]
pub trait Hook {
    /// Called once, after the connection is open, extensions are probed,
    /// and the root window's hints are written, but before the event pump
    /// starts (teacher's `Hook::startup`, called from
    /// `grab_keys_and_run`).
    fn startup(&mut self) {}

    /// Called after a window is newly registered with the [`WinRegistry`][
    /// crate::win::WinRegistry], before any shape/decoration policy has run
    /// — the natural point for an embedder's decoration layer to wrap it.
    fn window_created(&mut self, id: WinId) {}

    /// Called after a window record has been removed from the registry.
    /// The window no longer resolves; only the id remains as a key into
    /// whatever external state the hook itself tracks.
    fn window_destroyed(&mut self, id: WinId) {}

    /// Called whenever a window's computed bounding shape changes, so a
    /// compositor hook can re-derive its clip region without re-deriving
    /// the shape math itself (C6 owns that; this is just notification).
    fn shape_changed(&mut self, id: WinId) {}

    /// Called after [`crate::selection::Selection::notify_lost`] processes
    /// a `SelectionClear`, so an embedder tracking a manager-style
    /// selection (e.g. a replaced status bar) can react.
    fn selection_lost(&mut self, selection_atom: u32) {}

    /// Called after the screen layout is recomputed in response to a
    /// `RandrNotify` (teacher's `Hook::randr_notify` / `screens_updated`
    /// split, folded into one trigger here since this crate has no
    /// workspace ring to re-tile).
    fn screens_updated(&mut self, layout: &ScreenLayout) {}

    /// Called after a window is added to or removed from a [`GroupId`]
    /// (C15), with `present` indicating which.
    fn group_membership_changed(&mut self, group: GroupId, window: WinId, present: bool) {}

    /// Called after a systray icon embeds or un-embeds, mirroring the
    /// teacher's targeted per-feature hooks rather than a generic
    /// "something changed" callback.
    fn systray_icon_changed(&mut self, icon: &SystrayObject, present: bool) {}

    /// Called at the bottom of the event pump's dispatch step, after every
    /// other callback for the current batch has run (teacher's
    /// `Hook::event_handled`, called once per `XEvent` there; called once
    /// per compressed batch here since compression can merge several wire
    /// events into one).
    fn event_handled(&mut self, ev: &XEvent) {}
}
