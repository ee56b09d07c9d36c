//! Slide animator (C11): window moves/resizes built on top of C10, per
//! spec.md §4.C11.
//!
//! `Opaque` mode calls `configure_window` every tick. The outline mode
//! spec.md describes (XOR-GC rectangle on the root, drawn once on the
//! first and last frame) needs a drawing primitive this crate's `XConn`
//! doesn't carry — rendering is out of scope (SPEC_FULL.md §1) — so it is
//! expressed here as an `OutlineSink` callback the embedder supplies,
//! following the same hook pattern [`crate::config::Hooks`] uses for
//! other out-of-scope collaborators.

use std::rc::Rc;

use bitflags::bitflags;

use crate::anim::{AnimFn, AnimationEngine, AnimatorId, DoneFn};
use crate::geometry::Rect;
use crate::win::{WinId, Xid};
use crate::xconn::XConn;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SlideFlags: u32 {
        /// Restore focus/warp the pointer at animation end if the moved
        /// window was focused at the start and the pointer now lies
        /// outside the new geometry.
        const WARP = 1 << 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideMode {
    Opaque,
    Outline,
}

/// Receives the interpolated outline rectangle in [`SlideMode::Outline`].
pub trait OutlineSink {
    fn draw(&mut self, rect: Rect);
    fn clear(&mut self);
}

/// Start a slide from `from` to `to` over `duration_ms`, as a per-window
/// animator on `engine`. Returns the animator id so callers can `cancel`
/// an in-flight slide (e.g. the window was destroyed mid-animation).
#[allow(clippy::too_many_arguments)]
pub fn start(
    engine: &mut AnimationEngine,
    win: WinId,
    xid: Xid,
    conn: Rc<dyn XConn>,
    from: Rect,
    to: Rect,
    duration_ms: i32,
    mode: SlideMode,
    flags: SlideFlags,
    focused_at_start: bool,
    outline: Option<Box<dyn OutlineSink>>,
) -> AnimatorId {
    let mut frame_seen = 0u32;
    let conn_for_done = conn.clone();

    let func: AnimFn = Box::new(move |remaining: i32| -> i32 {
        let progress = 1024 - remaining.clamp(0, 1024);
        let rect = lerp_rect(from, to, progress as u32);

        match mode {
            SlideMode::Opaque => {
                let _ = conn.configure_window(xid, rect);
            }
            SlideMode::Outline => {
                if frame_seen == 0 || remaining <= 0 {
                    if let Some(sink) = outline.as_mut() {
                        sink.draw(rect);
                    }
                }
            }
        }
        frame_seen += 1;
        // always run again next frame; the engine auto-cancels once
        // `remaining` reaches 0 for a time-limited animator.
        0
    });

    let done: DoneFn = Box::new(move || {
        if !flags.contains(SlideFlags::WARP) || !focused_at_start {
            return;
        }
        let Ok(pointer) = conn_for_done.query_pointer(xid) else { return };
        if to.contains(pointer) {
            return;
        }
        let _ = conn_for_done.set_input_focus(xid);
        let mid = to.midpoint();
        let _ = conn_for_done.warp_pointer(mid.x, mid.y);
    });

    engine.add_for_window(win, 0, duration_ms, false, func, Some(done))
}

/// Linearly interpolate `from` toward `to` at `progress` (0..=1024).
fn lerp_rect(from: Rect, to: Rect, progress: u32) -> Rect {
    let p = progress.min(1024) as i64;
    let lerp_signed = |a: i32, b: i32| -> i32 {
        (a as i64 + ((b as i64 - a as i64) * p) / 1024) as i32
    };
    let lerp_unsigned = |a: u32, b: u32| -> u32 {
        (a as i64 + ((b as i64 - a as i64) * p) / 1024) as u32
    };
    Rect {
        x: lerp_signed(from.x, to.x),
        y: lerp_signed(from.y, to.y),
        w: lerp_unsigned(from.w, to.w),
        h: lerp_unsigned(from.h, to.h),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: i32, y: i32, w: u32, h: u32) -> Rect {
        Rect { x, y, w, h }
    }

    #[test]
    fn lerp_rect_endpoints_match_from_and_to() {
        let from = rect(0, 0, 100, 100);
        let to = rect(200, 100, 50, 50);
        assert_eq!(lerp_rect(from, to, 0), from);
        assert_eq!(lerp_rect(from, to, 1024), to);
    }

    #[test]
    fn lerp_rect_midpoint_is_halfway() {
        let from = rect(0, 0, 100, 100);
        let to = rect(200, 0, 100, 100);
        let mid = lerp_rect(from, to, 512);
        assert_eq!(mid.x, 100);
    }
}
