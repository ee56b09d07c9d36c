//! The X connection trait, extension probing, and the server grab-depth
//! counter.
//!
//! `XConn` plays the same role as the teacher's `x::XConn` trait: a small
//! required surface implemented once per backend (here, x11rb behind the
//! `x11rb` feature, and [`mock::MockXConn`] for tests), plus an extension
//! trait (here folded into the required surface rather than split, since
//! this crate has only one backend worth shipping) carrying the
//! higher-level behaviour built in terms of it.

pub mod mock;
#[cfg(feature = "x11rb")]
pub mod x11rb_impl;

use crate::error::Result;
use crate::geometry::Rect;
use crate::win::Xid;

/// The well-known X11 extensions this core probes for at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    /// The Shape extension. Fatal if missing: the shape engine (C6) has
    /// no fallback.
    Shape,
    /// The Sync extension. Optional.
    Sync,
    /// The ScreenSaver extension. Optional.
    ScreenSaver,
    /// RandR. Optional; screen geometry falls back to a manual split
    /// when absent.
    RandR,
    /// XInput2. Optional; the grab manager falls back to the legacy
    /// core-X grab calls when absent.
    XInput2,
}

/// Version, opcode and event/error base recorded for one probed
/// extension, mirroring `EServerExtData` in
/// `examples/original_source/src/events.c`. The error base is not named
/// by the distilled spec's C4 description but is produced by the same
/// `XQueryExtension` call and is required to decode extension-specific
/// errors back to a named extension in the error router.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionInfo {
    pub major_version: u32,
    pub minor_version: u32,
    pub major_opcode: u8,
    pub event_base: u8,
    pub error_base: u8,
}

/// The outcome of probing the server for its extension set at startup.
#[derive(Debug, Default)]
pub struct ExtensionTable {
    known: std::collections::HashMap<Extension, ExtensionInfo>,
}

impl ExtensionTable {
    /// Record that `ext` is present with the given info.
    pub fn record(&mut self, ext: Extension, info: ExtensionInfo) {
        self.known.insert(ext, info);
    }

    /// Whether `ext` was found on this server.
    pub fn has(&self, ext: Extension) -> bool {
        self.known.contains_key(&ext)
    }

    /// The probed info for `ext`, if present.
    pub fn info(&self, ext: Extension) -> Option<ExtensionInfo> {
        self.known.get(&ext).copied()
    }

    /// Resolve a raw server event-type byte back to the extension that
    /// owns it, by matching it against every known `event_base`. Used by
    /// the fetch stage to remap extension events onto the internal
    /// [`crate::event::XEvent`] variants.
    pub fn extension_for_event_type(&self, event_type: u8) -> Option<Extension> {
        self.known
            .iter()
            .find(|(_, info)| event_type >= info.event_base && event_type < info.event_base + 64)
            .map(|(ext, _)| *ext)
    }
}

/// Depth-counted server grab, mirroring the original's rule that only
/// the outermost `XGrabServer` reaches the display and only the
/// outermost `XUngrabServer` releases it (property **P6**).
#[derive(Debug, Default)]
pub struct GrabDepth(u32);

impl GrabDepth {
    /// Increment the depth, returning `true` if this call must issue the
    /// actual server grab (depth went from 0 to 1).
    pub fn grab(&mut self) -> bool {
        self.0 += 1;
        self.0 == 1
    }

    /// Decrement the depth, returning `true` if this call must issue the
    /// actual server ungrab (depth went from 1 to 0). A call at depth 0
    /// is a no-op and returns `false`.
    pub fn ungrab(&mut self) -> bool {
        if self.0 == 0 {
            return false;
        }
        self.0 -= 1;
        self.0 == 0
    }

    /// Current depth.
    pub fn depth(&self) -> u32 {
        self.0
    }
}

/// Window attributes fetched or set through the connection, independent
/// of the registry's own cached copy.
#[derive(Debug, Clone, Copy)]
pub struct WinAttrs {
    pub geometry: Rect,
    pub depth: u8,
    pub border_width: u16,
    pub visual: u32,
}

/// The connection surface every backend must implement. Kept small and
/// synchronous/round-trip-oriented, matching the original's direct Xlib
/// call style and the teacher's `XConn` trait shape.
pub trait XConn {
    /// The root window for the (possibly screen-overridden) display.
    fn root(&self) -> Xid;

    /// Per-head rectangles as last known to the connection (RandR or a
    /// manual split, resolved by [`crate::screen`]).
    fn screen_details(&self) -> Result<Vec<Rect>>;

    /// Fetch a window's geometry from the server.
    fn get_geometry(&self, win: Xid) -> Result<WinAttrs>;

    /// Create a plain `InputOutput` child window.
    fn create_window(&self, parent: Xid, geom: Rect, depth: u8, save_under: bool)
        -> Result<Xid>;

    /// Create an `InputOnly` window (used by grabs and selection owner
    /// windows).
    fn create_input_only_window(&self, parent: Xid, geom: Rect) -> Result<Xid>;

    /// Destroy a window the connection owns.
    fn destroy_window(&self, win: Xid) -> Result<()>;

    /// Map a window.
    fn map_window(&self, win: Xid) -> Result<()>;

    /// Unmap a window.
    fn unmap_window(&self, win: Xid) -> Result<()>;

    /// Reparent a window to a new parent at a given position.
    fn reparent_window(&self, win: Xid, new_parent: Xid, x: i32, y: i32) -> Result<()>;

    /// Move and/or resize a window.
    fn configure_window(&self, win: Xid, geom: Rect) -> Result<()>;

    /// `XGrabServer`/`XUngrabServer`, already depth-counted by the
    /// caller; the backend only ever sees the two edge transitions.
    fn grab_server(&self) -> Result<()>;
    fn ungrab_server(&self) -> Result<()>;

    /// `XFlush`.
    fn flush(&self) -> Result<()>;

    /// `XSync`, suppressed entirely when `mask & no_sync_mask != 0`; test
    /// builds set bits here to exercise race conditions the original
    /// papers over with an unconditional sync.
    fn sync(&self, mask: u32, no_sync_mask: u32) -> Result<()> {
        if mask & no_sync_mask != 0 {
            return Ok(());
        }
        self.sync_unconditionally()
    }

    /// The unconditional `XSync` call backing [`XConn::sync`]'s default.
    fn sync_unconditionally(&self) -> Result<()>;

    /// Intern an atom by name, returning its server-side id.
    fn intern_atom(&self, name: &str) -> Result<u32>;

    /// Look up an interned atom's name.
    fn atom_name(&self, atom: u32) -> Result<String>;

    /// Probe the server's extension set.
    fn query_extensions(&self) -> Result<ExtensionTable>;

    /// Read a property, decoded into whichever [`PropValue`] shape its
    /// wire type maps onto. `None` means the property is not set —
    /// callers must read this as "declined to assert", never as zero
    /// (spec's error design, "absent" vs "zero").
    fn get_property(&self, win: Xid, atom: u32) -> Result<Option<PropValue>>;

    /// Write a property in `mode` (replace, or append/prepend for
    /// `list_change`-style read-modify-write).
    fn change_property(&self, win: Xid, atom: u32, value: &PropValue, mode: PropMode)
        -> Result<()>;

    /// Remove a property entirely.
    fn delete_property(&self, win: Xid, atom: u32) -> Result<()>;

    /// Select which event categories this process wants delivered for
    /// `win` (`XSelectInput`).
    fn select_input(&self, win: Xid, mask: u32) -> Result<()>;

    /// Add `win` to the server's save-set, so a reparented client is
    /// reparented back to the root if this process exits uncleanly
    /// (used by the systray container, C16).
    fn add_to_save_set(&self, win: Xid) -> Result<()>;

    /// Send a 32-bit-format `ClientMessage` to `win`, optionally
    /// propagating to the X server's substructure-redirect machinery
    /// (used for `MANAGER`/`_XEMBED` broadcasts, which target the root or
    /// a specific client directly without needing propagation).
    fn send_client_message(&self, win: Xid, type_atom: u32, data: [u32; 5]) -> Result<()>;

    /// `XSetSelectionOwner`.
    fn set_selection_owner(&self, selection: u32, owner: Xid, time: u32) -> Result<()>;

    /// `XGetSelectionOwner`.
    fn get_selection_owner(&self, selection: u32) -> Result<Xid>;

    /// The server's current time, as a round trip through a zero-length
    /// property append on the root window (the standard ICCCM trick for
    /// obtaining a server timestamp without depending on having just
    /// received an event).
    fn current_server_time(&self) -> Result<u32>;

    /// `XSetInputFocus`, used by the slide animator's restore-focus step.
    fn set_input_focus(&self, win: Xid) -> Result<()>;

    /// `XWarpPointer` to an absolute root-relative position.
    fn warp_pointer(&self, x: i32, y: i32) -> Result<()>;

    /// The pointer's current root-relative position.
    fn query_pointer(&self, win: Xid) -> Result<crate::geometry::Point>;

    /// Create a pixmap matching `drawable`'s root, used by
    /// [`crate::win::WinRegistry::get_or_create_bg`] to lazily allocate an
    /// owned background pixmap sized to a window's current geometry.
    fn create_pixmap(&self, drawable: Xid, w: u32, h: u32, depth: u8) -> Result<Xid>;

    /// `XFreePixmap`.
    fn free_pixmap(&self, pixmap: Xid) -> Result<()>;

    /// Resolve (and cache, process-wide) the screen's 32-bit TrueColor
    /// visual with a non-zero alpha mask, plus a colormap created against
    /// it. Design Notes §9: "the ARGB visual + colormap are memoised on
    /// first request." Returns `Err` if the server has no ARGB-capable
    /// visual, which callers surface rather than silently falling back to
    /// an opaque window.
    fn argb_visual(&self) -> Result<ArgbVisual>;

    /// Create a child window against a specific visual/colormap/depth,
    /// the primitive [`crate::win::WinRegistry::create_argb`] is built on.
    fn create_window_with_visual(
        &self,
        parent: Xid,
        geom: Rect,
        depth: u8,
        visual: u32,
        colormap: u32,
        save_under: bool,
    ) -> Result<Xid>;

    /// Fetch every event already queued (`XPending`/`xcb_poll_for_event`
    /// in a loop), and if none are queued yet, block until one arrives or
    /// `timeout_ms` elapses (`None` blocks forever) — the event pump's
    /// combined fetch-all-pending (§4.C8 step 1) and `select()` (step 7)
    /// in one call, since a non-blocking "is anything queued" check and a
    /// blocking "wait for the first one" check would otherwise race on
    /// whether the peeked event is later re-delivered. Returns an empty
    /// `Vec` on timeout. Events are already decoded into the
    /// backend-agnostic [`crate::event::XEvent`] shape, with extension
    /// events remapped via the probed [`ExtensionTable`].
    fn fetch_events(&self, timeout_ms: Option<u64>) -> Result<Vec<crate::event::XEvent>>;

    /// Query the server's current bounding-shape rectangles for `win`
    /// (`XShapeGetRectangles`), the primitive a `ShapeNotify` handler uses
    /// to refresh [`crate::win::WinRegistry`]'s local record via
    /// [`crate::shape::update`]. An unshaped window reports its own full
    /// geometry as a single rectangle.
    fn query_shape_rects(&self, win: Xid) -> Result<Vec<Rect>>;

    /// Clear `win`'s bounding shape mask (`XShapeCombineMask(..., None,
    /// ShapeSet)`), bringing the server back in sync with an `Unshaped`
    /// local record. The primitive [`crate::shape::ShapeServer`]'s
    /// blanket impl over any `XConn` is built on.
    fn clear_shape(&self, win: Xid) -> Result<()>;

    /// Set `win`'s bounding shape to exactly `rects`
    /// (`XShapeCombineRectangles(..., ShapeSet)`).
    fn set_shape_rects(&self, win: Xid, rects: &[Rect]) -> Result<()>;

    /// Resolve a numeric X keysym (`X11/keysymdef.h`, see the
    /// `ewmcore_keysyms` crate under the `keysyms` feature) to a keycode
    /// on the current keyboard mapping (`XGetKeyboardMapping`), the
    /// primitive [`crate::grab::GrabManager::grab_key_by_keysym`] resolves
    /// a symbolic binding through before handing a keycode to
    /// [`GrabManager::grab_key`](crate::grab::GrabManager::grab_key).
    /// Returns `Err` if no keycode on this mapping produces the keysym.
    fn keycode_for_keysym(&self, keysym: u32) -> Result<u8>;
}

/// A 32-bit TrueColor visual with a non-zero alpha mask, plus a colormap
/// created against it, cached process-wide after the first
/// [`XConn::argb_visual`] call (see [`crate::win::WinRegistry::create_argb`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgbVisual {
    pub visual: u32,
    pub colormap: u32,
    pub depth: u8,
}

/// A property value, already decoded into one of the typed shapes the
/// hints module (C12) builds its CARDINAL/WINDOW/ATOM/UTF-8/STRING
/// accessors over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    /// `CARDINAL` or other 32-bit integer array format.
    Cardinal(Vec<u32>),
    /// `WINDOW` array format.
    Window(Vec<Xid>),
    /// `ATOM` array format.
    Atom(Vec<u32>),
    /// `UTF8_STRING` format, already decoded and split on NUL.
    Utf8(Vec<String>),
    /// Legacy Latin-1 `STRING` format, split on NUL.
    Str(Vec<String>),
    /// Anything else, carried as raw bytes.
    Bytes(Vec<u8>),
}

/// How a [`XConn::change_property`] call combines with an existing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropMode {
    /// Overwrite the property outright.
    Replace,
    /// Append to an existing list-typed property (creating it if absent).
    Append,
    /// Prepend to an existing list-typed property (creating it if absent).
    Prepend,
}
