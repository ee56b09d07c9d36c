//! `_MOTIF_WM_HINTS` / `_MOTIF_WM_INFO` (C12, MWM properties).
//!
//! Bit layout and the read-4-minimum rule are ground truth from
//! `examples/original_source/src/mwm.c` (`MWM_GetHints`/`MWM_SetInfo`).

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::win::Xid;
use crate::xconn::{PropMode, PropValue, XConn};

use super::atom::{Atom, AtomTable};

bitflags! {
    /// Which fields of [`MwmHints`] are actually meaningful, per the
    /// `MWM_HINTS_*` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MwmFlags: u32 {
        const FUNCTIONS   = 1 << 0;
        const DECORATIONS = 1 << 1;
        const INPUT_MODE  = 1 << 2;
        const STATUS      = 1 << 3;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MwmFunctions: u32 {
        const ALL      = 1 << 0;
        const RESIZE   = 1 << 1;
        const MOVE     = 1 << 2;
        const MINIMIZE = 1 << 3;
        const MAXIMIZE = 1 << 4;
        const CLOSE    = 1 << 5;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MwmDecorations: u32 {
        const ALL       = 1 << 0;
        const BORDER    = 1 << 1;
        const RESIZEH   = 1 << 2;
        const TITLE     = 1 << 3;
        const MENU      = 1 << 4;
        const MINIMIZE  = 1 << 5;
        const MAXIMIZE  = 1 << 6;
    }
}

/// The decoded `_MOTIF_WM_HINTS` property (5 × CARD32, minimum 4 read).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MwmHints {
    pub flags: MwmFlags,
    pub functions: MwmFunctions,
    pub decorations: MwmDecorations,
    pub input_mode: u32,
    pub status: u32,
}

impl MwmHints {
    /// Decode from the raw CARDINAL array, requiring at least the 4
    /// mandatory elements (`functions`/`decorations`/`input_mode` are
    /// read even without `status`, matching
    /// `PROP_MWM_HINTS_ELEMENTS_MIN`).
    pub fn from_raw(raw: &[u32]) -> Result<Self> {
        if raw.len() < 4 {
            return Err(Error::InvalidHints(format!(
                "_MOTIF_WM_HINTS requires at least 4 elements, got {}",
                raw.len()
            )));
        }
        Ok(Self {
            flags: MwmFlags::from_bits_truncate(raw[0]),
            functions: MwmFunctions::from_bits_truncate(raw[1]),
            decorations: MwmDecorations::from_bits_truncate(raw[2]),
            input_mode: raw[3],
            status: raw.get(4).copied().unwrap_or(0),
        })
    }

    fn to_raw(self) -> [u32; 5] {
        [
            self.flags.bits(),
            self.functions.bits(),
            self.decorations.bits(),
            self.input_mode,
            self.status,
        ]
    }
}

/// Read `_MOTIF_WM_HINTS` from a client window, if set.
pub fn get_hints(conn: &impl XConn, atoms: &AtomTable, win: Xid) -> Result<Option<MwmHints>> {
    let atom = atoms.id(Atom::MotifWmHints);
    match conn.get_property(win, atom)? {
        Some(PropValue::Cardinal(raw)) => Ok(Some(MwmHints::from_raw(&raw)?)),
        Some(_) | None => Ok(None),
    }
}

/// Write `_MOTIF_WM_HINTS` on a client window.
pub fn set_hints(conn: &impl XConn, atoms: &AtomTable, win: Xid, hints: MwmHints) -> Result<()> {
    let atom = atoms.id(Atom::MotifWmHints);
    conn.change_property(
        win,
        atom,
        &PropValue::Cardinal(hints.to_raw().to_vec()),
        PropMode::Replace,
    )
}

/// Set `_MOTIF_WM_INFO` on the root window: a 2×CARD32 `{flags=2,
/// window}` pair some legacy clients query to locate the window manager,
/// produced by the same startup path as the rest of C12's atoms
/// (`MWM_SetInfo`).
pub fn set_info(conn: &impl XConn, atoms: &AtomTable, root: Xid) -> Result<()> {
    let atom = atoms.id(Atom::MotifWmInfo);
    conn.change_property(
        root,
        atom,
        &PropValue::Cardinal(vec![2, root]),
        PropMode::Replace,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_fewer_than_four_elements() {
        assert!(MwmHints::from_raw(&[1, 2, 3]).is_err());
    }

    #[test]
    fn decodes_minimum_four_elements_with_default_status() {
        let h = MwmHints::from_raw(&[
            MwmFlags::DECORATIONS.bits(),
            0,
            MwmDecorations::BORDER.bits(),
            0,
        ])
        .unwrap();
        assert_eq!(h.status, 0);
        assert!(h.flags.contains(MwmFlags::DECORATIONS));
        assert!(h.decorations.contains(MwmDecorations::BORDER));
    }
}
