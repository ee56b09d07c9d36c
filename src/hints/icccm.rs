//! ICCCM properties (C12): `WM_STATE`, `WM_PROTOCOLS`, `WM_NAME`,
//! `WM_ICON_NAME`, `WM_CLASS`.
//!
//! Wire shapes are bit-exact per spec.md §6: `WM_STATE` is `CARD32×2` of
//! `{state, 0}` with `state` one of Withdrawn(0)/Normal(1)/Iconic(3).

use crate::error::{Error, Result};
use crate::win::Xid;
use crate::xconn::{PropMode, PropValue, XConn};

use super::atom::{Atom, AtomTable};

/// The ICCCM `WM_STATE` values a top-level client can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WmState {
    Withdrawn = 0,
    Normal = 1,
    Iconic = 3,
}

impl WmState {
    fn from_raw(v: u32) -> Result<Self> {
        match v {
            0 => Ok(WmState::Withdrawn),
            1 => Ok(WmState::Normal),
            3 => Ok(WmState::Iconic),
            other => Err(Error::InvalidHints(format!(
                "WM_STATE value must be 0, 1 or 3, got {other}"
            ))),
        }
    }
}

/// Read `WM_STATE`.
pub fn get_wm_state(conn: &impl XConn, atoms: &AtomTable, win: Xid) -> Result<Option<WmState>> {
    let atom = atoms.id(Atom::WmState);
    match conn.get_property(win, atom)? {
        Some(PropValue::Cardinal(raw)) if !raw.is_empty() => Ok(Some(WmState::from_raw(raw[0])?)),
        _ => Ok(None),
    }
}

/// Write `WM_STATE` as `{state, 0}`.
pub fn set_wm_state(conn: &impl XConn, atoms: &AtomTable, win: Xid, state: WmState) -> Result<()> {
    let atom = atoms.id(Atom::WmState);
    conn.change_property(
        win,
        atom,
        &PropValue::Cardinal(vec![state as u32, 0]),
        PropMode::Replace,
    )
}

/// Read `WM_PROTOCOLS` as a list of interned atom ids.
pub fn get_protocols(conn: &impl XConn, atoms: &AtomTable, win: Xid) -> Result<Vec<u32>> {
    let atom = atoms.id(Atom::WmProtocols);
    match conn.get_property(win, atom)? {
        Some(PropValue::Atom(ids)) => Ok(ids),
        _ => Ok(Vec::new()),
    }
}

/// Whether a client advertises a given protocol atom (e.g.
/// `WM_DELETE_WINDOW`) in `WM_PROTOCOLS`.
pub fn supports_protocol(
    conn: &impl XConn,
    atoms: &AtomTable,
    win: Xid,
    protocol: Atom,
) -> Result<bool> {
    let wanted = atoms.id(protocol);
    Ok(get_protocols(conn, atoms, win)?.contains(&wanted))
}

/// `WM_NAME`: legacy `STRING` format (Latin-1, decoded lossily as UTF-8
/// like most modern WMs do rather than rejecting non-ASCII bytes).
pub fn get_wm_name(conn: &impl XConn, atoms: &AtomTable, win: Xid) -> Result<Option<String>> {
    get_string_prop(conn, win, atoms.id(Atom::WmName))
}

/// `WM_ICON_NAME`.
pub fn get_wm_icon_name(conn: &impl XConn, atoms: &AtomTable, win: Xid) -> Result<Option<String>> {
    get_string_prop(conn, win, atoms.id(Atom::WmIconName))
}

/// Read a `STRING`- or `UTF8_STRING`-typed property as a single joined
/// string (properties like `WM_NAME` are logically one string even
/// though the wire format allows embedded NULs for multi-part legacy
/// values).
pub fn get_string_prop(conn: &impl XConn, win: Xid, atom: u32) -> Result<Option<String>> {
    match conn.get_property(win, atom)? {
        Some(PropValue::Utf8(parts)) | Some(PropValue::Str(parts)) => {
            Ok(Some(parts.join("\0")))
        }
        _ => Ok(None),
    }
}

/// Write a `STRING`-typed property (legacy `WM_NAME`/`WM_ICON_NAME`).
pub fn set_string_prop(conn: &impl XConn, win: Xid, atom: u32, value: &str) -> Result<()> {
    conn.change_property(
        win,
        atom,
        &PropValue::Str(vec![value.to_string()]),
        PropMode::Replace,
    )
}

/// `WM_CLASS`: two NUL-separated strings, `(instance, class)`.
pub fn get_wm_class(conn: &impl XConn, atoms: &AtomTable, win: Xid) -> Result<Option<(String, String)>> {
    let atom = atoms.id(Atom::WmClass);
    match conn.get_property(win, atom)? {
        Some(PropValue::Str(parts)) if parts.len() >= 2 => {
            Ok(Some((parts[0].clone(), parts[1].clone())))
        }
        Some(PropValue::Str(parts)) if parts.len() == 1 => {
            Ok(Some((parts[0].clone(), String::new())))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wm_state_rejects_invalid_values() {
        assert!(WmState::from_raw(2).is_err());
    }

    #[test]
    fn wm_state_accepts_documented_values() {
        assert!(matches!(WmState::from_raw(0), Ok(WmState::Withdrawn)));
        assert!(matches!(WmState::from_raw(1), Ok(WmState::Normal)));
        assert!(matches!(WmState::from_raw(3), Ok(WmState::Iconic)));
    }
}
