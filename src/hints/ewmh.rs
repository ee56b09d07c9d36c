//! EWMH properties (C12): `_NET_*` root and client properties, per the
//! EWMH 1.4 spec as named in spec.md §6.

use crate::error::Result;
use crate::win::Xid;
use crate::xconn::{PropMode, PropValue, XConn};

use super::atom::{Atom, AtomTable};
use super::{get_atom_list, get_card32, get_utf8, set_atom_list, set_card32, set_utf8,
            set_window_list, ListOp};

/// Announce the subset of `_NET_*` atoms this implementation honours on
/// `_NET_SUPPORTED`, and the usual accompanying root properties
/// (`_NET_SUPPORTING_WM_CHECK` pointed at a dedicated check window, per
/// the EWMH convention every compliant WM follows at startup).
pub fn announce_supported(
    conn: &impl XConn,
    atoms: &AtomTable,
    root: Xid,
    check_win: Xid,
    supported: &[Atom],
) -> Result<()> {
    let ids: Vec<u32> = supported.iter().map(|a| atoms.id(*a)).collect();
    set_atom_list(conn, root, atoms.id(Atom::NetSupported), &ids)?;
    set_window_list(
        conn,
        root,
        atoms.id(Atom::NetSupportingWmCheck),
        &[check_win],
    )?;
    set_window_list(
        conn,
        check_win,
        atoms.id(Atom::NetSupportingWmCheck),
        &[check_win],
    )?;
    Ok(())
}

/// `_NET_CLIENT_LIST` (mapping order) / `_NET_CLIENT_LIST_STACKING`
/// (bottom-to-top stacking order).
pub fn set_client_list(conn: &impl XConn, atoms: &AtomTable, root: Xid, clients: &[Xid]) -> Result<()> {
    set_window_list(conn, root, atoms.id(Atom::NetClientList), clients)
}

pub fn set_client_list_stacking(
    conn: &impl XConn,
    atoms: &AtomTable,
    root: Xid,
    clients: &[Xid],
) -> Result<()> {
    set_window_list(conn, root, atoms.id(Atom::NetClientListStacking), clients)
}

/// `_NET_ACTIVE_WINDOW`.
pub fn set_active_window(conn: &impl XConn, atoms: &AtomTable, root: Xid, win: Option<Xid>) -> Result<()> {
    let list = win.into_iter().collect::<Vec<_>>();
    set_window_list(conn, root, atoms.id(Atom::NetActiveWindow), &list)
}

/// `_NET_WM_NAME`/`_NET_WM_ICON_NAME`: `UTF8_STRING` format.
pub fn get_net_wm_name(conn: &impl XConn, atoms: &AtomTable, win: Xid) -> Result<Option<String>> {
    Ok(get_utf8(conn, win, atoms.id(Atom::NetWmName))?.map(|v| v.join("\0")))
}

pub fn set_net_wm_name(conn: &impl XConn, atoms: &AtomTable, win: Xid, name: &str) -> Result<()> {
    set_utf8(conn, win, atoms.id(Atom::NetWmName), &[name.to_string()])
}

/// `_NET_WM_STATE`: an `ATOM` list. Full get/set plus the
/// add/remove/toggle primitive spec.md describes as `list_change`.
pub fn get_wm_state(conn: &impl XConn, atoms: &AtomTable, win: Xid) -> Result<Vec<u32>> {
    Ok(get_atom_list(conn, win, atoms.id(Atom::NetWmState))?.unwrap_or_default())
}

pub fn set_wm_state(conn: &impl XConn, atoms: &AtomTable, win: Xid, states: &[u32]) -> Result<()> {
    set_atom_list(conn, win, atoms.id(Atom::NetWmState), states)
}

/// `_NET_WM_STATE` add/remove/toggle of a single state atom (e.g.
/// `_NET_WM_STATE_FULLSCREEN`), implemented as a read-modify-write over
/// the full list per spec.md's `list_change` primitive (**R4**:
/// idempotent under repeated `Add`).
pub fn change_wm_state(
    conn: &impl XConn,
    atoms: &AtomTable,
    win: Xid,
    state: u32,
    op: ListOp,
) -> Result<()> {
    let mut current = get_wm_state(conn, atoms, win)?;
    match op {
        ListOp::Add => {
            if !current.contains(&state) {
                current.push(state);
            }
        }
        ListOp::Remove => current.retain(|s| *s != state),
        ListOp::Toggle => {
            if current.contains(&state) {
                current.retain(|s| *s != state);
            } else {
                current.push(state);
            }
        }
    }
    set_wm_state(conn, atoms, win, &current)
}

/// `_NET_WM_DESKTOP`: a single `CARD32`.
pub fn get_wm_desktop(conn: &impl XConn, atoms: &AtomTable, win: Xid) -> Result<Option<u32>> {
    Ok(get_card32(conn, win, atoms.id(Atom::NetWmDesktop))?.and_then(|v| v.first().copied()))
}

pub fn set_wm_desktop(conn: &impl XConn, atoms: &AtomTable, win: Xid, desktop: u32) -> Result<()> {
    set_card32(conn, win, atoms.id(Atom::NetWmDesktop), &[desktop])
}

/// `_NET_WM_WINDOW_OPACITY`: a single `CARD32` in `[0, 0xFFFFFFFF]`.
/// Absent means fully opaque per EWMH convention — callers must not
/// default a missing value to `0` (fully transparent).
pub fn get_wm_window_opacity(conn: &impl XConn, atoms: &AtomTable, win: Xid) -> Result<Option<u32>> {
    Ok(get_card32(conn, win, atoms.id(Atom::NetWmWindowOpacity))?.and_then(|v| v.first().copied()))
}

pub fn set_wm_window_opacity(conn: &impl XConn, atoms: &AtomTable, win: Xid, opacity: u32) -> Result<()> {
    set_card32(conn, win, atoms.id(Atom::NetWmWindowOpacity), &[opacity])
}

/// `_NET_WM_STRUT` / `_NET_WM_STRUT_PARTIAL`: left/right/top/bottom
/// reservations in pixels, used by [`crate::screen::available_area_at`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Strut {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

pub fn get_strut(conn: &impl XConn, atoms: &AtomTable, win: Xid) -> Result<Option<Strut>> {
    if let Some(v) = get_card32(conn, win, atoms.id(Atom::NetWmStrutPartial))? {
        if v.len() >= 4 {
            return Ok(Some(Strut {
                left: v[0],
                right: v[1],
                top: v[2],
                bottom: v[3],
            }));
        }
    }
    if let Some(v) = get_card32(conn, win, atoms.id(Atom::NetWmStrut))? {
        if v.len() >= 4 {
            return Ok(Some(Strut {
                left: v[0],
                right: v[1],
                top: v[2],
                bottom: v[3],
            }));
        }
    }
    Ok(None)
}

/// Root desktop-count/current-desktop/name bookkeeping. Kept minimal:
/// this crate does not own desktop/workspace semantics (out of scope,
/// §1), only the wire-level property plumbing EWMH-aware clients expect
/// to find set.
pub fn set_number_of_desktops(conn: &impl XConn, atoms: &AtomTable, root: Xid, n: u32) -> Result<()> {
    set_card32(conn, root, atoms.id(Atom::NetNumberOfDesktops), &[n])
}

pub fn set_current_desktop(conn: &impl XConn, atoms: &AtomTable, root: Xid, desktop: u32) -> Result<()> {
    set_card32(conn, root, atoms.id(Atom::NetCurrentDesktop), &[desktop])
}

pub fn set_desktop_names(conn: &impl XConn, atoms: &AtomTable, root: Xid, names: &[String]) -> Result<()> {
    set_utf8(conn, root, atoms.id(Atom::NetDesktopNames), names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xconn::mock::MockXConn;
    use std::cell::RefCell;

    #[derive(Default)]
    struct StubConn {
        props: RefCell<std::collections::HashMap<(Xid, u32), PropValue>>,
    }

    impl MockXConn for StubConn {
        fn mock_get_property(&self, win: Xid, atom: u32) -> crate::error::Result<Option<PropValue>> {
            Ok(self.props.borrow().get(&(win, atom)).cloned())
        }
        fn mock_change_property(
            &self,
            win: Xid,
            atom: u32,
            value: &PropValue,
            _mode: PropMode,
        ) -> crate::error::Result<()> {
            self.props.borrow_mut().insert((win, atom), value.clone());
            Ok(())
        }
        fn mock_intern_atom(&self, name: &str) -> crate::error::Result<u32> {
            // deterministic stand-in id derived from the name's bytes so
            // tests can intern the whole Atom table without a live server
            Ok(name.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32)))
        }
    }

    #[test]
    fn change_wm_state_add_is_idempotent() {
        let conn = StubConn::default();
        let atoms = AtomTable::intern_all(&conn).unwrap();
        let fullscreen = atoms.id(Atom::NetWmStateFullscreen);
        change_wm_state(&conn, &atoms, 1, fullscreen, ListOp::Add).unwrap();
        change_wm_state(&conn, &atoms, 1, fullscreen, ListOp::Add).unwrap();
        assert_eq!(get_wm_state(&conn, &atoms, 1), Ok(vec![fullscreen]));
    }

    #[test]
    fn change_wm_state_toggle_round_trips() {
        let conn = StubConn::default();
        let atoms = AtomTable::intern_all(&conn).unwrap();
        let sticky = atoms.id(Atom::NetWmStateSticky);
        change_wm_state(&conn, &atoms, 1, sticky, ListOp::Toggle).unwrap();
        assert_eq!(get_wm_state(&conn, &atoms, 1), Ok(vec![sticky]));
        change_wm_state(&conn, &atoms, 1, sticky, ListOp::Toggle).unwrap();
        assert_eq!(get_wm_state(&conn, &atoms, 1), Ok(vec![]));
    }

    #[test]
    fn opacity_absent_is_none_not_zero() {
        let conn = StubConn::default();
        let atoms = AtomTable::intern_all(&conn).unwrap();
        assert_eq!(get_wm_window_opacity(&conn, &atoms, 1).unwrap(), None);
    }
}
