//! System tray container (C16): a `Selection`-owning host that docks
//! client windows via the XEmbed protocol, per spec.md §4.C16/§6.

use std::collections::HashMap;

use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::hints::atom::{Atom, AtomTable};
use crate::selection::Selection;
use crate::win::Xid;
use crate::xconn::{PropValue, XConn};

/// `XEMBED_EMBEDDED_NOTIFY`, the only `_XEMBED` opcode this container
/// sends (spec.md §6).
const XEMBED_EMBEDDED_NOTIFY: u32 = 0;

/// `_NET_SYSTEM_TRAY_OPCODE` opcodes a tray client can send.
const SYSTEM_TRAY_REQUEST_DOCK: u32 = 0;

const XEMBED_MAPPED: u32 = 1;

/// Decoded `_XEMBED_INFO` (`CARD32 {protocol_version, flags}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XEmbedInfo {
    pub protocol_version: u32,
    pub mapped: bool,
}

impl XEmbedInfo {
    fn from_raw(raw: &[u32]) -> Option<Self> {
        if raw.len() < 2 {
            return None;
        }
        Some(Self { protocol_version: raw[0], mapped: raw[1] & XEMBED_MAPPED != 0 })
    }

    /// Absent `_XEMBED_INFO` proceeds with version 0 and mapped = true,
    /// per spec.md §4.C16.
    fn absent_default() -> Self {
        Self { protocol_version: 0, mapped: true }
    }
}

/// One docked client.
#[derive(Debug)]
pub struct SystrayObject {
    pub client: Xid,
    pub info: XEmbedInfo,
}

/// The tray container: an icon window each docked client is reparented
/// into, plus the `_NET_SYSTEM_TRAY_S<n>` selection that makes clients
/// find it.
pub struct Systray {
    icon_window: Xid,
    selection: Option<Selection>,
    objects: HashMap<Xid, SystrayObject>,
}

impl Systray {
    /// Acquire the tray selection for `screen` and start listening for
    /// dock requests on `icon_window` (a container window the caller has
    /// already created and mapped).
    #[instrument(skip(conn, atoms))]
    pub fn acquire(conn: &impl XConn, atoms: &AtomTable, icon_window: Xid, screen: u32) -> Result<Self> {
        let name = format!("_NET_SYSTEM_TRAY_S{screen}");
        let selection = Selection::acquire(conn, atoms, &name, None)?;
        Ok(Self { icon_window, selection: Some(selection), objects: HashMap::new() })
    }

    /// Handle an inbound `_NET_SYSTEM_TRAY_OPCODE` `ClientMessage`. Only
    /// `REQUEST_DOCK` is recognised; anything else is ignored, matching
    /// clients sending opcodes this implementation doesn't support.
    #[instrument(skip(self, conn, atoms))]
    pub fn handle_client_message(
        &mut self,
        conn: &impl XConn,
        atoms: &AtomTable,
        type_atom: u32,
        data: [u32; 5],
    ) -> Result<()> {
        if type_atom != atoms.id(Atom::NetSystemTrayOpcode) {
            return Ok(());
        }
        if data[1] != SYSTEM_TRAY_REQUEST_DOCK {
            return Ok(());
        }
        let client = data[2];
        self.dock(conn, atoms, client)
    }

    fn dock(&mut self, conn: &impl XConn, atoms: &AtomTable, client: Xid) -> Result<()> {
        let info = match conn.get_property(client, atoms.id(Atom::XEmbedInfo))? {
            Some(PropValue::Cardinal(raw)) => {
                XEmbedInfo::from_raw(&raw).unwrap_or_else(XEmbedInfo::absent_default)
            }
            _ => XEmbedInfo::absent_default(),
        };

        conn.reparent_window(client, self.icon_window, 0, 0)?;
        conn.add_to_save_set(client)?;
        conn.select_input(client, STRUCTURE_AND_PROPERTY_MASK)?;

        let time = conn.current_server_time()?;
        conn.send_client_message(
            client,
            atoms.id(Atom::XEmbed),
            [time, XEMBED_EMBEDDED_NOTIFY, 0, self.icon_window, info.protocol_version],
        )?;

        if info.mapped {
            conn.map_window(client)?;
        }

        debug!(client, ?info, "docked client in systray");
        self.objects.insert(client, SystrayObject { client, info });
        Ok(())
    }

    /// `_XEMBED_INFO.flags & MAPPED` changed on a PropertyNotify: re-read
    /// and toggle local visibility (spec.md's §1 supplemented feature).
    pub fn refresh_embed_info(&mut self, conn: &impl XConn, atoms: &AtomTable, client: Xid) -> Result<()> {
        let Some(obj) = self.objects.get_mut(&client) else { return Ok(()) };
        let Some(PropValue::Cardinal(raw)) = conn.get_property(client, atoms.id(Atom::XEmbedInfo))? else {
            return Ok(());
        };
        let Some(info) = XEmbedInfo::from_raw(&raw) else { return Ok(()) };
        if info.mapped != obj.info.mapped {
            if info.mapped {
                conn.map_window(client)?;
            } else {
                conn.unmap_window(client)?;
            }
        }
        obj.info = info;
        Ok(())
    }

    /// Drop a docked client on destroy or reparent-away.
    pub fn undock(&mut self, client: Xid) {
        self.objects.remove(&client);
    }

    pub fn objects(&self) -> impl Iterator<Item = &SystrayObject> {
        self.objects.values()
    }

    /// `SelectionClear`: the whole tray hides. Releases the selection and
    /// empties the object table; callers are responsible for unmapping
    /// `icon_window` itself.
    pub fn on_selection_lost(&mut self, conn: &impl XConn) -> Result<()> {
        warn!("systray selection lost, hiding tray");
        if let Some(sel) = self.selection.take() {
            sel.release(conn)?;
        }
        self.objects.clear();
        Ok(())
    }
}

/// `StructureNotifyMask | PropertyChangeMask`, the events needed to learn
/// about a docked client's destruction, reparenting, and `_XEMBED_INFO`
/// changes.
const STRUCTURE_AND_PROPERTY_MASK: u32 = (1 << 17) | (1 << 22);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xconn::mock::MockXConn;
    use crate::xconn::PropMode;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct StubConn {
        props: RefCell<HashMap<(Xid, u32), PropValue>>,
        mapped: RefCell<std::collections::HashSet<Xid>>,
        sent: RefCell<Vec<(Xid, u32, [u32; 5])>>,
        reparented: RefCell<Vec<(Xid, Xid)>>,
        time: Cell<u32>,
    }

    impl MockXConn for StubConn {
        fn mock_root(&self) -> Xid {
            1
        }
        fn mock_get_property(&self, win: Xid, atom: u32) -> Result<Option<PropValue>> {
            Ok(self.props.borrow().get(&(win, atom)).cloned())
        }
        fn mock_change_property(&self, win: Xid, atom: u32, value: &PropValue, _mode: PropMode) -> Result<()> {
            self.props.borrow_mut().insert((win, atom), value.clone());
            Ok(())
        }
        fn mock_reparent_window(&self, win: Xid, new_parent: Xid, _x: i32, _y: i32) -> Result<()> {
            self.reparented.borrow_mut().push((win, new_parent));
            Ok(())
        }
        fn mock_map_window(&self, win: Xid) -> Result<()> {
            self.mapped.borrow_mut().insert(win);
            Ok(())
        }
        fn mock_unmap_window(&self, win: Xid) -> Result<()> {
            self.mapped.borrow_mut().remove(&win);
            Ok(())
        }
        fn mock_intern_atom(&self, name: &str) -> Result<u32> {
            Ok(name.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32)))
        }
        fn mock_current_server_time(&self) -> Result<u32> {
            let t = self.time.get() + 1;
            self.time.set(t);
            Ok(t)
        }
        fn mock_create_input_only_window(&self, _parent: Xid, _geom: crate::geometry::Rect) -> Result<Xid> {
            Ok(999)
        }
        fn mock_destroy_window(&self, _win: Xid) -> Result<()> {
            Ok(())
        }
        fn mock_set_selection_owner(&self, _selection: u32, _owner: Xid, _time: u32) -> Result<()> {
            Ok(())
        }
        fn mock_get_selection_owner(&self, _selection: u32) -> Result<Xid> {
            Ok(999)
        }
        fn mock_send_client_message(&self, win: Xid, type_atom: u32, data: [u32; 5]) -> Result<()> {
            self.sent.borrow_mut().push((win, type_atom, data));
            Ok(())
        }
    }

    #[test]
    fn dock_without_xembed_info_defaults_to_mapped_version_zero() {
        let conn = StubConn::default();
        let atoms = AtomTable::intern_all(&conn).unwrap();
        let mut tray = Systray::acquire(&conn, &atoms, 50, 0).unwrap();

        tray.handle_client_message(
            &conn,
            &atoms,
            atoms.id(Atom::NetSystemTrayOpcode),
            [0, SYSTEM_TRAY_REQUEST_DOCK, 77, 0, 0],
        )
        .unwrap();

        assert!(conn.mapped.borrow().contains(&77));
        assert_eq!(conn.reparented.borrow()[0], (77, 50));
        let (_, _, data) = conn.sent.borrow()[0];
        assert_eq!(data[1], XEMBED_EMBEDDED_NOTIFY);
        assert_eq!(data[4], 0); // protocol_version defaulted to 0
        assert!(tray.objects().any(|o| o.client == 77));
    }

    #[test]
    fn refresh_embed_info_unmaps_when_mapped_flag_clears() {
        let conn = StubConn::default();
        let atoms = AtomTable::intern_all(&conn).unwrap();
        let mut tray = Systray::acquire(&conn, &atoms, 50, 0).unwrap();
        tray.handle_client_message(
            &conn,
            &atoms,
            atoms.id(Atom::NetSystemTrayOpcode),
            [0, SYSTEM_TRAY_REQUEST_DOCK, 77, 0, 0],
        )
        .unwrap();
        assert!(conn.mapped.borrow().contains(&77));

        conn.props
            .borrow_mut()
            .insert((77, atoms.id(Atom::XEmbedInfo)), PropValue::Cardinal(vec![0, 0]));
        tray.refresh_embed_info(&conn, &atoms, 77).unwrap();
        assert!(!conn.mapped.borrow().contains(&77));
    }

    #[test]
    fn selection_lost_hides_whole_tray() {
        let conn = StubConn::default();
        let atoms = AtomTable::intern_all(&conn).unwrap();
        let mut tray = Systray::acquire(&conn, &atoms, 50, 0).unwrap();
        tray.handle_client_message(
            &conn,
            &atoms,
            atoms.id(Atom::NetSystemTrayOpcode),
            [0, SYSTEM_TRAY_REQUEST_DOCK, 77, 0, 0],
        )
        .unwrap();
        tray.on_selection_lost(&conn).unwrap();
        assert_eq!(tray.objects().count(), 0);
    }
}
