//! A mock implementation of [`super::XConn`], easier to hand-implement
//! in tests than the full trait. Mirrors the teacher's `x::mock` module:
//! every method defaults to `Err(Error::UnimplementedMock)` and a
//! blanket impl forwards `XConn` calls onto the `mock_*` equivalents, so
//! a test struct only needs to override the handful of methods the
//! scenario under test actually exercises.

use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::win::Xid;

use super::{ExtensionTable, PropMode, PropValue, WinAttrs, XConn};

#[allow(unused_variables)]
pub trait MockXConn {
    fn mock_root(&self) -> Xid {
        1
    }

    fn mock_screen_details(&self) -> Result<Vec<Rect>> {
        Err(Error::UnimplementedMock)
    }

    fn mock_get_geometry(&self, win: Xid) -> Result<WinAttrs> {
        Err(Error::UnimplementedMock)
    }

    fn mock_create_window(
        &self,
        parent: Xid,
        geom: Rect,
        depth: u8,
        save_under: bool,
    ) -> Result<Xid> {
        Err(Error::UnimplementedMock)
    }

    fn mock_create_input_only_window(&self, parent: Xid, geom: Rect) -> Result<Xid> {
        Err(Error::UnimplementedMock)
    }

    fn mock_destroy_window(&self, win: Xid) -> Result<()> {
        Err(Error::UnimplementedMock)
    }

    fn mock_map_window(&self, win: Xid) -> Result<()> {
        Err(Error::UnimplementedMock)
    }

    fn mock_unmap_window(&self, win: Xid) -> Result<()> {
        Err(Error::UnimplementedMock)
    }

    fn mock_reparent_window(&self, win: Xid, new_parent: Xid, x: i32, y: i32) -> Result<()> {
        Err(Error::UnimplementedMock)
    }

    fn mock_configure_window(&self, win: Xid, geom: Rect) -> Result<()> {
        Err(Error::UnimplementedMock)
    }

    fn mock_grab_server(&self) -> Result<()> {
        Ok(())
    }

    fn mock_ungrab_server(&self) -> Result<()> {
        Ok(())
    }

    fn mock_flush(&self) -> Result<()> {
        Ok(())
    }

    fn mock_sync_unconditionally(&self) -> Result<()> {
        Ok(())
    }

    fn mock_intern_atom(&self, name: &str) -> Result<u32> {
        Err(Error::UnimplementedMock)
    }

    fn mock_atom_name(&self, atom: u32) -> Result<String> {
        Err(Error::UnimplementedMock)
    }

    fn mock_query_extensions(&self) -> Result<ExtensionTable> {
        Ok(ExtensionTable::default())
    }

    fn mock_get_property(&self, win: Xid, atom: u32) -> Result<Option<PropValue>> {
        let _ = (win, atom);
        Err(Error::UnimplementedMock)
    }

    fn mock_change_property(
        &self,
        win: Xid,
        atom: u32,
        value: &PropValue,
        mode: PropMode,
    ) -> Result<()> {
        let _ = (win, atom, value, mode);
        Err(Error::UnimplementedMock)
    }

    fn mock_delete_property(&self, win: Xid, atom: u32) -> Result<()> {
        let _ = (win, atom);
        Err(Error::UnimplementedMock)
    }

    fn mock_select_input(&self, win: Xid, mask: u32) -> Result<()> {
        let _ = (win, mask);
        Ok(())
    }

    fn mock_add_to_save_set(&self, win: Xid) -> Result<()> {
        let _ = win;
        Ok(())
    }

    fn mock_send_client_message(&self, win: Xid, type_atom: u32, data: [u32; 5]) -> Result<()> {
        let _ = (win, type_atom, data);
        Err(Error::UnimplementedMock)
    }

    fn mock_set_selection_owner(&self, selection: u32, owner: Xid, time: u32) -> Result<()> {
        let _ = (selection, owner, time);
        Err(Error::UnimplementedMock)
    }

    fn mock_get_selection_owner(&self, selection: u32) -> Result<Xid> {
        let _ = selection;
        Err(Error::UnimplementedMock)
    }

    fn mock_current_server_time(&self) -> Result<u32> {
        Err(Error::UnimplementedMock)
    }

    fn mock_set_input_focus(&self, win: Xid) -> Result<()> {
        let _ = win;
        Err(Error::UnimplementedMock)
    }

    fn mock_warp_pointer(&self, x: i32, y: i32) -> Result<()> {
        let _ = (x, y);
        Err(Error::UnimplementedMock)
    }

    fn mock_query_pointer(&self, win: Xid) -> Result<crate::geometry::Point> {
        let _ = win;
        Err(Error::UnimplementedMock)
    }

    fn mock_create_pixmap(&self, drawable: Xid, w: u32, h: u32, depth: u8) -> Result<Xid> {
        let _ = (drawable, w, h, depth);
        Err(Error::UnimplementedMock)
    }

    fn mock_free_pixmap(&self, pixmap: Xid) -> Result<()> {
        let _ = pixmap;
        Ok(())
    }

    fn mock_argb_visual(&self) -> Result<super::ArgbVisual> {
        Err(Error::UnimplementedMock)
    }

    fn mock_create_window_with_visual(
        &self,
        parent: Xid,
        geom: Rect,
        depth: u8,
        visual: u32,
        colormap: u32,
        save_under: bool,
    ) -> Result<Xid> {
        let _ = (parent, geom, depth, visual, colormap, save_under);
        Err(Error::UnimplementedMock)
    }

    fn mock_fetch_events(&self, timeout_ms: Option<u64>) -> Result<Vec<crate::event::XEvent>> {
        let _ = timeout_ms;
        Ok(Vec::new())
    }

    fn mock_query_shape_rects(&self, win: Xid) -> Result<Vec<Rect>> {
        let _ = win;
        Err(Error::UnimplementedMock)
    }

    fn mock_clear_shape(&self, win: Xid) -> Result<()> {
        let _ = win;
        Ok(())
    }

    fn mock_set_shape_rects(&self, win: Xid, rects: &[Rect]) -> Result<()> {
        let _ = (win, rects);
        Ok(())
    }

    fn mock_keycode_for_keysym(&self, keysym: u32) -> Result<u8> {
        let _ = keysym;
        Err(Error::UnimplementedMock)
    }
}

impl<T> XConn for T
where
    T: MockXConn,
{
    fn root(&self) -> Xid {
        self.mock_root()
    }

    fn screen_details(&self) -> Result<Vec<Rect>> {
        self.mock_screen_details()
    }

    fn get_geometry(&self, win: Xid) -> Result<WinAttrs> {
        self.mock_get_geometry(win)
    }

    fn create_window(
        &self,
        parent: Xid,
        geom: Rect,
        depth: u8,
        save_under: bool,
    ) -> Result<Xid> {
        self.mock_create_window(parent, geom, depth, save_under)
    }

    fn create_input_only_window(&self, parent: Xid, geom: Rect) -> Result<Xid> {
        self.mock_create_input_only_window(parent, geom)
    }

    fn destroy_window(&self, win: Xid) -> Result<()> {
        self.mock_destroy_window(win)
    }

    fn map_window(&self, win: Xid) -> Result<()> {
        self.mock_map_window(win)
    }

    fn unmap_window(&self, win: Xid) -> Result<()> {
        self.mock_unmap_window(win)
    }

    fn reparent_window(&self, win: Xid, new_parent: Xid, x: i32, y: i32) -> Result<()> {
        self.mock_reparent_window(win, new_parent, x, y)
    }

    fn configure_window(&self, win: Xid, geom: Rect) -> Result<()> {
        self.mock_configure_window(win, geom)
    }

    fn grab_server(&self) -> Result<()> {
        self.mock_grab_server()
    }

    fn ungrab_server(&self) -> Result<()> {
        self.mock_ungrab_server()
    }

    fn flush(&self) -> Result<()> {
        self.mock_flush()
    }

    fn sync_unconditionally(&self) -> Result<()> {
        self.mock_sync_unconditionally()
    }

    fn intern_atom(&self, name: &str) -> Result<u32> {
        self.mock_intern_atom(name)
    }

    fn atom_name(&self, atom: u32) -> Result<String> {
        self.mock_atom_name(atom)
    }

    fn query_extensions(&self) -> Result<ExtensionTable> {
        self.mock_query_extensions()
    }

    fn get_property(&self, win: Xid, atom: u32) -> Result<Option<PropValue>> {
        self.mock_get_property(win, atom)
    }

    fn change_property(
        &self,
        win: Xid,
        atom: u32,
        value: &PropValue,
        mode: PropMode,
    ) -> Result<()> {
        self.mock_change_property(win, atom, value, mode)
    }

    fn delete_property(&self, win: Xid, atom: u32) -> Result<()> {
        self.mock_delete_property(win, atom)
    }

    fn select_input(&self, win: Xid, mask: u32) -> Result<()> {
        self.mock_select_input(win, mask)
    }

    fn add_to_save_set(&self, win: Xid) -> Result<()> {
        self.mock_add_to_save_set(win)
    }

    fn send_client_message(&self, win: Xid, type_atom: u32, data: [u32; 5]) -> Result<()> {
        self.mock_send_client_message(win, type_atom, data)
    }

    fn set_selection_owner(&self, selection: u32, owner: Xid, time: u32) -> Result<()> {
        self.mock_set_selection_owner(selection, owner, time)
    }

    fn get_selection_owner(&self, selection: u32) -> Result<Xid> {
        self.mock_get_selection_owner(selection)
    }

    fn current_server_time(&self) -> Result<u32> {
        self.mock_current_server_time()
    }

    fn set_input_focus(&self, win: Xid) -> Result<()> {
        self.mock_set_input_focus(win)
    }

    fn warp_pointer(&self, x: i32, y: i32) -> Result<()> {
        self.mock_warp_pointer(x, y)
    }

    fn query_pointer(&self, win: Xid) -> Result<crate::geometry::Point> {
        self.mock_query_pointer(win)
    }

    fn create_pixmap(&self, drawable: Xid, w: u32, h: u32, depth: u8) -> Result<Xid> {
        self.mock_create_pixmap(drawable, w, h, depth)
    }

    fn free_pixmap(&self, pixmap: Xid) -> Result<()> {
        self.mock_free_pixmap(pixmap)
    }

    fn argb_visual(&self) -> Result<super::ArgbVisual> {
        self.mock_argb_visual()
    }

    fn create_window_with_visual(
        &self,
        parent: Xid,
        geom: Rect,
        depth: u8,
        visual: u32,
        colormap: u32,
        save_under: bool,
    ) -> Result<Xid> {
        self.mock_create_window_with_visual(parent, geom, depth, visual, colormap, save_under)
    }

    fn fetch_events(&self, timeout_ms: Option<u64>) -> Result<Vec<crate::event::XEvent>> {
        self.mock_fetch_events(timeout_ms)
    }

    fn query_shape_rects(&self, win: Xid) -> Result<Vec<Rect>> {
        self.mock_query_shape_rects(win)
    }

    fn clear_shape(&self, win: Xid) -> Result<()> {
        self.mock_clear_shape(win)
    }

    fn set_shape_rects(&self, win: Xid, rects: &[Rect]) -> Result<()> {
        self.mock_set_shape_rects(win, rects)
    }

    fn keycode_for_keysym(&self, keysym: u32) -> Result<u8> {
        self.mock_keycode_for_keysym(keysym)
    }
}

/// Minimal [`MockXConn`] implementations shared by other modules' unit
/// tests (`win`, `anim::slide`, ...) that need a connection stand-in but
/// don't want to hand-roll one per call site.
#[cfg(test)]
pub(crate) mod tests_support {
    use std::cell::{Cell, RefCell};

    use super::*;

    /// Allocates pixmaps from an incrementing counter and records every
    /// id passed to `free_pixmap`, so a test can assert a specific pixmap
    /// was freed rather than merely that *some* free happened.
    pub(crate) struct NoopConn {
        pub(crate) next_pixmap: Cell<Xid>,
        pub(crate) freed: RefCell<Vec<Xid>>,
    }

    impl NoopConn {
        #[allow(dead_code)]
        pub(crate) fn new() -> Self {
            Self {
                next_pixmap: Cell::new(1000),
                freed: RefCell::new(Vec::new()),
            }
        }
    }

    impl Default for NoopConn {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockXConn for NoopConn {
        fn mock_create_pixmap(&self, _drawable: Xid, _w: u32, _h: u32, _depth: u8) -> Result<Xid> {
            let id = self.next_pixmap.get();
            self.next_pixmap.set(id + 1);
            Ok(id)
        }

        fn mock_free_pixmap(&self, pixmap: Xid) -> Result<()> {
            self.freed.borrow_mut().push(pixmap);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub;
    impl MockXConn for Stub {
        fn mock_root(&self) -> Xid {
            42
        }
    }

    #[test]
    fn blanket_impl_forwards_overridden_methods() {
        let conn = Stub;
        assert_eq!(XConn::root(&conn), 42);
    }

    #[test]
    fn blanket_impl_defaults_to_unimplemented() {
        let conn = Stub;
        assert!(matches!(
            XConn::intern_atom(&conn, "WM_NAME"),
            Err(Error::UnimplementedMock)
        ));
    }
}
