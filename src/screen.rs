//! Screen/head geometry (C14): per-head rectangles derived from
//! RandR/Xinerama or a manual split, per spec.md §4.C14.
//!
//! [`crate::xconn::XConn::screen_details`] is the backend's one job here:
//! return whatever per-head rectangles it already knows (RandR outputs,
//! Xinerama, or a single-head fallback). This module owns everything
//! downstream of that: head lookup, nearest-head fallback, and
//! strut-aware available-area computation.

use tracing::instrument;

use crate::error::Result;
use crate::geometry::{Point, Rect};
use crate::hints::ewmh::Strut;
use crate::xconn::XConn;

/// A single head's geometry, indexed by its position in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Head {
    pub index: usize,
    pub geometry: Rect,
}

/// The screen/head table, rebuilt whenever the output configuration
/// changes (a `RandrNotify` in the compressed event stream).
#[derive(Debug, Default)]
pub struct ScreenLayout {
    heads: Vec<Head>,
}

impl ScreenLayout {
    /// Populate from whatever the backend's `screen_details` reports. An
    /// empty result is not expected from a live connection but would
    /// collapse to a single full-root head rather than panicking.
    #[instrument(skip(conn))]
    pub fn query(conn: &impl XConn) -> Result<Self> {
        let rects = conn.screen_details()?;
        let heads = if rects.is_empty() {
            let root_geom = conn.get_geometry(conn.root())?;
            vec![Head { index: 0, geometry: root_geom.geometry }]
        } else {
            rects
                .into_iter()
                .enumerate()
                .map(|(index, geometry)| Head { index, geometry })
                .collect()
        };
        Ok(Self { heads })
    }

    /// Build a layout directly from known rectangles, for manual N×M
    /// splits or tests, bypassing a live query.
    pub fn from_rects(rects: Vec<Rect>) -> Self {
        let heads = rects
            .into_iter()
            .enumerate()
            .map(|(index, geometry)| Head { index, geometry })
            .collect();
        Self { heads }
    }

    /// Split a full-root rectangle into an `cols` × `rows` manual grid,
    /// head 0 being the full root when unset (spec.md's glossary entry
    /// for **Screen-head**).
    pub fn manual_split(root: Rect, cols: u32, rows: u32) -> Self {
        if cols == 0 || rows == 0 {
            return Self::from_rects(vec![root]);
        }
        let cell_w = root.w / cols;
        let cell_h = root.h / rows;
        let mut rects = Vec::with_capacity((cols * rows) as usize);
        for row in 0..rows {
            for col in 0..cols {
                rects.push(Rect {
                    x: root.x + (col * cell_w) as i32,
                    y: root.y + (row * cell_h) as i32,
                    w: cell_w,
                    h: cell_h,
                });
            }
        }
        Self::from_rects(rects)
    }

    pub fn heads(&self) -> &[Head] {
        &self.heads
    }

    /// The geometry of head `h`, if it exists.
    pub fn geometry_by_head(&self, h: usize) -> Option<Rect> {
        self.heads.get(h).map(|head| head.geometry)
    }

    /// The head containing `(x, y)`; if no head strictly contains the
    /// point (e.g. a pointer warp target just outside every known head),
    /// falls back to the nearest head by center distance.
    pub fn geometry_at(&self, x: i32, y: i32) -> Option<Rect> {
        if self.heads.is_empty() {
            return None;
        }
        let p = Point { x, y };
        if let Some(head) = self.heads.iter().find(|h| h.geometry.contains(p)) {
            return Some(head.geometry);
        }
        self.heads
            .iter()
            .min_by_key(|h| distance_sq(h.geometry.midpoint(), p))
            .map(|h| h.geometry)
    }

    /// `available_area_at`: the geometry of the head at `(x, y)` shrunk by
    /// the aggregate strut reservations of every managed client, unless
    /// `ignore_struts` is set.
    pub fn available_area_at(&self, x: i32, y: i32, struts: &[Strut], ignore_struts: bool) -> Option<Rect> {
        let geom = self.geometry_at(x, y)?;
        if ignore_struts {
            return Some(geom);
        }
        Some(apply_struts(geom, &aggregate_struts(struts)))
    }
}

fn distance_sq(a: Point, b: Point) -> i64 {
    let dx = (a.x - b.x) as i64;
    let dy = (a.y - b.y) as i64;
    dx * dx + dy * dy
}

/// Sum every client's strut reservation on each edge; EWMH specifies
/// struts as independently-accumulated per-edge reservations, not a
/// single client's value winning.
fn aggregate_struts(struts: &[Strut]) -> Strut {
    struts.iter().fold(Strut::default(), |acc, s| Strut {
        left: acc.left.max(s.left),
        right: acc.right.max(s.right),
        top: acc.top.max(s.top),
        bottom: acc.bottom.max(s.bottom),
    })
}

fn apply_struts(geom: Rect, strut: &Strut) -> Rect {
    let left = strut.left.min(geom.w);
    let right = strut.right.min(geom.w.saturating_sub(left));
    let top = strut.top.min(geom.h);
    let bottom = strut.bottom.min(geom.h.saturating_sub(top));
    Rect {
        x: geom.x + left as i32,
        y: geom.y + top as i32,
        w: geom.w.saturating_sub(left + right),
        h: geom.h.saturating_sub(top + bottom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: i32, y: i32, w: u32, h: u32) -> Rect {
        Rect { x, y, w, h }
    }

    #[test]
    fn manual_split_produces_even_grid() {
        let layout = ScreenLayout::manual_split(rect(0, 0, 1920, 1080), 2, 1);
        assert_eq!(layout.heads().len(), 2);
        assert_eq!(layout.geometry_by_head(0), Some(rect(0, 0, 960, 1080)));
        assert_eq!(layout.geometry_by_head(1), Some(rect(960, 0, 960, 1080)));
    }

    #[test]
    fn geometry_at_falls_back_to_nearest_head() {
        let layout = ScreenLayout::from_rects(vec![rect(0, 0, 800, 600), rect(800, 0, 800, 600)]);
        // well outside every head, but closer to the right one
        assert_eq!(layout.geometry_at(2000, 300), Some(rect(800, 0, 800, 600)));
    }

    #[test]
    fn available_area_at_shrinks_by_aggregate_struts() {
        let layout = ScreenLayout::from_rects(vec![rect(0, 0, 1000, 800)]);
        let struts = [
            Strut { top: 20, ..Default::default() },
            Strut { bottom: 30, left: 10, ..Default::default() },
        ];
        let avail = layout.available_area_at(5, 5, &struts, false).unwrap();
        assert_eq!(avail, rect(10, 20, 990, 750));
    }

    #[test]
    fn available_area_at_ignores_struts_when_asked() {
        let layout = ScreenLayout::from_rects(vec![rect(0, 0, 1000, 800)]);
        let struts = [Strut { top: 20, ..Default::default() }];
        let avail = layout.available_area_at(5, 5, &struts, true).unwrap();
        assert_eq!(avail, rect(0, 0, 1000, 800));
    }
}
