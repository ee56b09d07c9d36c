//! Typed many-to-many client window groups (C15), per spec.md §4.C15.
//!
//! Grounded in `examples/original_source/src/groups.c`: a group is an id
//! plus policy bits plus a member list; membership is maintained
//! symmetrically on both sides of the edge (**P5**). This crate doesn't
//! carry a `groups: Vec<GroupId>` field on [`crate::win::Win`] itself (the
//! teacher's `Win` layout is left untouched); the reverse index lives
//! here instead, in [`GroupRegistry::by_member`].

use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use bitflags::bitflags;
use tracing::{debug, trace};

use crate::time::Clock;
use crate::win::WinId;

bitflags! {
    /// The per-group policy bits spec.md's glossary lists: which
    /// operations on one member propagate to the whole group.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GroupPolicy: u8 {
        const ICONIFY    = 1 << 0;
        const KILL       = 1 << 1;
        const MOVE       = 1 << 2;
        const RAISE      = 1 << 3;
        const SET_BORDER = 1 << 4;
        const STICK      = 1 << 5;
        const SHADE      = 1 << 6;
    }
}

/// A group's id: unique, default-seeded from a microsecond clock reading
/// (matching the original's `GetTimeUs()` seed), or caller-supplied when
/// restoring a persisted group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u64);

#[derive(Debug, Clone)]
pub struct Group {
    pub id: GroupId,
    pub policy: GroupPolicy,
    pub members: Vec<WinId>,
    /// Persist this group through emptiness (`save_to_stream` skips
    /// groups without this bit set).
    pub save: bool,
}

/// The process-wide group table.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: HashMap<GroupId, Group>,
    by_member: HashMap<WinId, Vec<GroupId>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `create(id?)`: make a new, empty group. When `id` is `None`, seed
    /// from the clock (collisions are astronomically unlikely and not
    /// guarded against, matching the original's own comment that this
    /// "should really be checked for uniqueness").
    pub fn create(&mut self, id: Option<GroupId>, clock: &Clock) -> GroupId {
        let id = id.unwrap_or_else(|| GroupId(clock.micros()));
        self.groups.entry(id).or_insert_with(|| Group {
            id,
            policy: GroupPolicy::empty(),
            members: Vec::new(),
            save: false,
        });
        id
    }

    /// `destroy`: remove the group and its membership edges.
    pub fn destroy(&mut self, id: GroupId) {
        if let Some(group) = self.groups.remove(&id) {
            for member in group.members {
                if let Some(ids) = self.by_member.get_mut(&member) {
                    ids.retain(|g| *g != id);
                }
            }
        }
    }

    /// `add(ewin, group)`: symmetric insertion. Idempotent — adding a
    /// window already in the group is a no-op on both sides.
    pub fn add(&mut self, win: WinId, group: GroupId, clock: &Clock) {
        self.create(Some(group), clock);
        let g = self.groups.get_mut(&group).expect("just created");
        if !g.members.contains(&win) {
            g.members.push(win);
        }
        let ids = self.by_member.entry(win).or_default();
        if !ids.contains(&group) {
            ids.push(group);
        }
        trace!(?win, ?group, "added window to group");
    }

    /// `remove(ewin, group)`: symmetric removal.
    pub fn remove(&mut self, win: WinId, group: GroupId) {
        if let Some(g) = self.groups.get_mut(&group) {
            g.members.retain(|w| *w != win);
        }
        if let Some(ids) = self.by_member.get_mut(&win) {
            ids.retain(|g| *g != group);
        }
    }

    /// `break(ewin, group?)`: for every group `ewin` belongs to (or just
    /// the one named, if given), remove *every* member from that group —
    /// matching `BreakWindowGroup`'s all-members semantics, not just the
    /// calling window.
    pub fn break_group(&mut self, win: WinId, group: Option<GroupId>) {
        let targets: Vec<GroupId> = self
            .by_member
            .get(&win)
            .into_iter()
            .flatten()
            .copied()
            .filter(|g| group.map_or(true, |only| *g == only))
            .collect();
        for gid in targets {
            let members = self.groups.get(&gid).map(|g| g.members.clone()).unwrap_or_default();
            for member in members {
                self.remove(member, gid);
            }
        }
        debug!(?win, ?group, "broke window group(s)");
    }

    /// `find_common(ewin1, ewin2)`: a group both windows are members of,
    /// if any.
    pub fn find_common(&self, a: WinId, b: WinId) -> Option<GroupId> {
        let a_groups = self.by_member.get(&a)?;
        let b_groups = self.by_member.get(&b)?;
        a_groups.iter().find(|g| b_groups.contains(g)).copied()
    }

    /// `list_by_ewin(ewin)`.
    pub fn list_by_ewin(&self, win: WinId) -> &[GroupId] {
        self.by_member.get(&win).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `list_all()`.
    pub fn list_all(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn set_policy(&mut self, id: GroupId, policy: GroupPolicy, save: bool) {
        if let Some(g) = self.groups.get_mut(&id) {
            g.policy = policy;
            g.save = save;
        }
    }

    /// Persist every `save`-flagged group's id and policy bits as
    /// `"KEY: value"` lines, per spec.md §6's file format. Membership
    /// itself is not persisted; windows re-join their groups as clients
    /// are remanaged and call `add` again.
    pub fn save_to_stream<W: Write>(&self, mut out: W) -> io::Result<()> {
        for g in self.groups.values().filter(|g| g.save) {
            writeln!(out, "NEW: {}", g.id.0)?;
            for (key, bit) in POLICY_KEYS {
                writeln!(out, "{key}: {}", g.policy.contains(*bit) as u8)?;
            }
        }
        Ok(())
    }

    /// Load groups previously written by [`Self::save_to_stream`],
    /// creating each as a `save`-flagged, memberless group (members
    /// rejoin lazily via `add` as clients remanage).
    pub fn load_from_stream<R: BufRead>(&mut self, reader: R) -> io::Result<()> {
        let mut current: Option<(GroupId, GroupPolicy)> = None;
        for line in reader.lines() {
            let line = line?;
            let Some((key, value)) = line.split_once(':') else { continue };
            let key = key.trim();
            let value = value.trim();

            if key == "NEW" {
                if let Some((id, policy)) = current.take() {
                    self.finish_load(id, policy);
                }
                if let Ok(id) = value.parse::<u64>() {
                    current = Some((GroupId(id), GroupPolicy::empty()));
                }
                continue;
            }

            if let Some((_, ref mut policy)) = current {
                if let Some((_, bit)) = POLICY_KEYS.iter().find(|(k, _)| *k == key) {
                    if value == "1" {
                        *policy |= *bit;
                    }
                }
            }
        }
        if let Some((id, policy)) = current {
            self.finish_load(id, policy);
        }
        Ok(())
    }

    fn finish_load(&mut self, id: GroupId, policy: GroupPolicy) {
        self.groups.insert(
            id,
            Group { id, policy, members: Vec::new(), save: true },
        );
    }
}

const POLICY_KEYS: &[(&str, GroupPolicy)] = &[
    ("ICONIFY", GroupPolicy::ICONIFY),
    ("KILL", GroupPolicy::KILL),
    ("MOVE", GroupPolicy::MOVE),
    ("RAISE", GroupPolicy::RAISE),
    ("SET_BORDER", GroupPolicy::SET_BORDER),
    ("STICK", GroupPolicy::STICK),
    ("SHADE", GroupPolicy::SHADE),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::win::WinRegistry;
    use std::time::Duration;

    /// A throwaway registry just to mint distinct [`WinId`] handles;
    /// these tests never touch the underlying `Win` records.
    fn win_ids(n: usize) -> Vec<WinId> {
        let mut reg = WinRegistry::new();
        (0..n)
            .map(|i| reg.register(1000 + i as u32, None, Rect::default(), 24))
            .collect()
    }

    #[test]
    fn membership_is_symmetric() {
        let clock = Clock::new();
        let mut reg = GroupRegistry::new();
        let w1 = win_ids(1)[0];
        let gid = reg.create(None, &clock);
        reg.add(w1, gid, &clock);
        assert!(reg.get(gid).unwrap().members.contains(&w1));
        assert!(reg.list_by_ewin(w1).contains(&gid));

        reg.remove(w1, gid);
        assert!(!reg.get(gid).unwrap().members.contains(&w1));
        assert!(!reg.list_by_ewin(w1).contains(&gid));
    }

    #[test]
    fn find_common_locates_shared_group() {
        let clock = Clock::new();
        let mut reg = GroupRegistry::new();
        let ids = win_ids(2);
        let (w1, w2) = (ids[0], ids[1]);
        let gid = reg.create(None, &clock);
        reg.add(w1, gid, &clock);
        reg.add(w2, gid, &clock);
        assert_eq!(reg.find_common(w1, w2), Some(gid));
    }

    #[test]
    fn break_group_empties_every_member_not_just_caller() {
        let clock = Clock::new();
        let mut reg = GroupRegistry::new();
        let ids = win_ids(2);
        let (w1, w2) = (ids[0], ids[1]);
        let gid = reg.create(None, &clock);
        reg.add(w1, gid, &clock);
        reg.add(w2, gid, &clock);
        reg.break_group(w1, None);
        assert!(reg.get(gid).unwrap().members.is_empty());
        assert!(reg.list_by_ewin(w2).is_empty());
    }

    #[test]
    fn save_and_load_round_trip_policy_bits() {
        let clock = Clock::new();
        let mut reg = GroupRegistry::new();
        let gid = reg.create(Some(GroupId(42)), &clock);
        reg.set_policy(gid, GroupPolicy::STICK | GroupPolicy::RAISE, true);

        let mut buf = Vec::new();
        reg.save_to_stream(&mut buf).unwrap();

        let mut reloaded = GroupRegistry::new();
        reloaded.load_from_stream(buf.as_slice()).unwrap();
        let g = reloaded.get(GroupId(42)).unwrap();
        assert!(g.policy.contains(GroupPolicy::STICK));
        assert!(g.policy.contains(GroupPolicy::RAISE));
        assert!(!g.policy.contains(GroupPolicy::KILL));
        assert!(g.save);
    }

    #[test]
    fn lazily_created_group_ids_survive_create_without_id() {
        let clock = Clock::new();
        let mut reg = GroupRegistry::new();
        let explicit = GroupId(7);
        reg.add(win_ids(1)[0], explicit, &clock);
        assert!(reg.get(explicit).is_some());
        let _ = Duration::from_millis(0);
    }
}
