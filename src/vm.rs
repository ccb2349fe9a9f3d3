//! Local/global VM and `save`/`restore`.
//!
//! Grounded on `operators/vm.py`. Composites are never copied on normal
//! use; only `save` takes a snapshot, and only the outermost ("job-level")
//! save in a context deep-copies. Every other save is copy-on-write: it
//! just remembers which backing stores existed, and the *first* mutation
//! to a protected store clones its pre-mutation contents aside so
//! `restore` can put it back in place.

use std::collections::{HashMap, HashSet};

use crate::dict::Dict;
use crate::object::{CompositeRef, Value, VmOrigin};
use log::{debug, trace};

/// What lives behind a [`CompositeRef`]. `PackedArray` shares the same
/// shape as `Array` — the packed/unpacked distinction is an attribute of
/// the `Object` tag, not of the storage.
#[derive(Debug, Clone)]
pub enum Backing {
    String(Vec<u8>),
    Array(Vec<Value>),
    Dict(Dict),
}

impl Backing {
    #[must_use]
    pub fn as_string(&self) -> Option<&Vec<u8>> {
        match self {
            Backing::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Backing::Array(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Backing::Dict(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_string_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            Backing::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Backing::Array(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        match self {
            Backing::Dict(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmAllocMode {
    Local,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SaveId(pub u64);

#[derive(Debug, Clone, Copy)]
pub struct SaveRecord {
    pub id: SaveId,
    /// Timestamp clock value at the moment of this save; any local
    /// composite with a creation timestamp greater than this is invalid
    /// to reference across a `restore` of this save.
    pub created: u64,
    pub job_level: bool,
}

#[derive(Debug, Default)]
struct Snapshot {
    /// Local backing-store timestamps alive when this save happened.
    protected: HashSet<u64>,
    /// Pre-mutation contents, filled in lazily by `prepare_write`.
    cow_backups: HashMap<u64, Backing>,
    /// Only set for the job-level save.
    deep_copy: Option<(HashMap<u64, Backing>, HashMap<u64, Backing>)>,
}

/// Local + global VM for one context.
pub struct Vm {
    local: HashMap<u64, Backing>,
    global: HashMap<u64, Backing>,
    next_timestamp: u64,
    next_save_id: u64,
    /// Nesting stack of active saves, outermost first.
    active_saves: Vec<SaveRecord>,
    snapshots: HashMap<u64, Snapshot>,
    /// Union of all active non-job snapshots' protected sets — the fast
    /// "do I need to clone before writing?" check.
    protected: HashSet<u64>,
    pub alloc_mode: VmAllocMode,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            local: HashMap::new(),
            global: HashMap::new(),
            next_timestamp: 0,
            next_save_id: 0,
            active_saves: Vec::new(),
            snapshots: HashMap::new(),
            protected: HashSet::new(),
            alloc_mode: VmAllocMode::Local,
        }
    }

    fn arena(&self, origin: VmOrigin) -> &HashMap<u64, Backing> {
        match origin {
            VmOrigin::Local => &self.local,
            VmOrigin::Global => &self.global,
        }
    }

    fn arena_mut(&mut self, origin: VmOrigin) -> &mut HashMap<u64, Backing> {
        match origin {
            VmOrigin::Local => &mut self.local,
            VmOrigin::Global => &mut self.global,
        }
    }

    /// Allocate a new composite in `origin`'s address space and return a
    /// handle to it. `vm_alloc_mode` selects which space `new` composites
    /// land in (the caller decides `origin`, typically from
    /// `self.alloc_mode`).
    pub fn alloc(&mut self, origin: VmOrigin, backing: Backing) -> CompositeRef {
        let timestamp = self.next_timestamp;
        self.next_timestamp += 1;
        trace!("vm alloc ts={timestamp} origin={origin:?}");
        self.arena_mut(origin).insert(timestamp, backing);
        CompositeRef { timestamp, origin }
    }

    #[must_use]
    pub fn get(&self, r: CompositeRef) -> Option<&Backing> {
        self.arena(r.origin).get(&r.timestamp)
    }

    /// Obtain a mutable reference to `r`'s backing, cloning its
    /// pre-mutation contents aside for any active save that protects it
    /// first (copy-on-write).
    pub fn get_mut(&mut self, r: CompositeRef) -> Option<&mut Backing> {
        self.prepare_write(r);
        self.arena_mut(r.origin).get_mut(&r.timestamp)
    }

    /// Local-into-global write would dangle across a `restore`; callers
    /// check this before storing a reference into a composite.
    #[must_use]
    pub fn would_be_invalid_access(&self, container_origin: VmOrigin, value_origin: Option<VmOrigin>) -> bool {
        container_origin == VmOrigin::Global && value_origin == Some(VmOrigin::Local)
    }

    fn prepare_write(&mut self, r: CompositeRef) {
        if r.origin != VmOrigin::Local || !self.protected.contains(&r.timestamp) {
            return;
        }
        let Some(current) = self.local.get(&r.timestamp).cloned() else { return };
        for save in &self.active_saves {
            if save.job_level {
                continue;
            }
            let snap = self.snapshots.get_mut(&save.id.0).expect("active save has a snapshot");
            if snap.protected.contains(&r.timestamp) {
                snap.cow_backups.entry(r.timestamp).or_insert_with(|| current.clone());
            }
        }
    }

    /// `save`. `job_level` is true only for the outermost save in this
    /// context (see GLOSSARY "Job-level save").
    pub fn save(&mut self, job_level: bool) -> SaveId {
        let id = SaveId(self.next_save_id);
        self.next_save_id += 1;
        let created = self.next_timestamp;

        let snapshot = if job_level {
            debug!("job-level save id={} (deep copy)", id.0);
            Snapshot { deep_copy: Some((self.local.clone(), self.global.clone())), ..Snapshot::default() }
        } else {
            let protected: HashSet<u64> = self.local.keys().copied().collect();
            trace!("cow save id={} protecting {} stores", id.0, protected.len());
            self.protected.extend(protected.iter().copied());
            Snapshot { protected, ..Snapshot::default() }
        };

        self.snapshots.insert(id.0, snapshot);
        self.active_saves.push(SaveRecord { id, created, job_level });
        id
    }

    #[must_use]
    pub fn is_active(&self, id: SaveId) -> bool {
        self.active_saves.iter().any(|s| s.id == id)
    }

    #[must_use]
    pub fn save_record(&self, id: SaveId) -> Option<SaveRecord> {
        self.active_saves.iter().copied().find(|s| s.id == id)
    }

    /// Revert local (and, for job-level saves, global) backing stores to
    /// their snapshot contents in place, invalidate this save and every
    /// later one. Returns the invalidated save's `created` timestamp so
    /// the caller (the evaluator) can finish the invalid-restore scan and
    /// pop graphics state / loop records down to the matching `gsave`.
    pub fn restore(&mut self, id: SaveId) -> Option<u64> {
        let pos = self.active_saves.iter().position(|s| s.id == id)?;
        let record = self.active_saves[pos];

        // Drop every save nested inside this one first (invalidated).
        for later in self.active_saves.split_off(pos + 1) {
            self.snapshots.remove(&later.id.0);
        }
        let snapshot = self.snapshots.remove(&id.0).expect("active save has a snapshot");

        if let Some((local, global)) = snapshot.deep_copy {
            debug!("job-level restore id={}", id.0);
            self.local = local;
            self.global = global;
        } else {
            for (ts, backing) in snapshot.cow_backups {
                if let Some(slot) = self.local.get_mut(&ts) {
                    *slot = backing;
                }
            }
            self.local.retain(|ts, _| *ts <= record.created);
        }

        self.active_saves.pop();
        self.protected = self
            .snapshots
            .values()
            .flat_map(|s| s.protected.iter().copied())
            .collect();

        Some(record.created)
    }

    /// `vmstatus`: save nesting depth, and rough used/max byte counts.
    #[must_use]
    pub fn status(&self) -> (usize, usize, usize) {
        let used = self.local.len() + self.global.len();
        (self.active_saves.len(), used, usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_ref(vm: &mut Vm, bytes: &[u8]) -> CompositeRef {
        vm.alloc(VmOrigin::Local, Backing::String(bytes.to_vec()))
    }

    #[test]
    fn cow_save_then_mutate_then_restore_reverts() {
        let mut vm = Vm::new();
        let r = local_ref(&mut vm, b"abc");
        let save = vm.save(false);
        if let Backing::String(s) = vm.get_mut(r).unwrap() {
            s[0] = b'X';
        }
        assert_eq!(vm.get(r).unwrap().as_string().unwrap(), b"Xbc");
        vm.restore(save);
        assert_eq!(vm.get(r).unwrap().as_string().unwrap(), b"abc");
    }

    #[test]
    fn objects_created_after_save_vanish_on_restore() {
        let mut vm = Vm::new();
        let save = vm.save(false);
        let r = local_ref(&mut vm, b"new");
        assert!(vm.get(r).is_some());
        vm.restore(save);
        assert!(vm.get(r).is_none());
    }

    #[test]
    fn restoring_invalidates_later_saves() {
        let mut vm = Vm::new();
        let outer = vm.save(false);
        let inner = vm.save(false);
        assert!(vm.is_active(inner));
        vm.restore(outer);
        assert!(!vm.is_active(inner));
        assert!(!vm.is_active(outer));
    }

    #[test]
    fn save_ids_strictly_increase() {
        let mut vm = Vm::new();
        let a = vm.save(false);
        let b = vm.save(false);
        assert!(b.0 > a.0);
    }
}
