//! # Symmetric link graph between gates.
//!
//! Every gate stores its partners; an edge A–B is stored in both A's and B's
//! partner lists. [`link`] and [`unlink`] change both sides while holding both
//! partner locks, always acquired in ascending gate-id order, so no thread can
//! observe a half-linked pair and two concurrent operations cannot deadlock.
//!
//! Partners are held as `Weak` references: the graph never keeps a gate
//! alive, and a dropped gate removes itself from its partners (see
//! `GateInner::drop`).
//!
//! ```text
//! link(A, B), A.id < B.id
//!   lock A.partners (write) ─► lock B.partners (write)
//!     ├─ already linked? ─► return false
//!     └─ push B into A, push A into B ─► return true
//! ```

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use super::handle::GateInner;

/// One side of an edge.
pub(crate) struct Partner {
    pub(crate) id: u64,
    pub(crate) gate: Weak<GateInner>,
}

/// Partner list of one gate.
#[derive(Default)]
pub(crate) struct Links {
    partners: RwLock<Vec<Partner>>,
}

impl Links {
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Vec<Partner>> {
        self.partners.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Vec<Partner>> {
        self.partners.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live partners at this instant.
    pub(crate) fn snapshot(&self) -> Vec<Arc<GateInner>> {
        self.read().iter().filter_map(|p| p.gate.upgrade()).collect()
    }

    pub(crate) fn contains(&self, id: u64) -> bool {
        self.read().iter().any(|p| p.id == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.read().len()
    }

    pub(crate) fn get_mut(&mut self) -> &mut Vec<Partner> {
        self.partners.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Write-locks the partner lists of `a` and `b` in id order; returns them as `(a, b)`.
fn lock_pair<'g>(
    a: &'g GateInner,
    b: &'g GateInner,
) -> (
    RwLockWriteGuard<'g, Vec<Partner>>,
    RwLockWriteGuard<'g, Vec<Partner>>,
) {
    if a.id < b.id {
        let ga = a.links.write();
        let gb = b.links.write();
        (ga, gb)
    } else {
        let gb = b.links.write();
        let ga = a.links.write();
        (ga, gb)
    }
}

/// Adds the edge `a`–`b`. Returns `false` if it already existed.
///
/// Callers must reject `a == b` beforehand.
pub(crate) fn link(a: &Arc<GateInner>, b: &Arc<GateInner>) -> bool {
    debug_assert_ne!(a.id, b.id, "self links are rejected by EventGate::link");
    let (mut pa, mut pb) = lock_pair(a, b);

    let a_has_b = pa.iter().any(|p| p.id == b.id);
    debug_assert_eq!(a_has_b, pb.iter().any(|p| p.id == a.id), "asymmetric link");
    if a_has_b {
        return false;
    }

    pa.push(Partner {
        id: b.id,
        gate: Arc::downgrade(b),
    });
    pb.push(Partner {
        id: a.id,
        gate: Arc::downgrade(a),
    });
    true
}

/// Removes the edge `a`–`b`. Returns `false` if it did not exist.
pub(crate) fn unlink(a: &GateInner, b: &GateInner) -> bool {
    let (mut pa, mut pb) = lock_pair(a, b);

    let before = pa.len();
    pa.retain(|p| p.id != b.id);
    pb.retain(|p| p.id != a.id);
    pa.len() != before
}

/// Removes every edge incident to `a`. Returns the number of edges removed.
///
/// Edges added concurrently while this runs are removed as well.
pub(crate) fn unlink_all(a: &GateInner) -> usize {
    let mut removed = 0;
    loop {
        let live = {
            let mut partners = a.links.write();
            partners.retain(|p| p.gate.strong_count() > 0);
            partners
                .iter()
                .filter_map(|p| p.gate.upgrade())
                .collect::<Vec<_>>()
        };
        if live.is_empty() {
            return removed;
        }
        for partner in &live {
            if unlink(a, partner) {
                removed += 1;
            }
        }
    }
}

/// Detaches a gate that is being dropped from all of its partners.
pub(crate) fn detach(id: u64, partners: &mut Vec<Partner>) {
    for p in partners.drain(..) {
        if let Some(other) = p.gate.upgrade() {
            other.links.write().retain(|q| q.id != id);
        }
    }
}
