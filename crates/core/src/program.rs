// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Program State
//!
//! A [`Program`] is the explicit value threaded through every runtime
//! operation: the node pools, the descriptor tables, and the VM stack.
//! There are no hidden singletons; two programs share nothing, and
//! handles from one program are meaningless in another.
//!
//! The runtime is single-threaded by design. Reference counts are plain
//! integers and nothing here locks.

use crate::error::RuntimeError;
use crate::head::{Head, Location};
use crate::pool::Pool;
use crate::runtime::RuntimeData;
use crate::tree::{HeadId, Kid, KidId, Tree, TreeId};

/// The per-program slab pools.
#[derive(Debug, Default)]
pub struct Pools {
    pub trees: Pool<Tree>,
    pub kids: Pool<Kid>,
    pub heads: Pool<Head>,
}

impl Pools {
    /// Total live nodes across all pools. Zero after every owned tree has
    /// been downrefed away.
    #[must_use]
    pub fn live(&self) -> usize {
        self.trees.live() + self.kids.live() + self.heads.live()
    }
}

/// The VM stack.
///
/// The bytecode interpreter owns frames on it; the tree layer borrows it
/// as the explicit work stack for freeing arbitrarily deep trees. Trees
/// may be megabytes deep, so native recursion is never an option on the
/// free path.
#[derive(Debug, Default)]
pub struct VmStack {
    slots: Vec<Option<TreeId>>,
}

impl VmStack {
    #[must_use]
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn push_tree(&mut self, tree: Option<TreeId>) {
        self.slots.push(tree);
    }

    pub fn pop_tree(&mut self) -> Option<TreeId> {
        self.slots.pop().expect("pop of empty VM stack")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// All state owned by one runtime instance.
#[derive(Debug)]
pub struct Program {
    pub rtd: RuntimeData,
    pub pools: Pools,
    pub(crate) stack: VmStack,
}

impl Program {
    /// Validate the tables and stand up an empty program around them.
    pub fn new(mut rtd: RuntimeData) -> Result<Self, RuntimeError> {
        rtd.validate()?;
        rtd.build_index();
        Ok(Self {
            rtd,
            pools: Pools::default(),
            stack: VmStack::new(),
        })
    }

    // -- node access ------------------------------------------------------

    #[must_use]
    pub fn tree(&self, id: TreeId) -> &Tree {
        self.pools.trees.get(id.0)
    }

    pub fn tree_mut(&mut self, id: TreeId) -> &mut Tree {
        self.pools.trees.get_mut(id.0)
    }

    #[must_use]
    pub fn kid(&self, id: KidId) -> &Kid {
        self.pools.kids.get(id.0)
    }

    pub fn kid_mut(&mut self, id: KidId) -> &mut Kid {
        self.pools.kids.get_mut(id.0)
    }

    #[must_use]
    pub fn head(&self, id: HeadId) -> &Head {
        self.pools.heads.get(id.0)
    }

    // -- allocation -------------------------------------------------------

    /// A zeroed tree node, `refs = 0`. Construction paths set the fields
    /// and hand ownership to a kid or to the caller.
    pub fn tree_alloc(&mut self) -> TreeId {
        TreeId(self.pools.trees.alloc(Tree::default()))
    }

    pub fn kid_alloc(&mut self) -> KidId {
        KidId(self.pools.kids.alloc(Kid::default()))
    }

    pub(crate) fn tree_release(&mut self, id: TreeId) {
        self.pools.trees.free(id.0);
    }

    pub fn kid_release(&mut self, id: KidId) {
        self.pools.kids.free(id.0);
    }

    // -- head strings -----------------------------------------------------

    pub fn string_alloc(&mut self, data: &[u8]) -> HeadId {
        HeadId(self.pools.heads.alloc(Head::new(data)))
    }

    pub fn string_alloc_at(&mut self, data: &[u8], location: Location) -> HeadId {
        HeadId(self.pools.heads.alloc(Head::with_location(data, location)))
    }

    /// Deep-copy a head, location included.
    pub fn string_copy(&mut self, head: Option<HeadId>) -> Option<HeadId> {
        head.map(|h| {
            let copy = self.head(h).clone();
            HeadId(self.pools.heads.alloc(copy))
        })
    }

    pub(crate) fn string_release(&mut self, id: HeadId) {
        self.pools.heads.free(id.0);
    }

    /// Token text of a tree, empty when it has none.
    #[must_use]
    pub fn tokdata_bytes(&self, tree: TreeId) -> &[u8] {
        match self.tree(tree).tokdata {
            Some(h) => &self.head(h).data,
            None => &[],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::runtime::RuntimeData;

    #[test]
    fn test_program_isolation() {
        let rtd = RuntimeData::builder().finish().expect("valid");
        let mut prg = Program::new(rtd).expect("valid");
        let t = prg.tree_alloc();
        assert_eq!(prg.tree(t).refs, 0);
        assert_eq!(prg.pools.live(), 1);

        let rtd2 = RuntimeData::builder().finish().expect("valid");
        let prg2 = Program::new(rtd2).expect("valid");
        assert_eq!(prg2.pools.live(), 0);
    }

    #[test]
    fn test_string_copy_is_deep() {
        let rtd = RuntimeData::builder().finish().expect("valid");
        let mut prg = Program::new(rtd).expect("valid");
        let h = prg.string_alloc(b"token");
        let c = prg.string_copy(Some(h)).expect("copied");
        assert_ne!(h, c);
        assert_eq!(&*prg.head(c).data, b"token");
        assert_eq!(prg.pools.heads.live(), 2);
    }
}
