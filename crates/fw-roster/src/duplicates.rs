//! Candidate duplicate detection.
//!
//! Two records match when they share a non-empty email (case-insensitive) or
//! a full name (case-insensitive, trimmed). Matches are closed transitively:
//! if A shares an email with B and B shares a name with C, all three end up in
//! one group.

use std::collections::HashMap;

use serde::Serialize;

use crate::member::Member;

/// Records suspected to describe the same person, in snapshot order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DuplicateGroup {
    members: Vec<Member>,
}

#[allow(clippy::len_without_is_empty)]
impl DuplicateGroup {
    /// A group needs at least two records; fewer yield `None`.
    #[must_use]
    pub fn new(members: Vec<Member>) -> Option<Self> {
        (members.len() >= 2).then_some(Self { members })
    }

    /// Conventional merge target: the first record in snapshot order.
    #[must_use]
    pub fn primary(&self) -> &Member {
        &self.members[0]
    }

    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn into_members(self) -> Vec<Member> {
        self.members
    }
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Union keeping the smaller index as root so roots follow snapshot order.
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

fn email_key(member: &Member) -> Option<String> {
    member
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_lowercase)
}

fn name_key(member: &Member) -> Option<String> {
    let name = member.full_name.trim();
    (!name.is_empty()).then(|| name.to_lowercase())
}

/// Group members that share an email or a normalized full name.
///
/// Only groups with at least two members are returned. Groups appear in the
/// order of their first member in `members`, and members keep their input
/// order inside each group.
#[must_use]
pub fn find_duplicate_groups(members: &[Member]) -> Vec<DuplicateGroup> {
    let mut set = DisjointSet::new(members.len());
    let mut first_by_email: HashMap<String, usize> = HashMap::new();
    let mut first_by_name: HashMap<String, usize> = HashMap::new();

    for (idx, member) in members.iter().enumerate() {
        if let Some(key) = email_key(member) {
            let first = *first_by_email.entry(key).or_insert(idx);
            set.union(first, idx);
        }
        if let Some(key) = name_key(member) {
            let first = *first_by_name.entry(key).or_insert(idx);
            set.union(first, idx);
        }
    }

    let mut slots: HashMap<usize, usize> = HashMap::new();
    let mut grouped: Vec<Vec<Member>> = Vec::new();
    for (idx, member) in members.iter().enumerate() {
        let root = set.find(idx);
        let slot = *slots.entry(root).or_insert_with(|| {
            grouped.push(Vec::new());
            grouped.len() - 1
        });
        grouped[slot].push(member.clone());
    }

    grouped
        .into_iter()
        .filter_map(DuplicateGroup::new)
        .collect()
}
