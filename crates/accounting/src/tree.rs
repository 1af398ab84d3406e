//! Chart of accounts: a hierarchy of ledger accounts for rollups and
//! classification.
//!
//! Nodes live in an arena owned by the tree and refer to each other by
//! [`NodeId`]. A node refers to its account by tag; amounts are always read
//! through the [`Ledger`].

use std::collections::BTreeMap;

use bookkeep_core::{Currency, DomainError, DomainResult, Entity, SortedCollection};

use crate::account::{Account, AccountRecord, AccountView};
use crate::ledger::Ledger;
use crate::marker::MarkerSet;
use crate::tag::AccountTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ChildLink {
    tag: AccountTag,
    node: NodeId,
}

impl Entity for ChildLink {
    type Key = AccountTag;

    fn key(&self) -> &AccountTag {
        &self.tag
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    account: Option<AccountTag>,
    parent: Option<NodeId>,
    children: SortedCollection<ChildLink>,
    markers: MarkerSet,
}

impl Node {
    /// `None` only for the root.
    pub fn account(&self) -> Option<&AccountTag> {
        self.account.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn label(&self) -> String {
        match &self.account {
            Some(tag) => tag.to_string(),
            None => "<root>".to_string(),
        }
    }
}

/// Selection for [`AccountTree::find`]. Unset criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct NodeQuery {
    pub tag_contains: Option<String>,
    pub name_contains: Option<String>,
    /// Every one of these must be present on the node.
    pub markers: MarkerSet,
    /// Whether the node's own account has posted records.
    pub used: Option<bool>,
    pub leaf: Option<bool>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AccountTree {
    nodes: Vec<Option<Node>>,
    by_tag: BTreeMap<AccountTag, NodeId>,
    root: NodeId,
}

impl Default for AccountTree {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node {
                account: None,
                parent: None,
                children: SortedCollection::new(),
                markers: MarkerSet::new(),
            })],
            by_tag: BTreeMap::new(),
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of account nodes (the root is not counted).
    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    pub fn node(&self, id: NodeId) -> DomainResult<&Node> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(DomainError::UnknownNode(id.0))
    }

    fn node_mut(&mut self, id: NodeId) -> DomainResult<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(DomainError::UnknownNode(id.0))
    }

    pub fn node_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.by_tag.get(&AccountTag::from(tag)).copied()
    }

    pub fn parent(&self, id: NodeId) -> DomainResult<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    /// Direct children in tag order.
    pub fn children(&self, id: NodeId) -> DomainResult<impl Iterator<Item = NodeId> + '_> {
        Ok(self.node(id)?.children.iter().map(|link| link.node))
    }

    /// `id` followed by all its descendants, pre-order, children in tag order.
    pub fn subtree(&self, id: NodeId) -> DomainResult<Subtree<'_>> {
        self.node(id)?;
        Ok(Subtree {
            tree: self,
            stack: vec![id],
        })
    }

    pub fn descendants(&self, id: NodeId) -> DomainResult<impl Iterator<Item = NodeId> + '_> {
        Ok(self.subtree(id)?.skip(1))
    }

    /// True when `ancestor` lies strictly above `id`.
    pub fn is_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.node(id).ok().and_then(Node::parent);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.node(node).ok().and_then(Node::parent);
        }
        false
    }

    /// Nodes from the root down to `id`, both included.
    pub fn path(&self, id: NodeId) -> DomainResult<Vec<NodeId>> {
        let mut path = vec![id];
        let mut current = self.node(id)?.parent;
        while let Some(node) = current {
            path.push(node);
            current = self.node(node)?.parent;
        }
        path.reverse();
        Ok(path)
    }

    /// Account tags from the top level down to `id`.
    pub fn account_path(&self, id: NodeId) -> DomainResult<Vec<AccountTag>> {
        let mut tags = Vec::new();
        for node in self.path(id)? {
            if let Some(tag) = &self.node(node)?.account {
                tags.push(tag.clone());
            }
        }
        Ok(tags)
    }

    // -- mutation ----------------------------------------------------------

    /// Adds `account` under `parent`, inheriting the parent's markers.
    pub fn append_child(&mut self, parent: NodeId, account: &Account) -> DomainResult<NodeId> {
        let markers = self.node(parent)?.markers.clone();
        let tag = account.tag().clone();
        if self.by_tag.contains_key(&tag) {
            return Err(DomainError::DuplicateTag {
                tag: tag.to_string(),
            });
        }

        let id = NodeId(self.nodes.len());
        self.node_mut(parent)?
            .children
            .try_insert(ChildLink {
                tag: tag.clone(),
                node: id,
            })
            .map_err(|link| DomainError::DuplicateTag {
                tag: link.tag.to_string(),
            })?;
        self.nodes.push(Some(Node {
            account: Some(tag.clone()),
            parent: Some(parent),
            children: SortedCollection::new(),
            markers,
        }));
        self.by_tag.insert(tag.clone(), id);
        tracing::debug!(account = %tag, "tree node appended");
        Ok(id)
    }

    /// Re-parents `id` (with its subtree) under `new_parent`.
    pub fn move_node(&mut self, id: NodeId, new_parent: NodeId) -> DomainResult<()> {
        let node = self.node(id)?;
        let old_parent = node.parent.ok_or(DomainError::RootProtected)?;
        let label = node.label();
        let tag = node.account.clone().ok_or(DomainError::RootProtected)?;
        let parent_label = self.node(new_parent)?.label();

        if id == new_parent || self.is_descendant(new_parent, id) {
            return Err(DomainError::CycleError {
                node: label,
                parent: parent_label,
            });
        }
        if old_parent == new_parent {
            return Ok(());
        }

        let link = self
            .node_mut(old_parent)?
            .children
            .remove(&tag)
            .ok_or(DomainError::UnknownNode(id.0))?;
        if let Err(link) = self.node_mut(new_parent)?.children.try_insert(link) {
            // tags are unique tree-wide, so this only restores the old link
            self.node_mut(old_parent)?.children.try_insert(link).ok();
            return Err(DomainError::DuplicateTag { tag: label });
        }
        self.node_mut(id)?.parent = Some(new_parent);
        tracing::debug!(account = %tag, "tree node moved");
        Ok(())
    }

    /// Removes `id` and its subtree; returns the tags removed.
    ///
    /// Refused while any account in the subtree has posted records.
    pub fn delete_node(&mut self, id: NodeId, ledger: &Ledger) -> DomainResult<Vec<AccountTag>> {
        let node = self.node(id)?;
        let parent = node.parent.ok_or(DomainError::RootProtected)?;
        let label = node.label();
        if self.has_posted_records(id, ledger)? {
            return Err(DomainError::not_empty(format!("subtree of '{label}'")));
        }

        let doomed: Vec<NodeId> = self.subtree(id)?.collect();
        if let Some(tag) = self.node(id)?.account.clone() {
            self.node_mut(parent)?.children.remove(&tag);
        }
        let mut removed = Vec::with_capacity(doomed.len());
        for node in doomed {
            if let Some(tag) = self.nodes[node.0].take().and_then(|n| n.account) {
                self.by_tag.remove(&tag);
                removed.push(tag);
            }
        }
        tracing::debug!(node = %label, removed = removed.len(), "tree subtree deleted");
        Ok(removed)
    }

    pub fn add_markers(&mut self, id: NodeId, markers: &MarkerSet) -> DomainResult<()> {
        let node = self.node_mut(id)?;
        node.markers = &node.markers | markers;
        Ok(())
    }

    pub fn remove_markers(&mut self, id: NodeId, markers: &MarkerSet) -> DomainResult<()> {
        let node = self.node_mut(id)?;
        node.markers = &node.markers - markers;
        Ok(())
    }

    /// Applies `add` then `remove` to every node of the subtree at `id`.
    pub fn retag_subtree(&mut self, id: NodeId, add: &MarkerSet, remove: &MarkerSet) -> DomainResult<()> {
        let nodes: Vec<NodeId> = self.subtree(id)?.collect();
        for node in nodes {
            self.add_markers(node, add)?;
            self.remove_markers(node, remove)?;
        }
        Ok(())
    }

    // -- ledger-backed reads -----------------------------------------------

    fn views<'a>(&'a self, id: NodeId, ledger: &'a Ledger) -> DomainResult<impl Iterator<Item = AccountView<'a>> + 'a> {
        Ok(self.subtree(id)?.filter_map(move |node| {
            let tag = self.node(node).ok()?.account.as_ref()?;
            ledger.account(tag.as_str())
        }))
    }

    pub fn debit_sum(&self, id: NodeId, ledger: &Ledger) -> DomainResult<i64> {
        self.debit_sum_where(id, ledger, |_| true)
    }

    pub fn credit_sum(&self, id: NodeId, ledger: &Ledger) -> DomainResult<i64> {
        self.credit_sum_where(id, ledger, |_| true)
    }

    pub fn balance_sum(&self, id: NodeId, ledger: &Ledger) -> DomainResult<i64> {
        self.balance_sum_where(id, ledger, |_| true)
    }

    pub fn debit_sum_where(
        &self,
        id: NodeId,
        ledger: &Ledger,
        pred: impl Fn(&AccountRecord) -> bool,
    ) -> DomainResult<i64> {
        Ok(self.views(id, ledger)?.map(|v| v.debit_where(&pred)).sum())
    }

    pub fn credit_sum_where(
        &self,
        id: NodeId,
        ledger: &Ledger,
        pred: impl Fn(&AccountRecord) -> bool,
    ) -> DomainResult<i64> {
        Ok(self.views(id, ledger)?.map(|v| v.credit_where(&pred)).sum())
    }

    pub fn balance_sum_where(
        &self,
        id: NodeId,
        ledger: &Ledger,
        pred: impl Fn(&AccountRecord) -> bool,
    ) -> DomainResult<i64> {
        Ok(self.views(id, ledger)?.map(|v| v.balance_where(&pred)).sum())
    }

    pub fn has_posted_records(&self, id: NodeId, ledger: &Ledger) -> DomainResult<bool> {
        Ok(self.views(id, ledger)?.any(|v| v.has_posted_records()))
    }

    /// Currencies used in the subtree at `id`, ordered by code.
    pub fn currencies(&self, id: NodeId, ledger: &Ledger) -> DomainResult<Vec<Currency>> {
        let mut by_code = BTreeMap::new();
        for view in self.views(id, ledger)? {
            let currency = view.currency();
            by_code
                .entry(currency.code().to_string())
                .or_insert_with(|| currency.clone());
        }
        Ok(by_code.into_values().collect())
    }

    /// Account nodes matching `query`, in pre-order.
    pub fn find(&self, query: &NodeQuery, ledger: &Ledger) -> Vec<NodeId> {
        let Ok(all) = self.descendants(self.root) else {
            return Vec::new();
        };
        all.filter(|&id| self.matches(id, query, ledger)).collect()
    }

    fn matches(&self, id: NodeId, query: &NodeQuery, ledger: &Ledger) -> bool {
        let Ok(node) = self.node(id) else {
            return false;
        };
        let Some(tag) = &node.account else {
            return false;
        };
        let view = ledger.account(tag.as_str());

        query
            .tag_contains
            .as_deref()
            .is_none_or(|s| tag.as_str().contains(s))
            && query
                .name_contains
                .as_deref()
                .is_none_or(|s| view.is_some_and(|v| v.name().contains(s)))
            && node.markers.contains_all(&query.markers)
            && query
                .used
                .is_none_or(|used| view.is_some_and(|v| v.has_posted_records()) == used)
            && query.leaf.is_none_or(|leaf| node.is_leaf() == leaf)
            && query
                .currency
                .as_deref()
                .is_none_or(|code| view.is_some_and(|v| v.currency().code() == code))
    }

    /// Indented listing of the subtree at `id` with balances.
    pub fn short_str(&self, id: NodeId, ledger: &Ledger) -> DomainResult<String> {
        // listing the root starts at its children
        let base = self.path(id)?.len() + usize::from(self.node(id)?.account.is_none());
        let mut lines = Vec::new();
        for node in self.subtree(id)? {
            let Some(tag) = &self.node(node)?.account else {
                continue;
            };
            let depth = self.path(node)?.len() - base;
            let line = match ledger.account(tag.as_str()) {
                Some(view) => {
                    let total = self.balance_sum(node, ledger)?;
                    format!(
                        "{}{:<8} {:<28} {:>14} {}",
                        "  ".repeat(depth),
                        tag,
                        view.name(),
                        view.currency().raw_to_amount(total),
                        view.currency().code()
                    )
                }
                None => format!("{}{:<8} (unregistered)", "  ".repeat(depth), tag),
            };
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }
}

/// Pre-order walk over a subtree.
#[derive(Debug)]
pub struct Subtree<'a> {
    tree: &'a AccountTree,
    stack: Vec<NodeId>,
}

impl Iterator for Subtree<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        if let Ok(node) = self.tree.node(id) {
            self.stack
                .extend(node.children.iter().rev().map(|link| link.node));
        }
        Some(id)
    }
}
