use crate::entry::{EntryId, TranscriptEntry};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

/// Aggregate statistics over a parsed session, as returned by
/// `Session::aggregate_statistics` (§4.1).
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub entry_count: usize,
    pub message_count: usize,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub models_used: BTreeSet<String>,
    pub branch_point_count: usize,
    pub max_depth: usize,
}

/// The collection of entries loaded from a single transcript file,
/// plus the derived structures the parser builds once per file (§4.1):
/// a parent → children index, and the unique leaf.
#[derive(Debug, Clone)]
pub struct Session {
    pub file: PathBuf,
    pub header_computer: Option<String>,
    entries: HashMap<EntryId, TranscriptEntry>,
    children: HashMap<Option<EntryId>, Vec<EntryId>>,
    roots: Vec<EntryId>,
    leaf: Option<EntryId>,
}

impl Session {
    /// Build a session from its entries (header excluded) and their
    /// derived parent → children index. `roots` are entries with no
    /// parent (tree roots); `leaf` is precomputed by the caller per the
    /// §3 tie-break rule (greatest timestamp, then lexicographic id).
    pub fn new(
        file: PathBuf,
        header_computer: Option<String>,
        entries: Vec<TranscriptEntry>,
    ) -> Self {
        let mut children: HashMap<Option<EntryId>, Vec<EntryId>> = HashMap::new();
        let mut roots = Vec::new();
        let mut by_id = HashMap::new();

        for entry in entries {
            if entry.parent_id.is_none() {
                roots.push(entry.id.clone());
            }
            children
                .entry(entry.parent_id.clone())
                .or_default()
                .push(entry.id.clone());
            by_id.insert(entry.id.clone(), entry);
        }

        for child_list in children.values_mut() {
            child_list.sort_by(|a, b| {
                let ea = &by_id[a];
                let eb = &by_id[b];
                ea.timestamp.cmp(&eb.timestamp).then_with(|| a.cmp(b))
            });
        }
        roots.sort();

        let leaf = compute_leaf(&by_id, &children);

        Self {
            file,
            header_computer,
            entries: by_id,
            children,
            roots,
            leaf,
        }
    }

    pub fn entry(&self, id: &EntryId) -> Option<&TranscriptEntry> {
        self.entries.get(id)
    }

    pub fn children_of(&self, id: Option<&EntryId>) -> &[EntryId] {
        self.children
            .get(&id.cloned())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn roots(&self) -> &[EntryId] {
        &self.roots
    }

    /// The unique entry with no children and the greatest timestamp
    /// among childless entries, ties broken by lexicographic id (§3).
    pub fn leaf(&self) -> Option<&EntryId> {
        self.leaf.as_ref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The ancestor path from the tree root to `id`, root first.
    pub fn ancestor_path(&self, id: &EntryId) -> Vec<EntryId> {
        let mut path = Vec::new();
        let mut current = Some(id.clone());
        while let Some(cur) = current {
            let Some(entry) = self.entries.get(&cur) else {
                break;
            };
            path.push(cur.clone());
            current = entry.parent_id.clone();
        }
        path.reverse();
        path
    }

    /// A short preview of a message entry's text, truncated to
    /// `max_chars` on a char boundary.
    pub fn text_preview(&self, id: &EntryId, max_chars: usize) -> Option<String> {
        let entry = self.entries.get(id)?;
        let text = entry.fields.text.as_ref()?;
        if text.chars().count() <= max_chars {
            Some(text.clone())
        } else {
            Some(text.chars().take(max_chars).collect::<String>() + "…")
        }
    }

    pub fn aggregate_statistics(&self) -> SessionStats {
        let mut stats = SessionStats {
            entry_count: self.entries.len(),
            ..Default::default()
        };

        for entry in self.entries.values() {
            if matches!(entry.kind, crate::entry::EntryKind::Message) {
                stats.message_count += 1;
            }
            if let Some(tokens) = entry.fields.tokens {
                stats.total_tokens += tokens;
            }
            if let Some(cost) = entry.fields.cost_usd {
                stats.total_cost_usd += cost;
            }
            if let Some(model) = &entry.fields.model {
                stats.models_used.insert(model.clone());
            }
        }

        stats.branch_point_count = self
            .children
            .values()
            .filter(|children| children.len() > 1)
            .count();

        stats.max_depth = self
            .roots
            .iter()
            .map(|root| self.depth_from(root))
            .max()
            .unwrap_or(0);

        stats
    }

    fn depth_from(&self, id: &EntryId) -> usize {
        let kids = self.children_of(Some(id));
        if kids.is_empty() {
            1
        } else {
            1 + kids.iter().map(|c| self.depth_from(c)).max().unwrap_or(0)
        }
    }
}

fn compute_leaf(
    by_id: &HashMap<EntryId, TranscriptEntry>,
    children: &HashMap<Option<EntryId>, Vec<EntryId>>,
) -> Option<EntryId> {
    by_id
        .keys()
        .filter(|id| {
            children
                .get(&Some((*id).clone()))
                .map(|c| c.is_empty())
                .unwrap_or(true)
        })
        .max_by(|a, b| {
            let ea = &by_id[*a];
            let eb = &by_id[*b];
            ea.timestamp.cmp(&eb.timestamp).then_with(|| (*a).cmp(*b))
        })
        .cloned()
}
