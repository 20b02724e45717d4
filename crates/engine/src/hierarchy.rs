use std::collections::HashMap;

use vistaar_core::{ids::AreaId, level::AreaLevel};
use vistaar_storage::AreaRow;

use crate::error::EngineError;

#[derive(Debug)]
struct Node {
    id: AreaId,
    level: AreaLevel,
    parent: Option<usize>,
}

/// Immutable index over the active area tree. Built once from the
/// store, validated eagerly, and swapped wholesale on area mutation;
/// readers hold their snapshot for the duration of a resolution.
#[derive(Debug)]
pub struct HierarchyIndex {
    nodes: Vec<Node>,
    by_id: HashMap<AreaId, usize>,
}

impl HierarchyIndex {
    /// Build from active area rows, rejecting malformed trees. A
    /// malformed chain would make resolution silently wrong, so every
    /// defect here is fatal (`InvalidHierarchy`):
    /// duplicate ids, dangling parents, NATION rows with a parent,
    /// canonical rows whose parent is not the next-more-general level,
    /// and parent cycles.
    pub fn build(rows: &[AreaRow]) -> Result<Self, EngineError> {
        let mut by_id = HashMap::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            if by_id.insert(row.id, idx).is_some() {
                return Err(EngineError::InvalidHierarchy(format!(
                    "duplicate area id {}",
                    row.id
                )));
            }
        }

        let mut nodes = Vec::with_capacity(rows.len());
        for row in rows {
            let parent = match row.parent_id {
                Some(parent_id) => {
                    let Some(&parent_idx) = by_id.get(&parent_id) else {
                        return Err(EngineError::InvalidHierarchy(format!(
                            "area {} references missing or inactive parent {parent_id}",
                            row.id
                        )));
                    };
                    let parent_row = &rows[parent_idx];
                    check_parent_level(row, parent_row)?;
                    Some(parent_idx)
                }
                None => {
                    if row.level.is_canonical() && row.level != AreaLevel::Nation {
                        return Err(EngineError::InvalidHierarchy(format!(
                            "{} area {} has no parent",
                            row.level, row.id
                        )));
                    }
                    None
                }
            };
            nodes.push(Node {
                id: row.id,
                level: row.level.clone(),
                parent,
            });
        }

        let index = Self { nodes, by_id };
        index.check_acyclic()?;
        Ok(index)
    }

    fn check_acyclic(&self) -> Result<(), EngineError> {
        for start in 0..self.nodes.len() {
            let mut steps = 0usize;
            let mut cursor = Some(start);
            while let Some(idx) = cursor {
                steps += 1;
                if steps > self.nodes.len() {
                    return Err(EngineError::InvalidHierarchy(format!(
                        "parent cycle through area {}",
                        self.nodes[start].id
                    )));
                }
                cursor = self.nodes[idx].parent;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Area ids from the target itself up to its nation, most specific
    /// first. Unknown (or inactive, since only active rows are indexed)
    /// areas fail with `NotFound`.
    pub fn ancestor_chain(&self, area_id: AreaId) -> Result<Vec<AreaId>, EngineError> {
        let Some(&start) = self.by_id.get(&area_id) else {
            return Err(EngineError::NotFound(format!(
                "area {area_id} unknown or inactive"
            )));
        };
        let mut chain = Vec::with_capacity(4);
        let mut cursor = Some(start);
        while let Some(idx) = cursor {
            chain.push(self.nodes[idx].id);
            cursor = self.nodes[idx].parent;
        }
        Ok(chain)
    }
}

fn check_parent_level(row: &AreaRow, parent: &AreaRow) -> Result<(), EngineError> {
    let ok = match &row.level {
        AreaLevel::Nation => false,
        // Canonical levels chain strictly: AREA -> REGION -> ZONE -> NATION.
        level if level.is_canonical() => parent.level.rank() + 1 == level.rank(),
        // Legacy levels (e.g. DIVISION) may hang off any canonical node.
        _ => parent.level.is_canonical(),
    };
    if ok {
        Ok(())
    } else {
        Err(EngineError::InvalidHierarchy(format!(
            "area {} ({}) has parent {} ({})",
            row.id, row.level, parent.id, parent.level
        )))
    }
}
