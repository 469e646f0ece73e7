use metaspace_common::EntityUuid;
use std::collections::{BTreeSet, HashMap};

/// A 2D cell coordinate in the world grid (ignoring Y axis for partitioning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord {
    pub x: i32,
    pub z: i32,
}

impl CellCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// Fixed-size grid over the positions of deferred entities.
///
/// Entities are assigned to cells by their XZ position divided by
/// `cell_size`, so a proximity query only has to look at the cells around the
/// observer instead of every deferred entity.
#[derive(Debug, Clone)]
pub struct GridPartition {
    cell_size: f32,
    cells: HashMap<CellCoord, BTreeSet<EntityUuid>>,
}

impl GridPartition {
    /// Create a new grid partition with the given cell size.
    pub fn new(cell_size: f32) -> Self {
        assert!(cell_size > 0.0, "cell_size must be positive");
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Convert a world position to a cell coordinate.
    pub fn position_to_cell(&self, pos: glam::Vec3) -> CellCoord {
        CellCoord {
            x: (pos.x / self.cell_size).floor() as i32,
            z: (pos.z / self.cell_size).floor() as i32,
        }
    }

    pub fn insert(&mut self, uuid: EntityUuid, pos: glam::Vec3) {
        let coord = self.position_to_cell(pos);
        self.cells.entry(coord).or_default().insert(uuid);
    }

    /// Remove `uuid` from the cell containing `pos`. Empty cells are dropped.
    pub fn remove(&mut self, uuid: &EntityUuid, pos: glam::Vec3) -> bool {
        let coord = self.position_to_cell(pos);
        let Some(cell) = self.cells.get_mut(&coord) else {
            return false;
        };
        let removed = cell.remove(uuid);
        if cell.is_empty() {
            self.cells.remove(&coord);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// All UUIDs within a square radius (in cells) of a center cell.
    ///
    /// When the square covers more cells than are occupied, the occupied
    /// cells are scanned instead, so the cost never exceeds the grid size.
    pub fn entities_in_radius(&self, center: CellCoord, radius: i32) -> BTreeSet<EntityUuid> {
        let radius = i64::from(radius.max(0));
        let side = 2 * radius + 1;
        let window = usize::try_from(side.saturating_mul(side)).unwrap_or(usize::MAX);

        let mut result = BTreeSet::new();
        if window > self.cells.len() {
            for (coord, entities) in &self.cells {
                let dx = (i64::from(coord.x) - i64::from(center.x)).abs();
                let dz = (i64::from(coord.z) - i64::from(center.z)).abs();
                if dx <= radius && dz <= radius {
                    result.extend(entities.iter().cloned());
                }
            }
            return result;
        }

        for dx in -radius..=radius {
            let Ok(x) = i32::try_from(i64::from(center.x) + dx) else {
                continue;
            };
            for dz in -radius..=radius {
                let Ok(z) = i32::try_from(i64::from(center.z) + dz) else {
                    continue;
                };
                if let Some(entities) = self.cells.get(&CellCoord::new(x, z)) {
                    result.extend(entities.iter().cloned());
                }
            }
        }
        result
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Total number of entity placements across all cells.
    pub fn total_placements(&self) -> usize {
        self.cells.values().map(|s| s.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn position_to_cell_basic() {
        let grid = GridPartition::new(16.0);
        let coord = grid.position_to_cell(Vec3::new(10.0, 0.0, 10.0));
        assert_eq!(coord, CellCoord::new(0, 0));

        let coord = grid.position_to_cell(Vec3::new(20.0, 0.0, -5.0));
        assert_eq!(coord, CellCoord::new(1, -1));
    }

    #[test]
    fn insert_and_query_radius() {
        let mut grid = GridPartition::new(16.0);
        grid.insert("a".into(), Vec3::ZERO);
        grid.insert("b".into(), Vec3::new(20.0, 0.0, 0.0));
        assert_eq!(grid.cell_count(), 2);
        assert_eq!(grid.total_placements(), 2);

        let nearby = grid.entities_in_radius(CellCoord::new(0, 0), 1);
        assert!(nearby.contains(&EntityUuid::from("a")));
        assert!(nearby.contains(&EntityUuid::from("b")));

        let far = grid.entities_in_radius(CellCoord::new(10, 10), 0);
        assert!(far.is_empty());
    }

    #[test]
    fn huge_radius_scans_occupied_cells() {
        let mut grid = GridPartition::new(16.0);
        grid.insert("a".into(), Vec3::ZERO);
        grid.insert("b".into(), Vec3::new(1.0e6, 0.0, 0.0));
        let found = grid.entities_in_radius(CellCoord::new(0, 0), i32::MAX);
        assert_eq!(found.len(), 2);

        let found = grid.entities_in_radius(CellCoord::new(0, 0), 100);
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec![EntityUuid::from("a")]);
    }

    #[test]
    fn query_at_grid_edge_does_not_overflow() {
        let mut grid = GridPartition::new(16.0);
        let far = Vec3::new(1.0e12, 0.0, -1.0e12);
        grid.insert("edge".into(), far);
        // enough occupied cells that the query walks the window
        for i in 0..12 {
            grid.insert(format!("near-{i}").into(), Vec3::new(i as f32 * 16.0, 0.0, 0.0));
        }
        let center = grid.position_to_cell(far);
        assert_eq!(center, CellCoord::new(i32::MAX, i32::MIN));

        let found = grid.entities_in_radius(center, 1);
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec![EntityUuid::from("edge")]);
        assert_eq!(grid.entities_in_radius(CellCoord::new(0, 0), 1).len(), 2);
    }

    #[test]
    fn remove_drops_empty_cells() {
        let mut grid = GridPartition::new(8.0);
        let pos = Vec3::new(3.0, 7.0, -2.0);
        grid.insert("a".into(), pos);
        assert!(grid.remove(&"a".into(), pos));
        assert!(!grid.remove(&"a".into(), pos));
        assert_eq!(grid.cell_count(), 0);
    }
}
