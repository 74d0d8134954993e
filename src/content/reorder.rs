//! Reorder planning for page sections.
//!
//! Computing the swap as a pure function over `(id, order_index)` pairs keeps
//! the boundary and inverse properties testable without a database; the route
//! layer applies the resulting writes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// One `order_index` write to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexWrite {
    pub id: Uuid,
    pub order_index: i32,
}

/// Plan the swap of `section_id` with its neighbor in the given direction.
///
/// `ordered` must already be in presentation order. Returns the two writes to
/// apply, `None` when the section sits at the boundary (no-op), and an error
/// string when the id is not on the page.
pub fn plan_swap(
    ordered: &[(Uuid, i32)],
    section_id: Uuid,
    direction: Direction,
) -> Result<Option<[IndexWrite; 2]>, String> {
    let pos = ordered
        .iter()
        .position(|(id, _)| *id == section_id)
        .ok_or_else(|| "section not found on this page".to_string())?;

    let neighbor = match direction {
        Direction::Up => pos.checked_sub(1),
        Direction::Down => {
            if pos + 1 < ordered.len() {
                Some(pos + 1)
            } else {
                None
            }
        }
    };

    let Some(neighbor) = neighbor else {
        return Ok(None);
    };

    let (self_id, self_idx) = ordered[pos];
    let (other_id, other_idx) = ordered[neighbor];

    // Equal indices would swap to a no-op; nudge apart so the move is visible
    // and the pair stays its own inverse.
    let (self_new, other_new) = if self_idx == other_idx {
        match direction {
            Direction::Up => (other_idx, other_idx + 1),
            Direction::Down => (other_idx + 1, other_idx),
        }
    } else {
        (other_idx, self_idx)
    };

    Ok(Some([
        IndexWrite {
            id: self_id,
            order_index: self_new,
        },
        IndexWrite {
            id: other_id,
            order_index: other_new,
        },
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections(indices: &[i32]) -> Vec<(Uuid, i32)> {
        indices.iter().map(|i| (Uuid::new_v4(), *i)).collect()
    }

    fn apply(ordered: &mut Vec<(Uuid, i32)>, writes: [IndexWrite; 2]) {
        for w in writes {
            if let Some(entry) = ordered.iter_mut().find(|(id, _)| *id == w.id) {
                entry.1 = w.order_index;
            }
        }
        ordered.sort_by_key(|(_, idx)| *idx);
    }

    #[test]
    fn test_move_up_swaps_with_previous() {
        let s = sections(&[1, 2, 3]);
        let writes = plan_swap(&s, s[1].0, Direction::Up).unwrap().unwrap();
        assert!(writes.contains(&IndexWrite { id: s[1].0, order_index: 1 }));
        assert!(writes.contains(&IndexWrite { id: s[0].0, order_index: 2 }));
    }

    #[test]
    fn test_boundary_is_noop() {
        let s = sections(&[1, 2, 3]);
        assert_eq!(plan_swap(&s, s[0].0, Direction::Up).unwrap(), None);
        assert_eq!(plan_swap(&s, s[2].0, Direction::Down).unwrap(), None);
    }

    #[test]
    fn test_unknown_id_is_error() {
        let s = sections(&[1, 2]);
        assert!(plan_swap(&s, Uuid::new_v4(), Direction::Up).is_err());
    }

    #[test]
    fn test_down_then_up_restores_order() {
        let mut s = sections(&[10, 20, 30]);
        let original: Vec<Uuid> = s.iter().map(|(id, _)| *id).collect();
        let target = s[1].0;

        let writes = plan_swap(&s, target, Direction::Down).unwrap().unwrap();
        apply(&mut s, writes);
        let writes = plan_swap(&s, target, Direction::Up).unwrap().unwrap();
        apply(&mut s, writes);

        let after: Vec<Uuid> = s.iter().map(|(id, _)| *id).collect();
        assert_eq!(original, after);
    }

    #[test]
    fn test_equal_indices_still_swap_visibly() {
        let s = sections(&[5, 5]);
        let writes = plan_swap(&s, s[0].0, Direction::Down).unwrap().unwrap();
        let mut s2 = s.clone();
        apply(&mut s2, writes);
        // The moved section now sorts after its neighbor
        assert_eq!(s2[1].0, s[0].0);
        assert_ne!(s2[0].1, s2[1].1);
    }

    #[test]
    fn test_single_section_cannot_move() {
        let s = sections(&[1]);
        assert_eq!(plan_swap(&s, s[0].0, Direction::Up).unwrap(), None);
        assert_eq!(plan_swap(&s, s[0].0, Direction::Down).unwrap(), None);
    }
}
