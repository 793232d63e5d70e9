// Client table module
// Fixed-capacity slot registry; no I/O happens here

use super::connection::ConnectionId;

/// One registry position
#[derive(Debug)]
enum Slot<C> {
    Empty,
    Occupied { id: ConnectionId, conn: C },
}

/// Why an insert was refused. The connection is handed back either way.
#[derive(Debug)]
pub enum InsertError<C> {
    /// Every slot is occupied
    Full(C),
    /// Another slot already holds this id
    Duplicate(C),
}

impl<C> InsertError<C> {
    pub fn into_inner(self) -> C {
        match self {
            Self::Full(conn) | Self::Duplicate(conn) => conn,
        }
    }
}

/// Slot-indexed registry of active connections.
///
/// Iteration is always in ascending slot order, which is also the order
/// broadcasts are delivered in.
#[derive(Debug)]
pub struct ClientTable<C> {
    slots: Vec<Slot<C>>,
}

impl<C> ClientTable<C> {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot::Empty);
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Occupied { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots
            .iter()
            .all(|slot| matches!(slot, Slot::Empty))
    }

    pub fn is_full(&self) -> bool {
        self.slots
            .iter()
            .all(|slot| matches!(slot, Slot::Occupied { .. }))
    }

    /// Place `conn` in the lowest empty slot and return its index
    pub fn insert(&mut self, id: ConnectionId, conn: C) -> Result<usize, InsertError<C>> {
        if self.slot_of(id).is_some() {
            return Err(InsertError::Duplicate(conn));
        }
        match self
            .slots
            .iter()
            .position(|slot| matches!(slot, Slot::Empty))
        {
            Some(index) => {
                self.slots[index] = Slot::Occupied { id, conn };
                Ok(index)
            }
            None => Err(InsertError::Full(conn)),
        }
    }

    /// Clear the slot holding `id`; `None` if it is not registered
    pub fn remove(&mut self, id: ConnectionId) -> Option<C> {
        let index = self.slot_of(id)?;
        match std::mem::replace(&mut self.slots[index], Slot::Empty) {
            Slot::Occupied { conn, .. } => Some(conn),
            Slot::Empty => None,
        }
    }

    pub fn slot_of(&self, id: ConnectionId) -> Option<usize> {
        self.slots.iter().position(
            |slot| matches!(slot, Slot::Occupied { id: current, .. } if *current == id),
        )
    }

    /// Connection in `slot`, if that slot currently holds `id`
    pub fn get(&self, slot: usize, id: ConnectionId) -> Option<&C> {
        match self.slots.get(slot) {
            Some(Slot::Occupied { id: current, conn }) if *current == id => Some(conn),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, slot: usize, id: ConnectionId) -> Option<&mut C> {
        match self.slots.get_mut(slot) {
            Some(Slot::Occupied { id: current, conn }) if *current == id => Some(conn),
            _ => None,
        }
    }

    /// Occupied slots in ascending slot order
    pub fn active(&self) -> impl Iterator<Item = (usize, ConnectionId, &C)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { id, conn } => Some((index, *id, conn)),
                Slot::Empty => None,
            })
    }

    pub fn active_mut(&mut self) -> impl Iterator<Item = (usize, ConnectionId, &mut C)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { id, conn } => Some((index, *id, conn)),
                Slot::Empty => None,
            })
    }

    /// Empty every slot, yielding the connections in slot order
    pub fn drain(&mut self) -> Vec<(usize, ConnectionId, C)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(
                |(index, slot)| match std::mem::replace(slot, Slot::Empty) {
                    Slot::Occupied { id, conn } => Some((index, id, conn)),
                    Slot::Empty => None,
                },
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ConnectionId {
        ConnectionId::new(raw)
    }

    fn slots_of(table: &ClientTable<&'static str>) -> Vec<(usize, u64, &'static str)> {
        table
            .active()
            .map(|(slot, id, name)| (slot, id.get(), *name))
            .collect()
    }

    #[test]
    fn test_insert_fills_lowest_slot_first() {
        let mut table = ClientTable::with_capacity(4);
        assert_eq!(table.insert(id(1), "a").ok(), Some(0));
        assert_eq!(table.insert(id(2), "b").ok(), Some(1));
        assert_eq!(table.insert(id(3), "c").ok(), Some(2));
        assert_eq!(table.len(), 3);
        assert!(!table.is_full());
    }

    #[test]
    fn test_insert_when_full_returns_connection() {
        let mut table = ClientTable::with_capacity(2);
        table.insert(id(1), "a").expect("slot 0");
        table.insert(id(2), "b").expect("slot 1");
        assert!(table.is_full());

        match table.insert(id(3), "c") {
            Err(InsertError::Full(conn)) => assert_eq!(conn, "c"),
            other => panic!("expected Full, got {other:?}"),
        }
        // registry untouched
        assert_eq!(slots_of(&table), vec![(0, 1, "a"), (1, 2, "b")]);
    }

    #[test]
    fn test_duplicate_id_is_refused() {
        let mut table = ClientTable::with_capacity(4);
        table.insert(id(1), "a").expect("slot 0");
        let err = table.insert(id(1), "again").expect_err("duplicate");
        assert!(matches!(err, InsertError::Duplicate(_)));
        assert_eq!(err.into_inner(), "again");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_removed_slot_is_reused() {
        let mut table = ClientTable::with_capacity(4);
        table.insert(id(1), "a").expect("slot 0");
        table.insert(id(2), "b").expect("slot 1");
        table.insert(id(3), "c").expect("slot 2");

        assert_eq!(table.remove(id(2)), Some("b"));
        assert_eq!(table.slot_of(id(2)), None);
        assert_eq!(table.insert(id(4), "d").ok(), Some(1));
        assert_eq!(
            slots_of(&table),
            vec![(0, 1, "a"), (1, 4, "d"), (2, 3, "c")]
        );
    }

    #[test]
    fn test_empty_tracks_occupancy() {
        let mut table = ClientTable::with_capacity(2);
        assert!(table.is_empty());
        table.insert(id(1), "a").expect("slot 0");
        assert!(!table.is_empty());
        table.remove(id(1));
        assert!(table.is_empty());
        assert!(!table.is_full());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut table = ClientTable::with_capacity(2);
        table.insert(id(1), "a").expect("slot 0");
        assert_eq!(table.remove(id(9)), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_get_checks_identity() {
        let mut table = ClientTable::with_capacity(2);
        table.insert(id(1), "a").expect("slot 0");
        assert_eq!(table.get(0, id(1)), Some(&"a"));
        table.remove(id(1));
        table.insert(id(2), "b").expect("slot 0 reused");
        // slot 0 now belongs to a different connection
        assert_eq!(table.get(0, id(1)), None);
        assert_eq!(table.get(5, id(2)), None);
    }

    #[test]
    fn test_active_is_in_slot_order() {
        let mut table = ClientTable::with_capacity(4);
        for (raw, name) in [(10, "a"), (11, "b"), (12, "c"), (13, "d")] {
            table.insert(id(raw), name).expect("free slot");
        }
        table.remove(id(10));
        table.remove(id(12));
        table.insert(id(14), "e").expect("slot 0");

        assert_eq!(
            slots_of(&table),
            vec![(0, 14, "e"), (1, 11, "b"), (3, 13, "d")]
        );
    }

    #[test]
    fn test_drain_empties_table() {
        let mut table = ClientTable::with_capacity(3);
        table.insert(id(1), "a").expect("slot 0");
        table.insert(id(2), "b").expect("slot 1");
        let drained: Vec<_> = table.drain().into_iter().map(|(s, i, c)| (s, i.get(), c)).collect();
        assert_eq!(drained, vec![(0, 1, "a"), (1, 2, "b")]);
        assert_eq!(table.len(), 0);
        assert!(table.is_empty());
        assert_eq!(table.capacity(), 3);
    }
}
