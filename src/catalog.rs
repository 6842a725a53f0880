/// A category of physical rooms sharing a fixed inventory count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomType {
    pub id: &'static str,
    pub name: &'static str,
    pub category: &'static str,
    pub total: u32,
}

const fn room(id: &'static str, name: &'static str, category: &'static str, total: u32) -> RoomType {
    RoomType { id, name, category, total }
}

/// The property's inventory. Ids are stored on reservations as-is, including
/// the historical `casal_execultivo` spelling.
pub const ROOM_TYPES: &[RoomType] = &[
    room("duplo", "Duplo", "Standard", 15),
    room("casal", "Casal", "Standard", 17),
    room("solteiro_triplo", "Solteiro Triplo", "Standard", 10),
    room("casal_triplo", "Casal Triplo", "Standard", 4),
    room("casal_quadruplo", "Casal Quádruplo", "Standard", 1),
    room("casal_quintuplo", "Casal Quíntuplo", "Standard", 2),
    room("solteiro_quadruplo", "Solteiro Quádruplo", "Standard", 1),
    room("casal_execultivo", "Casal Executivo", "Executivo", 14),
    room("solteiro_triplo_exec", "Solteiro Triplo Executivo", "Executivo", 5),
    room("casal_triplo_exec", "Casal Triplo Executivo", "Executivo", 4),
    room("casal_king_exec", "Casal King Executivo", "Executivo", 2),
    room("casal_quadruplo_exec", "Casal Quádruplo Executivo", "Executivo", 2),
];

/// Read-only room inventory, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct Catalog {
    rooms: Vec<RoomType>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(ROOM_TYPES.to_vec())
    }
}

impl Catalog {
    pub fn new(rooms: Vec<RoomType>) -> Self {
        Self { rooms }
    }

    pub fn rooms(&self) -> &[RoomType] {
        &self.rooms
    }

    /// Unique category labels in first-appearance order.
    pub fn list_categories(&self) -> Vec<&'static str> {
        let mut categories: Vec<&'static str> = Vec::new();
        for r in &self.rooms {
            if !categories.contains(&r.category) {
                categories.push(r.category);
            }
        }
        categories
    }

    pub fn rooms_in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a RoomType> + 'a {
        self.rooms.iter().filter(move |r| r.category == category)
    }

    pub fn lookup(&self, id: &str) -> Option<&RoomType> {
        self.rooms.iter().find(|r| r.id == id)
    }

    /// Display label for a room type id, falling back to the raw id.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.lookup(id).map_or(id, |r| r.name)
    }
}
