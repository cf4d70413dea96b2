use crate::types::Position;

/// A named settlement slot on the campaign map. New Khanates pick one of
/// these when they are founded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Region {
    pub id: u8,
    pub name: &'static str,
    pub x: u8,
    pub y: u8,
    pub description: &'static str,
}

impl Region {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

pub const REGIONS: [Region; 10] = [
    Region {
        id: 1,
        name: "Aktobe",
        x: 25,
        y: 30,
        description: "Western stronghold with rich resources",
    },
    Region {
        id: 2,
        name: "Kostanay",
        x: 45,
        y: 25,
        description: "Northern plains perfect for cavalry",
    },
    Region {
        id: 3,
        name: "Pavlodar",
        x: 65,
        y: 35,
        description: "Eastern gateway with strategic importance",
    },
    Region {
        id: 4,
        name: "Kyzylorda",
        x: 35,
        y: 45,
        description: "Central region with ancient history",
    },
    Region {
        id: 5,
        name: "Almaty",
        x: 55,
        y: 55,
        description: "Southern capital with mountain defenses",
    },
    Region {
        id: 6,
        name: "East Kazakhstan",
        x: 75,
        y: 45,
        description: "Eastern mountains rich in resources",
    },
    Region {
        id: 7,
        name: "Mangystau",
        x: 15,
        y: 55,
        description: "Southwestern desert fortress",
    },
    Region {
        id: 8,
        name: "North Kazakhstan",
        x: 85,
        y: 25,
        description: "Northern frontier with natural barriers",
    },
    Region {
        id: 9,
        name: "Shymkent",
        x: 45,
        y: 65,
        description: "Southern trade hub",
    },
    Region {
        id: 10,
        name: "Turkistan",
        x: 25,
        y: 75,
        description: "Ancient spiritual capital",
    },
];

/// Region whose slot matches the given position exactly, if any.
pub fn region_at(position: Position) -> Option<&'static Region> {
    REGIONS
        .iter()
        .find(|r| r.x == position.x && r.y == position.y)
}

/// Display-only march duration estimate: 100ms per map unit with a two
/// second floor. The ledger's `travelTime` is the only value resolution
/// gating may use; this one feeds animations and previews.
pub fn estimated_march_ms(from: Position, to: Position) -> u64 {
    let distance = from.distance_to(to);
    (distance * 100.0) as u64 + 2_000
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn estimated_march_ms__has_a_two_second_floor() {
        let p = Position::new(40, 40);
        assert_eq!(estimated_march_ms(p, p), 2_000);
    }

    #[test]
    fn estimated_march_ms__scales_with_distance() {
        // given
        let from = Position::new(0, 0);
        let to = Position::new(30, 40);

        // when: distance is exactly 50 units
        let ms = estimated_march_ms(from, to);

        // then
        assert_eq!(ms, 7_000);
    }

    #[test]
    fn region_at__finds_the_exact_slot() {
        let almaty = region_at(Position::new(55, 55)).unwrap();
        assert_eq!(almaty.name, "Almaty");
        assert_eq!(region_at(Position::new(1, 1)), None);
    }
}
