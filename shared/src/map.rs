//! Arena maps: static geometry, spawn points, and playfield bounds.
//!
//! Maps are plain data consumed by [`crate::game::GameSimulation::set_map`],
//! which registers the geometry into the physics world and clears it again
//! on map change.

use std::sync::OnceLock;

/// Playfield limits; ships are clamped inside with a velocity bounce.
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct MapRect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct MapSegment {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct SpawnPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone)]
pub struct GameMap {
    pub name: &'static str,
    pub rect_walls: Vec<MapRect>,
    pub seg_walls: Vec<MapSegment>,
    pub spawn_points: Vec<SpawnPoint>,
    pub bounds: Bounds,
}

/// Built-in map table.
pub fn map_catalog() -> &'static [GameMap] {
    static MAPS: OnceLock<Vec<GameMap>> = OnceLock::new();
    MAPS.get_or_init(|| {
        vec![
            GameMap {
                name: "Expanse",
                rect_walls: Vec::new(),
                seg_walls: Vec::new(),
                spawn_points: vec![
                    SpawnPoint { x: -900.0, y: -900.0 },
                    SpawnPoint { x: 900.0, y: -900.0 },
                    SpawnPoint { x: 900.0, y: 900.0 },
                    SpawnPoint { x: -900.0, y: 900.0 },
                ],
                bounds: Bounds {
                    min_x: -1200.0,
                    min_y: -1200.0,
                    max_x: 1200.0,
                    max_y: 1200.0,
                },
            },
            GameMap {
                name: "Foundry",
                rect_walls: vec![
                    // Center block.
                    MapRect {
                        min_x: -150.0,
                        min_y: -150.0,
                        max_x: 150.0,
                        max_y: 150.0,
                    },
                    // Corner pillars.
                    MapRect {
                        min_x: -700.0,
                        min_y: -700.0,
                        max_x: -550.0,
                        max_y: -550.0,
                    },
                    MapRect {
                        min_x: 550.0,
                        min_y: 550.0,
                        max_x: 700.0,
                        max_y: 700.0,
                    },
                ],
                seg_walls: vec![
                    MapSegment {
                        x1: -400.0,
                        y1: 300.0,
                        x2: -400.0,
                        y2: 700.0,
                    },
                    MapSegment {
                        x1: 400.0,
                        y1: -700.0,
                        x2: 400.0,
                        y2: -300.0,
                    },
                ],
                spawn_points: vec![
                    SpawnPoint { x: -800.0, y: 0.0 },
                    SpawnPoint { x: 800.0, y: 0.0 },
                    SpawnPoint { x: 0.0, y: -800.0 },
                    SpawnPoint { x: 0.0, y: 800.0 },
                ],
                bounds: Bounds {
                    min_x: -1000.0,
                    min_y: -1000.0,
                    max_x: 1000.0,
                    max_y: 1000.0,
                },
            },
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_maps_are_usable() {
        for map in map_catalog() {
            assert!(!map.spawn_points.is_empty(), "{} has no spawns", map.name);
            assert!(map.bounds.min_x < map.bounds.max_x);
            assert!(map.bounds.min_y < map.bounds.max_y);
            for spawn in &map.spawn_points {
                assert!(spawn.x >= map.bounds.min_x && spawn.x <= map.bounds.max_x);
                assert!(spawn.y >= map.bounds.min_y && spawn.y <= map.bounds.max_y);
            }
        }
    }
}
