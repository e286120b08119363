//! Point-mass circle physics with queued writes and channel filtering.
//!
//! The world owns every body in a `BTreeMap`; entities refer to their body by
//! id only. Deterministic iteration order matters here: the pairwise pass
//! must visit pairs in the same order on every peer or replays stop being
//! bit-identical, which is why these are not `HashMap`s.

use std::collections::BTreeMap;

use log::debug;

use crate::math::Vector2;

pub type BodyId = u32;

/// Velocity/position response factor for body-body contacts.
const COLLISION_RESPONSE: f32 = 0.5;
/// Restitution applied when reflecting off walls.
const WALL_RESTITUTION: f32 = 0.5;

/// Filters which bodies take part in the pairwise resolution pass.
///
/// A pair resolves only when both filters are enabled and each side allows
/// the other by channel membership and explicit exclusion list.
#[derive(Debug, Clone, Default)]
pub struct CollisionFilter {
    pub enabled: bool,
    /// Channels this body belongs to.
    pub channels: Vec<u8>,
    /// If non-empty, the other body must share at least one of these.
    pub include_channels: Vec<u8>,
    /// The other body must share none of these.
    pub exclude_channels: Vec<u8>,
    /// Specific bodies that never collide with this one.
    pub exclude_bodies: Vec<BodyId>,
}

impl CollisionFilter {
    fn allows(&self, other: &PhysicsBody) -> bool {
        if self.exclude_bodies.contains(&other.id) {
            return false;
        }
        if !self.include_channels.is_empty()
            && !other
                .collision
                .channels
                .iter()
                .any(|c| self.include_channels.contains(c))
        {
            return false;
        }
        if other
            .collision
            .channels
            .iter()
            .any(|c| self.exclude_channels.contains(c))
        {
            return false;
        }
        true
    }
}

/// A point-mass circle body.
#[derive(Debug, Clone)]
pub struct PhysicsBody {
    pub id: BodyId,
    pub position: Vector2,
    pub velocity: Vector2,
    pub radius: f32,
    pub mass: f32,
    /// Fraction of velocity shed per nominal tick, in `[0, 1)`.
    pub air_resistance: f32,
    pub collision: CollisionFilter,
    pub dead: bool,
}

impl PhysicsBody {
    pub fn new(id: BodyId) -> Self {
        Self {
            id,
            position: Vector2::default(),
            velocity: Vector2::default(),
            radius: 25.0,
            mass: 100.0,
            air_resistance: 0.001,
            collision: CollisionFilter::default(),
            dead: false,
        }
    }

    fn inverse_mass(&self) -> f32 {
        if self.mass > 0.0 {
            1.0 / self.mass
        } else {
            0.0
        }
    }
}

/// Axis-aligned rectangular wall.
#[derive(Debug, Clone, Copy)]
pub struct RectWall {
    pub id: u32,
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

/// Thin wall expressed as a line segment; bullets test against these.
#[derive(Debug, Clone, Copy)]
pub struct SegmentWall {
    pub id: u32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Owns all bodies and static geometry; steps them once per tick.
pub struct PhysicsWorld {
    base_tps: f32,
    pub time_scale: f32,
    bodies: BTreeMap<BodyId, PhysicsBody>,
    rect_walls: BTreeMap<u32, RectWall>,
    seg_walls: BTreeMap<u32, SegmentWall>,
}

impl PhysicsWorld {
    pub fn new(base_tps: f32) -> Self {
        Self {
            base_tps,
            time_scale: 1.0,
            bodies: BTreeMap::new(),
            rect_walls: BTreeMap::new(),
            seg_walls: BTreeMap::new(),
        }
    }

    /// Registers a body. Id slots are exclusive: an existing occupant with
    /// the same id is destroyed and replaced.
    pub fn add_body(&mut self, body: PhysicsBody) {
        if let Some(mut old) = self.bodies.insert(body.id, body) {
            old.dead = true;
            debug!("body {} replaced an existing occupant", old.id);
        }
    }

    /// Detaches and returns a body. Removing an absent id is a no-op.
    pub fn remove_body(&mut self, id: BodyId) -> Option<PhysicsBody> {
        let mut body = self.bodies.remove(&id)?;
        body.dead = true;
        Some(body)
    }

    pub fn body(&self, id: BodyId) -> Option<&PhysicsBody> {
        self.bodies.get(&id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut PhysicsBody> {
        self.bodies.get_mut(&id)
    }

    pub fn contains_body(&self, id: BodyId) -> bool {
        self.bodies.contains_key(&id)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn add_rect_wall(&mut self, wall: RectWall) {
        self.rect_walls.insert(wall.id, wall);
    }

    pub fn remove_rect_wall(&mut self, id: u32) -> Option<RectWall> {
        self.rect_walls.remove(&id)
    }

    pub fn add_seg_wall(&mut self, wall: SegmentWall) {
        self.seg_walls.insert(wall.id, wall);
    }

    pub fn remove_seg_wall(&mut self, id: u32) -> Option<SegmentWall> {
        self.seg_walls.remove(&id)
    }

    pub fn rect_walls(&self) -> impl Iterator<Item = &RectWall> {
        self.rect_walls.values()
    }

    pub fn seg_walls(&self) -> impl Iterator<Item = &SegmentWall> {
        self.seg_walls.values()
    }

    /// Advances the world by `delta_ms` of wall time.
    ///
    /// All intermediate writes go to queued fields; committed state only
    /// changes in the final flush, so the pairwise pass reads a consistent
    /// previous-tick view no matter which pair resolves first.
    pub fn update(&mut self, delta_ms: f32) {
        let base_frame_ms = 1000.0 / self.base_tps;
        let dt = (delta_ms.max(1.0) / base_frame_ms) * self.time_scale;

        // Exponential drag is resolution-independent: two 25ms steps shed
        // exactly as much speed as one 50ms step.
        for body in self.bodies.values_mut() {
            let decay = (1.0 - body.air_resistance).powf(dt);
            body.velocity.qx *= decay;
            body.velocity.qy *= decay;
        }

        self.resolve_body_pairs();

        for body in self.bodies.values_mut() {
            if body.collision.enabled {
                for wall in self.rect_walls.values() {
                    resolve_rect_wall(body, wall);
                }
            }
        }

        // Explicit Euler over the queued velocity, which already carries
        // this tick's drag and impulses.
        for body in self.bodies.values_mut() {
            body.position.qx += body.velocity.qx * dt;
            body.position.qy += body.velocity.qy * dt;
        }

        for body in self.bodies.values_mut() {
            body.velocity.flush();
            body.position.flush();
        }
    }

    /// Single unordered pass over every colliding pair. Not iterative:
    /// simultaneous multi-contact stacks resolve approximately, which is
    /// enough for a soft real-time loop.
    fn resolve_body_pairs(&mut self) {
        let ids: Vec<BodyId> = self.bodies.keys().copied().collect();

        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (Some(a), Some(b)) = (self.bodies.get(&ids[i]), self.bodies.get(&ids[j]))
                else {
                    continue;
                };

                if !a.collision.enabled || !b.collision.enabled {
                    continue;
                }
                if !a.collision.allows(b) || !b.collision.allows(a) {
                    continue;
                }

                let dx = b.position.x - a.position.x;
                let dy = b.position.y - a.position.y;
                let radii = a.radius + b.radius;
                let dist_sq = dx * dx + dy * dy;
                if dist_sq >= radii * radii {
                    continue;
                }

                let inv_a = a.inverse_mass();
                let inv_b = b.inverse_mass();
                let inv_sum = inv_a + inv_b;
                if inv_sum == 0.0 {
                    continue;
                }
                let s1 = inv_a / inv_sum;
                let s2 = 1.0 - s1;

                let dist = dist_sq.sqrt();
                let (px, py);
                if dist == 0.0 {
                    // Degenerate overlap: separate along +x deterministically.
                    px = radii;
                    py = 0.0;
                } else {
                    // Penetration-scaled push along the center line.
                    let diff = (radii - dist) / dist;
                    px = dx * diff;
                    py = dy * diff;
                }

                let (ia, ib) = (ids[i], ids[j]);
                if let Some(a) = self.bodies.get_mut(&ia) {
                    a.velocity.qx -= px * s1 * COLLISION_RESPONSE;
                    a.velocity.qy -= py * s1 * COLLISION_RESPONSE;
                    a.position.qx -= px * s1 * COLLISION_RESPONSE;
                    a.position.qy -= py * s1 * COLLISION_RESPONSE;
                }
                if let Some(b) = self.bodies.get_mut(&ib) {
                    b.velocity.qx += px * s2 * COLLISION_RESPONSE;
                    b.velocity.qy += py * s2 * COLLISION_RESPONSE;
                    b.position.qx += px * s2 * COLLISION_RESPONSE;
                    b.position.qy += py * s2 * COLLISION_RESPONSE;
                }
            }
        }
    }
}

/// Resolves one circle against one axis-aligned rectangle.
///
/// Flat-face contacts reflect the penetrating axis; corner contacts snap the
/// center onto the corner radius so the resolved position can never sit
/// inside the corner wedge.
fn resolve_rect_wall(body: &mut PhysicsBody, wall: &RectWall) {
    let r = body.radius;
    let cx = body.position.x;
    let cy = body.position.y;

    let near_x = cx >= wall.min_x - r && cx <= wall.max_x + r;
    let near_y = cy >= wall.min_y - r && cy <= wall.max_y + r;
    if !near_x || !near_y {
        return;
    }

    let within_x = cx >= wall.min_x && cx <= wall.max_x;
    let within_y = cy >= wall.min_y && cy <= wall.max_y;

    if within_x && within_y {
        // Center ended up inside the rect: eject along the shallowest face.
        let to_left = cx - wall.min_x;
        let to_right = wall.max_x - cx;
        let to_top = cy - wall.min_y;
        let to_bottom = wall.max_y - cy;
        let min_pen = to_left.min(to_right).min(to_top).min(to_bottom);

        if min_pen == to_left {
            body.position.qx = wall.min_x - r;
            body.velocity.qx = -body.velocity.x.abs() * WALL_RESTITUTION;
        } else if min_pen == to_right {
            body.position.qx = wall.max_x + r;
            body.velocity.qx = body.velocity.x.abs() * WALL_RESTITUTION;
        } else if min_pen == to_top {
            body.position.qy = wall.min_y - r;
            body.velocity.qy = -body.velocity.y.abs() * WALL_RESTITUTION;
        } else {
            body.position.qy = wall.max_y + r;
            body.velocity.qy = body.velocity.y.abs() * WALL_RESTITUTION;
        }
    } else if within_x {
        // Flat top/bottom face.
        if cy < wall.min_y {
            if cy > wall.min_y - r {
                body.position.qy = wall.min_y - r;
                if body.velocity.y > 0.0 {
                    body.velocity.qy = -body.velocity.y * WALL_RESTITUTION;
                }
            }
        } else if cy < wall.max_y + r {
            body.position.qy = wall.max_y + r;
            if body.velocity.y < 0.0 {
                body.velocity.qy = -body.velocity.y * WALL_RESTITUTION;
            }
        }
    } else if within_y {
        // Flat left/right face.
        if cx < wall.min_x {
            if cx > wall.min_x - r {
                body.position.qx = wall.min_x - r;
                if body.velocity.x > 0.0 {
                    body.velocity.qx = -body.velocity.x * WALL_RESTITUTION;
                }
            }
        } else if cx < wall.max_x + r {
            body.position.qx = wall.max_x + r;
            if body.velocity.x < 0.0 {
                body.velocity.qx = -body.velocity.x * WALL_RESTITUTION;
            }
        }
    } else {
        // Corner region: nearest corner, clamp center to the corner radius.
        let corner_x = if cx < wall.min_x { wall.min_x } else { wall.max_x };
        let corner_y = if cy < wall.min_y { wall.min_y } else { wall.max_y };

        let dx = cx - corner_x;
        let dy = cy - corner_y;
        let dist_sq = dx * dx + dy * dy;
        if dist_sq >= r * r {
            return;
        }

        let dist = dist_sq.sqrt();
        let (nx, ny) = if dist == 0.0 {
            // Dead center on the corner; push out diagonally.
            let sx = if cx <= wall.min_x { -1.0 } else { 1.0 };
            let sy = if cy <= wall.min_y { -1.0 } else { 1.0 };
            (
                sx * std::f32::consts::FRAC_1_SQRT_2,
                sy * std::f32::consts::FRAC_1_SQRT_2,
            )
        } else {
            (dx / dist, dy / dist)
        };

        body.position.qx = corner_x + nx * r;
        body.position.qy = corner_y + ny * r;

        // Reflect the inward component along the corner normal.
        let vn = body.velocity.x * nx + body.velocity.y * ny;
        if vn < 0.0 {
            body.velocity.qx = body.velocity.x - (1.0 + WALL_RESTITUTION) * vn * nx;
            body.velocity.qy = body.velocity.y - (1.0 + WALL_RESTITUTION) * vn * ny;
        }
    }
}
