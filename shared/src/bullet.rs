//! Pooled projectiles and the analytic swept hit tests.
//!
//! Bullets churn fast enough that allocating one per shot is the wrong
//! model: slots are recycled, the `dead` tag is the only authority on
//! whether a slot is reusable, and a slot keeps its id for the pool's whole
//! lifetime.

use crate::math::segments_intersect;
use crate::physics::{BodyId, PhysicsBody, PhysicsWorld, RectWall, SegmentWall};
use crate::player::PlayerId;

/// Bullet body ids live above this base so they can never collide with
/// player/ship body ids.
pub const BULLET_ID_BASE: BodyId = 0x0001_0000;

/// Margin added to the displacement segment in wall sweeps, covering the
/// bullet's own radius at the endpoints.
const WALL_SWEEP_EPSILON: f32 = 1.0;

/// Everything needed to launch one bullet.
#[derive(Debug, Clone, Copy)]
pub struct BulletSpawn {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub damage: f32,
    pub lifespan_ms: f32,
    pub owner: Option<PlayerId>,
}

impl BulletSpawn {
    /// Spawn along a rotation at a given speed instead of explicit velocity.
    pub fn aimed(x: f32, y: f32, rotation: f32, speed: f32) -> Self {
        Self {
            x,
            y,
            vx: rotation.cos() * speed,
            vy: rotation.sin() * speed,
            radius: 10.0,
            damage: 10.0,
            lifespan_ms: 5000.0,
            owner: None,
        }
    }
}

/// One pool slot. Never freed; `dead` marks it recyclable.
#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: BodyId,
    pub owner: Option<PlayerId>,
    pub damage: f32,
    pub radius: f32,
    pub lifespan_ms: f32,
    pub dead: bool,
}

/// Arena of bullet slots indexed by stable ids.
#[derive(Debug, Default)]
pub struct BulletPool {
    slots: Vec<Bullet>,
}

impl BulletPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activates a bullet, reusing the first dead slot before allocating.
    ///
    /// The bullet's physics body is (re)registered into the world with its
    /// kinematics fully overwritten, so nothing leaks from a previous use.
    pub fn acquire(&mut self, world: &mut PhysicsWorld, spawn: BulletSpawn) -> BodyId {
        let index = match self.slots.iter().position(|b| b.dead) {
            Some(index) => index,
            None => {
                let id = BULLET_ID_BASE + self.slots.len() as BodyId;
                self.slots.push(Bullet {
                    id,
                    owner: None,
                    damage: 0.0,
                    radius: 0.0,
                    lifespan_ms: 0.0,
                    dead: true,
                });
                self.slots.len() - 1
            }
        };

        let bullet = &mut self.slots[index];
        bullet.dead = false;
        bullet.owner = spawn.owner;
        bullet.damage = spawn.damage;
        bullet.radius = spawn.radius;
        bullet.lifespan_ms = spawn.lifespan_ms;

        let mut body = PhysicsBody::new(bullet.id);
        body.radius = spawn.radius;
        body.mass = 1.0;
        body.air_resistance = 0.0;
        // Bullets never take part in the resolution passes; all their
        // contact handling is the swept tests below.
        body.collision.enabled = false;
        body.position.set(spawn.x, spawn.y);
        body.velocity.set(spawn.vx, spawn.vy);
        world.add_body(body);

        bullet.id
    }

    /// Retires a bullet: zeroes kinematics, detaches the body, marks the
    /// slot reusable. Releasing an already-dead or unknown id is a no-op.
    pub fn release(&mut self, world: &mut PhysicsWorld, id: BodyId) -> bool {
        let Some(bullet) = self.slots.iter_mut().find(|b| b.id == id) else {
            return false;
        };
        if bullet.dead {
            return false;
        }
        bullet.dead = true;
        bullet.owner = None;

        if let Some(body) = world.body_mut(id) {
            body.position.set(0.0, 0.0);
            body.velocity.set(0.0, 0.0);
        }
        world.remove_body(id);
        true
    }

    pub fn get(&self, id: BodyId) -> Option<&Bullet> {
        self.slots.iter().find(|b| b.id == id && !b.dead)
    }

    pub fn iter_alive(&self) -> impl Iterator<Item = &Bullet> {
        self.slots.iter().filter(|b| !b.dead)
    }

    pub fn alive_ids(&self) -> Vec<BodyId> {
        self.slots.iter().filter(|b| !b.dead).map(|b| b.id).collect()
    }

    pub fn alive_count(&self) -> usize {
        self.slots.iter().filter(|b| !b.dead).count()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Ticks every live bullet's lifespan down; returns the ids that expired.
    pub fn tick_lifespans(&mut self, delta_ms: f32) -> Vec<BodyId> {
        let mut expired = Vec::new();
        for bullet in self.slots.iter_mut().filter(|b| !b.dead) {
            bullet.lifespan_ms = crate::math::tick_down(bullet.lifespan_ms, delta_ms);
            if bullet.lifespan_ms == 0.0 {
                expired.push(bullet.id);
            }
        }
        expired
    }
}

/// Time of impact for a swept circle against a point target.
///
/// `px, py` is the bullet-to-target offset at tick start, `vx, vy` the
/// relative displacement covered this tick, `radius` the combined radii.
/// Returns the impact time in `[0, 1]`, or `None` on a miss.
///
/// A discrete end-of-tick overlap check would let a fast bullet step
/// straight over a thin target; solving over the whole displacement segment
/// is what makes fast shots land.
pub fn swept_impact_time(px: f32, py: f32, vx: f32, vy: f32, radius: f32) -> Option<f32> {
    let denom = vx * vx + vy * vy;
    if denom == 0.0 {
        // No relative motion: the pairwise overlap pass owns this case.
        return None;
    }

    let r2 = radius * radius;
    let a = vx * vx * (r2 - py * py);
    let b = 2.0 * px * py * vx * vy;
    let c = vy * vy * (r2 - px * px);
    let disc = a + b + c;
    if disc < 0.0 {
        return None;
    }

    // Entry and exit crossings of the combined radius. The contact window
    // must overlap the [0, 1] span of this tick's segment.
    let d = px * vx;
    let e = py * vy;
    let root = disc.sqrt();
    let entry = (-root - d - e) / denom;
    let exit = (root - d - e) / denom;
    if exit < 0.0 || entry > 1.0 {
        return None;
    }
    Some(entry.max(0.0))
}

/// Whether a bullet's per-tick displacement crosses a segment wall.
pub fn sweep_hits_segment(
    from_x: f32,
    from_y: f32,
    to_x: f32,
    to_y: f32,
    wall: &SegmentWall,
) -> bool {
    // Extend the path slightly past both endpoints so a bullet ending a
    // hair short of the wall still registers.
    let dx = to_x - from_x;
    let dy = to_y - from_y;
    let len = (dx * dx + dy * dy).sqrt();
    let (ex, ey) = if len == 0.0 {
        (0.0, 0.0)
    } else {
        (dx / len * WALL_SWEEP_EPSILON, dy / len * WALL_SWEEP_EPSILON)
    };

    segments_intersect(
        from_x - ex,
        from_y - ey,
        to_x + ex,
        to_y + ey,
        wall.x1,
        wall.y1,
        wall.x2,
        wall.y2,
    )
}

/// Whether a bullet's per-tick displacement enters a rectangular wall.
pub fn sweep_hits_rect(from_x: f32, from_y: f32, to_x: f32, to_y: f32, wall: &RectWall) -> bool {
    let inside = |x: f32, y: f32| {
        x >= wall.min_x && x <= wall.max_x && y >= wall.min_y && y <= wall.max_y
    };
    if inside(from_x, from_y) || inside(to_x, to_y) {
        return true;
    }

    // Check the path against each edge of the rectangle.
    let edges = [
        (wall.min_x, wall.min_y, wall.max_x, wall.min_y),
        (wall.max_x, wall.min_y, wall.max_x, wall.max_y),
        (wall.max_x, wall.max_y, wall.min_x, wall.max_y),
        (wall.min_x, wall.max_y, wall.min_x, wall.min_y),
    ];
    edges
        .iter()
        .any(|&(x1, y1, x2, y2)| segments_intersect(from_x, from_y, to_x, to_y, x1, y1, x2, y2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(20.0)
    }

    #[test]
    fn test_acquire_allocates_then_reuses() {
        let mut w = world();
        let mut pool = BulletPool::new();

        let first = pool.acquire(&mut w, BulletSpawn::aimed(0.0, 0.0, 0.0, 40.0));
        assert_eq!(first, BULLET_ID_BASE);
        assert_eq!(pool.slot_count(), 1);
        assert!(w.contains_body(first));

        pool.release(&mut w, first);
        assert_eq!(pool.alive_count(), 0);
        assert!(!w.contains_body(first));

        // Same slot, same id, no new allocation.
        let second = pool.acquire(&mut w, BulletSpawn::aimed(5.0, 5.0, 1.0, 30.0));
        assert_eq!(second, first);
        assert_eq!(pool.slot_count(), 1);
    }

    #[test]
    fn test_reused_slot_has_fresh_kinematics() {
        let mut w = world();
        let mut pool = BulletPool::new();

        let id = pool.acquire(&mut w, BulletSpawn::aimed(100.0, 200.0, 0.0, 40.0));
        pool.release(&mut w, id);

        let id = pool.acquire(
            &mut w,
            BulletSpawn {
                x: 1.0,
                y: 2.0,
                vx: 3.0,
                vy: 4.0,
                radius: 10.0,
                damage: 10.0,
                lifespan_ms: 5000.0,
                owner: None,
            },
        );
        let body = w.body(id).expect("bullet body registered");
        assert_eq!(body.position.x, 1.0);
        assert_eq!(body.position.y, 2.0);
        assert_eq!(body.velocity.x, 3.0);
        assert_eq!(body.velocity.y, 4.0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut w = world();
        let mut pool = BulletPool::new();

        let id = pool.acquire(&mut w, BulletSpawn::aimed(0.0, 0.0, 0.0, 40.0));
        assert!(pool.release(&mut w, id));
        assert!(!pool.release(&mut w, id));
        assert!(!pool.release(&mut w, 9999));
    }

    #[test]
    fn test_concurrent_bullets_get_distinct_slots() {
        let mut w = world();
        let mut pool = BulletPool::new();

        let a = pool.acquire(&mut w, BulletSpawn::aimed(0.0, 0.0, 0.0, 40.0));
        let b = pool.acquire(&mut w, BulletSpawn::aimed(0.0, 0.0, 0.0, 40.0));
        assert_ne!(a, b);
        assert_eq!(pool.alive_count(), 2);
    }

    #[test]
    fn test_lifespan_expiry() {
        let mut w = world();
        let mut pool = BulletPool::new();

        let mut spawn = BulletSpawn::aimed(0.0, 0.0, 0.0, 40.0);
        spawn.lifespan_ms = 100.0;
        let id = pool.acquire(&mut w, spawn);

        assert!(pool.tick_lifespans(50.0).is_empty());
        let expired = pool.tick_lifespans(50.0);
        assert_eq!(expired, vec![id]);
    }

    #[test]
    fn test_swept_hit_fast_bullet_tunnels_discrete_check() {
        // Bullet crosses the whole target diameter in one tick: start at
        // x=0 moving 1000/tick, target at x=500 with combined radius 20.
        // Neither endpoint overlaps, yet the sweep must land.
        let t = swept_impact_time(-500.0, 0.0, 1000.0, 0.0, 20.0);
        let t = t.expect("fast bullet must hit");
        assert!((0.0..=1.0).contains(&t));
    }

    #[test]
    fn test_swept_hit_miss_off_axis() {
        // Passing 50 units above a target with combined radius 20.
        assert!(swept_impact_time(-500.0, 50.0, 1000.0, 0.0, 20.0).is_none());
    }

    #[test]
    fn test_swept_hit_out_of_range_this_tick() {
        // Moving toward the target but not far enough to reach it.
        assert!(swept_impact_time(-500.0, 0.0, 100.0, 0.0, 20.0).is_none());
    }

    #[test]
    fn test_swept_hit_no_relative_motion() {
        assert!(swept_impact_time(-100.0, 0.0, 0.0, 0.0, 20.0).is_none());
    }

    #[test]
    fn test_sweep_hits_segment_wall() {
        let wall = SegmentWall {
            id: 1,
            x1: 50.0,
            y1: -50.0,
            x2: 50.0,
            y2: 50.0,
        };
        assert!(sweep_hits_segment(0.0, 0.0, 100.0, 0.0, &wall));
        assert!(!sweep_hits_segment(0.0, 100.0, 100.0, 100.0, &wall));
    }

    #[test]
    fn test_sweep_hits_rect_wall_through_and_through() {
        let wall = RectWall {
            id: 1,
            min_x: 40.0,
            min_y: -10.0,
            max_x: 60.0,
            max_y: 10.0,
        };
        // Both endpoints outside, path punches straight through.
        assert!(sweep_hits_rect(0.0, 0.0, 100.0, 0.0, &wall));
        assert!(!sweep_hits_rect(0.0, 50.0, 100.0, 50.0, &wall));
    }
}
