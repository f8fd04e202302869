// Static level geometry shared by every character in a room.
use bevy::prelude::*;

/// Axis-aligned room layout. `y` grows downwards; everything at or below `floor_y` is ground.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LevelGeometry {
    pub floor_y: f32,
    pub solids: Vec<Rect>,
    pub dream_blocks: Vec<Rect>,
    pub water: Vec<Rect>,
    pub feathers: Vec<Rect>,
    pub talkers: Vec<Rect>,
}

/// Strict overlap: rectangles that only share an edge do not collide.
pub fn overlaps(a: Rect, b: Rect) -> bool {
    !a.intersect(b).is_empty()
}

fn any_overlap(rects: &[Rect], hitbox: Rect) -> bool {
    rects.iter().any(|&r| overlaps(r, hitbox))
}

impl LevelGeometry {
    pub fn solid_at(&self, hitbox: Rect) -> bool {
        hitbox.max.y > self.floor_y || any_overlap(&self.solids, hitbox)
    }

    pub fn dream_block_at(&self, hitbox: Rect) -> bool {
        any_overlap(&self.dream_blocks, hitbox)
    }

    pub fn water_at(&self, hitbox: Rect) -> bool {
        any_overlap(&self.water, hitbox)
    }

    pub fn feather_at(&self, hitbox: Rect) -> bool {
        any_overlap(&self.feathers, hitbox)
    }

    pub fn talker_at(&self, hitbox: Rect) -> bool {
        any_overlap(&self.talkers, hitbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_edges_do_not_overlap() {
        let a = Rect::new(0.0, 0.0, 4.0, 4.0);
        assert!(!overlaps(a, Rect::new(4.0, 0.0, 8.0, 4.0)));
        assert!(overlaps(a, Rect::new(3.5, 3.5, 8.0, 8.0)));
    }

    #[test]
    fn floor_counts_as_solid() {
        let level = LevelGeometry::default();
        assert!(!level.solid_at(Rect::new(-4.0, -11.0, 4.0, 0.0)));
        assert!(level.solid_at(Rect::new(-4.0, -10.0, 4.0, 1.0)));
    }

    #[test]
    fn dream_blocks_are_not_solid() {
        let level = LevelGeometry {
            dream_blocks: vec![Rect::new(-8.0, -40.0, 8.0, -20.0)],
            ..default()
        };
        let hitbox = Rect::new(-4.0, -30.0, 4.0, -19.0);
        assert!(level.dream_block_at(hitbox));
        assert!(!level.solid_at(hitbox));
    }
}
