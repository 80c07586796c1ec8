//! Pointer state tracking.
//!
//! Events mutate pointer state immediately; the frame loop consumes the
//! accumulated motion once per frame via [`PointerSet::drain_moved`]. The
//! mouse pointer is a permanent singleton; touch contacts come and go with
//! their stable platform identifiers.

use glam::Vec2;
use rand::Rng;

use crate::color::splat_color;
use crate::splat::Splat;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerId {
    Mouse,
    Touch(u64),
}

#[derive(Clone, Debug)]
pub struct Pointer {
    pub id: PointerId,
    /// Normalized texture coordinates, v pointing down.
    pub texcoord: Vec2,
    pub prev_texcoord: Vec2,
    /// Aspect-corrected motion since the previous event.
    pub delta: Vec2,
    pub down: bool,
    /// Set on motion, cleared when the frame consumes it.
    pub moved: bool,
    pub color: [f32; 3],
}

impl Pointer {
    fn new<R: Rng + ?Sized>(id: PointerId, texcoord: Vec2, rng: &mut R) -> Self {
        Self {
            id,
            texcoord,
            prev_texcoord: texcoord,
            delta: Vec2::ZERO,
            down: true,
            moved: false,
            color: splat_color(rng),
        }
    }

    fn press_at<R: Rng + ?Sized>(&mut self, texcoord: Vec2, rng: &mut R) {
        self.texcoord = texcoord;
        self.prev_texcoord = texcoord;
        self.delta = Vec2::ZERO;
        self.down = true;
        self.moved = false;
        self.color = splat_color(rng);
    }

    fn move_to(&mut self, texcoord: Vec2, surface: Vec2) {
        self.prev_texcoord = self.texcoord;
        self.texcoord = texcoord;
        self.delta = correct_delta(texcoord - self.prev_texcoord, surface);
        self.moved = self.delta != Vec2::ZERO;
    }
}

/// Scale a texcoord delta so equal physical motion produces equal impulses
/// on non-square viewports: shrink x on tall screens, shrink y on wide ones.
pub fn correct_delta(delta: Vec2, surface: Vec2) -> Vec2 {
    let aspect = surface.x / surface.y;
    let mut d = delta;
    if aspect < 1.0 {
        d.x *= aspect;
    }
    if aspect > 1.0 {
        d.y /= aspect;
    }
    d
}

fn to_texcoord(position: Vec2, surface: Vec2) -> Vec2 {
    position / surface
}

#[derive(Default)]
pub struct PointerSet {
    pointers: Vec<Pointer>,
}

impl PointerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pointer> {
        self.pointers.iter()
    }

    fn find_mut(&mut self, id: PointerId) -> Option<&mut Pointer> {
        self.pointers.iter_mut().find(|p| p.id == id)
    }

    /// Press or touch-start at a physical pixel position.
    pub fn press<R: Rng + ?Sized>(
        &mut self,
        id: PointerId,
        position: Vec2,
        surface: Vec2,
        rng: &mut R,
    ) {
        let texcoord = to_texcoord(position, surface);
        match self.find_mut(id) {
            Some(pointer) => pointer.press_at(texcoord, rng),
            None => self.pointers.push(Pointer::new(id, texcoord, rng)),
        }
    }

    /// Pointer motion. A mouse that is not yet down activates itself with a
    /// fresh color so the fluid follows the cursor without a click; its
    /// first motion establishes position only (no impulse). Motion for an
    /// unknown touch id is ignored.
    pub fn motion<R: Rng + ?Sized>(
        &mut self,
        id: PointerId,
        position: Vec2,
        surface: Vec2,
        rng: &mut R,
    ) {
        let texcoord = to_texcoord(position, surface);
        match self.find_mut(id) {
            Some(pointer) => {
                if pointer.down {
                    pointer.move_to(texcoord, surface);
                } else if id == PointerId::Mouse {
                    pointer.press_at(texcoord, rng);
                }
            }
            None if id == PointerId::Mouse => {
                self.pointers.push(Pointer::new(id, texcoord, rng));
            }
            None => {}
        }
    }

    /// Release. Touch pointers are removed; the mouse persists with `down`
    /// cleared. Unknown ids are ignored.
    pub fn release(&mut self, id: PointerId) {
        match id {
            PointerId::Mouse => {
                if let Some(pointer) = self.find_mut(id) {
                    pointer.down = false;
                }
            }
            PointerId::Touch(_) => {
                self.pointers.retain(|p| p.id != id);
            }
        }
    }

    /// Reassign every pointer's color (periodic recolor).
    pub fn recolor<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for pointer in &mut self.pointers {
            pointer.color = splat_color(rng);
        }
    }

    /// Emit at most one splat per pointer that moved since the last frame,
    /// clearing the moved flag.
    pub fn drain_moved(&mut self, force_scale: f32, out: &mut Vec<Splat>) {
        for pointer in &mut self.pointers {
            if pointer.moved {
                pointer.moved = false;
                out.push(Splat {
                    point: pointer.texcoord,
                    force: pointer.delta * force_scale,
                    color: pointer.color,
                });
            }
        }
    }
}
