pub mod gpu;
pub mod pipeline;
pub mod renderer;

use glam::Vec3;

/// Handle to an object owned by the scene. Stable for the object's
/// lifetime; slots are reused after removal.
pub type ObjectId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    /// Unit cube scaled/rotated per instance.
    Bar,
    /// Camera-facing billboard; `scale.x` is the sprite size.
    Particle,
}

#[derive(Clone, Debug)]
pub struct SceneObject {
    pub kind: ObjectKind,
    pub position: Vec3,
    pub scale: Vec3,
    /// Euler rotation in radians (applied Y, X, Z).
    pub rotation: Vec3,
    pub color: [f32; 3],
}

impl SceneObject {
    pub fn new(kind: ObjectKind, position: Vec3, color: [f32; 3]) -> Self {
        Self {
            kind,
            position,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
            color,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PointLight {
    pub position: Vec3,
    pub color: [f32; 3],
    pub intensity: f32,
    pub range: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct Fog {
    pub color: [f32; 3],
    pub near: f32,
    pub far: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn view_proj(&self, aspect: f32) -> glam::Mat4 {
        let view = glam::Mat4::look_at_rh(self.eye, self.target, Vec3::Y);
        let proj = glam::Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            aspect.max(1.0e-3),
            self.near,
            self.far,
        );
        proj * view
    }
}

/// Persistent scene graph: a slot map of objects plus camera, lighting,
/// fog and backdrop state. Mutators hand out `ObjectId`s; looking up a
/// removed or never-created id yields `None`, which callers treat as a
/// silent no-op rather than an error.
pub struct Scene {
    objects: Vec<Option<SceneObject>>,
    free: Vec<usize>,
    pub camera: Camera,
    pub lights: [PointLight; 3],
    pub ambient: f32,
    pub fog: Fog,
    /// Accent color the backdrop intensity scales into.
    pub backdrop_color: [f32; 3],
    backdrop_intensity: f32,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            free: Vec::new(),
            camera: Camera {
                eye: Vec3::new(0.0, 2.0, 12.0),
                target: Vec3::ZERO,
                fov_y_degrees: 75.0,
                near: 0.1,
                far: 1000.0,
            },
            lights: [
                PointLight {
                    position: Vec3::new(10.0, 10.0, 10.0),
                    color: [1.0, 0.0, 0.0],
                    intensity: 2.0,
                    range: 50.0,
                },
                PointLight {
                    position: Vec3::new(-10.0, -10.0, -10.0),
                    color: [0.0, 0.0, 1.0],
                    intensity: 2.0,
                    range: 50.0,
                },
                PointLight {
                    position: Vec3::new(0.0, 10.0, -10.0),
                    color: [0.0, 1.0, 0.0],
                    intensity: 2.0,
                    range: 50.0,
                },
            ],
            ambient: 0.5,
            fog: Fog {
                color: [0.0, 0.0, 0.0],
                near: 1.0,
                far: 100.0,
            },
            backdrop_color: [0.35, 0.08, 0.5],
            backdrop_intensity: 0.0,
        }
    }

    pub fn add(&mut self, object: SceneObject) -> ObjectId {
        if let Some(slot) = self.free.pop() {
            self.objects[slot] = Some(object);
            slot
        } else {
            self.objects.push(Some(object));
            self.objects.len() - 1
        }
    }

    pub fn remove(&mut self, id: ObjectId) {
        if let Some(slot) = self.objects.get_mut(id) {
            if slot.take().is_some() {
                self.free.push(id);
            }
        }
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(id).and_then(|s| s.as_mut())
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(id).and_then(|s| s.as_ref())
    }

    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter_map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.objects.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Presentation-side application of the mapper's backdrop output port.
    pub fn set_backdrop_intensity(&mut self, intensity: f32) {
        self.backdrop_intensity = intensity.clamp(0.0, 1.0);
    }

    /// Clear color for the renderer: fog color lifted toward the accent by
    /// the current backdrop intensity.
    pub fn clear_color(&self) -> [f32; 3] {
        let t = self.backdrop_intensity;
        [
            self.fog.color[0] + (self.backdrop_color[0] - self.fog.color[0]) * t,
            self.fog.color[1] + (self.backdrop_color[1] - self.fog.color[1]) * t,
            self.fog.color[2] + (self.backdrop_color[2] - self.fog.color[2]) * t,
        ]
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj() -> SceneObject {
        SceneObject::new(ObjectKind::Bar, Vec3::ZERO, [1.0, 1.0, 1.0])
    }

    #[test]
    fn add_get_remove_roundtrip() {
        let mut scene = Scene::new();
        let id = scene.add(obj());
        assert!(scene.get_mut(id).is_some());
        scene.remove(id);
        assert!(scene.get_mut(id).is_none());
        assert!(scene.is_empty());
    }

    #[test]
    fn removed_slots_are_reused() {
        let mut scene = Scene::new();
        let a = scene.add(obj());
        let _b = scene.add(obj());
        scene.remove(a);
        let c = scene.add(obj());
        assert_eq!(a, c);
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn stale_lookup_is_a_quiet_none() {
        let mut scene = Scene::new();
        assert!(scene.get_mut(42).is_none());
        // Double-remove does not corrupt the free list.
        let id = scene.add(obj());
        scene.remove(id);
        scene.remove(id);
        let x = scene.add(obj());
        let y = scene.add(obj());
        assert_ne!(x, y);
    }

    #[test]
    fn backdrop_intensity_lerps_clear_color() {
        let mut scene = Scene::new();
        scene.set_backdrop_intensity(0.0);
        assert_eq!(scene.clear_color(), scene.fog.color);
        scene.set_backdrop_intensity(1.0);
        assert_eq!(scene.clear_color(), scene.backdrop_color);
        scene.set_backdrop_intensity(7.0);
        assert_eq!(scene.clear_color(), scene.backdrop_color);
    }

    #[test]
    fn view_proj_is_finite() {
        let scene = Scene::new();
        let m = scene.camera.view_proj(16.0 / 9.0);
        assert!(m.to_cols_array().iter().all(|v| v.is_finite()));
    }
}
