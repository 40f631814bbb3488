use glam::Vec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::backdrop::BackdropSignal;
use super::frame::FrequencyFrame;
use super::{hsl_to_rgb, VisualMapper};
use crate::scene::{ObjectId, ObjectKind, Scene, SceneObject};

#[derive(Clone, Copy, Debug)]
pub struct ParticleFieldConfig {
    pub count: usize,
    pub arms: usize,
    pub max_radius: f32,
    /// Radians of spiral wind-up per unit radius.
    pub twist: f32,
    /// Scales the per-tick wave displacement.
    pub dampening: f32,
    /// Per-tick decay on the accumulated vertical drift, keeping it
    /// bounded over long sessions.
    pub drift_decay: f32,
}

impl Default for ParticleFieldConfig {
    fn default() -> Self {
        Self {
            count: 5000,
            arms: 5,
            max_radius: 20.0,
            twist: 0.3,
            dampening: 0.05,
            drift_decay: 0.995,
        }
    }
}

/// Spiral particle cloud. Base positions are fixed at mount; every tick
/// re-derives each particle's sprite size from its frequency bin and
/// accumulates a radial wave into its vertical offset. The mean magnitude
/// of the whole frame feeds the backdrop signal.
pub struct ParticleField {
    config: ParticleFieldConfig,
    ids: Vec<ObjectId>,
    center_distance: Vec<f32>,
    rng: SmallRng,
    backdrop: BackdropSignal,
}

impl ParticleField {
    pub fn new(config: ParticleFieldConfig) -> Self {
        Self::with_seed(config, rand::random())
    }

    /// Deterministic construction so tests can pin the jitter term.
    pub fn with_seed(config: ParticleFieldConfig, seed: u64) -> Self {
        Self {
            config,
            ids: Vec::new(),
            center_distance: Vec::new(),
            rng: SmallRng::seed_from_u64(seed),
            backdrop: BackdropSignal::default(),
        }
    }
}

/// Sprite size for one particle: the audio term squared into the product
/// keeps silent bins invisible, while the jitter factor keeps equal bins
/// from looking uniform.
pub fn particle_size(audio: f32, jitter: f32) -> f32 {
    (0.5 + audio * 2.0) * (jitter + 0.5) * audio * 4.0
}

/// Vertical wave contribution for one tick, a function of distance from
/// the spiral center and the particle's audio value.
pub fn wave_displacement(center_distance: f32, audio: f32, dampening: f32) -> f32 {
    (center_distance * 0.2).sin() * audio * dampening
}

impl VisualMapper for ParticleField {
    fn mount(&mut self, scene: &mut Scene) {
        let arms = self.config.arms.max(1);
        let arm_step = std::f32::consts::TAU / arms as f32;
        self.ids.clear();
        self.center_distance.clear();

        for j in 0..self.config.count {
            let radius = self.rng.gen::<f32>() * self.config.max_radius;
            let arm_offset = (j % arms) as f32 * arm_step;
            let angle = radius * self.config.twist + arm_offset;

            let position = Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius);
            let hue = (j % arms) as f32 / arms as f32 * 360.0;
            let mut object =
                SceneObject::new(ObjectKind::Particle, position, hsl_to_rgb(hue, 0.8, 0.6));
            object.scale = Vec3::splat(0.0);

            self.center_distance.push(radius);
            self.ids.push(scene.add(object));
        }
    }

    fn unmount(&mut self, scene: &mut Scene) {
        for id in self.ids.drain(..) {
            scene.remove(id);
        }
        self.center_distance.clear();
        self.backdrop = BackdropSignal::default();
    }

    fn apply(&mut self, frame: Option<&FrequencyFrame>, _now: f32, scene: &mut Scene) {
        let Some(frame) = frame else {
            return;
        };
        if frame.is_empty() || self.ids.is_empty() {
            return;
        }

        self.backdrop = BackdropSignal::from_frame(frame);

        for (j, &id) in self.ids.iter().enumerate() {
            let Some(object) = scene.get_mut(id) else {
                continue;
            };
            let audio = frame.get(j) as f32 / 255.0;
            let jitter = self.rng.gen::<f32>();
            object.scale = Vec3::splat(particle_size(audio, jitter));

            let wave =
                wave_displacement(self.center_distance[j], audio, self.config.dampening);
            object.position.y = object.position.y * self.config.drift_decay + wave;
        }
    }

    fn backdrop(&self) -> Option<BackdropSignal> {
        Some(self.backdrop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_field(count: usize) -> ParticleField {
        ParticleField::with_seed(
            ParticleFieldConfig {
                count,
                ..Default::default()
            },
            7,
        )
    }

    #[test]
    fn size_formula_isolated_from_jitter() {
        // Jitter pinned to 0.5 makes the random factor exactly 1.
        assert!((particle_size(1.0, 0.5) - 10.0).abs() < 1e-5);
        assert!((particle_size(0.5, 0.5) - 3.0).abs() < 1e-5);
        assert_eq!(particle_size(0.0, 0.5), 0.0);
    }

    #[test]
    fn wave_is_zero_at_center_and_in_silence() {
        assert_eq!(wave_displacement(0.0, 1.0, 0.05), 0.0);
        assert_eq!(wave_displacement(12.0, 0.0, 0.05), 0.0);
    }

    #[test]
    fn mount_places_every_particle_inside_the_radius() {
        let mut scene = Scene::new();
        let mut field = small_field(200);
        field.mount(&mut scene);
        assert_eq!(scene.len(), 200);

        for id in &field.ids {
            let p = scene.get(*id).unwrap().position;
            let r = (p.x * p.x + p.z * p.z).sqrt();
            assert!(r <= field.config.max_radius + 1e-3);
        }
    }

    #[test]
    fn seeded_fields_are_reproducible() {
        let mut a = Scene::new();
        let mut b = Scene::new();
        let mut field_a = small_field(50);
        let mut field_b = small_field(50);
        field_a.mount(&mut a);
        field_b.mount(&mut b);
        for (ia, ib) in field_a.ids.iter().zip(field_b.ids.iter()) {
            assert_eq!(a.get(*ia).unwrap().position, b.get(*ib).unwrap().position);
        }
    }

    #[test]
    fn short_frame_wraps_over_all_particles() {
        let mut scene = Scene::new();
        let mut field = small_field(100);
        field.mount(&mut scene);
        // 3 bins feeding 100 particles.
        let frame = FrequencyFrame::new(vec![255, 128, 0]);
        field.apply(Some(&frame), 0.0, &mut scene);
    }

    #[test]
    fn drift_stays_bounded_over_a_long_session() {
        let mut scene = Scene::new();
        let mut field = small_field(50);
        field.mount(&mut scene);

        let loud = FrequencyFrame::new(vec![255; 64]);
        for _ in 0..5000 {
            field.apply(Some(&loud), 0.0, &mut scene);
        }

        // Geometric series bound: dampening / (1 - decay).
        let bound = field.config.dampening / (1.0 - field.config.drift_decay) + 1.0;
        for id in &field.ids {
            let y = scene.get(*id).unwrap().position.y;
            assert!(y.is_finite());
            assert!(y.abs() <= bound, "drift escaped the decay bound: {}", y);
        }
    }

    #[test]
    fn absent_frame_freezes_the_field() {
        let mut scene = Scene::new();
        let mut field = small_field(20);
        field.mount(&mut scene);
        let frame = FrequencyFrame::new(vec![200; 16]);
        field.apply(Some(&frame), 0.0, &mut scene);

        let before: Vec<Vec3> = field
            .ids
            .iter()
            .map(|id| scene.get(*id).unwrap().position)
            .collect();
        field.apply(None, 1.0, &mut scene);
        let after: Vec<Vec3> = field
            .ids
            .iter()
            .map(|id| scene.get(*id).unwrap().position)
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn loud_frame_raises_the_backdrop() {
        let mut scene = Scene::new();
        let mut field = small_field(10);
        field.mount(&mut scene);
        assert_eq!(field.backdrop().unwrap().level, 0);

        field.apply(Some(&FrequencyFrame::new(vec![204; 32])), 0.0, &mut scene);
        assert_eq!(field.backdrop().unwrap().level, 7);

        field.apply(Some(&FrequencyFrame::new(vec![10; 32])), 0.0, &mut scene);
        assert_eq!(field.backdrop().unwrap().level, 0);
    }
}
