use glam::Vec3;

use super::frame::FrequencyFrame;
use super::{hsl_to_rgb, VisualMapper};
use crate::scene::{ObjectId, ObjectKind, Scene, SceneObject};

#[derive(Clone, Copy, Debug)]
pub struct RadialBarsConfig {
    pub bars: usize,
    pub radius: f32,
    /// Scale multiplier on the half-range-normalized magnitude.
    pub gain: f32,
    /// Minimum bar scale so quiet bins never degenerate to zero height.
    pub floor_scale: f32,
    /// Per-bar spin per tick, radians.
    pub spin: f32,
    /// Whole-ring yaw per tick, radians.
    pub group_spin: f32,
    pub bob_rate: f32,
    pub bob_phase: f32,
    pub bob_amplitude: f32,
}

impl Default for RadialBarsConfig {
    fn default() -> Self {
        Self {
            bars: 32,
            radius: 5.0,
            gain: 5.0,
            floor_scale: 0.5,
            spin: 0.02,
            group_spin: 0.005,
            bob_rate: 3.0,
            bob_phase: 0.2,
            bob_amplitude: 0.2,
        }
    }
}

/// Fixed ring of bars; each tick maps one frequency bin onto each bar's
/// vertical scale, with independent idle motion layered on top so the
/// ring keeps breathing while the spectrum is static.
pub struct RadialBars {
    config: RadialBarsConfig,
    ids: Vec<ObjectId>,
    base_positions: Vec<Vec3>,
    group_yaw: f32,
}

impl RadialBars {
    pub fn new(config: RadialBarsConfig) -> Self {
        Self {
            config,
            ids: Vec::new(),
            base_positions: Vec::new(),
            group_yaw: 0.0,
        }
    }
}

/// Audio-driven scale term: half-range normalization times gain, floored.
pub fn bar_scale(value: u8, gain: f32, floor_scale: f32) -> f32 {
    ((value as f32 / 128.0) * gain).max(floor_scale)
}

/// Idle vertical bob, independent of audio.
pub fn idle_bob(now: f32, index: usize, config: &RadialBarsConfig) -> f32 {
    (now * config.bob_rate + index as f32 * config.bob_phase).sin() * config.bob_amplitude
}

impl VisualMapper for RadialBars {
    fn mount(&mut self, scene: &mut Scene) {
        let n = self.config.bars.max(1);
        self.ids.clear();
        self.base_positions.clear();
        for i in 0..n {
            let hue = i as f32 / n as f32 * 360.0;
            let angle = i as f32 / n as f32 * std::f32::consts::TAU;
            let position = Vec3::new(
                angle.cos() * self.config.radius,
                0.0,
                angle.sin() * self.config.radius,
            );
            let mut object =
                SceneObject::new(ObjectKind::Bar, position, hsl_to_rgb(hue, 1.0, 0.5));
            object.scale = Vec3::new(0.5, 1.0, 0.5);
            self.base_positions.push(position);
            self.ids.push(scene.add(object));
        }
    }

    fn unmount(&mut self, scene: &mut Scene) {
        for id in self.ids.drain(..) {
            scene.remove(id);
        }
        self.base_positions.clear();
        self.group_yaw = 0.0;
    }

    fn apply(&mut self, frame: Option<&FrequencyFrame>, now: f32, scene: &mut Scene) {
        let Some(frame) = frame else {
            return;
        };
        if frame.is_empty() || self.ids.is_empty() {
            return;
        }

        self.group_yaw += self.config.group_spin;
        let (yaw_sin, yaw_cos) = self.group_yaw.sin_cos();

        for (i, &id) in self.ids.iter().enumerate() {
            // A bar whose object is gone (scene torn down under us) is
            // skipped, never a panic.
            let Some(object) = scene.get_mut(id) else {
                continue;
            };
            let value = frame.get(i);
            object.scale.y = bar_scale(value, self.config.gain, self.config.floor_scale);
            object.rotation.y += self.config.spin;

            let base = self.base_positions[i];
            object.position = Vec3::new(
                base.x * yaw_cos + base.z * yaw_sin,
                idle_bob(now, i, &self.config),
                -base.x * yaw_sin + base.z * yaw_cos,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_rests_on_the_floor() {
        assert_eq!(bar_scale(0, 5.0, 0.5), 0.5);
    }

    #[test]
    fn half_range_magnitude_equals_gain() {
        assert_eq!(bar_scale(128, 5.0, 0.5), 5.0);
    }

    #[test]
    fn alternating_frame_on_four_bars() {
        let config = RadialBarsConfig {
            bars: 4,
            ..Default::default()
        };
        let frame = FrequencyFrame::new(vec![255, 0, 255, 0]);
        let scales: Vec<f32> = (0..config.bars)
            .map(|i| bar_scale(frame.get(i), config.gain, config.floor_scale))
            .collect();
        let expected = [255.0 / 128.0 * 5.0, 0.5, 255.0 / 128.0 * 5.0, 0.5];
        for (s, e) in scales.iter().zip(expected.iter()) {
            assert!((s - e).abs() < 1e-5, "got {:?}", scales);
        }
    }

    #[test]
    fn mount_creates_a_fixed_ring() {
        let mut scene = Scene::new();
        let mut bars = RadialBars::new(RadialBarsConfig {
            bars: 8,
            ..Default::default()
        });
        bars.mount(&mut scene);
        assert_eq!(scene.len(), 8);

        // Every bar sits on the configured radius.
        for id in &bars.ids {
            let p = scene.get(*id).unwrap().position;
            let r = (p.x * p.x + p.z * p.z).sqrt();
            assert!((r - 5.0).abs() < 1e-4);
        }

        bars.unmount(&mut scene);
        assert!(scene.is_empty());
    }

    #[test]
    fn short_frame_wraps_across_many_bars() {
        let mut scene = Scene::new();
        let mut bars = RadialBars::new(RadialBarsConfig {
            bars: 32,
            ..Default::default()
        });
        bars.mount(&mut scene);

        // Two bins feeding 32 bars: indices wrap, no out-of-bounds.
        let frame = FrequencyFrame::new(vec![128, 0]);
        bars.apply(Some(&frame), 0.0, &mut scene);

        for (i, id) in bars.ids.iter().enumerate() {
            let scale = scene.get(*id).unwrap().scale.y;
            let expected = if i % 2 == 0 { 5.0 } else { 0.5 };
            assert!((scale - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn missing_frame_holds_last_values() {
        let mut scene = Scene::new();
        let mut bars = RadialBars::new(RadialBarsConfig::default());
        bars.mount(&mut scene);

        let frame = FrequencyFrame::new(vec![200; 16]);
        bars.apply(Some(&frame), 0.1, &mut scene);
        let held: Vec<f32> = bars
            .ids
            .iter()
            .map(|id| scene.get(*id).unwrap().scale.y)
            .collect();

        bars.apply(None, 0.2, &mut scene);
        let after: Vec<f32> = bars
            .ids
            .iter()
            .map(|id| scene.get(*id).unwrap().scale.y)
            .collect();
        assert_eq!(held, after);
    }

    #[test]
    fn apply_survives_objects_removed_behind_its_back() {
        let mut scene = Scene::new();
        let mut bars = RadialBars::new(RadialBarsConfig {
            bars: 4,
            ..Default::default()
        });
        bars.mount(&mut scene);
        scene.remove(bars.ids[2]);

        let frame = FrequencyFrame::new(vec![100; 4]);
        bars.apply(Some(&frame), 0.0, &mut scene);
    }

    #[test]
    fn spin_accumulates_per_tick() {
        let mut scene = Scene::new();
        let mut bars = RadialBars::new(RadialBarsConfig {
            bars: 1,
            ..Default::default()
        });
        bars.mount(&mut scene);
        let frame = FrequencyFrame::new(vec![10]);
        bars.apply(Some(&frame), 0.0, &mut scene);
        bars.apply(Some(&frame), 0.016, &mut scene);
        let rot = scene.get(bars.ids[0]).unwrap().rotation.y;
        assert!((rot - 0.04).abs() < 1e-6);
    }
}
