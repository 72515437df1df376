use glam::{uvec2, UVec2};
use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::{Backend, Texture, TextureHandle};

/// Number of entries in each mask; a pixel walks through all of them over
/// that many consecutive sub-frames.
pub const NUM_MASKS: u32 = 64;

/// Number of distinct alpha levels; row `n` has exactly `n` entries set.
pub const MASK_LEVELS: u32 = NUM_MASKS + 1;

/// Side of the tiled per-pixel noise texture.
pub const NOISE_SIZE: u32 = 3;

const SEED: u64 = 0x6d61_736b;

/// Lookup table for stochastic transparency.
///
/// A fragment of opacity `alpha` survives when the entry of row
/// `round(alpha * NUM_MASKS)` picked by its noise value and the sub-frame's
/// masks offset is set. Since each row is a permutation, over `NUM_MASKS`
/// consecutive sub-frames a pixel is covered exactly `row` times and the
/// accumulated image converges to alpha blending.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskTable {
    rows: Vec<Vec<u8>>,
    noise: Vec<u8>,
}

impl MaskTable {
    pub fn generate(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let rows = (0..MASK_LEVELS)
            .map(|level| {
                let mut row: Vec<u8> = (0..NUM_MASKS)
                    .map(|idx| if idx < level { 255 } else { 0 })
                    .collect();

                row.shuffle(&mut rng);
                row
            })
            .collect();

        let noise = (0..NOISE_SIZE * NOISE_SIZE).map(|_| rng.gen()).collect();

        Self { rows, noise }
    }

    /// Returns the row used for given opacity.
    pub fn level(alpha: f32) -> u32 {
        (alpha.clamp(0.0, 1.0) * NUM_MASKS as f32).round() as u32
    }

    /// Returns the sub-frame dependent shift of the mask column, as
    /// uploaded to the shaders.
    pub fn masks_offset(frame: u32) -> f32 {
        (frame % NUM_MASKS) as f32 / NUM_MASKS as f32
    }

    /// Returns whether a fragment survives; mirrors the lookup done by the
    /// rasterization shaders.
    pub fn is_covered(&self, alpha: f32, pixel: UVec2, frame: u32) -> bool {
        let row = &self.rows[Self::level(alpha) as usize];
        let pixel = pixel % NOISE_SIZE;
        let noise = self.noise[(pixel.y * NOISE_SIZE + pixel.x) as usize];
        let noise = noise as f32 / 255.0;
        let column = (noise + Self::masks_offset(frame)).fract();
        let column = (column * NUM_MASKS as f32) as usize % row.len();

        row[column] > 0
    }

    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    fn masks_data(&self) -> Vec<u8> {
        self.rows.concat()
    }
}

/// GPU side of [`MaskTable`]: an R8 texture of `NUM_MASKS x MASK_LEVELS`
/// masks plus a tiled noise texture decorrelating neighbouring pixels.
#[derive(Debug)]
pub struct TransparencyMasks {
    masks: Texture,
    noise: Texture,
}

impl TransparencyMasks {
    pub fn new(backend: &mut dyn Backend, name: &str) -> Self {
        info!("Generating transparency masks: {name}");

        let table = MaskTable::generate(SEED);

        let texture = |label: &str, size| {
            Texture::builder(format!("{name}_{label}"))
                .with_size(size)
                .with_format(wgpu::TextureFormat::R8Unorm)
                .with_usage(wgpu::TextureUsages::TEXTURE_BINDING)
                .with_usage(wgpu::TextureUsages::COPY_DST)
        };

        let masks =
            texture("masks", uvec2(NUM_MASKS, MASK_LEVELS)).build(backend);

        let noise = texture("noise", UVec2::splat(NOISE_SIZE)).build(backend);

        backend.write_texture(masks.handle(), &table.masks_data());
        backend.write_texture(noise.handle(), &table.noise);

        Self { masks, noise }
    }

    pub fn masks(&self) -> TextureHandle {
        self.masks.handle()
    }

    pub fn noise(&self) -> TextureHandle {
        self.noise.handle()
    }
}
