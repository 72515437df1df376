use glam::{uvec4, UVec2};
use log::info;

use crate::{
    gpu, Backend, DrawCall, Geometry, Macros, Observed, ProgramHandle,
    RenderPass, RenderState, Result, ShaderLibrary, Texture, TextureHandle,
    Viewport,
};

/// Running average of the shaded sub-frames.
///
/// Ping-pongs between two textures: each frame reads the previous average
/// out of one and writes the new one into the other.
#[derive(Debug)]
pub struct FrameAccumulationStage {
    accumulation: [Texture; 2],
    current: usize,
    program: ProgramHandle,
    frame: TextureHandle,
}

impl FrameAccumulationStage {
    pub fn new(
        backend: &mut dyn Backend,
        shaders: &ShaderLibrary,
        size: UVec2,
        frame: TextureHandle,
    ) -> Result<Self> {
        info!("Initializing stage: frame_accumulation");

        let target = |label: &str| {
            Texture::builder(label)
                .with_size(size)
                .with_format(wgpu::TextureFormat::Rgba32Float)
                .with_usage(wgpu::TextureUsages::RENDER_ATTACHMENT)
                .with_usage(wgpu::TextureUsages::TEXTURE_BINDING)
        };

        let accumulation = [
            target("accumulation_a").build(backend),
            target("accumulation_b").build(backend),
        ];

        let program = shaders.render_program(
            backend,
            "frame_accumulation",
            "shading/accumulation.wgsl",
            "fullscreen_vs",
            Some("accumulation_fs"),
            Macros::new(),
        )?;

        Ok(Self {
            accumulation,
            current: 0,
            program,
            frame,
        })
    }

    /// Returns the texture holding the most recent average.
    pub fn accumulation(&self) -> TextureHandle {
        self.accumulation[self.current].handle()
    }

    /// Folds the current sub-frame into the average; returns whether
    /// anything was drawn.
    ///
    /// `current_frame` counts from 1, which overwrites the average instead
    /// of blending into it.
    pub fn process(
        &mut self,
        backend: &mut dyn Backend,
        viewport: &Observed<Viewport>,
        current_frame: u32,
        always_process: bool,
    ) -> bool {
        if viewport.has_changed() {
            for texture in &mut self.accumulation {
                texture.resize(backend, viewport.size());
            }
        }

        if !always_process {
            return false;
        }

        let previous = &self.accumulation[self.current];
        let next = &self.accumulation[1 - self.current];

        let params = gpu::AccumulationPassParams {
            frame: uvec4(current_frame, 0, 0, 0),
        };

        let pass = RenderPass::new("frame_accumulation")
            .with_color(next.handle(), None)
            .draw(
                DrawCall::new(self.program, Geometry::FULLSCREEN_TRIANGLE)
                    .with_state(RenderState::FULLSCREEN)
                    .bind([
                        self.frame.bind_readable(),
                        previous.handle().bind_readable(),
                    ])
                    .with_params(&params),
            );

        backend.render(&pass);
        self.current = 1 - self.current;

        true
    }
}
