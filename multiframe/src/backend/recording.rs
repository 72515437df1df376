use glam::{UVec2, UVec3};
use log::trace;

use super::*;
use crate::Error;

/// Headless backend that validates and records every call instead of
/// talking to a GPU.
///
/// Used to exercise the painter without a device: tests inspect the recorded
/// [`Event`]s to check allocation sizes, call ordering and dispatch sizes.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    textures: Vec<TextureDescriptor>,
    buffers: Vec<BufferDescriptor>,
    meshes: Vec<Option<String>>,
    programs: Vec<Option<ProgramDescriptor>>,
    rejected_programs: Vec<String>,
    events: Vec<Event>,
    passes: Vec<RenderPass>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    TextureCreated {
        texture: TextureHandle,
        label: String,
        size: UVec2,
    },
    TextureResized {
        texture: TextureHandle,
        label: String,
        size: UVec2,
    },
    TextureWritten {
        texture: TextureHandle,
        len: usize,
    },
    BufferCreated {
        buffer: BufferHandle,
        label: String,
        size: u64,
    },
    BufferResized {
        buffer: BufferHandle,
        label: String,
        size: u64,
    },
    BufferWritten {
        buffer: BufferHandle,
        offset: u64,
        len: usize,
    },
    BufferCleared {
        buffer: BufferHandle,
    },
    MeshCreated {
        mesh: MeshHandle,
        label: String,
        vertices: usize,
        indices: usize,
    },
    MeshDestroyed {
        mesh: MeshHandle,
    },
    ProgramCreated {
        program: ProgramHandle,
        label: String,
    },
    ProgramDestroyed {
        program: ProgramHandle,
    },
    Rendered {
        label: String,
        draws: usize,
        target_size: UVec2,
    },
    Computed {
        label: String,
        workgroups: UVec3,
    },
    FrameFinished,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Default::default()
    }

    /// Makes every subsequent program whose label contains `pattern` fail to
    /// compile.
    pub fn reject_programs(&mut self, pattern: impl ToString) {
        self.rejected_programs.push(pattern.to_string());
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn texture(&self, texture: TextureHandle) -> &TextureDescriptor {
        self.textures
            .get(texture.index())
            .unwrap_or_else(|| panic!("Texture does not exist: {texture:?}"))
    }

    pub fn find_texture(&self, label: &str) -> Option<TextureHandle> {
        self.textures
            .iter()
            .position(|desc| desc.label == label)
            .map(|idx| TextureHandle::new(idx as u32))
    }

    pub fn buffer(&self, buffer: BufferHandle) -> &BufferDescriptor {
        self.buffers
            .get(buffer.index())
            .unwrap_or_else(|| panic!("Buffer does not exist: {buffer:?}"))
    }

    pub fn find_buffer(&self, label: &str) -> Option<BufferHandle> {
        self.buffers
            .iter()
            .position(|desc| desc.label == label)
            .map(|idx| BufferHandle::new(idx as u32))
    }

    pub fn program(
        &self,
        program: ProgramHandle,
    ) -> Option<&ProgramDescriptor> {
        self.programs.get(program.index()).and_then(Option::as_ref)
    }

    /// Returns the number of meshes that were created and not destroyed.
    pub fn live_meshes(&self) -> usize {
        self.meshes.iter().flatten().count()
    }

    /// Returns every render pass with given label, in submission order.
    pub fn render_passes(&self, label: &str) -> Vec<&RenderPass> {
        self.passes
            .iter()
            .filter(|pass| pass.label == label)
            .collect()
    }

    /// Returns the number of programs that were created and not destroyed.
    pub fn live_programs(&self) -> usize {
        self.programs.iter().flatten().count()
    }

    /// Returns the number of programs created so far, destroyed or not.
    pub fn compiled_programs(&self) -> usize {
        self.programs.len()
    }

    /// Returns the total number of draw calls recorded so far.
    pub fn draws(&self) -> usize {
        self.events
            .iter()
            .map(|event| match event {
                Event::Rendered { draws, .. } => *draws,
                _ => 0,
            })
            .sum()
    }

    /// Returns workgroup counts of all dispatches with given label.
    pub fn dispatches(&self, label: &str) -> Vec<UVec3> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Computed {
                    label: l,
                    workgroups,
                } if l == label => Some(*workgroups),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of render passes with given label.
    pub fn renders(&self, label: &str) -> usize {
        self.events
            .iter()
            .filter(|event| {
                matches!(event, Event::Rendered { label: l, .. } if l == label)
            })
            .count()
    }

    fn assert_mesh(&self, mesh: MeshHandle) {
        assert!(
            matches!(self.meshes.get(mesh.index()), Some(Some(_))),
            "Mesh does not exist: {mesh:?}"
        );
    }

    fn assert_program(&self, program: ProgramHandle) {
        assert!(
            self.program(program).is_some(),
            "Program does not exist: {program:?}"
        );
    }

    fn assert_bindings(&self, bindings: &[Binding]) {
        for binding in bindings {
            match *binding {
                Binding::Texture {
                    texture,
                    mip_level,
                } => {
                    let desc = self.texture(texture);

                    if let Some(mip_level) = mip_level {
                        assert!(
                            mip_level < desc.mip_levels,
                            "Texture `{}` has no mip level {mip_level}",
                            desc.label,
                        );
                    }
                }

                Binding::SampledTexture { texture } => {
                    self.texture(texture);
                }

                Binding::StorageTexture { texture, mip_level } => {
                    let desc = self.texture(texture);

                    assert!(
                        desc.usage
                            .contains(wgpu::TextureUsages::STORAGE_BINDING),
                        "Texture `{}` is not writable",
                        desc.label,
                    );

                    assert!(
                        mip_level < desc.mip_levels,
                        "Texture `{}` has no mip level {mip_level}",
                        desc.label,
                    );
                }

                Binding::UniformBuffer { buffer }
                | Binding::StorageBuffer { buffer, .. } => {
                    self.buffer(buffer);
                }
            }
        }
    }
}

impl Backend for RecordingBackend {
    fn create_texture(&mut self, desc: &TextureDescriptor) -> TextureHandle {
        assert!(desc.size.x > 0 && desc.size.y > 0);
        assert!(desc.mip_levels > 0);

        let texture = TextureHandle::new(self.textures.len() as u32);

        self.textures.push(desc.clone());

        self.events.push(Event::TextureCreated {
            texture,
            label: desc.label.clone(),
            size: desc.size,
        });

        texture
    }

    fn resize_texture(&mut self, texture: TextureHandle, size: UVec2) {
        assert!(size.x > 0 && size.y > 0);

        let desc = self
            .textures
            .get_mut(texture.index())
            .unwrap_or_else(|| panic!("Texture does not exist: {texture:?}"));

        desc.size = size;

        self.events.push(Event::TextureResized {
            texture,
            label: desc.label.clone(),
            size,
        });
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]) {
        let desc = self.texture(texture);
        let expected = desc.size.x as usize
            * desc.size.y as usize
            * desc.format.block_copy_size(None).unwrap_or(0) as usize;

        assert_eq!(
            expected,
            data.len(),
            "Upload into `{}` has a wrong size",
            desc.label,
        );

        self.events.push(Event::TextureWritten {
            texture,
            len: data.len(),
        });
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BufferHandle {
        assert!(desc.size > 0);

        let buffer = BufferHandle::new(self.buffers.len() as u32);

        self.buffers.push(desc.clone());

        self.events.push(Event::BufferCreated {
            buffer,
            label: desc.label.clone(),
            size: desc.size,
        });

        buffer
    }

    fn resize_buffer(&mut self, buffer: BufferHandle, size: u64) {
        assert!(size > 0);

        let desc = self
            .buffers
            .get_mut(buffer.index())
            .unwrap_or_else(|| panic!("Buffer does not exist: {buffer:?}"));

        desc.size = size;

        self.events.push(Event::BufferResized {
            buffer,
            label: desc.label.clone(),
            size,
        });
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        let desc = self.buffer(buffer);

        assert!(
            offset + data.len() as u64 <= desc.size,
            "Write into `{}` overflows the buffer",
            desc.label,
        );

        self.events.push(Event::BufferWritten {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn clear_buffer(&mut self, buffer: BufferHandle) {
        self.buffer(buffer);
        self.events.push(Event::BufferCleared { buffer });
    }

    fn create_mesh(
        &mut self,
        label: &str,
        vertices: &[gpu::Vertex],
        indices: &[u32],
    ) -> MeshHandle {
        assert_eq!(0, indices.len() % 3, "Mesh `{label}` is not triangulated");

        assert!(
            indices.iter().all(|&idx| (idx as usize) < vertices.len()),
            "Mesh `{label}` has out-of-bounds indices",
        );

        let mesh = MeshHandle::new(self.meshes.len() as u32);

        self.meshes.push(Some(label.to_string()));

        self.events.push(Event::MeshCreated {
            mesh,
            label: label.to_string(),
            vertices: vertices.len(),
            indices: indices.len(),
        });

        mesh
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        self.assert_mesh(mesh);
        self.meshes[mesh.index()] = None;
        self.events.push(Event::MeshDestroyed { mesh });
    }

    fn create_program(
        &mut self,
        desc: &ProgramDescriptor,
    ) -> Result<ProgramHandle> {
        if self
            .rejected_programs
            .iter()
            .any(|pattern| desc.label.contains(pattern.as_str()))
        {
            return Err(Error::ShaderCompile {
                label: desc.label.clone(),
                message: "rejected by the recording backend".into(),
            });
        }

        let program = ProgramHandle::new(self.programs.len() as u32);

        self.programs.push(Some(desc.clone()));

        self.events.push(Event::ProgramCreated {
            program,
            label: desc.label.clone(),
        });

        Ok(program)
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.assert_program(program);
        self.programs[program.index()] = None;
        self.events.push(Event::ProgramDestroyed { program });
    }

    fn render(&mut self, pass: &RenderPass) {
        let sizes: Vec<_> = pass
            .color_targets
            .iter()
            .map(|target| target.texture)
            .chain(pass.depth_target.map(|target| target.texture))
            .map(|texture| self.texture(texture).size)
            .collect();

        let Some(&target_size) = sizes.first() else {
            panic!("Render pass `{}` has no targets", pass.label);
        };

        assert!(
            sizes.iter().all(|&size| size == target_size),
            "Render pass `{}` has targets of different sizes: {sizes:?}",
            pass.label,
        );

        if let Some(viewport) = pass.viewport {
            assert!(
                viewport.x + viewport.z <= target_size.x
                    && viewport.y + viewport.w <= target_size.y,
                "Render pass `{}` has a viewport outside its targets",
                pass.label,
            );
        }

        for draw in &pass.draws {
            self.assert_program(draw.program);
            self.assert_bindings(&draw.bindings);

            if let Geometry::Mesh(mesh) = draw.geometry {
                self.assert_mesh(mesh);
            }
        }

        trace!("Rendering `{}`; draws={}", pass.label, pass.draws.len());

        self.events.push(Event::Rendered {
            label: pass.label.clone(),
            draws: pass.draws.len(),
            target_size,
        });

        self.passes.push(pass.clone());
    }

    fn compute(&mut self, pass: &ComputePass) {
        self.assert_program(pass.program);
        self.assert_bindings(&pass.bindings);

        assert!(
            pass.workgroups.min_element() > 0,
            "Compute pass `{}` dispatches no workgroups",
            pass.label,
        );

        trace!("Dispatching `{}`; groups={}", pass.label, pass.workgroups);

        self.events.push(Event::Computed {
            label: pass.label.clone(),
            workgroups: pass.workgroups,
        });
    }

    fn finish_frame(&mut self) {
        self.events.push(Event::FrameFinished);
    }
}

#[cfg(test)]
mod tests {
    use glam::uvec2;

    use super::*;

    fn texture(backend: &mut RecordingBackend, label: &str) -> TextureHandle {
        backend.create_texture(&TextureDescriptor {
            label: label.into(),
            size: uvec2(4, 4),
            format: wgpu::TextureFormat::Rgba8Unorm,
            mip_levels: 1,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        })
    }

    #[test]
    fn resizing_keeps_handle() {
        let mut target = RecordingBackend::new();
        let tex = texture(&mut target, "tex");

        target.resize_texture(tex, uvec2(8, 2));

        assert_eq!(uvec2(8, 2), target.texture(tex).size);
        assert_eq!(Some(tex), target.find_texture("tex"));
    }

    #[test]
    #[should_panic(expected = "targets of different sizes")]
    fn mismatched_targets() {
        let mut target = RecordingBackend::new();
        let a = texture(&mut target, "a");
        let b = texture(&mut target, "b");

        target.resize_texture(b, uvec2(2, 2));

        target.render(
            &RenderPass::new("pass").with_color(a, None).with_color(b, None),
        );
    }

    #[test]
    fn rejected_programs() {
        let mut target = RecordingBackend::new();

        target.reject_programs("broken");

        let desc = |label: &str| ProgramDescriptor {
            label: label.into(),
            source: Default::default(),
            stages: ProgramStages::Compute { entry_point: "main" },
        };

        assert!(target.create_program(&desc("fine")).is_ok());

        assert!(matches!(
            target.create_program(&desc("broken_fg")),
            Err(Error::ShaderCompile { .. })
        ));

        assert_eq!(1, target.live_programs());
    }

    #[test]
    #[should_panic(expected = "Mesh does not exist")]
    fn destroyed_meshes_cannot_be_drawn() {
        let mut target = RecordingBackend::new();
        let tex = texture(&mut target, "tex");
        let mesh = target.create_mesh("ground", &[], &[]);

        let program = target
            .create_program(&ProgramDescriptor {
                label: "model".into(),
                source: Default::default(),
                stages: ProgramStages::Render {
                    vertex: "model_vs",
                    fragment: None,
                },
            })
            .unwrap();

        let pass = RenderPass::new("pass")
            .with_color(tex, None)
            .draw(DrawCall::new(program, Geometry::Mesh(mesh)));

        target.render(&pass);
        target.destroy_mesh(mesh);

        assert_eq!(0, target.live_meshes());
        assert_eq!(1, target.render_passes("pass").len());

        target.render(&pass);
    }
}
