//! A backend that records what it is asked to do instead of touching a GPU.
//!
//! It keeps just enough state to catch misuse a real driver would reject: drawing with
//! no program, sampling a texture that no longer exists, or sampling the very target
//! being drawn into.

use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use super::{
    Backend, Destination, FilterMode, ProgramDescriptor, ProgramId, Size, TargetFormat, TargetId,
    TextureHandle,
};
use crate::color::Color;
use crate::error::{PassError, PassResult};

/// One recorded backend call.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateProgram { id: ProgramId, label: String },
    UseProgram(ProgramId),
    Upload { program: ProgramId },
    DeleteProgram(ProgramId),
    CreateTarget { id: TargetId, size: Size, format: TargetFormat },
    DestroyTarget(TargetId),
    BindDestination(Destination),
    SetBlend(Option<wgpu::BlendState>),
    Clear { destination: Destination, color: Color },
    Draw(DrawCall),
    SetMagFilter { texture: TextureHandle, filter: FilterMode },
    ResizeSurface(Size),
    Present,
}

/// Full state captured at a draw.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub program: ProgramId,
    pub label: String,
    pub destination: Destination,
    pub blend: Option<wgpu::BlendState>,
    pub block: Vec<u8>,
    pub textures: Vec<Option<TextureHandle>>,
}

impl DrawCall {
    /// Read the `f32` at byte `offset` of the uniform block.
    pub fn float_at(&self, offset: usize) -> f32 {
        bytemuck::pod_read_unaligned(&self.block[offset..offset + 4])
    }
}

/// Shared view of the commands a [`HeadlessBackend`] has recorded.
#[derive(Clone, Debug, Default)]
pub struct CommandLog(Rc<RefCell<Vec<Command>>>);

impl CommandLog {
    pub fn commands(&self) -> Ref<'_, Vec<Command>> {
        self.0.borrow()
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<Command> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn draws(&self) -> Vec<DrawCall> {
        self.0
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Command::Draw(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.0.borrow().iter().filter(|c| pred(c)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    fn push(&self, command: Command) {
        self.0.borrow_mut().push(command);
    }
}

struct Program {
    label: String,
    block: Vec<u8>,
    textures: Vec<Option<TextureHandle>>,
}

struct Target {
    filter: FilterMode,
}

/// A recording [`Backend`] with no GPU behind it.
pub struct HeadlessBackend {
    surface: Size,
    log: CommandLog,
    programs: HashMap<ProgramId, Program>,
    targets: HashMap<TargetId, Target>,
    next_id: u32,
    program: Option<ProgramId>,
    destination: Destination,
    blend: Option<wgpu::BlendState>,
}

impl HeadlessBackend {
    /// Create a backend with a virtual surface of `size`, and the log it records into.
    pub fn new(size: Size) -> (Self, CommandLog) {
        let log = CommandLog::default();
        let backend = Self {
            surface: size,
            log: log.clone(),
            programs: HashMap::new(),
            targets: HashMap::new(),
            next_id: 1,
            program: None,
            destination: Destination::Screen,
            blend: None,
        };
        (backend, log)
    }

    /// Number of targets currently alive.
    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    /// Number of programs currently alive.
    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn target_of(&self, texture: TextureHandle) -> PassResult<&Target> {
        self.targets
            .get(&TargetId(texture.0))
            .ok_or(PassError::UnknownResource {
                kind: "texture",
                id: texture.0,
            })
    }
}

impl Backend for HeadlessBackend {
    fn surface_size(&self) -> Size {
        self.surface
    }

    fn resize_surface(&mut self, size: Size) {
        self.surface = size;
        self.log.push(Command::ResizeSurface(size));
    }

    fn present(&mut self) -> PassResult<()> {
        self.log.push(Command::Present);
        Ok(())
    }

    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> PassResult<ProgramId> {
        if desc.source.trim().is_empty() {
            return Err(PassError::shader_compilation(desc.label, "empty module"));
        }
        let id = ProgramId(self.next());
        self.programs.insert(
            id,
            Program {
                label: desc.label.to_string(),
                block: vec![0; desc.layout.block_size],
                textures: vec![None; desc.layout.texture_count],
            },
        );
        self.log.push(Command::CreateProgram {
            id,
            label: desc.label.to_string(),
        });
        Ok(id)
    }

    fn use_program(&mut self, program: ProgramId) -> PassResult<()> {
        if !self.programs.contains_key(&program) {
            return Err(PassError::UnknownResource {
                kind: "program",
                id: program.0,
            });
        }
        self.program = Some(program);
        self.log.push(Command::UseProgram(program));
        Ok(())
    }

    fn upload_uniforms(
        &mut self,
        program: ProgramId,
        block: &[u8],
        textures: &[Option<TextureHandle>],
    ) -> PassResult<()> {
        let entry = self
            .programs
            .get_mut(&program)
            .ok_or(PassError::UnknownResource {
                kind: "program",
                id: program.0,
            })?;
        entry.block = block.to_vec();
        entry.textures = textures.to_vec();
        self.log.push(Command::Upload { program });
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.program == Some(program) {
            self.program = None;
        }
        self.log.push(Command::DeleteProgram(program));
    }

    fn create_target(&mut self, size: Size, format: TargetFormat) -> PassResult<TargetId> {
        let id = TargetId(self.next());
        self.targets.insert(
            id,
            Target {
                filter: FilterMode::Linear,
            },
        );
        self.log.push(Command::CreateTarget { id, size, format });
        Ok(id)
    }

    fn destroy_target(&mut self, target: TargetId) {
        self.targets.remove(&target);
        self.log.push(Command::DestroyTarget(target));
    }

    fn target_texture(&self, target: TargetId) -> PassResult<TextureHandle> {
        if self.targets.contains_key(&target) {
            Ok(TextureHandle(target.0))
        } else {
            Err(PassError::UnknownResource {
                kind: "target",
                id: target.0,
            })
        }
    }

    fn bind_destination(&mut self, destination: Destination) {
        self.destination = destination;
        self.log.push(Command::BindDestination(destination));
    }

    fn set_blend(&mut self, blend: Option<wgpu::BlendState>) {
        self.blend = blend;
        self.log.push(Command::SetBlend(blend));
    }

    fn clear(&mut self, color: Color) -> PassResult<()> {
        if let Destination::Target { id, .. } = self.destination {
            self.target_texture(id)?;
        }
        self.log.push(Command::Clear {
            destination: self.destination,
            color,
        });
        Ok(())
    }

    fn draw(&mut self) -> PassResult<()> {
        let id = self.program.ok_or(PassError::NoProgramBound)?;
        let program = self.programs.get(&id).ok_or(PassError::NoProgramBound)?;

        let written = match self.destination {
            Destination::Target { id, .. } => {
                self.target_texture(id)?;
                Some(TextureHandle(id.0))
            }
            Destination::Screen => None,
        };
        for texture in program.textures.iter().flatten() {
            self.target_of(*texture)?;
            if Some(*texture) == written {
                return Err(PassError::gpu(format!(
                    "'{}' samples texture {} while drawing into it",
                    program.label, texture.0
                )));
            }
        }

        let call = DrawCall {
            program: id,
            label: program.label.clone(),
            destination: self.destination,
            blend: self.blend,
            block: program.block.clone(),
            textures: program.textures.clone(),
        };
        self.log.push(Command::Draw(call));
        Ok(())
    }

    fn mag_filter(&self, texture: TextureHandle) -> PassResult<FilterMode> {
        Ok(self.target_of(texture)?.filter)
    }

    fn set_mag_filter(&mut self, texture: TextureHandle, filter: FilterMode) -> PassResult<()> {
        self.targets
            .get_mut(&TargetId(texture.0))
            .ok_or(PassError::UnknownResource {
                kind: "texture",
                id: texture.0,
            })?
            .filter = filter;
        self.log.push(Command::SetMagFilter { texture, filter });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniform::UniformLayout;

    fn program(backend: &mut HeadlessBackend, textures: usize) -> ProgramId {
        backend
            .create_program(&ProgramDescriptor {
                label: "p",
                source: "@fragment fn fs() {}",
                layout: UniformLayout {
                    block_size: 16,
                    texture_count: textures,
                },
            })
            .unwrap()
    }

    #[test]
    fn draw_without_program_fails() {
        let (mut backend, _) = HeadlessBackend::new(Size::new(4, 4));
        assert!(matches!(backend.draw(), Err(PassError::NoProgramBound)));
    }

    #[test]
    fn sampling_the_destination_is_rejected() {
        let (mut backend, log) = HeadlessBackend::new(Size::new(4, 4));
        let p = program(&mut backend, 1);
        let target = backend.create_target(Size::new(4, 4), TargetFormat::Rgba8Unorm).unwrap();
        let texture = backend.target_texture(target).unwrap();

        backend.use_program(p).unwrap();
        backend.upload_uniforms(p, &[0; 16], &[Some(texture)]).unwrap();
        backend.bind_destination(Destination::Target {
            id: target,
            size: Size::new(4, 4),
        });
        assert!(matches!(backend.draw(), Err(PassError::Gpu(_))));

        backend.bind_destination(Destination::Screen);
        backend.draw().unwrap();
        assert_eq!(log.draws().len(), 1);
    }

    #[test]
    fn destroyed_targets_cannot_be_sampled() {
        let (mut backend, _) = HeadlessBackend::new(Size::new(4, 4));
        let p = program(&mut backend, 1);
        let target = backend.create_target(Size::new(4, 4), TargetFormat::Rgba8Unorm).unwrap();
        let texture = backend.target_texture(target).unwrap();
        backend.destroy_target(target);

        backend.use_program(p).unwrap();
        backend.upload_uniforms(p, &[0; 16], &[Some(texture)]).unwrap();
        assert!(matches!(
            backend.draw(),
            Err(PassError::UnknownResource { kind: "texture", .. })
        ));
        assert_eq!(backend.live_targets(), 0);
    }
}
