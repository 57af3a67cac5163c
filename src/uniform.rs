//! Declared uniform sets and their packing into a WGSL uniform block.
//!
//! Every uniform a program will ever receive is declared when the program is created.
//! Setting a name that was not declared is a wiring mistake and fails immediately.
//!
//! # Layout
//!
//! Non-texture uniforms are packed, in declaration order, into one struct bound at
//! `@group(0) @binding(0)`, following WGSL's uniform address space rules:
//!
//! | kind              | WGSL type          | align | size     |
//! |-------------------|--------------------|-------|----------|
//! | `Float` / `Int`   | `f32` / `i32`      | 4     | 4        |
//! | `Vec2` / `IVec2`  | `vec2f` / `vec2i`  | 8     | 8        |
//! | `Vec3` / `IVec3`  | `vec3f` / `vec3i`  | 16    | 12       |
//! | `Vec4` / `IVec4`  | `vec4f` / `vec4i`  | 16    | 16       |
//! | `FloatList`       | `array<vec4f, N>`  | 16    | 16 × N   |
//! | `IntList`         | `array<vec4i, N>`  | 16    | 16 × N   |
//!
//! List elements narrower than four components are zero-padded to a 16-byte stride.
//! Texture uniforms are not part of the block: the `k`-th texture in declaration order
//! is bound at `@binding(1 + 2k)` with its sampler at `@binding(2 + 2k)`.

use std::collections::HashMap;

use crate::backend::TextureHandle;
use crate::error::{PassError, PassResult};

/// The declared type of a uniform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    /// Up to `len` vectors of `width` floats (1..=4).
    FloatList { width: u8, len: usize },
    /// Up to `len` vectors of `width` ints (1..=4).
    IntList { width: u8, len: usize },
    Texture,
}

impl UniformKind {
    fn name(self) -> &'static str {
        match self {
            UniformKind::Float => "float",
            UniformKind::Vec2 => "vec2",
            UniformKind::Vec3 => "vec3",
            UniformKind::Vec4 => "vec4",
            UniformKind::Int => "int",
            UniformKind::IVec2 => "ivec2",
            UniformKind::IVec3 => "ivec3",
            UniformKind::IVec4 => "ivec4",
            UniformKind::FloatList { .. } => "float list",
            UniformKind::IntList { .. } => "int list",
            UniformKind::Texture => "texture",
        }
    }

    /// `(align, size)` in the uniform block, or `None` for textures.
    fn block_layout(self) -> Option<(usize, usize)> {
        match self {
            UniformKind::Float | UniformKind::Int => Some((4, 4)),
            UniformKind::Vec2 | UniformKind::IVec2 => Some((8, 8)),
            UniformKind::Vec3 | UniformKind::IVec3 => Some((16, 12)),
            UniformKind::Vec4 | UniformKind::IVec4 => Some((16, 16)),
            UniformKind::FloatList { len, .. } | UniformKind::IntList { len, .. } => {
                Some((16, 16 * len))
            }
            UniformKind::Texture => None,
        }
    }
}

/// A value for a declared uniform.
#[derive(Clone, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
    IVec2([i32; 2]),
    IVec3([i32; 3]),
    IVec4([i32; 4]),
    /// A homogeneous list of float vectors, flattened on upload.
    FloatList(Vec<Vec<f32>>),
    /// A homogeneous list of int vectors, flattened on upload.
    IntList(Vec<Vec<i32>>),
    /// An opaque texture handle, or `None` until one is linked.
    Texture(Option<TextureHandle>),
}

impl UniformValue {
    fn kind_name(&self) -> &'static str {
        match self {
            UniformValue::Float(_) => "float",
            UniformValue::Vec2(_) => "vec2",
            UniformValue::Vec3(_) => "vec3",
            UniformValue::Vec4(_) => "vec4",
            UniformValue::Int(_) => "int",
            UniformValue::IVec2(_) => "ivec2",
            UniformValue::IVec3(_) => "ivec3",
            UniformValue::IVec4(_) => "ivec4",
            UniformValue::FloatList(_) => "float list",
            UniformValue::IntList(_) => "int list",
            UniformValue::Texture(_) => "texture",
        }
    }

    /// The kind this value would declare on its own.
    fn natural_kind(&self) -> UniformKind {
        fn width<T>(items: &[Vec<T>]) -> u8 {
            items.first().map_or(4, |v| v.len().clamp(1, 4) as u8)
        }
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::IVec2(_) => UniformKind::IVec2,
            UniformValue::IVec3(_) => UniformKind::IVec3,
            UniformValue::IVec4(_) => UniformKind::IVec4,
            UniformValue::FloatList(items) => UniformKind::FloatList {
                width: width(items),
                len: items.len(),
            },
            UniformValue::IntList(items) => UniformKind::IntList {
                width: width(items),
                len: items.len(),
            },
            UniformValue::Texture(_) => UniformKind::Texture,
        }
    }

    fn fits(&self, kind: UniformKind) -> bool {
        fn list_fits<T>(items: &[Vec<T>], width: u8, len: usize) -> bool {
            items.len() <= len && items.iter().all(|v| v.len() == width as usize)
        }
        match (self, kind) {
            (UniformValue::FloatList(items), UniformKind::FloatList { width, len }) => {
                list_fits(items, width, len)
            }
            (UniformValue::IntList(items), UniformKind::IntList { width, len }) => {
                list_fits(items, width, len)
            }
            (value, kind) => value.natural_kind() == kind,
        }
    }

    fn write(&self, out: &mut [u8]) {
        fn put<T: bytemuck::Pod>(out: &mut [u8], values: &[T]) {
            let bytes: &[u8] = bytemuck::cast_slice(values);
            out[..bytes.len()].copy_from_slice(bytes);
        }
        match self {
            UniformValue::Float(v) => put(out, &[*v]),
            UniformValue::Vec2(v) => put(out, v),
            UniformValue::Vec3(v) => put(out, v),
            UniformValue::Vec4(v) => put(out, v),
            UniformValue::Int(v) => put(out, &[*v]),
            UniformValue::IVec2(v) => put(out, v),
            UniformValue::IVec3(v) => put(out, v),
            UniformValue::IVec4(v) => put(out, v),
            UniformValue::FloatList(items) => {
                for (i, item) in items.iter().enumerate() {
                    put(&mut out[i * 16..], item);
                }
            }
            UniformValue::IntList(items) => {
                for (i, item) in items.iter().enumerate() {
                    put(&mut out[i * 16..], item);
                }
            }
            UniformValue::Texture(_) => {}
        }
    }
}

/// A uniform declaration: name, type and initial value.
#[derive(Clone, Debug, PartialEq)]
pub struct Uniform {
    pub name: String,
    pub kind: UniformKind,
    pub value: UniformValue,
}

impl Uniform {
    /// Declare a uniform whose type is taken from its initial value.
    pub fn new(name: impl Into<String>, value: impl Into<UniformValue>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            kind: value.natural_kind(),
            value,
        }
    }

    /// Declare a texture uniform with nothing bound yet.
    pub fn texture(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: UniformKind::Texture,
            value: UniformValue::Texture(None),
        }
    }

    /// Declare a list of up to `len` float vectors of `width` components, initially empty.
    pub fn float_list(name: impl Into<String>, width: u8, len: usize) -> Self {
        Self {
            name: name.into(),
            kind: UniformKind::FloatList {
                width: width.clamp(1, 4),
                len,
            },
            value: UniformValue::FloatList(Vec::new()),
        }
    }

    /// Declare a list of up to `len` int vectors of `width` components, initially empty.
    pub fn int_list(name: impl Into<String>, width: u8, len: usize) -> Self {
        Self {
            name: name.into(),
            kind: UniformKind::IntList {
                width: width.clamp(1, 4),
                len,
            },
            value: UniformValue::IntList(Vec::new()),
        }
    }
}

/// What a backend needs to know to build bind group layouts for a program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformLayout {
    /// Size in bytes of the uniform block, a multiple of 16.
    pub block_size: usize,
    /// Number of texture/sampler pairs following the block.
    pub texture_count: usize,
}

#[derive(Clone, Debug)]
struct Slot {
    name: String,
    kind: UniformKind,
    value: UniformValue,
    offset: Option<usize>,
}

/// The uniforms of one program, fixed at construction.
#[derive(Clone, Debug)]
pub struct UniformSet {
    label: String,
    slots: Vec<Slot>,
    index: HashMap<String, usize>,
    block_size: usize,
}

impl UniformSet {
    /// Build a set from declarations. A repeated name replaces the earlier declaration
    /// but keeps its position.
    pub fn new(
        label: impl Into<String>,
        declarations: impl IntoIterator<Item = Uniform>,
    ) -> PassResult<Self> {
        let mut slots: Vec<Slot> = Vec::new();
        let mut index = HashMap::new();

        for decl in declarations {
            if !decl.value.fits(decl.kind) {
                return Err(PassError::UniformTypeMismatch {
                    name: decl.name,
                    expected: decl.kind.name(),
                    actual: decl.value.kind_name(),
                });
            }
            let slot = Slot {
                name: decl.name.clone(),
                kind: decl.kind,
                value: decl.value,
                offset: None,
            };
            match index.get(&decl.name) {
                Some(&i) => slots[i] = slot,
                None => {
                    index.insert(decl.name, slots.len());
                    slots.push(slot);
                }
            }
        }

        let mut offset = 0usize;
        for slot in &mut slots {
            if let Some((align, size)) = slot.kind.block_layout() {
                offset = offset.next_multiple_of(align);
                slot.offset = Some(offset);
                offset += size;
            }
        }

        Ok(Self {
            label: label.into(),
            slots,
            index,
            block_size: offset.max(16).next_multiple_of(16),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn layout(&self) -> UniformLayout {
        UniformLayout {
            block_size: self.block_size,
            texture_count: self.texture_names().count(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn kind(&self, name: &str) -> Option<UniformKind> {
        self.index.get(name).map(|&i| self.slots[i].kind)
    }

    /// Current value of a declared uniform.
    pub fn get(&self, name: &str) -> PassResult<&UniformValue> {
        self.index
            .get(name)
            .map(|&i| &self.slots[i].value)
            .ok_or_else(|| PassError::unknown_uniform(name, &self.label))
    }

    /// Replace the value of a declared uniform.
    pub fn set(&mut self, name: &str, value: UniformValue) -> PassResult<()> {
        let &i = self
            .index
            .get(name)
            .ok_or_else(|| PassError::unknown_uniform(name, &self.label))?;
        let slot = &mut self.slots[i];
        if !value.fits(slot.kind) {
            return Err(PassError::UniformTypeMismatch {
                name: name.to_string(),
                expected: slot.kind.name(),
                actual: value.kind_name(),
            });
        }
        slot.value = value;
        Ok(())
    }

    /// Names of texture uniforms in binding order.
    pub fn texture_names(&self) -> impl Iterator<Item = &str> {
        self.slots
            .iter()
            .filter(|s| s.kind == UniformKind::Texture)
            .map(|s| s.name.as_str())
    }

    /// Bound textures in binding order.
    pub fn textures(&self) -> Vec<Option<TextureHandle>> {
        self.slots
            .iter()
            .filter_map(|s| match s.value {
                UniformValue::Texture(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    /// Pack every non-texture uniform into the block layout described in the module docs.
    pub fn pack(&self) -> Vec<u8> {
        let mut block = vec![0u8; self.block_size];
        for slot in &self.slots {
            if let Some(offset) = slot.offset {
                slot.value.write(&mut block[offset..]);
            }
        }
        block
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<glam::Vec2> for UniformValue {
    fn from(v: glam::Vec2) -> Self {
        UniformValue::Vec2(v.to_array())
    }
}

impl From<glam::Vec3> for UniformValue {
    fn from(v: glam::Vec3) -> Self {
        UniformValue::Vec3(v.to_array())
    }
}

impl From<glam::Vec4> for UniformValue {
    fn from(v: glam::Vec4) -> Self {
        UniformValue::Vec4(v.to_array())
    }
}

impl From<glam::IVec2> for UniformValue {
    fn from(v: glam::IVec2) -> Self {
        UniformValue::IVec2(v.to_array())
    }
}

impl From<glam::IVec3> for UniformValue {
    fn from(v: glam::IVec3) -> Self {
        UniformValue::IVec3(v.to_array())
    }
}

impl From<glam::IVec4> for UniformValue {
    fn from(v: glam::IVec4) -> Self {
        UniformValue::IVec4(v.to_array())
    }
}

impl From<Vec<glam::Vec2>> for UniformValue {
    fn from(v: Vec<glam::Vec2>) -> Self {
        UniformValue::FloatList(v.into_iter().map(|e| e.to_array().to_vec()).collect())
    }
}

impl From<Vec<glam::Vec3>> for UniformValue {
    fn from(v: Vec<glam::Vec3>) -> Self {
        UniformValue::FloatList(v.into_iter().map(|e| e.to_array().to_vec()).collect())
    }
}

impl From<Vec<glam::Vec4>> for UniformValue {
    fn from(v: Vec<glam::Vec4>) -> Self {
        UniformValue::FloatList(v.into_iter().map(|e| e.to_array().to_vec()).collect())
    }
}

impl From<TextureHandle> for UniformValue {
    fn from(t: TextureHandle) -> Self {
        UniformValue::Texture(Some(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn words(bytes: &[u8]) -> Vec<f32> {
        bytemuck::cast_slice::<u8, f32>(bytes).to_vec()
    }

    #[test]
    fn undeclared_uniform_is_rejected() {
        let mut set = UniformSet::new(
            "test",
            [Uniform::new("U1", 1.0f32), Uniform::new("U2", [0.0f32, 1.0])],
        )
        .unwrap();

        let err = set.set("U3", UniformValue::Float(2.0)).unwrap_err();
        assert!(matches!(err, PassError::UnknownUniform { ref name, .. } if name == "U3"));
        assert!(err.is_configuration());
    }

    #[test]
    fn wrong_type_is_rejected() {
        let mut set = UniformSet::new("test", [Uniform::new("amount", 0.5f32)]).unwrap();
        let err = set.set("amount", Vec2::ONE.into()).unwrap_err();
        assert!(matches!(err, PassError::UniformTypeMismatch { .. }));
    }

    #[test]
    fn block_follows_wgsl_alignment() {
        let set = UniformSet::new(
            "test",
            [
                Uniform::new("a", 1.0f32),
                Uniform::new("b", [2.0f32, 3.0]),
                Uniform::texture("tex"),
                Uniform::new("c", [4.0f32, 5.0, 6.0]),
                Uniform::new("d", 7.0f32),
            ],
        )
        .unwrap();

        // a @0, b @8, c @16 (vec3 aligns to 16), d @28 packs into c's tail.
        let block = words(&set.pack());
        assert_eq!(block.len(), 8);
        assert_eq!(block[0], 1.0);
        assert_eq!(&block[2..4], &[2.0, 3.0]);
        assert_eq!(&block[4..7], &[4.0, 5.0, 6.0]);
        assert_eq!(block[7], 7.0);
        assert_eq!(set.layout().texture_count, 1);
    }

    #[test]
    fn lists_are_flattened_with_vec4_stride() {
        let mut set = UniformSet::new("test", [Uniform::float_list("points", 2, 3)]).unwrap();
        set.set("points", vec![Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0)].into())
            .unwrap();

        let block = words(&set.pack());
        assert_eq!(block.len(), 12);
        assert_eq!(&block[0..4], &[1.0, 2.0, 0.0, 0.0]);
        assert_eq!(&block[4..8], &[3.0, 4.0, 0.0, 0.0]);
        assert_eq!(&block[8..12], &[0.0; 4]);
    }

    #[test]
    fn list_longer_than_declared_is_rejected() {
        let mut set = UniformSet::new("test", [Uniform::float_list("points", 2, 1)]).unwrap();
        let err = set
            .set("points", vec![Vec2::ZERO, Vec2::ONE].into())
            .unwrap_err();
        assert!(matches!(err, PassError::UniformTypeMismatch { .. }));
    }

    #[test]
    fn textures_are_reported_in_declaration_order() {
        let mut set = UniformSet::new(
            "test",
            [
                Uniform::texture("from"),
                Uniform::new("progress", 0.0f32),
                Uniform::texture("to"),
            ],
        )
        .unwrap();
        set.set("to", TextureHandle(7).into()).unwrap();

        assert_eq!(set.texture_names().collect::<Vec<_>>(), ["from", "to"]);
        assert_eq!(set.textures(), vec![None, Some(TextureHandle(7))]);
        assert_eq!(set.layout().block_size, 16);
    }
}
