use log::{debug, trace, warn};

use crate::backend::{ConstantBuffer, RenderBackend};
use crate::batch::{Batch, BoundTexture, SamplerState, TextureSlot};
use crate::error::{BufferKind, DeviceError};
use crate::shader::ShaderId;
use crate::texture::{TextureDesc, TextureFormat, TextureHandle, TextureRegion, TextureStore, TextureUsage};

use super::config::{DeviceCaps, DeviceConfig};
use super::constants::{ConstantCache, dims_hash, pack_pixel, tex_dims, transpose};
use super::dynamic::DynamicBuffer;
use super::stats::DeviceStats;

struct ShaderEntry<B: RenderBackend> {
    pipeline: B::Pipeline,
    resources: B::ResourceSet,
}

/// Backend texture plus the slot bindings created for it so far.
struct DeviceTexture<B: RenderBackend> {
    texture: B::Texture,
    bindings: Vec<(TextureSlot, SamplerState, B::TextureBinding)>,
}

/// Translates UI-library callbacks into backend calls.
///
/// Per frame the library calls, in order: [`begin_render`](Self::begin_render),
/// map/write/unmap of vertices and indices, any number of
/// [`draw_batch`](Self::draw_batch), then [`end_render`](Self::end_render).
pub struct RenderDevice<B: RenderBackend> {
    backend: B,
    config: DeviceConfig,
    shaders: Vec<ShaderEntry<B>>,
    constants: ConstantCache,
    vertices: DynamicBuffer,
    indices: DynamicBuffer,
    textures: TextureStore<DeviceTexture<B>>,
    stats: DeviceStats,
    warned_pixel_truncation: bool,
    warned_effect_truncation: bool,
    in_frame: bool,
}

impl<B: RenderBackend> RenderDevice<B> {
    /// Creates one pipeline and one resource set per shader permutation.
    pub fn new(mut backend: B, config: DeviceConfig) -> Result<Self, DeviceError> {
        let mut shaders = Vec::with_capacity(ShaderId::COUNT);
        for &shader in ShaderId::ALL {
            let layout = shader.vertex_layout();
            let pipeline = backend.create_pipeline(shader, &layout)?;
            let resources = backend.create_resource_set(shader)?;
            debug!(
                "pipeline {} ({} / {}, stride {})",
                shader.name(),
                shader.vertex_shader_key(),
                shader.fragment_shader_key(),
                layout.stride()
            );
            shaders.push(ShaderEntry { pipeline, resources });
        }

        let vertices = DynamicBuffer::new(BufferKind::Vertices, config.vertex_buffer_size);
        let indices = DynamicBuffer::new(BufferKind::Indices, config.index_buffer_size);
        backend.create_buffers(vertices.capacity() as u64, indices.capacity() as u64)?;

        Ok(Self {
            backend,
            config,
            shaders,
            constants: ConstantCache::default(),
            vertices,
            indices,
            textures: TextureStore::new(),
            stats: DeviceStats::default(),
            warned_pixel_truncation: false,
            warned_effect_truncation: false,
            in_frame: false,
        })
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    #[inline]
    pub fn caps(&self) -> DeviceCaps {
        self.config.caps
    }

    #[inline]
    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    /// Number of live textures.
    #[inline]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    #[inline]
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    // ── frame ────────────────────────────────────────────────────────────

    pub fn begin_render(&mut self, offscreen: bool) {
        self.in_frame = true;
        self.stats.frames += 1;
        self.backend.begin_render(offscreen);
    }

    /// Submits everything recorded during the frame.
    pub fn end_render(&mut self) -> Result<(), DeviceError> {
        self.in_frame = false;
        self.backend.flush()?;
        self.backend.end_render()
    }

    // ── dynamic buffers ──────────────────────────────────────────────────

    /// Reserves `bytes` of the vertex ring for writing.
    pub fn map_vertices(&mut self, bytes: u32) -> Result<&mut [u8], DeviceError> {
        self.map(BufferKind::Vertices, bytes)
    }

    pub fn unmap_vertices(&mut self) -> Result<(), DeviceError> {
        let (offset, data) = self.vertices.unmap()?;
        self.backend.write_vertices(offset as u64, data)
    }

    /// Reserves `bytes` of the index ring for writing. Indices are 16-bit.
    pub fn map_indices(&mut self, bytes: u32) -> Result<&mut [u8], DeviceError> {
        self.map(BufferKind::Indices, bytes)
    }

    pub fn unmap_indices(&mut self) -> Result<(), DeviceError> {
        let (offset, data) = self.indices.unmap()?;
        self.backend.write_indices(offset as u64, data)
    }

    fn ring(&mut self, kind: BufferKind) -> &mut DynamicBuffer {
        match kind {
            BufferKind::Vertices => &mut self.vertices,
            BufferKind::Indices => &mut self.indices,
        }
    }

    fn map(&mut self, kind: BufferKind, bytes: u32) -> Result<&mut [u8], DeviceError> {
        let mapping = self.ring(kind).map(bytes)?;
        if mapping.wrapped {
            trace!("{kind} wrapped for a {bytes} byte map");
            // Draws recorded so far still read the old contents.
            if let Err(err) = self.backend.flush() {
                self.ring(kind).cancel();
                return Err(err);
            }
            match kind {
                BufferKind::Vertices => self.stats.vertex_wraps += 1,
                BufferKind::Indices => self.stats.index_wraps += 1,
            }
        }
        Ok(self.ring(kind).region_mut())
    }

    // ── batches ──────────────────────────────────────────────────────────

    pub fn draw_batch(&mut self, batch: &Batch<'_>) -> Result<(), DeviceError> {
        if self.vertices.is_mapped() || self.indices.is_mapped() {
            return Err(DeviceError::BufferMapped);
        }

        // Resolve every texture before touching backend state, so a stale
        // handle leaves the backend untouched.
        let mut bindings: [Option<B::TextureBinding>; TextureSlot::COUNT] = Default::default();
        for slot in TextureSlot::ALL {
            if let Some(bound) = batch.texture(slot) {
                bindings[slot.index()] = Some(self.texture_binding(bound, slot)?);
            }
        }

        let entry = &self.shaders[batch.shader.index()];
        self.backend.set_pipeline(&entry.pipeline, &entry.resources);
        self.backend
            .set_render_state(batch.render_state, batch.stencil_ref);

        let vertex_offset = self.vertices.draw_pos() as u64 + batch.vertex_offset as u64;
        self.backend.set_buffers(vertex_offset);

        if let Some(proj) = batch.proj_mtx {
            if self.constants.differs(ConstantBuffer::Vertex, proj.hash) {
                self.upload(ConstantBuffer::Vertex, proj.hash, &transpose(proj.value))?;
            } else {
                self.stats.skipped_uploads += 1;
            }
        }

        if batch.has_pixel_constants() {
            let hash = batch.pixel_hash();
            if self.constants.differs(ConstantBuffer::Pixel, hash) {
                let mut packed = [0.0; 12];
                let (len, truncated) = pack_pixel(batch, &mut packed);
                if truncated && !self.warned_pixel_truncation {
                    warn!(
                        "{}: pixel constants exceed {} floats, extra values dropped",
                        batch.shader.name(),
                        packed.len()
                    );
                    self.warned_pixel_truncation = true;
                }
                self.upload(ConstantBuffer::Pixel, hash, &packed[..len])?;
            } else {
                self.stats.skipped_uploads += 1;
            }
        }

        if let Some(bound) = batch.dimension_texture() {
            let desc = self
                .textures
                .get(bound.handle)
                .map(|record| record.desc)
                .ok_or(DeviceError::InvalidTexture(bound.handle))?;
            let hash = dims_hash(desc.width, desc.height);
            if self.constants.differs(ConstantBuffer::TexDims, hash) {
                self.upload(ConstantBuffer::TexDims, hash, &tex_dims(desc.width, desc.height))?;
            } else {
                self.stats.skipped_uploads += 1;
            }
        }

        if let Some(params) = batch.effect_params.filter(|p| !p.value.is_empty()) {
            if self.constants.differs(ConstantBuffer::Effect, params.hash) {
                let limit = ConstantBuffer::Effect.floats();
                if params.value.len() > limit && !self.warned_effect_truncation {
                    warn!(
                        "{}: {} effect parameters, only {limit} are uploaded",
                        batch.shader.name(),
                        params.value.len()
                    );
                    self.warned_effect_truncation = true;
                }
                let len = params.value.len().min(limit);
                self.upload(ConstantBuffer::Effect, params.hash, &params.value[..len])?;
            } else {
                self.stats.skipped_uploads += 1;
            }
        }

        for slot in TextureSlot::ALL {
            self.backend.bind_texture(slot, bindings[slot.index()].as_ref());
        }

        let first_index = self.indices.draw_pos() / 2 + batch.start_index;
        self.backend.draw_indexed(first_index, batch.num_indices)?;
        self.stats.batches += 1;
        Ok(())
    }

    /// `hash` is recorded only after the backend accepted `data`.
    fn upload(&mut self, buffer: ConstantBuffer, hash: u32, data: &[f32]) -> Result<(), DeviceError> {
        self.backend.update_constants(buffer, data)?;
        self.constants.commit(buffer, hash);
        self.stats.constant_uploads[buffer.index()] += 1;
        Ok(())
    }

    /// Returns the backend binding of `bound` for `slot`, creating it on first use.
    fn texture_binding(
        &mut self,
        bound: BoundTexture,
        slot: TextureSlot,
    ) -> Result<B::TextureBinding, DeviceError> {
        let record = self
            .textures
            .get_mut(bound.handle)
            .ok_or(DeviceError::InvalidTexture(bound.handle))?;
        let entry = &mut record.value;

        if let Some((_, _, binding)) = entry
            .bindings
            .iter()
            .find(|(s, sampler, _)| *s == slot && *sampler == bound.sampler)
        {
            return Ok(binding.clone());
        }

        let binding = self
            .backend
            .create_texture_binding(&entry.texture, slot, bound.sampler)?;
        trace!("{} binding for texture {:?} ({:?})", slot.name(), bound.handle, bound.sampler);
        entry.bindings.push((slot, bound.sampler, binding.clone()));
        Ok(binding)
    }

    // ── textures ─────────────────────────────────────────────────────────

    /// Creates a texture. `levels`, when present, holds one tightly packed
    /// slice per mip level.
    pub fn create_texture(
        &mut self,
        desc: TextureDesc,
        levels: Option<&[&[u8]]>,
    ) -> Result<TextureHandle, DeviceError> {
        self.validate_texture(&desc)?;
        if let Some(levels) = levels {
            desc.validate_levels(levels)?;
        }
        let texture = self.backend.create_texture(&desc, levels)?;
        let handle = self.textures.insert(
            desc,
            DeviceTexture {
                texture,
                bindings: Vec::new(),
            },
        );
        self.stats.textures_created += 1;
        debug!(
            "texture {:?}: {}x{} {:?}, {} level(s)",
            handle, desc.width, desc.height, desc.format, desc.mip_levels
        );
        Ok(handle)
    }

    /// Checks `desc` against the backend's size limit and its mip chain.
    pub fn validate_texture(&self, desc: &TextureDesc) -> Result<(), DeviceError> {
        desc.validate_size(self.backend.max_texture_dimension())
    }

    pub fn texture_desc(&self, handle: TextureHandle) -> Result<&TextureDesc, DeviceError> {
        self.textures
            .get(handle)
            .map(|record| &record.desc)
            .ok_or(DeviceError::InvalidTexture(handle))
    }

    pub fn texture_width(&self, handle: TextureHandle) -> Result<u32, DeviceError> {
        self.texture_desc(handle).map(|desc| desc.width)
    }

    pub fn texture_height(&self, handle: TextureHandle) -> Result<u32, DeviceError> {
        self.texture_desc(handle).map(|desc| desc.height)
    }

    pub fn texture_has_mipmaps(&self, handle: TextureHandle) -> Result<bool, DeviceError> {
        self.texture_desc(handle).map(TextureDesc::has_mipmaps)
    }

    pub fn texture_is_inverted(&self, handle: TextureHandle) -> Result<bool, DeviceError> {
        self.texture_desc(handle).map(|desc| desc.inverted)
    }

    /// Replaces `region` of mip `level` with tightly packed `data`.
    pub fn update_texture(
        &mut self,
        handle: TextureHandle,
        level: u32,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let record = self
            .textures
            .get(handle)
            .ok_or(DeviceError::InvalidTexture(handle))?;
        let desc = record.desc;

        let (width, height) = desc.level_size(level);
        let inside = level < desc.mip_levels
            && region.x.checked_add(region.width).is_some_and(|x1| x1 <= width)
            && region.y.checked_add(region.height).is_some_and(|y1| y1 <= height);
        if !inside {
            return Err(DeviceError::InvalidRegion { level, region });
        }

        let expected = region.byte_len(desc.format);
        if data.len() < expected {
            return Err(DeviceError::InvalidTextureData {
                level,
                expected,
                actual: data.len(),
            });
        }

        self.backend
            .update_texture(&record.value.texture, &desc, level, region, &data[..expected])
    }

    pub fn destroy_texture(&mut self, handle: TextureHandle) -> Result<(), DeviceError> {
        let record = self
            .textures
            .remove(handle)
            .ok_or(DeviceError::InvalidTexture(handle))?;
        self.backend.destroy_texture(record.value.texture);
        self.stats.textures_destroyed += 1;
        debug!("texture {handle:?} destroyed");
        Ok(())
    }

    // ── render targets ───────────────────────────────────────────────────

    /// Registers a renderable color texture. Offscreen passes into it are
    /// not supported, but it can be created, queried and sampled.
    pub fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
        sample_count: u32,
    ) -> Result<TextureHandle, DeviceError> {
        let desc = TextureDesc {
            usage: TextureUsage::RenderTarget {
                sample_count: sample_count.max(1),
            },
            inverted: self.config.flipped_textures,
            ..TextureDesc::new(width, height, 1, TextureFormat::Rgba8)
        };
        self.create_texture(desc, None)
    }

    pub fn clone_render_target(&mut self, _source: TextureHandle) -> Result<TextureHandle, DeviceError> {
        Err(DeviceError::Unsupported("clone_render_target"))
    }

    pub fn set_render_target(&mut self, _target: TextureHandle) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported("set_render_target"))
    }

    pub fn begin_tile(&mut self, _target: TextureHandle, _tile: TextureRegion) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported("begin_tile"))
    }

    pub fn end_tile(&mut self, _target: TextureHandle) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported("end_tile"))
    }

    pub fn resolve_render_target(
        &mut self,
        _target: TextureHandle,
        _tiles: &[TextureRegion],
    ) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported("resolve_render_target"))
    }
}
