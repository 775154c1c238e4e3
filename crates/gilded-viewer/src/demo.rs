use std::collections::hash_map::DefaultHasher;
use std::ffi::c_void;
use std::hash::Hasher;
use std::path::PathBuf;
use std::ptr;

use anyhow::{Result, bail};
use glam::{Mat4, Vec2};
use log::info;

use gilded_device::abi::{RawBatch, RenderCallbacks};
use gilded_device::backend::gpu::{
    BuiltinShaders, DirectoryShaders, ShaderLibrary, WgpuBackend, WgpuBackendConfig,
};
use gilded_device::batch::{
    BoundTexture, MinMagFilter, MipFilter, SamplerState, TextureSlot, WrapMode,
};
use gilded_device::{Batch, DeviceConfig, RenderDevice, ShaderId, TextureFormat, TextureHandle};

use crate::gpu::Gpu;
use crate::time::FrameTime;

const CLEAR: wgpu::Color = wgpu::Color {
    r: 0.08,
    g: 0.09,
    b: 0.11,
    a: 1.0,
};

const RAMP_WIDTH: u32 = 256;
const CHECKER_SIZE: u32 = 64;

/// Options that shape the demo device.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub shader_dir: Option<PathBuf>,
    pub stencil: bool,
    pub stats_every: u64,
}

/// Synthetic scene driven through [`RenderCallbacks`].
///
/// The callback table is rebuilt for every frame and only used while no
/// other borrow of the device is alive.
pub struct Demo {
    device: RenderDevice<WgpuBackend>,
    ramp: TextureHandle,
    checker: TextureHandle,
    stats_every: u64,
}

impl Demo {
    pub fn new(gpu: &Gpu, config: DemoConfig) -> Result<Self> {
        let shaders: Box<dyn ShaderLibrary> = match config.shader_dir {
            Some(dir) => {
                info!("loading shaders from {}", dir.display());
                Box::new(DirectoryShaders::new(dir))
            }
            None => Box::new(BuiltinShaders),
        };
        let backend = WgpuBackend::new(
            gpu.device(),
            gpu.queue(),
            WgpuBackendConfig {
                color_format: gpu.surface_format(),
                stencil_format: config.stencil.then_some(wgpu::TextureFormat::Stencil8),
                ..Default::default()
            },
            shaders,
        );
        let mut device = RenderDevice::new(backend, DeviceConfig::default())?;
        info!("{} pipelines ready", device.backend().pipeline_count());

        let callbacks = RenderCallbacks::new(&mut device);
        let ramp = create_texture(&callbacks, RAMP_WIDTH, 1, TextureFormat::Rgba8, &ramp_pixels(0.0))?;
        let checker = create_texture(
            &callbacks,
            CHECKER_SIZE,
            CHECKER_SIZE,
            TextureFormat::Rgbx8,
            &checker_pixels(),
        )?;

        Ok(Self {
            device,
            ramp,
            checker,
            stats_every: config.stats_every,
        })
    }

    /// Renders one frame into `target`.
    pub fn render(
        &mut self,
        target: wgpu::TextureView,
        width: u32,
        height: u32,
        time: FrameTime,
    ) -> Result<()> {
        self.device
            .backend_mut()
            .set_frame_target(target, width, height, Some(CLEAR));
        self.device.begin_render(false);

        let scene = Scene::build(width as f32, height as f32, time.elapsed);
        let textures = SceneTextures {
            ramp: self.ramp,
            checker: self.checker,
        };
        let callbacks = RenderCallbacks::new(&mut self.device);
        let drawn = submit(&callbacks, &scene, textures, time.elapsed);

        // The frame is closed even when a callback failed, so the next one starts clean.
        self.device.end_render()?;
        drawn?;

        if self.stats_every > 0 && time.frame % self.stats_every == 0 {
            info!("frame {}: {:?}", time.frame, self.device.stats());
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone)]
struct SceneTextures {
    ramp: TextureHandle,
    checker: TextureHandle,
}

fn submit(cb: &RenderCallbacks, scene: &Scene, textures: SceneTextures, elapsed: f32) -> Result<()> {
    update_texture(cb, textures.ramp, RAMP_WIDTH, &ramp_pixels(elapsed * 0.1))?;

    write_mapped(cb.map_vertices, cb.unmap_vertices, cb.user_data, &scene.mesh.vertices)?;
    write_mapped(
        cb.map_indices,
        cb.unmap_indices,
        cb.user_data,
        bytemuck::cast_slice(&scene.mesh.indices),
    )?;

    let proj = scene.projection;
    let proj_hash = hash_floats(&proj);

    let panel_rgba = [0.16, 0.18, 0.22, 1.0];
    let panel = scene
        .panel
        .batch(ShaderId::Rgba)
        .with_projection(&proj, proj_hash)
        .with_rgba(&panel_rgba, hash_floats(&panel_rgba));
    draw(cb, &panel);

    let solid = scene
        .solid
        .batch(ShaderId::PathSolid)
        .with_projection(&proj, proj_hash);
    draw(cb, &solid);

    let ramp = BoundTexture::new(
        textures.ramp,
        SamplerState {
            wrap: WrapMode::ClampToEdge,
            filter: MinMagFilter::Linear,
            mip: MipFilter::Disabled,
        },
    );
    let gradient = scene
        .gradient
        .batch(ShaderId::PathLinear)
        .with_projection(&proj, proj_hash)
        .with_texture(TextureSlot::Ramps, ramp)
        .with_opacity(1.0, 1);
    draw(cb, &gradient);

    let checker = BoundTexture::new(
        textures.checker,
        SamplerState {
            wrap: WrapMode::Repeat,
            filter: MinMagFilter::Nearest,
            mip: MipFilter::Disabled,
        },
    );
    let image = scene
        .image
        .batch(ShaderId::ImageOpacitySolid)
        .with_projection(&proj, proj_hash)
        .with_texture(TextureSlot::Image, checker);
    draw(cb, &image);

    let spinner = scene
        .spinner
        .batch(ShaderId::PathAaSolid)
        .with_projection(&proj, proj_hash);
    draw(cb, &spinner);

    Ok(())
}

// ── scene geometry ───────────────────────────────────────────────────────

/// Vertex and index range of one shape inside the frame's mesh.
#[derive(Debug, Copy, Clone)]
struct Span {
    vertex_offset: u32,
    num_vertices: u32,
    start_index: u32,
    num_indices: u32,
}

impl Span {
    fn batch<'a>(self, shader: ShaderId) -> Batch<'a> {
        let mut batch = Batch::new(shader, self.num_vertices, self.num_indices);
        batch.vertex_offset = self.vertex_offset;
        batch.start_index = self.start_index;
        batch
    }
}

#[derive(Debug, Default)]
struct Mesh {
    vertices: Vec<u8>,
    indices: Vec<u16>,
}

impl Mesh {
    /// Appends a quad. `vertex` writes corner `i` (clockwise from top-left).
    /// Indices are local to the quad: the device offsets the vertex buffer
    /// to the span's first vertex.
    fn quad(&mut self, mut vertex: impl FnMut(usize, &mut Vec<u8>)) -> Span {
        let vertex_offset = self.vertices.len() as u32;
        for i in 0..4 {
            vertex(i, &mut self.vertices);
        }
        let start_index = self.indices.len() as u32;
        self.indices.extend_from_slice(&[0, 1, 2, 0, 2, 3]);
        Span {
            vertex_offset,
            num_vertices: 4,
            start_index,
            num_indices: 6,
        }
    }
}

fn push_vec2(out: &mut Vec<u8>, v: Vec2) {
    out.extend_from_slice(bytemuck::cast_slice(&v.to_array()));
}

fn rect(x: f32, y: f32, w: f32, h: f32) -> [Vec2; 4] {
    [
        Vec2::new(x, y),
        Vec2::new(x + w, y),
        Vec2::new(x + w, y + h),
        Vec2::new(x, y + h),
    ]
}

const UNIT: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
];

struct Scene {
    /// Row-major, as the UI library supplies it.
    projection: [f32; 16],
    mesh: Mesh,
    panel: Span,
    solid: Span,
    gradient: Span,
    image: Span,
    spinner: Span,
}

impl Scene {
    fn build(width: f32, height: f32, elapsed: f32) -> Self {
        let projection = Mat4::orthographic_rh(0.0, width, height, 0.0, -1.0, 1.0)
            .transpose()
            .to_cols_array();

        let mut mesh = Mesh::default();
        let margin = 24.0;

        let panel_corners = rect(margin, margin, width - 2.0 * margin, height - 2.0 * margin);
        let panel = mesh.quad(|i, out| push_vec2(out, panel_corners[i]));

        // Premultiplied amber.
        let solid_corners = rect(64.0, 64.0, 220.0, 140.0);
        let solid = mesh.quad(|i, out| {
            push_vec2(out, solid_corners[i]);
            out.extend_from_slice(&[230, 160, 40, 255]);
        });

        let gradient_corners = rect(320.0, 64.0, 320.0, 140.0);
        let gradient = mesh.quad(|i, out| {
            push_vec2(out, gradient_corners[i]);
            push_vec2(out, Vec2::new(UNIT[i].x, 0.5));
        });

        let image_corners = rect(64.0, 240.0, 256.0, 256.0);
        let image = mesh.quad(|i, out| {
            push_vec2(out, image_corners[i]);
            out.extend_from_slice(&[255, 255, 255, 255]);
            push_vec2(out, UNIT[i] * 4.0);
        });

        let center = Vec2::new(480.0, 368.0);
        let rotation = Vec2::from_angle(elapsed);
        let spinner = mesh.quad(|i, out| {
            let corner = (UNIT[i] - Vec2::splat(0.5)) * 120.0;
            push_vec2(out, center + rotation.rotate(corner));
            out.extend_from_slice(&[60, 140, 220, 255]);
            out.extend_from_slice(bytemuck::bytes_of(&1.0f32));
        });

        Self {
            projection,
            mesh,
            panel,
            solid,
            gradient,
            image,
            spinner,
        }
    }
}

// ── textures ─────────────────────────────────────────────────────────────

/// Premultiplied ramp cycling through hues as `phase` advances.
fn ramp_pixels(phase: f32) -> Vec<u8> {
    (0..RAMP_WIDTH)
        .flat_map(|x| {
            let t = x as f32 / (RAMP_WIDTH - 1) as f32 + phase;
            let channel = |offset: f32| {
                let v = 0.5 + 0.5 * (std::f32::consts::TAU * (t + offset)).cos();
                (v * 255.0) as u8
            };
            [channel(0.0), channel(1.0 / 3.0), channel(2.0 / 3.0), 255]
        })
        .collect()
}

/// 8x8 texel checker; alpha left at zero to exercise RGBX handling.
fn checker_pixels() -> Vec<u8> {
    (0..CHECKER_SIZE * CHECKER_SIZE)
        .flat_map(|i| {
            let (x, y) = (i % CHECKER_SIZE / 8, i / CHECKER_SIZE / 8);
            if (x + y) % 2 == 0 {
                [220, 220, 220, 0]
            } else {
                [90, 90, 100, 0]
            }
        })
        .collect()
}

fn hash_floats(values: &[f32]) -> u32 {
    let mut hasher = DefaultHasher::new();
    hasher.write(bytemuck::cast_slice(values));
    hasher.finish() as u32
}

// ── callback plumbing ────────────────────────────────────────────────────

fn create_texture(
    cb: &RenderCallbacks,
    width: u32,
    height: u32,
    format: TextureFormat,
    data: &[u8],
) -> Result<TextureHandle> {
    let levels = [data.as_ptr().cast::<c_void>()];
    // SAFETY: `levels` holds one level of `width * height` texels and the
    // table was built from a live device.
    let bits = unsafe {
        (cb.create_texture)(cb.user_data, width, height, 1, format as u8, levels.as_ptr())
    };
    match TextureHandle::from_bits(bits) {
        Some(handle) => Ok(handle),
        None => bail!("device rejected {width}x{height} {format:?} texture"),
    }
}

fn update_texture(cb: &RenderCallbacks, texture: TextureHandle, width: u32, data: &[u8]) -> Result<()> {
    // SAFETY: `data` covers a `width x 1` region of level 0.
    let ok = unsafe {
        (cb.update_texture)(
            cb.user_data,
            texture.to_bits(),
            0,
            0,
            0,
            width,
            1,
            data.as_ptr().cast(),
        )
    };
    if !ok {
        bail!("texture update failed");
    }
    Ok(())
}

fn write_mapped(
    map: gilded_device::abi::MapFn,
    unmap: gilded_device::abi::UnmapFn,
    user_data: *mut c_void,
    data: &[u8],
) -> Result<()> {
    // SAFETY: a non-null mapping is valid for `data.len()` bytes until unmap.
    unsafe {
        let dst = map(user_data, data.len() as u32);
        if dst.is_null() {
            bail!("failed to map {} bytes", data.len());
        }
        ptr::copy_nonoverlapping(data.as_ptr(), dst.cast::<u8>(), data.len());
        unmap(user_data);
    }
    Ok(())
}

fn draw(cb: &RenderCallbacks, batch: &Batch<'_>) {
    let raw = RawBatch::from(batch);
    // SAFETY: every block `raw` points to is borrowed by `batch`.
    unsafe { (cb.draw_batch)(cb.user_data, &raw) };
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn quads_use_local_indices() {
        let scene = Scene::build(960.0, 600.0, 0.0);
        assert_eq!(scene.mesh.indices.len(), 30);
        assert_eq!(scene.solid.start_index, 6);
        assert_eq!(&scene.mesh.indices[6..12], &[0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn spans_match_vertex_strides() {
        let scene = Scene::build(960.0, 600.0, 0.0);
        let spans = [
            (scene.panel, ShaderId::Rgba),
            (scene.solid, ShaderId::PathSolid),
            (scene.gradient, ShaderId::PathLinear),
            (scene.image, ShaderId::ImageOpacitySolid),
            (scene.spinner, ShaderId::PathAaSolid),
        ];
        let mut offset = 0;
        for (span, shader) in spans {
            assert_eq!(span.vertex_offset, offset, "{}", shader.name());
            offset += 4 * shader.vertex_layout().stride();
        }
        assert_eq!(offset as usize, scene.mesh.vertices.len());
    }

    #[test]
    fn projection_is_row_major() {
        let scene = Scene::build(200.0, 100.0, 0.0);
        // Translation sits in the last column of each row.
        assert_eq!(scene.projection[3], -1.0);
        assert_eq!(scene.projection[7], 1.0);
        assert_relative_eq!(scene.projection[0], 0.01, epsilon = 1e-6);
    }

    #[test]
    fn texture_sizes_match_formats() {
        assert_eq!(ramp_pixels(0.3).len(), RAMP_WIDTH as usize * 4);
        assert_eq!(checker_pixels().len(), (CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
    }
}
