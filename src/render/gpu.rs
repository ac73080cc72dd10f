//! `wgpu` implementation of [`GpuDevice`]: an offscreen `Rgba8Unorm` render target, one
//! pipeline per blend state and readback into a CPU front buffer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::compose::blend::BlendType;
use crate::compose::mask::MASK_LEVELS;
use crate::foundation::core::{PixelRect, TransferRect};
use crate::foundation::error::{RenderError, RenderResult};
use crate::foundation::pixel::{Pixel, PixelFormat};
use crate::render::backend::BackendKind;
use crate::render::device::{DeviceTexture, DrawOp, GpuDevice};
use crate::render::surface::{DisplaySurface, PixelView};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const MODE_COPY: u32 = 0;
const MODE_BLEND: u32 = 1;
const MODE_MASK: u32 = 2;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawParams {
    src_offset: [i32; 2],
    alpha: f32,
    mode: u32,
    level: u32,
    _pad: [u32; 3],
}

const SHADER: &str = r#"
struct Params {
  src_offset: vec2<i32>,
  alpha: f32,
  mode: u32,
  level: u32,
};

@group(0) @binding(0) var t_src: texture_2d<f32>;
@group(0) @binding(1) var<uniform> params: Params;

@vertex
fn vs(@builtin(vertex_index) vi: u32) -> @builtin(position) vec4<f32> {
  var p = array<vec2<f32>, 3>(
    vec2<f32>(-1.0, -1.0),
    vec2<f32>( 3.0, -1.0),
    vec2<f32>(-1.0,  3.0),
  );
  return vec4<f32>(p[vi], 0.0, 1.0);
}

fn bayer8(p: vec2<u32>) -> u32 {
  var v = 0u;
  for (var i = 0u; i < 3u; i = i + 1u) {
    let bx = (p.x >> i) & 1u;
    let by = (p.y >> i) & 1u;
    v = v | ((((bx ^ by) << 1u) | by) << (2u * (2u - i)));
  }
  return v;
}

@fragment
fn fs(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
  let dst = vec2<i32>(floor(pos.xy));
  if (params.mode == 2u) {
    let threshold = bayer8(vec2<u32>(dst & vec2<i32>(7))) * 28u / 64u;
    if (threshold > params.level) {
      discard;
    }
  }
  let c = textureLoad(t_src, dst + params.src_offset, 0);
  if (params.mode == 0u) {
    return c;
  }
  return vec4<f32>(c.rgb, c.a * params.alpha);
}
"#;

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct Pipelines {
    layout: wgpu::BindGroupLayout,
    params: wgpu::Buffer,
    copy: wgpu::RenderPipeline,
    normal: wgpu::RenderPipeline,
    add: wgpu::RenderPipeline,
    sub: wgpu::RenderPipeline,
}

impl Pipelines {
    fn for_blend(&self, blend: BlendType) -> &wgpu::RenderPipeline {
        match blend {
            BlendType::None => &self.copy,
            BlendType::Fast | BlendType::Normal => &self.normal,
            BlendType::Add => &self.add,
            BlendType::Sub => &self.sub,
        }
    }
}

struct Target {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    readback: wgpu::Buffer,
    readback_bytes_per_row: u32,
}

/// GPU device backed by `wgpu`.
pub struct WgpuDevice {
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    lost: Arc<AtomicBool>,
    pipelines: Option<Pipelines>,
    target: Option<Target>,
    textures: Vec<Option<GpuTexture>>,
    front: Vec<Pixel>,
    width: u32,
    height: u32,
    in_scene: bool,
}

impl WgpuDevice {
    /// Request an adapter and device. Fails with a device error when no adapter exists.
    pub fn new() -> RenderResult<Self> {
        let mut dev = Self {
            device: None,
            queue: None,
            lost: Arc::new(AtomicBool::new(false)),
            pipelines: None,
            target: None,
            textures: Vec::new(),
            front: Vec::new(),
            width: 0,
            height: 0,
            in_scene: false,
        };
        dev.ensure_device()?;
        Ok(dev)
    }

    fn ensure_device(&mut self) -> RenderResult<()> {
        if self.device.is_some() {
            return Ok(());
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| match e {
            wgpu::RequestAdapterError::NotFound { .. } => {
                RenderError::device("no gpu adapter available")
            }
            other => RenderError::device(format!("wgpu request_adapter failed: {other:?}")),
        })?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("vn_render_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| RenderError::device(format!("wgpu request_device failed: {e:?}")))?;

        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, msg| {
            tracing::error!(?reason, %msg, "wgpu device lost");
            flag.store(true, Ordering::SeqCst);
        });

        self.pipelines = Some(create_pipelines(&device));
        self.lost = lost;
        self.device = Some(device);
        self.queue = Some(queue);
        Ok(())
    }

    fn check_alive(&self) -> RenderResult<()> {
        if self.lost.load(Ordering::SeqCst) {
            return Err(RenderError::device_lost("wgpu device was lost"));
        }
        Ok(())
    }

    fn parts(&self) -> RenderResult<(&wgpu::Device, &wgpu::Queue, &Target, &Pipelines)> {
        let not_init = || RenderError::device("gpu device not initialized");
        Ok((
            self.device.as_ref().ok_or_else(not_init)?,
            self.queue.as_ref().ok_or_else(not_init)?,
            self.target.as_ref().ok_or_else(not_init)?,
            self.pipelines.as_ref().ok_or_else(not_init)?,
        ))
    }

    fn write_target(&self, rect: PixelRect, pixels: &[Pixel]) -> RenderResult<()> {
        let (_, queue, target, _) = self.parts()?;
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: rect.x as u32,
                    y: rect.y as u32,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(pixels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(rect.width as u32 * 4),
                rows_per_image: Some(rect.height as u32),
            },
            wgpu::Extent3d {
                width: rect.width as u32,
                height: rect.height as u32,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn blit(
        &self,
        texture: DeviceTexture,
        rect: TransferRect,
        params: DrawParams,
        blend: BlendType,
    ) -> RenderResult<()> {
        let (device, queue, target, pipelines) = self.parts()?;
        let src = self
            .textures
            .get(texture as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| RenderError::device(format!("unknown texture slot {texture}")))?;
        if rect.is_empty()
            || rect.src_x < 0
            || rect.src_y < 0
            || (rect.src_x + rect.width) as u32 > src.width
            || (rect.src_y + rect.height) as u32 > src.height
        {
            return Err(RenderError::device("blit rectangle is not clipped to the texture"));
        }

        queue.write_buffer(&pipelines.params, 0, bytemuck::bytes_of(&params));
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("vn_render_blit_bg"),
            layout: &pipelines.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&src.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: pipelines.params.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("vn_render_blit_encoder"),
        });
        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("vn_render_blit_rp"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rp.set_pipeline(pipelines.for_blend(blend));
            rp.set_bind_group(0, &bind_group, &[]);
            rp.set_scissor_rect(
                rect.dst_x as u32,
                rect.dst_y as u32,
                rect.width as u32,
                rect.height as u32,
            );
            rp.draw(0..3, 0..1);
        }
        queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn read_target(&self) -> RenderResult<Vec<Pixel>> {
        let (device, queue, target, _) = self.parts()?;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("vn_render_readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &target.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(target.readback_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(Some(encoder.finish()));

        let slice = target.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| RenderError::device(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| RenderError::device("readback channel closed"))?
            .map_err(|e| RenderError::device(format!("readback map failed: {e:?}")))?;
        self.check_alive()?;

        let mapped = slice.get_mapped_range();
        let row_bytes = self.width as usize * 4;
        let padded = target.readback_bytes_per_row as usize;
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize);
        for row in 0..self.height as usize {
            let start = row * padded;
            out.extend(
                mapped[start..start + row_bytes]
                    .chunks_exact(4)
                    .map(|px| PixelFormat::Abgr.from_rgba([px[0], px[1], px[2], px[3]])),
            );
        }
        drop(mapped);
        target.readback.unmap();
        Ok(out)
    }
}

impl GpuDevice for WgpuDevice {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn initialize(&mut self, width: u32, height: u32, clear: Pixel) -> RenderResult<()> {
        self.ensure_device()?;
        self.check_alive()?;
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| RenderError::device("gpu device not initialized"))?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("vn_render_target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let readback_bytes_per_row = align_to(
            width
                .checked_mul(4)
                .ok_or_else(|| RenderError::allocation("render target width overflow"))?,
            wgpu::COPY_BYTES_PER_ROW_ALIGNMENT,
        );
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vn_render_readback"),
            size: u64::from(readback_bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        self.target = Some(Target {
            texture,
            view,
            readback,
            readback_bytes_per_row,
        });
        self.width = width;
        self.height = height;
        self.front = vec![clear; width as usize * height as usize];
        self.write_target(PixelRect::from_size(width, height), &self.front)?;
        self.in_scene = false;
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32) -> RenderResult<DeviceTexture> {
        self.check_alive()?;
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| RenderError::device("gpu device not initialized"))?;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("vn_render_image"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let entry = GpuTexture {
            texture,
            view,
            width,
            height,
        };
        let slot = match self.textures.iter().position(Option::is_none) {
            Some(free) => {
                self.textures[free] = Some(entry);
                free
            }
            None => {
                self.textures.push(Some(entry));
                self.textures.len() - 1
            }
        };
        u32::try_from(slot).map_err(|_| RenderError::allocation("texture slots exhausted"))
    }

    fn upload_texture(&mut self, texture: DeviceTexture, pixels: &[Pixel]) -> RenderResult<()> {
        self.check_alive()?;
        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| RenderError::device("gpu device not initialized"))?;
        let tex = self
            .textures
            .get(texture as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| RenderError::device(format!("unknown texture slot {texture}")))?;
        let len = tex.width as usize * tex.height as usize;
        if pixels.len() < len {
            return Err(RenderError::device(format!(
                "upload of {} pixels into {}x{} texture",
                pixels.len(),
                tex.width,
                tex.height
            )));
        }
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &tex.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&pixels[..len]),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(tex.width * 4),
                rows_per_image: Some(tex.height),
            },
            wgpu::Extent3d {
                width: tex.width,
                height: tex.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn release_texture(&mut self, texture: DeviceTexture) {
        if let Some(slot) = self.textures.get_mut(texture as usize)
            && let Some(tex) = slot.take()
        {
            tex.texture.destroy();
        }
    }

    fn begin_scene(&mut self) -> RenderResult<()> {
        self.check_alive()?;
        self.in_scene = true;
        Ok(())
    }

    fn draw(&mut self, op: &DrawOp) -> RenderResult<()> {
        self.check_alive()?;
        if !self.in_scene {
            return Err(RenderError::device("draw outside begin_scene/end_scene"));
        }
        match *op {
            DrawOp::Blit {
                texture,
                rect,
                alpha,
                blend,
            } => {
                let mode = if blend == BlendType::None {
                    MODE_COPY
                } else {
                    MODE_BLEND
                };
                let params = draw_params(rect, f32::from(alpha) / 255.0, mode, 0);
                self.blit(texture, rect, params, blend)
            }
            DrawOp::Mask {
                texture,
                rect,
                level,
            } => {
                debug_assert!(level < MASK_LEVELS);
                let params = draw_params(rect, 1.0, MODE_MASK, u32::from(level));
                self.blit(texture, rect, params, BlendType::Normal)
            }
            DrawOp::Clear { rect, color } => {
                let r = rect.intersect(PixelRect::from_size(self.width, self.height));
                if r.is_empty() {
                    return Ok(());
                }
                let fill = vec![color; r.area() as usize];
                self.write_target(r, &fill)
            }
        }
    }

    fn end_scene(&mut self) -> RenderResult<()> {
        self.check_alive()?;
        self.in_scene = false;
        self.front = self.read_target()?;
        Ok(())
    }

    fn discard_scene(&mut self) {
        self.in_scene = false;
        let full = PixelRect::from_size(self.width, self.height);
        if let Err(err) = self.write_target(full, &self.front) {
            tracing::debug!(error = %err, "could not roll back render target");
        }
    }

    fn present(
        &mut self,
        rect: PixelRect,
        offset: (i32, i32),
        surface: &mut dyn DisplaySurface,
    ) -> RenderResult<()> {
        self.check_alive()?;
        let view = PixelView {
            pixels: &self.front,
            width: self.width,
            height: self.height,
            format: PixelFormat::Abgr,
        };
        surface.present(view, rect, offset)
    }

    fn read_front(&mut self) -> RenderResult<Vec<Pixel>> {
        self.check_alive()?;
        Ok(self.front.clone())
    }

    fn reset(&mut self) -> RenderResult<()> {
        self.textures.clear();
        self.target = None;
        self.pipelines = None;
        self.queue = None;
        if let Some(device) = self.device.take() {
            device.destroy();
        }
        self.front.clear();
        self.in_scene = false;
        self.lost = Arc::new(AtomicBool::new(false));
        Ok(())
    }
}

fn draw_params(rect: TransferRect, alpha: f32, mode: u32, level: u32) -> DrawParams {
    DrawParams {
        src_offset: [rect.src_x - rect.dst_x, rect.src_y - rect.dst_y],
        alpha,
        mode,
        level,
        _pad: [0; 3],
    }
}

fn create_pipelines(device: &wgpu::Device) -> Pipelines {
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("vn_render_blit_bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    });

    let params = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("vn_render_blit_params"),
        size: std::mem::size_of::<DrawParams>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("vn_render_blit_shader"),
        source: wgpu::ShaderSource::Wgsl(SHADER.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("vn_render_blit_pl"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    let keep_dst_alpha = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    };
    let pipeline = |label: &str, blend: Option<wgpu::BlendState>| {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    };

    Pipelines {
        copy: pipeline("vn_render_copy", None),
        normal: pipeline(
            "vn_render_normal",
            Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
        ),
        add: pipeline(
            "vn_render_add",
            Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: keep_dst_alpha,
            }),
        ),
        sub: pipeline(
            "vn_render_sub",
            Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::ReverseSubtract,
                },
                alpha: keep_dst_alpha,
            }),
        ),
        layout,
        params,
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}
