//! Presents RGBA frames in a window with `wgpu`.

use std::rc::Rc;

use anyhow::{anyhow, Context};
use wgpu::*;
use winit::{dpi::PhysicalSize, event_loop::EventLoopWindowTarget, window::WindowBuilder};

use crate::image::Resolution;

/// Matches the pixel layout of [`crate::image::Image`].
const FRAME_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

/// The graphics device, shared by all windows.
pub struct Gpu {
    instance: Instance,
    adapter: Adapter,
    device: Device,
    queue: Queue,
}

impl Gpu {
    pub async fn open() -> anyhow::Result<Self> {
        // Only Vulkan, Metal and DX12. The GL backend is not reliable enough.
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&RequestAdapterOptions::default())
            .await
            .ok_or_else(|| anyhow!("no usable graphics adapter"))?;
        let info = adapter.get_info();
        log::info!(
            "graphics adapter: {} ({:?} via {:?})",
            info.name,
            info.device_type,
            info.backend
        );

        // Webcam frames may exceed the downlevel texture size limit.
        let limits = Limits::downlevel_defaults().using_resolution(adapter.limits());
        let descriptor = DeviceDescriptor {
            label: None,
            features: Features::empty(),
            limits,
        };
        let (device, queue) = adapter
            .request_device(&descriptor, None)
            .await
            .context("failed to open graphics device")?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

/// A window showing one frame at a time, stretched over the whole window.
pub struct Renderer {
    gpu: Rc<Gpu>,
    resolution: Resolution,
    surface: Surface,
    surface_format: TextureFormat,
    pipeline: RenderPipeline,
    layout: BindGroupLayout,
    sampler: Sampler,
    frame: FrameTexture,
    // Dropped after `surface`, which refers to it.
    window: winit::window::Window,
}

/// A frame texture and the bind group that exposes it to the shader.
struct FrameTexture {
    size: Extent3d,
    texture: Texture,
    bind_group: BindGroup,
}

impl FrameTexture {
    fn new(gpu: &Gpu, layout: &BindGroupLayout, sampler: &Sampler, size: Extent3d) -> Self {
        let texture = gpu.device.create_texture(&TextureDescriptor {
            label: Some("frame"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: FRAME_FORMAT,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor::default());
        let bind_group = gpu.device.create_bind_group(&BindGroupDescriptor {
            label: Some("frame"),
            layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(sampler),
                },
            ],
        });
        Self {
            size,
            texture,
            bind_group,
        }
    }
}

impl Renderer {
    /// Opens a non-resizable window of size `resolution`.
    pub fn open<T>(
        target: &EventLoopWindowTarget<T>,
        title: &str,
        resolution: Resolution,
        gpu: Rc<Gpu>,
    ) -> anyhow::Result<Self> {
        let window = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(resolution.width(), resolution.height()))
            .with_resizable(false)
            .build(target)
            .with_context(|| format!("failed to open window '{title}'"))?;

        // SAFETY: the surface is dropped before `window`, see the field order of `Renderer`.
        let surface = unsafe { gpu.instance.create_surface(&window)? };
        let surface_format = surface
            .get_capabilities(&gpu.adapter)
            .formats
            .first()
            .copied()
            .context("window surface supports no texture format")?;

        let layout = gpu
            .device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("frame"),
                entries: &[
                    BindGroupLayoutEntry {
                        binding: 0,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Texture {
                            sample_type: TextureSampleType::Float { filterable: false },
                            view_dimension: TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    BindGroupLayoutEntry {
                        binding: 1,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Sampler(SamplerBindingType::NonFiltering),
                        count: None,
                    },
                ],
            });
        let pipeline = create_pipeline(&gpu.device, &layout, surface_format);
        let sampler = gpu.device.create_sampler(&SamplerDescriptor::default());
        let frame = FrameTexture::new(&gpu, &layout, &sampler, Extent3d::default());

        let renderer = Self {
            gpu,
            resolution,
            surface,
            surface_format,
            pipeline,
            layout,
            sampler,
            frame,
            window,
        };
        renderer.configure_surface();
        Ok(renderer)
    }

    pub fn window(&self) -> &winit::window::Window {
        &self.window
    }

    /// Uploads an RGBA8 frame, replacing the texture if the frame size changed.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not the size of a `res` frame.
    pub fn update_texture(&mut self, res: Resolution, data: &[u8]) {
        assert_eq!(
            data.len(),
            res.width() as usize * res.height() as usize * 4,
            "frame data does not match resolution {res}"
        );

        let size = Extent3d {
            width: res.width(),
            height: res.height(),
            depth_or_array_layers: 1,
        };
        if self.frame.size != size {
            log::trace!("frame size changed to {res}, replacing texture");
            self.frame = FrameTexture::new(&self.gpu, &self.layout, &self.sampler, size);
        }

        self.gpu.queue.write_texture(
            self.frame.texture.as_image_copy(),
            data,
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * res.width()),
                rows_per_image: None,
            },
            size,
        );
    }

    pub fn redraw(&mut self) -> anyhow::Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(err @ (SurfaceError::Lost | SurfaceError::Outdated)) => {
                log::debug!("reconfiguring surface: {err}");
                self.configure_surface();
                self.surface
                    .get_current_texture()
                    .context("no surface texture after reconfiguring")?
            }
            Err(err) => return Err(err).context("no surface texture"),
        };
        let target = output
            .texture
            .create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&CommandEncoderDescriptor::default());
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("frame"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &target,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.frame.bind_group, &[]);
            // One triangle covering the viewport, generated in the vertex shader.
            pass.draw(0..3, 0..1);
        }
        self.gpu.queue.submit([encoder.finish()]);
        output.present();
        Ok(())
    }

    fn configure_surface(&self) {
        let actual = self.window.inner_size();
        if (actual.width, actual.height) != (self.resolution.width(), self.resolution.height()) {
            // Some window managers ignore the resizability flag.
            log::warn!(
                "window is {}x{} instead of {}, the frame will be stretched",
                actual.width,
                actual.height,
                self.resolution
            );
        }
        log::debug!(
            "surface: {} in {:?}",
            self.resolution,
            self.surface_format
        );

        self.surface.configure(
            &self.gpu.device,
            &SurfaceConfiguration {
                usage: TextureUsages::RENDER_ATTACHMENT,
                format: self.surface_format,
                width: self.resolution.width(),
                height: self.resolution.height(),
                present_mode: PresentMode::Fifo,
                alpha_mode: CompositeAlphaMode::Auto,
                view_formats: Vec::new(),
            },
        );
    }
}

fn create_pipeline(
    device: &Device,
    layout: &BindGroupLayout,
    format: TextureFormat,
) -> RenderPipeline {
    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("frame"),
        source: ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("frame"),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("frame"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: "vert",
            buffers: &[],
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: "frag",
            targets: &[Some(ColorTargetState {
                format,
                blend: None,
                write_mask: ColorWrites::ALL,
            })],
        }),
        primitive: PrimitiveState::default(),
        depth_stencil: None,
        multisample: MultisampleState::default(),
        multiview: None,
    })
}
