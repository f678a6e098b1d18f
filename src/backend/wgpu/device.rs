//! wgpu Device
//!
//! [`WgpuDevice`] owns the wgpu instance objects (device, queue, surface) and
//! every resource the frame pipeline allocates, stored in `slotmap` tables
//! behind handles. It implements both [`GraphicsDevice`] and
//! [`PresentationSurface`], so one `Arc<WgpuDevice>` fills both slots of a
//! [`GpuContext`].

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::util::DeviceExt;

use super::translate::{self, PipelineEntry, ResourceTables, StructureEntry, TextureEntry};
use crate::errors::{Result, UmbraError};
use crate::renderer::core::command::CommandBuffer;
use crate::renderer::core::descriptors::{
    AccelerationGeometry, AccelerationStructureSizes, BufferDescriptor, ComputePipelineDescriptor,
    RenderPipelineDescriptor, SamplerDescriptor, TextureDescriptor,
};
use crate::renderer::core::handles::{
    AccelerationStructureId, BufferId, Extent2d, PipelineId, SamplerId, TextureId, TextureViewId,
};
use crate::renderer::core::{
    CompletionHandler, GpuContext, GraphicsDevice, PresentationSurface, SurfaceImage,
};
use crate::renderer::settings::RendererSettings;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Bytes reserved per triangle when estimating structure sizes; wgpu does not
/// expose the driver's prebuild info.
const ESTIMATED_BYTES_PER_TRIANGLE: u64 = 64;

// ============================================================================
// Shader library
// ============================================================================

/// WGSL sources the device compiles at creation.
#[derive(Clone, Copy, Debug)]
pub struct ShaderLibrary<'a> {
    /// Raster entry points (shadow, G-buffer, lighting, debug).
    pub raster: &'a str,
    /// Ray-query kernels. Skipped on devices without acceleration structures.
    pub ray_query: Option<&'a str>,
}

struct ShaderModule {
    module: wgpu::ShaderModule,
    entry_points: Vec<String>,
}

/// Names of the functions tagged `@vertex`, `@fragment` or `@compute`.
fn stage_entry_points(source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut stage_pending = false;
    let mut tokens = source
        .split(|c: char| c.is_whitespace() || c == '(')
        .filter(|t| !t.is_empty());
    while let Some(token) = tokens.next() {
        match token {
            "@vertex" | "@fragment" | "@compute" => stage_pending = true,
            "fn" => {
                if let Some(name) = tokens.next()
                    && stage_pending
                {
                    names.push(name.to_string());
                }
                stage_pending = false;
            }
            _ => {}
        }
    }
    names
}

fn compile_module(device: &wgpu::Device, label: &str, source: &str) -> Result<ShaderModule> {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
    });

    let info = pollster::block_on(module.get_compilation_info());
    let errors: Vec<String> = info
        .messages
        .iter()
        .filter(|m| m.message_type == wgpu::CompilationMessageType::Error)
        .map(|m| m.message.clone())
        .collect();
    if !errors.is_empty() {
        return Err(UmbraError::ShaderLibraryFailed(format!(
            "{label}: {}",
            errors.join("; ")
        )));
    }

    let entry_points = stage_entry_points(source);
    log::debug!("Compiled shader module '{label}': {entry_points:?}");
    Ok(ShaderModule {
        module,
        entry_points,
    })
}

// ============================================================================
// Poll thread
// ============================================================================

/// Drives `on_submitted_work_done` callbacks off the render thread.
struct PollThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PollThread {
    fn spawn(device: wgpu::Device) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("umbra-gpu-poll".to_string())
            .spawn(move || {
                while !flag.load(Ordering::Acquire) {
                    if let Err(e) = device.poll(wgpu::PollType::Poll) {
                        log::error!("Device poll failed: {e:?}");
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for PollThread {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("GPU poll thread panicked");
        }
    }
}

// ============================================================================
// Device
// ============================================================================

struct AcquiredImage {
    view: TextureViewId,
    texture: wgpu::SurfaceTexture,
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    config: Mutex<wgpu::SurfaceConfiguration>,
    current_image: Mutex<Option<AcquiredImage>>,
    tables: RwLock<ResourceTables>,
    modules: Vec<ShaderModule>,
    ray_query: bool,
    _poller: PollThread,
}

impl WgpuDevice {
    /// Creates the surface, picks an adapter and opens a device.
    ///
    /// Ray queries are requested whenever the adapter offers them; without
    /// them the device reports no acceleration-structure support.
    pub async fn new<W>(
        window: W,
        settings: &RendererSettings,
        size: Extent2d,
        shaders: ShaderLibrary<'_>,
    ) -> Result<Arc<Self>>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window)
            .map_err(|e| UmbraError::SurfaceError(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: settings.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| UmbraError::AdapterRequestFailed(e.to_string()))?;

        let ray_query = adapter
            .features()
            .contains(wgpu::Features::EXPERIMENTAL_RAY_QUERY);
        let (required_features, required_limits, experimental_features) = if ray_query {
            (
                wgpu::Features::EXPERIMENTAL_RAY_QUERY,
                wgpu::Limits::default().using_minimum_supported_acceleration_structure_values(),
                // SAFETY: only the ray-query API is used, through the
                // acceleration-structure calls in this module.
                unsafe { wgpu::ExperimentalFeatures::enabled() },
            )
        } else {
            (
                wgpu::Features::empty(),
                wgpu::Limits::default(),
                wgpu::ExperimentalFeatures::default(),
            )
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Umbra Device"),
                required_features,
                required_limits,
                experimental_features,
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        let mut config = surface
            .get_default_config(&adapter, size.width.max(1), size.height.max(1))
            .ok_or_else(|| {
                UmbraError::AdapterRequestFailed("Surface not supported by adapter".to_string())
            })?;
        config.present_mode = if settings.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        surface.configure(&device, &config);

        let mut modules = vec![compile_module(&device, "Raster Shaders", shaders.raster)?];
        match shaders.ray_query {
            Some(source) if ray_query => {
                modules.push(compile_module(&device, "Ray Query Shaders", source)?);
            }
            Some(_) => log::warn!("Adapter lacks ray queries; ray-query shaders not compiled"),
            None => {}
        }

        let info = adapter.get_info();
        log::info!(
            "Using adapter '{}' ({:?}), ray queries: {ray_query}",
            info.name,
            info.backend
        );

        let poller = PollThread::spawn(device.clone())?;
        Ok(Arc::new(Self {
            device,
            queue,
            surface,
            config: Mutex::new(config),
            current_image: Mutex::new(None),
            tables: RwLock::new(ResourceTables::default()),
            modules,
            ray_query,
            _poller: poller,
        }))
    }

    /// Bundles this device as both device and surface of a [`GpuContext`].
    pub fn into_context(self: Arc<Self>, settings: RendererSettings) -> Result<GpuContext> {
        let surface: Arc<dyn PresentationSurface> = self.clone();
        GpuContext::new(self, surface, settings)
    }

    fn module_for(&self, entry: &str) -> Result<&wgpu::ShaderModule> {
        self.modules
            .iter()
            .find(|m| m.entry_points.iter().any(|e| e == entry))
            .map(|m| &m.module)
            .ok_or_else(|| {
                UmbraError::ShaderLibraryFailed(format!("no entry point named '{entry}'"))
            })
    }

    fn present(&self, image: SurfaceImage) {
        let acquired = {
            let mut current = self.current_image.lock();
            match current.take() {
                Some(acquired) if acquired.view == image.view => acquired,
                other => {
                    *current = other;
                    log::warn!("Presented image is not the current surface image; ignored");
                    return;
                }
            }
        };
        self.tables.write().views.remove(acquired.view);
        acquired.texture.present();
    }
}

impl GraphicsDevice for WgpuDevice {
    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<BufferId> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: desc.size,
            usage: desc.usage,
            mapped_at_creation: false,
        });
        Ok(self.tables.write().buffers.insert(buffer))
    }

    fn create_buffer_init(&self, desc: &BufferDescriptor, contents: &[u8]) -> Result<BufferId> {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(desc.label),
                contents,
                usage: desc.usage,
            });
        Ok(self.tables.write().buffers.insert(buffer))
    }

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) {
        let tables = self.tables.read();
        match tables.buffers.get(buffer) {
            Some(target) => self.queue.write_buffer(target, offset, data),
            None => log::warn!("write_buffer on unknown buffer {buffer:?}"),
        }
    }

    fn destroy_buffer(&self, buffer: BufferId) {
        self.tables.write().buffers.remove(buffer);
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<TextureId> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.size.width,
                height: desc.size.height,
                depth_or_array_layers: desc.array_layers.max(1),
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });
        Ok(self.tables.write().textures.insert(TextureEntry {
            texture,
            format: desc.format,
        }))
    }

    fn write_texture(&self, texture: TextureId, layer: u32, size: Extent2d, data: &[u8]) {
        let tables = self.tables.read();
        let Some(entry) = tables.textures.get(texture) else {
            log::warn!("write_texture on unknown texture {texture:?}");
            return;
        };
        let texel_size = entry.format.block_copy_size(None).unwrap_or(4);
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer,
                },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(texel_size * size.width),
                rows_per_image: Some(size.height),
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn create_texture_view(
        &self,
        texture: TextureId,
        dimension: wgpu::TextureViewDimension,
    ) -> Result<TextureViewId> {
        let mut tables = self.tables.write();
        let entry = tables
            .textures
            .get(texture)
            .ok_or_else(|| UmbraError::UnknownHandle(format!("{texture:?}")))?;
        let view = entry.texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(dimension),
            ..Default::default()
        });
        Ok(tables.views.insert(view))
    }

    fn destroy_texture_view(&self, view: TextureViewId) {
        self.tables.write().views.remove(view);
    }

    fn destroy_texture(&self, texture: TextureId) {
        self.tables.write().textures.remove(texture);
    }

    fn create_sampler(&self, desc: &SamplerDescriptor) -> Result<SamplerId> {
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(desc.label),
            address_mode_u: desc.address_mode,
            address_mode_v: desc.address_mode,
            address_mode_w: desc.address_mode,
            mag_filter: desc.filter,
            min_filter: desc.filter,
            compare: desc.compare,
            ..Default::default()
        });
        Ok(self.tables.write().samplers.insert(sampler))
    }

    fn create_render_pipeline(&self, desc: &RenderPipelineDescriptor) -> Result<PipelineId> {
        let missing_entry = |e: UmbraError| UmbraError::PipelineCreationFailed {
            label: desc.label.to_string(),
            reason: e.to_string(),
        };
        let vertex_module = self.module_for(desc.vertex_entry).map_err(missing_entry)?;
        let fragment_module = desc
            .fragment_entry
            .map(|entry| self.module_for(entry).map(|module| (module, entry)))
            .transpose()
            .map_err(missing_entry)?;

        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .color_targets
            .iter()
            .map(|target| {
                Some(wgpu::ColorTargetState {
                    format: target.format,
                    blend: target.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: None,
                vertex: wgpu::VertexState {
                    module: vertex_module,
                    entry_point: Some(desc.vertex_entry),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &desc.vertex_buffers,
                },
                primitive: wgpu::PrimitiveState {
                    topology: desc.topology,
                    cull_mode: desc.cull_mode,
                    ..Default::default()
                },
                depth_stencil: desc.depth_stencil.clone(),
                multisample: wgpu::MultisampleState::default(),
                fragment: fragment_module.map(|(module, entry)| wgpu::FragmentState {
                    module,
                    entry_point: Some(entry),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &targets,
                }),
                multiview_mask: None,
                cache: None,
            });
        log::debug!("Created render pipeline '{}'", desc.label);
        Ok(self
            .tables
            .write()
            .pipelines
            .insert(PipelineEntry::Render(pipeline)))
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDescriptor) -> Result<PipelineId> {
        let module =
            self.module_for(desc.entry)
                .map_err(|e| UmbraError::PipelineCreationFailed {
                    label: desc.label.to_string(),
                    reason: e.to_string(),
                })?;
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(desc.label),
                layout: None,
                module,
                entry_point: Some(desc.entry),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
        log::debug!("Created compute pipeline '{}'", desc.label);
        Ok(self
            .tables
            .write()
            .pipelines
            .insert(PipelineEntry::Compute(pipeline)))
    }

    fn supports_acceleration_structures(&self) -> bool {
        self.ray_query
    }

    fn acceleration_structure_sizes(
        &self,
        geometry: &AccelerationGeometry,
    ) -> AccelerationStructureSizes {
        let vertex_bytes = u64::from(geometry.vertex_count) * geometry.vertex_stride;
        AccelerationStructureSizes {
            structure_size: vertex_bytes
                + u64::from(geometry.triangle_count()) * ESTIMATED_BYTES_PER_TRIANGLE,
            // wgpu allocates build scratch internally.
            scratch_size: 0,
        }
    }

    fn create_acceleration_structure(
        &self,
        geometry: &AccelerationGeometry,
        sizes: AccelerationStructureSizes,
    ) -> Result<AccelerationStructureId> {
        if !self.ray_query {
            return Err(UmbraError::FeatureNotSupported(
                "acceleration structures".to_string(),
            ));
        }

        let size = translate::triangle_size_descriptor(geometry);
        let blas = self.device.create_blas(
            &wgpu::CreateBlasDescriptor {
                label: Some("Scene BLAS"),
                flags: wgpu::AccelerationStructureFlags::PREFER_FAST_TRACE,
                update_mode: wgpu::AccelerationStructureUpdateMode::Build,
            },
            wgpu::BlasGeometrySizeDescriptors::Triangles {
                descriptors: vec![size.clone()],
            },
        );
        let mut tlas = self.device.create_tlas(&wgpu::CreateTlasDescriptor {
            label: Some("Scene TLAS"),
            max_instances: 1,
            flags: wgpu::AccelerationStructureFlags::PREFER_FAST_TRACE,
            update_mode: wgpu::AccelerationStructureUpdateMode::Build,
        });
        tlas[0] = Some(wgpu::TlasInstance::new(
            &blas,
            translate::IDENTITY_TRANSFORM,
            0,
            0xff,
        ));

        log::debug!(
            "Created acceleration structure for {} triangles (~{} bytes)",
            geometry.triangle_count(),
            sizes.structure_size
        );
        Ok(self
            .tables
            .write()
            .structures
            .insert(StructureEntry { blas, tlas, size }))
    }

    fn destroy_acceleration_structure(&self, structure: AccelerationStructureId) {
        self.tables.write().structures.remove(structure);
    }

    fn submit(&self, commands: CommandBuffer, on_complete: Option<CompletionHandler>) -> Result<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(&commands.label),
            });
        {
            let tables = self.tables.read();
            translate::encode(&self.device, &tables, &mut encoder, &commands.commands)?;
        }

        // Both queue kinds map onto wgpu's single queue.
        self.queue.submit(std::iter::once(encoder.finish()));
        if let Some(handler) = on_complete {
            self.queue.on_submitted_work_done(handler);
        }

        if let Some(image) = commands.present {
            self.present(image);
        }
        Ok(())
    }
}

impl PresentationSurface for WgpuDevice {
    fn acquire_image(&self) -> Result<SurfaceImage> {
        let mut current = self.current_image.lock();
        if let Some(stale) = current.take() {
            log::warn!("Surface image acquired twice without presenting");
            self.tables.write().views.remove(stale.view);
        }

        let texture = match self.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(texture)
            | wgpu::CurrentSurfaceTexture::Suboptimal(texture) => texture,
            e @ (wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated) => {
                self.surface.configure(&self.device, &self.config.lock());
                return Err(UmbraError::SurfaceError(format!("{e:?}")));
            }
            e => return Err(UmbraError::SurfaceError(format!("{e:?}"))),
        };

        let (extent, format) = {
            let config = self.config.lock();
            (Extent2d::new(config.width, config.height), config.format)
        };
        let view = texture.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Surface Image"),
            ..Default::default()
        });
        let id = self.tables.write().views.insert(view);
        *current = Some(AcquiredImage { view: id, texture });

        Ok(SurfaceImage {
            view: id,
            extent,
            format,
        })
    }

    fn configure(&self, width: u32, height: u32) -> Result<()> {
        let mut config = self.config.lock();
        config.width = width;
        config.height = height;
        self.surface.configure(&self.device, &config);
        log::info!("Surface configured to {width}x{height}");
        Ok(())
    }

    fn size(&self) -> Extent2d {
        let config = self.config.lock();
        Extent2d::new(config.width, config.height)
    }

    fn format(&self) -> wgpu::TextureFormat {
        self.config.lock().format
    }
}
