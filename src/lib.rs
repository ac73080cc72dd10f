//! Rendering core for a visual-novel engine.
//!
//! Images are 32-bit pixel buffers in a backend-defined channel order ([`PixelFormat`]).
//! A frame is built by compositing images into a back buffer and presenting its dirty
//! rectangle to a display surface:
//!
//! 1. **Compose**: clipped rectangle transfers with five blend modes ([`BlendType`]) and a
//!    28-level ordered-dither mask dissolve ([`draw_mask`]).
//! 2. **Render**: a [`Backend`] applies the compose operations either in software or through a
//!    GPU-style device with lazily uploaded textures ([`HardwareBackend`]).
//! 3. **Pace**: [`FrameLoop`] drives an [`App`] at a fixed interval, pumping host events
//!    between frames and recovering from device loss.
//!
//! Errors are reported as [`RenderError`]; render calls inside a frame never abort it.
#![forbid(unsafe_code)]

mod assets;
mod bitmap;
mod compose;
mod foundation;
mod render;
mod session;

pub use crate::foundation::core::{PixelRect, TransferRect};
pub use crate::foundation::error::{RenderError, RenderResult};
pub use crate::foundation::pixel::{ChannelShifts, Pixel, PixelFormat};

pub use crate::assets::color::{Color, parse_color};
pub use crate::assets::source::{AssetSource, FsAssetSource, MemoryAssetSource, make_valid_path};

pub use crate::bitmap::{Image, ImageLock};

pub use crate::compose::blend::{BlendType, blend_pixel, draw};
pub use crate::compose::clip::{clip_by_dest, clip_by_source, clip_transfer};
pub use crate::compose::mask::{MASK_LEVELS, bayer8, draw_mask, mask_covers, mask_threshold};

pub use crate::render::backend::{Backend, BackendKind, TextureHost, TextureId, create_backend};
pub use crate::render::device::{DeviceTexture, DrawOp, GpuDevice};
#[cfg(feature = "gpu")]
pub use crate::render::gpu::WgpuDevice;
pub use crate::render::hardware::{DeviceState, HardwareBackend};
pub use crate::render::reference::{DeviceLossTrigger, ReferenceDevice};
pub use crate::render::software::SoftwareBackend;
pub use crate::render::surface::{DisplaySurface, FrameBufferSurface, PixelView};

pub use crate::session::app::{App, FrameResult};
pub use crate::session::config::{BACKEND_ENV, EngineConfig, Language, MAX_WINDOW_DIM};
pub use crate::session::context::RenderContext;
pub use crate::session::events::{EventSource, HostEvent, Key, MouseButton, NoEvents, ScriptedEvents};
pub use crate::session::pacing::{
    Clock, FrameLoop, FrameTiming, LoopExit, LoopStats, ManualClock, StopWatch, SystemClock,
};
