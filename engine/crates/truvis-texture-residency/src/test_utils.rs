//! 测试用的假设备、假 staging 和像素源，以及驱动完整帧循环的 [`Harness`]

use std::{
    cell::Cell,
    collections::HashMap,
    rc::Rc,
};

use ash::vk::{self, Handle};
use truvis_gfx::commands::barrier::GfxImageBarrier;

use crate::{
    backend::{
        CommandRecorder, CompletionSerialSource, GpuImage, GpuImageDesc, GpuImageKind, GpuSampler, PixelSource,
        StagingAllocator, StagingSlice, TextureDevice,
    },
    error::SourceError,
    frame::FrameOrchestrator,
    manager::{FlushReport, TextureResidencyManager},
    pixel_format::PixelFrameInfo,
    sampler_key::SamplerKey,
    settings::ResidencySettings,
    texture_id::TextureId,
    upload_phase::UploadPhase,
};

pub(crate) fn tex(raw: i32) -> TextureId {
    TextureId::try_from_raw(raw).unwrap()
}

// device

pub(crate) struct FakeImage {
    handle: u64,
    layers: u32,
    render_target: bool,
    live: Rc<Cell<usize>>,
}

impl Drop for FakeImage {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

impl GpuImage for FakeImage {
    fn vk_image(&self) -> vk::Image {
        vk::Image::from_raw(self.handle)
    }

    fn sampled_view(&self) -> vk::ImageView {
        vk::ImageView::from_raw(self.handle << 8)
    }

    fn attachment_view(&self, face: u32) -> Option<vk::ImageView> {
        (self.render_target && face < self.layers).then(|| vk::ImageView::from_raw((self.handle << 8) + 1 + face as u64))
    }
}

pub(crate) struct FakeSampler {
    handle: vk::Sampler,
}

impl GpuSampler for FakeSampler {
    fn vk_sampler(&self) -> vk::Sampler {
        self.handle
    }
}

pub(crate) struct FakeDevice {
    next_handle: u64,
    live: Rc<Cell<usize>>,
    /// 通过 create_image 创建的 image
    pub created: Vec<GpuImageDesc>,
    pub sampler_keys: Vec<SamplerKey>,
    /// 下一次 create_image 返回该错误
    pub fail_next_image: Option<vk::Result>,
}

impl FakeDevice {
    pub fn new(live: Rc<Cell<usize>>) -> Self {
        Self {
            next_handle: 1,
            live,
            created: Vec::new(),
            sampler_keys: Vec::new(),
            fail_next_image: None,
        }
    }

    fn image(&mut self, layers: u32, render_target: bool) -> FakeImage {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.live.set(self.live.get() + 1);
        FakeImage {
            handle,
            layers,
            render_target,
            live: self.live.clone(),
        }
    }
}

impl TextureDevice for FakeDevice {
    type Image = FakeImage;
    type Sampler = FakeSampler;

    fn create_image(&mut self, desc: &GpuImageDesc) -> Result<FakeImage, vk::Result> {
        if let Some(e) = self.fail_next_image.take() {
            return Err(e);
        }
        self.created.push(desc.clone());
        let render_target = matches!(desc.kind, GpuImageKind::RenderTarget { .. });
        Ok(self.image(desc.array_layers, render_target))
    }

    fn create_solid_image(&mut self, _rgba: [u8; 4], _name: &str) -> Result<FakeImage, vk::Result> {
        Ok(self.image(1, false))
    }

    fn create_sampler(&mut self, key: SamplerKey) -> Result<FakeSampler, vk::Result> {
        self.sampler_keys.push(key);
        Ok(FakeSampler {
            handle: vk::Sampler::from_raw(0xAA00 + self.sampler_keys.len() as u64),
        })
    }
}

// staging & commands

pub(crate) const FAKE_STAGING_BUFFER: u64 = 0x5000;

pub(crate) struct FakeStaging {
    capacity: u64,
    offset: u64,
    data: Vec<u8>,
    /// 每次 flush 时已经写入的字节数
    pub flushed: Vec<u64>,
}

impl FakeStaging {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            offset: 0,
            data: vec![0; capacity as usize],
            flushed: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }

    pub fn bytes(&self, offset: u64, len: usize) -> &[u8] {
        &self.data[offset as usize..offset as usize + len]
    }
}

impl StagingAllocator for FakeStaging {
    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn remaining(&self) -> u64 {
        self.capacity - self.offset
    }

    fn try_allocate(&mut self, size: u64, align: u64) -> Option<StagingSlice<'_>> {
        let start = self.offset.next_multiple_of(align);
        let end = start.checked_add(size)?;
        if end > self.capacity {
            return None;
        }
        self.offset = end;
        Some(StagingSlice {
            buffer: vk::Buffer::from_raw(FAKE_STAGING_BUFFER),
            offset: start,
            bytes: &mut self.data[start as usize..end as usize],
        })
    }

    fn flush(&mut self) -> Result<(), vk::Result> {
        self.flushed.push(self.offset);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeRecorder {
    /// (image, old layout, new layout)
    pub barriers: Vec<(vk::Image, vk::ImageLayout, vk::ImageLayout)>,
    /// (dst image, 每个 region 的 buffer offset)
    pub copies: Vec<(vk::Image, Vec<u64>)>,
}

impl CommandRecorder for FakeRecorder {
    fn image_barriers(&mut self, barriers: &[GfxImageBarrier]) {
        self.barriers
            .extend(barriers.iter().map(|barrier| (barrier.vk_image(), barrier.old_layout(), barrier.new_layout())));
    }

    fn copy_buffer_to_image(&mut self, src: vk::Buffer, dst: vk::Image, regions: &[vk::BufferImageCopy]) {
        assert_eq!(src.as_raw(), FAKE_STAGING_BUFFER);
        self.copies.push((dst, regions.iter().map(|region| region.buffer_offset).collect()));
    }
}

pub(crate) struct FakeSerials {
    value: Cell<u64>,
    fail: Cell<bool>,
}

impl FakeSerials {
    pub fn new(value: u64) -> Self {
        Self {
            value: Cell::new(value),
            fail: Cell::new(false),
        }
    }

    pub fn set(&self, value: u64) {
        self.value.set(value);
    }

    /// 下一次查询返回 device lost
    pub fn fail_next(&self) {
        self.fail.set(true);
    }
}

impl CompletionSerialSource for FakeSerials {
    fn completed_serial(&self) -> Result<u64, vk::Result> {
        if self.fail.replace(false) {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }
        Ok(self.value.get())
    }
}

// pixels

struct FakeTexture {
    frames: Vec<(PixelFrameInfo, Vec<u8>)>,
    busy: bool,
}

#[derive(Default)]
pub(crate) struct FakePixels {
    textures: HashMap<TextureId, FakeTexture>,
    pub locks: usize,
    pub unlocks: usize,
}

impl FakePixels {
    /// 单帧 32bpp，每个字节都是 `fill`
    pub fn insert_rgba(&mut self, raw: i32, width: u32, height: u32, fill: u8) {
        let info = PixelFrameInfo::uncompressed(width, height, 32);
        self.insert_frames(raw, vec![(info, vec![fill; (width * height * 4) as usize])]);
    }

    pub fn insert_frames(&mut self, raw: i32, frames: Vec<(PixelFrameInfo, Vec<u8>)>) {
        self.textures.insert(tex(raw), FakeTexture { frames, busy: false });
    }

    pub fn set_busy(&mut self, raw: i32, busy: bool) {
        if let Some(texture) = self.textures.get_mut(&tex(raw)) {
            texture.busy = busy;
        }
    }
}

impl PixelSource for FakePixels {
    fn layer_count(&mut self, id: TextureId) -> Result<u32, SourceError> {
        let texture = self.textures.get(&id).ok_or(SourceError::Unavailable)?;
        Ok(texture.frames.len() as u32)
    }

    fn frame_info(&mut self, id: TextureId, layer: u32) -> Result<PixelFrameInfo, SourceError> {
        let texture = self.textures.get(&id).ok_or(SourceError::Unavailable)?;
        texture.frames.get(layer as usize).map(|(info, _)| *info).ok_or(SourceError::Unavailable)
    }

    fn lock(&mut self, id: TextureId, layer: u32) -> Result<&[u8], SourceError> {
        let texture = self.textures.get(&id).ok_or(SourceError::Unavailable)?;
        if texture.busy {
            return Err(SourceError::Locked);
        }
        self.locks += 1;
        texture.frames.get(layer as usize).map(|(_, bytes)| bytes.as_slice()).ok_or(SourceError::Unavailable)
    }

    fn unlock(&mut self, _id: TextureId, _layer: u32) {
        self.unlocks += 1;
    }
}

// harness

/// 一个完整的帧循环：orchestrator + manager + 所有假服务
pub(crate) struct Harness {
    pub frames: FrameOrchestrator,
    pub manager: TextureResidencyManager<FakeDevice>,
    pub serials: FakeSerials,
    pub staging: FakeStaging,
    pub recorder: FakeRecorder,
    pub pixels: FakePixels,
    pub live_images: Rc<Cell<usize>>,
}

impl Harness {
    pub fn new(staging_capacity: u64) -> Self {
        Self::with_settings(ResidencySettings::default(), staging_capacity)
    }

    pub fn with_settings(settings: ResidencySettings, staging_capacity: u64) -> Self {
        truvis_crate_tools::init_log::init_test_log();

        let live_images = Rc::new(Cell::new(0));
        let manager = TextureResidencyManager::new(FakeDevice::new(live_images.clone()), settings).unwrap();
        Self {
            frames: FrameOrchestrator::new(),
            manager,
            serials: FakeSerials::new(0),
            staging: FakeStaging::new(staging_capacity),
            recorder: FakeRecorder::default(),
            pixels: FakePixels::default(),
            live_images,
        }
    }

    /// 开始新的一帧并执行 upload phase
    pub fn phase<R>(
        &mut self,
        body: impl FnOnce(&mut TextureResidencyManager<FakeDevice>, &mut UploadPhase<'_>, &mut FakePixels) -> R,
    ) -> R {
        self.frames.begin_frame();
        self.staging.reset();
        let pixels = &mut self.pixels;
        self.frames.run_upload_phase(
            &mut self.manager,
            &self.serials,
            &mut self.staging,
            &mut self.recorder,
            |manager, phase| body(manager, phase, pixels),
        )
    }

    pub fn flush(&mut self) -> FlushReport {
        self.phase(|manager, phase, pixels| manager.flush_pending_uploads(phase, pixels).unwrap())
    }

    /// 使用默认 sampler 请求上传
    pub fn queue(&mut self, raw: i32) -> bool {
        self.manager.queue_upload(raw, self.frames.frame_id(), SamplerKey::default())
    }

    pub fn submit(&mut self) -> u64 {
        self.frames.submit()
    }

    pub fn complete_through(&self, serial: u64) {
        self.serials.set(serial);
    }

    pub fn live_images(&self) -> usize {
        self.live_images.get()
    }
}
