use ash::vk;

use super::*;
use crate::{
    backend::GpuImageKind,
    bindless_slots::ReservedSlots,
    pixel_format::{BlockCompression, PixelFrameInfo},
    render_target::{RenderTargetFlags, RenderTargetUsage},
    test_utils::{FakeDevice, Harness, tex},
};

const BUILTIN_IMAGES: usize = 4;

#[test]
fn test_upload_then_slot_on_later_phase() {
    let mut h = Harness::new(1 << 20);
    h.pixels.insert_rgba(42, 64, 64, 7);
    let id = tex(42);

    assert!(h.queue(42));
    assert!(!h.queue(42));
    assert_eq!(h.manager.residency(id), Residency::Pending);
    assert!(h.manager.try_get_descriptor(id, SamplerKey::default()).is_none());

    let report = h.flush();
    assert_eq!(report.uploaded, vec![id]);
    assert_eq!(h.manager.residency(id), Residency::Sampled);
    assert_eq!(h.pixels.locks, 1);
    assert_eq!(h.pixels.unlocks, 1);
    assert_eq!(h.staging.bytes(0, 4), &[7, 7, 7, 7]);

    let descriptor = h.manager.try_get_descriptor(id, SamplerKey::default()).unwrap();
    assert_eq!(descriptor.image_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);

    let created = h.manager.device().created.last().unwrap();
    assert_eq!(created.extent, vk::Extent2D { width: 64, height: 64 });
    assert_eq!(created.format, vk::Format::B8G8R8A8_UNORM);
    assert_eq!(created.array_layers, 1);

    // 上传命令：UNDEFINED -> TRANSFER_DST，拷贝，TRANSFER_DST -> SHADER_READ
    let image = h.recorder.copies[0].0;
    assert_eq!(h.recorder.copies[0].1, vec![0]);
    assert_eq!(
        h.recorder.barriers,
        vec![
            (image, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        ]
    );
    h.submit();

    // draw 阶段只记录需求
    h.manager.request_slot(id);
    assert_eq!(h.manager.try_get_slot(id), None);

    let report = h.flush();
    assert_eq!(report.slots.assigned, vec![(id, ReservedSlots::FIRST_DYNAMIC)]);
    assert_eq!(h.manager.try_get_slot(id), Some(ReservedSlots::FIRST_DYNAMIC));
    let draw = h.frames.begin_draw_recording(&mut h.recorder);
    assert_eq!(h.manager.bindless_index(id, &draw), ReservedSlots::FIRST_DYNAMIC);
}

#[test]
fn test_invalid_handles_are_ignored() {
    let mut h = Harness::new(1024);
    assert!(!h.queue(0));
    assert!(!h.queue(-5));
    h.manager.release(-1);
    h.manager.delete_texture(0);
    assert_eq!(h.manager.pending_upload_count(), 0);

    let result = h.phase(|manager, phase, _| manager.update_contents(phase, -3, &[], PixelFrameInfo::uncompressed(1, 1, 32)));
    assert!(matches!(result, Err(ResidencyError::InvalidHandle(-3))));
}

#[test]
fn test_source_larger_than_staging_is_rejected_for_good() {
    let mut h = Harness::new(1024);
    h.pixels.insert_rgba(7, 32, 32, 0);
    let id = tex(7);

    assert!(h.queue(7));
    let report = h.flush();
    let reason = RejectReason::ExceedsStagingCapacity {
        required: 4096,
        capacity: 1024,
    };
    assert_eq!(report.rejected, vec![(id, reason)]);
    assert_eq!(h.manager.residency(id), Residency::Rejected);
    assert_eq!(h.manager.reject_reason(id), Some(reason));

    // 再次请求不会重新尝试
    assert!(!h.queue(7));
    assert!(h.flush().rejected.is_empty());
    assert_eq!(h.live_images(), BUILTIN_IMAGES);

    // 句柄复用后是全新的纹理
    h.manager.release(7);
    assert_eq!(h.manager.residency(id), Residency::Absent);
    assert!(h.queue(7));
}

#[test]
fn test_staging_budget_defers_in_request_order() {
    let mut h = Harness::new(8192);
    for raw in [3, 1, 2, 4] {
        h.pixels.insert_rgba(raw, 32, 32, raw as u8);
        assert!(h.queue(raw));
    }

    let report = h.flush();
    assert_eq!(report.uploaded, vec![tex(3), tex(1)]);
    assert_eq!(report.deferred, vec![tex(2), tex(4)]);
    assert_eq!(h.manager.residency(tex(2)), Residency::Pending);
    h.submit();

    h.pixels.insert_rgba(5, 32, 32, 5);
    assert!(h.queue(5));

    let report = h.flush();
    assert_eq!(report.uploaded, vec![tex(2), tex(4)]);
    assert_eq!(report.deferred, vec![tex(5)]);
    h.submit();

    assert_eq!(h.flush().uploaded, vec![tex(5)]);
}

#[test]
fn test_unreadable_source_is_dropped_not_cached() {
    let mut h = Harness::new(1 << 16);
    h.pixels.insert_rgba(9, 4, 4, 1);
    h.pixels.set_busy(9, true);
    let id = tex(9);

    assert!(h.queue(9));
    assert!(h.queue(10));
    h.manager.request_slot(tex(10));
    let report = h.flush();
    assert_eq!(report.dropped, vec![(id, SourceError::Locked), (tex(10), SourceError::Unavailable)]);
    assert_eq!(h.manager.residency(id), Residency::Absent);
    assert_eq!(h.manager.pending_upload_count(), 0);
    // 丢弃的纹理不再保留 slot 需求
    assert!(!h.manager.slot_table().has_interest(tex(10)));
    assert_eq!(h.manager.slot_table().interest_count(), 0);
    h.submit();

    h.pixels.set_busy(9, false);
    assert!(h.queue(9));
    assert_eq!(h.flush().uploaded, vec![id]);
}

#[test]
fn test_array_upload_and_shape_mismatch() {
    let mut h = Harness::new(1 << 16);
    let frame = |size: u32| (PixelFrameInfo::uncompressed(size, size, 32), vec![0u8; (size * size * 4) as usize]);
    h.pixels.insert_frames(11, vec![frame(16), frame(8)]);
    h.pixels.insert_frames(12, vec![frame(16), frame(16), frame(16)]);

    h.queue(11);
    h.queue(12);
    let report = h.flush();

    assert_eq!(
        report.rejected,
        vec![(
            tex(11),
            RejectReason::ArrayShapeMismatch {
                layer: 1,
                width: 8,
                height: 8,
                expected_width: 16,
                expected_height: 16,
            }
        )]
    );
    assert_eq!(report.uploaded, vec![tex(12)]);
    assert_eq!(h.manager.device().created.last().unwrap().array_layers, 3);
    assert_eq!(h.recorder.copies.last().unwrap().1, vec![0, 1024, 2048]);
}

#[test]
fn test_mixed_compression_is_rejected() {
    let mut h = Harness::new(1 << 16);
    h.pixels.insert_frames(
        13,
        vec![
            (PixelFrameInfo::compressed(8, 8, BlockCompression::Bc1), vec![0; 32]),
            (PixelFrameInfo::uncompressed(8, 8, 32), vec![0; 256]),
        ],
    );
    h.queue(13);
    assert_eq!(h.flush().rejected, vec![(tex(13), RejectReason::MixedCompression { layer: 1 })]);
}

#[test]
fn test_eviction_waits_for_gpu_and_picks_least_recently_used() {
    let mut h = Harness::new(1 << 20);
    let dynamic = h.manager.settings().dynamic_slot_count() as i32;
    assert_eq!(dynamic, 1020);

    for raw in 1..=dynamic + 1 {
        h.pixels.insert_rgba(raw, 1, 1, 0);
        h.queue(raw);
    }
    assert_eq!(h.flush().uploaded.len(), 1021);
    assert_eq!(h.submit(), 1);

    for raw in 1..=dynamic + 1 {
        h.manager.request_slot(tex(raw));
    }
    let report = h.flush();
    assert_eq!(report.slots.assigned.len(), 1020);
    assert_eq!(report.slots.unresolved, 1);
    assert!(report.slots.evicted.is_empty());
    assert_eq!(h.manager.try_get_slot(tex(1021)), None);

    // 本帧的 draw 引用了 1..=3
    {
        let draw = h.frames.begin_draw_recording(&mut h.recorder);
        for raw in 1..=3 {
            assert!(h.manager.mark_used(tex(raw), &draw));
        }
    }
    assert_eq!(h.submit(), 2);

    // GPU 还没有完成任何提交，不能驱逐
    let report = h.flush();
    assert_eq!(report.slots.unresolved, 1);
    assert!(report.slots.evicted.is_empty());
    h.submit();

    // serial 1 完成后，4..=1020 都可以驱逐，最久未使用且 id 最小的是 4
    h.complete_through(1);
    let slot_of_4 = h.manager.try_get_slot(tex(4)).unwrap();
    let report = h.flush();
    assert_eq!(report.slots.evicted, vec![tex(4)]);
    assert_eq!(report.slots.assigned, vec![(tex(1021), slot_of_4)]);
    assert_eq!(h.manager.residency(tex(4)), Residency::Absent);
    assert_eq!(h.manager.pending_release_count(), 1);
    assert!(h.manager.try_get_slot(tex(1)).is_some());
}

#[test]
fn test_release_purges_every_container() {
    let mut h = Harness::new(1 << 16);
    h.pixels.insert_rgba(5, 2, 2, 0);
    h.queue(5);
    h.flush();
    h.submit();
    h.manager.request_slot(tex(5));
    h.flush();
    h.submit();
    assert!(h.manager.try_get_slot(tex(5)).is_some());
    let free_before = h.manager.slot_table().free_count();

    h.manager.release(5);
    assert_eq!(h.manager.residency(tex(5)), Residency::Absent);
    assert_eq!(h.manager.try_get_slot(tex(5)), None);
    assert_eq!(h.manager.slot_table().free_count(), free_before + 1);
    // GPU 资源仍然存活，等待 serial 完成
    assert_eq!(h.live_images(), BUILTIN_IMAGES + 1);
    assert_eq!(h.manager.pending_release_count(), 1);

    assert!(h.queue(5));
    assert_eq!(h.flush().uploaded, vec![tex(5)]);
    assert_eq!(h.live_images(), BUILTIN_IMAGES + 2);
}

#[test]
fn test_retired_images_are_destroyed_after_their_serial_completes() {
    let mut h = Harness::new(1 << 16);
    h.pixels.insert_rgba(1, 2, 2, 0);
    h.queue(1);
    h.flush();
    assert_eq!(h.submit(), 1);

    // 第 2 帧的 draw 阶段释放，第 2 帧的提交可能仍然引用它
    h.flush();
    h.manager.release(1);
    assert_eq!(h.submit(), 2);

    h.complete_through(1);
    h.flush();
    h.submit();
    assert_eq!(h.live_images(), BUILTIN_IMAGES + 1);

    h.complete_through(2);
    h.flush();
    assert_eq!(h.live_images(), BUILTIN_IMAGES);
    assert_eq!(h.manager.pending_release_count(), 0);
}

#[test]
fn test_delete_texture_retires_on_next_phase() {
    let mut h = Harness::new(1 << 16);
    h.pixels.insert_rgba(3, 2, 2, 0);
    h.pixels.insert_rgba(4, 2, 2, 0);
    h.queue(3);
    h.queue(4);
    h.manager.request_slot(tex(3));
    h.flush();
    h.submit();
    let slot = h.manager.try_get_slot(tex(3)).unwrap();

    h.manager.delete_texture(3);
    h.manager.delete_texture(4);
    // draw 阶段仍然可以使用，slot 在下一次 upload phase 之前保持有效
    assert!(h.manager.try_get_descriptor(tex(3), SamplerKey::default()).is_some());
    assert_eq!(h.manager.try_get_slot(tex(3)), Some(slot));
    // 再次请求取消删除
    assert!(!h.queue(4));

    let report = h.flush();
    assert_eq!(report.retired, vec![tex(3)]);
    assert_eq!(h.manager.residency(tex(3)), Residency::Absent);
    assert_eq!(h.manager.try_get_slot(tex(3)), None);
    assert_eq!(h.manager.slot_table().free_count(), h.manager.settings().dynamic_slot_count() as usize);
    assert_eq!(h.manager.residency(tex(4)), Residency::Sampled);
}

#[test]
fn test_device_error_requeues_untouched_textures() {
    let mut h = Harness::new(1 << 16);
    for raw in 1..=3 {
        h.pixels.insert_rgba(raw, 2, 2, 0);
        h.queue(raw);
    }
    h.manager.device_mut().fail_next_image = Some(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);

    let result = h.phase(|manager, phase, pixels| manager.flush_pending_uploads(phase, pixels));
    assert!(matches!(result, Err(ResidencyError::Device(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))));
    assert_eq!(h.manager.residency(tex(1)), Residency::Absent);
    assert_eq!(h.manager.residency(tex(2)), Residency::Pending);
    assert_eq!(h.manager.residency(tex(3)), Residency::Pending);
    h.submit();

    assert_eq!(h.flush().uploaded, vec![tex(2), tex(3)]);
}

#[test]
fn test_requested_sampler_is_bound_and_rebound() {
    let mut h = Harness::new(1 << 16);
    let nearest = SamplerKey::new(vk::Filter::NEAREST, vk::SamplerAddressMode::CLAMP_TO_EDGE);
    h.pixels.insert_rgba(6, 2, 2, 0);

    h.manager.queue_upload(6, 0, nearest);
    h.flush();
    h.submit();
    let texture = h.manager.resident_store().sampled(tex(6)).unwrap();
    assert_eq!(texture.sampler_key(), nearest);
    assert_eq!(h.manager.device().sampler_keys, vec![SamplerKey::default(), nearest]);

    // 已驻留的纹理换 sampler 在下一次 phase 生效，不会重新上传
    assert!(!h.manager.queue_upload(6, 1, SamplerKey::default()));
    let report = h.flush();
    assert!(report.uploaded.is_empty());
    let texture = h.manager.resident_store().sampled(tex(6)).unwrap();
    assert_eq!(texture.sampler_key(), SamplerKey::default());
    assert_eq!(h.manager.device().sampler_keys.len(), 2);
}

#[test]
fn test_render_target_lifecycle() {
    let mut h = Harness::new(1 << 16);
    let id = tex(20);

    let info = h
        .phase(|manager, phase, _| manager.create_render_target(phase, 20, 64, 32, RenderTargetFlags::CUBEMAP))
        .unwrap();
    assert_eq!(info.extent, vk::Extent2D { width: 64, height: 64 });
    assert_eq!(info.array_layers, 6);
    assert_eq!(info.mip_levels, 7);
    assert_eq!(h.manager.residency(id), Residency::RenderTarget);
    assert!(h.manager.has_render_target(id));
    assert_eq!(h.manager.render_target_info(id), Some(info));
    assert_eq!(
        h.manager.device().created.last().unwrap().kind,
        GpuImageKind::RenderTarget { cubemap: true }
    );
    assert_eq!(
        h.recorder.barriers.last().map(|(_, old, new)| (*old, *new)),
        Some((vk::ImageLayout::UNDEFINED, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL))
    );
    assert!(h.manager.render_target_attachment_view(id, 5).is_some());
    assert!(h.manager.render_target_attachment_view(id, 6).is_none());
    assert!(h.manager.try_get_descriptor(id, SamplerKey::default()).is_some());

    // render target 不会通过上传队列替换
    assert!(!h.queue(20));

    {
        let mut draw = h.frames.begin_draw_recording(&mut h.recorder);
        assert!(h.manager.transition_render_target(&mut draw, id, RenderTargetUsage::Attachment));
        assert!(!h.manager.transition_render_target(&mut draw, id, RenderTargetUsage::Attachment));
    }
    assert!(h.manager.try_get_descriptor(id, SamplerKey::default()).is_none());
    assert_eq!(
        h.recorder.barriers.last().map(|(_, old, new)| (*old, *new)),
        Some((vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL))
    );

    {
        let mut draw = h.frames.begin_draw_recording(&mut h.recorder);
        assert!(h.manager.transition_render_target(&mut draw, id, RenderTargetUsage::Sampled));
    }
    assert!(h.manager.try_get_descriptor(id, SamplerKey::default()).is_some());

    let result = h.phase(|manager, phase, _| manager.create_render_target(phase, 21, 0, 8, RenderTargetFlags::empty()));
    assert!(matches!(result, Err(ResidencyError::InvalidExtent { width: 0, height: 8 })));
}

#[test]
fn test_render_target_replaces_sampled_texture() {
    let mut h = Harness::new(1 << 16);
    h.pixels.insert_rgba(8, 2, 2, 0);
    h.queue(8);
    h.flush();
    h.submit();

    h.phase(|manager, phase, _| manager.create_render_target(phase, 8, 16, 16, RenderTargetFlags::NO_MIPMAPS))
        .unwrap();
    assert_eq!(h.manager.residency(tex(8)), Residency::RenderTarget);
    assert_eq!(h.manager.resident_store().sampled_count(), 0);
    assert_eq!(h.manager.pending_release_count(), 1);
    assert_eq!(h.manager.render_target_info(tex(8)).unwrap().mip_levels, 1);
}

#[test]
fn test_render_targets_are_never_evicted() {
    let settings = ResidencySettings {
        max_bindless_textures: ReservedSlots::FIRST_DYNAMIC + 2,
        ..Default::default()
    };
    let mut h = Harness::with_settings(settings, 1 << 16);
    h.phase(|manager, phase, _| manager.create_render_target(phase, 1, 4, 4, RenderTargetFlags::empty()))
        .unwrap();
    for raw in [2, 3] {
        h.pixels.insert_rgba(raw, 1, 1, 0);
        h.queue(raw);
    }
    h.flush();
    h.submit();

    h.manager.request_slot(tex(1));
    h.manager.request_slot(tex(2));
    h.flush();
    h.submit();

    h.complete_through(10);
    h.manager.request_slot(tex(3));
    let report = h.flush();
    assert_eq!(report.slots.evicted, vec![tex(2)]);
    assert!(h.manager.try_get_slot(tex(1)).is_some());
    assert!(h.manager.try_get_slot(tex(3)).is_some());
    h.submit();

    // render target 比 3 更久未使用，仍然不会被驱逐
    h.queue(2);
    h.manager.request_slot(tex(2));
    let report = h.flush();
    assert_eq!(report.uploaded, vec![tex(2)]);
    assert_eq!(report.slots.evicted, vec![tex(3)]);
    assert!(h.manager.try_get_slot(tex(1)).is_some());
}

#[test]
fn test_update_contents() {
    let mut h = Harness::new(64);
    h.pixels.insert_rgba(2, 4, 4, 0);
    h.queue(2);
    h.flush();
    h.submit();
    let image = h.manager.resident_store().sampled(tex(2)).unwrap().image.vk_image();

    let info = PixelFrameInfo::uncompressed(4, 4, 32);
    let pixels = vec![9u8; 64];
    h.phase(|manager, phase, _| manager.update_contents(phase, 2, &pixels, info)).unwrap();
    assert_eq!(h.staging.bytes(0, 64), pixels.as_slice());
    assert_eq!(
        &h.recorder.barriers[h.recorder.barriers.len() - 2..],
        &[
            (image, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        ]
    );

    let result = h.phase(|manager, phase, _| {
        manager.update_contents(phase, 2, &pixels[..16], PixelFrameInfo::uncompressed(2, 2, 32))
    });
    assert!(matches!(result, Err(ResidencyError::ExtentMismatch { .. })));

    let result = h.phase(|manager, phase, _| manager.update_contents(phase, 99, &pixels, info));
    assert!(matches!(result, Err(ResidencyError::NotResident(id)) if id == tex(99)));

    let result = h.phase(|manager, phase, _| {
        phase.staging().try_allocate(4, 4);
        manager.update_contents(phase, 2, &pixels, info)
    });
    assert!(matches!(
        result,
        Err(ResidencyError::StagingExhausted {
            required: 64,
            remaining: 60
        })
    ));

    h.phase(|manager, phase, _| manager.create_render_target(phase, 30, 4, 4, RenderTargetFlags::empty()))
        .unwrap();
    let result = h.phase(|manager, phase, _| manager.update_contents(phase, 30, &pixels, info));
    assert!(matches!(result, Err(ResidencyError::NotUpdatable { .. })));
}

#[test]
fn test_bindless_writes_cover_every_descriptor_set() {
    let settings = ResidencySettings {
        max_bindless_textures: 8,
        ..Default::default()
    };
    let mut h = Harness::with_settings(settings, 1 << 16);

    // 初始时每份 descriptor set 都写入全部 slot
    let writes = h.phase(|manager, phase, _| manager.bindless_writes(phase));
    assert_eq!(writes.iter().map(|write| write.slot).collect::<Vec<_>>(), (0..8).collect::<Vec<_>>());
    let fallback = h.manager.fallback_descriptor(SamplerKey::default()).image_view;
    assert_eq!(writes[0].info.image_view, fallback);
    assert_eq!(writes[7].info.image_view, fallback);
    assert_ne!(writes[1].info.image_view, fallback);
    assert_eq!(h.phase(|manager, phase, _| manager.bindless_writes(phase)).len(), 8);
    assert!(h.phase(|manager, phase, _| manager.bindless_writes(phase)).is_empty());

    h.pixels.insert_rgba(1, 1, 1, 0);
    h.queue(1);
    h.manager.request_slot(tex(1));
    let writes = h.phase(|manager, phase, pixels| {
        manager.flush_pending_uploads(phase, pixels).unwrap();
        manager.bindless_writes(phase)
    });
    let view = h.manager.try_get_descriptor(tex(1), SamplerKey::default()).unwrap().image_view;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].slot, ReservedSlots::FIRST_DYNAMIC);
    assert_eq!(writes[0].info.image_view, view);
    assert_eq!(h.phase(|manager, phase, _| manager.bindless_writes(phase)).len(), 1);
}

#[test]
fn test_draw_path_helpers_fall_back() {
    let mut h = Harness::new(1 << 16);
    h.pixels.insert_rgba(15, 2, 2, 0);
    let fallback = h.manager.fallback_descriptor(SamplerKey::default());

    {
        let draw = h.frames.begin_draw_recording(&mut h.recorder);
        let descriptor = h.manager.descriptor_or_fallback(15, &draw, SamplerKey::default());
        assert_eq!(descriptor.image_view, fallback.image_view);
        assert_eq!(h.manager.residency(tex(15)), Residency::Pending);

        assert_eq!(h.manager.bindless_index(tex(15), &draw), ReservedSlots::FALLBACK);
        assert!(h.manager.slot_table().has_interest(tex(15)));
    }

    // 同一个 phase 中上传并分配 slot
    let report = h.flush();
    assert_eq!(report.slots.assigned, vec![(tex(15), ReservedSlots::FIRST_DYNAMIC)]);
    let draw = h.frames.begin_draw_recording(&mut h.recorder);
    let descriptor = h.manager.descriptor_or_fallback(15, &draw, SamplerKey::default());
    assert_ne!(descriptor.image_view, fallback.image_view);
}

#[test]
fn test_draw_path_helpers_keep_texture_from_eviction() {
    let settings = ResidencySettings {
        max_bindless_textures: ReservedSlots::FIRST_DYNAMIC + 2,
        ..Default::default()
    };
    let mut h = Harness::with_settings(settings, 1 << 16);
    for raw in 1..=3 {
        h.pixels.insert_rgba(raw, 1, 1, 0);
    }

    // 1 在第 1 帧上传，2 在第 2 帧上传，都拿到 slot
    for raw in 1..=2 {
        h.queue(raw);
        h.manager.request_slot(tex(raw));
        assert_eq!(h.flush().slots.assigned.len(), 1);
        h.submit();
    }
    h.flush();
    h.submit();

    // 之后的每一帧只通过 draw path helper 使用 1
    for _ in 0..3 {
        h.flush();
        let draw = h.frames.begin_draw_recording(&mut h.recorder);
        let slot = h.manager.bindless_index(tex(1), &draw);
        assert_ne!(slot, ReservedSlots::FALLBACK);
        let descriptor = h.manager.descriptor_or_fallback(1, &draw, SamplerKey::default());
        assert_eq!(descriptor.image_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        drop(draw);
        h.submit();
    }
    let usage = h.manager.resident_store().usage(tex(1)).unwrap();
    assert_eq!(usage.last_used_serial, 6);

    // serial 6 仍在执行，只能驱逐 2
    h.complete_through(5);
    h.queue(3);
    h.manager.request_slot(tex(3));
    let report = h.flush();
    assert_eq!(report.slots.evicted, vec![tex(2)]);
    assert!(h.manager.try_get_slot(tex(1)).is_some());
    assert!(h.manager.try_get_slot(tex(3)).is_some());
}

#[test]
fn test_each_texture_lives_in_one_container() {
    let mut h = Harness::new(4096);
    h.pixels.insert_rgba(1, 2, 2, 0);
    h.pixels.insert_rgba(2, 64, 64, 0);
    h.pixels.insert_rgba(3, 16, 16, 0);
    h.pixels.insert_rgba(4, 32, 32, 0);
    for raw in 1..=4 {
        h.queue(raw);
    }
    h.flush();

    let states = (1..=4).map(|raw| h.manager.residency(tex(raw))).collect::<Vec<_>>();
    assert_eq!(
        states,
        vec![Residency::Sampled, Residency::Rejected, Residency::Sampled, Residency::Pending]
    );
    for raw in 1..=4 {
        let id = tex(raw);
        let resident = h.manager.resident_store().is_resident(id);
        let rejected = h.manager.reject_reason(id).is_some();
        let pending = h.manager.residency(id) == Residency::Pending;
        assert!([resident, rejected, pending].iter().filter(|state| **state).count() <= 1);
    }
}

#[test]
fn test_invalid_settings_fail_construction() {
    let settings = ResidencySettings {
        max_bindless_textures: ReservedSlots::FIRST_DYNAMIC,
        ..Default::default()
    };
    let live = std::rc::Rc::new(std::cell::Cell::new(0));
    let result = TextureResidencyManager::new(FakeDevice::new(live.clone()), settings);
    assert!(matches!(result, Err(ResidencyError::InvalidSettings(_))));
    assert_eq!(live.get(), 0);
}
