// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Khora RHI Sandbox
// Records a few frames from several threads and prints what the GPU saw.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use khora_core::memory::get_arena_memory_stats;
use khora_core::rhi::*;
use khora_infra::TraceRhiDevice;
use khora_rhi::{CommandList, FlushMode, RhiExecutor};

const FRAMES: u32 = 3;
const WORKERS: u32 = 4;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ViewParams {
    view_proj: [[f32; 4]; 4],
    time: f32,
    _padding: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
}

fn load_settings() -> Result<RhiSettings> {
    match std::env::var("KHORA_RHI_SETTINGS") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read RHI settings from '{path}'"))?;
            Ok(RhiSettings::from_json_str(&json)?)
        }
        Err(_) => Ok(RhiSettings {
            min_draws_per_parallel_translate: 8,
            ..RhiSettings::default()
        }),
    }
}

/// Records one worker's share of the scene.
fn record_worker(executor: &RhiExecutor, worker: u32, frame: u32) -> CommandList {
    let mut list = executor.create_command_list();
    list.push_event(&format!("Worker {worker}"), LinearColor::WHITE);

    let shader = list.build_local_bound_shader_state(BoundShaderStateDesc {
        vertex_declaration: VertexDeclarationId(1),
        vertex_shader: VertexShaderId(10 + worker as u64),
        pixel_shader: Some(PixelShaderId(20)),
        ..Default::default()
    });
    let params = ViewParams {
        view_proj: [[0.0; 4]; 4],
        time: frame as f32 / 60.0,
        _padding: [0.0; 3],
    };
    let view = list.build_local_uniform_buffer(
        bytemuck::bytes_of(&params),
        UniformBufferLayout {
            name: "View",
            constant_buffer_size: std::mem::size_of::<ViewParams>() as u32,
        },
    );

    list.set_local_bound_shader_state(shader);
    list.set_local_shader_uniform_buffer(ShaderStage::Vertex, 0, view);
    for draw in 0..4 {
        list.set_stream_source(0, VertexBufferId(100 + draw), 12, 0);
        list.draw_primitive(PrimitiveType::TriangleList, 0, 32, 1);
    }
    list.pop_event();
    list
}

fn record_overlay(executor: &RhiExecutor) -> CommandList {
    let mut list = executor.create_command_list();
    list.push_event("Overlay", LinearColor::new(1.0, 0.5, 0.0, 1.0));
    let quad = [
        Vertex { position: [-1.0, -1.0, 0.0] },
        Vertex { position: [1.0, -1.0, 0.0] },
        Vertex { position: [-1.0, 1.0, 0.0] },
    ];
    let vertices = list.begin_draw_primitive_up(
        PrimitiveType::TriangleList,
        1,
        quad.len() as u32,
        std::mem::size_of::<Vertex>() as u32,
    );
    vertices.copy_from_slice(bytemuck::cast_slice(&quad[..]));
    list.end_draw_primitive_up();
    list.pop_event();
    list
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let settings = load_settings()?;
    let device = Arc::new(TraceRhiDevice::new());
    let executor = RhiExecutor::new(
        device.clone(),
        device.create_queue_context(QueueKind::Graphics),
        Some(device.create_queue_context(QueueKind::AsyncCompute)),
        settings,
    )?;

    for frame in 0..FRAMES {
        {
            let mut immediate = executor.immediate();
            immediate.begin_frame();
            immediate.begin_drawing_viewport(ViewportId(1), None);
        }

        let particles_ready = ComputeFence::new(format!("Particles{frame}"));
        let mut compute = executor.create_async_compute_list();
        compute.set_compute_shader(ComputeShaderId(1));
        compute.set_uav(0, UnorderedAccessViewId(1));
        compute.dispatch_compute_shader(64, 1, 1);
        compute.transition_uavs(
            TransitionAccess::Readable,
            TransitionPipeline::ComputeToGfx,
            &[UnorderedAccessViewId(1)],
            Some(&particles_ready),
        );
        executor.submit_async_compute(compute);

        let lists: Vec<CommandList> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..WORKERS)
                .map(|worker| {
                    let executor = &executor;
                    scope.spawn(move || record_worker(executor, worker, frame))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().map_err(|_| anyhow!("Recording thread panicked")))
                .collect::<Result<_>>()
        })?;
        let hints = vec![4; lists.len()];
        executor.submit_parallel(lists, &hints);

        let mut particles = executor.create_command_list();
        particles.wait_compute_fence(&particles_ready);
        particles.set_shader_resource_view(ShaderStage::Vertex, 0, ShaderResourceViewId(1));
        particles.draw_primitive(PrimitiveType::PointList, 0, 1024, 1);
        executor.submit(particles);
        executor.submit(record_overlay(&executor));

        let mut immediate = executor.immediate();
        immediate.end_drawing_viewport(ViewportId(1), true, false);
        immediate.end_frame();
        immediate.immediate_flush(FlushMode::DispatchToExecutionContext);
    }

    executor.flush(FlushMode::FullDrainAndReleaseResources);

    let stats = executor.stats();
    log::info!(
        "Executed {} lists ({} commands, {:.1} per list), {} parallel batches, {} tokens built, {} fences, {} frames.",
        stats.lists_executed,
        stats.commands_executed,
        stats.average_commands_per_list(),
        stats.parallel_batches,
        stats.tokens_built,
        stats.fences_signaled,
        stats.frames_completed
    );
    log::info!(
        "GPU saw {} graphics calls and {} async compute calls, {} translate contexts.",
        device.calls_on(QueueKind::Graphics).len(),
        device.calls_on(QueueKind::AsyncCompute).len(),
        device.contexts_submitted()
    );
    let memory = get_arena_memory_stats();
    log::info!(
        "Arena memory: {} bytes reserved (peak {}), {} bytes issued.",
        memory.reserved_bytes,
        memory.peak_reserved_bytes,
        memory.bytes_issued_lifetime
    );

    executor.shutdown();
    Ok(())
}
