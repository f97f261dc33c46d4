//! The snapshot orchestrator: registers a single-shot frame callback on the
//! live preview, hands the composite-and-encode job to a worker, and owns
//! the resource lifecycle of exactly one capture at a time.
//!
//! Every GPU resource a snapshot creates lives inside one worker task and is
//! released there in reverse-acquisition order, on success and on failure.
//! The result listener fires exactly once per `take()`.

use std::sync::{Arc, Mutex};

use glam::Mat4;
use tracing::{debug, info, warn};

use crate::capture::{
    CaptureRequest, PictureFormat, PictureResult, ResultListener, SnapshotOutcome,
};
use crate::error::SnapshotError;
use crate::offset::{Angles, Axis, Reference};
use crate::overlay::{Color, OverlayDrawer};
use crate::preview::{FrameEvent, FramePreview, FrameProducer, Subscription};
use crate::render::{
    Compositor, ContextFlags, DrawContext, GpuFactory, OverlaySurface, RenderTarget, TextureId,
};
use crate::size::{Size, compute_crop};
use crate::tasks::worker::TaskRunner;
use crate::transform::{TransformSpec, overlay_transform, primary_transform};

/// Lifecycle of one capture. `Done` and `Failed` are terminal for the
/// capture; the recorder itself accepts a new `take()` from either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    Idle,
    AwaitingFrame,
    Compositing,
    Encoding,
    Done,
    Failed,
}

type SharedState = Arc<Mutex<SnapshotState>>;

fn set_state(state: &SharedState, next: SnapshotState) {
    let mut guard = state.lock().expect("snapshot state poisoned");
    debug!(from = ?*guard, to = ?next, "snapshot state");
    *guard = next;
}

/// One-shot GPU picture recorder over a live preview.
pub struct SnapshotRecorder<P, G, R> {
    preview: Arc<P>,
    factory: Arc<G>,
    runner: Arc<R>,
    angles: Angles,
    drawers: Arc<Vec<Box<dyn OverlayDrawer>>>,
    state: SharedState,
}

impl<P, G, R> SnapshotRecorder<P, G, R>
where
    P: FramePreview + 'static,
    G: GpuFactory + 'static,
    R: TaskRunner + 'static,
{
    pub fn new(
        preview: Arc<P>,
        factory: Arc<G>,
        runner: Arc<R>,
        angles: Angles,
        drawers: Vec<Box<dyn OverlayDrawer>>,
    ) -> Self {
        Self {
            preview,
            factory,
            runner,
            angles,
            drawers: Arc::new(drawers),
            state: Arc::new(Mutex::new(SnapshotState::Idle)),
        }
    }

    pub fn state(&self) -> SnapshotState {
        *self.state.lock().expect("snapshot state poisoned")
    }

    /// Start one snapshot. The listener receives exactly one success or one
    /// failure, after all GPU resources are released.
    ///
    /// There is no timeout on the frame wait: if the preview never produces
    /// a frame the snapshot never completes, and only tearing down the
    /// preview externally cancels it.
    pub fn take(&self, request: CaptureRequest, listener: impl ResultListener + 'static) {
        let listener: Box<dyn ResultListener> = Box::new(listener);

        {
            let mut guard = self.state.lock().expect("snapshot state poisoned");
            if matches!(
                *guard,
                SnapshotState::AwaitingFrame | SnapshotState::Compositing | SnapshotState::Encoding
            ) {
                drop(guard);
                warn!("take() while a snapshot is in flight");
                listener.on_result(Err(SnapshotError::Busy));
                return;
            }
            *guard = SnapshotState::AwaitingFrame;
        }

        let producer = match self.preview.acquire_producer() {
            Ok(p) => p,
            Err(e) => {
                set_state(&self.state, SnapshotState::Failed);
                listener.on_result(Err(e));
                return;
            }
        };

        let output_size = compute_crop(request.size, request.output_ratio);
        info!(
            size = %request.size,
            output = %output_size,
            rotation = request.rotation,
            facing = ?request.facing,
            overlay = request.with_overlay,
            "snapshot armed"
        );

        let mut seed = Some(JobSeed {
            factory: Arc::clone(&self.factory),
            request,
            output_size,
            texture_id: self.preview.texture_id(),
            producer,
            drawers: Arc::clone(&self.drawers),
            angles: self.angles,
            state: Arc::clone(&self.state),
            listener,
        });
        let runner = Arc::clone(&self.runner);
        let sub = Subscription::new();
        let cb_sub = sub.clone();

        // Runs on the rendering context: deregister first, capture the
        // immutable parameters, then get off that thread.
        let callback = move |event: &FrameEvent| {
            if !cb_sub.claim() {
                return;
            }
            let Some(seed) = seed.take() else { return };
            set_state(&seed.state, SnapshotState::Compositing);
            let event = *event;
            runner.execute(Box::new(move || run_job(seed, event)));
        };
        self.preview.add_frame_callback(sub, Box::new(callback));
    }
}

/// Everything one snapshot needs, moved by exclusive ownership from the
/// rendering-context callback into the worker task.
struct JobSeed<G: GpuFactory> {
    factory: Arc<G>,
    request: CaptureRequest,
    output_size: Size,
    texture_id: TextureId,
    producer: Box<dyn FrameProducer>,
    drawers: Arc<Vec<Box<dyn OverlayDrawer>>>,
    angles: Angles,
    state: SharedState,
    listener: Box<dyn ResultListener>,
}

/// Scoped holder for the snapshot's GPU resources. `release_all` runs in
/// reverse-acquisition order and is idempotent; `Drop` backstops it.
struct Resources<C: DrawContext> {
    producer: Option<Box<dyn FrameProducer>>,
    context: Option<C>,
    surface: Option<C::Target>,
    viewport: Option<C::Viewport>,
    overlay: Option<Box<dyn OverlaySurface>>,
}

impl<C: DrawContext> Resources<C> {
    fn new(producer: Box<dyn FrameProducer>) -> Self {
        Self {
            producer: Some(producer),
            context: None,
            surface: None,
            viewport: None,
            overlay: None,
        }
    }

    fn release_all(&mut self) {
        if let Some(mut overlay) = self.overlay.take() {
            overlay.release();
        }
        if let Some(mut viewport) = self.viewport.take() {
            viewport.release();
        }
        if let Some(mut surface) = self.surface.take() {
            surface.release();
        }
        if let Some(mut context) = self.context.take() {
            context.release();
        }
        if let Some(mut producer) = self.producer.take() {
            producer.release();
        }
    }
}

impl<C: DrawContext> Drop for Resources<C> {
    fn drop(&mut self) {
        self.release_all();
    }
}

fn run_job<G: GpuFactory>(seed: JobSeed<G>, event: FrameEvent) {
    let JobSeed {
        factory,
        request,
        output_size,
        texture_id,
        producer,
        drawers,
        angles,
        state,
        listener,
    } = seed;

    let mut resources = Resources::<G::Context>::new(producer);
    let outcome = composite(
        &*factory,
        &request,
        output_size,
        texture_id,
        &drawers,
        &angles,
        event,
        &state,
        &mut resources,
    );
    // Failures in individual releases are logged by the resources
    // themselves; nothing here re-throws.
    resources.release_all();

    match &outcome {
        Ok(result) => {
            info!(bytes = result.data.len(), size = %result.size, "snapshot complete");
            set_state(&state, SnapshotState::Done);
        }
        Err(e) => {
            warn!(error = %e, "snapshot failed");
            set_state(&state, SnapshotState::Failed);
        }
    }
    listener.on_result(outcome);
}

#[allow(clippy::too_many_arguments)]
fn composite<G: GpuFactory>(
    factory: &G,
    request: &CaptureRequest,
    output_size: Size,
    texture_id: TextureId,
    drawers: &[Box<dyn OverlayDrawer>],
    angles: &Angles,
    event: FrameEvent,
    state: &SharedState,
    resources: &mut Resources<G::Context>,
) -> SnapshotOutcome {
    let Resources {
        producer,
        context,
        surface,
        viewport,
        overlay,
    } = resources;

    *context = Some(factory.create_context(ContextFlags::RECORDABLE)?);
    let ctx = context
        .as_ref()
        .ok_or(SnapshotError::Released("gpu context"))?;
    *surface = Some(ctx.create_surface(output_size)?);
    let target = surface
        .as_mut()
        .ok_or(SnapshotError::Released("render surface"))?;
    target.make_current()?;
    *viewport = Some(ctx.create_viewport()?);
    let vp = viewport
        .as_mut()
        .ok_or(SnapshotError::Released("viewport"))?;

    let camera = producer
        .as_mut()
        .ok_or(SnapshotError::Released("frame producer"))?;
    camera.set_default_buffer_size(output_size);
    camera.update_tex_image()?;
    let camera_raw = camera.transform_matrix();

    let mut overlay_draw: Option<(TextureId, Mat4)> = None;
    if request.with_overlay {
        let overlay_tex = vp.create_texture(output_size)?;
        // Track the surface before touching it so a failed lock or post
        // still goes through release_all.
        *overlay = Some(ctx.create_overlay_surface(overlay_tex, output_size)?);
        let overlay_surface = overlay
            .as_mut()
            .ok_or(SnapshotError::Released("overlay surface"))?;
        {
            let canvas = overlay_surface.lock_canvas()?;
            canvas.clear(Color::TRANSPARENT);
            for drawer in drawers {
                drawer.draw_for_picture_snapshot(canvas);
            }
        }
        overlay_surface.unlock_and_post()?;
        overlay_surface.update_tex_image()?;
        overlay_draw = Some((overlay_tex, overlay_surface.transform_matrix()));
    }

    let spec = TransformSpec {
        scale_x: event.scale_x,
        scale_y: event.scale_y,
        axis_flipped: angles.flip(Reference::View, Reference::Sensor),
        rotation: request.rotation,
        overlay_rotation: angles.offset(Reference::View, Reference::Output, Axis::Absolute),
        facing: request.facing,
    };

    vp.draw_frame(target, texture_id, &primary_transform(camera_raw, &spec))?;
    if let Some((overlay_tex, overlay_raw)) = overlay_draw {
        vp.draw_frame(target, overlay_tex, &overlay_transform(overlay_raw, &spec))?;
    }

    set_state(state, SnapshotState::Encoding);
    let data = target.save_frame_to(PictureFormat::Jpeg)?;

    Ok(PictureResult {
        data,
        format: PictureFormat::Jpeg,
        size: output_size,
        // The requested rotation is baked into the pixels.
        rotation: 0,
        facing: request.facing,
    })
}
