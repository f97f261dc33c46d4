//! Orchestrator scenarios over a counting fake GPU backend: single-shot
//! callbacks, draw ordering, release accounting, and failure dispatch.

use std::sync::{Arc, Mutex};

use glam::Mat4;

use camsnap::capture::SnapshotOutcome;
use camsnap::error::SnapshotError;
use camsnap::overlay::{Canvas, OverlayDrawer};
use camsnap::preview::{FrameEvent, FrameHub, FrameProducer};
use camsnap::render::{
    Compositor, ContextFlags, DrawContext, GpuFactory, OverlaySurface, RenderTarget, TextureId,
};
use camsnap::tasks::worker::InlineRunner;
use camsnap::transform::{TransformSpec, overlay_transform, primary_transform};
use camsnap::{
    Angles, AspectRatio, CaptureRequest, Facing, Size, SnapshotRecorder, SnapshotState,
};

const CAMERA_TEX: TextureId = TextureId(7);
const FIRST_OVERLAY_TEX: TextureId = TextureId(100);

#[derive(Default)]
struct Log {
    acquired: usize,
    released: usize,
    context_creates: usize,
    draws: Vec<(TextureId, Mat4)>,
    saves: usize,
    overlay_painted: usize,
    fail_readback: bool,
    fail_draw: bool,
    fail_producer: bool,
    fail_canvas_lock: bool,
}

type SharedLog = Arc<Mutex<Log>>;

struct FakeFactory {
    log: SharedLog,
}

impl GpuFactory for FakeFactory {
    type Context = FakeContext;

    fn create_context(&self, _flags: ContextFlags) -> Result<FakeContext, SnapshotError> {
        let mut log = self.log.lock().unwrap();
        log.context_creates += 1;
        log.acquired += 1;
        Ok(FakeContext {
            log: Arc::clone(&self.log),
            released: false,
        })
    }
}

struct FakeContext {
    log: SharedLog,
    released: bool,
}

impl DrawContext for FakeContext {
    type Target = FakeTarget;
    type Viewport = FakeViewport;

    fn create_surface(&self, _size: Size) -> Result<FakeTarget, SnapshotError> {
        self.log.lock().unwrap().acquired += 1;
        Ok(FakeTarget {
            log: Arc::clone(&self.log),
            current: false,
            released: false,
        })
    }

    fn create_viewport(&self) -> Result<FakeViewport, SnapshotError> {
        self.log.lock().unwrap().acquired += 1;
        Ok(FakeViewport {
            log: Arc::clone(&self.log),
            next_texture: FIRST_OVERLAY_TEX.0,
            released: false,
        })
    }

    fn create_overlay_surface(
        &self,
        _texture: TextureId,
        size: Size,
    ) -> Result<Box<dyn OverlaySurface>, SnapshotError> {
        self.log.lock().unwrap().acquired += 1;
        Ok(Box::new(FakeOverlay {
            log: Arc::clone(&self.log),
            canvas: Canvas::new(size),
            locked: false,
            released: false,
        }))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.log.lock().unwrap().released += 1;
        }
    }
}

struct FakeTarget {
    log: SharedLog,
    current: bool,
    released: bool,
}

impl RenderTarget for FakeTarget {
    fn make_current(&mut self) -> Result<(), SnapshotError> {
        self.current = true;
        Ok(())
    }

    fn save_frame_to(
        &mut self,
        _format: camsnap::PictureFormat,
    ) -> Result<Vec<u8>, SnapshotError> {
        let mut log = self.log.lock().unwrap();
        if log.fail_readback {
            return Err(SnapshotError::readback("canvas lock out of resources"));
        }
        log.saves += 1;
        Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.log.lock().unwrap().released += 1;
        }
    }
}

struct FakeViewport {
    log: SharedLog,
    next_texture: u32,
    released: bool,
}

impl Compositor for FakeViewport {
    type Target = FakeTarget;

    fn create_texture(&mut self, _size: Size) -> Result<TextureId, SnapshotError> {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        Ok(id)
    }

    fn draw_frame(
        &mut self,
        target: &mut FakeTarget,
        texture: TextureId,
        transform: &Mat4,
    ) -> Result<(), SnapshotError> {
        if !target.current {
            return Err(SnapshotError::draw("no surface current"));
        }
        let mut log = self.log.lock().unwrap();
        if log.fail_draw {
            return Err(SnapshotError::draw("draw rejected"));
        }
        log.draws.push((texture, *transform));
        Ok(())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.log.lock().unwrap().released += 1;
        }
    }
}

struct FakeProducer {
    log: SharedLog,
    released: bool,
}

impl FrameProducer for FakeProducer {
    fn set_default_buffer_size(&mut self, _size: Size) {}

    fn update_tex_image(&mut self) -> Result<(), SnapshotError> {
        Ok(())
    }

    fn transform_matrix(&self) -> Mat4 {
        Mat4::IDENTITY
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.log.lock().unwrap().released += 1;
        }
    }
}

struct FakeOverlay {
    log: SharedLog,
    canvas: Canvas,
    locked: bool,
    released: bool,
}

impl FrameProducer for FakeOverlay {
    fn set_default_buffer_size(&mut self, _size: Size) {}

    fn update_tex_image(&mut self) -> Result<(), SnapshotError> {
        Ok(())
    }

    fn transform_matrix(&self) -> Mat4 {
        Mat4::IDENTITY
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.log.lock().unwrap().released += 1;
        }
    }
}

impl OverlaySurface for FakeOverlay {
    fn lock_canvas(&mut self) -> Result<&mut Canvas, SnapshotError> {
        if self.log.lock().unwrap().fail_canvas_lock {
            return Err(SnapshotError::readback("canvas backing store gone"));
        }
        self.locked = true;
        Ok(&mut self.canvas)
    }

    fn unlock_and_post(&mut self) -> Result<(), SnapshotError> {
        self.locked = false;
        Ok(())
    }
}

struct CountingDrawer {
    log: SharedLog,
}

impl OverlayDrawer for CountingDrawer {
    fn draw_for_picture_snapshot(&self, _canvas: &mut Canvas) {
        self.log.lock().unwrap().overlay_painted += 1;
    }
}

type Recorder = SnapshotRecorder<FrameHub, FakeFactory, InlineRunner>;

fn harness(
    log: &SharedLog,
    facing: Facing,
    with_drawer: bool,
) -> (Arc<FrameHub>, Recorder) {
    let producer_log = Arc::clone(log);
    let hub = Arc::new(FrameHub::new(
        CAMERA_TEX,
        Box::new(move || {
            let mut guard = producer_log.lock().unwrap();
            if guard.fail_producer {
                return Err(SnapshotError::acquire("no producer available"));
            }
            guard.acquired += 1;
            drop(guard);
            Ok(Box::new(FakeProducer {
                log: Arc::clone(&producer_log),
                released: false,
            }) as Box<dyn FrameProducer>)
        }),
    ));
    let drawers: Vec<Box<dyn OverlayDrawer>> = if with_drawer {
        vec![Box::new(CountingDrawer {
            log: Arc::clone(log),
        })]
    } else {
        Vec::new()
    };
    let recorder = SnapshotRecorder::new(
        Arc::clone(&hub),
        Arc::new(FakeFactory {
            log: Arc::clone(log),
        }),
        Arc::new(InlineRunner),
        Angles::new(facing, 0, 0, 90).unwrap(),
        drawers,
    );
    (hub, recorder)
}

fn request(facing: Facing, rotation: i32, with_overlay: bool) -> CaptureRequest {
    CaptureRequest {
        size: Size::new(1600, 1200),
        output_ratio: AspectRatio::of(16, 9),
        rotation,
        facing,
        with_overlay,
    }
}

fn collector() -> (Arc<Mutex<Vec<SnapshotOutcome>>>, impl FnOnce(SnapshotOutcome) + Send) {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&outcomes);
    (outcomes, move |o| sink.lock().unwrap().push(o))
}

fn frame() -> FrameEvent {
    FrameEvent {
        scale_x: 1.0,
        scale_y: 1.0,
    }
}

#[test]
fn back_rot90_no_overlay_draws_once_and_crops() {
    let log: SharedLog = Arc::default();
    let (hub, recorder) = harness(&log, Facing::Back, false);
    let (outcomes, listener) = collector();

    recorder.take(request(Facing::Back, 90, false), listener);
    assert_eq!(recorder.state(), SnapshotState::AwaitingFrame);
    hub.dispatch_frame(&frame());

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    let result = outcomes[0].as_ref().unwrap();
    assert_eq!(result.rotation, 0);
    assert_eq!(result.size, Size::new(1600, 900));

    let log = log.lock().unwrap();
    assert_eq!(log.draws.len(), 1);
    assert_eq!(log.draws[0].0, CAMERA_TEX);
    assert_eq!(log.saves, 1);
    assert_eq!(log.acquired, log.released, "resource leak or double release");
    assert_eq!(recorder.state(), SnapshotState::Done);
}

#[test]
fn frame_callback_fires_at_most_once() {
    let log: SharedLog = Arc::default();
    let (hub, recorder) = harness(&log, Facing::Back, false);
    let (outcomes, listener) = collector();

    recorder.take(request(Facing::Back, 0, false), listener);
    hub.dispatch_frame(&frame());
    hub.dispatch_frame(&frame());

    assert_eq!(outcomes.lock().unwrap().len(), 1);
    let log = log.lock().unwrap();
    assert_eq!(log.context_creates, 1, "compositing must run exactly once");
    assert_eq!(log.draws.len(), 1);
    assert_eq!(hub.callback_count(), 0, "callback must deregister itself");
}

#[test]
fn overlay_front_draws_primary_then_overlay() {
    let log: SharedLog = Arc::default();
    let (hub, recorder) = harness(&log, Facing::Front, true);
    let (outcomes, listener) = collector();

    recorder.take(request(Facing::Front, 0, true), listener);
    hub.dispatch_frame(&frame());

    assert!(outcomes.lock().unwrap()[0].is_ok());
    let log = log.lock().unwrap();
    assert_eq!(log.overlay_painted, 1);
    assert_eq!(log.draws.len(), 2);
    assert_eq!(log.draws[0].0, CAMERA_TEX);
    assert_eq!(log.draws[1].0, FIRST_OVERLAY_TEX);
    assert_eq!(log.acquired, log.released);

    // The overlay matrix carries the negated view-to-output rotation.
    let spec = TransformSpec {
        scale_x: 1.0,
        scale_y: 1.0,
        axis_flipped: false,
        rotation: 0,
        overlay_rotation: 90,
        facing: Facing::Front,
    };
    assert_eq!(log.draws[1].1, overlay_transform(Mat4::IDENTITY, &spec));
    assert_eq!(log.draws[0].1, primary_transform(Mat4::IDENTITY, &spec));
}

#[test]
fn overlay_rotation_differs_between_facings() {
    let run = |facing: Facing| {
        let log: SharedLog = Arc::default();
        let (hub, recorder) = harness(&log, facing, true);
        let (_outcomes, listener) = collector();
        recorder.take(request(facing, 0, true), listener);
        hub.dispatch_frame(&frame());
        let log = log.lock().unwrap();
        log.draws[1].1
    };
    assert_ne!(run(Facing::Front), run(Facing::Back));
}

#[test]
fn rotation_is_normalized_for_all_requests() {
    for rotation in [0, 90, 180, 270] {
        let log: SharedLog = Arc::default();
        let (hub, recorder) = harness(&log, Facing::Back, false);
        let (outcomes, listener) = collector();
        recorder.take(request(Facing::Back, rotation, false), listener);
        hub.dispatch_frame(&frame());
        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes[0].as_ref().unwrap().rotation, 0);
    }
}

#[test]
fn readback_failure_dispatches_once_and_releases() {
    let log: SharedLog = Arc::default();
    log.lock().unwrap().fail_readback = true;
    let (hub, recorder) = harness(&log, Facing::Back, false);
    let (outcomes, listener) = collector();

    recorder.take(request(Facing::Back, 0, false), listener);
    hub.dispatch_frame(&frame());

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0], Err(SnapshotError::Readback(_))));

    let log = log.lock().unwrap();
    assert_eq!(log.saves, 0);
    assert_eq!(log.acquired, log.released, "failure path must still release");
    assert_eq!(recorder.state(), SnapshotState::Failed);
}

#[test]
fn draw_failure_dispatches_once_and_releases() {
    let log: SharedLog = Arc::default();
    log.lock().unwrap().fail_draw = true;
    let (hub, recorder) = harness(&log, Facing::Back, false);
    let (outcomes, listener) = collector();

    recorder.take(request(Facing::Back, 0, false), listener);
    hub.dispatch_frame(&frame());

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0], Err(SnapshotError::Draw(_))));
    let log = log.lock().unwrap();
    assert_eq!(log.acquired, log.released);
}

#[test]
fn canvas_lock_failure_releases_overlay_surface() {
    let log: SharedLog = Arc::default();
    log.lock().unwrap().fail_canvas_lock = true;
    let (hub, recorder) = harness(&log, Facing::Front, true);
    let (outcomes, listener) = collector();

    recorder.take(request(Facing::Front, 0, true), listener);
    hub.dispatch_frame(&frame());

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0], Err(SnapshotError::Readback(_))));

    let log = log.lock().unwrap();
    assert_eq!(log.overlay_painted, 0);
    assert_eq!(log.draws.len(), 0);
    assert_eq!(
        log.acquired, log.released,
        "overlay surface must be released when its canvas lock fails"
    );
    assert_eq!(recorder.state(), SnapshotState::Failed);
}

#[test]
fn second_take_while_armed_is_rejected() {
    let log: SharedLog = Arc::default();
    let (hub, recorder) = harness(&log, Facing::Back, false);
    let (first, first_listener) = collector();
    let (second, second_listener) = collector();

    recorder.take(request(Facing::Back, 0, false), first_listener);
    recorder.take(request(Facing::Back, 0, false), second_listener);

    {
        let second = second.lock().unwrap();
        assert_eq!(second.len(), 1);
        assert!(matches!(second[0], Err(SnapshotError::Busy)));
    }

    hub.dispatch_frame(&frame());
    assert_eq!(first.lock().unwrap().len(), 1);
    assert!(first.lock().unwrap()[0].is_ok());
}

#[test]
fn producer_failure_fails_before_arming() {
    let log: SharedLog = Arc::default();
    log.lock().unwrap().fail_producer = true;
    let (hub, recorder) = harness(&log, Facing::Back, false);
    let (outcomes, listener) = collector();

    recorder.take(request(Facing::Back, 0, false), listener);

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0], Err(SnapshotError::Acquire(_))));
    assert_eq!(recorder.state(), SnapshotState::Failed);
    assert_eq!(hub.callback_count(), 0);

    // A frame after the failure must not resurrect the capture.
    drop(outcomes);
    hub.dispatch_frame(&frame());
    assert_eq!(log.lock().unwrap().context_creates, 0);
}
