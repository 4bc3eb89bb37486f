//! Integration tests for the render loop
//!
//! These tests validate the full acquisition → stabilization → render →
//! presentation path:
//! - Replaying a recorded sequence into a collecting surface
//! - Headless PNG output with a frame budget
//! - Image reset requested through the control surface while running
//! - Projector window shutdown ending the loop
//! - Concurrent settings writes never exposing an invalid snapshot

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arsandbox_rs::backend::{RecordedSensor, RenderLoop, SensorAdapter, TickOutcome};
use arsandbox_rs::config::{PipelineSettings, RenderConfig, SettingsUpdate, StabilizerConfig};
use arsandbox_rs::control::ControlSurface;
use arsandbox_rs::pipeline::{ContourRenderer, SharedStore, Stabilizer};
use arsandbox_rs::presentation::PresentationSurface;
use common::builders::{depth_ramp, DepthRasterBuilder};
use common::mock_helpers::{connected_adapter, write_recording, CollectingSurface};
use common::test_timeout;

fn stabilizer() -> Stabilizer {
    Stabilizer::new(StabilizerConfig {
        inpaint_radius: 3,
        dilation_radius: 1,
        dilation_iterations: 2,
    })
}

fn render_loop(
    adapter: SensorAdapter,
    surface: Box<dyn PresentationSurface>,
    store: Arc<SharedStore>,
    running: Arc<AtomicBool>,
) -> RenderLoop {
    RenderLoop::new(
        adapter,
        stabilizer(),
        ContourRenderer::new(RenderConfig::default()),
        surface,
        store,
        running,
    )
}

// ==================== Recorded replay ====================

#[test]
fn test_recorded_sequence_renders_every_frame() {
    let dir = tempfile::tempdir().unwrap();
    write_recording(
        dir.path(),
        &[
            depth_ramp(48, 32, 700.0, 2500.0),
            DepthRasterBuilder::new(48, 32).fill(1200.0).dropout(5, 5).build(),
            depth_ramp(48, 32, 900.0, 2200.0),
        ],
    );

    let sensor = RecordedSensor::new(dir.path()).with_frame_interval(Duration::ZERO);
    let store = Arc::new(SharedStore::new(PipelineSettings::default()));
    let (surface, frames) = CollectingSurface::new(10);
    let mut render_loop = render_loop(
        connected_adapter(Box::new(sensor)),
        Box::new(surface),
        Arc::clone(&store),
        Arc::new(AtomicBool::new(true)),
    );

    let outcomes: Vec<TickOutcome> = (0..5).map(|_| render_loop.tick()).collect();

    assert_eq!(
        outcomes,
        vec![
            TickOutcome::Rendered,
            TickOutcome::Rendered,
            TickOutcome::Rendered,
            TickOutcome::Skipped,
            TickOutcome::Skipped,
        ]
    );
    assert_eq!(frames.lock().unwrap().len(), 3);
    assert_eq!(render_loop.stats().frames_rendered, 3);
    assert_eq!(render_loop.stats().polls_skipped, 2);

    let display = store.display();
    assert_eq!(display.generation, 3);
    assert_eq!(display.stats.frames_rendered, 3);
    assert_eq!(
        display.composite.map(|c| c.dimensions()),
        Some((48, 32))
    );
}

#[test]
fn test_resized_recording_drops_history_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    write_recording(
        dir.path(),
        &[
            DepthRasterBuilder::new(32, 24).fill(1000.0).build(),
            DepthRasterBuilder::new(40, 30).fill(1000.0).build(),
        ],
    );

    let sensor = RecordedSensor::new(dir.path()).with_frame_interval(Duration::ZERO);
    let (surface, frames) = CollectingSurface::new(10);
    let mut render_loop = render_loop(
        connected_adapter(Box::new(sensor)),
        Box::new(surface),
        Arc::new(SharedStore::new(PipelineSettings::default())),
        Arc::new(AtomicBool::new(true)),
    );

    assert_eq!(render_loop.tick(), TickOutcome::Rendered);
    assert_eq!(render_loop.tick(), TickOutcome::Rendered);

    let frames = frames.lock().unwrap();
    assert_eq!(frames[0].dimensions(), (32, 24));
    assert_eq!(frames[1].dimensions(), (40, 30));
    assert_eq!(
        render_loop.state().previous().map(|p| p.dimensions()),
        Some((40, 30))
    );
}

// ==================== Synthetic sensor ====================

#[cfg(feature = "mock-sensor")]
mod synthetic {
    use super::*;
    use arsandbox_rs::presentation::{PngSequenceSurface, ProjectorWindow};
    use arsandbox_rs::raster::Raster;
    use common::mock_helpers::create_test_sensor;

    #[test]
    fn test_headless_run_writes_frame_budget() {
        let dir = tempfile::tempdir().unwrap();
        let surface = PngSequenceSurface::new(dir.path(), Some(3)).unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let mut render_loop = render_loop(
            connected_adapter(Box::new(create_test_sensor(64, 48))),
            Box::new(surface),
            Arc::new(SharedStore::new(PipelineSettings::default())),
            Arc::clone(&running),
        );

        render_loop.run();
        assert_eq!(render_loop.stats().frames_rendered, 3);
        assert!(!running.load(Ordering::SeqCst));
        // Dropping the loop joins the writer thread.
        drop(render_loop);

        let mut written: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        written.sort();
        assert_eq!(
            written,
            vec!["frame_000000.png", "frame_000001.png", "frame_000002.png"]
        );
    }

    #[test]
    fn test_reset_request_is_consumed_by_next_frame() {
        let store = Arc::new(SharedStore::new(PipelineSettings::default()));
        let control = ControlSurface::new(Arc::clone(&store));
        let (surface, _frames) = CollectingSurface::new(100);
        let mut render_loop = render_loop(
            connected_adapter(Box::new(create_test_sensor(32, 24))),
            Box::new(surface),
            Arc::clone(&store),
            Arc::new(AtomicBool::new(true)),
        );

        for _ in 0..3 {
            assert_eq!(render_loop.tick(), TickOutcome::Rendered);
        }
        assert_eq!(render_loop.state().frames_since_reset(), 3);

        control.request_reset();
        assert!(control.reset_pending());

        assert_eq!(render_loop.tick(), TickOutcome::Rendered);
        assert!(!control.reset_pending());
        assert_eq!(render_loop.state().frames_since_reset(), 1);
        assert_eq!(render_loop.stats().resets, 1);
    }

    #[test]
    fn test_closing_projector_stops_loop() {
        let store = Arc::new(SharedStore::new(PipelineSettings::default()));
        let running = Arc::new(AtomicBool::new(true));
        let projector =
            ProjectorWindow::create_window("projector", Raster::filled(32, 24, [0, 0, 0]), true);

        let mut render_loop = render_loop(
            connected_adapter(Box::new(create_test_sensor(32, 24))),
            Box::new(projector.clone()),
            Arc::clone(&store),
            Arc::clone(&running),
        )
        .with_color_preview(true);
        let handle = std::thread::spawn(move || render_loop.run());

        let start = Instant::now();
        while projector.latest().1 < 2 {
            assert!(start.elapsed() < test_timeout(), "No frames reached the projector");
            std::thread::sleep(Duration::from_millis(1));
        }
        projector.close();

        handle.join().unwrap();
        assert!(!running.load(Ordering::SeqCst));
        assert!(store.display().generation >= 2);
        assert!(store.display().color.is_some());
    }

    #[test]
    fn test_settings_changes_while_running() {
        let store = Arc::new(SharedStore::new(PipelineSettings::default()));
        let control = ControlSurface::new(Arc::clone(&store));
        let running = Arc::new(AtomicBool::new(true));
        let (surface, frames) = CollectingSurface::new(usize::MAX);

        let mut render_loop = render_loop(
            connected_adapter(Box::new(create_test_sensor(32, 24))),
            Box::new(surface),
            Arc::clone(&store),
            Arc::clone(&running),
        );
        let handle = std::thread::spawn(move || {
            render_loop.run();
            render_loop.stats().clone()
        });

        for step in [4, 8, 16, 32] {
            control
                .apply(&SettingsUpdate::new().contour_step(step))
                .unwrap();
            assert!(control
                .apply(&SettingsUpdate::new().depth_bounds(2000.0, 1000.0))
                .is_err());
            std::thread::sleep(Duration::from_millis(5));
        }
        running.store(false, Ordering::SeqCst);

        let stats = handle.join().unwrap();
        assert_eq!(stats.frames_dropped, 0);
        assert!(stats.frames_rendered > 0);
        assert_eq!(frames.lock().unwrap().len() as u64, stats.frames_rendered);
        assert_eq!(control.snapshot().contour_step, 32);
    }
}

// ==================== Store concurrency ====================

#[test]
fn test_concurrent_writes_keep_snapshot_valid() {
    let store = Arc::new(SharedStore::new(PipelineSettings::with_depth_bounds(
        500.0, 1500.0,
    )));
    let done = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (0..4)
        .map(|id| {
            let control = ControlSurface::new(Arc::clone(&store));
            std::thread::spawn(move || {
                for i in 0..200 {
                    let min = 500.0 + (id * 200 + i) as f32;
                    let _ = control.apply(&SettingsUpdate::new().depth_bounds(min, min + 1000.0));
                    // Inverted bounds and out-of-order thresholds must never land.
                    let _ = control.apply(&SettingsUpdate::new().depth_bounds(min + 1000.0, min));
                    let _ = control
                        .apply(&SettingsUpdate::new().noise_thresholds(40.0, 20.0, 10.0));
                }
            })
        })
        .collect();

    let reader = {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            let mut reads = 0u64;
            loop {
                let snapshot = store.get_all();
                assert!(snapshot.validate().is_ok(), "Torn snapshot: {:?}", snapshot);
                assert_eq!(snapshot.max_depth - snapshot.min_depth, 1000.0);
                reads += 1;
                if done.load(Ordering::SeqCst) {
                    break reads;
                }
            }
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    assert!(reader.join().unwrap() > 0);
}
