//! Animation and pause interplay through a running program.
//!
//! # Invariants
//!
//! 1. Animation frames run on the timer thread while `run()` pauses.
//! 2. `exit()` stops animation and unblocks a paused `run()` with `Killed`.
//! 3. Single-stepping with scale 0 advances `run()` one pause at a time.
//! 4. `exit()` returns even while an animation frame is parked in `pause()`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use stagehand_core::error::ProgramResult;
use stagehand_core::geometry::Size;
use stagehand_core::sink::MemorySink;
use stagehand_runtime::{
    HeadlessSurface, Lifecycle, PersistenceConfig, Program, ProgramConfig, ProgramContext,
    StartupConfig,
};

fn embedded_config(host: Arc<HeadlessSurface>) -> ProgramConfig {
    ProgramConfig::default()
        .with_host(host)
        .with_startup(StartupConfig::immediate().with_recheck(Duration::from_millis(5)))
        .with_persistence(PersistenceConfig::disabled())
        .with_output(Arc::new(MemorySink::new()))
        .with_terminator(|_| {})
}

struct Animated {
    frames: AtomicUsize,
}

impl Program for Animated {
    fn init(&self, ctx: &ProgramContext) -> ProgramResult {
        ctx.set_frames_per_second(200)?;
        ctx.set_animated(true)
    }

    fn run(&self, ctx: &ProgramContext) -> ProgramResult {
        loop {
            ctx.pause(10.0)?;
        }
    }

    fn animation(&self, _ctx: &ProgramContext) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn exit_stops_animation_and_kills_run() {
    let host = Arc::new(HeadlessSurface::new(Size::new(100, 100)));
    let program = Arc::new(Animated {
        frames: AtomicUsize::new(0),
    });
    let lifecycle = Lifecycle::with_program(program.clone(), embedded_config(host));
    let worker = lifecycle.start(Vec::<String>::new()).unwrap();

    std::thread::sleep(Duration::from_millis(150));
    assert!(lifecycle.is_animated());
    assert!(program.frames.load(Ordering::SeqCst) >= 3);

    lifecycle.exit().unwrap();
    assert!(!lifecycle.is_animated());
    let result = worker.join_timeout(Duration::from_secs(5)).unwrap();
    assert!(result.unwrap_err().is_killed());

    let frames = program.frames.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(program.frames.load(Ordering::SeqCst), frames);
}

struct Stepper {
    steps: mpsc::Sender<usize>,
}

impl Program for Stepper {
    fn run(&self, ctx: &ProgramContext) -> ProgramResult {
        for step in 0.. {
            ctx.pause(1.0)?;
            let _ = self.steps.send(step);
        }
        Ok(())
    }
}

#[test]
fn single_step_advances_one_pause() {
    let host = Arc::new(HeadlessSurface::new(Size::new(100, 100)));
    let (tx, rx) = mpsc::channel();
    let lifecycle = Lifecycle::with_program(Arc::new(Stepper { steps: tx }), embedded_config(host));
    lifecycle.set_pause_scale_factor(0.0).unwrap();
    let worker = lifecycle.start(Vec::<String>::new()).unwrap();

    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    lifecycle.pause_tick();
    assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 0);
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    lifecycle.pause_tick();
    assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 1);

    lifecycle.kill_me();
    assert!(
        worker
            .join_timeout(Duration::from_secs(5))
            .unwrap()
            .unwrap_err()
            .is_killed()
    );
}

struct ParkedFrame {
    entered: AtomicBool,
    aborted: AtomicBool,
}

impl Program for ParkedFrame {
    fn init(&self, ctx: &ProgramContext) -> ProgramResult {
        ctx.set_pause_scale_factor(0.0)?;
        ctx.set_animated(true)
    }

    fn animation(&self, ctx: &ProgramContext) {
        self.entered.store(true, Ordering::SeqCst);
        if ctx.pause(10.0).is_err() {
            self.aborted.store(true, Ordering::SeqCst);
        }
    }
}

#[test]
fn exit_returns_while_animation_frame_is_paused() {
    let host = Arc::new(HeadlessSurface::new(Size::new(100, 100)));
    let program = Arc::new(ParkedFrame {
        entered: AtomicBool::new(false),
        aborted: AtomicBool::new(false),
    });
    let lifecycle = Arc::new(Lifecycle::with_program(program.clone(), embedded_config(host)));
    lifecycle.start(Vec::<String>::new()).unwrap();

    for _ in 0..200 {
        if program.entered.load(Ordering::SeqCst) {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(program.entered.load(Ordering::SeqCst));

    let (tx, rx) = mpsc::channel();
    {
        let lifecycle = Arc::clone(&lifecycle);
        std::thread::spawn(move || {
            let _ = tx.send(lifecycle.exit());
        });
    }
    rx.recv_timeout(Duration::from_secs(3)).unwrap().unwrap();
    assert!(lifecycle.is_killed());
    assert!(!lifecycle.is_animated());

    for _ in 0..200 {
        if program.aborted.load(Ordering::SeqCst) {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(program.aborted.load(Ordering::SeqCst));
}
