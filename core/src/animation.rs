use alloc::sync::Arc;
use core::cell::Cell;

use embedded_graphics::prelude::DrawTarget;
use log::{debug, info, trace, warn};

use crate::{
    error::{Error, Result},
    packer::PackedFrame,
    viewport::{RenderOptions, render_frame},
};

/// Millisecond time source driving playback.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationOptions {
    /// Used for frames without their own delay
    pub fps: u32,
    pub looping: bool,
    /// Bounce between the first and last frame instead of wrapping
    pub pingpong: bool,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            fps: 10,
            looping: true,
            pingpong: false,
        }
    }
}

/// Handle for the single scheduled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickToken {
    generation: u32,
    due_ms: u64,
}

impl TickToken {
    pub fn due_ms(&self) -> u64 {
        self.due_ms
    }
}

pub struct AnimationController<D: DrawTarget, C: Clock> {
    surface: D,
    frames: Arc<[PackedFrame]>,
    render: RenderOptions<D::Color>,
    clock: C,
    index: usize,
    forward: bool,
    fps: u32,
    looping: bool,
    pingpong: bool,
    state: PlayState,
    pending: Option<TickToken>,
    generation: u32,
}

/// Shows the first frame on `surface` and starts playback when there is more than one frame.
pub fn play<D, C>(
    surface: D,
    frames: Arc<[PackedFrame]>,
    render: RenderOptions<D::Color>,
    options: AnimationOptions,
    clock: C,
) -> Result<AnimationController<D, C>>
where
    D: DrawTarget,
    D::Error: core::fmt::Debug,
    C: Clock,
{
    let mut controller = AnimationController::new(surface, frames, render, options, clock)?;
    controller.render();
    controller.start();
    Ok(controller)
}

impl<D, C> AnimationController<D, C>
where
    D: DrawTarget,
    D::Error: core::fmt::Debug,
    C: Clock,
{
    pub fn new(
        surface: D,
        frames: Arc<[PackedFrame]>,
        render: RenderOptions<D::Color>,
        options: AnimationOptions,
        clock: C,
    ) -> Result<Self> {
        if frames.is_empty() {
            return Err(Error::InvalidArgument("no frames to play"));
        }
        Ok(Self {
            surface,
            frames,
            render,
            clock,
            index: 0,
            forward: true,
            fps: options.fps.max(1),
            looping: options.looping,
            pingpong: options.pingpong,
            state: PlayState::Stopped,
            pending: None,
            generation: 0,
        })
    }

    pub fn start(&mut self) {
        if self.state == PlayState::Playing {
            return;
        }
        if self.frames.len() < 2 {
            debug!("Single frame, not starting playback");
            return;
        }
        info!("Playing {} frames at {} fps", self.frames.len(), self.fps);
        self.state = PlayState::Playing;
        self.schedule();
    }

    /// Like [`start`](Self::start), but a run that ended on the last frame
    /// starts over from the first one.
    pub fn resume(&mut self) {
        let last = self.frames.len() - 1;
        if self.state == PlayState::Stopped && !self.looping && self.index == last {
            self.forward = true;
            self.go_to(0);
        }
        self.start();
    }

    pub fn stop(&mut self) {
        if self.state == PlayState::Stopped {
            return;
        }
        info!("Stopped at frame {}", self.index);
        self.state = PlayState::Stopped;
        self.pending = None;
    }

    /// Jumps to `index`, clamped to the last frame. Play state is unchanged.
    pub fn go_to(&mut self, index: usize) {
        self.index = index.min(self.frames.len() - 1);
        self.render();
    }

    pub fn set_fps(&mut self, fps: u32) -> Result<()> {
        if fps == 0 {
            return Err(Error::InvalidArgument("fps must be positive"));
        }
        self.fps = fps;
        if self.state == PlayState::Playing {
            self.schedule();
        }
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn current_frame(&self) -> usize {
        self.index
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn pending_tick(&self) -> Option<TickToken> {
        self.pending
    }

    pub fn surface(&self) -> &D {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut D {
        &mut self.surface
    }

    pub fn into_surface(mut self) -> D {
        self.stop();
        self.surface
    }

    /// Runs the pending tick if it is due. Returns whether a tick ran.
    pub fn poll(&mut self) -> bool {
        match self.pending {
            Some(token) if self.clock.now_ms() >= token.due_ms => self.fire(token),
            _ => false,
        }
    }

    /// Runs a scheduled tick. Tokens superseded by a newer schedule are ignored.
    pub fn fire(&mut self, token: TickToken) -> bool {
        if self.pending != Some(token) {
            trace!("Ignoring stale tick {}", token.generation);
            return false;
        }
        self.pending = None;
        self.tick();
        if self.state == PlayState::Playing {
            self.schedule();
        }
        true
    }

    /// Advances one step and shows the new frame.
    pub fn tick(&mut self) {
        self.advance();
        trace!("Frame {}", self.index);
        self.render();
    }

    fn advance(&mut self) {
        let last = self.frames.len() - 1;
        if self.forward {
            if self.index < last {
                self.index += 1;
            } else if !self.looping {
                self.index = last;
                self.stop();
            } else if self.pingpong {
                self.forward = false;
                self.index = last.saturating_sub(1);
            } else {
                self.index = 0;
            }
        } else if self.index > 0 {
            self.index -= 1;
        } else {
            self.forward = true;
            self.index = last.min(1);
        }
    }

    fn frame_delay_ms(&self) -> u64 {
        match self.frames[self.index].delay_ms {
            Some(delay) if delay > 0 => delay as u64,
            _ => (1000 / self.fps.max(1)).max(1) as u64,
        }
    }

    fn schedule(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.pending = Some(TickToken {
            generation: self.generation,
            due_ms: self.clock.now_ms() + self.frame_delay_ms(),
        });
    }

    fn render(&mut self) {
        let frame = &self.frames[self.index];
        if let Err(err) = render_frame(&mut self.surface, frame, &self.render) {
            warn!("Failed to render frame {}: {:?}", self.index, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use embedded_graphics::{pixelcolor::BinaryColor, prelude::Size};

    use super::*;
    use crate::{canvas::Canvas, geometry::SSD1306_128X32};

    type Controller<'a> = AnimationController<Canvas<BinaryColor>, &'a ManualClock>;

    /// Frame `n` lights the first `n + 1` columns of page 0 row 0.
    fn frames(count: usize) -> Arc<[PackedFrame]> {
        (0..count)
            .map(|n| {
                let mut bytes = vec![0u8; 512];
                bytes[..=n].iter_mut().for_each(|b| *b = 1);
                PackedFrame {
                    bytes,
                    preset: &SSD1306_128X32,
                    delay_ms: None,
                }
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn start(clock: &ManualClock, count: usize, options: AnimationOptions) -> Controller<'_> {
        let canvas = Canvas::new(Size::new(128, 32), BinaryColor::Off);
        play(canvas, frames(count), RenderOptions::default(), options, clock).unwrap()
    }

    fn lit_columns(controller: &Controller<'_>) -> usize {
        (0..128)
            .filter(|&x| controller.surface().pixel(x, 0) == Some(BinaryColor::On))
            .count()
    }

    #[test]
    fn loop_wraps_after_last_frame() {
        let clock = ManualClock::new();
        let mut controller = start(&clock, 3, AnimationOptions::default());
        assert!(controller.is_playing());
        for _ in 0..3 {
            controller.tick();
        }
        assert_eq!(controller.current_frame(), 0);
    }

    #[test]
    fn pingpong_bounces() {
        let clock = ManualClock::new();
        let options = AnimationOptions {
            pingpong: true,
            ..AnimationOptions::default()
        };
        let mut controller = start(&clock, 3, options);
        let mut seen = vec![controller.current_frame()];
        for _ in 0..4 {
            controller.tick();
            seen.push(controller.current_frame());
        }
        assert_eq!(seen, [0, 1, 2, 1, 0]);
    }

    #[test]
    fn without_loop_stops_on_last_frame() {
        let clock = ManualClock::new();
        let options = AnimationOptions {
            looping: false,
            ..AnimationOptions::default()
        };
        let mut controller = start(&clock, 3, options);
        for _ in 0..5 {
            clock.advance(100);
            controller.poll();
        }
        assert!(!controller.is_playing());
        assert_eq!(controller.current_frame(), 2);
        assert_eq!(controller.pending_tick(), None);
    }

    #[test]
    fn without_loop_pingpong_still_stops() {
        let clock = ManualClock::new();
        let options = AnimationOptions {
            looping: false,
            pingpong: true,
            ..AnimationOptions::default()
        };
        let mut controller = start(&clock, 3, options);
        let mut seen = vec![controller.current_frame()];
        for _ in 0..3 {
            clock.advance(100);
            controller.poll();
            seen.push(controller.current_frame());
        }
        assert_eq!(seen, [0, 1, 2, 2]);
        assert_eq!(controller.state(), PlayState::Stopped);
        assert_eq!(controller.pending_tick(), None);
    }

    #[test]
    fn resume_restarts_finished_run() {
        let clock = ManualClock::new();
        let options = AnimationOptions {
            looping: false,
            ..AnimationOptions::default()
        };
        let mut controller = start(&clock, 3, options);
        for _ in 0..3 {
            controller.tick();
        }
        assert!(!controller.is_playing());
        assert_eq!(controller.current_frame(), 2);

        controller.resume();
        assert!(controller.is_playing());
        assert_eq!(controller.current_frame(), 0);
        assert_eq!(lit_columns(&controller), 1);
        clock.advance(100);
        assert!(controller.poll());
        assert_eq!(controller.current_frame(), 1);
    }

    #[test]
    fn resume_keeps_position_mid_run() {
        let clock = ManualClock::new();
        let mut controller = start(&clock, 4, AnimationOptions::default());
        controller.tick();
        controller.stop();
        controller.resume();
        assert!(controller.is_playing());
        assert_eq!(controller.current_frame(), 1);
    }

    #[test]
    fn into_surface_keeps_shown_frame() {
        let clock = ManualClock::new();
        let mut controller = start(&clock, 3, AnimationOptions::default());
        controller.tick();
        assert!(controller.is_playing());
        let canvas = controller.into_surface();
        assert_eq!(canvas.pixel(1, 0), Some(BinaryColor::On));
        assert_eq!(canvas.pixel(2, 0), Some(BinaryColor::Off));
    }

    #[test]
    fn single_frame_never_plays() {
        let clock = ManualClock::new();
        let mut controller = start(&clock, 1, AnimationOptions::default());
        assert!(!controller.is_playing());
        controller.start();
        assert_eq!(controller.state(), PlayState::Stopped);
        assert_eq!(lit_columns(&controller), 1);
    }

    #[test]
    fn poll_follows_clock() {
        let clock = ManualClock::new();
        let mut controller = start(&clock, 3, AnimationOptions::default());
        assert_eq!(lit_columns(&controller), 1);
        clock.advance(99);
        assert!(!controller.poll());
        clock.advance(1);
        assert!(controller.poll());
        assert_eq!(controller.current_frame(), 1);
        assert_eq!(lit_columns(&controller), 2);
        assert_eq!(controller.pending_tick().map(|t| t.due_ms()), Some(200));
    }

    #[test]
    fn frame_delay_overrides_fps() {
        let clock = ManualClock::new();
        let mut sequence: Vec<PackedFrame> = frames(2).iter().cloned().collect();
        sequence[0].delay_ms = Some(500);
        let canvas = Canvas::new(Size::new(128, 32), BinaryColor::Off);
        let mut controller = play(
            canvas,
            sequence.into(),
            RenderOptions::default(),
            AnimationOptions::default(),
            &clock,
        )
        .unwrap();
        clock.advance(400);
        assert!(!controller.poll());
        clock.advance(100);
        assert!(controller.poll());
        // second frame falls back to 10 fps
        assert_eq!(controller.pending_tick().map(|t| t.due_ms()), Some(600));
    }

    #[test]
    fn stop_cancels_pending_tick() {
        let clock = ManualClock::new();
        let mut controller = start(&clock, 3, AnimationOptions::default());
        let token = controller.pending_tick().unwrap();
        controller.stop();
        controller.stop();
        assert!(!controller.is_playing());
        clock.advance(1000);
        assert!(!controller.poll());
        assert!(!controller.fire(token));
        assert_eq!(controller.current_frame(), 0);
    }

    #[test]
    fn stale_tick_is_ignored() {
        let clock = ManualClock::new();
        let mut controller = start(&clock, 3, AnimationOptions::default());
        let stale = controller.pending_tick().unwrap();
        controller.set_fps(20).unwrap();
        assert!(!controller.fire(stale));
        let fresh = controller.pending_tick().unwrap();
        assert_eq!(fresh.due_ms(), 50);
        assert!(controller.fire(fresh));
        assert_eq!(controller.current_frame(), 1);
    }

    #[test]
    fn set_fps_rejects_zero() {
        let clock = ManualClock::new();
        let mut controller = start(&clock, 3, AnimationOptions::default());
        assert_eq!(
            controller.set_fps(0),
            Err(Error::InvalidArgument("fps must be positive"))
        );
        assert_eq!(controller.fps(), 10);
    }

    #[test]
    fn set_fps_keeps_position() {
        let clock = ManualClock::new();
        let mut controller = start(&clock, 3, AnimationOptions::default());
        controller.tick();
        controller.set_fps(30).unwrap();
        assert_eq!(controller.current_frame(), 1);
        assert!(controller.is_playing());
    }

    #[test]
    fn go_to_clamps_and_keeps_playing() {
        let clock = ManualClock::new();
        let mut controller = start(&clock, 3, AnimationOptions::default());
        controller.go_to(10);
        assert_eq!(controller.current_frame(), 2);
        assert_eq!(lit_columns(&controller), 3);
        assert!(controller.is_playing());
        controller.stop();
        controller.go_to(1);
        assert_eq!(controller.current_frame(), 1);
        assert!(!controller.is_playing());
    }

    #[test]
    fn empty_sequence_is_rejected() {
        let clock = ManualClock::new();
        let canvas = Canvas::new(Size::new(128, 32), BinaryColor::Off);
        let result = play(
            canvas,
            frames(0),
            RenderOptions::default(),
            AnimationOptions::default(),
            &clock,
        );
        assert!(result.is_err());
    }
}
