//! Single-contact touch tracking
//!
//! Turns one raw sample per poll tick into at most one edge-triggered
//! [TouchEvent].

use core::fmt::Debug;

use crate::TouchSensor;

/// Pressure threshold used by [TouchTracker::default]
pub const DEFAULT_PRESSURE_THRESHOLD: u16 = 400;

// Full scale of a 12-bit ADC conversion
const ADC_FULL_SCALE: u32 = 4095;

/// How a sensor reports contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Capacitive sensors report contact directly
    Flag(bool),
    /// Resistive sensors report a pressure estimate which is compared against
    /// the tracker's threshold
    Pressure(u16),
}

/// One raw reading, produced once per poll tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchSample {
    pub presence: Presence,
    /// Raw X position in sensor units
    pub x: u16,
    /// Raw Y position in sensor units
    pub y: u16,
}

impl TouchSample {
    /// A sample from a sensor which reports contact as a flag
    pub fn capacitive(touched: bool, x: u16, y: u16) -> Self {
        Self {
            presence: Presence::Flag(touched),
            x,
            y,
        }
    }

    /// A sample from a resistive sensor, using the two plate measurements to
    /// estimate pressure as `z1 + 4095 - z2`
    pub fn resistive(z1: u16, z2: u16, x: u16, y: u16) -> Self {
        let z = (z1 as u32 + ADC_FULL_SCALE).saturating_sub(z2 as u32);
        let z = z.min(u16::MAX as u32) as u16;

        Self {
            presence: Presence::Pressure(z),
            x,
            y,
        }
    }

    /// A sample which indicates no contact
    pub fn released() -> Self {
        Self::capacitive(false, 0, 0)
    }

    /// Does this sample indicate contact?
    ///
    /// A pressure exactly equal to `threshold` counts as released.
    pub fn is_pressed(&self, threshold: u16) -> bool {
        match self.presence {
            Presence::Flag(touched) => touched,
            Presence::Pressure(z) => z > threshold,
        }
    }
}

/// The kind of an emitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    FingerDown,
    FingerMove,
    FingerUp,
}

/// An event emitted by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchEvent {
    pub kind: EventKind,
    /// Contact ID; always `0`
    pub id: u8,
    /// Raw X position; `0` for [EventKind::FingerUp]
    pub x: u16,
    /// Raw Y position; `0` for [EventKind::FingerUp]
    pub y: u16,
}

impl TouchEvent {
    fn new(kind: EventKind, x: u16, y: u16) -> Self {
        Self { kind, id: 0, x, y }
    }
}

/// Tracker state between ticks
///
/// `last_x` and `last_y` hold the most recently reported position and are
/// only meaningful while `touched` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerState {
    pub touched: bool,
    pub last_x: u16,
    pub last_y: u16,
}

/// Debouncing state machine for a single contact
#[derive(Debug, Clone)]
pub struct TouchTracker {
    threshold: u16,
    state: TrackerState,
}

impl Default for TouchTracker {
    fn default() -> Self {
        Self::new(DEFAULT_PRESSURE_THRESHOLD)
    }
}

impl TouchTracker {
    /// Create a tracker; `threshold` only applies to pressure samples
    pub fn new(threshold: u16) -> Self {
        Self {
            threshold,
            state: TrackerState::default(),
        }
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Forget any contact in progress without emitting an event
    pub fn reset(&mut self) {
        self.state = TrackerState::default();
    }

    /// Feed one sample, returning the event it triggers, if any
    pub fn update(&mut self, sample: TouchSample) -> Option<TouchEvent> {
        let pressed = sample.is_pressed(self.threshold);

        if !pressed && !self.state.touched {
            return None;
        }

        let event = if pressed {
            if !self.state.touched {
                self.remember(sample.x, sample.y);
                Some(TouchEvent::new(EventKind::FingerDown, sample.x, sample.y))
            } else if sample.x != self.state.last_x || sample.y != self.state.last_y {
                self.remember(sample.x, sample.y);
                Some(TouchEvent::new(EventKind::FingerMove, sample.x, sample.y))
            } else {
                None
            }
        } else {
            self.state.touched = false;
            Some(TouchEvent::new(EventKind::FingerUp, 0, 0))
        };

        if let Some(event) = event {
            log::trace!("{:?} id={} at {} / {}", event.kind, event.id, event.x, event.y);
        }

        event
    }

    fn remember(&mut self, x: u16, y: u16) {
        self.state = TrackerState {
            touched: true,
            last_x: x,
            last_y: y,
        };
    }
}

/// Receives events from a [TouchDevice]
///
/// Called inline from the polling loop, so implementations must not block.
pub trait EventSink {
    fn on_event(&mut self, event: TouchEvent);
}

impl<F> EventSink for F
where
    F: FnMut(TouchEvent),
{
    fn on_event(&mut self, event: TouchEvent) {
        self(event)
    }
}

/// A sensor, its tracker and the consumer of its events
///
/// The sink is fixed at construction; there is no way to register a second
/// one.
pub struct TouchDevice<S, K> {
    sensor: S,
    tracker: TouchTracker,
    sink: K,
}

impl<S, K> TouchDevice<S, K>
where
    S: TouchSensor,
    S::Error: Debug,
    K: EventSink,
{
    pub fn new(sensor: S, tracker: TouchTracker, sink: K) -> Self {
        Self {
            sensor,
            tracker,
            sink,
        }
    }

    /// Read one sample and dispatch the resulting event, if any
    ///
    /// Call this at a fixed cadence, roughly 60 times per second. When the
    /// sensor read fails the tick is skipped: no event is emitted and the
    /// tracker state is left as it was.
    pub fn poll(&mut self) -> Result<Option<TouchEvent>, S::Error> {
        let sample = match self.sensor.sample() {
            Ok(sample) => sample,
            Err(e) => {
                log::warn!("touch sensor read failed, skipping tick: {:?}", e);
                return Err(e);
            }
        };

        let event = self.tracker.update(sample);
        if let Some(event) = event {
            self.sink.on_event(event);
        }

        Ok(event)
    }

    pub fn tracker(&self) -> &TouchTracker {
        &self.tracker
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Give back the sensor, tracker and sink
    pub fn release(self) -> (S, TouchTracker, K) {
        (self.sensor, self.tracker, self.sink)
    }
}
