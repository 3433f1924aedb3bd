//! Interactive collection of calibration points
//!
//! The application draws a crosshair at [CalibrationSession::target], feeds
//! every [TouchEvent] into the session and moves on whenever a sample was
//! taken. A sample is latched on finger down/move and committed on lift.

use crate::{
    calibration::{Calibration, CalibrationError, Coefficients, CALIBRATION_POINTS},
    tracker::{EventKind, TouchEvent},
};

// Distance of the corner targets from the screen edges
const TARGET_MARGIN: i32 = 20;

/// Progress reported by [CalibrationSession::handle_event]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// The event did not change anything
    Idle,
    /// A position was latched for the current target
    Captured,
    /// The sample for target `index` was stored; the next target is up
    Sampled { index: usize },
    /// All targets were sampled and the fit was installed
    Complete(Coefficients),
}

/// Walks the user through the five calibration targets
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    targets: [(i32, i32); CALIBRATION_POINTS],
    current: usize,
    latched: Option<(u16, u16)>,
}

impl CalibrationSession {
    pub fn new(targets: [(i32, i32); CALIBRATION_POINTS]) -> Self {
        Self {
            targets,
            current: 0,
            latched: None,
        }
    }

    /// The four corners, inset by 20 pixels, followed by the centre
    pub fn for_screen(width: u16, height: u16) -> Self {
        let (w, h) = (width as i32, height as i32);

        Self::new([
            (TARGET_MARGIN, TARGET_MARGIN),
            (w - TARGET_MARGIN, TARGET_MARGIN),
            (w - TARGET_MARGIN, h - TARGET_MARGIN),
            (TARGET_MARGIN, h - TARGET_MARGIN),
            (w / 2, h / 2),
        ])
    }

    /// Screen position of the crosshair to show, or `None` once done
    pub fn target(&self) -> Option<(i32, i32)> {
        self.targets.get(self.current).copied()
    }

    /// Index of the current target
    pub fn index(&self) -> usize {
        self.current
    }

    pub fn is_complete(&self) -> bool {
        self.current >= CALIBRATION_POINTS
    }

    /// Start over from the first target
    pub fn restart(&mut self) {
        self.current = 0;
        self.latched = None;
    }

    /// Feed one touch event
    ///
    /// When the last sample is stored the fit is performed right away. If it
    /// fails the session restarts from the first target and the error is
    /// returned; the previous coefficients stay installed.
    pub fn handle_event(
        &mut self,
        event: TouchEvent,
        calibration: &mut Calibration,
    ) -> Result<SessionStatus, CalibrationError> {
        let (screen_x, screen_y) = match self.target() {
            Some(target) => target,
            None => return Ok(SessionStatus::Idle),
        };

        match event.kind {
            EventKind::FingerDown | EventKind::FingerMove => {
                self.latched = Some((event.x, event.y));
                Ok(SessionStatus::Captured)
            }
            EventKind::FingerUp => {
                let (raw_x, raw_y) = match self.latched.take() {
                    Some(position) => position,
                    None => return Ok(SessionStatus::Idle),
                };

                let index = self.current;
                calibration.add_point(index, screen_x, screen_y, raw_x as i32, raw_y as i32)?;
                log::info!(
                    "calibration point {} at {:3}, {:3} sampled as {} / {}",
                    index,
                    screen_x,
                    screen_y,
                    raw_x,
                    raw_y
                );

                self.current += 1;
                if !self.is_complete() {
                    return Ok(SessionStatus::Sampled { index });
                }

                match calibration.perform() {
                    Ok(coefficients) => Ok(SessionStatus::Complete(coefficients)),
                    Err(e) => {
                        self.restart();
                        Err(e)
                    }
                }
            }
        }
    }
}
