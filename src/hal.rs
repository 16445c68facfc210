// Hardware seams for the controller
//
// The controller only talks to an ActuatorSink (direction lines, PWM duty,
// servo pulse width, servo read-back) and a Clock (per-frame delay).
// SimulatedBoard and VirtualClock stand in for the real board in the runtime
// and in tests.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{PULSE_BASE_US, PULSE_PER_DEGREE};

/// Motor direction line (4-line driver mode: one line per wheel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Line {
    A,
    B,
}

/// Motor PWM channel. A is the right wheel, B the left wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wheel {
    A,
    B,
}

/// Servo channels: 01 is the left hand, 02 the right hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServoChannel {
    Left,
    Right,
}

impl ServoChannel {
    pub const ALL: [ServoChannel; 2] = [ServoChannel::Left, ServoChannel::Right];

    fn index(self) -> usize {
        match self {
            ServoChannel::Left => 0,
            ServoChannel::Right => 1,
        }
    }
}

/// Output primitives of the motor driver and servo PWM
pub trait ActuatorSink {
    fn set_direction_line(&mut self, line: Line, high: bool);

    fn set_duty_cycle(&mut self, wheel: Wheel, duty: u8);

    fn set_pulse_width_us(&mut self, channel: ServoChannel, micros: u32);

    /// Current servo angle in degrees, as reported by the actuator
    fn read_angle(&mut self, channel: ServoChannel) -> i32;
}

/// Source of the per-frame delay
pub trait Clock {
    fn sleep(&mut self, duration: Duration);
}

/// Wall-clock delay on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadClock;

impl Clock for ThreadClock {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual time: records requested delays without waiting
#[derive(Debug, Default, Clone)]
pub struct VirtualClock {
    pub elapsed: Duration,
    pub sleeps: usize,
}

impl Clock for VirtualClock {
    fn sleep(&mut self, duration: Duration) {
        self.elapsed += duration;
        self.sleeps += 1;
    }
}

/// One write issued to the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardEvent {
    Line { line: Line, high: bool },
    Duty { wheel: Wheel, duty: u8 },
    Pulse { channel: ServoChannel, micros: u32 },
}

/// Snapshot of every output of the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoardState {
    pub line_a: bool,
    pub line_b: bool,
    pub duty_a: u8,
    pub duty_b: u8,
    pub pulse_left: u32,
    pub pulse_right: u32,
    pub angle_left: i32,
    pub angle_right: i32,
}

/// In-memory board used when no hardware driver is attached
#[derive(Debug, Clone)]
pub struct SimulatedBoard {
    lines: [bool; 2],
    duties: [u8; 2],
    pulses: [u32; 2],
    journal: Option<Vec<BoardEvent>>,
}

impl SimulatedBoard {
    /// Board with motors stopped and both hands parked at `home` degrees
    pub fn new(home: i32) -> Self {
        let pulse = angle_to_pulse(home);
        Self {
            lines: [false; 2],
            duties: [0; 2],
            pulses: [pulse; 2],
            journal: None,
        }
    }

    /// Same as `new`, but every write is also appended to a journal
    pub fn with_journal(home: i32) -> Self {
        Self {
            journal: Some(Vec::new()),
            ..Self::new(home)
        }
    }

    pub fn state(&self) -> BoardState {
        BoardState {
            line_a: self.lines[0],
            line_b: self.lines[1],
            duty_a: self.duties[0],
            duty_b: self.duties[1],
            pulse_left: self.pulses[0],
            pulse_right: self.pulses[1],
            angle_left: pulse_to_angle(self.pulses[0]),
            angle_right: pulse_to_angle(self.pulses[1]),
        }
    }

    /// Drain the journal (empty when journaling is off)
    pub fn take_journal(&mut self) -> Vec<BoardEvent> {
        self.journal.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Pulses written to one servo channel, in order
    pub fn pulses(&self, channel: ServoChannel) -> Vec<u32> {
        self.journal
            .iter()
            .flatten()
            .filter_map(|event| match *event {
                BoardEvent::Pulse { channel: c, micros } if c == channel => Some(micros),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, event: BoardEvent) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(event);
        }
    }
}

impl ActuatorSink for SimulatedBoard {
    fn set_direction_line(&mut self, line: Line, high: bool) {
        debug!("Line {:?} -> {}", line, if high { "HIGH" } else { "LOW" });
        let idx = match line {
            Line::A => 0,
            Line::B => 1,
        };
        self.lines[idx] = high;
        self.record(BoardEvent::Line { line, high });
    }

    fn set_duty_cycle(&mut self, wheel: Wheel, duty: u8) {
        debug!("Duty {:?} -> {}", wheel, duty);
        let idx = match wheel {
            Wheel::A => 0,
            Wheel::B => 1,
        };
        self.duties[idx] = duty;
        self.record(BoardEvent::Duty { wheel, duty });
    }

    fn set_pulse_width_us(&mut self, channel: ServoChannel, micros: u32) {
        debug!("Servo {:?} pulse -> {}us", channel, micros);
        self.pulses[channel.index()] = micros;
        self.record(BoardEvent::Pulse { channel, micros });
    }

    fn read_angle(&mut self, channel: ServoChannel) -> i32 {
        pulse_to_angle(self.pulses[channel.index()])
    }
}

/// Servo calibration: 600us at 0 degrees, 10us per degree
pub fn angle_to_pulse(degrees: i32) -> u32 {
    (PULSE_BASE_US + PULSE_PER_DEGREE * degrees).max(0) as u32
}

/// Inverse of `angle_to_pulse`, truncating partial degrees
pub fn pulse_to_angle(micros: u32) -> i32 {
    (micros as i32 - PULSE_BASE_US) / PULSE_PER_DEGREE
}
