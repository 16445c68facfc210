// Servo motion for the two BOXZ hands
//
// Moves are planned as frames of pulse widths, then played through the sink
// with one clock delay per frame. Both hands share the frame index, so a
// two-hand move starts and finishes together.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ControllerConfig, PULSE_BASE_US, PULSE_PER_DEGREE};
use crate::hal::{ActuatorSink, Clock, ServoChannel, angle_to_pulse};

/// Arm gesture. The hands are mirrored: the left hand raises toward the
/// minimum angle, the right hand toward the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    Up,
    Down,
}

impl Gesture {
    /// +1 when the gesture increases the channel angle, -1 otherwise
    pub fn sign(self, channel: ServoChannel) -> i32 {
        match (channel, self) {
            (ServoChannel::Left, Gesture::Up) | (ServoChannel::Right, Gesture::Down) => -1,
            (ServoChannel::Left, Gesture::Down) | (ServoChannel::Right, Gesture::Up) => 1,
        }
    }
}

/// Target angles in degrees; `None` leaves the channel alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServoTargets {
    pub left: Option<i32>,
    pub right: Option<i32>,
}

impl ServoTargets {
    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Pulse widths written in one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    pub left: Option<u32>,
    pub right: Option<u32>,
}

/// Planned interpolation for up to two channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trajectory {
    /// Clamped targets actually used
    pub targets: ServoTargets,
    /// Per-frame pulse increment per channel (us)
    pub delta_left: i32,
    pub delta_right: i32,
    pub frames: Vec<Frame>,
}

impl Trajectory {
    /// Pulse sequence of one channel (empty when inactive)
    pub fn pulses(&self, channel: ServoChannel) -> Vec<u32> {
        self.frames
            .iter()
            .filter_map(|frame| match channel {
                ServoChannel::Left => frame.left,
                ServoChannel::Right => frame.right,
            })
            .collect()
    }
}

/// Per-frame pulse increment from `current` to `target`
///
/// Integer division truncates toward zero, so the last frame can stop short
/// of the target by up to one frame's rounding error. Frame counts beyond
/// `i32::MAX` saturate instead of wrapping negative.
pub fn frame_delta(current: i32, target: i32, frames: u32) -> i32 {
    let frames = i32::try_from(frames).unwrap_or(i32::MAX);
    (PULSE_PER_DEGREE * (target - current)) / frames
}

/// Plan a lockstep linear move
///
/// `current` holds the read-back angles as `[left, right]`. Targets are
/// clamped into the configured range. The trajectory has `frame_count + 1`
/// frames; frame `i` sits at `600 + 10 * current + i * delta`.
pub fn plan_interpolation(
    current: [i32; 2],
    targets: ServoTargets,
    config: &ControllerConfig,
) -> Trajectory {
    let frames = config.frame_count.get();
    let targets = ServoTargets {
        left: targets.left.map(|t| config.clamp_position(t)),
        right: targets.right.map(|t| config.clamp_position(t)),
    };
    let [cur_left, cur_right] = current;
    let delta_left = targets.left.map_or(0, |t| frame_delta(cur_left, t, frames));
    let delta_right = targets.right.map_or(0, |t| frame_delta(cur_right, t, frames));

    let pulse = |cur: i32, i: u32, delta: i32| -> u32 {
        let us = i64::from(PULSE_BASE_US + PULSE_PER_DEGREE * cur)
            + i64::from(i) * i64::from(delta);
        u32::try_from(us.max(0)).unwrap_or(u32::MAX)
    };

    let frames = (0..=frames)
        .map(|i| Frame {
            left: targets.left.map(|_| pulse(cur_left, i, delta_left)),
            right: targets.right.map(|_| pulse(cur_right, i, delta_right)),
        })
        .collect();

    Trajectory {
        targets,
        delta_left,
        delta_right,
        frames,
    }
}

/// Angles visited by a one-degree-per-frame sweep
///
/// Without `from`, the sweep starts at the far bound (full gesture); with it,
/// the sweep starts at that angle and stops at the bound (consecutive mode).
pub fn plan_sweep(
    channel: ServoChannel,
    gesture: Gesture,
    from: Option<i32>,
    config: &ControllerConfig,
) -> Vec<i32> {
    let (min, max) = (config.servo_pos_min, config.servo_pos_max);
    if gesture.sign(channel) > 0 {
        let start = from.unwrap_or(min);
        (start..=max).collect()
    } else {
        let start = from.unwrap_or(max);
        (min..=start).rev().collect()
    }
}

/// Angle reached by one nudge from `current`
pub fn step_target(
    channel: ServoChannel,
    gesture: Gesture,
    current: i32,
    config: &ControllerConfig,
) -> i32 {
    config.clamp_position(current + gesture.sign(channel) * config.step_degrees)
}

/// Read both channels back from the actuator
pub fn read_positions<S: ActuatorSink>(sink: &mut S) -> [i32; 2] {
    [
        sink.read_angle(ServoChannel::Left),
        sink.read_angle(ServoChannel::Right),
    ]
}

/// Read back, plan, and play a lockstep move. Runs to the last frame.
pub fn move_to<S: ActuatorSink, C: Clock>(
    sink: &mut S,
    clock: &mut C,
    targets: ServoTargets,
    config: &ControllerConfig,
) -> Trajectory {
    let current = read_positions(sink);
    let trajectory = plan_interpolation(current, targets, config);
    debug!(
        "Servo move from {:?} to {:?} over {} frames (delta {}/{})",
        current,
        trajectory.targets,
        trajectory.frames.len(),
        trajectory.delta_left,
        trajectory.delta_right
    );

    let delay = config.frame_delay();
    for frame in &trajectory.frames {
        if let Some(micros) = frame.left {
            sink.set_pulse_width_us(ServoChannel::Left, micros);
        }
        if let Some(micros) = frame.right {
            sink.set_pulse_width_us(ServoChannel::Right, micros);
        }
        clock.sleep(delay);
    }

    trajectory
}

/// Full gesture: bound to bound, one degree per frame
pub fn sweep<S: ActuatorSink, C: Clock>(
    sink: &mut S,
    clock: &mut C,
    channel: ServoChannel,
    gesture: Gesture,
    config: &ControllerConfig,
) -> usize {
    let angles = plan_sweep(channel, gesture, None, config);
    play_angles(sink, clock, channel, &angles, config)
}

/// Gesture from the read-back angle to the bound, one degree per frame
pub fn sweep_from_current<S: ActuatorSink, C: Clock>(
    sink: &mut S,
    clock: &mut C,
    channel: ServoChannel,
    gesture: Gesture,
    config: &ControllerConfig,
) -> usize {
    let current = sink.read_angle(channel);
    let angles = plan_sweep(channel, gesture, Some(current), config);
    play_angles(sink, clock, channel, &angles, config)
}

/// Single nudge from the read-back angle; returns the angle written
pub fn step<S: ActuatorSink, C: Clock>(
    sink: &mut S,
    clock: &mut C,
    channel: ServoChannel,
    gesture: Gesture,
    config: &ControllerConfig,
) -> i32 {
    let current = sink.read_angle(channel);
    let target = step_target(channel, gesture, current, config);
    debug!("Servo {:?} step {} -> {}", channel, current, target);
    sink.set_pulse_width_us(channel, angle_to_pulse(target));
    clock.sleep(config.frame_delay());
    target
}

fn play_angles<S: ActuatorSink, C: Clock>(
    sink: &mut S,
    clock: &mut C,
    channel: ServoChannel,
    angles: &[i32],
    config: &ControllerConfig,
) -> usize {
    debug!(
        "Servo {:?} sweep {:?} -> {:?} ({} frames)",
        channel,
        angles.first(),
        angles.last(),
        angles.len()
    );
    let delay = config.frame_delay();
    for &angle in angles {
        sink.set_pulse_width_us(channel, angle_to_pulse(angle));
        clock.sleep(delay);
    }
    angles.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_FRAME_COUNT;
    use crate::hal::{SimulatedBoard, VirtualClock};
    use std::num::NonZeroU32;
    use std::time::Duration;

    fn both(left: i32, right: i32) -> ServoTargets {
        ServoTargets {
            left: Some(left),
            right: Some(right),
        }
    }

    #[test]
    fn test_frame_delta_truncates_toward_zero() {
        // 10 * 7 / 20 = 3.5
        assert_eq!(frame_delta(20, 27, 20), 3);
        assert_eq!(frame_delta(27, 20, 20), -3);
        assert_eq!(frame_delta(90, 90, 20), 0);
    }

    #[test]
    fn test_frame_delta_huge_frame_count() {
        assert_eq!(frame_delta(20, 160, u32::MAX), 0);
        assert_eq!(frame_delta(160, 20, u32::MAX), 0);
        assert_eq!(frame_delta(20, 160, MAX_FRAME_COUNT), 1);
    }

    #[test]
    fn test_interpolation_has_f_plus_one_frames() {
        let config = ControllerConfig::default();
        let t = plan_interpolation([20, 20], both(160, 90), &config);
        assert_eq!(t.frames.len(), 21);
        assert_eq!(t.pulses(ServoChannel::Left).len(), 21);
        assert_eq!(t.pulses(ServoChannel::Right).len(), 21);
    }

    #[test]
    fn test_interpolation_is_monotonic_upward() {
        let config = ControllerConfig::default();
        let t = plan_interpolation([20, 33], both(157, 101), &config);
        for channel in ServoChannel::ALL {
            let pulses = t.pulses(channel);
            assert!(pulses.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_interpolation_endpoints() {
        let config = ControllerConfig::default();
        let t = plan_interpolation([20, 100], both(160, 27), &config);
        let left = t.pulses(ServoChannel::Left);
        assert_eq!(left[0], 800);
        assert_eq!(*left.last().unwrap(), 2200);

        // (27 - 100) * 10 / 20 = -36.5 -> -36, so the last frame stops at 880us, not 870us
        let right = t.pulses(ServoChannel::Right);
        assert_eq!(t.delta_right, -36);
        assert_eq!(right[0], 1600);
        assert_eq!(*right.last().unwrap(), 1600 - 36 * 20);
    }

    #[test]
    fn test_targets_clamped() {
        let config = ControllerConfig::default();
        for target in [-1000, 0, 19, 20, 90, 160, 161, 255, 100_000] {
            let t = plan_interpolation([90, 90], both(target, target), &config);
            let effective = t.targets.left.unwrap();
            assert!(effective >= config.servo_pos_min && effective <= config.servo_pos_max);
        }
    }

    #[test]
    fn test_inactive_channel_untouched() {
        let config = ControllerConfig::default();
        let t = plan_interpolation(
            [20, 20],
            ServoTargets {
                left: None,
                right: Some(100),
            },
            &config,
        );
        assert!(t.pulses(ServoChannel::Left).is_empty());
        assert_eq!(t.delta_left, 0);
    }

    #[test]
    fn test_move_to_writes_and_sleeps_per_frame() {
        let config = ControllerConfig {
            frame_count: NonZeroU32::new(4).unwrap(),
            frame_delay_ms: 5,
            ..ControllerConfig::default()
        };
        let mut board = SimulatedBoard::with_journal(20);
        let mut clock = VirtualClock::default();

        move_to(&mut board, &mut clock, both(60, 100), &config);

        assert_eq!(board.pulses(ServoChannel::Left), vec![800, 900, 1000, 1100, 1200]);
        assert_eq!(board.pulses(ServoChannel::Right), vec![800, 1000, 1200, 1400, 1600]);
        assert_eq!(clock.sleeps, 5);
        assert_eq!(clock.elapsed, Duration::from_millis(25));
        let journal = board.take_journal();
        assert_eq!(journal.len(), 10);
    }

    #[test]
    fn test_move_reads_back_position() {
        let config = ControllerConfig::default();
        let mut board = SimulatedBoard::with_journal(20);
        let mut clock = VirtualClock::default();

        board.set_pulse_width_us(ServoChannel::Left, angle_to_pulse(100));
        board.take_journal();

        let t = move_to(
            &mut board,
            &mut clock,
            ServoTargets {
                left: Some(120),
                right: None,
            },
            &config,
        );
        assert_eq!(t.pulses(ServoChannel::Left)[0], 1600);
        assert_eq!(board.state().angle_left, 120);
        assert_eq!(board.state().angle_right, 20);
    }

    #[test]
    fn test_full_sweep_bounds() {
        let config = ControllerConfig::default();
        let up_left = plan_sweep(ServoChannel::Left, Gesture::Up, None, &config);
        assert_eq!(up_left.first(), Some(&160));
        assert_eq!(up_left.last(), Some(&20));
        assert_eq!(up_left.len(), 141);

        let up_right = plan_sweep(ServoChannel::Right, Gesture::Up, None, &config);
        assert_eq!(up_right.first(), Some(&20));
        assert_eq!(up_right.last(), Some(&160));
    }

    #[test]
    fn test_sweep_plays_every_degree() {
        let config = ControllerConfig::default();
        let mut board = SimulatedBoard::with_journal(20);
        let mut clock = VirtualClock::default();

        let frames = sweep(&mut board, &mut clock, ServoChannel::Right, Gesture::Down, &config);
        assert_eq!(frames, 141);
        assert_eq!(clock.sleeps, 141);
        let pulses = board.pulses(ServoChannel::Right);
        assert_eq!(pulses.first(), Some(&2200));
        assert_eq!(pulses.last(), Some(&800));
        assert!(board.pulses(ServoChannel::Left).is_empty());
    }

    #[test]
    fn test_consecutive_sweep_starts_at_current() {
        let config = ControllerConfig::default();
        let mut board = SimulatedBoard::with_journal(20);
        let mut clock = VirtualClock::default();
        board.set_pulse_width_us(ServoChannel::Left, angle_to_pulse(150));
        board.take_journal();

        let frames =
            sweep_from_current(&mut board, &mut clock, ServoChannel::Left, Gesture::Down, &config);
        assert_eq!(frames, 11);
        assert_eq!(board.pulses(ServoChannel::Left).first(), Some(&2100));
        assert_eq!(board.state().angle_left, 160);

        // already at the bound: a single frame
        let frames =
            sweep_from_current(&mut board, &mut clock, ServoChannel::Left, Gesture::Down, &config);
        assert_eq!(frames, 1);
    }

    #[test]
    fn test_step_mirrored_and_clamped() {
        let config = ControllerConfig::default();
        assert_eq!(step_target(ServoChannel::Left, Gesture::Up, 90, &config), 80);
        assert_eq!(step_target(ServoChannel::Right, Gesture::Up, 90, &config), 100);
        assert_eq!(step_target(ServoChannel::Left, Gesture::Up, 25, &config), 20);
        assert_eq!(step_target(ServoChannel::Right, Gesture::Up, 155, &config), 160);
    }

    #[test]
    fn test_step_writes_once() {
        let config = ControllerConfig::default();
        let mut board = SimulatedBoard::with_journal(20);
        let mut clock = VirtualClock::default();

        let angle = step(&mut board, &mut clock, ServoChannel::Left, Gesture::Down, &config);
        assert_eq!(angle, 30);
        assert_eq!(board.pulses(ServoChannel::Left), vec![900]);
        assert_eq!(clock.sleeps, 1);
    }
}
