// Command controller for the BOXZ base and hands
//
// Owns the sink, the clock and the configuration. Every command runs to
// completion on the calling thread before the next one is accepted.

use tracing::{debug, info};

use crate::config::ControllerConfig;
use crate::hal::{ActuatorSink, Clock, ServoChannel};
use crate::messages::{Command, DriveCommand, IgnoreReason, Outcome, ServoCommand};
use crate::motion::drive::{self, DriveKeyword};
use crate::motion::servo::{self, Gesture, ServoTargets};
use crate::protocol::{CommandWord, decode_motor, decode_servo, parse_hex};

/// Both hands up: left target 0 and right target 255, clamped to the range
pub const SERVO_BOTH_UP: u32 = 0x3FF00;
/// Both hands down
pub const SERVO_BOTH_DOWN: u32 = 0x300FF;

pub struct Controller<S, C> {
    sink: S,
    clock: C,
    config: ControllerConfig,
}

impl<S: ActuatorSink, C: Clock> Controller<S, C> {
    pub fn new(sink: S, clock: C, config: ControllerConfig) -> Self {
        info!(
            "Controller ready: servo range {}..={}, {} frames, {}ms/frame",
            config.servo_pos_min,
            config.servo_pos_max,
            config.frame_count,
            config.frame_delay_ms
        );
        Self {
            sink,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Execute one command
    pub fn execute(&mut self, command: &Command) -> Outcome {
        let outcome = match command {
            Command::Drive(cmd) => self.drive(cmd),
            Command::Servo(cmd) => self.servo(cmd),
        };
        if let Outcome::Ignored(reason) = outcome {
            debug!("Command {:?} ignored: {:?}", command, reason);
        }
        outcome
    }

    pub fn drive(&mut self, command: &DriveCommand) -> Outcome {
        match command {
            DriveCommand::Keyword { keyword, speeds } => {
                self.drive_keyword(*keyword, *speeds);
                Outcome::Applied
            }
            DriveCommand::Key { key, speeds } => match DriveKeyword::from_key(*key) {
                Some(keyword) => {
                    self.drive_keyword(keyword, *speeds);
                    Outcome::Applied
                }
                None => Outcome::Ignored(IgnoreReason::UnknownKey { key: *key }),
            },
            DriveCommand::Vector { speed_a, speed_b } => {
                self.drive_vector(*speed_a, *speed_b);
                Outcome::Applied
            }
            DriveCommand::Raw { word } => {
                self.motor_raw(*word);
                Outcome::Applied
            }
            DriveCommand::RawHex { hex } => self.motor_raw_hex(hex),
        }
    }

    pub fn servo(&mut self, command: &ServoCommand) -> Outcome {
        match command {
            ServoCommand::Raw { word } => self.servo_raw(*word),
            ServoCommand::RawHex { hex } => self.servo_raw_hex(hex),
            ServoCommand::Targets(targets) => self.servo_targets(*targets),
            ServoCommand::Sweep { channel, gesture } => {
                servo::sweep(
                    &mut self.sink,
                    &mut self.clock,
                    *channel,
                    *gesture,
                    &self.config,
                );
                Outcome::Applied
            }
            ServoCommand::Consecutive { channel, gesture } => {
                servo::sweep_from_current(
                    &mut self.sink,
                    &mut self.clock,
                    *channel,
                    *gesture,
                    &self.config,
                );
                Outcome::Applied
            }
            ServoCommand::Step { channel, gesture } => {
                self.servo_step(&[*channel], *gesture);
                Outcome::Applied
            }
            ServoCommand::Key { key } => self.servo_key(*key),
        }
    }

    pub fn drive_keyword(&mut self, keyword: DriveKeyword, speeds: Option<(i32, i32)>) {
        let action = drive::plan_keyword(keyword, speeds, &self.config);
        drive::apply(&mut self.sink, action);
    }

    /// Signed speed vector; may issue several actions, see `plan_vector`
    pub fn drive_vector(&mut self, speed_a: i32, speed_b: i32) {
        for action in drive::plan_vector(speed_a, speed_b, self.config.stop_threshold) {
            drive::apply(&mut self.sink, action);
        }
    }

    /// Motor RAW word entry point
    pub fn motor_raw(&mut self, word: CommandWord) {
        drive::apply_raw(&mut self.sink, decode_motor(word));
    }

    /// Motor RAW hex entry point; wrong-length strings leave the motors alone
    pub fn motor_raw_hex(&mut self, hex: &str) -> Outcome {
        match parse_hex(hex) {
            Some(word) => {
                self.motor_raw(word);
                Outcome::Applied
            }
            None => Outcome::Ignored(IgnoreReason::HexLength { len: hex.len() }),
        }
    }

    /// Servo RAW word entry point; a word with no active hand is a no-op
    pub fn servo_raw(&mut self, word: CommandWord) -> Outcome {
        match decode_servo(word) {
            Some(decoded) => self.servo_targets(ServoTargets {
                left: decoded.left.map(i32::from),
                right: decoded.right.map(i32::from),
            }),
            None => Outcome::Ignored(IgnoreReason::NoActiveChannel),
        }
    }

    /// Servo RAW hex entry point
    pub fn servo_raw_hex(&mut self, hex: &str) -> Outcome {
        match parse_hex(hex) {
            Some(word) => self.servo_raw(word),
            None => Outcome::Ignored(IgnoreReason::HexLength { len: hex.len() }),
        }
    }

    /// Lockstep move of the listed hands
    pub fn servo_targets(&mut self, targets: ServoTargets) -> Outcome {
        if targets.is_empty() {
            return Outcome::Ignored(IgnoreReason::NoActiveChannel);
        }
        servo::move_to(&mut self.sink, &mut self.clock, targets, &self.config);
        Outcome::Applied
    }

    fn servo_step(&mut self, channels: &[ServoChannel], gesture: Gesture) {
        for &channel in channels {
            servo::step(
                &mut self.sink,
                &mut self.clock,
                channel,
                gesture,
                &self.config,
            );
        }
    }

    /// Keyboard bindings of the hands
    ///
    /// `u i j k` sweep one hand, `o l` move both hands together, and the
    /// uppercase letters are the single-step versions.
    pub fn servo_key(&mut self, key: char) -> Outcome {
        use ServoChannel::{Left, Right};

        let sweep = |channel, gesture| ServoCommand::Sweep { channel, gesture };
        let step = |channel, gesture| ServoCommand::Step { channel, gesture };

        match key {
            'u' => self.servo(&sweep(Left, Gesture::Up)),
            'i' => self.servo(&sweep(Right, Gesture::Up)),
            'j' => self.servo(&sweep(Left, Gesture::Down)),
            'k' => self.servo(&sweep(Right, Gesture::Down)),
            'o' => self.servo_raw(CommandWord::new(SERVO_BOTH_UP)),
            'l' => self.servo_raw(CommandWord::new(SERVO_BOTH_DOWN)),
            'U' => self.servo(&step(Left, Gesture::Up)),
            'I' => self.servo(&step(Right, Gesture::Up)),
            'J' => self.servo(&step(Left, Gesture::Down)),
            'K' => self.servo(&step(Right, Gesture::Down)),
            'O' => {
                self.servo_step(&[Left, Right], Gesture::Up);
                Outcome::Applied
            }
            'L' => {
                self.servo_step(&[Left, Right], Gesture::Down);
                Outcome::Applied
            }
            _ => Outcome::Ignored(IgnoreReason::UnknownKey { key }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{BoardEvent, SimulatedBoard, VirtualClock};

    fn controller() -> Controller<SimulatedBoard, VirtualClock> {
        let config = ControllerConfig::default();
        let board = SimulatedBoard::with_journal(config.servo_home);
        Controller::new(board, VirtualClock::default(), config)
    }

    #[test]
    fn test_motor_hex_full_forward() {
        let mut ctl = controller();
        assert_eq!(ctl.motor_raw_hex("3FFFF"), Outcome::Applied);
        let state = ctl.sink().state();
        assert!(state.line_a && state.line_b);
        assert_eq!((state.duty_a, state.duty_b), (0xFF, 0xFF));
    }

    #[test]
    fn test_motor_hex_wrong_length_keeps_state() {
        let mut ctl = controller();
        ctl.motor_raw_hex("3FFFF");
        let before = ctl.sink().state();
        ctl.sink_mut().take_journal();

        assert_eq!(
            ctl.motor_raw_hex("123456"),
            Outcome::Ignored(IgnoreReason::HexLength { len: 6 })
        );
        assert_eq!(
            ctl.motor_raw_hex(""),
            Outcome::Ignored(IgnoreReason::HexLength { len: 0 })
        );
        assert_eq!(ctl.sink().state(), before);
        assert!(ctl.sink_mut().take_journal().is_empty());
    }

    #[test]
    fn test_servo_hex_both_hands_to_max() {
        let mut ctl = controller();
        assert_eq!(ctl.servo_raw_hex("3A0A0"), Outcome::Applied);

        let frames = ctl.config().frame_count.get() as usize + 1;
        let left = ctl.sink().pulses(ServoChannel::Left);
        let right = ctl.sink().pulses(ServoChannel::Right);
        assert_eq!(left.len(), frames);
        assert_eq!(right.len(), frames);
        assert_eq!(left.first(), Some(&800));
        assert_eq!(left.last(), Some(&2200));
        assert_eq!(left, right);
        assert_eq!(ctl.clock().sleeps, frames);
    }

    #[test]
    fn test_servo_word_out_of_range_clamps() {
        let mut ctl = controller();
        ctl.servo_raw(CommandWord::new(0x3FFFF));
        let state = ctl.sink().state();
        assert_eq!(state.angle_left, 160);
        assert_eq!(state.angle_right, 160);
    }

    #[test]
    fn test_servo_word_without_active_bits_is_noop() {
        let mut ctl = controller();
        assert_eq!(
            ctl.servo_raw(CommandWord::new(0x0A0A0)),
            Outcome::Ignored(IgnoreReason::NoActiveChannel)
        );
        assert!(ctl.sink_mut().take_journal().is_empty());
        assert_eq!(ctl.clock().sleeps, 0);
    }

    #[test]
    fn test_servo_single_hand_active() {
        let mut ctl = controller();
        ctl.servo_raw(CommandWord::new(0x2_64_50));
        assert!(ctl.sink().pulses(ServoChannel::Left).is_empty());
        assert_eq!(ctl.sink().state().angle_right, 100);
    }

    #[test]
    fn test_vector_low_speed_ends_stopped() {
        let mut ctl = controller();
        ctl.execute(&Command::Drive(DriveCommand::Vector {
            speed_a: 100,
            speed_b: 100,
        }));
        let journal = ctl.sink_mut().take_journal();
        assert_eq!(
            &journal[journal.len() - 2..],
            &[
                BoardEvent::Duty {
                    wheel: crate::hal::Wheel::A,
                    duty: 0
                },
                BoardEvent::Duty {
                    wheel: crate::hal::Wheel::B,
                    duty: 0
                },
            ]
        );
    }

    #[test]
    fn test_unknown_drive_key_ignored() {
        let mut ctl = controller();
        let outcome = ctl.execute(&Command::Drive(DriveCommand::Key {
            key: 'p',
            speeds: None,
        }));
        assert_eq!(outcome, Outcome::Ignored(IgnoreReason::UnknownKey { key: 'p' }));
        assert!(ctl.sink_mut().take_journal().is_empty());
    }

    #[test]
    fn test_drive_key_applies_keyword() {
        let mut ctl = controller();
        let outcome = ctl.execute(&Command::Drive(DriveCommand::Key {
            key: 'w',
            speeds: Some((90, 80)),
        }));
        assert!(outcome.is_applied());
        let state = ctl.sink().state();
        assert_eq!((state.duty_a, state.duty_b), (90, 80));
    }

    #[test]
    fn test_servo_keys() {
        let mut ctl = controller();
        // both hands up: left to min, right to max
        assert!(ctl.servo_key('o').is_applied());
        let state = ctl.sink().state();
        assert_eq!((state.angle_left, state.angle_right), (20, 160));

        assert!(ctl.servo_key('L').is_applied());
        let state = ctl.sink().state();
        assert_eq!((state.angle_left, state.angle_right), (30, 150));

        assert!(ctl.servo_key('j').is_applied());
        assert_eq!(ctl.sink().state().angle_left, 160);

        assert_eq!(
            ctl.servo_key('z'),
            Outcome::Ignored(IgnoreReason::UnknownKey { key: 'z' })
        );
    }

    #[test]
    fn test_consecutive_from_current() {
        let mut ctl = controller();
        ctl.servo_targets(ServoTargets {
            left: None,
            right: Some(100),
        });
        ctl.sink_mut().take_journal();

        ctl.execute(&Command::Servo(ServoCommand::Consecutive {
            channel: ServoChannel::Right,
            gesture: Gesture::Up,
        }));
        let pulses = ctl.sink().pulses(ServoChannel::Right);
        assert_eq!(pulses.len(), 61);
        assert_eq!(pulses.first(), Some(&1600));
        assert_eq!(pulses.last(), Some(&2200));
    }

    #[test]
    fn test_empty_targets_ignored() {
        let mut ctl = controller();
        assert_eq!(
            ctl.servo_targets(ServoTargets::default()),
            Outcome::Ignored(IgnoreReason::NoActiveChannel)
        );
    }
}
