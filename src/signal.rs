use crate::config::TrafficSide;
use crate::network::TurnOptions;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The state of a single signal arrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LightState {
    Red,
    /// Caution interval shown while switching red to green.
    RedToGreen,
    Green,
    /// Caution interval shown while switching green to red.
    GreenToRed,
}

impl LightState {
    /// Whether the light currently grants right of way.
    pub fn is_green(self) -> bool {
        self == LightState::Green
    }

    pub fn is_red(self) -> bool {
        self == LightState::Red
    }

    /// Flips the light between its green and red steady states.
    /// Caution states resolve to the state they were heading away from.
    pub fn invert(self) -> Self {
        match self {
            LightState::Green => LightState::Red,
            _ => LightState::Green,
        }
    }

    /// Collapses a caution state onto the steady state it is heading to.
    pub fn settle(self) -> Self {
        match self {
            LightState::RedToGreen => LightState::Green,
            LightState::GreenToRed => LightState::Red,
            other => other,
        }
    }
}

/// How the left and right arrows of a [SignalState] relate to the main light.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ArrowMode {
    /// Left and right always mirror the main light.
    #[default]
    Simple,
    /// The left arrow is independent; the right arrow mirrors main.
    SingleLeft,
    /// The right arrow is independent; the left arrow mirrors main.
    SingleRight,
    /// All three arrows are independent.
    All,
}

/// A directional movement leaving an approach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ArrowDirection {
    Left,
    Forward,
    Right,
    /// A U-turn. Resolves to the near-side arrow for the configured
    /// traffic side; it has no dedicated signal of its own.
    Turn,
}

/// The three-arrow light state governing one approach for one vehicle class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignalState {
    main: LightState,
    left: LightState,
    right: LightState,
    mode: ArrowMode,
}

impl Default for SignalState {
    fn default() -> Self {
        Self::red()
    }
}

impl SignalState {
    /// Creates an all-red signal in [ArrowMode::Simple].
    pub fn red() -> Self {
        Self {
            main: LightState::Red,
            left: LightState::Red,
            right: LightState::Red,
            mode: ArrowMode::Simple,
        }
    }

    /// Creates an all-green signal in [ArrowMode::Simple].
    pub fn green() -> Self {
        Self {
            main: LightState::Green,
            left: LightState::Green,
            right: LightState::Green,
            mode: ArrowMode::Simple,
        }
    }

    pub fn main(&self) -> LightState {
        self.main
    }

    pub fn left(&self) -> LightState {
        self.left
    }

    pub fn right(&self) -> LightState {
        self.right
    }

    pub fn mode(&self) -> ArrowMode {
        self.mode
    }

    /// The light governing a movement in the given direction.
    pub fn light(&self, direction: ArrowDirection, side: TrafficSide) -> LightState {
        match (direction, side) {
            (ArrowDirection::Forward, _) => self.main,
            (ArrowDirection::Left, _) => self.left,
            (ArrowDirection::Right, _) => self.right,
            (ArrowDirection::Turn, TrafficSide::Right) => self.left,
            (ArrowDirection::Turn, TrafficSide::Left) => self.right,
        }
    }

    /// Sets any subset of the three arrows, then re-applies the mode's
    /// mirroring rules. Returns whether the net state changed.
    pub fn set_states(
        &mut self,
        main: Option<LightState>,
        left: Option<LightState>,
        right: Option<LightState>,
    ) -> bool {
        let before = *self;
        if let Some(main) = main {
            self.main = main;
        }
        if let Some(left) = left {
            self.left = left;
        }
        if let Some(right) = right {
            self.right = right;
        }
        self.apply_mode();
        *self != before
    }

    /// Cycles the arrow mode, skipping modes whose independent arrow has
    /// no corresponding turning movement. Returns whether the mode changed.
    pub fn toggle_mode(&mut self, turns: TurnOptions) -> bool {
        let before = self.mode;
        let mut mode = self.mode;
        // At most one full lap; Simple is always available.
        for _ in 0..4 {
            mode = match mode {
                ArrowMode::Simple => ArrowMode::SingleLeft,
                ArrowMode::SingleLeft => ArrowMode::SingleRight,
                ArrowMode::SingleRight => ArrowMode::All,
                ArrowMode::All => ArrowMode::Simple,
            };
            let available = match mode {
                ArrowMode::Simple => true,
                ArrowMode::SingleLeft => turns.left,
                ArrowMode::SingleRight => turns.right,
                ArrowMode::All => turns.left || turns.right,
            };
            if available {
                break;
            }
        }
        self.mode = mode;
        self.apply_mode();
        self.mode != before
    }

    /// Flips the main light. In [ArrowMode::Simple] this flips all three;
    /// in the single-arrow modes it also flips the mirrored side.
    pub fn invert_main(&mut self) -> bool {
        self.set_states(Some(self.main.invert()), None, None)
    }

    pub fn invert_left(&mut self) -> bool {
        self.set_states(None, Some(self.left.invert()), None)
    }

    pub fn invert_right(&mut self) -> bool {
        self.set_states(None, None, Some(self.right.invert()))
    }

    /// The single state shown by a physical fixture with one lamp.
    ///
    /// Green if any arrow is green, red only if all are red, otherwise
    /// the caution state of the arrow mid-transition.
    pub fn visual_state(&self) -> LightState {
        let arrows = [self.main, self.left, self.right];
        if arrows.iter().any(|l| *l == LightState::Green) {
            LightState::Green
        } else if arrows.iter().all(|l| *l == LightState::Red) {
            LightState::Red
        } else if arrows.iter().any(|l| *l == LightState::RedToGreen) {
            LightState::RedToGreen
        } else {
            LightState::GreenToRed
        }
    }

    /// Collapses any caution states onto their target steady states.
    pub fn settle(&mut self) {
        self.main = self.main.settle();
        self.left = self.left.settle();
        self.right = self.right.settle();
    }

    /// Forces every arrow red, keeping the mode.
    pub fn make_red(&mut self) {
        self.main = LightState::Red;
        self.left = LightState::Red;
        self.right = LightState::Red;
    }

    /// Sets the three arrows verbatim, bypassing mode mirroring.
    /// Used for transition blending, where arrows diverge briefly even
    /// in [ArrowMode::Simple].
    pub(crate) fn set_raw(&mut self, main: LightState, left: LightState, right: LightState) {
        self.main = main;
        self.left = left;
        self.right = right;
    }

    /// Re-pins the mirrored arrows to the main light per the current mode.
    fn apply_mode(&mut self) {
        match self.mode {
            ArrowMode::Simple => {
                self.left = self.main;
                self.right = self.main;
            }
            ArrowMode::SingleLeft => {
                self.right = self.main;
            }
            ArrowMode::SingleRight => {
                self.left = self.main;
            }
            ArrowMode::All => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ALL_TURNS: TurnOptions = TurnOptions {
        left: true,
        forward: true,
        right: true,
    };

    #[test]
    fn simple_mode_mirrors_all_arrows() {
        let mut signal = SignalState::red();
        signal.set_states(Some(LightState::Green), None, None);
        assert_eq!(signal.left(), LightState::Green);
        assert_eq!(signal.right(), LightState::Green);

        // Attempting to set an arrow on its own is overridden by the mode.
        signal.set_states(None, Some(LightState::Red), None);
        assert_eq!(signal.left(), LightState::Green);
    }

    #[test]
    fn single_left_pins_right_to_main() {
        let mut signal = SignalState::red();
        signal.toggle_mode(ALL_TURNS);
        assert_eq!(signal.mode(), ArrowMode::SingleLeft);

        signal.set_states(Some(LightState::Green), Some(LightState::Red), None);
        assert_eq!(signal.main(), LightState::Green);
        assert_eq!(signal.right(), LightState::Green);
        assert_eq!(signal.left(), LightState::Red);
    }

    #[test]
    fn toggle_mode_skips_missing_turns() {
        let mut signal = SignalState::red();
        let no_left = TurnOptions {
            left: false,
            forward: true,
            right: true,
        };
        signal.toggle_mode(no_left);
        assert_eq!(signal.mode(), ArrowMode::SingleRight);

        let mut signal = SignalState::red();
        let forward_only = TurnOptions {
            left: false,
            forward: true,
            right: false,
        };
        assert!(!signal.toggle_mode(forward_only));
        assert_eq!(signal.mode(), ArrowMode::Simple);
    }

    #[test]
    fn invert_main_respects_mode() {
        let mut signal = SignalState::red();
        signal.invert_main();
        assert_eq!(signal.main(), LightState::Green);
        assert_eq!(signal.left(), LightState::Green);
        assert_eq!(signal.right(), LightState::Green);

        let mut signal = SignalState::red();
        signal.toggle_mode(ALL_TURNS); // SingleLeft
        signal.invert_main();
        assert_eq!(signal.main(), LightState::Green);
        assert_eq!(signal.right(), LightState::Green);
        assert_eq!(signal.left(), LightState::Red);
    }

    #[test]
    fn visual_state_collapse() {
        let mut signal = SignalState::red();
        assert_eq!(signal.visual_state(), LightState::Red);
        signal.toggle_mode(ALL_TURNS);
        signal.toggle_mode(ALL_TURNS);
        signal.toggle_mode(ALL_TURNS); // All
        assert_eq!(signal.mode(), ArrowMode::All);

        signal.set_states(None, Some(LightState::Green), None);
        assert_eq!(signal.visual_state(), LightState::Green);

        signal.set_states(None, Some(LightState::GreenToRed), None);
        assert_eq!(signal.visual_state(), LightState::GreenToRed);

        signal.set_states(None, Some(LightState::GreenToRed), Some(LightState::RedToGreen));
        assert_eq!(signal.visual_state(), LightState::RedToGreen);
    }

    #[test]
    fn turn_resolves_by_traffic_side() {
        let mut signal = SignalState::red();
        signal.toggle_mode(ALL_TURNS);
        signal.toggle_mode(ALL_TURNS);
        signal.toggle_mode(ALL_TURNS); // All
        signal.set_states(None, Some(LightState::Green), None);

        assert_eq!(
            signal.light(ArrowDirection::Turn, TrafficSide::Right),
            LightState::Green
        );
        assert_eq!(
            signal.light(ArrowDirection::Turn, TrafficSide::Left),
            LightState::Red
        );
    }
}
