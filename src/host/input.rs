// Buffered player input: presses stay "pressed" for a short window until consumed.
use bevy::prelude::*;

/// How long a press remains available to state updates.
pub const BUFFER_TIME: f32 = 0.08;

/// Raw device state for one tick, before edge detection and buffering.
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq)]
pub struct InputFrame {
    pub dash: bool,
    pub crouch_dash: bool,
    pub talk: bool,
    pub grab: bool,
    pub aim: Vec2,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BufferedButton {
    down: bool,
    buffer: f32,
    buffered: bool,
}

impl BufferedButton {
    /// A button without a buffer is pressed only on the tick its edge fires.
    fn unbuffered() -> Self {
        Self {
            buffered: false,
            ..default()
        }
    }

    fn buffered() -> Self {
        Self {
            buffered: true,
            ..default()
        }
    }

    fn feed(&mut self, down: bool, dt: f32) {
        self.buffer = (self.buffer - dt).max(0.0);
        if down && !self.down {
            self.buffer = if self.buffered { BUFFER_TIME } else { f32::EPSILON };
        } else if !self.buffered {
            self.buffer = 0.0;
        }
        self.down = down;
    }

    pub fn pressed(&self) -> bool {
        self.buffer > 0.0
    }

    pub fn check(&self) -> bool {
        self.down
    }

    pub fn consume_buffer(&mut self) {
        self.buffer = 0.0;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PlayerInput {
    pub dash: BufferedButton,
    pub crouch_dash: BufferedButton,
    pub talk: BufferedButton,
    pub grab: BufferedButton,
    pub aim: Vec2,
    pub move_x: i32,
    pub move_y: i32,
}

impl Default for PlayerInput {
    fn default() -> Self {
        Self {
            dash: BufferedButton::buffered(),
            crouch_dash: BufferedButton::buffered(),
            talk: BufferedButton::unbuffered(),
            grab: BufferedButton::unbuffered(),
            aim: Vec2::ZERO,
            move_x: 0,
            move_y: 0,
        }
    }
}

impl PlayerInput {
    pub fn feed(&mut self, frame: &InputFrame, dt: f32) {
        self.dash.feed(frame.dash, dt);
        self.crouch_dash.feed(frame.crouch_dash, dt);
        self.talk.feed(frame.talk, dt);
        self.grab.feed(frame.grab, dt);
        self.aim = frame.aim;
        self.move_x = axis(frame.aim.x);
        self.move_y = axis(frame.aim.y);
    }
}

fn axis(value: f32) -> i32 {
    if value > 0.3 {
        1
    } else if value < -0.3 {
        -1
    } else {
        0
    }
}
