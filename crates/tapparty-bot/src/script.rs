//! Scripted play.
//!
//! A [`Script`] decides what the bot does next from the events it has seen.
//! It never touches I/O: events come in through [`Script::observe`] and
//! intents go out through [`Script::next_intent`], both stamped with the
//! caller's clock.

use std::{collections::VecDeque, time::Duration};

use tapparty_app::{GameEvent, Intent};
use tapparty_core::{TimePoint, Timer};
use tracing::{info, warn};

/// Which side of the room the bot plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seat {
    /// Create a room and start the round once enough players are in.
    Host {
        /// Code to create, or `None` for a generated one
        room_code: Option<String>,
        /// Players (host included) needed before starting
        players: usize,
    },
    /// Join an existing room and wait for the host.
    Guest {
        /// Code to join
        room_code: String,
    },
}

/// What the bot should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Host or guest
    pub seat: Seat,
    /// Display name
    pub name: String,
    /// Skin
    pub skin_id: u32,
    /// Pause between taps while a round runs
    pub tap_interval: Duration,
}

/// Event-driven intent schedule.
#[derive(Debug)]
pub struct Script<I> {
    plan: Plan,
    pending: VecDeque<Intent>,
    tap_timer: Timer<I>,
    players: usize,
    in_room: bool,
    started: bool,
    running: bool,
    taps: u32,
    finished: bool,
}

impl<I: TimePoint> Script<I> {
    /// New script. The first intent is the create or join.
    pub fn new(plan: Plan) -> Self {
        let opening = match &plan.seat {
            Seat::Host { room_code, .. } => Intent::CreateRoom {
                room_code: room_code.clone(),
                name: plan.name.clone(),
                skin_id: plan.skin_id,
            },
            Seat::Guest { room_code } => Intent::JoinRoom {
                room_code: room_code.clone(),
                name: plan.name.clone(),
                skin_id: plan.skin_id,
            },
        };

        Self {
            plan,
            pending: VecDeque::from([opening]),
            tap_timer: Timer::new(),
            players: 0,
            in_room: false,
            started: false,
            running: false,
            taps: 0,
            finished: false,
        }
    }

    /// Whether the script has asked to quit.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Taps sent so far.
    pub fn taps(&self) -> u32 {
        self.taps
    }

    /// Players currently in the room, as far as the bot knows.
    pub fn players(&self) -> usize {
        self.players
    }

    /// Feed one game event.
    pub fn observe(&mut self, event: &GameEvent, now: I) {
        match event {
            GameEvent::RoomCreated { room_code } => {
                info!(%room_code, "hosting");
                self.in_room = true;
                self.players = 1;
                self.started = false;
                self.stop_round();
                self.maybe_start();
            },
            GameEvent::JoinSuccess { room_code, players } => {
                info!(%room_code, players = players.len(), "joined");
                self.in_room = true;
                self.players = players.len();
                self.stop_round();
            },
            GameEvent::PlayerJoined { name, .. } => {
                info!(%name, "player joined");
                self.players += 1;
                self.maybe_start();
            },
            GameEvent::PlayerLeft { name } => {
                info!(%name, "player left");
                self.players = self.players.saturating_sub(1);
            },
            GameEvent::GameStarting => {
                info!("round started");
                self.started = true;
                self.running = true;
                self.tap_timer.arm(now, Duration::ZERO);
            },
            GameEvent::RoundEnded { winner } => {
                match winner {
                    Some(w) => info!(winner = %w.name, taps = w.taps, sent = self.taps, "round ended"),
                    None => info!(sent = self.taps, "round ended without a winner"),
                }
                self.stop_round();
                self.quit();
            },
            GameEvent::RoomError { message } => {
                warn!(%message, "relay refused");
                if !self.in_room {
                    self.quit();
                }
            },
            GameEvent::RoomClosed => {
                info!("room closed");
                self.in_room = false;
                self.stop_round();
                self.quit();
            },
            GameEvent::ConnectFailed { reason } | GameEvent::ConnectionLost { reason } => {
                warn!(%reason, "giving up on the relay");
                self.stop_round();
                self.quit();
            },
            GameEvent::Reconnecting { attempt } => info!(attempt, "reconnecting"),
            GameEvent::Connected { .. }
            | GameEvent::PlayerInfoUpdate { .. }
            | GameEvent::TapEvent { .. }
            | GameEvent::GameStateUpdate { .. } => {},
        }
    }

    /// Next intent due at `now`, if any.
    pub fn next_intent(&mut self, now: I) -> Option<Intent> {
        if let Some(intent) = self.pending.pop_front() {
            return Some(intent);
        }

        if self.running && self.tap_timer.fire_if_due(now) {
            self.tap_timer.arm(now, self.plan.tap_interval);
            self.taps += 1;
            return Some(Intent::Tap);
        }

        None
    }

    fn maybe_start(&mut self) {
        let Seat::Host { players: needed, .. } = self.plan.seat else {
            return;
        };
        if self.started || self.players < needed {
            return;
        }

        info!(players = self.players, "everyone's in");
        self.started = true;
        self.pending.push_back(Intent::StartGame);
    }

    fn stop_round(&mut self) {
        self.running = false;
        self.tap_timer.cancel();
    }

    fn quit(&mut self) {
        if !self.finished {
            self.finished = true;
            self.pending.push_back(Intent::Quit);
        }
    }
}
