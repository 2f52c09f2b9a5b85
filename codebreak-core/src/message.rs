//! Application payloads: colon-delimited ASCII fields.
//!
//! ```text
//! LK:<KIND>[:<field>...]
//! ```
//!
//! Field 0 is always [`PROTOCOL_TAG`], field 1 the [`MessageKind`] tag.
//! [`Message::parse`] validates tag, kind, field count and field contents;
//! the [`Display`](fmt::Display) impl is the encoder.

use std::fmt;

use crate::error::ProtocolError;
use crate::state::{MAX_ROUNDS, Phase, RoundEntry};

/// Field 0 of every payload.
pub const PROTOCOL_TAG: &str = "LK";

/// Field separator.
pub const DELIMITER: char = ':';

/// Number of color slots in a code.
pub const CODE_LENGTH: usize = 4;

// ── Role ─────────────────────────────────────────────────────────

/// Which side of the board a player sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Role {
    Guesser = 0,
    Evaluator = 1,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Guesser, Role::Evaluator];

    /// The opponent's role.
    pub fn peer(self) -> Role {
        match self {
            Role::Guesser => Role::Evaluator,
            Role::Evaluator => Role::Guesser,
        }
    }

    /// Wire digit, also the slot index.
    pub fn index(self) -> usize {
        self as usize
    }

    fn from_field(kind: MessageKind, value: &str) -> Result<Self, ProtocolError> {
        match value {
            "0" => Ok(Role::Guesser),
            "1" => Ok(Role::Evaluator),
            _ => Err(kind.invalid("role", value)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Guesser => f.write_str("guesser"),
            Role::Evaluator => f.write_str("evaluator"),
        }
    }
}

// ── Colors & codes ───────────────────────────────────────────────

/// The six-color palette, encoded as digits `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Color {
    Red = 0,
    Green = 1,
    Blue = 2,
    Yellow = 3,
    Orange = 4,
    Purple = 5,
}

impl Color {
    pub const PALETTE: [Color; 6] = [
        Color::Red,
        Color::Green,
        Color::Blue,
        Color::Yellow,
        Color::Orange,
        Color::Purple,
    ];

    pub fn from_digit(digit: u8) -> Option<Self> {
        Self::PALETTE.get(usize::from(digit)).copied()
    }

    pub fn digit(self) -> u8 {
        self as u8
    }
}

/// Digit used on the wire for a slot that holds no color yet.
pub const UNSET_DIGIT: u8 = 6;

/// Four colors: the secret or one guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(pub [Color; CODE_LENGTH]);

impl Code {
    /// Parse exactly four digits in `0..=5`.
    pub fn parse(value: &str) -> Option<Self> {
        let bytes = value.as_bytes();
        if bytes.len() != CODE_LENGTH {
            return None;
        }
        let mut colors = [Color::Red; CODE_LENGTH];
        for (slot, byte) in colors.iter_mut().zip(bytes) {
            *slot = Color::from_digit(byte.checked_sub(b'0')?)?;
        }
        Some(Code(colors))
    }

    pub fn digits(&self) -> [u8; CODE_LENGTH] {
        self.0.map(Color::digit)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for digit in self.digits() {
            write!(f, "{digit}")?;
        }
        Ok(())
    }
}

/// Writes four [`UNSET_DIGIT`]s when the code is absent.
pub(crate) struct MaybeCode<'a>(pub &'a Option<Code>);

impl fmt::Display for MaybeCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => code.fmt(f),
            None => {
                for _ in 0..CODE_LENGTH {
                    write!(f, "{UNSET_DIGIT}")?;
                }
                Ok(())
            }
        }
    }
}

// ── Score ────────────────────────────────────────────────────────

/// Black/white feedback for one guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Score {
    pub blacks: u8,
    pub whites: u8,
}

impl Score {
    /// Counts must fit on a four-slot board.
    pub fn new(blacks: u8, whites: u8) -> Option<Self> {
        let slots = CODE_LENGTH as u8;
        (blacks <= slots && whites <= slots && blacks + whites <= slots)
            .then_some(Score { blacks, whites })
    }
}

// ── Disconnect notices ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectKind {
    Temporary,
    Permanent,
}

impl fmt::Display for DisconnectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectKind::Temporary => f.write_str("temporary"),
            DisconnectKind::Permanent => f.write_str("permanent"),
        }
    }
}

/// A player's answer to a disconnect notice, naming the confirming player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectConfirm {
    pub kind: DisconnectKind,
    pub name: String,
    pub role: Role,
}

// ── Reconnect snapshot ───────────────────────────────────────────

/// Everything a reconnecting player needs to redraw the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectSnapshot {
    pub round: usize,
    pub rounds: [RoundEntry; MAX_ROUNDS],
    pub last_valid: Phase,
    pub opponent: String,
    pub secret: Option<Code>,
}

// ── MessageKind ──────────────────────────────────────────────────

/// The field-1 tag of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Ping,
    Pong,
    Login,
    LoginSuccess,
    RequestRooms,
    RoomList,
    JoinRoom,
    JoinSuccess,
    JoinFail,
    GameStart,
    ReadyStart,
    ChooseColors,
    ColorsChosen,
    Guess,
    GuessAck,
    Evaluation,
    EvaluationAck,
    WinGame,
    WinAck,
    TemporaryDisconnect,
    PermanentDisconnect,
    TemporaryDisconnectConfirm,
    PermanentDisconnectConfirm,
    ReconnectRequest,
    ReconnectConfirm,
    ReconnectFail,
    ReconnectOtherPlayer,
    ReconnectOtherPlayerAck,
}

impl MessageKind {
    const ALL: [MessageKind; 28] = [
        Self::Ping,
        Self::Pong,
        Self::Login,
        Self::LoginSuccess,
        Self::RequestRooms,
        Self::RoomList,
        Self::JoinRoom,
        Self::JoinSuccess,
        Self::JoinFail,
        Self::GameStart,
        Self::ReadyStart,
        Self::ChooseColors,
        Self::ColorsChosen,
        Self::Guess,
        Self::GuessAck,
        Self::Evaluation,
        Self::EvaluationAck,
        Self::WinGame,
        Self::WinAck,
        Self::TemporaryDisconnect,
        Self::PermanentDisconnect,
        Self::TemporaryDisconnectConfirm,
        Self::PermanentDisconnectConfirm,
        Self::ReconnectRequest,
        Self::ReconnectConfirm,
        Self::ReconnectFail,
        Self::ReconnectOtherPlayer,
        Self::ReconnectOtherPlayerAck,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "PING",
            Self::Pong => "PONG",
            Self::Login => "START_LOGIN",
            Self::LoginSuccess => "LOGIN_SUCCESS",
            Self::RequestRooms => "REQUEST_ROOMS",
            Self::RoomList => "ROOM_LIST",
            Self::JoinRoom => "JOIN_ROOM",
            Self::JoinSuccess => "JOIN_SUCCESS",
            Self::JoinFail => "JOIN_FAIL",
            Self::GameStart => "GAME_START",
            Self::ReadyStart => "READY_GAME_START",
            Self::ChooseColors => "CHOOSING_COLORS",
            Self::ColorsChosen => "CHOOSING_COLORS_CONFIRM",
            Self::Guess => "GUESSING_COLORS",
            Self::GuessAck => "GUESSING_COLORS_ACK",
            Self::Evaluation => "EVALUATION",
            Self::EvaluationAck => "EVALUATION_ACK",
            Self::WinGame => "WIN_GAME",
            Self::WinAck => "WIN_GAME_ACK",
            Self::TemporaryDisconnect => "TEMPORARY_DISCONNECT",
            Self::PermanentDisconnect => "PERMANENT_DISCONNECT",
            Self::TemporaryDisconnectConfirm => "TEMPORARY_DISCONNECT_CONFIRM",
            Self::PermanentDisconnectConfirm => "PERMANENT_DISCONNECT_CONFIRM",
            Self::ReconnectRequest => "RECONNECT_REQUEST",
            Self::ReconnectConfirm => "RECONNECT_CONFIRM",
            Self::ReconnectFail => "RECONNECT_FAIL",
            Self::ReconnectOtherPlayer => "RECONNECT_OTHER_PLAYER",
            Self::ReconnectOtherPlayerAck => "RECONNECT_OTHER_PLAYER_ACK",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    fn invalid(self, field: &'static str, value: &str) -> ProtocolError {
        ProtocolError::InvalidField {
            kind: self.as_str(),
            field,
            value: value.to_string(),
        }
    }

    fn expect_fields(self, fields: &[&str], expected: usize) -> Result<(), ProtocolError> {
        if fields.len() == expected {
            Ok(())
        } else {
            Err(ProtocolError::FieldCount {
                kind: self.as_str(),
                expected,
                actual: fields.len(),
            })
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Message ──────────────────────────────────────────────────────

/// One decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Ping,
    Pong { name: String, role: Role },
    Login { name: String, role: Role },
    LoginSuccess { name: String, role: Role },
    RequestRooms { name: String, role: Role },
    RoomList(Vec<u32>),
    JoinRoom { name: String, role: Role, room: u32 },
    JoinSuccess,
    JoinFail,
    GameStart { opponent: String },
    ReadyStart { name: String, role: Role },
    ChooseColors(Code),
    ColorsChosen,
    Guess(Code),
    GuessAck(Code),
    Evaluation(Score),
    EvaluationAck(Score),
    /// Carries the winning role.
    WinGame(Role),
    WinAck,
    /// Names the player who went away.
    DisconnectNotice {
        kind: DisconnectKind,
        name: String,
        role: Role,
    },
    DisconnectConfirm(DisconnectConfirm),
    ReconnectRequest { name: String, role: Role },
    ReconnectConfirm(Box<ReconnectSnapshot>),
    ReconnectFail,
    ReconnectOtherPlayer,
    ReconnectOtherPlayerAck,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Ping => MessageKind::Ping,
            Message::Pong { .. } => MessageKind::Pong,
            Message::Login { .. } => MessageKind::Login,
            Message::LoginSuccess { .. } => MessageKind::LoginSuccess,
            Message::RequestRooms { .. } => MessageKind::RequestRooms,
            Message::RoomList(_) => MessageKind::RoomList,
            Message::JoinRoom { .. } => MessageKind::JoinRoom,
            Message::JoinSuccess => MessageKind::JoinSuccess,
            Message::JoinFail => MessageKind::JoinFail,
            Message::GameStart { .. } => MessageKind::GameStart,
            Message::ReadyStart { .. } => MessageKind::ReadyStart,
            Message::ChooseColors(_) => MessageKind::ChooseColors,
            Message::ColorsChosen => MessageKind::ColorsChosen,
            Message::Guess(_) => MessageKind::Guess,
            Message::GuessAck(_) => MessageKind::GuessAck,
            Message::Evaluation(_) => MessageKind::Evaluation,
            Message::EvaluationAck(_) => MessageKind::EvaluationAck,
            Message::WinGame(_) => MessageKind::WinGame,
            Message::WinAck => MessageKind::WinAck,
            Message::DisconnectNotice { kind, .. } => match kind {
                DisconnectKind::Temporary => MessageKind::TemporaryDisconnect,
                DisconnectKind::Permanent => MessageKind::PermanentDisconnect,
            },
            Message::DisconnectConfirm(confirm) => match confirm.kind {
                DisconnectKind::Temporary => MessageKind::TemporaryDisconnectConfirm,
                DisconnectKind::Permanent => MessageKind::PermanentDisconnectConfirm,
            },
            Message::ReconnectRequest { .. } => MessageKind::ReconnectRequest,
            Message::ReconnectConfirm(_) => MessageKind::ReconnectConfirm,
            Message::ReconnectFail => MessageKind::ReconnectFail,
            Message::ReconnectOtherPlayer => MessageKind::ReconnectOtherPlayer,
            Message::ReconnectOtherPlayerAck => MessageKind::ReconnectOtherPlayerAck,
        }
    }

    /// Encode for the wire.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode and validate one payload.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let fields: Vec<&str> = raw.split(DELIMITER).collect();
        if fields[0] != PROTOCOL_TAG {
            return Err(ProtocolError::MissingTag);
        }
        let Some(tag) = fields.get(1) else {
            return Err(ProtocolError::MissingTag);
        };
        let kind =
            MessageKind::from_tag(tag).ok_or_else(|| ProtocolError::UnknownKind(tag.to_string()))?;
        let args = &fields[2..];

        use MessageKind as K;
        let message = match kind {
            K::Ping => {
                kind.expect_fields(args, 0)?;
                Message::Ping
            }
            K::Pong => {
                let (name, role) = identity(kind, args)?;
                Message::Pong { name, role }
            }
            K::Login => {
                let (name, role) = identity(kind, args)?;
                Message::Login { name, role }
            }
            K::LoginSuccess => {
                let (name, role) = identity(kind, args)?;
                Message::LoginSuccess { name, role }
            }
            K::RequestRooms => {
                let (name, role) = identity(kind, args)?;
                Message::RequestRooms { name, role }
            }
            K::RoomList => {
                let rooms = args
                    .iter()
                    .filter(|field| !field.is_empty())
                    .map(|field| field.parse().map_err(|_| kind.invalid("room", field)))
                    .collect::<Result<Vec<u32>, _>>()?;
                Message::RoomList(rooms)
            }
            K::JoinRoom => {
                kind.expect_fields(args, 3)?;
                let (name, role) = identity(kind, &args[..2])?;
                let room = args[2].parse().map_err(|_| kind.invalid("room", args[2]))?;
                Message::JoinRoom { name, role, room }
            }
            K::JoinSuccess => {
                kind.expect_fields(args, 0)?;
                Message::JoinSuccess
            }
            K::JoinFail => {
                kind.expect_fields(args, 0)?;
                Message::JoinFail
            }
            K::GameStart => {
                kind.expect_fields(args, 1)?;
                Message::GameStart {
                    opponent: name_field(kind, args[0])?,
                }
            }
            K::ReadyStart => {
                let (name, role) = identity(kind, args)?;
                Message::ReadyStart { name, role }
            }
            K::ChooseColors => Message::ChooseColors(code(kind, args)?),
            K::ColorsChosen => {
                // Encoded with a trailing delimiter; accept it bare as well.
                if !(args.is_empty() || args == [""]) {
                    return Err(ProtocolError::FieldCount {
                        kind: kind.as_str(),
                        expected: 0,
                        actual: args.len(),
                    });
                }
                Message::ColorsChosen
            }
            K::Guess => Message::Guess(code(kind, args)?),
            K::GuessAck => Message::GuessAck(code(kind, args)?),
            K::Evaluation => Message::Evaluation(score(kind, args)?),
            K::EvaluationAck => Message::EvaluationAck(score(kind, args)?),
            K::WinGame => {
                kind.expect_fields(args, 1)?;
                Message::WinGame(Role::from_field(kind, args[0])?)
            }
            K::WinAck => {
                kind.expect_fields(args, 0)?;
                Message::WinAck
            }
            K::TemporaryDisconnect | K::PermanentDisconnect => {
                let (name, role) = identity(kind, args)?;
                Message::DisconnectNotice {
                    kind: disconnect_kind(kind == K::TemporaryDisconnect),
                    name,
                    role,
                }
            }
            K::TemporaryDisconnectConfirm | K::PermanentDisconnectConfirm => {
                let (name, role) = identity(kind, args)?;
                Message::DisconnectConfirm(DisconnectConfirm {
                    kind: disconnect_kind(kind == K::TemporaryDisconnectConfirm),
                    name,
                    role,
                })
            }
            K::ReconnectRequest => {
                let (name, role) = identity(kind, args)?;
                Message::ReconnectRequest { name, role }
            }
            K::ReconnectConfirm => Message::ReconnectConfirm(Box::new(snapshot(kind, args)?)),
            K::ReconnectFail => {
                kind.expect_fields(args, 0)?;
                Message::ReconnectFail
            }
            K::ReconnectOtherPlayer => {
                kind.expect_fields(args, 0)?;
                Message::ReconnectOtherPlayer
            }
            K::ReconnectOtherPlayerAck => {
                kind.expect_fields(args, 0)?;
                Message::ReconnectOtherPlayerAck
            }
        };
        Ok(message)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PROTOCOL_TAG}{DELIMITER}{}", self.kind())?;
        match self {
            Message::Ping
            | Message::JoinSuccess
            | Message::JoinFail
            | Message::WinAck
            | Message::ReconnectFail
            | Message::ReconnectOtherPlayer
            | Message::ReconnectOtherPlayerAck => Ok(()),
            Message::Pong { name, role }
            | Message::Login { name, role }
            | Message::LoginSuccess { name, role }
            | Message::RequestRooms { name, role }
            | Message::ReadyStart { name, role }
            | Message::ReconnectRequest { name, role }
            | Message::DisconnectNotice { name, role, .. }
            | Message::DisconnectConfirm(DisconnectConfirm { name, role, .. }) => {
                write!(f, ":{name}:{}", role.index())
            }
            Message::RoomList(rooms) => {
                for room in rooms {
                    write!(f, ":{room}")?;
                }
                Ok(())
            }
            Message::JoinRoom { name, role, room } => {
                write!(f, ":{name}:{}:{room}", role.index())
            }
            Message::GameStart { opponent } => write!(f, ":{opponent}"),
            Message::ChooseColors(code) | Message::Guess(code) | Message::GuessAck(code) => {
                write!(f, ":{code}")
            }
            Message::ColorsChosen => f.write_str(":"),
            Message::Evaluation(score) | Message::EvaluationAck(score) => {
                write!(f, ":{}:{}", score.blacks, score.whites)
            }
            Message::WinGame(winner) => write!(f, ":{}", winner.index()),
            Message::ReconnectConfirm(snapshot) => {
                write!(f, ":{}:", snapshot.round)?;
                for entry in &snapshot.rounds {
                    write!(f, "{entry}:")?;
                }
                write!(
                    f,
                    "{}:{}:{}",
                    snapshot.last_valid.digit(),
                    snapshot.opponent,
                    MaybeCode(&snapshot.secret)
                )
            }
        }
    }
}

// ── Field helpers ────────────────────────────────────────────────

fn disconnect_kind(temporary: bool) -> DisconnectKind {
    if temporary {
        DisconnectKind::Temporary
    } else {
        DisconnectKind::Permanent
    }
}

fn name_field(kind: MessageKind, value: &str) -> Result<String, ProtocolError> {
    if value.is_empty() {
        return Err(kind.invalid("name", value));
    }
    Ok(value.to_string())
}

/// `name:role`
fn identity(kind: MessageKind, args: &[&str]) -> Result<(String, Role), ProtocolError> {
    kind.expect_fields(args, 2)?;
    Ok((name_field(kind, args[0])?, Role::from_field(kind, args[1])?))
}

fn code(kind: MessageKind, args: &[&str]) -> Result<Code, ProtocolError> {
    kind.expect_fields(args, 1)?;
    Code::parse(args[0]).ok_or_else(|| kind.invalid("colors", args[0]))
}

fn count(kind: MessageKind, field: &'static str, value: &str) -> Result<u8, ProtocolError> {
    value.parse().map_err(|_| kind.invalid(field, value))
}

fn score(kind: MessageKind, args: &[&str]) -> Result<Score, ProtocolError> {
    kind.expect_fields(args, 2)?;
    let blacks = count(kind, "blacks", args[0])?;
    let whites = count(kind, "whites", args[1])?;
    Score::new(blacks, whites).ok_or_else(|| kind.invalid("score", &format!("{blacks}/{whites}")))
}

/// `round:<record>x10:lastValid:opponent:secret`
fn snapshot(kind: MessageKind, args: &[&str]) -> Result<ReconnectSnapshot, ProtocolError> {
    kind.expect_fields(args, MAX_ROUNDS + 4)?;
    let round: usize = args[0].parse().map_err(|_| kind.invalid("round", args[0]))?;
    if round > MAX_ROUNDS {
        return Err(kind.invalid("round", args[0]));
    }

    let mut rounds = [RoundEntry::default(); MAX_ROUNDS];
    for (entry, record) in rounds.iter_mut().zip(&args[1..=MAX_ROUNDS]) {
        *entry = RoundEntry::parse_record(record).ok_or_else(|| kind.invalid("round record", record))?;
    }

    let tail = &args[MAX_ROUNDS + 1..];
    let last_valid = tail[0]
        .parse::<u8>()
        .ok()
        .and_then(Phase::from_digit)
        .ok_or_else(|| kind.invalid("last valid phase", tail[0]))?;
    let opponent = name_field(kind, tail[1])?;
    let secret = if tail[2].bytes().all(|b| b == b'0' + UNSET_DIGIT) && tail[2].len() == CODE_LENGTH
    {
        None
    } else {
        Some(Code::parse(tail[2]).ok_or_else(|| kind.invalid("secret", tail[2]))?)
    };

    Ok(ReconnectSnapshot {
        round,
        rounds,
        last_valid,
        opponent,
        secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_of(digits: &str) -> Code {
        Code::parse(digits).unwrap()
    }

    #[test]
    fn parses_heartbeat_reply() {
        assert_eq!(
            Message::parse("LK:PONG:anna:0").unwrap(),
            Message::Pong {
                name: "anna".into(),
                role: Role::Guesser
            }
        );
        assert_eq!(Message::Ping.encode(), "LK:PING");
    }

    #[test]
    fn rejects_missing_tag_and_unknown_kind() {
        assert_eq!(Message::parse("XX:PING"), Err(ProtocolError::MissingTag));
        assert_eq!(Message::parse("LK"), Err(ProtocolError::MissingTag));
        assert_eq!(
            Message::parse("LK:DANCE"),
            Err(ProtocolError::UnknownKind("DANCE".into()))
        );
    }

    #[test]
    fn enforces_field_counts() {
        assert!(matches!(
            Message::parse("LK:PONG:anna"),
            Err(ProtocolError::FieldCount { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            Message::parse("LK:WIN_GAME_ACK:0"),
            Err(ProtocolError::FieldCount { .. })
        ));
        assert!(matches!(
            Message::parse("LK:GUESSING_COLORS:1111:2"),
            Err(ProtocolError::FieldCount { .. })
        ));
    }

    #[test]
    fn color_codes_stay_in_palette() {
        assert_eq!(
            Message::parse("LK:CHOOSING_COLORS:1234").unwrap(),
            Message::ChooseColors(Code([Color::Green, Color::Blue, Color::Yellow, Color::Orange]))
        );
        for bad in ["1236", "123", "12345", "12a4", ""] {
            assert!(
                Message::parse(&format!("LK:GUESSING_COLORS:{bad}")).is_err(),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn evaluation_counts_fit_the_board() {
        assert_eq!(
            Message::parse("LK:EVALUATION:2:2").unwrap(),
            Message::Evaluation(Score { blacks: 2, whites: 2 })
        );
        assert!(Message::parse("LK:EVALUATION:5:0").is_err());
        assert!(Message::parse("LK:EVALUATION:3:2").is_err());
        assert!(Message::parse("LK:EVALUATION:-1:0").is_err());
        assert!(Message::parse("LK:EVALUATION:x:0").is_err());
    }

    #[test]
    fn colors_confirm_carries_trailing_delimiter() {
        assert_eq!(Message::ColorsChosen.encode(), "LK:CHOOSING_COLORS_CONFIRM:");
        assert_eq!(
            Message::parse("LK:CHOOSING_COLORS_CONFIRM:").unwrap(),
            Message::ColorsChosen
        );
    }

    #[test]
    fn disconnect_frames() {
        let notice = Message::DisconnectNotice {
            kind: DisconnectKind::Temporary,
            name: "bob".into(),
            role: Role::Evaluator,
        };
        assert_eq!(notice.encode(), "LK:TEMPORARY_DISCONNECT:bob:1");

        assert_eq!(
            Message::parse("LK:PERMANENT_DISCONNECT_CONFIRM:anna:0").unwrap(),
            Message::DisconnectConfirm(DisconnectConfirm {
                kind: DisconnectKind::Permanent,
                name: "anna".into(),
                role: Role::Guesser,
            })
        );
        assert!(Message::parse("LK:PERMANENT_DISCONNECT_CONFIRM:anna:2").is_err());
        assert!(Message::parse("LK:PERMANENT_DISCONNECT_CONFIRM::0").is_err());
    }

    #[test]
    fn lobby_frames() {
        assert_eq!(Message::RoomList(vec![1, 2, 3]).encode(), "LK:ROOM_LIST:1:2:3");
        assert_eq!(
            Message::parse("LK:JOIN_ROOM:anna:0:3").unwrap(),
            Message::JoinRoom {
                name: "anna".into(),
                role: Role::Guesser,
                room: 3
            }
        );
        assert_eq!(
            Message::GameStart { opponent: "bob".into() }.encode(),
            "LK:GAME_START:bob"
        );
        assert_eq!(Message::WinGame(Role::Evaluator).encode(), "LK:WIN_GAME:1");
    }

    #[test]
    fn reconnect_snapshot_layout() {
        let mut rounds = [RoundEntry::default(); MAX_ROUNDS];
        rounds[0] = RoundEntry {
            guess: Some(code_of("1111")),
            score: Some(Score { blacks: 1, whites: 0 }),
        };
        let snapshot = ReconnectSnapshot {
            round: 1,
            rounds,
            last_valid: Phase::Guessing,
            opponent: "bob".into(),
            secret: Some(code_of("1234")),
        };
        let encoded = Message::ReconnectConfirm(Box::new(snapshot.clone())).encode();
        assert_eq!(
            encoded,
            "LK:RECONNECT_CONFIRM:1:111110:666600:666600:666600:666600:666600:\
             666600:666600:666600:666600:1:bob:1234"
        );
        assert_eq!(
            Message::parse(&encoded).unwrap(),
            Message::ReconnectConfirm(Box::new(snapshot))
        );
    }

    #[test]
    fn snapshot_without_secret_uses_unset_digits() {
        let snapshot = ReconnectSnapshot {
            round: 0,
            rounds: [RoundEntry::default(); MAX_ROUNDS],
            last_valid: Phase::Choosing,
            opponent: "bob".into(),
            secret: None,
        };
        let encoded = Message::ReconnectConfirm(Box::new(snapshot)).encode();
        assert!(encoded.ends_with(":0:bob:6666"));
    }

    #[test]
    fn role_peer() {
        assert_eq!(Role::Guesser.peer(), Role::Evaluator);
        assert_eq!(Role::Evaluator.peer(), Role::Guesser);
        assert_eq!(Role::Evaluator.index(), 1);
    }
}
