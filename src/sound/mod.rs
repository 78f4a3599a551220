// This file is part of nova64.
// Grounded on spec.md §4.7; module layout follows zinc64-core's
// src/sound/ split between the chip model and the file-format/player
// concerns that sit on top of it.

mod player;
mod psid;
mod sid;

pub use self::player::Player;
pub use self::psid::{parse as parse_psid, PsidHeader, PsidLoadError};
pub use self::sid::{Sid, SidAlias, REGISTER_COUNT};
