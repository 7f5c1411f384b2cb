// Command codes for the post-handshake command phase

/// Commands a client can issue once the handshake is established.
///
/// The first payload byte of each client request selects one of these; the
/// rest of the payload is the command body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Quit = 0x01,
    InitDb = 0x02,
    Query = 0x03,
    FieldList = 0x04,
    StmtPrepare = 0x16,
    StmtExecute = 0x17,
    StmtSendLongData = 0x18,
    StmtClose = 0x19,
    StmtReset = 0x1a,
    SetOption = 0x1b,
}

impl Command {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Quit),
            0x02 => Some(Self::InitDb),
            0x03 => Some(Self::Query),
            0x04 => Some(Self::FieldList),
            0x16 => Some(Self::StmtPrepare),
            0x17 => Some(Self::StmtExecute),
            0x18 => Some(Self::StmtSendLongData),
            0x19 => Some(Self::StmtClose),
            0x1a => Some(Self::StmtReset),
            0x1b => Some(Self::SetOption),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}
