//! Control-request front end.
//!
//! Decodes ioctl-style command numbers, validates request buffers against
//! their declared sizes, drives the [`Table`], and copies results out. This
//! layer, not the table, is where requests are logged and where table errors
//! become negative errno values.

use crate::entry::Entry;
use crate::error::TableError;
use crate::table::Table;
use log::{debug, info, log, warn, Level};

/// ioctl type byte shared by every command.
pub const IOC_MAGIC: u8 = b'k';

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;
const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

/// `_IOWR(IOC_MAGIC, nr, <pointer>)`: the argument is a pointer to the
/// request block, so the encoded size is the pointer width.
const fn iowr(nr: u8) -> u32 {
    ((IOC_READ | IOC_WRITE) << IOC_DIRSHIFT)
        | ((core::mem::size_of::<usize>() as u32) << IOC_SIZESHIFT)
        | ((IOC_MAGIC as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Command {
    Insert,
    Lookup,
    Remove,
    Dump,
}

impl Command {
    pub const INSERT: u32 = iowr(b'i');
    pub const LOOKUP: u32 = iowr(b'l');
    pub const REMOVE: u32 = iowr(b'r');
    pub const DUMP: u32 = iowr(b'd');

    pub const fn code(self) -> u32 {
        match self {
            Command::Insert => Self::INSERT,
            Command::Lookup => Self::LOOKUP,
            Command::Remove => Self::REMOVE,
            Command::Dump => Self::DUMP,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            Self::INSERT => Some(Command::Insert),
            Self::LOOKUP => Some(Command::Lookup),
            Self::REMOVE => Some(Command::Remove),
            Self::DUMP => Some(Command::Dump),
            _ => None,
        }
    }
}

/// Buffers of one control request, each with the size its sender declared.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Request {
    pub key: Vec<u8>,
    pub key_size: usize,
    pub value: Vec<u8>,
    pub value_size: usize,
}

impl Request {
    pub fn for_key(key: impl Into<Vec<u8>>) -> Self {
        let key = key.into();
        Self {
            key_size: key.len(),
            key,
            ..Self::default()
        }
    }

    pub fn key_value(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        let value = value.into();
        Self {
            value_size: value.len(),
            value,
            ..Self::for_key(key)
        }
    }

    /// Cut each buffer to its declared size. A declared size larger than the
    /// buffer it describes is rejected.
    fn into_checked(mut self) -> Result<Self, ControlError> {
        for (name, buf, size) in [
            ("key", &mut self.key, self.key_size),
            ("value", &mut self.value, self.value_size),
        ] {
            if size > buf.len() {
                return Err(ControlError::SizeMismatch {
                    field: name,
                    declared: size,
                    actual: buf.len(),
                });
            }
            buf.truncate(size);
        }
        Ok(self)
    }
}

/// Outcome of a successful request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reply {
    /// The value was stored; `replaced` holds the value it superseded.
    Stored { replaced: Option<Vec<u8>> },
    /// A copy of the value stored under the requested key.
    Value(Vec<u8>),
    /// The entry that was detached from the table.
    Removed(Entry),
    /// Copies of all entries, in bucket order.
    Entries(Vec<Entry>),
}

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("unknown control command {0:#x}")]
    UnknownCommand(u32),

    #[error("{field} size {declared} exceeds its {actual}-byte buffer")]
    SizeMismatch {
        field: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error(transparent)]
    Table(#[from] TableError),
}

const ENOENT: i32 = 2;
const ENOMEM: i32 = 12;
const EBUSY: i32 = 16;
const ENODEV: i32 = 19;
const EINVAL: i32 = 22;
const ENOTTY: i32 = 25;

impl ControlError {
    /// Negative errno for the control transport.
    pub fn errno(&self) -> i32 {
        let errno = match self {
            ControlError::UnknownCommand(_) => ENOTTY,
            ControlError::SizeMismatch { .. } => EINVAL,
            ControlError::Table(TableError::Uninitialized) => ENODEV,
            ControlError::Table(TableError::AlreadyInitialized) => EBUSY,
            ControlError::Table(TableError::OutOfMemory) => ENOMEM,
            ControlError::Table(TableError::NotFound) => ENOENT,
        };
        -errno
    }

    /// Level a failed request is logged at. A missing key is a routine
    /// outcome, not a fault.
    pub fn log_level(&self) -> Level {
        match self {
            ControlError::Table(TableError::NotFound) => Level::Info,
            _ => Level::Warn,
        }
    }
}

/// Decode `code` and run the request against `table`.
pub fn dispatch(table: &Table, code: u32, request: Request) -> Result<Reply, ControlError> {
    let Some(command) = Command::from_code(code) else {
        warn!("rejecting unknown control command {code:#x}");
        return Err(ControlError::UnknownCommand(code));
    };
    let result = request
        .into_checked()
        .and_then(|request| execute(table, command, request));
    if let Err(e) = &result {
        log!(e.log_level(), "{command:?} failed: {e}");
    }
    result
}

/// Run an already decoded and validated request.
pub fn execute(table: &Table, command: Command, request: Request) -> Result<Reply, ControlError> {
    let key = request.key.escape_ascii().to_string();
    debug!("{command:?} request, key \"{key}\"");
    match command {
        Command::Insert => {
            let entry = Entry::with_sizes(
                request.key,
                request.key_size,
                request.value,
                request.value_size,
            );
            let replaced = table.insert(entry).map_err(|e| e.error)?;
            if replaced.is_some() {
                info!("updated entry with key \"{key}\"");
            } else {
                info!("inserted entry with key \"{key}\"");
            }
            Ok(Reply::Stored { replaced })
        }
        Command::Lookup => {
            let entry = table.lookup(&request.key)?;
            info!(
                "lookup of key \"{key}\" returned {} bytes",
                entry.value.len()
            );
            Ok(Reply::Value(entry.value.clone()))
        }
        Command::Remove => {
            let entry = table.remove(&request.key)?;
            info!("removed entry with key \"{key}\"");
            Ok(Reply::Removed(entry))
        }
        Command::Dump => {
            let dump = table.dump()?;
            let entries: Vec<Entry> = dump.iter().cloned().collect();
            info!("dumped {} entries", entries.len());
            Ok(Reply::Entries(entries))
        }
    }
}
