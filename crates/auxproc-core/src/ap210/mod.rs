//! File/pipe record-I/O processor (AP210).
//!
//! Serves coupled pairs of one control variable (name class `C…`) and
//! one data variable (name class `D…`). Writing the control variable
//! while the pair is unbound carries a textual open command; while
//! bound it carries a numeric sub-command operating on the data
//! variable. Each pair's open handle lives in a context shared by both
//! slots through back-references into an arena; detaching closes the
//! handle and clears both references in one step.

pub mod command;
pub mod record;

use std::collections::HashMap;

use auxproc_cdr::{CdrError, ElemType, HEADER_LEN, Record};
use tracing::{debug, warn};

use crate::error::{ApError, fatal};
use crate::processor::{Processor, ProcessorKind, value_of};
use crate::registry::{ContextId, CoupledVar, Registry, SvarKey};
use crate::store::{CoordStore, Discipline};
use crate::status;

use command::OpenCommand;
use record::{Direction, RecordFile, RecordIoError};

/// Name class of a variable serviced by this processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Control,
    Data,
}

/// First letter of control-variable names.
const CONTROL_LETTER: char = 'C';
/// First letter of data-variable names.
const DATA_LETTER: char = 'D';

fn role_of(name: &str) -> Option<Role> {
    if name.len() < 2 {
        return None;
    }
    match name.chars().next() {
        Some(CONTROL_LETTER) => Some(Role::Control),
        Some(DATA_LETTER) => Some(Role::Data),
        _ => None,
    }
}

/// Sub-command opcodes. Only the variable-length pair is implemented;
/// the fixed/direct family and the CR/LF-stripped read are reported as
/// invalid sub-commands.
const OP_READ_FIXED: i64 = 0;
const OP_WRITE_FIXED: i64 = 1;
const OP_READ_DIRECT: i64 = 2;
const OP_WRITE_DIRECT: i64 = 3;
const OP_READ_VARIABLE: i64 = 4;
const OP_WRITE_VARIABLE: i64 = 5;
const OP_READ_STRIPPED: i64 = 6;

/// Per-pair context: the open handle plus bookkeeping, jointly
/// referenced by the control and data slots.
#[derive(Debug)]
struct FileContext {
    file: RecordFile,
    dir: Direction,
    /// Nominal record size; settable by sub-commands, used by the
    /// unsupported fixed-length opcodes.
    record_size: u32,
    control: SvarKey,
    data: SvarKey,
}

/// The AP210-like record processor.
pub struct RecordProcessor {
    identity: String,
    contexts: HashMap<u32, FileContext>,
    next_context: u32,
}

impl RecordProcessor {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            contexts: HashMap::new(),
            next_context: 0,
        }
    }

    /// Bind a freshly opened handle to a pair, cross-referencing both
    /// slots.
    fn bind(
        &mut self,
        registry: &mut Registry,
        control: SvarKey,
        data: SvarKey,
        file: RecordFile,
        dir: Direction,
    ) -> ContextId {
        let id = ContextId(self.next_context);
        self.next_context += 1;
        self.contexts.insert(
            id.0,
            FileContext {
                file,
                dir,
                record_size: 0,
                control,
                data,
            },
        );
        match registry.get_mut(control) {
            Some(var) => var.context = Some(id),
            None => fatal("binding a context to a missing control variable"),
        }
        match registry.get_mut(data) {
            Some(var) => var.context = Some(id),
            None => fatal("binding a context to a missing data variable"),
        }
        debug!(%control, %data, id = id.0, "pair bound");
        id
    }

    /// Close the handle and clear both back-references. Nothing is ever
    /// observed half-detached; callers see one atomic step.
    fn detach(&mut self, registry: &mut Registry, id: ContextId) {
        let Some(ctx) = self.contexts.remove(&id.0) else {
            return;
        };
        for key in [ctx.control, ctx.data] {
            if let Some(var) = registry.get_mut(key) {
                var.context = None;
            }
        }
        debug!(control = %ctx.control, data = %ctx.data, "pair detached");
        // Dropping ctx closes the handle.
    }

    fn control_write(
        &mut self,
        registry: &mut Registry,
        ckey: SvarKey,
        bytes: Vec<u8>,
        store: &mut dyn CoordStore,
    ) -> Result<i32, ApError> {
        let (code, touched) = if bytes.len() < HEADER_LEN {
            warn!(%ckey, len = bytes.len(), "control record shorter than header");
            (status::TOO_SHORT, None)
        } else {
            match registry.get_mut(ckey) {
                Some(var) => var.set_value(bytes.clone()),
                None => return Err(ApError::UnknownKey(ckey)),
            }
            self.run_control(registry, ckey, &bytes, store)
        };

        // A response is always written: the ack replaces the command and
        // the control variable's unread flag clears. The data variable's
        // flag clears only when the sub-command actually touched it.
        let var = registry.get_mut(ckey).ok_or(ApError::UnknownKey(ckey))?;
        var.set_value(Record::ack(code).into_bytes());
        store.set_state(ckey, false, &self.identity);
        if let Some(dkey) = touched {
            store.set_state(dkey, false, &self.identity);
        }
        Ok(code)
    }

    fn run_control(
        &mut self,
        registry: &mut Registry,
        ckey: SvarKey,
        bytes: &[u8],
        store: &mut dyn CoordStore,
    ) -> (i32, Option<SvarKey>) {
        let record = match Record::decode(bytes) {
            Ok(record) => record,
            Err(CdrError::BadRank(rank)) => {
                warn!(%ckey, rank, "control record has unsupported rank");
                return (status::BAD_RANK, None);
            }
            Err(CdrError::BadType(tag)) => {
                warn!(%ckey, tag, "control record has an unknown element type");
                return (status::BAD_TYPE, None);
            }
            Err(e) => {
                warn!(%ckey, error = %e, "control record failed to decode");
                return (status::BAD_RECORD, None);
            }
        };

        let bound = registry.get(ckey).and_then(|var| var.context);
        match bound {
            None => {
                if record.elem_type() == ElemType::Char {
                    match record.text() {
                        Ok(line) => self.handle_open(registry, ckey, &line, store),
                        Err(_) => (status::BAD_TYPE, None),
                    }
                } else {
                    // A bound-state sub-command while unbound.
                    warn!(%ckey, "numeric sub-command with no open handle");
                    (status::INVALID_SUBCOMMAND, None)
                }
            }
            Some(id) => {
                if record.elem_type() == ElemType::Char {
                    warn!(%ckey, "character record while bound");
                    (status::BAD_TYPE, None)
                } else {
                    self.handle_subcommand(registry, id, &record)
                }
            }
        }
    }

    fn handle_open(
        &mut self,
        registry: &mut Registry,
        ckey: SvarKey,
        line: &str,
        store: &mut dyn CoordStore,
    ) -> (i32, Option<SvarKey>) {
        let cmd = match command::parse(line) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!(%ckey, line, error = %e, "bad open command");
                return (status::BAD_COMMAND, None);
            }
        };

        match cmd {
            OpenCommand::Delete { path } => {
                let code = match std::fs::remove_file(&path) {
                    Ok(()) => status::OK,
                    Err(e) => errno_status(&e),
                };
                debug!(%ckey, path = %path.display(), code, "delete");
                (code, None)
            }
            OpenCommand::Rename { from, to } => {
                let code = match std::fs::rename(&from, &to) {
                    Ok(()) => status::OK,
                    Err(e) => errno_status(&e),
                };
                debug!(%ckey, from = %from.display(), to = %to.display(), code, "rename");
                (code, None)
            }
            OpenCommand::OpenFile { dir, path, format } => {
                let Some(dkey) = self.pairing(registry, ckey, store) else {
                    return (status::NOT_PAIRED, None);
                };
                match dir {
                    Direction::Read => match record::open_file_read(&path) {
                        Ok((file, size)) => {
                            self.bind(registry, ckey, dkey, RecordFile::new(file, format, true), dir);
                            // Report the byte size through the data
                            // variable's acknowledgement.
                            match registry.get_mut(dkey) {
                                Some(var) => {
                                    var.set_value(Record::ack(size as i32).into_bytes());
                                }
                                None => fatal("data variable vanished during open"),
                            }
                            (status::OK, Some(dkey))
                        }
                        Err(e) => (errno_status(&e), None),
                    },
                    Direction::Write => match record::open_file_write(&path) {
                        Ok(file) => {
                            self.bind(registry, ckey, dkey, RecordFile::new(file, format, true), dir);
                            (status::OK, None)
                        }
                        Err(e) => (errno_status(&e), None),
                    },
                }
            }
            OpenCommand::OpenPipe { dir, path, format } => {
                let Some(dkey) = self.pairing(registry, ckey, store) else {
                    return (status::NOT_PAIRED, None);
                };
                match record::open_pipe(&path, dir) {
                    Ok(file) => {
                        self.bind(registry, ckey, dkey, RecordFile::new(file, format, false), dir);
                        (status::OK, None)
                    }
                    Err(e) => (errno_status(&e), None),
                }
            }
        }
    }

    /// The registered data variable this control variable pairs with.
    fn pairing(
        &self,
        registry: &Registry,
        ckey: SvarKey,
        store: &mut dyn CoordStore,
    ) -> Option<SvarKey> {
        let dkey = store.find_pairing_key(ckey)?;
        if registry.contains(dkey) {
            Some(dkey)
        } else {
            warn!(%ckey, %dkey, "pairing key is not coupled here");
            None
        }
    }

    fn handle_subcommand(
        &mut self,
        registry: &mut Registry,
        id: ContextId,
        record: &Record,
    ) -> (i32, Option<SvarKey>) {
        // Zero elements closes the handle and unbinds the pair.
        if record.nelm() == 0 {
            self.detach(registry, id);
            return (status::OK, None);
        }

        let nums = match record.numbers() {
            Ok(nums) => nums,
            Err(_) => return (status::BAD_TYPE, None),
        };
        if nums.len() > 3 {
            return (status::INVALID_SUBCOMMAND, None);
        }

        let Some(ctx) = self.contexts.get_mut(&id.0) else {
            fatal("variable references a context that does not exist");
        };
        let opcode = nums[0];
        let recno = nums.get(1).map(|&n| n as u64);
        if let Some(&size) = nums.get(2) {
            ctx.record_size = size as u32;
        }

        match opcode {
            OP_READ_VARIABLE => {
                if ctx.dir != Direction::Read {
                    warn!(opcode, "read sub-command on a write handle");
                    return (status::INVALID_SUBCOMMAND, None);
                }
                let target = recno.unwrap_or_else(|| ctx.file.next_record());
                if let Err(e) = ctx.file.seek_to(target) {
                    return (record_status(&e), None);
                }
                match ctx.file.read_record() {
                    Ok(rec) => {
                        let dkey = ctx.data;
                        match registry.get_mut(dkey) {
                            Some(var) => var.set_value(rec.into_bytes()),
                            None => fatal("context exists without its data variable"),
                        }
                        (status::OK, Some(dkey))
                    }
                    Err(e) => (record_status(&e), None),
                }
            }
            OP_WRITE_VARIABLE => {
                if ctx.dir != Direction::Write {
                    warn!(opcode, "write sub-command on a read handle");
                    return (status::INVALID_SUBCOMMAND, None);
                }
                let target = recno.unwrap_or_else(|| ctx.file.next_record());
                if let Err(e) = ctx.file.seek_to(target) {
                    return (record_status(&e), None);
                }
                let dkey = ctx.data;
                let bytes = match registry.get_mut(dkey) {
                    Some(var) => var.take_value(),
                    None => fatal("context exists without its data variable"),
                };
                let Some(bytes) = bytes else {
                    return (status::NO_VALUE, None);
                };
                match ctx.file.write_record(&bytes) {
                    Ok(()) => (status::OK, Some(dkey)),
                    Err(e) => (record_status(&e), Some(dkey)),
                }
            }
            OP_READ_FIXED | OP_WRITE_FIXED | OP_READ_DIRECT | OP_WRITE_DIRECT
            | OP_READ_STRIPPED => {
                debug!(opcode, "unsupported sub-command opcode");
                (status::INVALID_SUBCOMMAND, None)
            }
            _ => {
                warn!(opcode, "unknown sub-command opcode");
                (status::INVALID_SUBCOMMAND, None)
            }
        }
    }
}

impl Processor for RecordProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Record
    }

    fn accepts(&self, name: &str) -> bool {
        role_of(name).is_some()
    }

    fn initialize(
        &mut self,
        var: &mut CoupledVar,
        store: &mut dyn CoordStore,
    ) -> Result<(), ApError> {
        if role_of(var.name()) == Some(Role::Control) {
            store.set_control(var.key(), Discipline::SingleAssign);
        }
        Ok(())
    }

    fn make_counter_offer(&mut self, _key: SvarKey, _store: &mut dyn CoordStore) -> bool {
        true
    }

    fn assign_value(
        &mut self,
        registry: &mut Registry,
        key: SvarKey,
        bytes: Vec<u8>,
        store: &mut dyn CoordStore,
    ) -> Result<i32, ApError> {
        let role = {
            let var = registry.get(key).ok_or(ApError::UnknownKey(key))?;
            role_of(var.name())
        };
        match role {
            Some(Role::Control) => self.control_write(registry, key, bytes, store),
            Some(Role::Data) => {
                let var = registry.get_mut(key).ok_or(ApError::UnknownKey(key))?;
                if bytes.len() < HEADER_LEN {
                    warn!(%key, len = bytes.len(), "data record shorter than header");
                    return Ok(status::TOO_SHORT);
                }
                var.set_value(bytes);
                store.set_state(key, true, &self.identity);
                Ok(status::OK)
            }
            None => {
                warn!(%key, "variable name outside the control/data classes");
                Ok(status::BAD_COMMAND)
            }
        }
    }

    fn get_value(&self, registry: &Registry, key: SvarKey) -> Result<Vec<u8>, ApError> {
        value_of(registry, key)
    }

    fn retract(&mut self, registry: &mut Registry, key: SvarKey) {
        let context = registry.get(key).and_then(|var| var.context);
        if let Some(id) = context {
            self.detach(registry, id);
        }
    }
}

fn errno_status(e: &std::io::Error) -> i32 {
    e.raw_os_error().unwrap_or(libc::EIO)
}

fn record_status(e: &RecordIoError) -> i32 {
    match e {
        RecordIoError::Truncated => status::TRUNCATED,
        RecordIoError::Partial => status::PARTIAL_WRITE,
        RecordIoError::Unseekable => status::INVALID_SUBCOMMAND,
        RecordIoError::BadRecord => status::BAD_RECORD,
        RecordIoError::WrongType => status::BAD_TYPE,
        RecordIoError::Io(io) => errno_status(io),
    }
}
