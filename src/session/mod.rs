//! The live shell session.
//!
//! A [`Shell`] binds one byte stream to one registry: bytes go in one at
//! a time through [`Shell::feed`] (or in batches through
//! [`Shell::input`]), are interpreted by the line-editing state machine,
//! and on line completion the dispatcher resolves the first token
//! against the registry, enforces the permission/user model, marshals
//! the remaining tokens for signature-typed handlers, and invokes the
//! handler.
//!
//! The engine is single-threaded and cooperative: nothing here blocks or
//! suspends, handlers run synchronously on the caller's context, and
//! Ctrl-C only discards an in-progress input line. Every dispatch error
//! is recovered — one diagnostic line is written and the shell returns
//! to accepting the next line.
//!
//! # Examples
//!
//! ```rust
//! use nanoshell::registry::{Descriptor, Registry};
//! use nanoshell::session::Shell;
//!
//! fn status(_argc: usize, _argv: &[&str]) -> i32 {
//!     0
//! }
//!
//! static TABLE: &[Descriptor] = &[
//!     Descriptor::command("status", "Show device status", status),
//! ];
//!
//! let mut shell = Shell::new(Registry::new(TABLE));
//! shell.set_output_function(|text| text.len());
//! shell.input(b"status\r");
//! ```

use core::any::Any;
use core::fmt::Write as _;

use heapless::{String, Vec};

use crate::error::Error;
use crate::history::History;
use crate::marshal::{self, ArgValue};
use crate::registry::{Descriptor, Handler, Payload, Registry};
use crate::token::{MAX_PARAMS, tokenize};

/// Capacity of the input line buffer. Bytes beyond the capacity are
/// silently ignored.
pub const MAX_LINE_LENGTH: usize = 256;

/// Capacity of the per-session companion table.
pub const MAX_COMPANIONS: usize = 4;

/// Capacity of the session path string.
pub const MAX_PATH_LENGTH: usize = 64;

// ASCII control bytes the state machine interprets.
/// ASCII end-of-text (Ctrl-C).
pub const ASCII_ETX: u8 = 0x03;
/// ASCII backspace.
pub const ASCII_BACKSPACE: u8 = 0x08;
/// ASCII horizontal tab.
pub const ASCII_TAB: u8 = 0x09;
/// ASCII line feed.
pub const ASCII_LF: u8 = 0x0A;
/// ASCII carriage return.
pub const ASCII_CR: u8 = 0x0D;
/// ASCII escape.
pub const ASCII_ESC: u8 = 0x1B;
/// ASCII delete.
pub const ASCII_DEL: u8 = 0x7F;

/// Function signature for the byte-stream read callback.
pub type ReadFn = fn(&mut [u8]) -> usize;

/// Function signature for the byte-stream write callback.
pub type WriteFn = fn(&[u8]) -> usize;

/// Function signature for the advisory lock/unlock hooks.
pub type HookFn = fn();

/// State of the byte-level input machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputState {
    /// Accumulating printable bytes.
    Normal,
    /// An ESC byte was received.
    EscapeSeen,
    /// ESC `[` was received; the next byte completes a CSI sequence.
    EscapeBracketSeen,
    /// The buffer currently shows a history entry.
    HistoryBrowsing,
    /// A completion pass is in progress.
    TabCompleting,
}

struct Companion {
    id: i32,
    obj: &'static dyn Any,
}

/// One live instance of the shell bound to a byte stream.
pub struct Shell {
    buffer: [u8; MAX_LINE_LENGTH],
    length: usize,
    cursor: usize,
    state: InputState,
    history: History,
    registry: Registry,
    user: Option<&'static Descriptor>,
    checked: bool,
    last_return: Option<i32>,
    path: String<MAX_PATH_LENGTH>,
    companions: Vec<Companion, MAX_COMPANIONS>,
    read_fn: Option<ReadFn>,
    write_fn: Option<WriteFn>,
    lock_fn: Option<HookFn>,
    unlock_fn: Option<HookFn>,
}

impl Shell {
    /// Create a session over an immutable registry.
    ///
    /// A registry that declares user accounts starts unauthenticated;
    /// one without starts authenticated.
    pub fn new(registry: Registry) -> Self {
        let has_users = registry
            .iter()
            .any(|d| matches!(d.payload, Payload::User { .. }));
        let mut path = String::new();
        let _ = path.push('/');
        Shell {
            buffer: [0; MAX_LINE_LENGTH],
            length: 0,
            cursor: 0,
            state: InputState::Normal,
            history: History::new(),
            registry,
            user: None,
            checked: !has_users,
            last_return: None,
            path,
            companions: Vec::new(),
            read_fn: None,
            write_fn: None,
            lock_fn: None,
            unlock_fn: None,
        }
    }

    /// Set the output callback. Output is dropped until one is set.
    pub fn set_output_function(&mut self, write_fn: WriteFn) {
        self.write_fn = Some(write_fn);
    }

    /// Set the input callback used by [`Shell::poll`].
    pub fn set_input_function(&mut self, read_fn: ReadFn) {
        self.read_fn = Some(read_fn);
    }

    /// Install the advisory lock/unlock pair invoked around dispatch.
    pub fn set_lock_hooks(&mut self, lock: HookFn, unlock: HookFn) {
        self.lock_fn = Some(lock);
        self.unlock_fn = Some(unlock);
    }

    /// Replace the session path shown in the prompt.
    pub fn set_path(&mut self, path: &str) {
        self.path.clear();
        let _ = self.path.push_str(path);
    }

    /// The session path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The registry this session dispatches against.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Whether authentication has passed.
    pub fn is_checked(&self) -> bool {
        self.checked
    }

    /// Name of the current user, if one is selected.
    pub fn current_user(&self) -> Option<&'static str> {
        self.user.map(|d| d.name)
    }

    /// Return value captured from the most recent handler invocation.
    pub fn last_return(&self) -> Option<i32> {
        self.last_return
    }

    /// The in-progress input line.
    pub fn current_line(&self) -> &str {
        core::str::from_utf8(&self.buffer[..self.length]).unwrap_or("")
    }

    /// Current input machine state.
    pub fn input_state(&self) -> InputState {
        self.state
    }

    // ------------------------------------------------------------------
    // Companion table
    // ------------------------------------------------------------------

    /// Associate an opaque collaborator handle with a small integer id.
    ///
    /// An existing association for the same id is replaced. The session
    /// never owns the referenced object, only the association.
    pub fn companion_add(&mut self, id: i32, obj: &'static dyn Any) -> Result<(), Error> {
        if let Some(entry) = self.companions.iter_mut().find(|c| c.id == id) {
            entry.obj = obj;
            return Ok(());
        }
        self.companions
            .push(Companion { id, obj })
            .map_err(|_| Error::Allocation)
    }

    /// Remove an association. Returns whether one existed.
    pub fn companion_remove(&mut self, id: i32) -> bool {
        let before = self.companions.len();
        self.companions.retain(|c| c.id != id);
        self.companions.len() != before
    }

    /// Fetch the handle associated with `id`.
    pub fn companion_get(&self, id: i32) -> Option<&'static dyn Any> {
        self.companions.iter().find(|c| c.id == id).map(|c| c.obj)
    }

    // ------------------------------------------------------------------
    // Byte input
    // ------------------------------------------------------------------

    /// Feed a batch of received bytes through the state machine.
    pub fn input(&mut self, data: &[u8]) {
        for &byte in data {
            self.feed(byte);
        }
    }

    /// Pull bytes from the read callback and feed them. Returns the
    /// number of bytes consumed.
    pub fn poll(&mut self) -> usize {
        let Some(read_fn) = self.read_fn else {
            return 0;
        };
        let mut chunk = [0u8; 16];
        let count = read_fn(&mut chunk).min(chunk.len());
        for &byte in &chunk[..count] {
            self.feed(byte);
        }
        count
    }

    /// Feed one received byte through the state machine.
    ///
    /// Registered key descriptors take precedence over the built-in
    /// handling, both for single bytes and for completed `ESC [`
    /// sequences.
    pub fn feed(&mut self, byte: u8) {
        match self.state {
            InputState::EscapeSeen => {
                if byte == b'[' {
                    self.state = InputState::EscapeBracketSeen;
                } else {
                    self.state = InputState::Normal;
                    self.run_key((u32::from(ASCII_ESC) << 8) | u32::from(byte));
                }
            }
            InputState::EscapeBracketSeen => {
                self.state = InputState::Normal;
                let code = 0x1B_5B_00 | u32::from(byte);
                if self.run_key(code) {
                    return;
                }
                match byte {
                    b'A' => self.history_step(-1),
                    b'B' => self.history_step(1),
                    b'C' => self.cursor_right(),
                    b'D' => self.cursor_left(),
                    _ => {}
                }
            }
            _ => {
                if self.run_key(u32::from(byte)) {
                    return;
                }
                match byte {
                    ASCII_ESC => self.state = InputState::EscapeSeen,
                    ASCII_CR | ASCII_LF => self.complete_line(),
                    ASCII_ETX => self.cancel_line(),
                    ASCII_TAB => self.complete_token(),
                    ASCII_BACKSPACE | ASCII_DEL => self.rub_out(),
                    0x20..=0x7E => self.insert(byte),
                    _ => {}
                }
            }
        }
    }

    fn run_key(&mut self, code: u32) -> bool {
        let Some(descriptor) = self.registry.lookup_key(code) else {
            return false;
        };
        if let Payload::Key { handler, .. } = descriptor.payload {
            handler(self);
            return true;
        }
        false
    }

    fn insert(&mut self, byte: u8) {
        // Overflow is silently ignored; the transport sees no error.
        if self.length >= MAX_LINE_LENGTH {
            return;
        }
        self.buffer
            .copy_within(self.cursor..self.length, self.cursor + 1);
        self.buffer[self.cursor] = byte;
        self.length += 1;
        self.cursor += 1;
        if !self.awaiting_password() {
            self.write_bytes_at(self.cursor - 1);
            self.backspaces(self.length - self.cursor);
        }
    }

    fn rub_out(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.buffer
            .copy_within(self.cursor..self.length, self.cursor - 1);
        self.cursor -= 1;
        self.length -= 1;
        if !self.awaiting_password() {
            self.write_str("\x08");
            self.write_bytes_at(self.cursor);
            self.write_str(" ");
            self.backspaces(self.length - self.cursor + 1);
        }
    }

    fn cursor_left(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.write_str("\x08");
        }
    }

    fn cursor_right(&mut self) {
        if self.cursor < self.length {
            let byte = [self.buffer[self.cursor]];
            self.write_bytes(&byte);
            self.cursor += 1;
        }
    }

    fn history_step(&mut self, delta: i16) {
        let before = self.history.offset();
        let mut replacement: String<MAX_LINE_LENGTH> = String::new();
        if let Some(line) = self.history.navigate(delta) {
            let _ = replacement.push_str(line);
        }
        if self.history.offset() == before {
            return;
        }
        self.replace_line(&replacement);
        self.state = if self.history.offset() != 0 {
            InputState::HistoryBrowsing
        } else {
            InputState::Normal
        };
    }

    /// Erase the displayed line and show `line` instead.
    fn replace_line(&mut self, line: &str) {
        self.write_bytes_at(self.cursor);
        for _ in 0..self.length {
            self.write_str("\x08 \x08");
        }
        let bytes = line.as_bytes();
        let take = bytes.len().min(MAX_LINE_LENGTH);
        self.buffer[..take].copy_from_slice(&bytes[..take]);
        self.length = take;
        self.cursor = take;
        self.write_bytes_at(0);
    }

    fn complete_token(&mut self) {
        self.state = InputState::TabCompleting;
        let mut prefix: String<MAX_LINE_LENGTH> = String::new();
        let _ = prefix.push_str(self.current_line());

        let registry = self.registry;
        let count = registry.complete(&prefix).count();
        if count == 1 {
            let name = registry.complete(&prefix).next().map(|d| d.name).unwrap_or("");
            self.replace_line(name);
        } else if count > 1 {
            self.write_str("\r\n");
            for descriptor in registry.complete(&prefix) {
                self.write_str(descriptor.name);
                self.write_str("\r\n");
            }
            self.write_prompt();
            self.write_bytes_at(0);
        }
        self.state = InputState::Normal;
    }

    fn complete_line(&mut self) {
        self.write_str("\r\n");
        let mut line: String<MAX_LINE_LENGTH> = String::new();
        let _ = line.push_str(self.current_line());
        self.length = 0;
        self.cursor = 0;
        self.state = InputState::Normal;

        if self.awaiting_password() {
            self.check_password(&line);
        } else {
            self.history.push(&line);
            self.run_line(&line);
        }
        self.write_prompt();
    }

    fn cancel_line(&mut self) {
        self.length = 0;
        self.cursor = 0;
        self.state = InputState::Normal;
        self.history.reset_offset();
        self.write_str("\r\n");
        self.write_prompt();
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Dispatch one complete line programmatically, bypassing the input
    /// state machine. Returns the handler's return value when one ran.
    pub fn execute(&mut self, line: &str) -> Option<i32> {
        self.last_return = None;
        self.run_line(line);
        self.last_return
    }

    fn run_line(&mut self, line: &str) {
        self.hook_lock();
        let tokens = tokenize(line);
        if let Some(&name) = tokens.first() {
            match self.registry.lookup(name, 0) {
                Some(descriptor) => self.run_descriptor(descriptor, &tokens),
                None => {
                    if !self.run_builtin(&tokens) {
                        let _ = write!(self.out(), "Command not found: {}\r\n", name);
                    }
                }
            }
        }
        self.hook_unlock();
    }

    fn run_descriptor(&mut self, descriptor: &'static Descriptor, tokens: &[&str]) {
        if let Payload::User { password } = descriptor.payload {
            self.login(descriptor, password);
            return;
        }
        if !self.permitted(descriptor) {
            self.write_str("Permission denied\r\n");
            return;
        }
        match &descriptor.payload {
            Payload::Command(handler) => self.invoke(descriptor, handler, tokens),
            Payload::Variable(var) => {
                match var.as_str() {
                    Some(text) => {
                        let _ = write!(self.out(), "{} = \"{}\"\r\n", descriptor.name, text);
                    }
                    None => {
                        let word = var.word().unwrap_or(0);
                        let _ = write!(
                            self.out(),
                            "{} = {}, 0x{:08x}\r\n",
                            descriptor.name,
                            word as i64,
                            word
                        );
                        self.last_return = Some(word as i32);
                    }
                }
            }
            Payload::Key { .. } | Payload::User { .. } => {}
        }
    }

    fn invoke(&mut self, descriptor: &'static Descriptor, handler: &Handler, tokens: &[&str]) {
        let ret = match handler {
            Handler::Main(func) => func(tokens.len(), tokens),
            Handler::Typed { func, signature } => {
                if tokens.len() - 1 != signature.len() {
                    let _ = write!(
                        self.out(),
                        "Parameter count mismatch: expected {}, got {}\r\n",
                        signature.len(),
                        tokens.len() - 1
                    );
                    return;
                }
                let mut args: Vec<ArgValue, MAX_PARAMS> = Vec::new();
                for (index, (&token, &ty)) in tokens[1..].iter().zip(signature.iter()).enumerate() {
                    match marshal::parse(token, ty, &self.registry) {
                        Ok(value) => {
                            let _ = args.push(value);
                        }
                        Err(Error::Allocation) => {
                            let _ = write!(
                                self.out(),
                                "Cannot allocate parameter {}\r\n",
                                index + 1
                            );
                            return;
                        }
                        Err(_) => {
                            let _ = write!(
                                self.out(),
                                "Cannot parse parameter {} as {:?}\r\n",
                                index + 1,
                                ty
                            );
                            return;
                        }
                    }
                }
                func(&args)
            }
        };
        self.last_return = Some(ret);
        if !descriptor.flags.disable_return {
            let _ = write!(self.out(), "Return: {}, 0x{:08x}\r\n", ret, ret);
        }
    }

    fn permitted(&self, descriptor: &Descriptor) -> bool {
        if descriptor.flags.enable_unchecked {
            return true;
        }
        if !self.checked {
            return false;
        }
        if descriptor.permission == 0 {
            return true;
        }
        match self.user {
            Some(user) => user.permission >= descriptor.permission,
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------

    fn login(&mut self, descriptor: &'static Descriptor, password: &'static str) {
        self.user = Some(descriptor);
        self.checked = password.is_empty();
    }

    fn awaiting_password(&self) -> bool {
        if self.checked {
            return false;
        }
        matches!(
            self.user.map(|d| &d.payload),
            Some(Payload::User { password }) if !password.is_empty()
        )
    }

    fn check_password(&mut self, line: &str) {
        let expected = match self.user.map(|d| &d.payload) {
            Some(Payload::User { password }) => *password,
            _ => "",
        };
        if line == expected {
            self.checked = true;
        } else {
            self.write_str("Wrong password\r\n");
        }
    }

    // ------------------------------------------------------------------
    // Built-in commands
    // ------------------------------------------------------------------

    fn run_builtin(&mut self, tokens: &[&str]) -> bool {
        let name = tokens[0];
        if !matches!(
            name,
            "help" | "cmds" | "vars" | "users" | "keys" | "setvar" | "clear"
        ) {
            return false;
        }
        if !self.checked {
            self.write_str("Permission denied\r\n");
            return true;
        }
        match name {
            "help" => {
                self.list_commands();
                self.list_vars();
                self.list_users();
                self.list_keys();
            }
            "cmds" => self.list_commands(),
            "vars" => self.list_vars(),
            "users" => self.list_users(),
            "keys" => self.list_keys(),
            "setvar" => self.set_var(tokens),
            "clear" => self.write_str("\x1b[2J\x1b[1H"),
            _ => {}
        }
        true
    }

    fn list_commands(&self) {
        self.write_str("Command List:\r\n");
        for descriptor in self.registry.iter() {
            if matches!(descriptor.payload, Payload::Command(_)) {
                let _ = write!(self.out(), "{:<16} {}\r\n", descriptor.name, descriptor.desc);
            }
        }
    }

    fn list_vars(&self) {
        self.write_str("Variable List:\r\n");
        for descriptor in self.registry.iter() {
            if let Payload::Variable(var) = &descriptor.payload {
                match var.as_str() {
                    Some(text) => {
                        let _ = write!(
                            self.out(),
                            "{:<16} \"{}\"  {}\r\n",
                            descriptor.name,
                            text,
                            descriptor.desc
                        );
                    }
                    None => {
                        let _ = write!(
                            self.out(),
                            "{:<16} {}  {}\r\n",
                            descriptor.name,
                            var.word().unwrap_or(0) as i64,
                            descriptor.desc
                        );
                    }
                }
            }
        }
    }

    fn list_users(&self) {
        self.write_str("User List:\r\n");
        for descriptor in self.registry.iter() {
            if matches!(descriptor.payload, Payload::User { .. }) {
                let _ = write!(self.out(), "{:<16} {}\r\n", descriptor.name, descriptor.desc);
            }
        }
    }

    fn list_keys(&self) {
        self.write_str("Key List:\r\n");
        for descriptor in self.registry.iter() {
            if let Payload::Key { code, .. } = descriptor.payload {
                let _ = write!(self.out(), "0x{:08x}  {}\r\n", code, descriptor.desc);
            }
        }
    }

    fn set_var(&mut self, tokens: &[&str]) {
        if tokens.len() != 3 {
            self.write_str("Usage: setvar [name] [value]\r\n");
            return;
        }
        let Some(descriptor) = self.registry.lookup(tokens[1], 0) else {
            let _ = write!(self.out(), "Variable not found: {}\r\n", tokens[1]);
            return;
        };
        let Payload::Variable(var) = &descriptor.payload else {
            let _ = write!(self.out(), "Variable not found: {}\r\n", tokens[1]);
            return;
        };
        if descriptor.flags.read_only {
            let _ = write!(self.out(), "{} is read only\r\n", descriptor.name);
            return;
        }
        let word = match marshal::parse_auto(tokens[2], &self.registry) {
            Ok(value) => match value.as_word() {
                Some(word) => word,
                None => {
                    let _ = write!(self.out(), "Cannot parse value: {}\r\n", tokens[2]);
                    return;
                }
            },
            Err(_) => {
                let _ = write!(self.out(), "Cannot parse value: {}\r\n", tokens[2]);
                return;
            }
        };
        if !var.set_word(word as usize) {
            let _ = write!(self.out(), "Cannot set {}\r\n", descriptor.name);
        }
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// Write the prompt for the current session state.
    pub fn write_prompt(&self) {
        if self.awaiting_password() {
            self.write_str("Please input password:");
            return;
        }
        let user = self.user.map(|d| d.name).unwrap_or("nanoshell");
        let _ = write!(self.out(), "{}:{}$ ", user, self.path);
    }

    /// Write raw bytes to the session output.
    pub fn write_bytes(&self, data: &[u8]) {
        let Some(write_fn) = self.write_fn else {
            return;
        };
        let mut offset = 0;
        while offset < data.len() {
            let written = write_fn(&data[offset..]);
            if written == 0 {
                break;
            }
            offset += written;
        }
    }

    /// Write a string to the session output.
    pub fn write_str(&self, text: &str) {
        self.write_bytes(text.as_bytes());
    }

    fn write_bytes_at(&self, from: usize) {
        if from < self.length {
            self.write_bytes(&self.buffer[from..self.length]);
        }
    }

    fn backspaces(&self, count: usize) {
        for _ in 0..count {
            self.write_str("\x08");
        }
    }

    fn out(&self) -> OutWriter {
        OutWriter(self.write_fn)
    }

    fn hook_lock(&self) {
        if let Some(lock) = self.lock_fn {
            lock();
        }
    }

    fn hook_unlock(&self) {
        if let Some(unlock) = self.unlock_fn {
            unlock();
        }
    }
}

impl core::fmt::Debug for Shell {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Shell")
            .field("length", &self.length)
            .field("cursor", &self.cursor)
            .field("state", &self.state)
            .field("checked", &self.checked)
            .field("user", &self.user.map(|d| d.name))
            .finish()
    }
}

/// Adapter from `core::fmt` onto the session write callback.
struct OutWriter(Option<WriteFn>);

impl core::fmt::Write for OutWriter {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        if let Some(write_fn) = self.0 {
            let data = s.as_bytes();
            let mut offset = 0;
            while offset < data.len() {
                let written = write_fn(&data[offset..]);
                if written == 0 {
                    break;
                }
                offset += written;
            }
        }
        Ok(())
    }
}
