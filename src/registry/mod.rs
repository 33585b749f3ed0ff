//! Descriptor registry for commands, variables, key bindings, and users.
//!
//! The registry is an ordered, immutable collection of [`Descriptor`]
//! records supplied at construction time. Applications assemble the table
//! as a plain `static` slice and hand it to [`Registry::new`]; nothing is
//! registered afterwards, which makes the table safe for unsynchronized
//! concurrent reads across multiple sessions.
//!
//! Lookup comes in two disjoint namespaces:
//!
//! - [`Registry::lookup`] matches commands, variables, and users by name,
//!   either exactly or by a configurable prefix length.
//! - [`Registry::lookup_key`] matches key bindings by their numeric key
//!   code. Key descriptors never participate in name lookup.
//!
//! # Examples
//!
//! ```rust
//! use nanoshell::registry::{Descriptor, Registry};
//!
//! fn reboot(_argc: usize, _argv: &[&str]) -> i32 {
//!     0
//! }
//!
//! static TABLE: &[Descriptor] = &[
//!     Descriptor::command("reboot", "Restart the device", reboot),
//! ];
//!
//! let registry = Registry::new(TABLE);
//! assert!(registry.lookup("reboot", 0).is_some());
//! assert!(registry.lookup("reboo", 0).is_none());
//! assert!(registry.lookup("re", 2).is_some());
//! ```

use core::sync::atomic::{AtomicI8, AtomicI16, AtomicI32, AtomicUsize, Ordering};

use crate::marshal::{ArgValue, ParamType};
use crate::session::Shell;

/// Function signature for generic (argc/argv style) command handlers.
///
/// `argv[0]` is the command name as typed; the remaining entries are raw
/// tokens, quoting and escapes untouched. Decoding belongs to the
/// marshaller and is only applied for signature-typed handlers.
pub type CommandFn = fn(argc: usize, argv: &[&str]) -> i32;

/// Function signature for signature-typed command handlers.
///
/// The slice holds one marshalled [`ArgValue`] per declared parameter, in
/// declaration order. Handlers are only invoked after every argument
/// marshalled successfully.
pub type TypedCommandFn = fn(args: &[ArgValue]) -> i32;

/// Function signature for key binding handlers.
pub type KeyFn = fn(&mut Shell);

/// Attribute flags carried by every descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    /// The command may be invoked before authentication has passed.
    pub enable_unchecked: bool,
    /// Suppress the `Return: ...` echo after the handler returns.
    pub disable_return: bool,
    /// The variable may not be written (variables only).
    pub read_only: bool,
}

impl Flags {
    /// No flags set.
    pub const NONE: Flags = Flags {
        enable_unchecked: false,
        disable_return: false,
        read_only: false,
    };

    /// Usable without authentication.
    pub const UNCHECKED: Flags = Flags {
        enable_unchecked: true,
        ..Flags::NONE
    };

    /// Return value echo suppressed.
    pub const NO_RETURN: Flags = Flags {
        disable_return: true,
        ..Flags::NONE
    };

    /// Read-only variable.
    pub const READ_ONLY: Flags = Flags {
        read_only: true,
        ..Flags::NONE
    };
}

/// A get/set function pair backing a node variable.
///
/// Node variables compute their value on demand instead of referencing
/// storage directly. A node without a `set` function rejects writes.
#[derive(Debug)]
pub struct NodeVar {
    /// Reads the current value.
    pub get: fn() -> i32,
    /// Writes a new value, returning the value actually stored.
    pub set: Option<fn(i32) -> i32>,
}

/// Storage reference carried by a variable descriptor.
///
/// Numeric variables reference atomics so the shared `&'static` registry
/// table can still mutate them soundly. String variables are immutable.
#[derive(Debug)]
pub enum VarRef {
    /// 32-bit integer variable.
    Int(&'static AtomicI32),
    /// 16-bit integer variable.
    Short(&'static AtomicI16),
    /// 8-bit integer variable.
    Byte(&'static AtomicI8),
    /// Immutable string variable.
    Str(&'static str),
    /// Pointer-width variable.
    Ptr(&'static AtomicUsize),
    /// Computed variable backed by a get/set pair.
    Node(&'static NodeVar),
}

impl VarRef {
    /// Current value as a machine word, or `None` for string variables.
    pub fn word(&self) -> Option<usize> {
        match self {
            VarRef::Int(v) => Some(v.load(Ordering::Relaxed) as usize),
            VarRef::Short(v) => Some(v.load(Ordering::Relaxed) as usize),
            VarRef::Byte(v) => Some(v.load(Ordering::Relaxed) as usize),
            VarRef::Str(_) => None,
            VarRef::Ptr(v) => Some(v.load(Ordering::Relaxed)),
            VarRef::Node(n) => Some((n.get)() as usize),
        }
    }

    /// Current value for string variables.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            VarRef::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Store a machine word into the variable.
    ///
    /// Returns `false` for string variables and nodes without a `set`
    /// function. The `read_only` flag is enforced by the caller, not
    /// here.
    pub fn set_word(&self, value: usize) -> bool {
        match self {
            VarRef::Int(v) => {
                v.store(value as i32, Ordering::Relaxed);
                true
            }
            VarRef::Short(v) => {
                v.store(value as i16, Ordering::Relaxed);
                true
            }
            VarRef::Byte(v) => {
                v.store(value as i8, Ordering::Relaxed);
                true
            }
            VarRef::Str(_) => false,
            VarRef::Ptr(v) => {
                v.store(value, Ordering::Relaxed);
                true
            }
            VarRef::Node(n) => match n.set {
                Some(set) => {
                    set(value as i32);
                    true
                }
                None => false,
            },
        }
    }
}

/// How a command descriptor's handler is invoked.
#[derive(Debug)]
pub enum Handler {
    /// Generic handler receiving raw argc/argv.
    Main(CommandFn),
    /// Handler with a declared parameter signature; tokens are marshalled
    /// to typed values before invocation.
    Typed {
        /// The handler function.
        func: TypedCommandFn,
        /// Declared parameter types, one per argument after the command
        /// name. The slice length is the declared parameter count.
        signature: &'static [ParamType],
    },
}

/// Variant payload of a descriptor.
#[derive(Debug)]
pub enum Payload {
    /// An invocable command.
    Command(Handler),
    /// A readable (and possibly writable) variable.
    Variable(VarRef),
    /// A key binding, matched by key code instead of name.
    Key {
        /// Key code; multi-byte escape sequences are packed big-endian,
        /// e.g. `0x1B5B41` for the up arrow (`ESC [ A`).
        code: u32,
        /// Invoked when the code is received.
        handler: KeyFn,
    },
    /// A user account for the login flow.
    User {
        /// Plain-equality password. Empty means no password is required.
        password: &'static str,
    },
}

/// A static record describing one command, variable, key binding, or
/// user account.
#[derive(Debug)]
pub struct Descriptor {
    /// Name used for lookup and completion. Unused for key bindings.
    pub name: &'static str,
    /// Human-readable description shown by `help` and friends.
    pub desc: &'static str,
    /// Permission level required to invoke, 0 meaning none. A user
    /// descriptor's level is the ceiling for the commands that user may
    /// invoke.
    pub permission: u8,
    /// Attribute flags.
    pub flags: Flags,
    /// Variant payload.
    pub payload: Payload,
}

impl Descriptor {
    /// A generic argc/argv command with no permission requirement.
    pub const fn command(name: &'static str, desc: &'static str, handler: CommandFn) -> Self {
        Descriptor {
            name,
            desc,
            permission: 0,
            flags: Flags::NONE,
            payload: Payload::Command(Handler::Main(handler)),
        }
    }

    /// A signature-typed command with no permission requirement.
    pub const fn typed(
        name: &'static str,
        desc: &'static str,
        func: TypedCommandFn,
        signature: &'static [ParamType],
    ) -> Self {
        Descriptor {
            name,
            desc,
            permission: 0,
            flags: Flags::NONE,
            payload: Payload::Command(Handler::Typed { func, signature }),
        }
    }

    /// A variable descriptor.
    pub const fn variable(name: &'static str, desc: &'static str, var: VarRef) -> Self {
        Descriptor {
            name,
            desc,
            permission: 0,
            flags: Flags::NONE,
            payload: Payload::Variable(var),
        }
    }

    /// A key binding descriptor.
    pub const fn key(code: u32, desc: &'static str, handler: KeyFn) -> Self {
        Descriptor {
            name: "",
            desc,
            permission: 0,
            flags: Flags::NONE,
            payload: Payload::Key { code, handler },
        }
    }

    /// A user account descriptor.
    pub const fn user(name: &'static str, password: &'static str, desc: &'static str) -> Self {
        Descriptor {
            name,
            desc,
            permission: 0,
            flags: Flags::NONE,
            payload: Payload::User { password },
        }
    }

    /// Set the permission level.
    pub const fn with_permission(mut self, permission: u8) -> Self {
        self.permission = permission;
        self
    }

    /// Replace the attribute flags.
    pub const fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Declared parameter count for signature-typed commands.
    pub fn param_count(&self) -> Option<usize> {
        match &self.payload {
            Payload::Command(Handler::Typed { signature, .. }) => Some(signature.len()),
            _ => None,
        }
    }

    /// Whether this descriptor participates in name lookup.
    pub(crate) fn named(&self) -> bool {
        !matches!(self.payload, Payload::Key { .. })
    }
}

/// The immutable collection of descriptors searchable by name or key
/// code.
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    table: &'static [Descriptor],
}

impl Registry {
    /// Wrap an ordered descriptor table.
    pub const fn new(table: &'static [Descriptor]) -> Self {
        Registry { table }
    }

    /// An empty registry.
    pub const fn empty() -> Self {
        Registry { table: &[] }
    }

    /// Look up a command, variable, or user by name.
    ///
    /// With `match_length` 0 the name must match exactly. Otherwise only
    /// the first `match_length` bytes are compared and the first
    /// descriptor in table order wins; ambiguity resolves silently to
    /// table order.
    pub fn lookup(&self, name: &str, match_length: usize) -> Option<&'static Descriptor> {
        self.table
            .iter()
            .filter(|d| d.named())
            .find(|d| names_match(d.name, name, match_length))
    }

    /// Look up a key binding by key code.
    pub fn lookup_key(&self, code: u32) -> Option<&'static Descriptor> {
        self.table
            .iter()
            .find(|d| matches!(d.payload, Payload::Key { code: c, .. } if c == code))
    }

    /// Iterate all descriptors in table order.
    pub fn iter(&self) -> core::slice::Iter<'static, Descriptor> {
        self.table.iter()
    }

    /// Iterate the named descriptors whose name starts with `prefix`.
    pub fn complete<'a>(
        &self,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'static Descriptor> + use<'a> {
        self.table
            .iter()
            .filter(|d| d.named())
            .filter(move |d| d.name.starts_with(prefix))
    }
}

/// Name comparison with the table's configurable match length.
///
/// Mirrors `strncmp` semantics: with a nonzero length, two names compare
/// equal when their first `length` bytes agree, or when both end before
/// `length` bytes and are identical.
fn names_match(entry: &str, query: &str, length: usize) -> bool {
    if length == 0 {
        return entry == query;
    }
    let e = entry.as_bytes();
    let q = query.as_bytes();
    if e.len() >= length && q.len() >= length {
        e[..length] == q[..length]
    } else {
        e == q
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop(_argc: usize, _argv: &[&str]) -> i32 {
        0
    }

    fn nop_key(_shell: &mut Shell) {}

    static TABLE: &[Descriptor] = &[
        Descriptor::command("reset", "reset the board", nop),
        Descriptor::command("restart", "restart the app", nop),
        Descriptor::key(0x1B5B41, "up arrow", nop_key),
        Descriptor::user("admin", "secret", "administrator").with_permission(0xFF),
    ];

    #[test]
    fn exact_lookup_finds_unique_names() {
        let r = Registry::new(TABLE);
        assert_eq!(r.lookup("reset", 0).unwrap().name, "reset");
        assert_eq!(r.lookup("restart", 0).unwrap().name, "restart");
        assert!(r.lookup("rese", 0).is_none());
    }

    #[test]
    fn prefix_lookup_resolves_to_table_order() {
        let r = Registry::new(TABLE);
        // "res" is ambiguous; the first entry wins.
        assert_eq!(r.lookup("res", 3).unwrap().name, "reset");
        assert_eq!(r.lookup("rest", 4).unwrap().name, "restart");
    }

    #[test]
    fn keys_are_a_disjoint_lookup_space() {
        let r = Registry::new(TABLE);
        assert!(r.lookup("", 0).is_none());
        assert!(r.lookup_key(0x1B5B41).is_some());
        assert!(r.lookup_key(0x1B5B42).is_none());
    }

    #[test]
    fn users_are_looked_up_by_name() {
        let r = Registry::new(TABLE);
        let user = r.lookup("admin", 0).unwrap();
        assert_eq!(user.permission, 0xFF);
        assert!(matches!(user.payload, Payload::User { password: "secret" }));
    }

    #[test]
    fn variable_references_read_and_write() {
        static COUNTER: AtomicI32 = AtomicI32::new(7);
        let var = VarRef::Int(&COUNTER);
        assert_eq!(var.word(), Some(7));
        assert!(var.set_word(41));
        assert_eq!(var.word(), Some(41));

        let s = VarRef::Str("hello");
        assert_eq!(s.as_str(), Some("hello"));
        assert_eq!(s.word(), None);
        assert!(!s.set_word(1));
    }
}
