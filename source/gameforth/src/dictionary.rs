//! The word dictionary.
//!
//! Entries are appended and never removed while a program is live, so a
//! word's index in the dictionary doubles as its execution token (xt).
//! Lookups search newest-first, which is what makes redefinition shadow
//! older entries while leaving already-compiled call sites untouched.

use core::fmt;

use crate::{
    fastr::{FaStr, TmpFaStr},
    Error, NativeArgs, WordFunc,
};

/// Host callback backing a native word.
///
/// It sees the host context and its arguments, and may return one result
/// cell to push.
pub type NativeFunc<T> = Box<dyn FnMut(&mut T, NativeArgs<'_>) -> Result<Option<i32>, Error>>;

/// An entry in the static builtin tables.
pub struct BuiltinEntry<T: 'static> {
    pub name: &'static str,
    pub func: WordFunc<T>,
}

pub enum EntryKind<T: 'static> {
    /// A runtime builtin with full access to the VM.
    Builtin(WordFunc<T>),
    /// A host-implemented word consuming exactly `arity` cells.
    Native { arity: usize, func: NativeFunc<T> },
    /// A colon definition starting at `entry` in memory.
    Compiled { entry: usize },
    Constant(i32),
}

pub struct DictionaryEntry<T: 'static> {
    pub name: FaStr,
    pub kind: EntryKind<T>,
    hidden: bool,
}

impl<T: 'static> DictionaryEntry<T> {
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}

impl<T: 'static> fmt::Debug for EntryKind<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Builtin(_) => f.write_str("Builtin"),
            EntryKind::Native { arity, .. } => {
                f.debug_struct("Native").field("arity", arity).finish()
            }
            EntryKind::Compiled { entry } => {
                f.debug_struct("Compiled").field("entry", entry).finish()
            }
            EntryKind::Constant(val) => f.debug_tuple("Constant").field(val).finish(),
        }
    }
}

pub struct Dictionary<T: 'static> {
    entries: Vec<DictionaryEntry<T>>,
}

impl<T: 'static> Default for Dictionary<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Dictionary<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a visible entry, returning its xt.
    pub fn push(&mut self, name: &str, kind: EntryKind<T>) -> usize {
        self.push_entry(name, kind, false)
    }

    /// Appends an entry that lookups skip until it is revealed.
    pub fn push_hidden(&mut self, name: &str, kind: EntryKind<T>) -> usize {
        self.push_entry(name, kind, true)
    }

    fn push_entry(&mut self, name: &str, kind: EntryKind<T>, hidden: bool) -> usize {
        self.entries.push(DictionaryEntry {
            name: FaStr::new(name),
            kind,
            hidden,
        });
        self.entries.len() - 1
    }

    pub fn reveal(&mut self, xt: usize) {
        if let Some(entry) = self.entries.get_mut(xt) {
            entry.hidden = false;
        }
    }

    /// Finds the newest visible entry called `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        let fastr = TmpFaStr::new_from(name);
        self.entries
            .iter()
            .rposition(|de| !de.hidden && de.name == fastr)
    }

    pub fn get(&self, xt: usize) -> Option<&DictionaryEntry<T>> {
        self.entries.get(xt)
    }

    pub fn get_mut(&mut self, xt: usize) -> Option<&mut DictionaryEntry<T>> {
        self.entries.get_mut(xt)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry from `len` onwards.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    /// Visible entries, newest first.
    pub fn visible(&self) -> impl Iterator<Item = &DictionaryEntry<T>> + '_ {
        self.entries.iter().rev().filter(|de| !de.hidden)
    }
}
