use core::{ops::Index, str::FromStr};

use crate::{
    dictionary::{BuiltinEntry, Dictionary, EntryKind, NativeFunc},
    input::{Token, Tokens},
    memory::{addr_from_cell, cell_from_addr, Memory, MemoryError, CELL},
    output::OutputBuf,
    stack::{Stack, StackKind},
    Error, ForthParams, Lookup, Mode, ReplaceErr, WordFunc,
};

pub mod builtins;

/// Forth is the "context" of the VM/interpreter.
///
/// It owns the dictionary, both stacks, the byte memory holding compiled
/// code, the output buffer, and a host context `T` that native words
/// operate on. Reloading a program means building a fresh `Forth`.
pub struct Forth<T: 'static> {
    mode: Mode,
    pub data_stack: Stack<i32>,
    pub return_stack: Stack<i32>,
    pub(crate) dict: Dictionary<T>,
    pub(crate) memory: Memory,
    pub output: OutputBuf,
    pub host_ctxt: T,
    /// Instruction pointer, `Some` only while compiled code is running.
    ip: Option<usize>,
    /// Return stack depth at which the current top-level run finishes.
    run_base: usize,
    steps: u64,
    step_budget: Option<u64>,
    internals: Internals,
}

/// Execution tokens of the runtime targets the compiler emits.
#[derive(Debug, Clone, Copy)]
struct Internals {
    literal: usize,
    jump: usize,
    jump_zero: usize,
    exit: usize,
    do_start: usize,
    loop_inc: usize,
    plus_loop: usize,
    str_literal: usize,
    write_str: usize,
}

/// Arguments handed to a native word, in push order.
///
/// Natives may also read (never write) VM memory, e.g. to fetch text
/// passed by address and length, and append to the program output.
pub struct NativeArgs<'a> {
    args: &'a [i32],
    memory: &'a Memory,
    output: &'a mut OutputBuf,
}

impl<'a> NativeArgs<'a> {
    pub fn as_slice(&self) -> &'a [i32] {
        self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn fetch_byte(&self, addr: i32) -> Result<u8, Error> {
        Ok(self.memory.fetch_byte(addr_from_cell(addr)?)?)
    }

    /// Borrows `len` bytes of memory starting at `addr`.
    pub fn bytes(&self, addr: i32, len: i32) -> Result<&'a [u8], Error> {
        let len = usize::try_from(len).replace_err(MemoryError::OutOfBounds {
            addr: i64::from(addr),
            len: 0,
        })?;
        Ok(self.memory.bytes(addr_from_cell(addr)?, len)?)
    }

    /// The program output buffer.
    pub fn output(&mut self) -> &mut OutputBuf {
        &mut *self.output
    }
}

impl Index<usize> for NativeArgs<'_> {
    type Output = i32;

    fn index(&self, idx: usize) -> &i32 {
        &self.args[idx]
    }
}

/// What a control structure ran into while compiling its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Semicolon,
    Else,
    Then,
    Until,
    Again,
    While,
    Repeat,
    Loop,
    PlusLoop,
}

/// `None` means the source ended first.
type Munched<'a> = Option<(Terminator, Token<'a>)>;

enum Dispatch<T: 'static> {
    Builtin(WordFunc<T>),
    Native,
    Call(usize),
    Push(i32),
}

impl<T: 'static> Forth<T> {
    pub fn new(params: ForthParams, host_ctxt: T, builtins: &'static [BuiltinEntry<T>]) -> Self {
        let mut dict = Dictionary::new();
        let mut internal =
            |name: &str, func: WordFunc<T>| dict.push_hidden(name, EntryKind::Builtin(func));
        let internals = Internals {
            literal: internal("(literal)", Self::literal),
            jump: internal("(jmp)", Self::jump),
            jump_zero: internal("(jump-zero)", Self::jump_if_zero),
            exit: internal("(exit)", Self::exit),
            do_start: internal("(do)", Self::do_start),
            loop_inc: internal("(loop)", Self::loop_inc),
            plus_loop: internal("(+loop)", Self::plus_loop),
            str_literal: internal("(str-literal)", Self::str_literal),
            write_str: internal("(write-str)", Self::write_str_lit),
        };
        for bi in builtins {
            dict.push(bi.name, EntryKind::Builtin(bi.func));
        }

        Self {
            mode: Mode::Run,
            data_stack: Stack::new(StackKind::Data, params.data_stack_elems),
            return_stack: Stack::new(StackKind::Return, params.return_stack_elems),
            dict,
            memory: Memory::new(params.memory_bytes),
            output: OutputBuf::new(params.output_buf_elems),
            host_ctxt,
            ip: None,
            run_base: 0,
            steps: 0,
            step_budget: params.step_budget,
            internals,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn dictionary(&self) -> &Dictionary<T> {
        &self.dict
    }

    /// Consumes the VM, handing back the host context.
    pub fn release(self) -> T {
        self.host_ctxt
    }

    /// Registers a builtin with full access to the VM.
    pub fn add_builtin(&mut self, name: &str, bi: WordFunc<T>) -> Result<(), Error> {
        Self::check_name(name)?;
        self.dict.push(name, EntryKind::Builtin(bi));
        Ok(())
    }

    /// Registers a host-implemented native word.
    ///
    /// When executed, exactly `arity` cells are popped and handed to `func`
    /// in push order, so the first-pushed value is `args[0]`. If `func`
    /// returns a value, it is pushed. With fewer than `arity` cells on the
    /// data stack, the call fails with a stack underflow and pops nothing.
    ///
    /// Natives must be registered before any source referencing them is
    /// interpreted.
    pub fn create_builtin_word<F>(&mut self, name: &str, arity: usize, func: F) -> Result<(), Error>
    where
        F: FnMut(&mut T, NativeArgs<'_>) -> Result<Option<i32>, Error> + 'static,
    {
        Self::check_name(name)?;
        let func: NativeFunc<T> = Box::new(func);
        self.dict.push(name, EntryKind::Native { arity, func });
        tracing::trace!(name, arity, "registered native word");
        Ok(())
    }

    fn check_name(name: &str) -> Result<(), Error> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(Error::InvalidWordName(name.to_string()));
        }
        Ok(())
    }

    /// Decimal only, with an optional leading `-`.
    fn parse_num(word: &str) -> Option<i32> {
        if word.starts_with('+') {
            return None;
        }
        i32::from_str(word).ok()
    }

    pub fn lookup(&self, word: &str) -> Option<Lookup> {
        let special = match word {
            ":" => Lookup::Colon,
            ";" => Lookup::Semicolon,
            "(" => Lookup::LParen,
            "\\" => Lookup::Backslash,
            r#".""# => Lookup::DotQuote,
            r#"s""# => Lookup::SQuote,
            "if" => Lookup::If,
            "else" => Lookup::Else,
            "then" => Lookup::Then,
            "begin" => Lookup::Begin,
            "until" => Lookup::Until,
            "again" => Lookup::Again,
            "while" => Lookup::While,
            "repeat" => Lookup::Repeat,
            "do" => Lookup::Do,
            "loop" => Lookup::Loop,
            "+loop" => Lookup::PlusLoop,
            "recurse" => Lookup::Recurse,
            "exit" => Lookup::Exit,
            "constant" => Lookup::Constant,
            "variable" => Lookup::Variable,
            "create" => Lookup::Create,
            _ => {
                if let Some(xt) = self.dict.find(word) {
                    return Some(Lookup::Word { xt });
                }
                return Self::parse_num(word).map(|val| Lookup::Literal { val });
            }
        };
        Some(special)
    }

    /// Returns the entry address of the newest compiled word called `name`.
    ///
    /// Native words and constants have no entry address, so they are
    /// reported as not found, as are names that were never defined.
    pub fn lookup_word(&self, name: &str) -> Option<usize> {
        let xt = self.dict.find(name)?;
        match self.dict.get(xt)?.kind {
            EntryKind::Compiled { entry } => Some(entry),
            _ => None,
        }
    }

    /// Runs compiled code starting at `addr` until it returns.
    ///
    /// On error, both stacks are cleared before the error is returned.
    pub fn call_word(&mut self, addr: usize) -> Result<(), Error> {
        let res = self.run(addr);
        if let Err(e) = &res {
            self.recover(e);
        }
        res
    }

    pub fn fetch_byte(&self, addr: usize) -> Result<u8, Error> {
        Ok(self.memory.fetch_byte(addr)?)
    }

    /// Interprets (and compiles) a complete source text.
    ///
    /// `label` names the source in diagnostics. The first error aborts the
    /// rest of the text; stacks are cleared, and a definition that was being
    /// compiled is discarded.
    #[tracing::instrument(level = "debug", skip(self, text), fields(bytes = text.len()))]
    pub fn interpret_source(&mut self, text: &str, label: &str) -> Result<(), Error> {
        let mut tokens = Tokens::new(text, label);
        let res = self.interpret_tokens(&mut tokens);
        if let Err(e) = &res {
            self.recover(e);
        }
        res
    }

    fn recover(&mut self, err: &Error) {
        tracing::debug!(%err, "aborted; clearing stacks");
        self.data_stack.clear();
        self.return_stack.clear();
        self.ip = None;
        self.mode = Mode::Run;
    }

    fn interpret_tokens(&mut self, tokens: &mut Tokens<'_>) -> Result<(), Error> {
        while let Some(tok) = tokens.next() {
            self.interpret_one(tok, tokens)?;
        }
        Ok(())
    }

    fn interpret_one<'a>(&mut self, tok: Token<'a>, tokens: &mut Tokens<'a>) -> Result<(), Error> {
        let lookup = self.lookup(tok.text).ok_or_else(|| Error::UndefinedWord {
            name: tok.text.to_string(),
            location: tokens.locate(&tok),
        })?;

        match lookup {
            Lookup::Word { xt } => self.execute(xt)?,
            Lookup::Literal { val } => self.data_stack.push(val)?,
            Lookup::Colon => self.munch_definition(&tok, tokens)?,
            Lookup::LParen => Self::munch_comment(tokens),
            Lookup::Backslash => tokens.skip_line(),
            Lookup::DotQuote => {
                let text = Self::munch_str(&tok, tokens)?;
                self.output.push_str(text)?;
            }
            Lookup::SQuote => {
                let text = Self::munch_str(&tok, tokens)?;
                let addr = self.memory.bump_bytes(text.as_bytes())?;
                self.data_stack.push(cell_from_addr(addr)?)?;
                self.data_stack.push(cell_from_addr(text.len())?)?;
            }
            Lookup::Constant => {
                let val = self.data_stack.try_pop()?;
                let name = Self::munch_name(&tok, tokens)?;
                self.dict.push(name, EntryKind::Constant(val));
                tracing::debug!(name, val, "defined constant");
            }
            Lookup::Variable => {
                let name = Self::munch_name(&tok, tokens)?;
                let addr = self.memory.bump_cell(0)?;
                self.dict.push(name, EntryKind::Constant(cell_from_addr(addr)?));
                tracing::debug!(name, addr, "defined variable");
            }
            Lookup::Create => {
                let name = Self::munch_name(&tok, tokens)?;
                self.memory.align()?;
                let addr = self.memory.here();
                self.dict.push(name, EntryKind::Constant(cell_from_addr(addr)?));
            }
            Lookup::Semicolon
            | Lookup::If
            | Lookup::Else
            | Lookup::Then
            | Lookup::Begin
            | Lookup::Until
            | Lookup::Again
            | Lookup::While
            | Lookup::Repeat
            | Lookup::Do
            | Lookup::Loop
            | Lookup::PlusLoop
            | Lookup::Recurse
            | Lookup::Exit => {
                return Err(Error::InterpretingCompileOnlyWord {
                    name: tok.text.to_string(),
                    location: tokens.locate(&tok),
                })
            }
        }
        Ok(())
    }

    // Execution

    /// Dispatches one word.
    ///
    /// Outside of a run, a compiled word starts a new top-level run. Inside
    /// one, it becomes a nested call.
    fn execute(&mut self, xt: usize) -> Result<(), Error> {
        let dispatch = match self.dict.get(xt).map(|de| &de.kind) {
            Some(EntryKind::Builtin(func)) => Dispatch::Builtin(*func),
            Some(EntryKind::Native { .. }) => Dispatch::Native,
            Some(EntryKind::Compiled { entry }) => Dispatch::Call(*entry),
            Some(EntryKind::Constant(val)) => Dispatch::Push(*val),
            None => return Err(Error::BadExecutionToken(i32::try_from(xt).unwrap_or(-1))),
        };

        match dispatch {
            Dispatch::Builtin(func) => func(self),
            Dispatch::Native => self.call_native(xt),
            Dispatch::Call(entry) => match self.ip {
                Some(resume) => {
                    self.return_stack.push(cell_from_addr(resume)?)?;
                    self.ip = Some(entry);
                    Ok(())
                }
                None => self.run(entry),
            },
            Dispatch::Push(val) => Ok(self.data_stack.push(val)?),
        }
    }

    fn call_native(&mut self, xt: usize) -> Result<(), Error> {
        let Forth {
            dict,
            data_stack,
            memory,
            output,
            host_ctxt,
            ..
        } = self;
        let entry = dict
            .get_mut(xt)
            .ok_or(Error::BadExecutionToken(i32::try_from(xt).unwrap_or(-1)))?;
        let EntryKind::Native { arity, func } = &mut entry.kind else {
            return Err(Error::BadExecutionToken(i32::try_from(xt).unwrap_or(-1)));
        };
        tracing::trace!(word = %entry.name, arity = *arity, "native call");

        let args = data_stack.try_pop_n(*arity)?;
        let ret = func(
            host_ctxt,
            NativeArgs {
                args: &args,
                memory: &*memory,
                output,
            },
        )?;
        if let Some(val) = ret {
            data_stack.push(val)?;
        }
        Ok(())
    }

    /// Runs the inner interpreter from `entry` until the matching return.
    fn run(&mut self, entry: usize) -> Result<(), Error> {
        self.run_base = self.return_stack.depth();
        self.steps = 0;
        self.ip = Some(entry);
        let res = self.run_loop();
        self.ip = None;
        res
    }

    fn run_loop(&mut self) -> Result<(), Error> {
        while let Some(ip) = self.ip {
            if let Some(limit) = self.step_budget {
                if self.steps >= limit {
                    tracing::warn!(limit, ip, "step budget exceeded");
                    return Err(Error::StepBudgetExceeded { limit });
                }
            }
            self.steps += 1;

            let cell = self.memory.fetch_cell(ip)?;
            self.ip = Some(ip + CELL);
            let xt = usize::try_from(cell).replace_err(Error::BadExecutionToken(cell))?;
            self.execute(xt)?;
        }
        Ok(())
    }

    /// Reads the inline operand following the current instruction.
    pub(crate) fn take_operand(&mut self) -> Result<i32, Error> {
        let ip = self.ip.ok_or(Error::MissingOperand)?;
        let val = self.memory.fetch_cell(ip)?;
        self.ip = Some(ip + CELL);
        Ok(val)
    }

    pub(crate) fn jump_to(&mut self, target: i32) -> Result<(), Error> {
        self.ip = Some(addr_from_cell(target)?);
        Ok(())
    }

    /// Returns from the current compiled word.
    ///
    /// At the depth the top-level run started from, this ends the run.
    pub(crate) fn return_from_word(&mut self) -> Result<(), Error> {
        if self.return_stack.depth() <= self.run_base {
            self.ip = None;
            return Ok(());
        }
        let resume = self.return_stack.try_pop()?;
        self.jump_to(resume)
    }

    /// Steps over `len` bytes of inline data, returning its address.
    pub(crate) fn skip_inline(&mut self, len: usize) -> Result<usize, Error> {
        let addr = self.ip.ok_or(Error::MissingOperand)?;
        self.ip = Some(crate::memory::aligned(addr + len));
        Ok(addr)
    }

    // Compilation

    fn munch_name<'a>(def: &Token<'a>, tokens: &mut Tokens<'a>) -> Result<&'a str, Error> {
        match tokens.next() {
            Some(tok) => Ok(tok.text),
            None => Err(Error::MissingName {
                word: def.text.to_string(),
                location: tokens.locate(def),
            }),
        }
    }

    fn munch_comment(tokens: &mut Tokens<'_>) {
        // An unterminated comment runs to the end of the source.
        let _ = tokens.take_until(')');
    }

    fn munch_str<'a>(tok: &Token<'a>, tokens: &mut Tokens<'a>) -> Result<&'a str, Error> {
        tokens
            .take_until('"')
            .ok_or_else(|| Error::MissingStringTerminator {
                location: tokens.locate(tok),
            })
    }

    fn munch_definition<'a>(&mut self, colon: &Token<'a>, tokens: &mut Tokens<'a>) -> Result<(), Error> {
        let name = Self::munch_name(colon, tokens)?;
        let mem_mark = self.memory.here();
        let dict_mark = self.dict.len();

        self.mode = Mode::Compile;
        let res = self.compile_definition(name, tokens);
        self.mode = Mode::Run;

        if res.is_err() {
            self.memory.truncate(mem_mark);
            self.dict.truncate(dict_mark);
        }
        res
    }

    fn compile_definition<'a>(&mut self, name: &'a str, tokens: &mut Tokens<'a>) -> Result<(), Error> {
        self.memory.align()?;
        let entry = self.memory.here();
        // Hidden until `;`, so the body sees any previous definition of `name`.
        let xt = self.dict.push_hidden(name, EntryKind::Compiled { entry });

        match self.munch_until(xt, tokens)? {
            Some((Terminator::Semicolon, _)) => {}
            Some((_, tok)) => {
                return Err(Error::UnmatchedControl {
                    name: tok.text.to_string(),
                    location: tokens.locate(&tok),
                })
            }
            None => {
                return Err(Error::ColonCompileMissingSemicolon {
                    name: name.to_string(),
                })
            }
        }

        self.compile_xt(self.internals.exit)?;
        self.dict.reveal(xt);
        tracing::debug!(
            name,
            entry,
            len = self.memory.here() - entry,
            "compiled definition"
        );
        Ok(())
    }

    /// Compiles tokens until one of them ends the enclosing structure.
    fn munch_until<'a>(&mut self, xt: usize, tokens: &mut Tokens<'a>) -> Result<Munched<'a>, Error> {
        while let Some(tok) = tokens.next() {
            if let Some(term) = self.munch_one(xt, tok, tokens)? {
                return Ok(Some((term, tok)));
            }
        }
        Ok(None)
    }

    fn munch_one<'a>(
        &mut self,
        xt: usize,
        tok: Token<'a>,
        tokens: &mut Tokens<'a>,
    ) -> Result<Option<Terminator>, Error> {
        let lookup = self.lookup(tok.text).ok_or_else(|| Error::UndefinedWord {
            name: tok.text.to_string(),
            location: tokens.locate(&tok),
        })?;

        match lookup {
            Lookup::Word { xt: callee } => self.compile_xt(callee)?,
            Lookup::Literal { val } => {
                self.compile_xt(self.internals.literal)?;
                self.memory.bump_cell(val)?;
            }
            Lookup::Semicolon => return Ok(Some(Terminator::Semicolon)),
            Lookup::Else => return Ok(Some(Terminator::Else)),
            Lookup::Then => return Ok(Some(Terminator::Then)),
            Lookup::Until => return Ok(Some(Terminator::Until)),
            Lookup::Again => return Ok(Some(Terminator::Again)),
            Lookup::While => return Ok(Some(Terminator::While)),
            Lookup::Repeat => return Ok(Some(Terminator::Repeat)),
            Lookup::Loop => return Ok(Some(Terminator::Loop)),
            Lookup::PlusLoop => return Ok(Some(Terminator::PlusLoop)),
            Lookup::If => self.munch_if(xt, &tok, tokens)?,
            Lookup::Begin => self.munch_begin(xt, &tok, tokens)?,
            Lookup::Do => self.munch_do(xt, &tok, tokens)?,
            Lookup::Recurse => self.compile_xt(xt)?,
            Lookup::Exit => self.compile_xt(self.internals.exit)?,
            Lookup::LParen => Self::munch_comment(tokens),
            Lookup::Backslash => tokens.skip_line(),
            Lookup::DotQuote => {
                let text = Self::munch_str(&tok, tokens)?;
                self.compile_str(self.internals.write_str, text)?;
            }
            Lookup::SQuote => {
                let text = Self::munch_str(&tok, tokens)?;
                self.compile_str(self.internals.str_literal, text)?;
            }
            Lookup::Colon | Lookup::Constant | Lookup::Variable | Lookup::Create => {
                return Err(Error::DefinitionInsideDefinition {
                    name: tok.text.to_string(),
                    location: tokens.locate(&tok),
                })
            }
        }
        Ok(None)
    }

    fn munch_if<'a>(&mut self, xt: usize, if_tok: &Token<'a>, tokens: &mut Tokens<'a>) -> Result<(), Error> {
        let if_hole = self.compile_branch(self.internals.jump_zero)?;

        match self.munch_until(xt, tokens)? {
            Some((Terminator::Then, _)) => self.patch(if_hole),
            Some((Terminator::Else, _)) => {
                let else_hole = self.compile_branch(self.internals.jump)?;
                self.patch(if_hole)?;
                match self.munch_until(xt, tokens)? {
                    Some((Terminator::Then, _)) => self.patch(else_hole),
                    other => Err(Self::control_error("if", if_tok, other, tokens)),
                }
            }
            other => Err(Self::control_error("if", if_tok, other, tokens)),
        }
    }

    fn munch_begin<'a>(&mut self, xt: usize, begin_tok: &Token<'a>, tokens: &mut Tokens<'a>) -> Result<(), Error> {
        let start = cell_from_addr(self.memory.here())?;

        match self.munch_until(xt, tokens)? {
            Some((Terminator::Until, _)) => self.compile_with_operand(self.internals.jump_zero, start),
            Some((Terminator::Again, _)) => self.compile_with_operand(self.internals.jump, start),
            Some((Terminator::While, _)) => {
                let exit_hole = self.compile_branch(self.internals.jump_zero)?;
                match self.munch_until(xt, tokens)? {
                    Some((Terminator::Repeat, _)) => {
                        self.compile_with_operand(self.internals.jump, start)?;
                        self.patch(exit_hole)
                    }
                    other => Err(Self::control_error("begin", begin_tok, other, tokens)),
                }
            }
            other => Err(Self::control_error("begin", begin_tok, other, tokens)),
        }
    }

    fn munch_do<'a>(&mut self, xt: usize, do_tok: &Token<'a>, tokens: &mut Tokens<'a>) -> Result<(), Error> {
        self.compile_xt(self.internals.do_start)?;
        let body = cell_from_addr(self.memory.here())?;

        match self.munch_until(xt, tokens)? {
            Some((Terminator::Loop, _)) => self.compile_with_operand(self.internals.loop_inc, body),
            Some((Terminator::PlusLoop, _)) => self.compile_with_operand(self.internals.plus_loop, body),
            other => Err(Self::control_error("do", do_tok, other, tokens)),
        }
    }

    /// Picks the error for a structure that ended on the wrong word.
    fn control_error(open: &'static str, open_tok: &Token<'_>, found: Munched<'_>, tokens: &Tokens<'_>) -> Error {
        match found {
            Some((Terminator::Semicolon, _)) | None => Error::UnterminatedControl {
                name: open,
                location: tokens.locate(open_tok),
            },
            Some((_, tok)) => Error::UnmatchedControl {
                name: tok.text.to_string(),
                location: tokens.locate(&tok),
            },
        }
    }

    fn compile_xt(&mut self, xt: usize) -> Result<(), Error> {
        let cell = i32::try_from(xt).replace_err(Error::BadExecutionToken(-1))?;
        self.memory.bump_cell(cell)?;
        Ok(())
    }

    fn compile_with_operand(&mut self, xt: usize, operand: i32) -> Result<(), Error> {
        self.compile_xt(xt)?;
        self.memory.bump_cell(operand)?;
        Ok(())
    }

    /// Emits a branch with a placeholder target, returning the hole's address.
    fn compile_branch(&mut self, xt: usize) -> Result<usize, Error> {
        self.compile_xt(xt)?;
        Ok(self.memory.bump_cell(0)?)
    }

    /// Points a branch hole at the current end of code.
    fn patch(&mut self, hole: usize) -> Result<(), Error> {
        let target = cell_from_addr(self.memory.here())?;
        self.memory.store_cell(hole, target)?;
        Ok(())
    }

    fn compile_str(&mut self, xt: usize, text: &str) -> Result<(), Error> {
        self.compile_with_operand(xt, cell_from_addr(text.len())?)?;
        self.memory.bump_bytes(text.as_bytes())?;
        self.memory.align()?;
        Ok(())
    }
}

#[cfg(test)]
pub mod test {
    use crate::{
        memory::MemoryError,
        stack::{StackError, StackKind},
        Error, Forth, ForthParams, Location, Mode,
    };

    fn forth() -> Forth<Vec<i32>> {
        Forth::new(ForthParams::default(), Vec::new(), Forth::FULL_BUILTINS)
    }

    #[test]
    fn literals_land_in_push_order() {
        let mut forth = forth();
        forth.interpret_source("1 -2 3 2147483647", "t").unwrap();
        assert_eq!(forth.data_stack.as_slice(), &[1, -2, 3, i32::MAX]);
        assert!(forth.output.is_empty());
        assert_eq!(forth.memory().here(), 0);
    }

    #[test]
    fn undefined_word_reports_position() {
        let mut forth = forth();
        let err = forth
            .interpret_source("1 2\n  3 frobnicate", "cart")
            .unwrap_err();
        assert_eq!(
            err,
            Error::UndefinedWord {
                name: "frobnicate".into(),
                location: Location {
                    label: "cart".into(),
                    line: 2,
                    column: 5
                }
            }
        );
        assert!(forth.data_stack.is_empty());
        // out-of-range and hex literals are not numbers
        assert!(forth.interpret_source("2147483648", "t").is_err());
        assert!(forth.interpret_source("0x10", "t").is_err());
        assert!(matches!(
            forth.interpret_source("+5", "t"),
            Err(Error::UndefinedWord { ref name, .. }) if name == "+5"
        ));
        assert!(forth.data_stack.is_empty());
        forth.interpret_source("-5", "t").unwrap();
        assert_eq!(forth.data_stack.try_pop(), Ok(-5));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let mut forth = forth();
        forth.interpret_source(": Sq dup * ;", "t").unwrap();
        assert!(forth.lookup_word("Sq").is_some());
        assert!(forth.lookup_word("sq").is_none());
        assert!(forth.interpret_source("DUP", "t").is_err());
    }

    #[test]
    fn redefinition_keeps_old_call_sites() {
        let mut forth = forth();
        forth
            .interpret_source(": val 1 ; : use-val val ; : val 2 ;", "t")
            .unwrap();
        let use_val = forth.lookup_word("use-val").unwrap();
        let val = forth.lookup_word("val").unwrap();

        forth.call_word(use_val).unwrap();
        forth.call_word(val).unwrap();
        assert_eq!(forth.data_stack.as_slice(), &[1, 2]);
    }

    #[test]
    fn definition_sees_previous_self() {
        let mut forth = forth();
        forth
            .interpret_source(": x 10 ; : x x 1 + ; x", "t")
            .unwrap();
        assert_eq!(forth.data_stack.as_slice(), &[11]);
    }

    #[test]
    fn stable_entry_and_repeatable_calls() {
        let mut forth = forth();
        forth.interpret_source(": sq dup * ;", "t").unwrap();
        let a = forth.lookup_word("sq").unwrap();
        assert_eq!(forth.lookup_word("sq"), Some(a));

        for n in [3, 3, 7] {
            forth.data_stack.push(n).unwrap();
            forth.call_word(a).unwrap();
            assert_eq!(forth.data_stack.pop(), Some(n * n));
        }
        assert!(forth.data_stack.is_empty());
        assert!(forth.return_stack.is_empty());
    }

    #[test]
    fn lookup_word_only_finds_compiled_words() {
        let mut forth = forth();
        forth.interpret_source("5 constant five", "t").unwrap();
        assert_eq!(forth.lookup_word("five"), None);
        assert_eq!(forth.lookup_word("dup"), None);
        assert_eq!(forth.lookup_word("never-defined"), None);
    }

    #[test]
    fn failed_definition_is_rolled_back() {
        let mut forth = forth();
        forth.interpret_source(": ok 1 ;", "t").unwrap();
        let here = forth.memory().here();
        let words = forth.dictionary().len();

        for bad in [
            ": broken 1 2 nope ;",
            ": unclosed 1 2",
            ": dangling if 1 ;",
            ": twice then ;",
            ": nested : inner ; ;",
        ] {
            assert!(forth.interpret_source(bad, "t").is_err(), "{bad}");
            assert_eq!(forth.memory().here(), here);
            assert_eq!(forth.dictionary().len(), words);
            assert_eq!(forth.mode(), Mode::Run);
        }
        assert_eq!(
            forth.interpret_source(":", "t"),
            Err(Error::MissingName {
                word: ":".into(),
                location: Location {
                    label: "t".into(),
                    line: 1,
                    column: 1
                }
            })
        );
    }

    #[test]
    fn defining_words_need_a_name() {
        let mut forth = forth();
        for (src, word) in [("5 constant", "constant"), ("variable", "variable"), ("create", "create")] {
            let err = forth.interpret_source(src, "t").unwrap_err();
            assert!(
                matches!(err, Error::MissingName { word: ref w, .. } if w == word),
                "{src}: {err:?}"
            );
            assert!(err.to_string().contains(&format!("`{word}` must be followed by a name")));
            assert!(forth.data_stack.is_empty());
        }
    }

    #[test]
    fn control_errors() {
        let mut forth = forth();
        assert!(matches!(
            forth.interpret_source(": a if 1 ;", "t"),
            Err(Error::UnterminatedControl { name: "if", .. })
        ));
        assert!(matches!(
            forth.interpret_source(": a begin 1 loop ;", "t"),
            Err(Error::UnmatchedControl { ref name, .. }) if name == "loop"
        ));
        assert!(matches!(
            forth.interpret_source(": a 1 else ;", "t"),
            Err(Error::UnmatchedControl { ref name, .. }) if name == "else"
        ));
        assert!(matches!(
            forth.interpret_source("1 if", "t"),
            Err(Error::InterpretingCompileOnlyWord { ref name, .. }) if name == "if"
        ));
        assert!(matches!(
            forth.interpret_source(";", "t"),
            Err(Error::InterpretingCompileOnlyWord { .. })
        ));
        assert_eq!(
            forth.interpret_source(": a 1", "t"),
            Err(Error::ColonCompileMissingSemicolon { name: "a".into() })
        );
    }

    #[test]
    fn step_budget_stops_infinite_loops() {
        let params = ForthParams {
            step_budget: Some(1_000),
            ..ForthParams::default()
        };
        let mut forth = Forth::new(params, Vec::<i32>::new(), Forth::FULL_BUILTINS);
        forth.interpret_source(": spin begin again ;", "t").unwrap();
        let spin = forth.lookup_word("spin").unwrap();
        assert_eq!(
            forth.call_word(spin),
            Err(Error::StepBudgetExceeded { limit: 1_000 })
        );
        assert_eq!(
            forth.interpret_source("spin", "t"),
            Err(Error::StepBudgetExceeded { limit: 1_000 })
        );

        // the budget is per top-level call
        forth.interpret_source(": short 1 drop ;", "t").unwrap();
        let short = forth.lookup_word("short").unwrap();
        for _ in 0..2_000 {
            forth.call_word(short).unwrap();
        }
    }

    #[test]
    fn memory_faults_abort_the_call() {
        let params = ForthParams {
            memory_bytes: 256,
            ..ForthParams::default()
        };
        let mut forth = Forth::new(params, Vec::<i32>::new(), Forth::FULL_BUILTINS);
        forth.interpret_source(": peek 1000 @ ;", "t").unwrap();
        let peek = forth.lookup_word("peek").unwrap();
        forth.data_stack.push(42).unwrap();
        assert_eq!(
            forth.call_word(peek),
            Err(Error::Memory(MemoryError::OutOfBounds {
                addr: 1000,
                len: 4
            }))
        );
        assert!(forth.data_stack.is_empty());
        assert!(forth.interpret_source("-1 c@", "t").is_err());
        assert!(forth.call_word(100_000).is_err());
        assert!(forth.fetch_byte(256).is_err());
        assert_eq!(forth.fetch_byte(0), Ok(forth.memory().fetch_byte(0).unwrap()));
    }

    #[test]
    fn stack_faults() {
        let params = ForthParams {
            data_stack_elems: 4,
            return_stack_elems: 4,
            ..ForthParams::default()
        };
        let mut forth = Forth::new(params, Vec::<i32>::new(), Forth::FULL_BUILTINS);
        assert_eq!(
            forth.interpret_source("1 2 3 4 5", "t"),
            Err(Error::Stack(StackError::Overflow(StackKind::Data)))
        );
        assert_eq!(
            forth.interpret_source("+", "t"),
            Err(Error::Stack(StackError::Underflow(StackKind::Data)))
        );
        forth
            .interpret_source(": deep dup if 1 - deep then ;", "t")
            .unwrap_err();
        forth
            .interpret_source(": deep dup if 1 - recurse then ;", "t")
            .unwrap();
        assert_eq!(
            forth.interpret_source("10 deep", "t"),
            Err(Error::Stack(StackError::Overflow(StackKind::Return)))
        );
        forth.interpret_source("3 deep", "t").unwrap();
        assert_eq!(forth.data_stack.as_slice(), &[0]);
    }

    #[test]
    fn natives_receive_args_in_push_order() {
        let mut forth = forth();
        forth
            .create_builtin_word("record3", 3, |seen: &mut Vec<i32>, args| {
                seen.extend_from_slice(args.as_slice());
                Ok(None)
            })
            .unwrap();
        forth
            .create_builtin_word("seven", 0, |_: &mut Vec<i32>, _| Ok(Some(7)))
            .unwrap();

        forth.interpret_source("9 1 2 3 record3", "t").unwrap();
        assert_eq!(forth.host_ctxt, vec![1, 2, 3]);
        assert_eq!(forth.data_stack.as_slice(), &[9]);

        forth.interpret_source(": both seven seven 8 record3 ;", "t").unwrap();
        forth.interpret_source("both", "t").unwrap();
        assert_eq!(forth.host_ctxt, vec![1, 2, 3, 7, 7, 8]);

        forth.interpret_source("drop 1 2", "t").unwrap();
        assert_eq!(
            forth.interpret_source("record3", "t"),
            Err(Error::Stack(StackError::Underflow(StackKind::Data)))
        );
        assert_eq!(forth.host_ctxt.len(), 6);
    }

    #[test]
    fn natives_must_exist_before_use() {
        let mut forth = forth();
        assert!(forth.interpret_source(": go later ;", "t").is_err());
        forth
            .create_builtin_word("later", 0, |_: &mut Vec<i32>, _| Ok(None))
            .unwrap();
        forth.interpret_source(": go later ;", "t").unwrap();
        assert_eq!(
            forth.create_builtin_word("bad name", 0, |_: &mut Vec<i32>, _| Ok(None)),
            Err(Error::InvalidWordName("bad name".into()))
        );
        assert!(forth.add_builtin("", Forth::dup).is_err());
    }

    #[test]
    fn natives_read_strings_from_memory() {
        let mut forth = Forth::new(ForthParams::default(), String::new(), Forth::FULL_BUILTINS);
        forth
            .create_builtin_word("say", 2, |out: &mut String, args| {
                let bytes = args.bytes(args[0], args[1])?;
                out.push_str(&String::from_utf8_lossy(bytes));
                Ok(None)
            })
            .unwrap();
        forth
            .interpret_source(r#": hi s" HELLO" say ; hi s" !" say"#, "t")
            .unwrap();
        assert_eq!(forth.host_ctxt, "HELLO!");
        assert!(forth.data_stack.is_empty());
    }

    #[test]
    fn natives_share_program_output() {
        let mut forth = forth();
        forth
            .create_builtin_word("show", 1, |_: &mut Vec<i32>, mut args| {
                let text = format!("<{}>", args[0]);
                args.output().push_str(&text)?;
                Ok(None)
            })
            .unwrap();
        forth
            .interpret_source(r#"65 emit 3 show ." !""#, "t")
            .unwrap();
        assert_eq!(forth.output.as_str(), "A<3>!");
    }

    #[test]
    fn string_literal_must_close() {
        let mut forth = forth();
        assert!(matches!(
            forth.interpret_source(r#": a ." never closed ;"#, "t"),
            Err(Error::MissingStringTerminator { .. })
        ));
        forth.interpret_source("( unterminated comment", "t").unwrap();
    }
}
