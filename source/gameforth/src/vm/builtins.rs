use core::fmt::Write;

use crate::{
    dictionary::BuiltinEntry,
    memory::{addr_from_cell, cell_from_addr, CELL},
    Error, Forth, ReplaceErr,
};

// NOTE: This macro exists so the builtin tables read as a flat list of
// name/function pairs.
macro_rules! builtin {
    ($name:literal, $func:expr) => {
        BuiltinEntry {
            name: $name,
            func: $func,
        }
    };
}

#[inline]
fn flag(b: bool) -> i32 {
    if b {
        -1
    } else {
        0
    }
}

impl<T: 'static> Forth<T> {
    pub const FULL_BUILTINS: &'static [BuiltinEntry<T>] = &[
        // arithmetic
        builtin!("+", Self::add),
        builtin!("-", Self::sub),
        builtin!("*", Self::mul),
        builtin!("/", Self::div),
        builtin!("mod", Self::modu),
        builtin!("/mod", Self::div_mod),
        builtin!("negate", Self::negate),
        builtin!("abs", Self::abs),
        builtin!("min", Self::min),
        builtin!("max", Self::max),
        builtin!("1+", Self::one_plus),
        builtin!("1-", Self::one_minus),
        builtin!("2*", Self::two_star),
        builtin!("2/", Self::two_slash),
        // comparison and logic
        builtin!("=", Self::equal),
        builtin!("<>", Self::not_equal),
        builtin!("<", Self::less),
        builtin!(">", Self::greater),
        builtin!("<=", Self::less_equal),
        builtin!(">=", Self::greater_equal),
        builtin!("0=", Self::zero_equal),
        builtin!("0<", Self::zero_less),
        builtin!("0>", Self::zero_greater),
        builtin!("not", Self::zero_equal),
        builtin!("and", Self::and),
        builtin!("or", Self::or),
        builtin!("xor", Self::xor),
        builtin!("invert", Self::invert),
        builtin!("lshift", Self::lshift),
        builtin!("rshift", Self::rshift),
        // stack
        builtin!("dup", Self::dup),
        builtin!("?dup", Self::question_dup),
        builtin!("drop", Self::drop),
        builtin!("swap", Self::swap),
        builtin!("over", Self::over),
        builtin!("rot", Self::rot),
        builtin!("-rot", Self::minus_rot),
        builtin!("nip", Self::nip),
        builtin!("tuck", Self::tuck),
        builtin!("pick", Self::pick),
        builtin!("2dup", Self::two_dup),
        builtin!("2drop", Self::two_drop),
        builtin!("depth", Self::depth),
        // return stack and loops
        builtin!(">r", Self::data_to_return_stack),
        builtin!("r>", Self::return_to_data_stack),
        builtin!("r@", Self::return_fetch),
        builtin!("i", Self::loop_i),
        builtin!("j", Self::loop_j),
        builtin!("unloop", Self::unloop),
        // memory
        builtin!("@", Self::var_load),
        builtin!("!", Self::var_store),
        builtin!("c@", Self::byte_load),
        builtin!("c!", Self::byte_store),
        builtin!("+!", Self::var_add),
        builtin!("here", Self::here),
        builtin!("allot", Self::allot),
        builtin!(",", Self::comma),
        builtin!("c,", Self::c_comma),
        builtin!("cells", Self::cells),
        builtin!("cell+", Self::cell_plus),
        // output
        builtin!(".", Self::pop_print),
        builtin!("emit", Self::emit),
        builtin!("cr", Self::cr),
        builtin!("space", Self::space),
        builtin!("spaces", Self::spaces),
        builtin!("type", Self::type_str),
    ];

    fn pop(&mut self) -> Result<i32, Error> {
        Ok(self.data_stack.try_pop()?)
    }

    fn push(&mut self, val: i32) -> Result<(), Error> {
        Ok(self.data_stack.push(val)?)
    }

    /// Pops `b` then `a`, and pushes `f(a, b)`.
    fn binop(&mut self, f: impl FnOnce(i32, i32) -> i32) -> Result<(), Error> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(f(a, b))
    }

    fn unop(&mut self, f: impl FnOnce(i32) -> i32) -> Result<(), Error> {
        let a = self.pop()?;
        self.push(f(a))
    }

    // Runtime targets emitted by the compiler

    pub fn literal(&mut self) -> Result<(), Error> {
        let val = self.take_operand()?;
        self.push(val)
    }

    pub fn jump(&mut self) -> Result<(), Error> {
        let target = self.take_operand()?;
        self.jump_to(target)
    }

    pub fn jump_if_zero(&mut self) -> Result<(), Error> {
        let target = self.take_operand()?;
        if self.pop()? == 0 {
            self.jump_to(target)?;
        }
        Ok(())
    }

    pub fn exit(&mut self) -> Result<(), Error> {
        self.return_from_word()
    }

    /// `( limit start -- ) ( R: -- limit index )`
    pub fn do_start(&mut self) -> Result<(), Error> {
        let start = self.pop()?;
        let limit = self.pop()?;
        self.return_stack.push(limit)?;
        self.return_stack.push(start)?;
        Ok(())
    }

    pub fn loop_inc(&mut self) -> Result<(), Error> {
        self.loop_step(1)
    }

    pub fn plus_loop(&mut self) -> Result<(), Error> {
        let step = self.pop()?;
        self.loop_step(step)
    }

    /// Advances the innermost loop index by `step`.
    ///
    /// The loop finishes once the index crosses the boundary between
    /// `limit - 1` and `limit`, in either direction.
    fn loop_step(&mut self, step: i32) -> Result<(), Error> {
        let body = self.take_operand()?;
        let index = self.return_stack.try_pop()?;
        let limit = self.return_stack.try_peek()?;

        let offset = index.wrapping_sub(limit);
        let next = offset.wrapping_add(step);
        let crossed = ((offset ^ next) & !(step ^ next)) < 0;
        if crossed {
            self.return_stack.try_pop()?;
            Ok(())
        } else {
            self.return_stack.push(index.wrapping_add(step))?;
            self.jump_to(body)
        }
    }

    pub fn str_literal(&mut self) -> Result<(), Error> {
        let len = self.take_operand()?;
        let len_usize = usize::try_from(len).replace_err(Error::MissingOperand)?;
        let addr = self.skip_inline(len_usize)?;
        self.push(cell_from_addr(addr)?)?;
        self.push(len)
    }

    pub fn write_str_lit(&mut self) -> Result<(), Error> {
        let len = self.take_operand()?;
        let len = usize::try_from(len).replace_err(Error::MissingOperand)?;
        let addr = self.skip_inline(len)?;
        let bytes = self.memory.bytes(addr, len)?;
        self.output.push_bstr(bytes)?;
        Ok(())
    }

    // Arithmetic

    pub fn add(&mut self) -> Result<(), Error> {
        self.binop(i32::wrapping_add)
    }

    pub fn sub(&mut self) -> Result<(), Error> {
        self.binop(i32::wrapping_sub)
    }

    pub fn mul(&mut self) -> Result<(), Error> {
        self.binop(i32::wrapping_mul)
    }

    pub fn div(&mut self) -> Result<(), Error> {
        let b = self.pop()?;
        let a = self.pop()?;
        if b == 0 {
            return Err(Error::DivideByZero);
        }
        self.push(a.wrapping_div(b))
    }

    pub fn modu(&mut self) -> Result<(), Error> {
        let b = self.pop()?;
        let a = self.pop()?;
        if b == 0 {
            return Err(Error::DivideByZero);
        }
        self.push(a.wrapping_rem(b))
    }

    pub fn div_mod(&mut self) -> Result<(), Error> {
        let b = self.pop()?;
        let a = self.pop()?;
        if b == 0 {
            return Err(Error::DivideByZero);
        }
        self.push(a.wrapping_rem(b))?;
        self.push(a.wrapping_div(b))
    }

    pub fn negate(&mut self) -> Result<(), Error> {
        self.unop(i32::wrapping_neg)
    }

    pub fn abs(&mut self) -> Result<(), Error> {
        self.unop(i32::wrapping_abs)
    }

    pub fn min(&mut self) -> Result<(), Error> {
        self.binop(core::cmp::min)
    }

    pub fn max(&mut self) -> Result<(), Error> {
        self.binop(core::cmp::max)
    }

    pub fn one_plus(&mut self) -> Result<(), Error> {
        self.unop(|a| a.wrapping_add(1))
    }

    pub fn one_minus(&mut self) -> Result<(), Error> {
        self.unop(|a| a.wrapping_sub(1))
    }

    pub fn two_star(&mut self) -> Result<(), Error> {
        self.unop(|a| a.wrapping_shl(1))
    }

    pub fn two_slash(&mut self) -> Result<(), Error> {
        self.unop(|a| a >> 1)
    }

    // Comparison and logic. Flags are -1 (true) and 0 (false).

    pub fn equal(&mut self) -> Result<(), Error> {
        self.binop(|a, b| flag(a == b))
    }

    pub fn not_equal(&mut self) -> Result<(), Error> {
        self.binop(|a, b| flag(a != b))
    }

    pub fn less(&mut self) -> Result<(), Error> {
        self.binop(|a, b| flag(a < b))
    }

    pub fn greater(&mut self) -> Result<(), Error> {
        self.binop(|a, b| flag(a > b))
    }

    pub fn less_equal(&mut self) -> Result<(), Error> {
        self.binop(|a, b| flag(a <= b))
    }

    pub fn greater_equal(&mut self) -> Result<(), Error> {
        self.binop(|a, b| flag(a >= b))
    }

    pub fn zero_equal(&mut self) -> Result<(), Error> {
        self.unop(|a| flag(a == 0))
    }

    pub fn zero_less(&mut self) -> Result<(), Error> {
        self.unop(|a| flag(a < 0))
    }

    pub fn zero_greater(&mut self) -> Result<(), Error> {
        self.unop(|a| flag(a > 0))
    }

    pub fn and(&mut self) -> Result<(), Error> {
        self.binop(|a, b| a & b)
    }

    pub fn or(&mut self) -> Result<(), Error> {
        self.binop(|a, b| a | b)
    }

    pub fn xor(&mut self) -> Result<(), Error> {
        self.binop(|a, b| a ^ b)
    }

    pub fn invert(&mut self) -> Result<(), Error> {
        self.unop(|a| !a)
    }

    pub fn lshift(&mut self) -> Result<(), Error> {
        self.binop(|a, n| {
            u32::try_from(n)
                .ok()
                .and_then(|n| (a as u32).checked_shl(n))
                .unwrap_or(0) as i32
        })
    }

    pub fn rshift(&mut self) -> Result<(), Error> {
        self.binop(|a, n| {
            u32::try_from(n)
                .ok()
                .and_then(|n| (a as u32).checked_shr(n))
                .unwrap_or(0) as i32
        })
    }

    // Stack manipulation

    pub fn dup(&mut self) -> Result<(), Error> {
        let val = self.data_stack.try_peek()?;
        self.push(val)
    }

    pub fn question_dup(&mut self) -> Result<(), Error> {
        let val = self.data_stack.try_peek()?;
        if val != 0 {
            self.push(val)?;
        }
        Ok(())
    }

    pub fn drop(&mut self) -> Result<(), Error> {
        self.pop().map(drop)
    }

    pub fn swap(&mut self) -> Result<(), Error> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(b)?;
        self.push(a)
    }

    pub fn over(&mut self) -> Result<(), Error> {
        let val = self.data_stack.try_peek_back_n(1)?;
        self.push(val)
    }

    pub fn rot(&mut self) -> Result<(), Error> {
        let c = self.pop()?;
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(b)?;
        self.push(c)?;
        self.push(a)
    }

    pub fn minus_rot(&mut self) -> Result<(), Error> {
        let c = self.pop()?;
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(c)?;
        self.push(a)?;
        self.push(b)
    }

    pub fn nip(&mut self) -> Result<(), Error> {
        let b = self.pop()?;
        self.pop()?;
        self.push(b)
    }

    pub fn tuck(&mut self) -> Result<(), Error> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(b)?;
        self.push(a)?;
        self.push(b)
    }

    pub fn pick(&mut self) -> Result<(), Error> {
        let n = self.pop()?;
        let n = usize::try_from(n).replace_err(Error::LoopCountIsNegative)?;
        let val = self.data_stack.try_peek_back_n(n)?;
        self.push(val)
    }

    pub fn two_dup(&mut self) -> Result<(), Error> {
        let a = self.data_stack.try_peek_back_n(1)?;
        let b = self.data_stack.try_peek()?;
        self.push(a)?;
        self.push(b)
    }

    pub fn two_drop(&mut self) -> Result<(), Error> {
        self.pop()?;
        self.pop().map(drop)
    }

    pub fn depth(&mut self) -> Result<(), Error> {
        let depth = cell_from_addr(self.data_stack.depth())?;
        self.push(depth)
    }

    // Return stack

    pub fn data_to_return_stack(&mut self) -> Result<(), Error> {
        let val = self.pop()?;
        self.return_stack.push(val)?;
        Ok(())
    }

    pub fn return_to_data_stack(&mut self) -> Result<(), Error> {
        let val = self.return_stack.try_pop()?;
        self.push(val)
    }

    pub fn return_fetch(&mut self) -> Result<(), Error> {
        let val = self.return_stack.try_peek()?;
        self.push(val)
    }

    pub fn loop_i(&mut self) -> Result<(), Error> {
        let val = self.return_stack.try_peek()?;
        self.push(val)
    }

    pub fn loop_j(&mut self) -> Result<(), Error> {
        let val = self.return_stack.try_peek_back_n(2)?;
        self.push(val)
    }

    pub fn unloop(&mut self) -> Result<(), Error> {
        self.return_stack.try_pop()?;
        self.return_stack.try_pop()?;
        Ok(())
    }

    // Memory

    pub fn var_load(&mut self) -> Result<(), Error> {
        let addr = addr_from_cell(self.pop()?)?;
        let val = self.memory.fetch_cell(addr)?;
        self.push(val)
    }

    pub fn var_store(&mut self) -> Result<(), Error> {
        let addr = addr_from_cell(self.pop()?)?;
        let val = self.pop()?;
        self.memory.store_cell(addr, val)?;
        Ok(())
    }

    pub fn byte_load(&mut self) -> Result<(), Error> {
        let addr = addr_from_cell(self.pop()?)?;
        let val = self.memory.fetch_byte(addr)?;
        self.push(i32::from(val))
    }

    pub fn byte_store(&mut self) -> Result<(), Error> {
        let addr = addr_from_cell(self.pop()?)?;
        let val = self.pop()?;
        self.memory.store_byte(addr, val as u8)?;
        Ok(())
    }

    pub fn var_add(&mut self) -> Result<(), Error> {
        let addr = addr_from_cell(self.pop()?)?;
        let val = self.pop()?;
        let cur = self.memory.fetch_cell(addr)?;
        self.memory.store_cell(addr, cur.wrapping_add(val))?;
        Ok(())
    }

    pub fn here(&mut self) -> Result<(), Error> {
        let here = cell_from_addr(self.memory.here())?;
        self.push(here)
    }

    pub fn allot(&mut self) -> Result<(), Error> {
        let n = self.pop()?;
        self.memory.allot(n)?;
        Ok(())
    }

    pub fn comma(&mut self) -> Result<(), Error> {
        let val = self.pop()?;
        self.memory.bump_cell(val)?;
        Ok(())
    }

    pub fn c_comma(&mut self) -> Result<(), Error> {
        let val = self.pop()?;
        self.memory.bump_bytes(&[val as u8])?;
        Ok(())
    }

    pub fn cells(&mut self) -> Result<(), Error> {
        self.unop(|n| n.wrapping_mul(CELL as i32))
    }

    pub fn cell_plus(&mut self) -> Result<(), Error> {
        self.unop(|n| n.wrapping_add(CELL as i32))
    }

    // Output

    pub fn pop_print(&mut self) -> Result<(), Error> {
        let val = self.pop()?;
        write!(&mut self.output, "{} ", val)?;
        Ok(())
    }

    pub fn emit(&mut self) -> Result<(), Error> {
        let val = self.pop()?;
        self.output.push_bstr(&[val as u8])?;
        Ok(())
    }

    pub fn cr(&mut self) -> Result<(), Error> {
        self.output.push_str("\n")?;
        Ok(())
    }

    pub fn space(&mut self) -> Result<(), Error> {
        self.output.push_str(" ")?;
        Ok(())
    }

    pub fn spaces(&mut self) -> Result<(), Error> {
        let num = self.pop()?;
        if num.is_negative() {
            return Err(Error::LoopCountIsNegative);
        }
        for _ in 0..num {
            self.output.push_str(" ")?;
        }
        Ok(())
    }

    pub fn type_str(&mut self) -> Result<(), Error> {
        let len = self.pop()?;
        let addr = addr_from_cell(self.pop()?)?;
        let len = usize::try_from(len).replace_err(Error::LoopCountIsNegative)?;
        let bytes = self.memory.bytes(addr, len)?;
        self.output.push_bstr(bytes)?;
        Ok(())
    }
}

#[cfg(test)]
pub mod test {
    use crate::{Error, Forth, ForthParams};

    fn run(src: &str) -> Vec<i32> {
        let mut forth = Forth::new(ForthParams::default(), (), Forth::FULL_BUILTINS);
        forth.interpret_source(src, "t").unwrap();
        forth.data_stack.as_slice().to_vec()
    }

    #[test]
    fn arithmetic() {
        assert_eq!(run("7 2 -"), [5]);
        assert_eq!(run("-7 2 /"), [-3]);
        assert_eq!(run("-7 2 mod"), [-1]);
        assert_eq!(run("7 2 /mod"), [1, 3]);
        assert_eq!(run("2147483647 1 +"), [i32::MIN]);
        assert_eq!(run("3 negate abs 9 4 min 9 4 max"), [3, 4, 9]);
        assert_eq!(run("5 1+ 5 1- 5 2* -5 2/"), [6, 4, 10, -3]);
        assert_eq!(run("1 4 lshift -1 28 rshift 1 40 lshift"), [16, 15, 0]);

        let mut forth = Forth::new(ForthParams::default(), (), Forth::FULL_BUILTINS);
        assert_eq!(forth.interpret_source("1 0 /", "t"), Err(Error::DivideByZero));
        assert_eq!(forth.interpret_source("1 0 mod", "t"), Err(Error::DivideByZero));
    }

    #[test]
    fn comparison() {
        assert_eq!(run("1 2 < 2 1 < 3 3 = 3 4 <>"), [-1, 0, -1, -1]);
        assert_eq!(run("0 0= 5 0= -2 0< 2 0>"), [-1, 0, -1, -1]);
        assert_eq!(run("0 not 12 10 and 12 10 or 12 10 xor 0 invert"), [-1, 8, 14, 6, -1]);
    }

    #[test]
    fn stack_words() {
        assert_eq!(run("1 2 swap over"), [2, 1, 2]);
        assert_eq!(run("1 2 3 rot"), [2, 3, 1]);
        assert_eq!(run("1 2 3 -rot"), [3, 1, 2]);
        assert_eq!(run("1 2 nip 3 4 tuck"), [2, 4, 3, 4]);
        assert_eq!(run("10 20 30 2 pick"), [10, 20, 30, 10]);
        assert_eq!(run("1 2 2dup 2drop depth"), [1, 2, 2]);
        assert_eq!(run("0 ?dup 5 ?dup"), [0, 5, 5]);
    }

    #[test]
    fn loops() {
        assert_eq!(run(": l 5 0 do i loop ; l"), [0, 1, 2, 3, 4]);
        assert_eq!(run(": l 10 0 do i 3 +loop ; l"), [0, 3, 6, 9]);
        assert_eq!(run(": l 0 4 do i -2 +loop ; l"), [4, 2, 0]);
        assert_eq!(run(": l 3 1 do 2 0 do j i loop loop ; l"), [1, 0, 1, 1, 2, 0, 2, 1]);
        assert_eq!(run(": l 0 begin 1+ dup 5 = until ; l"), [5]);
        assert_eq!(
            run(": l 0 begin dup 3 < while dup 1+ repeat ; l"),
            [0, 1, 2, 3]
        );
        assert_eq!(
            run(": l 10 0 do i 2 = if i unloop exit then loop 99 ; l"),
            [2]
        );
        assert_eq!(run(": l 5 >r r@ r> ; l"), [5, 5]);
    }

    #[test]
    fn memory_words() {
        assert_eq!(run("variable v 5 v ! 3 v +! v @"), [8]);
        assert_eq!(run("create b 65 c, 66 c, b c@ b 1 + c@"), [65, 66]);
        assert_eq!(run("here 3 cells allot here swap -"), [12]);
        assert_eq!(run("create t 7 , 8 , t cell+ @"), [8]);
        assert_eq!(run("variable w 300 w c! w c@"), [44]);
    }

    #[test]
    fn output_words() {
        let mut forth = Forth::new(ForthParams::default(), (), Forth::FULL_BUILTINS);
        forth
            .interpret_source(r#"65 emit space 2 spaces 7 . cr s" ok" type"#, "t")
            .unwrap();
        assert_eq!(forth.output.as_str(), "A   7 \nok");
        assert!(forth.data_stack.is_empty());
        assert_eq!(
            forth.interpret_source("-1 spaces", "t"),
            Err(Error::LoopCountIsNegative)
        );
    }

    #[test]
    fn strings_print_as_utf8() {
        let mut forth = Forth::new(ForthParams::default(), (), Forth::FULL_BUILTINS);
        forth
            .interpret_source(r#": cafe ." café" ; s" é" type ." é" cafe 255 emit"#, "t")
            .unwrap();
        assert_eq!(forth.output.as_str(), "éécafé\u{fffd}");
    }
}
