//! # Test Utilities
//!
//! Helpers for running "ui tests": scripted sessions of gameforth source and
//! the output (or failure) each line should produce.
//!
//! ## UI Tests
//!
//! A ui test is made of lines of these kinds:
//!
//! * VM settings, written as `( key VALUE )`. They must come before the first
//!   input line. Recognized keys:
//!     * `( data_stack_elems USIZE )`
//!     * `( return_stack_elems USIZE )`
//!     * `( memory_bytes USIZE )`
//!     * `( output_buf_elems USIZE )`
//!     * `( step_budget U64 )`
//! * Any other `( ... )` line is a comment.
//! * `> ...` is source that must interpret without error.
//! * `< ...` is one line of output expected from the preceding `>` line.
//!   With no `<` lines, whatever the input prints is accepted.
//! * `x ...` is source that must fail. Which error it raises is not checked,
//!   and it may not be followed by `<` lines.
//!
//! Each input line is interpreted as its own source text, so a definition
//! must open and close on the same line. Output is compared line by line,
//! ignoring trailing whitespace.
//!
//! ### Example
//!
//! ```rust
//! # use gameforth::testutil::blocking_runtest;
//! #
//! # blocking_runtest(r#"
//! ( a one-deep data stack )
//! ( data_stack_elems 1 )
//!
//! > : star 42 emit ;
//!
//! > star
//! < *
//!
//! x 1 2
//! # "#)
//! ```

use crate::{Error, Forth, ForthParams};

/// Label reported in diagnostics for ui-test input.
const LABEL: &str = "ui-test";

/// Runs a ui test, settings lines included, on a fresh VM with the full
/// builtin set. Panics on the first mismatch.
pub fn blocking_runtest(contents: &str) {
    let script = Script::parse(contents, true);
    let mut forth = Forth::new(script.params.clone(), (), Forth::FULL_BUILTINS);
    script.run(&mut forth);
}

/// Runs a ui test against an existing VM, e.g. one with natives installed.
///
/// Settings lines are rejected, since the VM is already built.
pub fn blocking_runtest_with<T>(forth: &mut Forth<T>, contents: &str) {
    Script::parse(contents, false).run(forth);
}

#[derive(Debug)]
enum Expect {
    AnyOutput,
    Lines(Vec<String>),
    Failure,
}

#[derive(Debug)]
struct Step {
    source: String,
    expect: Expect,
}

#[derive(Debug, Default)]
struct Script {
    params: ForthParams,
    steps: Vec<Step>,
}

impl Script {
    fn parse(contents: &str, settings_allowed: bool) -> Self {
        let mut script = Script::default();
        for line in contents.lines().map(str::trim_start) {
            if let Some(source) = line.strip_prefix("> ") {
                script.push(source, Expect::AnyOutput);
            } else if let Some(source) = line.strip_prefix("x ") {
                script.push(source, Expect::Failure);
            } else if let Some(out) = line.strip_prefix("< ") {
                let step = script
                    .steps
                    .last_mut()
                    .expect("expected output must follow an input line");
                match &mut step.expect {
                    Expect::AnyOutput => step.expect = Expect::Lines(vec![out.to_string()]),
                    Expect::Lines(lines) => lines.push(out.to_string()),
                    Expect::Failure => panic!("a failing line has no output: {:?}", step.source),
                }
            } else if let Some(body) = line.strip_prefix("( ") {
                let words: Vec<&str> = body.split_whitespace().collect();
                if let [key, value, ")"] = words.as_slice() {
                    if script.set_param(key, value) {
                        assert!(settings_allowed, "settings are not allowed here: {line:?}");
                        assert!(script.steps.is_empty(), "settings must come first: {line:?}");
                    }
                }
            }
        }
        script
    }

    fn push(&mut self, source: &str, expect: Expect) {
        self.steps.push(Step {
            source: source.to_string(),
            expect,
        });
    }

    /// Returns false if `key` is not a setting, making the line a comment.
    fn set_param(&mut self, key: &str, value: &str) -> bool {
        let params = &mut self.params;
        let usize_param = |value: &str| -> usize {
            value.parse().unwrap_or_else(|e| panic!("bad value {value:?}: {e}"))
        };
        match key {
            "data_stack_elems" => params.data_stack_elems = usize_param(value),
            "return_stack_elems" => params.return_stack_elems = usize_param(value),
            "memory_bytes" => params.memory_bytes = usize_param(value),
            "output_buf_elems" => params.output_buf_elems = usize_param(value),
            "step_budget" => {
                let budget = value.parse().unwrap_or_else(|e| panic!("bad value {value:?}: {e}"));
                params.step_budget = Some(budget);
            }
            _ => return false,
        }
        true
    }

    fn run<T>(&self, forth: &mut Forth<T>) {
        for step in &self.steps {
            println!("> {}", step.source);
            let res = forth.interpret_source(&step.source, LABEL);
            let output = forth.output.take();
            println!("< {output}");
            step.check(res, &output);
        }
    }
}

impl Step {
    fn check(&self, res: Result<(), Error>, output: &str) {
        match (&self.expect, res) {
            (Expect::AnyOutput, Ok(())) | (Expect::Failure, Err(_)) => {}
            (Expect::Lines(expected), Ok(())) => {
                let actual: Vec<&str> = output.lines().map(str::trim_end).collect();
                let expected: Vec<&str> = expected.iter().map(|l| l.trim_end()).collect();
                assert_eq!(actual, expected, "wrong output for {:?}", self.source);
            }
            (Expect::Failure, Ok(())) => {
                panic!("{:?} should have failed, printed {output:?}", self.source)
            }
            (_, Err(e)) => panic!("{:?} failed: {e} ({e:?})", self.source),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn settings_shape_the_vm() {
        let script = Script::parse("( data_stack_elems 2 )\n( a comment )\n> 1 2\nx 3", true);
        assert_eq!(script.params.data_stack_elems, 2);
        assert_eq!(script.steps.len(), 2);

        blocking_runtest(
            r#"
            ( data_stack_elems 2 )
            > 1 2 + .
            < 3
            x 1 2 3
            "#,
        );
    }

    #[test]
    #[should_panic(expected = "settings are not allowed here")]
    fn settings_rejected_on_a_built_vm() {
        let mut forth = Forth::new(ForthParams::default(), (), Forth::FULL_BUILTINS);
        blocking_runtest_with(&mut forth, "( step_budget 10 )");
    }
}
