//! Two-pass MSL compiler.
//!
//! Pass 1 collects top-level `FUNC` blocks into a [`FunctionTable`]; pass 2
//! lowers the remaining statements and expands `CALL` and `LOOP` in place.
//! The table is owned by the returned [`CompiledScript`], so concurrent
//! compiles share nothing.

use std::collections::{BTreeMap, HashSet};
use std::ops::RangeInclusive;

use tracing::debug;

use crate::config::CompilerConfig;
use crate::error::{CompileError, CompileErrorKind, CompileErrors};

use super::command::Command;
use super::lexer::{self, BlockKind, Node};
use super::parser::{is_identifier, parse_statement};

/// Compiler limits; see [`CompilerConfig`].
pub type CompilerOptions = CompilerConfig;

/// A named, parsed function body.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Function name as written in the header.
    pub name: String,
    /// Body commands; may still contain `CALL` and `LOOP`.
    pub commands: Vec<Command>,
    /// Source lines from header to terminator.
    pub lines: RangeInclusive<usize>,
    /// Position among the top-level statements.
    order: usize,
}

impl Function {
    /// Line of the `FUNC` header.
    #[inline]
    pub fn defined_at(&self) -> usize {
        *self.lines.start()
    }
}

/// Function symbol table for one compile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionTable {
    functions: BTreeMap<String, Function>,
}

impl FunctionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a function.
    ///
    /// # Errors
    ///
    /// Hands the function back if the name is already taken.
    pub fn define(&mut self, function: Function) -> core::result::Result<(), Function> {
        if self.functions.contains_key(&function.name) {
            return Err(function);
        }
        self.functions.insert(function.name.clone(), function);
        Ok(())
    }

    /// Look up a function by name.
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Check if a function exists.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Number of defined functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if no function is defined.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Function names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Iterate over functions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }
}

/// Output of a successful compile.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledScript {
    /// Flat command sequence, free of `CALL` and `LOOP`.
    pub commands: Vec<Command>,
    /// Functions defined by the script.
    pub functions: FunctionTable,
}

/// MSL compiler.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompilerOptions,
}

impl Compiler {
    /// Create a compiler with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compiler with explicit limits.
    pub fn with_options(options: CompilerOptions) -> Self {
        Self { options }
    }

    /// Active limits.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile script text.
    ///
    /// # Errors
    ///
    /// Returns every diagnostic found, ordered by line. Compilation continues
    /// past the first error so one run reports as much as possible.
    pub fn compile(&self, source: &str) -> core::result::Result<CompiledScript, CompileErrors> {
        let mut errors = Vec::new();
        let nodes = lexer::structure(lexer::tokenize(source), &mut errors);

        // Pass 1: function definitions
        let mut functions = FunctionTable::new();
        let mut program = Vec::with_capacity(nodes.len());
        for (order, node) in nodes.into_iter().enumerate() {
            match node {
                Node::Block {
                    kind: BlockKind::Func,
                    argument,
                    line,
                    end_line,
                    body,
                } => {
                    let commands = lower(body, &mut errors);
                    if !is_identifier(&argument) {
                        errors.push(CompileError::new(
                            line,
                            CompileErrorKind::MalformedFunction,
                            format!("invalid function name '{}'", argument),
                        ));
                        continue;
                    }
                    let function = Function {
                        name: argument,
                        commands,
                        lines: line..=end_line,
                        order,
                    };
                    if let Err(duplicate) = functions.define(function) {
                        errors.push(CompileError::new(
                            line,
                            CompileErrorKind::MalformedFunction,
                            format!("function '{}' is already defined", duplicate.name),
                        ));
                    }
                }
                other => program.push((order, lower(vec![other], &mut errors))),
            }
        }

        // Calls must follow the definition they refer to, even on one line.
        for function in functions.iter() {
            check_forward_calls(&function.commands, function.order, &functions, &mut errors);
        }
        for (order, commands) in &program {
            check_forward_calls(commands, *order, &functions, &mut errors);
        }

        // Pass 2: CALL/LOOP expansion
        let program: Vec<Command> = program.into_iter().flat_map(|(_, c)| c).collect();
        let mut expander = Expander {
            functions: &functions,
            options: &self.options,
            errors: &mut errors,
            stack: Vec::new(),
            limit_hit: false,
        };
        let mut commands = Vec::with_capacity(program.len());
        expander.expand(&program, &mut commands);

        if !errors.is_empty() {
            let mut seen = HashSet::new();
            errors.retain(|e| seen.insert(e.clone()));
            debug!(errors = errors.len(), "script rejected");
            return Err(CompileErrors::new(errors));
        }

        debug!(
            commands = commands.len(),
            functions = functions.len(),
            "script compiled"
        );
        Ok(CompiledScript {
            commands,
            functions,
        })
    }
}

/// Compile with default limits.
///
/// # Errors
///
/// See [`Compiler::compile`].
pub fn compile(source: &str) -> core::result::Result<CompiledScript, CompileErrors> {
    Compiler::new().compile(source)
}

/// Turn statement nodes into commands, keeping `CALL` and `LOOP` nodes.
fn lower(nodes: Vec<Node>, errors: &mut Vec<CompileError>) -> Vec<Command> {
    let mut commands = Vec::with_capacity(nodes.len());

    for node in nodes {
        match node {
            Node::Statement { text, line } => match parse_statement(&text, line) {
                Ok(parsed) => commands.extend(parsed),
                Err(e) => errors.push(e),
            },
            Node::Block {
                kind: BlockKind::Func,
                argument,
                line,
                body,
                ..
            } => {
                errors.push(CompileError::new(
                    line,
                    CompileErrorKind::MalformedFunction,
                    format!("function '{}' must be defined at top level", argument),
                ));
                // Still report problems inside the misplaced body.
                lower(body, errors);
            }
            Node::Block {
                kind: BlockKind::Loop,
                argument,
                line,
                body,
                ..
            } => {
                let body = lower(body, errors);
                match argument.parse::<u32>() {
                    Ok(count) => commands.push(Command::Loop { count, body, line }),
                    Err(_) => errors.push(CompileError::new(
                        line,
                        CompileErrorKind::MalformedNumber,
                        format!("invalid loop count '{}'", argument),
                    )),
                }
            }
        }
    }

    commands
}

/// Report calls from the statement at `order` to functions defined after it.
fn check_forward_calls(
    commands: &[Command],
    order: usize,
    functions: &FunctionTable,
    errors: &mut Vec<CompileError>,
) {
    for command in commands {
        match command {
            Command::Call { name, line } => {
                if let Some(function) = functions.get(name) {
                    if function.order > order {
                        errors.push(CompileError::new(
                            *line,
                            CompileErrorKind::UndefinedFunction,
                            format!(
                                "function '{}' is referenced before its definition at line {}",
                                name,
                                function.defined_at()
                            ),
                        ));
                    }
                }
            }
            Command::Loop { body, .. } => check_forward_calls(body, order, functions, errors),
            _ => {}
        }
    }
}

struct Expander<'a> {
    functions: &'a FunctionTable,
    options: &'a CompilerOptions,
    errors: &'a mut Vec<CompileError>,
    /// Names of the functions currently being expanded, outermost first.
    stack: Vec<&'a str>,
    limit_hit: bool,
}

impl<'a> Expander<'a> {
    fn expand(&mut self, commands: &'a [Command], out: &mut Vec<Command>) {
        for command in commands {
            if self.limit_hit {
                return;
            }

            match command {
                Command::Call { name, line } => self.expand_call(name, *line, out),
                Command::Loop { count, body, line } => {
                    let mut unrolled = Vec::new();
                    self.expand(body, &mut unrolled);
                    if self.limit_hit {
                        return;
                    }
                    if unrolled.is_empty() || *count == 0 {
                        continue;
                    }

                    let total = unrolled.len().saturating_mul(*count as usize);
                    if out.len().saturating_add(total) > self.options.max_expanded_commands {
                        self.hit_limit(*line);
                        return;
                    }
                    for _ in 0..*count {
                        out.extend(unrolled.iter().cloned());
                    }
                }
                other => {
                    if out.len() >= self.options.max_expanded_commands {
                        self.hit_limit(other.line());
                        return;
                    }
                    out.push(other.clone());
                }
            }
        }
    }

    fn expand_call(&mut self, name: &'a str, line: usize, out: &mut Vec<Command>) {
        let functions = self.functions;
        let function = match functions.get(name) {
            Some(f) => f,
            None => {
                self.error(
                    line,
                    CompileErrorKind::UndefinedFunction,
                    format!("function '{}' is not defined", name),
                );
                return;
            }
        };

        if self.stack.contains(&name) {
            let cycle = self
                .stack
                .iter()
                .skip_while(|n| **n != name)
                .chain(core::iter::once(&name))
                .copied()
                .collect::<Vec<_>>()
                .join(" -> ");
            self.error(
                line,
                CompileErrorKind::RecursiveCall,
                format!("recursive call cycle {}", cycle),
            );
            return;
        }

        if self.stack.len() >= self.options.max_call_depth {
            self.error(
                line,
                CompileErrorKind::RecursiveCall,
                format!(
                    "call to '{}' exceeds the maximum depth of {}",
                    name, self.options.max_call_depth
                ),
            );
            return;
        }

        self.stack.push(name);
        self.expand(&function.commands, out);
        self.stack.pop();
    }

    fn hit_limit(&mut self, line: usize) {
        self.limit_hit = true;
        self.error(
            line,
            CompileErrorKind::ExpansionLimit,
            format!(
                "expansion exceeds {} commands",
                self.options.max_expanded_commands
            ),
        );
    }

    fn error(&mut self, line: usize, kind: CompileErrorKind, message: String) {
        self.errors.push(CompileError::new(line, kind, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::Axis;

    fn kinds(source: &str) -> Vec<CompileErrorKind> {
        compile(source)
            .unwrap_err()
            .iter()
            .map(|e| e.kind)
            .collect()
    }

    #[test]
    fn test_function_expansion() {
        let script = compile("FUNC(PICK){Z(100);G(1);}\nCALL(PICK);\nCALL(PICK);").unwrap();
        assert_eq!(script.commands.len(), 4);
        assert_eq!(script.functions.len(), 1);

        let pick = script.functions.get("PICK").unwrap();
        assert_eq!(pick.lines, 1..=1);
        assert_eq!(pick.commands.len(), 2);
        // Expanded commands keep the line they were written on.
        assert_eq!(script.commands[0].line(), 1);
    }

    #[test]
    fn test_nested_calls_and_loops() {
        let source = "\
FUNC PLACE
  Z(0)
  G(0)
ENDFUNC
FUNC CYCLE
  CALL PLACE
  X(10)
ENDFUNC
LOOP 2
  CALL(CYCLE)
ENDLOOP
";
        let script = compile(source).unwrap();
        assert_eq!(script.commands.len(), 6);
        assert_eq!(script.commands[2].targets().unwrap().get(Axis::X), Some(&10));
    }

    #[test]
    fn test_loop_zero_count() {
        let script = compile("LOOP(0){X(1);}\nY(2)").unwrap();
        assert_eq!(script.commands.len(), 1);
    }

    #[test]
    fn test_undefined_and_forward_reference() {
        assert_eq!(kinds("CALL(NOPE)"), vec![CompileErrorKind::UndefinedFunction]);

        let errors = compile("CALL(LATER)\nFUNC(LATER){X(1)}").unwrap_err();
        assert_eq!(errors.len(), 1);
        let headline = errors.headline().unwrap();
        assert_eq!(headline.kind, CompileErrorKind::UndefinedFunction);
        assert!(headline.message.contains("before its definition"));
    }

    #[test]
    fn test_forward_reference_on_one_line() {
        let errors = compile("CALL(A); FUNC(A){X(1)}").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.headline().unwrap().kind, CompileErrorKind::UndefinedFunction);

        let errors = compile("FUNC(B){CALL(A)}; FUNC(A){X(1)}").unwrap_err();
        assert_eq!(errors.headline().unwrap().kind, CompileErrorKind::UndefinedFunction);

        let script = compile("FUNC(A){X(1)}; CALL(A); CALL(A)").unwrap();
        assert_eq!(script.commands.len(), 2);
    }

    #[test]
    fn test_empty_loop_with_huge_count() {
        let script = compile("LOOP(4000000000){}\nX(1)").unwrap();
        assert_eq!(script.commands.len(), 1);

        let script = compile("FUNC(NOTHING){}\nLOOP(4000000000){CALL(NOTHING)}").unwrap();
        assert!(script.commands.is_empty());

        let errors = compile("LOOP(4000000000){X(1)}").unwrap_err();
        assert_eq!(errors.headline().unwrap().kind, CompileErrorKind::ExpansionLimit);
    }

    #[test]
    fn test_self_recursion_is_rejected() {
        let errors = compile("FUNC(A){CALL(A)}\nCALL(A)").unwrap_err();
        let headline = errors.headline().unwrap();
        assert_eq!(headline.kind, CompileErrorKind::RecursiveCall);
        assert!(headline.message.contains("A -> A"), "{}", headline.message);
    }

    #[test]
    fn test_duplicate_and_nested_functions() {
        assert_eq!(
            kinds("FUNC(A){X(1)}\nFUNC(A){X(2)}"),
            vec![CompileErrorKind::MalformedFunction]
        );
        assert_eq!(
            kinds("LOOP(2){\nFUNC(B){X(1)}\n}"),
            vec![CompileErrorKind::MalformedFunction]
        );
    }

    #[test]
    fn test_errors_are_aggregated() {
        let errors = compile("X(1)\nBOGUS\nY(1o)\nCALL(MISSING)").unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.headline().unwrap().line, 2);
        assert!(errors.contains_kind(CompileErrorKind::MalformedNumber));
    }

    #[test]
    fn test_expansion_limit() {
        let compiler = Compiler::with_options(CompilerOptions {
            max_call_depth: 8,
            max_expanded_commands: 50,
        });
        let errors = compiler.compile("LOOP(10){LOOP(10){X(1)}}").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.headline().unwrap().kind, CompileErrorKind::ExpansionLimit);

        assert!(compiler.compile("LOOP(5){LOOP(10){X(1)}}").is_ok());
    }

    #[test]
    fn test_depth_limit() {
        let compiler = Compiler::with_options(CompilerOptions {
            max_call_depth: 2,
            max_expanded_commands: 1000,
        });
        let source = "FUNC(A){X(1)}\nFUNC(B){CALL(A)}\nFUNC(C){CALL(B)}\nCALL(C)";
        let errors = compiler.compile(source).unwrap_err();
        assert_eq!(errors.headline().unwrap().kind, CompileErrorKind::RecursiveCall);
        assert!(Compiler::new().compile(source).is_ok());
    }
}
