// File: src/lib.rs
//
// Library interface for the RookScript compiler and virtual machine.
// Exposes the value model, the compile pipeline (lexer -> parser ->
// optimizer -> Script), and the embedding surface (builder, instance,
// resolvers, environment).

use std::sync::Arc;

pub mod builder;
pub mod bytecode;
pub mod containers;
pub mod environment;
pub mod errors;
pub mod instance;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod resolver;
pub mod stack;
pub mod stdlib;
pub mod value;

use bytecode::Script;
use errors::ScriptParseError;
use resolver::HostFunctionResolver;

/// Compiles source text into an optimized [`Script`].
///
/// The resolver (if any) is consulted at parse time to validate host
/// calls and decide whether their results are consumed; pass the same
/// resolver the instance will run with.
///
/// ```ignore
/// let registry = Arc::new(rookscript::stdlib::CommonFunction::registry());
/// let script = rookscript::compile("main() { return 1 + 2; }", Some(registry))?;
/// ```
pub fn compile(
    source: &str,
    resolver: Option<Arc<dyn HostFunctionResolver>>,
) -> Result<Script, ScriptParseError> {
    let script = parser::parse(source, resolver)?;
    Ok(optimizer::optimize(script))
}
