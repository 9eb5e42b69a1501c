//! Assembly language parser and disassembler.
//!
//! Converts human-readable assembly into a [`Script`] and back.
//!
//! # Syntax
//!
//! ```text
//! .constants              # constant pool, one or more values per line
//! 100 0x2a
//! .source                 # starts the next source (the first is source 0)
//! CONSTANT 0              # instruction, with its operand when it takes one
//! TIME_CMP GTE
//! ```
//!
//! - Instructions are uppercase mnemonics (e.g., `ADD`, `TIME_CMP`)
//! - Operands are decimal bytes; storage slots and comparators may be named
//! - Constants are decimal or `0x`-prefixed hexadecimal 256-bit words
//! - Instructions before any `.source` marker open source 0 implicitly
//! - Comments start with `#`
//! - Commas between tokens are ignored

use crate::error;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{INSTRUCTION_WIDTH, Instruction};
use crate::virtual_machine::program::Script;
use primitive_types::U256;
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_CHAR: char = '#';
const SECTION_CONSTANTS: &str = ".constants";
const SECTION_SOURCE: &str = ".source";

/// Formats a compiler-style diagnostic for assembly failures.
pub fn render_assembly_diagnostic(
    file: &str,
    source: &str,
    line: usize,
    offset: usize,
    message: &str,
) -> String {
    let mut diag = String::new();
    let _ = writeln!(diag, "error: {message}");
    let _ = writeln!(diag, " --> {file}:{line}:{offset}");

    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let line_text = raw_line.trim_end_matches('\r');
        let underline = " ".repeat(offset.saturating_sub(1));
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", line, line_text);
        let _ = writeln!(diag, "  | {}^", underline);
    }

    diag
}

/// Logs a diagnostic for a failed assembly.
fn log_assembly_error(file: &str, source: &str, err: &VMError) {
    match err {
        VMError::AssemblyError {
            line,
            offset,
            message,
        } => error!(
            "{}",
            render_assembly_diagnostic(file, source, *line, *offset, message)
        ),
        other => error!("{file}: {other}"),
    }
}

/// Which part of the script the current line feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    /// Before any marker; instructions open source 0.
    None,
    Constants,
    Source,
}

#[derive(Debug, Clone)]
struct Token<'a> {
    text: &'a str,
    /// 1-based column offset in the line.
    offset: usize,
}

/// Tokenize a single line of assembly.
///
/// Rules:
/// - `#` starts a comment
/// - commas are ignored
/// - whitespace-separated tokens
fn tokenize(line: &str) -> Vec<Token<'_>> {
    let code = line.split(COMMENT_CHAR).next().unwrap_or_default();
    let mut out = Vec::with_capacity(4);
    let mut start: Option<usize> = None;

    for (i, c) in code.char_indices() {
        let separator = c == ',' || c.is_whitespace();
        match (separator, start) {
            (true, Some(s)) => {
                out.push(Token {
                    text: &code[s..i],
                    offset: s + 1,
                });
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(Token {
            text: &code[s..],
            offset: s + 1,
        });
    }
    out
}

/// Parses a constant: decimal, or hexadecimal with a `0x` prefix.
pub(crate) fn parse_word(tok: &str) -> Result<U256, String> {
    let parsed = match tok.strip_prefix("0x").or_else(|| tok.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() => U256::from_str_radix(hex, 16).ok(),
        Some(_) => None,
        None => U256::from_dec_str(tok).ok(),
    };
    parsed.ok_or_else(|| format!("invalid constant '{tok}'"))
}

/// Parses one instruction line into its two encoded bytes.
fn parse_instruction(tokens: &[Token]) -> Result<[u8; INSTRUCTION_WIDTH], (usize, String)> {
    let head = &tokens[0];
    let instr = Instruction::from_mnemonic(head.text)
        .ok_or_else(|| (head.offset, format!("unknown instruction '{}'", head.text)))?;
    let kind = instr.operand_kind();

    let operand = match (kind.is_explicit(), &tokens[1..]) {
        (true, [tok]) => kind.parse(tok.text).map_err(|msg| (tok.offset, msg))?,
        (false, []) => 0,
        (true, _) => {
            return Err((
                head.offset,
                format!(
                    "{} expects one {} operand",
                    instr.mnemonic(),
                    kind.describe()
                ),
            ));
        }
        (false, [extra, ..]) => {
            return Err((
                extra.offset,
                format!("{} takes no operand", instr.mnemonic()),
            ));
        }
    };
    Ok([instr as u8, operand])
}

fn assemble_lines(source: &str) -> Result<Script, VMError> {
    let mut sources: Vec<Vec<u8>> = Vec::new();
    let mut constants: Vec<U256> = Vec::new();
    let mut section = Section::None;

    for (line_no, line) in source.lines().enumerate() {
        let tokens = tokenize(line);
        let Some(first) = tokens.first() else {
            continue;
        };
        let fail = |offset: usize, message: String| VMError::AssemblyError {
            line: line_no + 1,
            offset,
            message,
        };

        if first.text.starts_with('.') {
            if let Some(extra) = tokens.get(1)
                && first.text == SECTION_SOURCE
            {
                return Err(fail(
                    extra.offset,
                    format!("{SECTION_SOURCE} takes no arguments"),
                ));
            }
            section = match first.text {
                SECTION_CONSTANTS => Section::Constants,
                SECTION_SOURCE => {
                    sources.push(Vec::new());
                    Section::Source
                }
                other => return Err(fail(first.offset, format!("unknown directive '{other}'"))),
            };
            if section == Section::Constants {
                for tok in &tokens[1..] {
                    constants.push(parse_word(tok.text).map_err(|m| fail(tok.offset, m))?);
                }
            }
            continue;
        }

        match section {
            Section::Constants => {
                for tok in &tokens {
                    constants.push(parse_word(tok.text).map_err(|m| fail(tok.offset, m))?);
                }
            }
            Section::None | Section::Source => {
                if section == Section::None {
                    sources.push(Vec::new());
                    section = Section::Source;
                }
                let bytes = parse_instruction(&tokens).map_err(|(o, m)| fail(o, m))?;
                if let Some(current) = sources.last_mut() {
                    current.extend_from_slice(&bytes);
                }
            }
        }
    }

    if sources.is_empty() {
        sources.push(Vec::new());
    }
    Script::new(sources, constants)
}

/// Assemble a full source string into a script.
///
/// Only the shape of the result is checked; use [`Script::analyze`] to check
/// that a source is well formed.
pub fn assemble_source(source: impl Into<String>) -> Result<Script, VMError> {
    assemble_source_with_name(source.into(), "<source>")
}

/// Assembles source with an associated filename for error diagnostics.
fn assemble_source_with_name(source: String, source_name: &str) -> Result<Script, VMError> {
    let result = assemble_lines(&source);
    if let Err(err) = &result {
        log_assembly_error(source_name, &source, err);
    }
    result
}

/// Convenience: assemble directly from file path
pub fn assemble_file<P: AsRef<Path>>(path: P) -> Result<Script, VMError> {
    let path_ref = path.as_ref();
    let source = fs::read_to_string(path_ref).map_err(|e| VMError::IoError {
        path: path_ref.display().to_string(),
        message: e.to_string(),
    })?;
    assemble_source_with_name(source, &path_ref.display().to_string())
}

/// Renders a script as assembly that [`assemble_source`] reads back unchanged.
pub fn disassemble(script: &Script) -> Result<String, VMError> {
    let mut out = String::new();

    if !script.constants().is_empty() {
        let _ = writeln!(out, "{SECTION_CONSTANTS}");
        for (i, value) in script.constants().iter().enumerate() {
            let _ = writeln!(out, "{value:<24} {COMMENT_CHAR} {i}");
        }
    }

    for (index, source) in script.sources().iter().enumerate() {
        let _ = writeln!(out, "{SECTION_SOURCE} {COMMENT_CHAR} {index}");
        for (at, pair) in source.chunks_exact(INSTRUCTION_WIDTH).enumerate() {
            let offset = at * INSTRUCTION_WIDTH;
            let instr = Instruction::try_from(pair[0]).map_err(|_| {
                VMError::InvalidInstruction {
                    opcode: pair[0],
                    offset,
                }
            })?;
            let kind = instr.operand_kind();
            if kind.is_explicit() {
                let _ = writeln!(out, "{} {}", instr.mnemonic(), kind.render(pair[1]));
            } else {
                let _ = writeln!(out, "{}", instr.mnemonic());
            }
        }
    }

    Ok(out)
}
