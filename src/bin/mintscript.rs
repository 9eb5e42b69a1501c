//! Sale script compiler and evaluator CLI.
//!
//! Reads a script, either assembly text or the binary format, and compiles,
//! disassembles or evaluates it.
//!
//! # Usage
//! ```text
//! mintscript <input> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `input`: Assembly source, or a compiled script (detected by its header)
//!
//! # Options
//! - `-o, --output <file>`: Output file path (defaults to `<input>.bin`)
//! - `-d, --disassemble`: Print the script as assembly
//! - `-e, --eval`: Evaluate the script as a sale script
//! - `--account`, `--units`, `--time`, `--supply-limit`, `--minted`, `--supply`:
//!   inputs of the evaluation
//!
//! # Examples
//! ```text
//! mintscript sale.msa
//! mintscript sale.msa -o sale.bin
//! mintscript sale.bin --disassemble
//! mintscript sale.bin --eval --units 5 --time 1700000000 --supply-limit 100
//! ```

use mintscript::sale::evaluator::SaleScript;
use mintscript::types::address::Address;
use mintscript::virtual_machine::assembler::{assemble_file, disassemble};
use mintscript::virtual_machine::program::{MAGIC, Script};
use mintscript::virtual_machine::state::{NoTiers, StaticState};
use mintscript::{error, info};
use primitive_types::U256;
use std::env;
use std::fs;
use std::path::Path;
use std::process;

#[derive(Default)]
struct EvalInputs {
    account: Address,
    units: U256,
    time: u64,
    state: StaticState,
}

fn fail(message: impl std::fmt::Display) -> ! {
    error!("{message}");
    process::exit(1)
}

/// Returns the value following flag `k`, advancing past it.
fn flag_value<'a>(args: &'a [String], i: &mut usize, k: &str) -> &'a str {
    *i += 1;
    match args.get(*i) {
        Some(value) => value.as_str(),
        None => fail(format!("{k} requires an argument")),
    }
}

fn parse_word(k: &str, value: &str) -> U256 {
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).ok(),
        None => U256::from_dec_str(value).ok(),
    };
    parsed.unwrap_or_else(|| fail(format!("Invalid {k}: '{value}' is not a number")))
}

fn parse_u64(k: &str, value: &str) -> u64 {
    value
        .parse::<u64>()
        .unwrap_or_else(|_| fail(format!("Invalid {k}: '{value}' is not a valid number")))
}

fn load_script(input_path: &str) -> (Script, bool) {
    let raw = fs::read(input_path).unwrap_or_else(|e| fail(format!("Failed to read {input_path}: {e}")));
    if raw.starts_with(MAGIC) {
        let script = Script::from_bytes(&raw).unwrap_or_else(|e| fail(format!("Invalid script: {e}")));
        return (script, true);
    }
    let script = assemble_file(input_path).unwrap_or_else(|e| fail(format!("Assembly failed: {e}")));
    (script, false)
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let input_path = &args[1];
    let mut output_path: Option<String> = None;
    let mut show_disassembly = false;
    let mut eval = false;
    let mut inputs = EvalInputs::default();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--output" | "-o") => output_path = Some(flag_value(&args, &mut i, k).to_string()),
            "--disassemble" | "-d" => show_disassembly = true,
            "--eval" | "-e" => eval = true,
            k @ "--account" => {
                let value = flag_value(&args, &mut i, k);
                inputs.account = value
                    .parse::<Address>()
                    .unwrap_or_else(|e| fail(format!("Invalid {k}: {e}")));
            }
            k @ "--units" => inputs.units = parse_word(k, flag_value(&args, &mut i, k)),
            k @ "--time" => inputs.time = parse_u64(k, flag_value(&args, &mut i, k)),
            k @ "--supply-limit" => {
                inputs.state.supply_limit = parse_word(k, flag_value(&args, &mut i, k))
            }
            k @ "--minted" => inputs.state.total_minted = parse_word(k, flag_value(&args, &mut i, k)),
            k @ "--supply" => inputs.state.total_supply = parse_word(k, flag_value(&args, &mut i, k)),
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
        i += 1;
    }

    if !Path::new(input_path).exists() {
        fail(format!("Input file does not exist: {input_path}"));
    }

    let (script, was_binary) = load_script(input_path);
    info!(
        "Loaded {} ({} sources, {} constants, id {})",
        input_path,
        script.sources().len(),
        script.constants().len(),
        script.id().short()
    );

    // Text input is compiled unless another action was asked for.
    let compile = output_path.is_some() || (!was_binary && !show_disassembly && !eval);
    if compile {
        let output_path = output_path.unwrap_or_else(|| {
            let p = Path::new(input_path);
            let stem = p.file_stem().unwrap_or_default().to_string_lossy();
            let parent = p.parent().unwrap_or(Path::new("."));
            parent
                .join(format!("{}.bin", stem))
                .to_string_lossy()
                .into_owned()
        });

        if let Some(parent) = Path::new(&output_path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fail(format!("Output directory does not exist: {}", parent.display()));
        }

        let bytes = script.to_bytes();
        if let Err(e) = fs::write(&output_path, &bytes) {
            fail(format!("Failed to write output file: {e}"));
        }
        info!("Compiled {} -> {} ({} bytes)", input_path, output_path, bytes.len());
    }

    if show_disassembly {
        let text = disassemble(&script).unwrap_or_else(|e| fail(format!("Disassembly failed: {e}")));
        print!("{text}");
    }

    if eval {
        let sale = SaleScript::new(script).unwrap_or_else(|e| fail(format!("Not a sale script: {e}")));
        let outputs = sale
            .calculate_buy(
                &inputs.state,
                &NoTiers,
                inputs.time,
                &inputs.account,
                inputs.units,
            )
            .unwrap_or_else(|e| fail(format!("Evaluation aborted: {e}")));
        println!("max_units  {}", outputs.max_units);
        println!("unit_price {}", outputs.unit_price);
    }
}

const USAGE: &str = "\
Sale Script Tool

USAGE:
    {program} <input> [OPTIONS]

ARGS:
    <input>    Assembly source, or a compiled script

OPTIONS:
    -o, --output <file>      Output file path (defaults to <input>.bin)
    -d, --disassemble        Print the script as assembly
    -e, --eval               Evaluate as a sale script and print its outputs
        --account <address>  Buyer address (context slot 0, default zero)
        --units <n>          Requested units (context slot 1, default 0)
        --time <seconds>     Evaluation timestamp (default 0)
        --supply-limit <n>   SUPPLY_LIMIT storage value
        --minted <n>         TOTAL_MINTED storage value
        --supply <n>         TOTAL_SUPPLY storage value
    -h, --help               Print this help message

EXAMPLES:
    # Compile to default output name
    {program} sale.msa

    # Compile with explicit output
    {program} sale.msa -o sale.bin

    # Inspect a compiled script
    {program} sale.bin --disassemble

    # Price 5 units at a given time
    {program} sale.bin --eval --units 5 --time 1700000000 --supply-limit 100
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
