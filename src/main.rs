use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sestring_eval::context::{BasicContext, EvalOptions, Language, LocalParam};
use sestring_eval::engine::{dump, to_hex};
use sestring_eval::errors::Result;
use sestring_eval::functions::Registry;
use sestring_eval::sestring::SeStr;
use sestring_eval::sources::{MemoryGlobals, MemorySheets};
use sestring_eval::{parse_hex, Evaluator};
use tracing::Level;

/// Simple runner: pass an encoded string as hex and print what it evaluates to.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Encoded string as hex digits, e.g. "02 20 02 06 03"
    hex: String,
    /// Local parameters as a JSON array of numbers and strings
    #[arg(long)]
    params: Option<String>,
    /// JSON file with sheet tables (see `MemorySheets`)
    #[arg(long)]
    sheets: Option<PathBuf>,
    /// JSON file with global parameters
    #[arg(long)]
    globals: Option<PathBuf>,
    /// JSON file with evaluation options
    #[arg(long)]
    options: Option<PathBuf>,
    /// Sheet language (en, ja, de, fr, chs, ko)
    #[arg(long, default_value = "en")]
    lang: Language,
    /// Print the flattened capture as hex instead of text
    #[arg(long, conflicts_with_all = ["freeze", "dump"])]
    capture: bool,
    /// Print the string with parameters baked in, as hex
    #[arg(long, conflicts_with = "dump")]
    freeze: bool,
    /// Print the payload structure instead of evaluating
    #[arg(long)]
    dump: bool,
    /// Produce output through the byte channel
    #[arg(long)]
    bytes: bool,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn build_evaluator(args: &Args) -> Result<Evaluator> {
    let mut ev = Evaluator::new(Registry::with_builtins());
    if let Some(path) = &args.options {
        let options: EvalOptions = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        ev = ev.with_options(options);
    }
    if let Some(path) = &args.sheets {
        let sheets = MemorySheets::from_json(&std::fs::read_to_string(path)?)?;
        ev = ev.with_sheets(Arc::new(sheets));
    }
    if let Some(path) = &args.globals {
        let globals = MemoryGlobals::from_json(&std::fs::read_to_string(path)?)?;
        ev = ev.with_globals(Arc::new(globals));
    }
    Ok(ev)
}

fn run(args: &Args) -> Result<bool> {
    let bytes = parse_hex(&args.hex)?;
    let value = SeStr::new(&bytes);

    if args.dump {
        println!("{}", dump(value));
        return Ok(true);
    }

    let ev = build_evaluator(args)?;
    let params: Vec<LocalParam> = match &args.params {
        Some(json) => serde_json::from_str(json)?,
        None => Vec::new(),
    };
    let mut ctx = BasicContext::new()
        .with_language(args.lang)
        .with_params(params)
        .with_byte_output(args.bytes);

    let ok = if args.capture {
        let mut out = Vec::new();
        let ok = ev.capture_parameters_into(&mut ctx, value, &mut out);
        println!("{}", to_hex(&out));
        ok
    } else if args.freeze {
        let mut out = Vec::new();
        let ok = ev.freeze_parameters_into(&mut ctx, value, &mut out);
        println!("{}", to_hex(&out));
        ok
    } else {
        let ok = ev.resolve_string(&mut ctx, value);
        println!("{}", ctx.text());
        ok
    };

    for error in ctx.errors() {
        eprintln!("error: {error}");
    }
    Ok(ok)
}

fn main() {
    // Parse CLI arguments.
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("evaluation incomplete");
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
