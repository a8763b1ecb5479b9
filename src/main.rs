use clap::{Parser, ValueEnum};
use std::{fs::File, io::Write, path::PathBuf};
use tacfg::{
    cfg::{build_graph, dot::to_dot},
    error::{Error, ErrorType, Result},
    generator::{example_function, TacGenerator},
    parser::parse,
    tac::Function,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Graphviz digraph per function
    Dot,
    /// Three-address code listing
    Tac,
    /// Basic blocks with their successors
    Blocks,
}

#[derive(Parser, Debug)]
#[command(about = "Build control-flow graphs from three-address code")]
struct Args {
    /// Source file with TAC functions
    #[arg(required_unless_present = "example")]
    file: Option<PathBuf>,

    /// Use the built-in example function instead of a file
    #[arg(long, conflicts_with = "file")]
    example: bool,

    #[arg(long, value_enum, default_value_t = Emit::Dot)]
    emit: Emit,

    /// Only emit the function with this name
    #[arg(long)]
    function: Option<String>,

    /// Write output here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn unwrap_or_error<T>(result: Result<T>, file: &str, source: &str) -> T {
    match result {
        Ok(x) => x,
        Err(e) => {
            if e.print(file, source).is_err() {
                eprintln!("{}", e);
            }
            std::process::exit(1);
        }
    }
}

fn emit(functions: &[Function], emit: Emit) -> Result<String> {
    let mut output = String::new();

    for function in functions {
        match emit {
            Emit::Tac => output.push_str(&function.to_string()),
            Emit::Dot => output.push_str(&to_dot(&build_graph(function)?)),
            Emit::Blocks => output.push_str(&build_graph(function)?.to_string()),
        }
    }

    Ok(output)
}

fn example_functions() -> Result<Vec<Function>> {
    let mut generator = TacGenerator::new();
    Ok(vec![example_function(&mut generator)?])
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let (file, source) = match &args.file {
        Some(path) => {
            let file = path.display().to_string();
            let source =
                unwrap_or_error(std::fs::read_to_string(path).map_err(Error::from), &file, "");
            (file, source)
        }
        None => ("<example>".to_string(), String::new()),
    };

    let functions = if args.example {
        example_functions()
    } else {
        parse(&source)
    };
    let mut functions = unwrap_or_error(functions, &file, &source);
    info!("loaded {} function(s) from {}", functions.len(), file);

    if let Some(name) = &args.function {
        functions.retain(|f| &f.name == name);
        if functions.is_empty() {
            unwrap_or_error::<()>(
                Err(Error::new(
                    ErrorType::Usage,
                    format!("No function named '{}' in {}", name, file),
                )),
                &file,
                &source,
            );
        }
    }

    let output = unwrap_or_error(emit(&functions, args.emit), &file, &source);

    let written = match &args.output {
        Some(path) => File::create(path).and_then(|mut f| f.write_all(output.as_bytes())),
        None => std::io::stdout().write_all(output.as_bytes()),
    };

    unwrap_or_error(written.map_err(Error::from), &file, &source);
}
