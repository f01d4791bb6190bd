#![allow(unused_assignments)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// Keel Configuration Language Compiler
///
/// A row-oriented configuration language that compiles to JSON and YAML.
#[derive(Parser)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log compiler passes to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile Keel source to JSON or YAML
    Compile {
        /// Source file to compile (`-` reads stdin)
        file: PathBuf,

        /// Output file (extension determines format: .yaml, .json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Force output format: json, json-pretty, yaml
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Validate source without emitting output
    Check {
        /// Source file to check (`-` reads stdin)
        file: PathBuf,
    },

    /// Internal: Assemble a file and print its logical lines (for debugging)
    #[command(hide = true)]
    Lines {
        /// Source file to assemble
        file: PathBuf,
    },

    /// Internal: Evaluate inline source (for debugging/testing)
    #[command(hide = true)]
    Eval {
        /// Keel source code to evaluate
        source: String,

        /// Output format: json, json-pretty, yaml
        #[arg(short, long, default_value = "json")]
        format: String,
    },
}

fn main() -> ExitCode {
    // Set up miette for nice error output
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Compile {
            file,
            output,
            format,
        } => cmd_compile(file, output, format),
        Commands::Check { file } => cmd_check(file),
        Commands::Lines { file } => cmd_lines(file),
        Commands::Eval { source, format } => cmd_eval(source, format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let exit_code = match &e {
                // I/O errors
                keel::KeelError::IoError { .. } => ExitCode::from(3),
                // All document errors
                _ => ExitCode::from(1),
            };
            let snippet = e.snippet();
            eprintln!("{:?}", miette::Report::new(e));
            if let Some(snippet) = snippet {
                eprintln!("{}", snippet);
            }
            exit_code
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn is_stdin(file: &Path) -> bool {
    file.to_str() == Some("-") || file.to_str() == Some("/dev/stdin")
}

fn read_stdin() -> keel::KeelResult<String> {
    use std::io::Read;
    let mut source = String::new();
    std::io::stdin()
        .read_to_string(&mut source)
        .map_err(|e| keel::KeelError::io_error(format!("failed to read stdin: {}", e)))?;
    Ok(source)
}

/// Compile a file, or stdin with includes resolved from the working directory
fn compile_input(file: &Path) -> keel::KeelResult<keel::Node> {
    if is_stdin(file) {
        let base_dir = std::env::current_dir()
            .map_err(|e| keel::KeelError::io_error(format!("failed to get cwd: {}", e)))?;
        keel::Compiler::new(base_dir).compile_source(&read_stdin()?)
    } else {
        keel::compile_file(file)
    }
}

fn parse_format(format: &str) -> keel::KeelResult<keel::OutputFormat> {
    keel::OutputFormat::parse(format).ok_or_else(|| {
        keel::KeelError::io_error(format!(
            "unknown output format '{}'. Use: json, json-pretty, yaml",
            format
        ))
    })
}

fn cmd_compile(
    file: PathBuf,
    output: Option<PathBuf>,
    format: Option<String>,
) -> keel::KeelResult<()> {
    // Determine output format
    let output_format = match (&format, &output) {
        (Some(fmt), _) => parse_format(fmt)?,
        (None, Some(out)) => keel::OutputFormat::from_extension(out),
        (None, None) => keel::OutputFormat::JsonPretty,
    };

    let node = compile_input(&file)?;
    let result = keel::emit(&node, output_format)?;

    match output {
        Some(path) => {
            std::fs::write(&path, &result).map_err(|e| {
                keel::KeelError::io_error(format!("failed to write {}: {}", path.display(), e))
            })?;
            tracing::info!("wrote {}", path.display());
        }
        None => println!("{}", result),
    }
    Ok(())
}

fn cmd_check(file: PathBuf) -> keel::KeelResult<()> {
    compile_input(&file)?;
    if is_stdin(&file) {
        eprintln!("<stdin>: OK");
    } else {
        eprintln!("{}: OK", file.display());
    }
    Ok(())
}

fn cmd_lines(file: PathBuf) -> keel::KeelResult<()> {
    let mut resolver = keel::IncludeResolver::new(&keel::DiskLoader);
    let lines = resolver.expand_file(&file)?;
    let logical = keel::assemble(&lines)?;

    println!("Logical lines from {}:", file.display());
    println!("{:-<60}", "");

    for line in logical {
        let origin = line
            .origin
            .file
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<input>".to_string());
        println!("{:>16}:{:<4}  {}", origin, line.origin.line, line.text);
    }

    Ok(())
}

fn cmd_eval(source: String, format: String) -> keel::KeelResult<()> {
    let output_format = parse_format(&format)?;
    let node = keel::parse_str(&source).map(|ctx| keel::export(&ctx))?;
    println!("{}", keel::emit(&node, output_format)?);
    Ok(())
}
