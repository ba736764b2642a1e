use clap::{Parser as ClapParser, Subcommand};
use std::io::{self, Read};
use std::path::PathBuf;

use stencil_lang::cli::{self, CliError, RenderOptions};

#[derive(ClapParser)]
#[command(name = "stencil")]
#[command(about = "Stencil - compile namespaced templates to JavaScript or render them directly")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile template files into a JavaScript module on stdout
    Compile {
        /// Template source files, one namespace each
        files: Vec<PathBuf>,
    },

    /// Render a template with JSON data
    Render {
        /// Template source file
        file: PathBuf,

        /// Name of the template to render
        template: String,

        /// JSON data (reads from stdin if not provided)
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Validate template syntax without compiling
    Check {
        /// Template source file
        file: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { files } => run_compile(files),
        Commands::Render {
            file,
            template,
            data,
        } => run_render(file, template, data),
        Commands::Check { file } => run_check(file),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_compile(files: Vec<PathBuf>) -> Result<(), CliError> {
    let mut sources = Vec::with_capacity(files.len());
    for file in files {
        sources.push(std::fs::read_to_string(file)?);
    }
    print!("{}", cli::execute_compile(&sources)?);
    Ok(())
}

fn run_render(
    file: PathBuf,
    template: String,
    data: Option<String>,
) -> Result<(), CliError> {
    let data = match data {
        Some(s) => Some(s),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(CliError::Io)?;
            Some(buffer)
        }
        None => None,
    };

    let options = RenderOptions {
        source: std::fs::read_to_string(file)?,
        template,
        data,
    };
    println!("{}", cli::execute_render(&options)?);
    Ok(())
}

fn run_check(file: PathBuf) -> Result<(), CliError> {
    let source = std::fs::read_to_string(file)?;
    let namespace = cli::execute_check(&source)?;
    println!("Syntax is valid ({})", namespace);
    Ok(())
}
