//! Command-line front end: parse a file and inspect the resulting tree.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use arbor::builder;
use arbor::errors::print_error;
use arbor::nodes::display::{to_display_string, DisplayOptions};

#[derive(Debug, Parser)]
#[command(
    name = "arbor",
    version,
    about = "A typed Python syntax-tree toolkit with zipper-based editing."
)]
struct ArborArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a file and print its tree.
    Dump {
        /// The Python source file to parse.
        #[arg(required = true)]
        file: PathBuf,
        /// Include per-node identity tags.
        #[arg(long)]
        ids: bool,
        /// Include line/column positions.
        #[arg(long)]
        positions: bool,
        /// Include derived fields.
        #[arg(long)]
        derived: bool,
        /// Depth limit; 0 means unlimited.
        #[arg(long, default_value_t = 0)]
        max_depth: usize,
    },
    /// Parse a file and report whether it is syntactically valid.
    Check {
        /// The Python source file to parse.
        #[arg(required = true)]
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let args = ArborArgs::parse();
    match args.command {
        Command::Dump {
            file,
            ids,
            positions,
            derived,
            max_depth,
        } => {
            let module_name = file
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            match builder::build_file(&file, &module_name) {
                Ok(tree) => {
                    let options = DisplayOptions {
                        ids,
                        positions,
                        derived,
                        max_depth,
                        ..DisplayOptions::default()
                    };
                    println!("{}", to_display_string(tree.root(), &options));
                    ExitCode::SUCCESS
                }
                Err(error) => {
                    print_error(error);
                    ExitCode::FAILURE
                }
            }
        }
        Command::Check { file } => {
            let module_name = file
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            match builder::build_file(&file, &module_name) {
                Ok(tree) => {
                    let statements = tree.module().map(|m| m.body.len()).unwrap_or(0);
                    println!("ok: {} top-level statements", statements);
                    ExitCode::SUCCESS
                }
                Err(error) => {
                    print_error(error);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
