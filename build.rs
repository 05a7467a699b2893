// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: verbose logging
fn verbose_arg() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .global(true)
        .action(ArgAction::SetTrue)
        .help("Enable debug logging")
}

fn build_cli() -> Command {
    Command::new("rpmcopy")
        .version(env!("CARGO_PKG_VERSION"))
        .author("rpmcopy Contributors")
        .about("Dependency-aware content copy between RPM repository versions")
        .subcommand_required(true)
        .arg(verbose_arg())
        .subcommand(
            Command::new("vercmp")
                .about("Compare two [epoch:]version[-release] strings")
                .arg(Arg::new("left").required(true).help("Left-hand version"))
                .arg(Arg::new("right").required(true).help("Right-hand version")),
        )
        .subcommand(
            Command::new("parse")
                .about("Parse a dependency expression and print its structure")
                .arg(Arg::new("expression").required(true).help("Dependency string")),
        )
        .subcommand(
            Command::new("copy")
                .about("Run a copy request against a JSON content store")
                .arg(
                    Arg::new("store")
                        .short('s')
                        .long("store")
                        .required(true)
                        .value_name("PATH")
                        .help("Path to the store file"),
                )
                .arg(
                    Arg::new("request")
                        .short('r')
                        .long("request")
                        .required(true)
                        .value_name("PATH")
                        .help("Path to the copy request (JSON)"),
                )
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("PATH")
                        .help("Path to a TOML configuration file"),
                )
                .arg(
                    Arg::new("write")
                        .long("write")
                        .action(ArgAction::SetTrue)
                        .help("Write the updated store back to its file"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("rpmcopy.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
