//! modlink CLI

use std::path::Path;

use modlinkc::commands::{
    check_program, format_pin, link_program_file, list_pins, parse_link_options, unpin,
};

fn main() {
    modlinkc::init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let command = &args[1];

    match command.as_str() {
        "link" => {
            if args.len() < 3 {
                eprintln!("Usage: modlink link <program.json> [options]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --cache <path>               Pin cache file");
                eprintln!("  --pin                        Pin every new resolution");
                eprintln!("  --refresh                    Re-resolve every pin");
                eprintln!("  --refresh=<consumer>#<slot>  Re-resolve one pin");
                eprintln!("  --jobs=<n>                   Worker threads (default: all cores)");
                std::process::exit(1);
            }

            let config = match parse_link_options(&args[3..]) {
                Ok(config) => config,
                Err(message) => {
                    eprintln!("error: {message}");
                    std::process::exit(1);
                }
            };

            let outcome = match link_program_file(Path::new(&args[2]), config) {
                Ok(outcome) => outcome,
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            };

            for line in outcome.program_lines() {
                println!("{line}");
            }
            if !outcome.diagnostics.is_empty() {
                eprint!("{}", modlink::diagnostic::render(&outcome.diagnostics));
            }
            if !outcome.is_ok() {
                std::process::exit(1);
            }
            println!(
                "OK: {} modules linked, {} pins",
                outcome.linked_modules.len(),
                outcome.pins_committed
            );
        }
        "check" => {
            if args.len() < 3 {
                eprintln!("Usage: modlink check <program.json>");
                std::process::exit(1);
            }
            let outcome = match check_program(Path::new(&args[2])) {
                Ok(outcome) => outcome,
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            };
            if !outcome.diagnostics.is_empty() {
                eprint!("{}", modlink::diagnostic::render(&outcome.diagnostics));
            }
            if !outcome.is_ok() {
                std::process::exit(1);
            }
            println!("OK: {} ({} modules)", args[2], outcome.accepted);
        }
        "pins" => {
            if args.len() < 3 {
                eprintln!("Usage: modlink pins <cache>");
                std::process::exit(1);
            }
            match list_pins(Path::new(&args[2])) {
                Ok(pins) => {
                    for pin in &pins {
                        println!("{}", format_pin(pin));
                    }
                }
                Err(e) => {
                    eprint!("{}", modlink::diagnostic::render(&[e.to_diagnostic()]));
                    std::process::exit(1);
                }
            }
        }
        "unpin" => {
            if args.len() < 4 {
                eprintln!("Usage: modlink unpin <cache> <consumer>#<slot>");
                std::process::exit(1);
            }
            let key = match args[3].parse::<modlink::LinkKey>() {
                Ok(key) => key,
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            };
            match unpin(Path::new(&args[2]), &key) {
                Ok(true) => println!("unpinned {key}"),
                Ok(false) => {
                    eprintln!("error: no pin for {key}");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprint!("{}", modlink::diagnostic::render(&[e.to_diagnostic()]));
                    std::process::exit(1);
                }
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        "version" | "--version" | "-v" => {
            println!("modlink {}", env!("CARGO_PKG_VERSION"));
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("modlink: resolve module dependencies by constraint");
    println!();
    println!("Usage: modlink <command> [options]");
    println!();
    println!("Commands:");
    println!("  link <program.json>      Link a program and report every failure");
    println!("  check <program.json>     Check conformance and constraints only");
    println!("  pins <cache>             List persisted pins");
    println!("  unpin <cache> <key>      Drop one pin (key: <consumer>#<slot>)");
    println!("  help                     Show this help message");
    println!("  version                  Show version information");
    println!();
    println!("Link options:");
    println!("  --cache <path>           Pin cache file");
    println!("  --pin                    Pin every new resolution");
    println!("  --refresh[=<key>]        Re-resolve pins (all, or one key)");
    println!("  --jobs=<n>               Worker threads (default: all cores)");
    println!();
    println!("Set MODLINK_LOG=modlink=debug to trace resolution.");
}
