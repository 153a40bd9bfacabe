#[macro_use]
extern crate clap;

use std::fs;
use std::sync::mpsc;
use std::time::Duration;

use clap::Arg;

use rvcore::arch::ArchitectureFormula;
use rvcore::ast::MemoryAccess;
use rvcore::conversions;
use rvsim::ProjectModule;

#[derive(Debug)]
enum Error {
    Io(std::io::Error),
    Clap(clap::Error),
    Project(rvcore::project::ProjectError),
    CompileErrors(Vec<String>),
    Timeout,
}

fn main() -> Result<(), Error> {
    pretty_env_logger::init();

    let matches = app_from_crate!()
        .arg(
            Arg::with_name("SOURCE")
                .help("Sets the assembly source file to run")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("memory")
                .short("m")
                .long("memory")
                .takes_value(true)
                .value_name("MEMORY")
                .default_value("1024")
                .help("Sets the size of the memory in cells"),
        )
        .arg(
            Arg::with_name("modules")
                .long("modules")
                .takes_value(true)
                .value_name("MODULES")
                .default_value("rv32i,rv32m")
                .help("Sets the comma-separated architecture module list"),
        )
        .arg(
            Arg::with_name("timeout")
                .long("timeout")
                .takes_value(true)
                .value_name("SECONDS")
                .default_value("60")
                .help("Gives up after this many seconds of execution"),
        )
        .get_matches();

    let memory_cells = value_t!(matches.value_of("memory"), usize).map_err(Error::Clap)?;
    let timeout = value_t!(matches.value_of("timeout"), u64).map_err(Error::Clap)?;
    let modules: Vec<&str> = matches
        .value_of("modules")
        .expect("has a default")
        .split(',')
        .map(str::trim)
        .collect();
    let source_path = matches.value_of("SOURCE").expect("required");
    let source = fs::read_to_string(source_path).map_err(Error::Io)?;

    let formula = ArchitectureFormula::new("riscv", &modules);
    let module = ProjectModule::new(formula, memory_cells).map_err(Error::Project)?;

    let (stopped_sender, stopped) = mpsc::channel();
    let (errors_sender, compile_errors) = mpsc::channel();
    let parser = module.parser_interface();
    parser.set_execution_stopped_callback(Box::new(move || {
        let _ = stopped_sender.send(());
    }));
    parser.set_final_representation_callback(Box::new(move |representation| {
        let rendered: Vec<String> = representation
            .error_list
            .errors()
            .iter()
            .map(|error| error.to_string())
            .collect();
        let _ = errors_sender.send(rendered);
    }));
    parser.set_error_callback(Box::new(|message| {
        eprintln!("runtime error: {}", message);
    }));

    let commands = module.command_interface();
    commands.parse(&source);
    commands.execute();

    let rendered = compile_errors
        .recv_timeout(Duration::from_secs(timeout))
        .map_err(|_| Error::Timeout)?;
    if !rendered.is_empty() {
        for line in &rendered {
            eprintln!("{}", line);
        }
        return Err(Error::CompileErrors(rendered));
    }
    stopped
        .recv_timeout(Duration::from_secs(timeout))
        .map_err(|_| Error::Timeout)?;

    let mut access = module.memory_access();
    let architecture = module.architecture_access().get_architecture();
    let format = architecture.data_format();
    for unit in architecture.units() {
        for name in unit.register_names_sorted() {
            let value = access.get_register_value(name);
            let rendered = conversions::to_signed(&value, &format);
            if rendered != 0 {
                println!("{:>5} = {} ({})", name, rendered, conversions::to_hex_string(&value));
            }
        }
    }

    Ok(())
}
