/// domainflow - Workflow scheduling CLI
use domainflow::{EngineConfig, Hint, Scenario, Solution, TraceSolver};
use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("domainflow v{}", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    domainflow [OPTIONS] <SCENARIO>");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -h, --help           Print this help message");
    eprintln!("    -v, --version        Print version information");
    eprintln!("    --plan               Print the buckets without evaluating");
    eprintln!("    --config <FILE>      Engine configuration (overrides the scenario's)");
    eprintln!();
    eprintln!("ARGUMENTS:");
    eprintln!("    <SCENARIO>           Scenario TOML file (use '-' for stdin)");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("    domainflow scenario.toml");
    eprintln!("    domainflow --plan scenario.toml");
    eprintln!("    cat scenario.toml | domainflow --config domainflow.toml -");
}

fn print_version() {
    println!("domainflow {}", VERSION);
}

struct Options {
    scenario: Option<String>,
    config: Option<String>,
    plan_only: bool,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();

    let mut scenario = None;
    let mut config = None;
    let mut plan_only = false;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                process::exit(0);
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing configuration file after --config".to_string());
                }
                config = Some(args[i].clone());
            }
            "--plan" => {
                plan_only = true;
            }
            arg if arg.starts_with('-') && arg != "-" => {
                return Err(format!("Unknown option: {}", arg));
            }
            arg => {
                if scenario.is_some() {
                    return Err("Multiple scenario files specified".to_string());
                }
                scenario = Some(arg.to_string());
            }
        }
        i += 1;
    }

    Ok(Options {
        scenario,
        config,
        plan_only,
    })
}

fn read_input(input: &str) -> Result<String, String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;
        Ok(buffer)
    } else {
        let path = Path::new(input);
        if !path.exists() {
            return Err(format!("Scenario file not found: {}", input));
        }
        fs::read_to_string(path).map_err(|e| format!("Failed to read file '{}': {}", input, e))
    }
}

fn init_logging(config: &EngineConfig) -> Result<(), String> {
    let level = config.log_level().map_err(|e| e.to_string())?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

fn format_solution(solution: Option<&Solution>) -> String {
    match solution {
        Some(Solution::Bindings(map)) => map
            .iter()
            .map(|(key, value)| format!("    {} = {}\n", key, value))
            .collect(),
        Some(Solution::Value(value)) => format!("    {}\n", value),
        None => "    (none)\n".to_string(),
    }
}

fn run(input: &str, options: &Options) -> Result<String, String> {
    let scenario = Scenario::parse_toml(input).map_err(|e| e.to_string())?;
    let config = match &options.config {
        Some(path) => EngineConfig::load(Path::new(path)).map_err(|e| e.to_string())?,
        None => scenario.config(),
    };
    init_logging(&config)?;

    let mut loaded = scenario.build_with(config).map_err(|e| e.to_string())?;
    let engine = &mut loaded.engine;
    let mut workflow = engine.partition(loaded.root, Hint::default());

    let mut output = String::new();
    output.push_str(&format!("expression: {}\n", engine.arena().render(loaded.root)));
    output.push_str("plan:\n");
    for line in workflow.describe(engine.arena(), engine.registry()).lines() {
        output.push_str(&format!("    {}\n", line));
    }
    if options.plan_only {
        return Ok(output);
    }

    let mut solver = TraceSolver::new();
    let solution = engine
        .evaluate(&mut workflow, &mut solver)
        .map_err(|e| e.to_string())?;

    output.push_str("solved:\n");
    for line in &solver.log {
        output.push_str(&format!("    {}\n", line));
    }
    output.push_str("solution:\n");
    output.push_str(&format_solution(solution.as_ref()));

    if !engine.deferred().is_empty() {
        let resumed = engine.resume(&mut solver).map_err(|e| e.to_string())?;
        output.push_str(&format!(
            "deferred: {} queued, {} resolved\n",
            engine.deferred().len(),
            resumed.len()
        ));
        for entry in engine.unresolved() {
            output.push_str(&format!(
                "    blocked on {}\n",
                engine.registry().label(Some(entry.blocked_on))
            ));
        }
    }

    Ok(output)
}

fn main() {
    let options = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    let Some(scenario) = options.scenario.as_deref() else {
        eprintln!("Error: Missing scenario file");
        eprintln!();
        print_usage();
        process::exit(1);
    };

    let input = match read_input(scenario) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    match run(&input, &options) {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
