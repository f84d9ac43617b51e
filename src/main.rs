use std::fs::File;
use std::time::Duration;

use log::{debug, error, info, warn};

use mtsp_vrp::config::{ObjectiveMode, SolveConfig};
use mtsp_vrp::io::Instance;

fn main() {
    // Setup logging & parse command line arguments
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!(
        "This is the mTSP-VRP branch-and-cut solver, version {}",
        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
    );
    let args = parse_cli_args();

    if args.get_one::<String>("OUTPUT").is_none() && !args.get_flag("print") {
        warn!("No OUTPUT file and no --print option given. The solution will not be exported anywhere.");
    }

    // Open input file
    let inpath: &String = args.get_one("INPUT").unwrap();
    debug!("Opening input file {} ...", inpath);
    let file = std::fs::File::open(inpath).unwrap_or_else(|e| {
        error!("Could not open input file {}: {}", inpath, e);
        std::process::exit(exitcode::NOINPUT)
    });

    let format = args.get_one::<String>("format").map(|s| s.as_str()).unwrap_or("matrix");
    let instance: Instance = match format {
        "json" => mtsp_vrp::io::json::read(file),
        _ => mtsp_vrp::io::matrix::read(file),
    }
    .unwrap_or_else(|e| {
        error!("Could not read input file: {}", e);
        std::process::exit(exitcode::DATAERR)
    });

    info!(
        "Found {} nodes and {} agent(s) in the instance.",
        instance.num_nodes(),
        instance.start.len()
    );

    let objective = match args.get_one::<String>("objective").map(|s| s.as_str()) {
        Some("max") => ObjectiveMode::Max,
        _ => ObjectiveMode::Sum,
    };
    let num_threads = args
        .get_one::<u32>("threads")
        .copied()
        .unwrap_or_else(|| num_cpus::get() as u32);
    let timeout = args
        .get_one::<u64>("timeout_secs")
        .map(|secs| Duration::from_secs(*secs));

    let config = SolveConfig::default()
        .with_num_threads(num_threads as usize)
        .with_objective(objective)
        .with_timeout(timeout)
        .with_heuristics(!args.get_flag("no_heuristics"));

    let weights = instance.weights_array();
    let solution = mtsp_vrp::solve(&weights, &instance.start, &instance.end, &config)
        .unwrap_or_else(|e| {
            error!("Solver failed: {}", e);
            std::process::exit(exitcode::SOFTWARE)
        });

    info!(
        "Finished solving. lower={}, upper={}, timeout_hit={}",
        solution.lower_bound, solution.upper_bound, solution.timeout_hit
    );

    if let Some(outpath) = args.get_one::<String>("OUTPUT") {
        debug!("Opening output file {} ...", outpath);
        match File::create(outpath) {
            Err(e) => error!("Could not open output file {}: {}.", outpath, e),
            Ok(file) => {
                let out_instance = Instance {
                    weights: instance.weights.clone(),
                    start: solution.paths.iter().map(|p| p[0]).collect(),
                    end: solution.paths.iter().map(|p| *p.last().unwrap()).collect(),
                };
                let res = match format {
                    "json" => mtsp_vrp::io::json::write(file, &out_instance),
                    _ => mtsp_vrp::io::matrix::write(file, &out_instance),
                };
                match res {
                    Ok(_) => debug!("Solution written to {}.", outpath),
                    Err(e) => error!("Could not write solution to {}: {}.", outpath, e),
                }
            }
        }
    }

    if args.get_flag("print") {
        print!("{}", mtsp_vrp::io::format_solution(&solution));
    }
}

/// Helper function to construct and execute parser for command line options
fn parse_cli_args() -> clap::ArgMatches {
    clap::command!()
        .arg(
            clap::Arg::new("format")
                .long("format")
                .help("Instance file format: plain TSPLIB-style matrix or self-describing JSON")
                .value_name("FORMAT")
                .value_parser(["matrix", "json"]),
        )
        .arg(
            clap::Arg::new("objective")
                .long("objective")
                .help("Minimise the sum of all agents' path weights, or the maximum single path weight")
                .value_name("OBJECTIVE")
                .value_parser(["sum", "max"]),
        )
        .arg(
            clap::Arg::new("threads")
                .long("threads")
                .help("Number of worker threads to spawn. Defaults to the number of detected CPU cores.")
                .value_name("THREADS")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            clap::Arg::new("timeout_secs")
                .long("timeout-secs")
                .help("Abort the search after this many seconds and report the best bounds found so far.")
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            clap::Arg::new("no_heuristics")
                .long("no-heuristics")
                .help("Disable the nearest-insertion/2-opt construction heuristics that warm the upper bound.")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("print")
                .short('p')
                .long("print")
                .help("Print the calculated solution to stdout in a human readable format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("INPUT")
                .help("Sets the input instance file to use")
                .required(true)
                .index(1),
        )
        .arg(
            clap::Arg::new("OUTPUT")
                .help("Sets the output file to use")
                .index(2),
        )
        .get_matches()
}
