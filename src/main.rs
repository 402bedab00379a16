use std::fs;
use std::path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;
use rand::rngs::StdRng;
use rand::SeedableRng;

use ext_line_sort::{gen, ExternalSorter, ExternalSorterBuilder};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    match arg_parser.subcommand() {
        Some(("sort", args)) => sort(args),
        Some(("generate", args)) => generate(args),
        _ => {
            log::error!("no command provided");
            process::exit(1);
        }
    }
}

fn sort(args: &clap::ArgMatches) {
    let input = args.value_of("input").expect("value is required");
    let output = args.value_of("output").expect("value is required");
    let tmp_dir: Option<&str> = args.value_of("tmp_dir");
    let workspace_dir: Option<&str> = args.value_of("workspace_dir");
    let max_line_len = args.value_of("max_line_len").expect("value has default");
    let buf_size: Option<&str> = args.value_of("buf_size");

    let mut sorter_builder = ExternalSorterBuilder::new().with_max_line_len(parse_size(max_line_len));

    if let Some(tmp_dir) = tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    if let Some(workspace_dir) = workspace_dir {
        sorter_builder = sorter_builder.with_workspace_dir(path::Path::new(workspace_dir));
    }

    if let Some(buf_size) = buf_size {
        sorter_builder = sorter_builder.with_rw_buf_size(parse_size(buf_size));
    }

    let sorter: ExternalSorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) = sorter.sort(path::Path::new(input), path::Path::new(output)) {
        log::error!("data sorting error: {}", err);
        process::exit(1);
    }
}

fn generate(args: &clap::ArgMatches) {
    let count: usize = args.value_of_t_or_exit("count");
    let max_len: usize = args.value_of_t_or_exit("max_len");
    let patterned = args.is_present("alpha");
    let seed: Option<u64> = args.is_present("seed").then(|| args.value_of_t_or_exit("seed"));

    let output = args.value_of("output").expect("value is required");
    let output_stream = match fs::File::create(output) {
        Ok(file) => file,
        Err(err) => {
            log::error!("output file creation error: {}", err);
            process::exit(1);
        }
    };

    let result = if patterned {
        gen::reversed_alphabet_lines(count, output_stream)
    } else {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        gen::random_lines(count, max_len, &mut rng, output_stream)
    };

    match result {
        Ok(()) => log::info!("generated {} lines into {}", count, output),
        Err(err) => {
            log::error!("data generation error: {}", err);
            process::exit(1);
        }
    }
}

fn parse_size(value: &str) -> usize {
    value.parse::<ByteSize>().expect("value is pre-validated").as_u64() as usize
}

fn validate_size(value: &str) -> Result<(), String> {
    match value.parse::<ByteSize>() {
        Ok(size) if size.as_u64() > 0 => Ok(()),
        Ok(_) => Err("size must be positive".to_string()),
        Err(err) => Err(format!("size format incorrect: {}", err)),
    }
}

fn validate_positive(value: &str) -> Result<(), String> {
    match value.parse::<usize>() {
        Ok(number) if number > 0 => Ok(()),
        Ok(_) => Err("value must be positive".to_string()),
        Err(err) => Err(format!("number format incorrect: {}", err)),
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("line-sort")
        .about("external line sorter")
        .setting(clap::AppSettings::SubcommandRequiredElseHelp)
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .subcommand(
            clap::App::new("sort")
                .about("sorts lines of a text file")
                .arg(
                    clap::Arg::new("input")
                        .short('i')
                        .long("input")
                        .help("file to be sorted")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("result file")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("tmp_dir")
                        .short('d')
                        .long("tmp-dir")
                        .help("directory in which the scratch workspace is created")
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("workspace_dir")
                        .short('w')
                        .long("workspace-dir")
                        .help("exact scratch workspace directory, must not exist")
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("max_line_len")
                        .short('m')
                        .long("max-line-len")
                        .help("maximum supported line length")
                        .takes_value(true)
                        .default_value("64KiB")
                        .validator(validate_size),
                )
                .arg(
                    clap::Arg::new("buf_size")
                        .short('b')
                        .long("buf-size")
                        .help("file read/write buffer size")
                        .takes_value(true)
                        .validator(validate_size),
                ),
        )
        .subcommand(
            clap::App::new("generate")
                .about("generates a test file")
                .arg(
                    clap::Arg::new("count")
                        .short('c')
                        .long("count")
                        .help("number of lines")
                        .required(true)
                        .takes_value(true)
                        .validator(validate_positive),
                )
                .arg(
                    clap::Arg::new("max_len")
                        .short('m')
                        .long("max-len")
                        .help("random lines are shorter than this length")
                        .takes_value(true)
                        .default_value("32")
                        .validator(validate_positive),
                )
                .arg(
                    clap::Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("result file")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("alpha")
                        .short('a')
                        .long("alpha")
                        .help("generate reversed alphabet pattern instead of random lines"),
                )
                .arg(
                    clap::Arg::new("seed")
                        .short('s')
                        .long("seed")
                        .help("random generator seed")
                        .takes_value(true),
                ),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
